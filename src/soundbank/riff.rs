// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Little-endian record reading and chunk walking for RIFF containers.

use super::error::SoundbankError;

/// A cursor over an in-memory byte slice that reads little-endian values.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> ByteReader<'a> {
        ByteReader { data, position: 0 }
    }

    pub fn at(data: &'a [u8], position: usize) -> ByteReader<'a> {
        ByteReader { data, position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], SoundbankError> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or(SoundbankError::UnexpectedEof {
                offset: self.position,
                wanted: count,
            })?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, SoundbankError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, SoundbankError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, SoundbankError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, SoundbankError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_fourcc(&mut self) -> Result<[u8; 4], SoundbankError> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Reads a fixed-width, NUL padded name field.
    pub fn read_name(&mut self, width: usize) -> Result<String, SoundbankError> {
        let bytes = self.take(width)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).trim_end().to_string())
    }
}

/// A chunk header. For `RIFF` and `LIST` chunks the form type has already been
/// consumed, so `start` points at the first child and `size` excludes the form.
#[derive(Clone, Debug)]
pub(crate) struct Chunk {
    pub id: [u8; 4],
    pub form: Option<[u8; 4]>,
    pub start: usize,
    pub size: usize,
}

impl Chunk {
    pub fn read(reader: &mut ByteReader) -> Result<Chunk, SoundbankError> {
        let id = reader.read_fourcc()?;
        let mut size = reader.read_u32()? as usize;
        let mut form = None;
        if &id == b"RIFF" || &id == b"LIST" {
            form = Some(reader.read_fourcc()?);
            size = size.saturating_sub(4);
        }
        Ok(Chunk {
            id,
            form,
            start: reader.position(),
            size,
        })
    }

    pub fn end(&self) -> usize {
        self.start + self.size
    }

    /// The offset of the following chunk; payloads are padded to an even length.
    pub fn next_offset(&self) -> usize {
        let end = self.end();
        end + (end & 1)
    }

    pub fn is_list(&self, form: &[u8; 4]) -> bool {
        &self.id == b"LIST" && self.form.as_ref() == Some(form)
    }

    /// Returns the payload, or `None` when the file is shorter than the chunk claims.
    pub fn data<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        bytes.get(self.start..self.end())
    }

    /// Returns every complete child chunk. A truncated trailing child is dropped.
    pub fn children(&self, bytes: &[u8]) -> Vec<Chunk> {
        let limit = self.end().min(bytes.len());
        let mut reader = ByteReader::at(bytes, self.start);
        let mut children = Vec::new();
        while reader.position() + 8 <= limit {
            let child = match Chunk::read(&mut reader) {
                Ok(child) => child,
                Err(_) => break,
            };
            if child.end() > limit {
                break;
            }
            reader.seek(child.next_offset());
            children.push(child);
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_bytes(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut bytes = id.to_vec();
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            bytes.push(0);
        }
        bytes
    }

    #[test]
    fn test_reads_little_endian_values() {
        let data = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xff];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0x12345678);
        assert_eq!(reader.read_i8().unwrap(), -1);
        assert!(matches!(
            reader.read_u8(),
            Err(SoundbankError::UnexpectedEof { offset: 7, .. })
        ));
    }

    #[test]
    fn test_read_name_stops_at_nul() {
        let mut data = b"Piano".to_vec();
        data.resize(20, 0);
        data[12] = b'x';
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_name(20).unwrap(), "Piano");
        assert_eq!(reader.position(), 20);
    }

    #[test]
    fn test_children_skip_padding() {
        let mut payload = b"pdta".to_vec();
        payload.extend(chunk_bytes(b"abcd", &[1, 2, 3]));
        payload.extend(chunk_bytes(b"efgh", &[4, 5]));
        let list = chunk_bytes(b"LIST", &payload);

        let mut reader = ByteReader::new(&list);
        let chunk = Chunk::read(&mut reader).unwrap();
        assert!(chunk.is_list(b"pdta"));

        let children = chunk.children(&list);
        assert_eq!(children.len(), 2);
        assert_eq!(&children[0].id, b"abcd");
        assert_eq!(children[0].data(&list).unwrap(), &[1, 2, 3]);
        assert_eq!(&children[1].id, b"efgh");
        assert_eq!(children[1].data(&list).unwrap(), &[4, 5]);
    }

    #[test]
    fn test_truncated_child_is_dropped() {
        let mut payload = b"pdta".to_vec();
        payload.extend(chunk_bytes(b"abcd", &[1, 2]));
        payload.extend(chunk_bytes(b"efgh", &[4, 5, 6, 7]));
        let mut list = chunk_bytes(b"LIST", &payload);
        list.truncate(list.len() - 2);

        let mut reader = ByteReader::new(&list);
        let chunk = Chunk::read(&mut reader).unwrap();
        let children = chunk.children(&list);
        assert_eq!(children.len(), 1);
        assert_eq!(&children[0].id, b"abcd");
    }
}
