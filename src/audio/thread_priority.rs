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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Environment variable holding the callback thread priority (0-99).
pub const THREAD_PRIORITY_VAR: &str = "SFSYNTH_THREAD_PRIORITY";

/// Environment variable that opts out of realtime scheduling.
pub const DISABLE_RT_AUDIO_VAR: &str = "SFSYNTH_DISABLE_RT_AUDIO";

/// Default priority for the audio callback thread when the variable is unset.
const DEFAULT_CALLBACK_THREAD_PRIORITY: u8 = 70;

/// Reads the callback priority once, before the stream is built.
pub fn callback_thread_priority() -> ThreadPriority {
    parse_priority(std::env::var(THREAD_PRIORITY_VAR).ok().as_deref())
}

fn parse_priority(value: Option<&str>) -> ThreadPriority {
    let n = value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_CALLBACK_THREAD_PRIORITY);
    ThreadPriorityValue::try_from(n)
        .map(ThreadPriority::Crossplatform)
        .unwrap_or(ThreadPriority::Max)
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling for the audio callback thread.
pub fn rt_audio_enabled() -> bool {
    !env_flag(DISABLE_RT_AUDIO_VAR)
}

/// Raises the priority of the calling thread the first time it is called.
pub fn configure_audio_thread_priority(
    tp: ThreadPriority,
    rt_audio: bool,
    priority_set: &mut bool,
) {
    if *priority_set {
        return;
    }
    if let Err(e) = set_current_thread_priority(tp) {
        warn!(error = ?e, "Failed to raise audio callback thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => {
                info!("Enabled RT SCHED_FIFO for audio callback thread");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to set RT SCHED_FIFO for audio callback thread"
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = rt_audio;

    *priority_set = true;
}

#[cfg(test)]
mod test {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_parse_priority() {
        let default = ThreadPriority::Crossplatform(
            ThreadPriorityValue::try_from(DEFAULT_CALLBACK_THREAD_PRIORITY).unwrap(),
        );
        assert_eq!(parse_priority(None), default);
        assert_eq!(parse_priority(Some("abc")), default);
        assert_eq!(parse_priority(Some("100")), default);
        assert_eq!(
            parse_priority(Some(" 42 ")),
            ThreadPriority::Crossplatform(ThreadPriorityValue::try_from(42u8).unwrap())
        );
    }

    #[test]
    #[serial]
    fn test_rt_audio_flag() {
        std::env::remove_var(DISABLE_RT_AUDIO_VAR);
        assert!(rt_audio_enabled());

        std::env::set_var(DISABLE_RT_AUDIO_VAR, "Yes");
        assert!(!rt_audio_enabled());

        std::env::set_var(DISABLE_RT_AUDIO_VAR, "0");
        assert!(rt_audio_enabled());

        std::env::remove_var(DISABLE_RT_AUDIO_VAR);
    }

    #[test]
    fn test_configure_only_once() {
        let mut priority_set = true;
        configure_audio_thread_priority(ThreadPriority::Min, false, &mut priority_set);
        assert!(priority_set);
    }
}
