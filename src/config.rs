//! Per-call configuration of the allocator.
//!
//! Both variables are read fresh on every allocating call, nothing is
//! cached, so a process can flip the policy between calls. The reads must
//! not allocate: when the allocator is installed as the global allocator,
//! an allocating lookup (like `std::env::var`) would recurse straight back
//! into us. We go to the platform directly instead, with a stack buffer.

use std::ffi::CStr;

use crate::strategy::Strategy;

const ALGORITHM_VAR: &CStr = c"ALLOCATOR_ALGORITHM";
const SCRIBBLE_VAR: &CStr = c"ALLOCATOR_SCRIBBLE";

/// Snapshot of the environment taken right before an allocation.
pub(crate) struct Config {
    /// Fit policy, `ALLOCATOR_ALGORITHM`. Defaults to first fit.
    pub strategy: Strategy,
    /// Debug poisoning, `ALLOCATOR_SCRIBBLE=1`. Fresh payloads are filled
    /// with a fixed pattern so reads of uninitialized memory show up.
    pub scribble: bool,
}

impl Config {
    pub fn read() -> Self {
        let mut buf = [0u8; 32];

        let strategy = match raw_env(ALGORITHM_VAR, &mut buf) {
            Some(value) => Strategy::parse(value),
            None => Strategy::FirstFit,
        };

        let scribble = raw_env(SCRIBBLE_VAR, &mut buf).is_some_and(|value| value == b"1");

        Self { strategy, scribble }
    }
}

/// Copies the value of `name` into `buf` and returns the filled prefix.
/// Unset variables and values that don't fit the buffer (none of the
/// recognized ones come close) read as `None`.
#[cfg(unix)]
fn raw_env<'a>(name: &CStr, buf: &'a mut [u8]) -> Option<&'a [u8]> {
    unsafe {
        let ptr = libc::getenv(name.as_ptr());
        if ptr.is_null() {
            return None;
        }

        let value = CStr::from_ptr(ptr).to_bytes();
        if value.len() > buf.len() {
            return None;
        }

        buf[..value.len()].copy_from_slice(value);
        Some(&buf[..value.len()])
    }
}

#[cfg(windows)]
fn raw_env<'a>(name: &CStr, buf: &'a mut [u8]) -> Option<&'a [u8]> {
    use windows::{Win32::System::Environment, core::PCSTR};

    unsafe {
        let name = PCSTR::from_raw(name.as_ptr().cast());
        let len = Environment::GetEnvironmentVariableA(name, Some(buf)) as usize;

        // 0 means unset; a value longer than the buffer reports the size
        // it would have needed.
        if len == 0 || len > buf.len() {
            return None;
        }

        Some(&buf[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The env-var plumbing itself is exercised through `raw_env` with the
    // variables every test runner defines; mutating the environment from
    // tests would race with the rest of the suite.

    #[test]
    fn unset_variable_reads_as_none() {
        let mut buf = [0u8; 32];

        assert!(raw_env(c"MAPALLOC_SURELY_UNSET_VARIABLE", &mut buf).is_none());
    }

    #[test]
    fn oversized_value_reads_as_none() {
        // PATH is always present and never fits a 1 byte buffer.
        let mut buf = [0u8; 1];

        assert!(raw_env(c"PATH", &mut buf).is_none());
    }

    #[test]
    fn default_config_is_first_fit_without_scribbling() {
        let config = Config::read();

        assert_eq!(config.strategy, Strategy::FirstFit);
        assert!(!config.scribble);
    }
}
