//! The two-call "query size, then query data" protocol.
//!
//! Variable-length registry data is read by first asking the OS how large it
//! is, allocating exactly that much and asking again. The registry can change
//! between the two calls; nothing here retries. Whatever the second call
//! reports is what the caller gets.

use crate::codec::{encode_buffer, encode_wide_string};
use crate::error::{RegistryError, Result};
use crate::native::{NativeResult, RegistryApi, Status, ValueInfo};
use crate::value::RegValue;
use tracing::debug;

/// Reads a value with a size query followed by a fill call.
///
/// `call` is invoked with `None` for the size query and with the allocated
/// buffer for the fill. `ERROR_FILE_NOT_FOUND` from either call yields
/// `Ok(None)`. The result is trimmed to the size the fill call reported,
/// which can be smaller than the size query's estimate.
pub fn read_value<F>(api: &dyn RegistryApi, syscall: &'static str, mut call: F) -> Result<Option<RegValue>>
where
    F: FnMut(Option<&mut [u8]>) -> NativeResult<ValueInfo>,
{
    let estimate = match call(None) {
        Ok(info) => info,
        Err(Status::FILE_NOT_FOUND) => return Ok(None),
        Err(status) => return Err(RegistryError::win32(api, status, syscall)),
    };
    debug!(syscall, size = estimate.size, value_type = estimate.value_type, "Value size reported");

    let mut buffer = vec![0u8; estimate.size as usize];
    let filled = match call(Some(&mut buffer)) {
        Ok(info) => info,
        Err(Status::FILE_NOT_FOUND) => {
            debug!(syscall, "Value disappeared between size query and read");
            return Ok(None);
        }
        Err(status) => return Err(RegistryError::win32(api, status, syscall)),
    };

    if filled.size < estimate.size {
        debug!(syscall, estimate = estimate.size, written = filled.size, "Trimming value to written size");
    }
    Ok(Some(encode_buffer(buffer, filled.size, filled.value_type)))
}

/// Enumerates names by index until the OS reports no more items.
///
/// `max_len` is the longest name in UTF-16 units (terminator excluded), as
/// reported once before the loop; one buffer of `max_len + 1` units is
/// reused for every item. Any per-item failure other than
/// `ERROR_NO_MORE_ITEMS` aborts the enumeration.
pub fn enumerate_names<F>(api: &dyn RegistryApi, syscall: &'static str, max_len: u32, mut call: F) -> Result<Vec<String>>
where
    F: FnMut(u32, &mut [u16]) -> NativeResult<usize>,
{
    let mut buffer = vec![0u16; max_len as usize + 1];
    let mut names = Vec::new();

    for index in 0u32.. {
        match call(index, &mut buffer) {
            Ok(len) => names.push(encode_wide_string(&buffer[..len.min(buffer.len())])),
            Err(Status::NO_MORE_ITEMS) => break,
            Err(status) => return Err(RegistryError::win32(api, status, syscall)),
        }
    }

    debug!(syscall, count = names.len(), "Enumeration complete");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegistry;

    #[test]
    fn test_size_query_failure_skips_fill() {
        let api = MemoryRegistry::new();
        let mut calls = 0;
        let err = read_value(&api, "RegQueryValueExW", |data| {
            calls += 1;
            assert!(data.is_none());
            Err(Status::ACCESS_DENIED)
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err.errno(), Some(5));
        assert_eq!(err.syscall(), Some("RegQueryValueExW"));
    }

    #[test]
    fn test_not_found_on_either_call() {
        let api = MemoryRegistry::new();
        let result = read_value(&api, "RegQueryValueExW", |_| Err(Status::FILE_NOT_FOUND)).unwrap();
        assert!(result.is_none());

        let result = read_value(&api, "RegGetValueW", |data| match data {
            None => Ok(ValueInfo { value_type: 1, size: 8 }),
            Some(_) => Err(Status::FILE_NOT_FOUND),
        })
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_fill_failure_is_raised() {
        let api = MemoryRegistry::new();
        let err = read_value(&api, "RegGetValueW", |data| match data {
            None => Ok(ValueInfo { value_type: 3, size: 2 }),
            Some(_) => Err(Status::MORE_DATA),
        })
        .unwrap_err();
        assert_eq!(err.errno(), Some(234));
    }

    #[test]
    fn test_overshooting_estimate_is_trimmed() {
        let api = MemoryRegistry::new();
        let value = read_value(&api, "RegGetValueW", |data| match data {
            None => Ok(ValueInfo { value_type: 1, size: 6 }),
            Some(buf) => {
                buf[..4].copy_from_slice(&[b'h', 0, 0, 0]);
                Ok(ValueInfo { value_type: 1, size: 4 })
            }
        })
        .unwrap()
        .unwrap();
        assert_eq!(value.data(), &[b'h', 0, 0, 0]);
    }

    #[test]
    fn test_enumeration_stops_at_no_more_items() {
        let api = MemoryRegistry::new();
        let names = ["alpha", "b", "gamma"];
        let mut sizes = Vec::new();
        let result = enumerate_names(&api, "RegEnumKeyExW", 5, |index, buf| {
            sizes.push(buf.len());
            let Some(name) = names.get(index as usize) else {
                return Err(Status::NO_MORE_ITEMS);
            };
            let units: Vec<u16> = name.encode_utf16().collect();
            buf[..units.len()].copy_from_slice(&units);
            buf[units.len()] = 0;
            Ok(units.len())
        })
        .unwrap();
        assert_eq!(result, vec!["alpha", "b", "gamma"]);
        assert_eq!(sizes, vec![6, 6, 6, 6]);
    }

    #[test]
    fn test_enumeration_aborts_on_error() {
        let api = MemoryRegistry::new();
        let err = enumerate_names(&api, "RegEnumValueW", 4, |index, _| {
            if index == 0 {
                Ok(0)
            } else {
                Err(Status::KEY_DELETED)
            }
        })
        .unwrap_err();
        assert_eq!(err.errno(), Some(1018));
        assert_eq!(err.syscall(), Some("RegEnumValueW"));
    }

    #[test]
    fn test_empty_enumeration() {
        let api = MemoryRegistry::new();
        let names = enumerate_names(&api, "RegEnumKeyExW", 0, |_, _| Err(Status::NO_MORE_ITEMS)).unwrap();
        assert!(names.is_empty());
    }
}
