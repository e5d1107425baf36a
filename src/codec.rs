//! Conversion of boundary values to and from native types.
//!
//! Strings cross into the native layer as explicitly NUL-terminated UTF-16
//! ([`WideCString`]); handles arrive in one of three encodings
//! ([`HandleArg`]) and leave as a [`KeyRef`] that is safe to hand to a native
//! call for as long as it lives.

use crate::error::{RegistryError, Result};
use crate::handle::{KeyRef, RegKey};
use crate::native::RawHkey;
use crate::value::{RegValue, ValueType};

/// A NUL-terminated UTF-16 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideCString {
    units: Vec<u16>,
}

impl WideCString {
    /// Encodes `s` as UTF-16 and appends the terminator.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InteriorNul`] if `s` contains a NUL, which
    /// the OS would otherwise treat as the end of the string.
    pub fn from_str(s: &str) -> Result<Self> {
        Self::from_units(s.encode_utf16().collect())
    }

    /// Wraps UTF-16 units (without terminator), appending the terminator.
    pub fn from_units(mut units: Vec<u16>) -> Result<Self> {
        if let Some(position) = units.iter().position(|&u| u == 0) {
            return Err(RegistryError::InteriorNul { position });
        }
        units.push(0);
        Ok(Self { units })
    }

    /// The empty string (a lone terminator).
    pub fn empty() -> Self {
        Self { units: vec![0] }
    }

    /// Pointer to the first unit, valid while `self` is alive.
    pub fn as_ptr(&self) -> *const u16 {
        self.units.as_ptr()
    }

    /// Units without the terminator.
    pub fn as_units(&self) -> &[u16] {
        &self.units[..self.units.len() - 1]
    }

    /// Units including the terminator.
    pub fn as_units_with_nul(&self) -> &[u16] {
        &self.units
    }

    /// Length in UTF-16 units, excluding the terminator.
    pub fn len(&self) -> usize {
        self.units.len() - 1
    }

    /// Returns true for the empty string.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` for the empty string, `Some(self)` otherwise.
    ///
    /// Used for parameters where the OS reads a null pointer as "the key
    /// itself".
    pub fn non_empty(&self) -> Option<&Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    /// Decodes back to a Rust string, replacing unpaired surrogates.
    pub fn to_string_lossy(&self) -> String {
        encode_wide_string(self.as_units())
    }
}

/// Decodes a boundary string into a NUL-terminated wide string.
///
/// A missing string (`None`) is the empty string, which the registry
/// functions read as the default value or the key itself.
pub fn decode_wide_string(value: Option<&str>) -> Result<WideCString> {
    match value {
        Some(s) => WideCString::from_str(s),
        None => Ok(WideCString::empty()),
    }
}

/// Encodes a UTF-16 name returned by the OS as a host string.
///
/// Registry names may contain unpaired surrogates; those become U+FFFD
/// rather than failing the whole enumeration.
pub fn encode_wide_string(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// Builds the value returned to the caller from a filled buffer.
///
/// `written` is the byte count the fill call reported. When it is below the
/// buffer's capacity the buffer is cut down to exactly the written bytes.
pub fn encode_buffer(mut buffer: Vec<u8>, written: u32, value_type: u32) -> RegValue {
    let written = written as usize;
    if written < buffer.len() {
        buffer.truncate(written);
        buffer.shrink_to_fit();
    }
    RegValue::new(ValueType::from_u32(value_type), buffer)
}

/// Validates a numeric handle encoding from the boundary.
///
/// Accepted: `1..=u32::MAX`. Zero, negative and wider values are rejected
/// so they never reach a native call.
pub fn decode_raw_handle(value: i128) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) if v != 0 => Ok(v),
        _ => Err(RegistryError::InvalidHandleValue(value)),
    }
}

/// A key handle as passed across the boundary.
#[derive(Debug, Clone, Copy)]
pub enum HandleArg<'a> {
    /// Legacy 32-bit numeric encoding. Lifetime is the caller's problem.
    Raw(u32),
    /// Opaque pointer-sized value (e.g. a capsule). Also unmanaged.
    External(RawHkey),
    /// A wrapper whose lifetime this crate manages.
    Wrapped(&'a RegKey),
}

impl<'a> From<&'a RegKey> for HandleArg<'a> {
    fn from(key: &'a RegKey) -> Self {
        HandleArg::Wrapped(key)
    }
}

impl From<u32> for HandleArg<'_> {
    fn from(value: u32) -> Self {
        HandleArg::Raw(value)
    }
}

impl From<RawHkey> for HandleArg<'_> {
    fn from(value: RawHkey) -> Self {
        HandleArg::External(value)
    }
}

/// Resolves a boundary handle to a native one.
///
/// # Errors
///
/// - [`RegistryError::InvalidHandle`] for a closed wrapper.
/// - [`RegistryError::InvalidHandleValue`] for a zero numeric encoding or a
///   null external value.
pub fn decode_handle(arg: HandleArg<'_>) -> Result<KeyRef<'_>> {
    match arg {
        HandleArg::Raw(value) => {
            let value = decode_raw_handle(i128::from(value))?;
            Ok(KeyRef::unmanaged(RawHkey::from_u32(value)))
        }
        HandleArg::External(raw) => {
            if raw.is_null() {
                return Err(RegistryError::InvalidHandleValue(0));
            }
            Ok(KeyRef::unmanaged(raw))
        }
        HandleArg::Wrapped(key) => key.borrow_key(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wide_string_is_terminated() {
        let s = WideCString::from_str("Environment").unwrap();
        assert_eq!(s.len(), 11);
        assert_eq!(*s.as_units_with_nul().last().unwrap(), 0);
        assert_eq!(s.to_string_lossy(), "Environment");
    }

    #[test]
    fn test_wide_string_rejects_interior_nul() {
        let err = WideCString::from_str("Soft\0ware").unwrap_err();
        assert!(matches!(err, RegistryError::InteriorNul { position: 4 }));
    }

    #[test]
    fn test_missing_string_is_empty() {
        let s = decode_wide_string(None).unwrap();
        assert!(s.is_empty());
        assert!(s.non_empty().is_none());
        assert_eq!(s.as_units_with_nul(), &[0]);
    }

    #[test]
    fn test_raw_handle_range() {
        assert_eq!(decode_raw_handle(1).unwrap(), 1);
        assert_eq!(decode_raw_handle(0x8000_0001).unwrap(), 0x8000_0001);
        assert_eq!(decode_raw_handle(u32::MAX as i128).unwrap(), u32::MAX);
        assert!(decode_raw_handle(0).is_err());
        assert!(decode_raw_handle(-1).is_err());
        assert!(decode_raw_handle(u32::MAX as i128 + 1).is_err());
    }

    #[test]
    fn test_decode_raw_and_external() {
        let key = decode_handle(HandleArg::Raw(0x8000_0001)).unwrap();
        assert_eq!(key.raw(), RawHkey::from_u32(0x8000_0001));

        let key = decode_handle(HandleArg::External(RawHkey(0x1a4))).unwrap();
        assert_eq!(key.raw(), RawHkey(0x1a4));

        assert!(decode_handle(HandleArg::Raw(0)).is_err());
        assert!(decode_handle(HandleArg::External(RawHkey::NULL)).is_err());
    }

    #[test]
    fn test_encode_buffer_trims_to_written() {
        let value = encode_buffer(vec![b'a', 0, 0, 0], 2, 1);
        assert_eq!(value.data(), &[b'a', 0]);
        assert_eq!(value.value_type(), ValueType::String);

        let value = encode_buffer(vec![1, 2, 3, 4], 4, 4);
        assert_eq!(value.data(), &[1, 2, 3, 4]);
    }

    proptest! {
        #[test]
        fn prop_wide_string_preserves_text(s in "[^\u{0}]*") {
            let wide = WideCString::from_str(&s).unwrap();
            prop_assert_eq!(wide.as_units_with_nul().last(), Some(&0));
            prop_assert_eq!(wide.len(), s.encode_utf16().count());
            prop_assert_eq!(wide.to_string_lossy(), s);
        }

        #[test]
        fn prop_raw_handles_accept_exactly_u32(v in any::<i64>()) {
            let accepted = decode_raw_handle(v as i128).is_ok();
            prop_assert_eq!(accepted, v > 0 && v <= u32::MAX as i64);
        }
    }
}
