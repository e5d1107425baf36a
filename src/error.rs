//! Error types for registry operations.
//!
//! Native failures are turned into [`Win32Error`] by [`Win32Error::translate`],
//! the only constructor. Everything that can go wrong before a native call
//! is issued (closed handles, malformed boundary values) has its own variant
//! on [`RegistryError`].

use crate::native::{RegistryApi, Status};
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Message used when the system message table has no entry for a code.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown Error";

/// A failed native registry call.
///
/// Carries the numeric status code, the system message for it and the name
/// of the native function that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{syscall}: {message} (error {errno})")]
pub struct Win32Error {
    message: String,
    errno: u32,
    syscall: &'static str,
}

impl Win32Error {
    /// Translates a native status code into a structured error.
    ///
    /// The message is looked up through [`RegistryApi::format_message`];
    /// trailing CR/LF is stripped and a missing or empty entry becomes
    /// [`UNKNOWN_ERROR_MESSAGE`].
    pub fn translate(api: &dyn RegistryApi, status: Status, syscall: &'static str) -> Self {
        let message = api
            .format_message(status.code())
            .map(|m| m.trim_end_matches(&['\r', '\n'][..]).to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());

        Self {
            message,
            errno: status.code(),
            syscall,
        }
    }

    /// Human-readable system message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The native status code.
    pub fn errno(&self) -> u32 {
        self.errno
    }

    /// Name of the native function that failed.
    pub fn syscall(&self) -> &'static str {
        self.syscall
    }

    /// Returns true if this error carries `status`.
    pub fn is(&self, status: Status) -> bool {
        self.errno == status.code()
    }
}

/// Errors that can occur during registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A native registry call failed.
    #[error(transparent)]
    Win32(#[from] Win32Error),

    /// The key wrapper has already been closed.
    #[error("HKEY already closed")]
    InvalidHandle,

    /// A numeric handle encoding outside `1..=u32::MAX`.
    #[error("Invalid handle value: {0}")]
    InvalidHandleValue(i128),

    /// A boundary string contains a NUL before its end.
    #[error("String contains an interior NUL at UTF-16 index {position}")]
    InteriorNul {
        /// Index of the first NUL, in UTF-16 units.
        position: usize,
    },

    /// Value data is not valid UTF-16.
    #[error("Invalid UTF-16 string data")]
    InvalidUtf16,

    /// Value data of a type the formatting helpers do not handle.
    #[error("Unhandled registry value type: {0}")]
    UnsupportedValueType(String),

    /// Value data shorter than its type requires.
    #[error("Truncated value data: expected {expected} bytes, got {actual} bytes")]
    TruncatedData {
        /// Bytes the type requires.
        expected: usize,
        /// Bytes present.
        actual: usize,
    },
}

impl RegistryError {
    /// Translates a native status into [`RegistryError::Win32`].
    pub fn win32(api: &dyn RegistryApi, status: Status, syscall: &'static str) -> Self {
        Self::Win32(Win32Error::translate(api, status, syscall))
    }

    /// Returns the native status code if this is a native failure.
    pub fn errno(&self) -> Option<u32> {
        match self {
            Self::Win32(err) => Some(err.errno()),
            _ => None,
        }
    }

    /// Returns the failing native function if this is a native failure.
    pub fn syscall(&self) -> Option<&'static str> {
        match self {
            Self::Win32(err) => Some(err.syscall()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegistry;

    #[test]
    fn test_translate_strips_line_breaks() {
        let api = MemoryRegistry::new();
        let err = Win32Error::translate(&api, Status::ACCESS_DENIED, "RegOpenKeyExW");
        assert_eq!(err.message(), "Access is denied.");
        assert_eq!(err.errno(), 5);
        assert_eq!(err.syscall(), "RegOpenKeyExW");
    }

    #[test]
    fn test_translate_unknown_code() {
        let api = MemoryRegistry::new();
        let err = Win32Error::translate(&api, Status(0xDEAD), "RegSetValueExW");
        assert_eq!(err.message(), UNKNOWN_ERROR_MESSAGE);
        assert_eq!(err.errno(), 0xDEAD);
    }

    #[test]
    fn test_win32_error_display() {
        let api = MemoryRegistry::new();
        let err = Win32Error::translate(&api, Status::ACCESS_DENIED, "RegSetValueExW");
        assert_eq!(err.to_string(), "RegSetValueExW: Access is denied. (error 5)");

        let wrapped = RegistryError::from(err.clone());
        assert_eq!(wrapped.to_string(), err.to_string());
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }

    #[test]
    fn test_registry_error_accessors() {
        let api = MemoryRegistry::new();
        let err = RegistryError::win32(&api, Status::FILE_NOT_FOUND, "RegDeleteKeyW");
        assert_eq!(err.errno(), Some(2));
        assert_eq!(err.syscall(), Some("RegDeleteKeyW"));
        assert_eq!(RegistryError::InvalidHandle.errno(), None);
        assert_eq!(RegistryError::InvalidHandle.to_string(), "HKEY already closed");
    }
}
