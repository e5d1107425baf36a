//! # Windows Registry Bindings
//!
//! Registry access for managed hosts (Python via PyO3, or plain Rust) with
//! strict rules at the boundary between the host and the native API.
//!
//! ## Features
//!
//! - **Exactly-once handle release**: a [`RegKey`] is closed once, whether by
//!   [`RegKey::close`] or by `Drop`, and is never used after that
//! - **Sized-buffer protocol**: values and names are read with a size query
//!   followed by a fill call, trimmed to what the OS actually wrote
//! - **Sentinels, not errors**: "not found" yields `None`/`false` and
//!   "no more items" ends an enumeration
//! - **Structured errors**: every other failure carries the Win32 status code,
//!   its system message and the name of the failing function
//!
//! ## Architecture
//!
//! 1. **Codec** ([`codec`]): boundary strings to NUL-terminated UTF-16, handle
//!    encodings to native handles, filled buffers to [`RegValue`]
//! 2. **Errors** ([`error`]): status translation and the sentinel policy
//! 3. **Protocol** ([`protocol`]): the two-call size/fill pattern and
//!    index-based enumeration
//! 4. **Handles** ([`handle`]): the `Open -> Closed` lifecycle of [`RegKey`]
//! 5. **Operations** ([`Registry`]): one method per registry verb
//! 6. **Native seam** ([`native::RegistryApi`]): implemented by
//!    `native::windows::Win32Registry`
//!
//! The `test-util` feature adds `memory::MemoryRegistry`, a fake of the
//! native calls with Win32 status semantics, for testing code built on this
//! crate off Windows.
//!
//! ## Examples
//!
//! ```
//! use native_reg::{Access, ParsedValue, Registry, HKCU};
//!
//! fn store_answer(registry: &Registry) -> native_reg::Result<()> {
//!     let key = registry.create_key(HKCU, "Software\\example", 0, Access::ALL_ACCESS)?;
//!     registry.set_value_dword(&key, Some("answer"), 42)?;
//!
//!     let value = registry.query_value_parsed(&key, Some("answer"))?;
//!     assert_eq!(value, Some(ParsedValue::Dword(42)));
//!
//!     // Missing items are not errors.
//!     assert!(registry.query_value(&key, Some("missing"))?.is_none());
//!     assert!(!registry.delete_value(&key, Some("missing"))?);
//!
//!     key.close()?;
//!     assert!(registry.enum_value_names(&key).is_err());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod flags;
pub mod handle;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod native;
pub mod protocol;
pub mod registry;
pub mod value;

// Python bindings (only compiled when python feature is enabled)
#[cfg(feature = "python")]
pub mod python;

// Re-export main types for convenience
pub use codec::{HandleArg, WideCString};
pub use error::{RegistryError, Result, Win32Error};
pub use flags::{Access, CreateKeyOptions, GetValueFlags, Hkey, OpenKeyOptions, HKCR, HKCU, HKLM, HKU};
pub use handle::{HandleFactory, KeyRef, RegKey};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryRegistry;
pub use native::{RawHkey, RegistryApi, Status};
pub use registry::Registry;
pub use value::{
    format_dword, format_multi_string, format_qword, format_string, parse_multi_string, parse_string, parse_value,
    ParsedValue, RegValue, ValueType,
};

#[cfg(windows)]
pub use native::windows::Win32Registry;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
