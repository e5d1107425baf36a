//! The native registry call contract.
//!
//! Everything above this module talks to the registry through
//! [`RegistryApi`], a one-to-one rendition of the Win32 registry functions
//! the binding uses. Implementations report the raw Win32 status code on
//! failure and leave all interpretation (sentinels, translation, buffer
//! sizing) to the layers above.

use crate::codec::WideCString;

#[cfg(windows)]
pub mod windows;

/// Result of a native call: the success value or the raw Win32 status code.
pub type NativeResult<T> = std::result::Result<T, Status>;

/// A native key handle value.
///
/// Pointer-sized, as the OS defines `HKEY`. The value `0` never names an
/// open key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHkey(pub usize);

impl RawHkey {
    /// The null handle.
    pub const NULL: RawHkey = RawHkey(0);

    /// Widens a 32-bit handle encoding to the native pointer width.
    ///
    /// Predefined keys (`0x8000_0000` and up) are sign-extended, which is how
    /// `winreg.h` defines them on 64-bit targets.
    pub fn from_u32(value: u32) -> Self {
        if value & 0x8000_0000 != 0 {
            RawHkey(value as i32 as isize as usize)
        } else {
            RawHkey(value as usize)
        }
    }

    /// Narrows the handle back to its 32-bit boundary encoding.
    ///
    /// Returns `None` when the value does not fit (never the case for handles
    /// the OS hands out to user mode, but checked all the same).
    pub fn to_u32(self) -> Option<u32> {
        let signed = self.0 as isize;
        if let Ok(v) = u32::try_from(self.0) {
            return Some(v);
        }
        i32::try_from(signed).ok().map(|v| v as u32)
    }

    /// Returns true for the null handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A raw Win32 status code returned by a failed native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub u32);

impl Status {
    /// `ERROR_FILE_NOT_FOUND`
    pub const FILE_NOT_FOUND: Status = Status(2);
    /// `ERROR_ACCESS_DENIED`
    pub const ACCESS_DENIED: Status = Status(5);
    /// `ERROR_INVALID_HANDLE`
    pub const INVALID_HANDLE: Status = Status(6);
    /// `ERROR_INVALID_PARAMETER`
    pub const INVALID_PARAMETER: Status = Status(87);
    /// `ERROR_ALREADY_EXISTS`
    pub const ALREADY_EXISTS: Status = Status(183);
    /// `ERROR_MORE_DATA`
    pub const MORE_DATA: Status = Status(234);
    /// `ERROR_NO_MORE_ITEMS`
    pub const NO_MORE_ITEMS: Status = Status(259);
    /// `ERROR_KEY_DELETED`
    pub const KEY_DELETED: Status = Status(1018);
    /// `ERROR_UNSUPPORTED_TYPE`
    pub const UNSUPPORTED_TYPE: Status = Status(1630);

    /// The numeric code.
    pub fn code(self) -> u32 {
        self.0
    }
}

/// Names of the native calls, attached to errors as `syscall`.
pub mod syscall {
    /// `RegOpenKeyExW`
    pub const OPEN_KEY: &str = "RegOpenKeyExW";
    /// `RegCreateKeyExW`
    pub const CREATE_KEY: &str = "RegCreateKeyExW";
    /// `RegOpenCurrentUser`
    pub const OPEN_CURRENT_USER: &str = "RegOpenCurrentUser";
    /// `RegLoadAppKeyW`
    pub const LOAD_APP_KEY: &str = "RegLoadAppKeyW";
    /// `RegQueryInfoKeyW`
    pub const QUERY_INFO_KEY: &str = "RegQueryInfoKeyW";
    /// `RegEnumKeyExW`
    pub const ENUM_KEY: &str = "RegEnumKeyExW";
    /// `RegEnumValueW`
    pub const ENUM_VALUE: &str = "RegEnumValueW";
    /// `RegQueryValueExW`
    pub const QUERY_VALUE: &str = "RegQueryValueExW";
    /// `RegGetValueW`
    pub const GET_VALUE: &str = "RegGetValueW";
    /// `RegSetValueExW`
    pub const SET_VALUE: &str = "RegSetValueExW";
    /// `RegRenameKey`
    pub const RENAME_KEY: &str = "RegRenameKey";
    /// `RegCopyTreeW`
    pub const COPY_TREE: &str = "RegCopyTreeW";
    /// `RegDeleteTreeW`
    pub const DELETE_TREE: &str = "RegDeleteTreeW";
    /// `RegDeleteKeyW`
    pub const DELETE_KEY: &str = "RegDeleteKeyW";
    /// `RegDeleteKeyValueW`
    pub const DELETE_KEY_VALUE: &str = "RegDeleteKeyValueW";
    /// `RegDeleteValueW`
    pub const DELETE_VALUE: &str = "RegDeleteValueW";
    /// `RegCloseKey`
    pub const CLOSE_KEY: &str = "RegCloseKey";
}

/// Subset of `RegQueryInfoKeyW` output used for enumeration sizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyInfo {
    /// Number of subkeys.
    pub subkey_count: u32,
    /// Longest subkey name, in UTF-16 units, excluding the terminator.
    pub max_subkey_len: u32,
    /// Number of values.
    pub value_count: u32,
    /// Longest value name, in UTF-16 units, excluding the terminator.
    pub max_value_name_len: u32,
    /// Longest value data, in bytes.
    pub max_value_len: u32,
}

/// Type tag and byte size reported by a value query.
///
/// For a size query (no buffer) `size` is the required capacity; for a fill
/// call it is the number of bytes written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueInfo {
    /// Native `REG_*` type.
    pub value_type: u32,
    /// Size in bytes.
    pub size: u32,
}

/// The native registry functions.
///
/// Optional subkey parameters map to a null pointer when `None`, which the
/// OS documents as "operate on `key` itself".
pub trait RegistryApi: Send + Sync {
    /// `RegOpenKeyExW`
    fn open_key(&self, parent: RawHkey, sub_key: &WideCString, options: u32, access: u32) -> NativeResult<RawHkey>;

    /// `RegCreateKeyExW`
    fn create_key(&self, parent: RawHkey, sub_key: &WideCString, options: u32, access: u32) -> NativeResult<RawHkey>;

    /// `RegOpenCurrentUser`
    fn open_current_user(&self, access: u32) -> NativeResult<RawHkey>;

    /// `RegLoadAppKeyW`
    fn load_app_key(&self, file: &WideCString, access: u32) -> NativeResult<RawHkey>;

    /// `RegQueryInfoKeyW`
    fn query_info_key(&self, key: RawHkey) -> NativeResult<KeyInfo>;

    /// `RegEnumKeyExW`: writes the NUL-terminated name of subkey `index`
    /// into `name` and returns its length without the terminator.
    fn enum_key(&self, key: RawHkey, index: u32, name: &mut [u16]) -> NativeResult<usize>;

    /// `RegEnumValueW`, name only. Same contract as [`enum_key`](Self::enum_key).
    fn enum_value(&self, key: RawHkey, index: u32, name: &mut [u16]) -> NativeResult<usize>;

    /// `RegQueryValueExW`. With `data == None` this is the size query.
    fn query_value(&self, key: RawHkey, name: &WideCString, data: Option<&mut [u8]>) -> NativeResult<ValueInfo>;

    /// `RegGetValueW`. With `data == None` this is the size query.
    fn get_value(
        &self,
        key: RawHkey,
        sub_key: &WideCString,
        name: &WideCString,
        flags: u32,
        data: Option<&mut [u8]>,
    ) -> NativeResult<ValueInfo>;

    /// `RegSetValueExW`
    fn set_value(&self, key: RawHkey, name: &WideCString, value_type: u32, data: &[u8]) -> NativeResult<()>;

    /// `RegRenameKey`
    fn rename_key(&self, key: RawHkey, sub_key: Option<&WideCString>, new_name: &WideCString) -> NativeResult<()>;

    /// `RegCopyTreeW`
    fn copy_tree(&self, source: RawHkey, sub_key: Option<&WideCString>, dest: RawHkey) -> NativeResult<()>;

    /// `RegDeleteTreeW`
    fn delete_tree(&self, key: RawHkey, sub_key: Option<&WideCString>) -> NativeResult<()>;

    /// `RegDeleteKeyW`
    fn delete_key(&self, key: RawHkey, sub_key: &WideCString) -> NativeResult<()>;

    /// `RegDeleteKeyValueW`
    fn delete_key_value(&self, key: RawHkey, sub_key: &WideCString, name: &WideCString) -> NativeResult<()>;

    /// `RegDeleteValueW`
    fn delete_value(&self, key: RawHkey, name: &WideCString) -> NativeResult<()>;

    /// `RegCloseKey`
    fn close_key(&self, key: RawHkey) -> NativeResult<()>;

    /// Looks up the system message for `code` in the neutral language.
    ///
    /// Returns the text as the message table stores it (including any
    /// trailing line break), or `None` if there is no entry.
    fn format_message(&self, code: u32) -> Option<String>;
}
