//! Numeric constants from `winreg.h` and `winnt.h`.

/// Predefined root keys, in their 32-bit boundary encoding.
#[derive(Debug, Clone, Copy)]
pub struct Hkey;

impl Hkey {
    /// `HKEY_CLASSES_ROOT`
    pub const CLASSES_ROOT: u32 = 0x8000_0000;
    /// `HKEY_CURRENT_USER`
    pub const CURRENT_USER: u32 = 0x8000_0001;
    /// `HKEY_LOCAL_MACHINE`
    pub const LOCAL_MACHINE: u32 = 0x8000_0002;
    /// `HKEY_USERS`
    pub const USERS: u32 = 0x8000_0003;
    /// `HKEY_PERFORMANCE_DATA`
    pub const PERFORMANCE_DATA: u32 = 0x8000_0004;
    /// `HKEY_CURRENT_CONFIG`
    pub const CURRENT_CONFIG: u32 = 0x8000_0005;
    /// `HKEY_DYN_DATA`
    pub const DYN_DATA: u32 = 0x8000_0006;
    /// `HKEY_CURRENT_USER_LOCAL_SETTINGS`
    pub const CURRENT_USER_LOCAL_SETTINGS: u32 = 0x8000_0007;
    /// `HKEY_PERFORMANCE_TEXT`
    pub const PERFORMANCE_TEXT: u32 = 0x8000_0050;
    /// `HKEY_PERFORMANCE_NLSTEXT`
    pub const PERFORMANCE_NLSTEXT: u32 = 0x8000_0060;

    /// All predefined keys with their `HKEY_*` names.
    pub const ALL: [(&'static str, u32); 10] = [
        ("HKEY_CLASSES_ROOT", Self::CLASSES_ROOT),
        ("HKEY_CURRENT_USER", Self::CURRENT_USER),
        ("HKEY_LOCAL_MACHINE", Self::LOCAL_MACHINE),
        ("HKEY_USERS", Self::USERS),
        ("HKEY_PERFORMANCE_DATA", Self::PERFORMANCE_DATA),
        ("HKEY_CURRENT_CONFIG", Self::CURRENT_CONFIG),
        ("HKEY_DYN_DATA", Self::DYN_DATA),
        ("HKEY_CURRENT_USER_LOCAL_SETTINGS", Self::CURRENT_USER_LOCAL_SETTINGS),
        ("HKEY_PERFORMANCE_TEXT", Self::PERFORMANCE_TEXT),
        ("HKEY_PERFORMANCE_NLSTEXT", Self::PERFORMANCE_NLSTEXT),
    ];

    /// Returns true if `value` is one of the predefined keys.
    pub fn is_predefined(value: u32) -> bool {
        Self::ALL.iter().any(|&(_, v)| v == value)
    }
}

/// `HKEY_CLASSES_ROOT`
pub const HKCR: u32 = Hkey::CLASSES_ROOT;
/// `HKEY_CURRENT_USER`
pub const HKCU: u32 = Hkey::CURRENT_USER;
/// `HKEY_LOCAL_MACHINE`
pub const HKLM: u32 = Hkey::LOCAL_MACHINE;
/// `HKEY_USERS`
pub const HKU: u32 = Hkey::USERS;

/// Registry key access rights (`REGSAM`).
#[derive(Debug, Clone, Copy)]
pub struct Access;

impl Access {
    /// `KEY_QUERY_VALUE`: read values.
    pub const QUERY_VALUE: u32 = 0x0001;
    /// `KEY_SET_VALUE`: create, change and delete values.
    pub const SET_VALUE: u32 = 0x0002;
    /// `KEY_CREATE_SUB_KEY`: create subkeys.
    pub const CREATE_SUB_KEY: u32 = 0x0004;
    /// `KEY_ENUMERATE_SUB_KEYS`: list subkeys.
    pub const ENUMERATE_SUB_KEYS: u32 = 0x0008;
    /// `KEY_NOTIFY`: change notifications.
    pub const NOTIFY: u32 = 0x0010;
    /// `KEY_CREATE_LINK`: reserved for system use.
    pub const CREATE_LINK: u32 = 0x0020;

    /// `KEY_WOW64_64KEY`: use the 64-bit view.
    pub const WOW64_64KEY: u32 = 0x0100;
    /// `KEY_WOW64_32KEY`: use the 32-bit view.
    pub const WOW64_32KEY: u32 = 0x0200;

    /// `DELETE`: delete the key.
    pub const DELETE: u32 = 0x0001_0000;

    /// `KEY_READ`
    pub const READ: u32 = 0x0002_0019;
    /// `KEY_WRITE`
    pub const WRITE: u32 = 0x0002_0006;
    /// `KEY_EXECUTE`, identical to `KEY_READ`.
    pub const EXECUTE: u32 = Self::READ;
    /// `KEY_ALL_ACCESS`
    pub const ALL_ACCESS: u32 = 0x000F_003F;

    /// Returns true if `granted` includes every bit of `required`.
    pub fn allows(granted: u32, required: u32) -> bool {
        granted & required == required
    }
}

/// Options for `create_key`.
#[derive(Debug, Clone, Copy)]
pub struct CreateKeyOptions;

impl CreateKeyOptions {
    /// `REG_OPTION_NON_VOLATILE`: the key survives a restart.
    pub const NON_VOLATILE: u32 = 0;
    /// `REG_OPTION_VOLATILE`: the key lives in memory only.
    pub const VOLATILE: u32 = 1;
    /// `REG_OPTION_CREATE_LINK`: the key is a symbolic link.
    pub const CREATE_LINK: u32 = 2;
    /// `REG_OPTION_BACKUP_RESTORE`
    pub const BACKUP_RESTORE: u32 = 4;
}

/// Options for `open_key`.
#[derive(Debug, Clone, Copy)]
pub struct OpenKeyOptions;

impl OpenKeyOptions {
    /// `REG_OPTION_OPEN_LINK`: open the symbolic link itself.
    pub const OPEN_LINK: u32 = 8;
}

/// `RegGetValueW` flags (`RRF_*`).
#[derive(Debug, Clone, Copy)]
pub struct GetValueFlags(pub u32);

impl GetValueFlags {
    /// `RRF_RT_ANY`: no type restriction.
    pub const RT_ANY: u32 = 0xffff;
    /// `RRF_RT_REG_NONE`
    pub const RT_REG_NONE: u32 = 0x0001;
    /// `RRF_RT_REG_SZ`
    pub const RT_REG_SZ: u32 = 0x0002;
    /// `RRF_RT_REG_EXPAND_SZ`
    pub const RT_REG_EXPAND_SZ: u32 = 0x0004;
    /// `RRF_RT_REG_BINARY`
    pub const RT_REG_BINARY: u32 = 0x0008;
    /// `RRF_RT_REG_DWORD`
    pub const RT_REG_DWORD: u32 = 0x0010;
    /// `RRF_RT_REG_MULTI_SZ`
    pub const RT_REG_MULTI_SZ: u32 = 0x0020;
    /// `RRF_RT_REG_QWORD`
    pub const RT_REG_QWORD: u32 = 0x0040;
    /// `RRF_RT_DWORD`: 32-bit values, binary included.
    pub const RT_DWORD: u32 = Self::RT_REG_DWORD | Self::RT_REG_BINARY;
    /// `RRF_RT_QWORD`: 64-bit values, binary included.
    pub const RT_QWORD: u32 = Self::RT_REG_QWORD | Self::RT_REG_BINARY;

    /// `RRF_NOEXPAND`: return `REG_EXPAND_SZ` data unexpanded.
    pub const NO_EXPAND: u32 = 0x1000_0000;
    /// `RRF_SUBKEY_WOW6464KEY`
    pub const SUBKEY_WOW6464KEY: u32 = 0x0001_0000;
    /// `RRF_SUBKEY_WOW6432KEY`
    pub const SUBKEY_WOW6432KEY: u32 = 0x0002_0000;

    /// Wraps raw flags.
    pub fn new(flags: u32) -> Self {
        Self(flags)
    }

    /// Returns true if the specified flag is set.
    pub fn has_flag(&self, flag: u32) -> bool {
        (self.0 & flag) != 0
    }

    /// Returns the flags with `RT_ANY` added when no type restriction is set.
    ///
    /// `RegGetValueW` rejects calls without any `RRF_RT_*` bit.
    pub fn normalized(self) -> Self {
        if self.0 & Self::RT_ANY == 0 {
            Self(self.0 | Self::RT_ANY)
        } else {
            self
        }
    }

    /// The `RRF_RT_*` bit that admits values of native type `value_type`.
    pub fn type_bit(value_type: u32) -> Option<u32> {
        match value_type {
            0 => Some(Self::RT_REG_NONE),
            1 => Some(Self::RT_REG_SZ),
            2 => Some(Self::RT_REG_EXPAND_SZ),
            3 => Some(Self::RT_REG_BINARY),
            4 => Some(Self::RT_REG_DWORD),
            7 => Some(Self::RT_REG_MULTI_SZ),
            11 => Some(Self::RT_REG_QWORD),
            _ => None,
        }
    }
}
