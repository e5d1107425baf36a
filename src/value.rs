//! Registry value data: the raw result of a query and typed views of it.

use crate::error::{RegistryError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use encoding_rs::UTF_16LE;
use std::fmt;

/// Registry value data types (`REG_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    /// No value type.
    None,

    /// String (null-terminated).
    String,

    /// String with environment variables.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit little-endian integer.
    Dword,

    /// 32-bit big-endian integer.
    DwordBigEndian,

    /// Symbolic link (Unicode).
    Link,

    /// Multiple strings.
    MultiString,

    /// Resource list.
    ResourceList,

    /// Full resource descriptor.
    FullResourceDescriptor,

    /// Resource requirements list.
    ResourceRequirementsList,

    /// 64-bit little-endian integer.
    Qword,

    /// Any other type tag. The registry stores arbitrary `u32` tags.
    Unknown(u32),
}

impl ValueType {
    /// `REG_NONE`
    pub const REG_NONE: u32 = 0;
    /// `REG_SZ`
    pub const REG_SZ: u32 = 1;
    /// `REG_EXPAND_SZ`
    pub const REG_EXPAND_SZ: u32 = 2;
    /// `REG_BINARY`
    pub const REG_BINARY: u32 = 3;
    /// `REG_DWORD`
    pub const REG_DWORD: u32 = 4;
    /// `REG_DWORD_BIG_ENDIAN`
    pub const REG_DWORD_BIG_ENDIAN: u32 = 5;
    /// `REG_LINK`
    pub const REG_LINK: u32 = 6;
    /// `REG_MULTI_SZ`
    pub const REG_MULTI_SZ: u32 = 7;
    /// `REG_RESOURCE_LIST`
    pub const REG_RESOURCE_LIST: u32 = 8;
    /// `REG_FULL_RESOURCE_DESCRIPTOR`
    pub const REG_FULL_RESOURCE_DESCRIPTOR: u32 = 9;
    /// `REG_RESOURCE_REQUIREMENTS_LIST`
    pub const REG_RESOURCE_REQUIREMENTS_LIST: u32 = 10;
    /// `REG_QWORD`
    pub const REG_QWORD: u32 = 11;

    /// Maps a native type tag.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            _ => ValueType::Unknown(value),
        }
    }

    /// The native type tag.
    pub fn to_u32(self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::Qword => 11,
            ValueType::Unknown(id) => id,
        }
    }

    /// Returns true for the string types the OS NUL-terminates on read.
    pub fn is_string(self) -> bool {
        matches!(
            self,
            ValueType::String | ValueType::ExpandString | ValueType::MultiString
        )
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> String {
        match self {
            ValueType::None => "REG_NONE".to_string(),
            ValueType::String => "REG_SZ".to_string(),
            ValueType::ExpandString => "REG_EXPAND_SZ".to_string(),
            ValueType::Binary => "REG_BINARY".to_string(),
            ValueType::Dword => "REG_DWORD".to_string(),
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN".to_string(),
            ValueType::Link => "REG_LINK".to_string(),
            ValueType::MultiString => "REG_MULTI_SZ".to_string(),
            ValueType::ResourceList => "REG_RESOURCE_LIST".to_string(),
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR".to_string(),
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST".to_string(),
            ValueType::Qword => "REG_QWORD".to_string(),
            ValueType::Unknown(value) => format!("REG_UNKNOWN_{:#010x}", value),
        }
    }
}

impl From<u32> for ValueType {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

/// Bytes of a registry value plus its type tag, exactly as the OS returned
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegValue {
    value_type: ValueType,
    data: Vec<u8>,
}

impl RegValue {
    /// Creates a value.
    pub fn new(value_type: ValueType, data: Vec<u8>) -> Self {
        Self { value_type, data }
    }

    /// The type tag.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// The raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Takes the raw bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Parses the data according to its type. See [`parse_value`].
    pub fn parse(&self) -> Result<ParsedValue> {
        parse_value(self)
    }
}

impl fmt::Display for RegValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.value_type.name(), hex::encode(&self.data))
    }
}

/// Registry data decoded into a native Rust value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParsedValue {
    /// `REG_DWORD` or `REG_DWORD_BIG_ENDIAN`.
    Dword(u32),

    /// `REG_QWORD`.
    Qword(u64),

    /// `REG_SZ` or `REG_EXPAND_SZ`.
    String(String),

    /// `REG_MULTI_SZ`.
    MultiString(Vec<String>),

    /// `REG_BINARY`.
    Binary(Vec<u8>),
}

impl fmt::Display for ParsedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedValue::Dword(d) => write!(f, "{} (0x{:08X})", d, d),
            ParsedValue::Qword(q) => write!(f, "{} (0x{:016X})", q, q),
            ParsedValue::String(s) => f.write_str(s),
            ParsedValue::MultiString(strings) => f.write_str(&strings.join(", ")),
            ParsedValue::Binary(b) => f.write_str(&hex::encode(b)),
        }
    }
}

/// Decodes a value according to its type.
///
/// # Errors
///
/// - [`RegistryError::UnsupportedValueType`] for types other than the
///   string, integer and binary types.
/// - [`RegistryError::TruncatedData`] if an integer value is too short.
/// - [`RegistryError::InvalidUtf16`] for undecodable string data.
pub fn parse_value(value: &RegValue) -> Result<ParsedValue> {
    let data = value.data();
    match value.value_type() {
        ValueType::String | ValueType::ExpandString => parse_string(data).map(ParsedValue::String),
        ValueType::Binary => Ok(ParsedValue::Binary(data.to_vec())),
        ValueType::Dword => {
            check_len(data, 4)?;
            Ok(ParsedValue::Dword(LittleEndian::read_u32(data)))
        }
        ValueType::DwordBigEndian => {
            check_len(data, 4)?;
            Ok(ParsedValue::Dword(BigEndian::read_u32(data)))
        }
        ValueType::Qword => {
            check_len(data, 8)?;
            Ok(ParsedValue::Qword(LittleEndian::read_u64(data)))
        }
        ValueType::MultiString => parse_multi_string(data).map(ParsedValue::MultiString),
        other => Err(RegistryError::UnsupportedValueType(other.name())),
    }
}

fn check_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(RegistryError::TruncatedData {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Drops one trailing UTF-16 NUL if present.
///
/// String data may or may not have been stored with its terminator.
fn trim_utf16_nul(data: &[u8]) -> &[u8] {
    match data {
        [rest @ .., 0, 0] => rest,
        _ => data,
    }
}

fn decode_utf16(data: &[u8]) -> Result<String> {
    if data.len() % 2 != 0 {
        return Err(RegistryError::InvalidUtf16);
    }
    let (decoded, had_errors) = UTF_16LE.decode_without_bom_handling(data);
    if had_errors {
        return Err(RegistryError::InvalidUtf16);
    }
    Ok(decoded.into_owned())
}

/// Decodes `REG_SZ` data, dropping one trailing NUL.
pub fn parse_string(data: &[u8]) -> Result<String> {
    decode_utf16(trim_utf16_nul(data))
}

/// Decodes `REG_MULTI_SZ` data, dropping up to two trailing NULs and
/// splitting on the rest.
pub fn parse_multi_string(data: &[u8]) -> Result<Vec<String>> {
    let data = trim_utf16_nul(trim_utf16_nul(data));
    Ok(decode_utf16(data)?.split('\0').map(str::to_string).collect())
}

fn encode_utf16_le(s: &str) -> Vec<u8> {
    let units: Vec<u16> = s.encode_utf16().collect();
    let mut bytes = vec![0u8; units.len() * 2];
    LittleEndian::write_u16_into(&units, &mut bytes);
    bytes
}

/// Encodes a string as NUL-terminated UTF-16LE `REG_SZ` data.
pub fn format_string(value: &str) -> Vec<u8> {
    encode_utf16_le(&format!("{}\0", value))
}

/// Encodes strings as `REG_MULTI_SZ` data (NUL-separated, double-NUL
/// terminated).
pub fn format_multi_string<S: AsRef<str>>(values: &[S]) -> Vec<u8> {
    let joined = values.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\0");
    encode_utf16_le(&format!("{}\0\0", joined))
}

/// Encodes a `REG_DWORD`.
pub fn format_dword(value: u32) -> Vec<u8> {
    let mut data = vec![0u8; 4];
    LittleEndian::write_u32(&mut data, value);
    data
}

/// Encodes a `REG_QWORD`.
pub fn format_qword(value: u64) -> Vec<u8> {
    let mut data = vec![0u8; 8];
    LittleEndian::write_u64(&mut data, value);
    data
}
