//! [`RegistryApi`] over the real Win32 registry functions.

use super::{KeyInfo, NativeResult, RawHkey, RegistryApi, Status, ValueInfo};
use crate::codec::WideCString;
use std::ptr;
use windows_sys::Win32::Foundation::{ERROR_SUCCESS, WIN32_ERROR};
use windows_sys::Win32::System::Diagnostics::Debug::{
    FormatMessageW, FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS,
};
use windows_sys::Win32::System::Registry::{self as reg, HKEY};

/// Neutral language, so the message comes back in the user's default.
const LANG_NEUTRAL_DEFAULT: u32 = 0x400;

/// The system registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Registry;

impl Win32Registry {
    /// Returns the system registry backend.
    pub fn new() -> Self {
        Self
    }
}

fn hkey(raw: RawHkey) -> HKEY {
    raw.0 as HKEY
}

fn check(code: WIN32_ERROR) -> NativeResult<()> {
    if code == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(Status(code))
    }
}

fn optional(s: Option<&WideCString>) -> *const u16 {
    s.map_or(ptr::null(), WideCString::as_ptr)
}

impl RegistryApi for Win32Registry {
    fn open_key(&self, parent: RawHkey, sub_key: &WideCString, options: u32, access: u32) -> NativeResult<RawHkey> {
        let mut out: HKEY = ptr::null_mut();
        check(unsafe { reg::RegOpenKeyExW(hkey(parent), sub_key.as_ptr(), options, access, &mut out) })?;
        Ok(RawHkey(out as usize))
    }

    fn create_key(&self, parent: RawHkey, sub_key: &WideCString, options: u32, access: u32) -> NativeResult<RawHkey> {
        let mut out: HKEY = ptr::null_mut();
        let mut disposition = 0u32;
        check(unsafe {
            reg::RegCreateKeyExW(
                hkey(parent),
                sub_key.as_ptr(),
                0,
                ptr::null(),
                options,
                access,
                ptr::null(),
                &mut out,
                &mut disposition,
            )
        })?;
        Ok(RawHkey(out as usize))
    }

    fn open_current_user(&self, access: u32) -> NativeResult<RawHkey> {
        let mut out: HKEY = ptr::null_mut();
        check(unsafe { reg::RegOpenCurrentUser(access, &mut out) })?;
        Ok(RawHkey(out as usize))
    }

    fn load_app_key(&self, file: &WideCString, access: u32) -> NativeResult<RawHkey> {
        let mut out: HKEY = ptr::null_mut();
        check(unsafe { reg::RegLoadAppKeyW(file.as_ptr(), &mut out, access, 0, 0) })?;
        Ok(RawHkey(out as usize))
    }

    fn query_info_key(&self, key: RawHkey) -> NativeResult<KeyInfo> {
        let mut info = KeyInfo::default();
        check(unsafe {
            reg::RegQueryInfoKeyW(
                hkey(key),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null(),
                &mut info.subkey_count,
                &mut info.max_subkey_len,
                ptr::null_mut(),
                &mut info.value_count,
                &mut info.max_value_name_len,
                &mut info.max_value_len,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        })?;
        Ok(info)
    }

    fn enum_key(&self, key: RawHkey, index: u32, name: &mut [u16]) -> NativeResult<usize> {
        let mut len = name.len() as u32;
        check(unsafe {
            reg::RegEnumKeyExW(
                hkey(key),
                index,
                name.as_mut_ptr(),
                &mut len,
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        })?;
        Ok(len as usize)
    }

    fn enum_value(&self, key: RawHkey, index: u32, name: &mut [u16]) -> NativeResult<usize> {
        let mut len = name.len() as u32;
        check(unsafe {
            reg::RegEnumValueW(
                hkey(key),
                index,
                name.as_mut_ptr(),
                &mut len,
                ptr::null(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        })?;
        Ok(len as usize)
    }

    fn query_value(&self, key: RawHkey, name: &WideCString, data: Option<&mut [u8]>) -> NativeResult<ValueInfo> {
        let mut value_type = 0u32;
        let (ptr, mut size) = match data {
            Some(buffer) => (buffer.as_mut_ptr(), buffer.len() as u32),
            None => (ptr::null_mut(), 0),
        };
        check(unsafe { reg::RegQueryValueExW(hkey(key), name.as_ptr(), ptr::null(), &mut value_type, ptr, &mut size) })?;
        Ok(ValueInfo { value_type, size })
    }

    fn get_value(
        &self,
        key: RawHkey,
        sub_key: &WideCString,
        name: &WideCString,
        flags: u32,
        data: Option<&mut [u8]>,
    ) -> NativeResult<ValueInfo> {
        let mut value_type = 0u32;
        let (ptr, mut size) = match data {
            Some(buffer) => (buffer.as_mut_ptr().cast(), buffer.len() as u32),
            None => (ptr::null_mut(), 0),
        };
        check(unsafe {
            reg::RegGetValueW(
                hkey(key),
                sub_key.as_ptr(),
                name.as_ptr(),
                flags,
                &mut value_type,
                ptr,
                &mut size,
            )
        })?;
        Ok(ValueInfo { value_type, size })
    }

    fn set_value(&self, key: RawHkey, name: &WideCString, value_type: u32, data: &[u8]) -> NativeResult<()> {
        check(unsafe {
            reg::RegSetValueExW(hkey(key), name.as_ptr(), 0, value_type, data.as_ptr(), data.len() as u32)
        })
    }

    fn rename_key(&self, key: RawHkey, sub_key: Option<&WideCString>, new_name: &WideCString) -> NativeResult<()> {
        check(unsafe { reg::RegRenameKey(hkey(key), optional(sub_key), new_name.as_ptr()) })
    }

    fn copy_tree(&self, source: RawHkey, sub_key: Option<&WideCString>, dest: RawHkey) -> NativeResult<()> {
        check(unsafe { reg::RegCopyTreeW(hkey(source), optional(sub_key), hkey(dest)) })
    }

    fn delete_tree(&self, key: RawHkey, sub_key: Option<&WideCString>) -> NativeResult<()> {
        check(unsafe { reg::RegDeleteTreeW(hkey(key), optional(sub_key)) })
    }

    fn delete_key(&self, key: RawHkey, sub_key: &WideCString) -> NativeResult<()> {
        check(unsafe { reg::RegDeleteKeyW(hkey(key), sub_key.as_ptr()) })
    }

    fn delete_key_value(&self, key: RawHkey, sub_key: &WideCString, name: &WideCString) -> NativeResult<()> {
        check(unsafe { reg::RegDeleteKeyValueW(hkey(key), sub_key.as_ptr(), name.as_ptr()) })
    }

    fn delete_value(&self, key: RawHkey, name: &WideCString) -> NativeResult<()> {
        check(unsafe { reg::RegDeleteValueW(hkey(key), name.as_ptr()) })
    }

    fn close_key(&self, key: RawHkey) -> NativeResult<()> {
        check(unsafe { reg::RegCloseKey(hkey(key)) })
    }

    fn format_message(&self, code: u32) -> Option<String> {
        let mut buffer = [0u16; 1024];
        let len = unsafe {
            FormatMessageW(
                FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
                ptr::null(),
                code,
                LANG_NEUTRAL_DEFAULT,
                buffer.as_mut_ptr(),
                buffer.len() as u32,
                ptr::null(),
            )
        };
        if len == 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&buffer[..len as usize]))
    }
}
