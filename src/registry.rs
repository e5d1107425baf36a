//! The operation surface.
//!
//! Every verb follows the same shape: decode the boundary arguments, issue
//! the native call(s), translate the status unless it is the verb's
//! sentinel, and wrap any new handle. Nothing is retried.

use crate::codec::{decode_handle, decode_wide_string, HandleArg, WideCString};
use crate::error::{RegistryError, Result};
use crate::flags::GetValueFlags;
use crate::handle::{HandleFactory, KeyRef, RegKey};
use crate::native::{syscall, NativeResult, RawHkey, RegistryApi, Status};
use crate::protocol::{enumerate_names, read_value};
use crate::value::{
    format_dword, format_multi_string, format_qword, format_string, parse_value, ParsedValue, RegValue, ValueType,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Entry point for registry operations over one backend.
#[derive(Clone)]
pub struct Registry {
    factory: HandleFactory,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

impl Registry {
    /// Creates a registry over any backend.
    pub fn new(api: Arc<dyn RegistryApi>) -> Self {
        Self {
            factory: HandleFactory::new(api),
        }
    }

    /// The system registry.
    #[cfg(windows)]
    pub fn native() -> Self {
        Self::new(Arc::new(crate::native::windows::Win32Registry::new()))
    }

    /// A fresh in-process registry.
    #[cfg(any(test, feature = "test-util"))]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(crate::memory::MemoryRegistry::new()))
    }

    /// The backend native calls go to.
    pub fn api(&self) -> &dyn RegistryApi {
        self.factory.api().as_ref()
    }

    /// The factory new handles are wrapped by.
    pub fn factory(&self) -> &HandleFactory {
        &self.factory
    }

    fn fail(&self, status: Status, syscall: &'static str) -> RegistryError {
        RegistryError::win32(self.api(), status, syscall)
    }

    fn wrap(&self, result: NativeResult<RawHkey>, syscall: &'static str) -> Result<RegKey> {
        result
            .map(|raw| self.factory.wrap(raw))
            .map_err(|status| self.fail(status, syscall))
    }

    /// Maps the not-found sentinel of the delete verbs to `false`.
    fn existed(&self, result: NativeResult<()>, syscall: &'static str) -> Result<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(Status::FILE_NOT_FOUND) => Ok(false),
            Err(status) => Err(self.fail(status, syscall)),
        }
    }

    fn done(&self, result: NativeResult<()>, syscall: &'static str) -> Result<()> {
        result.map_err(|status| self.fail(status, syscall))
    }

    /// Opens `sub_key` under `parent`. Returns `None` if it does not exist.
    #[instrument(skip(self, parent))]
    pub fn open_key<'k>(
        &self,
        parent: impl Into<HandleArg<'k>>,
        sub_key: Option<&str>,
        options: u32,
        access: u32,
    ) -> Result<Option<RegKey>> {
        let parent = decode_handle(parent.into())?;
        let sub_key = decode_wide_string(sub_key)?;
        match self.api().open_key(parent.raw(), &sub_key, options, access) {
            Err(Status::FILE_NOT_FOUND) => Ok(None),
            result => self.wrap(result, syscall::OPEN_KEY).map(Some),
        }
    }

    /// Opens `sub_key` under `parent`, creating any missing keys on the way.
    #[instrument(skip(self, parent))]
    pub fn create_key<'k>(
        &self,
        parent: impl Into<HandleArg<'k>>,
        sub_key: &str,
        options: u32,
        access: u32,
    ) -> Result<RegKey> {
        let parent = decode_handle(parent.into())?;
        let sub_key = WideCString::from_str(sub_key)?;
        let result = self.api().create_key(parent.raw(), &sub_key, options, access);
        self.wrap(result, syscall::CREATE_KEY)
    }

    /// Opens the current user's root key for the calling thread's token.
    #[instrument(skip(self))]
    pub fn open_current_user(&self, access: u32) -> Result<RegKey> {
        let result = self.api().open_current_user(access);
        self.wrap(result, syscall::OPEN_CURRENT_USER)
    }

    /// Loads an application hive file and returns its root key.
    #[instrument(skip(self))]
    pub fn load_app_key(&self, file: &str, access: u32) -> Result<RegKey> {
        let file = WideCString::from_str(file)?;
        let result = self.api().load_app_key(&file, access);
        self.wrap(result, syscall::LOAD_APP_KEY)
    }

    /// Names of the subkeys of `key`, in enumeration order.
    #[instrument(skip(self, key))]
    pub fn enum_key_names<'k>(&self, key: impl Into<HandleArg<'k>>) -> Result<Vec<String>> {
        let key = decode_handle(key.into())?;
        let info = self
            .api()
            .query_info_key(key.raw())
            .map_err(|status| self.fail(status, syscall::QUERY_INFO_KEY))?;
        debug!(count = info.subkey_count, max_len = info.max_subkey_len, "Enumerating subkeys");
        enumerate_names(self.api(), syscall::ENUM_KEY, info.max_subkey_len, |index, name| {
            self.api().enum_key(key.raw(), index, name)
        })
    }

    /// Names of the values of `key`, in enumeration order.
    #[instrument(skip(self, key))]
    pub fn enum_value_names<'k>(&self, key: impl Into<HandleArg<'k>>) -> Result<Vec<String>> {
        let key = decode_handle(key.into())?;
        let info = self
            .api()
            .query_info_key(key.raw())
            .map_err(|status| self.fail(status, syscall::QUERY_INFO_KEY))?;
        debug!(count = info.value_count, max_len = info.max_value_name_len, "Enumerating values");
        enumerate_names(self.api(), syscall::ENUM_VALUE, info.max_value_name_len, |index, name| {
            self.api().enum_value(key.raw(), index, name)
        })
    }

    /// Reads a value of `key` with `RegQueryValueExW`. Returns `None` if it
    /// does not exist.
    #[instrument(skip(self, key))]
    pub fn query_value<'k>(&self, key: impl Into<HandleArg<'k>>, name: Option<&str>) -> Result<Option<RegValue>> {
        let key = decode_handle(key.into())?;
        let name = decode_wide_string(name)?;
        read_value(self.api(), syscall::QUERY_VALUE, |data| {
            self.api().query_value(key.raw(), &name, data)
        })
    }

    /// Reads a value of `key\sub_key` with `RegGetValueW`. Returns `None` if
    /// the key or the value does not exist.
    ///
    /// `flags` without any `RRF_RT_*` bit are widened to `RRF_RT_ANY`.
    #[instrument(skip(self, key))]
    pub fn get_value<'k>(
        &self,
        key: impl Into<HandleArg<'k>>,
        sub_key: Option<&str>,
        name: Option<&str>,
        flags: u32,
    ) -> Result<Option<RegValue>> {
        let key = decode_handle(key.into())?;
        let sub_key = decode_wide_string(sub_key)?;
        let name = decode_wide_string(name)?;
        let flags = GetValueFlags::new(flags).normalized().0;
        read_value(self.api(), syscall::GET_VALUE, |data| {
            self.api().get_value(key.raw(), &sub_key, &name, flags, data)
        })
    }

    /// Writes a value.
    #[instrument(skip(self, key, data), fields(len = data.len()))]
    pub fn set_value<'k>(
        &self,
        key: impl Into<HandleArg<'k>>,
        name: Option<&str>,
        value_type: u32,
        data: &[u8],
    ) -> Result<()> {
        let key = decode_handle(key.into())?;
        let name = decode_wide_string(name)?;
        let result = self.api().set_value(key.raw(), &name, value_type, data);
        self.done(result, syscall::SET_VALUE)
    }

    /// Renames `key\sub_key`, or `key` itself when `sub_key` is empty.
    #[instrument(skip(self, key))]
    pub fn rename_key<'k>(&self, key: impl Into<HandleArg<'k>>, sub_key: Option<&str>, new_name: &str) -> Result<()> {
        let key = decode_handle(key.into())?;
        let sub_key = decode_wide_string(sub_key)?;
        let new_name = WideCString::from_str(new_name)?;
        let result = self.api().rename_key(key.raw(), sub_key.non_empty(), &new_name);
        self.done(result, syscall::RENAME_KEY)
    }

    /// Copies the values and subkeys of `source\sub_key` (or `source` when
    /// `sub_key` is empty) into `dest`.
    #[instrument(skip(self, source, dest))]
    pub fn copy_tree<'k>(
        &self,
        source: impl Into<HandleArg<'k>>,
        sub_key: Option<&str>,
        dest: impl Into<HandleArg<'k>>,
    ) -> Result<()> {
        let source = source.into();
        let dest = dest.into();
        let source_ref = decode_handle(source)?;
        // A second read guard on the same wrapper could deadlock behind a
        // waiting close.
        let dest_ref = match (source, dest) {
            (HandleArg::Wrapped(a), HandleArg::Wrapped(b)) if std::ptr::eq(a, b) => {
                KeyRef::unmanaged(source_ref.raw())
            }
            _ => decode_handle(dest)?,
        };
        let sub_key = decode_wide_string(sub_key)?;
        let result = self
            .api()
            .copy_tree(source_ref.raw(), sub_key.non_empty(), dest_ref.raw());
        self.done(result, syscall::COPY_TREE)
    }

    /// Deletes `key\sub_key` with all its descendants. With an empty
    /// `sub_key` the contents of `key` are deleted and `key` is kept.
    /// Returns `false` if the key did not exist.
    #[instrument(skip(self, key))]
    pub fn delete_tree<'k>(&self, key: impl Into<HandleArg<'k>>, sub_key: Option<&str>) -> Result<bool> {
        let key = decode_handle(key.into())?;
        let sub_key = decode_wide_string(sub_key)?;
        let result = self.api().delete_tree(key.raw(), sub_key.non_empty());
        self.existed(result, syscall::DELETE_TREE)
    }

    /// Deletes a key without subkeys. Returns `false` if it did not exist.
    #[instrument(skip(self, key))]
    pub fn delete_key<'k>(&self, key: impl Into<HandleArg<'k>>, sub_key: &str) -> Result<bool> {
        let key = decode_handle(key.into())?;
        let sub_key = WideCString::from_str(sub_key)?;
        let result = self.api().delete_key(key.raw(), &sub_key);
        self.existed(result, syscall::DELETE_KEY)
    }

    /// Deletes a value of `key\sub_key`. Returns `false` if it did not exist.
    #[instrument(skip(self, key))]
    pub fn delete_key_value<'k>(
        &self,
        key: impl Into<HandleArg<'k>>,
        sub_key: Option<&str>,
        name: Option<&str>,
    ) -> Result<bool> {
        let key = decode_handle(key.into())?;
        let sub_key = decode_wide_string(sub_key)?;
        let name = decode_wide_string(name)?;
        let result = self.api().delete_key_value(key.raw(), &sub_key, &name);
        self.existed(result, syscall::DELETE_KEY_VALUE)
    }

    /// Deletes a value of `key`. Returns `false` if it did not exist.
    #[instrument(skip(self, key))]
    pub fn delete_value<'k>(&self, key: impl Into<HandleArg<'k>>, name: Option<&str>) -> Result<bool> {
        let key = decode_handle(key.into())?;
        let name = decode_wide_string(name)?;
        let result = self.api().delete_value(key.raw(), &name);
        self.existed(result, syscall::DELETE_VALUE)
    }

    /// Closes a key.
    ///
    /// Wrappers are closed through their own state transition, so this is
    /// idempotent for them. Numeric and external handles are closed
    /// directly; `ERROR_FILE_NOT_FOUND` counts as already closed.
    #[instrument(skip(self, key))]
    pub fn close_key<'k>(&self, key: impl Into<HandleArg<'k>>) -> Result<()> {
        match key.into() {
            HandleArg::Wrapped(key) => key.close(),
            other => {
                let raw = decode_handle(other)?.raw();
                match self.api().close_key(raw) {
                    Ok(()) | Err(Status::FILE_NOT_FOUND) => Ok(()),
                    Err(status) => Err(self.fail(status, syscall::CLOSE_KEY)),
                }
            }
        }
    }

    /// Writes a `REG_SZ` value.
    pub fn set_value_sz<'k>(&self, key: impl Into<HandleArg<'k>>, name: Option<&str>, value: &str) -> Result<()> {
        self.set_value(key, name, ValueType::REG_SZ, &format_string(value))
    }

    /// Writes a `REG_EXPAND_SZ` value.
    pub fn set_value_expand_sz<'k>(&self, key: impl Into<HandleArg<'k>>, name: Option<&str>, value: &str) -> Result<()> {
        self.set_value(key, name, ValueType::REG_EXPAND_SZ, &format_string(value))
    }

    /// Writes a `REG_MULTI_SZ` value.
    pub fn set_value_multi_sz<'k, S: AsRef<str>>(
        &self,
        key: impl Into<HandleArg<'k>>,
        name: Option<&str>,
        values: &[S],
    ) -> Result<()> {
        self.set_value(key, name, ValueType::REG_MULTI_SZ, &format_multi_string(values))
    }

    /// Writes a `REG_DWORD` value.
    pub fn set_value_dword<'k>(&self, key: impl Into<HandleArg<'k>>, name: Option<&str>, value: u32) -> Result<()> {
        self.set_value(key, name, ValueType::REG_DWORD, &format_dword(value))
    }

    /// Writes a `REG_QWORD` value.
    pub fn set_value_qword<'k>(&self, key: impl Into<HandleArg<'k>>, name: Option<&str>, value: u64) -> Result<()> {
        self.set_value(key, name, ValueType::REG_QWORD, &format_qword(value))
    }

    /// [`query_value`](Self::query_value) followed by [`parse_value`].
    pub fn query_value_parsed<'k>(
        &self,
        key: impl Into<HandleArg<'k>>,
        name: Option<&str>,
    ) -> Result<Option<ParsedValue>> {
        self.query_value(key, name)?.as_ref().map(parse_value).transpose()
    }

    /// [`get_value`](Self::get_value) followed by [`parse_value`].
    pub fn get_value_parsed<'k>(
        &self,
        key: impl Into<HandleArg<'k>>,
        sub_key: Option<&str>,
        name: Option<&str>,
        flags: u32,
    ) -> Result<Option<ParsedValue>> {
        self.get_value(key, sub_key, name, flags)?
            .as_ref()
            .map(parse_value)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{Access, HKCU};

    #[test]
    fn test_open_missing_returns_none() {
        let registry = Registry::in_memory();
        let key = registry.open_key(HKCU, Some("Software\\missing"), 0, Access::READ).unwrap();
        assert!(key.is_none());
    }

    #[test]
    fn test_null_names_mean_default() {
        let registry = Registry::in_memory();
        let key = registry.create_key(HKCU, "Software\\defaults", 0, Access::ALL_ACCESS).unwrap();
        registry.set_value_sz(&key, None, "fallback").unwrap();
        let value = registry.query_value_parsed(&key, Some("")).unwrap();
        assert_eq!(value, Some(ParsedValue::String("fallback".to_string())));
    }

    #[test]
    fn test_get_value_flags_widened() {
        let registry = Registry::in_memory();
        let value = registry
            .get_value(HKCU, Some("Environment"), Some("TEMP"), GetValueFlags::NO_EXPAND)
            .unwrap()
            .unwrap();
        assert_eq!(value.value_type(), ValueType::ExpandString);
    }

    #[test]
    fn test_copy_tree_into_itself() {
        let registry = Registry::in_memory();
        let key = registry.create_key(HKCU, "Software\\self", 0, Access::ALL_ACCESS).unwrap();
        registry.set_value_dword(&key, Some("n"), 3).unwrap();
        registry.copy_tree(&key, None, &key).unwrap();
        assert_eq!(registry.enum_value_names(&key).unwrap(), vec!["n"]);
    }

    #[test]
    fn test_close_raw_zero_is_rejected() {
        let registry = Registry::in_memory();
        let err = registry.close_key(0u32).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidHandleValue(0)));
    }
}
