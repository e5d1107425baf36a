//! Lifetime management for opened registry keys.
//!
//! A [`RegKey`] owns one native handle and moves through `Open -> Closed`
//! exactly once. Both the explicit [`RegKey::close`] and `Drop` go through
//! the same release path, and the state transition decides which of them
//! performs the native close.
//!
//! Operations borrow the handle through a [`KeyRef`], which holds a shared
//! lock on the wrapper's state. A close issued concurrently waits for
//! in-flight operations, so a handle value is never passed to the OS after
//! it was released (the OS is free to reuse the value for another key).

use crate::error::{RegistryError, Result};
use crate::native::{syscall, RawHkey, RegistryApi, Status};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tracing::{debug, warn};

/// Handle state: `Some` while open.
type HandleState = Option<RawHkey>;

/// A native handle borrowed for the duration of one operation.
pub struct KeyRef<'a> {
    raw: RawHkey,
    _guard: Option<RwLockReadGuard<'a, HandleState>>,
}

impl<'a> KeyRef<'a> {
    /// A handle whose lifetime is not managed by this crate.
    pub(crate) fn unmanaged(raw: RawHkey) -> Self {
        Self { raw, _guard: None }
    }

    /// The native handle value.
    pub fn raw(&self) -> RawHkey {
        self.raw
    }

    /// Returns true if this reference pins an open [`RegKey`].
    pub fn is_managed(&self) -> bool {
        self._guard.is_some()
    }
}

impl fmt::Debug for KeyRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRef")
            .field("raw", &format_args!("{:#x}", self.raw.0))
            .field("managed", &self.is_managed())
            .finish()
    }
}

/// An opened registry key, closed exactly once.
pub struct RegKey {
    state: RwLock<HandleState>,
    api: Arc<dyn RegistryApi>,
}

impl RegKey {
    fn new(api: Arc<dyn RegistryApi>, raw: RawHkey) -> Self {
        Self {
            state: RwLock::new(Some(raw)),
            api,
        }
    }

    /// Borrows the native handle for one operation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidHandle`] once the key is closed.
    pub fn borrow_key(&self) -> Result<KeyRef<'_>> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match *guard {
            Some(raw) => Ok(KeyRef {
                raw,
                _guard: Some(guard),
            }),
            None => Err(RegistryError::InvalidHandle),
        }
    }

    /// The native handle value, for handing to code outside this crate.
    ///
    /// The value is only meaningful while the key stays open.
    pub fn native(&self) -> Result<RawHkey> {
        self.borrow_key().map(|key| key.raw())
    }

    /// Returns true once the key has been closed.
    pub fn is_closed(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Closes the key.
    ///
    /// Closing an already closed key is a no-op. `ERROR_FILE_NOT_FOUND` from
    /// the OS also counts as already closed.
    ///
    /// # Errors
    ///
    /// Any other native failure is returned, but the key is `Closed`
    /// afterwards regardless: the handle is never released twice.
    pub fn close(&self) -> Result<()> {
        match self.release() {
            None | Some(Ok(())) | Some(Err(Status::FILE_NOT_FOUND)) => Ok(()),
            Some(Err(status)) => Err(RegistryError::win32(self.api.as_ref(), status, syscall::CLOSE_KEY)),
        }
    }

    /// Performs the `Open -> Closed` transition.
    ///
    /// Returns `None` if the key was already closed, otherwise the result of
    /// the one native close.
    fn release(&self) -> Option<crate::native::NativeResult<()>> {
        let raw = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        debug!(hkey = %format!("{:#x}", raw.0), "Releasing registry key");
        Some(self.api.close_key(raw))
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        match self.release() {
            None | Some(Ok(())) | Some(Err(Status::FILE_NOT_FOUND)) => {}
            Some(Err(status)) => {
                warn!(errno = status.code(), "Failed to close registry key on drop");
            }
        }
    }
}

impl fmt::Debug for RegKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = *self.state.read().unwrap_or_else(PoisonError::into_inner);
        match state {
            Some(raw) => write!(f, "RegKey({:#x})", raw.0),
            None => write!(f, "RegKey(closed)"),
        }
    }
}

/// Binds freshly opened native handles to [`RegKey`] wrappers.
///
/// Owned by the [`Registry`](crate::Registry) so every wrapper closes its
/// handle through the same backend that opened it.
#[derive(Clone)]
pub struct HandleFactory {
    api: Arc<dyn RegistryApi>,
}

impl HandleFactory {
    /// Creates a factory for handles opened through `api`.
    pub fn new(api: Arc<dyn RegistryApi>) -> Self {
        Self { api }
    }

    /// Wraps a handle just returned by a successful open/create call.
    pub fn wrap(&self, raw: RawHkey) -> RegKey {
        debug!(hkey = %format!("{:#x}", raw.0), "Wrapping registry key");
        RegKey::new(Arc::clone(&self.api), raw)
    }

    /// The backend handles are closed through.
    pub fn api(&self) -> &Arc<dyn RegistryApi> {
        &self.api
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRegistry;

    fn open_wrapped(api: &Arc<MemoryRegistry>) -> RegKey {
        let raw = api.open_current_user(crate::flags::Access::ALL_ACCESS).unwrap();
        HandleFactory::new(api.clone()).wrap(raw)
    }

    #[test]
    fn test_borrow_open_key() {
        let api = Arc::new(MemoryRegistry::new());
        let key = open_wrapped(&api);
        let r = key.borrow_key().unwrap();
        assert!(r.is_managed());
        assert!(!key.is_closed());
    }

    #[test]
    fn test_close_is_idempotent() {
        let api = Arc::new(MemoryRegistry::new());
        let key = open_wrapped(&api);
        key.close().unwrap();
        key.close().unwrap();
        assert!(key.is_closed());
        assert_eq!(api.close_calls(), 1);
    }

    #[test]
    fn test_borrow_after_close_fails() {
        let api = Arc::new(MemoryRegistry::new());
        let key = open_wrapped(&api);
        key.close().unwrap();
        assert!(matches!(key.borrow_key(), Err(RegistryError::InvalidHandle)));
        assert!(matches!(key.native(), Err(RegistryError::InvalidHandle)));
    }

    #[test]
    fn test_drop_releases_once() {
        let api = Arc::new(MemoryRegistry::new());
        let key = open_wrapped(&api);
        drop(key);
        assert_eq!(api.close_calls(), 1);
        assert_eq!(api.open_handle_count(), 0);

        let key = open_wrapped(&api);
        key.close().unwrap();
        drop(key);
        assert_eq!(api.close_calls(), 2);
    }

    #[test]
    fn test_close_failure_still_closes() {
        let api = Arc::new(MemoryRegistry::new());
        let key = open_wrapped(&api);
        api.inject_failure(syscall::CLOSE_KEY, Status::INVALID_HANDLE);
        let err = key.close().unwrap_err();
        assert_eq!(err.errno(), Some(6));
        assert!(key.is_closed());
        key.close().unwrap();
    }
}
