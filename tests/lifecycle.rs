//! Handle lifecycle tests: exactly-once close, no use after close.

use native_reg::native::syscall;
use native_reg::{Access, HandleArg, MemoryRegistry, RawHkey, RegKey, Registry, RegistryError, Status, HKCU};
use std::sync::{Arc, Barrier};
use std::thread;

fn setup() -> (Arc<MemoryRegistry>, Registry) {
    let api = Arc::new(MemoryRegistry::new());
    let registry = Registry::new(api.clone());
    (api, registry)
}

fn open_test_key(registry: &Registry) -> RegKey {
    registry
        .create_key(HKCU, "Software\\native-reg-testing-key", 0, Access::ALL_ACCESS)
        .expect("create test key")
}

#[test]
fn test_operations_after_close_never_reach_native() {
    let (api, registry) = setup();
    let key = open_test_key(&registry);
    key.close().unwrap();

    let before = api.native_calls();
    assert!(matches!(registry.enum_key_names(&key), Err(RegistryError::InvalidHandle)));
    assert!(matches!(registry.enum_value_names(&key), Err(RegistryError::InvalidHandle)));
    assert!(matches!(registry.query_value(&key, Some("x")), Err(RegistryError::InvalidHandle)));
    assert!(matches!(registry.get_value(&key, None, Some("x"), 0), Err(RegistryError::InvalidHandle)));
    assert!(matches!(registry.set_value_dword(&key, Some("x"), 1), Err(RegistryError::InvalidHandle)));
    assert!(matches!(registry.open_key(&key, Some("x"), 0, Access::READ), Err(RegistryError::InvalidHandle)));
    assert!(matches!(registry.create_key(&key, "x", 0, Access::READ), Err(RegistryError::InvalidHandle)));
    assert!(matches!(registry.delete_value(&key, Some("x")), Err(RegistryError::InvalidHandle)));
    assert!(matches!(registry.delete_tree(&key, None), Err(RegistryError::InvalidHandle)));
    assert!(matches!(registry.rename_key(&key, None, "y"), Err(RegistryError::InvalidHandle)));
    assert_eq!(api.native_calls(), before);
}

#[test]
fn test_close_twice_issues_one_native_close() {
    let (api, registry) = setup();
    let key = open_test_key(&registry);

    registry.close_key(&key).unwrap();
    registry.close_key(&key).unwrap();
    key.close().unwrap();
    assert_eq!(api.close_calls(), 1);

    drop(key);
    assert_eq!(api.close_calls(), 1);
    assert_eq!(api.open_handle_count(), 0);
}

#[test]
fn test_drop_closes_unclosed_key() {
    let (api, registry) = setup();
    {
        let _key = open_test_key(&registry);
        assert_eq!(api.open_handle_count(), 1);
    }
    assert_eq!(api.close_calls(), 1);
    assert_eq!(api.open_handle_count(), 0);
}

#[test]
fn test_close_not_found_counts_as_closed() {
    let (api, registry) = setup();
    let key = open_test_key(&registry);
    api.inject_failure(syscall::CLOSE_KEY, Status::FILE_NOT_FOUND);
    key.close().unwrap();
    assert!(key.is_closed());
}

#[test]
fn test_close_raw_handle() {
    let (api, registry) = setup();
    let key = open_test_key(&registry);
    let raw = key.native().unwrap();
    let value = raw.to_u32().unwrap();

    registry.close_key(value).unwrap();
    assert_eq!(api.open_handle_count(), 0);

    let err = registry.close_key(value).unwrap_err();
    assert_eq!(err.errno(), Some(6));
    assert_eq!(err.syscall(), Some("RegCloseKey"));

    // The wrapper still believes it is open; its own close now fails once.
    assert!(key.close().is_err());
    assert!(key.is_closed());
}

#[test]
fn test_raw_handles_bypass_lifecycle() {
    let (_, registry) = setup();
    let key = open_test_key(&registry);
    registry.set_value_dword(&key, Some("v"), 9).unwrap();
    let raw = key.native().unwrap();

    let names = registry.enum_value_names(HandleArg::External(raw)).unwrap();
    assert_eq!(names, vec!["v"]);
    let names = registry.enum_value_names(raw.to_u32().unwrap()).unwrap();
    assert_eq!(names, vec!["v"]);
}

#[test]
fn test_invalid_handle_encodings() {
    let (api, registry) = setup();
    let before = api.native_calls();
    assert!(matches!(registry.enum_key_names(0u32), Err(RegistryError::InvalidHandleValue(0))));
    assert!(matches!(
        registry.enum_key_names(RawHkey::NULL),
        Err(RegistryError::InvalidHandleValue(0))
    ));
    assert_eq!(api.native_calls(), before);
}

#[test]
fn test_reused_handle_value_does_not_alias_closed_wrapper() {
    let (_, registry) = setup();
    let first = open_test_key(&registry);
    let first_raw = first.native().unwrap();
    first.close().unwrap();

    let second = registry
        .open_key(HKCU, Some("Environment"), 0, Access::READ)
        .unwrap()
        .unwrap();
    assert_eq!(second.native().unwrap(), first_raw);

    // The closed wrapper must not reach the key that now owns its old value.
    assert!(matches!(registry.enum_value_names(&first), Err(RegistryError::InvalidHandle)));
    assert_eq!(registry.enum_value_names(&second).unwrap(), vec!["TEMP"]);
}

#[test]
fn test_concurrent_close_releases_once() {
    for _ in 0..32 {
        let (api, registry) = setup();
        let key = Arc::new(open_test_key(&registry));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let key = Arc::clone(&key);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    key.close()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        drop(key);
        assert_eq!(api.close_calls(), 1);
    }
}

#[test]
fn test_close_races_with_operations() {
    let (api, registry) = setup();
    let registry = Arc::new(registry);
    let key = Arc::new(open_test_key(&registry));
    registry.set_value_dword(&*key, Some("v"), 1).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let key = Arc::clone(&key);
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..200 {
                    match registry.query_value(&*key, Some("v")) {
                        Ok(value) => assert!(value.is_some()),
                        Err(RegistryError::InvalidHandle) => return,
                        Err(other) => panic!("native call on released handle: {other}"),
                    }
                }
            })
        })
        .collect();

    key.close().unwrap();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(api.close_calls(), 1);
}

#[test]
fn test_close_predefined_key() {
    let (api, registry) = setup();
    registry.close_key(HKCU).unwrap();
    assert_eq!(api.close_calls(), 1);
    assert_eq!(api.open_handle_count(), 0);
}
