//! Tests against the real registry, under
//! `HKCU\Software\native-reg-testing-key`.

#![cfg(windows)]

use native_reg::{Access, GetValueFlags, ParsedValue, RegKey, Registry, RegistryError, ValueType, HKCU};

const TEST_KEY: &str = "Software\\native-reg-testing-key";

/// Creates a fresh per-test key and deletes it again on drop.
struct Fixture {
    registry: Registry,
    key: RegKey,
    name: String,
}

impl Fixture {
    fn new(test: &str) -> Self {
        let registry = Registry::native();
        let name = format!("{}\\{}", TEST_KEY, test);
        registry.delete_tree(HKCU, Some(&name)).expect("clear stale key");
        let key = registry
            .create_key(HKCU, &name, 0, Access::ALL_ACCESS)
            .expect("create test key");
        Self { registry, key, name }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = self.key.close();
        let _ = self.registry.delete_tree(HKCU, Some(&self.name));
    }
}

#[test]
fn test_environment_temp() {
    let registry = Registry::native();
    let value = registry
        .get_value(HKCU, Some("Environment"), Some("TEMP"), GetValueFlags::NO_EXPAND)
        .unwrap();
    if let Some(value) = value {
        assert_eq!(value.value_type(), ValueType::ExpandString);
        assert!(matches!(value.parse().unwrap(), ParsedValue::String(_)));
    }
}

#[test]
fn test_round_trip_and_enumerate() {
    let f = Fixture::new("round_trip");
    let r = &f.registry;

    r.set_value(&f.key, Some("bin"), ValueType::REG_BINARY, &[1, 2, 3]).unwrap();
    r.set_value_sz(&f.key, Some("sz"), "hello").unwrap();
    r.create_key(&f.key, "child", 0, Access::ALL_ACCESS).unwrap();

    let bin = r.query_value(&f.key, Some("bin")).unwrap().unwrap();
    assert_eq!(bin.data(), &[1, 2, 3]);

    let sz = r.get_value(&f.key, None, Some("sz"), 0).unwrap().unwrap();
    assert_eq!(sz.data().len(), 12);

    assert_eq!(r.enum_value_names(&f.key).unwrap(), vec!["bin", "sz"]);
    assert_eq!(r.enum_key_names(&f.key).unwrap(), vec!["child"]);
}

#[test]
fn test_delete_sentinels() {
    let f = Fixture::new("delete");
    let r = &f.registry;

    assert!(!r.delete_value(&f.key, Some("missing")).unwrap());
    assert!(!r.delete_key(&f.key, "missing").unwrap());
    assert!(!r.delete_tree(&f.key, Some("missing")).unwrap());
    assert!(r.open_key(&f.key, Some("missing"), 0, Access::READ).unwrap().is_none());
}

#[test]
fn test_rename_and_copy() {
    let f = Fixture::new("rename_copy");
    let r = &f.registry;

    let src = r.create_key(&f.key, "src", 0, Access::ALL_ACCESS).unwrap();
    r.set_value_dword(&src, Some("n"), 5).unwrap();
    let dest = r.create_key(&f.key, "dest", 0, Access::ALL_ACCESS).unwrap();
    r.copy_tree(&src, None, &dest).unwrap();
    assert_eq!(r.query_value_parsed(&dest, Some("n")).unwrap(), Some(ParsedValue::Dword(5)));

    r.rename_key(&f.key, Some("src"), "renamed").unwrap();
    assert!(r.open_key(&f.key, Some("renamed"), 0, Access::READ).unwrap().is_some());
}

#[test]
fn test_closed_key_rejected() {
    let f = Fixture::new("closed");
    let r = &f.registry;
    let key = r.open_key(&f.key, None, 0, Access::READ).unwrap().unwrap();
    key.close().unwrap();
    key.close().unwrap();
    assert!(matches!(r.enum_key_names(&key), Err(RegistryError::InvalidHandle)));
}

#[test]
fn test_access_denied_is_structured() {
    let f = Fixture::new("denied");
    let r = &f.registry;
    let read_only = r.open_key(&f.key, None, 0, Access::READ).unwrap().unwrap();
    let err = r.set_value_dword(&read_only, Some("x"), 1).unwrap_err();
    assert_eq!(err.errno(), Some(5));
    assert_eq!(err.syscall(), Some("RegSetValueExW"));
}
