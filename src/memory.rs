//! In-process implementation of the native registry calls.
//!
//! [`MemoryRegistry`] follows the documented contract of the Win32 functions
//! the binding uses: the same status codes, the same size reporting
//! (including `RegGetValueW`'s pessimistic estimate for string types), key
//! names compared case-insensitively, handles that keep working until closed
//! and handle values that get reused after a close. It exists so the
//! marshaling layer can be exercised on any platform; it is not a registry
//! for applications to use.
//!
//! Known simplifications: `REG_EXPAND_SZ` data is never expanded, security
//! descriptors and hive persistence are not modelled, and access checks only
//! cover the rights each call documents as required.

use crate::codec::WideCString;
use crate::flags::{Access, GetValueFlags, Hkey};
use crate::native::{syscall, KeyInfo, NativeResult, RawHkey, RegistryApi, Status, ValueInfo};
use crate::value::ValueType;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

type NodeId = usize;

/// First handle value handed out; real handles are small multiples of four.
const FIRST_HANDLE: usize = 0x100;

#[derive(Debug, Clone)]
struct StoredValue {
    name: String,
    value_type: u32,
    data: Vec<u8>,
}

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    values: Vec<StoredValue>,
    deleted: bool,
}

/// Detached copy of a subtree, used by `RegCopyTreeW`.
struct Snapshot {
    name: String,
    values: Vec<StoredValue>,
    children: Vec<Snapshot>,
}

#[derive(Debug, Clone, Copy)]
struct OpenHandle {
    node: NodeId,
    access: u32,
}

struct InjectedFailure {
    skip: usize,
    status: Status,
}

#[derive(Default)]
struct State {
    nodes: Vec<Node>,
    /// Slots of deleted nodes that no handle refers to.
    free_nodes: Vec<NodeId>,
    roots: HashMap<usize, NodeId>,
    app_hives: HashMap<String, NodeId>,
    handles: HashMap<usize, OpenHandle>,
    free_handles: Vec<usize>,
    next_handle: usize,
    failures: HashMap<&'static str, VecDeque<InjectedFailure>>,
}

/// An in-memory registry implementing [`RegistryApi`].
pub struct MemoryRegistry {
    state: Mutex<State>,
    native_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    /// Creates a registry with the predefined root keys and a few of the
    /// keys every Windows profile has (`HKCU\Environment`, `HKCU\Software`,
    /// `HKLM\SOFTWARE`).
    pub fn new() -> Self {
        let mut state = State {
            next_handle: FIRST_HANDLE,
            ..State::default()
        };

        for (name, value) in [
            ("HKEY_CLASSES_ROOT", Hkey::CLASSES_ROOT),
            ("HKEY_CURRENT_USER", Hkey::CURRENT_USER),
            ("HKEY_LOCAL_MACHINE", Hkey::LOCAL_MACHINE),
            ("HKEY_USERS", Hkey::USERS),
            ("HKEY_CURRENT_CONFIG", Hkey::CURRENT_CONFIG),
        ] {
            let id = state.add_node(name, None);
            state.roots.insert(RawHkey::from_u32(value).0, id);
        }

        let hkcu = state.roots[&RawHkey::from_u32(Hkey::CURRENT_USER).0];
        let env = state.create_path(hkcu, "Environment");
        state.nodes[env].values.push(StoredValue {
            name: "TEMP".to_string(),
            value_type: ValueType::REG_EXPAND_SZ,
            data: crate::value::format_string("%USERPROFILE%\\AppData\\Local\\Temp"),
        });
        state.create_path(hkcu, "Software");
        let hklm = state.roots[&RawHkey::from_u32(Hkey::LOCAL_MACHINE).0];
        state.create_path(hklm, "SOFTWARE");

        Self {
            state: Mutex::new(state),
            native_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Makes the next call to `syscall` fail with `status`.
    pub fn inject_failure(&self, syscall: &'static str, status: Status) {
        self.inject_failure_after(syscall, 0, status);
    }

    /// Lets `skip` calls to `syscall` through, then fails the next one with
    /// `status`. Used to fail the second half of a size/fill pair.
    pub fn inject_failure_after(&self, syscall: &'static str, skip: usize, status: Status) {
        self.lock()
            .failures
            .entry(syscall)
            .or_default()
            .push_back(InjectedFailure { skip, status });
    }

    /// Total number of native calls issued (message lookups excluded).
    pub fn native_calls(&self) -> usize {
        self.native_calls.load(Ordering::SeqCst)
    }

    /// Number of `RegCloseKey` calls issued.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Number of handles currently open (predefined keys excluded).
    pub fn open_handle_count(&self) -> usize {
        self.lock().handles.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call, takes the lock and applies any injected failure.
    fn enter(&self, syscall: &'static str) -> NativeResult<MutexGuard<'_, State>> {
        self.native_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if let Some(queue) = state.failures.get_mut(syscall) {
            if let Some(front) = queue.front_mut() {
                if front.skip == 0 {
                    let status = front.status;
                    queue.pop_front();
                    return Err(status);
                }
                front.skip -= 1;
            }
        }
        Ok(state)
    }
}

impl State {
    fn add_node(&mut self, name: &str, parent: Option<NodeId>) -> NodeId {
        let node = Node {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            values: Vec::new(),
            deleted: false,
        };
        let id = match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        id
    }

    fn is_root(&self, node: NodeId) -> bool {
        self.nodes[node].parent.is_none()
    }

    /// Resolves a handle to its node and granted access.
    fn resolve(&self, key: RawHkey) -> NativeResult<OpenHandle> {
        if let Some(&node) = self.roots.get(&key.0) {
            return Ok(OpenHandle {
                node,
                access: Access::ALL_ACCESS,
            });
        }
        let handle = *self.handles.get(&key.0).ok_or(Status::INVALID_HANDLE)?;
        if self.nodes[handle.node].deleted {
            return Err(Status::KEY_DELETED);
        }
        Ok(handle)
    }

    fn resolve_with(&self, key: RawHkey, required: u32) -> NativeResult<NodeId> {
        let handle = self.resolve(key)?;
        if !Access::allows(handle.access, required) {
            return Err(Status::ACCESS_DENIED);
        }
        Ok(handle.node)
    }

    fn find_child(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let name = name.to_lowercase();
        self.nodes[node]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name.to_lowercase() == name)
    }

    /// Follows a backslash-separated path. The empty path is `node` itself.
    fn walk(&self, node: NodeId, path: &str) -> NativeResult<NodeId> {
        path.split('\\')
            .filter(|c| !c.is_empty())
            .try_fold(node, |cur, component| {
                self.find_child(cur, component).ok_or(Status::FILE_NOT_FOUND)
            })
    }

    fn create_path(&mut self, node: NodeId, path: &str) -> NodeId {
        let mut cur = node;
        for component in path.split('\\').filter(|c| !c.is_empty()) {
            cur = match self.find_child(cur, component) {
                Some(child) => child,
                None => self.add_node(component, Some(cur)),
            };
        }
        cur
    }

    fn open_handle(&mut self, node: NodeId, access: u32) -> RawHkey {
        let value = self.free_handles.pop().unwrap_or_else(|| {
            let v = self.next_handle;
            self.next_handle += 4;
            v
        });
        self.handles.insert(value, OpenHandle { node, access });
        RawHkey(value)
    }

    fn find_value(&self, node: NodeId, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.nodes[node]
            .values
            .iter()
            .position(|v| v.name.to_lowercase() == name)
    }

    fn mark_deleted(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node].children);
        for child in children {
            self.mark_deleted(child);
        }
        self.nodes[node].values.clear();
        self.nodes[node].deleted = true;
        // An open handle keeps the slot until it is closed.
        if !self.is_referenced(node) {
            self.free_nodes.push(node);
        }
    }

    fn is_referenced(&self, node: NodeId) -> bool {
        self.handles.values().any(|h| h.node == node)
    }

    fn unlink(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node].parent {
            self.nodes[parent].children.retain(|&c| c != node);
        }
        self.mark_deleted(node);
    }

    fn snapshot(&self, node: NodeId) -> Snapshot {
        Snapshot {
            name: self.nodes[node].name.clone(),
            values: self.nodes[node].values.clone(),
            children: self.nodes[node]
                .children
                .iter()
                .map(|&c| self.snapshot(c))
                .collect(),
        }
    }

    /// Merges the contents (not the name) of `snapshot` into `dest`.
    fn merge(&mut self, dest: NodeId, snapshot: &Snapshot) {
        for value in &snapshot.values {
            self.put_value(dest, value.clone());
        }
        for child in &snapshot.children {
            let target = match self.find_child(dest, &child.name) {
                Some(existing) => existing,
                None => self.add_node(&child.name, Some(dest)),
            };
            self.merge(target, child);
        }
    }

    fn put_value(&mut self, node: NodeId, value: StoredValue) {
        match self.find_value(node, &value.name) {
            Some(index) => self.nodes[node].values[index] = value,
            None => self.nodes[node].values.push(value),
        }
    }
}

/// Copies a NUL-terminated name into an enumeration buffer.
fn write_name(name: &str, buffer: &mut [u16]) -> NativeResult<usize> {
    let units: Vec<u16> = name.encode_utf16().collect();
    if units.len() + 1 > buffer.len() {
        return Err(Status::MORE_DATA);
    }
    buffer[..units.len()].copy_from_slice(&units);
    buffer[units.len()] = 0;
    Ok(units.len())
}

/// Returns true if string data already ends with a UTF-16 terminator.
fn is_terminated(data: &[u8]) -> bool {
    data.len() % 2 == 0 && data.ends_with(&[0, 0])
}

fn utf16_len(s: &str) -> u32 {
    s.encode_utf16().count() as u32
}

impl RegistryApi for MemoryRegistry {
    fn open_key(&self, parent: RawHkey, sub_key: &WideCString, _options: u32, access: u32) -> NativeResult<RawHkey> {
        let mut state = self.enter(syscall::OPEN_KEY)?;
        let parent = state.resolve(parent)?.node;
        let node = state.walk(parent, &sub_key.to_string_lossy())?;
        Ok(state.open_handle(node, access))
    }

    fn create_key(&self, parent: RawHkey, sub_key: &WideCString, _options: u32, access: u32) -> NativeResult<RawHkey> {
        let mut state = self.enter(syscall::CREATE_KEY)?;
        let path = sub_key.to_string_lossy();
        let parent = state.resolve(parent)?;
        if state.walk(parent.node, &path).is_err() && !Access::allows(parent.access, Access::CREATE_SUB_KEY) {
            return Err(Status::ACCESS_DENIED);
        }
        let node = state.create_path(parent.node, &path);
        Ok(state.open_handle(node, access))
    }

    fn open_current_user(&self, access: u32) -> NativeResult<RawHkey> {
        let mut state = self.enter(syscall::OPEN_CURRENT_USER)?;
        let node = state.roots[&RawHkey::from_u32(Hkey::CURRENT_USER).0];
        Ok(state.open_handle(node, access))
    }

    fn load_app_key(&self, file: &WideCString, access: u32) -> NativeResult<RawHkey> {
        let mut state = self.enter(syscall::LOAD_APP_KEY)?;
        if file.is_empty() {
            return Err(Status::INVALID_PARAMETER);
        }
        let path = file.to_string_lossy();
        let key = path.to_lowercase();
        let node = match state.app_hives.get(&key) {
            Some(&node) => node,
            None => {
                let node = state.add_node(&path, None);
                state.app_hives.insert(key, node);
                node
            }
        };
        Ok(state.open_handle(node, access))
    }

    fn query_info_key(&self, key: RawHkey) -> NativeResult<KeyInfo> {
        let state = self.enter(syscall::QUERY_INFO_KEY)?;
        let node = &state.nodes[state.resolve_with(key, Access::QUERY_VALUE)?];
        Ok(KeyInfo {
            subkey_count: node.children.len() as u32,
            max_subkey_len: node
                .children
                .iter()
                .map(|&c| utf16_len(&state.nodes[c].name))
                .max()
                .unwrap_or(0),
            value_count: node.values.len() as u32,
            max_value_name_len: node.values.iter().map(|v| utf16_len(&v.name)).max().unwrap_or(0),
            max_value_len: node.values.iter().map(|v| v.data.len() as u32).max().unwrap_or(0),
        })
    }

    fn enum_key(&self, key: RawHkey, index: u32, name: &mut [u16]) -> NativeResult<usize> {
        let state = self.enter(syscall::ENUM_KEY)?;
        let node = state.resolve_with(key, Access::ENUMERATE_SUB_KEYS)?;
        let child = *state.nodes[node]
            .children
            .get(index as usize)
            .ok_or(Status::NO_MORE_ITEMS)?;
        write_name(&state.nodes[child].name, name)
    }

    fn enum_value(&self, key: RawHkey, index: u32, name: &mut [u16]) -> NativeResult<usize> {
        let state = self.enter(syscall::ENUM_VALUE)?;
        let node = state.resolve_with(key, Access::QUERY_VALUE)?;
        let value = state.nodes[node]
            .values
            .get(index as usize)
            .ok_or(Status::NO_MORE_ITEMS)?;
        write_name(&value.name, name)
    }

    fn query_value(&self, key: RawHkey, name: &WideCString, data: Option<&mut [u8]>) -> NativeResult<ValueInfo> {
        let state = self.enter(syscall::QUERY_VALUE)?;
        let node = state.resolve_with(key, Access::QUERY_VALUE)?;
        let index = state
            .find_value(node, &name.to_string_lossy())
            .ok_or(Status::FILE_NOT_FOUND)?;
        let value = &state.nodes[node].values[index];
        let size = value.data.len() as u32;

        if let Some(buffer) = data {
            if buffer.len() < value.data.len() {
                return Err(Status::MORE_DATA);
            }
            buffer[..value.data.len()].copy_from_slice(&value.data);
        }
        Ok(ValueInfo {
            value_type: value.value_type,
            size,
        })
    }

    fn get_value(
        &self,
        key: RawHkey,
        sub_key: &WideCString,
        name: &WideCString,
        flags: u32,
        data: Option<&mut [u8]>,
    ) -> NativeResult<ValueInfo> {
        let state = self.enter(syscall::GET_VALUE)?;
        let flags = GetValueFlags::new(flags);
        if !flags.has_flag(GetValueFlags::RT_ANY) {
            return Err(Status::INVALID_PARAMETER);
        }
        let required = if sub_key.is_empty() { Access::QUERY_VALUE } else { 0 };
        let node = state.resolve_with(key, required)?;
        let node = state.walk(node, &sub_key.to_string_lossy())?;
        let index = state
            .find_value(node, &name.to_string_lossy())
            .ok_or(Status::FILE_NOT_FOUND)?;
        let value = &state.nodes[node].values[index];

        let admitted = match GetValueFlags::type_bit(value.value_type) {
            Some(bit) => flags.has_flag(bit),
            None => flags.0 & GetValueFlags::RT_ANY == GetValueFlags::RT_ANY,
        };
        if !admitted {
            return Err(Status::UNSUPPORTED_TYPE);
        }

        let is_string = ValueType::from_u32(value.value_type).is_string();
        let needs_terminator = is_string && !is_terminated(&value.data);
        let written = value.data.len() + if needs_terminator { 2 } else { 0 };

        let Some(buffer) = data else {
            // The size query always leaves room for a terminator on string
            // types, whether or not the stored data already has one.
            let estimate = value.data.len() + if is_string { 2 } else { 0 };
            return Ok(ValueInfo {
                value_type: value.value_type,
                size: estimate as u32,
            });
        };

        if buffer.len() < written {
            return Err(Status::MORE_DATA);
        }
        buffer[..value.data.len()].copy_from_slice(&value.data);
        if needs_terminator {
            buffer[value.data.len()..written].fill(0);
        }
        Ok(ValueInfo {
            value_type: value.value_type,
            size: written as u32,
        })
    }

    fn set_value(&self, key: RawHkey, name: &WideCString, value_type: u32, data: &[u8]) -> NativeResult<()> {
        let mut state = self.enter(syscall::SET_VALUE)?;
        let node = state.resolve_with(key, Access::SET_VALUE)?;
        state.put_value(
            node,
            StoredValue {
                name: name.to_string_lossy(),
                value_type,
                data: data.to_vec(),
            },
        );
        Ok(())
    }

    fn rename_key(&self, key: RawHkey, sub_key: Option<&WideCString>, new_name: &WideCString) -> NativeResult<()> {
        let mut state = self.enter(syscall::RENAME_KEY)?;
        let node = state.resolve(key)?.node;
        let target = match sub_key {
            Some(sub_key) => state.walk(node, &sub_key.to_string_lossy())?,
            None => node,
        };
        let new_name = new_name.to_string_lossy();
        if new_name.is_empty() || new_name.contains('\\') {
            return Err(Status::INVALID_PARAMETER);
        }
        let parent = state.nodes[target].parent.ok_or(Status::ACCESS_DENIED)?;
        if let Some(existing) = state.find_child(parent, &new_name) {
            if existing != target {
                return Err(Status::ACCESS_DENIED);
            }
        }
        state.nodes[target].name = new_name;
        Ok(())
    }

    fn copy_tree(&self, source: RawHkey, sub_key: Option<&WideCString>, dest: RawHkey) -> NativeResult<()> {
        let mut state = self.enter(syscall::COPY_TREE)?;
        let node = state.resolve_with(source, Access::READ)?;
        let source = match sub_key {
            Some(sub_key) => state.walk(node, &sub_key.to_string_lossy())?,
            None => node,
        };
        let dest = state.resolve_with(dest, Access::CREATE_SUB_KEY | Access::SET_VALUE)?;
        let snapshot = state.snapshot(source);
        state.merge(dest, &snapshot);
        Ok(())
    }

    fn delete_tree(&self, key: RawHkey, sub_key: Option<&WideCString>) -> NativeResult<()> {
        let mut state = self.enter(syscall::DELETE_TREE)?;
        let node = state.resolve(key)?.node;
        match sub_key {
            Some(sub_key) => {
                let target = state.walk(node, &sub_key.to_string_lossy())?;
                if state.is_root(target) {
                    return Err(Status::ACCESS_DENIED);
                }
                state.unlink(target);
            }
            None => {
                let children = std::mem::take(&mut state.nodes[node].children);
                for child in children {
                    state.mark_deleted(child);
                }
                state.nodes[node].values.clear();
            }
        }
        Ok(())
    }

    fn delete_key(&self, key: RawHkey, sub_key: &WideCString) -> NativeResult<()> {
        let mut state = self.enter(syscall::DELETE_KEY)?;
        let node = state.resolve(key)?.node;
        let target = state.walk(node, &sub_key.to_string_lossy())?;
        if state.is_root(target) || !state.nodes[target].children.is_empty() {
            return Err(Status::ACCESS_DENIED);
        }
        state.unlink(target);
        Ok(())
    }

    fn delete_key_value(&self, key: RawHkey, sub_key: &WideCString, name: &WideCString) -> NativeResult<()> {
        let mut state = self.enter(syscall::DELETE_KEY_VALUE)?;
        let node = state.resolve(key)?.node;
        let node = state.walk(node, &sub_key.to_string_lossy())?;
        let index = state
            .find_value(node, &name.to_string_lossy())
            .ok_or(Status::FILE_NOT_FOUND)?;
        state.nodes[node].values.remove(index);
        Ok(())
    }

    fn delete_value(&self, key: RawHkey, name: &WideCString) -> NativeResult<()> {
        let mut state = self.enter(syscall::DELETE_VALUE)?;
        let node = state.resolve_with(key, Access::SET_VALUE)?;
        let index = state
            .find_value(node, &name.to_string_lossy())
            .ok_or(Status::FILE_NOT_FOUND)?;
        state.nodes[node].values.remove(index);
        Ok(())
    }

    fn close_key(&self, key: RawHkey) -> NativeResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.enter(syscall::CLOSE_KEY)?;
        if state.roots.contains_key(&key.0) {
            return Ok(());
        }
        let handle = state.handles.remove(&key.0).ok_or(Status::INVALID_HANDLE)?;
        state.free_handles.push(key.0);
        if state.nodes[handle.node].deleted && !state.is_referenced(handle.node) {
            state.free_nodes.push(handle.node);
        }
        Ok(())
    }

    fn format_message(&self, code: u32) -> Option<String> {
        let text = match code {
            2 => "The system cannot find the file specified.",
            5 => "Access is denied.",
            6 => "The handle is invalid.",
            87 => "The parameter is incorrect.",
            183 => "Cannot create a file when that file already exists.",
            234 => "More data is available.",
            259 => "No more data is available.",
            1018 => "Illegal operation attempted on a registry key that has been marked for deletion.",
            1630 => "Data of this type is not supported.",
            _ => return None,
        };
        Some(format!("{}\r\n", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(s: &str) -> WideCString {
        WideCString::from_str(s).unwrap()
    }

    fn hkcu() -> RawHkey {
        RawHkey::from_u32(Hkey::CURRENT_USER)
    }

    #[test]
    fn test_open_is_case_insensitive() {
        let reg = MemoryRegistry::new();
        let key = reg.open_key(hkcu(), &wide("environment"), 0, Access::READ).unwrap();
        let info = reg.query_value(key, &wide("temp"), None).unwrap();
        assert_eq!(info.value_type, ValueType::REG_EXPAND_SZ);
    }

    #[test]
    fn test_open_missing_key() {
        let reg = MemoryRegistry::new();
        let err = reg.open_key(hkcu(), &wide("NoSuchKey"), 0, Access::READ).unwrap_err();
        assert_eq!(err, Status::FILE_NOT_FOUND);
    }

    #[test]
    fn test_handle_values_are_reused() {
        let reg = MemoryRegistry::new();
        let first = reg.open_key(hkcu(), &wide("Software"), 0, Access::READ).unwrap();
        reg.close_key(first).unwrap();
        let second = reg.open_key(hkcu(), &wide("Environment"), 0, Access::READ).unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.close_key(RawHkey(0x9999)), Err(Status::INVALID_HANDLE));
    }

    #[test]
    fn test_access_mask_enforced() {
        let reg = MemoryRegistry::new();
        let key = reg.open_key(hkcu(), &wide("Environment"), 0, Access::READ).unwrap();
        let err = reg.set_value(key, &wide("x"), 4, &[0, 0, 0, 0]).unwrap_err();
        assert_eq!(err, Status::ACCESS_DENIED);
    }

    #[test]
    fn test_get_value_estimate_overshoots_terminated_string() {
        let reg = MemoryRegistry::new();
        let key = reg.create_key(hkcu(), &wide("Software\\t"), 0, Access::ALL_ACCESS).unwrap();
        reg.set_value(key, &wide("s"), 1, &[b'h', 0, 0, 0]).unwrap();

        let estimate = reg.get_value(key, &WideCString::empty(), &wide("s"), 0xffff, None).unwrap();
        assert_eq!(estimate.size, 6);
        let mut buf = vec![0u8; 6];
        let written = reg
            .get_value(key, &WideCString::empty(), &wide("s"), 0xffff, Some(&mut buf))
            .unwrap();
        assert_eq!(written.size, 4);
    }

    #[test]
    fn test_get_value_type_filter() {
        let reg = MemoryRegistry::new();
        let err = reg
            .get_value(hkcu(), &wide("Environment"), &wide("TEMP"), GetValueFlags::RT_REG_DWORD, None)
            .unwrap_err();
        assert_eq!(err, Status::UNSUPPORTED_TYPE);
        let err = reg
            .get_value(hkcu(), &wide("Environment"), &wide("TEMP"), 0, None)
            .unwrap_err();
        assert_eq!(err, Status::INVALID_PARAMETER);
    }

    #[test]
    fn test_deleted_key_handle() {
        let reg = MemoryRegistry::new();
        let key = reg.create_key(hkcu(), &wide("Software\\gone"), 0, Access::ALL_ACCESS).unwrap();
        reg.delete_key(hkcu(), &wide("Software\\gone")).unwrap();
        assert_eq!(reg.query_info_key(key), Err(Status::KEY_DELETED));
        reg.close_key(key).unwrap();
    }

    #[test]
    fn test_deleted_node_slots_are_reused() {
        let reg = MemoryRegistry::new();
        let initial = reg.lock().nodes.len();
        for _ in 0..100 {
            let key = reg.create_key(hkcu(), &wide("Software\\churn\\leaf"), 0, Access::ALL_ACCESS).unwrap();
            reg.close_key(key).unwrap();
            reg.delete_tree(hkcu(), Some(&wide("Software\\churn"))).unwrap();
        }
        assert!(reg.lock().nodes.len() <= initial + 2);
    }

    #[test]
    fn test_open_deleted_node_not_reused() {
        let reg = MemoryRegistry::new();
        let held = reg.create_key(hkcu(), &wide("Software\\held"), 0, Access::ALL_ACCESS).unwrap();
        reg.delete_key(hkcu(), &wide("Software\\held")).unwrap();

        let fresh = reg.create_key(hkcu(), &wide("Software\\fresh"), 0, Access::ALL_ACCESS).unwrap();
        assert_eq!(reg.query_info_key(held), Err(Status::KEY_DELETED));
        assert!(reg.query_info_key(fresh).is_ok());

        reg.close_key(held).unwrap();
        reg.close_key(fresh).unwrap();
        reg.delete_key(hkcu(), &wide("Software\\fresh")).unwrap();
        let len = reg.lock().nodes.len();
        let key = reg.create_key(hkcu(), &wide("Software\\again"), 0, Access::ALL_ACCESS).unwrap();
        assert_eq!(reg.lock().nodes.len(), len);
        reg.close_key(key).unwrap();
    }

    #[test]
    fn test_injected_failure_after_skip() {
        let reg = MemoryRegistry::new();
        reg.inject_failure_after(syscall::QUERY_INFO_KEY, 1, Status::ACCESS_DENIED);
        assert!(reg.query_info_key(hkcu()).is_ok());
        assert_eq!(reg.query_info_key(hkcu()), Err(Status::ACCESS_DENIED));
        assert!(reg.query_info_key(hkcu()).is_ok());
    }
}
