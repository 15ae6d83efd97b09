// In-memory ManagedRuntime for tests. Classes are declared up front, peers
// live in a slab keyed by raw handle, and every invocation is recorded so
// tests can assert on traffic instead of side effects.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use nimbus_core::class_db::{MethodInfo, PropertyInfo};
use nimbus_core::{CallError, EntityId, StringName, Variant, VariantKind};

use crate::runtime::{
    AssemblyInfo, GcHandle, InvokeError, InvokeResult, ManagedClassId, ManagedClassName,
    ManagedRuntime,
};

/// A managed class declaration for the mock.
#[derive(Clone)]
pub struct MockClass {
    pub name: ManagedClassName,
    pub properties: Vec<PropertyInfo>,
    pub methods: Vec<StringName>,
    pub signals: Vec<MethodInfo>,
    pub tool: bool,
}

impl MockClass {
    pub fn new(namespace: &str, class_name: &str) -> MockClass {
        MockClass {
            name: ManagedClassName::new(namespace, class_name),
            properties: Vec::new(),
            methods: Vec::new(),
            signals: Vec::new(),
            tool: false,
        }
    }

    pub fn with_property(mut self, kind: VariantKind, name: &str) -> Self {
        self.properties.push(PropertyInfo::new(kind, name));
        self
    }

    pub fn with_method(mut self, name: &str) -> Self {
        self.methods.push(StringName::new(name));
        self
    }

    pub fn with_signal(mut self, name: &str) -> Self {
        self.signals.push(MethodInfo::new(name));
        self
    }

    pub fn tool(mut self) -> Self {
        self.tool = true;
        self
    }
}

struct Peer {
    class: ManagedClassId,
    #[allow(dead_code)]
    owner: EntityId,
    strong: bool,
    released: bool,
    native_cleared: bool,
    properties: HashMap<StringName, Variant>,
}

struct MockDelegate {
    event: String,
    serializable: bool,
}

#[derive(Default)]
struct Inner {
    classes: Vec<MockClass>,
    peers: HashMap<u64, Peer>,
    next_handle: u64,
    delegates: HashMap<u64, MockDelegate>,
    next_delegate: u64,
    invocations: Vec<(GcHandle, StringName, Vec<Variant>)>,
    delegate_calls: Vec<(String, Vec<Variant>)>,
    throwing: HashSet<StringName>,
    unloaded: bool,
}

pub struct MockRuntime {
    api_hash: String,
    inner: Mutex<Inner>,
}

impl MockRuntime {
    pub fn new(api_hash: &str) -> Arc<MockRuntime> {
        Arc::new(MockRuntime {
            api_hash: api_hash.to_owned(),
            inner: Mutex::new(Inner::default()),
        })
    }

    pub fn add_class(&self, class: MockClass) -> ManagedClassId {
        let mut inner = self.inner.lock().expect("mock poisoned");
        inner.classes.push(class);
        ManagedClassId(inner.classes.len() as u64 - 1)
    }

    pub fn live_peer_count(&self) -> usize {
        self.inner
            .lock()
            .expect("mock poisoned")
            .peers
            .values()
            .filter(|p| !p.released)
            .count()
    }

    pub fn invocations(&self) -> Vec<(GcHandle, StringName, Vec<Variant>)> {
        self.inner.lock().expect("mock poisoned").invocations.clone()
    }

    pub fn delegate_calls_for_event(&self, event: &str) -> Vec<Vec<Variant>> {
        self.inner
            .lock()
            .expect("mock poisoned")
            .delegate_calls
            .iter()
            .filter(|(e, _)| e == event)
            .map(|(_, args)| args.clone())
            .collect()
    }

    /// Declare a delegate the way the managed side would, keyed by event
    /// name. Non-serializable delegates are dropped across reload.
    pub fn register_delegate(&self, event: &str, serializable: bool) -> u64 {
        let mut inner = self.inner.lock().expect("mock poisoned");
        inner.next_delegate += 1;
        let id = inner.next_delegate;
        inner.delegates.insert(
            id,
            MockDelegate {
                event: event.to_owned(),
                serializable,
            },
        );
        id
    }

    /// Make the named method raise a managed exception when invoked.
    pub fn set_throws(&self, method: &str) {
        self.inner
            .lock()
            .expect("mock poisoned")
            .throwing
            .insert(StringName::new(method));
    }

    pub fn is_unloaded(&self) -> bool {
        self.inner.lock().expect("mock poisoned").unloaded
    }

    pub fn native_pointer_cleared(&self, handle: GcHandle) -> bool {
        self.inner
            .lock()
            .expect("mock poisoned")
            .peers
            .get(&handle.0)
            .map(|p| p.native_cleared)
            .unwrap_or(true)
    }

    pub fn peer_is_strong(&self, handle: GcHandle) -> bool {
        self.inner
            .lock()
            .expect("mock poisoned")
            .peers
            .get(&handle.0)
            .map(|p| p.strong)
            .unwrap_or(false)
    }

    fn class_of(&self, id: ManagedClassId) -> Option<MockClass> {
        self.inner
            .lock()
            .expect("mock poisoned")
            .classes
            .get(id.0 as usize)
            .cloned()
    }
}

impl ManagedRuntime for MockRuntime {
    fn assembly_info(&self) -> AssemblyInfo {
        AssemblyInfo {
            name: "MockProject".into(),
            api_hash: self.api_hash.clone(),
            api_version: "1.0".into(),
            version: "1.0".into(),
        }
    }

    fn find_class(&self, name: &ManagedClassName) -> Option<ManagedClassId> {
        self.inner
            .lock()
            .expect("mock poisoned")
            .classes
            .iter()
            .position(|c| &c.name == name)
            .map(|i| ManagedClassId(i as u64))
    }

    fn find_class_unqualified(&self, class_name: &str) -> Option<ManagedClassName> {
        self.inner
            .lock()
            .expect("mock poisoned")
            .classes
            .iter()
            .find(|c| c.name.class_name == class_name)
            .map(|c| c.name.clone())
    }

    fn class_has_method(&self, class: ManagedClassId, method: StringName) -> bool {
        self.class_of(class)
            .map(|c| c.methods.contains(&method))
            .unwrap_or(false)
    }

    fn class_property_list(&self, class: ManagedClassId) -> Vec<PropertyInfo> {
        self.class_of(class).map(|c| c.properties).unwrap_or_default()
    }

    fn class_signal_list(&self, class: ManagedClassId) -> Vec<MethodInfo> {
        self.class_of(class).map(|c| c.signals).unwrap_or_default()
    }

    fn class_method_list(&self, class: ManagedClassId) -> Vec<MethodInfo> {
        self.class_of(class)
            .map(|c| c.methods.iter().map(|m| MethodInfo::new(*m)).collect())
            .unwrap_or_default()
    }

    fn class_is_tool(&self, class: ManagedClassId) -> bool {
        self.class_of(class).map(|c| c.tool).unwrap_or(false)
    }

    fn create_peer(&self, class: ManagedClassId, owner: EntityId) -> Result<GcHandle, InvokeError> {
        let mut inner = self.inner.lock().expect("mock poisoned");
        if inner.classes.get(class.0 as usize).is_none() {
            return Err(InvokeError::Call(CallError::InvalidMethod));
        }
        inner.next_handle += 1;
        let handle = inner.next_handle;
        inner.peers.insert(
            handle,
            Peer {
                class,
                owner,
                strong: true,
                released: false,
                native_cleared: false,
                properties: HashMap::new(),
            },
        );
        Ok(GcHandle(handle))
    }

    fn dispose(&self, handle: GcHandle) {
        if let Some(peer) = self
            .inner
            .lock()
            .expect("mock poisoned")
            .peers
            .get_mut(&handle.0)
        {
            peer.released = true;
        }
    }

    fn clear_native_pointer(&self, handle: GcHandle) {
        if let Some(peer) = self
            .inner
            .lock()
            .expect("mock poisoned")
            .peers
            .get_mut(&handle.0)
        {
            peer.native_cleared = true;
        }
    }

    fn upgrade(&self, handle: GcHandle) -> GcHandle {
        if let Some(peer) = self
            .inner
            .lock()
            .expect("mock poisoned")
            .peers
            .get_mut(&handle.0)
        {
            peer.strong = true;
        }
        handle
    }

    fn downgrade(&self, handle: GcHandle) -> GcHandle {
        if let Some(peer) = self
            .inner
            .lock()
            .expect("mock poisoned")
            .peers
            .get_mut(&handle.0)
        {
            peer.strong = false;
        }
        handle
    }

    fn is_released(&self, handle: GcHandle) -> bool {
        self.inner
            .lock()
            .expect("mock poisoned")
            .peers
            .get(&handle.0)
            .map(|p| p.released)
            .unwrap_or(true)
    }

    fn get_property(&self, handle: GcHandle, name: StringName) -> Option<Variant> {
        self.inner
            .lock()
            .expect("mock poisoned")
            .peers
            .get(&handle.0)
            .and_then(|p| p.properties.get(&name).cloned())
    }

    fn set_property(&self, handle: GcHandle, name: StringName, value: &Variant) -> bool {
        let mut inner = self.inner.lock().expect("mock poisoned");
        let Some(peer) = inner.peers.get_mut(&handle.0) else {
            return false;
        };
        let class = peer.class;
        let accepted = inner
            .classes
            .get(class.0 as usize)
            .map(|c| c.properties.iter().any(|p| p.name == name))
            .unwrap_or(false);
        if accepted {
            if let Some(peer) = inner.peers.get_mut(&handle.0) {
                peer.properties.insert(name, value.clone());
            }
        }
        accepted
    }

    fn invoke(&self, handle: GcHandle, method: StringName, args: &[Variant]) -> InvokeResult {
        let mut inner = self.inner.lock().expect("mock poisoned");
        if inner.throwing.contains(&method) {
            return Err(InvokeError::Exception(format!(
                "System.Exception in {}",
                method
            )));
        }
        let known = inner
            .peers
            .get(&handle.0)
            .and_then(|p| inner.classes.get(p.class.0 as usize))
            .map(|c| c.methods.contains(&method))
            .unwrap_or(false);
        if !known {
            return Err(InvokeError::Call(CallError::InvalidMethod));
        }
        inner.invocations.push((handle, method, args.to_vec()));
        Ok(Variant::Nil)
    }

    fn invoke_delegate(&self, delegate_id: u64, args: &[Variant]) -> InvokeResult {
        let mut inner = self.inner.lock().expect("mock poisoned");
        let Some(delegate) = inner.delegates.get(&delegate_id) else {
            return Err(InvokeError::Call(CallError::InstanceNull));
        };
        let event = delegate.event.clone();
        inner.delegate_calls.push((event, args.to_vec()));
        Ok(Variant::Nil)
    }

    fn delegate_is_valid(&self, delegate_id: u64) -> bool {
        self.inner
            .lock()
            .expect("mock poisoned")
            .delegates
            .contains_key(&delegate_id)
    }

    fn serialize_delegate(&self, delegate_id: u64) -> Option<Vec<Variant>> {
        let inner = self.inner.lock().expect("mock poisoned");
        let delegate = inner.delegates.get(&delegate_id)?;
        if !delegate.serializable {
            return None;
        }
        Some(vec![Variant::String(delegate.event.clone())])
    }

    fn deserialize_delegate(&self, data: &[Variant]) -> Option<u64> {
        let event = data.first()?.as_str()?.to_owned();
        let mut inner = self.inner.lock().expect("mock poisoned");
        inner.next_delegate += 1;
        let id = inner.next_delegate;
        inner.delegates.insert(
            id,
            MockDelegate {
                event,
                serializable: true,
            },
        );
        Some(id)
    }

    fn collect_garbage(&self) {
        let mut inner = self.inner.lock().expect("mock poisoned");
        for peer in inner.peers.values_mut() {
            if !peer.strong {
                peer.released = true;
            }
        }
    }

    fn unload(&self) {
        self.inner.lock().expect("mock poisoned").unloaded = true;
    }
}
