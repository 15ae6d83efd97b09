// Object kernel: the entity-backed polymorphic base for all engine objects.
//
// Dynamic dispatch goes through the ClassInfo record, not Rust inheritance.
// Mutable state lives behind a single mutex; every dispatch path snapshots
// what it needs under the lock and invokes callbacks outside it, so a
// callback may freely connect, disconnect, or mutate the same object.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};

use nimbus_flags::{
    CONNECT_ONESHOT, CONNECT_PERSIST, CONNECT_QUEUED, CONNECT_REFERENCE_COUNTED,
    NOTIFICATION_POSTINITIALIZE, NOTIFICATION_PREDELETE, PROPERTY_USAGE_SCRIPT_VARIABLE,
};
use tracing::{debug, error, warn};

use crate::callable::Callable;
use crate::class_db::{
    class_db, ApiLevel, ClassBuilder, ClassDescriptor, ClassInfo, MethodInfo, PropertyInfo,
};
use crate::entity::{entity_registry, EntityId};
use crate::error::{CallError, CallResult, ConnectError};
use crate::message_queue::message_queue;
use crate::script::{
    script_language, InstanceBinding, Script, ScriptInstance, MAX_SCRIPT_LANGUAGES,
};
use crate::string_name::StringName;
use crate::variant::{Dictionary, ObjectHandle, SignalRef, Variant, VariantKind};

// ---------------------------------------------------------------------------
// Connection records
// ---------------------------------------------------------------------------

/// One edge of the signal graph: a (source signal, callable, flags) triple.
/// Stored forward in the source's signal map and mirrored as a back-edge in
/// the target's incoming list.
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub signal: SignalRef,
    pub callable: Callable,
    pub flags: u32,
}

struct Slot {
    connection: Connection,
    /// Index of the matching back-edge in the target's incoming table;
    /// `usize::MAX` when the callable has no target object.
    incoming_index: usize,
    ref_count: u32,
}

struct SignalData {
    /// Present for signals declared at runtime rather than by the class.
    user_info: Option<MethodInfo>,
    /// Insertion-ordered; emission order is observable behavior.
    slots: Vec<Slot>,
}

/// Back-edge storage with stable indices and O(1) removal.
#[derive(Default)]
struct IncomingTable {
    entries: Vec<Option<Connection>>,
    free: Vec<usize>,
}

impl IncomingTable {
    fn insert(&mut self, conn: Connection) -> usize {
        if let Some(i) = self.free.pop() {
            self.entries[i] = Some(conn);
            i
        } else {
            self.entries.push(Some(conn));
            self.entries.len() - 1
        }
    }

    fn remove(&mut self, index: usize) {
        if index < self.entries.len() && self.entries[index].is_some() {
            self.entries[index] = None;
            self.free.push(index);
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.entries.iter().filter_map(|e| e.as_ref())
    }

    fn drain(&mut self) -> Vec<Connection> {
        self.free.clear();
        self.entries.drain(..).flatten().collect()
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

struct ObjectInner {
    metadata: Option<HashMap<StringName, Variant>>,
    /// Declared dynamic variables; the setvar/getvar step of the access
    /// chain reads and writes only declared keys.
    dynamic_props: HashMap<StringName, Variant>,
    signal_map: HashMap<StringName, SignalData>,
    user_signals: HashMap<StringName, MethodInfo>,
    incoming: IncomingTable,
    script: Option<Arc<dyn Script>>,
    script_instance: Option<Arc<dyn ScriptInstance>>,
    bindings: [Option<InstanceBinding>; MAX_SCRIPT_LANGUAGES],
    block_signals: bool,
    can_translate: bool,
    /// Nested emission depth; checked at teardown.
    emitting: u32,
    queued_for_deletion: bool,
    #[cfg(feature = "editor")]
    tooling: crate::tooling::ToolingData,
}

impl Default for ObjectInner {
    fn default() -> Self {
        ObjectInner {
            metadata: None,
            dynamic_props: HashMap::new(),
            signal_map: HashMap::new(),
            user_signals: HashMap::new(),
            incoming: IncomingTable::default(),
            script: None,
            script_instance: None,
            bindings: Default::default(),
            block_signals: false,
            can_translate: true,
            emitting: 0,
            queued_for_deletion: false,
            #[cfg(feature = "editor")]
            tooling: Default::default(),
        }
    }
}

pub struct Object {
    class: &'static ClassInfo,
    entity_id: EntityId,
    ref_count: AtomicU32,
    class_data: Mutex<Option<Box<dyn Any + Send>>>,
    inner: Mutex<ObjectInner>,
}

impl Object {
    /// Construct an instance of `class`, register its entity id, and run
    /// post-initialization.
    pub fn spawn(class: &'static ClassInfo) -> Arc<Object> {
        let id = entity_registry().create();
        let obj = Arc::new(Object {
            class,
            entity_id: id,
            ref_count: AtomicU32::new(0),
            class_data: Mutex::new(class.create_class_data()),
            inner: Mutex::new(ObjectInner::default()),
        });
        entity_registry().bind(id, obj.clone());
        obj.notification(NOTIFICATION_POSTINITIALIZE, false);
        obj
    }

    /// Convenience: spawn by class name through the ClassDB.
    pub fn spawn_class(name: &str) -> Option<Arc<Object>> {
        class_db().instantiate(StringName::new(name))
    }

    #[inline]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    #[inline]
    pub fn class(&self) -> &'static ClassInfo {
        self.class
    }

    #[inline]
    pub fn class_name(&self) -> StringName {
        self.class.name
    }

    pub fn is_class(&self, name: &str) -> bool {
        let target = StringName::new(name);
        let mut cursor = Some(self.class);
        while let Some(ci) = cursor {
            if ci.name == target {
                return true;
            }
            cursor = ci.parent();
        }
        false
    }

    /// A Variant handle to this object.
    pub fn as_variant(&self) -> Variant {
        Variant::Object(ObjectHandle {
            id: self.entity_id,
            class: self.class.name,
        })
    }

    /// Run the class-data accessor under the class-data lock.
    pub fn with_class_data<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.class_data.lock().expect("class data poisoned");
        guard.as_mut()?.downcast_mut::<T>().map(f)
    }

    // -- lifecycle ----------------------------------------------------------

    /// Destroy the object: PREDELETE notification, signal teardown in both
    /// directions, binding and script disposal, entity release.
    ///
    /// Returns false (and logs) when the object is ref-counted and still
    /// referenced; freeing it would dangle the holders.
    pub fn free(&self) -> bool {
        if self.class.ref_counted && self.ref_count.load(Ordering::Acquire) > 0 {
            error!(
                object = %self.to_display_string(),
                refs = self.ref_count.load(Ordering::Relaxed),
                "attempt to free a ref-counted object that still has references"
            );
            return false;
        }
        {
            let inner = self.inner.lock().expect("object poisoned");
            if inner.emitting > 0 {
                warn!(
                    object = %self.to_display_string(),
                    "object destroyed during signal emission; remaining targets will not be called"
                );
            }
        }

        self.notification(NOTIFICATION_PREDELETE, true);

        // Drop the script instance before tearing down signals so its
        // destructor-side effects still see a live object.
        let old_instance = {
            let mut inner = self.inner.lock().expect("object poisoned");
            inner.script_instance.take()
        };
        drop(old_instance);

        self.teardown_connections();

        // Release per-language bindings.
        let bindings: Vec<(usize, InstanceBinding)> = {
            let mut inner = self.inner.lock().expect("object poisoned");
            let mut out = Vec::new();
            for (i, slot) in inner.bindings.iter_mut().enumerate() {
                if let Some(b) = slot.take() {
                    out.push((i, b));
                }
            }
            out
        };
        for (lang, binding) in bindings {
            if let Some(cb) = script_language(lang).and_then(|l| l.binding_callbacks()) {
                cb.free(self, binding);
            }
        }

        {
            let mut inner = self.inner.lock().expect("object poisoned");
            inner.metadata = None;
            inner.script = None;
            inner.dynamic_props.clear();
        }

        entity_registry().destroy(self.entity_id);
        true
    }

    /// Advisory deletion flag; the object exists until the consumer frees it.
    pub fn queue_delete(&self) {
        self.inner.lock().expect("object poisoned").queued_for_deletion = true;
    }

    pub fn cancel_delete(&self) {
        self.inner.lock().expect("object poisoned").queued_for_deletion = false;
    }

    pub fn is_queued_for_deletion(&self) -> bool {
        self.inner.lock().expect("object poisoned").queued_for_deletion
    }

    // -- reference counting --------------------------------------------------

    /// Whether the class carries ref-count semantics.
    pub fn is_ref_counted(&self) -> bool {
        self.class.ref_counted
    }

    /// Take the first reference. Returns false if already initialized.
    pub fn init_ref(self: &Arc<Self>) -> bool {
        if self
            .ref_count
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            true
        } else {
            self.reference();
            false
        }
    }

    pub fn reference(self: &Arc<Self>) {
        self.ref_count.fetch_add(1, Ordering::AcqRel);
        let bindings = self.live_bindings();
        for (lang, binding) in bindings {
            if let Some(cb) = script_language(lang).and_then(|l| l.binding_callbacks()) {
                cb.refcount_incremented(self, &binding);
            }
        }
    }

    /// Drop one reference. Returns true when the object should be destroyed
    /// (count reached zero and every language binding agrees the foreign
    /// peer is gone).
    pub fn unreference(self: &Arc<Self>) -> bool {
        let previous = self
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        let Ok(previous) = previous else {
            warn!(
                object = %self.to_display_string(),
                "unreference on an object with no references"
            );
            return false;
        };
        let remaining = previous - 1;
        let bindings = self.live_bindings();
        let mut die = remaining == 0;
        for (lang, binding) in bindings {
            if let Some(cb) = script_language(lang).and_then(|l| l.binding_callbacks()) {
                let verdict = cb.refcount_decremented(self, &binding, remaining);
                die = die && verdict;
            }
        }
        die
    }

    pub fn ref_get_count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }

    fn live_bindings(&self) -> Vec<(usize, InstanceBinding)> {
        let inner = self.inner.lock().expect("object poisoned");
        inner
            .bindings
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.clone().map(|b| (i, b)))
            .collect()
    }

    // -- per-language instance bindings ---------------------------------------

    /// Fetch (or lazily create) the binding slot for a language. Idempotent:
    /// concurrent first observations keep the first allocation.
    pub fn get_instance_binding(self: &Arc<Self>, lang_index: usize) -> Option<InstanceBinding> {
        debug_assert!(lang_index < MAX_SCRIPT_LANGUAGES);
        {
            let inner = self.inner.lock().expect("object poisoned");
            if let Some(b) = &inner.bindings[lang_index] {
                return Some(b.clone());
            }
        }
        let cb = script_language(lang_index)?.binding_callbacks()?;
        let fresh = cb.alloc(self);
        let mut inner = self.inner.lock().expect("object poisoned");
        let slot = &mut inner.bindings[lang_index];
        if let Some(existing) = slot {
            return Some(existing.clone());
        }
        *slot = Some(fresh.clone());
        Some(fresh)
    }

    pub fn has_instance_binding(&self, lang_index: usize) -> bool {
        let inner = self.inner.lock().expect("object poisoned");
        lang_index < MAX_SCRIPT_LANGUAGES && inner.bindings[lang_index].is_some()
    }

    // -- property access chain ------------------------------------------------

    /// Write a named value. Walks the access chain; the first step that
    /// accepts the write wins. Returns whether any step did.
    pub fn set(&self, name: StringName, value: &Variant) -> bool {
        let ok = self.set_inner(name, value);
        #[cfg(feature = "editor")]
        if ok {
            self.tooling_property_changed(name);
        }
        ok
    }

    fn set_inner(&self, name: StringName, value: &Variant) -> bool {
        // 1. Script instance.
        if let Some(si) = self.script_instance() {
            if si.set(name, value) {
                return true;
            }
        }
        // 2. Built-in property via ClassDB.
        if let Some(result) = class_db().set_property(self, name, value) {
            if let Err(e) = result {
                warn!(object = %self.to_display_string(), property = %name, error = %e, "property setter failed");
            }
            return true;
        }
        // 3. Reserved keys.
        if name == StringName::new("script") {
            if value.is_nil() {
                self.set_script(None);
                return true;
            }
            warn!("assigning 'script' requires a Script resource; use set_script");
            return false;
        }
        if name == StringName::new("meta") {
            if let Variant::Dictionary(d) = value {
                let mut inner = self.inner.lock().expect("object poisoned");
                let map: HashMap<StringName, Variant> = d
                    .iter()
                    .filter_map(|(k, v)| k.as_str().map(|s| (StringName::new(s), v.clone())))
                    .collect();
                inner.metadata = if map.is_empty() { None } else { Some(map) };
                return true;
            }
            return false;
        }
        // 4. Virtual _set hook.
        if let Some(hook) = self.class.set_hook() {
            if hook(self, name, value) {
                return true;
            }
        }
        // 5. Declared dynamic variables.
        {
            let mut inner = self.inner.lock().expect("object poisoned");
            if let std::collections::hash_map::Entry::Occupied(mut e) =
                inner.dynamic_props.entry(name)
            {
                e.insert(value.clone());
                return true;
            }
        }
        // 6. Script fallback.
        if let Some(si) = self.script_instance() {
            if si.property_set_fallback(name, value) {
                return true;
            }
        }
        false
    }

    /// Read a named value through the access chain.
    pub fn get(&self, name: StringName) -> Option<Variant> {
        // 1. Script instance.
        if let Some(si) = self.script_instance() {
            if let Some(v) = si.get(name) {
                return Some(v);
            }
        }
        // 2. Built-in property.
        if let Some(result) = class_db().get_property(self, name) {
            return match result {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(object = %self.to_display_string(), property = %name, error = %e, "property getter failed");
                    Some(Variant::Nil)
                }
            };
        }
        // 3. Reserved keys.
        if name == StringName::new("meta") {
            let inner = self.inner.lock().expect("object poisoned");
            let mut d = Dictionary::new();
            if let Some(meta) = &inner.metadata {
                let mut keys: Vec<&StringName> = meta.keys().collect();
                keys.sort_by_key(|k| k.as_str());
                for k in keys {
                    d.insert(Variant::String(k.as_str().to_owned()), meta[k].clone());
                }
            }
            return Some(Variant::Dictionary(d));
        }
        // 4. Virtual _get hook.
        if let Some(hook) = self.class.get_hook() {
            if let Some(v) = hook(self, name) {
                return Some(v);
            }
        }
        // 5. Declared dynamic variables.
        {
            let inner = self.inner.lock().expect("object poisoned");
            if let Some(v) = inner.dynamic_props.get(&name) {
                return Some(v.clone());
            }
        }
        // 6. Script fallback.
        if let Some(si) = self.script_instance() {
            if let Some(v) = si.property_get_fallback(name) {
                return Some(v);
            }
        }
        None
    }

    /// Declare a dynamic variable reachable through the setvar/getvar step.
    pub fn define_dynamic_var(&self, name: StringName, default: Variant) {
        self.inner
            .lock()
            .expect("object poisoned")
            .dynamic_props
            .insert(name, default);
    }

    /// Write through a sub-path, e.g. `["position", "x"]`. Composite values
    /// are value types, so every intermediate is re-packed on the way out.
    pub fn set_indexed(&self, path: &[&str], value: &Variant) -> bool {
        let Some((&first, rest)) = path.split_first() else {
            return false;
        };
        let first = StringName::new(first);
        if rest.is_empty() {
            return self.set(first, value);
        }
        let Some(mut root) = self.get(first) else {
            return false;
        };
        // Collect intermediate copies down to the parent of the leaf.
        let mut stack: Vec<Variant> = vec![root.clone()];
        for seg in &rest[..rest.len() - 1] {
            let Some(next) = stack.last().and_then(|v| v.get_named(seg)) else {
                return false;
            };
            stack.push(next);
        }
        // Write the leaf, then re-pack upward.
        let leaf_name = rest[rest.len() - 1];
        let mut current = stack.pop().expect("stack has root");
        if !current.set_named(leaf_name, value) {
            return false;
        }
        for (i, parent) in stack.into_iter().enumerate().rev() {
            let mut parent = parent;
            if !parent.set_named(rest[i], &current) {
                return false;
            }
            current = parent;
        }
        root = current;
        self.set(first, &root)
    }

    pub fn get_indexed(&self, path: &[&str]) -> Option<Variant> {
        let (&first, rest) = path.split_first()?;
        let mut value = self.get(StringName::new(first))?;
        for seg in rest {
            value = value.get_named(seg)?;
        }
        Some(value)
    }

    /// Merged property list: class chain first, then script-declared
    /// properties tagged as script variables.
    pub fn get_property_list(&self) -> Vec<PropertyInfo> {
        let mut out = self.class.property_list();
        if let Some(si) = self.script_instance() {
            for mut p in si.get_property_list() {
                p.usage |= PROPERTY_USAGE_SCRIPT_VARIABLE;
                out.push(p);
            }
        }
        out
    }

    // -- dynamic calls --------------------------------------------------------

    /// Dynamic method dispatch: `free` intercept, then script, then ClassDB.
    pub fn call(&self, method: StringName, args: &[Variant]) -> CallResult {
        if method == StringName::new("free") {
            if self.class.ref_counted {
                error!(
                    object = %self.to_display_string(),
                    "'free' called on a ref-counted object"
                );
                return Err(CallError::InvalidMethod);
            }
            self.free();
            return Ok(Variant::Nil);
        }
        if let Some(si) = self.script_instance() {
            match si.call(method, args) {
                Err(CallError::InvalidMethod) => {}
                other => return other,
            }
        }
        match self.class.find_method(method) {
            Some(bind) => bind.call(self, args),
            None => Err(CallError::InvalidMethod),
        }
    }

    /// Enqueue a call for the next frame drain. Returns immediately.
    pub fn call_deferred(&self, method: StringName, args: Vec<Variant>) {
        message_queue().push_call(self.entity_id, method, args, true);
    }

    pub fn has_method(&self, method: StringName) -> bool {
        if let Some(si) = self.script_instance() {
            if si.has_method(method) {
                return true;
            }
        }
        self.class.has_method(method)
    }

    /// Dispatch a notification through the class hierarchy. Base-first by
    /// default; `reversed` runs derived-first with the script instance
    /// leading instead of trailing.
    pub fn notification(&self, what: i32, reversed: bool) {
        let chain = self.class.notification_chain();
        let si = self.script_instance();
        if reversed {
            if let Some(si) = &si {
                si.notification(what);
            }
            for f in chain.iter().rev() {
                f(self, what);
            }
        } else {
            for f in &chain {
                f(self, what);
            }
            if let Some(si) = &si {
                si.notification(what);
            }
        }
    }

    /// String form: script override, then class hook, then `[Class:id]`.
    pub fn to_display_string(&self) -> String {
        if let Some(si) = self.script_instance() {
            if let Some(s) = si.to_display_string() {
                return s;
            }
        }
        if let Some(hook) = self.class.to_string_hook() {
            return hook(self);
        }
        format!("[{}:{}]", self.class.name, self.entity_id)
    }

    // -- metadata -------------------------------------------------------------

    /// Assigning nil erases; the map frees itself on last erase.
    pub fn set_meta(&self, name: StringName, value: Variant) {
        let mut inner = self.inner.lock().expect("object poisoned");
        if value.is_nil() {
            if let Some(meta) = &mut inner.metadata {
                meta.remove(&name);
                if meta.is_empty() {
                    inner.metadata = None;
                }
            }
            return;
        }
        inner
            .metadata
            .get_or_insert_with(HashMap::new)
            .insert(name, value);
    }

    pub fn get_meta(&self, name: StringName) -> Option<Variant> {
        let inner = self.inner.lock().expect("object poisoned");
        inner.metadata.as_ref()?.get(&name).cloned()
    }

    pub fn has_meta(&self, name: StringName) -> bool {
        let inner = self.inner.lock().expect("object poisoned");
        inner
            .metadata
            .as_ref()
            .map(|m| m.contains_key(&name))
            .unwrap_or(false)
    }

    pub fn remove_meta(&self, name: StringName) {
        self.set_meta(name, Variant::Nil);
    }

    pub fn get_meta_list(&self) -> Vec<StringName> {
        let inner = self.inner.lock().expect("object poisoned");
        let mut list: Vec<StringName> = inner
            .metadata
            .as_ref()
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        list.sort_by_key(|n| n.as_str());
        list
    }

    // -- script attachment ----------------------------------------------------

    /// Replace the attached script atomically and emit `script_changed`.
    /// Instantiates an executing instance when the runtime can, otherwise a
    /// placeholder (so recorded values survive until it can).
    pub fn set_script(&self, script: Option<Arc<dyn Script>>) {
        let this = match entity_registry().resolve(self.entity_id) {
            Some(arc) => arc,
            None => return,
        };
        let new_instance: Option<Arc<dyn ScriptInstance>> = script.as_ref().map(|s| {
            if s.can_instantiate() {
                s.instance_create(&this)
                    .unwrap_or_else(|| s.placeholder_instance_create(&this))
            } else {
                s.placeholder_instance_create(&this)
            }
        });
        {
            let mut inner = self.inner.lock().expect("object poisoned");
            inner.script = script;
            inner.script_instance = new_instance;
        }
        self.emit_signal(StringName::new("script_changed"), &[]);
    }

    pub fn get_script(&self) -> Option<Arc<dyn Script>> {
        self.inner.lock().expect("object poisoned").script.clone()
    }

    pub fn script_instance(&self) -> Option<Arc<dyn ScriptInstance>> {
        self.inner
            .lock()
            .expect("object poisoned")
            .script_instance
            .clone()
    }

    /// Install a prepared instance directly (bridge and reload paths).
    pub fn set_script_instance(
        &self,
        script: Option<Arc<dyn Script>>,
        instance: Option<Arc<dyn ScriptInstance>>,
    ) {
        let mut inner = self.inner.lock().expect("object poisoned");
        inner.script = script;
        inner.script_instance = instance;
    }

    // -- signals --------------------------------------------------------------

    /// Declare a signal on this instance only.
    pub fn add_user_signal(&self, info: MethodInfo) {
        let mut inner = self.inner.lock().expect("object poisoned");
        inner.user_signals.insert(info.name, info);
    }

    pub fn has_signal(&self, signal: StringName) -> bool {
        if self.class.has_signal(signal) {
            return true;
        }
        {
            let inner = self.inner.lock().expect("object poisoned");
            if inner.user_signals.contains_key(&signal) {
                return true;
            }
        }
        self.get_script()
            .map(|s| s.has_script_signal(signal))
            .unwrap_or(false)
    }

    /// Declared signals: class chain, user declarations, then script.
    pub fn get_signal_list(&self) -> Vec<MethodInfo> {
        let mut out = Vec::new();
        let mut cursor = Some(self.class);
        let mut chain = Vec::new();
        while let Some(ci) = cursor {
            chain.push(ci);
            cursor = ci.parent();
        }
        for ci in chain.iter().rev() {
            out.extend(ci.own_signals());
        }
        {
            let inner = self.inner.lock().expect("object poisoned");
            let mut user: Vec<MethodInfo> = inner.user_signals.values().cloned().collect();
            user.sort_by_key(|s| s.name.as_str());
            out.extend(user);
        }
        if let Some(script) = self.get_script() {
            out.extend(script.get_script_signal_list());
        }
        out
    }

    pub fn set_block_signals(&self, block: bool) {
        self.inner.lock().expect("object poisoned").block_signals = block;
    }

    pub fn is_blocking_signals(&self) -> bool {
        self.inner.lock().expect("object poisoned").block_signals
    }

    pub fn set_message_translation(&self, enable: bool) {
        self.inner.lock().expect("object poisoned").can_translate = enable;
    }

    pub fn can_translate_messages(&self) -> bool {
        self.inner.lock().expect("object poisoned").can_translate
    }

    /// Connect `signal` to `callable`. See the connection-flag constants for
    /// queued/oneshot/persist/reference-counted behavior.
    pub fn connect(
        &self,
        signal: StringName,
        callable: Callable,
        flags: u32,
    ) -> Result<(), ConnectError> {
        if callable.is_null() {
            error!(object = %self.to_display_string(), signal = %signal, "connect with null callable");
            return Err(ConnectError::NullCallable);
        }
        let target_id = callable.object_id();
        if callable.method_name().is_some() && entity_registry().resolve(target_id).is_none() {
            error!(object = %self.to_display_string(), signal = %signal, "connect to a dead target object");
            return Err(ConnectError::NullCallable);
        }

        // Validate + reference-count fast path under the lock.
        {
            let mut inner = self.inner.lock().expect("object poisoned");
            if !inner.signal_map.contains_key(&signal) {
                let user_info = inner.user_signals.get(&signal).cloned();
                let declared = self.class.has_signal(signal)
                    || user_info.is_some()
                    || inner
                        .script
                        .as_ref()
                        .map(|s| s.has_script_signal(signal))
                        .unwrap_or(false);
                if !declared {
                    error!(object = %self.to_display_string(), signal = %signal, "connect to nonexistent signal");
                    return Err(ConnectError::InvalidSignal(signal.as_str().to_owned()));
                }
                inner.signal_map.insert(
                    signal,
                    SignalData {
                        user_info,
                        slots: Vec::new(),
                    },
                );
            }
            let sd = inner.signal_map.get_mut(&signal).expect("just inserted");
            if let Some(slot) = sd
                .slots
                .iter_mut()
                .find(|s| s.connection.callable == callable)
            {
                if flags & CONNECT_REFERENCE_COUNTED != 0 {
                    slot.ref_count += 1;
                    return Ok(());
                }
                return Err(ConnectError::DuplicateConnection);
            }
        }

        let connection = Connection {
            signal: SignalRef {
                object: self.entity_id,
                name: signal,
            },
            callable: callable.clone(),
            flags,
        };

        // Back-edge first, then the forward slot; the two locks are never
        // held together.
        let incoming_index = if let Some(target) = entity_registry().resolve(target_id) {
            target
                .inner
                .lock()
                .expect("object poisoned")
                .incoming
                .insert(connection.clone())
        } else {
            usize::MAX
        };

        let mut inner = self.inner.lock().expect("object poisoned");
        let sd = inner.signal_map.get_mut(&signal).expect("entry exists");
        // Re-check: a callback may have raced us while the lock was dropped.
        if let Some(slot) = sd
            .slots
            .iter_mut()
            .find(|s| s.connection.callable == callable)
        {
            if flags & CONNECT_REFERENCE_COUNTED != 0 {
                slot.ref_count += 1;
                return Ok(());
            }
            return Err(ConnectError::DuplicateConnection);
        }
        sd.slots.push(Slot {
            connection,
            incoming_index,
            ref_count: if flags & CONNECT_REFERENCE_COUNTED != 0 { 1 } else { 0 },
        });
        Ok(())
    }

    pub fn disconnect(&self, signal: StringName, callable: &Callable) -> Result<(), ConnectError> {
        self.disconnect_internal(signal, callable, false)
    }

    fn disconnect_internal(
        &self,
        signal: StringName,
        callable: &Callable,
        force: bool,
    ) -> Result<(), ConnectError> {
        let (target_id, incoming_index) = {
            let mut inner = self.inner.lock().expect("object poisoned");
            let Some(sd) = inner.signal_map.get_mut(&signal) else {
                return Err(ConnectError::InvalidSignal(signal.as_str().to_owned()));
            };
            let Some(pos) = sd
                .slots
                .iter()
                .position(|s| s.connection.callable == *callable)
            else {
                return Err(ConnectError::NotConnected);
            };
            if !force && sd.slots[pos].ref_count > 1 {
                sd.slots[pos].ref_count -= 1;
                return Ok(());
            }
            let slot = sd.slots.remove(pos);
            // Built-in signals drop their empty map entry; user-declared
            // ones keep it so the declaration survives.
            if sd.slots.is_empty() && sd.user_info.is_none() && self.class.has_signal(signal) {
                inner.signal_map.remove(&signal);
            }
            (slot.connection.callable.object_id(), slot.incoming_index)
        };

        if incoming_index != usize::MAX {
            if let Some(target) = entity_registry().resolve(target_id) {
                target
                    .inner
                    .lock()
                    .expect("object poisoned")
                    .incoming
                    .remove(incoming_index);
            }
        }
        Ok(())
    }

    /// Erase every slot of `signal` whose callable resolves to `target_id`.
    pub fn disconnect_all(&self, signal: StringName, target_id: EntityId) {
        let victims: Vec<Callable> = {
            let inner = self.inner.lock().expect("object poisoned");
            inner
                .signal_map
                .get(&signal)
                .map(|sd| {
                    sd.slots
                        .iter()
                        .filter(|s| s.connection.callable.object_id() == target_id)
                        .map(|s| s.connection.callable.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        for callable in victims {
            let _ = self.disconnect_internal(signal, &callable, true);
        }
    }

    pub fn is_connected(&self, signal: StringName, callable: &Callable) -> bool {
        let inner = self.inner.lock().expect("object poisoned");
        inner
            .signal_map
            .get(&signal)
            .map(|sd| sd.slots.iter().any(|s| s.connection.callable == *callable))
            .unwrap_or(false)
    }

    /// Emit a signal. Targets are invoked synchronously in connection order
    /// unless their connection is queued; dead targets are skipped; oneshot
    /// connections detach after the loop.
    pub fn emit_signal(&self, signal: StringName, args: &[Variant]) {
        let snapshot: Vec<(Callable, u32)> = {
            let mut inner = self.inner.lock().expect("object poisoned");
            if inner.block_signals {
                return;
            }
            let Some(sd) = inner.signal_map.get(&signal) else {
                // Nothing connected is not an error, but emitting a signal
                // that was never declared is worth a debug-build complaint.
                #[cfg(debug_assertions)]
                if !self.class.has_signal(signal)
                    && !inner.user_signals.contains_key(&signal)
                {
                    debug!(object = %self.class.name, signal = %signal, "emit of undeclared signal");
                }
                return;
            };
            let snap: Vec<(Callable, u32)> = sd
                .slots
                .iter()
                .map(|s| (s.connection.callable.clone(), s.connection.flags))
                .collect();
            inner.emitting += 1;
            snap
        };

        let mut pending_disconnects: Vec<Callable> = Vec::new();
        for (callable, flags) in snapshot {
            if entity_registry().resolve(self.entity_id).is_none() {
                warn!(signal = %signal, "emitter destroyed during emission; stopping");
                break;
            }
            // A callback earlier in this emit may have disconnected it.
            if !self.is_connected(signal, &callable) {
                continue;
            }
            if flags & CONNECT_QUEUED != 0 {
                message_queue().push_callable(callable.clone(), args.to_vec(), false);
            } else {
                match callable.call(args) {
                    Ok(_) => {}
                    Err(CallError::InstanceNull) => {
                        // Target died between connect and emit; skip.
                    }
                    Err(e) => {
                        if self.tolerate_callback_error(flags, &callable) {
                            debug!(signal = %signal, target = %callable, error = %e, "persist connection tolerated in editor");
                        } else {
                            error!(
                                object = %self.to_display_string(),
                                signal = %signal,
                                target = %callable,
                                error = %e,
                                "error calling connected callable"
                            );
                        }
                    }
                }
            }
            if flags & CONNECT_ONESHOT != 0 && !self.oneshot_exempt(flags, &callable) {
                pending_disconnects.push(callable);
            }
        }

        {
            let mut inner = self.inner.lock().expect("object poisoned");
            inner.emitting = inner.emitting.saturating_sub(1);
        }
        for callable in pending_disconnects {
            let _ = self.disconnect_internal(signal, &callable, true);
        }
    }

    /// In editor contexts a persist connection is being edited, not
    /// executed; oneshot must not eat it.
    #[cfg(feature = "editor")]
    fn oneshot_exempt(&self, flags: u32, callable: &Callable) -> bool {
        flags & CONNECT_PERSIST != 0 && !Self::target_has_tool_script(callable)
    }

    #[cfg(not(feature = "editor"))]
    fn oneshot_exempt(&self, _flags: u32, _callable: &Callable) -> bool {
        false
    }

    #[cfg(feature = "editor")]
    fn tolerate_callback_error(&self, flags: u32, callable: &Callable) -> bool {
        flags & CONNECT_PERSIST != 0 && !Self::target_has_tool_script(callable)
    }

    #[cfg(not(feature = "editor"))]
    fn tolerate_callback_error(&self, _flags: u32, _callable: &Callable) -> bool {
        false
    }

    #[cfg(feature = "editor")]
    fn target_has_tool_script(callable: &Callable) -> bool {
        entity_registry()
            .resolve(callable.object_id())
            .and_then(|o| o.get_script())
            .map(|s| s.is_tool())
            .unwrap_or(false)
    }

    pub fn get_signal_connection_list(&self, signal: StringName) -> Vec<Connection> {
        let inner = self.inner.lock().expect("object poisoned");
        inner
            .signal_map
            .get(&signal)
            .map(|sd| sd.slots.iter().map(|s| s.connection.clone()).collect())
            .unwrap_or_default()
    }

    pub fn get_persistent_signal_connection_count(&self, signal: StringName) -> usize {
        let inner = self.inner.lock().expect("object poisoned");
        inner
            .signal_map
            .get(&signal)
            .map(|sd| {
                sd.slots
                    .iter()
                    .filter(|s| s.connection.flags & CONNECT_PERSIST != 0)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Connections on other objects that target this one.
    pub fn get_incoming_connections(&self) -> Vec<Connection> {
        let inner = self.inner.lock().expect("object poisoned");
        inner.incoming.iter().cloned().collect()
    }

    fn teardown_connections(&self) {
        // Outgoing: remove our back-edges from every target.
        let outgoing: Vec<(EntityId, usize)> = {
            let mut inner = self.inner.lock().expect("object poisoned");
            let mut out = Vec::new();
            for sd in inner.signal_map.values() {
                for slot in &sd.slots {
                    out.push((slot.connection.callable.object_id(), slot.incoming_index));
                }
            }
            inner.signal_map.clear();
            out
        };
        for (target_id, index) in outgoing {
            if index == usize::MAX || target_id == self.entity_id {
                continue;
            }
            if let Some(target) = entity_registry().resolve(target_id) {
                target
                    .inner
                    .lock()
                    .expect("object poisoned")
                    .incoming
                    .remove(index);
            }
        }

        // Incoming: ask every source to drop its slot pointing at us.
        let incoming: Vec<Connection> = {
            let mut inner = self.inner.lock().expect("object poisoned");
            inner.incoming.drain()
        };
        for conn in incoming {
            if conn.signal.object == self.entity_id {
                continue;
            }
            if let Some(source) = entity_registry().resolve(conn.signal.object) {
                let _ = source.disconnect_internal(conn.signal.name, &conn.callable, true);
            }
        }
    }

    // -- editor tooling -------------------------------------------------------

    #[cfg(feature = "editor")]
    fn tooling_property_changed(&self, name: StringName) {
        let receptors = {
            let mut inner = self.inner.lock().expect("object poisoned");
            inner.tooling.mark_edited()
        };
        for id in receptors {
            if let Some(obj) = entity_registry().resolve(id) {
                obj.notification(crate::tooling::NOTIFICATION_EDITED_CHANGED, false);
            }
        }
        let _ = name;
    }

    #[cfg(feature = "editor")]
    pub fn set_edited(&self, edited: bool) {
        let receptors = {
            let mut inner = self.inner.lock().expect("object poisoned");
            if edited {
                inner.tooling.mark_edited()
            } else {
                inner.tooling.edited = false;
                Vec::new()
            }
        };
        for id in receptors {
            if let Some(obj) = entity_registry().resolve(id) {
                obj.notification(crate::tooling::NOTIFICATION_EDITED_CHANGED, false);
            }
        }
    }

    #[cfg(feature = "editor")]
    pub fn is_edited(&self) -> bool {
        self.inner.lock().expect("object poisoned").tooling.edited
    }

    #[cfg(feature = "editor")]
    pub fn get_edited_version(&self) -> u32 {
        self.inner
            .lock()
            .expect("object poisoned")
            .tooling
            .edited_version
    }

    #[cfg(feature = "editor")]
    pub fn add_change_receptor(&self, receptor: EntityId) {
        self.inner
            .lock()
            .expect("object poisoned")
            .tooling
            .change_receptors
            .push(receptor);
    }

    #[cfg(feature = "editor")]
    pub fn remove_change_receptor(&self, receptor: EntityId) {
        self.inner
            .lock()
            .expect("object poisoned")
            .tooling
            .change_receptors
            .retain(|r| *r != receptor);
    }

    #[cfg(feature = "editor")]
    pub fn editor_set_section_unfold(&self, section: &str, unfolded: bool) {
        let mut inner = self.inner.lock().expect("object poisoned");
        if unfolded {
            inner.tooling.unfolded_sections.insert(section.to_owned());
        } else {
            inner.tooling.unfolded_sections.remove(section);
        }
    }

    #[cfg(feature = "editor")]
    pub fn editor_is_section_unfolded(&self, section: &str) -> bool {
        self.inner
            .lock()
            .expect("object poisoned")
            .tooling
            .unfolded_sections
            .contains(section)
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class.name)
            .field("entity_id", &self.entity_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Core class registration
// ---------------------------------------------------------------------------

fn bind_object(b: &mut ClassBuilder) {
    b.signal("script_changed", vec![]);
    b.signal("property_list_changed", vec![]);
    b.method(
        "get_class",
        vec![],
        Some(PropertyInfo::new(VariantKind::String, "class")),
        |obj, _| Ok(Variant::String(obj.class_name().as_str().to_owned())),
    );
    b.method(
        "to_string",
        vec![],
        Some(PropertyInfo::new(VariantKind::String, "string")),
        |obj, _| Ok(Variant::String(obj.to_display_string())),
    );
    b.method(
        "set_meta",
        vec![
            PropertyInfo::new(VariantKind::String, "name"),
            PropertyInfo::new(VariantKind::Nil, "value")
                .with_usage(nimbus_flags::PROPERTY_USAGE_NIL_IS_VARIANT),
        ],
        None,
        |obj, args| {
            let name = StringName::new(args[0].as_str().unwrap_or(""));
            obj.set_meta(name, args[1].clone());
            Ok(Variant::Nil)
        },
    );
    b.method_full(
        "get_meta",
        vec![
            PropertyInfo::new(VariantKind::String, "name"),
            PropertyInfo::new(VariantKind::Nil, "default")
                .with_usage(nimbus_flags::PROPERTY_USAGE_NIL_IS_VARIANT),
        ],
        Some(
            PropertyInfo::new(VariantKind::Nil, "value")
                .with_usage(nimbus_flags::PROPERTY_USAGE_NIL_IS_VARIANT),
        ),
        vec![Variant::Nil],
        nimbus_flags::METHOD_FLAGS_DEFAULT | nimbus_flags::METHOD_FLAG_CONST,
        |obj, args| {
            let name = StringName::new(args[0].as_str().unwrap_or(""));
            Ok(obj.get_meta(name).unwrap_or_else(|| args[1].clone()))
        },
    );
    b.method(
        "has_meta",
        vec![PropertyInfo::new(VariantKind::String, "name")],
        Some(PropertyInfo::new(VariantKind::Bool, "present")),
        |obj, args| {
            let name = StringName::new(args[0].as_str().unwrap_or(""));
            Ok(Variant::Bool(obj.has_meta(name)))
        },
    );
    b.method(
        "remove_meta",
        vec![PropertyInfo::new(VariantKind::String, "name")],
        None,
        |obj, args| {
            let name = StringName::new(args[0].as_str().unwrap_or(""));
            obj.remove_meta(name);
            Ok(Variant::Nil)
        },
    );
    b.method(
        "queue_delete",
        vec![],
        None,
        |obj, _| {
            obj.queue_delete();
            Ok(Variant::Nil)
        },
    );
    b.method(
        "is_queued_for_deletion",
        vec![],
        Some(PropertyInfo::new(VariantKind::Bool, "queued")),
        |obj, _| Ok(Variant::Bool(obj.is_queued_for_deletion())),
    );
    b.method_full(
        "emit_signal",
        vec![PropertyInfo::new(VariantKind::String, "signal")],
        None,
        vec![],
        nimbus_flags::METHOD_FLAGS_DEFAULT | nimbus_flags::METHOD_FLAG_VARARG,
        |obj, args| {
            let signal = StringName::new(args[0].as_str().unwrap_or(""));
            obj.emit_signal(signal, &args[1..]);
            Ok(Variant::Nil)
        },
    );
}

fn bind_ref_counted(b: &mut ClassBuilder) {
    b.method(
        "get_reference_count",
        vec![],
        Some(PropertyInfo::new(VariantKind::Int, "count")),
        |obj, _| Ok(Variant::Int(obj.ref_get_count() as i64)),
    );
}

static CORE_CLASSES: Once = Once::new();

/// Register the kernel's base classes. Idempotent; must run before any
/// other class registration names them as parents.
pub fn register_core_classes() {
    CORE_CLASSES.call_once(|| {
        class_db().register_class(ClassDescriptor {
            name: "Object",
            parent: None,
            api: ApiLevel::Core,
            exposed: true,
            ref_counted: false,
            singleton: false,
            creation: Some(|| Box::new(())),
            bind: bind_object,
        });
        class_db().register_class(ClassDescriptor {
            name: "RefCounted",
            parent: Some("Object"),
            api: ApiLevel::Core,
            exposed: true,
            ref_counted: true,
            singleton: false,
            creation: Some(|| Box::new(())),
            bind: bind_ref_counted,
        });
        crate::resource::register_resource_classes();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_object() -> Arc<Object> {
        register_core_classes();
        Object::spawn_class("Object").expect("Object instantiable")
    }

    #[test]
    fn spawn_registers_and_free_unregisters() {
        let obj = spawn_object();
        let id = obj.entity_id();
        assert!(entity_registry().resolve(id).is_some());
        assert!(obj.free());
        assert!(entity_registry().resolve(id).is_none());
    }

    #[test]
    fn metadata_map_frees_on_last_erase() {
        let obj = spawn_object();
        let key = StringName::new("tag");
        obj.set_meta(key, Variant::Int(5));
        assert!(obj.has_meta(key));
        assert_eq!(obj.get_meta(key), Some(Variant::Int(5)));
        // Nil assignment erases.
        obj.set_meta(key, Variant::Nil);
        assert!(!obj.has_meta(key));
        assert!(obj.get_meta_list().is_empty());
        obj.free();
    }

    #[test]
    fn connect_emit_disconnect_round_trip() {
        let a = spawn_object();
        let signal = StringName::new("script_changed");
        let hits = Arc::new(AtomicU32::new(0));
        let hits2 = hits.clone();
        let callable = Callable::from_fn("count", move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
            Ok(Variant::Nil)
        });
        a.connect(signal, callable.clone(), 0).unwrap();
        assert!(a.is_connected(signal, &callable));
        a.emit_signal(signal, &[]);
        a.emit_signal(signal, &[]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        a.disconnect(signal, &callable).unwrap();
        assert!(!a.is_connected(signal, &callable));
        a.free();
    }

    #[test]
    fn duplicate_connect_rejected_without_reference_counting() {
        let a = spawn_object();
        let b = spawn_object();
        let signal = StringName::new("script_changed");
        let callable = Callable::method(b.entity_id(), "get_class");
        a.connect(signal, callable.clone(), 0).unwrap();
        assert_eq!(
            a.connect(signal, callable.clone(), 0),
            Err(ConnectError::DuplicateConnection)
        );
        assert_eq!(a.get_signal_connection_list(signal).len(), 1);
        a.free();
        b.free();
    }

    #[test]
    fn reference_counted_connections_stack() {
        let a = spawn_object();
        let b = spawn_object();
        let signal = StringName::new("script_changed");
        let callable = Callable::method(b.entity_id(), "get_class");
        for _ in 0..3 {
            a.connect(signal, callable.clone(), CONNECT_REFERENCE_COUNTED)
                .unwrap();
        }
        // Two plain disconnects only decrement.
        a.disconnect(signal, &callable).unwrap();
        a.disconnect(signal, &callable).unwrap();
        assert!(a.is_connected(signal, &callable));
        a.disconnect(signal, &callable).unwrap();
        assert!(!a.is_connected(signal, &callable));
        a.free();
        b.free();
    }

    #[test]
    fn oneshot_disconnects_after_first_emit() {
        let a = spawn_object();
        let signal = StringName::new("script_changed");
        let hits = Arc::new(AtomicU32::new(0));
        let hits2 = hits.clone();
        let callable = Callable::from_fn("once", move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
            Ok(Variant::Nil)
        });
        a.connect(signal, callable.clone(), CONNECT_ONESHOT).unwrap();
        a.emit_signal(signal, &[]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!a.is_connected(signal, &callable));
        a.emit_signal(signal, &[]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        a.free();
    }

    #[test]
    fn disconnect_during_emit_skips_unreached_target() {
        let a = spawn_object();
        let signal = StringName::new("script_changed");
        let a_id = a.entity_id();
        let late_hits = Arc::new(AtomicU32::new(0));
        let late_hits2 = late_hits.clone();
        let late = Callable::from_fn("late", move |_| {
            late_hits2.fetch_add(1, Ordering::SeqCst);
            Ok(Variant::Nil)
        });
        let late_for_first = late.clone();
        let first = Callable::from_fn("first", move |_| {
            let a = entity_registry().resolve(a_id).expect("emitter alive");
            a.disconnect(StringName::new("script_changed"), &late_for_first)
                .unwrap();
            Ok(Variant::Nil)
        });
        a.connect(signal, first.clone(), 0).unwrap();
        a.connect(signal, late.clone(), 0).unwrap();
        a.emit_signal(signal, &[]);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        assert_eq!(a.get_signal_connection_list(signal).len(), 1);
        a.free();
    }

    #[test]
    fn connect_during_emit_is_not_invoked_this_emit() {
        let a = spawn_object();
        let signal = StringName::new("script_changed");
        let a_id = a.entity_id();
        let new_hits = Arc::new(AtomicU32::new(0));
        let new_hits2 = new_hits.clone();
        let adder = Callable::from_fn("adder", move |_| {
            let a = entity_registry().resolve(a_id).expect("emitter alive");
            let nh = new_hits2.clone();
            let fresh = Callable::from_fn("fresh", move |_| {
                nh.fetch_add(1, Ordering::SeqCst);
                Ok(Variant::Nil)
            });
            let _ = a.connect(StringName::new("script_changed"), fresh, 0);
            Ok(Variant::Nil)
        });
        a.connect(signal, adder, 0).unwrap();
        a.emit_signal(signal, &[]);
        assert_eq!(new_hits.load(Ordering::SeqCst), 0, "fresh handler must wait for the next emit");
        a.free();
    }

    #[test]
    fn back_edges_mirror_forward_slots() {
        let a = spawn_object();
        let b = spawn_object();
        let signal = StringName::new("script_changed");
        let callable = Callable::method(b.entity_id(), "get_class");
        a.connect(signal, callable.clone(), 0).unwrap();
        assert_eq!(b.get_incoming_connections().len(), 1);
        assert_eq!(
            b.get_incoming_connections()[0].signal.object,
            a.entity_id()
        );
        a.disconnect(signal, &callable).unwrap();
        assert!(b.get_incoming_connections().is_empty());
        a.free();
        b.free();
    }

    #[test]
    fn freeing_target_severs_source_slots() {
        let a = spawn_object();
        let b = spawn_object();
        let signal = StringName::new("script_changed");
        let callable = Callable::method(b.entity_id(), "get_class");
        a.connect(signal, callable.clone(), 0).unwrap();
        b.free();
        assert!(!a.is_connected(signal, &callable));
        a.free();
    }

    #[test]
    fn call_routes_through_classdb() {
        let obj = spawn_object();
        let result = obj.call(StringName::new("get_class"), &[]).unwrap();
        assert_eq!(result, Variant::String("Object".into()));
        assert_eq!(
            obj.call(StringName::new("no_such_method"), &[]),
            Err(CallError::InvalidMethod)
        );
        obj.free();
    }

    #[test]
    fn free_rejected_on_referenced_ref_counted() {
        register_core_classes();
        let obj = Object::spawn_class("RefCounted").unwrap();
        obj.init_ref();
        assert_eq!(
            obj.call(StringName::new("free"), &[]),
            Err(CallError::InvalidMethod)
        );
        assert!(obj.unreference());
        assert!(obj.free());
    }

    #[test]
    fn unreference_below_zero_is_tolerated() {
        register_core_classes();
        let obj = Object::spawn_class("RefCounted").unwrap();
        // Misuse: the count is still zero. Logged, never an underflow.
        assert!(!obj.unreference());
        assert_eq!(obj.ref_get_count(), 0);
        obj.init_ref();
        assert!(obj.unreference());
        assert!(obj.free());
    }

    #[test]
    fn dynamic_vars_route_through_access_chain() {
        let obj = spawn_object();
        let name = StringName::new("custom_speed");
        assert!(!obj.set(name, &Variant::Float(2.0)), "undeclared var rejected");
        obj.define_dynamic_var(name, Variant::Float(1.0));
        assert!(obj.set(name, &Variant::Float(2.0)));
        assert_eq!(obj.get(name), Some(Variant::Float(2.0)));
        obj.free();
    }

    #[test]
    fn user_signals_survive_empty_slot_maps() {
        let obj = spawn_object();
        let name = StringName::new("custom_event");
        obj.add_user_signal(MethodInfo::new("custom_event"));
        assert!(obj.has_signal(name));
        let callable = Callable::from_fn("noop", |_| Ok(Variant::Nil));
        obj.connect(name, callable.clone(), 0).unwrap();
        obj.disconnect(name, &callable).unwrap();
        assert!(obj.has_signal(name));
        obj.free();
    }

    #[test]
    fn indexed_access_repacks_value_types() {
        let obj = spawn_object();
        let name = StringName::new("position");
        obj.define_dynamic_var(name, Variant::Vector2(glam::Vec2::new(1.0, 2.0)));
        assert_eq!(
            obj.get_indexed(&["position", "y"]),
            Some(Variant::Float(2.0))
        );
        assert!(obj.set_indexed(&["position", "y"], &Variant::Float(9.0)));
        assert_eq!(
            obj.get(name),
            Some(Variant::Vector2(glam::Vec2::new(1.0, 9.0)))
        );
        obj.free();
    }
}
