// Scripting interface: the contracts a script runtime fulfills to attach
// behavior to Objects, plus the per-language instance-binding callbacks the
// foreign bridge registers.
//
// Instances use interior mutability and must never hold their own locks
// across calls back into the engine; the kernel clones the instance Arc out
// of the object before invoking it, the same take-then-execute discipline
// the rest of the kernel uses.

use std::any::Any;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use crate::class_db::{MethodInfo, PropertyInfo};
use crate::entity::EntityId;
use crate::error::{CallError, CallResult};
use crate::object::Object;
use crate::string_name::StringName;
use crate::variant::Variant;

// ---------------------------------------------------------------------------
// RPC metadata
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum RpcMode {
    #[default]
    Disabled,
    Remote,
    Master,
    Puppet,
    RemoteSync,
}

#[derive(Clone, Debug)]
pub struct RpcMethodInfo {
    pub name: StringName,
    pub mode: RpcMode,
}

// ---------------------------------------------------------------------------
// Script resource contract
// ---------------------------------------------------------------------------

/// A loadable script definition. Implemented by each script runtime's
/// script resource type.
pub trait Script: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// The exposed class name this script defines, if known.
    fn class_name(&self) -> StringName;

    /// Resource path the script was loaded from.
    fn path(&self) -> String;

    /// Whether the runtime can currently produce executing instances.
    fn can_instantiate(&self) -> bool;

    /// Create an executing instance attached to `owner`.
    fn instance_create(&self, owner: &Arc<Object>) -> Option<Arc<dyn ScriptInstance>>;

    /// Create a non-executing placeholder (editor fallback). Default: a
    /// value-recording placeholder over this script's property list.
    fn placeholder_instance_create(&self, owner: &Arc<Object>) -> Arc<dyn ScriptInstance> {
        Arc::new(PlaceholderScriptInstance::new(
            self.clone_handle(),
            owner.entity_id(),
        ))
    }

    /// An `Arc` to self; implementors return their own handle.
    fn clone_handle(&self) -> Arc<dyn Script>;

    fn has_method(&self, name: StringName) -> bool;

    fn has_script_signal(&self, name: StringName) -> bool;

    fn get_script_signal_list(&self) -> Vec<MethodInfo>;

    fn get_script_property_list(&self) -> Vec<PropertyInfo>;

    /// Tool scripts also execute inside the editor.
    fn is_tool(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Script instance contract
// ---------------------------------------------------------------------------

/// A live script attachment on one Object. The kernel consults it first for
/// every set/get/call, and forwards notifications after (or before, when
/// reversed) the native handlers.
pub trait ScriptInstance: Send + Sync {
    fn script(&self) -> Arc<dyn Script>;

    /// Store a named value. `true` when the instance accepted it.
    fn set(&self, name: StringName, value: &Variant) -> bool;

    fn get(&self, name: StringName) -> Option<Variant>;

    fn call(&self, method: StringName, args: &[Variant]) -> CallResult;

    fn has_method(&self, method: StringName) -> bool;

    fn notification(&self, what: i32);

    fn get_property_list(&self) -> Vec<PropertyInfo>;

    fn get_method_list(&self) -> Vec<MethodInfo>;

    /// Script-provided string representation, if the script overrides it.
    fn to_display_string(&self) -> Option<String> {
        None
    }

    /// Last-resort set, after every other step of the kernel chain failed.
    fn property_set_fallback(&self, _name: StringName, _value: &Variant) -> bool {
        false
    }

    fn property_get_fallback(&self, _name: StringName) -> Option<Variant> {
        None
    }

    fn get_rpc_methods(&self) -> Vec<RpcMethodInfo> {
        Vec::new()
    }

    fn get_rpc_method_id(&self, name: StringName) -> Option<u16> {
        self.get_rpc_methods()
            .iter()
            .position(|m| m.name == name)
            .map(|i| i as u16)
    }

    fn get_rpc_mode_by_id(&self, id: u16) -> RpcMode {
        self.get_rpc_methods()
            .get(id as usize)
            .map(|m| m.mode)
            .unwrap_or(RpcMode::Disabled)
    }

    fn get_rpc_mode(&self, name: StringName) -> RpcMode {
        self.get_rpc_methods()
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.mode)
            .unwrap_or(RpcMode::Disabled)
    }

    /// Placeholders record values without executing.
    fn is_placeholder(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

// ---------------------------------------------------------------------------
// Placeholder instance
// ---------------------------------------------------------------------------

/// Non-executing stand-in used while a script's runtime cannot instantiate
/// (awaiting recompile, failed reload). Records set values so a real
/// instance can be rehydrated later.
pub struct PlaceholderScriptInstance {
    script: Arc<dyn Script>,
    owner: EntityId,
    values: Mutex<Vec<(StringName, Variant)>>,
}

impl PlaceholderScriptInstance {
    pub fn new(script: Arc<dyn Script>, owner: EntityId) -> Self {
        PlaceholderScriptInstance {
            script,
            owner,
            values: Mutex::new(Vec::new()),
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Snapshot of every recorded value, in set order.
    pub fn stored_values(&self) -> Vec<(StringName, Variant)> {
        self.values.lock().expect("placeholder poisoned").clone()
    }
}

impl ScriptInstance for PlaceholderScriptInstance {
    fn script(&self) -> Arc<dyn Script> {
        self.script.clone()
    }

    fn set(&self, name: StringName, value: &Variant) -> bool {
        let mut values = self.values.lock().expect("placeholder poisoned");
        if let Some(slot) = values.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value.clone();
        } else {
            values.push((name, value.clone()));
        }
        true
    }

    fn get(&self, name: StringName) -> Option<Variant> {
        self.values
            .lock()
            .expect("placeholder poisoned")
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    }

    fn call(&self, _method: StringName, _args: &[Variant]) -> CallResult {
        Err(CallError::InvalidMethod)
    }

    fn has_method(&self, _method: StringName) -> bool {
        false
    }

    fn notification(&self, _what: i32) {}

    fn get_property_list(&self) -> Vec<PropertyInfo> {
        self.script.get_script_property_list()
    }

    fn get_method_list(&self) -> Vec<MethodInfo> {
        Vec::new()
    }

    fn is_placeholder(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Instance binding callbacks (per-language slots on every Object)
// ---------------------------------------------------------------------------

/// Opaque per-language binding payload stored in an Object's binding slot.
pub type InstanceBinding = Arc<dyn Any + Send + Sync>;

/// Registered by a foreign-runtime bridge for its language slot. The kernel
/// invokes these on first observation, on every refcount transition, and at
/// teardown.
pub trait InstanceBindingCallbacks: Send + Sync {
    /// Create the binding for an object observed from the foreign side.
    /// Idempotency is the kernel's job; this is called at most once per
    /// object.
    fn alloc(&self, owner: &Arc<Object>) -> InstanceBinding;

    /// The owner is being destroyed; clear the foreign peer's native
    /// pointer and release handles.
    fn free(&self, owner: &Object, binding: InstanceBinding);

    /// Native refcount grew. A weak foreign handle promotes to strong.
    fn refcount_incremented(&self, owner: &Arc<Object>, binding: &InstanceBinding);

    /// Native refcount shrank to `remaining`. Returns true iff the native
    /// object should be destroyed now (refcount reached zero and the
    /// foreign peer is already gone).
    fn refcount_decremented(
        &self,
        owner: &Arc<Object>,
        binding: &InstanceBinding,
        remaining: u32,
    ) -> bool;
}

// ---------------------------------------------------------------------------
// Language registry
// ---------------------------------------------------------------------------

/// A registered script runtime.
pub trait ScriptLanguage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Binding callbacks for this language's slot, if it bridges a foreign
    /// runtime.
    fn binding_callbacks(&self) -> Option<&'static dyn InstanceBindingCallbacks> {
        None
    }

    /// Per-frame hook, called by the main loop after the message queue
    /// drains.
    fn frame(&self) {}
}

/// Fixed number of per-object binding slots.
pub const MAX_SCRIPT_LANGUAGES: usize = 8;

static LANGUAGES: OnceLock<RwLock<Vec<&'static dyn ScriptLanguage>>> = OnceLock::new();

fn languages() -> &'static RwLock<Vec<&'static dyn ScriptLanguage>> {
    LANGUAGES.get_or_init(|| RwLock::new(Vec::new()))
}

/// Register a language and return its binding-slot index.
pub fn register_script_language(lang: &'static dyn ScriptLanguage) -> usize {
    let mut langs = languages().write().expect("language registry poisoned");
    assert!(
        langs.len() < MAX_SCRIPT_LANGUAGES,
        "script language slots exhausted"
    );
    langs.push(lang);
    langs.len() - 1
}

pub fn script_language(index: usize) -> Option<&'static dyn ScriptLanguage> {
    languages()
        .read()
        .expect("language registry poisoned")
        .get(index)
        .copied()
}

pub fn script_language_count() -> usize {
    languages().read().expect("language registry poisoned").len()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyScript;

    impl Script for DummyScript {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn class_name(&self) -> StringName {
            StringName::new("Dummy")
        }
        fn path(&self) -> String {
            "res://dummy.ns".into()
        }
        fn can_instantiate(&self) -> bool {
            false
        }
        fn instance_create(&self, _owner: &Arc<Object>) -> Option<Arc<dyn ScriptInstance>> {
            None
        }
        fn clone_handle(&self) -> Arc<dyn Script> {
            Arc::new(DummyScript)
        }
        fn has_method(&self, _name: StringName) -> bool {
            false
        }
        fn has_script_signal(&self, _name: StringName) -> bool {
            false
        }
        fn get_script_signal_list(&self) -> Vec<MethodInfo> {
            Vec::new()
        }
        fn get_script_property_list(&self) -> Vec<PropertyInfo> {
            Vec::new()
        }
    }

    #[test]
    fn placeholder_records_and_replays_values() {
        let ph =
            PlaceholderScriptInstance::new(Arc::new(DummyScript), EntityId::NULL);
        let name = StringName::new("health");
        assert!(ph.set(name, &Variant::Int(42)));
        assert!(ph.set(name, &Variant::Int(43)));
        assert_eq!(ph.get(name), Some(Variant::Int(43)));
        assert_eq!(ph.stored_values().len(), 1);
        assert!(ph.is_placeholder());
    }

    #[test]
    fn placeholder_rejects_calls() {
        let ph =
            PlaceholderScriptInstance::new(Arc::new(DummyScript), EntityId::NULL);
        assert_eq!(
            ph.call(StringName::new("anything"), &[]),
            Err(CallError::InvalidMethod)
        );
    }
}
