// The managed script resource and its live instance adapter.
//
// A ManagedScript names a managed class; attaching it to an Object creates
// a managed peer and routes the kernel's set/get/call/notification chain
// into the runtime. The script keeps a list of owner ids so the reload
// coordinator can find every live instance.

use std::any::Any;
use std::sync::{Arc, Mutex, Weak};

use nimbus_core::class_db::{MethodInfo, PropertyInfo};
use nimbus_core::{CallError, CallResult, EntityId, Object, Script, ScriptInstance, StringName, Variant};

use crate::bindings::managed_language;
use crate::runtime::{
    handle_managed_exception, GcHandle, InvokeError, ManagedClassId, ManagedClassName,
    ManagedRuntime,
};

pub struct ManagedScript {
    class: ManagedClassName,
    path: String,
    weak_self: Weak<ManagedScript>,
    instances: Mutex<Vec<EntityId>>,
}

impl ManagedScript {
    pub fn new(class: ManagedClassName, path: &str) -> Arc<ManagedScript> {
        let path = path.to_owned();
        Arc::new_cyclic(|weak| ManagedScript {
            class,
            path,
            weak_self: weak.clone(),
            instances: Mutex::new(Vec::new()),
        })
    }

    pub fn managed_class(&self) -> &ManagedClassName {
        &self.class
    }

    /// Owners with a live instance of this script, in attach order.
    pub fn instance_owners(&self) -> Vec<EntityId> {
        self.instances.lock().expect("script poisoned").clone()
    }

    fn runtime(&self) -> Option<Arc<dyn ManagedRuntime>> {
        managed_language().map(|l| l.runtime())
    }

    fn class_id(&self) -> Option<ManagedClassId> {
        self.runtime()?.find_class(&self.class)
    }

    fn register_owner(&self, owner: EntityId) {
        self.instances.lock().expect("script poisoned").push(owner);
    }

    fn unregister_owner(&self, owner: EntityId) {
        self.instances
            .lock()
            .expect("script poisoned")
            .retain(|id| *id != owner);
    }
}

impl Script for ManagedScript {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn class_name(&self) -> StringName {
        StringName::new(&self.class.class_name)
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn can_instantiate(&self) -> bool {
        self.class_id().is_some()
    }

    fn instance_create(&self, owner: &Arc<Object>) -> Option<Arc<dyn ScriptInstance>> {
        let runtime = self.runtime()?;
        let class = runtime.find_class(&self.class)?;
        let handle = match runtime.create_peer(class, owner.entity_id()) {
            Ok(h) => h,
            Err(e) => {
                tracing::error!(class = %self.class, error = %e, "script instance creation failed");
                return None;
            }
        };
        self.register_owner(owner.entity_id());
        Some(Arc::new(ManagedScriptInstance {
            script: self.clone_handle_typed(),
            runtime,
            class,
            handle,
            owner: owner.entity_id(),
        }))
    }

    fn clone_handle(&self) -> Arc<dyn Script> {
        self.clone_handle_typed()
    }

    fn has_method(&self, name: StringName) -> bool {
        match (self.runtime(), self.class_id()) {
            (Some(rt), Some(class)) => rt.class_has_method(class, name),
            _ => false,
        }
    }

    fn has_script_signal(&self, name: StringName) -> bool {
        self.get_script_signal_list().iter().any(|s| s.name == name)
    }

    fn get_script_signal_list(&self) -> Vec<MethodInfo> {
        match (self.runtime(), self.class_id()) {
            (Some(rt), Some(class)) => rt.class_signal_list(class),
            _ => Vec::new(),
        }
    }

    fn get_script_property_list(&self) -> Vec<PropertyInfo> {
        match (self.runtime(), self.class_id()) {
            (Some(rt), Some(class)) => rt.class_property_list(class),
            _ => Vec::new(),
        }
    }

    fn is_tool(&self) -> bool {
        match (self.runtime(), self.class_id()) {
            (Some(rt), Some(class)) => rt.class_is_tool(class),
            _ => false,
        }
    }
}

impl ManagedScript {
    fn clone_handle_typed(&self) -> Arc<ManagedScript> {
        self.weak_self.upgrade().expect("script self reference")
    }
}

// ---------------------------------------------------------------------------
// Instance adapter
// ---------------------------------------------------------------------------

pub struct ManagedScriptInstance {
    script: Arc<ManagedScript>,
    // Pinned at creation; a reload replaces the whole instance.
    runtime: Arc<dyn ManagedRuntime>,
    class: ManagedClassId,
    handle: GcHandle,
    owner: EntityId,
}

impl ManagedScriptInstance {
    pub fn gc_handle(&self) -> GcHandle {
        self.handle
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }
}

impl ScriptInstance for ManagedScriptInstance {
    fn script(&self) -> Arc<dyn Script> {
        self.script.clone()
    }

    fn set(&self, name: StringName, value: &Variant) -> bool {
        self.runtime.set_property(self.handle, name, value)
    }

    fn get(&self, name: StringName) -> Option<Variant> {
        self.runtime.get_property(self.handle, name)
    }

    fn call(&self, method: StringName, args: &[Variant]) -> CallResult {
        match self.runtime.invoke(self.handle, method, args) {
            Ok(v) => Ok(v),
            Err(InvokeError::Call(e)) => Err(e),
            Err(InvokeError::Exception(msg)) => {
                Ok(handle_managed_exception(method.as_str(), &msg))
            }
        }
    }

    fn has_method(&self, method: StringName) -> bool {
        self.runtime.class_has_method(self.class, method)
    }

    fn notification(&self, what: i32) {
        let method = StringName::new("_notification");
        if !self.has_method(method) {
            return;
        }
        if let Err(e) = self.call(method, &[Variant::Int(what as i64)]) {
            if e != CallError::InvalidMethod {
                tracing::warn!(owner = %self.owner, what, error = %e, "managed notification failed");
            }
        }
    }

    fn get_property_list(&self) -> Vec<PropertyInfo> {
        self.runtime.class_property_list(self.class)
    }

    fn get_method_list(&self) -> Vec<MethodInfo> {
        self.runtime.class_method_list(self.class)
    }

    fn to_display_string(&self) -> Option<String> {
        let method = StringName::new("to_string");
        if !self.has_method(method) {
            return None;
        }
        self.call(method, &[])
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for ManagedScriptInstance {
    fn drop(&mut self) {
        self.script.unregister_owner(self.owner);
        self.runtime.clear_native_pointer(self.handle);
        self.runtime.dispose(self.handle);
    }
}
