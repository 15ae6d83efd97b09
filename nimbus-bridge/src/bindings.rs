// Per-object managed bindings.
//
// Each Object observed from managed code gets one BindingRecord in its
// language slot: the wrapper class, the GC handle to the managed peer, and
// the handle's current strength. Strength follows the native refcount
// across the [1, 2] boundary: at 1 only the managed side holds the object,
// so the handle goes weak and the GC may collect the peer; at 2+ the native
// side holds it too, so the handle must be strong.

use std::sync::{Arc, Mutex, OnceLock, RwLock};

use nimbus_core::class_db::ClassInfo;
use nimbus_core::{
    register_script_language, EntityId, InstanceBinding, InstanceBindingCallbacks, Object,
    ScriptLanguage,
};
use tracing::{debug, error};

use crate::runtime::{GcHandle, ManagedClassId, ManagedRuntime};

// ---------------------------------------------------------------------------
// Binding record
// ---------------------------------------------------------------------------

struct HandleState {
    handle: GcHandle,
    strong: bool,
}

/// The per-object binding payload stored in the managed language slot.
pub struct BindingRecord {
    class: Option<ManagedClassId>,
    owner: EntityId,
    // Guards strong/weak transitions against concurrent queries.
    state: Mutex<HandleState>,
}

impl BindingRecord {
    pub fn class(&self) -> Option<ManagedClassId> {
        self.class
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn gc_handle(&self) -> GcHandle {
        self.state.lock().expect("binding poisoned").handle
    }

    pub fn is_strong(&self) -> bool {
        self.state.lock().expect("binding poisoned").strong
    }

    fn has_peer(&self) -> bool {
        self.gc_handle() != GcHandle(0)
    }
}

// ---------------------------------------------------------------------------
// Managed language singleton
// ---------------------------------------------------------------------------

/// The managed scripting language registered with the kernel. One per
/// process; hot reload swaps the runtime behind it, never the language.
pub struct ManagedLanguage {
    runtime: RwLock<Arc<dyn ManagedRuntime>>,
    slot: OnceLock<usize>,
}

static LANGUAGE: OnceLock<&'static ManagedLanguage> = OnceLock::new();

/// Install the managed runtime and register the language with the kernel.
/// Idempotent; a second call swaps the runtime (the reload path).
pub fn init_managed_language(runtime: Arc<dyn ManagedRuntime>) -> &'static ManagedLanguage {
    let lang = LANGUAGE.get_or_init(|| {
        Box::leak(Box::new(ManagedLanguage {
            runtime: RwLock::new(runtime.clone()),
            slot: OnceLock::new(),
        }))
    });
    lang.set_runtime(runtime);
    lang.slot.get_or_init(|| register_script_language(*lang));
    lang
}

pub fn managed_language() -> Option<&'static ManagedLanguage> {
    LANGUAGE.get().copied()
}

impl ManagedLanguage {
    pub fn runtime(&self) -> Arc<dyn ManagedRuntime> {
        self.runtime.read().expect("runtime slot poisoned").clone()
    }

    pub(crate) fn set_runtime(&self, runtime: Arc<dyn ManagedRuntime>) {
        *self.runtime.write().expect("runtime slot poisoned") = runtime;
    }

    /// The binding-slot index assigned by the kernel.
    pub fn slot(&self) -> usize {
        *self.slot.get().expect("language not registered")
    }
}

impl ScriptLanguage for ManagedLanguage {
    fn name(&self) -> &'static str {
        "NimbusManaged"
    }

    fn binding_callbacks(&self) -> Option<&'static dyn InstanceBindingCallbacks> {
        Some(&CALLBACKS)
    }

    fn frame(&self) {
        self.runtime().frame();
    }
}

// ---------------------------------------------------------------------------
// Binding callbacks
// ---------------------------------------------------------------------------

static CALLBACKS: ManagedBindingCallbacks = ManagedBindingCallbacks;

struct ManagedBindingCallbacks;

/// Wrapper class lookup: the managed counterpart of the nearest class in
/// the chain the assembly knows about.
fn find_wrapper_class(
    runtime: &dyn ManagedRuntime,
    class: &'static ClassInfo,
) -> Option<ManagedClassId> {
    let mut cursor = Some(class);
    while let Some(ci) = cursor {
        if let Some(name) = runtime.find_class_unqualified(ci.name.as_str()) {
            if let Some(id) = runtime.find_class(&name) {
                return Some(id);
            }
        }
        cursor = ci.parent();
    }
    None
}

impl InstanceBindingCallbacks for ManagedBindingCallbacks {
    fn alloc(&self, owner: &Arc<Object>) -> InstanceBinding {
        let Some(lang) = managed_language() else {
            return Arc::new(BindingRecord {
                class: None,
                owner: owner.entity_id(),
                state: Mutex::new(HandleState {
                    handle: GcHandle(0),
                    strong: false,
                }),
            });
        };
        let runtime = lang.runtime();
        let class = find_wrapper_class(runtime.as_ref(), owner.class());
        let mut handle = GcHandle(0);
        let mut strong = false;
        if let Some(class) = class {
            match runtime.create_peer(class, owner.entity_id()) {
                Ok(h) => {
                    handle = h;
                    strong = true;
                    // A lone managed reference must not pin the object.
                    if owner.is_ref_counted() && owner.ref_get_count() <= 1 {
                        handle = runtime.downgrade(handle);
                        strong = false;
                    }
                }
                Err(e) => {
                    error!(class = %owner.class_name(), error = %e, "managed peer creation failed");
                }
            }
        } else {
            debug!(class = %owner.class_name(), "no managed wrapper class; binding left empty");
        }
        Arc::new(BindingRecord {
            class,
            owner: owner.entity_id(),
            state: Mutex::new(HandleState { handle, strong }),
        })
    }

    fn free(&self, _owner: &Object, binding: InstanceBinding) {
        let Ok(record) = binding.downcast::<BindingRecord>() else {
            return;
        };
        let Some(lang) = managed_language() else {
            return;
        };
        if record.has_peer() {
            let runtime = lang.runtime();
            let handle = record.gc_handle();
            runtime.clear_native_pointer(handle);
            runtime.dispose(handle);
        }
    }

    fn refcount_incremented(&self, owner: &Arc<Object>, binding: &InstanceBinding) {
        let Some(record) = binding.downcast_ref::<BindingRecord>() else {
            return;
        };
        if !owner.is_ref_counted() || !record.has_peer() {
            return;
        }
        let Some(lang) = managed_language() else {
            return;
        };
        if owner.ref_get_count() >= 2 {
            let runtime = lang.runtime();
            let mut state = record.state.lock().expect("binding poisoned");
            if !state.strong {
                state.handle = runtime.upgrade(state.handle);
                state.strong = true;
            }
        }
    }

    fn refcount_decremented(
        &self,
        owner: &Arc<Object>,
        binding: &InstanceBinding,
        remaining: u32,
    ) -> bool {
        let Some(record) = binding.downcast_ref::<BindingRecord>() else {
            return remaining == 0;
        };
        if !owner.is_ref_counted() || !record.has_peer() {
            return remaining == 0;
        }
        let Some(lang) = managed_language() else {
            return remaining == 0;
        };
        let runtime = lang.runtime();
        let handle = {
            let mut state = record.state.lock().expect("binding poisoned");
            if remaining == 1 && state.strong {
                state.handle = runtime.downgrade(state.handle);
                state.strong = false;
            }
            state.handle
        };
        remaining == 0 && runtime.is_released(handle)
    }
}

// ---------------------------------------------------------------------------
// Peer access
// ---------------------------------------------------------------------------

/// The managed peer of `obj`, created lazily on first observation.
/// `None` when the language is not installed or the assembly has no
/// wrapper class for the object's chain.
pub fn managed_peer(obj: &Arc<Object>) -> Option<GcHandle> {
    let lang = managed_language()?;
    let binding = obj.get_instance_binding(lang.slot())?;
    let record = binding.downcast_ref::<BindingRecord>()?;
    if record.has_peer() {
        Some(record.gc_handle())
    } else {
        None
    }
}

/// The binding record of `obj`, if one was ever allocated.
pub fn binding_record(obj: &Arc<Object>) -> Option<Arc<BindingRecord>> {
    let lang = managed_language()?;
    let binding = obj.get_instance_binding(lang.slot())?;
    binding.downcast::<BindingRecord>().ok()
}
