// nimbus-core: the object kernel.
// Entity registry, ClassDB reflection, Variant, the Object base with its
// signal graph, the deferred message queue, and the resource save façade.
// Foreign-runtime bridging lives in nimbus-bridge; this crate has no
// knowledge of any particular script runtime beyond the traits in `script`.

pub mod callable;
pub mod class_db;
pub mod entity;
pub mod error;
pub mod math;
pub mod message_queue;
pub mod object;
pub mod resource;
pub mod script;
pub mod string_name;
#[cfg(feature = "editor")]
pub mod tooling;
pub mod variant;

// Re-export the primary public API surface.
pub use callable::{Callable, CustomCallable};
pub use class_db::{
    class_db, register_all_from_inventory, ApiLevel, ClassBuilder, ClassDescriptor, ClassInfo,
    ClassRegistration, MethodBind, MethodInfo, PropertyInfo, PropertySetGet,
};
pub use entity::{entity_registry, EntityId, EntityRegistry};
pub use error::{CallError, CallResult, ConnectError, ResourceError};
pub use message_queue::{message_queue, MessageQueue};
pub use object::{register_core_classes, Connection, Object};
pub use resource::{add_resource_format_saver, save_resource, Resource, ResourceFormatSaver};
pub use script::{
    register_script_language, script_language, script_language_count, InstanceBinding,
    InstanceBindingCallbacks, PlaceholderScriptInstance, RpcMethodInfo, RpcMode, Script,
    ScriptInstance, ScriptLanguage, MAX_SCRIPT_LANGUAGES,
};
pub use string_name::StringName;
pub use variant::{Dictionary, ObjectHandle, SignalRef, Variant, VariantKind};

// Re-export glam for downstream math interop.
pub use glam;
