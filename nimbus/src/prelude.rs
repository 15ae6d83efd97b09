// Prelude: one-import access to the most commonly used nimbus types.
//
// Usage: `use nimbus::prelude::*;`

// Kernel types
pub use nimbus_core::{
    class_db, entity_registry, message_queue, register_core_classes, CallError, CallResult,
    Callable, ConnectError, Connection, CustomCallable, EntityId, Object, ResourceError,
    StringName, Variant, VariantKind,
};

// Reflection surface
pub use nimbus_core::class_db::{ApiLevel, ClassInfo, MethodBind, MethodInfo, PropertyInfo};

// Script seam
pub use nimbus_core::{Script, ScriptInstance, ScriptLanguage};

// Resources
pub use nimbus_core::{add_resource_format_saver, save_resource, Resource, ResourceFormatSaver};

// Managed bridge
pub use nimbus_bridge::{
    connect_event_signal, disconnect_event_signal, init_managed_language, managed_language,
    managed_peer, validate_assembly, AssemblyInfo, GcHandle, InvokeError, ManagedClassId,
    ManagedClassName, ManagedRuntime, ManagedScript, ReloadCoordinator, ReloadError,
    UnhandledExceptionPolicy,
};

// Flag constants
pub use nimbus_flags::{
    CONNECT_ONESHOT, CONNECT_PERSIST, CONNECT_QUEUED, CONNECT_REFERENCE_COUNTED,
    NOTIFICATION_POSTINITIALIZE, NOTIFICATION_PREDELETE, PROPERTY_USAGE_DEFAULT,
};

// glam re-exports (math payloads inside Variant)
pub use glam::{Quat, Vec2, Vec3};
