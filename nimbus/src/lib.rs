// nimbus: user-facing facade crate. Applications depend on this and pull
// the kernel, the managed bridge, and (optionally) the wasm host through
// one dependency.

pub use nimbus_bridge as bridge;
pub use nimbus_core as core;
pub use nimbus_flags as flags;
#[cfg(feature = "wasm-host")]
pub use nimbus_host as host;

pub mod prelude;

// The types nearly every consumer touches, re-exported at the root.
pub use nimbus_core::{
    class_db, entity_registry, message_queue, register_core_classes, Callable, EntityId, Object,
    StringName, Variant, VariantKind,
};
