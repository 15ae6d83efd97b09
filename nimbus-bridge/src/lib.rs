// Managed interop layer over the nimbus object kernel.
//
// The bridge owns everything that crosses the native/managed boundary:
// the runtime vtable contract, value marshalling, per-object GC-handle
// bindings, script and delegate adapters, scripts metadata, and the
// hot-reload coordinator. The kernel below knows nothing about managed
// code; the host above knows nothing about Objects.

pub mod bindings;
pub mod error;
pub mod marshal;
pub mod metadata;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod reload;
pub mod runtime;
pub mod script;
pub mod signal_bridge;

pub use bindings::{binding_record, init_managed_language, managed_language, managed_peer, BindingRecord, ManagedLanguage};
pub use error::{MarshalError, MetadataError, ReloadError};
pub use marshal::{decode, encode, is_marshallable};
pub use metadata::{resolve_script_class, ScriptsMetadata};
#[cfg(any(test, feature = "test-support"))]
pub use mock::{MockClass, MockRuntime};
pub use reload::{placeholder_owners, ReloadCoordinator, RuntimeFactory};
pub use runtime::{
    expected_api_level, handle_managed_exception, set_unhandled_exception_policy,
    unhandled_exception_policy, validate_assembly, AssemblyInfo, GcHandle, InvokeError,
    InvokeResult, ManagedClassId, ManagedClassName, ManagedRuntime, UnhandledExceptionPolicy,
};
pub use script::{ManagedScript, ManagedScriptInstance};
pub use signal_bridge::{
    connect_event_signal, disconnect_event_signal, restore_delegates,
    serialize_connected_delegates, sever_all, DelegateCallable, SerializedDelegate,
};
