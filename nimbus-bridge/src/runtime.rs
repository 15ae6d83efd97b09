// The managed-runtime contract: a small fixed vtable the engine calls
// through. The native side never touches managed memory; every peer is an
// opaque GC handle, and all traffic goes through these methods.

use std::sync::{OnceLock, RwLock};

use nimbus_core::class_db::{class_db, ApiLevel, MethodInfo, PropertyInfo};
use nimbus_core::{CallError, EntityId, StringName, Variant};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::ReloadError;

/// Opaque identifier of a managed type inside the loaded assembly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ManagedClassId(pub u64);

/// Opaque handle to a managed peer. Strong handles keep the peer alive
/// across GC; weak handles let it be collected.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GcHandle(pub u64);

/// Fully qualified managed type name, as recorded in scripts metadata.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ManagedClassName {
    pub namespace: String,
    pub class_name: String,
}

impl ManagedClassName {
    pub fn new(namespace: &str, class_name: &str) -> Self {
        ManagedClassName {
            namespace: namespace.to_owned(),
            class_name: class_name.to_owned(),
        }
    }
}

impl std::fmt::Display for ManagedClassName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.class_name)
        } else {
            write!(f, "{}.{}", self.namespace, self.class_name)
        }
    }
}

/// Identity strings embedded in a built binding assembly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssemblyInfo {
    pub name: String,
    pub api_hash: String,
    pub api_version: String,
    pub version: String,
}

/// Failure of a call into managed code. Exceptions are separate from
/// structural call errors because policy decides what happens to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    Call(CallError),
    /// The managed code threw; payload is the rendered exception.
    Exception(String),
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokeError::Call(e) => write!(f, "{e}"),
            InvokeError::Exception(msg) => write!(f, "unhandled managed exception: {msg}"),
        }
    }
}

impl std::error::Error for InvokeError {}

pub type InvokeResult = Result<Variant, InvokeError>;

/// The fixed vtable a managed runtime host implements. One instance per
/// loaded managed domain; hot reload swaps the whole instance.
pub trait ManagedRuntime: Send + Sync {
    fn assembly_info(&self) -> AssemblyInfo;

    fn find_class(&self, name: &ManagedClassName) -> Option<ManagedClassId>;

    /// Fallback lookup by unqualified class name, used when scripts
    /// metadata is absent.
    fn find_class_unqualified(&self, class_name: &str) -> Option<ManagedClassName>;

    fn class_has_method(&self, class: ManagedClassId, method: StringName) -> bool;

    fn class_property_list(&self, class: ManagedClassId) -> Vec<PropertyInfo>;

    fn class_signal_list(&self, class: ManagedClassId) -> Vec<MethodInfo>;

    fn class_method_list(&self, _class: ManagedClassId) -> Vec<MethodInfo> {
        Vec::new()
    }

    /// Whether the class is marked to also execute inside the editor.
    fn class_is_tool(&self, _class: ManagedClassId) -> bool {
        false
    }

    /// Construct the managed peer for `owner` and return a strong handle.
    fn create_peer(&self, class: ManagedClassId, owner: EntityId) -> Result<GcHandle, InvokeError>;

    /// Release the handle and let the peer be finalized.
    fn dispose(&self, handle: GcHandle);

    /// Null out the peer's native-pointer field; the peer may outlive the
    /// native object in the GC but must never dereference it again.
    fn clear_native_pointer(&self, handle: GcHandle);

    /// Weak → strong. Returns the replacement handle.
    fn upgrade(&self, handle: GcHandle) -> GcHandle;

    /// Strong → weak. Returns the replacement handle.
    fn downgrade(&self, handle: GcHandle) -> GcHandle;

    /// Whether the peer behind a (weak) handle has been collected.
    fn is_released(&self, handle: GcHandle) -> bool;

    fn get_property(&self, handle: GcHandle, name: StringName) -> Option<Variant>;

    fn set_property(&self, handle: GcHandle, name: StringName, value: &Variant) -> bool;

    fn invoke(&self, handle: GcHandle, method: StringName, args: &[Variant]) -> InvokeResult;

    /// Invoke a managed delegate registered through the signal bridge.
    fn invoke_delegate(&self, delegate_id: u64, args: &[Variant]) -> InvokeResult;

    fn delegate_is_valid(&self, _delegate_id: u64) -> bool {
        true
    }

    /// `TrySerializeDelegate`: a reload-stable form of the delegate chain,
    /// or `None` when the delegate captures non-serializable state.
    fn serialize_delegate(&self, delegate_id: u64) -> Option<Vec<Variant>>;

    /// `TryDeserializeDelegate`: rebuild a delegate in this domain.
    fn deserialize_delegate(&self, data: &[Variant]) -> Option<u64>;

    fn collect_garbage(&self) {}

    /// Finalize and drop domain state ahead of unload. Bounded; a timeout
    /// is logged, never a deadlock.
    fn unload(&self) {}

    fn frame(&self) {}
}

// ---------------------------------------------------------------------------
// Unhandled-exception policy
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum UnhandledExceptionPolicy {
    #[default]
    TerminateApp,
    LogError,
}

static POLICY: OnceLock<RwLock<UnhandledExceptionPolicy>> = OnceLock::new();

fn policy_cell() -> &'static RwLock<UnhandledExceptionPolicy> {
    POLICY.get_or_init(|| RwLock::new(UnhandledExceptionPolicy::default()))
}

pub fn set_unhandled_exception_policy(policy: UnhandledExceptionPolicy) {
    *policy_cell().write().expect("policy poisoned") = policy;
}

/// Effective policy. Editor builds always log; terminating the editor over
/// a script exception would lose user work.
pub fn unhandled_exception_policy() -> UnhandledExceptionPolicy {
    #[cfg(feature = "editor")]
    {
        UnhandledExceptionPolicy::LogError
    }
    #[cfg(not(feature = "editor"))]
    {
        *policy_cell().read().expect("policy poisoned")
    }
}

/// Route a managed exception through the policy. Returns the Variant the
/// interrupted call should produce.
pub fn handle_managed_exception(context: &str, message: &str) -> Variant {
    match unhandled_exception_policy() {
        UnhandledExceptionPolicy::TerminateApp => {
            panic!("unhandled managed exception in {context}: {message}");
        }
        UnhandledExceptionPolicy::LogError => {
            error!(context, exception = message, "unhandled managed exception");
            Variant::Nil
        }
    }
}

// ---------------------------------------------------------------------------
// API-hash cross-check
// ---------------------------------------------------------------------------

/// The API level a managed assembly must match in this build.
pub fn expected_api_level() -> ApiLevel {
    #[cfg(feature = "editor")]
    {
        ApiLevel::Editor
    }
    #[cfg(not(feature = "editor"))]
    {
        ApiLevel::Core
    }
}

/// Refuse an assembly whose embedded hash disagrees with the live ClassDB
/// surface.
pub fn validate_assembly(info: &AssemblyInfo) -> Result<(), ReloadError> {
    let expected = class_db().get_api_hash(expected_api_level());
    if info.api_hash != expected {
        return Err(ReloadError::ApiHashMismatch {
            expected,
            found: info.api_hash.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_api_hash_is_refused() {
        nimbus_core::register_core_classes();
        let info = AssemblyInfo {
            name: "Project".into(),
            api_hash: "deadbeef".into(),
            api_version: "1.0".into(),
            version: "1.0".into(),
        };
        let err = validate_assembly(&info).unwrap_err();
        assert!(matches!(err, ReloadError::ApiHashMismatch { .. }));

        let good = AssemblyInfo {
            api_hash: class_db().get_api_hash(expected_api_level()),
            ..info
        };
        assert!(validate_assembly(&good).is_ok());
    }
}
