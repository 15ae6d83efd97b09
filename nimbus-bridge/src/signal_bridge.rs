// Signal-to-delegate bridge.
//
// A managed event subscribes to a native signal through a DelegateCallable:
// a custom callable that forwards invocations to the runtime's delegate
// table by id. Every live subscription is mirrored in a process-wide
// registry so the reload coordinator can serialize the delegate chains
// before the domain goes down and rebuild them after.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use nimbus_core::{
    entity_registry, Callable, CallResult, ConnectError, CustomCallable, EntityId, StringName,
    Variant,
};
use tracing::warn;

use crate::bindings::managed_language;
use crate::runtime::{handle_managed_exception, InvokeError, ManagedRuntime};

/// Custom callable wrapping a managed delegate id.
pub struct DelegateCallable {
    runtime: Arc<dyn ManagedRuntime>,
    delegate_id: u64,
    owner: EntityId,
    event: StringName,
}

// Keeps delegate identity keys out of the method-callable key space.
const DELEGATE_KEY_TAG: u64 = 1 << 63;

impl DelegateCallable {
    pub fn new(
        runtime: Arc<dyn ManagedRuntime>,
        delegate_id: u64,
        owner: EntityId,
        event: StringName,
    ) -> Arc<DelegateCallable> {
        Arc::new(DelegateCallable {
            runtime,
            delegate_id,
            owner,
            event,
        })
    }

    pub fn delegate_id(&self) -> u64 {
        self.delegate_id
    }
}

impl CustomCallable for DelegateCallable {
    fn call(&self, args: &[Variant]) -> CallResult {
        match self.runtime.invoke_delegate(self.delegate_id, args) {
            Ok(v) => Ok(v),
            Err(InvokeError::Call(e)) => Err(e),
            Err(InvokeError::Exception(msg)) => {
                Ok(handle_managed_exception(self.event.as_str(), &msg))
            }
        }
    }

    fn target_id(&self) -> EntityId {
        self.owner
    }

    fn name(&self) -> String {
        format!("delegate {}#{}", self.event, self.delegate_id)
    }

    fn identity_key(&self) -> u64 {
        DELEGATE_KEY_TAG | self.delegate_id
    }

    fn is_valid(&self) -> bool {
        self.runtime.delegate_is_valid(self.delegate_id)
    }
}

// ---------------------------------------------------------------------------
// Subscription registry
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Subscription {
    source: EntityId,
    signal: StringName,
    owner: EntityId,
    event: StringName,
    flags: u32,
}

static SUBSCRIPTIONS: OnceLock<Mutex<HashMap<u64, Subscription>>> = OnceLock::new();

fn subscriptions() -> &'static Mutex<HashMap<u64, Subscription>> {
    SUBSCRIPTIONS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// A delegate chain captured across reload, together with the connection it
/// must be restored into.
#[derive(Clone, Debug)]
pub struct SerializedDelegate {
    pub source: EntityId,
    pub signal: StringName,
    pub owner: EntityId,
    pub event: StringName,
    pub flags: u32,
    pub data: Vec<Variant>,
}

/// Connect a managed delegate to a native signal.
pub fn connect_event_signal(
    source: &Arc<nimbus_core::Object>,
    signal: StringName,
    owner: EntityId,
    event: StringName,
    delegate_id: u64,
    flags: u32,
) -> Result<(), ConnectError> {
    let Some(lang) = managed_language() else {
        return Err(ConnectError::NullCallable);
    };
    let callable = Callable::custom(DelegateCallable::new(
        lang.runtime(),
        delegate_id,
        owner,
        event,
    ));
    source.connect(signal, callable, flags)?;
    subscriptions().lock().expect("subscriptions poisoned").insert(
        delegate_id,
        Subscription {
            source: source.entity_id(),
            signal,
            owner,
            event,
            flags,
        },
    );
    Ok(())
}

pub fn disconnect_event_signal(
    source: &Arc<nimbus_core::Object>,
    signal: StringName,
    delegate_id: u64,
) -> Result<(), ConnectError> {
    let Some(lang) = managed_language() else {
        return Err(ConnectError::NullCallable);
    };
    let callable = Callable::custom(DelegateCallable::new(
        lang.runtime(),
        delegate_id,
        EntityId::NULL,
        StringName::EMPTY,
    ));
    let result = source.disconnect(signal, &callable);
    if result.is_ok() {
        subscriptions()
            .lock()
            .expect("subscriptions poisoned")
            .remove(&delegate_id);
    }
    result
}

/// Serialize every live subscription's delegate chain. Subscriptions whose
/// source died, or whose delegate captures non-serializable state, are
/// dropped with one warning each.
pub fn serialize_connected_delegates(runtime: &dyn ManagedRuntime) -> Vec<SerializedDelegate> {
    let snapshot: Vec<(u64, Subscription)> = subscriptions()
        .lock()
        .expect("subscriptions poisoned")
        .iter()
        .map(|(id, sub)| (*id, sub.clone()))
        .collect();

    let mut out = Vec::new();
    for (delegate_id, sub) in snapshot {
        if entity_registry().resolve(sub.source).is_none() {
            continue;
        }
        match runtime.serialize_delegate(delegate_id) {
            Some(data) => out.push(SerializedDelegate {
                source: sub.source,
                signal: sub.signal,
                owner: sub.owner,
                event: sub.event,
                flags: sub.flags,
                data,
            }),
            None => {
                warn!(event = %sub.event, "delegate is not serializable; subscription lost across reload");
            }
        }
    }
    out
}

/// Rebuild serialized subscriptions inside a freshly loaded domain.
pub fn restore_delegates(serialized: &[SerializedDelegate], runtime: &Arc<dyn ManagedRuntime>) {
    for record in serialized {
        let Some(source) = entity_registry().resolve(record.source) else {
            continue;
        };
        let Some(delegate_id) = runtime.deserialize_delegate(&record.data) else {
            warn!(event = %record.event, "delegate failed to deserialize after reload");
            continue;
        };
        let callable = Callable::custom(DelegateCallable::new(
            runtime.clone(),
            delegate_id,
            record.owner,
            record.event,
        ));
        if let Err(e) = source.connect(record.signal, callable, record.flags) {
            warn!(signal = %record.signal, error = %e, "delegate reconnection failed after reload");
            continue;
        }
        subscriptions().lock().expect("subscriptions poisoned").insert(
            delegate_id,
            Subscription {
                source: record.source,
                signal: record.signal,
                owner: record.owner,
                event: record.event,
                flags: record.flags,
            },
        );
    }
}

/// Disconnect every registered subscription from its native signal and drop
/// the registry. Called right before the domain unloads; the old runtime
/// must not be invoked through stale connections afterwards.
pub fn sever_all(runtime: &Arc<dyn ManagedRuntime>) {
    let drained: Vec<(u64, Subscription)> = subscriptions()
        .lock()
        .expect("subscriptions poisoned")
        .drain()
        .collect();
    for (delegate_id, sub) in drained {
        let Some(source) = entity_registry().resolve(sub.source) else {
            continue;
        };
        let callable = Callable::custom(DelegateCallable::new(
            runtime.clone(),
            delegate_id,
            sub.owner,
            sub.event,
        ));
        let _ = source.disconnect(sub.signal, &callable);
    }
}
