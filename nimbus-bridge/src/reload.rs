// Hot-reload coordinator.
//
// Reload replaces the entire managed domain while native objects stay
// alive. The sequence is strict: capture delegate chains, snapshot every
// managed instance's marshallable properties, detach instances onto
// value-recording placeholders, sever delegate connections, unload the old
// runtime, bring up the new one, verify its API hash, then rehydrate
// instances and reconnect delegates. Any hard failure leaves the
// placeholders in place; a later successful reload picks them up.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use nimbus_core::{entity_registry, EntityId, Object, Script, StringName, Variant};
use tracing::{error, info, warn};

use crate::bindings::managed_language;
use crate::error::ReloadError;
use crate::marshal::is_marshallable;
use crate::runtime::{validate_assembly, ManagedClassName, ManagedRuntime};
use crate::script::{ManagedScript, ManagedScriptInstance};
use crate::signal_bridge::{restore_delegates, serialize_connected_delegates, sever_all};

static RELOAD_LOCK: Mutex<()> = Mutex::new(());

const ON_BEFORE_SERIALIZE: &str = "OnBeforeSerialize";
const ON_AFTER_DESERIALIZE: &str = "OnAfterDeserialize";

/// Everything needed to rebuild one managed instance in a new domain.
struct InstanceState {
    owner: Arc<Object>,
    script: Arc<dyn Script>,
    class: ManagedClassName,
    properties: Vec<(StringName, Variant)>,
}

/// Produces the runtime for a freshly built assembly.
pub type RuntimeFactory<'a> = &'a dyn Fn() -> Result<Arc<dyn ManagedRuntime>, ReloadError>;

pub struct ReloadCoordinator {
    assembly_path: PathBuf,
    last_modified: Mutex<Option<SystemTime>>,
}

impl ReloadCoordinator {
    pub fn new(assembly_path: &Path) -> ReloadCoordinator {
        ReloadCoordinator {
            assembly_path: assembly_path.to_owned(),
            last_modified: Mutex::new(assembly_mtime(assembly_path)),
        }
    }

    pub fn assembly_path(&self) -> &Path {
        &self.assembly_path
    }

    /// Whether the assembly on disk is newer than the one loaded. A missing
    /// file is never a reload trigger; the build may still be running.
    pub fn needs_reload(&self) -> bool {
        let Some(current) = assembly_mtime(&self.assembly_path) else {
            return false;
        };
        match *self.last_modified.lock().expect("coordinator poisoned") {
            Some(loaded) => current > loaded,
            None => true,
        }
    }

    fn mark_loaded(&self) {
        *self.last_modified.lock().expect("coordinator poisoned") =
            assembly_mtime(&self.assembly_path);
    }

    /// Run the full reload sequence. Serialized process-wide; a concurrent
    /// caller blocks until the first reload finishes.
    pub fn reload(&self, factory: RuntimeFactory<'_>) -> Result<(), ReloadError> {
        let _guard = RELOAD_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let Some(lang) = managed_language() else {
            return Err(ReloadError::DomainLoadFailed(
                "managed language not installed".into(),
            ));
        };
        let old = lang.runtime();

        let delegates = serialize_connected_delegates(old.as_ref());
        let snapshots = snapshot_instances();
        info!(
            instances = snapshots.len(),
            delegates = delegates.len(),
            "managed reload starting"
        );

        detach_to_placeholders(&snapshots);
        sever_all(&old);
        old.unload();
        drop(old);

        let fresh = factory()?;
        validate_assembly(&fresh.assembly_info())?;
        lang.set_runtime(fresh.clone());
        self.mark_loaded();

        let mut first_error = None;
        for state in &snapshots {
            if let Err(e) = rehydrate(state, fresh.as_ref()) {
                error!(class = %state.class, error = %e, "instance not restored after reload");
                first_error.get_or_insert(e);
            }
        }
        restore_delegates(&delegates, &fresh);

        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

fn assembly_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

/// Collect every live managed instance with its marshallable property
/// values. Strong `Arc`s keep the owners alive through the swap.
fn snapshot_instances() -> Vec<InstanceState> {
    let mut snapshots = Vec::new();
    entity_registry().each(|obj| {
        let Some(instance) = obj.script_instance() else {
            return;
        };
        if instance
            .as_any()
            .downcast_ref::<ManagedScriptInstance>()
            .is_none()
        {
            return;
        }
        let script = instance.script();
        let Some(class) = script
            .as_any()
            .downcast_ref::<ManagedScript>()
            .map(|s| s.managed_class().clone())
        else {
            return;
        };

        if instance.has_method(StringName::new(ON_BEFORE_SERIALIZE)) {
            if let Err(e) = instance.call(StringName::new(ON_BEFORE_SERIALIZE), &[]) {
                warn!(class = %class, error = %e, "OnBeforeSerialize failed");
            }
        }

        let mut properties = Vec::new();
        for info in instance.get_property_list() {
            let Some(value) = instance.get(info.name) else {
                continue;
            };
            if !is_marshallable(value.kind()) {
                warn!(class = %class, property = %info.name, "property kind does not survive reload; value dropped");
                continue;
            }
            properties.push((info.name, value));
        }

        snapshots.push(InstanceState {
            owner: obj.clone(),
            script,
            class,
            properties,
        });
    });
    snapshots
}

/// Swap each instance for a placeholder pre-loaded with the snapshot
/// values. Dropping the old instance releases its GC handle while the old
/// runtime is still up.
fn detach_to_placeholders(snapshots: &[InstanceState]) {
    for state in snapshots {
        let placeholder = state.script.placeholder_instance_create(&state.owner);
        for (name, value) in &state.properties {
            placeholder.set(*name, value);
        }
        state
            .owner
            .set_script_instance(Some(state.script.clone()), Some(placeholder));
    }
}

fn rehydrate(state: &InstanceState, runtime: &dyn ManagedRuntime) -> Result<(), ReloadError> {
    if runtime.find_class(&state.class).is_none() {
        // Placeholder stays attached; the class may come back next build.
        return Err(ReloadError::ClassMissing(state.class.to_string()));
    }
    let Some(instance) = state.script.instance_create(&state.owner) else {
        return Err(ReloadError::ClassMissing(state.class.to_string()));
    };
    for (name, value) in &state.properties {
        instance.set(*name, value);
    }
    state
        .owner
        .set_script_instance(Some(state.script.clone()), Some(instance.clone()));
    if instance.has_method(StringName::new(ON_AFTER_DESERIALIZE)) {
        if let Err(e) = instance.call(StringName::new(ON_AFTER_DESERIALIZE), &[]) {
            warn!(class = %state.class, error = %e, "OnAfterDeserialize failed");
        }
    }
    Ok(())
}

/// Owners currently parked on a placeholder, for editor diagnostics.
pub fn placeholder_owners() -> Vec<EntityId> {
    let mut owners = Vec::new();
    entity_registry().each(|obj| {
        if let Some(instance) = obj.script_instance() {
            if instance.is_placeholder() {
                owners.push(obj.entity_id());
            }
        }
    });
    owners
}
