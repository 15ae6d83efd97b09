// Resource base class and the save façade.
//
// Resources are ref-counted objects with an identity path. The path table
// is process-wide: at most one live resource owns a given path, and
// take_over_path evicts the previous owner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use nimbus_flags::{PROPERTY_USAGE_NO_EDITOR, SAVER_FLAG_CHANGE_PATH};
use tracing::{debug, warn};

use crate::class_db::{class_db, ApiLevel, ClassDescriptor, PropertyInfo};
use crate::entity::{entity_registry, EntityId};
use crate::error::ResourceError;
use crate::object::Object;
use crate::string_name::StringName;
use crate::variant::{Variant, VariantKind};

// ---------------------------------------------------------------------------
// Resource class
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ResourceData {
    path: String,
    name: String,
}

static PATH_TABLE: OnceLock<Mutex<HashMap<String, EntityId>>> = OnceLock::new();

fn path_table() -> &'static Mutex<HashMap<String, EntityId>> {
    PATH_TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Typed view over an Object known to be a Resource.
#[derive(Clone)]
pub struct Resource(Arc<Object>);

impl Resource {
    /// Wrap an object, checking its class chain.
    pub fn try_from_object(obj: Arc<Object>) -> Option<Resource> {
        if obj.is_class("Resource") {
            Some(Resource(obj))
        } else {
            None
        }
    }

    pub fn new() -> Option<Resource> {
        Object::spawn_class("Resource").map(Resource)
    }

    pub fn object(&self) -> &Arc<Object> {
        &self.0
    }

    pub fn path(&self) -> String {
        self.0
            .with_class_data(|d: &mut ResourceData| d.path.clone())
            .unwrap_or_default()
    }

    /// Claim `path` for this resource. Fails while another live resource
    /// holds it; use [`take_over_path`](Self::take_over_path) to evict.
    pub fn set_path(&self, path: &str) -> Result<(), ResourceError> {
        self.set_path_inner(path, false)
    }

    /// Claim `path`, clearing it from whichever resource held it before.
    pub fn take_over_path(&self, path: &str) {
        // Cannot collide after eviction.
        self.set_path_inner(path, true).expect("take_over_path");
    }

    fn set_path_inner(&self, path: &str, take_over: bool) -> Result<(), ResourceError> {
        let id = self.0.entity_id();
        let old = self.path();
        if old == path {
            return Ok(());
        }
        {
            let mut table = path_table().lock().expect("resource path table poisoned");
            if !path.is_empty() {
                if let Some(&holder) = table.get(path) {
                    if holder != id && entity_registry().resolve(holder).is_some() {
                        if !take_over {
                            return Err(ResourceError::CantCreate(format!(
                                "another resource already uses path: {path}"
                            )));
                        }
                        if let Some(prev) = entity_registry().resolve(holder) {
                            prev.with_class_data(|d: &mut ResourceData| d.path.clear());
                        }
                    }
                }
                table.insert(path.to_owned(), id);
            }
            if !old.is_empty() {
                if table.get(&old) == Some(&id) {
                    table.remove(&old);
                }
            }
        }
        self.0
            .with_class_data(|d: &mut ResourceData| d.path = path.to_owned());
        Ok(())
    }

    pub fn name(&self) -> String {
        self.0
            .with_class_data(|d: &mut ResourceData| d.name.clone())
            .unwrap_or_default()
    }

    pub fn set_name(&self, name: &str) {
        self.0
            .with_class_data(|d: &mut ResourceData| d.name = name.to_owned());
    }

    /// Notify consumers that the content changed.
    pub fn emit_changed(&self) {
        self.0.emit_signal(StringName::new("changed"), &[]);
    }

    /// Find the live resource registered under `path`.
    pub fn find_by_path(path: &str) -> Option<Resource> {
        let id = *path_table()
            .lock()
            .expect("resource path table poisoned")
            .get(path)?;
        entity_registry().resolve(id).and_then(Resource::try_from_object)
    }
}

fn bind_resource(b: &mut crate::class_db::ClassBuilder) {
    b.signal("changed", vec![]);
    b.method(
        "set_path",
        vec![PropertyInfo::new(VariantKind::String, "path")],
        None,
        |obj, args| {
            let res = resource_view(obj)?;
            let path = args[0].as_str().unwrap_or("");
            if let Err(e) = res.set_path(path) {
                warn!(error = %e, "set_path rejected");
            }
            Ok(Variant::Nil)
        },
    );
    b.method(
        "get_path",
        vec![],
        Some(PropertyInfo::new(VariantKind::String, "path")),
        |obj, _| Ok(Variant::String(resource_view(obj)?.path())),
    );
    b.method(
        "take_over_path",
        vec![PropertyInfo::new(VariantKind::String, "path")],
        None,
        |obj, args| {
            resource_view(obj)?.take_over_path(args[0].as_str().unwrap_or(""));
            Ok(Variant::Nil)
        },
    );
    b.method(
        "set_name",
        vec![PropertyInfo::new(VariantKind::String, "name")],
        None,
        |obj, args| {
            resource_view(obj)?.set_name(args[0].as_str().unwrap_or(""));
            Ok(Variant::Nil)
        },
    );
    b.method(
        "get_name",
        vec![],
        Some(PropertyInfo::new(VariantKind::String, "name")),
        |obj, _| Ok(Variant::String(resource_view(obj)?.name())),
    );
    b.method("emit_changed", vec![], None, |obj, _| {
        resource_view(obj)?.emit_changed();
        Ok(Variant::Nil)
    });
    b.property(
        PropertyInfo::new(VariantKind::String, "resource_path")
            .with_usage(PROPERTY_USAGE_NO_EDITOR),
        "set_path",
        "get_path",
    );
    b.property(
        PropertyInfo::new(VariantKind::String, "resource_name"),
        "set_name",
        "get_name",
    );
}

fn resource_view(obj: &Object) -> Result<Resource, crate::error::CallError> {
    entity_registry()
        .resolve(obj.entity_id())
        .and_then(Resource::try_from_object)
        .ok_or(crate::error::CallError::InstanceNull)
}

pub(crate) fn register_resource_classes() {
    class_db().register_class(ClassDescriptor {
        name: "Resource",
        parent: Some("RefCounted"),
        api: ApiLevel::Core,
        exposed: true,
        ref_counted: true,
        singleton: false,
        creation: Some(|| Box::new(ResourceData::default())),
        bind: bind_resource,
    });
}

// ---------------------------------------------------------------------------
// Save façade
// ---------------------------------------------------------------------------

/// A pluggable format backend. The façade asks each saver in registration
/// order whether it recognizes the resource and the target extension.
pub trait ResourceFormatSaver: Send + Sync {
    fn recognize(&self, resource: &Resource) -> bool;

    /// Extensions this saver can write for `resource`, without dots.
    fn recognized_extensions(&self, resource: &Resource) -> Vec<String>;

    fn save(&self, path: &str, resource: &Resource, flags: u32) -> Result<(), ResourceError>;
}

static SAVERS: OnceLock<RwLock<Vec<Arc<dyn ResourceFormatSaver>>>> = OnceLock::new();

fn savers() -> &'static RwLock<Vec<Arc<dyn ResourceFormatSaver>>> {
    SAVERS.get_or_init(|| RwLock::new(Vec::new()))
}

pub fn add_resource_format_saver(saver: Arc<dyn ResourceFormatSaver>, at_front: bool) {
    let mut list = savers().write().expect("saver registry poisoned");
    if at_front {
        list.insert(0, saver);
    } else {
        list.push(saver);
    }
}

fn extension_of(path: &str) -> &str {
    path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Save `resource` to `path` through the first saver that recognizes both
/// the resource and the path's extension. With SAVER_FLAG_CHANGE_PATH the
/// resource adopts `path` on success.
pub fn save_resource(path: &str, resource: &Resource, flags: u32) -> Result<(), ResourceError> {
    let ext = extension_of(path);
    let candidates: Vec<Arc<dyn ResourceFormatSaver>> = savers()
        .read()
        .expect("saver registry poisoned")
        .iter()
        .cloned()
        .collect();
    for saver in candidates {
        if !saver.recognize(resource) {
            continue;
        }
        if !saver
            .recognized_extensions(resource)
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
        {
            continue;
        }
        saver.save(path, resource, flags)?;
        if flags & SAVER_FLAG_CHANGE_PATH != 0 {
            resource.take_over_path(path);
        }
        debug!(path, "resource saved");
        return Ok(());
    }
    Err(ResourceError::MethodNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::object::register_core_classes;

    fn new_resource() -> Resource {
        register_core_classes();
        Resource::new().expect("Resource instantiable")
    }

    #[test]
    fn path_is_exclusive_until_taken_over() {
        let a = new_resource();
        let b = new_resource();
        a.set_path("res://unit/path_a.tres").unwrap();
        assert!(b.set_path("res://unit/path_a.tres").is_err());
        b.take_over_path("res://unit/path_a.tres");
        assert_eq!(b.path(), "res://unit/path_a.tres");
        assert_eq!(a.path(), "", "evicted resource loses its path");
        a.object().free();
        b.object().free();
    }

    #[test]
    fn find_by_path_resolves_live_resources() {
        let r = new_resource();
        r.set_path("res://unit/find_me.tres").unwrap();
        let found = Resource::find_by_path("res://unit/find_me.tres").expect("registered");
        assert_eq!(found.object().entity_id(), r.object().entity_id());
        r.object().free();
        assert!(Resource::find_by_path("res://unit/find_me.tres").is_none());
    }

    #[test]
    fn resource_path_routes_through_property_chain() {
        let r = new_resource();
        let name = StringName::new("resource_name");
        assert!(r.object().set(name, &Variant::String("mesh".into())));
        assert_eq!(r.object().get(name), Some(Variant::String("mesh".into())));
        assert_eq!(r.name(), "mesh");
        r.object().free();
    }

    struct CountingSaver {
        saves: AtomicU32,
    }

    impl ResourceFormatSaver for CountingSaver {
        fn recognize(&self, _resource: &Resource) -> bool {
            true
        }
        fn recognized_extensions(&self, _resource: &Resource) -> Vec<String> {
            vec!["tres".into()]
        }
        fn save(&self, _path: &str, _resource: &Resource, _flags: u32) -> Result<(), ResourceError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn save_facade_dispatches_by_extension_and_updates_path() {
        let r = new_resource();
        let saver = Arc::new(CountingSaver {
            saves: AtomicU32::new(0),
        });
        add_resource_format_saver(saver.clone(), false);
        assert_eq!(
            save_resource("res://unit/out.unknown_ext", &r, 0),
            Err(ResourceError::MethodNotFound)
        );
        save_resource("res://unit/out.tres", &r, SAVER_FLAG_CHANGE_PATH).unwrap();
        assert_eq!(saver.saves.load(Ordering::SeqCst), 1);
        assert_eq!(r.path(), "res://unit/out.tres");
        r.object().free();
    }
}
