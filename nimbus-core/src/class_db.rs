// ClassDB: the process-wide runtime type registry.
//
// Each registered class gets a leaked `&'static ClassInfo` record holding
// its dispatch tables. Dynamic dispatch goes through MethodBind thunks, not
// Rust inheritance; see the Object kernel for the lookup chain.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use nimbus_flags::{METHOD_FLAGS_DEFAULT, PROPERTY_USAGE_DEFAULT, PROPERTY_USAGE_NIL_IS_VARIANT};
use tracing::warn;

use crate::error::{CallError, CallResult};
use crate::object::Object;
use crate::string_name::StringName;
use crate::variant::{Variant, VariantKind};

// ---------------------------------------------------------------------------
// Metadata records
// ---------------------------------------------------------------------------

/// Which binding surface a class belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ApiLevel {
    Core,
    Editor,
    /// Internal classes never exposed to bindings.
    None,
}

impl ApiLevel {
    pub fn name(&self) -> &'static str {
        match self {
            ApiLevel::Core => "core",
            ApiLevel::Editor => "editor",
            ApiLevel::None => "none",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyInfo {
    pub name: StringName,
    pub kind: VariantKind,
    /// For Object kinds, the expected class name.
    pub class_name: StringName,
    pub hint: u32,
    pub hint_string: String,
    pub usage: u32,
}

impl PropertyInfo {
    pub fn new(kind: VariantKind, name: impl Into<StringName>) -> Self {
        PropertyInfo {
            name: name.into(),
            kind,
            class_name: StringName::EMPTY,
            hint: nimbus_flags::PROPERTY_HINT_NONE,
            hint_string: String::new(),
            usage: PROPERTY_USAGE_DEFAULT,
        }
    }

    pub fn with_usage(mut self, usage: u32) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_hint(mut self, hint: u32, hint_string: &str) -> Self {
        self.hint = hint;
        self.hint_string = hint_string.to_owned();
        self
    }

    pub fn with_class(mut self, class: impl Into<StringName>) -> Self {
        self.class_name = class.into();
        self
    }

    /// Whether any Variant kind is acceptable for this slot.
    pub fn accepts_any(&self) -> bool {
        self.kind == VariantKind::Nil || self.usage & PROPERTY_USAGE_NIL_IS_VARIANT != 0
    }
}

/// Declaration-only signature: signals and virtual methods.
#[derive(Clone, Debug)]
pub struct MethodInfo {
    pub name: StringName,
    pub return_type: Option<PropertyInfo>,
    pub args: Vec<PropertyInfo>,
    pub flags: u32,
}

impl MethodInfo {
    pub fn new(name: impl Into<StringName>) -> Self {
        MethodInfo {
            name: name.into(),
            return_type: None,
            args: Vec::new(),
            flags: METHOD_FLAGS_DEFAULT,
        }
    }

    pub fn with_args(mut self, args: Vec<PropertyInfo>) -> Self {
        self.args = args;
        self
    }

    pub fn with_return(mut self, ret: PropertyInfo) -> Self {
        self.return_type = Some(ret);
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }
}

type MethodFn = Box<dyn Fn(&Object, &[Variant]) -> CallResult + Send + Sync>;

/// A bound native method: signature + thunk. Argument validation and
/// default filling happen here so every caller (script, bridge, signal
/// dispatch) gets identical semantics.
pub struct MethodBind {
    pub name: StringName,
    pub flags: u32,
    pub return_type: Option<PropertyInfo>,
    pub args: Vec<PropertyInfo>,
    pub default_args: Vec<Variant>,
    func: MethodFn,
}

impl MethodBind {
    pub fn is_vararg(&self) -> bool {
        self.flags & nimbus_flags::METHOD_FLAG_VARARG != 0
    }

    /// Validate and dispatch. Extra args beyond the signature are rejected
    /// unless the method is vararg; missing trailing args fill from
    /// defaults.
    pub fn call(&self, obj: &Object, args: &[Variant]) -> CallResult {
        let declared = self.args.len();
        let required = declared - self.default_args.len().min(declared);

        if args.len() < required {
            return Err(CallError::TooFewArguments { expected: required });
        }
        if args.len() > declared && !self.is_vararg() {
            return Err(CallError::TooManyArguments { expected: declared });
        }

        for (i, arg) in args.iter().enumerate().take(declared) {
            let slot = &self.args[i];
            if !slot.accepts_any() && !arg.compatible_with(slot.kind) {
                return Err(CallError::InvalidArgument {
                    index: i,
                    expected: slot.kind,
                });
            }
        }

        if args.len() >= declared {
            (self.func)(obj, args)
        } else {
            let mut full: Vec<Variant> = args.to_vec();
            let defaults_start = self.default_args.len() - (declared - args.len());
            full.extend_from_slice(&self.default_args[defaults_start..]);
            (self.func)(obj, &full)
        }
    }
}

impl std::fmt::Debug for MethodBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodBind")
            .field("name", &self.name)
            .field("args", &self.args.len())
            .field("flags", &self.flags)
            .finish()
    }
}

/// Property accessor routing: the setter/getter method names registered
/// alongside a PropertyInfo.
#[derive(Clone, Debug)]
pub struct PropertySetGet {
    pub setter: StringName,
    pub getter: StringName,
}

pub type CreationFn = fn() -> Box<dyn Any + Send>;
pub type NotificationFn = fn(&Object, i32);
pub type SetFn = fn(&Object, StringName, &Variant) -> bool;
pub type GetFn = fn(&Object, StringName) -> Option<Variant>;
pub type ToStringFn = fn(&Object) -> String;

// ---------------------------------------------------------------------------
// ClassInfo
// ---------------------------------------------------------------------------

pub struct ClassInfo {
    pub name: StringName,
    pub api: ApiLevel,
    pub exposed: bool,
    pub ref_counted: bool,
    pub singleton: bool,
    parent: Option<&'static ClassInfo>,
    creation: Option<CreationFn>,
    notification_fn: Option<NotificationFn>,
    set_fn: Option<SetFn>,
    get_fn: Option<GetFn>,
    to_string_fn: Option<ToStringFn>,
    methods: HashMap<StringName, Arc<MethodBind>>,
    signals: HashMap<StringName, MethodInfo>,
    properties: Vec<PropertyInfo>,
    setget: HashMap<StringName, PropertySetGet>,
    constants: Vec<(StringName, i64)>,
    enums: Vec<(StringName, Vec<StringName>)>,
    virtual_methods: Vec<MethodInfo>,
}

impl ClassInfo {
    pub fn parent(&self) -> Option<&'static ClassInfo> {
        self.parent
    }

    /// Whether the class can be directly instantiated (has a creation func
    /// somewhere in its chain and is not abstract at this level).
    pub fn can_instantiate(&self) -> bool {
        self.creation.is_some()
    }

    pub(crate) fn create_class_data(&self) -> Option<Box<dyn Any + Send>> {
        self.creation.map(|f| f())
    }

    /// Find a method in this class or any ancestor.
    pub fn find_method(&self, name: StringName) -> Option<Arc<MethodBind>> {
        let mut cursor = Some(self);
        while let Some(ci) = cursor {
            if let Some(m) = ci.methods.get(&name) {
                return Some(m.clone());
            }
            cursor = ci.parent;
        }
        None
    }

    pub fn has_method(&self, name: StringName) -> bool {
        self.find_method(name).is_some()
    }

    /// Find a signal declaration in this class or any ancestor.
    pub fn find_signal(&self, name: StringName) -> Option<MethodInfo> {
        let mut cursor = Some(self);
        while let Some(ci) = cursor {
            if let Some(s) = ci.signals.get(&name) {
                return Some(s.clone());
            }
            cursor = ci.parent;
        }
        None
    }

    pub fn has_signal(&self, name: StringName) -> bool {
        self.find_signal(name).is_some()
    }

    /// Accessor routing for a named property, searching up the chain.
    pub fn find_setget(&self, name: StringName) -> Option<&PropertySetGet> {
        let mut cursor = Some(self);
        while let Some(ci) = cursor {
            if let Some(sg) = ci.setget.get(&name) {
                return Some(sg);
            }
            cursor = ci.parent;
        }
        None
    }

    /// Properties declared by this class only, in declaration order.
    pub fn own_properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    /// Full property list, ancestors first, each class in declaration order.
    pub fn property_list(&self) -> Vec<PropertyInfo> {
        let mut chain: Vec<&ClassInfo> = Vec::new();
        let mut cursor = Some(self);
        while let Some(ci) = cursor {
            chain.push(ci);
            cursor = ci.parent;
        }
        let mut out = Vec::new();
        for ci in chain.iter().rev() {
            out.extend(ci.properties.iter().cloned());
        }
        out
    }

    /// Signals declared by this class only, sorted by name.
    pub fn own_signals(&self) -> Vec<MethodInfo> {
        let mut v: Vec<MethodInfo> = self.signals.values().cloned().collect();
        v.sort_by_key(|s| s.name.as_str());
        v
    }

    /// Methods declared by this class only, sorted by name.
    pub fn own_methods(&self) -> Vec<Arc<MethodBind>> {
        let mut v: Vec<Arc<MethodBind>> = self.methods.values().cloned().collect();
        v.sort_by_key(|m| m.name.as_str());
        v
    }

    pub fn own_constants(&self) -> &[(StringName, i64)] {
        &self.constants
    }

    pub fn own_enums(&self) -> &[(StringName, Vec<StringName>)] {
        &self.enums
    }

    pub fn own_virtual_methods(&self) -> &[MethodInfo] {
        &self.virtual_methods
    }

    pub fn find_constant(&self, name: StringName) -> Option<i64> {
        let mut cursor = Some(self);
        while let Some(ci) = cursor {
            if let Some((_, v)) = ci.constants.iter().find(|(n, _)| *n == name) {
                return Some(*v);
            }
            cursor = ci.parent;
        }
        None
    }

    pub fn is_parent_of(&self, other: &ClassInfo) -> bool {
        let mut cursor = Some(other);
        while let Some(ci) = cursor {
            if std::ptr::eq(ci, self) {
                return true;
            }
            cursor = ci.parent;
        }
        false
    }

    pub(crate) fn notification_chain(&self) -> Vec<NotificationFn> {
        // Base-first order.
        let mut chain = Vec::new();
        let mut cursor = Some(self);
        while let Some(ci) = cursor {
            if let Some(f) = ci.notification_fn {
                chain.push(f);
            }
            cursor = ci.parent;
        }
        chain.reverse();
        chain
    }

    pub(crate) fn set_hook(&self) -> Option<SetFn> {
        let mut cursor = Some(self);
        while let Some(ci) = cursor {
            if ci.set_fn.is_some() {
                return ci.set_fn;
            }
            cursor = ci.parent;
        }
        None
    }

    pub(crate) fn get_hook(&self) -> Option<GetFn> {
        let mut cursor = Some(self);
        while let Some(ci) = cursor {
            if ci.get_fn.is_some() {
                return ci.get_fn;
            }
            cursor = ci.parent;
        }
        None
    }

    pub(crate) fn to_string_hook(&self) -> Option<ToStringFn> {
        let mut cursor = Some(self);
        while let Some(ci) = cursor {
            if ci.to_string_fn.is_some() {
                return ci.to_string_fn;
            }
            cursor = ci.parent;
        }
        None
    }
}

impl std::fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.name)
            .field("parent", &self.parent.map(|p| p.name))
            .field("api", &self.api)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ClassBuilder — the bind_methods surface
// ---------------------------------------------------------------------------

pub struct ClassBuilder {
    info: ClassInfo,
}

impl ClassBuilder {
    pub fn method(
        &mut self,
        name: &str,
        args: Vec<PropertyInfo>,
        return_type: Option<PropertyInfo>,
        func: impl Fn(&Object, &[Variant]) -> CallResult + Send + Sync + 'static,
    ) -> &mut Self {
        self.method_full(name, args, return_type, Vec::new(), METHOD_FLAGS_DEFAULT, func)
    }

    pub fn method_full(
        &mut self,
        name: &str,
        args: Vec<PropertyInfo>,
        return_type: Option<PropertyInfo>,
        default_args: Vec<Variant>,
        flags: u32,
        func: impl Fn(&Object, &[Variant]) -> CallResult + Send + Sync + 'static,
    ) -> &mut Self {
        let name = StringName::new(name);
        debug_assert!(
            default_args.len() <= args.len(),
            "more defaults than arguments on {name}"
        );
        self.info.methods.insert(
            name,
            Arc::new(MethodBind {
                name,
                flags,
                return_type,
                args,
                default_args,
                func: Box::new(func),
            }),
        );
        self
    }

    pub fn signal(&mut self, name: &str, args: Vec<PropertyInfo>) -> &mut Self {
        let name = StringName::new(name);
        self.info
            .signals
            .insert(name, MethodInfo::new(name.as_str()).with_args(args));
        self
    }

    /// Declare a property routed through already-bound accessor methods.
    pub fn property(&mut self, info: PropertyInfo, setter: &str, getter: &str) -> &mut Self {
        let name = info.name;
        self.info.properties.push(info);
        self.info.setget.insert(
            name,
            PropertySetGet {
                setter: StringName::new(setter),
                getter: StringName::new(getter),
            },
        );
        self
    }

    /// Declare a category/grouping marker for tools.
    pub fn category(&mut self, name: &str) -> &mut Self {
        self.info.properties.push(
            PropertyInfo::new(VariantKind::Nil, name)
                .with_usage(nimbus_flags::PROPERTY_USAGE_CATEGORY),
        );
        self
    }

    pub fn constant(&mut self, name: &str, value: i64) -> &mut Self {
        self.info.constants.push((StringName::new(name), value));
        self
    }

    /// Register an enum: the member list under the enum's name, plus each
    /// member as a plain class constant (the generator de-prefixes later).
    pub fn enum_constants(&mut self, enum_name: &str, members: &[(&str, i64)]) -> &mut Self {
        let names = members.iter().map(|(n, _)| StringName::new(n)).collect();
        self.info.enums.push((StringName::new(enum_name), names));
        for (n, v) in members {
            self.info.constants.push((StringName::new(n), *v));
        }
        self
    }

    /// Declare a contract-only signature a script may implement.
    pub fn virtual_method(&mut self, info: MethodInfo) -> &mut Self {
        self.info.virtual_methods.push(info);
        self
    }

    pub fn notification_hook(&mut self, f: NotificationFn) -> &mut Self {
        self.info.notification_fn = Some(f);
        self
    }

    pub fn set_hook(&mut self, f: SetFn) -> &mut Self {
        self.info.set_fn = Some(f);
        self
    }

    pub fn get_hook(&mut self, f: GetFn) -> &mut Self {
        self.info.get_fn = Some(f);
        self
    }

    pub fn to_string_hook(&mut self, f: ToStringFn) -> &mut Self {
        self.info.to_string_fn = Some(f);
        self
    }
}

// ---------------------------------------------------------------------------
// Class descriptor + registry
// ---------------------------------------------------------------------------

/// Static description of a class; `bind` runs once at registration to fill
/// the dispatch tables.
#[derive(Clone, Copy)]
pub struct ClassDescriptor {
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub api: ApiLevel,
    pub exposed: bool,
    pub ref_counted: bool,
    pub singleton: bool,
    /// Absent ⇒ abstract (not directly instantiable).
    pub creation: Option<CreationFn>,
    pub bind: fn(&mut ClassBuilder),
}

/// Submitted via `inventory` for process-wide auto-registration.
pub struct ClassRegistration {
    pub descriptor: fn() -> ClassDescriptor,
}

inventory::collect!(ClassRegistration);

pub struct ClassDb {
    classes: RwLock<HashMap<StringName, &'static ClassInfo>>,
    // Serializes registration so parent lookups observe a consistent map.
    register_lock: Mutex<()>,
}

static CLASS_DB: OnceLock<ClassDb> = OnceLock::new();

/// The process-wide ClassDB singleton.
pub fn class_db() -> &'static ClassDb {
    CLASS_DB.get_or_init(|| ClassDb {
        classes: RwLock::new(HashMap::new()),
        register_lock: Mutex::new(()),
    })
}

/// Register every class submitted through `inventory`. Parents must sort
/// before children, so this loops until a fixed point.
pub fn register_all_from_inventory() {
    let mut pending: Vec<ClassDescriptor> = inventory::iter::<ClassRegistration>
        .into_iter()
        .map(|r| (r.descriptor)())
        .collect();

    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|d| {
            let parent_ready = d
                .parent
                .map(|p| class_db().get(StringName::new(p)).is_some())
                .unwrap_or(true);
            if parent_ready {
                class_db().register_class(*d);
                false
            } else {
                true
            }
        });
        if pending.len() == before {
            for d in &pending {
                warn!(class = d.name, parent = ?d.parent, "class registration skipped: parent never registered");
            }
            break;
        }
    }
}

impl ClassDb {
    /// Register a class. Idempotent: re-registering an existing name is a
    /// no-op.
    pub fn register_class(&self, desc: ClassDescriptor) -> &'static ClassInfo {
        let _guard = self.register_lock.lock().expect("classdb poisoned");
        let name = StringName::new(desc.name);
        if let Some(existing) = self.get(name) {
            return existing;
        }

        let parent = desc.parent.map(|p| {
            self.get(StringName::new(p))
                .unwrap_or_else(|| panic!("parent class not registered: {p}"))
        });

        let mut builder = ClassBuilder {
            info: ClassInfo {
                name,
                api: desc.api,
                exposed: desc.exposed,
                ref_counted: desc.ref_counted
                    || parent.map(|p| p.ref_counted).unwrap_or(false),
                singleton: desc.singleton,
                parent,
                creation: desc.creation,
                notification_fn: None,
                set_fn: None,
                get_fn: None,
                to_string_fn: None,
                methods: HashMap::new(),
                signals: HashMap::new(),
                properties: Vec::new(),
                setget: HashMap::new(),
                constants: Vec::new(),
                enums: Vec::new(),
                virtual_methods: Vec::new(),
            },
        };
        (desc.bind)(&mut builder);

        let leaked: &'static ClassInfo = Box::leak(Box::new(builder.info));
        self.classes
            .write()
            .expect("classdb poisoned")
            .insert(name, leaked);
        leaked
    }

    pub fn get(&self, name: StringName) -> Option<&'static ClassInfo> {
        self.classes
            .read()
            .expect("classdb poisoned")
            .get(&name)
            .copied()
    }

    pub fn has_class(&self, name: StringName) -> bool {
        self.get(name).is_some()
    }

    pub fn has_method(&self, class: StringName, method: StringName) -> bool {
        self.get(class).map(|c| c.has_method(method)).unwrap_or(false)
    }

    pub fn has_signal(&self, class: StringName, signal: StringName) -> bool {
        self.get(class).map(|c| c.has_signal(signal)).unwrap_or(false)
    }

    pub fn is_parent_class(&self, child: StringName, ancestor: StringName) -> bool {
        match (self.get(child), self.get(ancestor)) {
            (Some(c), Some(a)) => a.is_parent_of(c),
            _ => false,
        }
    }

    pub fn get_parent_class(&self, class: StringName) -> Option<StringName> {
        self.get(class)?.parent().map(|p| p.name)
    }

    /// All registered class names, sorted.
    pub fn get_class_list(&self) -> Vec<StringName> {
        let mut v: Vec<StringName> = self
            .classes
            .read()
            .expect("classdb poisoned")
            .keys()
            .copied()
            .collect();
        v.sort_by_key(|n| n.as_str());
        v
    }

    pub fn get_inheriters_from_class(&self, ancestor: StringName) -> Vec<StringName> {
        let Some(anc) = self.get(ancestor) else {
            return Vec::new();
        };
        let mut v: Vec<StringName> = self
            .classes
            .read()
            .expect("classdb poisoned")
            .values()
            .filter(|c| !std::ptr::eq(**c, anc) && anc.is_parent_of(c))
            .map(|c| c.name)
            .collect();
        v.sort_by_key(|n| n.as_str());
        v
    }

    pub fn can_instantiate(&self, class: StringName) -> bool {
        self.get(class).map(|c| c.can_instantiate()).unwrap_or(false)
    }

    /// Instantiate a class by name. Fails for unknown or abstract classes,
    /// and for editor classes outside editor builds.
    pub fn instantiate(&self, class: StringName) -> Option<Arc<Object>> {
        let info = self.get(class)?;
        if !info.can_instantiate() {
            warn!(class = %class, "cannot instantiate abstract class");
            return None;
        }
        #[cfg(not(feature = "editor"))]
        if info.api == ApiLevel::Editor {
            tracing::error!(class = %class, "editor-only class instantiated outside the editor");
            return None;
        }
        Some(Object::spawn(info))
    }

    /// Write a property through its registered setter. `None` means the
    /// property does not exist on the class chain.
    pub fn set_property(
        &self,
        obj: &Object,
        name: StringName,
        value: &Variant,
    ) -> Option<Result<(), CallError>> {
        let sg = obj.class().find_setget(name)?;
        let setter = obj.class().find_method(sg.setter)?;
        Some(setter.call(obj, std::slice::from_ref(value)).map(|_| ()))
    }

    /// Read a property through its registered getter.
    pub fn get_property(&self, obj: &Object, name: StringName) -> Option<CallResult> {
        let sg = obj.class().find_setget(name)?;
        let getter = obj.class().find_method(sg.getter)?;
        Some(getter.call(obj, &[]))
    }

    /// Deterministic hash over every exposed name/signature at the given
    /// API level. Core hashes only core classes; Editor hashes core +
    /// editor. Stable across process restarts for the same surface.
    pub fn get_api_hash(&self, level: ApiLevel) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in self.get_class_list() {
            let ci = self.get(name).expect("listed class vanished");
            if !ci.exposed {
                continue;
            }
            let included = match level {
                ApiLevel::Core => ci.api == ApiLevel::Core,
                ApiLevel::Editor => ci.api == ApiLevel::Core || ci.api == ApiLevel::Editor,
                ApiLevel::None => false,
            };
            if !included {
                continue;
            }
            hasher.update(b"class");
            hasher.update(ci.name.as_str().as_bytes());
            if let Some(p) = ci.parent() {
                hasher.update(p.name.as_str().as_bytes());
            }
            for m in ci.own_methods() {
                hasher.update(b"method");
                hasher.update(m.name.as_str().as_bytes());
                hasher.update(&m.flags.to_le_bytes());
                if let Some(ret) = &m.return_type {
                    hasher.update(ret.kind.name().as_bytes());
                }
                for a in &m.args {
                    hasher.update(a.kind.name().as_bytes());
                    hasher.update(a.name.as_str().as_bytes());
                }
                hasher.update(&(m.default_args.len() as u32).to_le_bytes());
            }
            for s in ci.own_signals() {
                hasher.update(b"signal");
                hasher.update(s.name.as_str().as_bytes());
                for a in &s.args {
                    hasher.update(a.kind.name().as_bytes());
                }
            }
            for p in ci.own_properties() {
                hasher.update(b"property");
                hasher.update(p.name.as_str().as_bytes());
                hasher.update(p.kind.name().as_bytes());
                hasher.update(&p.usage.to_le_bytes());
            }
            for (n, v) in ci.own_constants() {
                hasher.update(b"constant");
                hasher.update(n.as_str().as_bytes());
                hasher.update(&v.to_le_bytes());
            }
            for (n, members) in ci.own_enums() {
                hasher.update(b"enum");
                hasher.update(n.as_str().as_bytes());
                for m in members {
                    hasher.update(m.as_str().as_bytes());
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::register_core_classes;

    fn bind_test_class(b: &mut ClassBuilder) {
        b.method(
            "add",
            vec![
                PropertyInfo::new(VariantKind::Int, "a"),
                PropertyInfo::new(VariantKind::Int, "b"),
            ],
            Some(PropertyInfo::new(VariantKind::Int, "sum")),
            |_obj, args| {
                Ok(Variant::Int(
                    args[0].as_int().unwrap_or(0) + args[1].as_int().unwrap_or(0),
                ))
            },
        );
        b.signal("changed", vec![PropertyInfo::new(VariantKind::Int, "value")]);
        b.constant("MAX_DEPTH", 8);
        b.enum_constants("Mode", &[("MODE_IDLE", 0), ("MODE_ACTIVE", 1)]);
    }

    fn register_test_class() -> &'static ClassInfo {
        register_core_classes();
        class_db().register_class(ClassDescriptor {
            name: "ClassDbTest",
            parent: Some("Object"),
            api: ApiLevel::Core,
            exposed: true,
            ref_counted: false,
            singleton: false,
            creation: None,
            bind: bind_test_class,
        })
    }

    #[test]
    fn registration_is_idempotent() {
        let a = register_test_class();
        let b = register_test_class();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn method_lookup_walks_parent_chain() {
        let ci = register_test_class();
        assert!(ci.has_method(StringName::new("add")));
        // Inherited from Object.
        assert!(ci.has_signal(StringName::new("script_changed")));
        assert!(class_db().is_parent_class(
            StringName::new("ClassDbTest"),
            StringName::new("Object")
        ));
    }

    #[test]
    fn enum_members_are_also_constants() {
        let ci = register_test_class();
        assert_eq!(ci.find_constant(StringName::new("MODE_ACTIVE")), Some(1));
        assert_eq!(ci.own_enums().len(), 1);
    }

    #[test]
    fn api_hash_is_stable_and_sensitive() {
        register_test_class();
        let h1 = class_db().get_api_hash(ApiLevel::Core);
        let h2 = class_db().get_api_hash(ApiLevel::Core);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn too_few_arguments_reports_required_count() {
        let ci = register_test_class();
        let obj = Object::spawn(class_db().get(StringName::new("Object")).unwrap());
        let m = ci.find_method(StringName::new("add")).unwrap();
        assert_eq!(
            m.call(&obj, &[Variant::Int(1)]),
            Err(CallError::TooFewArguments { expected: 2 })
        );
        obj.free();
    }
}
