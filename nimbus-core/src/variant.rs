// Variant: the engine's tagged-union dynamic value.
//
// Closed kind set; Variant owns its payload and clones on copy. Containers
// have value semantics at the Variant level (a clone is a logical copy).

use std::hash::{Hash, Hasher};

use glam::{Quat, Vec2, Vec3};

use crate::callable::Callable;
use crate::entity::EntityId;
use crate::math::{Aabb, Basis, Color, NodePath, Plane, Rect2, Transform};
use crate::string_name::StringName;

// ---------------------------------------------------------------------------
// VariantKind
// ---------------------------------------------------------------------------

/// The closed set of Variant kinds. Order is part of the API hash, so new
/// kinds append at the end.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum VariantKind {
    Nil,
    Bool,
    Int,
    Float,
    String,
    StringName,
    NodePath,
    Vector2,
    Vector3,
    Rect2,
    Plane,
    Quat,
    Basis,
    Transform,
    Aabb,
    Color,
    Object,
    Callable,
    Signal,
    Array,
    Dictionary,
    PackedByteArray,
    PackedIntArray,
    PackedFloatArray,
    PackedStringArray,
    PackedVector2Array,
    PackedVector3Array,
    PackedColorArray,
}

impl VariantKind {
    pub const ALL: &'static [VariantKind] = &[
        VariantKind::Nil,
        VariantKind::Bool,
        VariantKind::Int,
        VariantKind::Float,
        VariantKind::String,
        VariantKind::StringName,
        VariantKind::NodePath,
        VariantKind::Vector2,
        VariantKind::Vector3,
        VariantKind::Rect2,
        VariantKind::Plane,
        VariantKind::Quat,
        VariantKind::Basis,
        VariantKind::Transform,
        VariantKind::Aabb,
        VariantKind::Color,
        VariantKind::Object,
        VariantKind::Callable,
        VariantKind::Signal,
        VariantKind::Array,
        VariantKind::Dictionary,
        VariantKind::PackedByteArray,
        VariantKind::PackedIntArray,
        VariantKind::PackedFloatArray,
        VariantKind::PackedStringArray,
        VariantKind::PackedVector2Array,
        VariantKind::PackedVector3Array,
        VariantKind::PackedColorArray,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VariantKind::Nil => "nil",
            VariantKind::Bool => "bool",
            VariantKind::Int => "int",
            VariantKind::Float => "float",
            VariantKind::String => "string",
            VariantKind::StringName => "string_name",
            VariantKind::NodePath => "node_path",
            VariantKind::Vector2 => "vector2",
            VariantKind::Vector3 => "vector3",
            VariantKind::Rect2 => "rect2",
            VariantKind::Plane => "plane",
            VariantKind::Quat => "quat",
            VariantKind::Basis => "basis",
            VariantKind::Transform => "transform",
            VariantKind::Aabb => "aabb",
            VariantKind::Color => "color",
            VariantKind::Object => "object",
            VariantKind::Callable => "callable",
            VariantKind::Signal => "signal",
            VariantKind::Array => "array",
            VariantKind::Dictionary => "dictionary",
            VariantKind::PackedByteArray => "packed_byte_array",
            VariantKind::PackedIntArray => "packed_int_array",
            VariantKind::PackedFloatArray => "packed_float_array",
            VariantKind::PackedStringArray => "packed_string_array",
            VariantKind::PackedVector2Array => "packed_vector2_array",
            VariantKind::PackedVector3Array => "packed_vector3_array",
            VariantKind::PackedColorArray => "packed_color_array",
        }
    }
}

// ---------------------------------------------------------------------------
// Object handle and signal reference payloads
// ---------------------------------------------------------------------------

/// Variant payload for object kinds: an entity id plus the class name the
/// handle was taken with. Holds no pointer; resolution goes through the
/// entity registry at use time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObjectHandle {
    pub id: EntityId,
    pub class: StringName,
}

/// Variant payload for signal kinds: the emitter id and the signal name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SignalRef {
    pub object: EntityId,
    pub name: StringName,
}

// ---------------------------------------------------------------------------
// Dictionary — insertion-ordered Variant → Variant map
// ---------------------------------------------------------------------------

/// Insertion-ordered key/value container. Lookups are linear; engine
/// dictionaries are small and iteration order is observable behavior.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(Variant, Variant)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    pub fn get(&self, key: &Variant) -> Option<&Variant> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: Variant, value: Variant) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &Variant) -> Option<Variant> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, key: &Variant) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Variant, Variant)> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Variant {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringName(StringName),
    NodePath(NodePath),
    Vector2(Vec2),
    Vector3(Vec3),
    Rect2(Rect2),
    Plane(Plane),
    Quat(Quat),
    Basis(Basis),
    Transform(Transform),
    Aabb(Aabb),
    Color(Color),
    Object(ObjectHandle),
    Callable(Callable),
    Signal(SignalRef),
    Array(Vec<Variant>),
    Dictionary(Dictionary),
    PackedByteArray(Vec<u8>),
    PackedIntArray(Vec<i64>),
    PackedFloatArray(Vec<f64>),
    PackedStringArray(Vec<String>),
    PackedVector2Array(Vec<Vec2>),
    PackedVector3Array(Vec<Vec3>),
    PackedColorArray(Vec<Color>),
}

impl Variant {
    pub fn kind(&self) -> VariantKind {
        match self {
            Variant::Nil => VariantKind::Nil,
            Variant::Bool(_) => VariantKind::Bool,
            Variant::Int(_) => VariantKind::Int,
            Variant::Float(_) => VariantKind::Float,
            Variant::String(_) => VariantKind::String,
            Variant::StringName(_) => VariantKind::StringName,
            Variant::NodePath(_) => VariantKind::NodePath,
            Variant::Vector2(_) => VariantKind::Vector2,
            Variant::Vector3(_) => VariantKind::Vector3,
            Variant::Rect2(_) => VariantKind::Rect2,
            Variant::Plane(_) => VariantKind::Plane,
            Variant::Quat(_) => VariantKind::Quat,
            Variant::Basis(_) => VariantKind::Basis,
            Variant::Transform(_) => VariantKind::Transform,
            Variant::Aabb(_) => VariantKind::Aabb,
            Variant::Color(_) => VariantKind::Color,
            Variant::Object(_) => VariantKind::Object,
            Variant::Callable(_) => VariantKind::Callable,
            Variant::Signal(_) => VariantKind::Signal,
            Variant::Array(_) => VariantKind::Array,
            Variant::Dictionary(_) => VariantKind::Dictionary,
            Variant::PackedByteArray(_) => VariantKind::PackedByteArray,
            Variant::PackedIntArray(_) => VariantKind::PackedIntArray,
            Variant::PackedFloatArray(_) => VariantKind::PackedFloatArray,
            Variant::PackedStringArray(_) => VariantKind::PackedStringArray,
            Variant::PackedVector2Array(_) => VariantKind::PackedVector2Array,
            Variant::PackedVector3Array(_) => VariantKind::PackedVector3Array,
            Variant::PackedColorArray(_) => VariantKind::PackedColorArray,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    // -- typed accessors ----------------------------------------------------

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float accessor with the standard int→float coercion.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Variant::Float(f) => Some(*f),
            Variant::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            Variant::StringName(n) => Some(n.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Variant::Object(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Variant::Callable(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Variant>> {
        match self {
            Variant::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Variant::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Truthiness used by conditionals and diagnostics. Nil, false, zero,
    /// and empty containers are false.
    pub fn booleanize(&self) -> bool {
        match self {
            Variant::Nil => false,
            Variant::Bool(b) => *b,
            Variant::Int(i) => *i != 0,
            Variant::Float(f) => *f != 0.0,
            Variant::String(s) => !s.is_empty(),
            Variant::Object(h) => !h.id.is_null(),
            Variant::Array(a) => !a.is_empty(),
            Variant::Dictionary(d) => !d.is_empty(),
            _ => true,
        }
    }

    /// Whether a value of this kind may coerce into `target` during method
    /// argument validation. Identity plus the int↔float bridge; Nil accepts
    /// object handles (null object).
    pub fn compatible_with(&self, target: VariantKind) -> bool {
        let kind = self.kind();
        kind == target
            || (kind == VariantKind::Int && target == VariantKind::Float)
            || (kind == VariantKind::Nil && target == VariantKind::Object)
    }

    // -- named sub-access ---------------------------------------------------

    /// Read a named component of a composite value, e.g. `vec.x` or
    /// `transform.origin`. Returns `None` for unknown names or scalar kinds.
    pub fn get_named(&self, name: &str) -> Option<Variant> {
        match self {
            Variant::Vector2(v) => match name {
                "x" => Some(Variant::Float(v.x as f64)),
                "y" => Some(Variant::Float(v.y as f64)),
                _ => None,
            },
            Variant::Vector3(v) => match name {
                "x" => Some(Variant::Float(v.x as f64)),
                "y" => Some(Variant::Float(v.y as f64)),
                "z" => Some(Variant::Float(v.z as f64)),
                _ => None,
            },
            Variant::Rect2(r) => match name {
                "position" => Some(Variant::Vector2(r.position)),
                "size" => Some(Variant::Vector2(r.size)),
                "end" => Some(Variant::Vector2(r.end())),
                _ => None,
            },
            Variant::Plane(p) => match name {
                "normal" => Some(Variant::Vector3(p.normal)),
                "d" => Some(Variant::Float(p.d as f64)),
                _ => None,
            },
            Variant::Quat(q) => match name {
                "x" => Some(Variant::Float(q.x as f64)),
                "y" => Some(Variant::Float(q.y as f64)),
                "z" => Some(Variant::Float(q.z as f64)),
                "w" => Some(Variant::Float(q.w as f64)),
                _ => None,
            },
            Variant::Transform(t) => match name {
                "basis" => Some(Variant::Basis(t.basis)),
                "origin" => Some(Variant::Vector3(t.origin)),
                _ => None,
            },
            Variant::Aabb(b) => match name {
                "position" => Some(Variant::Vector3(b.position)),
                "size" => Some(Variant::Vector3(b.size)),
                "end" => Some(Variant::Vector3(b.end())),
                _ => None,
            },
            Variant::Color(c) => match name {
                "r" => Some(Variant::Float(c.r as f64)),
                "g" => Some(Variant::Float(c.g as f64)),
                "b" => Some(Variant::Float(c.b as f64)),
                "a" => Some(Variant::Float(c.a as f64)),
                _ => None,
            },
            Variant::Dictionary(d) => d.get(&Variant::String(name.to_owned())).cloned(),
            _ => None,
        }
    }

    /// Write a named component of a composite value in place. Returns false
    /// for unknown names, scalar kinds, or value kind mismatch.
    pub fn set_named(&mut self, name: &str, value: &Variant) -> bool {
        match self {
            Variant::Vector2(v) => {
                let Some(f) = value.as_float() else { return false };
                match name {
                    "x" => v.x = f as f32,
                    "y" => v.y = f as f32,
                    _ => return false,
                }
                true
            }
            Variant::Vector3(v) => {
                let Some(f) = value.as_float() else { return false };
                match name {
                    "x" => v.x = f as f32,
                    "y" => v.y = f as f32,
                    "z" => v.z = f as f32,
                    _ => return false,
                }
                true
            }
            Variant::Rect2(r) => match (name, value) {
                ("position", Variant::Vector2(v)) => {
                    r.position = *v;
                    true
                }
                ("size", Variant::Vector2(v)) => {
                    r.size = *v;
                    true
                }
                _ => false,
            },
            Variant::Plane(p) => match (name, value) {
                ("normal", Variant::Vector3(v)) => {
                    p.normal = *v;
                    true
                }
                ("d", _) => match value.as_float() {
                    Some(f) => {
                        p.d = f as f32;
                        true
                    }
                    None => false,
                },
                _ => false,
            },
            Variant::Quat(q) => {
                let Some(f) = value.as_float() else { return false };
                match name {
                    "x" => q.x = f as f32,
                    "y" => q.y = f as f32,
                    "z" => q.z = f as f32,
                    "w" => q.w = f as f32,
                    _ => return false,
                }
                true
            }
            Variant::Transform(t) => match (name, value) {
                ("basis", Variant::Basis(b)) => {
                    t.basis = *b;
                    true
                }
                ("origin", Variant::Vector3(v)) => {
                    t.origin = *v;
                    true
                }
                _ => false,
            },
            Variant::Aabb(b) => match (name, value) {
                ("position", Variant::Vector3(v)) => {
                    b.position = *v;
                    true
                }
                ("size", Variant::Vector3(v)) => {
                    b.size = *v;
                    true
                }
                _ => false,
            },
            Variant::Color(c) => {
                let Some(f) = value.as_float() else { return false };
                match name {
                    "r" => c.r = f as f32,
                    "g" => c.g = f as f32,
                    "b" => c.b = f as f32,
                    "a" => c.a = f as f32,
                    _ => return false,
                }
                true
            }
            Variant::Dictionary(d) => {
                d.insert(Variant::String(name.to_owned()), value.clone());
                true
            }
            _ => false,
        }
    }

    // -- hashing ------------------------------------------------------------

    /// Deterministic content hash. Floats hash by bit pattern, objects by
    /// entity id, custom callables by identity key.
    pub fn hash_value(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.feed_hash(&mut hasher);
        hasher.finish()
    }

    fn feed_hash<H: Hasher>(&self, h: &mut H) {
        std::mem::discriminant(self).hash(h);
        match self {
            Variant::Nil => {}
            Variant::Bool(b) => b.hash(h),
            Variant::Int(i) => i.hash(h),
            Variant::Float(f) => f.to_bits().hash(h),
            Variant::String(s) => s.hash(h),
            Variant::StringName(n) => n.as_str().hash(h),
            Variant::NodePath(p) => p.hash(h),
            Variant::Vector2(v) => {
                v.x.to_bits().hash(h);
                v.y.to_bits().hash(h);
            }
            Variant::Vector3(v) => {
                v.x.to_bits().hash(h);
                v.y.to_bits().hash(h);
                v.z.to_bits().hash(h);
            }
            Variant::Rect2(r) => {
                for f in [r.position.x, r.position.y, r.size.x, r.size.y] {
                    f.to_bits().hash(h);
                }
            }
            Variant::Plane(p) => {
                for f in [p.normal.x, p.normal.y, p.normal.z, p.d] {
                    f.to_bits().hash(h);
                }
            }
            Variant::Quat(q) => {
                for f in [q.x, q.y, q.z, q.w] {
                    f.to_bits().hash(h);
                }
            }
            Variant::Basis(b) => {
                for row in &b.rows {
                    for f in [row.x, row.y, row.z] {
                        f.to_bits().hash(h);
                    }
                }
            }
            Variant::Transform(t) => {
                for row in &t.basis.rows {
                    for f in [row.x, row.y, row.z] {
                        f.to_bits().hash(h);
                    }
                }
                for f in [t.origin.x, t.origin.y, t.origin.z] {
                    f.to_bits().hash(h);
                }
            }
            Variant::Aabb(b) => {
                for f in [
                    b.position.x,
                    b.position.y,
                    b.position.z,
                    b.size.x,
                    b.size.y,
                    b.size.z,
                ] {
                    f.to_bits().hash(h);
                }
            }
            Variant::Color(c) => {
                for f in [c.r, c.g, c.b, c.a] {
                    f.to_bits().hash(h);
                }
            }
            Variant::Object(o) => o.id.hash(h),
            Variant::Callable(c) => c.identity_key().hash(h),
            Variant::Signal(s) => {
                s.object.hash(h);
                s.name.as_str().hash(h);
            }
            Variant::Array(a) => {
                a.len().hash(h);
                for v in a {
                    v.feed_hash(h);
                }
            }
            Variant::Dictionary(d) => {
                d.len().hash(h);
                for (k, v) in d.iter() {
                    k.feed_hash(h);
                    v.feed_hash(h);
                }
            }
            Variant::PackedByteArray(a) => a.hash(h),
            Variant::PackedIntArray(a) => a.hash(h),
            Variant::PackedFloatArray(a) => {
                a.len().hash(h);
                for f in a {
                    f.to_bits().hash(h);
                }
            }
            Variant::PackedStringArray(a) => a.hash(h),
            Variant::PackedVector2Array(a) => {
                a.len().hash(h);
                for v in a {
                    v.x.to_bits().hash(h);
                    v.y.to_bits().hash(h);
                }
            }
            Variant::PackedVector3Array(a) => {
                a.len().hash(h);
                for v in a {
                    v.x.to_bits().hash(h);
                    v.y.to_bits().hash(h);
                    v.z.to_bits().hash(h);
                }
            }
            Variant::PackedColorArray(a) => {
                a.len().hash(h);
                for c in a {
                    for f in [c.r, c.g, c.b, c.a] {
                        f.to_bits().hash(h);
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Deterministic stringification
// ---------------------------------------------------------------------------

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Nil => write!(f, "null"),
            Variant::Bool(b) => write!(f, "{b}"),
            Variant::Int(i) => write!(f, "{i}"),
            Variant::Float(v) => write!(f, "{v}"),
            Variant::String(s) => write!(f, "{s}"),
            Variant::StringName(n) => write!(f, "{n}"),
            Variant::NodePath(p) => write!(f, "{p}"),
            Variant::Vector2(v) => write!(f, "({}, {})", v.x, v.y),
            Variant::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Variant::Rect2(r) => write!(
                f,
                "({}, {}, {}, {})",
                r.position.x, r.position.y, r.size.x, r.size.y
            ),
            Variant::Plane(p) => write!(f, "({}, {}, {}, {})", p.normal.x, p.normal.y, p.normal.z, p.d),
            Variant::Quat(q) => write!(f, "({}, {}, {}, {})", q.x, q.y, q.z, q.w),
            Variant::Basis(b) => write!(
                f,
                "(({}, {}, {}), ({}, {}, {}), ({}, {}, {}))",
                b.rows[0].x, b.rows[0].y, b.rows[0].z,
                b.rows[1].x, b.rows[1].y, b.rows[1].z,
                b.rows[2].x, b.rows[2].y, b.rows[2].z,
            ),
            Variant::Transform(t) => write!(
                f,
                "{} - ({}, {}, {})",
                Variant::Basis(t.basis),
                t.origin.x, t.origin.y, t.origin.z
            ),
            Variant::Aabb(b) => write!(
                f,
                "({}, {}, {} - {}, {}, {})",
                b.position.x, b.position.y, b.position.z, b.size.x, b.size.y, b.size.z
            ),
            Variant::Color(c) => write!(f, "({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            Variant::Object(o) => {
                if o.id.is_null() {
                    write!(f, "[Object:null]")
                } else {
                    write!(f, "[{}:{}]", o.class, o.id)
                }
            }
            Variant::Callable(c) => write!(f, "{c}"),
            Variant::Signal(s) => write!(f, "[signal {}@{}]", s.name, s.object),
            Variant::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Variant::Dictionary(d) => {
                write!(f, "{{")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Variant::PackedByteArray(a) => write!(f, "PackedByteArray(len {})", a.len()),
            Variant::PackedIntArray(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Variant::PackedFloatArray(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Variant::PackedStringArray(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Variant::PackedVector2Array(a) => write!(f, "PackedVector2Array(len {})", a.len()),
            Variant::PackedVector3Array(a) => write!(f, "PackedVector3Array(len {})", a.len()),
            Variant::PackedColorArray(a) => write!(f, "PackedColorArray(len {})", a.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// From conversions
// ---------------------------------------------------------------------------

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}
impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int(v as i64)
    }
}
impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int(v)
    }
}
impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Variant::Float(v as f64)
    }
}
impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Float(v)
    }
}
impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_owned())
    }
}
impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}
impl From<StringName> for Variant {
    fn from(v: StringName) -> Self {
        Variant::StringName(v)
    }
}
impl From<NodePath> for Variant {
    fn from(v: NodePath) -> Self {
        Variant::NodePath(v)
    }
}
impl From<Vec2> for Variant {
    fn from(v: Vec2) -> Self {
        Variant::Vector2(v)
    }
}
impl From<Vec3> for Variant {
    fn from(v: Vec3) -> Self {
        Variant::Vector3(v)
    }
}
impl From<Quat> for Variant {
    fn from(v: Quat) -> Self {
        Variant::Quat(v)
    }
}
impl From<Rect2> for Variant {
    fn from(v: Rect2) -> Self {
        Variant::Rect2(v)
    }
}
impl From<Plane> for Variant {
    fn from(v: Plane) -> Self {
        Variant::Plane(v)
    }
}
impl From<Basis> for Variant {
    fn from(v: Basis) -> Self {
        Variant::Basis(v)
    }
}
impl From<Transform> for Variant {
    fn from(v: Transform) -> Self {
        Variant::Transform(v)
    }
}
impl From<Aabb> for Variant {
    fn from(v: Aabb) -> Self {
        Variant::Aabb(v)
    }
}
impl From<Color> for Variant {
    fn from(v: Color) -> Self {
        Variant::Color(v)
    }
}
impl From<ObjectHandle> for Variant {
    fn from(v: ObjectHandle) -> Self {
        Variant::Object(v)
    }
}
impl From<Callable> for Variant {
    fn from(v: Callable) -> Self {
        Variant::Callable(v)
    }
}
impl From<SignalRef> for Variant {
    fn from(v: SignalRef) -> Self {
        Variant::Signal(v)
    }
}
impl From<Vec<Variant>> for Variant {
    fn from(v: Vec<Variant>) -> Self {
        Variant::Array(v)
    }
}
impl From<Dictionary> for Variant {
    fn from(v: Dictionary) -> Self {
        Variant::Dictionary(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_access_round_trips_vector_components() {
        let mut v = Variant::Vector3(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.get_named("y"), Some(Variant::Float(2.0)));
        assert!(v.set_named("y", &Variant::Float(7.0)));
        assert_eq!(v.get_named("y"), Some(Variant::Float(7.0)));
        assert!(!v.set_named("w", &Variant::Float(0.0)));
    }

    #[test]
    fn int_coerces_to_float_but_not_back() {
        let i = Variant::Int(4);
        assert!(i.compatible_with(VariantKind::Float));
        let f = Variant::Float(4.0);
        assert!(!f.compatible_with(VariantKind::Int));
    }

    #[test]
    fn hash_is_deterministic_per_content() {
        let a = Variant::Array(vec![Variant::Int(1), Variant::String("x".into())]);
        let b = Variant::Array(vec![Variant::Int(1), Variant::String("x".into())]);
        assert_eq!(a.hash_value(), b.hash_value());
        let c = Variant::Array(vec![Variant::Int(2)]);
        assert_ne!(a.hash_value(), c.hash_value());
    }

    #[test]
    fn display_is_stable_for_containers() {
        let mut d = Dictionary::new();
        d.insert(Variant::String("a".into()), Variant::Int(1));
        d.insert(Variant::String("b".into()), Variant::Int(2));
        let v = Variant::Dictionary(d);
        assert_eq!(v.to_string(), "{a: 1, b: 2}");
        let a = Variant::Array(vec![Variant::Int(1), Variant::Int(2)]);
        assert_eq!(a.to_string(), "[1, 2]");
    }

    #[test]
    fn dictionary_preserves_insertion_order() {
        let mut d = Dictionary::new();
        d.insert(Variant::Int(3), Variant::Nil);
        d.insert(Variant::Int(1), Variant::Nil);
        d.insert(Variant::Int(2), Variant::Nil);
        let keys: Vec<i64> = d.iter().map(|(k, _)| k.as_int().unwrap()).collect();
        assert_eq!(keys, vec![3, 1, 2]);
    }
}
