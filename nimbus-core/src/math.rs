// Engine math value types without direct glam equivalents.
// Simple Rust structs; Variant carries them by value.

use glam::{Quat, Vec2, Vec3};

// ---------------------------------------------------------------------------
// Rect2
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect2 {
    pub position: Vec2,
    pub size: Vec2,
}

impl Rect2 {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Rect2 {
            position: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    pub fn end(&self) -> Vec2 {
        self.position + self.size
    }

    pub fn has_point(&self, p: Vec2) -> bool {
        let end = self.end();
        p.x >= self.position.x && p.y >= self.position.y && p.x < end.x && p.y < end.y
    }
}

// ---------------------------------------------------------------------------
// Plane
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn new(normal: Vec3, d: f32) -> Self {
        Plane { normal, d }
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.d
    }
}

// ---------------------------------------------------------------------------
// Basis — 3x3 rotation/scale matrix, row-major
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Basis {
    pub rows: [Vec3; 3],
}

impl Basis {
    pub const IDENTITY: Basis = Basis {
        rows: [Vec3::X, Vec3::Y, Vec3::Z],
    };

    pub fn from_quat(q: Quat) -> Self {
        let m = glam::Mat3::from_quat(q);
        // glam Mat3 is column-major; transpose into rows.
        let t = m.transpose();
        Basis {
            rows: [t.x_axis, t.y_axis, t.z_axis],
        }
    }

    pub fn xform(&self, v: Vec3) -> Vec3 {
        Vec3::new(self.rows[0].dot(v), self.rows[1].dot(v), self.rows[2].dot(v))
    }
}

impl Default for Basis {
    fn default() -> Self {
        Basis::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Transform — Basis + origin
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Transform {
    pub basis: Basis,
    pub origin: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        basis: Basis::IDENTITY,
        origin: Vec3::ZERO,
    };

    pub fn from_origin(origin: Vec3) -> Self {
        Transform {
            origin,
            ..Self::IDENTITY
        }
    }

    pub fn xform(&self, v: Vec3) -> Vec3 {
        self.basis.xform(v) + self.origin
    }
}

// ---------------------------------------------------------------------------
// Aabb
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Aabb {
    pub position: Vec3,
    pub size: Vec3,
}

impl Aabb {
    pub fn new(position: Vec3, size: Vec3) -> Self {
        Aabb { position, size }
    }

    pub fn end(&self) -> Vec3 {
        self.position + self.size
    }
}

// ---------------------------------------------------------------------------
// Color — float RGBA, 0.0–1.0 range
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Color { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

// ---------------------------------------------------------------------------
// NodePath — a slash-separated path with optional :subname suffixes
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct NodePath {
    path: String,
}

impl NodePath {
    pub fn new(path: &str) -> Self {
        NodePath { path: path.to_owned() }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_absolute(&self) -> bool {
        self.path.starts_with('/')
    }

    /// Path segments before the first ':' subname separator.
    pub fn names(&self) -> Vec<&str> {
        let base = self.path.split(':').next().unwrap_or("");
        base.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Subname segments after the first ':'.
    pub fn subnames(&self) -> Vec<&str> {
        match self.path.split_once(':') {
            Some((_, rest)) => rest.split(':').filter(|s| !s.is_empty()).collect(),
            None => Vec::new(),
        }
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_points_half_open() {
        let r = Rect2::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.has_point(Vec2::new(0.0, 0.0)));
        assert!(!r.has_point(Vec2::new(10.0, 10.0)));
    }

    #[test]
    fn node_path_splits_names_and_subnames() {
        let p = NodePath::new("/root/Player:position:x");
        assert!(p.is_absolute());
        assert_eq!(p.names(), vec!["root", "Player"]);
        assert_eq!(p.subnames(), vec!["position", "x"]);
    }

    #[test]
    fn basis_identity_is_noop() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(Basis::IDENTITY.xform(v), v);
    }
}
