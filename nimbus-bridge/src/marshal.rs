// The closed marshalling table between Variant and the managed wire form.
//
// The wire form is tagged JSON: `{"k": <kind name>, "v": <payload>}`. Hosts
// move it across the boundary as UTF-8; the shape is part of the binding
// contract, so kinds encode exactly as listed here and nothing else.
// Callables never marshal: delegates cross as registered ids through the
// signal bridge instead.

use nimbus_core::math::{Aabb, Basis, Color, NodePath, Plane, Rect2, Transform};
use nimbus_core::variant::{Dictionary, ObjectHandle, SignalRef};
use nimbus_core::{glam, EntityId, StringName, Variant, VariantKind};
use serde_json::{json, Value};

use crate::error::MarshalError;

use glam::{Quat, Vec2, Vec3};

/// Whether values of `kind` may cross the boundary at all.
pub fn is_marshallable(kind: VariantKind) -> bool {
    !matches!(kind, VariantKind::Callable)
}

pub fn encode(value: &Variant) -> Result<Value, MarshalError> {
    let payload = match value {
        Variant::Nil => Value::Null,
        Variant::Bool(b) => json!(b),
        Variant::Int(i) => json!(i),
        Variant::Float(f) => json!(f),
        Variant::String(s) => json!(s),
        Variant::StringName(n) => json!(n.as_str()),
        Variant::NodePath(p) => json!(p.as_str()),
        Variant::Vector2(v) => json!([v.x, v.y]),
        Variant::Vector3(v) => json!([v.x, v.y, v.z]),
        Variant::Rect2(r) => json!([r.position.x, r.position.y, r.size.x, r.size.y]),
        Variant::Plane(p) => json!([p.normal.x, p.normal.y, p.normal.z, p.d]),
        Variant::Quat(q) => json!([q.x, q.y, q.z, q.w]),
        Variant::Basis(b) => {
            json!(b.rows.iter().map(|r| [r.x, r.y, r.z]).collect::<Vec<_>>())
        }
        Variant::Transform(t) => json!({
            "basis": t.basis.rows.iter().map(|r| [r.x, r.y, r.z]).collect::<Vec<_>>(),
            "origin": [t.origin.x, t.origin.y, t.origin.z],
        }),
        Variant::Aabb(a) => json!([
            a.position.x, a.position.y, a.position.z,
            a.size.x, a.size.y, a.size.z
        ]),
        Variant::Color(c) => json!([c.r, c.g, c.b, c.a]),
        Variant::Object(h) => json!({
            "id": h.id.to_raw(),
            "class": h.class.as_str(),
        }),
        Variant::Callable(_) => return Err(MarshalError::Unsupported(VariantKind::Callable)),
        Variant::Signal(s) => json!({
            "object": s.object.to_raw(),
            "name": s.name.as_str(),
        }),
        Variant::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(encode(item)?);
            }
            Value::Array(out)
        }
        Variant::Dictionary(d) => {
            let mut out = Vec::with_capacity(d.len());
            for (k, v) in d.iter() {
                out.push(Value::Array(vec![encode(k)?, encode(v)?]));
            }
            Value::Array(out)
        }
        Variant::PackedByteArray(b) => json!(b),
        Variant::PackedIntArray(i) => json!(i),
        Variant::PackedFloatArray(f) => json!(f),
        Variant::PackedStringArray(s) => json!(s),
        Variant::PackedVector2Array(v) => {
            json!(v.iter().map(|v| [v.x, v.y]).collect::<Vec<_>>())
        }
        Variant::PackedVector3Array(v) => {
            json!(v.iter().map(|v| [v.x, v.y, v.z]).collect::<Vec<_>>())
        }
        Variant::PackedColorArray(c) => {
            json!(c.iter().map(|c| [c.r, c.g, c.b, c.a]).collect::<Vec<_>>())
        }
    };
    Ok(json!({ "k": value.kind().name(), "v": payload }))
}

pub fn decode(wire: &Value) -> Result<Variant, MarshalError> {
    let kind = wire
        .get("k")
        .and_then(Value::as_str)
        .ok_or_else(|| MarshalError::Malformed("missing kind tag".into()))?;
    let v = wire
        .get("v")
        .ok_or_else(|| MarshalError::Malformed("missing payload".into()))?;

    let malformed = |what: &str| MarshalError::Malformed(format!("{kind}: expected {what}"));

    Ok(match kind {
        "nil" => Variant::Nil,
        "bool" => Variant::Bool(v.as_bool().ok_or_else(|| malformed("bool"))?),
        "int" => Variant::Int(v.as_i64().ok_or_else(|| malformed("integer"))?),
        "float" => Variant::Float(v.as_f64().ok_or_else(|| malformed("number"))?),
        "string" => Variant::String(v.as_str().ok_or_else(|| malformed("string"))?.to_owned()),
        "string_name" => {
            Variant::StringName(StringName::new(v.as_str().ok_or_else(|| malformed("string"))?))
        }
        "node_path" => {
            Variant::NodePath(NodePath::new(v.as_str().ok_or_else(|| malformed("string"))?))
        }
        "vector2" => {
            let f = floats(v, 2).ok_or_else(|| malformed("[x, y]"))?;
            Variant::Vector2(Vec2::new(f[0], f[1]))
        }
        "vector3" => {
            let f = floats(v, 3).ok_or_else(|| malformed("[x, y, z]"))?;
            Variant::Vector3(Vec3::new(f[0], f[1], f[2]))
        }
        "rect2" => {
            let f = floats(v, 4).ok_or_else(|| malformed("[x, y, w, h]"))?;
            Variant::Rect2(Rect2 {
                position: Vec2::new(f[0], f[1]),
                size: Vec2::new(f[2], f[3]),
            })
        }
        "plane" => {
            let f = floats(v, 4).ok_or_else(|| malformed("[nx, ny, nz, d]"))?;
            Variant::Plane(Plane::new(Vec3::new(f[0], f[1], f[2]), f[3]))
        }
        "quat" => {
            let f = floats(v, 4).ok_or_else(|| malformed("[x, y, z, w]"))?;
            Variant::Quat(Quat::from_xyzw(f[0], f[1], f[2], f[3]))
        }
        "basis" => Variant::Basis(Basis {
            rows: rows3(v).ok_or_else(|| malformed("3 rows"))?,
        }),
        "transform" => {
            let basis = v.get("basis").and_then(rows3).ok_or_else(|| malformed("basis"))?;
            let o = v
                .get("origin")
                .and_then(|o| floats(o, 3))
                .ok_or_else(|| malformed("origin"))?;
            Variant::Transform(Transform {
                basis: Basis { rows: basis },
                origin: Vec3::new(o[0], o[1], o[2]),
            })
        }
        "aabb" => {
            let f = floats(v, 6).ok_or_else(|| malformed("6 floats"))?;
            Variant::Aabb(Aabb::new(
                Vec3::new(f[0], f[1], f[2]),
                Vec3::new(f[3], f[4], f[5]),
            ))
        }
        "color" => {
            let f = floats(v, 4).ok_or_else(|| malformed("[r, g, b, a]"))?;
            Variant::Color(Color::new(f[0], f[1], f[2], f[3]))
        }
        "object" => {
            let id = v.get("id").and_then(Value::as_u64).ok_or_else(|| malformed("id"))?;
            let class = v.get("class").and_then(Value::as_str).ok_or_else(|| malformed("class"))?;
            Variant::Object(ObjectHandle {
                id: EntityId::from_raw(id),
                class: StringName::new(class),
            })
        }
        "signal" => {
            let object = v
                .get("object")
                .and_then(Value::as_u64)
                .ok_or_else(|| malformed("object"))?;
            let name = v.get("name").and_then(Value::as_str).ok_or_else(|| malformed("name"))?;
            Variant::Signal(SignalRef {
                object: EntityId::from_raw(object),
                name: StringName::new(name),
            })
        }
        "array" => {
            let items = v.as_array().ok_or_else(|| malformed("array"))?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(decode(item)?);
            }
            Variant::Array(out)
        }
        "dictionary" => {
            let pairs = v.as_array().ok_or_else(|| malformed("pair array"))?;
            let mut d = Dictionary::new();
            for pair in pairs {
                let kv = pair.as_array().filter(|a| a.len() == 2).ok_or_else(|| malformed("[k, v] pair"))?;
                d.insert(decode(&kv[0])?, decode(&kv[1])?);
            }
            Variant::Dictionary(d)
        }
        "packed_byte_array" => Variant::PackedByteArray(
            v.as_array()
                .and_then(|a| a.iter().map(|x| x.as_u64().map(|b| b as u8)).collect())
                .ok_or_else(|| malformed("byte array"))?,
        ),
        "packed_int_array" => Variant::PackedIntArray(
            v.as_array()
                .and_then(|a| a.iter().map(Value::as_i64).collect())
                .ok_or_else(|| malformed("int array"))?,
        ),
        "packed_float_array" => Variant::PackedFloatArray(
            v.as_array()
                .and_then(|a| a.iter().map(Value::as_f64).collect())
                .ok_or_else(|| malformed("float array"))?,
        ),
        "packed_string_array" => Variant::PackedStringArray(
            v.as_array()
                .and_then(|a| a.iter().map(|x| x.as_str().map(str::to_owned)).collect())
                .ok_or_else(|| malformed("string array"))?,
        ),
        "packed_vector2_array" => Variant::PackedVector2Array(
            v.as_array()
                .and_then(|a| {
                    a.iter()
                        .map(|x| floats(x, 2).map(|f| Vec2::new(f[0], f[1])))
                        .collect()
                })
                .ok_or_else(|| malformed("vec2 array"))?,
        ),
        "packed_vector3_array" => Variant::PackedVector3Array(
            v.as_array()
                .and_then(|a| {
                    a.iter()
                        .map(|x| floats(x, 3).map(|f| Vec3::new(f[0], f[1], f[2])))
                        .collect()
                })
                .ok_or_else(|| malformed("vec3 array"))?,
        ),
        "packed_color_array" => Variant::PackedColorArray(
            v.as_array()
                .and_then(|a| {
                    a.iter()
                        .map(|x| floats(x, 4).map(|f| Color::new(f[0], f[1], f[2], f[3])))
                        .collect()
                })
                .ok_or_else(|| malformed("color array"))?,
        ),
        other => return Err(MarshalError::Malformed(format!("unknown kind: {other}"))),
    })
}

fn floats(v: &Value, n: usize) -> Option<Vec<f32>> {
    let arr = v.as_array()?;
    if arr.len() != n {
        return None;
    }
    arr.iter().map(|x| x.as_f64().map(|f| f as f32)).collect()
}

fn rows3(v: &Value) -> Option<[Vec3; 3]> {
    let arr = v.as_array()?;
    if arr.len() != 3 {
        return None;
    }
    let mut rows = [Vec3::ZERO; 3];
    for (i, row) in arr.iter().enumerate() {
        let f = floats(row, 3)?;
        rows[i] = Vec3::new(f[0], f[1], f[2]);
    }
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(v: Variant) {
        let wire = encode(&v).expect("marshallable");
        assert_eq!(decode(&wire).expect("decodes"), v, "wire was {wire}");
    }

    #[test]
    fn scalar_and_composite_values_round_trip() {
        round_trip(Variant::Nil);
        round_trip(Variant::Bool(true));
        round_trip(Variant::Int(-42));
        round_trip(Variant::Float(1.5));
        round_trip(Variant::String("emit_signal".into()));
        round_trip(Variant::Vector3(Vec3::new(1.0, -2.0, 0.5)));
        round_trip(Variant::Transform(Transform::IDENTITY));
        round_trip(Variant::Color(Color::new(0.25, 0.5, 0.75, 1.0)));
        round_trip(Variant::Object(ObjectHandle {
            id: EntityId::from_raw(0xabc0_0001),
            class: StringName::new("Resource"),
        }));
    }

    #[test]
    fn containers_preserve_order() {
        let mut d = Dictionary::new();
        d.insert(Variant::String("b".into()), Variant::Int(2));
        d.insert(Variant::String("a".into()), Variant::Int(1));
        round_trip(Variant::Dictionary(d));
        round_trip(Variant::Array(vec![
            Variant::Int(3),
            Variant::String("x".into()),
            Variant::Array(vec![Variant::Bool(false)]),
        ]));
        round_trip(Variant::PackedVector2Array(vec![
            Vec2::new(0.0, 1.0),
            Vec2::new(2.0, 3.0),
        ]));
    }

    #[test]
    fn callables_never_marshal() {
        assert!(!is_marshallable(VariantKind::Callable));
        let c = Variant::Callable(nimbus_core::Callable::Null);
        assert_eq!(
            encode(&c),
            Err(MarshalError::Unsupported(VariantKind::Callable))
        );
    }
}
