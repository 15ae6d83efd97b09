// Marshalling templates per Variant kind. Each cross-boundary call path is
// stitched from five fragments: c_in (shim prologue), c_arg_in (expression
// handed to the native call), c_out (shim return conversion), cs_in
// (managed expression handed to the icall), cs_out (managed wrap of the
// icall result). `%0` is the argument name, `%r` the raw result.

use crate::api_dump::ApiDump;
use crate::naming::to_pascal_case;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeFragments {
    /// Managed-facing type.
    pub cs_type: String,
    /// Parameter type in the icall signature.
    pub im_type_in: String,
    /// Return type in the icall signature.
    pub im_type_out: String,
    pub c_in: String,
    pub c_arg_in: String,
    pub c_out: String,
    pub cs_in: String,
    pub cs_out: String,
    /// Set when the type could not be resolved; generation continues but
    /// the run is reported dirty.
    pub placeholder: bool,
}

fn frags(
    cs_type: &str,
    im_in: &str,
    im_out: &str,
    c_in: &str,
    c_arg_in: &str,
    c_out: &str,
    cs_in: &str,
    cs_out: &str,
) -> TypeFragments {
    TypeFragments {
        cs_type: cs_type.to_owned(),
        im_type_in: im_in.to_owned(),
        im_type_out: im_out.to_owned(),
        c_in: c_in.to_owned(),
        c_arg_in: c_arg_in.to_owned(),
        c_out: c_out.to_owned(),
        cs_in: cs_in.to_owned(),
        cs_out: cs_out.to_owned(),
        placeholder: false,
    }
}

fn scalar(cs_type: &str, im_type: &str) -> TypeFragments {
    frags(cs_type, im_type, im_type, "", "%0", "return %r;", "%0", "return %r;")
}

fn by_value_struct(cs_type: &str) -> TypeFragments {
    frags(
        cs_type,
        &format!("ref {cs_type}"),
        cs_type,
        &format!("{cs_type} %0_native = nimbus_unmarshal_{}(%0);", cs_type.to_ascii_lowercase()),
        "%0_native",
        "return %r;",
        "ref %0",
        "return %r;",
    )
}

fn handle_class(cs_type: &str) -> TypeFragments {
    frags(
        cs_type,
        "IntPtr",
        "IntPtr",
        "",
        "%0",
        "return %r;",
        &format!("{cs_type}.GetPtr(%0)"),
        &format!("return new {cs_type}(%r);"),
    )
}

fn typed_pool(cs_type: &str) -> TypeFragments {
    frags(cs_type, cs_type, cs_type, "", "%0", "return %r;", "%0", "return %r;")
}

/// Fragments for a builtin Variant kind name, or `None` if the name is not
/// in the builtin table.
pub fn builtin_fragments(kind: &str) -> Option<TypeFragments> {
    Some(match kind {
        "nil" => frags("object", "object", "object", "", "%0", "return %r;", "%0", "return %r;"),
        "bool" => scalar("bool", "bool"),
        "int" => scalar("long", "long"),
        "float" => scalar("double", "double"),
        "string" => frags(
            "string",
            "string",
            "string",
            "",
            "%0",
            "return %r;",
            "%0",
            "return %r;",
        ),
        "string_name" => handle_class("StringName"),
        "node_path" => handle_class("NodePath"),
        "vector2" => by_value_struct("Vector2"),
        "vector3" => by_value_struct("Vector3"),
        "rect2" => by_value_struct("Rect2"),
        "plane" => by_value_struct("Plane"),
        "quat" => by_value_struct("Quat"),
        "basis" => by_value_struct("Basis"),
        "transform" => by_value_struct("Transform"),
        "aabb" => by_value_struct("AABB"),
        "color" => by_value_struct("Color"),
        "callable" => handle_class("Callable"),
        "signal" => handle_class("Signal"),
        "array" => handle_class("Array"),
        "dictionary" => handle_class("Dictionary"),
        "packed_byte_array" => typed_pool("byte[]"),
        "packed_int_array" => typed_pool("int[]"),
        "packed_float_array" => typed_pool("float[]"),
        "packed_string_array" => typed_pool("string[]"),
        "packed_vector2_array" => typed_pool("Vector2[]"),
        "packed_vector3_array" => typed_pool("Vector3[]"),
        "packed_color_array" => typed_pool("Color[]"),
        _ => return None,
    })
}

fn object_fragments(class: &str) -> TypeFragments {
    frags(
        class,
        "IntPtr",
        "IntPtr",
        "",
        "%0",
        "return %r;",
        "Object.GetPtr(%0)",
        &format!("return ({class})InteropUtils.UnmanagedGetManaged(%r);"),
    )
}

fn placeholder_fragments(reference: &str) -> TypeFragments {
    let mut f = scalar(&format!("MISSING_TYPE_{reference}"), "IntPtr");
    f.placeholder = true;
    f
}

/// Resolve a dump type reference: builtin table first, object-type table
/// second, enum table third. An enum reference falls back to the same name
/// with `Enum` appended, and finally to `int` when the enum declares no
/// visible constants.
pub fn get_type_or_null(reference: &str, dump: &ApiDump) -> Option<TypeFragments> {
    if let Some(f) = builtin_fragments(reference) {
        return Some(f);
    }
    if dump.find_class(reference).is_some() {
        return Some(object_fragments(reference));
    }
    // Enum references arrive as "Class.EnumName".
    if let Some((class, enum_name)) = reference.split_once('.') {
        let class_dump = dump.find_class(class)?;
        let found = class_dump
            .enums
            .iter()
            .find(|e| e.name == enum_name)
            .or_else(|| {
                let appended = format!("{enum_name}Enum");
                class_dump.enums.iter().find(|e| e.name == appended)
            });
        return Some(match found {
            Some(e) if !e.members.is_empty() => {
                let cs = format!("{}.{}", class, to_pascal_case(&e.name));
                scalar(&cs, "int")
            }
            _ => scalar("long", "long"),
        });
    }
    None
}

/// Like `get_type_or_null`, but never fails: unresolvable references get a
/// sentinel type and the run is marked dirty through the returned flag.
pub fn fragments_for(kind: &str, class_name: &str, dump: &ApiDump) -> TypeFragments {
    if kind == "object" && !class_name.is_empty() {
        if dump.find_class(class_name).is_some() {
            return object_fragments(class_name);
        }
        return placeholder_fragments(class_name);
    }
    match builtin_fragments(kind) {
        Some(f) => f,
        None => placeholder_fragments(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_dump::ApiDump;

    fn dump() -> ApiDump {
        nimbus_core::register_core_classes();
        ApiDump::from_class_db()
    }

    #[test]
    fn builtin_walk_beats_object_walk() {
        let d = dump();
        assert_eq!(get_type_or_null("vector2", &d).unwrap().cs_type, "Vector2");
        assert_eq!(get_type_or_null("Resource", &d).unwrap().cs_type, "Resource");
        assert!(get_type_or_null("NoSuchThing", &d).is_none());
    }

    #[test]
    fn unresolved_reference_yields_dirty_placeholder() {
        let d = dump();
        let f = fragments_for("object", "VehicleBody", &d);
        assert!(f.placeholder);
        assert!(f.cs_type.starts_with("MISSING_TYPE_"));
    }
}
