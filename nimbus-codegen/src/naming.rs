// Name conversion for the managed surface.

/// Closed remap table for acronym segments the plain camelizer gets wrong.
/// Additions here change the generated API surface; keep it short.
const SEGMENT_REMAPS: &[(&str, &str)] = &[
    ("2d", "2D"),
    ("3d", "3D"),
    ("fps", "FPS"),
    ("gpu", "GPU"),
    ("msaa", "MSAA"),
    ("url", "URL"),
];

/// Closed method-name overrides: exposed snake_case name → managed name.
/// `verify_method_renames` checks every key against the live surface.
pub const METHOD_RENAMES: &[(&str, &str)] = &[("to_string", "ToString")];

fn remap_segment(segment: &str) -> Option<&'static str> {
    SEGMENT_REMAPS
        .iter()
        .find(|(from, _)| *from == segment)
        .map(|(_, to)| *to)
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// snake_case → PascalCase, applying the segment remap table.
pub fn to_pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|s| !s.is_empty())
        .map(|segment| match remap_segment(segment) {
            Some(mapped) => mapped.to_owned(),
            None => capitalize(segment),
        })
        .collect()
}

/// snake_case → camelCase for parameter names.
pub fn to_camel_case(name: &str) -> String {
    let pascal = to_pascal_case(name);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Managed method name: rename table first, then PascalCase.
pub fn method_name(snake: &str) -> String {
    METHOD_RENAMES
        .iter()
        .find(|(from, _)| *from == snake)
        .map(|(_, to)| (*to).to_owned())
        .unwrap_or_else(|| to_pascal_case(snake))
}

const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

pub fn is_csharp_keyword(name: &str) -> bool {
    CSHARP_KEYWORDS.contains(&name)
}

/// Escape managed keyword collisions with a leading underscore.
pub fn escape_keyword(name: &str) -> String {
    if is_csharp_keyword(name) {
        format!("_{name}")
    } else {
        name.to_owned()
    }
}

/// A proxy member whose name equals the enclosing class gets a trailing
/// underscore; C# forbids members named after their type.
pub fn avoid_class_collision(name: &str, class: &str) -> String {
    if name == class {
        format!("{name}_")
    } else {
        name.to_owned()
    }
}

/// Strip the longest common leading snake-case segment run from enum
/// member names. A stripped member may not start with a digit; when one
/// would, the prefix shortens by one word.
pub fn deprefix_enum_members(members: &[String]) -> Vec<String> {
    if members.len() < 2 {
        return members.to_vec();
    }
    let split: Vec<Vec<&str>> = members.iter().map(|m| m.split('_').collect()).collect();

    // Longest word-prefix shared by all members, leaving each at least one
    // word of its own.
    let max_len = split.iter().map(|w| w.len()).min().unwrap_or(0);
    let mut prefix_len = 0;
    'outer: for i in 0..max_len.saturating_sub(1) {
        let word = split[0][i];
        for words in &split[1..] {
            if !words[i].eq_ignore_ascii_case(word) {
                break 'outer;
            }
        }
        prefix_len = i + 1;
    }

    while prefix_len > 0 {
        let digit_start = split.iter().any(|words| {
            words[prefix_len..]
                .first()
                .and_then(|w| w.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
        });
        if !digit_start {
            break;
        }
        prefix_len -= 1;
    }

    split
        .iter()
        .map(|words| words[prefix_len..].join("_"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_applies_remap_table() {
        assert_eq!(to_pascal_case("get_node_2d"), "GetNode2D");
        assert_eq!(to_pascal_case("gpu_particles"), "GPUParticles");
        assert_eq!(to_pascal_case("set_base_url"), "SetBaseURL");
        assert_eq!(to_pascal_case("emit_signal"), "EmitSignal");
    }

    #[test]
    fn camel_lowers_first_segment_only() {
        assert_eq!(to_camel_case("max_speed"), "maxSpeed");
        assert_eq!(to_camel_case("object"), "object");
    }

    #[test]
    fn keyword_collisions_get_underscore() {
        assert_eq!(escape_keyword("object"), "_object");
        assert_eq!(escape_keyword("event"), "_event");
        assert_eq!(escape_keyword("target"), "target");
    }

    #[test]
    fn proxy_named_after_class_is_suffixed() {
        assert_eq!(avoid_class_collision("Resource", "Resource"), "Resource_");
        assert_eq!(avoid_class_collision("GetPath", "Resource"), "GetPath");
    }

    #[test]
    fn enum_members_lose_common_prefix() {
        let members = vec![
            "MODE_LINEAR".to_owned(),
            "MODE_NEAREST".to_owned(),
            "MODE_CUBIC".to_owned(),
        ];
        assert_eq!(
            deprefix_enum_members(&members),
            vec!["LINEAR", "NEAREST", "CUBIC"]
        );
    }

    #[test]
    fn digit_start_shortens_prefix_by_one_word() {
        let members = vec![
            "TEXTURE_TYPE_2D".to_owned(),
            "TEXTURE_TYPE_LAYERED".to_owned(),
        ];
        assert_eq!(
            deprefix_enum_members(&members),
            vec!["TYPE_2D", "TYPE_LAYERED"]
        );
    }

    #[test]
    fn single_member_enum_keeps_last_word() {
        let members = vec!["STATE_ONLY".to_owned()];
        assert_eq!(deprefix_enum_members(&members), vec!["STATE_ONLY"]);
    }
}
