// Snapshot of the live ClassDB in a serializable form. The generator works
// from this dump, never from ClassInfo directly, so generation is
// reproducible and the dump can be written next to the output for diffing.

use nimbus_core::class_db::{class_db, ApiLevel, ClassInfo};
use nimbus_core::StringName;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArgDump {
    pub name: String,
    pub kind: String,
    /// For object kinds, the expected class.
    #[serde(default)]
    pub class_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodDump {
    pub name: String,
    pub return_kind: Option<String>,
    pub return_class: Option<String>,
    pub args: Vec<ArgDump>,
    pub default_count: usize,
    pub vararg: bool,
    pub is_const: bool,
    pub editor: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropertyDump {
    pub name: String,
    pub kind: String,
    pub setter: String,
    pub getter: String,
    pub usage: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumDump {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassDump {
    pub name: String,
    pub parent: Option<String>,
    pub editor: bool,
    pub singleton: bool,
    pub ref_counted: bool,
    pub instantiable: bool,
    pub methods: Vec<MethodDump>,
    pub virtual_methods: Vec<MethodDump>,
    pub properties: Vec<PropertyDump>,
    pub signals: Vec<MethodDump>,
    pub constants: Vec<(String, i64)>,
    pub enums: Vec<EnumDump>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiDump {
    pub classes: Vec<ClassDump>,
    pub api_hash_core: String,
    pub api_hash_editor: String,
}

impl ApiDump {
    /// Capture every exposed class, sorted by name.
    pub fn from_class_db() -> ApiDump {
        let db = class_db();
        let mut classes = Vec::new();
        for name in db.get_class_list() {
            let ci = db.get(name).expect("listed class vanished");
            if !ci.exposed {
                continue;
            }
            classes.push(dump_class(ci));
        }
        ApiDump {
            classes,
            api_hash_core: db.get_api_hash(ApiLevel::Core),
            api_hash_editor: db.get_api_hash(ApiLevel::Editor),
        }
    }

    pub fn find_class(&self, name: &str) -> Option<&ClassDump> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Classes at or below the requested API level.
    pub fn classes_for(&self, editor: bool) -> impl Iterator<Item = &ClassDump> {
        self.classes.iter().filter(move |c| editor || !c.editor)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("dump serializes")
    }
}

fn dump_class(ci: &'static ClassInfo) -> ClassDump {
    let mut methods = Vec::new();
    for m in ci.own_methods() {
        methods.push(MethodDump {
            name: m.name.as_str().to_owned(),
            return_kind: m.return_type.as_ref().map(|r| r.kind.name().to_owned()),
            return_class: m
                .return_type
                .as_ref()
                .filter(|r| !r.class_name.is_empty())
                .map(|r| r.class_name.as_str().to_owned()),
            args: m
                .args
                .iter()
                .map(|a| ArgDump {
                    name: a.name.as_str().to_owned(),
                    kind: a.kind.name().to_owned(),
                    class_name: a.class_name.as_str().to_owned(),
                })
                .collect(),
            default_count: m.default_args.len(),
            vararg: m.is_vararg(),
            is_const: m.flags & nimbus_flags::METHOD_FLAG_CONST != 0,
            editor: m.flags & nimbus_flags::METHOD_FLAG_EDITOR != 0,
        });
    }

    let virtual_methods = ci
        .own_virtual_methods()
        .iter()
        .map(|m| MethodDump {
            name: m.name.as_str().to_owned(),
            return_kind: m.return_type.as_ref().map(|r| r.kind.name().to_owned()),
            return_class: None,
            args: m
                .args
                .iter()
                .map(|a| ArgDump {
                    name: a.name.as_str().to_owned(),
                    kind: a.kind.name().to_owned(),
                    class_name: String::new(),
                })
                .collect(),
            default_count: 0,
            vararg: false,
            is_const: false,
            editor: false,
        })
        .collect();

    let properties = ci
        .own_properties()
        .iter()
        .filter(|p| p.usage & nimbus_flags::PROPERTY_USAGE_CATEGORY == 0)
        .map(|p| {
            let sg = ci.find_setget(p.name);
            PropertyDump {
                name: p.name.as_str().to_owned(),
                kind: p.kind.name().to_owned(),
                setter: sg.map(|s| s.setter.as_str().to_owned()).unwrap_or_default(),
                getter: sg.map(|s| s.getter.as_str().to_owned()).unwrap_or_default(),
                usage: p.usage,
            }
        })
        .collect();

    let signals = ci
        .own_signals()
        .iter()
        .map(|s| MethodDump {
            name: s.name.as_str().to_owned(),
            return_kind: None,
            return_class: None,
            args: s
                .args
                .iter()
                .map(|a| ArgDump {
                    name: a.name.as_str().to_owned(),
                    kind: a.kind.name().to_owned(),
                    class_name: String::new(),
                })
                .collect(),
            default_count: 0,
            vararg: false,
            is_const: false,
            editor: false,
        })
        .collect();

    let enums = ci
        .own_enums()
        .iter()
        .map(|(name, members)| EnumDump {
            name: name.as_str().to_owned(),
            members: members
                .iter()
                .map(|m| {
                    let value = ci.find_constant(*m).unwrap_or(0);
                    (m.as_str().to_owned(), value)
                })
                .collect(),
        })
        .collect::<Vec<_>>();

    // Enum members double as class constants; list only the loose ones.
    let enum_member_names: Vec<StringName> = ci
        .own_enums()
        .iter()
        .flat_map(|(_, members)| members.iter().copied())
        .collect();
    let constants = ci
        .own_constants()
        .iter()
        .filter(|(n, _)| !enum_member_names.contains(n))
        .map(|(n, v)| (n.as_str().to_owned(), *v))
        .collect();

    ClassDump {
        name: ci.name.as_str().to_owned(),
        parent: ci.parent().map(|p| p.name.as_str().to_owned()),
        editor: ci.api == ApiLevel::Editor,
        singleton: ci.singleton,
        ref_counted: ci.ref_counted,
        instantiable: ci.can_instantiate(),
        methods,
        virtual_methods,
        properties,
        signals,
        constants,
        enums,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_covers_core_classes_sorted() {
        nimbus_core::register_core_classes();
        let dump = ApiDump::from_class_db();
        assert!(dump.find_class("Object").is_some());
        assert!(dump.find_class("RefCounted").is_some());
        assert!(dump.find_class("Resource").is_some());
        let names: Vec<&str> = dump.classes.iter().map(|c| c.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn object_dump_has_signals_and_methods() {
        nimbus_core::register_core_classes();
        let dump = ApiDump::from_class_db();
        let object = dump.find_class("Object").unwrap();
        assert!(object.signals.iter().any(|s| s.name == "script_changed"));
        assert!(object.methods.iter().any(|m| m.name == "get_class"));
        let emit = object
            .methods
            .iter()
            .find(|m| m.name == "emit_signal")
            .unwrap();
        assert!(emit.vararg);
    }
}
