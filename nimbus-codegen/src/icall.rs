// Internal-call table. Methods with the same signature shape share one
// shim symbol; the table assigns deterministic names and tracks which
// build level each shim must be compiled into.

use std::collections::BTreeMap;

use crate::api_dump::MethodDump;

#[derive(Clone, Debug)]
pub struct Icall {
    pub name: String,
    pub return_kind: Option<String>,
    pub arg_kinds: Vec<String>,
    pub vararg: bool,
    /// True only while every method sharing this shim is editor-only.
    pub editor_only: bool,
    /// Dedicated shims (singleton getters) take no method bind and no
    /// instance pointer.
    pub singleton: bool,
    /// (class, method) pairs routed through this shim, in registration
    /// order.
    pub users: Vec<(String, String)>,
}

fn shape_hash(return_kind: Option<&str>, arg_kinds: &[String], vararg: bool) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(return_kind.unwrap_or("void").as_bytes());
    for kind in arg_kinds {
        hasher.update(b",");
        hasher.update(kind.as_bytes());
    }
    if vararg {
        hasher.update(b"...");
    }
    let hash = hasher.finalize();
    hash.to_hex()[..8].to_owned()
}

/// The unique per-method signature key:
/// `class + "_" + method + "_" + hash(return_type, arg_types...)` in hex.
pub fn signature_key(class: &str, method: &MethodDump) -> String {
    let hash = shape_hash(
        method.return_kind.as_deref(),
        &method.args.iter().map(|a| a.kind.clone()).collect::<Vec<_>>(),
        method.vararg,
    );
    format!("{class}_{}_{hash}", method.name)
}

#[derive(Default)]
pub struct IcallTable {
    // Keyed by shape so identical signatures dedupe.
    icalls: BTreeMap<String, Icall>,
    // Singleton getters are never shared.
    dedicated: Vec<Icall>,
}

impl IcallTable {
    pub fn new() -> IcallTable {
        IcallTable::default()
    }

    /// Register a method and return the name of the shim it dispatches
    /// through.
    pub fn register(&mut self, class: &str, method: &MethodDump, class_editor: bool) -> String {
        let arg_kinds: Vec<String> = method.args.iter().map(|a| a.kind.clone()).collect();
        let hash = shape_hash(method.return_kind.as_deref(), &arg_kinds, method.vararg);
        let name = format!("nimbus_icall_{}_{hash}", arg_kinds.len());
        let editor = class_editor || method.editor;

        let entry = self.icalls.entry(hash).or_insert_with(|| Icall {
            name: name.clone(),
            return_kind: method.return_kind.clone(),
            arg_kinds,
            vararg: method.vararg,
            editor_only: true,
            singleton: false,
            users: Vec::new(),
        });
        entry.editor_only &= editor;
        entry.users.push((class.to_owned(), method.name.clone()));
        name
    }

    /// Register the dedicated singleton getter for a class.
    pub fn register_singleton(&mut self, class: &str, class_editor: bool) -> String {
        let name = format!("nimbus_icall_{class}_get_singleton");
        if !self.dedicated.iter().any(|i| i.name == name) {
            self.dedicated.push(Icall {
                name: name.clone(),
                return_kind: Some("object".to_owned()),
                arg_kinds: Vec::new(),
                vararg: false,
                editor_only: class_editor,
                singleton: true,
                users: vec![(class.to_owned(), "get_singleton".to_owned())],
            });
        }
        name
    }

    /// All shims, shared ones ordered by shape key, then dedicated ones in
    /// registration order.
    pub fn icalls(&self) -> impl Iterator<Item = &Icall> {
        self.icalls.values().chain(self.dedicated.iter())
    }

    pub fn len(&self) -> usize {
        self.icalls.len() + self.dedicated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icalls.is_empty() && self.dedicated.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_dump::{ArgDump, MethodDump};

    fn method(name: &str, ret: Option<&str>, args: &[&str], editor: bool) -> MethodDump {
        MethodDump {
            name: name.to_owned(),
            return_kind: ret.map(str::to_owned),
            return_class: None,
            args: args
                .iter()
                .map(|k| ArgDump {
                    name: "arg".to_owned(),
                    kind: (*k).to_owned(),
                    class_name: String::new(),
                })
                .collect(),
            default_count: 0,
            vararg: false,
            is_const: false,
            editor,
        }
    }

    #[test]
    fn identical_shapes_share_one_shim() {
        let mut table = IcallTable::new();
        let a = table.register("Object", &method("set_meta", None, &["string", "nil"], false), false);
        let b = table.register("Resource", &method("set_extra", None, &["string", "nil"], false), false);
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        assert_eq!(table.icalls().next().unwrap().users.len(), 2);
    }

    #[test]
    fn editor_taint_requires_every_sharer_editor_only() {
        let mut table = IcallTable::new();
        table.register("EditorPlugin", &method("scan", None, &["string"], true), true);
        assert!(table.icalls().next().unwrap().editor_only);
        table.register("Resource", &method("load", None, &["string"], false), false);
        assert!(!table.icalls().next().unwrap().editor_only);
    }

    #[test]
    fn signature_key_embeds_class_method_and_hash() {
        let m = method("get_path", Some("string"), &[], false);
        let key = signature_key("Resource", &m);
        assert!(key.starts_with("Resource_get_path_"));
        assert_eq!(key.len(), "Resource_get_path_".len() + 8);
    }
}
