// Managed source emission. One file per exposed class, plus the icall
// declaration file, the global constants class, the embedded API metadata,
// and a .props file enumerating everything so the managed project does not
// list generated files by hand.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::api_dump::{ApiDump, ClassDump, MethodDump};
use crate::config::CodegenConfig;
use crate::docs::{xml_doc_block, DocData};
use crate::icall::IcallTable;
use crate::naming::{
    avoid_class_collision, escape_keyword, deprefix_enum_members, method_name, to_camel_case,
    to_pascal_case,
};
use crate::type_map::{fragments_for, TypeFragments};

#[derive(Clone, Debug)]
pub struct GeneratedFile {
    /// Path relative to the output root.
    pub path: PathBuf,
    pub content: String,
}

pub struct CsApiOutput {
    pub files: Vec<GeneratedFile>,
    /// Set when any type reference resolved to a placeholder.
    pub dirty: bool,
}

type IcallNames = HashMap<(String, String), String>;

/// Generate the managed API for both projects. Icalls are registered as a
/// side effect; the caller hands the same table to the glue generator.
pub fn generate_cs_api(
    dump: &ApiDump,
    config: &CodegenConfig,
    docs: &DocData,
    icalls: &mut IcallTable,
) -> CsApiOutput {
    let mut names: IcallNames = HashMap::new();
    for class in &dump.classes {
        for method in &class.methods {
            if method.vararg {
                continue;
            }
            let icall = icalls.register(&class.name, method, class.editor);
            names.insert((class.name.clone(), method.name.clone()), icall);
        }
        if class.singleton {
            let icall = icalls.register_singleton(&class.name, class.editor);
            names.insert((class.name.clone(), "get_singleton".to_owned()), icall);
        }
    }

    let mut dirty = false;
    let mut files = Vec::new();
    for (editor, project) in [(false, &config.core_project), (true, &config.editor_project)] {
        let project_classes: Vec<&ClassDump> =
            dump.classes.iter().filter(|c| c.editor == editor).collect();
        if editor && project_classes.is_empty() {
            continue;
        }
        let mut includes = Vec::new();
        for class in &project_classes {
            let (content, class_dirty) = emit_class(class, dump, config, docs, &names);
            dirty |= class_dirty;
            let rel = PathBuf::from(project)
                .join("Generated/GodotObjects")
                .join(format!("{}.cs", to_pascal_case(&class.name)));
            includes.push(rel.clone());
            files.push(GeneratedFile { path: rel, content });
        }

        let native_calls = emit_native_calls(icalls, editor, config);
        let rel = PathBuf::from(project).join("Generated/NativeCalls.cs");
        includes.push(rel.clone());
        files.push(GeneratedFile {
            path: rel,
            content: native_calls,
        });

        let api_hash = if editor {
            &dump.api_hash_editor
        } else {
            &dump.api_hash_core
        };
        let rel = PathBuf::from(project).join("Generated/ApiConstants.cs");
        includes.push(rel.clone());
        files.push(GeneratedFile {
            path: rel,
            content: emit_api_constants(config, api_hash),
        });

        if !editor {
            let rel = PathBuf::from(project).join("Generated/GlobalScope_constants.cs");
            includes.push(rel.clone());
            files.push(GeneratedFile {
                path: rel,
                content: emit_global_scope(config),
            });
        }

        files.push(GeneratedFile {
            path: PathBuf::from(project).join("Generated/GeneratedIncludes.props"),
            content: emit_includes_props(&includes),
        });
    }

    CsApiOutput { files, dirty }
}

// ---------------------------------------------------------------------------
// Per-class emission
// ---------------------------------------------------------------------------

fn emit_class(
    class: &ClassDump,
    dump: &ApiDump,
    config: &CodegenConfig,
    docs: &DocData,
    names: &IcallNames,
) -> (String, bool) {
    let mut dirty = false;
    let pascal = to_pascal_case(&class.name);
    let mut out = String::new();
    out.push_str("using System;\nusing System.Runtime.CompilerServices;\n\n");
    out.push_str(&format!("namespace {}\n{{\n", config.namespace));

    if let Some(doc) = docs.class_doc(&class.name) {
        out.push_str(&xml_doc_block(doc, "    "));
    }
    match &class.parent {
        Some(parent) => out.push_str(&format!(
            "    public partial class {pascal} : {}\n    {{\n",
            to_pascal_case(parent)
        )),
        None => out.push_str(&format!("    public partial class {pascal}\n    {{\n")),
    }

    for (name, value) in &class.constants {
        let member = avoid_class_collision(&to_pascal_case(name), &pascal);
        out.push_str(&format!("        public const long {member} = {value};\n"));
    }
    if !class.constants.is_empty() {
        out.push('\n');
    }

    for enum_dump in &class.enums {
        let enum_name = avoid_class_collision(&to_pascal_case(&enum_dump.name), &pascal);
        out.push_str(&format!("        public enum {enum_name}\n        {{\n"));
        let raw: Vec<String> = enum_dump.members.iter().map(|(n, _)| n.clone()).collect();
        let stripped = deprefix_enum_members(&raw);
        for (member, (_, value)) in stripped.iter().zip(&enum_dump.members) {
            out.push_str(&format!(
                "            {} = {value},\n",
                to_pascal_case(&member.to_ascii_lowercase())
            ));
        }
        out.push_str("        }\n\n");
    }

    // Shared shims dispatch through a cached method bind resolved once per
    // class load.
    let bindable: Vec<&MethodDump> = class.methods.iter().filter(|m| !m.vararg).collect();
    let mut bind_index: HashMap<&str, usize> = HashMap::new();
    if !bindable.is_empty() {
        out.push_str(&format!(
            "        private const string nativeName = \"{}\";\n\n",
            class.name
        ));
        for (i, method) in bindable.iter().enumerate() {
            bind_index.insert(method.name.as_str(), i);
            out.push_str(&format!(
                "        private static IntPtr method_bind_{i} = NativeCalls.nimbus_icall_class_db_get_method(nativeName, \"{}\");\n",
                method.name
            ));
        }
        out.push('\n');
    }

    if class.singleton {
        let icall = &names[&(class.name.clone(), "get_singleton".to_owned())];
        out.push_str(&format!(
            "        private static {pascal} singleton;\n\n        public static {pascal} Singleton\n        {{\n            get\n            {{\n                if (singleton == null)\n                    singleton = ({pascal})InteropUtils.UnmanagedGetManaged(NativeCalls.{icall}());\n                return singleton;\n            }}\n        }}\n\n"
        ));
    }

    // Accessor methods backing a property stay public but deprecated.
    let mut accessor_methods: Vec<(&str, String)> = Vec::new();
    for property in &class.properties {
        let frag = fragments_for(&property.kind, "", dump);
        dirty |= frag.placeholder;
        let prop_name = avoid_class_collision(&to_pascal_case(&property.name), &pascal);
        if let Some(doc) = docs.member_doc(&class.name, &property.name) {
            out.push_str(&xml_doc_block(doc, "        "));
        }
        out.push_str(&format!(
            "        public {} {prop_name}\n        {{\n",
            frag.cs_type
        ));
        if !property.getter.is_empty() {
            out.push_str(&format!(
                "            get {{ return {}(); }}\n",
                method_name(&property.getter)
            ));
            accessor_methods.push((&property.getter, prop_name.clone()));
        }
        if !property.setter.is_empty() {
            out.push_str(&format!(
                "            set {{ {}(value); }}\n",
                method_name(&property.setter)
            ));
            accessor_methods.push((&property.setter, prop_name.clone()));
        }
        out.push_str("        }\n\n");
    }

    for method in &class.methods {
        let (text, method_dirty) = emit_method(
            class,
            method,
            dump,
            docs,
            names,
            &bind_index,
            &pascal,
            &accessor_methods,
        );
        dirty |= method_dirty;
        out.push_str(&text);
    }

    for method in &class.virtual_methods {
        let (text, method_dirty) = emit_virtual_method(method, dump, &pascal);
        dirty |= method_dirty;
        out.push_str(&text);
    }

    out.push_str("    }\n}\n");
    (out, dirty)
}

fn emit_method(
    class: &ClassDump,
    method: &MethodDump,
    dump: &ApiDump,
    docs: &DocData,
    names: &IcallNames,
    bind_index: &HashMap<&str, usize>,
    pascal: &str,
    accessor_methods: &[(&str, String)],
) -> (String, bool) {
    let mut dirty = false;
    let mut out = String::new();
    let managed = avoid_class_collision(&method_name(&method.name), pascal);

    if let Some(doc) = docs.member_doc(&class.name, &method.name) {
        out.push_str(&xml_doc_block(doc, "        "));
    }
    if let Some((_, prop)) = accessor_methods
        .iter()
        .find(|(m, _)| *m == method.name.as_str())
    {
        out.push_str(&format!(
            "        [Obsolete(\"Use the {prop} property instead.\")]\n"
        ));
    }

    // Vararg methods route through the generic dynamic call.
    if method.vararg {
        let lead: Vec<String> = method
            .args
            .iter()
            .map(|a| {
                let frag = fragments_for(&a.kind, &a.class_name, dump);
                dirty |= frag.placeholder;
                format!("{} {}", frag.cs_type, escape_keyword(&to_camel_case(&a.name)))
            })
            .collect();
        let lead_names: Vec<String> = method
            .args
            .iter()
            .map(|a| escape_keyword(&to_camel_case(&a.name)))
            .collect();
        let mut sig = lead;
        sig.push("params object[] args".to_owned());
        out.push_str(&format!(
            "        public object {managed}({})\n        {{\n",
            sig.join(", ")
        ));
        let mut call_args = vec![format!("\"{}\"", method.name)];
        call_args.extend(lead_names);
        call_args.push("args".to_owned());
        out.push_str(&format!(
            "            return Call({});\n        }}\n\n",
            call_args.join(", ")
        ));
        return (out, dirty);
    }

    let ret = method.return_kind.as_deref().map(|kind| {
        let frag = fragments_for(kind, method.return_class.as_deref().unwrap_or(""), dump);
        dirty |= frag.placeholder;
        frag
    });
    let args: Vec<(String, TypeFragments)> = method
        .args
        .iter()
        .map(|a| {
            let frag = fragments_for(&a.kind, &a.class_name, dump);
            dirty |= frag.placeholder;
            (escape_keyword(&to_camel_case(&a.name)), frag)
        })
        .collect();

    let signature: Vec<String> = args
        .iter()
        .map(|(name, frag)| format!("{} {name}", frag.cs_type))
        .collect();
    let ret_type = ret.as_ref().map(|f| f.cs_type.clone()).unwrap_or_else(|| "void".to_owned());
    out.push_str(&format!(
        "        public {ret_type} {managed}({})\n        {{\n",
        signature.join(", ")
    ));

    let icall = &names[&(class.name.clone(), method.name.clone())];
    let bind = bind_index[method.name.as_str()];
    let mut call_args = vec![format!("method_bind_{bind}"), "Object.GetPtr(this)".to_owned()];
    call_args.extend(
        args.iter()
            .map(|(name, frag)| frag.cs_in.replace("%0", name)),
    );
    let call = format!("NativeCalls.{icall}({})", call_args.join(", "));
    match &ret {
        Some(frag) => out.push_str(&format!(
            "            {}\n",
            frag.cs_out.replace("%r", &call)
        )),
        None => out.push_str(&format!("            {call};\n")),
    }
    out.push_str("        }\n\n");
    (out, dirty)
}

/// Virtual methods get an empty default body so managed overrides compose
/// with engine dispatch.
fn emit_virtual_method(method: &MethodDump, dump: &ApiDump, pascal: &str) -> (String, bool) {
    let mut dirty = false;
    let managed = avoid_class_collision(&to_pascal_case(&method.name), pascal);
    let ret_type = match method.return_kind.as_deref() {
        Some(kind) => {
            let frag = fragments_for(kind, "", dump);
            dirty |= frag.placeholder;
            frag.cs_type
        }
        None => "void".to_owned(),
    };
    let signature: Vec<String> = method
        .args
        .iter()
        .map(|a| {
            let frag = fragments_for(&a.kind, &a.class_name, dump);
            dirty |= frag.placeholder;
            format!("{} {}", frag.cs_type, escape_keyword(&to_camel_case(&a.name)))
        })
        .collect();
    let body = if ret_type == "void" {
        String::new()
    } else {
        "return default;".to_owned()
    };
    (
        format!(
            "        public virtual {ret_type} {managed}({})\n        {{\n            {body}\n        }}\n\n",
            signature.join(", ")
        ),
        dirty,
    )
}

// ---------------------------------------------------------------------------
// Support files
// ---------------------------------------------------------------------------

fn emit_native_calls(icalls: &IcallTable, editor: bool, config: &CodegenConfig) -> String {
    let mut out = String::new();
    out.push_str("using System;\nusing System.Runtime.CompilerServices;\n\n");
    out.push_str(&format!("namespace {}\n{{\n", config.namespace));
    out.push_str("    internal static class NativeCalls\n    {\n");
    out.push_str("        [MethodImpl(MethodImplOptions.InternalCall)]\n");
    out.push_str(
        "        internal static extern IntPtr nimbus_icall_class_db_get_method(string type, string method);\n\n",
    );
    for icall in icalls.icalls() {
        if icall.editor_only != editor {
            continue;
        }
        let ret = icall
            .return_kind
            .as_deref()
            .map(|k| im_type(k, false))
            .unwrap_or_else(|| "void".to_owned());
        let mut params = if icall.singleton {
            Vec::new()
        } else {
            vec!["IntPtr method".to_owned(), "IntPtr ptr".to_owned()]
        };
        for (i, kind) in icall.arg_kinds.iter().enumerate() {
            params.push(format!("{} arg{i}", im_type(kind, true)));
        }
        out.push_str("        [MethodImpl(MethodImplOptions.InternalCall)]\n");
        out.push_str(&format!(
            "        internal static extern {ret} {}({});\n\n",
            icall.name,
            params.join(", ")
        ));
    }
    out.push_str("    }\n}\n");
    out
}

fn im_type(kind: &str, input: bool) -> String {
    match crate::type_map::builtin_fragments(kind) {
        Some(f) => {
            if input {
                f.im_type_in
            } else {
                f.im_type_out
            }
        }
        // Object kinds and placeholders cross as raw pointers.
        None => "IntPtr".to_owned(),
    }
}

/// Embedded metadata the bridge validates at load.
fn emit_api_constants(config: &CodegenConfig, api_hash: &str) -> String {
    format!(
        "namespace {}\n{{\n    internal static class ApiConstants\n    {{\n        internal const string ApiHash = \"{api_hash}\";\n        internal const string ApiVersion = \"{}\";\n        internal const string Version = \"{}\";\n    }}\n}}\n",
        config.namespace, config.api_version, config.version
    )
}

fn emit_global_scope(config: &CodegenConfig) -> String {
    let constants: &[(&str, i64)] = &[
        ("NotificationPostinitialize", nimbus_flags::NOTIFICATION_POSTINITIALIZE as i64),
        ("NotificationPredelete", nimbus_flags::NOTIFICATION_PREDELETE as i64),
        ("ConnectQueued", nimbus_flags::CONNECT_QUEUED as i64),
        ("ConnectPersist", nimbus_flags::CONNECT_PERSIST as i64),
        ("ConnectOneshot", nimbus_flags::CONNECT_ONESHOT as i64),
        ("ConnectReferenceCounted", nimbus_flags::CONNECT_REFERENCE_COUNTED as i64),
        ("PropertyUsageStorage", nimbus_flags::PROPERTY_USAGE_STORAGE as i64),
        ("PropertyUsageEditor", nimbus_flags::PROPERTY_USAGE_EDITOR as i64),
        ("PropertyUsageDefault", nimbus_flags::PROPERTY_USAGE_DEFAULT as i64),
    ];
    let mut out = format!(
        "namespace {}\n{{\n    public static class GlobalScope\n    {{\n",
        config.namespace
    );
    for (name, value) in constants {
        out.push_str(&format!("        public const long {name} = {value};\n"));
    }
    out.push_str("    }\n}\n");
    out
}

fn emit_includes_props(includes: &[PathBuf]) -> String {
    let mut out = String::from("<Project>\n  <ItemGroup>\n");
    for path in includes {
        // MSBuild wants backslashes.
        let windows = path.to_string_lossy().replace('/', "\\");
        out.push_str(&format!("    <Compile Include=\"{windows}\" />\n"));
    }
    out.push_str("  </ItemGroup>\n</Project>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_dump::ApiDump;

    fn generate() -> (CsApiOutput, IcallTable) {
        nimbus_core::register_core_classes();
        let dump = ApiDump::from_class_db();
        let config = CodegenConfig::default();
        let docs = DocData::default();
        let mut icalls = IcallTable::new();
        let out = generate_cs_api(&dump, &config, &docs, &mut icalls);
        (out, icalls)
    }

    #[test]
    fn core_project_contains_expected_files() {
        let (out, icalls) = generate();
        assert!(!icalls.is_empty());
        let paths: Vec<String> = out
            .files
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect();
        assert!(paths.contains(&"Nimbus/Generated/GodotObjects/Object.cs".to_owned()));
        assert!(paths.contains(&"Nimbus/Generated/NativeCalls.cs".to_owned()));
        assert!(paths.contains(&"Nimbus/Generated/GlobalScope_constants.cs".to_owned()));
        assert!(paths.contains(&"Nimbus/Generated/GeneratedIncludes.props".to_owned()));
        assert!(!out.dirty);
    }

    #[test]
    fn vararg_method_routes_through_generic_call() {
        let (out, _) = generate();
        let object_cs = out
            .files
            .iter()
            .find(|f| f.path.ends_with("GodotObjects/Object.cs"))
            .unwrap();
        assert!(object_cs.content.contains("params object[] args"));
        assert!(object_cs.content.contains("return Call(\"emit_signal\""));
    }

    #[test]
    fn property_accessors_stay_public_but_deprecated() {
        let (out, _) = generate();
        let resource_cs = out
            .files
            .iter()
            .find(|f| f.path.ends_with("GodotObjects/Resource.cs"))
            .unwrap();
        assert!(resource_cs.content.contains("public string ResourcePath"));
        assert!(resource_cs.content.contains("[Obsolete("));
        assert!(resource_cs.content.contains("public string GetPath()"));
    }

    #[test]
    fn output_is_deterministic() {
        let (first, _) = generate();
        let (second, _) = generate();
        assert_eq!(first.files.len(), second.files.len());
        for (a, b) in first.files.iter().zip(&second.files) {
            assert_eq!(a.path, b.path);
            assert_eq!(a.content, b.content);
        }
    }
}
