// Native glue emission. One C++ shim per icall plus the registration
// function binding every shim symbol to its managed extern declaration.
// Editor-only shims compile out of release builds.

use std::path::PathBuf;

use crate::config::CodegenConfig;
use crate::cs_gen::GeneratedFile;
use crate::icall::{Icall, IcallTable};
use crate::type_map::builtin_fragments;

fn c_param_type(kind: &str) -> &'static str {
    match kind {
        "bool" => "MonoBoolean",
        "int" => "int64_t",
        "float" => "double",
        "string" => "MonoString *",
        "nil" => "MonoObject *",
        "vector2" => "Vector2 *",
        "vector3" => "Vector3 *",
        "rect2" => "Rect2 *",
        "plane" => "Plane *",
        "quat" => "Quat *",
        "basis" => "Basis *",
        "transform" => "Transform *",
        "aabb" => "AABB *",
        "color" => "Color *",
        "packed_byte_array" | "packed_int_array" | "packed_float_array"
        | "packed_string_array" | "packed_vector2_array" | "packed_vector3_array"
        | "packed_color_array" => "MonoArray *",
        // Handle kinds and object references cross as engine pointers.
        _ => "Object *",
    }
}

fn c_ret_type(kind: Option<&str>) -> &'static str {
    match kind {
        None => "void",
        Some("bool") => "MonoBoolean",
        Some("int") => "int64_t",
        Some("float") => "double",
        Some("string") => "MonoString *",
        Some(k) if builtin_fragments(k).is_some() => "MonoObject *",
        Some(_) => "MonoObject *",
    }
}

fn marshal_in(kind: &str, arg: &str) -> String {
    match kind {
        "bool" | "int" | "float" => format!("Variant({arg})"),
        "string" => format!("Variant(mono_string_to_engine({arg}))"),
        "nil" => format!("mono_object_to_variant({arg})"),
        _ => {
            if c_param_type(kind).ends_with('*') && kind != "string" {
                format!("variant_from_ptr_{kind}({arg})")
            } else {
                format!("Variant({arg})")
            }
        }
    }
}

fn marshal_out(kind: Option<&str>) -> Option<String> {
    kind.map(|k| match k {
        "bool" => "ret.operator bool()".to_owned(),
        "int" => "ret.operator int64_t()".to_owned(),
        "float" => "ret.operator double()".to_owned(),
        "string" => "mono_string_from_engine(ret.operator String())".to_owned(),
        _ => "variant_to_mono_object(ret)".to_owned(),
    })
}

fn shim_signature(icall: &Icall) -> String {
    let ret = c_ret_type(icall.return_kind.as_deref());
    if icall.singleton {
        return format!("{ret} {}()", icall.name);
    }
    let mut params = vec![
        "MethodBind *method".to_owned(),
        "Object *ptr".to_owned(),
    ];
    for (i, kind) in icall.arg_kinds.iter().enumerate() {
        params.push(format!("{} arg{i}", c_param_type(kind).trim_end()));
    }
    format!("{ret} {}({})", icall.name, params.join(", "))
}

fn emit_shim(icall: &Icall, out: &mut String) {
    out.push_str(&shim_signature(icall));
    out.push_str(" {\n");
    if icall.singleton {
        let class = &icall.users[0].0;
        out.push_str(&format!(
            "\treturn Engine::get_singleton_object(\"{class}\");\n}}\n\n"
        ));
        return;
    }

    let argc = icall.arg_kinds.len();
    if argc > 0 {
        for (i, kind) in icall.arg_kinds.iter().enumerate() {
            out.push_str(&format!(
                "\tVariant arg{i}_in = {};\n",
                marshal_in(kind, &format!("arg{i}"))
            ));
        }
        let refs: Vec<String> = (0..argc).map(|i| format!("&arg{i}_in")).collect();
        out.push_str(&format!(
            "\tconst Variant *call_args[{argc}] = {{ {} }};\n",
            refs.join(", ")
        ));
        out.push_str(&format!(
            "\tVariant ret = method->call(ptr, call_args, {argc});\n"
        ));
    } else {
        out.push_str("\tVariant ret = method->call(ptr, nullptr, 0);\n");
    }
    match marshal_out(icall.return_kind.as_deref()) {
        Some(expr) => out.push_str(&format!("\treturn {expr};\n")),
        None => out.push_str("\t(void)ret;\n"),
    }
    out.push_str("}\n\n");
}

pub fn generate_glue(icalls: &IcallTable, config: &CodegenConfig) -> Vec<GeneratedFile> {
    let header = String::from(
        "// Generated; do not edit.\n#pragma once\n\nvoid nimbus_register_mono_icalls();\n",
    );

    let mut source = String::from(
        "// Generated; do not edit.\n#include \"mono_glue.gen.h\"\n\n",
    );

    source.push_str(
        "MethodBind *nimbus_icall_class_db_get_method(MonoString *type, MonoString *method) {\n\treturn ClassDB::get_method(mono_string_to_engine(type), mono_string_to_engine(method));\n}\n\n",
    );

    for icall in icalls.icalls().filter(|i| !i.editor_only) {
        emit_shim(icall, &mut source);
    }
    let editor: Vec<&Icall> = icalls.icalls().filter(|i| i.editor_only).collect();
    if !editor.is_empty() {
        source.push_str("#ifdef TOOLS_ENABLED\n\n");
        for icall in editor {
            emit_shim(icall, &mut source);
        }
        source.push_str("#endif // TOOLS_ENABLED\n\n");
    }

    // Registration binds managed extern names to shim symbols.
    source.push_str("void nimbus_register_mono_icalls() {\n");
    source.push_str(&format!(
        "\tmono_add_internal_call(\"{0}.NativeCalls::nimbus_icall_class_db_get_method\", (void *)nimbus_icall_class_db_get_method);\n",
        config.namespace
    ));
    for icall in icalls.icalls() {
        if icall.editor_only {
            continue;
        }
        source.push_str(&format!(
            "\tmono_add_internal_call(\"{0}.NativeCalls::{1}\", (void *){1});\n",
            config.namespace, icall.name
        ));
    }
    let editor: Vec<&Icall> = icalls.icalls().filter(|i| i.editor_only).collect();
    if !editor.is_empty() {
        source.push_str("#ifdef TOOLS_ENABLED\n");
        for icall in editor {
            source.push_str(&format!(
                "\tmono_add_internal_call(\"{0}.NativeCalls::{1}\", (void *){1});\n",
                config.namespace, icall.name
            ));
        }
        source.push_str("#endif // TOOLS_ENABLED\n");
    }
    source.push_str("}\n");

    vec![
        GeneratedFile {
            path: PathBuf::from("glue/mono_glue.gen.h"),
            content: header,
        },
        GeneratedFile {
            path: PathBuf::from("glue/mono_glue.gen.cpp"),
            content: source,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_dump::{ArgDump, MethodDump};

    fn method(name: &str, ret: Option<&str>, args: &[&str]) -> MethodDump {
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
            editor: false,
        }
    }

    fn glue_source(icalls: &IcallTable) -> String {
        let files = generate_glue(icalls, &CodegenConfig::default());
        files
            .into_iter()
            .find(|f| f.path.ends_with("mono_glue.gen.cpp"))
            .unwrap()
            .content
    }

    #[test]
    fn shim_marshals_arguments_and_return() {
        let mut table = IcallTable::new();
        table.register("Resource", &method("get_path", Some("string"), &[]), false);
        let source = glue_source(&table);
        assert!(source.contains("MonoString *"));
        assert!(source.contains("method->call(ptr, nullptr, 0)"));
        assert!(source.contains("mono_string_from_engine(ret.operator String())"));
    }

    #[test]
    fn editor_shims_are_guarded() {
        let mut table = IcallTable::new();
        table.register("EditorPlugin", &method("scan", None, &["string"]), true);
        let source = glue_source(&table);
        assert!(source.contains("#ifdef TOOLS_ENABLED"));
        assert!(source.contains("#endif // TOOLS_ENABLED"));
    }

    #[test]
    fn registration_covers_every_shim() {
        let mut table = IcallTable::new();
        table.register("Object", &method("set_meta", None, &["string", "nil"]), false);
        table.register_singleton("Input", false);
        let source = glue_source(&table);
        for icall in table.icalls() {
            assert!(source.contains(&format!("::{}\"", icall.name)));
        }
        assert!(source.contains("Engine::get_singleton_object(\"Input\")"));
    }
}
