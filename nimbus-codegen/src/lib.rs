// nimbus-codegen: dumps the live ClassDB, generates the managed API sources
// and the native glue that backs them.

pub mod api_dump;
pub mod config;
pub mod cs_gen;
pub mod docs;
pub mod glue_gen;
pub mod icall;
pub mod naming;
pub mod type_map;

use std::path::Path;

use crate::api_dump::ApiDump;
use crate::config::CodegenConfig;
use crate::cs_gen::GeneratedFile;
use crate::docs::DocData;
use crate::icall::IcallTable;

/// Which halves of the output to write. Icall assignment always runs over
/// the full surface so shim names agree across modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlueMode {
    All,
    CsOnly,
    CppOnly,
}

/// Run the generate command. Main entry point for codegen.
pub fn run_generate(output_dir: &Path, mode: GlueMode) {
    nimbus_core::register_core_classes();
    nimbus_core::class_db::register_all_from_inventory();

    let config = CodegenConfig::load_or_default(output_dir)
        .unwrap_or_else(|e| panic!("Failed to load config: {e}"));

    let docs_path = output_dir.join("NimbusDocs.json");
    let docs = if docs_path.exists() {
        DocData::load(&docs_path).unwrap_or_else(|e| panic!("Failed to load docs: {e}"))
    } else {
        DocData::default()
    };

    eprintln!("nimbus-codegen: dumping ClassDB...");
    let dump = ApiDump::from_class_db();
    eprintln!(
        "  {} exposed classes, api hash {} (core) / {} (editor)",
        dump.classes.len(),
        dump.api_hash_core,
        dump.api_hash_editor
    );

    eprintln!("nimbus-codegen: generating managed sources...");
    let mut icalls = IcallTable::new();
    let cs = cs_gen::generate_cs_api(&dump, &config, &docs, &mut icalls);
    eprintln!("  {} files, {} icalls", cs.files.len(), icalls.len());

    if matches!(mode, GlueMode::All | GlueMode::CsOnly) {
        write_files(output_dir, &cs.files);
    }

    if matches!(mode, GlueMode::All | GlueMode::CppOnly) {
        eprintln!("nimbus-codegen: generating native glue...");
        let glue = glue_gen::generate_glue(&icalls, &config);
        write_files(output_dir, &glue);
    }

    // Dump snapshot next to the output for diffing between engine builds.
    let dump_path = output_dir.join("api.gen.json");
    std::fs::write(&dump_path, dump.to_json())
        .unwrap_or_else(|e| panic!("Failed to write {}: {e}", dump_path.display()));

    eprintln!("nimbus-codegen: verifying output...");
    verify_output(&dump, cs.dirty, output_dir, &config, mode);

    eprintln!("nimbus-codegen: done!");
}

fn write_files(output_dir: &Path, files: &[GeneratedFile]) {
    for file in files {
        let path = output_dir.join(&file.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("Failed to create {}: {e}", parent.display()));
        }
        std::fs::write(&path, &file.content)
            .unwrap_or_else(|e| panic!("Failed to write {}: {e}", path.display()));
    }
}

/// Every rename key must still exist on the exposed surface; a stale entry
/// means the override silently stopped applying.
pub fn verify_method_renames(dump: &ApiDump) -> Vec<String> {
    let mut errors = Vec::new();
    for (snake, managed) in naming::METHOD_RENAMES {
        let found = dump
            .classes
            .iter()
            .any(|c| c.methods.iter().any(|m| m.name == *snake));
        if !found {
            errors.push(format!(
                "Stale method rename: '{snake}' -> '{managed}' matches no exposed method"
            ));
        }
    }
    errors
}

/// Verify codegen output integrity.
fn verify_output(
    dump: &ApiDump,
    dirty: bool,
    output_dir: &Path,
    config: &CodegenConfig,
    mode: GlueMode,
) {
    let mut errors = verify_method_renames(dump);

    if dirty {
        errors.push("Unresolved type references; output contains MISSING_TYPE_ sentinels".into());
    }

    let mut required: Vec<std::path::PathBuf> = Vec::new();
    if matches!(mode, GlueMode::All | GlueMode::CsOnly) {
        required.push(
            Path::new(&config.core_project)
                .join("Generated/NativeCalls.cs"),
        );
        required.push(
            Path::new(&config.core_project)
                .join("Generated/GeneratedIncludes.props"),
        );
    }
    if matches!(mode, GlueMode::All | GlueMode::CppOnly) {
        required.push("glue/mono_glue.gen.cpp".into());
        required.push("glue/mono_glue.gen.h".into());
    }
    for rel in &required {
        let path = output_dir.join(rel);
        match std::fs::metadata(&path) {
            Ok(m) if m.len() == 0 => errors.push(format!("Output empty: {}", path.display())),
            Err(_) => errors.push(format!("Output missing: {}", path.display())),
            _ => {}
        }
    }

    if errors.is_empty() {
        eprintln!("  OK: {} classes", dump.classes.len());
    } else {
        eprintln!("  Verification FAILED:");
        for e in &errors {
            eprintln!("    - {e}");
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_renames_match_live_surface() {
        nimbus_core::register_core_classes();
        let dump = ApiDump::from_class_db();
        assert!(verify_method_renames(&dump).is_empty());
    }

    #[test]
    fn generate_writes_both_halves() {
        let dir = tempfile::tempdir().unwrap();
        run_generate(dir.path(), GlueMode::All);
        assert!(dir.path().join("Nimbus/Generated/NativeCalls.cs").exists());
        assert!(dir
            .path()
            .join("Nimbus/Generated/GodotObjects/Object.cs")
            .exists());
        assert!(dir.path().join("glue/mono_glue.gen.cpp").exists());
        assert!(dir.path().join("api.gen.json").exists());
    }

    #[test]
    fn cs_only_skips_glue() {
        let dir = tempfile::tempdir().unwrap();
        run_generate(dir.path(), GlueMode::CsOnly);
        assert!(dir.path().join("Nimbus/Generated/NativeCalls.cs").exists());
        assert!(!dir.path().join("glue/mono_glue.gen.cpp").exists());
    }

    #[test]
    fn rerun_is_byte_identical() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        run_generate(a.path(), GlueMode::All);
        run_generate(b.path(), GlueMode::All);
        let rel = "Nimbus/Generated/GodotObjects/Resource.cs";
        let first = std::fs::read_to_string(a.path().join(rel)).unwrap();
        let second = std::fs::read_to_string(b.path().join(rel)).unwrap();
        assert_eq!(first, second);
    }
}
