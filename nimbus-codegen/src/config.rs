// Generator configuration, optionally loaded from NimbusCodegen.toml next
// to the project. Everything has a default so the generator runs with no
// config file at all.

use std::path::Path;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Managed project receiving the core API.
    pub core_project: String,
    /// Managed project receiving editor-only classes.
    pub editor_project: String,
    /// Namespace the generated types live in.
    pub namespace: String,
    pub api_version: String,
    pub version: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        CodegenConfig {
            core_project: "Nimbus".to_owned(),
            editor_project: "NimbusEditor".to_owned(),
            namespace: "Nimbus".to_owned(),
            api_version: "1.0".to_owned(),
            version: "0.1.0".to_owned(),
        }
    }
}

impl CodegenConfig {
    pub fn load(path: &Path) -> Result<CodegenConfig, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        toml::from_str(&text).map_err(|e| format!("cannot parse {}: {e}", path.display()))
    }

    /// Config from `NimbusCodegen.toml` if present, defaults otherwise.
    pub fn load_or_default(dir: &Path) -> Result<CodegenConfig, String> {
        let path = dir.join("NimbusCodegen.toml");
        if path.exists() {
            CodegenConfig::load(&path)
        } else {
            Ok(CodegenConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_defaults() {
        let config: CodegenConfig = toml::from_str("namespace = \"Game\"").unwrap();
        assert_eq!(config.namespace, "Game");
        assert_eq!(config.core_project, "Nimbus");
    }
}
