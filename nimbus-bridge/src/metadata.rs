// Scripts metadata: the build-time map from script resource paths to the
// managed classes they define. The map is what lets a script resource
// resolve its class without parsing source; when an entry is missing the
// runtime is asked for a class matching the file stem instead.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::MetadataError;
use crate::runtime::{ManagedClassName, ManagedRuntime};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ScriptEntry {
    class: ManagedClassName,
}

/// The parsed scripts metadata file.
#[derive(Clone, Debug, Default)]
pub struct ScriptsMetadata {
    entries: HashMap<String, ScriptEntry>,
}

impl ScriptsMetadata {
    pub fn load(path: &Path) -> Result<ScriptsMetadata, MetadataError> {
        let text = fs::read_to_string(path)?;
        ScriptsMetadata::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<ScriptsMetadata, MetadataError> {
        let entries: HashMap<String, ScriptEntry> = serde_json::from_str(text)?;
        Ok(ScriptsMetadata { entries })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries).expect("metadata serializes")
    }

    pub fn insert(&mut self, res_path: &str, class: ManagedClassName) {
        self.entries
            .insert(res_path.to_owned(), ScriptEntry { class });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The class recorded for a script resource path.
    pub fn class_for_path(&self, res_path: &str) -> Option<&ManagedClassName> {
        self.entries.get(res_path).map(|e| &e.class)
    }
}

/// Resolve the managed class behind a script path: metadata first, then the
/// runtime's unqualified lookup on the file stem.
pub fn resolve_script_class(
    metadata: Option<&ScriptsMetadata>,
    res_path: &str,
    runtime: &dyn ManagedRuntime,
) -> Option<ManagedClassName> {
    if let Some(class) = metadata.and_then(|m| m.class_for_path(res_path)) {
        return Some(class.clone());
    }
    let stem = Path::new(res_path).file_stem()?.to_str()?;
    let found = runtime.find_class_unqualified(stem);
    if found.is_none() {
        warn!(path = res_path, "script has no metadata entry and no class matches its file name");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_and_resolves() {
        let mut meta = ScriptsMetadata::default();
        meta.insert(
            "res://player/Player.cs",
            ManagedClassName::new("Game", "PlayerController"),
        );
        let parsed = ScriptsMetadata::from_json(&meta.to_json()).unwrap();
        assert_eq!(
            parsed.class_for_path("res://player/Player.cs").unwrap(),
            &ManagedClassName::new("Game", "PlayerController")
        );
        assert!(parsed.class_for_path("res://missing.cs").is_none());
    }

    #[test]
    fn malformed_metadata_is_a_parse_error() {
        let err = ScriptsMetadata::from_json("{not json").unwrap_err();
        assert!(matches!(err, MetadataError::Parse(_)));
    }
}
