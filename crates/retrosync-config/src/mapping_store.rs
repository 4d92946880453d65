//! Persisted system mapping overrides
//!
//! Users can map a source system to an arbitrary target platform label. Those choices are
//! remembered per output root and target ecosystem in
//! `<output>/.retrosync/system_mapping.json`.

use crate::ConfigError;
use crate::platforms::normalize_label;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const STORE_DIR: &str = ".retrosync";
pub const STORE_FILE: &str = "system_mapping.json";

/// source system id -> target platform label
pub type SystemMapping = BTreeMap<String, String>;

type StorePayload = BTreeMap<String, SystemMapping>;

/// Mapping overrides stored under one output root
#[derive(Debug, Clone)]
pub struct SystemMappingStore {
    path: PathBuf,
}

impl SystemMappingStore {
    pub fn new(output_root: &Path) -> Self {
        Self {
            path: output_root.join(STORE_DIR).join(STORE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_payload(&self) -> StorePayload {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return StorePayload::new(),
        };
        match serde_json::from_str(&contents) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Ignoring unreadable mapping store {}: {}", self.path.display(), e);
                StorePayload::new()
            }
        }
    }

    /// Load the mapping for a target ecosystem. Missing or corrupt stores yield an
    /// empty mapping.
    pub fn load(&self, target: &str) -> SystemMapping {
        let mut payload = self.read_payload();
        payload
            .remove(&bucket_key(target))
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect()
    }

    /// Replace the mapping for a target ecosystem, keeping other targets intact
    pub fn save(&self, target: &str, mapping: &SystemMapping) -> Result<(), ConfigError> {
        let mut payload = self.read_payload();
        let cleaned: SystemMapping = mapping
            .iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();
        payload.insert(bucket_key(target), cleaned);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&payload)?;
        std::fs::write(&self.path, contents)?;
        tracing::info!("System mapping saved to {}", self.path.display());
        Ok(())
    }
}

fn bucket_key(target: &str) -> String {
    target.trim().to_lowercase()
}

/// Suggest target labels for source systems from labels already present in the
/// destination. Previous choices win, then exact case-insensitive matches, then
/// normalised matches.
pub fn suggest_mapping(
    source_systems: &[String],
    destination_systems: &[String],
    previous: &SystemMapping,
) -> SystemMapping {
    let mut suggestions = SystemMapping::new();
    for source in source_systems {
        let source = source.trim();
        if source.is_empty() {
            continue;
        }
        if let Some(label) = previous.get(source) {
            suggestions.insert(source.to_string(), label.clone());
            continue;
        }
        let exact = destination_systems
            .iter()
            .find(|d| d.eq_ignore_ascii_case(source));
        let normalized = || {
            let key = normalize_label(source);
            destination_systems
                .iter()
                .find(|d| normalize_label(d) == key)
        };
        if let Some(label) = exact.or_else(normalized) {
            suggestions.insert(source.to_string(), label.clone());
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = SystemMappingStore::new(dir.path());
        assert!(store.load("es_de").is_empty());
    }

    #[test]
    fn test_save_and_load_per_target() {
        let dir = TempDir::new().unwrap();
        let store = SystemMappingStore::new(dir.path());

        let mut es = SystemMapping::new();
        es.insert("homebrew".to_string(), "ports".to_string());
        store.save("ES_DE", &es).unwrap();

        let mut lb = SystemMapping::new();
        lb.insert("homebrew".to_string(), "Homebrew".to_string());
        lb.insert("  ".to_string(), "ignored".to_string());
        store.save("launchbox", &lb).unwrap();

        assert_eq!(store.load("es_de").get("homebrew").unwrap(), "ports");
        let loaded = store.load("launchbox");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("homebrew").unwrap(), "Homebrew");
        assert!(store.path().ends_with(".retrosync/system_mapping.json"));
    }

    #[test]
    fn test_corrupt_store_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = SystemMappingStore::new(dir.path());
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load("es_de").is_empty());
    }

    #[test]
    fn test_suggest_mapping() {
        let sources = vec!["snes".to_string(), "Game Boy".to_string(), "odd".to_string()];
        let destinations = vec!["SNES".to_string(), "game_boy".to_string()];
        let mut previous = SystemMapping::new();
        previous.insert("odd".to_string(), "Oddities".to_string());

        let suggested = suggest_mapping(&sources, &destinations, &previous);
        assert_eq!(suggested.get("snes").unwrap(), "SNES");
        assert_eq!(suggested.get("Game Boy").unwrap(), "game_boy");
        assert_eq!(suggested.get("odd").unwrap(), "Oddities");
    }
}
