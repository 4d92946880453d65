//! Configuration for RetroSync
//!
//! Holds the engine settings loaded from TOML, the static ecosystem descriptor registry,
//! the platform label table, and the persisted per-output system mapping overrides.

mod assets;
mod ecosystems;
mod mapping_store;
mod platforms;

pub use assets::{AssetType, IMAGE_EXTENSIONS, MANUAL_EXTENSIONS, MetadataField, VIDEO_EXTENSIONS};
pub use ecosystems::{
    AssetLayout, AssetSlot, EcosystemDescriptor, EcosystemRegistry, FingerprintRule, LabelFamily,
    MetadataContainer, PLATFORM_PLACEHOLDER, PathReferences, RuleKind, SlotNaming, Tier,
    expand_template, template_matches,
};
pub use mapping_store::{STORE_DIR, SystemMapping, SystemMappingStore, suggest_mapping};
pub use platforms::{CanonicalPlatform, Platform, PlatformTable, normalize_label};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// File name of the engine configuration inside the user config directory
pub const CONFIG_FILE: &str = "config.toml";

/// How a merge treats an incoming entry that differs from the existing one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    #[default]
    KeepExisting,
    OverwriteWithIncoming,
    Manual,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep-existing" | "keep" => Ok(ConflictPolicy::KeepExisting),
            "overwrite-with-incoming" | "overwrite" => Ok(ConflictPolicy::OverwriteWithIncoming),
            "manual" => Ok(ConflictPolicy::Manual),
            other => Err(ConfigError::Invalid(format!("unknown conflict policy: {other}"))),
        }
    }
}

/// Detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Maximum directory depth probed below the root
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Stop snapshotting after this many entries
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Minimum confidence accepted without a forced ecosystem
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

fn default_max_depth() -> usize {
    4
}

fn default_max_entries() -> usize {
    200_000
}

fn default_confidence_threshold() -> f32 {
    0.5
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_entries: default_max_entries(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

/// Asset resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Shortest slug accepted for a prefix-based title match
    #[serde(default = "default_fuzzy_min_prefix")]
    pub fuzzy_min_prefix: usize,

    /// Check every resolved asset for existence and size after loading
    #[serde(default = "default_true")]
    pub verify_after_load: bool,
}

fn default_fuzzy_min_prefix() -> usize {
    8
}

fn default_true() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_prefix: default_fuzzy_min_prefix(),
            verify_after_load: true,
        }
    }
}

/// Background worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Pool size for per-game fan-out; 0 picks the number of CPUs
    #[serde(default)]
    pub threads: usize,

    /// Capacity of the progress event queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Conversion defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Copy ROM files into the target tree
    #[serde(default = "default_true")]
    pub copy_roms: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            copy_roms: true,
        }
    }
}

/// Offline metadata from local DAT files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Folder of DATs searched before the source's own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Also search `dats/` style folders inside the source
    #[serde(default = "default_true")]
    pub search_source: bool,

    /// Hash ROMs whose file name matches no DAT entry
    #[serde(default)]
    pub compute_missing_hashes: bool,

    /// DAT file per system id, bypassing the search
    #[serde(default)]
    pub dats: BTreeMap<String, PathBuf>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            root: None,
            search_source: true,
            compute_missing_hashes: false,
            dats: BTreeMap::new(),
        }
    }
}

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl EngineConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the user config directory
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path()
            && path.exists()
        {
            return Self::load(&path);
        }

        tracing::warn!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Default configuration path, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "retrosync")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply a partial TOML document on top of this configuration
    pub fn overlay(&self, overlay: &str) -> Result<Self, ConfigError> {
        let mut base = toml::Value::try_from(self)?;
        let overlay: toml::Value = toml::from_str(overlay)?;
        merge_toml(&mut base, overlay);
        let merged: Self = base.try_into()?;
        merged.validate()?;
        Ok(merged)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.detection.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within 0..1, got {threshold}"
            )));
        }
        if self.detection.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.worker.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

/// Helper function to merge TOML values
pub fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml(base_value, value);
                } else {
                    base_table.insert(key, value);
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.detection.max_depth, 4);
        assert_eq!(config.detection.confidence_threshold, 0.5);
        assert_eq!(config.resolver.fuzzy_min_prefix, 8);
        assert_eq!(config.conversion.conflict_policy, ConflictPolicy::KeepExisting);
        assert!(config.conversion.copy_roms);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
[detection]
max_depth = 6
confidence_threshold = 0.7

[conversion]
conflict_policy = "manual"
"#;
        write!(temp_file, "{}", config_content).unwrap();

        let config = EngineConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.detection.max_depth, 6);
        assert_eq!(config.detection.confidence_threshold, 0.7);
        assert_eq!(config.detection.max_entries, 200_000);
        assert_eq!(config.conversion.conflict_policy, ConflictPolicy::Manual);
        assert_eq!(config.worker.queue_capacity, 256);
    }

    #[test]
    fn test_metadata_section() {
        let config = EngineConfig::default();
        assert!(config.metadata.search_source);
        assert!(config.metadata.root.is_none());

        let config = config
            .overlay("[metadata]\nroot = \"/dats\"\ncompute_missing_hashes = true\n\n[metadata.dats]\narcade = \"/dats/fbneo.dat\"\n")
            .unwrap();
        assert_eq!(config.metadata.root.as_deref(), Some(Path::new("/dats")));
        assert!(config.metadata.compute_missing_hashes);
        assert!(config.metadata.search_source);
        assert_eq!(config.metadata.dats["arcade"], PathBuf::from("/dats/fbneo.dat"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/retrosync.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[detection]\nconfidence_threshold = 1.5\n").unwrap();
        let err = EngineConfig::load(temp_file.path()).unwrap_err();
        assert!(format!("{}", err).contains("Invalid"));
    }

    #[test]
    fn test_save_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut config = EngineConfig::default();
        config.worker.threads = 3;

        config.save(temp_file.path()).unwrap();

        let loaded = EngineConfig::load(temp_file.path()).unwrap();
        assert_eq!(loaded.worker.threads, 3);
    }

    #[test]
    fn test_overlay() {
        let config = EngineConfig::default();
        let merged = config
            .overlay("[resolver]\nfuzzy_min_prefix = 12\n")
            .unwrap();
        assert_eq!(merged.resolver.fuzzy_min_prefix, 12);
        assert!(merged.resolver.verify_after_load);
        assert_eq!(merged.detection.max_depth, 4);
    }

    #[test]
    fn test_conflict_policy_parse() {
        assert_eq!(
            "overwrite-with-incoming".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::OverwriteWithIncoming
        );
        assert_eq!("KEEP".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::KeepExisting);
        assert!("sometimes".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn test_merge_toml_tables() {
        let base_table = toml::toml! {
            [detection]
            max_depth = 4
            max_entries = 10
        };
        let mut base = toml::Value::Table(base_table);

        let overlay_table = toml::toml! {
            [detection]
            max_depth = 2
        };
        let overlay = toml::Value::Table(overlay_table);

        merge_toml(&mut base, overlay);

        let table = base.as_table().unwrap();
        let detection = table.get("detection").unwrap().as_table().unwrap();
        assert_eq!(detection.get("max_depth").unwrap().as_integer(), Some(2));
        assert_eq!(detection.get("max_entries").unwrap().as_integer(), Some(10));
    }

    #[test]
    fn test_merge_toml_replaces_non_tables() {
        let mut base = toml::Value::Integer(42);
        let overlay = toml::Value::Integer(100);

        merge_toml(&mut base, overlay);

        assert_eq!(base.as_integer(), Some(100));
    }
}
