//! Canonical library model shared by every ecosystem

use crate::metadata::GameMetadata;
use retrosync_config::AssetType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// How an asset was tied to its game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMethod {
    ExplicitReference,
    SuffixMatch,
    FilenameMirror,
    TitleFuzzyMatch,
    FallbackScan,
}

/// Result of the last verification pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    #[default]
    Unknown,
    Present,
    Missing,
}

/// A media file attached to a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_type: AssetType,
    /// Absolute path
    pub file_path: PathBuf,
    /// Lowercase file extension
    pub format: String,
    pub association: AssociationMethod,
    #[serde(default)]
    pub verified: Verification,
}

impl Asset {
    pub fn new(asset_type: AssetType, file_path: PathBuf, association: AssociationMethod) -> Self {
        let format = file_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self {
            asset_type,
            file_path,
            format,
            association,
            verified: Verification::Unknown,
        }
    }
}

/// Identity used when matching entries across libraries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StableKey {
    /// Id assigned by a scraper or metadata database
    Scraper { source: String, id: String },
    /// Content checksum declared by the container
    Checksum { algorithm: String, value: String },
    /// Derived from system and ROM path
    Path { value: String },
}

impl StableKey {
    pub fn from_path(system_id: &str, rom_path: &Path) -> Self {
        let path = rom_path.to_string_lossy().replace('\\', "/").to_lowercase();
        StableKey::Path {
            value: format!("{}/{}", system_id.to_lowercase(), path),
        }
    }
}

impl fmt::Display for StableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StableKey::Scraper { source, id } => write!(f, "{source}:{id}"),
            StableKey::Checksum { algorithm, value } => write!(f, "{algorithm}:{value}"),
            StableKey::Path { value } => write!(f, "path:{value}"),
        }
    }
}

/// One game entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Relative to the system's ROM root, case preserved
    pub rom_path: PathBuf,
    pub title: String,
    pub stable_key: StableKey,
    #[serde(default)]
    pub metadata: GameMetadata,
    #[serde(default)]
    pub assets: BTreeMap<AssetType, Asset>,
    /// Further matches for asset types that were already filled
    #[serde(default)]
    pub ignored_assets: Vec<PathBuf>,
    /// Included in conversion
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl Game {
    pub fn new(system_id: &str, rom_path: PathBuf, title: impl Into<String>) -> Self {
        let stable_key = StableKey::from_path(system_id, &rom_path);
        Self {
            rom_path,
            title: title.into(),
            stable_key,
            metadata: GameMetadata::default(),
            assets: BTreeMap::new(),
            ignored_assets: Vec::new(),
            selected: true,
        }
    }

    /// ROM file name without extension
    pub fn rom_stem(&self) -> String {
        self.rom_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// ROM file name
    pub fn rom_file_name(&self) -> String {
        self.rom_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Lowercase basename used as the fallback merge key
    pub fn basename_key(&self) -> String {
        self.rom_file_name().to_lowercase()
    }

    /// Record an asset unless the type is already filled; further distinct matches are
    /// kept in `ignored_assets`
    pub fn attach_asset(&mut self, asset: Asset) {
        match self.assets.get(&asset.asset_type) {
            Some(existing) if existing.file_path == asset.file_path => {}
            Some(_) => {
                if !self.ignored_assets.contains(&asset.file_path) {
                    self.ignored_assets.push(asset.file_path);
                }
            }
            None => {
                self.assets.insert(asset.asset_type, asset);
            }
        }
    }
}

/// A platform within a library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct System {
    /// Canonical id, or the verbatim source label when unknown
    pub system_id: String,
    pub display_name: String,
    pub source_platform_label: String,
    pub rom_root: PathBuf,
    /// Folder per asset type in the source layout
    #[serde(default)]
    pub asset_roots: BTreeMap<AssetType, PathBuf>,
    pub container_path: Option<PathBuf>,
    pub needs_mapping: bool,
    /// Target platform label chosen by the user
    #[serde(default)]
    pub target_label: Option<String>,
    pub games: Vec<Game>,
}

impl System {
    pub fn selected_games(&self) -> impl Iterator<Item = &Game> {
        self.games.iter().filter(|g| g.selected)
    }

    pub fn game(&self, rom_path: &Path) -> Option<&Game> {
        self.games.iter().find(|g| g.rom_path == rom_path)
    }

    /// Absolute path of a game's ROM
    pub fn rom_file(&self, game: &Game) -> PathBuf {
        self.rom_root.join(&game.rom_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Error,
}

/// A loader problem isolated to one system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderIssue {
    pub system_label: String,
    pub severity: IssueSeverity,
    pub message: String,
}

impl LoaderIssue {
    pub fn warning(system_label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            system_label: system_label.into(),
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn error(system_label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            system_label: system_label.into(),
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }
}

/// A whole library as loaded from one source root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub source_root: PathBuf,
    pub source_ecosystem: String,
    pub detection_confidence: f32,
    pub systems: Vec<System>,
    #[serde(default)]
    pub issues: Vec<LoaderIssue>,
}

impl Library {
    pub fn system(&self, system_id: &str) -> Option<&System> {
        self.systems.iter().find(|s| s.system_id == system_id)
    }

    pub fn system_mut(&mut self, system_id: &str) -> Option<&mut System> {
        self.systems.iter_mut().find(|s| s.system_id == system_id)
    }

    pub fn game_count(&self) -> usize {
        self.systems.iter().map(|s| s.games.len()).sum()
    }

    pub fn unmapped_systems(&self) -> impl Iterator<Item = &System> {
        self.systems.iter().filter(|s| s.needs_mapping)
    }

    /// Every asset in the library, for verification passes
    pub fn assets_mut(&mut self) -> impl Iterator<Item = &mut Asset> {
        self.systems
            .iter_mut()
            .flat_map(|s| s.games.iter_mut())
            .flat_map(|g| g.assets.values_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_format_from_extension() {
        let asset = Asset::new(
            AssetType::BoxFront,
            PathBuf::from("/media/Mario.PNG"),
            AssociationMethod::FilenameMirror,
        );
        assert_eq!(asset.format, "png");
        assert_eq!(asset.verified, Verification::Unknown);
    }

    #[test]
    fn test_game_path_helpers() {
        let game = Game::new("snes", PathBuf::from("sub/Super Mario World.zip"), "SMW");
        assert_eq!(game.rom_stem(), "Super Mario World");
        assert_eq!(game.basename_key(), "super mario world.zip");
        assert_eq!(
            game.stable_key.to_string(),
            "path:snes/sub/super mario world.zip"
        );
    }

    #[test]
    fn test_attach_asset_keeps_first() {
        let mut game = Game::new("snes", PathBuf::from("a.zip"), "A");
        game.attach_asset(Asset::new(
            AssetType::BoxFront,
            PathBuf::from("/m/a.png"),
            AssociationMethod::ExplicitReference,
        ));
        game.attach_asset(Asset::new(
            AssetType::BoxFront,
            PathBuf::from("/m/a-2.png"),
            AssociationMethod::FallbackScan,
        ));
        assert_eq!(game.assets.len(), 1);
        assert_eq!(game.assets[&AssetType::BoxFront].file_path, PathBuf::from("/m/a.png"));
        assert_eq!(game.ignored_assets, vec![PathBuf::from("/m/a-2.png")]);
    }
}
