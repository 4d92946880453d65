//! Metadata container loaders
//!
//! Each container family gets one [`Loader`]. A loader discovers the systems present
//! under a content root and turns one system's container into raw entries; turning
//! those into canonical games is shared by all loaders through [`FieldMap`].

mod filename;
mod gamelist;
mod launchbox_sqlite;
mod launchbox_xml;
mod playlist;
mod romlist;
pub(crate) mod xml;

pub use filename::FilenameLoader;
pub use gamelist::GamelistLoader;
pub use launchbox_sqlite::LaunchBoxSqliteLoader;
pub use launchbox_xml::LaunchBoxXmlLoader;
pub use playlist::{Playlist, PlaylistItem, PlaylistLoader, parse_playlist};
pub use romlist::{EmulatorConfig, ROMLIST_COLUMNS, RomlistLoader, parse_romlist};

use crate::LibraryError;
use crate::metadata::{
    GameMetadata, non_empty, parse_bool, parse_date, parse_datetime, parse_rating, split_genres,
};
use crate::model::StableKey;
use crate::paths::{ReferenceBase, relative_to};
use crate::scanner::RomScanner;
use retrosync_config::{
    AssetType, EcosystemDescriptor, MetadataContainer, expand_template, template_matches,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One system found under a content root
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSource {
    /// Platform label as the source names it
    pub platform_label: String,
    pub content_root: PathBuf,
    pub rom_root: PathBuf,
    pub container_path: Option<PathBuf>,
    /// Asset folders declared by the container, overriding the descriptor's slots
    pub asset_folders: BTreeMap<AssetType, PathBuf>,
    /// ROM extensions declared by the container, with leading dot
    pub rom_extensions: Vec<String>,
}

impl SystemSource {
    pub fn new(
        platform_label: impl Into<String>,
        content_root: &Path,
        rom_root: PathBuf,
        container_path: Option<PathBuf>,
    ) -> Self {
        Self {
            platform_label: platform_label.into(),
            content_root: content_root.to_path_buf(),
            rom_root,
            container_path,
            asset_folders: BTreeMap::new(),
            rom_extensions: Vec::new(),
        }
    }

    /// Bases for resolving references written in this system's container
    pub fn reference_base(&self, descriptor: &EcosystemDescriptor) -> ReferenceBase {
        let container_dir = self
            .container_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.rom_root.clone());
        ReferenceBase {
            rom_root: self.rom_root.clone(),
            container_dir,
            content_root: self.content_root.clone(),
            style: descriptor.references,
        }
    }
}

/// A container reference to a media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHint {
    pub asset_type: AssetType,
    pub reference: String,
}

/// One game entry as read from a container, before canonicalisation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    /// ROM reference as written by the container
    pub rom_ref: String,
    pub fields: BTreeMap<String, String>,
    pub hints: Vec<AssetHint>,
}

impl RawEntry {
    pub fn new(rom_ref: impl Into<String>) -> Self {
        Self {
            rom_ref: rom_ref.into(),
            ..Default::default()
        }
    }

    /// Non-blank field value, matched exactly or else ignoring case
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match self.fields.get(name) {
            Some(value) => Some(value.as_str()),
            None => self
                .fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// First non-blank value among several candidate names
    pub fn first(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.field(name))
    }
}

/// Entries read from one container
#[derive(Debug, Clone, Default)]
pub struct LoadedEntries {
    pub entries: Vec<RawEntry>,
    /// Recoverable problems, e.g. dropped rows
    pub warnings: Vec<String>,
}

/// Source field names for each canonical metadata field
#[derive(Debug, Clone)]
pub struct FieldMap {
    pub title: &'static [&'static str],
    pub sort_title: &'static [&'static str],
    pub release_date: &'static [&'static str],
    pub genres: &'static [&'static str],
    pub developer: &'static [&'static str],
    pub publisher: &'static [&'static str],
    pub rating: &'static [&'static str],
    pub play_count: &'static [&'static str],
    pub last_played: &'static [&'static str],
    pub favorite: &'static [&'static str],
    pub hidden: &'static [&'static str],
    pub description: &'static [&'static str],
    pub players: &'static [&'static str],
    /// Upper bound of the source's rating scale
    pub rating_scale: f32,
    pub genre_separators: &'static [char],
}

impl FieldMap {
    /// Map with no fields; titles come from file names
    pub const EMPTY: FieldMap = FieldMap {
        title: &[],
        sort_title: &[],
        release_date: &[],
        genres: &[],
        developer: &[],
        publisher: &[],
        rating: &[],
        play_count: &[],
        last_played: &[],
        favorite: &[],
        hidden: &[],
        description: &[],
        players: &[],
        rating_scale: 1.0,
        genre_separators: &[','],
    };

    pub fn title(&self, entry: &RawEntry) -> Option<String> {
        entry.first(self.title).and_then(non_empty)
    }

    /// Canonical metadata of an entry; unparseable values are dropped
    pub fn metadata(&self, entry: &RawEntry) -> GameMetadata {
        let text = |names: &[&str]| entry.first(names).and_then(non_empty);
        GameMetadata {
            sort_title: text(self.sort_title),
            release_date: entry.first(self.release_date).and_then(parse_date),
            genres: entry
                .first(self.genres)
                .map(|v| split_genres(v, self.genre_separators))
                .unwrap_or_default(),
            developer: text(self.developer),
            publisher: text(self.publisher),
            rating: entry
                .first(self.rating)
                .and_then(|v| parse_rating(v, self.rating_scale))
                .filter(|r| *r > 0.0),
            play_count: entry
                .first(self.play_count)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            last_played: entry.first(self.last_played).and_then(parse_datetime),
            favorite: entry.first(self.favorite).is_some_and(parse_bool),
            hidden: entry.first(self.hidden).is_some_and(parse_bool),
            description: text(self.description),
            players: text(self.players),
            ..GameMetadata::default()
        }
    }
}

/// Reads one kind of metadata container
pub trait Loader: Send + Sync {
    fn container(&self) -> MetadataContainer;

    /// Systems present under the content root
    fn discover(
        &self,
        descriptor: &EcosystemDescriptor,
        content_root: &Path,
    ) -> Result<Vec<SystemSource>, LibraryError>;

    /// Read one system's entries. Errors are confined to that system.
    fn load(
        &self,
        source: &SystemSource,
        descriptor: &EcosystemDescriptor,
    ) -> Result<LoadedEntries, LibraryError>;

    fn field_map(&self) -> &'static FieldMap;

    /// Identity declared by the container, if any
    fn stable_key(&self, _entry: &RawEntry) -> Option<StableKey> {
        None
    }

    /// ROM path of an entry, relative to the system's ROM root when below it
    fn rom_path(
        &self,
        entry: &RawEntry,
        source: &SystemSource,
        descriptor: &EcosystemDescriptor,
    ) -> PathBuf {
        match source.reference_base(descriptor).resolve(&entry.rom_ref) {
            Some(path) => relative_to(&path, &source.rom_root),
            None => PathBuf::from(&entry.rom_ref),
        }
    }
}

/// Loader for a container family
pub fn loader_for(container: MetadataContainer) -> Box<dyn Loader> {
    match container {
        MetadataContainer::XmlPerSystem => Box::new(GamelistLoader),
        MetadataContainer::XmlCentral => Box::new(LaunchBoxXmlLoader),
        MetadataContainer::Sqlite => Box::new(LaunchBoxSqliteLoader),
        MetadataContainer::Playlist => Box::new(PlaylistLoader),
        MetadataContainer::Plaintext => Box::new(RomlistLoader),
        MetadataContainer::FilenameOnly => Box::new(FilenameLoader),
    }
}

/// Systems of a per-platform layout: every label with a container, plus every ROM
/// directory that holds at least one ROM.
pub(crate) fn discover_per_platform(
    descriptor: &EcosystemDescriptor,
    content_root: &Path,
) -> Vec<SystemSource> {
    let mut containers: BTreeMap<String, PathBuf> = BTreeMap::new();
    for template in descriptor.container_paths {
        for (label, path) in template_matches(content_root, template) {
            if !label.is_empty() {
                containers.entry(label).or_insert(path);
            }
        }
    }

    let mut rom_dirs: BTreeMap<String, PathBuf> = BTreeMap::new();
    for template in descriptor.rom_dirs {
        for (label, path) in template_matches(content_root, template) {
            if !label.is_empty() && path.is_dir() {
                rom_dirs.entry(label).or_insert(path);
            }
        }
    }

    let scanner = RomScanner::new();
    let mut labels: Vec<String> = containers.keys().cloned().collect();
    for (label, dir) in &rom_dirs {
        if containers.contains_key(label) {
            continue;
        }
        if scanner.scan(dir).is_ok_and(|roms| !roms.is_empty()) {
            labels.push(label.clone());
        } else {
            tracing::debug!("Skipping {} without ROMs", dir.display());
        }
    }
    labels.sort_by_key(|l| l.to_lowercase());

    labels
        .into_iter()
        .map(|label| {
            let rom_root = rom_dirs
                .get(&label)
                .cloned()
                .unwrap_or_else(|| default_rom_root(descriptor, content_root, &label));
            let container = containers.get(&label).cloned();
            SystemSource::new(label, content_root, rom_root, container)
        })
        .collect()
}

/// First ROM directory template expanded for a label
pub(crate) fn default_rom_root(
    descriptor: &EcosystemDescriptor,
    content_root: &Path,
    label: &str,
) -> PathBuf {
    descriptor
        .rom_dirs
        .first()
        .map(|template| content_root.join(expand_template(template, label)))
        .unwrap_or_else(|| content_root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrosync_config::EcosystemRegistry;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_raw_entry_field_lookup() {
        let mut entry = RawEntry::new("./a.zip");
        entry.fields.insert("Title".to_string(), "A".to_string());
        entry.fields.insert("blank".to_string(), "  ".to_string());
        assert_eq!(entry.field("title"), Some("A"));
        assert_eq!(entry.field("blank"), None);
        assert_eq!(entry.first(&["name", "Title"]), Some("A"));
    }

    #[test]
    fn test_field_map_metadata() {
        static MAP: FieldMap = FieldMap {
            title: &["name"],
            rating: &["rating"],
            genres: &["genre"],
            release_date: &["releasedate"],
            favorite: &["favorite"],
            ..FieldMap::EMPTY
        };
        let mut entry = RawEntry::new("./a.zip");
        for (k, v) in [
            ("name", "Alpha"),
            ("rating", "0.8"),
            ("genre", "Platform, Action"),
            ("releasedate", "not a date"),
            ("favorite", "true"),
        ] {
            entry.fields.insert(k.to_string(), v.to_string());
        }

        assert_eq!(MAP.title(&entry).as_deref(), Some("Alpha"));
        let metadata = MAP.metadata(&entry);
        assert_eq!(metadata.rating, Some(0.8));
        assert_eq!(metadata.genres, vec!["Platform", "Action"]);
        assert_eq!(metadata.release_date, None);
        assert!(metadata.favorite);
    }

    #[test]
    fn test_discover_per_platform_skips_empty_rom_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("roms/snes")).unwrap();
        fs::create_dir_all(root.join("roms/bios")).unwrap();
        fs::create_dir_all(root.join("roms/nes")).unwrap();
        fs::write(root.join("roms/snes/Mario.sfc"), b"rom").unwrap();
        fs::write(root.join("roms/nes/gamelist.xml"), b"<gameList/>").unwrap();

        let descriptor = EcosystemRegistry::builtin().get("es_classic").unwrap();
        let sources = discover_per_platform(descriptor, root);
        let labels: Vec<_> = sources.iter().map(|s| s.platform_label.as_str()).collect();
        assert_eq!(labels, vec!["nes", "snes"]);
        assert_eq!(
            sources[0].container_path,
            Some(root.join("roms/nes/gamelist.xml"))
        );
        assert_eq!(sources[1].container_path, None);
        assert_eq!(sources[1].rom_root, root.join("roms/snes"));
    }
}
