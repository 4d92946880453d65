//! RetroArch `.lpl` playlist loader, JSON and legacy six-line formats

use super::{FieldMap, LoadedEntries, Loader, RawEntry, SystemSource};
use crate::LibraryError;
use crate::model::StableKey;
use crate::paths::ReferenceBase;
use retrosync_config::{EcosystemDescriptor, MetadataContainer, template_matches};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lines per entry in the pre-JSON playlist format
const LEGACY_RECORD_LINES: usize = 6;

/// JSON playlist document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub default_core_path: String,
    #[serde(default)]
    pub default_core_name: String,
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub core_path: String,
    #[serde(default)]
    pub core_name: String,
    #[serde(default)]
    pub crc32: String,
    #[serde(default)]
    pub db_name: String,
}

static PLAYLIST_FIELDS: FieldMap = FieldMap {
    title: &["label"],
    ..FieldMap::EMPTY
};

/// Parse playlist text in either format. Items without a path, and a trailing
/// incomplete legacy record, are dropped with a warning.
pub fn parse_playlist(text: &str) -> Result<(Vec<PlaylistItem>, Vec<String>), LibraryError> {
    let mut warnings = Vec::new();
    let items = if text.trim_start().starts_with('{') {
        let playlist: Playlist = serde_json::from_str(text)?;
        playlist.items
    } else {
        let lines: Vec<&str> = text.lines().collect();
        let mut items = Vec::new();
        for chunk in lines.chunks(LEGACY_RECORD_LINES) {
            if chunk.len() < LEGACY_RECORD_LINES {
                if chunk.iter().any(|l| !l.trim().is_empty()) {
                    warnings.push(format!(
                        "incomplete playlist record dropped ({} of {} lines)",
                        chunk.len(),
                        LEGACY_RECORD_LINES
                    ));
                }
                continue;
            }
            items.push(PlaylistItem {
                path: chunk[0].to_string(),
                label: chunk[1].to_string(),
                core_path: chunk[2].to_string(),
                core_name: chunk[3].to_string(),
                crc32: chunk[4].to_string(),
                db_name: chunk[5].to_string(),
            });
        }
        items
    };

    let (kept, dropped): (Vec<_>, Vec<_>) =
        items.into_iter().partition(|item| !item.path.trim().is_empty());
    for item in dropped {
        warnings.push(format!("playlist item {:?} without path dropped", item.label));
    }
    Ok((kept, warnings))
}

/// Path of an item without the archive member suffix (`game.zip#game.sfc`)
fn item_file(path: &str) -> &str {
    match path.split_once('#') {
        Some((file, _)) => file,
        None => path,
    }
}

/// Deepest directory shared by all paths
fn common_parent(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut iter = paths.iter().filter_map(|p| p.parent());
    let mut common = iter.next()?.to_path_buf();
    for parent in iter {
        while !parent.starts_with(&common) {
            if !common.pop() {
                return None;
            }
        }
    }
    Some(common)
}

/// Reads RetroArch playlists; one playlist is one system
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaylistLoader;

impl PlaylistLoader {
    /// ROM root of a playlist: `roms/<label>` when present, otherwise the deepest
    /// directory holding every item
    fn rom_root(
        descriptor: &EcosystemDescriptor,
        content_root: &Path,
        label: &str,
        playlist: &Path,
    ) -> PathBuf {
        let conventional = content_root.join("roms").join(label);
        if conventional.is_dir() {
            return conventional;
        }
        let Ok((items, _)) = std::fs::read_to_string(playlist)
            .map_err(LibraryError::from)
            .and_then(|text| parse_playlist(&text))
        else {
            return content_root.to_path_buf();
        };
        let base = ReferenceBase {
            rom_root: content_root.to_path_buf(),
            container_dir: content_root.to_path_buf(),
            content_root: content_root.to_path_buf(),
            style: descriptor.references,
        };
        let files: Vec<PathBuf> = items
            .iter()
            .filter_map(|item| base.resolve(item_file(&item.path)))
            .collect();
        common_parent(&files).unwrap_or_else(|| content_root.to_path_buf())
    }
}

impl Loader for PlaylistLoader {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::Playlist
    }

    fn discover(
        &self,
        descriptor: &EcosystemDescriptor,
        content_root: &Path,
    ) -> Result<Vec<SystemSource>, LibraryError> {
        let mut sources: Vec<SystemSource> = Vec::new();
        for template in descriptor.container_paths {
            for (label, path) in template_matches(content_root, template) {
                if label.is_empty() || sources.iter().any(|s| s.platform_label == label) {
                    continue;
                }
                let rom_root = Self::rom_root(descriptor, content_root, &label, &path);
                sources.push(SystemSource::new(label, content_root, rom_root, Some(path)));
            }
        }
        Ok(sources)
    }

    fn load(
        &self,
        source: &SystemSource,
        _descriptor: &EcosystemDescriptor,
    ) -> Result<LoadedEntries, LibraryError> {
        let mut loaded = LoadedEntries::default();
        let Some(path) = &source.container_path else {
            return Ok(loaded);
        };
        let text = std::fs::read_to_string(path)?;
        let (items, warnings) = parse_playlist(&text).map_err(|e| LibraryError::LoaderParse {
            system: source.platform_label.clone(),
            path: path.clone(),
            message: e.to_string(),
        })?;
        loaded.warnings = warnings;

        for item in items {
            let mut entry = RawEntry::new(item_file(&item.path));
            for (key, value) in [
                ("label", item.label),
                ("core_path", item.core_path),
                ("core_name", item.core_name),
                ("crc32", item.crc32),
                ("db_name", item.db_name),
            ] {
                if !value.trim().is_empty() {
                    entry.fields.insert(key.to_string(), value);
                }
            }
            loaded.entries.push(entry);
        }
        Ok(loaded)
    }

    fn field_map(&self) -> &'static FieldMap {
        &PLAYLIST_FIELDS
    }

    fn stable_key(&self, entry: &RawEntry) -> Option<StableKey> {
        let crc = entry.field("crc32")?;
        let value = crc.split('|').next().unwrap_or_default().trim().to_lowercase();
        if value.len() != 8
            || value == "00000000"
            || !value.chars().all(|c| c.is_ascii_hexdigit())
        {
            return None;
        }
        Some(StableKey::Checksum {
            algorithm: "crc32".to_string(),
            value,
        })
    }
}
