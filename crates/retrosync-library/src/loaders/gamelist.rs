//! EmulationStation-family `gamelist.xml` loader

use super::xml::parse_records;
use super::{
    AssetHint, FieldMap, LoadedEntries, Loader, RawEntry, SystemSource, discover_per_platform,
};
use crate::LibraryError;
use crate::model::StableKey;
use crate::paths::to_slash;
use crate::scanner::RomScanner;
use retrosync_config::{AssetType, EcosystemDescriptor, MetadataContainer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Media tags understood across EmulationStation forks
pub const GAMELIST_MEDIA_TAGS: &[(&str, AssetType)] = &[
    ("image", AssetType::BoxFront),
    ("thumbnail", AssetType::ScreenshotGameplay),
    ("titleshot", AssetType::ScreenshotTitle),
    ("marquee", AssetType::Marquee),
    ("wheel", AssetType::Wheel),
    ("fanart", AssetType::Fanart),
    ("boxback", AssetType::BoxBack),
    ("cartridge", AssetType::Disc),
    ("mix", AssetType::Miximage),
    ("bezel", AssetType::Bezel),
    ("video", AssetType::Video),
    ("manual", AssetType::Manual),
];

static GAMELIST_FIELDS: FieldMap = FieldMap {
    title: &["name"],
    sort_title: &["sortname"],
    release_date: &["releasedate"],
    genres: &["genre"],
    developer: &["developer"],
    publisher: &["publisher"],
    rating: &["rating"],
    play_count: &["playcount"],
    last_played: &["lastplayed"],
    favorite: &["favorite"],
    hidden: &["hidden"],
    description: &["desc"],
    players: &["players"],
    rating_scale: 1.0,
    genre_separators: &[',', ';'],
};

/// Reads `gamelist.xml` files and reconciles them with the ROMs on disk
#[derive(Debug, Default, Clone, Copy)]
pub struct GamelistLoader;

impl GamelistLoader {
    fn parse(&self, source: &SystemSource, path: &Path) -> Result<Vec<RawEntry>, LibraryError> {
        let xml = std::fs::read_to_string(path)?;
        let records =
            parse_records(&xml, "gameList", "game").map_err(|message| LibraryError::LoaderParse {
                system: source.platform_label.clone(),
                path: path.to_path_buf(),
                message,
            })?;

        Ok(records
            .into_iter()
            .map(|record| {
                let mut entry = RawEntry::new(record.fields.get("path").cloned().unwrap_or_default());
                for (tag, asset_type) in GAMELIST_MEDIA_TAGS {
                    if let Some(reference) = record.fields.get(*tag)
                        && !reference.trim().is_empty()
                    {
                        entry.hints.push(AssetHint {
                            asset_type: *asset_type,
                            reference: reference.clone(),
                        });
                    }
                }
                entry.fields = record.fields;
                for (key, value) in record.attributes {
                    entry.fields.insert(format!("@{key}"), value);
                }
                entry
            })
            .collect())
    }
}

impl Loader for GamelistLoader {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::XmlPerSystem
    }

    fn discover(
        &self,
        descriptor: &EcosystemDescriptor,
        content_root: &Path,
    ) -> Result<Vec<SystemSource>, LibraryError> {
        Ok(discover_per_platform(descriptor, content_root))
    }

    fn load(
        &self,
        source: &SystemSource,
        descriptor: &EcosystemDescriptor,
    ) -> Result<LoadedEntries, LibraryError> {
        let mut loaded = LoadedEntries::default();

        if let Some(path) = &source.container_path {
            for entry in self.parse(source, path)? {
                if entry.rom_ref.trim().is_empty() {
                    loaded
                        .warnings
                        .push(format!("{}: entry without <path> skipped", path.display()));
                } else {
                    loaded.entries.push(entry);
                }
            }
        } else {
            loaded.warnings.push(format!(
                "No gamelist for {}, loading from file names",
                source.platform_label
            ));
        }

        // ROMs on disk that the gamelist does not list
        let listed: HashSet<PathBuf> = loaded
            .entries
            .iter()
            .map(|entry| self.rom_path(entry, source, descriptor))
            .collect();
        for rom in RomScanner::new().scan(&source.rom_root)? {
            if !listed.contains(&rom) {
                loaded.entries.push(RawEntry::new(format!("./{}", to_slash(&rom))));
            }
        }

        Ok(loaded)
    }

    fn field_map(&self) -> &'static FieldMap {
        &GAMELIST_FIELDS
    }

    fn stable_key(&self, entry: &RawEntry) -> Option<StableKey> {
        let id = entry.field("@id")?.trim();
        if id == "0" {
            return None;
        }
        let source = entry
            .field("@source")
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| "screenscraper".to_string());
        Some(StableKey::Scraper {
            source,
            id: id.to_string(),
        })
    }
}
