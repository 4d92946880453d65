//! LaunchBox `Data/Platforms/<platform>.xml` loader

use super::xml::parse_records;
use super::{AssetHint, FieldMap, LoadedEntries, Loader, RawEntry, SystemSource, default_rom_root};
use crate::LibraryError;
use crate::model::StableKey;
use retrosync_config::{AssetType, EcosystemDescriptor, MetadataContainer, template_matches};
use std::path::Path;

/// Path fields of a LaunchBox game record and the asset each one points at.
/// Only `ManualPath` and `VideoPath` are written by current versions.
pub const LAUNCHBOX_PATH_FIELDS: &[(&str, AssetType)] = &[
    ("ManualPath", AssetType::Manual),
    ("VideoPath", AssetType::Video),
    ("FrontImagePath", AssetType::BoxFront),
    ("BackImagePath", AssetType::BoxBack),
    ("ScreenshotImagePath", AssetType::ScreenshotGameplay),
    ("ClearLogoImagePath", AssetType::Logo),
    ("MarqueeImagePath", AssetType::Marquee),
    ("BackgroundImagePath", AssetType::Fanart),
];

pub(crate) static LAUNCHBOX_FIELDS: FieldMap = FieldMap {
    title: &["Title"],
    sort_title: &["SortTitle"],
    release_date: &["ReleaseDate"],
    genres: &["Genre", "Genres"],
    developer: &["Developer"],
    publisher: &["Publisher"],
    rating: &["StarRatingFloat", "StarRating", "CommunityStarRating"],
    play_count: &["PlayCount"],
    last_played: &["LastPlayedDate"],
    favorite: &["Favorite"],
    hidden: &["Hide"],
    description: &["Notes"],
    players: &["MaxPlayers"],
    rating_scale: 5.0,
    genre_separators: &[';', ','],
};

/// Hints from the path fields of a record
pub(crate) fn launchbox_hints(entry: &RawEntry) -> Vec<AssetHint> {
    LAUNCHBOX_PATH_FIELDS
        .iter()
        .filter_map(|(field, asset_type)| {
            entry.field(field).map(|reference| AssetHint {
                asset_type: *asset_type,
                reference: reference.to_string(),
            })
        })
        .collect()
}

/// LaunchBox database id as a stable key
pub(crate) fn launchbox_key(entry: &RawEntry) -> Option<StableKey> {
    let id = entry.first(&["DatabaseID", "DatabaseId"])?.trim();
    if id == "0" {
        return None;
    }
    Some(StableKey::Scraper {
        source: "launchbox".to_string(),
        id: id.to_string(),
    })
}

/// Reads the per-platform XML files of a LaunchBox installation
#[derive(Debug, Default, Clone, Copy)]
pub struct LaunchBoxXmlLoader;

impl Loader for LaunchBoxXmlLoader {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::XmlCentral
    }

    fn discover(
        &self,
        descriptor: &EcosystemDescriptor,
        content_root: &Path,
    ) -> Result<Vec<SystemSource>, LibraryError> {
        let mut sources = Vec::new();
        for template in descriptor.container_paths {
            for (label, path) in template_matches(content_root, template) {
                if label.is_empty() || sources.iter().any(|s: &SystemSource| s.platform_label == label) {
                    continue;
                }
                let rom_root = default_rom_root(descriptor, content_root, &label);
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

        let xml = std::fs::read_to_string(path)?;
        let records =
            parse_records(&xml, "LaunchBox", "Game").map_err(|message| LibraryError::LoaderParse {
                system: source.platform_label.clone(),
                path: path.clone(),
                message,
            })?;

        for record in records {
            let mut entry = RawEntry::new(String::new());
            entry.fields = record.fields;
            let Some(reference) = entry.field("ApplicationPath").map(str::to_string) else {
                let title = entry.field("Title").unwrap_or("<untitled>");
                loaded
                    .warnings
                    .push(format!("{title}: game without ApplicationPath skipped"));
                continue;
            };
            entry.rom_ref = reference;
            entry.hints = launchbox_hints(&entry);
            loaded.entries.push(entry);
        }
        Ok(loaded)
    }

    fn field_map(&self) -> &'static FieldMap {
        &LAUNCHBOX_FIELDS
    }

    fn stable_key(&self, entry: &RawEntry) -> Option<StableKey> {
        launchbox_key(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrosync_config::EcosystemRegistry;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_discover_and_load_platform_xml() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Data/Platforms")).unwrap();
        fs::write(
            root.join("Data/Platforms/Super Nintendo Entertainment System.xml"),
            r#"<?xml version="1.0" standalone="yes"?>
<LaunchBox>
  <Game>
    <ApplicationPath>Games\Super Nintendo Entertainment System\Super Mario World.zip</ApplicationPath>
    <Title>Super Mario World</Title>
    <StarRating>4</StarRating>
    <Genre>Platform; Action</Genre>
    <DatabaseID>5412</DatabaseID>
    <ManualPath>Manuals\Super Nintendo Entertainment System\Super Mario World-01.pdf</ManualPath>
    <VideoPath />
  </Game>
  <Game>
    <Title>Broken</Title>
  </Game>
</LaunchBox>"#,
        )
        .unwrap();

        let descriptor = EcosystemRegistry::builtin().get("launchbox").unwrap();
        let loader = LaunchBoxXmlLoader;
        let sources = loader.discover(descriptor, root).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(
            sources[0].rom_root,
            root.join("Games/Super Nintendo Entertainment System")
        );

        let loaded = loader.load(&sources[0], descriptor).unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.warnings.len(), 1);

        let entry = &loaded.entries[0];
        assert_eq!(
            loader.rom_path(entry, &sources[0], descriptor),
            PathBuf::from("Super Mario World.zip")
        );
        assert_eq!(entry.hints.len(), 1);
        assert_eq!(entry.hints[0].asset_type, AssetType::Manual);

        let metadata = loader.field_map().metadata(entry);
        assert_eq!(metadata.rating, Some(0.8));
        assert_eq!(metadata.genres, vec!["Platform", "Action"]);
        assert_eq!(
            loader.stable_key(entry),
            Some(StableKey::Scraper {
                source: "launchbox".to_string(),
                id: "5412".to_string()
            })
        );
    }
}
