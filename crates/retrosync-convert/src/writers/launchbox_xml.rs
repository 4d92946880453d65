//! LaunchBox `Data/Platforms/<platform>.xml` writer

use super::xml::XmlDocument;
use super::{TargetSystem, WrittenGame, Writer, replace_file};
use crate::ConvertError;
use retrosync_config::MetadataContainer;
use retrosync_library::model::StableKey;
use std::path::PathBuf;

pub(crate) const LAUNCHBOX_DATE_FORMAT: &str = "%Y-%m-%dT00:00:00";
pub(crate) const LAUNCHBOX_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One LaunchBox game record as `(field, value)` pairs, blank values omitted.
/// Shared by the XML and SQLite writers.
pub(crate) fn launchbox_fields(target: &TargetSystem, written: &WrittenGame) -> Vec<(&'static str, String)> {
    let game = &written.game;
    let m = &game.metadata;
    let mut fields: Vec<(&'static str, String)> = vec![
        ("Title", game.title.clone()),
        ("ApplicationPath", target.content_relative(&written.rom)),
        ("Platform", target.label.clone()),
    ];
    let mut push = |name: &'static str, value: Option<String>| {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            fields.push((name, value));
        }
    };

    push("SortTitle", m.sort_title.clone());
    push("Developer", m.developer.clone());
    push("Publisher", m.publisher.clone());
    push("Genre", Some(m.genres.join("; ")));
    push(
        "ReleaseDate",
        m.release_date
            .map(|d| d.format(LAUNCHBOX_DATE_FORMAT).to_string()),
    );
    push("StarRatingFloat", m.rating.map(|r| format!("{:.2}", r * 5.0)));
    push("StarRating", m.rating.map(|r| format!("{}", (r * 5.0).round() as u32)));
    push("PlayCount", (m.play_count > 0).then(|| m.play_count.to_string()));
    push(
        "LastPlayedDate",
        m.last_played
            .map(|t| t.format(LAUNCHBOX_TIMESTAMP_FORMAT).to_string()),
    );
    push("Favorite", Some(m.favorite.to_string()));
    push("Hide", Some(m.hidden.to_string()));
    push("Notes", m.description.clone());
    push("MaxPlayers", m.players.clone());
    if let StableKey::Scraper { source, id } = &game.stable_key
        && source == "launchbox"
    {
        push("DatabaseID", Some(id.clone()));
    }

    for slot in target.descriptor.asset_slots {
        if let Some(tag) = slot.tag
            && let Some(path) = written.asset(slot.asset_type)
        {
            push(tag, Some(target.content_relative(path)));
        }
    }
    fields
}

/// Writes one platform XML per system
#[derive(Debug, Default, Clone, Copy)]
pub struct LaunchBoxXmlWriter;

impl LaunchBoxXmlWriter {
    pub fn render(&self, target: &TargetSystem, games: &[WrittenGame]) -> Result<Vec<u8>, ConvertError> {
        let mut doc = XmlDocument::new("LaunchBox")?;
        for written in games {
            doc.start("Game", &[])?;
            for (name, value) in launchbox_fields(target, written) {
                doc.text(name, &value)?;
            }
            doc.end()?;
        }
        doc.finish()
    }
}

impl Writer for LaunchBoxXmlWriter {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::XmlCentral
    }

    fn write(&self, target: &TargetSystem, games: &[WrittenGame]) -> Result<Vec<PathBuf>, ConvertError> {
        let Some(path) = &target.container_path else {
            return Ok(Vec::new());
        };
        replace_file(path, &self.render(target, games)?)?;
        Ok(vec![path.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrosync_config::{AssetType, EcosystemRegistry};
    use retrosync_library::Game;
    use std::collections::BTreeMap;
    use std::path::Path;

    #[test]
    fn test_render_platform_xml() {
        let descriptor = EcosystemRegistry::builtin().get("launchbox").unwrap();
        let target = TargetSystem::new(
            descriptor,
            Path::new("/lb"),
            "nes",
            "Nintendo Entertainment System",
            "NES",
        );
        let mut game = Game::new("nes", PathBuf::from("Contra.nes"), "Contra");
        game.metadata.rating = Some(0.9);
        game.metadata.genres = vec!["Action".to_string(), "Shooter".to_string()];
        game.stable_key = StableKey::Scraper {
            source: "launchbox".to_string(),
            id: "140".to_string(),
        };
        let manual = descriptor.slot(AssetType::Manual).unwrap();
        let mut assets = BTreeMap::new();
        assets.insert(AssetType::Manual, target.asset_destination(manual, &game, "pdf"));
        let written = WrittenGame {
            rom: target.rom_destination(&game),
            game,
            assets,
        };

        let xml = String::from_utf8(LaunchBoxXmlWriter.render(&target, &[written]).unwrap()).unwrap();
        assert!(xml.contains(
            "<ApplicationPath>Games\\Nintendo Entertainment System\\Contra.nes</ApplicationPath>"
        ));
        assert!(xml.contains("<StarRatingFloat>4.50</StarRatingFloat>"));
        assert!(xml.contains("<Genre>Action; Shooter</Genre>"));
        assert!(xml.contains("<DatabaseID>140</DatabaseID>"));
        assert!(xml.contains(
            "<ManualPath>Manuals\\Nintendo Entertainment System\\Contra-01.pdf</ManualPath>"
        ));
    }
}
