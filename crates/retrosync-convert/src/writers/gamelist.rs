//! EmulationStation-family `gamelist.xml` writer

use super::xml::XmlDocument;
use super::{TargetSystem, WrittenGame, Writer, replace_file};
use crate::ConvertError;
use retrosync_config::{MetadataContainer, MetadataField};
use retrosync_library::model::StableKey;
use std::path::PathBuf;

/// `releasedate` layout used by every fork
const DATE_FORMAT: &str = "%Y%m%dT000000";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Writes one `gamelist.xml` per system
#[derive(Debug, Default, Clone, Copy)]
pub struct GamelistWriter;

impl GamelistWriter {
    pub fn render(&self, target: &TargetSystem, games: &[WrittenGame]) -> Result<Vec<u8>, ConvertError> {
        let supports = |field| target.descriptor.supports(field);
        let mut doc = XmlDocument::new("gameList")?;

        for written in games {
            let game = &written.game;
            let m = &game.metadata;

            match &game.stable_key {
                StableKey::Scraper { source, id } if source == "screenscraper" => {
                    doc.start("game", &[("id", id.as_str()), ("source", "ScreenScraper")])?;
                }
                _ => doc.start("game", &[])?,
            }
            doc.text("path", &target.rom_relative(&written.rom))?;
            doc.text("name", &game.title)?;
            if supports(MetadataField::SortTitle) {
                doc.text_opt("sortname", m.sort_title.as_deref())?;
            }
            if supports(MetadataField::Description) {
                doc.text_opt("desc", m.description.as_deref())?;
            }
            if supports(MetadataField::Rating)
                && let Some(rating) = m.rating
            {
                doc.text("rating", &format!("{rating:.2}"))?;
            }
            if supports(MetadataField::ReleaseDate)
                && let Some(date) = m.release_date
            {
                doc.text("releasedate", &date.format(DATE_FORMAT).to_string())?;
            }
            if supports(MetadataField::Developer) {
                doc.text_opt("developer", m.developer.as_deref())?;
            }
            if supports(MetadataField::Publisher) {
                doc.text_opt("publisher", m.publisher.as_deref())?;
            }
            if supports(MetadataField::Genres) {
                doc.text("genre", &m.genres.join(", "))?;
            }
            if supports(MetadataField::Players) {
                doc.text_opt("players", m.players.as_deref())?;
            }
            if supports(MetadataField::PlayCount) && m.play_count > 0 {
                doc.text("playcount", &m.play_count.to_string())?;
            }
            if supports(MetadataField::LastPlayed)
                && let Some(last) = m.last_played
            {
                doc.text("lastplayed", &last.format(TIMESTAMP_FORMAT).to_string())?;
            }
            if supports(MetadataField::Favorite) && m.favorite {
                doc.text("favorite", "true")?;
            }
            if supports(MetadataField::Hidden) && m.hidden {
                doc.text("hidden", "true")?;
            }

            for slot in target.descriptor.asset_slots {
                if let Some(tag) = slot.tag
                    && let Some(path) = written.asset(slot.asset_type)
                {
                    doc.text(tag, &target.rom_relative(path))?;
                }
            }
            doc.end()?;
        }

        doc.finish()
    }
}

impl Writer for GamelistWriter {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::XmlPerSystem
    }

    fn write(&self, target: &TargetSystem, games: &[WrittenGame]) -> Result<Vec<PathBuf>, ConvertError> {
        let Some(path) = &target.container_path else {
            return Ok(Vec::new());
        };
        let bytes = self.render(target, games)?;
        replace_file(path, &bytes)?;
        Ok(vec![path.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use retrosync_config::{AssetType, EcosystemRegistry};
    use retrosync_library::Game;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn written(target: &TargetSystem) -> WrittenGame {
        let mut game = Game::new("snes", PathBuf::from("Super Mario World.zip"), "Super Mario World");
        game.metadata.release_date = NaiveDate::from_ymd_opt(1990, 11, 21);
        game.metadata.genres = vec!["Platform".to_string(), "Action".to_string()];
        game.metadata.rating = Some(0.9);
        game.metadata.favorite = true;

        let mut assets = BTreeMap::new();
        if let Some(slot) = target.descriptor.slot(AssetType::BoxFront) {
            assets.insert(
                AssetType::BoxFront,
                target.asset_destination(slot, &game, "png"),
            );
        }
        WrittenGame {
            rom: target.rom_destination(&game),
            game,
            assets,
        }
    }

    #[test]
    fn test_render_es_classic() {
        let descriptor = EcosystemRegistry::builtin().get("es_classic").unwrap();
        let target = TargetSystem::new(descriptor, Path::new("/out"), "snes", "snes", "SNES");
        let xml = String::from_utf8(GamelistWriter.render(&target, &[written(&target)]).unwrap()).unwrap();

        assert!(xml.contains("<path>./Super Mario World.zip</path>"));
        assert!(xml.contains("<releasedate>19901121T000000</releasedate>"));
        assert!(xml.contains("<genre>Platform, Action</genre>"));
        assert!(xml.contains("<rating>0.90</rating>"));
        assert!(xml.contains("<favorite>true</favorite>"));
        assert!(xml.contains("<image>./images/Super Mario World.png</image>"));
        assert!(!xml.contains("<hidden>"));
    }

    #[test]
    fn test_render_es_de_has_no_media_tags() {
        let descriptor = EcosystemRegistry::builtin().get("es_de").unwrap();
        let target = TargetSystem::new(descriptor, Path::new("/out"), "snes", "snes", "SNES");
        let xml = String::from_utf8(GamelistWriter.render(&target, &[written(&target)]).unwrap()).unwrap();

        assert!(xml.contains("<name>Super Mario World</name>"));
        assert!(!xml.contains("<image>"));
    }
}
