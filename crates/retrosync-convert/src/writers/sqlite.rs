//! LaunchBox SQLite library writer
//!
//! The database holds every platform, so writing one system rebuilds the whole file:
//! rows of the other platforms are read back from the existing database and written
//! again next to the new rows of this system.

use super::launchbox_xml::launchbox_fields;
use super::{TargetSystem, WrittenGame, Writer, replace_with};
use crate::ConvertError;
use retrosync_config::MetadataContainer;
use retrosync_library::{Loader, loaders::LaunchBoxSqliteLoader};
use rusqlite::{Connection, params_from_iter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Columns of the `Games` table, in order
const COLUMNS: &[(&str, &str)] = &[
    ("Title", "TEXT NOT NULL"),
    ("SortTitle", "TEXT"),
    ("ApplicationPath", "TEXT NOT NULL"),
    ("Platform", "TEXT NOT NULL"),
    ("Developer", "TEXT"),
    ("Publisher", "TEXT"),
    ("Genre", "TEXT"),
    ("ReleaseDate", "TEXT"),
    ("StarRating", "REAL"),
    ("PlayCount", "INTEGER"),
    ("LastPlayedDate", "TEXT"),
    ("Favorite", "INTEGER"),
    ("Hide", "INTEGER"),
    ("Notes", "TEXT"),
    ("MaxPlayers", "TEXT"),
    ("DatabaseID", "TEXT"),
    ("ManualPath", "TEXT"),
    ("VideoPath", "TEXT"),
];

type Row = BTreeMap<String, String>;

/// Writes all platforms to `Data/LaunchBox.sqlite`
#[derive(Debug, Default, Clone, Copy)]
pub struct LaunchBoxSqliteWriter;

impl LaunchBoxSqliteWriter {
    /// Rows of every platform except `skip`, keyed by platform label
    fn existing_rows(target: &TargetSystem, skip: &str) -> Result<BTreeMap<String, Vec<Row>>, ConvertError> {
        let mut rows: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        let loader = LaunchBoxSqliteLoader;
        for source in loader.discover(target.descriptor, &target.content_root)? {
            if source.platform_label == skip {
                continue;
            }
            let loaded = loader.load(&source, target.descriptor)?;
            let platform_rows = rows.entry(source.platform_label.clone()).or_default();
            for entry in loaded.entries {
                let mut row = entry.fields;
                row.insert("ApplicationPath".to_string(), entry.rom_ref);
                row.insert("Platform".to_string(), source.platform_label.clone());
                platform_rows.push(row);
            }
        }
        Ok(rows)
    }

    fn row(target: &TargetSystem, written: &WrittenGame) -> Row {
        launchbox_fields(target, written)
            .into_iter()
            .filter_map(|(name, value)| match name {
                "StarRatingFloat" => Some(("StarRating".to_string(), value)),
                "StarRating" => None,
                "Favorite" | "Hide" => Some((name.to_string(), bool_column(&value).to_string())),
                _ => Some((name.to_string(), value)),
            })
            .collect()
    }

    fn build(path: &Path, rows: &BTreeMap<String, Vec<Row>>) -> Result<(), ConvertError> {
        let mut conn = Connection::open(path)?;
        let columns: Vec<String> = COLUMNS
            .iter()
            .map(|(name, kind)| format!("{name} {kind}"))
            .collect();
        conn.execute_batch(&format!(
            "CREATE TABLE Games (Id INTEGER PRIMARY KEY AUTOINCREMENT, {});
             CREATE INDEX idx_games_platform ON Games (Platform);",
            columns.join(", ")
        ))?;

        let names: Vec<&str> = COLUMNS.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO Games ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        );

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for platform_rows in rows.values() {
                for row in platform_rows {
                    let values = names.iter().map(|name| row.get(*name).map(String::as_str));
                    stmt.execute(params_from_iter(values))?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn bool_column(value: &str) -> i64 {
    i64::from(matches!(value, "true" | "1"))
}

impl Writer for LaunchBoxSqliteWriter {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::Sqlite
    }

    fn write(&self, target: &TargetSystem, games: &[WrittenGame]) -> Result<Vec<PathBuf>, ConvertError> {
        let Some(path) = &target.container_path else {
            return Ok(Vec::new());
        };

        let mut rows = if path.is_file() {
            Self::existing_rows(target, &target.label)?
        } else {
            BTreeMap::new()
        };
        rows.insert(
            target.label.clone(),
            games.iter().map(|g| Self::row(target, g)).collect(),
        );
        let total: usize = rows.values().map(Vec::len).sum();

        replace_with(path, |temp| Self::build(temp, &rows))?;
        tracing::debug!(
            "{}: {} games across {} platforms",
            path.display(),
            total,
            rows.len()
        );
        Ok(vec![path.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrosync_config::EcosystemRegistry;
    use retrosync_library::Game;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn written(target: &TargetSystem, rom: &str, title: &str) -> WrittenGame {
        let mut game = Game::new(&target.system_id, PathBuf::from(rom), title);
        game.metadata.favorite = true;
        game.metadata.rating = Some(0.8);
        WrittenGame {
            rom: target.rom_destination(&game),
            game,
            assets: BTreeMap::new(),
        }
    }

    #[test]
    fn test_rewrite_keeps_other_platforms() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let descriptor = EcosystemRegistry::builtin().get("launchbox_sqlite").unwrap();

        let nes = TargetSystem::new(descriptor, root, "nes", "Nintendo Entertainment System", "NES");
        LaunchBoxSqliteWriter
            .write(&nes, &[written(&nes, "Contra.nes", "Contra")])
            .unwrap();
        let gb = TargetSystem::new(descriptor, root, "gb", "Nintendo Game Boy", "Game Boy");
        LaunchBoxSqliteWriter
            .write(&gb, &[written(&gb, "Tetris.gb", "Tetris")])
            .unwrap();
        // rewriting a platform replaces only its own rows
        LaunchBoxSqliteWriter
            .write(&nes, &[written(&nes, "Gradius.nes", "Gradius")])
            .unwrap();

        let conn = Connection::open(root.join("Data/LaunchBox.sqlite")).unwrap();
        let mut stmt = conn
            .prepare("SELECT Platform, Title, Favorite, StarRating FROM Games ORDER BY Id")
            .unwrap();
        let rows: Vec<(String, String, i64, f64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "Nintendo Entertainment System");
        assert_eq!(rows[0].1, "Gradius");
        assert_eq!(rows[0].2, 1);
        assert!((rows[0].3 - 4.0).abs() < 1e-6);
        assert_eq!(rows[1].0, "Nintendo Game Boy");
        assert_eq!(rows[1].1, "Tetris");
    }
}
