//! Attract-Mode romlist and emulator config writer

use super::{TargetSystem, WrittenGame, Writer, replace_file};
use crate::ConvertError;
use retrosync_config::{MetadataContainer, expand_template};
use retrosync_library::loaders::ROMLIST_COLUMNS;
use retrosync_library::paths::{relative_to, to_slash};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Field separator of the romlist format; it cannot appear inside values
fn clean(value: &str) -> String {
    value.replace(';', ",").replace(['\r', '\n'], " ").trim().to_string()
}

/// Writes `romlists/<label>.txt` and, when missing, `emulators/<label>.cfg`
#[derive(Debug, Default, Clone, Copy)]
pub struct RomlistWriter;

impl RomlistWriter {
    pub fn render(&self, target: &TargetSystem, games: &[WrittenGame]) -> String {
        let mut out = format!("#{}\n", ROMLIST_COLUMNS.join(";"));
        for written in games {
            let game = &written.game;
            let m = &game.metadata;
            let row: Vec<String> = ROMLIST_COLUMNS
                .iter()
                .map(|column| match *column {
                    "Name" => clean(&game.rom_stem()),
                    "Title" => clean(&game.title),
                    "Emulator" => clean(&target.label),
                    "Year" => m
                        .release_date
                        .map(|d| d.format("%Y").to_string())
                        .unwrap_or_default(),
                    "Manufacturer" => clean(m.developer.as_deref().unwrap_or_default()),
                    "Category" => clean(&m.genres.join(" / ")),
                    "Players" => clean(m.players.as_deref().unwrap_or_default()),
                    _ => String::new(),
                })
                .collect();
            out.push_str(&row.join(";"));
            out.push('\n');
        }
        out
    }

    /// Emulator config pointing Attract-Mode at the ROM and artwork folders
    pub fn emulator_config(&self, target: &TargetSystem, games: &[WrittenGame]) -> String {
        let extensions: BTreeSet<String> = games
            .iter()
            .filter_map(|g| g.game.rom_path.extension())
            .map(|e| format!(".{}", e.to_string_lossy()))
            .collect();
        let mut out = String::from("# Generated by retrosync\n");
        out.push_str("executable\n");
        out.push_str("args                 \"[romfilename]\"\n");
        out.push_str(&format!(
            "rompath              {}\n",
            to_slash(&relative_to(&target.rom_dir, &target.content_root))
        ));
        out.push_str(&format!(
            "romext               {}\n",
            extensions.into_iter().collect::<Vec<_>>().join(";")
        ));
        out.push_str(&format!("system               {}\n", target.display_name));
        for slot in target.descriptor.asset_slots {
            if let Some(tag) = slot.tag {
                out.push_str(&format!(
                    "artwork    {:<10} {}\n",
                    tag,
                    expand_template(slot.folder, &target.label)
                ));
            }
        }
        out
    }
}

impl Writer for RomlistWriter {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::Plaintext
    }

    fn write(&self, target: &TargetSystem, games: &[WrittenGame]) -> Result<Vec<PathBuf>, ConvertError> {
        let Some(path) = &target.container_path else {
            return Ok(Vec::new());
        };
        replace_file(path, self.render(target, games).as_bytes())?;
        let mut written = vec![path.clone()];

        // an existing emulator config carries the user's executable settings
        let config = target
            .content_root
            .join("emulators")
            .join(format!("{}.cfg", target.label));
        if !config.exists() {
            replace_file(&config, self.emulator_config(target, games).as_bytes())?;
            written.push(config);
        }
        Ok(written)
    }
}
