//! Attract-Mode romlist loader
//!
//! A romlist is a `;`-separated table under `romlists/`, described by its `#` header.
//! The emulator config of the same name supplies the ROM folder, extensions and
//! artwork folders.

use super::{FieldMap, LoadedEntries, Loader, RawEntry, SystemSource, default_rom_root};
use crate::LibraryError;
use retrosync_config::{EcosystemDescriptor, MetadataContainer, template_matches};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Column layout written by Attract-Mode
pub const ROMLIST_COLUMNS: &[&str] = &[
    "Name",
    "Title",
    "Emulator",
    "CloneOf",
    "Year",
    "Manufacturer",
    "Category",
    "Players",
    "Rotation",
    "Control",
    "Status",
    "DisplayCount",
    "DisplayType",
    "AltRomname",
    "AltTitle",
    "Extra",
    "Buttons",
];

static ROMLIST_FIELDS: FieldMap = FieldMap {
    title: &["Title"],
    release_date: &["Year"],
    genres: &["Category"],
    developer: &["Manufacturer"],
    players: &["Players"],
    genre_separators: &['/', ','],
    ..FieldMap::EMPTY
};

/// Settings read from `emulators/<name>.cfg`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmulatorConfig {
    pub rompath: Option<String>,
    /// With leading dot
    pub romext: Vec<String>,
    /// Artwork label to folder, e.g. `snap` to `scraper/snes/snap`
    pub artwork: BTreeMap<String, String>,
}

impl EmulatorConfig {
    /// Parse `key value` lines; `#` starts a comment
    pub fn parse(text: &str) -> Self {
        let mut config = EmulatorConfig::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default().trim();
            match key {
                "rompath" if !value.is_empty() => config.rompath = Some(value.to_string()),
                "romext" => {
                    config.romext = value
                        .split(';')
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(|e| {
                            if e.starts_with('.') {
                                e.to_string()
                            } else {
                                format!(".{e}")
                            }
                        })
                        .collect();
                }
                "artwork" => {
                    let mut parts = value.splitn(2, char::is_whitespace);
                    let label = parts.next().unwrap_or_default();
                    let folder = parts.next().unwrap_or_default().trim();
                    // several folders may be listed; the first is the primary one
                    let folder = folder.split(';').next().unwrap_or_default().trim();
                    if !label.is_empty() && !folder.is_empty() {
                        config.artwork.insert(label.to_string(), folder.to_string());
                    }
                }
                _ => {}
            }
        }
        config
    }
}

/// Split romlist text into rows keyed by column name. Rows with fewer fields than
/// the header are dropped with a warning.
pub fn parse_romlist(text: &str) -> (Vec<BTreeMap<String, String>>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            if header.is_none() && rest.contains(';') {
                header = Some(rest.split(';').map(|c| c.trim().to_string()).collect());
            }
            continue;
        }

        let columns = header.get_or_insert_with(|| {
            warnings.push("romlist has no header, assuming Attract-Mode layout".to_string());
            ROMLIST_COLUMNS.iter().map(|c| c.to_string()).collect()
        });
        let values: Vec<&str> = line.split(';').collect();
        if values.len() < columns.len() {
            warnings.push(format!(
                "line {}: {} fields, expected {}; row dropped",
                number + 1,
                values.len(),
                columns.len()
            ));
            continue;
        }
        rows.push(
            columns
                .iter()
                .zip(values)
                .map(|(column, value)| (column.clone(), value.to_string()))
                .collect(),
        );
    }
    (rows, warnings)
}

/// Reads Attract-Mode romlists
#[derive(Debug, Default, Clone, Copy)]
pub struct RomlistLoader;

impl RomlistLoader {
    fn emulator_config(content_root: &Path, label: &str) -> EmulatorConfig {
        let path = content_root.join("emulators").join(format!("{label}.cfg"));
        std::fs::read_to_string(path)
            .map(|text| EmulatorConfig::parse(&text))
            .unwrap_or_default()
    }
}

impl Loader for RomlistLoader {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::Plaintext
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
                let config = Self::emulator_config(content_root, &label);
                let rom_root = match &config.rompath {
                    Some(rompath) => content_root.join(crate::paths::normalize_separators(rompath)),
                    None => default_rom_root(descriptor, content_root, &label),
                };

                let mut source = SystemSource::new(label, content_root, rom_root, Some(path));
                source.rom_extensions = config.romext;
                for (artwork, folder) in config.artwork {
                    if let Some(slot) = descriptor
                        .asset_slots
                        .iter()
                        .find(|slot| slot.tag == Some(artwork.as_str()))
                    {
                        source
                            .asset_folders
                            .insert(slot.asset_type, content_root.join(folder));
                    }
                }
                sources.push(source);
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
        let (rows, warnings) = parse_romlist(&text);
        loaded.warnings = warnings;

        for fields in rows {
            let name = fields.get("Name").map(|n| n.trim().to_string()).unwrap_or_default();
            if name.is_empty() {
                loaded.warnings.push("row without Name dropped".to_string());
                continue;
            }
            let mut entry = RawEntry::new(name);
            entry.fields = fields;
            loaded.entries.push(entry);
        }
        Ok(loaded)
    }

    fn field_map(&self) -> &'static FieldMap {
        &ROMLIST_FIELDS
    }

    /// Romlists name games by file stem; the extension comes from the emulator
    /// config or from the file found on disk
    fn rom_path(
        &self,
        entry: &RawEntry,
        source: &SystemSource,
        _descriptor: &EcosystemDescriptor,
    ) -> PathBuf {
        let name = entry.rom_ref.as_str();
        for ext in &source.rom_extensions {
            let candidate = PathBuf::from(format!("{name}{ext}"));
            if source.rom_root.join(&candidate).is_file() {
                return candidate;
            }
        }
        if let Ok(entries) = std::fs::read_dir(&source.rom_root) {
            let mut found: Vec<PathBuf> = entries
                .flatten()
                .map(|e| PathBuf::from(e.file_name()))
                .filter(|p| {
                    p.file_stem().is_some_and(|s| s.to_string_lossy() == name)
                        && source.rom_root.join(p).is_file()
                })
                .collect();
            found.sort();
            if let Some(first) = found.into_iter().next() {
                return first;
            }
        }
        match source.rom_extensions.first() {
            Some(ext) => PathBuf::from(format!("{name}{ext}")),
            None => PathBuf::from(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrosync_config::{AssetType, EcosystemRegistry};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_romlist_drops_short_rows() {
        let text = "#Name;Title;Emulator;CloneOf;Year;Manufacturer;Category;Players;Rotation;Control;Status;DisplayCount;DisplayType;AltRomname;AltTitle;Extra;Buttons\n\
contra;Contra;nes;;1988;Konami;Shooter / Run and Gun;2;0;joystick;good;1;raster;;;;2\n\
broken;Broken;nes\n";
        let (rows, warnings) = parse_romlist(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Manufacturer"], "Konami");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("line 3"));
    }

    #[test]
    fn test_emulator_config() {
        let config = EmulatorConfig::parse(
            "# generated\nexecutable  retroarch\nrompath     roms/nes\nromext      .nes;zip\nartwork     snap    scraper/nes/snap;scraper/nes/video\n",
        );
        assert_eq!(config.rompath.as_deref(), Some("roms/nes"));
        assert_eq!(config.romext, vec![".nes", ".zip"]);
        assert_eq!(config.artwork["snap"], "scraper/nes/snap");
    }

    #[test]
    fn test_load_romlist_with_emulator_config() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("romlists")).unwrap();
        fs::create_dir_all(root.join("emulators")).unwrap();
        fs::create_dir_all(root.join("games/nes")).unwrap();
        fs::write(root.join("games/nes/contra.zip"), b"rom").unwrap();
        fs::write(
            root.join("emulators/nes.cfg"),
            "rompath games/nes\nromext .nes;.zip\nartwork flyer art/flyer\n",
        )
        .unwrap();
        fs::write(
            root.join("romlists/nes.txt"),
            "#Name;Title;Emulator;CloneOf;Year;Manufacturer;Category;Players;Rotation;Control;Status;DisplayCount;DisplayType;AltRomname;AltTitle;Extra;Buttons\n\
contra;Contra;nes;;1988;Konami;Shooter;2;0;;;;;;;;\n",
        )
        .unwrap();

        let descriptor = EcosystemRegistry::builtin().get("attract_mode").unwrap();
        let loader = RomlistLoader;
        let sources = loader.discover(descriptor, root).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].rom_root, root.join("games/nes"));
        assert_eq!(
            sources[0].asset_folders.get(&AssetType::BoxFront),
            Some(&root.join("art/flyer"))
        );

        let loaded = loader.load(&sources[0], descriptor).unwrap();
        assert_eq!(loaded.entries.len(), 1);
        let contra = &loaded.entries[0];
        assert_eq!(
            loader.rom_path(contra, &sources[0], descriptor),
            PathBuf::from("contra.zip")
        );
        let metadata = loader.field_map().metadata(contra);
        assert_eq!(metadata.developer.as_deref(), Some("Konami"));
        assert_eq!(
            metadata.release_date,
            chrono::NaiveDate::from_ymd_opt(1988, 1, 1)
        );
    }
}
