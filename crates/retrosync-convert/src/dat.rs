//! Logiqx-style DAT export with CRC32, SHA-1 and SHA-256 ROM hashes

use crate::ConvertError;
use crate::writers::replace_file;
use crate::writers::xml::XmlDocument;
use retrosync_library::hash_file;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One ROM to list in a DAT
#[derive(Debug, Clone, PartialEq)]
pub struct DatEntry {
    /// Machine name: the ROM file stem
    pub name: String,
    /// Game title
    pub description: String,
    pub rom: PathBuf,
}

impl DatEntry {
    pub fn new(rom: PathBuf, description: impl Into<String>) -> Self {
        let name = rom
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            name,
            description: description.into(),
            rom,
        }
    }
}

/// Machine name not used yet in this DAT
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut n = 2;
    while !used.insert(candidate.to_lowercase()) {
        candidate = format!("{name} ({n})");
        n += 1;
    }
    candidate
}

/// Render a DAT for the entries whose ROM exists; missing files are skipped
pub fn render_dat(name: &str, description: &str, entries: &[DatEntry]) -> Result<Vec<u8>, ConvertError> {
    let mut doc = XmlDocument::new("datafile")?;
    doc.start("header", &[])?;
    doc.text("name", name)?;
    doc.text("description", description)?;
    doc.text("version", env!("CARGO_PKG_VERSION"))?;
    doc.text("author", "retrosync")?;
    doc.end()?;

    let mut used = HashSet::new();
    for entry in entries {
        if !entry.rom.is_file() {
            tracing::debug!("DAT: {} not on disk, skipped", entry.rom.display());
            continue;
        }
        let hashes = hash_file(&entry.rom)?;
        let file_name = entry
            .rom
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = hashes.size.to_string();
        let machine = unique_name(&entry.name, &mut used);

        doc.start("machine", &[("name", machine.as_str())])?;
        doc.text("description", &entry.description)?;
        doc.empty(
            "rom",
            &[
                ("name", file_name.as_str()),
                ("size", size.as_str()),
                ("crc", hashes.crc32.as_str()),
                ("sha1", hashes.sha1.as_str()),
                ("sha256", hashes.sha256.as_str()),
            ],
        )?;
        doc.end()?;
    }
    doc.finish()
}

/// Write a DAT atomically to `dest`
pub fn write_dat(dest: &Path, name: &str, description: &str, entries: &[DatEntry]) -> Result<(), ConvertError> {
    let bytes = render_dat(name, description, entries)?;
    replace_file(dest, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_dat_skips_missing_roms() {
        let dir = TempDir::new().unwrap();
        let rom = dir.path().join("Contra.nes");
        std::fs::write(&rom, b"hello world").unwrap();
        let entries = vec![
            DatEntry::new(rom, "Contra"),
            DatEntry::new(dir.path().join("Ghost.nes"), "Ghost"),
        ];

        let dest = dir.path().join("dats/nes.dat");
        write_dat(&dest, "nes", "Nintendo Entertainment System", &entries).unwrap();
        let xml = std::fs::read_to_string(&dest).unwrap();
        assert!(xml.contains("<machine name=\"Contra\">"));
        assert!(xml.contains("name=\"Contra.nes\" size=\"11\""));
        assert!(xml.contains("crc=\"0d4a1185\""));
        assert!(xml.contains("sha1=\"2aae6c35c94fcfb415dbe95f408b9ce91ee846ed\""));
        assert!(xml.contains("sha256=\"b94d27b9"));
        assert!(!xml.contains("Ghost"));
    }

    #[test]
    fn test_machine_names_come_from_rom_stems() {
        let dir = TempDir::new().unwrap();
        let usa = dir.path().join("usa/Contra.zip");
        let jpn = dir.path().join("jpn/Contra.zip");
        let other = dir.path().join("Gryzor.zip");
        for rom in [&usa, &jpn, &other] {
            std::fs::create_dir_all(rom.parent().unwrap()).unwrap();
            std::fs::write(rom, b"rom").unwrap();
        }
        let entries = vec![
            DatEntry::new(usa, "Contra"),
            DatEntry::new(jpn, "Contra"),
            DatEntry::new(other, "Contra"),
        ];

        let xml = String::from_utf8(render_dat("nes", "NES", &entries).unwrap()).unwrap();
        assert!(xml.contains("<machine name=\"Contra\">"));
        assert!(xml.contains("<machine name=\"Contra (2)\">"));
        assert!(xml.contains("<machine name=\"Gryzor\">"));
        assert_eq!(xml.matches("<description>Contra</description>").count(), 3);
    }
}
