//! Loader for ecosystems without a metadata container

use super::{FieldMap, LoadedEntries, Loader, RawEntry, SystemSource, discover_per_platform};
use crate::LibraryError;
use crate::paths::to_slash;
use crate::scanner::RomScanner;
use retrosync_config::{EcosystemDescriptor, MetadataContainer};
use std::path::Path;

/// Every ROM file under a system folder is a game; titles come from file names
#[derive(Debug, Default, Clone, Copy)]
pub struct FilenameLoader;

impl Loader for FilenameLoader {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::FilenameOnly
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
        _descriptor: &EcosystemDescriptor,
    ) -> Result<LoadedEntries, LibraryError> {
        let entries = RomScanner::new()
            .scan(&source.rom_root)?
            .iter()
            .map(|rom| RawEntry::new(to_slash(rom)))
            .collect();
        Ok(LoadedEntries {
            entries,
            warnings: Vec::new(),
        })
    }

    fn field_map(&self) -> &'static FieldMap {
        &FieldMap::EMPTY
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
    fn test_onion_folders() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Roms/GB/Imgs")).unwrap();
        fs::create_dir_all(root.join("Roms/GBA")).unwrap();
        fs::write(root.join("Roms/GB/Tetris (World).gb"), b"rom").unwrap();
        fs::write(root.join("Roms/GB/Imgs/Tetris (World).png"), b"img").unwrap();

        let descriptor = EcosystemRegistry::builtin().get("onionos").unwrap();
        let loader = FilenameLoader;
        let sources = loader.discover(descriptor, root).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].platform_label, "GB");

        let loaded = loader.load(&sources[0], descriptor).unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(
            loader.rom_path(&loaded.entries[0], &sources[0], descriptor),
            PathBuf::from("Tetris (World).gb")
        );
        assert_eq!(loader.field_map().title(&loaded.entries[0]), None);
    }
}
