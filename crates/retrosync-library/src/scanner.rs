//! ROM file scanning
//!
//! Used by the filename-only loader and to reconcile gamelists with the ROMs actually
//! present on disk.

use crate::LibraryError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// ROM scanner configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to scan
    pub extensions: HashSet<String>,

    /// Directories to skip (lowercase)
    pub skip_dirs: HashSet<String>,

    /// Scan subdirectories
    pub recursive: bool,

    /// Skip hidden files/directories
    pub skip_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let extensions = [
            "nes", "fds", "unf", "smc", "sfc", "fig", "n64", "z64", "v64", "gb", "gbc", "gba",
            "nds", "vb", "sms", "gg", "md", "gen", "smd", "bin", "32x", "pce", "sgx", "iso",
            "cso", "chd", "pbp", "cue", "m3u", "gdi", "cdi", "rvz", "gcz", "wbfs", "a26", "a78",
            "lnx", "ngp", "ngc", "ws", "wsc", "col", "rom", "mx1", "mx2", "d64", "t64", "adf",
            "hdf", "lha", "dosz", "exe", "zip", "7z", "rar",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let skip_dirs = [
            "bios", "saves", "states", "screenshots", "images", "imgs", "videos", "manuals",
            "media", "downloaded_media", "snap", "wheel", "marquee", "flyer", "boxart",
            ".retrosync",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            extensions,
            skip_dirs,
            recursive: true,
            skip_hidden: true,
        }
    }
}

/// ROM scanner
#[derive(Debug, Clone, Default)]
pub struct RomScanner {
    config: ScanConfig,
}

impl RomScanner {
    /// Create a new scanner with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    pub fn is_rom(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.config.extensions.contains(&ext.to_lowercase()))
    }

    /// Scan a system directory for ROMs. Paths are returned relative to `rom_root`,
    /// sorted. A missing directory yields nothing.
    pub fn scan(&self, rom_root: &Path) -> Result<Vec<PathBuf>, LibraryError> {
        if !rom_root.is_dir() {
            return Ok(Vec::new());
        }

        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(rom_root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                if self.config.skip_hidden && name.starts_with('.') {
                    return false;
                }
                !(entry.file_type().is_dir()
                    && self.config.skip_dirs.contains(&name.to_lowercase()))
            });

        let mut roms = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| LibraryError::ScanError(e.to_string()))?;
            if entry.file_type().is_file()
                && self.is_rom(entry.path())
                && let Ok(relative) = entry.path().strip_prefix(rom_root)
            {
                roms.push(relative.to_path_buf());
            }
        }
        Ok(roms)
    }

    /// Clean up a game name (remove region codes, dump flags, etc.)
    pub fn clean_game_name(name: &str) -> String {
        let mut clean = String::with_capacity(name.len());
        let mut depth = 0usize;
        for ch in name.chars() {
            match ch {
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                _ if depth == 0 => clean.push(if ch == '_' { ' ' } else { ch }),
                _ => {}
            }
        }

        // Clean up whitespace
        let clean = clean.split_whitespace().collect::<Vec<_>>().join(" ");
        if clean.is_empty() {
            name.trim().to_string()
        } else {
            clean
        }
    }

    /// Title derived from a ROM path
    pub fn title_from_path(path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::clean_game_name(&stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_clean_game_name() {
        assert_eq!(
            RomScanner::clean_game_name("Super Mario World (USA)"),
            "Super Mario World"
        );
        assert_eq!(RomScanner::clean_game_name("Zelda (Europe) [!]"), "Zelda");
        assert_eq!(
            RomScanner::clean_game_name("Pokemon Red (U) (Rev 1)"),
            "Pokemon Red"
        );
        assert_eq!(RomScanner::clean_game_name("street_fighter_2"), "street fighter 2");
        assert_eq!(RomScanner::clean_game_name("(Proto)"), "(Proto)");
    }

    #[test]
    fn test_scan_config_default() {
        let config = ScanConfig::default();
        assert!(config.extensions.contains("gba"));
        assert!(config.extensions.contains("zip"));
        assert!(config.skip_dirs.contains("bios"));
        assert!(config.skip_dirs.contains("images"));
    }

    #[test]
    fn test_scan_skips_media_and_hidden() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("images")).unwrap();
        fs::create_dir_all(root.join("Disc Games")).unwrap();
        fs::write(root.join("b.zip"), b"rom").unwrap();
        fs::write(root.join("a.sfc"), b"rom").unwrap();
        fs::write(root.join(".hidden.zip"), b"rom").unwrap();
        fs::write(root.join("gamelist.xml"), b"<gameList/>").unwrap();
        fs::write(root.join("images/a.zip"), b"not a rom").unwrap();
        fs::write(root.join("Disc Games/c.chd"), b"rom").unwrap();

        let roms = RomScanner::new().scan(root).unwrap();
        assert_eq!(
            roms,
            vec![
                PathBuf::from("Disc Games/c.chd"),
                PathBuf::from("a.sfc"),
                PathBuf::from("b.zip"),
            ]
        );
    }

    #[test]
    fn test_scan_missing_directory() {
        let roms = RomScanner::new()
            .scan(Path::new("/nonexistent/roms/snes"))
            .unwrap();
        assert!(roms.is_empty());
    }
}
