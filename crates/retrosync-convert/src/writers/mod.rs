//! Target container writers
//!
//! A [`Writer`] encodes the final records of one system into its ecosystem's container
//! and replaces the container on disk atomically. Reference conventions come from the
//! target descriptor.

mod gamelist;
mod launchbox_xml;
mod playlist;
mod romlist;
mod sqlite;
pub(crate) mod xml;

pub use gamelist::GamelistWriter;
pub use launchbox_xml::LaunchBoxXmlWriter;
pub use playlist::PlaylistWriter;
pub use romlist::RomlistWriter;
pub use sqlite::LaunchBoxSqliteWriter;

use crate::ConvertError;
use retrosync_config::{AssetSlot, AssetType, EcosystemDescriptor, MetadataContainer, SlotNaming, expand_template};
use retrosync_library::loaders::LaunchBoxSqliteLoader;
use retrosync_library::{Game, Loader};
use retrosync_library::paths::{lexical_normalize, relative_to, sanitize_file_name, to_slash};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where one system lands in the target tree
#[derive(Debug, Clone)]
pub struct TargetSystem {
    pub descriptor: &'static EcosystemDescriptor,
    pub system_id: String,
    /// The target ecosystem's platform label
    pub label: String,
    pub display_name: String,
    pub content_root: PathBuf,
    pub rom_dir: PathBuf,
    pub container_path: Option<PathBuf>,
}

impl TargetSystem {
    pub fn new(
        descriptor: &'static EcosystemDescriptor,
        output_root: &Path,
        system_id: impl Into<String>,
        label: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let label = label.into();
        let rom_dir = descriptor
            .rom_dirs
            .first()
            .map(|template| output_root.join(expand_template(template, &label)))
            .unwrap_or_else(|| output_root.to_path_buf());
        let container_path = descriptor
            .container_paths
            .first()
            .map(|template| output_root.join(expand_template(template, &label)));

        Self {
            descriptor,
            system_id: system_id.into(),
            label,
            display_name: display_name.into(),
            content_root: output_root.to_path_buf(),
            rom_dir,
            container_path,
        }
    }

    pub fn rom_destination(&self, game: &Game) -> PathBuf {
        self.rom_dir.join(&game.rom_path)
    }

    pub fn slot_folder(&self, slot: &AssetSlot) -> PathBuf {
        self.content_root.join(expand_template(slot.folder, &self.label))
    }

    /// Destination of an asset in a slot, keeping the source file's extension
    pub fn asset_destination(&self, slot: &AssetSlot, game: &Game, format: &str) -> PathBuf {
        let base = match slot.naming {
            SlotNaming::Mirror => game.rom_stem(),
            SlotNaming::Suffix(suffix) => format!("{}{suffix}", game.rom_stem()),
            SlotNaming::Title { index: true } => format!("{}-01", sanitize_file_name(&game.title)),
            SlotNaming::Title { index: false } => sanitize_file_name(&game.title),
        };
        let name = if format.is_empty() {
            base
        } else {
            format!("{base}.{format}")
        };
        self.slot_folder(slot).join(name)
    }

    /// `./`-prefixed reference relative to the ROM directory
    pub fn rom_relative(&self, path: &Path) -> String {
        let rom_dir = lexical_normalize(&self.rom_dir);
        let path = lexical_normalize(path);
        match path.strip_prefix(&rom_dir) {
            Ok(relative) => format!("./{}", to_slash(relative)),
            Err(_) => to_slash(&path),
        }
    }

    /// Backslash separated reference relative to the content root
    pub fn content_relative(&self, path: &Path) -> String {
        to_slash(&relative_to(path, &self.content_root)).replace('/', "\\")
    }

    /// Whether the target already has a container for this system. A shared
    /// database only counts when it holds rows for this platform.
    pub fn container_exists(&self) -> bool {
        let Some(path) = &self.container_path else {
            return false;
        };
        if !path.exists() {
            return false;
        }
        match self.descriptor.container {
            MetadataContainer::Sqlite => match LaunchBoxSqliteLoader.discover(self.descriptor, &self.content_root) {
                Ok(sources) => sources.iter().any(|s| s.platform_label == self.label),
                Err(e) => {
                    tracing::warn!("Cannot inspect {}: {}", path.display(), e);
                    true
                }
            },
            _ => true,
        }
    }
}

/// A record ready to be encoded, with the target paths of its files
#[derive(Debug, Clone)]
pub struct WrittenGame {
    pub game: Game,
    /// Absolute ROM path in the target tree
    pub rom: PathBuf,
    pub assets: BTreeMap<AssetType, PathBuf>,
}

impl WrittenGame {
    pub fn asset(&self, asset_type: AssetType) -> Option<&Path> {
        self.assets.get(&asset_type).map(PathBuf::as_path)
    }
}

/// Encodes and replaces one system's container
pub trait Writer: Send + Sync {
    fn container(&self) -> MetadataContainer;

    /// Write the container for `target`. Returns the files replaced.
    fn write(&self, target: &TargetSystem, games: &[WrittenGame]) -> Result<Vec<PathBuf>, ConvertError>;
}

/// Ecosystems without a metadata container
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContainerWriter;

impl Writer for NoContainerWriter {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::FilenameOnly
    }

    fn write(&self, _target: &TargetSystem, _games: &[WrittenGame]) -> Result<Vec<PathBuf>, ConvertError> {
        Ok(Vec::new())
    }
}

pub fn writer_for(container: MetadataContainer) -> Box<dyn Writer> {
    match container {
        MetadataContainer::XmlPerSystem => Box::new(GamelistWriter),
        MetadataContainer::XmlCentral => Box::new(LaunchBoxXmlWriter),
        MetadataContainer::Sqlite => Box::new(LaunchBoxSqliteWriter),
        MetadataContainer::Playlist => Box::new(PlaylistWriter),
        MetadataContainer::Plaintext => Box::new(RomlistWriter),
        MetadataContainer::FilenameOnly => Box::new(NoContainerWriter),
    }
}

fn write_failure(path: &Path, error: impl std::fmt::Display) -> ConvertError {
    ConvertError::OutputWrite {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

/// Fill a temporary file next to `dest` and rename it over `dest`. The temporary file
/// is removed when filling or renaming fails.
pub(crate) fn replace_with<F>(dest: &Path, fill: F) -> Result<(), ConvertError>
where
    F: FnOnce(&Path) -> Result<(), ConvertError>,
{
    let parent = dest
        .parent()
        .ok_or_else(|| write_failure(dest, "no parent directory"))?;
    std::fs::create_dir_all(parent).map_err(|e| write_failure(parent, e))?;

    let temp = tempfile::Builder::new()
        .prefix(".retrosync-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| write_failure(dest, e))?;
    fill(temp.path())?;
    temp.persist(dest).map_err(|e| write_failure(dest, e.error))?;
    tracing::debug!("Replaced {}", dest.display());
    Ok(())
}

/// Atomically replace `dest` with `bytes`
pub(crate) fn replace_file(dest: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    replace_with(dest, |temp| {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(temp)
            .map_err(|e| write_failure(temp, e))?;
        file.write_all(bytes).map_err(|e| write_failure(temp, e))?;
        file.sync_all().map_err(|e| write_failure(temp, e))?;
        Ok(())
    })
}
