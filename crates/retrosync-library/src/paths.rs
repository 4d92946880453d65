//! Path reference handling shared by loaders, the resolver and writers

use retrosync_config::PathReferences;
use std::path::{Component, Path, PathBuf};

/// Base directories a container's relative references are resolved against
#[derive(Debug, Clone)]
pub struct ReferenceBase {
    pub rom_root: PathBuf,
    pub container_dir: PathBuf,
    pub content_root: PathBuf,
    pub style: PathReferences,
}

impl ReferenceBase {
    /// Resolve a reference as written in a container.
    ///
    /// `./x` is ROM-relative, `~/x` home-relative, absolute paths are kept, other
    /// relative paths follow the container's convention.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let reference = normalize_separators(reference.trim());
        if reference.is_empty() {
            return None;
        }

        let path = if let Some(rest) = reference.strip_prefix("./") {
            self.rom_root.join(rest)
        } else if let Some(rest) = reference.strip_prefix("~/") {
            home_dir()?.join(rest)
        } else if is_absolute_reference(&reference) {
            PathBuf::from(&reference)
        } else {
            match self.style {
                PathReferences::RomRelative => self.container_dir.join(&reference),
                PathReferences::ContentRelative => self.content_root.join(&reference),
                PathReferences::Absolute | PathReferences::Bare => self.rom_root.join(&reference),
            }
        };
        Some(lexical_normalize(&path))
    }
}

fn is_absolute_reference(reference: &str) -> bool {
    if Path::new(reference).is_absolute() {
        return true;
    }
    // Windows drive letters, e.g. C:/Games
    let bytes = reference.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

/// The user's home directory
pub fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

/// Convert backslash separators to forward slashes
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Resolve `.` and `..` components without touching the filesystem
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Express `path` relative to `root` when it lies below it, otherwise keep it as is
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    let path = lexical_normalize(path);
    let root = lexical_normalize(root);
    match path.strip_prefix(&root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => path,
    }
}

/// Forward-slash rendering of a relative path
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Replace characters front-ends refuse in media file names
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '&' | '`' | '\'' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = sanitized.trim().trim_end_matches('.').to_string();
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed
    }
}

/// Find a directory entry by name, ignoring case when no exact match exists
pub fn find_case_insensitive(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.exists() {
        return Some(exact);
    }
    let wanted = name.to_lowercase();
    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .find(|e| e.file_name().to_string_lossy().to_lowercase() == wanted)
        .map(|e| e.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(style: PathReferences) -> ReferenceBase {
        ReferenceBase {
            rom_root: PathBuf::from("/lib/roms/snes"),
            container_dir: PathBuf::from("/lib/gamelists/snes"),
            content_root: PathBuf::from("/lib"),
            style,
        }
    }

    #[test]
    fn test_rom_relative_reference() {
        let base = base(PathReferences::RomRelative);
        assert_eq!(
            base.resolve("./images/Mario-image.png"),
            Some(PathBuf::from("/lib/roms/snes/images/Mario-image.png"))
        );
        assert_eq!(
            base.resolve("media/x.png"),
            Some(PathBuf::from("/lib/gamelists/snes/media/x.png"))
        );
        assert_eq!(base.resolve("  "), None);
    }

    #[test]
    fn test_content_relative_backslashes() {
        let base = base(PathReferences::ContentRelative);
        assert_eq!(
            base.resolve("Games\\Super Nintendo\\Mario.zip"),
            Some(PathBuf::from("/lib/Games/Super Nintendo/Mario.zip"))
        );
        assert_eq!(
            base.resolve("..\\ROMs\\Mario.zip"),
            Some(PathBuf::from("/ROMs/Mario.zip"))
        );
    }

    #[test]
    fn test_absolute_reference_kept() {
        let base = base(PathReferences::RomRelative);
        assert_eq!(
            base.resolve("/media/art/x.png"),
            Some(PathBuf::from("/media/art/x.png"))
        );
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(
            relative_to(Path::new("/lib/roms/snes/./sub/a.zip"), Path::new("/lib/roms/snes")),
            PathBuf::from("sub/a.zip")
        );
        assert_eq!(
            relative_to(Path::new("/elsewhere/a.zip"), Path::new("/lib/roms/snes")),
            PathBuf::from("/elsewhere/a.zip")
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Zelda: A Link to the Past"), "Zelda_ A Link to the Past");
        assert_eq!(sanitize_file_name("Tom & Jerry?"), "Tom _ Jerry_");
        assert_eq!(sanitize_file_name("..."), "_");
    }
}
