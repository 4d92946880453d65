//! Asset association
//!
//! Media files are tied to games by an ordered list of strategies. Explicit container
//! references come first, then the naming conventions of the ecosystem's slots, and a
//! fallback scan last. Folder listings are indexed once per system so that resolution
//! of individual games does no directory I/O.

use crate::loaders::{AssetHint, SystemSource};
use crate::model::{Asset, AssociationMethod, Game};
use retrosync_config::{AssetSlot, AssetType, EcosystemDescriptor, SlotNaming, expand_template};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Lowercase ASCII slug for fuzzy title comparison: accents folded, everything that is
/// not a letter or digit collapsed to single dashes
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut dash = false;
    for ch in text.chars().flat_map(fold_diacritic) {
        if ch.is_ascii_alphanumeric() {
            if dash && !slug.is_empty() {
                slug.push('-');
            }
            dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            dash = true;
        }
    }
    slug
}

fn fold_diacritic(ch: char) -> Vec<char> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'a',
        'ç' | 'Ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => 'i',
        'ñ' | 'Ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => 'u',
        'ý' | 'ÿ' | 'Ý' => 'y',
        'ß' => return vec!['s', 's'],
        'æ' | 'Æ' => return vec!['a', 'e'],
        'œ' | 'Œ' => return vec!['o', 'e'],
        '&' => return vec![' ', 'a', 'n', 'd', ' '],
        other => other,
    };
    vec![folded]
}

/// Remove a trailing image index such as `-01`
pub fn strip_image_index(stem: &str) -> &str {
    if let Some((head, tail)) = stem.rsplit_once('-')
        && !tail.is_empty()
        && tail.len() <= 3
        && tail.chars().all(|c| c.is_ascii_digit())
    {
        return head;
    }
    stem
}

/// One file in an indexed folder
#[derive(Debug, Clone)]
struct IndexedFile {
    path: PathBuf,
    stem: String,
    ext: String,
    /// Slug of the stem with any image index removed
    slug: String,
}

/// Listing of every asset folder of one system
#[derive(Debug, Clone, Default)]
pub struct FolderIndex {
    folders: BTreeMap<AssetType, (PathBuf, Vec<IndexedFile>)>,
}

impl FolderIndex {
    /// List the folders of every slot. Folders named by the container take precedence
    /// over the descriptor's templates; missing folders index as empty.
    pub fn build(descriptor: &EcosystemDescriptor, source: &SystemSource) -> Self {
        let mut folders = BTreeMap::new();
        for slot in descriptor.asset_slots {
            let folder = source.asset_folders.get(&slot.asset_type).cloned().unwrap_or_else(|| {
                source
                    .content_root
                    .join(expand_template(slot.folder, &source.platform_label))
            });
            let files = list_files(&folder, slot.asset_type);
            folders.insert(slot.asset_type, (folder, files));
        }
        Self { folders }
    }

    pub fn folder(&self, asset_type: AssetType) -> Option<&Path> {
        self.folders.get(&asset_type).map(|(path, _)| path.as_path())
    }

    /// Folder per asset type
    pub fn folders(&self) -> BTreeMap<AssetType, PathBuf> {
        self.folders
            .iter()
            .map(|(asset_type, (path, _))| (*asset_type, path.clone()))
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.folders.values().map(|(_, files)| files.len()).sum()
    }

    fn files(&self, asset_type: AssetType) -> &[IndexedFile] {
        self.folders
            .get(&asset_type)
            .map(|(_, files)| files.as_slice())
            .unwrap_or(&[])
    }

    /// Exact stem match; the extension order of the asset type breaks ties
    fn exact(&self, asset_type: AssetType, stem: &str) -> Option<PathBuf> {
        self.files(asset_type)
            .iter()
            .filter(|f| f.stem == stem)
            .min_by_key(|f| extension_rank(asset_type, &f.ext))
            .map(|f| f.path.clone())
    }
}

fn extension_rank(asset_type: AssetType, ext: &str) -> usize {
    asset_type
        .extensions()
        .iter()
        .position(|e| *e == ext)
        .unwrap_or(usize::MAX)
}

fn list_files(folder: &Path, asset_type: AssetType) -> Vec<IndexedFile> {
    let Ok(entries) = std::fs::read_dir(folder) else {
        return Vec::new();
    };
    let mut files: Vec<IndexedFile> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|e| {
            let path = e.path();
            let ext = path.extension()?.to_string_lossy().to_lowercase();
            if !asset_type.accepts_extension(&ext) {
                return None;
            }
            let stem = path.file_stem()?.to_string_lossy().to_string();
            let slug = slugify(strip_image_index(&stem));
            Some(IndexedFile {
                path,
                stem,
                ext,
                slug,
            })
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Inputs shared by the strategies while resolving one system
pub struct ResolveContext<'a> {
    pub descriptor: &'a EcosystemDescriptor,
    pub index: &'a FolderIndex,
    pub fuzzy_min_prefix: usize,
}

/// One way of finding a game's file for a slot
pub trait ResolveStrategy: Send + Sync {
    fn method(&self) -> AssociationMethod;

    fn find(&self, ctx: &ResolveContext<'_>, game: &Game, slot: &AssetSlot) -> Option<PathBuf>;
}

/// `<rom stem><suffix>` in the slot's folder
pub struct SuffixConvention;

impl ResolveStrategy for SuffixConvention {
    fn method(&self) -> AssociationMethod {
        AssociationMethod::SuffixMatch
    }

    fn find(&self, ctx: &ResolveContext<'_>, game: &Game, slot: &AssetSlot) -> Option<PathBuf> {
        let SlotNaming::Suffix(suffix) = slot.naming else {
            return None;
        };
        ctx.index
            .exact(slot.asset_type, &format!("{}{suffix}", game.rom_stem()))
    }
}

/// File named exactly like the ROM
pub struct FilenameMirror;

impl ResolveStrategy for FilenameMirror {
    fn method(&self) -> AssociationMethod {
        AssociationMethod::FilenameMirror
    }

    fn find(&self, ctx: &ResolveContext<'_>, game: &Game, slot: &AssetSlot) -> Option<PathBuf> {
        if slot.naming != SlotNaming::Mirror {
            return None;
        }
        ctx.index.exact(slot.asset_type, &game.rom_stem())
    }
}

/// Title-named files compared by slug. An exact slug wins; otherwise a single title
/// sharing a long enough prefix. Two different candidate titles resolve to nothing.
pub struct TitleFuzzyMatch;

impl TitleFuzzyMatch {
    fn unique<'a>(candidates: impl Iterator<Item = &'a IndexedFile>) -> Option<PathBuf> {
        let candidates: Vec<&IndexedFile> = candidates.collect();
        let slugs: BTreeSet<&str> = candidates.iter().map(|f| f.slug.as_str()).collect();
        if slugs.len() != 1 {
            return None;
        }
        // same title, several indexed images: the lowest index
        candidates.first().map(|f| f.path.clone())
    }
}

impl ResolveStrategy for TitleFuzzyMatch {
    fn method(&self) -> AssociationMethod {
        AssociationMethod::TitleFuzzyMatch
    }

    fn find(&self, ctx: &ResolveContext<'_>, game: &Game, slot: &AssetSlot) -> Option<PathBuf> {
        if !ctx.descriptor.title_driven || !matches!(slot.naming, SlotNaming::Title { .. }) {
            return None;
        }
        let wanted = slugify(&game.title);
        if wanted.is_empty() {
            return None;
        }
        let files = ctx.index.files(slot.asset_type);

        let exact: Vec<&IndexedFile> = files.iter().filter(|f| f.slug == wanted).collect();
        if !exact.is_empty() {
            return Self::unique(exact.into_iter());
        }

        Self::unique(files.iter().filter(|f| {
            let (short, long) = if f.slug.len() <= wanted.len() {
                (f.slug.as_str(), wanted.as_str())
            } else {
                (wanted.as_str(), f.slug.as_str())
            };
            short.len() >= ctx.fuzzy_min_prefix && long.starts_with(short)
        }))
    }
}

/// Case-insensitive stem match, only in folders holding a single asset type
pub struct FallbackScan;

impl ResolveStrategy for FallbackScan {
    fn method(&self) -> AssociationMethod {
        AssociationMethod::FallbackScan
    }

    fn find(&self, ctx: &ResolveContext<'_>, game: &Game, slot: &AssetSlot) -> Option<PathBuf> {
        if !ctx.descriptor.folder_is_dedicated(slot) {
            return None;
        }
        let wanted = game.rom_stem().to_lowercase();
        let matches: Vec<&IndexedFile> = ctx
            .index
            .files(slot.asset_type)
            .iter()
            .filter(|f| f.stem.to_lowercase() == wanted)
            .collect();
        let stems: BTreeSet<&str> = matches.iter().map(|f| f.stem.as_str()).collect();
        if stems.len() != 1 {
            if stems.len() > 1 {
                tracing::debug!(
                    "Ambiguous fallback for {} in {:?}: {:?}",
                    game.rom_file_name(),
                    slot.asset_type,
                    stems
                );
            }
            return None;
        }
        matches
            .into_iter()
            .min_by_key(|f| extension_rank(slot.asset_type, &f.ext))
            .map(|f| f.path.clone())
    }
}

/// Resolves every asset slot of the games of one system
pub struct AssetResolver<'a> {
    descriptor: &'a EcosystemDescriptor,
    source: &'a SystemSource,
    index: FolderIndex,
    fuzzy_min_prefix: usize,
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl<'a> AssetResolver<'a> {
    pub fn new(
        descriptor: &'a EcosystemDescriptor,
        source: &'a SystemSource,
        fuzzy_min_prefix: usize,
    ) -> Self {
        Self {
            descriptor,
            source,
            index: FolderIndex::build(descriptor, source),
            fuzzy_min_prefix,
            strategies: vec![
                Box::new(SuffixConvention),
                Box::new(FilenameMirror),
                Box::new(TitleFuzzyMatch),
            ],
        }
    }

    pub fn index(&self) -> &FolderIndex {
        &self.index
    }

    /// Attach assets to a game. Explicit references are honoured first when the
    /// ecosystem allows it; the fallback scan runs only for slots still empty.
    pub fn resolve(&self, game: &mut Game, hints: &[AssetHint]) {
        if self.descriptor.honors_explicit_references {
            let base = self.source.reference_base(self.descriptor);
            for hint in hints {
                if let Some(path) = base.resolve(&hint.reference)
                    && path.is_file()
                {
                    game.attach_asset(Asset::new(
                        hint.asset_type,
                        path,
                        AssociationMethod::ExplicitReference,
                    ));
                }
            }
        }

        let ctx = ResolveContext {
            descriptor: self.descriptor,
            index: &self.index,
            fuzzy_min_prefix: self.fuzzy_min_prefix,
        };
        for slot in self.descriptor.asset_slots {
            for strategy in &self.strategies {
                if let Some(path) = strategy.find(&ctx, game, slot) {
                    game.attach_asset(Asset::new(slot.asset_type, path, strategy.method()));
                }
            }
            if !game.assets.contains_key(&slot.asset_type)
                && let Some(path) = FallbackScan.find(&ctx, game, slot)
            {
                game.attach_asset(Asset::new(
                    slot.asset_type,
                    path,
                    AssociationMethod::FallbackScan,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrosync_config::EcosystemRegistry;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Pokémon: Red Version"), "pokemon-red-version");
        assert_eq!(slugify("  Tom & Jerry!! "), "tom-and-jerry");
        assert_eq!(slugify("Street_Fighter II'"), "street-fighter-ii");
    }

    #[test]
    fn test_strip_image_index() {
        assert_eq!(strip_image_index("Super Mario World-01"), "Super Mario World");
        assert_eq!(strip_image_index("Half-Life"), "Half-Life");
        assert_eq!(strip_image_index("Game-2024x"), "Game-2024x");
    }

    #[test]
    fn test_batocera_suffix_and_explicit_reference() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let roms = root.join("roms/snes");
        touch(&roms.join("images/Mario-image.png"));
        touch(&roms.join("images/Mario-thumb.png"));
        touch(&roms.join("images/cover.jpg"));

        let descriptor = EcosystemRegistry::builtin().get("batocera").unwrap();
        let source = SystemSource::new("snes", root, roms.clone(), Some(roms.join("gamelist.xml")));
        let resolver = AssetResolver::new(descriptor, &source, 8);

        let mut game = Game::new("snes", PathBuf::from("Mario.zip"), "Mario");
        let hints = vec![AssetHint {
            asset_type: AssetType::BoxFront,
            reference: "./images/cover.jpg".to_string(),
        }];
        resolver.resolve(&mut game, &hints);

        let front = &game.assets[&AssetType::BoxFront];
        assert_eq!(front.association, AssociationMethod::ExplicitReference);
        assert_eq!(front.file_path, roms.join("images/cover.jpg"));
        assert_eq!(game.ignored_assets, vec![roms.join("images/Mario-image.png")]);
        assert_eq!(
            game.assets[&AssetType::ScreenshotGameplay].association,
            AssociationMethod::SuffixMatch
        );
    }

    #[test]
    fn test_es_de_mirror_ignores_references() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("downloaded_media/snes/covers/Super Mario World.png"));
        touch(&root.join("downloaded_media/snes/videos/Super Mario World.mp4"));
        touch(&root.join("elsewhere.png"));

        let descriptor = EcosystemRegistry::builtin().get("es_de").unwrap();
        let source = SystemSource::new("snes", root, root.join("ROMs/snes"), None);
        let resolver = AssetResolver::new(descriptor, &source, 8);

        let mut game = Game::new("snes", PathBuf::from("Super Mario World.zip"), "Super Mario World");
        let hints = vec![AssetHint {
            asset_type: AssetType::BoxFront,
            reference: root.join("elsewhere.png").to_string_lossy().to_string(),
        }];
        resolver.resolve(&mut game, &hints);

        assert_eq!(game.assets.len(), 2);
        let front = &game.assets[&AssetType::BoxFront];
        assert_eq!(front.association, AssociationMethod::FilenameMirror);
        assert_eq!(game.assets[&AssetType::Video].format, "mp4");
    }

    #[test]
    fn test_launchbox_title_fuzzy_match() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let covers = root.join("Images/Super Nintendo Entertainment System/Box - Front");
        touch(&covers.join("Super Mario World-01.png"));
        touch(&covers.join("Super Mario World-02.png"));
        touch(&covers.join("The Legend of Zelda - A Link to the Past-01.jpg"));
        touch(&covers.join("Street Fighter II Turbo-01.png"));
        touch(&covers.join("Street Fighter II Champion Edition-01.png"));

        let descriptor = EcosystemRegistry::builtin().get("launchbox").unwrap();
        let label = "Super Nintendo Entertainment System";
        let source = SystemSource::new(label, root, root.join("Games").join(label), None);
        let resolver = AssetResolver::new(descriptor, &source, 8);

        let mut mario = Game::new("snes", PathBuf::from("smw.zip"), "Super Mario World");
        resolver.resolve(&mut mario, &[]);
        let front = &mario.assets[&AssetType::BoxFront];
        assert_eq!(front.association, AssociationMethod::TitleFuzzyMatch);
        assert_eq!(front.file_path, covers.join("Super Mario World-01.png"));

        let mut zelda = Game::new("snes", PathBuf::from("z.zip"), "The Legend of Zelda");
        resolver.resolve(&mut zelda, &[]);
        assert!(zelda.assets.contains_key(&AssetType::BoxFront));

        // two different titles share the prefix
        let mut sf = Game::new("snes", PathBuf::from("sf2.zip"), "Street Fighter II");
        resolver.resolve(&mut sf, &[]);
        assert!(!sf.assets.contains_key(&AssetType::BoxFront));
    }

    #[test]
    fn test_fallback_scan_ambiguous_case() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let imgs = root.join("Roms/GB/Imgs");
        touch(&imgs.join("TETRIS.png"));
        touch(&imgs.join("tetris.png"));
        touch(&imgs.join("zelda.PNG"));

        let descriptor = EcosystemRegistry::builtin().get("onionos").unwrap();
        let source = SystemSource::new("GB", root, root.join("Roms/GB"), None);
        let resolver = AssetResolver::new(descriptor, &source, 8);

        let mut tetris = Game::new("gb", PathBuf::from("Tetris.gb"), "Tetris");
        resolver.resolve(&mut tetris, &[]);
        assert!(tetris.assets.is_empty());

        let mut zelda = Game::new("gb", PathBuf::from("Zelda.gb"), "Zelda");
        resolver.resolve(&mut zelda, &[]);
        assert_eq!(
            zelda.assets[&AssetType::BoxFront].association,
            AssociationMethod::FallbackScan
        );
    }
}
