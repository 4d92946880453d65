//! Builds a [`Library`] from a source root
//!
//! Detection picks the ecosystem, its loader reads each system, and asset resolution
//! for the games of a system fans out over a bounded rayon pool. Local DAT files, when
//! any are found, fill in metadata the source left out.

use crate::dat_metadata::{DatMetadataOptions, EnrichSummary, MetadataEnricher, enrich_game};
use crate::detector::Detector;
use crate::loaders::{Loader, RawEntry, SystemSource, loader_for};
use crate::model::{Game, Library, LoaderIssue, System};
use crate::progress::{CancelToken, ItemCounter, NullProgress, ProgressSink, Stage};
use crate::resolver::AssetResolver;
use crate::scanner::RomScanner;
use crate::verifier::verify_assets;
use crate::LibraryError;
use rayon::prelude::*;
use retrosync_config::{
    EcosystemDescriptor, EcosystemRegistry, EngineConfig, PlatformTable, normalize_label,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-run analysis options
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeOptions {
    /// Skip detection and load with this ecosystem
    pub forced_ecosystem: Option<String>,
    pub confidence_threshold: f32,
    /// Check asset files after loading
    pub verify_assets: bool,
    pub metadata: DatMetadataOptions,
}

impl AnalyzeOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            forced_ecosystem: None,
            confidence_threshold: config.detection.confidence_threshold,
            verify_assets: config.resolver.verify_after_load,
            metadata: DatMetadataOptions {
                metadata_root: config.metadata.root.clone(),
                search_source: config.metadata.search_source,
                compute_missing_hashes: config.metadata.compute_missing_hashes,
                overrides: config.metadata.dats.clone(),
            },
        }
    }
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// One system read by a loader, with its recoverable problems
#[derive(Debug, Clone)]
pub struct LoadedSystem {
    pub system: System,
    pub warnings: Vec<String>,
}

/// Orchestrates detection, loading and asset resolution
pub struct Normalizer {
    registry: &'static EcosystemRegistry,
    platforms: &'static PlatformTable,
    detector: Detector,
    fuzzy_min_prefix: usize,
    pool: rayon::ThreadPool,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
}

impl Normalizer {
    pub fn new(config: &EngineConfig) -> Result<Self, LibraryError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker.threads)
            .thread_name(|i| format!("retrosync-resolve-{i}"))
            .build()
            .map_err(|e| LibraryError::Worker(e.to_string()))?;
        let registry = EcosystemRegistry::builtin();

        Ok(Self {
            registry,
            platforms: PlatformTable::builtin(),
            detector: Detector::new(registry, &config.detection),
            fuzzy_min_prefix: config.resolver.fuzzy_min_prefix,
            pool,
            progress: Arc::new(NullProgress),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Detect the ecosystem of `root` (unless forced) and load it
    pub fn analyze(&self, root: &Path, options: &AnalyzeOptions) -> Result<Library, LibraryError> {
        if std::fs::read_dir(root).is_err() {
            return Err(LibraryError::SourceUnreadable(root.to_path_buf()));
        }

        self.progress
            .stage(Stage::Detecting, &root.display().to_string());
        let report = self.detector.detect(root);

        let (descriptor, confidence) = match &options.forced_ecosystem {
            Some(id) => {
                let descriptor = self
                    .registry
                    .get(id)
                    .ok_or_else(|| LibraryError::UnknownEcosystem(id.clone()))?;
                (descriptor, report.confidence_of(id))
            }
            None => {
                let best = report.choose(options.confidence_threshold)?;
                (best.descriptor, best.confidence)
            }
        };
        info!(
            "Source {} detected as {} (confidence {:.2})",
            root.display(),
            descriptor.name,
            confidence
        );

        let mut library = self.load_library(root, descriptor, confidence)?;
        self.enrich_metadata(&mut library, &options.metadata)?;
        if options.verify_assets {
            self.progress.stage(Stage::Verifying, "assets");
            let summary = verify_assets(library.assets_mut());
            info!(
                "Verified {} assets: {} present, {} missing",
                summary.checked, summary.present, summary.missing
            );
        }
        Ok(library)
    }

    /// Load every system of `root` with a known descriptor. Failures are isolated to
    /// their system and recorded in `Library::issues`.
    pub fn load_library(
        &self,
        root: &Path,
        descriptor: &'static EcosystemDescriptor,
        confidence: f32,
    ) -> Result<Library, LibraryError> {
        let content_root = descriptor.content_root(root);
        let loader = loader_for(descriptor.container);

        let mut library = Library {
            source_root: root.to_path_buf(),
            source_ecosystem: descriptor.id.to_string(),
            detection_confidence: confidence,
            systems: Vec::new(),
            issues: Vec::new(),
        };

        let sources = match loader.discover(descriptor, &content_root) {
            Ok(sources) => sources,
            Err(e) => {
                warn!("Discovery failed under {}: {e}", content_root.display());
                self.progress.error(e.to_string());
                library.issues.push(LoaderIssue::error("", e.to_string()));
                Vec::new()
            }
        };
        debug!("{} systems under {}", sources.len(), content_root.display());

        // labels spelling their canonical id claim it before aliases do
        let mut ordered: Vec<&SystemSource> = sources.iter().collect();
        ordered.sort_by_key(|source| {
            normalize_label(&source.platform_label)
                != self.platforms.canonicalize(&source.platform_label).system_id
        });

        let mut used_ids: HashSet<String> = HashSet::new();
        for source in ordered {
            if self.cancel.is_cancelled() {
                return Err(LibraryError::Cancelled);
            }
            self.progress.stage(Stage::Loading, &source.platform_label);

            match self.load_system_with(loader.as_ref(), descriptor, source) {
                Ok(loaded) => {
                    let mut system = loaded.system;
                    if !used_ids.insert(system.system_id.clone()) {
                        warn!(
                            "{} maps to already used system {}, keeping the source label",
                            source.platform_label, system.system_id
                        );
                        system.system_id = source.platform_label.clone();
                        system.display_name = source.platform_label.clone();
                        system.needs_mapping = true;
                        if !used_ids.insert(system.system_id.clone()) {
                            library.issues.push(LoaderIssue::error(
                                &source.platform_label,
                                "duplicate system label, system skipped",
                            ));
                            continue;
                        }
                    }
                    for message in loaded.warnings {
                        self.progress.warning(message.clone());
                        library
                            .issues
                            .push(LoaderIssue::warning(&source.platform_label, message));
                    }
                    library.systems.push(system);
                }
                Err(LibraryError::Cancelled) => return Err(LibraryError::Cancelled),
                Err(e) => {
                    warn!("Skipping system {}: {e}", source.platform_label);
                    self.progress.error(e.to_string());
                    library
                        .issues
                        .push(LoaderIssue::error(&source.platform_label, e.to_string()));
                }
            }
        }

        info!(
            "Loaded {} games in {} systems",
            library.game_count(),
            library.systems.len()
        );
        Ok(library)
    }

    /// Fill metadata gaps from the DAT chosen for each system
    pub fn enrich_metadata(
        &self,
        library: &mut Library,
        options: &DatMetadataOptions,
    ) -> Result<EnrichSummary, LibraryError> {
        let mut summary = EnrichSummary::default();
        let mut enricher = MetadataEnricher::new(options.clone(), &library.source_root);
        if !enricher.is_active() {
            return Ok(summary);
        }

        for system in &mut library.systems {
            if self.cancel.is_cancelled() {
                return Err(LibraryError::Cancelled);
            }
            let Some((dat, index)) = enricher.index_for(system) else {
                continue;
            };
            self.progress.stage(Stage::Enriching, &system.source_platform_label);

            let counter = ItemCounter::new(system.games.len());
            let rom_root = system.rom_root.clone();
            let enriched = self.pool.install(|| {
                system
                    .games
                    .par_iter_mut()
                    .map(|game| {
                        let rom_file = rom_root.join(&game.rom_path);
                        let changed = enrich_game(index, game, &rom_file, options.compute_missing_hashes);
                        counter.tick(self.progress.as_ref());
                        changed
                    })
                    .filter(|changed| *changed)
                    .count()
            });
            info!(
                "{}: {} games enriched from {}",
                system.system_id,
                enriched,
                dat.display()
            );
            summary.games_enriched += enriched;
            summary.sources.insert(system.system_id.clone(), dat);
        }

        for message in enricher.take_warnings() {
            self.progress.warning(message.clone());
            library.issues.push(LoaderIssue::warning("", message));
        }
        Ok(summary)
    }

    /// Load one system with the loader of `descriptor`'s container
    pub fn load_system(
        &self,
        descriptor: &EcosystemDescriptor,
        source: &SystemSource,
    ) -> Result<LoadedSystem, LibraryError> {
        let loader = loader_for(descriptor.container);
        self.load_system_with(loader.as_ref(), descriptor, source)
    }

    fn load_system_with(
        &self,
        loader: &dyn Loader,
        descriptor: &EcosystemDescriptor,
        source: &SystemSource,
    ) -> Result<LoadedSystem, LibraryError> {
        let canonical = self.platforms.canonicalize(&source.platform_label);
        let loaded = loader.load(source, descriptor)?;
        let mut warnings = loaded.warnings;

        let resolver = AssetResolver::new(descriptor, source, self.fuzzy_min_prefix);
        self.progress
            .stage(Stage::ResolvingAssets, &source.platform_label);

        let counter = ItemCounter::new(loaded.entries.len());
        let system_id = canonical.system_id.as_str();
        let games: Vec<Option<Game>> = self.pool.install(|| {
            loaded
                .entries
                .par_iter()
                .map(|entry| {
                    if self.cancel.is_cancelled() {
                        return None;
                    }
                    let mut game = build_game(loader, descriptor, source, system_id, entry);
                    resolver.resolve(&mut game, &entry.hints);
                    counter.tick(self.progress.as_ref());
                    Some(game)
                })
                .collect()
        });
        if self.cancel.is_cancelled() {
            return Err(LibraryError::Cancelled);
        }

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut kept = Vec::with_capacity(games.len());
        for game in games.into_iter().flatten() {
            if seen.insert(game.rom_path.clone()) {
                kept.push(game);
            } else {
                warnings.push(format!(
                    "duplicate entry for {} dropped",
                    game.rom_path.display()
                ));
            }
        }

        let assets: usize = kept.iter().map(|g| g.assets.len()).sum();
        info!(
            "{}: {} games, {} assets ({} files indexed)",
            source.platform_label,
            kept.len(),
            assets,
            resolver.index().file_count()
        );

        Ok(LoadedSystem {
            system: System {
                system_id: canonical.system_id.clone(),
                display_name: canonical.display_name,
                source_platform_label: source.platform_label.clone(),
                rom_root: source.rom_root.clone(),
                asset_roots: resolver.index().folders(),
                container_path: source.container_path.clone(),
                needs_mapping: !canonical.known,
                target_label: None,
                games: kept,
            },
            warnings,
        })
    }
}

fn build_game(
    loader: &dyn Loader,
    descriptor: &EcosystemDescriptor,
    source: &SystemSource,
    system_id: &str,
    entry: &RawEntry,
) -> Game {
    let map = loader.field_map();
    let rom_path = loader.rom_path(entry, source, descriptor);
    let title = map
        .title(entry)
        .unwrap_or_else(|| RomScanner::title_from_path(&rom_path));
    let mut game = Game::new(system_id, rom_path, title);
    game.metadata = map.metadata(entry);
    if let Some(key) = loader.stable_key(entry) {
        game.stable_key = key;
    }
    game
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrosync_config::AssetType;
    use std::fs;
    use tempfile::TempDir;

    fn normalizer() -> Normalizer {
        let mut config = EngineConfig::default();
        config.worker.threads = 2;
        Normalizer::new(&config).unwrap()
    }

    #[test]
    fn test_unreadable_root() {
        let err = normalizer()
            .analyze(Path::new("/nonexistent/library"), &AnalyzeOptions::default())
            .unwrap_err();
        assert!(matches!(err, LibraryError::SourceUnreadable(_)));
    }

    #[test]
    fn test_forced_ecosystem_unknown() {
        let dir = TempDir::new().unwrap();
        let options = AnalyzeOptions {
            forced_ecosystem: Some("nope".to_string()),
            ..AnalyzeOptions::default()
        };
        let err = normalizer().analyze(dir.path(), &options).unwrap_err();
        assert!(matches!(err, LibraryError::UnknownEcosystem(_)));
    }

    #[test]
    fn test_duplicate_canonical_id_kept_verbatim() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for label in ["genesis", "megadrive"] {
            fs::create_dir_all(root.join("roms").join(label)).unwrap();
            fs::write(root.join("roms").join(label).join("Sonic.md"), b"rom").unwrap();
        }

        let descriptor = EcosystemRegistry::builtin().get("es_classic").unwrap();
        let library = normalizer().load_library(root, descriptor, 1.0).unwrap();
        assert_eq!(library.systems.len(), 2);

        let megadrive = library.system("megadrive").unwrap();
        assert_eq!(megadrive.source_platform_label, "megadrive");
        assert!(!megadrive.needs_mapping);

        let genesis = library.system("genesis").unwrap();
        assert!(genesis.needs_mapping);
        assert_eq!(genesis.source_platform_label, "genesis");
        assert_eq!(genesis.games.len(), 1);
    }

    #[test]
    fn test_analyze_enriches_from_source_dats() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("roms/arcade")).unwrap();
        fs::create_dir_all(root.join("dats")).unwrap();
        fs::write(root.join("roms/arcade/pacman.zip"), b"rom").unwrap();
        fs::write(root.join("roms/arcade/galaga.zip"), b"rom").unwrap();
        fs::write(
            root.join("dats/FBNeo - Arcade Games.dat"),
            r#"<datafile><header><name>FBNeo - Arcade Games</name></header>
<machine name="pacman"><description>Pac-Man</description><year>1980</year>
<manufacturer>Namco</manufacturer><rom name="pacman.zip" crc="79520fa1"/></machine>
</datafile>"#,
        )
        .unwrap();

        let options = AnalyzeOptions {
            forced_ecosystem: Some("es_classic".to_string()),
            ..AnalyzeOptions::default()
        };
        let library = normalizer().analyze(root, &options).unwrap();
        let arcade = library.system("arcade").unwrap();
        let pacman = arcade.game(Path::new("pacman.zip")).unwrap();
        assert_eq!(pacman.title, "Pac-Man");
        assert_eq!(pacman.metadata.developer.as_deref(), Some("Namco"));
        assert_eq!(pacman.metadata.crc.as_deref(), Some("79520fa1"));
        assert_eq!(arcade.game(Path::new("galaga.zip")).unwrap().title, "galaga");

        let plain = AnalyzeOptions {
            metadata: DatMetadataOptions::default(),
            ..options
        };
        let library = normalizer().analyze(root, &plain).unwrap();
        let arcade = library.system("arcade").unwrap();
        assert_eq!(arcade.game(Path::new("pacman.zip")).unwrap().title, "pacman");
    }

    #[test]
    fn test_dedup_rom_paths() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("roms/snes/images")).unwrap();
        fs::write(root.join("roms/snes/Mario.zip"), b"rom").unwrap();
        fs::write(root.join("roms/snes/images/Mario.png"), b"png").unwrap();
        fs::write(
            root.join("roms/snes/gamelist.xml"),
            "<gameList><game><path>./Mario.zip</path><name>Mario</name></game>\
             <game><path>./Mario.zip</path><name>Mario again</name></game></gameList>",
        )
        .unwrap();

        let descriptor = EcosystemRegistry::builtin().get("es_classic").unwrap();
        let library = normalizer().load_library(root, descriptor, 1.0).unwrap();
        let snes = library.system("snes").unwrap();
        assert_eq!(snes.games.len(), 1);
        assert_eq!(snes.games[0].title, "Mario");
        assert!(snes.games[0].assets.contains_key(&AssetType::BoxFront));
        assert!(library.issues.iter().any(|i| i.message.contains("duplicate")));
    }
}
