//! Conversion of a canonical library into a target ecosystem
//!
//! Systems are converted one after another. Within a system the existing target
//! container is loaded first (when merging), then ROM and media copies fan out over the
//! worker pool, and the container is serialized once at the end. A failure is confined
//! to the system it happens in.

use crate::ConvertError;
use crate::conflict::{ConflictResolver, MergeOutcome, MergeSet};
use crate::dat::{DatEntry, write_dat};
use crate::report::{ConflictRecord, ConversionReport, SystemReport, SystemStatus, UnmappedPlatform};
use crate::writers::{TargetSystem, WrittenGame, writer_for};
use rayon::prelude::*;
use retrosync_config::{
    AssetType, ConflictPolicy, EcosystemDescriptor, EcosystemRegistry, EngineConfig,
    MetadataContainer, PlatformTable, SystemMapping,
};
use retrosync_library::paths::{lexical_normalize, sanitize_file_name};
use retrosync_library::{
    Asset, CancelToken, Game, ItemCounter, Library, LibraryError, Normalizer, NullProgress,
    ProgressSink, Stage, System, SystemSource,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-run conversion options
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    /// Plan and report without touching the output
    pub dry_run: bool,
    /// Replace existing files and containers
    pub overwrite: bool,
    /// Merge into an existing target container
    pub merge_metadata: bool,
    /// Write `dats/<label>.dat` per system
    pub export_dat: bool,
    pub copy_roms: bool,
    pub conflict_policy: ConflictPolicy,
    /// Target platform label per canonical system id (or source label)
    pub system_overrides: SystemMapping,
}

impl ConversionOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            dry_run: false,
            overwrite: false,
            merge_metadata: false,
            export_dat: false,
            copy_roms: config.conversion.copy_roms,
            conflict_policy: config.conversion.conflict_policy,
            system_overrides: SystemMapping::new(),
        }
    }
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyKind {
    Rom,
    Asset,
}

#[derive(Debug, Clone)]
struct CopyJob {
    kind: CopyKind,
    source: PathBuf,
    dest: PathBuf,
}

#[derive(Debug)]
enum CopyOutcome {
    Copied,
    /// Destination existed and overwrite was off
    Skipped,
    /// Cancelled before the copy started
    NotStarted,
    Failed { path: PathBuf, message: String },
}

/// Files to copy for one system, and where each game's media ends up
#[derive(Debug, Default)]
struct FilePlan {
    jobs: Vec<CopyJob>,
    /// Target asset paths by incoming ROM path
    assets: HashMap<PathBuf, BTreeMap<AssetType, PathBuf>>,
    dat: Vec<DatEntry>,
}

/// Media to place in a target slot: the same type first, then a substitute the target
/// has no slot of its own for
fn source_asset<'a>(game: &'a Game, target: &EcosystemDescriptor, asset_type: AssetType) -> Option<&'a Asset> {
    game.assets.get(&asset_type).or_else(|| {
        asset_type
            .substitutes()
            .iter()
            .filter(|substitute| target.slot(**substitute).is_none())
            .find_map(|substitute| game.assets.get(substitute))
    })
}

fn copy_file(job: &CopyJob, options: &ConversionOptions, cancel: &CancelToken) -> CopyOutcome {
    if cancel.is_cancelled() {
        return CopyOutcome::NotStarted;
    }
    if job.dest.exists() && !options.overwrite {
        return CopyOutcome::Skipped;
    }
    if lexical_normalize(&job.source) == lexical_normalize(&job.dest) {
        return CopyOutcome::Skipped;
    }
    if options.dry_run {
        return CopyOutcome::Copied;
    }

    let result = match job.dest.parent() {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
    .and_then(|_| std::fs::copy(&job.source, &job.dest));
    match result {
        Ok(_) => CopyOutcome::Copied,
        Err(e) => CopyOutcome::Failed {
            path: job.dest.clone(),
            message: e.to_string(),
        },
    }
}

/// Absolute, lexically normalised form of a path
fn absolute(path: &Path) -> PathBuf {
    lexical_normalize(&std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()))
}

/// Converts libraries into target ecosystems
pub struct ConversionEngine {
    registry: &'static EcosystemRegistry,
    platforms: &'static PlatformTable,
    /// Reads existing target containers when merging
    normalizer: Normalizer,
    pool: rayon::ThreadPool,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
}

impl ConversionEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, ConvertError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker.threads)
            .thread_name(|i| format!("retrosync-copy-{i}"))
            .build()
            .map_err(|e| LibraryError::Worker(e.to_string()))?;

        Ok(Self {
            registry: EcosystemRegistry::builtin(),
            platforms: PlatformTable::builtin(),
            normalizer: Normalizer::new(config)?,
            pool,
            progress: Arc::new(NullProgress),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.normalizer = self.normalizer.with_progress(Arc::clone(&progress));
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.normalizer = self.normalizer.with_cancel(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Convert every system of `library` into the `target_id` ecosystem under
    /// `output_root`. Only an unknown target or an unusable output root fail the whole
    /// run; everything else is recorded per system in the report.
    pub fn convert(
        &self,
        library: &Library,
        target_id: &str,
        output_root: &Path,
        options: &ConversionOptions,
    ) -> Result<ConversionReport, ConvertError> {
        let target = self
            .registry
            .get(target_id)
            .ok_or_else(|| ConvertError::UnknownTarget(target_id.to_string()))?;

        let mut report = ConversionReport::new(target.id, output_root.to_path_buf(), options.dry_run);
        report.preflight_warnings = self.preflight(library, output_root, options)?;
        for warning in &report.preflight_warnings {
            warn!("{warning}");
            self.progress.warning(warning.clone());
        }

        info!(
            "Converting {} systems from {} to {} into {}{}",
            library.systems.len(),
            library.source_ecosystem,
            target.name,
            output_root.display(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        for system in &library.systems {
            let system_report = if self.cancel.is_cancelled() {
                let mut cancelled = SystemReport::new(&system.system_id, &system.source_platform_label);
                cancelled.status = SystemStatus::Cancelled;
                cancelled
            } else {
                self.convert_system(system, target, output_root, options, &mut report)
            };
            report.systems.push(system_report);
        }

        report.finish();
        info!(
            "Converted {} games in {} systems ({} failed, {} unmapped)",
            report.totals.games_converted,
            report.totals.systems,
            report.totals.failed_systems,
            report.unmapped.len()
        );
        Ok(report)
    }

    /// Check the output root and look for source and output overlapping
    fn preflight(
        &self,
        library: &Library,
        output_root: &Path,
        options: &ConversionOptions,
    ) -> Result<Vec<String>, ConvertError> {
        let unwritable = |message: String| ConvertError::OutputRootUnwritable {
            path: output_root.to_path_buf(),
            message,
        };
        if output_root.exists() && !output_root.is_dir() {
            return Err(unwritable("not a directory".to_string()));
        }
        if !options.dry_run {
            std::fs::create_dir_all(output_root).map_err(|e| unwritable(e.to_string()))?;
            tempfile::NamedTempFile::new_in(output_root).map_err(|e| unwritable(e.to_string()))?;
        }

        let mut warnings = Vec::new();
        let output = absolute(output_root);
        let source = absolute(&library.source_root);
        if output == source {
            warnings.push(format!(
                "Output root {} is the source root; source files may be replaced",
                output.display()
            ));
        } else if output.starts_with(&source) {
            warnings.push(format!(
                "Output root {} is inside the source root {}; a later analysis will see the converted files",
                output.display(),
                source.display()
            ));
        } else if source.starts_with(&output) {
            warnings.push(format!(
                "Source root {} is inside the output root {}",
                source.display(),
                output.display()
            ));
        }
        Ok(warnings)
    }

    /// Target platform label: explicit override, then the label chosen on the system,
    /// then the platform table. Systems that need mapping only take the first two.
    fn target_label(&self, system: &System, target: &EcosystemDescriptor, options: &ConversionOptions) -> Option<String> {
        let chosen = options
            .system_overrides
            .get(&system.system_id)
            .or_else(|| options.system_overrides.get(&system.source_platform_label))
            .or(system.target_label.as_ref())
            .map(|label| label.trim())
            .filter(|label| !label.is_empty());
        if let Some(label) = chosen {
            return Some(label.to_string());
        }
        if system.needs_mapping {
            return None;
        }
        self.platforms
            .label_for(&system.system_id, target.label_family)
            .map(str::to_string)
    }

    fn convert_system(
        &self,
        system: &System,
        target: &'static EcosystemDescriptor,
        output_root: &Path,
        options: &ConversionOptions,
        report: &mut ConversionReport,
    ) -> SystemReport {
        let mut summary = SystemReport::new(&system.system_id, &system.source_platform_label);

        let Some(label) = self.target_label(system, target, options) else {
            let message = format!(
                "No {} platform label for system '{}' (source label '{}'); map it with --map {}=<label>",
                target.name, system.system_id, system.source_platform_label, system.system_id
            );
            warn!("{message}");
            self.progress.warning(message.clone());
            report.unmapped.push(UnmappedPlatform {
                system_id: system.system_id.clone(),
                source_label: system.source_platform_label.clone(),
                message: message.clone(),
            });
            summary.status = SystemStatus::Unmapped;
            summary.error = Some(message);
            return summary;
        };

        summary.target_label = Some(label.clone());
        let target_system = TargetSystem::new(
            target,
            output_root,
            &system.system_id,
            &label,
            &system.display_name,
        );
        summary.container = target_system.container_path.clone();

        match self.run_system(system, &target_system, options, report, &mut summary) {
            Ok(()) => {
                info!(
                    "{} -> {}: {} games, {} ROMs and {} assets copied",
                    system.system_id,
                    label,
                    summary.games_converted,
                    summary.roms_copied,
                    summary.assets_copied
                );
            }
            Err(ConvertError::Cancelled | ConvertError::Library(LibraryError::Cancelled)) => {
                warn!("{}: cancelled, container left untouched", system.system_id);
                summary.status = SystemStatus::Cancelled;
            }
            Err(e) => {
                let message = format!("{}: {}", system.system_id, e);
                error!("{message}");
                self.progress.error(message);
                summary.status = SystemStatus::Failed;
                summary.error = Some(e.to_string());
            }
        }
        summary
    }

    fn run_system(
        &self,
        system: &System,
        target: &TargetSystem,
        options: &ConversionOptions,
        report: &mut ConversionReport,
        summary: &mut SystemReport,
    ) -> Result<(), ConvertError> {
        let games: Vec<&Game> = system.selected_games().collect();
        summary.games_unselected = system.games.len() - games.len();

        let container_exists = target.container_exists();
        // file-name-only targets keep their records as the ROM files themselves
        let existing_roms = target.descriptor.container == MetadataContainer::FilenameOnly
            && target.rom_dir.is_dir();
        let existing = if options.merge_metadata && (container_exists || existing_roms) {
            self.progress
                .stage(Stage::Loading, &format!("existing {} container", target.label));
            let source = SystemSource::new(
                &target.label,
                &target.content_root,
                target.rom_dir.clone(),
                target.container_path.clone(),
            );
            let loaded = self.normalizer.load_system(target.descriptor, &source)?;
            for warning in &loaded.warnings {
                debug!("{}: {}", target.label, warning);
            }
            loaded.system.games
        } else {
            Vec::new()
        };

        let write_container = match &target.container_path {
            None => false,
            Some(path) if container_exists && !options.merge_metadata && !options.overwrite => {
                summary.warn(format!(
                    "{} exists; use --overwrite or --merge-metadata to update it",
                    path.display()
                ));
                false
            }
            Some(_) => true,
        };

        self.progress.stage(Stage::Merging, &target.label);
        let resolver = ConflictResolver::new(options.conflict_policy, target.descriptor);
        let mut merge = MergeSet::new(existing);
        merge.reserve_paths(games.iter().map(|game| game.rom_path.as_path()));
        // record ROM path -> incoming ROM path, for placing copied media
        let mut record_sources: HashMap<PathBuf, PathBuf> = HashMap::new();
        for game in &games {
            if self.cancel.is_cancelled() {
                return Err(ConvertError::Cancelled);
            }
            let resolution = if options.merge_metadata {
                merge.merge(&resolver, (*game).clone())
            } else {
                merge.insert((*game).clone())
            };
            match resolution.outcome {
                MergeOutcome::New => summary.games_new += 1,
                MergeOutcome::Identical => summary.games_identical += 1,
                MergeOutcome::Conflicting(differences) => {
                    summary.games_conflicting += 1;
                    report.conflicts.push(ConflictRecord {
                        system_id: system.system_id.clone(),
                        rom_path: game.rom_path.clone(),
                        title: game.title.clone(),
                        policy: resolver.policy(),
                        incoming_applied: resolution.incoming_applied,
                        differences,
                    });
                }
            }
            record_sources.insert(resolution.rom_path, game.rom_path.clone());
        }
        summary.games_converted = games.len();

        let plan = self.plan_files(system, &games, target, options, summary);
        if !options.dry_run {
            let mut skeleton = vec![target.rom_dir.clone()];
            skeleton.extend(
                target
                    .container_path
                    .as_deref()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf),
            );
            for dir in skeleton {
                std::fs::create_dir_all(&dir).map_err(|e| ConvertError::OutputWrite {
                    path: dir.clone(),
                    message: e.to_string(),
                })?;
            }
        }

        self.progress.stage(
            Stage::Copying,
            &format!("{} files for {}", plan.jobs.len(), target.label),
        );
        let outcomes = self.run_copies(&plan.jobs, options);
        let mut failure = None;
        for (job, outcome) in plan.jobs.iter().zip(outcomes) {
            match (job.kind, outcome) {
                (CopyKind::Rom, CopyOutcome::Copied) => summary.roms_copied += 1,
                (CopyKind::Rom, CopyOutcome::Skipped) => summary.roms_skipped += 1,
                (CopyKind::Asset, CopyOutcome::Copied) => summary.assets_copied += 1,
                (CopyKind::Asset, CopyOutcome::Skipped) => summary.assets_skipped += 1,
                (_, CopyOutcome::NotStarted) => {}
                (_, CopyOutcome::Failed { path, message }) => {
                    error!("Copy to {} failed: {}", path.display(), message);
                    if failure.is_none() {
                        failure = Some(ConvertError::OutputWrite { path, message });
                    }
                }
            }
        }
        if self.cancel.is_cancelled() {
            return Err(ConvertError::Cancelled);
        }
        if let Some(e) = failure {
            return Err(e);
        }

        if write_container {
            if container_exists && options.merge_metadata && !merge.is_changed() {
                info!("{}: existing container already up to date", target.label);
            } else {
                let records: Vec<WrittenGame> = merge
                    .into_records()
                    .into_iter()
                    .map(|(game, incoming)| {
                        let mut assets: BTreeMap<AssetType, PathBuf> = if incoming {
                            BTreeMap::new()
                        } else {
                            game.assets
                                .iter()
                                .map(|(asset_type, asset)| (*asset_type, asset.file_path.clone()))
                                .collect()
                        };
                        if let Some(planned) = record_sources
                            .get(&game.rom_path)
                            .and_then(|rom| plan.assets.get(rom))
                        {
                            assets.extend(planned.iter().map(|(t, p)| (*t, p.clone())));
                        }
                        WrittenGame {
                            rom: target.rom_destination(&game),
                            game,
                            assets,
                        }
                    })
                    .collect();

                self.progress.stage(
                    Stage::Writing,
                    &format!("{} records for {}", records.len(), target.label),
                );
                if !options.dry_run {
                    writer_for(target.descriptor.container).write(target, &records)?;
                }
                summary.container_written = true;
            }
        }

        if options.export_dat && !plan.dat.is_empty() {
            let dest = target
                .content_root
                .join("dats")
                .join(format!("{}.dat", sanitize_file_name(&target.label)));
            if options.dry_run {
                summary.dat = Some(dest);
            } else {
                match write_dat(&dest, &target.label, &target.display_name, &plan.dat) {
                    Ok(()) => summary.dat = Some(dest),
                    Err(e) => summary.warn(format!("DAT export to {} failed: {e}", dest.display())),
                }
            }
        }

        Ok(())
    }

    /// Plan ROM and media copies. A destination is never planned twice.
    fn plan_files(
        &self,
        system: &System,
        games: &[&Game],
        target: &TargetSystem,
        options: &ConversionOptions,
        summary: &mut SystemReport,
    ) -> FilePlan {
        let mut plan = FilePlan::default();
        let mut planned: HashSet<PathBuf> = HashSet::new();
        let mut missing: HashSet<PathBuf> = HashSet::new();

        for game in games {
            let rom_source = system.rom_file(game);
            let rom_dest = target.rom_destination(game);
            if options.copy_roms {
                if !rom_source.is_file() {
                    summary.roms_missing += 1;
                    summary.warn(format!("ROM not found: {}", rom_source.display()));
                } else if planned.insert(rom_dest.clone()) {
                    plan.jobs.push(CopyJob {
                        kind: CopyKind::Rom,
                        source: rom_source.clone(),
                        dest: rom_dest.clone(),
                    });
                } else {
                    summary.warn(format!("{} is already planned; duplicate skipped", rom_dest.display()));
                }
            }
            if options.export_dat {
                plan.dat.push(DatEntry::new(
                    if options.copy_roms { rom_dest } else { rom_source },
                    game.title.clone(),
                ));
            }

            let mut assets = BTreeMap::new();
            for slot in target.descriptor.asset_slots {
                let Some(asset) = source_asset(game, target.descriptor, slot.asset_type) else {
                    continue;
                };
                if !asset.file_path.is_file() {
                    if missing.insert(asset.file_path.clone()) {
                        summary.assets_missing += 1;
                        debug!("Asset not found: {}", asset.file_path.display());
                    }
                    continue;
                }
                let dest = target.asset_destination(slot, game, &asset.format);
                if !planned.insert(dest.clone()) {
                    debug!("{} is already planned; {} skipped", dest.display(), game.title);
                    continue;
                }
                plan.jobs.push(CopyJob {
                    kind: CopyKind::Asset,
                    source: asset.file_path.clone(),
                    dest: dest.clone(),
                });
                assets.insert(slot.asset_type, dest);
            }
            plan.assets.insert(game.rom_path.clone(), assets);
        }
        plan
    }

    fn run_copies(&self, jobs: &[CopyJob], options: &ConversionOptions) -> Vec<CopyOutcome> {
        let counter = ItemCounter::new(jobs.len());
        self.pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let outcome = copy_file(job, options, &self.cancel);
                    counter.tick(self.progress.as_ref());
                    outcome
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrosync_library::AssociationMethod;

    fn engine() -> ConversionEngine {
        let mut config = EngineConfig::default();
        config.worker.threads = 2;
        ConversionEngine::new(&config).unwrap()
    }

    fn system(id: &str, label: &str, needs_mapping: bool) -> System {
        System {
            system_id: id.to_string(),
            display_name: id.to_string(),
            source_platform_label: label.to_string(),
            rom_root: PathBuf::from("/src/roms").join(label),
            asset_roots: BTreeMap::new(),
            container_path: None,
            needs_mapping,
            target_label: None,
            games: Vec::new(),
        }
    }

    #[test]
    fn test_target_label_precedence() {
        let engine = engine();
        let launchbox = EcosystemRegistry::builtin().get("launchbox").unwrap();
        let mut options = ConversionOptions::default();

        let snes = system("snes", "snes", false);
        assert_eq!(
            engine.target_label(&snes, launchbox, &options).as_deref(),
            Some("Super Nintendo Entertainment System")
        );

        options
            .system_overrides
            .insert("snes".to_string(), "SNES (Custom)".to_string());
        assert_eq!(
            engine.target_label(&snes, launchbox, &options).as_deref(),
            Some("SNES (Custom)")
        );

        let weird = system("weirdbox", "weirdbox", true);
        assert_eq!(engine.target_label(&weird, launchbox, &options), None);
        options
            .system_overrides
            .insert("weirdbox".to_string(), "Weird Box".to_string());
        assert_eq!(
            engine.target_label(&weird, launchbox, &options).as_deref(),
            Some("Weird Box")
        );
    }

    #[test]
    fn test_substitute_only_without_own_slot() {
        let es_de = EcosystemRegistry::builtin().get("es_de").unwrap();
        let retroarch = EcosystemRegistry::builtin().get("retroarch").unwrap();
        let mut game = Game::new("snes", PathBuf::from("a.sfc"), "A");
        game.attach_asset(Asset::new(
            AssetType::BoxFront,
            PathBuf::from("/m/a.png"),
            AssociationMethod::FilenameMirror,
        ));
        game.attach_asset(Asset::new(
            AssetType::Wheel,
            PathBuf::from("/m/a-wheel.png"),
            AssociationMethod::FilenameMirror,
        ));

        // ES-DE has its own miximage slot, so box art is not duplicated into it
        assert!(source_asset(&game, es_de, AssetType::Miximage).is_none());
        // RetroArch has no wheel slot; the wheel stands in for the logo
        let logo = source_asset(&game, retroarch, AssetType::Logo).unwrap();
        assert_eq!(logo.asset_type, AssetType::Wheel);
    }

    #[test]
    fn test_unknown_target() {
        let library = Library {
            source_root: PathBuf::from("/src"),
            source_ecosystem: "es_classic".to_string(),
            detection_confidence: 1.0,
            systems: Vec::new(),
            issues: Vec::new(),
        };
        let err = engine()
            .convert(&library, "nope", Path::new("/out"), &ConversionOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnknownTarget(ref id) if id == "nope"));
    }
}
