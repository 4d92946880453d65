//! RetroSync command line
//!
//! Detects the front-end ecosystem of a source tree, loads it into the canonical
//! library model and converts it into another ecosystem's layout.
//!
//! ```bash
//! retrosync --source /media/es --target launchbox --output /media/lb --dry-run
//! retrosync --source /media/es --target es_de --output /media/esde --merge-metadata \
//!     --map "weirdbox=Weird Box"
//! ```
//!
//! The JSON report goes to stdout (or `--report`), the log to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use retrosync_config::{
    ConflictPolicy, EcosystemRegistry, EngineConfig, SystemMapping, SystemMappingStore,
    suggest_mapping,
};
use retrosync_convert::{ConversionOptions, ConversionReport, ConvertError, spawn_analysis, spawn_conversion};
use retrosync_library::{
    AnalyzeOptions, Detector, Library, LibraryError, LogProgress, ProgressSink,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

/// Process exit codes
mod exit {
    pub const SUCCESS: u8 = 0;
    pub const DETECTION_AMBIGUOUS: u8 = 1;
    pub const SYSTEMS_FAILED: u8 = 2;
    pub const FATAL: u8 = 3;
}

/// Convert retro game libraries between front-end ecosystems
#[derive(Parser, Debug)]
#[command(name = "retrosync")]
#[command(version)]
struct Cli {
    /// Root of the library to read
    #[arg(long)]
    source: PathBuf,

    /// Target ecosystem id (es_classic, es_de, launchbox, retroarch, ...)
    #[arg(long, required_unless_present = "detect_only")]
    target: Option<String>,

    /// Root of the converted library
    #[arg(long, required_unless_present = "detect_only")]
    output: Option<PathBuf>,

    /// Plan and report without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Replace existing files and containers
    #[arg(long)]
    overwrite: bool,

    /// Merge into existing target containers
    #[arg(long)]
    merge_metadata: bool,

    /// Write a DAT file per system
    #[arg(long)]
    export_dat: bool,

    /// Skip detection and read the source as this ecosystem
    #[arg(long, value_name = "ID")]
    force_ecosystem: Option<String>,

    /// How merges settle differing records
    #[arg(long, value_name = "POLICY")]
    conflict_policy: Option<ConflictPolicy>,

    /// Target platform label for a source system, as SOURCE_ID=LABEL. Remembered per output root.
    #[arg(long = "map", value_name = "SOURCE_ID=LABEL", value_parser = parse_mapping)]
    mappings: Vec<(String, String)>,

    /// Folder of DAT files used to fill missing titles, years and publishers
    #[arg(long, value_name = "DIR")]
    metadata_root: Option<PathBuf>,

    /// DAT file for one system, as SYSTEM_ID=FILE
    #[arg(long = "dat", value_name = "SYSTEM_ID=FILE", value_parser = parse_dat_override)]
    dats: Vec<(String, PathBuf)>,

    /// Hash ROMs whose file name matches no DAT entry
    #[arg(long)]
    hash_roms: bool,

    /// Reference ROMs in place instead of copying them
    #[arg(long)]
    no_roms: bool,

    /// Engine configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the JSON report to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Only run ecosystem detection and print the ranking
    #[arg(long)]
    detect_only: bool,
}

fn parse_mapping(value: &str) -> Result<(String, String), String> {
    let (source, label) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE_ID=LABEL, got '{value}'"))?;
    let (source, label) = (source.trim(), label.trim());
    if source.is_empty() || label.is_empty() {
        return Err(format!("expected SOURCE_ID=LABEL, got '{value}'"));
    }
    Ok((source.to_string(), label.to_string()))
}

fn parse_dat_override(value: &str) -> Result<(String, PathBuf), String> {
    let (system, file) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SYSTEM_ID=FILE, got '{value}'"))?;
    let (system, file) = (system.trim(), file.trim());
    if system.is_empty() || file.is_empty() {
        return Err(format!("expected SYSTEM_ID=FILE, got '{value}'"));
    }
    Ok((system.to_string(), PathBuf::from(file)))
}

/// Help and version requests succeed; any other usage error is fatal
fn usage_exit_code(e: &clap::Error) -> u8 {
    match e.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => exit::SUCCESS,
        _ => exit::FATAL,
    }
}

/// Setup logging to stderr
fn setup_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => EngineConfig::load_default().context("Failed to load default configuration"),
    }
}

fn write_output(report_path: Option<&Path>, json: &str) -> Result<()> {
    match report_path {
        Some(path) => std::fs::write(path, format!("{json}\n"))
            .with_context(|| format!("Failed to write report to {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

/// Rank the ecosystems for `--detect-only`
fn detect_only(cli: &Cli, config: &EngineConfig) -> Result<u8> {
    let report = Detector::new(EcosystemRegistry::builtin(), &config.detection).detect(&cli.source);
    let threshold = config.detection.confidence_threshold;

    let candidates: Vec<serde_json::Value> = report
        .candidates
        .iter()
        .filter(|c| c.confidence > 0.0)
        .map(|c| {
            serde_json::json!({
                "ecosystem": c.id(),
                "name": c.descriptor.name,
                "confidence": c.confidence,
                "matched": c.matched,
            })
        })
        .collect();
    let chosen = report.choose(threshold).map(|c| c.id()).ok();
    let json = serde_json::to_string_pretty(&serde_json::json!({
        "source": cli.source,
        "threshold": threshold,
        "detected": chosen,
        "candidates": candidates,
    }))?;
    write_output(cli.report.as_deref(), &json)?;

    match chosen {
        Some(id) => {
            info!("Detected {id}");
            Ok(exit::SUCCESS)
        }
        None => {
            warn!("No ecosystem reached the confidence threshold {threshold:.2}");
            Ok(exit::DETECTION_AMBIGUOUS)
        }
    }
}

/// Mapping for this run: stored choices, overridden by `--map`
fn system_mapping(cli: &Cli, output: &Path, target: &str) -> Result<SystemMapping> {
    let store = SystemMappingStore::new(output);
    let mut mapping = store.load(target);
    if cli.mappings.is_empty() {
        return Ok(mapping);
    }

    mapping.extend(cli.mappings.iter().cloned());
    if cli.dry_run {
        info!("Dry run: mapping not saved to {}", store.path().display());
    } else {
        store
            .save(target, &mapping)
            .with_context(|| format!("Failed to save system mapping to {}", store.path().display()))?;
    }
    Ok(mapping)
}

/// Log `--map` hints for systems that still have no label, using platform names
/// already present in the output
fn hint_unmapped(library: &Library, target: &str, output: &Path, mapping: &SystemMapping) {
    let Some(descriptor) = EcosystemRegistry::builtin().get(target) else {
        return;
    };
    let unmapped: Vec<String> = library
        .unmapped_systems()
        .filter(|s| !mapping.contains_key(&s.system_id))
        .map(|s| s.system_id.clone())
        .collect();
    if unmapped.is_empty() {
        return;
    }

    let existing = descriptor.existing_platforms(output);
    let suggestions = suggest_mapping(&unmapped, &existing, mapping);
    for system_id in &unmapped {
        match suggestions.get(system_id) {
            Some(label) => warn!("{system_id} has no {} label; try --map {system_id}={label}", descriptor.name),
            None => warn!("{system_id} has no {} label; set one with --map {system_id}=<label>", descriptor.name),
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let config = load_config(cli.config.as_deref())?;
    if cli.detect_only {
        return detect_only(&cli, &config);
    }

    let (Some(target), Some(output)) = (cli.target.clone(), cli.output.clone()) else {
        anyhow::bail!("--target and --output are required");
    };
    if EcosystemRegistry::builtin().get(&target).is_none() {
        anyhow::bail!(
            "Unknown target ecosystem '{target}' (known: {})",
            EcosystemRegistry::builtin().ids().join(", ")
        );
    }

    let progress = LogProgress;
    let mut analyze_options = AnalyzeOptions {
        forced_ecosystem: cli.force_ecosystem.clone(),
        ..AnalyzeOptions::from_config(&config)
    };
    if let Some(root) = &cli.metadata_root {
        analyze_options.metadata.metadata_root = Some(root.clone());
    }
    analyze_options.metadata.compute_missing_hashes |= cli.hash_roms;
    analyze_options.metadata.overrides.extend(cli.dats.iter().cloned());
    let analysis = spawn_analysis(&config, cli.source.clone(), analyze_options)
        .context("Failed to start analysis")?;
    let library = match analysis.wait_with(|event| progress.emit(event)) {
        Some(Ok(library)) => library,
        Some(Err(ConvertError::Library(e @ LibraryError::DetectionAmbiguous { .. }))) => {
            error!("{e}");
            error!("Use --force-ecosystem <id> to read the source anyway");
            return Ok(exit::DETECTION_AMBIGUOUS);
        }
        Some(Err(e)) => {
            return Err(e).with_context(|| format!("Failed to analyse {}", cli.source.display()));
        }
        None => anyhow::bail!("Analysis worker stopped without a result"),
    };
    for issue in &library.issues {
        warn!("{}: {}", issue.system_label, issue.message);
    }

    let mapping = system_mapping(&cli, &output, &target)?;
    hint_unmapped(&library, &target, &output, &mapping);

    let mut options = ConversionOptions::from_config(&config);
    options.dry_run = cli.dry_run;
    options.overwrite = cli.overwrite;
    options.merge_metadata = cli.merge_metadata;
    options.export_dat = cli.export_dat;
    options.copy_roms = options.copy_roms && !cli.no_roms;
    options.system_overrides = mapping;
    if let Some(policy) = cli.conflict_policy {
        options.conflict_policy = policy;
    }

    let conversion = spawn_conversion(&config, library, target, output, options)
        .context("Failed to start conversion")?;
    let report: ConversionReport = match conversion.wait_with(|event| progress.emit(event)) {
        Some(result) => result.context("Conversion failed")?,
        None => anyhow::bail!("Conversion worker stopped without a result"),
    };

    write_output(cli.report.as_deref(), &report.to_json()?)?;
    if report.has_failures() {
        Ok(exit::SYSTEMS_FAILED)
    } else {
        Ok(exit::SUCCESS)
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(&e));
        }
    };
    setup_logging();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit::FATAL)
        }
    }
}
