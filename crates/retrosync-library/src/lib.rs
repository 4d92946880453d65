//! Library model and loaders for RetroSync
//!
//! Detects which front-end ecosystem a folder tree belongs to, loads its metadata
//! containers into the canonical [`Library`] model, and ties media files to games.

pub mod dat_metadata;
pub mod detector;
pub mod hashing;
pub mod loaders;
pub mod metadata;
pub mod model;
pub mod normalizer;
pub mod paths;
pub mod progress;
pub mod resolver;
pub mod scanner;
pub mod verifier;

pub use dat_metadata::{DatGame, DatIndex, DatMetadataOptions, DatRom, EnrichSummary, MetadataEnricher};
pub use detector::{DetectionCandidate, DetectionReport, Detector, TreeSnapshot};
pub use hashing::{FileHashes, hash_file};
pub use loaders::{Loader, SystemSource, loader_for};
pub use metadata::GameMetadata;
pub use model::{
    Asset, AssociationMethod, Game, IssueSeverity, Library, LoaderIssue, StableKey, System,
    Verification,
};
pub use normalizer::{AnalyzeOptions, LoadedSystem, Normalizer};
pub use progress::{CancelToken, ItemCounter, LogProgress, NullProgress, ProgressEvent, ProgressSink, Stage};
pub use resolver::{AssetResolver, FolderIndex, slugify};
pub use scanner::{RomScanner, ScanConfig};
pub use verifier::{VerifySummary, verify_assets};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Source root unreadable: {0}")]
    SourceUnreadable(PathBuf),

    #[error(
        "Ecosystem detection ambiguous (best {best:?} at {confidence:.2}, threshold {threshold:.2}, tied with {tied:?})"
    )]
    DetectionAmbiguous {
        best: Option<String>,
        confidence: f32,
        threshold: f32,
        tied: Vec<String>,
    },

    #[error("Unknown ecosystem: {0}")]
    UnknownEcosystem(String),

    #[error("Failed to parse {path} for system {system}: {message}")]
    LoaderParse {
        system: String,
        path: PathBuf,
        message: String,
    },

    #[error("Scan error: {0}")]
    ScanError(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Failed to read DAT {path}: {message}")]
    DatParse { path: PathBuf, message: String },

    #[error("Worker pool error: {0}")]
    Worker(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
