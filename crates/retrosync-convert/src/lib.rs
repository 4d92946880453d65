//! Conversion of canonical libraries into target ecosystems
//!
//! The [`ConversionEngine`] plans every system of a [`retrosync_library::Library`]
//! against a target descriptor, copies ROMs and media, merges with an existing target
//! container when asked, and hands the final records to the target's [`Writer`].

pub mod conflict;
pub mod dat;
pub mod engine;
pub mod report;
pub mod worker;
pub mod writers;

pub use conflict::{ConflictResolver, FieldDiff, MergeOutcome, MergeSet, Resolution};
pub use dat::{DatEntry, render_dat, write_dat};
pub use engine::{ConversionEngine, ConversionOptions};
pub use report::{
    ConflictRecord, ConversionReport, ReportTotals, SystemReport, SystemStatus, UnmappedPlatform,
};
pub use worker::{WorkerEvent, WorkerHandle, spawn_analysis, spawn_conversion, spawn_conversion_with};
pub use writers::{TargetSystem, Writer, WrittenGame, writer_for};

use retrosync_library::LibraryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Output root not writable: {path}: {message}")]
    OutputRootUnwritable { path: PathBuf, message: String },

    #[error("Unknown target ecosystem: {0}")]
    UnknownTarget(String),

    #[error("Failed to write {path}: {message}")]
    OutputWrite { path: PathBuf, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
