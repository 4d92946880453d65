//! Machine-readable conversion report

use crate::conflict::FieldDiff;
use retrosync_config::ConflictPolicy;
use serde::Serialize;
use std::path::PathBuf;

/// Final state of one system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Converted,
    /// No target label; nothing was written for this system
    Unmapped,
    /// A write failed; the container was not replaced
    Failed,
    Cancelled,
}

/// Counts for one system
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemReport {
    pub system_id: String,
    pub source_label: String,
    pub target_label: Option<String>,
    pub status: SystemStatus,
    /// Selected games whose record ends up in the target container
    pub games_converted: usize,
    /// Games left out by the selection
    pub games_unselected: usize,
    pub games_new: usize,
    pub games_identical: usize,
    pub games_conflicting: usize,
    pub roms_copied: usize,
    /// Destination existed and overwrite was off
    pub roms_skipped: usize,
    pub roms_missing: usize,
    pub assets_copied: usize,
    pub assets_skipped: usize,
    /// Source assets that were gone at conversion time
    pub assets_missing: usize,
    pub container: Option<PathBuf>,
    pub container_written: bool,
    pub dat: Option<PathBuf>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl SystemReport {
    pub fn new(system_id: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            source_label: source_label.into(),
            target_label: None,
            status: SystemStatus::Converted,
            games_converted: 0,
            games_unselected: 0,
            games_new: 0,
            games_identical: 0,
            games_conflicting: 0,
            roms_copied: 0,
            roms_skipped: 0,
            roms_missing: 0,
            assets_copied: 0,
            assets_skipped: 0,
            assets_missing: 0,
            container: None,
            container_written: false,
            dat: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}: {}", self.system_id, message);
        self.warnings.push(message);
    }
}

/// A system that could not be mapped to a target platform label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmappedPlatform {
    pub system_id: String,
    pub source_label: String,
    pub message: String,
}

/// One merge conflict and how it was settled
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictRecord {
    pub system_id: String,
    pub rom_path: PathBuf,
    pub title: String,
    pub policy: ConflictPolicy,
    /// True when the incoming record replaced the existing one
    pub incoming_applied: bool,
    pub differences: Vec<FieldDiff>,
}

/// Summary counts over all systems
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub systems: usize,
    pub games_converted: usize,
    pub games_new: usize,
    pub games_identical: usize,
    pub games_conflicting: usize,
    pub roms_copied: usize,
    pub assets_copied: usize,
    pub failed_systems: usize,
}

/// Outcome of a conversion run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    pub target: String,
    pub output_root: PathBuf,
    pub dry_run: bool,
    pub preflight_warnings: Vec<String>,
    pub systems: Vec<SystemReport>,
    pub unmapped: Vec<UnmappedPlatform>,
    pub conflicts: Vec<ConflictRecord>,
    pub totals: ReportTotals,
}

impl ConversionReport {
    pub fn new(target: impl Into<String>, output_root: PathBuf, dry_run: bool) -> Self {
        Self {
            target: target.into(),
            output_root,
            dry_run,
            preflight_warnings: Vec::new(),
            systems: Vec::new(),
            unmapped: Vec::new(),
            conflicts: Vec::new(),
            totals: ReportTotals::default(),
        }
    }

    pub fn system(&self, system_id: &str) -> Option<&SystemReport> {
        self.systems.iter().find(|s| s.system_id == system_id)
    }

    /// Recompute [`ReportTotals`] from the per-system entries
    pub fn finish(&mut self) {
        let mut totals = ReportTotals {
            systems: self.systems.len(),
            ..ReportTotals::default()
        };
        for system in &self.systems {
            totals.games_converted += system.games_converted;
            totals.games_new += system.games_new;
            totals.games_identical += system.games_identical;
            totals.games_conflicting += system.games_conflicting;
            totals.roms_copied += system.roms_copied;
            totals.assets_copied += system.assets_copied;
            if system.status == SystemStatus::Failed {
                totals.failed_systems += 1;
            }
        }
        self.totals = totals;
    }

    /// True when any system was left unconverted
    pub fn has_failures(&self) -> bool {
        self.systems
            .iter()
            .any(|s| matches!(s.status, SystemStatus::Failed | SystemStatus::Unmapped))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
