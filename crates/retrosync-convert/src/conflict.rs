//! Merge of incoming games into an existing target container
//!
//! Existing records are matched by ROM path first and by case-insensitive ROM file name
//! second. The file name fallback only reaches existing records that no incoming game
//! matches by path, and each existing record is matched once. Only the fields the target
//! container can represent take part in the comparison, so values a target cannot store
//! never cause a conflict.

use retrosync_config::{ConflictPolicy, EcosystemDescriptor, MetadataContainer, MetadataField};
use retrosync_library::Game;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// One differing field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub field: MetadataField,
    pub existing: Option<String>,
    pub incoming: Option<String>,
}

/// How an incoming game relates to the existing container
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    New,
    Identical,
    Conflicting(Vec<FieldDiff>),
}

/// Result of merging one incoming game
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub outcome: MergeOutcome,
    /// The incoming record was inserted or replaced the existing one
    pub incoming_applied: bool,
    /// ROM path of the record now in the container
    pub rom_path: PathBuf,
}

/// Comparable rendering of a field. Values are trimmed and numbers rounded the way
/// containers store them.
fn field_value(game: &Game, field: MetadataField) -> Option<String> {
    let m = &game.metadata;
    let text = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    match field {
        MetadataField::Title => Some(game.title.trim().to_string()),
        MetadataField::SortTitle => text(&m.sort_title),
        MetadataField::ReleaseDate => m.release_date.map(|d| d.format("%Y-%m-%d").to_string()),
        MetadataField::ReleaseYear => m.release_date.map(|d| d.format("%Y").to_string()),
        MetadataField::Genres => {
            let genres: Vec<&str> = m
                .genres
                .iter()
                .map(|g| g.trim())
                .filter(|g| !g.is_empty())
                .collect();
            (!genres.is_empty()).then(|| genres.join("; "))
        }
        MetadataField::Developer => text(&m.developer),
        MetadataField::Publisher => text(&m.publisher),
        MetadataField::Rating => m.rating.map(|r| format!("{r:.2}")),
        MetadataField::PlayCount => (m.play_count > 0).then(|| m.play_count.to_string()),
        MetadataField::LastPlayed => m
            .last_played
            .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
        MetadataField::Favorite => Some(m.favorite.to_string()),
        MetadataField::Hidden => Some(m.hidden.to_string()),
        MetadataField::Description => text(&m.description),
        MetadataField::Players => text(&m.players),
    }
}

/// Compares games and applies a [`ConflictPolicy`]
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    policy: ConflictPolicy,
    fields: Vec<MetadataField>,
}

impl ConflictResolver {
    /// Titles are compared unless the target derives them from file names
    pub fn new(policy: ConflictPolicy, target: &EcosystemDescriptor) -> Self {
        let mut fields = Vec::new();
        if target.container != MetadataContainer::FilenameOnly {
            fields.push(MetadataField::Title);
        }
        fields.extend(
            target
                .supported_fields
                .iter()
                .copied()
                .filter(|f| *f != MetadataField::Title),
        );
        Self { policy, fields }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Field-by-field differences over the comparable fields
    pub fn compare(&self, existing: &Game, incoming: &Game) -> Vec<FieldDiff> {
        self.fields
            .iter()
            .filter_map(|field| {
                let existing = field_value(existing, *field);
                let incoming = field_value(incoming, *field);
                (existing != incoming).then_some(FieldDiff {
                    field: *field,
                    existing,
                    incoming,
                })
            })
            .collect()
    }

    /// Record to keep for a conflicting pair, and whether it is the incoming one.
    /// When incoming wins its gaps are filled from the existing record.
    fn settle(&self, existing: &Game, incoming: Game) -> (Game, bool) {
        match self.policy {
            ConflictPolicy::OverwriteWithIncoming => {
                let mut winner = incoming;
                winner.metadata.merge(&existing.metadata);
                (winner, true)
            }
            ConflictPolicy::KeepExisting | ConflictPolicy::Manual => (existing.clone(), false),
        }
    }
}

/// Records of one target system, existing ones first, in container order
#[derive(Debug, Clone, Default)]
pub struct MergeSet {
    records: Vec<Game>,
    /// Per record: taken from the incoming library
    incoming: Vec<bool>,
    by_path: HashMap<PathBuf, usize>,
    /// File names of existing records only
    by_basename: HashMap<String, usize>,
    /// Existing records already matched, or reserved for an exact path match
    claimed: HashSet<usize>,
    changed: bool,
}

impl MergeSet {
    pub fn new(existing: Vec<Game>) -> Self {
        let mut set = MergeSet::default();
        for game in existing {
            let index = set.records.len();
            set.by_basename.entry(game.basename_key()).or_insert(index);
            set.push(game, false);
        }
        set
    }

    fn push(&mut self, game: Game, incoming: bool) {
        let index = self.records.len();
        self.by_path.entry(game.rom_path.clone()).or_insert(index);
        self.records.push(game);
        self.incoming.push(incoming);
    }

    /// Keep existing records that some incoming game names by exact path out of the
    /// file name fallback
    pub fn reserve_paths<'a>(&mut self, paths: impl IntoIterator<Item = &'a Path>) {
        for path in paths {
            if let Some(index) = self.by_path.get(path) {
                self.claimed.insert(*index);
            }
        }
    }

    fn find(&self, game: &Game) -> Option<usize> {
        if let Some(index) = self.by_path.get(&game.rom_path) {
            return Some(*index);
        }
        self.by_basename
            .get(&game.basename_key())
            .copied()
            .filter(|index| !self.claimed.contains(index))
    }

    /// Add an incoming game without looking for an existing record
    pub fn insert(&mut self, incoming: Game) -> Resolution {
        let rom_path = incoming.rom_path.clone();
        self.push(incoming, true);
        self.changed = true;
        Resolution {
            outcome: MergeOutcome::New,
            incoming_applied: true,
            rom_path,
        }
    }

    /// Merge one incoming game
    pub fn merge(&mut self, resolver: &ConflictResolver, incoming: Game) -> Resolution {
        let Some(index) = self.find(&incoming) else {
            return self.insert(incoming);
        };
        self.claimed.insert(index);

        let existing = &self.records[index];
        let differences = resolver.compare(existing, &incoming);
        if differences.is_empty() {
            return Resolution {
                outcome: MergeOutcome::Identical,
                incoming_applied: false,
                rom_path: existing.rom_path.clone(),
            };
        }

        let (record, applied) = resolver.settle(existing, incoming);
        let rom_path = record.rom_path.clone();
        if applied {
            self.records[index] = record;
            self.incoming[index] = true;
            self.changed = true;
        }
        Resolution {
            outcome: MergeOutcome::Conflicting(differences),
            incoming_applied: applied,
            rom_path,
        }
    }

    /// Whether the container content differs from the existing one
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Final records with a flag telling whether each came from the incoming library
    pub fn into_records(self) -> Vec<(Game, bool)> {
        self.records.into_iter().zip(self.incoming).collect()
    }
}
