//! Ecosystem detection
//!
//! The tree below a root is snapshotted once with a bounded-depth walk and every
//! descriptor's fingerprint rules are evaluated against that snapshot. Scores are the
//! matched share of each descriptor's rule weight, then re-normalised across descriptors:
//! a unique marker lifts a descriptor to at least 0.8, competing unique markers from
//! unrelated families split the confidence between them.

use crate::LibraryError;
use retrosync_config::{
    DetectionConfig, EcosystemDescriptor, EcosystemRegistry, FingerprintRule, RuleKind, Tier,
};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Bytes read from a file when checking a content signature
const SIGNATURE_PROBE_BYTES: u64 = 8 * 1024;

/// Files opened per content-signature rule
const SIGNATURE_PROBE_FILES: usize = 16;

#[derive(Debug, Clone)]
struct SnapshotEntry {
    /// Lowercase, `/`-separated, relative to the root
    key: String,
    path: PathBuf,
    is_dir: bool,
}

/// Bounded view of a directory tree
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    entries: Vec<SnapshotEntry>,
    keys: HashSet<String>,
    truncated: bool,
}

impl TreeSnapshot {
    /// Walk `root` up to `max_depth` levels, keeping at most `max_entries` entries.
    /// Unreadable or missing directories contribute nothing.
    pub fn capture(root: &Path, max_depth: usize, max_entries: usize) -> Self {
        let mut entries = Vec::new();
        let mut truncated = false;

        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker.into_iter().filter_map(Result::ok) {
            if entries.len() >= max_entries {
                truncated = true;
                break;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(SnapshotEntry {
                key,
                path: entry.path().to_path_buf(),
                is_dir: entry.file_type().is_dir(),
            });
        }

        if truncated {
            tracing::warn!(
                "Snapshot of {} truncated at {} entries",
                root.display(),
                max_entries
            );
        }

        let keys = entries.iter().map(|e| e.key.clone()).collect();
        Self {
            entries,
            keys,
            truncated,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn contains(&self, relative: &str) -> bool {
        let key = relative.trim_matches('/').to_lowercase();
        self.keys.contains(&key)
    }

    /// Evaluate one fingerprint rule
    pub fn matches(&self, rule: &FingerprintRule) -> bool {
        match rule.kind {
            RuleKind::PathExists(paths) => paths.iter().any(|p| self.contains(p)),
            RuleKind::FileGlob(glob) => {
                let glob = glob.to_lowercase();
                self.entries.iter().any(|e| {
                    !e.is_dir && wildcard_match(&glob, e.key.rsplit('/').next().unwrap_or(""))
                })
            }
            RuleKind::PathPattern(patterns) => patterns.iter().any(|pattern| {
                let pattern = pattern.to_lowercase();
                self.entries.iter().any(|e| path_match(&pattern, &e.key))
            }),
            RuleKind::ContentSignature { files, needle } => {
                let patterns: Vec<String> = files.iter().map(|f| f.to_lowercase()).collect();
                let needle = needle.to_lowercase();
                self.entries
                    .iter()
                    .filter(|e| !e.is_dir && patterns.iter().any(|p| path_match(p, &e.key)))
                    .take(SIGNATURE_PROBE_FILES)
                    .any(|e| file_starts_with_signature(&e.path, &needle))
            }
        }
    }
}

fn file_starts_with_signature(path: &Path, needle: &str) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    let mut buffer = Vec::new();
    if file
        .take(SIGNATURE_PROBE_BYTES)
        .read_to_end(&mut buffer)
        .is_err()
    {
        return false;
    }
    String::from_utf8_lossy(&buffer)
        .to_lowercase()
        .contains(needle)
}

/// Match one path segment against a pattern with `*` and `?`
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Match a `/`-separated path against a pattern where `**` spans any number of segments
pub fn path_match(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments_match(&pattern, &path)
}

fn segments_match(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => (0..=path.len()).any(|skip| segments_match(rest, &path[skip..])),
        Some((head, rest)) => match path.split_first() {
            Some((segment, remaining)) => {
                wildcard_match(head, segment) && segments_match(rest, remaining)
            }
            None => false,
        },
    }
}

/// One scored descriptor
#[derive(Debug, Clone)]
pub struct DetectionCandidate {
    pub descriptor: &'static EcosystemDescriptor,
    pub confidence: f32,
    /// Matched share of the descriptor's own rule weight
    pub base_score: f32,
    pub matched: Vec<&'static str>,
    pub has_unique_match: bool,
}

impl DetectionCandidate {
    pub fn id(&self) -> &'static str {
        self.descriptor.id
    }
}

/// Ranked detection result
#[derive(Debug, Clone)]
pub struct DetectionReport {
    pub root: PathBuf,
    pub candidates: Vec<DetectionCandidate>,
    registry: &'static EcosystemRegistry,
}

impl DetectionReport {
    pub fn best(&self) -> Option<&DetectionCandidate> {
        self.candidates.first().filter(|c| c.confidence > 0.0)
    }

    pub fn confidence_of(&self, id: &str) -> f32 {
        self.candidates
            .iter()
            .find(|c| c.id() == id)
            .map(|c| c.confidence)
            .unwrap_or(0.0)
    }

    /// Pick the top candidate, or report ambiguity when it is below the threshold or
    /// tied with an unrelated runner-up
    pub fn choose(&self, threshold: f32) -> Result<&DetectionCandidate, LibraryError> {
        let ambiguous = |confidence: f32, tied: Vec<String>| LibraryError::DetectionAmbiguous {
            best: self.best().map(|c| c.id().to_string()),
            confidence,
            threshold,
            tied,
        };

        let Some(best) = self.best() else {
            return Err(ambiguous(0.0, Vec::new()));
        };

        let tied: Vec<String> = self
            .candidates
            .iter()
            .skip(1)
            .filter(|c| (c.confidence - best.confidence).abs() < f32::EPSILON)
            .filter(|c| !self.registry.related(c.id(), best.id()))
            .map(|c| c.id().to_string())
            .collect();

        if best.confidence < threshold || !tied.is_empty() {
            return Err(ambiguous(best.confidence, tied));
        }
        Ok(best)
    }
}

/// Scores directory trees against the descriptor registry
#[derive(Debug, Clone)]
pub struct Detector {
    registry: &'static EcosystemRegistry,
    max_depth: usize,
    max_entries: usize,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(EcosystemRegistry::builtin(), &DetectionConfig::default())
    }
}

impl Detector {
    pub fn new(registry: &'static EcosystemRegistry, config: &DetectionConfig) -> Self {
        Self {
            registry,
            max_depth: config.max_depth,
            max_entries: config.max_entries,
        }
    }

    /// Score every descriptor against `root`. Never fails; a missing root scores zero
    /// everywhere.
    pub fn detect(&self, root: &Path) -> DetectionReport {
        let snapshot = TreeSnapshot::capture(root, self.max_depth, self.max_entries);
        tracing::debug!("Snapshot of {}: {} entries", root.display(), snapshot.len());
        self.score(root, &snapshot)
    }

    /// Score a pre-captured snapshot
    pub fn score(&self, root: &Path, snapshot: &TreeSnapshot) -> DetectionReport {
        let mut candidates: Vec<DetectionCandidate> = self
            .registry
            .all()
            .iter()
            .map(|descriptor| {
                let matched: Vec<&FingerprintRule> = descriptor
                    .fingerprints
                    .iter()
                    .filter(|rule| snapshot.matches(rule))
                    .collect();
                let total = descriptor.total_weight();
                let weight: f32 = matched.iter().map(|r| r.tier.weight()).sum();
                let base_score = if total > 0.0 {
                    (weight / total).min(1.0)
                } else {
                    0.0
                };
                DetectionCandidate {
                    descriptor,
                    confidence: 0.0,
                    base_score,
                    has_unique_match: matched.iter().any(|r| r.tier == Tier::Unique),
                    matched: matched.iter().map(|r| r.key).collect(),
                }
            })
            .collect();

        self.normalize(&mut candidates);
        self.rank(&mut candidates);

        for candidate in candidates.iter().filter(|c| c.confidence > 0.0) {
            tracing::debug!(
                "{}: confidence {:.2} (matched {:?})",
                candidate.id(),
                candidate.confidence,
                candidate.matched
            );
        }

        DetectionReport {
            root: root.to_path_buf(),
            candidates,
            registry: self.registry,
        }
    }

    fn family_root(&self, id: &'static str) -> &'static str {
        let mut current = id;
        while let Some(parent) = self.registry.get(current).and_then(|d| d.parent) {
            current = parent;
        }
        current
    }

    fn normalize(&self, candidates: &mut [DetectionCandidate]) {
        let mut claimant_families: Vec<&'static str> = candidates
            .iter()
            .filter(|c| c.has_unique_match)
            .map(|c| self.family_root(c.id()))
            .collect();
        claimant_families.sort_unstable();
        claimant_families.dedup();
        let claims = claimant_families.len().max(1) as f32;

        for candidate in candidates.iter_mut() {
            let family = self.family_root(candidate.id());
            candidate.confidence = if candidate.has_unique_match {
                (0.8 + 0.2 * candidate.base_score) / claims
            } else {
                let contested = claimant_families.iter().any(|f| *f != family);
                let score = 0.75 * candidate.base_score;
                if contested { score * 0.5 } else { score }
            };
        }
    }

    /// True when the child matched evidence its ancestor does not look for
    fn has_specific_match(&self, child: &DetectionCandidate, ancestor: &DetectionCandidate) -> bool {
        child
            .matched
            .iter()
            .any(|key| !ancestor.descriptor.has_rule(key))
    }

    fn rank(&self, candidates: &mut Vec<DetectionCandidate>) {
        // A child without evidence of its own never outranks its ancestor
        let snapshot = candidates.clone();
        for candidate in candidates.iter_mut() {
            for ancestor in &snapshot {
                if self.registry.is_ancestor(ancestor.id(), candidate.id())
                    && !self.has_specific_match(candidate, ancestor)
                {
                    candidate.confidence = candidate.confidence.min(ancestor.confidence);
                }
            }
        }

        let order = |id: &str| {
            self.registry
                .all()
                .iter()
                .position(|d| d.id == id)
                .unwrap_or(usize::MAX)
        };
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    if self.registry.is_ancestor(a.id(), b.id()) {
                        if self.has_specific_match(b, a) {
                            Ordering::Greater
                        } else {
                            Ordering::Less
                        }
                    } else if self.registry.is_ancestor(b.id(), a.id()) {
                        if self.has_specific_match(a, b) {
                            Ordering::Less
                        } else {
                            Ordering::Greater
                        }
                    } else {
                        order(a.id()).cmp(&order(b.id()))
                    }
                })
        });
    }
}
