//! Offline metadata from local DAT files
//!
//! clrmamepro text DATs and Logiqx XML DATs found under the metadata search roots are
//! matched to systems by file name and header name, then to games by set name, CRC32
//! or SHA-1. A match fills a placeholder title, a missing release year, publisher and
//! developer, and the ROM checksums. Values already present are never replaced.

use crate::LibraryError;
use crate::hashing::hash_file;
use crate::loaders::xml::parse_records;
use crate::model::{Game, System};
use crate::scanner::RomScanner;
use chrono::NaiveDate;
use retrosync_config::PlatformTable;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Folders below the source root searched for DATs
pub const SOURCE_DAT_DIRS: &[&str] = &[".retrosync/dats", "metadata/dats", "dats"];

const MAX_CANDIDATES: usize = 5000;
const HEADER_BYTES: usize = 8192;
const MIN_SCORE: u32 = 45;
const IGNORED_DIRS: &[&str] = &[".git", ".hg", ".svn", "__pycache__", "node_modules"];

/// One ROM listed in a DAT set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatRom {
    pub name: String,
    pub crc: Option<String>,
    pub sha1: Option<String>,
}

/// One game or machine entry
#[derive(Debug, Clone, PartialEq)]
pub struct DatGame {
    /// Lowercase set name
    pub set_name: String,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub manufacturer: Option<String>,
    pub clone_of: Option<String>,
    pub roms: Vec<DatRom>,
}

impl DatGame {
    /// ROM listed under `file_name`, or the only ROM of a single-ROM set
    fn rom_for(&self, file_name: &str) -> Option<&DatRom> {
        self.roms
            .iter()
            .find(|rom| rom.name.eq_ignore_ascii_case(file_name))
            .or_else(|| match self.roms.as_slice() {
                [only] => Some(only),
                _ => None,
            })
    }
}

fn normalize_hex(value: &str) -> Option<String> {
    let value = value.trim().to_lowercase();
    (!value.is_empty()).then_some(value)
}

fn normalize_set_name(value: &str) -> String {
    value.trim().to_lowercase()
}

/// First four digits of a year field; "19??" is unknown
fn parse_year(value: &str) -> Option<i32> {
    let digits: String = value.chars().filter(char::is_ascii_digit).take(4).collect();
    if digits.len() < 4 {
        return None;
    }
    digits.parse().ok()
}

fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Whitespace separated tokens; a quoted string is one token without its quotes
fn tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in text.chars() {
        match ch {
            '"' => {
                if quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = !quoted;
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// `rom ( name x.zip size 1 crc DE03FB24 )`
fn parse_text_rom(line: &str) -> Option<DatRom> {
    let open = line.find('(')?;
    let close = line.rfind(')').filter(|close| *close > open)?;
    let attributes: HashMap<String, String> = tokens(&line[open + 1..close])
        .chunks(2)
        .filter_map(|pair| match pair {
            [key, value] => Some((key.to_lowercase(), value.clone())),
            _ => None,
        })
        .collect();
    let name = attributes.get("name")?.trim();
    if name.is_empty() {
        return None;
    }
    Some(DatRom {
        name: name.to_string(),
        crc: attributes.get("crc").and_then(|v| normalize_hex(v)),
        sha1: attributes.get("sha1").and_then(|v| normalize_hex(v)),
    })
}

/// Game being read from a clrmamepro text DAT
#[derive(Debug, Default)]
struct TextGame {
    name: Option<String>,
    year: Option<i32>,
    manufacturer: Option<String>,
    clone_of: Option<String>,
    roms: Vec<DatRom>,
}

impl TextGame {
    /// Set name from the first ROM's stem, else the game name
    fn finish(self) -> Option<DatGame> {
        let set_name = self
            .roms
            .first()
            .and_then(|rom| Path::new(&rom.name).file_stem())
            .map(|stem| normalize_set_name(&stem.to_string_lossy()))
            .filter(|name| !name.is_empty())
            .or_else(|| self.name.as_deref().map(normalize_set_name))
            .filter(|name| !name.is_empty())?;
        Some(DatGame {
            set_name,
            title: self.name,
            year: self.year,
            manufacturer: self.manufacturer,
            clone_of: self.clone_of,
            roms: self.roms,
        })
    }
}

/// Entries of one DAT, indexed for lookups
#[derive(Debug, Clone, Default)]
pub struct DatIndex {
    games: Vec<DatGame>,
    by_set_name: HashMap<String, usize>,
    by_crc: HashMap<String, usize>,
    by_sha1: HashMap<String, usize>,
}

impl DatIndex {
    /// Read a DAT, XML or clrmamepro text
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        let failure = |message: String| LibraryError::DatParse {
            path: path.to_path_buf(),
            message,
        };

        let index = if text.trim_start().starts_with('<') {
            Self::parse_xml(&text).map_err(failure)?
        } else {
            Self::parse_clrmamepro(&text)
        };
        if index.is_empty() {
            return Err(failure("no game or machine entries".to_string()));
        }
        Ok(index)
    }

    /// Logiqx `datafile` or MAME listxml documents
    pub fn parse_xml(xml: &str) -> Result<Self, String> {
        let mut index = Self::default();
        for (parent, record) in [("datafile", "machine"), ("datafile", "game"), ("mame", "machine")] {
            for rec in parse_records(xml, parent, record)? {
                let Some(set_name) = rec
                    .attributes
                    .get("name")
                    .map(|name| normalize_set_name(name))
                    .filter(|name| !name.is_empty())
                else {
                    continue;
                };
                let text = |key: &str| {
                    rec.fields
                        .get(key)
                        .map(|value| value.trim())
                        .filter(|value| !value.is_empty())
                        .map(str::to_string)
                };
                let roms = rec
                    .elements
                    .iter()
                    .filter(|(name, _)| name.eq_ignore_ascii_case("rom"))
                    .filter_map(|(_, attributes)| {
                        let name = attributes.get("name")?.trim();
                        (!name.is_empty()).then(|| DatRom {
                            name: name.to_string(),
                            crc: attributes.get("crc").and_then(|v| normalize_hex(v)),
                            sha1: attributes.get("sha1").and_then(|v| normalize_hex(v)),
                        })
                    })
                    .collect();

                index.insert(DatGame {
                    set_name,
                    title: text("description"),
                    year: text("year").as_deref().and_then(parse_year),
                    manufacturer: text("manufacturer"),
                    clone_of: rec.attributes.get("cloneof").cloned(),
                    roms,
                });
            }
        }
        Ok(index)
    }

    /// clrmamepro text DATs: `game ( ... )` blocks with one field per line
    pub fn parse_clrmamepro(text: &str) -> Self {
        let mut index = Self::default();
        let mut current: Option<TextGame> = None;

        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let lower = line.to_lowercase();
            let keyword = lower
                .split(|c: char| c.is_whitespace() || c == '(')
                .next()
                .unwrap_or_default();

            if matches!(keyword, "game" | "machine") && line.contains('(') {
                current = Some(TextGame::default());
                continue;
            }
            let Some(game) = current.as_mut() else {
                continue;
            };

            let value = || strip_quotes(line.split_once(char::is_whitespace).map_or("", |(_, v)| v)).to_string();
            match keyword {
                ")" => {
                    if let Some(entry) = current.take().and_then(TextGame::finish) {
                        index.insert(entry);
                    }
                }
                "name" => game.name = Some(value()).filter(|v| !v.is_empty()),
                "year" => game.year = parse_year(&value()),
                "manufacturer" | "developer" => game.manufacturer = Some(value()).filter(|v| !v.is_empty()),
                "cloneof" => game.clone_of = Some(value()),
                "rom" => game.roms.extend(parse_text_rom(line)),
                _ => {}
            }
        }
        index
    }

    fn insert(&mut self, game: DatGame) {
        let i = self.games.len();
        self.by_set_name.insert(game.set_name.clone(), i);
        for rom in &game.roms {
            if let Some(crc) = &rom.crc {
                self.by_crc.entry(crc.clone()).or_insert(i);
            }
            if let Some(sha1) = &rom.sha1 {
                self.by_sha1.entry(sha1.clone()).or_insert(i);
            }
        }
        self.games.push(game);
    }

    pub fn len(&self) -> usize {
        self.by_set_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_set_name.is_empty()
    }

    pub fn by_set_name(&self, set_name: &str) -> Option<&DatGame> {
        self.by_set_name
            .get(&normalize_set_name(set_name))
            .map(|i| &self.games[*i])
    }

    pub fn by_crc(&self, crc: &str) -> Option<&DatGame> {
        self.by_crc.get(&normalize_hex(crc)?).map(|i| &self.games[*i])
    }

    pub fn by_sha1(&self, sha1: &str) -> Option<&DatGame> {
        self.by_sha1.get(&normalize_hex(sha1)?).map(|i| &self.games[*i])
    }

    /// Entry for a game: ROM stem as set name, then its CRC32, then its SHA-1
    pub fn lookup(&self, game: &Game) -> Option<&DatGame> {
        self.by_set_name(&game.rom_stem())
            .or_else(|| game.metadata.crc.as_deref().and_then(|crc| self.by_crc(crc)))
            .or_else(|| game.metadata.sha1.as_deref().and_then(|sha1| self.by_sha1(sha1)))
    }
}

/// Lowercase words, punctuation folded to single spaces
fn words(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    format!(" {haystack} ").contains(&format!(" {phrase} "))
}

/// Whether a title is only derived from the ROM file name
fn is_placeholder_title(game: &Game) -> bool {
    let title = words(&game.title);
    if title.is_empty() {
        return true;
    }
    let stem = game.rom_stem();
    title == words(&stem) || title == words(&RomScanner::clean_game_name(&stem))
}

/// Apply the DAT entry matching `game`. ROMs are hashed only when no set name matches
/// and `compute_missing_hashes` is set. Returns whether anything changed.
pub fn enrich_game(index: &DatIndex, game: &mut Game, rom_file: &Path, compute_missing_hashes: bool) -> bool {
    let before = (
        game.title.clone(),
        game.metadata.release_date,
        game.metadata.developer.clone(),
        game.metadata.publisher.clone(),
        game.metadata.crc.clone(),
        game.metadata.sha1.clone(),
    );

    let mut entry = index.lookup(game);
    if entry.is_none()
        && compute_missing_hashes
        && (game.metadata.crc.is_none() || game.metadata.sha1.is_none())
        && rom_file.is_file()
    {
        match hash_file(rom_file) {
            Ok(hashes) => {
                game.metadata.crc.get_or_insert(hashes.crc32);
                game.metadata.sha1.get_or_insert(hashes.sha1);
                entry = index.lookup(game);
            }
            Err(e) => debug!("Cannot hash {}: {}", rom_file.display(), e),
        }
    }
    let Some(entry) = entry else {
        return false;
    };

    if is_placeholder_title(game)
        && let Some(title) = &entry.title
    {
        game.title = title.clone();
    }
    if game.metadata.release_date.is_none() {
        game.metadata.release_date = entry.year.and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1));
    }
    if let Some(manufacturer) = &entry.manufacturer {
        game.metadata.publisher.get_or_insert_with(|| manufacturer.clone());
        game.metadata.developer.get_or_insert_with(|| manufacturer.clone());
    }
    if let Some(rom) = entry.rom_for(&game.rom_file_name()) {
        if game.metadata.crc.is_none() {
            game.metadata.crc = rom.crc.clone();
        }
        if game.metadata.sha1.is_none() {
            game.metadata.sha1 = rom.sha1.clone();
        }
    }

    let after = (
        &game.title,
        game.metadata.release_date,
        &game.metadata.developer,
        &game.metadata.publisher,
        &game.metadata.crc,
        &game.metadata.sha1,
    );
    after != (&before.0, before.1, &before.2, &before.3, &before.4, &before.5)
}

/// Where DAT metadata comes from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatMetadataOptions {
    /// Folder searched before the source's own DAT folders
    pub metadata_root: Option<PathBuf>,
    /// Also search [`SOURCE_DAT_DIRS`] below the source root
    pub search_source: bool,
    /// Hash ROMs whose set name matches nothing, for CRC32 and SHA-1 lookups
    pub compute_missing_hashes: bool,
    /// DAT per system id or source label, bypassing the search
    pub overrides: BTreeMap<String, PathBuf>,
}

/// Outcome of an enrichment pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichSummary {
    pub games_enriched: usize,
    /// DAT used per system id
    pub sources: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    /// File stem as words
    name: String,
    /// Header name as words
    header: String,
}

/// Header `name` of a DAT, from its first few kilobytes
fn header_name(path: &Path) -> String {
    let Ok(bytes) = std::fs::read(path) else {
        return String::new();
    };
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(HEADER_BYTES)]).to_string();
    let lower = head.to_ascii_lowercase();

    if let Some(header) = lower.find("<header>") {
        let rest = &head[header..];
        let lower_rest = &lower[header..];
        if let (Some(start), Some(end)) = (lower_rest.find("<name>"), lower_rest.find("</name>"))
            && start + 6 <= end
        {
            return words(&rest[start + 6..end]);
        }
        return String::new();
    }
    head.lines()
        .map(str::trim)
        .find(|line| line.to_ascii_lowercase().starts_with("name "))
        .map(|line| words(strip_quotes(&line[5..])))
        .unwrap_or_default()
}

/// Picks a DAT per system and applies it
pub struct MetadataEnricher {
    options: DatMetadataOptions,
    platforms: &'static PlatformTable,
    candidates: Vec<Candidate>,
    indexes: HashMap<PathBuf, Option<DatIndex>>,
    warnings: Vec<String>,
}

impl MetadataEnricher {
    pub fn new(options: DatMetadataOptions, source_root: &Path) -> Self {
        let mut enricher = Self {
            options,
            platforms: PlatformTable::builtin(),
            candidates: Vec::new(),
            indexes: HashMap::new(),
            warnings: Vec::new(),
        };
        enricher.collect_candidates(source_root);
        enricher
    }

    pub fn options(&self) -> &DatMetadataOptions {
        &self.options
    }

    /// Whether any DAT could apply
    pub fn is_active(&self) -> bool {
        !self.candidates.is_empty() || !self.options.overrides.is_empty()
    }

    /// Problems met while reading DATs
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn search_roots(&self, source_root: &Path) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.options.metadata_root.iter().cloned().collect();
        if self.options.search_source {
            roots.extend(SOURCE_DAT_DIRS.iter().map(|dir| source_root.join(dir)));
        }
        let mut seen = HashSet::new();
        roots.retain(|root| root.is_dir() && seen.insert(root.clone()));
        roots
    }

    fn collect_candidates(&mut self, source_root: &Path) {
        let mut seen = HashSet::new();
        for root in self.search_roots(source_root) {
            let walker = WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    !(e.file_type().is_dir()
                        && IGNORED_DIRS.contains(&e.file_name().to_string_lossy().to_lowercase().as_str()))
                });
            let mut found: Vec<(usize, PathBuf)> = walker
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    e.path()
                        .extension()
                        .map(|ext| ext.to_string_lossy().to_lowercase())
                        .is_some_and(|ext| ext == "dat" || ext == "xml")
                })
                .map(|e| (e.depth(), e.into_path()))
                .collect();
            found.sort_by_key(|(depth, _)| *depth);

            for (_, path) in found {
                if self.candidates.len() >= MAX_CANDIDATES {
                    self.warnings
                        .push(format!("DAT search stopped after {MAX_CANDIDATES} files"));
                    return;
                }
                if !seen.insert(path.clone()) {
                    continue;
                }
                let name = path
                    .file_stem()
                    .map(|stem| words(&stem.to_string_lossy()))
                    .unwrap_or_default();
                let header = header_name(&path);
                self.candidates.push(Candidate { path, name, header });
            }
        }
        debug!("{} DAT candidates", self.candidates.len());
    }

    /// Names a DAT for `system` may carry
    fn phrases(&self, system: &System) -> Vec<String> {
        let mut phrases: Vec<String> = [
            system.system_id.as_str(),
            system.display_name.as_str(),
            system.source_platform_label.as_str(),
        ]
        .into_iter()
        .map(words)
        .collect();
        if let Some(platform) = self.platforms.get(&system.system_id) {
            phrases.extend(platform.labels().map(words));
            phrases.push(words(platform.name));
        }
        let mut seen = HashSet::new();
        phrases.retain(|p| !p.is_empty() && seen.insert(p.clone()));
        phrases
    }

    /// Score of a candidate: an exact file name beats a longer contained phrase, which
    /// beats a shorter one; header names count a little less than file names
    fn score(candidate: &Candidate, phrases: &[String]) -> u32 {
        phrases
            .iter()
            .map(|phrase| {
                let length = phrase.split(' ').count() as u32;
                if candidate.name == *phrase {
                    100
                } else if contains_phrase(&candidate.name, phrase) {
                    (50 + 5 * length).min(90)
                } else if candidate.header == *phrase {
                    80
                } else if contains_phrase(&candidate.header, phrase) {
                    (45 + 5 * length).min(75)
                } else {
                    0
                }
            })
            .max()
            .unwrap_or(0)
    }

    /// DAT chosen for a system: an override, else the best scoring candidate
    pub fn dat_for(&self, system: &System) -> Option<PathBuf> {
        let overridden = self
            .options
            .overrides
            .get(&system.system_id)
            .or_else(|| self.options.overrides.get(&system.source_platform_label));
        if let Some(path) = overridden {
            return Some(path.clone());
        }

        let phrases = self.phrases(system);
        let mut best: Option<(u32, &Candidate)> = None;
        for candidate in &self.candidates {
            let score = Self::score(candidate, &phrases);
            if score >= MIN_SCORE && best.is_none_or(|(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
        best.map(|(score, candidate)| {
            debug!(
                "{}: DAT {} scored {}",
                system.system_id,
                candidate.path.display(),
                score
            );
            candidate.path.clone()
        })
    }

    /// Parsed DAT for `system`, read once per file
    pub fn index_for(&mut self, system: &System) -> Option<(PathBuf, &DatIndex)> {
        let path = self.dat_for(system)?;
        if !self.indexes.contains_key(&path) {
            let index = match DatIndex::load(&path) {
                Ok(index) => {
                    info!("{}: {} entries in {}", system.system_id, index.len(), path.display());
                    Some(index)
                }
                Err(e) => {
                    warn!("{e}");
                    self.warnings.push(e.to_string());
                    None
                }
            };
            self.indexes.insert(path.clone(), index);
        }
        let index = self.indexes.get(&path)?.as_ref()?;
        Some((path, index))
    }

    /// Enrich every game of `system` on the calling thread
    pub fn enrich_system(&mut self, system: &mut System) -> usize {
        let compute = self.options.compute_missing_hashes;
        let Some((_, index)) = self.index_for(system) else {
            return 0;
        };
        let rom_root = system.rom_root.clone();
        system
            .games
            .iter_mut()
            .map(|game| {
                let rom_file = rom_root.join(&game.rom_path);
                enrich_game(index, game, &rom_file, compute)
            })
            .filter(|changed| *changed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const FBNEO_XML: &str = r#"<?xml version="1.0"?>
<!DOCTYPE datafile PUBLIC "-//Logiqx//DTD ROM Management Datafile//EN" "http://www.logiqx.com/Dats/datafile.dtd">
<datafile>
  <header>
    <name>FinalBurn Neo - Arcade Games</name>
  </header>
  <machine name="pacman">
    <description>Pac-Man</description>
    <year>1980</year>
    <manufacturer>Namco</manufacturer>
    <rom name="pacman.zip" crc="79520FA1" sha1="a1e17a20e93e5da710685444df3ad038ac66e2c9"/>
  </machine>
  <machine name="puckman" cloneof="pacman">
    <description>Puck Man (Japan set 1)</description>
    <year>19??</year>
  </machine>
</datafile>"#;

    const MAME_TEXT: &str = r#"clrmamepro (
    name "MAME - Consolidated ROM Sets"
)

game (
    name "1941: Counter Attack (World)"
    year "1990"
    developer "Capcom"
    rom ( name 1941.zip size 1419821 crc DE03FB24 sha1 D6EE54766D377D1136F6A5E17B772666A072E74E )
)
"#;

    fn arcade_system(rom_root: &Path, roms: &[&str]) -> System {
        System {
            system_id: "arcade".to_string(),
            display_name: "Arcade".to_string(),
            source_platform_label: "arcade".to_string(),
            rom_root: rom_root.to_path_buf(),
            asset_roots: BTreeMap::new(),
            container_path: None,
            needs_mapping: false,
            target_label: None,
            games: roms
                .iter()
                .map(|rom| {
                    Game::new(
                        "arcade",
                        PathBuf::from(rom),
                        RomScanner::title_from_path(Path::new(rom)),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_parse_xml_dat() {
        let index = DatIndex::parse_xml(FBNEO_XML).unwrap();
        assert_eq!(index.len(), 2);

        let pacman = index.by_set_name("PacMan").unwrap();
        assert_eq!(pacman.title.as_deref(), Some("Pac-Man"));
        assert_eq!(pacman.year, Some(1980));
        assert_eq!(pacman.manufacturer.as_deref(), Some("Namco"));
        assert_eq!(index.by_crc("79520fa1").unwrap().set_name, "pacman");

        let puckman = index.by_set_name("puckman").unwrap();
        assert_eq!(puckman.year, None);
        assert_eq!(puckman.clone_of.as_deref(), Some("pacman"));
    }

    #[test]
    fn test_parse_clrmamepro_text_dat() {
        let index = DatIndex::parse_clrmamepro(MAME_TEXT);
        assert_eq!(index.len(), 1);
        let entry = index.by_set_name("1941").unwrap();
        assert_eq!(entry.title.as_deref(), Some("1941: Counter Attack (World)"));
        assert_eq!(entry.year, Some(1990));
        assert_eq!(entry.manufacturer.as_deref(), Some("Capcom"));
        assert_eq!(entry.roms[0].crc.as_deref(), Some("de03fb24"));
        assert!(index.by_sha1("d6ee54766d377d1136f6a5e17b772666a072e74e").is_some());
    }

    #[test]
    fn test_load_rejects_empty_dat() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.dat");
        fs::write(&path, "<datafile><header><name>x</name></header></datafile>").unwrap();
        assert!(matches!(
            DatIndex::load(&path),
            Err(LibraryError::DatParse { .. })
        ));
    }

    #[test]
    fn test_placeholder_title_replaced_custom_title_kept() {
        let index = DatIndex::parse_xml(FBNEO_XML).unwrap();

        let mut placeholder = Game::new("arcade", PathBuf::from("pacman.zip"), "pacman");
        assert!(enrich_game(&index, &mut placeholder, Path::new("/none"), false));
        assert_eq!(placeholder.title, "Pac-Man");
        assert_eq!(placeholder.metadata.publisher.as_deref(), Some("Namco"));
        assert_eq!(placeholder.metadata.developer.as_deref(), Some("Namco"));
        assert_eq!(placeholder.metadata.release_date, NaiveDate::from_ymd_opt(1980, 1, 1));
        assert_eq!(placeholder.metadata.crc.as_deref(), Some("79520fa1"));

        let mut custom = Game::new("arcade", PathBuf::from("pacman.zip"), "My Custom Pac-Man Title");
        custom.metadata.developer = Some("Midway".to_string());
        enrich_game(&index, &mut custom, Path::new("/none"), false);
        assert_eq!(custom.title, "My Custom Pac-Man Title");
        assert_eq!(custom.metadata.developer.as_deref(), Some("Midway"));
        assert_eq!(custom.metadata.publisher.as_deref(), Some("Namco"));
    }

    #[test]
    fn test_hash_fallback_only_when_enabled() {
        let dir = TempDir::new().unwrap();
        let rom = dir.path().join("mismatch.zip");
        // CRC32 79520fa1, SHA-1 a1e17a20...
        fs::write(&rom, b"rom").unwrap();
        let index = DatIndex::parse_xml(FBNEO_XML).unwrap();

        let mut game = Game::new("arcade", PathBuf::from("mismatch.zip"), "mismatch");
        assert!(!enrich_game(&index, &mut game, &rom, false));
        assert_eq!(game.title, "mismatch");

        assert!(enrich_game(&index, &mut game, &rom, true));
        assert_eq!(game.title, "Pac-Man");
        assert_eq!(game.metadata.crc.as_deref(), Some("79520fa1"));
    }

    #[test]
    fn test_dat_chosen_by_file_name_and_header() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("dats/ignored/.git")).unwrap();
        fs::write(root.join("dats/FinalBurn Neo (Arcade only).dat"), FBNEO_XML).unwrap();
        fs::write(
            root.join("dats/Nintendo - Nintendo Entertainment System.dat"),
            "clrmamepro (\n name \"Nintendo - Nintendo Entertainment System\"\n)\n",
        )
        .unwrap();
        fs::write(
            root.join("dats/Nintendo - Super Nintendo Entertainment System.dat"),
            "clrmamepro (\n name \"Nintendo - Super Nintendo Entertainment System\"\n)\n",
        )
        .unwrap();
        fs::write(root.join("dats/ignored/.git/arcade.dat"), FBNEO_XML).unwrap();

        let options = DatMetadataOptions {
            search_source: true,
            ..DatMetadataOptions::default()
        };
        let enricher = MetadataEnricher::new(options, root);
        assert!(enricher.is_active());
        assert_eq!(enricher.candidates.len(), 3);

        let arcade = arcade_system(root, &[]);
        let chosen = enricher.dat_for(&arcade).unwrap();
        assert!(chosen.ends_with("FinalBurn Neo (Arcade only).dat"));

        let mut nes = arcade_system(root, &[]);
        nes.system_id = "nes".to_string();
        nes.display_name = "Nintendo Entertainment System".to_string();
        nes.source_platform_label = "nes".to_string();
        let chosen = enricher.dat_for(&nes).unwrap();
        assert!(chosen.ends_with("Nintendo - Nintendo Entertainment System.dat"));

        let mut weird = arcade_system(root, &[]);
        weird.system_id = "weirdbox".to_string();
        weird.display_name = "weirdbox".to_string();
        weird.source_platform_label = "weirdbox".to_string();
        assert_eq!(enricher.dat_for(&weird), None);
    }

    #[test]
    fn test_override_and_enrich_system() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let dat = root.join("custom.dat");
        fs::write(&dat, FBNEO_XML).unwrap();

        let mut options = DatMetadataOptions::default();
        options.overrides.insert("arcade".to_string(), dat.clone());
        let mut enricher = MetadataEnricher::new(options, root);

        let mut system = arcade_system(root, &["pacman.zip", "galaga.zip"]);
        assert_eq!(enricher.enrich_system(&mut system), 1);
        assert_eq!(system.games[0].title, "Pac-Man");
        assert_eq!(system.games[1].title, "galaga");
        assert!(enricher.take_warnings().is_empty());
    }
}
