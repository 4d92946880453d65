//! Ecosystem descriptor registry
//!
//! Every supported front-end is described by a static [`EcosystemDescriptor`]: how to
//! recognise it on disk, where its metadata container lives, how media is laid out and
//! associated to games, and how paths are referenced when writing. The registry is plain
//! `'static` data shared by detection, loading and conversion.

use crate::assets::{AssetType, MetadataField};
use std::path::{Path, PathBuf};

/// Placeholder substituted with a system's platform label in path templates
pub const PLATFORM_PLACEHOLDER: &str = "{platform}";

/// Evidence strength of a fingerprint rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// A config file or marker only this ecosystem ships
    Unique,
    /// The ecosystem's metadata container
    Container,
    /// Media folder layout
    Layout,
    /// Directory naming habits
    Naming,
}

impl Tier {
    pub fn weight(&self) -> f32 {
        match self {
            Tier::Unique => 1.0,
            Tier::Container => 0.6,
            Tier::Layout => 0.3,
            Tier::Naming => 0.1,
        }
    }
}

/// What a fingerprint rule looks for. All paths are relative to the scanned root and
/// compared case-insensitively.
#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    /// Any of these paths exists (file or directory)
    PathExists(&'static [&'static str]),
    /// A file whose name matches the glob exists anywhere within the scan depth
    FileGlob(&'static str),
    /// A path matching any of these globs exists. `*` matches within a segment,
    /// `**` matches any number of segments.
    PathPattern(&'static [&'static str]),
    /// A file matching one of the globs contains `needle` near its start
    ContentSignature {
        files: &'static [&'static str],
        needle: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct FingerprintRule {
    /// Stable key, shared between related descriptors for the same evidence
    pub key: &'static str,
    pub kind: RuleKind,
    pub tier: Tier,
}

/// Where and how game metadata is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataContainer {
    XmlPerSystem,
    XmlCentral,
    Sqlite,
    Playlist,
    Plaintext,
    FilenameOnly,
}

/// How media files are arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetLayout {
    SuffixOnRom,
    TypedSubfolderCentral,
    TypedSubfolderPerPlatform,
    FilenameMirror,
    BasenameSameFolder,
}

/// How a writer references ROMs and media inside its container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathReferences {
    /// `./file` relative to the system's ROM directory
    RomRelative,
    /// Relative to the content root, backslash separated
    ContentRelative,
    /// Absolute paths
    Absolute,
    /// Bare ROM names, no media references
    Bare,
}

/// File naming rule of an asset slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotNaming {
    /// `<rom-stem>.<ext>`
    Mirror,
    /// `<rom-stem><suffix>.<ext>`
    Suffix(&'static str),
    /// `<sanitized-title>.<ext>`, optionally with a `-01` image index
    Title { index: bool },
}

/// Folder and naming rule for one asset type
#[derive(Debug, Clone, Copy)]
pub struct AssetSlot {
    pub asset_type: AssetType,
    /// Folder template relative to the content root
    pub folder: &'static str,
    pub naming: SlotNaming,
    /// Container field holding an explicit reference, if the format has one
    pub tag: Option<&'static str>,
}

/// Platform naming scheme used by an ecosystem family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFamily {
    EmulationStation,
    LaunchBox,
    RetroArch,
    AttractMode,
    OnionOs,
}

/// Static description of one emulation front-end
#[derive(Debug)]
pub struct EcosystemDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    /// Family ancestor, used for detection tie-breaks
    pub parent: Option<&'static str>,
    pub fingerprints: &'static [FingerprintRule],
    pub container: MetadataContainer,
    pub layout: AssetLayout,
    pub title_driven: bool,
    pub honors_explicit_references: bool,
    pub references: PathReferences,
    pub label_family: LabelFamily,
    /// Candidate content roots below the scanned root; `""` is the root itself
    pub content_roots: &'static [&'static str],
    /// ROM directory templates; the first is used when writing
    pub rom_dirs: &'static [&'static str],
    /// Container path templates; the first is used when writing
    pub container_paths: &'static [&'static str],
    pub asset_slots: &'static [AssetSlot],
    pub supported_fields: &'static [MetadataField],
}

impl EcosystemDescriptor {
    /// Slot for an asset type
    pub fn slot(&self, asset_type: AssetType) -> Option<&'static AssetSlot> {
        self.asset_slots.iter().find(|s| s.asset_type == asset_type)
    }

    /// True when no other slot shares this slot's folder
    pub fn folder_is_dedicated(&self, slot: &AssetSlot) -> bool {
        self.asset_slots
            .iter()
            .filter(|s| s.folder == slot.folder)
            .count()
            == 1
    }

    pub fn supports(&self, field: MetadataField) -> bool {
        self.supported_fields.contains(&field)
    }

    /// Resolve the content root under a scanned root
    pub fn content_root(&self, root: &Path) -> PathBuf {
        for candidate in self.content_roots {
            if candidate.is_empty() {
                continue;
            }
            let path = root.join(candidate);
            if path.is_dir() {
                return path;
            }
        }
        root.to_path_buf()
    }

    /// Sum of all fingerprint weights
    pub fn total_weight(&self) -> f32 {
        self.fingerprints.iter().map(|r| r.tier.weight()).sum()
    }

    pub fn has_rule(&self, key: &str) -> bool {
        self.fingerprints.iter().any(|r| r.key == key)
    }

    /// Platform labels already present under a content root, from ROM directories and
    /// container paths
    pub fn existing_platforms(&self, content_root: &Path) -> Vec<String> {
        let mut labels: Vec<String> = self
            .rom_dirs
            .iter()
            .chain(self.container_paths.iter())
            .flat_map(|template| template_matches(content_root, template))
            .map(|(label, _)| label)
            .filter(|label| !label.is_empty())
            .collect();
        labels.sort_by_key(|l| l.to_lowercase());
        labels.dedup();
        labels
    }
}

/// Substitute the platform label into a path template
pub fn expand_template(template: &str, platform: &str) -> String {
    template.replace(PLATFORM_PLACEHOLDER, platform)
}

/// Enumerate the paths matching a `{platform}` template under a root.
///
/// Returns `(label, path)` pairs sorted by label. A template without a placeholder
/// yields one pair with an empty label when the path exists.
pub fn template_matches(root: &Path, template: &str) -> Vec<(String, PathBuf)> {
    let Some((prefix, suffix)) = template.split_once(PLATFORM_PLACEHOLDER) else {
        let path = root.join(template);
        return if path.exists() {
            vec![(String::new(), path)]
        } else {
            Vec::new()
        };
    };

    let parent = root.join(prefix);
    let Ok(entries) = std::fs::read_dir(&parent) else {
        return Vec::new();
    };

    let mut matches = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if suffix.is_empty() {
            if path.is_dir() {
                matches.push((name, path));
            }
        } else if let Some(rest) = suffix.strip_prefix('/') {
            let candidate = path.join(rest);
            if path.is_dir() && candidate.exists() {
                matches.push((name, candidate));
            }
        } else if path.is_file()
            && name.len() > suffix.len()
            && name.to_lowercase().ends_with(&suffix.to_lowercase())
        {
            let label = name[..name.len() - suffix.len()].to_string();
            matches.push((label, path));
        }
    }
    matches.sort_by(|a, b| a.0.cmp(&b.0));
    matches
}

const ES_FIELDS: &[MetadataField] = &[
    MetadataField::Title,
    MetadataField::SortTitle,
    MetadataField::ReleaseDate,
    MetadataField::Genres,
    MetadataField::Developer,
    MetadataField::Publisher,
    MetadataField::Rating,
    MetadataField::PlayCount,
    MetadataField::LastPlayed,
    MetadataField::Favorite,
    MetadataField::Hidden,
    MetadataField::Description,
    MetadataField::Players,
];

const LAUNCHBOX_FIELDS: &[MetadataField] = &[
    MetadataField::Title,
    MetadataField::SortTitle,
    MetadataField::ReleaseDate,
    MetadataField::Genres,
    MetadataField::Developer,
    MetadataField::Publisher,
    MetadataField::Rating,
    MetadataField::PlayCount,
    MetadataField::LastPlayed,
    MetadataField::Favorite,
    MetadataField::Hidden,
    MetadataField::Description,
];

const GAMELIST_XML: FingerprintRule = FingerprintRule {
    key: "gamelist_xml",
    kind: RuleKind::ContentSignature {
        files: &["**/gamelist.xml"],
        needle: "<gameList",
    },
    tier: Tier::Container,
};

const ROMS_DIR: FingerprintRule = FingerprintRule {
    key: "roms_dir",
    kind: RuleKind::PathExists(&["roms"]),
    tier: Tier::Naming,
};

const LAUNCHBOX_IMAGE_SLOTS: &[AssetSlot] = &[
    AssetSlot {
        asset_type: AssetType::BoxFront,
        folder: "Images/{platform}/Box - Front",
        naming: SlotNaming::Title { index: true },
        tag: None,
    },
    AssetSlot {
        asset_type: AssetType::BoxBack,
        folder: "Images/{platform}/Box - Back",
        naming: SlotNaming::Title { index: true },
        tag: None,
    },
    AssetSlot {
        asset_type: AssetType::Disc,
        folder: "Images/{platform}/Disc",
        naming: SlotNaming::Title { index: true },
        tag: None,
    },
    AssetSlot {
        asset_type: AssetType::ScreenshotGameplay,
        folder: "Images/{platform}/Screenshot - Gameplay",
        naming: SlotNaming::Title { index: true },
        tag: None,
    },
    AssetSlot {
        asset_type: AssetType::ScreenshotTitle,
        folder: "Images/{platform}/Screenshot - Game Title",
        naming: SlotNaming::Title { index: true },
        tag: None,
    },
    AssetSlot {
        asset_type: AssetType::Logo,
        folder: "Images/{platform}/Clear Logo",
        naming: SlotNaming::Title { index: true },
        tag: None,
    },
    AssetSlot {
        asset_type: AssetType::Marquee,
        folder: "Images/{platform}/Arcade - Marquee",
        naming: SlotNaming::Title { index: true },
        tag: None,
    },
    AssetSlot {
        asset_type: AssetType::Fanart,
        folder: "Images/{platform}/Fanart - Background",
        naming: SlotNaming::Title { index: true },
        tag: None,
    },
    AssetSlot {
        asset_type: AssetType::Video,
        folder: "Videos/{platform}",
        naming: SlotNaming::Title { index: true },
        tag: Some("VideoPath"),
    },
    AssetSlot {
        asset_type: AssetType::Manual,
        folder: "Manuals/{platform}",
        naming: SlotNaming::Title { index: true },
        tag: Some("ManualPath"),
    },
];

static DESCRIPTORS: [EcosystemDescriptor; 9] = [
    EcosystemDescriptor {
        id: "es_classic",
        name: "EmulationStation",
        parent: None,
        fingerprints: &[
            FingerprintRule {
                key: "es_systems_cfg",
                kind: RuleKind::PathExists(&[
                    ".emulationstation/es_systems.cfg",
                    "etc/emulationstation/es_systems.cfg",
                ]),
                tier: Tier::Unique,
            },
            GAMELIST_XML,
            FingerprintRule {
                key: "es_gamelists_home",
                kind: RuleKind::PathExists(&[".emulationstation/gamelists"]),
                tier: Tier::Container,
            },
            FingerprintRule {
                key: "rom_images_dir",
                kind: RuleKind::PathPattern(&["roms/*/images"]),
                tier: Tier::Layout,
            },
            ROMS_DIR,
        ],
        container: MetadataContainer::XmlPerSystem,
        layout: AssetLayout::FilenameMirror,
        title_driven: false,
        honors_explicit_references: true,
        references: PathReferences::RomRelative,
        label_family: LabelFamily::EmulationStation,
        content_roots: &[""],
        rom_dirs: &["roms/{platform}"],
        container_paths: &[
            "roms/{platform}/gamelist.xml",
            ".emulationstation/gamelists/{platform}/gamelist.xml",
        ],
        asset_slots: &[
            AssetSlot {
                asset_type: AssetType::BoxFront,
                folder: "roms/{platform}/images",
                naming: SlotNaming::Mirror,
                tag: Some("image"),
            },
            AssetSlot {
                asset_type: AssetType::ScreenshotGameplay,
                folder: "roms/{platform}/images",
                naming: SlotNaming::Suffix("-thumb"),
                tag: Some("thumbnail"),
            },
            AssetSlot {
                asset_type: AssetType::Marquee,
                folder: "roms/{platform}/images",
                naming: SlotNaming::Suffix("-marquee"),
                tag: Some("marquee"),
            },
            AssetSlot {
                asset_type: AssetType::Fanart,
                folder: "roms/{platform}/images",
                naming: SlotNaming::Suffix("-fanart"),
                tag: Some("fanart"),
            },
            AssetSlot {
                asset_type: AssetType::Video,
                folder: "roms/{platform}/videos",
                naming: SlotNaming::Mirror,
                tag: Some("video"),
            },
            AssetSlot {
                asset_type: AssetType::Manual,
                folder: "roms/{platform}/manuals",
                naming: SlotNaming::Mirror,
                tag: Some("manual"),
            },
        ],
        supported_fields: ES_FIELDS,
    },
    EcosystemDescriptor {
        id: "batocera",
        name: "Batocera",
        parent: Some("es_classic"),
        fingerprints: &[
            FingerprintRule {
                key: "batocera_conf",
                kind: RuleKind::PathExists(&[
                    "system/batocera.conf",
                    "userdata/system/batocera.conf",
                    "userdata/roms",
                ]),
                tier: Tier::Unique,
            },
            GAMELIST_XML,
            FingerprintRule {
                key: "suffix_media",
                kind: RuleKind::PathPattern(&["**/images/*-image.*", "**/images/*-thumb.*"]),
                tier: Tier::Layout,
            },
            ROMS_DIR,
        ],
        container: MetadataContainer::XmlPerSystem,
        layout: AssetLayout::SuffixOnRom,
        title_driven: false,
        honors_explicit_references: true,
        references: PathReferences::RomRelative,
        label_family: LabelFamily::EmulationStation,
        content_roots: &["userdata", ""],
        rom_dirs: &["roms/{platform}"],
        container_paths: &["roms/{platform}/gamelist.xml"],
        asset_slots: &[
            AssetSlot {
                asset_type: AssetType::BoxFront,
                folder: "roms/{platform}/images",
                naming: SlotNaming::Suffix("-image"),
                tag: Some("image"),
            },
            AssetSlot {
                asset_type: AssetType::ScreenshotGameplay,
                folder: "roms/{platform}/images",
                naming: SlotNaming::Suffix("-thumb"),
                tag: Some("thumbnail"),
            },
            AssetSlot {
                asset_type: AssetType::Marquee,
                folder: "roms/{platform}/images",
                naming: SlotNaming::Suffix("-marquee"),
                tag: Some("marquee"),
            },
            AssetSlot {
                asset_type: AssetType::Fanart,
                folder: "roms/{platform}/images",
                naming: SlotNaming::Suffix("-fanart"),
                tag: Some("fanart"),
            },
            AssetSlot {
                asset_type: AssetType::Bezel,
                folder: "roms/{platform}/images",
                naming: SlotNaming::Suffix("-bezel"),
                tag: Some("bezel"),
            },
            AssetSlot {
                asset_type: AssetType::Video,
                folder: "roms/{platform}/videos",
                naming: SlotNaming::Suffix("-video"),
                tag: Some("video"),
            },
            AssetSlot {
                asset_type: AssetType::Manual,
                folder: "roms/{platform}/manuals",
                naming: SlotNaming::Suffix("-manual"),
                tag: Some("manual"),
            },
        ],
        supported_fields: ES_FIELDS,
    },
    EcosystemDescriptor {
        id: "retrobat",
        name: "RetroBat",
        parent: Some("es_classic"),
        fingerprints: &[
            FingerprintRule {
                key: "retrobat_ini",
                kind: RuleKind::PathExists(&["retrobat.ini", "RetroBat.exe"]),
                tier: Tier::Unique,
            },
            GAMELIST_XML,
            FingerprintRule {
                key: "boxart_dirs",
                kind: RuleKind::PathPattern(&["roms/*/images/boxart"]),
                tier: Tier::Layout,
            },
            ROMS_DIR,
        ],
        container: MetadataContainer::XmlPerSystem,
        layout: AssetLayout::TypedSubfolderPerPlatform,
        title_driven: false,
        honors_explicit_references: true,
        references: PathReferences::RomRelative,
        label_family: LabelFamily::EmulationStation,
        content_roots: &[""],
        rom_dirs: &["roms/{platform}"],
        container_paths: &["roms/{platform}/gamelist.xml"],
        asset_slots: &[
            AssetSlot {
                asset_type: AssetType::BoxFront,
                folder: "roms/{platform}/images/boxart",
                naming: SlotNaming::Mirror,
                tag: Some("image"),
            },
            AssetSlot {
                asset_type: AssetType::ScreenshotGameplay,
                folder: "roms/{platform}/images/screenshot",
                naming: SlotNaming::Mirror,
                tag: Some("thumbnail"),
            },
            AssetSlot {
                asset_type: AssetType::Marquee,
                folder: "roms/{platform}/images/wheel",
                naming: SlotNaming::Mirror,
                tag: Some("marquee"),
            },
            AssetSlot {
                asset_type: AssetType::Fanart,
                folder: "roms/{platform}/images/fanart",
                naming: SlotNaming::Mirror,
                tag: Some("fanart"),
            },
            AssetSlot {
                asset_type: AssetType::Video,
                folder: "roms/{platform}/images/video",
                naming: SlotNaming::Mirror,
                tag: Some("video"),
            },
            AssetSlot {
                asset_type: AssetType::Manual,
                folder: "roms/{platform}/manuals",
                naming: SlotNaming::Mirror,
                tag: Some("manual"),
            },
        ],
        supported_fields: ES_FIELDS,
    },
    EcosystemDescriptor {
        id: "es_de",
        name: "ES-DE",
        parent: Some("es_classic"),
        fingerprints: &[
            FingerprintRule {
                key: "es_de_settings",
                kind: RuleKind::PathExists(&[
                    "ES-DE/settings/es_settings.xml",
                    "ES-DE/es_settings.xml",
                    "settings/es_settings.xml",
                ]),
                tier: Tier::Unique,
            },
            GAMELIST_XML,
            FingerprintRule {
                key: "es_de_gamelists",
                kind: RuleKind::PathExists(&["ES-DE/gamelists", "gamelists"]),
                tier: Tier::Container,
            },
            FingerprintRule {
                key: "downloaded_media",
                kind: RuleKind::PathExists(&["ES-DE/downloaded_media", "downloaded_media"]),
                tier: Tier::Layout,
            },
            ROMS_DIR,
        ],
        container: MetadataContainer::XmlPerSystem,
        layout: AssetLayout::TypedSubfolderPerPlatform,
        title_driven: false,
        honors_explicit_references: false,
        references: PathReferences::RomRelative,
        label_family: LabelFamily::EmulationStation,
        content_roots: &["ES-DE", ""],
        rom_dirs: &[
            "roms/{platform}",
            "ROMs/{platform}",
            "../ROMs/{platform}",
            "../roms/{platform}",
        ],
        container_paths: &["gamelists/{platform}/gamelist.xml"],
        asset_slots: &[
            AssetSlot {
                asset_type: AssetType::BoxFront,
                folder: "downloaded_media/{platform}/covers",
                naming: SlotNaming::Mirror,
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::BoxBack,
                folder: "downloaded_media/{platform}/backcovers",
                naming: SlotNaming::Mirror,
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::ScreenshotGameplay,
                folder: "downloaded_media/{platform}/screenshots",
                naming: SlotNaming::Mirror,
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::ScreenshotTitle,
                folder: "downloaded_media/{platform}/titlescreens",
                naming: SlotNaming::Mirror,
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::Marquee,
                folder: "downloaded_media/{platform}/marquees",
                naming: SlotNaming::Mirror,
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::Fanart,
                folder: "downloaded_media/{platform}/fanart",
                naming: SlotNaming::Mirror,
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::Miximage,
                folder: "downloaded_media/{platform}/miximages",
                naming: SlotNaming::Mirror,
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::Disc,
                folder: "downloaded_media/{platform}/physicalmedia",
                naming: SlotNaming::Mirror,
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::Video,
                folder: "downloaded_media/{platform}/videos",
                naming: SlotNaming::Mirror,
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::Manual,
                folder: "downloaded_media/{platform}/manuals",
                naming: SlotNaming::Mirror,
                tag: None,
            },
        ],
        supported_fields: ES_FIELDS,
    },
    EcosystemDescriptor {
        id: "launchbox",
        name: "LaunchBox",
        parent: None,
        fingerprints: &[
            FingerprintRule {
                key: "launchbox_exe",
                kind: RuleKind::PathExists(&[
                    "LaunchBox.exe",
                    "LaunchBox/LaunchBox.exe",
                    "Core/LaunchBox.exe",
                ]),
                tier: Tier::Unique,
            },
            FingerprintRule {
                key: "platforms_xml",
                kind: RuleKind::PathPattern(&[
                    "Data/Platforms/*.xml",
                    "LaunchBox/Data/Platforms/*.xml",
                ]),
                tier: Tier::Container,
            },
            FingerprintRule {
                key: "launchbox_images",
                kind: RuleKind::PathPattern(&[
                    "Images/*/Box - Front",
                    "LaunchBox/Images/*/Box - Front",
                ]),
                tier: Tier::Layout,
            },
            FingerprintRule {
                key: "games_dir",
                kind: RuleKind::PathExists(&["Games", "LaunchBox/Games"]),
                tier: Tier::Naming,
            },
        ],
        container: MetadataContainer::XmlCentral,
        layout: AssetLayout::TypedSubfolderCentral,
        title_driven: true,
        honors_explicit_references: true,
        references: PathReferences::ContentRelative,
        label_family: LabelFamily::LaunchBox,
        content_roots: &["LaunchBox", ""],
        rom_dirs: &["Games/{platform}"],
        container_paths: &["Data/Platforms/{platform}.xml"],
        asset_slots: LAUNCHBOX_IMAGE_SLOTS,
        supported_fields: LAUNCHBOX_FIELDS,
    },
    EcosystemDescriptor {
        id: "launchbox_sqlite",
        name: "LaunchBox (SQLite library)",
        parent: Some("launchbox"),
        fingerprints: &[
            FingerprintRule {
                key: "launchbox_exe",
                kind: RuleKind::PathExists(&[
                    "LaunchBox.exe",
                    "LaunchBox/LaunchBox.exe",
                    "Core/LaunchBox.exe",
                ]),
                tier: Tier::Unique,
            },
            FingerprintRule {
                key: "launchbox_database",
                kind: RuleKind::PathPattern(&[
                    "Data/*.sqlite",
                    "Data/*.db",
                    "LaunchBox/Data/*.sqlite",
                    "LaunchBox/Data/*.db",
                ]),
                tier: Tier::Container,
            },
            FingerprintRule {
                key: "launchbox_images",
                kind: RuleKind::PathPattern(&[
                    "Images/*/Box - Front",
                    "LaunchBox/Images/*/Box - Front",
                ]),
                tier: Tier::Layout,
            },
            FingerprintRule {
                key: "games_dir",
                kind: RuleKind::PathExists(&["Games", "LaunchBox/Games"]),
                tier: Tier::Naming,
            },
        ],
        container: MetadataContainer::Sqlite,
        layout: AssetLayout::TypedSubfolderCentral,
        title_driven: true,
        honors_explicit_references: true,
        references: PathReferences::ContentRelative,
        label_family: LabelFamily::LaunchBox,
        content_roots: &["LaunchBox", ""],
        rom_dirs: &["Games/{platform}"],
        container_paths: &["Data/LaunchBox.sqlite", "Data/LaunchBox.db"],
        asset_slots: LAUNCHBOX_IMAGE_SLOTS,
        supported_fields: &[
            MetadataField::Title,
            MetadataField::SortTitle,
            MetadataField::ReleaseDate,
            MetadataField::Genres,
            MetadataField::Developer,
            MetadataField::Publisher,
            MetadataField::Rating,
            MetadataField::PlayCount,
            MetadataField::LastPlayed,
            MetadataField::Favorite,
            MetadataField::Description,
        ],
    },
    EcosystemDescriptor {
        id: "retroarch",
        name: "RetroArch",
        parent: None,
        fingerprints: &[
            FingerprintRule {
                key: "retroarch_cfg",
                kind: RuleKind::PathExists(&["retroarch.cfg", "config/retroarch.cfg"]),
                tier: Tier::Unique,
            },
            FingerprintRule {
                key: "lpl_playlist",
                kind: RuleKind::FileGlob("*.lpl"),
                tier: Tier::Container,
            },
            FingerprintRule {
                key: "named_thumbnails",
                kind: RuleKind::PathPattern(&[
                    "thumbnails/*/Named_Boxarts",
                    "thumbnails/*/Named_Snaps",
                ]),
                tier: Tier::Layout,
            },
            FingerprintRule {
                key: "playlists_dir",
                kind: RuleKind::PathExists(&["playlists"]),
                tier: Tier::Naming,
            },
        ],
        container: MetadataContainer::Playlist,
        layout: AssetLayout::TypedSubfolderPerPlatform,
        title_driven: true,
        honors_explicit_references: false,
        references: PathReferences::Absolute,
        label_family: LabelFamily::RetroArch,
        content_roots: &[""],
        rom_dirs: &["roms/{platform}"],
        container_paths: &["playlists/{platform}.lpl", "{platform}.lpl"],
        asset_slots: &[
            AssetSlot {
                asset_type: AssetType::BoxFront,
                folder: "thumbnails/{platform}/Named_Boxarts",
                naming: SlotNaming::Title { index: false },
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::ScreenshotGameplay,
                folder: "thumbnails/{platform}/Named_Snaps",
                naming: SlotNaming::Title { index: false },
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::ScreenshotTitle,
                folder: "thumbnails/{platform}/Named_Titles",
                naming: SlotNaming::Title { index: false },
                tag: None,
            },
            AssetSlot {
                asset_type: AssetType::Logo,
                folder: "thumbnails/{platform}/Named_Logos",
                naming: SlotNaming::Title { index: false },
                tag: None,
            },
        ],
        supported_fields: &[MetadataField::Title],
    },
    EcosystemDescriptor {
        id: "attract_mode",
        name: "Attract-Mode",
        parent: None,
        fingerprints: &[
            FingerprintRule {
                key: "attract_cfg",
                kind: RuleKind::PathExists(&["attract.cfg"]),
                tier: Tier::Unique,
            },
            FingerprintRule {
                key: "romlists",
                kind: RuleKind::ContentSignature {
                    files: &["romlists/*.txt"],
                    needle: "#Name;Title;Emulator",
                },
                tier: Tier::Container,
            },
            FingerprintRule {
                key: "scraper_art",
                kind: RuleKind::PathExists(&["scraper"]),
                tier: Tier::Layout,
            },
            FingerprintRule {
                key: "emulators_dir",
                kind: RuleKind::PathExists(&["emulators"]),
                tier: Tier::Naming,
            },
        ],
        container: MetadataContainer::Plaintext,
        layout: AssetLayout::TypedSubfolderPerPlatform,
        title_driven: false,
        honors_explicit_references: false,
        references: PathReferences::Bare,
        label_family: LabelFamily::AttractMode,
        content_roots: &[""],
        rom_dirs: &["roms/{platform}"],
        container_paths: &["romlists/{platform}.txt"],
        asset_slots: &[
            AssetSlot {
                asset_type: AssetType::BoxFront,
                folder: "scraper/{platform}/flyer",
                naming: SlotNaming::Mirror,
                tag: Some("flyer"),
            },
            AssetSlot {
                asset_type: AssetType::ScreenshotGameplay,
                folder: "scraper/{platform}/snap",
                naming: SlotNaming::Mirror,
                tag: Some("snap"),
            },
            AssetSlot {
                asset_type: AssetType::Marquee,
                folder: "scraper/{platform}/marquee",
                naming: SlotNaming::Mirror,
                tag: Some("marquee"),
            },
            AssetSlot {
                asset_type: AssetType::Wheel,
                folder: "scraper/{platform}/wheel",
                naming: SlotNaming::Mirror,
                tag: Some("wheel"),
            },
            AssetSlot {
                asset_type: AssetType::Fanart,
                folder: "scraper/{platform}/fanart",
                naming: SlotNaming::Mirror,
                tag: Some("fanart"),
            },
            AssetSlot {
                asset_type: AssetType::Video,
                folder: "scraper/{platform}/video",
                naming: SlotNaming::Mirror,
                tag: Some("video"),
            },
        ],
        supported_fields: &[
            MetadataField::Title,
            MetadataField::ReleaseYear,
            MetadataField::Developer,
            MetadataField::Genres,
            MetadataField::Players,
        ],
    },
    EcosystemDescriptor {
        id: "onionos",
        name: "OnionOS",
        parent: None,
        fingerprints: &[
            FingerprintRule {
                key: "onion_runtime",
                kind: RuleKind::PathExists(&[".tmp_update"]),
                tier: Tier::Unique,
            },
            FingerprintRule {
                key: "miyoo_gamelist",
                kind: RuleKind::FileGlob("miyoogamelist.xml"),
                tier: Tier::Container,
            },
            FingerprintRule {
                key: "imgs_dirs",
                kind: RuleKind::PathPattern(&["Roms/*/Imgs"]),
                tier: Tier::Layout,
            },
            FingerprintRule {
                key: "bios_dir",
                kind: RuleKind::PathExists(&["BIOS"]),
                tier: Tier::Naming,
            },
        ],
        container: MetadataContainer::FilenameOnly,
        layout: AssetLayout::FilenameMirror,
        title_driven: false,
        honors_explicit_references: false,
        references: PathReferences::Bare,
        label_family: LabelFamily::OnionOs,
        content_roots: &[""],
        rom_dirs: &["Roms/{platform}"],
        container_paths: &[],
        asset_slots: &[AssetSlot {
            asset_type: AssetType::BoxFront,
            folder: "Roms/{platform}/Imgs",
            naming: SlotNaming::Mirror,
            tag: None,
        }],
        supported_fields: &[],
    },
];

static BUILTIN: EcosystemRegistry = EcosystemRegistry {
    descriptors: &DESCRIPTORS,
};

/// Catalog of known ecosystems
#[derive(Debug)]
pub struct EcosystemRegistry {
    descriptors: &'static [EcosystemDescriptor],
}

impl EcosystemRegistry {
    /// The built-in registry
    pub fn builtin() -> &'static EcosystemRegistry {
        &BUILTIN
    }

    pub fn all(&self) -> &'static [EcosystemDescriptor] {
        self.descriptors
    }

    pub fn get(&self, id: &str) -> Option<&'static EcosystemDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.descriptors.iter().map(|d| d.id).collect()
    }

    /// Whether `ancestor` is a (transitive) parent of `id`
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        let mut current = self.get(id).and_then(|d| d.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.get(parent).and_then(|d| d.parent);
        }
        false
    }

    /// Whether two descriptors belong to the same family line
    pub fn related(&self, a: &str, b: &str) -> bool {
        a == b || self.is_ancestor(a, b) || self.is_ancestor(b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_are_unique() {
        let mut ids = EcosystemRegistry::builtin().ids();
        let count = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }

    #[test]
    fn test_parents_exist() {
        let registry = EcosystemRegistry::builtin();
        for descriptor in registry.all() {
            if let Some(parent) = descriptor.parent {
                assert!(registry.get(parent).is_some(), "missing parent {parent}");
            }
        }
    }

    #[test]
    fn test_family_relations() {
        let registry = EcosystemRegistry::builtin();
        assert!(registry.is_ancestor("es_classic", "batocera"));
        assert!(registry.related("batocera", "es_classic"));
        assert!(!registry.related("batocera", "es_de"));
        assert!(!registry.related("launchbox", "retroarch"));
    }

    #[test]
    fn test_every_descriptor_has_a_unique_tier_rule() {
        for descriptor in EcosystemRegistry::builtin().all() {
            assert!(
                descriptor.fingerprints.iter().any(|r| r.tier == Tier::Unique),
                "{} has no unique marker",
                descriptor.id
            );
        }
    }

    #[test]
    fn test_es_de_media_has_no_reference_tags() {
        let es_de = EcosystemRegistry::builtin().get("es_de").unwrap();
        assert!(es_de.asset_slots.iter().all(|s| s.tag.is_none()));
        assert!(!es_de.honors_explicit_references);
    }

    #[test]
    fn test_folder_is_dedicated() {
        let batocera = EcosystemRegistry::builtin().get("batocera").unwrap();
        let image = batocera.slot(AssetType::BoxFront).unwrap();
        let video = batocera.slot(AssetType::Video).unwrap();
        assert!(!batocera.folder_is_dedicated(image));
        assert!(batocera.folder_is_dedicated(video));
    }

    #[test]
    fn test_expand_template() {
        assert_eq!(
            expand_template("downloaded_media/{platform}/covers", "snes"),
            "downloaded_media/snes/covers"
        );
    }
}
