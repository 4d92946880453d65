//! Platform label table
//!
//! Maps the many names front-ends use for a platform onto one canonical system id, and
//! back onto the label a given ecosystem family expects.

use crate::ecosystems::LabelFamily;

/// One known platform
#[derive(Debug)]
pub struct Platform {
    /// Canonical id, also the EmulationStation folder name
    pub id: &'static str,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub launchbox: Option<&'static str>,
    pub retroarch: Option<&'static str>,
    pub attract_mode: Option<&'static str>,
    pub onionos: Option<&'static str>,
}

impl Platform {
    /// Label used by an ecosystem family
    pub fn label(&self, family: LabelFamily) -> Option<&'static str> {
        match family {
            LabelFamily::EmulationStation => Some(self.id),
            LabelFamily::LaunchBox => self.launchbox,
            LabelFamily::RetroArch => self.retroarch,
            LabelFamily::AttractMode => self.attract_mode,
            LabelFamily::OnionOs => self.onionos,
        }
    }

    /// Id, aliases and every family's label
    pub fn labels(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.id)
            .chain(self.aliases.iter().copied())
            .chain(self.launchbox)
            .chain(self.retroarch)
            .chain(self.attract_mode)
            .chain(self.onionos)
    }
}

macro_rules! platform {
    ($id:literal, $name:literal, [$($alias:literal),*], $lb:expr, $ra:expr, $am:expr, $onion:expr) => {
        Platform {
            id: $id,
            name: $name,
            aliases: &[$($alias),*],
            launchbox: $lb,
            retroarch: $ra,
            attract_mode: $am,
            onionos: $onion,
        }
    };
}

static PLATFORMS: &[Platform] = &[
    platform!("nes", "Nintendo Entertainment System", ["famicom", "nintendo_entertainment_system"],
        Some("Nintendo Entertainment System"), Some("Nintendo - Nintendo Entertainment System"),
        Some("Nintendo Entertainment System"), Some("FC")),
    platform!("fds", "Famicom Disk System", ["famicom_disk_system"],
        Some("Nintendo Famicom Disk System"), Some("Nintendo - Family Computer Disk System"),
        Some("Famicom Disk System"), Some("FDS")),
    platform!("snes", "Super Nintendo", ["super_nintendo", "super_famicom", "sfam"],
        Some("Super Nintendo Entertainment System"),
        Some("Nintendo - Super Nintendo Entertainment System"), Some("Super Nintendo"),
        Some("SFC")),
    platform!("n64", "Nintendo 64", ["nintendo64"],
        Some("Nintendo 64"), Some("Nintendo - Nintendo 64"), Some("Nintendo 64"), None),
    platform!("gb", "Game Boy", ["gameboy"],
        Some("Nintendo Game Boy"), Some("Nintendo - Game Boy"), Some("Game Boy"), Some("GB")),
    platform!("gbc", "Game Boy Color", ["gameboy_color"],
        Some("Nintendo Game Boy Color"), Some("Nintendo - Game Boy Color"),
        Some("Game Boy Color"), Some("GBC")),
    platform!("gba", "Game Boy Advance", ["gameboy_advance"],
        Some("Nintendo Game Boy Advance"), Some("Nintendo - Game Boy Advance"),
        Some("Game Boy Advance"), Some("GBA")),
    platform!("nds", "Nintendo DS", ["ds"],
        Some("Nintendo DS"), Some("Nintendo - Nintendo DS"), Some("Nintendo DS"), Some("NDS")),
    platform!("virtualboy", "Virtual Boy", ["vb"],
        Some("Nintendo Virtual Boy"), Some("Nintendo - Virtual Boy"), Some("Virtual Boy"),
        Some("VB")),
    platform!("gamecube", "GameCube", ["gc", "ngc"],
        Some("Nintendo GameCube"), Some("Nintendo - GameCube"), Some("GameCube"), None),
    platform!("wii", "Wii", [],
        Some("Nintendo Wii"), Some("Nintendo - Wii"), Some("Wii"), None),
    platform!("mastersystem", "Master System", ["sms", "sega_master_system"],
        Some("Sega Master System"), Some("Sega - Master System - Mark III"),
        Some("Master System"), Some("MS")),
    platform!("megadrive", "Mega Drive", ["genesis", "sega_genesis", "mega_drive", "sega_mega_drive"],
        Some("Sega Genesis"), Some("Sega - Mega Drive - Genesis"), Some("Mega Drive"),
        Some("MD")),
    platform!("segacd", "Sega CD", ["megacd", "mega_cd"],
        Some("Sega CD"), Some("Sega - Mega-CD - Sega CD"), Some("Sega CD"), Some("SEGACD")),
    platform!("sega32x", "Sega 32X", ["32x"],
        Some("Sega 32X"), Some("Sega - 32X"), Some("32X"), Some("THIRTYTWOX")),
    platform!("saturn", "Saturn", ["sega_saturn"],
        Some("Sega Saturn"), Some("Sega - Saturn"), Some("Saturn"), None),
    platform!("dreamcast", "Dreamcast", ["dc", "sega_dreamcast"],
        Some("Sega Dreamcast"), Some("Sega - Dreamcast"), Some("Dreamcast"), None),
    platform!("gamegear", "Game Gear", ["gg", "game_gear"],
        Some("Sega Game Gear"), Some("Sega - Game Gear"), Some("Game Gear"), Some("GG")),
    platform!("psx", "PlayStation", ["ps1", "playstation"],
        Some("Sony Playstation"), Some("Sony - PlayStation"), Some("PlayStation"), Some("PS")),
    platform!("ps2", "PlayStation 2", ["playstation_2", "playstation2"],
        Some("Sony Playstation 2"), Some("Sony - PlayStation 2"), Some("PlayStation 2"), None),
    platform!("psp", "PlayStation Portable", ["playstation_portable"],
        Some("Sony PSP"), Some("Sony - PlayStation Portable"), Some("PSP"), Some("PSP")),
    platform!("pcengine", "PC Engine", ["pce", "tg16", "turbografx16", "turbografx_16"],
        Some("NEC TurboGrafx-16"), Some("NEC - PC Engine - TurboGrafx 16"),
        Some("PC Engine"), Some("PCE")),
    platform!("neogeo", "Neo Geo", ["neo_geo"],
        Some("SNK Neo Geo AES"), Some("SNK - Neo Geo"), Some("Neo Geo"), Some("NEOGEO")),
    platform!("ngpc", "Neo Geo Pocket Color", ["ngp", "neo_geo_pocket_color"],
        Some("SNK Neo Geo Pocket Color"), Some("SNK - Neo Geo Pocket Color"),
        Some("Neo Geo Pocket Color"), Some("NGP")),
    platform!("atari2600", "Atari 2600", ["a2600"],
        Some("Atari 2600"), Some("Atari - 2600"), Some("Atari 2600"), Some("ATARI")),
    platform!("atari7800", "Atari 7800", ["a7800"],
        Some("Atari 7800"), Some("Atari - 7800"), Some("Atari 7800"), Some("SEVENTYEIGHTHUNDRED")),
    platform!("lynx", "Atari Lynx", ["atari_lynx"],
        Some("Atari Lynx"), Some("Atari - Lynx"), Some("Lynx"), Some("LYNX")),
    platform!("wonderswan", "WonderSwan", ["ws"],
        Some("WonderSwan"), Some("Bandai - WonderSwan"), Some("WonderSwan"), Some("WS")),
    platform!("wonderswancolor", "WonderSwan Color", ["wsc"],
        Some("WonderSwan Color"), Some("Bandai - WonderSwan Color"),
        Some("WonderSwan Color"), None),
    platform!("colecovision", "ColecoVision", ["coleco"],
        Some("ColecoVision"), Some("Coleco - ColecoVision"), Some("ColecoVision"),
        Some("COLECO")),
    platform!("msx", "MSX", [],
        Some("Microsoft MSX"), Some("Microsoft - MSX"), Some("MSX"), Some("MSX")),
    platform!("c64", "Commodore 64", ["commodore_64"],
        Some("Commodore 64"), Some("Commodore - 64"), Some("Commodore 64"), Some("COMMODORE")),
    platform!("amiga", "Amiga", ["commodore_amiga"],
        Some("Commodore Amiga"), Some("Commodore - Amiga"), Some("Amiga"), Some("AMIGA")),
    platform!("dos", "MS-DOS", ["pc", "msdos", "ms_dos"],
        Some("MS-DOS"), Some("DOS"), Some("DOS"), Some("DOS")),
    platform!("arcade", "Arcade", ["fbneo", "fba", "finalburn_neo"],
        Some("Arcade"), Some("FBNeo - Arcade Games"), Some("Arcade"), Some("ARCADE")),
    platform!("mame", "MAME", [],
        None, Some("MAME"), Some("MAME"), None),
];

/// Result of canonicalising a source platform label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPlatform {
    pub system_id: String,
    pub display_name: String,
    /// False when the label is not in the table and was kept verbatim
    pub known: bool,
}

/// Normalise a label for table lookups: lowercase, separators to `_`
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut last_sep = true;
    for ch in label.trim().chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_sep = false;
        } else if ch == '&' {
            if !last_sep {
                out.push('_');
            }
            out.push_str("and_");
            last_sep = true;
        } else if !last_sep {
            out.push('_');
            last_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Static platform table
#[derive(Debug)]
pub struct PlatformTable {
    platforms: &'static [Platform],
}

static BUILTIN: PlatformTable = PlatformTable {
    platforms: PLATFORMS,
};

impl PlatformTable {
    pub fn builtin() -> &'static PlatformTable {
        &BUILTIN
    }

    pub fn get(&self, id: &str) -> Option<&'static Platform> {
        self.platforms.iter().find(|p| p.id == id)
    }

    /// Look a label up by id, alias, or any family's label
    pub fn lookup(&self, label: &str) -> Option<&'static Platform> {
        let key = normalize_label(label);
        if key.is_empty() {
            return None;
        }
        self.platforms
            .iter()
            .find(|p| p.labels().any(|l| normalize_label(l) == key))
    }

    /// Canonicalise a source label. Unknown labels are kept verbatim.
    pub fn canonicalize(&self, label: &str) -> CanonicalPlatform {
        match self.lookup(label) {
            Some(platform) => CanonicalPlatform {
                system_id: platform.id.to_string(),
                display_name: platform.name.to_string(),
                known: true,
            },
            None => CanonicalPlatform {
                system_id: label.to_string(),
                display_name: label.to_string(),
                known: false,
            },
        }
    }

    /// Label a target family uses for a canonical id
    pub fn label_for(&self, system_id: &str, family: LabelFamily) -> Option<&'static str> {
        self.get(system_id).and_then(|p| p.label(family))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Nintendo - Game Boy"), "nintendo_game_boy");
        assert_eq!(normalize_label("  Sega  Genesis "), "sega_genesis");
        assert_eq!(normalize_label("Arcade & Pinball"), "arcade_and_pinball");
    }

    #[test]
    fn test_canonicalize_across_families() {
        let table = PlatformTable::builtin();
        for label in [
            "snes",
            "SNES",
            "Super Nintendo Entertainment System",
            "Nintendo - Super Nintendo Entertainment System",
            "SFC",
        ] {
            let canonical = table.canonicalize(label);
            assert_eq!(canonical.system_id, "snes", "label {label}");
            assert!(canonical.known);
        }
    }

    #[test]
    fn test_genesis_alias() {
        assert_eq!(
            PlatformTable::builtin().canonicalize("genesis").system_id,
            "megadrive"
        );
    }

    #[test]
    fn test_unknown_label_kept_verbatim() {
        let canonical = PlatformTable::builtin().canonicalize("My Homebrew Box");
        assert_eq!(canonical.system_id, "My Homebrew Box");
        assert!(!canonical.known);
    }

    #[test]
    fn test_label_for_family() {
        let table = PlatformTable::builtin();
        assert_eq!(
            table.label_for("snes", LabelFamily::LaunchBox),
            Some("Super Nintendo Entertainment System")
        );
        assert_eq!(table.label_for("snes", LabelFamily::EmulationStation), Some("snes"));
        assert_eq!(table.label_for("mame", LabelFamily::LaunchBox), None);
        assert_eq!(table.label_for("unknown", LabelFamily::EmulationStation), None);
    }

    #[test]
    fn test_labels_do_not_collide() {
        let table = PlatformTable::builtin();
        for platform in table.platforms {
            for label in platform.labels() {
                let found = table.lookup(label).unwrap();
                assert_eq!(found.id, platform.id, "label {label} is ambiguous");
            }
        }
    }
}
