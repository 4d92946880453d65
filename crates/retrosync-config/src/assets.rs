//! Asset types and the metadata fields a container can carry

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media asset attached to a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    BoxFront,
    BoxBack,
    BoxSpine,
    Disc,
    ScreenshotGameplay,
    ScreenshotTitle,
    ScreenshotMenu,
    Marquee,
    Wheel,
    Logo,
    Fanart,
    Background,
    Miximage,
    Video,
    Manual,
    Bezel,
    OverlayCfg,
}

/// Image file extensions, in lookup order
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp"];

/// Video file extensions, in lookup order
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov"];

/// Manual file extensions, in lookup order
pub const MANUAL_EXTENSIONS: &[&str] = &["pdf", "cbz", "cbr"];

impl AssetType {
    pub const ALL: [AssetType; 17] = [
        AssetType::BoxFront,
        AssetType::BoxBack,
        AssetType::BoxSpine,
        AssetType::Disc,
        AssetType::ScreenshotGameplay,
        AssetType::ScreenshotTitle,
        AssetType::ScreenshotMenu,
        AssetType::Marquee,
        AssetType::Wheel,
        AssetType::Logo,
        AssetType::Fanart,
        AssetType::Background,
        AssetType::Miximage,
        AssetType::Video,
        AssetType::Manual,
        AssetType::Bezel,
        AssetType::OverlayCfg,
    ];

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::BoxFront => "box_front",
            AssetType::BoxBack => "box_back",
            AssetType::BoxSpine => "box_spine",
            AssetType::Disc => "disc",
            AssetType::ScreenshotGameplay => "screenshot_gameplay",
            AssetType::ScreenshotTitle => "screenshot_title",
            AssetType::ScreenshotMenu => "screenshot_menu",
            AssetType::Marquee => "marquee",
            AssetType::Wheel => "wheel",
            AssetType::Logo => "logo",
            AssetType::Fanart => "fanart",
            AssetType::Background => "background",
            AssetType::Miximage => "miximage",
            AssetType::Video => "video",
            AssetType::Manual => "manual",
            AssetType::Bezel => "bezel",
            AssetType::OverlayCfg => "overlay_cfg",
        }
    }

    /// File extensions accepted for this asset type
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            AssetType::Video => VIDEO_EXTENSIONS,
            AssetType::Manual => MANUAL_EXTENSIONS,
            AssetType::OverlayCfg => &["cfg"],
            _ => IMAGE_EXTENSIONS,
        }
    }

    /// Whether a file extension is acceptable for this asset type
    pub fn accepts_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.extensions().iter().any(|e| *e == ext)
    }

    /// Types that may stand in for this one when a target has a slot the source
    /// never filled. Ordered by preference.
    pub fn substitutes(&self) -> &'static [AssetType] {
        match self {
            AssetType::BoxFront => &[AssetType::Miximage, AssetType::ScreenshotTitle],
            AssetType::ScreenshotGameplay => &[AssetType::ScreenshotTitle, AssetType::ScreenshotMenu],
            AssetType::ScreenshotTitle => &[AssetType::ScreenshotGameplay],
            AssetType::Marquee => &[AssetType::Wheel, AssetType::Logo],
            AssetType::Wheel => &[AssetType::Logo, AssetType::Marquee],
            AssetType::Logo => &[AssetType::Wheel, AssetType::Marquee],
            AssetType::Fanart => &[AssetType::Background],
            AssetType::Background => &[AssetType::Fanart],
            AssetType::Miximage => &[AssetType::BoxFront],
            _ => &[],
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical metadata fields, used to describe what a container can represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    Title,
    SortTitle,
    /// Full release date
    ReleaseDate,
    /// Release year only
    ReleaseYear,
    Genres,
    Developer,
    Publisher,
    Rating,
    PlayCount,
    LastPlayed,
    Favorite,
    Hidden,
    Description,
    Players,
}

impl MetadataField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Title => "title",
            MetadataField::SortTitle => "sort_title",
            MetadataField::ReleaseDate => "release_date",
            MetadataField::ReleaseYear => "release_year",
            MetadataField::Genres => "genres",
            MetadataField::Developer => "developer",
            MetadataField::Publisher => "publisher",
            MetadataField::Rating => "rating",
            MetadataField::PlayCount => "play_count",
            MetadataField::LastPlayed => "last_played",
            MetadataField::Favorite => "favorite",
            MetadataField::Hidden => "hidden",
            MetadataField::Description => "description",
            MetadataField::Players => "players",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_type_names_are_unique() {
        let mut names: Vec<_> = AssetType::ALL.iter().map(|t| t.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), AssetType::ALL.len());
    }

    #[test]
    fn test_extension_acceptance() {
        assert!(AssetType::BoxFront.accepts_extension("PNG"));
        assert!(AssetType::Video.accepts_extension("mp4"));
        assert!(!AssetType::Video.accepts_extension("png"));
        assert!(AssetType::Manual.accepts_extension("pdf"));
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&AssetType::ScreenshotGameplay).unwrap();
        assert_eq!(json, "\"screenshot_gameplay\"");
    }
}
