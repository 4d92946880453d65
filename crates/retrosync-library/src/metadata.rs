//! Game metadata handling

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Descriptive metadata of a game, beyond its title
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub sort_title: Option<String>,
    /// Unknown dates are `None`
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    /// Normalised to 0..1
    pub rating: Option<f32>,
    #[serde(default)]
    pub play_count: u32,
    pub last_played: Option<NaiveDateTime>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub hidden: bool,
    pub description: Option<String>,
    /// Player count as written by the source, e.g. "1-2"
    pub players: Option<String>,
    /// ROM CRC32, lowercase hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crc: Option<String>,
    /// ROM SHA-1, lowercase hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
}

impl GameMetadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if metadata is mostly empty
    pub fn is_empty(&self) -> bool {
        self.release_date.is_none()
            && self.genres.is_empty()
            && self.developer.is_none()
            && self.publisher.is_none()
            && self.description.is_none()
            && self.rating.is_none()
    }

    /// Merge with another metadata (non-empty fields take precedence)
    pub fn merge(&mut self, other: &GameMetadata) {
        if self.sort_title.is_none() {
            self.sort_title = other.sort_title.clone();
        }
        if self.release_date.is_none() {
            self.release_date = other.release_date;
        }
        if self.genres.is_empty() {
            self.genres = other.genres.clone();
        }
        if self.developer.is_none() {
            self.developer = other.developer.clone();
        }
        if self.publisher.is_none() {
            self.publisher = other.publisher.clone();
        }
        if self.rating.is_none() {
            self.rating = other.rating;
        }
        if self.play_count == 0 {
            self.play_count = other.play_count;
        }
        if self.last_played.is_none() {
            self.last_played = other.last_played;
        }
        self.favorite |= other.favorite;
        if self.description.is_none() {
            self.description = other.description.clone();
        }
        if self.players.is_none() {
            self.players = other.players.clone();
        }
        if self.crc.is_none() {
            self.crc = other.crc.clone();
        }
        if self.sha1.is_none() {
            self.sha1 = other.sha1.clone();
        }
    }
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y%m%dT%H%M%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Parse a release date in any of the formats front-ends write. A bare year maps to
/// January 1st; anything else unparseable is unknown.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(dt) = parse_datetime(value) {
        return Some(dt.date());
    }
    // LaunchBox writes offsets, e.g. 1990-11-21T00:00:00-05:00
    if let Some(date) = value.get(..10)
        && let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d")
    {
        return Some(parsed);
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    if value.len() == 4
        && let Ok(year) = value.parse::<i32>()
    {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    None
}

/// Parse a timestamp such as `20240102T030405`
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Parse a rating given on `0..scale` into `0..1`
pub fn parse_rating(value: &str, scale: f32) -> Option<f32> {
    let raw: f32 = value.trim().parse().ok()?;
    if !raw.is_finite() || scale <= 0.0 {
        return None;
    }
    Some((raw / scale).clamp(0.0, 1.0))
}

/// Parse the boolean spellings found in gamelists and LaunchBox XML
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
    )
}

/// Split a genre field on any of the separators, trimming and dropping blanks
pub fn split_genres(value: &str, separators: &[char]) -> Vec<String> {
    value
        .split(|c| separators.contains(&c))
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

/// Non-blank trimmed text
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_merge() {
        let mut meta1 = GameMetadata::new();
        meta1.developer = Some("Nintendo EAD".to_string());

        let mut meta2 = GameMetadata::new();
        meta2.developer = Some("Other".to_string());
        meta2.publisher = Some("Nintendo".to_string());
        meta2.genres = vec!["Platform".to_string()];

        meta1.merge(&meta2);

        assert_eq!(meta1.developer, Some("Nintendo EAD".to_string())); // Original kept
        assert_eq!(meta1.publisher, Some("Nintendo".to_string())); // Merged
        assert_eq!(meta1.genres, vec!["Platform".to_string()]);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(1990, 11, 21);
        assert_eq!(parse_date("19901121T000000"), expected);
        assert_eq!(parse_date("1990-11-21T00:00:00-05:00"), expected);
        assert_eq!(parse_date("1990-11-21"), expected);
        assert_eq!(parse_date("11/21/1990"), expected);
        assert_eq!(parse_date("1990"), NaiveDate::from_ymd_opt(1990, 1, 1));
        assert_eq!(parse_date("soon"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_rating_scales() {
        assert_eq!(parse_rating("0.8", 1.0), Some(0.8));
        assert_eq!(parse_rating("4", 5.0), Some(0.8));
        assert_eq!(parse_rating("7", 5.0), Some(1.0));
        assert_eq!(parse_rating("n/a", 1.0), None);
    }

    #[test]
    fn test_split_genres() {
        assert_eq!(
            split_genres("Action, Platform / Run & Gun", &[',', '/']),
            vec!["Action", "Platform", "Run & Gun"]
        );
        assert!(split_genres(" , ", &[',']).is_empty());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
