//! RetroArch JSON playlist writer

use super::{TargetSystem, WrittenGame, Writer, replace_file};
use crate::ConvertError;
use retrosync_config::MetadataContainer;
use retrosync_library::loaders::PlaylistItem;
use retrosync_library::model::StableKey;
use retrosync_library::paths::{lexical_normalize, to_slash};
use serde::Serialize;
use std::path::PathBuf;

/// Core fields RetroArch resolves itself on first launch
const DETECT: &str = "DETECT";
const PLAYLIST_VERSION: &str = "1.5";

#[derive(Debug, Serialize)]
struct PlaylistDocument {
    version: &'static str,
    default_core_path: String,
    default_core_name: String,
    label_display_mode: u8,
    right_thumbnail_mode: u8,
    left_thumbnail_mode: u8,
    sort_mode: u8,
    items: Vec<PlaylistItem>,
}

/// Writes `playlists/<label>.lpl`
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaylistWriter;

impl PlaylistWriter {
    pub fn render(&self, target: &TargetSystem, games: &[WrittenGame]) -> Result<Vec<u8>, ConvertError> {
        let db_name = format!("{}.lpl", target.label);
        let items = games
            .iter()
            .map(|written| {
                let crc = match &written.game.stable_key {
                    StableKey::Checksum { algorithm, value } if algorithm == "crc32" => {
                        value.to_uppercase()
                    }
                    _ => "00000000".to_string(),
                };
                PlaylistItem {
                    path: to_slash(&lexical_normalize(&written.rom)),
                    label: written.game.title.clone(),
                    core_path: DETECT.to_string(),
                    core_name: DETECT.to_string(),
                    crc32: format!("{crc}|crc"),
                    db_name: db_name.clone(),
                }
            })
            .collect();

        let document = PlaylistDocument {
            version: PLAYLIST_VERSION,
            default_core_path: String::new(),
            default_core_name: String::new(),
            label_display_mode: 0,
            right_thumbnail_mode: 0,
            left_thumbnail_mode: 0,
            sort_mode: 0,
            items,
        };
        let mut bytes = serde_json::to_vec_pretty(&document)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

impl Writer for PlaylistWriter {
    fn container(&self) -> MetadataContainer {
        MetadataContainer::Playlist
    }

    fn write(&self, target: &TargetSystem, games: &[WrittenGame]) -> Result<Vec<PathBuf>, ConvertError> {
        let Some(path) = &target.container_path else {
            return Ok(Vec::new());
        };
        replace_file(path, &self.render(target, games)?)?;
        Ok(vec![path.clone()])
    }
}
