//! Asset presence checks

use crate::model::{Asset, Verification};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    pub checked: usize,
    pub present: usize,
    pub missing: usize,
}

/// An asset is present when it is a regular, non-empty file
pub fn verify_asset(asset: &mut Asset) -> Verification {
    let present = std::fs::metadata(&asset.file_path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false);
    asset.verified = if present {
        Verification::Present
    } else {
        Verification::Missing
    };
    asset.verified
}

/// Re-check every asset, overwriting earlier results
pub fn verify_assets<'a>(assets: impl IntoIterator<Item = &'a mut Asset>) -> VerifySummary {
    let mut summary = VerifySummary::default();
    for asset in assets {
        summary.checked += 1;
        match verify_asset(asset) {
            Verification::Present => summary.present += 1,
            _ => {
                tracing::debug!("Missing asset {}", asset.file_path.display());
                summary.missing += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssociationMethod;
    use retrosync_config::AssetType;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_verify_assets() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ok.png"), b"png").unwrap();
        fs::write(dir.path().join("empty.png"), b"").unwrap();
        fs::create_dir(dir.path().join("dir.png")).unwrap();

        let mut assets: Vec<Asset> = ["ok.png", "empty.png", "dir.png", "gone.png"]
            .iter()
            .map(|name| {
                Asset::new(
                    AssetType::BoxFront,
                    dir.path().join(name),
                    AssociationMethod::FilenameMirror,
                )
            })
            .collect();

        let summary = verify_assets(assets.iter_mut());
        assert_eq!(
            summary,
            VerifySummary {
                checked: 4,
                present: 1,
                missing: 3
            }
        );
        assert_eq!(assets[0].verified, Verification::Present);
        assert_eq!(assets[1].verified, Verification::Missing);

        // a later pass reflects the new state
        fs::remove_file(dir.path().join("ok.png")).unwrap();
        let summary = verify_assets(assets.iter_mut());
        assert_eq!(summary.present, 0);
    }
}
