//! Integration tests for detection and loading of whole source trees

use retrosync_config::{AssetType, EngineConfig};
use retrosync_library::{
    AnalyzeOptions, AssociationMethod, CancelToken, Detector, IssueSeverity, LibraryError,
    Normalizer, Verification,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builds a source tree on disk
struct SourceTree {
    #[allow(dead_code)]
    temp_dir: TempDir,
    root: PathBuf,
}

impl SourceTree {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        Self { temp_dir, root }
    }

    fn file(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent");
        fs::write(&path, content).expect("Failed to write file");
        path
    }
}

fn normalizer() -> Normalizer {
    let mut config = EngineConfig::default();
    config.worker.threads = 2;
    Normalizer::new(&config).expect("Failed to build normalizer")
}

fn es_de_tree() -> SourceTree {
    let tree = SourceTree::new();
    tree.file("ES-DE/settings/es_settings.xml", b"<?xml version=\"1.0\"?><config/>");
    tree.file(
        "ES-DE/gamelists/snes/gamelist.xml",
        br#"<?xml version="1.0"?>
<gameList>
    <game>
        <path>./Super Mario World (USA).sfc</path>
        <name>Super Mario World</name>
        <developer>Nintendo</developer>
        <releasedate>19901121T000000</releasedate>
        <image>./ignored/elsewhere.png</image>
    </game>
</gameList>"#,
    );
    tree.file("ROMs/snes/Super Mario World (USA).sfc", b"rom");
    tree.file(
        "ES-DE/downloaded_media/snes/covers/Super Mario World (USA).png",
        b"png",
    );
    tree.file(
        "ES-DE/downloaded_media/snes/screenshots/Super Mario World (USA).png",
        b"png",
    );
    tree
}

#[test]
fn test_unique_marker_detects_es_de() {
    let tree = es_de_tree();
    let report = Detector::default().detect(&tree.root);

    let best = report.choose(0.5).expect("detection should succeed");
    assert_eq!(best.id(), "es_de");
    assert!(best.confidence >= 0.8, "confidence {}", best.confidence);
    assert!(report.confidence_of("es_classic") < best.confidence);
}

#[test]
fn test_es_de_child_outranks_es_classic_with_own_evidence() {
    let tree = SourceTree::new();
    tree.file("ES-DE/settings/es_settings.xml", b"<config/>");
    tree.file("roms/snes/gamelist.xml", b"<gameList></gameList>");
    tree.file("roms/snes/Mario.sfc", b"rom");

    let report = Detector::default().detect(&tree.root);
    assert_eq!(report.best().map(|c| c.id()), Some("es_de"));
}

#[test]
fn test_conflicting_unique_markers_are_ambiguous() {
    let tree = SourceTree::new();
    tree.file("retroarch.cfg", b"");
    tree.file("attract.cfg", b"");

    let report = Detector::default().detect(&tree.root);
    match report.choose(0.5) {
        Err(LibraryError::DetectionAmbiguous { confidence, .. }) => {
            assert!(confidence < 0.5)
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn test_empty_root_is_ambiguous() {
    let tree = SourceTree::new();
    let err = normalizer()
        .analyze(&tree.root, &AnalyzeOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        LibraryError::DetectionAmbiguous { best: None, .. }
    ));
}

#[test]
fn test_analyze_es_de_library() {
    let tree = es_de_tree();
    let library = normalizer()
        .analyze(&tree.root, &AnalyzeOptions::default())
        .expect("analyze should succeed");

    assert_eq!(library.source_ecosystem, "es_de");
    let snes = library.system("snes").expect("snes system");
    assert_eq!(snes.games.len(), 1);
    assert!(!snes.needs_mapping);

    let game = &snes.games[0];
    assert_eq!(game.title, "Super Mario World");
    assert_eq!(game.rom_path, PathBuf::from("Super Mario World (USA).sfc"));
    assert_eq!(game.metadata.developer.as_deref(), Some("Nintendo"));

    // explicit references are not honoured by ES-DE; media comes from mirrored names
    let cover = &game.assets[&AssetType::BoxFront];
    assert_eq!(cover.association, AssociationMethod::FilenameMirror);
    assert!(cover.file_path.ends_with("covers/Super Mario World (USA).png"));
    assert_eq!(cover.verified, Verification::Present);
    assert!(game.assets.contains_key(&AssetType::ScreenshotGameplay));
}

#[test]
fn test_malformed_gamelist_is_isolated_to_its_system() {
    let tree = SourceTree::new();
    tree.file(".emulationstation/es_systems.cfg", b"<systemList/>");
    tree.file(
        "roms/snes/gamelist.xml",
        b"<gameList><game><path>./Mario.sfc</path><name>Mario</name></game></gameList>",
    );
    tree.file("roms/snes/Mario.sfc", b"rom");
    tree.file("roms/nes/gamelist.xml", b"<gameList><game><path>./Contra.nes");
    tree.file("roms/nes/Contra.nes", b"rom");

    let library = normalizer()
        .analyze(&tree.root, &AnalyzeOptions::default())
        .expect("analyze should succeed");

    assert_eq!(library.source_ecosystem, "es_classic");
    assert!(library.system("snes").is_some());
    assert!(library.system("nes").is_none());

    let errors: Vec<_> = library
        .issues
        .iter()
        .filter(|i| i.severity == IssueSeverity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].system_label, "nes");
}

#[test]
fn test_forced_ecosystem_skips_detection_threshold() {
    let tree = SourceTree::new();
    tree.file("Roms/GB/Tetris (World).gb", b"rom");
    tree.file("Roms/GB/Imgs/Tetris (World).png", b"png");

    let options = AnalyzeOptions {
        forced_ecosystem: Some("onionos".to_string()),
        ..AnalyzeOptions::default()
    };
    let library = normalizer()
        .analyze(&tree.root, &options)
        .expect("forced analyze should succeed");

    assert_eq!(library.source_ecosystem, "onionos");
    let gb = library.system("gb").expect("gb system");
    assert_eq!(gb.source_platform_label, "GB");
    assert_eq!(gb.games[0].title, "Tetris");
    assert!(gb.games[0].assets.contains_key(&AssetType::BoxFront));
}

#[test]
fn test_cancelled_analysis() {
    let tree = es_de_tree();
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = normalizer()
        .with_cancel(cancel)
        .analyze(&tree.root, &AnalyzeOptions::default())
        .unwrap_err();
    assert!(matches!(err, LibraryError::Cancelled));
}

#[test]
fn test_unknown_platform_needs_mapping() {
    let tree = SourceTree::new();
    tree.file(".emulationstation/es_systems.cfg", b"<systemList/>");
    tree.file("roms/weirdbox/Game.zip", b"rom");

    let library = normalizer()
        .analyze(&tree.root, &AnalyzeOptions::default())
        .expect("analyze should succeed");
    let unmapped: Vec<_> = library.unmapped_systems().collect();
    assert_eq!(unmapped.len(), 1);
    assert_eq!(unmapped[0].system_id, "weirdbox");
    assert!(Path::new(&unmapped[0].rom_root).ends_with("roms/weirdbox"));
}
