//! Batch configuration files driving input selection and output layout

use batch_bgremove::{AddOutcome, BatchConfig, FileSelection, OutputLayout};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"x").unwrap();
}

#[test]
fn test_config_file_controls_extensions_and_recursion() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("batch.json");
    fs::write(
        &config_path,
        r#"{
            "output_dir": "cutouts",
            "extensions": [".WEBP", "png"],
            "recursive": true,
            "pattern": "shot_*"
        }"#,
    )
    .unwrap();

    let config = BatchConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.normalized_extensions(), vec!["webp", "png"]);
    assert_eq!(config.execution_provider, "onnx:auto");

    let photos = temp.path().join("photos");
    touch(&photos.join("shot_2.png"));
    touch(&photos.join("day1/shot_1.webp"));
    touch(&photos.join("day1/other.png"));
    touch(&photos.join("shot_3.jpg"));

    let mut selection = FileSelection::new(config.normalized_extensions());
    let summary = selection
        .add_inputs(
            &[photos.display().to_string()],
            config.recursive,
            config.pattern.as_deref(),
        )
        .unwrap();

    assert_eq!(summary.added, 2);
    assert_eq!(selection.display_names(), vec!["shot_1.webp", "shot_2.png"]);

    let layout = OutputLayout::new(&config.output_dir);
    let outputs: Vec<PathBuf> = selection.iter().map(|f| layout.path_for(&f.path)).collect();
    assert_eq!(
        outputs,
        vec![PathBuf::from("cutouts/shot_1.png"), PathBuf::from("cutouts/shot_2.png")]
    );
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let temp = TempDir::new().unwrap();

    let bad_provider = temp.path().join("provider.json");
    fs::write(&bad_provider, r#"{ "execution_provider": "quantum:cpu" }"#).unwrap();
    assert!(BatchConfig::from_json_file(&bad_provider).is_err());

    let no_extensions = temp.path().join("extensions.json");
    fs::write(&no_extensions, r#"{ "extensions": [] }"#).unwrap();
    assert!(BatchConfig::from_json_file(&no_extensions).is_err());

    assert!(BatchConfig::from_json_file(temp.path().join("missing.json")).is_err());
}

#[test]
fn test_selection_reuse_after_clear() {
    let temp = TempDir::new().unwrap();
    let image = temp.path().join("a.jpg");
    touch(&image);

    let mut selection = FileSelection::default();
    assert_eq!(selection.add(&image), AddOutcome::Added);
    assert_eq!(selection.add(&image), AddOutcome::Duplicate);

    selection.clear();
    assert!(selection.is_empty());
    assert_eq!(selection.add(&image), AddOutcome::Added);
}
