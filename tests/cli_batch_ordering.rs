//! CLI integration tests for input collection
//!
//! These run the real binary without a model: an unknown cached model ID
//! makes the run stop right after the selection has been logged, and an
//! empty model directory makes every file fail.

#![cfg(feature = "cli")]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_cli(args: &[&str], cache_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_batch-bgremove"))
        .args(args)
        .arg("--cache-dir")
        .arg(cache_dir)
        .env_remove("BGREMOVE_LOG")
        .output()
        .expect("Failed to execute CLI")
}

fn combined_output(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn test_directory_inputs_selected_in_sorted_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let inputs = temp_dir.path().join("inputs");
    fs::create_dir(&inputs).unwrap();
    for name in ["z_last.jpg", "a_first.png", "img10.jpg", "img2.JPG", "notes.txt"] {
        fs::write(inputs.join(name), b"not really an image").unwrap();
    }

    let input_arg = inputs.display().to_string();
    let output = run_cli(
        &["-v", "--model", "someone--missing", &input_arg],
        &temp_dir.path().join("cache"),
    );
    let log_output = combined_output(&output);

    assert!(!output.status.success());
    assert!(
        log_output.contains("Selected: a_first.png, img10.jpg, img2.JPG, z_last.jpg"),
        "unexpected output:\n{}",
        log_output
    );
    assert!(log_output.contains("someone--missing"));
}

#[test]
fn test_no_supported_inputs_fails_before_model_lookup() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let text = temp_dir.path().join("readme.txt");
    fs::write(&text, b"hello").unwrap();

    let text_arg = text.display().to_string();
    let output = run_cli(
        &["--model", "someone--missing", &text_arg],
        &temp_dir.path().join("cache"),
    );
    let log_output = combined_output(&output);

    assert!(!output.status.success());
    assert!(log_output.contains("Please add image files first."));
    assert!(!log_output.contains("someone--missing"));
}

#[test]
fn test_cache_utility_flags_need_no_inputs() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let cache_dir = temp_dir.path().join("cache");

    let output = run_cli(&["--show-cache-dir"], &cache_dir);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&cache_dir.join("models").display().to_string()));
    assert!(stdout.contains("--cache-dir flag"));

    let output = run_cli(&["--list-models"], &cache_dir);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No cached models found."));
}

#[test]
fn test_recursive_run_skips_previous_results() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let inputs = temp_dir.path().join("inputs");
    let previous = inputs.join("output");
    fs::create_dir_all(&previous).unwrap();
    fs::write(inputs.join("a.jpg"), b"not really an image").unwrap();
    fs::write(previous.join("a.png"), b"earlier cutout").unwrap();

    let input_arg = inputs.display().to_string();
    let output_arg = previous.display().to_string();
    let output = run_cli(
        &["-v", "-r", "-o", &output_arg, "--model", "someone--missing", &input_arg],
        &temp_dir.path().join("cache"),
    );
    let log_output = combined_output(&output);

    assert!(log_output.contains("Selected: a.jpg"), "unexpected output:\n{}", log_output);
    assert!(!log_output.contains("a.png"), "unexpected output:\n{}", log_output);
}

#[test]
fn test_each_failure_is_reported_once() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let empty_model = temp_dir.path().join("model");
    let inputs = temp_dir.path().join("inputs");
    fs::create_dir_all(&empty_model).unwrap();
    fs::create_dir_all(&inputs).unwrap();
    fs::write(inputs.join("lonely_cat.jpg"), b"not really an image").unwrap();

    let model_arg = empty_model.display().to_string();
    let input_arg = inputs.join("lonely_cat.jpg").display().to_string();
    let output_arg = temp_dir.path().join("output").display().to_string();

    // Progress bar mode, then plain log mode
    for extra in [None, Some("--no-progress")] {
        let mut args: Vec<&str> = extra.into_iter().collect();
        args.extend(["-o", output_arg.as_str(), "--model", model_arg.as_str(), input_arg.as_str()]);
        let output = run_cli(&args, &temp_dir.path().join("cache"));
        let log_output = combined_output(&output);

        assert!(!output.status.success());
        assert_eq!(
            log_output.matches("lonely_cat.jpg").count(),
            1,
            "unexpected output:\n{}",
            log_output
        );
    }
}
