//! The batch loop: remove the background from every selected file in order
//!
//! A failing file is recorded and reported, then the loop moves on. Once the
//! loop ends the selection is cleared so the next batch starts empty.

use crate::{
    error::{BgRemovalError, Result},
    output::OutputLayout,
    progress::{ItemOutcome, NoOpProgressReporter, ProcessingStage, ProgressReporter},
    selection::FileSelection,
    types::RemovalResult,
};
use chrono::{DateTime, Utc};
use instant::Instant;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn};

/// Removes the background from a single image file
pub trait ImageRemover {
    /// # Errors
    /// - Any failure loading, segmenting or compositing `input`
    fn remove(&mut self, input: &Path) -> Result<RemovalResult>;
}

/// A file that was processed and saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// A file that could not be processed
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: BgRemovalError,
}

/// Outcome of one batch run
#[derive(Debug)]
pub struct BatchReport {
    /// Number of files the batch tried
    pub attempted: usize,
    pub succeeded: Vec<ProcessedFile>,
    pub failed: Vec<FileFailure>,
    pub output_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl BatchReport {
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// True when every attempted file was saved
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.success_count() == self.attempted
    }

    /// One-line completion message
    #[must_use]
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "Processed {} of {} image(s) into {}",
            self.success_count(),
            self.attempted,
            self.output_dir.display()
        );
        if !self.failed.is_empty() {
            line.push_str(&format!(" ({} failed)", self.failure_count()));
        }
        line.push_str(&format!(" in {:.2}s", self.elapsed.as_secs_f64()));
        line
    }
}

/// Runs a [`FileSelection`] through an [`ImageRemover`]
pub struct BatchRunner {
    layout: OutputLayout,
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    #[must_use]
    pub fn new(layout: OutputLayout) -> Self {
        Self {
            layout,
            reporter: Arc::new(NoOpProgressReporter),
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Process every selected file, then clear the selection
    ///
    /// Per-file errors end up in [`BatchReport::failed`] and do not stop the run.
    ///
    /// # Errors
    /// - `EmptySelection` when nothing is selected; the selection is untouched
    /// - Output directory cannot be created; the selection is untouched
    pub fn run(
        &self,
        selection: &mut FileSelection,
        remover: &mut dyn ImageRemover,
    ) -> Result<BatchReport> {
        if selection.is_empty() {
            return Err(BgRemovalError::EmptySelection);
        }

        self.layout.ensure_dir()?;

        let paths = selection.paths();
        let total = paths.len();
        let span = info_span!("batch", total, output = %self.layout.dir().display());
        let _guard = span.enter();

        for (output, inputs) in self.layout.collisions(paths.iter().map(PathBuf::as_path)) {
            warn!(
                "{} inputs write to {}; later files overwrite earlier ones",
                inputs.len(),
                output.display()
            );
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        self.reporter.batch_started(total);
        info!("Starting batch of {} image(s)", total);

        for (index, input) in paths.into_iter().enumerate() {
            let item_span = info_span!("item", index, file = %input.display());
            let _item_guard = item_span.enter();

            self.reporter.item_started(index, total, &input);

            match self.process_one(remover, &input) {
                Ok(output) => {
                    self.reporter
                        .item_finished(index, &input, ItemOutcome::Saved(&output));
                    info!("Saved {}", output.display());
                    succeeded.push(ProcessedFile { input, output });
                },
                Err(error) => {
                    self.reporter
                        .item_finished(index, &input, ItemOutcome::Failed(&error));
                    debug!("Failed to process {}: {}", input.display(), error);
                    failed.push(FileFailure { path: input, error });
                },
            }
        }

        let report = BatchReport {
            attempted: total,
            succeeded,
            failed,
            output_dir: self.layout.dir().to_path_buf(),
            started_at,
            elapsed: start.elapsed(),
        };

        self.reporter.batch_finished(&report);
        info!("{}", report.summary_line());
        selection.clear();

        Ok(report)
    }

    fn process_one(&self, remover: &mut dyn ImageRemover, input: &Path) -> Result<PathBuf> {
        let result = remover.remove(input)?;
        self.reporter.report_stage(ProcessingStage::FileSaving);
        self.layout.save(&result, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::tests::RecordingReporter;
    use crate::types::{ProcessingTimings, SegmentationMask};
    use image::{Rgba, RgbaImage};
    use std::fs;
    use tempfile::TempDir;

    /// Remover failing on file names containing "bad"
    struct StubRemover {
        calls: Vec<PathBuf>,
    }

    impl ImageRemover for StubRemover {
        fn remove(&mut self, input: &Path) -> Result<RemovalResult> {
            self.calls.push(input.to_path_buf());
            if input.to_string_lossy().contains("bad") {
                return Err(BgRemovalError::processing("cannot segment"));
            }
            Ok(RemovalResult {
                image: RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255])),
                mask: SegmentationMask::new(vec![255; 4], (2, 2)),
                original_dimensions: (2, 2),
                timings: ProcessingTimings::default(),
            })
        }
    }

    fn selection_with(dir: &Path, names: &[&str]) -> FileSelection {
        let mut selection = FileSelection::default();
        for name in names {
            let path = dir.join(name);
            fs::write(&path, b"x").unwrap();
            selection.add(path);
        }
        selection
    }

    #[test]
    fn test_empty_selection_is_rejected_without_side_effects() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let runner = BatchRunner::new(OutputLayout::new(&out));
        let mut remover = StubRemover { calls: Vec::new() };

        let err = runner
            .run(&mut FileSelection::default(), &mut remover)
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::EmptySelection));
        assert!(!out.exists());
        assert!(remover.calls.is_empty());
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let mut selection = selection_with(temp.path(), &["a.jpg", "bad.jpg", "c.png"]);
        let reporter = Arc::new(RecordingReporter::default());
        let runner = BatchRunner::new(OutputLayout::new(&out)).with_reporter(reporter.clone());
        let mut remover = StubRemover { calls: Vec::new() };

        let report = runner.run(&mut selection, &mut remover).unwrap();

        assert_eq!(remover.calls.len(), 3);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.is_complete_success());
        assert_eq!(report.failed[0].path, temp.path().join("bad.jpg"));
        assert!(out.join("a.png").is_file());
        assert!(out.join("c.png").is_file());
        assert!(!out.join("bad.png").exists());
        assert!(selection.is_empty());

        let events = reporter.events();
        assert_eq!(events.first().map(String::as_str), Some("start 3"));
        assert!(events.contains(&"done 1 failed".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("finish 2/3"));
    }

    #[test]
    fn test_files_processed_in_selection_order() {
        let temp = TempDir::new().unwrap();
        let mut selection = selection_with(temp.path(), &["z.jpg", "a.jpg", "m.jpg"]);
        let expected = selection.paths();
        let runner = BatchRunner::new(OutputLayout::new(temp.path().join("out")));
        let mut remover = StubRemover { calls: Vec::new() };

        let report = runner.run(&mut selection, &mut remover).unwrap();
        assert_eq!(remover.calls, expected);
        assert!(report.is_complete_success());
        let inputs: Vec<_> = report.succeeded.iter().map(|p| p.input.clone()).collect();
        assert_eq!(inputs, expected);
    }

    #[test]
    fn test_summary_line() {
        let report = BatchReport {
            attempted: 4,
            succeeded: vec![ProcessedFile {
                input: PathBuf::from("a.jpg"),
                output: PathBuf::from("output/a.png"),
            }],
            failed: vec![FileFailure {
                path: PathBuf::from("b.jpg"),
                error: BgRemovalError::processing("x"),
            }],
            output_dir: PathBuf::from("output"),
            started_at: Utc::now(),
            elapsed: Duration::from_millis(1500),
        };

        assert_eq!(
            report.summary_line(),
            "Processed 1 of 4 image(s) into output (1 failed) in 1.50s"
        );
    }
}
