//! Progress reporting
//!
//! Reporters are called synchronously from the batch loop and the processor.
//! Every method has an empty default so a reporter only implements what it
//! displays.

use crate::batch::BatchReport;
use crate::error::BgRemovalError;
use std::path::Path;

/// Stages of removing the background from one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Loading the model and creating the backend
    Initialization,
    /// Loading and decoding the input image
    ImageLoading,
    /// Resizing and normalizing for the model
    Preprocessing,
    /// Running model inference
    Inference,
    /// Converting the output tensor to a mask
    MaskGeneration,
    /// Applying the mask as alpha
    BackgroundRemoval,
    /// Writing the PNG
    FileSaving,
    Completed,
}

impl ProcessingStage {
    /// Human-readable description of the stage
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            ProcessingStage::Initialization => "Initializing model and backend",
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::Preprocessing => "Preprocessing image",
            ProcessingStage::Inference => "Running inference",
            ProcessingStage::MaskGeneration => "Generating segmentation mask",
            ProcessingStage::BackgroundRemoval => "Removing background",
            ProcessingStage::FileSaving => "Saving result",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Typical progress percentage within one image
    #[must_use]
    pub fn progress_percentage(self) -> u8 {
        match self {
            ProcessingStage::Initialization => 5,
            ProcessingStage::ImageLoading => 10,
            ProcessingStage::Preprocessing => 25,
            ProcessingStage::Inference => 70,
            ProcessingStage::MaskGeneration => 85,
            ProcessingStage::BackgroundRemoval => 95,
            ProcessingStage::FileSaving => 99,
            ProcessingStage::Completed => 100,
        }
    }
}

/// How one batch item ended
#[derive(Debug, Clone, Copy)]
pub enum ItemOutcome<'a> {
    /// Result written to this path
    Saved(&'a Path),
    Failed(&'a BgRemovalError),
}

/// Receives batch and per-image progress
pub trait ProgressReporter: Send + Sync {
    /// A batch of `total` files is starting
    fn batch_started(&self, _total: usize) {}

    /// File `index` (zero-based) of `total` is starting
    fn item_started(&self, _index: usize, _total: usize, _path: &Path) {}

    /// File `index` finished
    fn item_finished(&self, _index: usize, _path: &Path, _outcome: ItemOutcome<'_>) {}

    /// The batch is over; the selection is cleared right after this call
    fn batch_finished(&self, _report: &BatchReport) {}

    /// Stage change inside the current image
    fn report_stage(&self, _stage: ProcessingStage) {}
}

/// Reporter that ignores everything
#[derive(Debug, Default)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {}

/// Reporter that writes progress as log lines
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// With `verbose`, per-image stages are logged too
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn batch_started(&self, total: usize) {
        log::info!("Processing {} image(s)", total);
    }

    fn item_started(&self, index: usize, total: usize, path: &Path) {
        log::info!("[{}/{}] {}", index + 1, total, path.display());
    }

    fn item_finished(&self, _index: usize, path: &Path, outcome: ItemOutcome<'_>) {
        match outcome {
            ItemOutcome::Saved(output) => log::info!("✅ Saved {}", output.display()),
            ItemOutcome::Failed(error) => {
                log::debug!("❌ Failed to process {}: {}", path.display(), error);
            },
        }
    }

    fn batch_finished(&self, report: &BatchReport) {
        log::info!("{}", report.summary_line());
    }

    fn report_stage(&self, stage: ProcessingStage) {
        if self.verbose {
            log::debug!("[{:>3}%] {}", stage.progress_percentage(), stage.description());
        }
    }
}

/// Terminal progress bar across the batch
///
/// Failures are left to the final summary.
#[cfg(feature = "cli")]
#[derive(Debug)]
pub struct BarProgressReporter {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl BarProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        let bar = indicatif::ProgressBar::new(0);
        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
    }
}

#[cfg(feature = "cli")]
impl Default for BarProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
impl ProgressReporter for BarProgressReporter {
    fn batch_started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    fn item_started(&self, _index: usize, _total: usize, path: &Path) {
        self.bar.set_message(Self::file_name(path));
    }

    fn item_finished(&self, _index: usize, _path: &Path, _outcome: ItemOutcome<'_>) {
        self.bar.inc(1);
    }

    fn batch_finished(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }

    fn report_stage(&self, stage: ProcessingStage) {
        if stage == ProcessingStage::Initialization {
            self.bar.set_message(stage.description());
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Reporter that records every call as a string
    #[derive(Debug, Default)]
    pub(crate) struct RecordingReporter {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        pub(crate) fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn batch_started(&self, total: usize) {
            self.push(format!("start {}", total));
        }

        fn item_started(&self, index: usize, total: usize, path: &Path) {
            self.push(format!("item {}/{} {}", index, total, path.display()));
        }

        fn item_finished(&self, index: usize, _path: &Path, outcome: ItemOutcome<'_>) {
            let status = match outcome {
                ItemOutcome::Saved(_) => "ok",
                ItemOutcome::Failed(_) => "failed",
            };
            self.push(format!("done {} {}", index, status));
        }

        fn batch_finished(&self, report: &BatchReport) {
            self.push(format!("finish {}/{}", report.success_count(), report.attempted));
        }

        fn report_stage(&self, stage: ProcessingStage) {
            self.push(format!("stage {:?}", stage));
        }
    }

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            ProcessingStage::Initialization,
            ProcessingStage::ImageLoading,
            ProcessingStage::Preprocessing,
            ProcessingStage::Inference,
            ProcessingStage::MaskGeneration,
            ProcessingStage::BackgroundRemoval,
            ProcessingStage::FileSaving,
            ProcessingStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
        assert_eq!(ProcessingStage::Completed.progress_percentage(), 100);
    }

    #[test]
    fn test_stage_descriptions() {
        assert_eq!(ProcessingStage::Inference.description(), "Running inference");
        assert_eq!(ProcessingStage::FileSaving.description(), "Saving result");
    }

    #[test]
    fn test_noop_and_console_reporters_accept_all_calls() {
        let error = BgRemovalError::processing("broken");
        let reporters: Vec<Box<dyn ProgressReporter>> = vec![
            Box::new(NoOpProgressReporter),
            Box::new(ConsoleProgressReporter::new(true)),
        ];
        for reporter in reporters {
            reporter.batch_started(2);
            reporter.item_started(0, 2, Path::new("a.jpg"));
            reporter.report_stage(ProcessingStage::Inference);
            reporter.item_finished(0, Path::new("a.jpg"), ItemOutcome::Saved(Path::new("output/a.png")));
            reporter.item_finished(1, Path::new("b.jpg"), ItemOutcome::Failed(&error));
        }
    }
}
