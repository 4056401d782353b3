#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Batch Background Removal
//!
//! Collect a set of images, remove the background from each one with an
//! ONNX segmentation model, and write the cut-outs as transparent PNGs.
//!
//! A file that fails is reported and skipped; the rest of the batch carries
//! on. After the run the selection is cleared and a [`BatchReport`] says what
//! happened.
//!
//! ## Features
//!
//! - **Backends**: ONNX Runtime (CPU, CUDA, `CoreML`) and Tract (pure Rust)
//! - **Models**: `HuggingFace`-layout model folders, downloaded and cached on demand
//! - **Inputs**: files, directories (optionally recursive) and glob patterns
//! - **Progress**: pluggable [`ProgressReporter`], with a terminal bar in the CLI
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_bgremove::{
//!     BackgroundRemovalProcessor, BatchRunner, FileSelection, OutputLayout, ProcessorConfig,
//! };
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut selection = FileSelection::default();
//! selection.add_inputs(&["photos/"], false, None)?;
//!
//! let mut processor = BackgroundRemovalProcessor::new(ProcessorConfig::default());
//! let report = BatchRunner::new(OutputLayout::default()).run(&mut selection, &mut processor)?;
//! println!("{}", report.summary_line());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend
//! - `tract` (default): pure Rust backend
//! - `cli` (default): command-line interface, progress bar and tracing subscriber
//! - `webp-support`: WebP input decoding
//!
//! Library-only usage:
//!
//! ```toml
//! [dependencies]
//! batch-bgremove = { version = "0.1", default-features = false, features = ["onnx"] }
//! ```

pub mod backends;
pub mod batch;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod output;
pub mod processor;
pub mod progress;
pub mod selection;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use batch::{BatchReport, BatchRunner, FileFailure, ImageRemover, ProcessedFile};
pub use cache::ModelCache;
pub use config::{BatchConfig, ExecutionProvider, InferenceConfig};
pub use download::ModelDownloader;
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelSource, ModelSpec};
pub use output::OutputLayout;
pub use processor::{
    BackendFactory, BackendType, BackgroundRemovalProcessor, DefaultBackendFactory,
    ProcessorConfig, ProcessorConfigBuilder,
};
pub use progress::{
    ConsoleProgressReporter, ItemOutcome, NoOpProgressReporter, ProcessingStage,
    ProgressReporter,
};
#[cfg(feature = "cli")]
pub use progress::BarProgressReporter;
pub use selection::{AddOutcome, FileSelection, SelectedFile, SelectionSummary};
pub use types::{ProcessingTimings, RemovalResult, SegmentationMask};
