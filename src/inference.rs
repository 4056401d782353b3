//! Inference backend abstraction

use crate::{
    config::InferenceConfig,
    error::Result,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;

/// A segmentation model runtime
///
/// Backends take a normalized `1x3xHxW` image tensor and return a `1x1xHxW`
/// foreground probability map.
pub trait InferenceBackend {
    /// Load the model; returns the load time, or `None` when already loaded
    ///
    /// # Errors
    /// - Model loading or validation errors
    /// - Runtime session creation failures
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Output tensor is not four-dimensional
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// How images must be prepared for this backend's model
    ///
    /// # Errors
    /// - No model loaded
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Model metadata
    ///
    /// # Errors
    /// - No model loaded, or model metadata unreadable
    fn get_model_info(&self) -> Result<ModelInfo>;

    fn is_initialized(&self) -> bool;
}

/// Thread count settings resolved against the machine
#[must_use]
pub fn resolve_threads(config: &InferenceConfig) -> (usize, usize) {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(8);

    let intra = if config.intra_threads > 0 {
        config.intra_threads
    } else {
        cores
    };
    let inter = if config.inter_threads > 0 {
        config.inter_threads
    } else {
        (cores / 4).max(1)
    };
    (intra, inter)
}
