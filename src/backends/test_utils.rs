//! Mock backend for unit tests that need inference without a model file

use crate::{
    config::InferenceConfig,
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// Backend returning a soft circular mask centered in the canvas
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    size: usize,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockBackend {
    /// Backend with a square `size`x`size` model input
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            initialized: false,
            size,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    #[must_use]
    pub fn failing_init(size: usize) -> Self {
        Self {
            should_fail_init: true,
            ..Self::new(size)
        }
    }

    #[must_use]
    pub fn failing_inference(size: usize) -> Self {
        Self {
            should_fail_inference: true,
            ..Self::new(size)
        }
    }

    /// Shared handle to the recorded method calls
    #[must_use]
    pub fn call_history(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn circular_mask(&self) -> Array4<f32> {
        let size = self.size;
        let center = size as f32 / 2.0;
        let radius = (size as f32 / 3.0).max(1.0);

        Array4::from_shape_fn((1, 1, size, size), |(_, _, y, x)| {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let distance = (dx * dx + dy * dy).sqrt();
            ((radius - distance) / radius).clamp(0.0, 1.0)
        })
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.should_fail_init {
            return Err(BgRemovalError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(150)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(BgRemovalError::internal("Backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(BgRemovalError::inference("Mock backend inference failed"));
        }
        if input.dim() != (1, 3, self.size, self.size) {
            return Err(BgRemovalError::inference(format!(
                "Unexpected input shape {:?}",
                input.dim()
            )));
        }

        Ok(self.circular_mask())
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig {
            target_size: [self.size as u32, self.size as u32],
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        })
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "mock-model".to_string(),
            precision: "fp32".to_string(),
            size_bytes: 1024 * 1024,
            input_shape: (1, 3, self.size, self.size),
            output_shape: (1, 1, self.size, self.size),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
