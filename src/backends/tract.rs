//! Tract backend
//!
//! Pure Rust ONNX inference. Slower than ONNX Runtime but needs no native
//! libraries, which makes it the portable fallback.

use crate::config::InferenceConfig;
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running background removal models
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: ModelManager,
}

impl TractBackend {
    /// List Tract providers as `(name, available, description)`
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager,
        }
    }

    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = self.model_manager.load_model()?;

        log::info!(
            "🧠 Loading {} ({}) with Tract",
            self.model_manager.name(),
            self.model_manager.variant()
        );

        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| BgRemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| BgRemovalError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }
        if config.intra_threads > 0 || config.inter_threads > 0 {
            log::debug!("Tract manages its own threading; thread settings ignored");
        }
        self.load_model().map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Backend not initialized"))?;

        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let outputs = model
            .run(tvec![Tensor::from(input.clone()).into()])
            .map_err(|e| BgRemovalError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_view = output_tensor.to_array_view::<f32>().map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let output_array = output_view
            .to_owned()
            .into_dimensionality::<ndarray::Ix4>()
            .map_err(|_| {
                BgRemovalError::inference(format!(
                    "Expected 4D output tensor, got {}D",
                    output_view.ndim()
                ))
            })?;

        log::debug!(
            "✅ Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );
        Ok(output_array)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.model_manager.get_preprocessing_config().clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ModelCache;
    use crate::config::ExecutionProvider;
    use crate::models::{write_test_model_dir, ModelSource, ModelSpec};
    use tempfile::TempDir;

    fn backend_for(dir: &std::path::Path) -> TractBackend {
        let cache = ModelCache::with_custom_cache_dir(dir).unwrap();
        let spec = ModelSpec {
            source: ModelSource::External(dir.to_path_buf()),
            variant: None,
        };
        let manager = ModelManager::from_spec(&spec, ExecutionProvider::Cpu, &cache).unwrap();
        TractBackend::with_model_manager(manager)
    }

    #[test]
    fn test_list_providers() {
        let providers = TractBackend::list_providers();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].0, "CPU");
        assert!(providers[0].1);
    }

    #[test]
    fn test_uninitialized_backend_reports_model_config() {
        let temp = TempDir::new().unwrap();
        write_test_model_dir(temp.path(), &["fp32"]);
        let mut backend = backend_for(temp.path());

        assert!(!backend.is_initialized());
        assert_eq!(
            backend.get_preprocessing_config().unwrap().target_size,
            [1024, 1024]
        );
        assert!(backend.infer(&Array4::zeros((1, 3, 4, 4))).is_err());
    }

    #[test]
    fn test_invalid_model_file_fails_initialize() {
        let temp = TempDir::new().unwrap();
        write_test_model_dir(temp.path(), &["fp32"]);
        let mut backend = backend_for(temp.path());

        let err = backend.initialize(&InferenceConfig::default()).unwrap_err();
        assert!(matches!(err, BgRemovalError::Model(_)));
        assert!(!backend.is_initialized());
    }
}
