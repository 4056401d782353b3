//! ONNX Runtime backend
//!
//! Runs the segmentation model through ONNX Runtime with CPU, CUDA or `CoreML`
//! execution providers. Unavailable accelerators fall back to CPU.

use crate::config::{ExecutionProvider, InferenceConfig};
use crate::error::{BgRemovalError, Result};
use crate::inference::{resolve_threads, InferenceBackend};
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

/// ONNX Runtime backend for running background removal models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: ModelManager,
}

fn cuda_available() -> bool {
    OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
}

fn coreml_available() -> bool {
    OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers as `(name, available, description)`
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!(
            "🔍 Checking providers on {os}/{arch}",
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH
        );

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available(),
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available(),
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create a backend for the given model; the session is built on `initialize`
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager,
        }
    }

    /// Execution providers to register for a requested provider, in priority order
    fn execution_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let mut providers = Vec::new();

        if matches!(requested, ExecutionProvider::Auto | ExecutionProvider::Cuda) {
            if cuda_available() {
                log::info!("🚀 Using CUDA execution provider");
                providers.push(CUDAExecutionProvider::default().build());
            } else if requested == ExecutionProvider::Cuda {
                log::warn!("CUDA execution provider requested but not available, falling back to CPU");
            }
        }

        if matches!(requested, ExecutionProvider::Auto | ExecutionProvider::CoreMl) {
            if coreml_available() {
                log::info!("🍎 Using CoreML execution provider");
                providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
            } else if requested == ExecutionProvider::CoreMl {
                log::warn!("CoreML execution provider requested but not available, falling back to CPU");
            }
        }

        if providers.is_empty() {
            log::info!("Using CPU execution provider");
        }
        providers
    }

    fn load_model(&mut self, config: &InferenceConfig) -> Result<std::time::Duration> {
        let model_load_start = std::time::Instant::now();
        let model_data = self.model_manager.load_model()?;

        let mut session_builder = Session::builder()
            .map_err(|e| BgRemovalError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| BgRemovalError::inference(format!("Failed to set optimization level: {e}")))?;

        let providers = Self::execution_providers(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| {
                    BgRemovalError::inference(format!("Failed to set execution providers: {e}"))
                })?;
        }

        let (intra_threads, inter_threads) = resolve_threads(config);

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| BgRemovalError::inference(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| BgRemovalError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to create session from model data: {e}"))
            })?;

        log::debug!("✅ ONNX Runtime session created");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!("  - Threading: {intra_threads} intra-op, {inter_threads} inter-op");
        log::debug!(
            "  - Model: {} ({})",
            self.model_manager.name(),
            self.model_manager.variant()
        );

        self.session = Some(session);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<std::time::Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("Backend not initialized"))?;

        let inference_start = std::time::Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| BgRemovalError::inference(format!("Failed to convert input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        // Positional access: the first output is the mask
        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| BgRemovalError::inference(format!("Failed to extract output tensor: {e}")))?;

        let result = output_tensor
            .to_owned()
            .into_dimensionality::<ndarray::Ix4>()
            .map_err(|_| {
                BgRemovalError::inference(format!(
                    "Expected 4D output tensor, got {}D",
                    output_tensor.ndim()
                ))
            })?;

        log::debug!(
            "📊 Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.model_manager.get_preprocessing_config().clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
    }
}
