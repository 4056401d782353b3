//! Background removal processor
//!
//! `BackgroundRemovalProcessor` owns the model backend and runs the
//! per-image pipeline: decode, preprocess, infer, build the mask, apply it
//! as alpha.

use crate::{
    batch::ImageRemover,
    cache::ModelCache,
    config::{ExecutionProvider, InferenceConfig},
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelManager, ModelSpec},
    progress::{ProcessingStage, ProgressReporter},
    types::{ProcessingTimings, RemovalResult, SegmentationMask},
    utils::ImagePreprocessor,
};
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use instant::Instant;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Inference engine selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Creates inference backends over a loaded model
pub trait BackendFactory: Send + Sync {
    /// Create a backend of the given type
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// Backend types this factory can create
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Factory for the backends enabled by cargo features
#[derive(Debug, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                model_manager,
            ))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::with_model_manager(
                model_manager,
            ))),
            #[allow(unreachable_patterns)]
            other => {
                drop(model_manager);
                Err(BgRemovalError::invalid_config(format!(
                    "Backend '{}' is not enabled in this build",
                    other
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// Configuration for the background removal processor
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    pub model_spec: ModelSpec,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads (0 = auto)
    pub inter_threads: usize,
    /// Model cache root; the default cache location when `None`
    pub cache_dir: Option<PathBuf>,
}

impl ProcessorConfig {
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }

    /// Settings handed to the backend
    #[must_use]
    pub fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            execution_provider: self.execution_provider,
            intra_threads: self.intra_threads,
            inter_threads: self.inter_threads,
        }
    }

    /// The model cache this configuration points at
    ///
    /// # Errors
    /// - Cache directory cannot be determined or created
    pub fn model_cache(&self) -> Result<ModelCache> {
        match &self.cache_dir {
            Some(dir) => ModelCache::with_custom_cache_dir(dir),
            None => ModelCache::new(),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::default(),
            backend_type: BackendType::Onnx,
            execution_provider: ExecutionProvider::Auto,
            intra_threads: 0,
            inter_threads: 0,
            cache_dir: None,
        }
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    #[must_use]
    pub fn cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.config.cache_dir = cache_dir;
        self
    }

    /// Build the processor configuration
    ///
    /// # Errors
    /// - Tract paired with an execution provider other than CPU
    pub fn build(self) -> Result<ProcessorConfig> {
        if self.config.backend_type == BackendType::Tract
            && self.config.execution_provider != ExecutionProvider::Cpu
        {
            return Err(BgRemovalError::invalid_config(format!(
                "Tract backend only supports the cpu provider, got {}",
                self.config.execution_provider
            )));
        }

        Ok(self.config)
    }
}

/// Runs background removal on images with a lazily created backend
pub struct BackgroundRemovalProcessor {
    config: ProcessorConfig,
    backend_factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn InferenceBackend>>,
    progress: Option<Arc<dyn ProgressReporter>>,
    /// Model load time waiting to be attributed to the next result
    pending_model_load_ms: u64,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Create a processor with the default backend factory
    #[must_use]
    pub fn new(config: ProcessorConfig) -> Self {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a processor with a custom backend factory
    #[must_use]
    pub fn with_factory(config: ProcessorConfig, backend_factory: Box<dyn BackendFactory>) -> Self {
        Self {
            config,
            backend_factory,
            backend: None,
            progress: None,
            pending_model_load_ms: 0,
        }
    }

    /// Create a processor around an already constructed backend
    ///
    /// The model spec in `config` is not consulted; the backend brings its own model.
    #[must_use]
    pub fn with_backend(config: ProcessorConfig, backend: Box<dyn InferenceBackend>) -> Self {
        let mut processor = Self::new(config);
        processor.backend = Some(backend);
        processor
    }

    /// Report per-image stages to `reporter`
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    fn report_stage(&self, stage: ProcessingStage) {
        if let Some(reporter) = &self.progress {
            reporter.report_stage(stage);
        }
    }

    /// Load the model and initialize the backend; later calls do nothing
    ///
    /// # Errors
    /// - Model not found or invalid
    /// - Backend type not enabled
    /// - Backend initialization failures
    pub fn initialize(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        self.report_stage(ProcessingStage::Initialization);

        if self.backend.is_none() {
            info!(
                model = %self.config.model_spec.source.display_name(),
                backend = %self.config.backend_type,
                provider = %self.config.execution_provider,
                "Initializing background removal processor"
            );

            let cache = self.config.model_cache()?;
            let model_manager = ModelManager::from_spec(
                &self.config.model_spec,
                self.config.execution_provider,
                &cache,
            )?;
            self.backend = Some(
                self.backend_factory
                    .create_backend(self.config.backend_type, model_manager)?,
            );
        }

        let inference_config = self.config.inference_config();
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("Backend missing after creation"))?;

        if let Some(load_time) = backend.initialize(&inference_config)? {
            self.pending_model_load_ms = load_time.as_millis() as u64;
        }

        info!("Background removal processor initialized");
        Ok(())
    }

    /// Remove the background from an image file
    ///
    /// The image is turned upright according to its EXIF orientation first.
    ///
    /// # Errors
    /// - File cannot be read or decoded
    /// - Initialization, inference or postprocessing errors
    pub fn process_file<P: AsRef<Path>>(&mut self, input_path: P) -> Result<RemovalResult> {
        let input_path = input_path.as_ref();
        self.initialize()?;

        self.report_stage(ProcessingStage::ImageLoading);
        let decode_start = Instant::now();
        let image = decode_upright(input_path)?;
        let image_decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image)?;
        result.timings.image_decode_ms = image_decode_ms;
        result.timings.total_ms += image_decode_ms;
        Ok(result)
    }

    /// Remove the background from a decoded image
    ///
    /// # Errors
    /// - Initialization errors
    /// - Empty image
    /// - Inference or postprocessing errors
    #[instrument(
        skip(self, image),
        fields(
            backend = %self.config.backend_type,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<RemovalResult> {
        self.initialize()?;

        let total_start = Instant::now();
        let original_dimensions = image.dimensions();
        let mut timings = ProcessingTimings {
            model_load_ms: std::mem::take(&mut self.pending_model_load_ms),
            ..ProcessingTimings::default()
        };

        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("Backend not initialized"))?;

        if let Some(reporter) = &self.progress {
            reporter.report_stage(ProcessingStage::Preprocessing);
        }
        let stage_start = Instant::now();
        let preprocessing_config = backend.get_preprocessing_config()?;
        let (input_tensor, letterbox) =
            ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?;
        timings.preprocessing_ms = stage_start.elapsed().as_millis() as u64;

        if let Some(reporter) = &self.progress {
            reporter.report_stage(ProcessingStage::Inference);
        }
        let stage_start = Instant::now();
        let output_tensor = backend.infer(&input_tensor)?;
        timings.inference_ms = stage_start.elapsed().as_millis() as u64;

        self.report_stage(ProcessingStage::MaskGeneration);
        let stage_start = Instant::now();
        let mask = SegmentationMask::from_tensor(&output_tensor, &letterbox, original_dimensions)?;

        self.report_stage(ProcessingStage::BackgroundRemoval);
        let cutout = mask.apply_to_image(image)?;
        timings.postprocessing_ms = stage_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        let stats = mask.statistics();
        debug!(
            foreground_ratio = stats.foreground_ratio,
            "Processed image: {}",
            timings.summary()
        );
        self.report_stage(ProcessingStage::Completed);

        Ok(RemovalResult {
            image: cutout,
            mask,
            original_dimensions,
            timings,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_initialized())
    }

    /// Backend types the factory can create
    #[must_use]
    pub fn available_backends(&self) -> Vec<BackendType> {
        self.backend_factory.available_backends()
    }
}

/// Decode an image file and rotate it as its EXIF orientation says
fn decode_upright(path: &Path) -> Result<DynamicImage> {
    let load_error = |e: image::ImageError| BgRemovalError::image_load_error(path, &e);

    let mut decoder = ImageReader::open(path)
        .map_err(|e| BgRemovalError::file_io_error("open image", path, &e))?
        .into_decoder()
        .map_err(load_error)?;
    let orientation = decoder.orientation().map_err(load_error)?;

    let mut image = DynamicImage::from_decoder(decoder).map_err(load_error)?;
    image.apply_orientation(orientation);
    Ok(image)
}

impl ImageRemover for BackgroundRemovalProcessor {
    fn remove(&mut self, input: &Path) -> Result<RemovalResult> {
        self.process_file(input)
    }
}
