//! Model specification and loading
//!
//! Models use the `HuggingFace` folder layout whether they come from the cache
//! or from a user-supplied directory:
//!
//! ```text
//! <model>/config.json
//! <model>/preprocessor_config.json
//! <model>/onnx/model.onnx        (fp32)
//! <model>/onnx/model_fp16.onnx   (fp16)
//! ```

use crate::{
    cache::ModelCache,
    config::ExecutionProvider,
    error::{BgRemovalError, Result},
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Model source specification
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelSource {
    /// Model folder at a filesystem path
    External(PathBuf),
    /// Model in the cache, by model ID
    Downloaded(String),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::External(path) => {
                format!(
                    "external:{}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                )
            },
            ModelSource::Downloaded(model_id) => format!("cached:{}", model_id),
        }
    }
}

/// Model source plus an optional variant (fp16, fp32)
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    pub variant: Option<String>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSource::Downloaded(ModelCache::get_default_model_id()),
            variant: None,
        }
    }
}

impl std::fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            ModelSource::External(path) => write!(f, "{}", path.display())?,
            ModelSource::Downloaded(model_id) => write!(f, "{}", model_id)?,
        }
        if let Some(variant) = &self.variant {
            write!(f, ":{}", variant)?;
        }
        Ok(())
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: u64,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// How images are prepared for the model
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Model input size as `[height, width]`
    pub target_size: [u32; 2],
    /// Per-channel mean in the 0-1 range
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation in the 0-1 range
    pub normalization_std: [f32; 3],
}

#[derive(Debug, Deserialize)]
struct ImageSize {
    height: u32,
    width: u32,
}

/// Subset of `preprocessor_config.json` the pipeline reads
#[derive(Debug, Deserialize)]
struct PreprocessorFile {
    size: ImageSize,
    /// 0-255 range
    image_mean: Vec<f64>,
    /// 0-255 range
    image_std: Vec<f64>,
}

impl PreprocessorFile {
    fn to_config(&self) -> Result<PreprocessingConfig> {
        let channels = |values: &[f64], name: &str| -> Result<[f32; 3]> {
            match values {
                [r, g, b, ..] => Ok([(r / 255.0) as f32, (g / 255.0) as f32, (b / 255.0) as f32]),
                _ => Err(BgRemovalError::model(format!(
                    "{} must have at least 3 values",
                    name
                ))),
            }
        };

        let normalization_std = channels(&self.image_std, "image_std")?;
        if normalization_std.iter().any(|s| *s <= 0.0) {
            return Err(BgRemovalError::model("image_std values must be positive"));
        }

        Ok(PreprocessingConfig {
            target_size: [self.size.height, self.size.width],
            normalization_mean: channels(&self.image_mean, "image_mean")?,
            normalization_std,
        })
    }
}

/// ONNX file name for a variant inside the `onnx/` folder
#[must_use]
pub fn variant_file_name(variant: &str) -> String {
    match variant {
        "fp32" => "model.onnx".to_string(),
        other => format!("model_{}.onnx", other),
    }
}

/// Variants present in an `onnx/` folder, sorted
#[must_use]
pub fn scan_variants(onnx_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(onnx_dir) else {
        return Vec::new();
    };

    let mut variants: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let file_name = entry.file_name().to_str()?.to_string();
            if file_name == "model.onnx" {
                return Some("fp32".to_string());
            }
            file_name
                .strip_prefix("model_")
                .and_then(|s| s.strip_suffix(".onnx"))
                .map(str::to_string)
        })
        .collect();
    variants.sort();
    variants
}

/// Pick a variant: explicit request first, then the provider's preference
///
/// `CoreML` prefers fp32, every other provider prefers fp16.
///
/// # Errors
/// - No variants available
/// - Requested variant not among the available ones
pub fn resolve_variant(
    available: &[String],
    requested: Option<&str>,
    provider: ExecutionProvider,
) -> Result<String> {
    if let Some(variant) = requested {
        if available.iter().any(|v| v == variant) {
            return Ok(variant.to_string());
        }
        return Err(BgRemovalError::invalid_config(format!(
            "Variant '{}' not available. Available variants: {:?}",
            variant, available
        )));
    }

    let preference: [&str; 2] = match provider {
        ExecutionProvider::CoreMl => ["fp32", "fp16"],
        _ if cfg!(target_os = "macos") && provider == ExecutionProvider::Auto => ["fp32", "fp16"],
        _ => ["fp16", "fp32"],
    };

    preference
        .iter()
        .find(|p| available.iter().any(|v| v == *p))
        .map(|p| (*p).to_string())
        .or_else(|| available.first().cloned())
        .ok_or_else(|| BgRemovalError::model("No ONNX model files found for model"))
}

/// Loaded model folder with a resolved variant
#[derive(Debug)]
pub struct ModelManager {
    name: String,
    model_dir: PathBuf,
    model_type: String,
    variant: String,
    preprocessing: PreprocessingConfig,
}

impl ModelManager {
    /// Load the model a spec points to, resolving its variant for `provider`
    ///
    /// # Errors
    /// - External path missing or not a directory
    /// - Model not cached
    /// - Missing or invalid configuration files
    /// - Requested variant not available
    pub fn from_spec(
        spec: &ModelSpec,
        provider: ExecutionProvider,
        cache: &ModelCache,
    ) -> Result<Self> {
        let (name, model_dir) = match &spec.source {
            ModelSource::External(path) => {
                if !path.is_dir() {
                    return Err(BgRemovalError::model_error_with_context(
                        "load",
                        path,
                        "not a model directory",
                        &["point --model at a folder containing config.json and onnx/"],
                    ));
                }
                (spec.source.display_name(), path.clone())
            },
            ModelSource::Downloaded(model_id) => {
                if !cache.is_model_cached(model_id) {
                    let available: Vec<String> = cache
                        .scan_cached_models()?
                        .into_iter()
                        .map(|m| m.model_id)
                        .collect();
                    return Err(BgRemovalError::model(format!(
                        "Model '{}' not found in cache. Available models: {:?}",
                        model_id, available
                    )));
                }
                (model_id.clone(), cache.get_model_path(model_id))
            },
        };

        Self::load(name, model_dir, spec.variant.as_deref(), provider)
    }

    fn load(
        name: String,
        model_dir: PathBuf,
        requested_variant: Option<&str>,
        provider: ExecutionProvider,
    ) -> Result<Self> {
        let config_path = model_dir.join("config.json");
        let config_content = fs::read_to_string(&config_path)
            .map_err(|e| BgRemovalError::file_io_error("read model config.json", &config_path, &e))?;
        let model_config: serde_json::Value = serde_json::from_str(&config_content)
            .map_err(|e| BgRemovalError::model(format!("Failed to parse config.json: {}", e)))?;
        let model_type = model_config
            .get("model_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let preprocessor_path = model_dir.join("preprocessor_config.json");
        let preprocessor_content = fs::read_to_string(&preprocessor_path).map_err(|e| {
            BgRemovalError::file_io_error("read preprocessor_config.json", &preprocessor_path, &e)
        })?;
        let preprocessor: PreprocessorFile = serde_json::from_str(&preprocessor_content)
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to parse preprocessor_config.json: {}", e))
            })?;
        let preprocessing = preprocessor.to_config()?;

        let available = scan_variants(&model_dir.join("onnx"));
        let variant = resolve_variant(&available, requested_variant, provider)?;

        log::debug!(
            "Model {} ({}) using variant {} of {:?}",
            name,
            model_type,
            variant,
            available
        );

        Ok(Self {
            name,
            model_dir,
            model_type,
            variant,
            preprocessing,
        })
    }

    /// Path to the ONNX file for the selected variant
    #[must_use]
    pub fn get_model_path(&self) -> PathBuf {
        self.model_dir
            .join("onnx")
            .join(variant_file_name(&self.variant))
    }

    /// Read the ONNX file for the selected variant
    ///
    /// # Errors
    /// - Model file missing or unreadable
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let path = self.get_model_path();
        fs::read(&path).map_err(|e| BgRemovalError::file_io_error("read model file", &path, &e))
    }

    /// Model name, type and shapes
    ///
    /// # Errors
    /// - Model file metadata unreadable
    pub fn get_info(&self) -> Result<ModelInfo> {
        let path = self.get_model_path();
        let size_bytes = fs::metadata(&path)
            .map_err(|e| BgRemovalError::file_io_error("stat model file", &path, &e))?
            .len();
        let [height, width] = self.preprocessing.target_size;
        let (height, width) = (height as usize, width as usize);

        Ok(ModelInfo {
            name: format!("{}-{}", self.model_type, self.variant),
            precision: self.variant.clone(),
            size_bytes,
            input_shape: (1, 3, height, width),
            output_shape: (1, 1, height, width),
        })
    }

    #[must_use]
    pub fn get_preprocessing_config(&self) -> &PreprocessingConfig {
        &self.preprocessing
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }
}

/// Write a minimal model folder for tests
#[cfg(test)]
pub(crate) fn write_test_model_dir(dir: &Path, variants: &[&str]) {
    fs::create_dir_all(dir.join("onnx")).unwrap();
    fs::write(dir.join("config.json"), r#"{ "model_type": "isnet" }"#).unwrap();
    fs::write(
        dir.join("preprocessor_config.json"),
        r#"{
            "size": { "height": 1024, "width": 1024 },
            "image_mean": [128, 128, 128],
            "image_std": [256, 256, 256]
        }"#,
    )
    .unwrap();
    for variant in variants {
        fs::write(dir.join("onnx").join(variant_file_name(variant)), b"onnx").unwrap();
    }
}
