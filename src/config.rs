//! Configuration types for batch background removal

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory results are written to when nothing else is configured
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Image extensions accepted into a selection by default
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Settings handed to an inference backend when it loads its model
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,
}

/// Batch-level settings, loadable from a JSON file and overridable from the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Directory that receives `<stem>.png` results
    pub output_dir: PathBuf,
    /// Accepted input extensions (compared case-insensitively, without the dot)
    pub extensions: Vec<String>,
    /// Descend into subdirectories when an input is a directory
    pub recursive: bool,
    /// Glob applied to file names found while expanding directories
    pub pattern: Option<String>,
    /// Model name, URL, or path to a model folder
    pub model: Option<String>,
    /// Model variant (fp16, fp32)
    pub variant: Option<String>,
    /// Backend and provider in `backend:provider` form
    pub execution_provider: String,
    /// Inference threads (0 = auto)
    pub threads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            recursive: false,
            pattern: None,
            model: None,
            variant: None,
            execution_provider: "onnx:auto".to_string(),
            threads: 0,
        }
    }
}

impl BatchConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON for this structure
    /// - Resulting configuration fails validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BgRemovalError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            BgRemovalError::invalid_config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the batch cannot work with
    ///
    /// # Errors
    /// - Empty output directory
    /// - No accepted extensions, or an extension containing a path separator
    /// - Malformed execution provider string
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(BgRemovalError::invalid_config(
                "Output directory must not be empty",
            ));
        }

        if self.extensions.is_empty() {
            return Err(BgRemovalError::invalid_config(
                "At least one input extension must be accepted",
            ));
        }

        for ext in &self.extensions {
            let trimmed = ext.trim_start_matches('.');
            if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
                return Err(BgRemovalError::invalid_config(format!(
                    "Invalid extension '{}'",
                    ext
                )));
            }
        }

        crate::utils::ExecutionProviderManager::parse_provider_string(&self.execution_provider)?;
        Ok(())
    }

    /// Extensions normalized to lowercase without a leading dot
    #[must_use]
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect()
    }
}
