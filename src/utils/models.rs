//! Model argument parsing

use crate::{
    cache::ModelCache,
    error::{BgRemovalError, Result},
    models::{ModelSource, ModelSpec},
};
use std::path::{Path, PathBuf};

/// Turns `--model` arguments into [`ModelSpec`]s
pub struct ModelSpecParser;

impl ModelSpecParser {
    /// Parse a model argument, with an optional `:variant` suffix
    ///
    /// Existing paths are external model folders, `HuggingFace` URLs become
    /// cache IDs, anything else is taken as a cache ID.
    ///
    /// # Examples
    /// ```rust
    /// use batch_bgremove::models::ModelSource;
    /// use batch_bgremove::utils::ModelSpecParser;
    ///
    /// let spec = ModelSpecParser::parse("imgly--isnet-general-onnx:fp16");
    /// assert_eq!(spec.variant.as_deref(), Some("fp16"));
    ///
    /// let spec = ModelSpecParser::parse("https://huggingface.co/imgly/isnet-general-onnx");
    /// assert_eq!(
    ///     spec.source,
    ///     ModelSource::Downloaded("imgly--isnet-general-onnx".to_string())
    /// );
    /// ```
    #[must_use]
    pub fn parse(model_arg: &str) -> ModelSpec {
        if model_arg.starts_with("http") {
            return ModelSpec {
                source: ModelSource::Downloaded(ModelCache::url_to_model_id(model_arg)),
                variant: None,
            };
        }

        // A whole argument that exists on disk wins over a variant suffix
        if Path::new(model_arg).exists() {
            return ModelSpec {
                source: ModelSource::External(PathBuf::from(model_arg)),
                variant: None,
            };
        }

        let (base, variant) = match model_arg.rsplit_once(':') {
            Some((base, variant)) if !base.is_empty() => (base, Some(variant.to_string())),
            _ => (model_arg, None),
        };

        let source = if Path::new(base).exists() {
            ModelSource::External(PathBuf::from(base))
        } else {
            ModelSource::Downloaded(base.to_string())
        };

        ModelSpec { source, variant }
    }

    /// Check that an external path is a folder and a cache ID is well formed
    ///
    /// # Errors
    /// - External path missing or not a directory
    /// - Empty or malformed model ID or variant
    pub fn validate(model_spec: &ModelSpec) -> Result<()> {
        let is_identifier = |s: &str| {
            !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        };

        match &model_spec.source {
            ModelSource::External(path) => {
                if !path.is_dir() {
                    return Err(BgRemovalError::invalid_config(format!(
                        "External model path must be an existing directory: {}",
                        path.display()
                    )));
                }
            },
            ModelSource::Downloaded(model_id) => {
                if !is_identifier(model_id) {
                    return Err(BgRemovalError::invalid_config(format!(
                        "Invalid model ID: '{}'",
                        model_id
                    )));
                }
            },
        }

        if let Some(variant) = &model_spec.variant {
            if !is_identifier(variant) {
                return Err(BgRemovalError::invalid_config(format!(
                    "Invalid model variant: '{}'",
                    variant
                )));
            }
        }

        Ok(())
    }
}
