//! Model cache management for downloaded models
//!
//! Models live in an XDG-compliant cache directory, one folder per model ID.
//! The location can be overridden with `BGREMOVE_CACHE_DIR` or `--cache-dir`.

use crate::error::{BgRemovalError, Result};
use crate::models::scan_variants;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the cache location
pub const CACHE_DIR_ENV: &str = "BGREMOVE_CACHE_DIR";

const DEFAULT_MODEL_URL: &str = "https://huggingface.co/imgly/isnet-general-onnx";

/// Information about a cached model
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    /// Model identifier (derived from URL)
    pub model_id: String,
    /// Path to the cached model directory
    pub path: PathBuf,
    /// Available ONNX model variants (fp16, fp32)
    pub variants: Vec<String>,
    /// Size of the model directory in bytes
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a cache manager at the default location
    ///
    /// - `$BGREMOVE_CACHE_DIR/models/` when the variable is set
    /// - otherwise `<user cache dir>/batch-bgremove/models/`
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::get_cache_dir()?;
        Self::create(cache_dir)
    }

    /// Create a cache manager rooted at `cache_dir`
    ///
    /// Models are stored under `cache_dir/models/`.
    ///
    /// # Errors
    /// - Failed to create cache directory
    pub fn with_custom_cache_dir(cache_dir: &Path) -> Result<Self> {
        Self::create(cache_dir.join("models"))
    }

    fn create(cache_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&cache_dir)
            .map_err(|e| BgRemovalError::file_io_error("create cache directory", &cache_dir, &e))?;
        Ok(Self { cache_dir })
    }

    fn get_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                BgRemovalError::invalid_config(format!(
                    "Failed to determine cache directory. Set {} environment variable.",
                    CACHE_DIR_ENV
                ))
            })?
            .join("batch-bgremove")
            .join("models"))
    }

    /// Generate a model ID from a URL
    ///
    /// `HuggingFace` URLs keep their `owner/name` path with `/` replaced by
    /// `--`; other URLs are hashed.
    ///
    /// # Examples
    /// ```
    /// use batch_bgremove::cache::ModelCache;
    ///
    /// let id = ModelCache::url_to_model_id("https://huggingface.co/imgly/isnet-general-onnx");
    /// assert_eq!(id, "imgly--isnet-general-onnx");
    /// ```
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        if let Some(path) = url.strip_prefix("https://huggingface.co/") {
            return path.trim_end_matches('/').replace('/', "--");
        }

        use sha2::{Digest, Sha256};
        let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
        format!("url-{}", digest.get(..12).unwrap_or(&digest))
    }

    /// Whether a model folder exists with the required files
    #[must_use]
    pub fn is_model_cached(&self, model_id: &str) -> bool {
        Self::validate_model_directory(&self.cache_dir.join(model_id))
    }

    /// Path to a cached model directory (may not exist)
    #[must_use]
    pub fn get_model_path(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(model_id)
    }

    /// List valid cached models sorted by ID
    ///
    /// # Errors
    /// - Failed to read cache directory
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();

        for path in self.model_dirs()? {
            if !Self::validate_model_directory(&path) {
                log::debug!("Skipping invalid model directory: {}", path.display());
                continue;
            }
            let Some(model_id) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            models.push(CachedModelInfo {
                model_id: model_id.to_string(),
                variants: scan_variants(&path.join("onnx")),
                size_bytes: directory_size(&path).unwrap_or(0),
                path,
            });
        }

        models.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(models)
    }

    /// Remove every model folder from the cache, returning the removed IDs
    ///
    /// # Errors
    /// - Failed to read or remove cache entries
    pub fn clear_all_models(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();

        for path in self.model_dirs()? {
            let model_id = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            log::info!("Removing cached model: {}", model_id);
            fs::remove_dir_all(&path).map_err(|e| {
                BgRemovalError::file_io_error("remove cached model directory", &path, &e)
            })?;
            removed.push(model_id);
        }

        removed.sort();
        Ok(removed)
    }

    /// Remove one model folder; `false` if it was not cached
    ///
    /// # Errors
    /// - Failed to remove model directory
    pub fn clear_specific_model(&self, model_id: &str) -> Result<bool> {
        let model_path = self.get_model_path(model_id);
        if !model_path.exists() {
            return Ok(false);
        }

        log::info!("Removing cached model: {}", model_id);
        fs::remove_dir_all(&model_path).map_err(|e| {
            BgRemovalError::file_io_error("remove cached model", &model_path, &e)
        })?;
        Ok(true)
    }

    #[must_use]
    pub fn get_current_cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The default model ID (`ISNet` General)
    #[must_use]
    pub fn get_default_model_id() -> String {
        Self::url_to_model_id(DEFAULT_MODEL_URL)
    }

    /// The default model URL
    #[must_use]
    pub fn get_default_model_url() -> &'static str {
        DEFAULT_MODEL_URL
    }

    fn model_dirs(&self) -> Result<Vec<PathBuf>> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            BgRemovalError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| BgRemovalError::file_io_error("read cache entry", &self.cache_dir, &e))?
                .path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }

    fn validate_model_directory(model_path: &Path) -> bool {
        model_path.join("config.json").is_file()
            && model_path.join("preprocessor_config.json").is_file()
            && model_path.join("onnx").is_dir()
    }
}

fn directory_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        total += if path.is_dir() {
            directory_size(&path)?
        } else {
            entry.metadata()?.len()
        };
    }
    Ok(total)
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS.get(unit_index).unwrap_or(&"B");
    if unit_index == 0 {
        format!("{} {}", bytes, unit)
    } else {
        format!("{:.1} {}", size, unit)
    }
}
