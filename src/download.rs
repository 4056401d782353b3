//! Model downloading from `HuggingFace` repositories
//!
//! Files are streamed into a hidden staging folder inside the cache and the
//! folder is renamed into place once every required file has arrived, so a
//! model directory is either complete or absent.

use crate::cache::ModelCache;
use crate::error::{BgRemovalError, Result};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

const HUGGINGFACE_PREFIX: &str = "https://huggingface.co/";

/// Files every model needs
const REQUIRED_FILES: &[&str] = &["config.json", "preprocessor_config.json"];

/// ONNX variants to try; at least one must succeed
const ONNX_FILES: &[(&str, &str)] = &[
    ("onnx/model.onnx", "fp32"),
    ("onnx/model_fp16.onnx", "fp16"),
];

/// Download progress display, a terminal bar when the CLI is built
#[derive(Debug)]
enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    fn new(show: bool) -> Self {
        #[cfg(feature = "cli")]
        if show {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            return Self::Indicatif(pb);
        }
        let _ = show;
        Self::NoOp
    }

    fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {},
        }
    }

    fn start_file(&self, total: Option<u64>) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => {
                pb.set_length(total.unwrap_or(0));
                pb.set_position(0);
            },
            Self::NoOp => {
                let _ = total;
            },
        }
    }

    fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {
                let _ = pos;
            },
        }
    }

    fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {},
        }
    }
}

/// Model downloader
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    /// Create a downloader for the default cache
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to initialize model cache
    pub fn new() -> Result<Self> {
        Self::with_cache(ModelCache::new()?)
    }

    /// Create a downloader that stores into `cache`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn with_cache(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Download a model repository into the cache, returning its model ID
    ///
    /// Already cached models are not downloaded again.
    ///
    /// # Errors
    /// - Unsupported URL
    /// - Network errors, or no ONNX variant could be fetched
    /// - File system errors while staging or moving the model
    pub async fn download_model(&self, url: &str, show_progress: bool) -> Result<String> {
        validate_model_url(url)?;
        let base_url = url.trim_end_matches('/');
        let model_id = ModelCache::url_to_model_id(base_url);

        if self.cache.is_model_cached(&model_id) {
            log::info!("Model already cached: {}", model_id);
            return Ok(model_id);
        }

        log::info!("Downloading model {} from {}", model_id, base_url);

        let staging_dir = self.create_staging_dir(&model_id)?;
        let final_dir = self.cache.get_model_path(&model_id);
        let progress = ProgressIndicator::new(show_progress);

        match self
            .download_model_files(base_url, &staging_dir, &progress)
            .await
        {
            Ok(()) => {
                if final_dir.exists() {
                    fs::remove_dir_all(&final_dir).map_err(|e| {
                        BgRemovalError::file_io_error(
                            "remove incomplete model directory",
                            &final_dir,
                            &e,
                        )
                    })?;
                }
                fs::rename(&staging_dir, &final_dir).map_err(|e| {
                    BgRemovalError::file_io_error("move downloaded model to cache", &final_dir, &e)
                })?;

                progress.finish_with_message(format!("✅ Downloaded {}", model_id));
                log::info!("Successfully downloaded model: {}", model_id);
                Ok(model_id)
            },
            Err(e) => {
                if let Err(cleanup_err) = fs::remove_dir_all(&staging_dir) {
                    log::warn!("Failed to clean up staging directory: {}", cleanup_err);
                }
                progress.finish_with_message("❌ Download failed".to_string());
                Err(e)
            },
        }
    }

    /// Get the model cache for other operations
    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    fn create_staging_dir(&self, model_id: &str) -> Result<PathBuf> {
        let staging_dir = self
            .cache
            .get_current_cache_dir()
            .join(format!(".{}.partial", model_id));

        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir).map_err(|e| {
                BgRemovalError::file_io_error("remove stale staging directory", &staging_dir, &e)
            })?;
        }
        fs::create_dir_all(staging_dir.join("onnx")).map_err(|e| {
            BgRemovalError::file_io_error("create staging directory", &staging_dir, &e)
        })?;

        Ok(staging_dir)
    }

    async fn download_model_files(
        &self,
        base_url: &str,
        download_dir: &Path,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        let raw_base = format!("{}/resolve/main/", base_url);

        for file_name in REQUIRED_FILES {
            progress.set_message(format!("Downloading {}", file_name));
            self.download_file(&format!("{}{}", raw_base, file_name), &download_dir.join(file_name), progress)
                .await?;
        }

        let mut downloaded_models = 0;
        for (file_path, variant) in ONNX_FILES {
            progress.set_message(format!("Downloading {} model", variant));
            match self
                .download_file(&format!("{}{}", raw_base, file_path), &download_dir.join(file_path), progress)
                .await
            {
                Ok(()) => downloaded_models += 1,
                Err(e) => log::warn!("Failed to download {} variant: {}", variant, e),
            }
        }

        if downloaded_models == 0 {
            return Err(BgRemovalError::network_error(
                "Failed to download any ONNX model variants",
                std::io::Error::new(std::io::ErrorKind::NotFound, "No model files found"),
            ));
        }

        log::info!("Downloaded {} model variant(s)", downloaded_models);
        Ok(())
    }

    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        log::debug!("Downloading: {} -> {}", url, local_path.display());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| BgRemovalError::network_error(format!("Failed to download {}", url), e))?;

        progress.start_file(response.content_length());

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut hasher = Sha256::new();
        let mut downloaded = 0u64;
        let mut buffer = vec![0; 64 * 1024];

        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;
            if bytes_read == 0 {
                break;
            }

            let chunk = buffer.get(..bytes_read).unwrap_or_default();
            hasher.update(chunk);
            file.write_all(chunk)
                .await
                .map_err(|e| BgRemovalError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
            progress.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", local_path, &e))?;

        log::debug!(
            "Downloaded {} bytes to {} (sha256 {:x})",
            downloaded,
            local_path.display(),
            hasher.finalize()
        );
        Ok(())
    }
}

/// Check that a URL points at a `HuggingFace` repository (`owner/name`)
///
/// # Errors
/// - Empty URL, non-`HuggingFace` host, or missing owner/name
pub fn validate_model_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(BgRemovalError::invalid_config("Model URL cannot be empty"));
    }

    let Some(repo_path) = url.strip_prefix(HUGGINGFACE_PREFIX) else {
        return Err(BgRemovalError::invalid_config(format!(
            "Unsupported URL format: {}. Only HuggingFace repositories are supported (https://huggingface.co/...)",
            url
        )));
    };

    let mut parts = repo_path.trim_end_matches('/').split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(name)) if !owner.is_empty() && !name.is_empty() => Ok(()),
        _ => Err(BgRemovalError::invalid_config(format!(
            "Invalid HuggingFace repository URL: {}. Expected format: https://huggingface.co/username/repo-name",
            url
        ))),
    }
}
