//! Turning command-line arguments into library configuration

use super::main_impl::Cli;
use crate::{
    cache::ModelCache,
    config::BatchConfig,
    models::{ModelSource, ModelSpec},
    processor::ProcessorConfig,
    utils::{ExecutionProviderManager, ModelSpecParser},
};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Merges `--config` files, flags and cache state into configurations
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Batch settings: the `--config` file (or defaults) overridden by flags
    pub(crate) fn batch_config(cli: &Cli) -> Result<BatchConfig> {
        let mut config = match &cli.config {
            Some(path) => BatchConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => BatchConfig::default(),
        };

        if let Some(output) = &cli.output {
            config.output_dir.clone_from(output);
        }
        if !cli.extensions.is_empty() {
            config.extensions.clone_from(&cli.extensions);
        }
        config.recursive |= cli.recursive;
        if cli.pattern.is_some() {
            config.pattern.clone_from(&cli.pattern);
        }
        if cli.model.is_some() {
            config.model.clone_from(&cli.model);
        }
        if cli.variant.is_some() {
            config.variant.clone_from(&cli.variant);
        }
        if let Some(provider) = &cli.execution_provider {
            config.execution_provider.clone_from(provider);
        }
        if let Some(threads) = cli.threads {
            config.threads = threads;
        }

        config.validate().context("Invalid batch configuration")?;
        Ok(config)
    }

    /// Processor settings for a validated batch configuration
    pub(crate) fn processor_config(
        config: &BatchConfig,
        cache: &ModelCache,
        cache_dir: Option<PathBuf>,
    ) -> Result<ProcessorConfig> {
        let (backend_type, execution_provider) =
            ExecutionProviderManager::parse_provider_string(&config.execution_provider)
                .context("Invalid execution provider")?;

        let mut model_spec = match &config.model {
            Some(model_arg) => ModelSpecParser::parse(model_arg),
            None => Self::default_model_spec(cache),
        };
        if config.variant.is_some() {
            model_spec.variant.clone_from(&config.variant);
        }
        ModelSpecParser::validate(&model_spec).context("Invalid model")?;

        ProcessorConfig::builder()
            .model_spec(model_spec)
            .backend_type(backend_type)
            .execution_provider(execution_provider)
            .intra_threads(config.threads)
            .cache_dir(cache_dir)
            .build()
            .context("Failed to build processor configuration")
    }

    /// First cached model, or the default model when the cache is empty
    fn default_model_spec(cache: &ModelCache) -> ModelSpec {
        let model_id = cache
            .scan_cached_models()
            .ok()
            .and_then(|models| models.into_iter().next())
            .map_or_else(ModelCache::get_default_model_id, |m| m.model_id);

        ModelSpec {
            source: ModelSource::Downloaded(model_id),
            variant: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionProvider;
    use crate::models::write_test_model_dir;
    use crate::processor::BackendType;
    use clap::Parser;
    use std::path::Path;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("batch-bgremove").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults_without_config_file() {
        let config = CliConfigBuilder::batch_config(&parse(&["a.jpg"])).unwrap();
        assert_eq!(config, BatchConfig::default());
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("batch.json");
        std::fs::write(
            &file,
            r#"{"output_dir": "from-file", "extensions": ["png"], "threads": 2, "recursive": true}"#,
        )
        .unwrap();

        let file_arg = file.display().to_string();
        let cli = parse(&[
            "--config",
            &file_arg,
            "-o",
            "from-flag",
            "--extensions",
            "jpg,webp",
            "x.jpg",
        ]);
        let config = CliConfigBuilder::batch_config(&cli).unwrap();

        assert_eq!(config.output_dir, PathBuf::from("from-flag"));
        assert_eq!(config.extensions, vec!["jpg", "webp"]);
        assert_eq!(config.threads, 2);
        assert!(config.recursive);
    }

    #[test]
    fn test_invalid_provider_is_rejected() {
        let cli = parse(&["-e", "gpu:magic", "a.jpg"]);
        assert!(CliConfigBuilder::batch_config(&cli).is_err());
    }

    #[test]
    fn test_processor_config_uses_external_model_and_provider() {
        let temp = TempDir::new().unwrap();
        let model_dir = temp.path().join("model");
        write_test_model_dir(&model_dir, &["fp32"]);
        let cache = ModelCache::with_custom_cache_dir(&temp.path().join("cache")).unwrap();

        let mut batch = BatchConfig::default();
        batch.model = Some(model_dir.display().to_string());
        batch.variant = Some("fp32".to_string());
        batch.execution_provider = "tract:cpu".to_string();

        let config = CliConfigBuilder::processor_config(&batch, &cache, None).unwrap();
        assert_eq!(config.backend_type, BackendType::Tract);
        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.model_spec.source, ModelSource::External(model_dir));
        assert_eq!(config.model_spec.variant.as_deref(), Some("fp32"));
    }

    #[test]
    fn test_default_model_prefers_cached_models() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp.path()).unwrap();

        let spec = CliConfigBuilder::default_model_spec(&cache);
        assert_eq!(
            spec.source,
            ModelSource::Downloaded(ModelCache::get_default_model_id())
        );

        write_test_model_dir(
            &cache.get_current_cache_dir().join("someone--custom"),
            &["fp16"],
        );
        let spec = CliConfigBuilder::default_model_spec(&cache);
        assert_eq!(
            spec.source,
            ModelSource::Downloaded("someone--custom".to_string())
        );
        assert!(Path::new(cache.get_current_cache_dir()).is_dir());
    }
}
