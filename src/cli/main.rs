//! Batch background removal command-line tool
//!
//! Collects the inputs into a selection, makes sure a model is available,
//! then runs the batch and prints the summary.

use super::config::CliConfigBuilder;
use crate::{
    batch::{BatchReport, BatchRunner},
    cache::{format_size, ModelCache, CACHE_DIR_ENV},
    download::{validate_model_url, ModelDownloader},
    error::BgRemovalError,
    models::{ModelSource, ModelSpec},
    output::OutputLayout,
    processor::BackgroundRemovalProcessor,
    progress::{BarProgressReporter, ConsoleProgressReporter, ProgressReporter},
    selection::FileSelection,
    tracing_config::init_cli_tracing,
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Remove the background from a batch of images, writing `<output>/<name>.png`
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "batch-bgremove")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files, directories or glob patterns
    #[arg(value_name = "INPUT", required_unless_present_any = &["show_providers", "only_download", "list_models", "clear_cache", "show_cache_dir"])]
    pub inputs: Vec<String>,

    /// Output directory [default: output]
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Accepted input extensions, comma separated [default: jpg,jpeg,png]
    #[arg(long, value_delimiter = ',', value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu)
    #[arg(short, long)]
    pub execution_provider: Option<String>,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Descend into subdirectories of directory inputs
    #[arg(short, long)]
    pub recursive: bool,

    /// File name pattern applied inside directories (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Model name, URL, or path to model folder [default: first cached model or the ISNet default]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Model variant (fp16, fp32)
    #[arg(long)]
    pub variant: Option<String>,

    /// JSON file with batch settings; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use custom cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Download model from URL but don't process any images [default: <https://huggingface.co/imgly/isnet-general-onnx>]
    #[arg(long)]
    pub only_download: bool,

    /// List cached models available for processing and exit
    #[arg(long)]
    pub list_models: bool,

    /// Clear cached models (combine with --model to clear specific model)
    #[arg(long)]
    pub clear_cache: bool,

    /// Show current cache directory
    #[arg(long)]
    pub show_cache_dir: bool,

    /// Log each file instead of drawing a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    let cache = open_cache(cli.cache_dir.as_deref())?;

    if cli.list_models {
        return list_cached_models(&cache);
    }
    if cli.only_download {
        return download_model_only(&cli, cache).await;
    }
    if cli.clear_cache {
        return clear_cache_models(&cli, &cache);
    }
    if cli.show_cache_dir {
        show_current_cache_dir(&cache, cli.cache_dir.is_some());
        return Ok(());
    }

    let batch_config = CliConfigBuilder::batch_config(&cli)?;

    let mut selection = FileSelection::new(batch_config.normalized_extensions());
    // Results of earlier runs are not inputs
    selection.exclude_dir(&batch_config.output_dir);
    let summary = selection
        .add_inputs(
            &cli.inputs,
            batch_config.recursive,
            batch_config.pattern.as_deref(),
        )
        .context("Failed to collect input files")?;
    if summary.duplicates > 0 {
        info!("Ignored {} duplicate input(s)", summary.duplicates);
    }
    if selection.is_empty() {
        return Err(BgRemovalError::EmptySelection.into());
    }
    info!("Selected: {}", selection.display_names().join(", "));

    let processor_config =
        CliConfigBuilder::processor_config(&batch_config, &cache, cli.cache_dir.clone())?;
    info!(
        "Backend: {}, Provider: {}, Model: {}",
        processor_config.backend_type, processor_config.execution_provider, processor_config.model_spec
    );

    ensure_model_available(&processor_config.model_spec, &cache)
        .await
        .context("Failed to ensure model is available")?;

    let reporter: Arc<dyn ProgressReporter> = if cli.no_progress || cli.verbose > 0 {
        Arc::new(ConsoleProgressReporter::new(cli.verbose > 1))
    } else {
        Arc::new(BarProgressReporter::new())
    };

    let mut processor = BackgroundRemovalProcessor::new(processor_config)
        .with_progress_reporter(Arc::clone(&reporter));
    let runner =
        BatchRunner::new(OutputLayout::new(&batch_config.output_dir)).with_reporter(reporter);

    let report = runner.run(&mut selection, &mut processor)?;
    finish(&report)
}

/// Print the summary and turn a batch without any saved file into an error
fn finish(report: &BatchReport) -> Result<()> {
    println!("{}", report.summary_line());
    for failure in &report.failed {
        println!("  ❌ {}: {}", failure.path.display(), failure.error);
    }

    if report.success_count() == 0 {
        anyhow::bail!("All {} image(s) failed to process", report.attempted);
    }
    if !report.is_complete_success() {
        warn!(
            "Some files failed to process. Processed: {}, Failed: {}",
            report.success_count(),
            report.failure_count()
        );
    }
    Ok(())
}

fn open_cache(cache_dir: Option<&Path>) -> Result<ModelCache> {
    match cache_dir {
        Some(dir) => ModelCache::with_custom_cache_dir(dir)
            .context("Failed to create cache with custom directory"),
        None => ModelCache::new().context("Failed to create model cache"),
    }
}

/// Download the default model when it is selected but not cached
async fn ensure_model_available(model_spec: &ModelSpec, cache: &ModelCache) -> Result<()> {
    let ModelSource::Downloaded(model_id) = &model_spec.source else {
        return Ok(());
    };
    if cache.is_model_cached(model_id) {
        return Ok(());
    }

    if *model_id != ModelCache::get_default_model_id() {
        anyhow::bail!(
            "Model '{}' not found in cache. Use --only-download to download it first, or use --list-models to see available models.",
            model_id
        );
    }

    println!("📦 Model not cached. Auto-downloading default model...");
    let downloader =
        ModelDownloader::with_cache(cache.clone()).context("Failed to create model downloader")?;
    let downloaded_id = downloader
        .download_model(ModelCache::get_default_model_url(), true)
        .await
        .context("Failed to download default model")?;

    if downloaded_id != *model_id {
        anyhow::bail!(
            "Downloaded model ID '{}' doesn't match expected '{}'",
            downloaded_id,
            model_id
        );
    }

    println!("✅ Model downloaded successfully!");
    Ok(())
}

fn show_provider_diagnostics() {
    println!("🔍 Backend and Execution Provider Diagnostics");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("💻 System: {cpu_count} CPU cores detected");

    println!("\n🚀 Execution Providers:");
    for provider_info in ExecutionProviderManager::list_all_providers() {
        let status = if provider_info.available {
            "✅ Available"
        } else {
            "❌ Not Available"
        };
        println!(
            "  • {}: {} - {}",
            provider_info.name, status, provider_info.description
        );
    }

    println!("\n💡 Usage Examples:");
    println!("  --execution-provider onnx:auto    # Auto-select best ONNX provider (default)");
    println!("  --execution-provider onnx:cpu     # Force ONNX CPU execution");
    println!("  --execution-provider tract:cpu    # Use pure Rust Tract backend");
}

fn list_cached_models(cache: &ModelCache) -> Result<()> {
    let models = cache
        .scan_cached_models()
        .context("Failed to list cached models")?;

    println!("📦 Cached Models");
    if models.is_empty() {
        println!("No cached models found.");
        println!("\n💡 To download a model, use:");
        println!(
            "  batch-bgremove --only-download --model {}",
            ModelCache::get_default_model_url()
        );
        return Ok(());
    }

    for model in models {
        println!("📁 Model ID: {}", model.model_id);
        println!("  └─ Cache location: {}", model.path.display());
        if !model.variants.is_empty() {
            println!("  └─ Variants: {}", model.variants.join(", "));
        }
        if model.size_bytes > 0 {
            println!("  └─ Size: {}", format_size(model.size_bytes));
        }
    }

    println!("\n💡 To use a cached model:");
    println!("  batch-bgremove --model MODEL_ID photos/");
    Ok(())
}

async fn download_model_only(cli: &Cli, cache: ModelCache) -> Result<()> {
    let model_url = match &cli.model {
        Some(model) if model.starts_with("http") => model.clone(),
        Some(_) => anyhow::bail!(
            "--only-download requires a URL. Use --model with a URL like {}",
            ModelCache::get_default_model_url()
        ),
        None => ModelCache::get_default_model_url().to_string(),
    };
    validate_model_url(&model_url).context("Invalid model URL")?;

    println!("📦 Downloading model from: {}", model_url);
    let downloader =
        ModelDownloader::with_cache(cache).context("Failed to create model downloader")?;
    let model_id = downloader
        .download_model(&model_url, true)
        .await
        .context("Failed to download model")?;

    println!("✅ Successfully downloaded model!");
    println!("   Model ID: {}", model_id);
    println!(
        "   Cache location: {}",
        downloader.cache().get_model_path(&model_id).display()
    );
    Ok(())
}

fn clear_cache_models(cli: &Cli, cache: &ModelCache) -> Result<()> {
    if let Some(model_id) = &cli.model {
        println!("🗑️  Clearing specific model: {}", model_id);
        if cache
            .clear_specific_model(model_id)
            .with_context(|| format!("Failed to clear model '{}'", model_id))?
        {
            println!("✅ Successfully removed model: {}", model_id);
        } else {
            println!("⚠️  Model '{}' not found in cache", model_id);
            println!("   Use --list-models to see available models");
        }
        return Ok(());
    }

    println!("🗑️  Clearing entire model cache...");
    let removed = cache.clear_all_models().context("Failed to clear cache")?;
    if removed.is_empty() {
        println!("💡 Cache was already empty");
    } else {
        println!("✅ Successfully removed {} model(s):", removed.len());
        for model_id in &removed {
            println!("   • {}", model_id);
        }
    }
    println!(
        "   Cache location: {}",
        cache.get_current_cache_dir().display()
    );
    Ok(())
}

fn show_current_cache_dir(cache: &ModelCache, from_flag: bool) {
    println!("📁 Current cache directory:");
    println!("   Path: {}", cache.get_current_cache_dir().display());

    let source = if from_flag {
        "--cache-dir flag".to_string()
    } else if std::env::var_os(CACHE_DIR_ENV).is_some() {
        format!("{} environment variable", CACHE_DIR_ENV)
    } else {
        "XDG cache directory specification".to_string()
    };
    println!("   Source: {}", source);
}
