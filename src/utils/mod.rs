//! Shared helpers for model arguments, execution providers and preprocessing

pub mod models;
pub mod preprocessing;
pub mod providers;

pub use models::ModelSpecParser;
pub use preprocessing::{ImagePreprocessor, Letterbox, PreprocessingOptions};
pub use providers::{ExecutionProviderManager, ProviderInfo};
