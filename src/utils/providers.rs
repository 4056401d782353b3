//! Execution provider parsing and availability listing

use crate::{
    config::ExecutionProvider,
    error::{BgRemovalError, Result},
    processor::BackendType,
};

/// Information about an execution provider
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// ONNX providers in listing order, with their descriptions
const ONNX_PROVIDERS: &[(ExecutionProvider, &str)] = &[
    (
        ExecutionProvider::Auto,
        "ONNX Runtime with auto-selected provider",
    ),
    (ExecutionProvider::Cpu, "ONNX Runtime CPU execution"),
    (ExecutionProvider::Cuda, "ONNX Runtime CUDA GPU acceleration"),
    (
        ExecutionProvider::CoreMl,
        "ONNX Runtime CoreML (Apple Silicon) acceleration",
    ),
];

/// Utility for parsing and listing execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse an execution provider string in `backend:provider` form
    ///
    /// A bare backend name selects that backend's default provider.
    ///
    /// # Examples
    /// ```rust
    /// use batch_bgremove::utils::ExecutionProviderManager;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:cuda")?;
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("tract")?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - Unknown backend or provider name
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let Some((backend, provider)) = provider_str.split_once(':') else {
            return match provider_str {
                "onnx" => Ok((BackendType::Onnx, ExecutionProvider::Auto)),
                "tract" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
                _ => Err(BgRemovalError::invalid_config(
                    "Invalid provider format. Use backend:provider (e.g., onnx:auto, tract:cpu)",
                )),
            };
        };

        match backend {
            "onnx" => {
                let execution_provider = match provider {
                    "auto" => ExecutionProvider::Auto,
                    "cpu" => ExecutionProvider::Cpu,
                    "cuda" => ExecutionProvider::Cuda,
                    "coreml" => ExecutionProvider::CoreMl,
                    _ => {
                        return Err(BgRemovalError::invalid_config(format!(
                            "Unknown ONNX provider: {}. Supported: auto, cpu, cuda, coreml",
                            provider
                        )));
                    },
                };
                Ok((BackendType::Onnx, execution_provider))
            },
            "tract" if provider == "cpu" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
            "tract" => Err(BgRemovalError::invalid_config(format!(
                "Unknown Tract provider: {}. Tract only supports 'cpu'",
                provider
            ))),
            _ => Err(BgRemovalError::invalid_config(format!(
                "Unknown backend: {}. Supported backends: onnx, tract",
                backend
            ))),
        }
    }

    /// List every provider combination with its availability in this build
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        let onnx_available: std::collections::HashMap<String, bool> =
            crate::backends::OnnxBackend::list_providers()
                .into_iter()
                .map(|(name, available, _)| (name.to_lowercase(), available))
                .collect();

        for (provider, description) in ONNX_PROVIDERS {
            #[cfg(feature = "onnx")]
            let (available, description) = {
                let available = match provider {
                    ExecutionProvider::Auto => onnx_available.values().any(|&a| a),
                    other => onnx_available
                        .get(&other.to_string())
                        .copied()
                        .unwrap_or(false),
                };
                (available, (*description).to_string())
            };
            #[cfg(not(feature = "onnx"))]
            let (available, description) = (false, format!("{} (feature disabled)", description));

            providers.push(ProviderInfo {
                name: Self::provider_to_string(BackendType::Onnx, *provider),
                backend_type: BackendType::Onnx,
                execution_provider: *provider,
                available,
                description,
            });
        }

        #[cfg(feature = "tract")]
        for (name, available, description) in crate::backends::TractBackend::list_providers() {
            providers.push(ProviderInfo {
                name: format!("tract:{}", name.to_lowercase()),
                backend_type: BackendType::Tract,
                execution_provider: ExecutionProvider::Cpu,
                available,
                description,
            });
        }

        #[cfg(not(feature = "tract"))]
        providers.push(ProviderInfo {
            name: "tract:cpu".to_string(),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: false,
            description: "Pure Rust CPU inference via Tract (feature disabled)".to_string(),
        });

        providers
    }

    /// Convert backend type and execution provider back to `backend:provider`
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        format!("{}:{}", backend_type, provider)
    }
}
