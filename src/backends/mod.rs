//! Inference engines behind [`crate::inference::InferenceBackend`]
//!
//! `onnx` wraps ONNX Runtime with optional CUDA and `CoreML` providers;
//! `tract` runs the same model files in pure Rust on the CPU.

#[cfg(feature = "onnx")]
pub mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub mod tract;
#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

#[cfg(test)]
pub(crate) mod test_utils;
