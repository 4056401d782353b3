//! Batch background removal CLI tool
//!
//! Removes the background from every input image and writes the cut-outs as
//! PNG files, using ONNX Runtime or Tract for inference.

#[cfg(feature = "cli")]
use batch_bgremove::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
