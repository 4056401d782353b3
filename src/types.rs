//! Core types for background removal operations

use crate::error::{BgRemovalError, Result};
use crate::utils::Letterbox;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of removing the background from one image
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// Cut-out image, transparent where the background was
    pub image: RgbaImage,
    /// Mask the alpha channel was taken from
    pub mask: SegmentationMask,
    /// Original image dimensions
    pub original_dimensions: (u32, u32),
    pub timings: ProcessingTimings,
}

impl RemovalResult {
    /// Write the result as a PNG with alpha channel
    ///
    /// # Errors
    /// - File cannot be created or encoded
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(BgRemovalError::from)
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Grayscale foreground mask, 255 is fully foreground
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Row-major mask values
    pub data: Vec<u8>,
    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Map a `1x1xHxW` model output back onto the original image
    ///
    /// Each original pixel samples the output at its letterboxed position.
    /// Values are clamped to `[0, 1]` and scaled to `0..=255`.
    ///
    /// # Errors
    /// - Output tensor does not match the letterbox canvas
    pub fn from_tensor(
        tensor: &Array4<f32>,
        letterbox: &Letterbox,
        original_dimensions: (u32, u32),
    ) -> Result<Self> {
        let (_, channels, height, width) = tensor.dim();
        if channels == 0
            || height != letterbox.canvas_height as usize
            || width != letterbox.canvas_width as usize
        {
            return Err(BgRemovalError::processing_stage_error(
                "postprocessing",
                &format!(
                    "model output {:?} does not match input canvas {}x{}",
                    tensor.dim(),
                    letterbox.canvas_width,
                    letterbox.canvas_height
                ),
                None,
            ));
        }

        let (orig_width, orig_height) = original_dimensions;
        let mask = GrayImage::from_fn(orig_width, orig_height, |x, y| {
            let (cx, cy) = letterbox.to_canvas(x, y);
            let value = tensor
                .get([0, 0, cy as usize, cx as usize])
                .copied()
                .unwrap_or(0.0);
            Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
        });

        Ok(Self::from_image(&mask))
    }

    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        Self::new(image.as_raw().clone(), image.dimensions())
    }

    /// Convert mask to a grayscale image
    ///
    /// # Errors
    /// - Data length does not match the dimensions
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone())
            .ok_or_else(|| BgRemovalError::processing("Failed to create image from mask data"))
    }

    /// Cut the image out using the mask as alpha
    ///
    /// Fully transparent pixels are written as `(0, 0, 0, 0)`.
    ///
    /// # Errors
    /// - Image and mask dimensions differ
    pub fn apply_to_image(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let rgb = image.to_rgb8();
        if rgb.dimensions() != self.dimensions {
            return Err(BgRemovalError::processing(format!(
                "Image {:?} and mask {:?} dimensions do not match",
                rgb.dimensions(),
                self.dimensions
            )));
        }

        let (width, height) = self.dimensions;
        let mut output = RgbaImage::new(width, height);
        for ((out, src), &alpha) in output.pixels_mut().zip(rgb.pixels()).zip(&self.data) {
            *out = if alpha == 0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([src[0], src[1], src[2], alpha])
            };
        }

        Ok(output)
    }

    /// Foreground and background pixel counts
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&x| x > 127).count();
        let foreground_ratio = if total_pixels == 0 {
            0.0
        } else {
            foreground_pixels as f32 / total_pixels as f32
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels: total_pixels - foreground_pixels,
            foreground_ratio,
        }
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
}

/// Timing breakdown for one image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model loading time (first image only)
    pub model_load_ms: u64,
    /// Image loading and decoding from file
    pub image_decode_ms: u64,
    /// Resize, normalize and tensor conversion
    pub preprocessing_ms: u64,
    pub inference_ms: u64,
    /// Mask extraction and alpha application
    pub postprocessing_ms: u64,
    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// One-line breakdown for debug logs
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.model_load_ms > 0 {
            parts.push(format!("load {}ms", self.model_load_ms));
        }
        parts.push(format!("decode {}ms", self.image_decode_ms));
        parts.push(format!("preprocess {}ms", self.preprocessing_ms));
        parts.push(format!("inference {}ms", self.inference_ms));
        parts.push(format!("postprocess {}ms", self.postprocessing_ms));
        format!("{}ms total ({})", self.total_ms, parts.join(", "))
    }
}
