//! Image preprocessing for model inference
//!
//! The model sees a fixed-size canvas. Images are scaled to fit while keeping
//! their aspect ratio, centered, and padded. [`Letterbox`] records that
//! placement so the mask can be mapped back onto the original pixels.

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{DynamicImage, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Placement of a scaled image inside the model canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Scale factor from original to canvas pixels
    pub scale: f32,
    /// Size of the scaled image on the canvas
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Top-left corner of the scaled image on the canvas
    pub offset_x: u32,
    pub offset_y: u32,
    /// Canvas size
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Letterbox {
    /// Compute the placement of an `original` sized image on a `canvas` sized input
    ///
    /// # Errors
    /// - Either dimension of the original image or canvas is zero
    pub fn fit(original: (u32, u32), canvas: (u32, u32)) -> Result<Self> {
        let (orig_width, orig_height) = original;
        let (canvas_width, canvas_height) = canvas;

        if orig_width == 0 || orig_height == 0 {
            return Err(BgRemovalError::processing(format!(
                "Cannot preprocess an empty image ({}x{})",
                orig_width, orig_height
            )));
        }
        if canvas_width == 0 || canvas_height == 0 {
            return Err(BgRemovalError::model(format!(
                "Model input size must be non-zero, got {}x{}",
                canvas_width, canvas_height
            )));
        }

        let scale = (canvas_width as f32 / orig_width as f32)
            .min(canvas_height as f32 / orig_height as f32);

        let scaled_width = ((orig_width as f32 * scale).round() as u32).clamp(1, canvas_width);
        let scaled_height = ((orig_height as f32 * scale).round() as u32).clamp(1, canvas_height);

        Ok(Self {
            scale,
            scaled_width,
            scaled_height,
            offset_x: (canvas_width - scaled_width) / 2,
            offset_y: (canvas_height - scaled_height) / 2,
            canvas_width,
            canvas_height,
        })
    }

    /// Canvas coordinate for an original pixel, clamped to the scaled region
    #[must_use]
    pub fn to_canvas(&self, x: u32, y: u32) -> (u32, u32) {
        let sx = ((x as f32 * self.scale) as u32).min(self.scaled_width - 1);
        let sy = ((y as f32 * self.scale) as u32).min(self.scaled_height - 1);
        (sx + self.offset_x, sy + self.offset_y)
    }
}

/// Configuration for preprocessing behavior
#[derive(Debug, Clone)]
pub struct PreprocessingOptions {
    /// Padding color around the scaled image (RGB)
    pub padding_color: [u8; 3],
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            padding_color: [255, 255, 255],
        }
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Convert an image into a normalized NCHW tensor for the model
    ///
    /// Returns the tensor and the letterbox used to build it.
    ///
    /// # Errors
    /// - Empty input image
    /// - Invalid model input size
    pub fn preprocess(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
        options: &PreprocessingOptions,
    ) -> Result<(Array4<f32>, Letterbox)> {
        let [target_height, target_width] = preprocessing_config.target_size;

        let rgb_image = image.to_rgb8();
        let letterbox = Letterbox::fit(rgb_image.dimensions(), (target_width, target_height))?;

        let resized = image::imageops::resize(
            &rgb_image,
            letterbox.scaled_width,
            letterbox.scaled_height,
            image::imageops::FilterType::Triangle,
        );

        let padding = options.padding_color;
        let mut canvas = ImageBuffer::from_pixel(
            target_width,
            target_height,
            image::Rgb([padding[0], padding[1], padding[2]]),
        );
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        let tensor = Self::canvas_to_tensor(&canvas, preprocessing_config);
        Ok((tensor, letterbox))
    }

    /// Preprocess with default options, tensor and letterbox only
    ///
    /// # Errors
    /// - Same as [`ImagePreprocessor::preprocess`]
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<(Array4<f32>, Letterbox)> {
        Self::preprocess(image, preprocessing_config, &PreprocessingOptions::default())
    }

    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match canvas size
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                tensor[[0, channel, y, x]] =
                    (f32::from(pixel[channel]) / 255.0 - mean[channel]) / std[channel];
            }
        }

        tensor
    }
}
