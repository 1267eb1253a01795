use super::types::SegmentationMap;
use anyhow::Result;
use image::{imageops, RgbImage};
use ndarray::Array4;

/// Preprocessor for turning dataset images into engine inputs
///
/// The model input and its segmentation map must share one spatial grid, so
/// both are resized to the same target dimensions here.
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Square preprocessor matching a prototype network's native resolution
    pub fn square(img_size: u32) -> Self {
        Self::new(img_size, img_size)
    }

    /// Preprocess an RGB image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Convert to float and normalize to [0, 1]
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Lanczos3,
            )
        } else {
            image.clone()
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }

        Ok(tensor)
    }

    /// Bring a category-colored segmentation render onto the target grid
    ///
    /// Nearest-neighbour sampling only: any interpolating filter would blend
    /// part colors at boundaries and break exact color matching.
    pub fn segmentation(&self, part_map: &RgbImage) -> SegmentationMap {
        let _span = tracing::debug_span!("segmentation_resize").entered();

        if part_map.dimensions() == (self.target_width, self.target_height) {
            return SegmentationMap::from_rgb_image(part_map);
        }

        tracing::debug!(
            "Resizing segmentation map from {:?} to {}x{}",
            part_map.dimensions(),
            self.target_width,
            self.target_height
        );
        let resized = imageops::resize(
            part_map,
            self.target_width,
            self.target_height,
            imageops::FilterType::Nearest,
        );
        SegmentationMap::from_rgb_image(&resized)
    }

    /// Target dimensions as (width, height)
    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }
}
