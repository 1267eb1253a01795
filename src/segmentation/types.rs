use crate::error::{AttributionError, Result};
use image::RgbImage;
use indexmap::IndexMap;
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};

/// Number of reserved background sub-identities in a segmentation map
pub const BACKGROUND_PARTS: usize = 50;

/// Exact RGB triple identifying one part in a segmentation map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct PartColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PartColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Color of background sub-region `index`: (204, 204, 204 + index)
    ///
    /// `None` for indices at or above [`BACKGROUND_PARTS`].
    pub fn background(index: usize) -> Option<Self> {
        if index >= BACKGROUND_PARTS {
            return None;
        }
        let offset = u8::try_from(index).ok()?;
        Some(Self::new(204, 204, 204 + offset))
    }

    /// Every reserved background color with its index, in index order
    pub fn backgrounds() -> impl Iterator<Item = (usize, PartColor)> {
        (0..BACKGROUND_PARTS).filter_map(|index| Self::background(index).map(|color| (index, color)))
    }
}

impl From<[u8; 3]> for PartColor {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<PartColor> for [u8; 3] {
    fn from(color: PartColor) -> Self {
        [color.r, color.g, color.b]
    }
}

/// Table label of background sub-region `index`, e.g. `bg_007`
pub fn background_label(index: usize) -> String {
    format!("bg_{:03}", index)
}

/// Strip every non-alphabetic character from a part label
///
/// `"wing_01"` and `"wing02"` both become `"wing"`, so their importances are
/// accumulated together. Case is preserved.
pub fn clean_label(label: &str) -> String {
    label.chars().filter(|c| c.is_alphabetic()).collect()
}

/// Insertion-ordered mapping from segmentation color to part label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartColorMap {
    parts: IndexMap<PartColor, String>,
}

impl PartColorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(color, label)` pairs, rejecting repeated colors
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (PartColor, S)>,
        S: Into<String>,
    {
        let mut map = Self::new();
        for (color, label) in pairs {
            map.insert(color, label)?;
        }
        Ok(map)
    }

    pub fn insert(&mut self, color: PartColor, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        if let Some(existing) = self.parts.get(&color) {
            return Err(AttributionError::InvalidPartMap(format!(
                "color {:?} mapped to both '{}' and '{}'",
                <[u8; 3]>::from(color),
                existing,
                label
            )));
        }
        self.parts.insert(color, label);
        Ok(())
    }

    pub fn get(&self, color: &PartColor) -> Option<&str> {
        self.parts.get(color).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartColor, &str)> {
        self.parts.iter().map(|(color, label)| (color, label.as_str()))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Category-colored segmentation map in HWC layout
///
/// Every pixel holds the exact color of the single part it belongs to. Maps
/// are never interpolated; resizing goes through nearest-neighbour sampling
/// (see [`super::Preprocessor::segmentation`]).
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMap {
    pixels: Array3<u8>,
}

impl SegmentationMap {
    /// Wrap an `[height, width, 3]` array
    pub fn from_array(pixels: Array3<u8>) -> Result<Self> {
        let shape = pixels.shape();
        if shape[2] != 3 {
            return Err(AttributionError::shape(
                "segmentation channels",
                &[shape[0], shape[1], 3],
                shape,
            ));
        }
        Ok(Self { pixels })
    }

    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let pixels = Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
            image.get_pixel(x as u32, y as u32)[c]
        });
        Self { pixels }
    }

    /// A map of the given size painted in a single color
    pub fn filled(height: usize, width: usize, color: PartColor) -> Self {
        let rgb: [u8; 3] = color.into();
        let pixels = Array3::from_shape_fn((height, width, 3), |(_, _, c)| rgb[c]);
        Self { pixels }
    }

    /// Paint the inclusive rectangle `[y0, y1] × [x0, x1]`
    pub fn paint(&mut self, y0: usize, y1: usize, x0: usize, x1: usize, color: PartColor) {
        let (height, width) = self.dims();
        let rgb: [u8; 3] = color.into();
        for y in y0..=y1.min(height.saturating_sub(1)) {
            for x in x0..=x1.min(width.saturating_sub(1)) {
                for (c, value) in rgb.iter().enumerate() {
                    self.pixels[[y, x, c]] = *value;
                }
            }
        }
    }

    /// Spatial dimensions as (height, width)
    pub fn dims(&self) -> (usize, usize) {
        let shape = self.pixels.shape();
        (shape[0], shape[1])
    }

    pub fn view(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }
}
