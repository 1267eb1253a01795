mod mask;
mod preprocess;
pub mod types;

pub use mask::{color_mask, dilate, DILATION_RADIUS};
pub use preprocess::Preprocessor;
pub use types::{
    background_label, clean_label, PartColor, PartColorMap, SegmentationMap, BACKGROUND_PARTS,
};

/// Dilated occupancy mask of one part color
pub fn part_mask(part_map: &SegmentationMap, color: PartColor) -> ndarray::Array2<f32> {
    dilate(&color_mask(part_map, color))
}
