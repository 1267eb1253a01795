use super::types::{AttributionSignal, Evidence, PrototypeEvidence, Reconstruction};
use crate::error::{AttributionError, Result};
use ndarray::{s, Array2};

impl Evidence {
    /// Reduce explainer output to a dense attribution grid
    ///
    /// Dense evidence is returned as is; the reconstruction policy only
    /// applies to prototype evidence.
    pub fn reconstruct(&self, policy: Reconstruction) -> Result<AttributionSignal> {
        match self {
            Evidence::Dense(grid) => Ok(AttributionSignal::new(grid.clone())),
            Evidence::Prototypes { img_size, items } => {
                let _span =
                    tracing::debug_span!("reconstruct", ?policy, prototypes = items.len()).entered();
                let grid = match policy {
                    Reconstruction::Weighted => weighted_grid(items, *img_size)?,
                    Reconstruction::BinaryBox => box_grid(items, *img_size),
                };
                Ok(AttributionSignal::new(grid))
            }
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, Evidence::Dense(_))
    }
}

/// Sum of `activation_pattern * connection_weight` over all evidence
pub fn weighted_grid(items: &[PrototypeEvidence], img_size: usize) -> Result<Array2<f32>> {
    let mut grid = Array2::<f32>::zeros((img_size, img_size));
    for item in items {
        let pattern = &item.activation_pattern;
        if pattern.dim() != (img_size, img_size) {
            return Err(AttributionError::shape(
                "prototype activation pattern",
                &[img_size, img_size],
                pattern.shape(),
            ));
        }
        grid.scaled_add(item.connection_weight, pattern);
    }
    Ok(grid)
}

/// Union of the evidence boxes, clipped to the grid
///
/// Boxes are assigned, not added: overlaps saturate at 1.0.
pub fn box_grid(items: &[PrototypeEvidence], img_size: usize) -> Array2<f32> {
    let mut grid = Array2::<f32>::zeros((img_size, img_size));
    if img_size == 0 {
        return grid;
    }
    let last = img_size - 1;
    for item in items {
        let bbox = item.bbox;
        if bbox.y_min > last || bbox.x_min > last {
            continue;
        }
        let y_max = bbox.y_max.min(last);
        let x_max = bbox.x_max.min(last);
        if bbox.y_min > y_max || bbox.x_min > x_max {
            continue;
        }
        grid.slice_mut(s![bbox.y_min..=y_max, bbox.x_min..=x_max])
            .fill(1.0);
    }
    grid
}
