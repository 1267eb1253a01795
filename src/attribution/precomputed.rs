//! Explainers replaying attributions computed elsewhere
//!
//! Used when the attribution method ran in another process (or another
//! framework) and only its output was saved.

use super::types::PrototypeEvidence;
use super::{PixelAttribution, PrototypeAttribution};
use anyhow::ensure;
use ndarray::{Array2, Array4, Axis};

/// Dense attribution map saved ahead of time
pub struct PrecomputedAttribution {
    attribution: Array4<f32>,
    target: Option<usize>,
}

impl PrecomputedAttribution {
    /// Single-channel map of shape `[height, width]`
    pub fn from_grid(grid: Array2<f32>) -> Self {
        let attribution = grid.insert_axis(Axis(0)).insert_axis(Axis(0));
        Self::from_tensor(attribution)
    }

    /// Full attribution tensor of shape `[1, channels, height, width]`
    pub fn from_tensor(attribution: Array4<f32>) -> Self {
        Self {
            attribution,
            target: None,
        }
    }

    /// Refuse queries for any class other than `target`
    pub fn for_target(mut self, target: usize) -> Self {
        self.target = Some(target);
        self
    }
}

impl PixelAttribution for PrecomputedAttribution {
    fn attribute(&mut self, _image: &Array4<f32>, target: usize) -> anyhow::Result<Array4<f32>> {
        if let Some(expected) = self.target {
            ensure!(
                expected == target,
                "attribution was computed for class {}, not {}",
                expected,
                target
            );
        }
        Ok(self.attribution.clone())
    }

    fn name(&self) -> &str {
        "precomputed"
    }
}

/// Prototype evidence saved ahead of time
pub struct PrecomputedEvidence {
    img_size: usize,
    items: Vec<PrototypeEvidence>,
}

impl PrecomputedEvidence {
    pub fn new(img_size: usize, items: Vec<PrototypeEvidence>) -> Self {
        Self { img_size, items }
    }
}

impl PrototypeAttribution for PrecomputedEvidence {
    fn attribute(
        &mut self,
        _image: &Array4<f32>,
        _target: usize,
    ) -> anyhow::Result<Vec<PrototypeEvidence>> {
        Ok(self.items.clone())
    }

    fn img_size(&self) -> usize {
        self.img_size
    }

    fn name(&self) -> &str {
        "precomputed-prototypes"
    }
}
