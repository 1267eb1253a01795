//! Attribution source adapters
//!
//! External explainers come in two families: pixel-attribution methods that
//! return a dense map with the input's shape, and prototype networks that
//! return a ranked list of evidence regions. Both are wrapped in [`Explainer`]
//! and reduced to an [`AttributionSignal`] before any part-level work.

pub mod precomputed;
pub mod prototype;
mod reconstruct;
pub mod types;

pub use precomputed::{PrecomputedAttribution, PrecomputedEvidence};
pub use prototype::{
    high_activation_crop, ActivationExplainer, PrototypeActivations, PrototypeNetwork,
    DEFAULT_CROP_PERCENTILE,
};
pub use reconstruct::{box_grid, weighted_grid};
pub use types::{AttributionSignal, BoundingBox, Evidence, PrototypeEvidence, Reconstruction};

use crate::error::{AttributionError, Result};
use ndarray::{Array4, Axis};
use std::fmt;

/// Which kind of output an explainer produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainerFamily {
    Pixel,
    Prototype,
}

impl fmt::Display for ExplainerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExplainerFamily::Pixel => "pixel",
            ExplainerFamily::Prototype => "prototype",
        })
    }
}

/// Pixel-attribution explainer (input x gradient, integrated gradients, ...)
pub trait PixelAttribution {
    /// Attribution for `target` with shape `[1, channels, height, width]`
    fn attribute(&mut self, image: &Array4<f32>, target: usize) -> anyhow::Result<Array4<f32>>;

    /// Human-readable method name for logs
    fn name(&self) -> &str;
}

/// Prototype-based explainer producing evidence regions
pub trait PrototypeAttribution {
    /// Evidence for `target`, ordered by decreasing activation
    fn attribute(
        &mut self,
        image: &Array4<f32>,
        target: usize,
    ) -> anyhow::Result<Vec<PrototypeEvidence>>;

    /// Side of the square grid that activation patterns live on
    fn img_size(&self) -> usize;

    /// Human-readable method name for logs
    fn name(&self) -> &str;
}

/// An external explainer of either family
pub enum Explainer {
    Pixel(Box<dyn PixelAttribution>),
    Prototype(Box<dyn PrototypeAttribution>),
}

impl Explainer {
    pub fn pixel(explainer: impl PixelAttribution + 'static) -> Self {
        Self::Pixel(Box::new(explainer))
    }

    pub fn prototype(explainer: impl PrototypeAttribution + 'static) -> Self {
        Self::Prototype(Box::new(explainer))
    }

    pub fn name(&self) -> &str {
        match self {
            Explainer::Pixel(explainer) => explainer.name(),
            Explainer::Prototype(explainer) => explainer.name(),
        }
    }

    pub fn family(&self) -> ExplainerFamily {
        match self {
            Explainer::Pixel(_) => ExplainerFamily::Pixel,
            Explainer::Prototype(_) => ExplainerFamily::Prototype,
        }
    }

    /// Run the explainer for one sample and target class
    pub fn evidence(&mut self, image: &Array4<f32>, target: usize) -> Result<Evidence> {
        ensure_single_sample(image)?;
        let _span = tracing::debug_span!("explain", explainer = self.name(), target).entered();

        match self {
            Explainer::Pixel(explainer) => {
                let attribution = explainer.attribute(image, target)?;
                ensure_single_sample(&attribution)?;

                let expected = &image.shape()[2..];
                if &attribution.shape()[2..] != expected {
                    return Err(AttributionError::shape(
                        "pixel attribution",
                        image.shape(),
                        attribution.shape(),
                    ));
                }

                // Masks are shared by all channels, so summing channels first
                // leaves every masked sum unchanged.
                let grid = attribution.index_axis(Axis(0), 0).sum_axis(Axis(0));
                Ok(Evidence::Dense(grid))
            }
            Explainer::Prototype(explainer) => {
                let img_size = explainer.img_size();
                let items = explainer.attribute(image, target)?;
                tracing::debug!("{} prototypes of class {}", items.len(), target);
                Ok(Evidence::Prototypes { img_size, items })
            }
        }
    }
}

/// Every engine operation works on a batch of exactly one sample
pub fn ensure_single_sample(tensor: &Array4<f32>) -> Result<()> {
    let batch = tensor.shape()[0];
    if batch != 1 {
        return Err(AttributionError::BatchSize(batch));
    }
    Ok(())
}
