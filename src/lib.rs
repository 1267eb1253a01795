//! # partlens
//!
//! Part-level faithfulness scores for visual explanations.
//!
//! An explainer's attribution (a dense saliency map, or the evidence boxes of
//! a prototype network) is projected onto the named parts of a color-coded
//! segmentation map:
//! - every part color is masked exactly and dilated by a 5x5 max filter
//! - attribution inside the dilated mask is summed (or area-averaged)
//! - a threshold sweep decides which parts count as important
//!
//! ```rust,ignore
//! use partlens::{EngineConfig, EngineVariant, Explainer, PartImportanceEngine};
//!
//! let explainer = Explainer::pixel(my_saliency_method);
//! let mut engine = PartImportanceEngine::new(explainer, EngineConfig::new(EngineVariant::Attribution))?;
//! let parts = engine.important_parts_default(&image, &part_map, target, &colors, true)?;
//! ```

pub mod attribution;
pub mod engine;
pub mod error;
pub mod importance;
pub mod loader;
pub mod model;
pub mod segmentation;

pub use attribution::{
    AttributionSignal, BoundingBox, Evidence, Explainer, ExplainerFamily, PixelAttribution,
    PrototypeAttribution, PrototypeEvidence, Reconstruction,
};
pub use engine::{EngineConfig, EngineVariant, MassBaseline, PartImportanceEngine, SweepReport};
pub use error::{AttributionError, Result};
pub use importance::{
    default_thresholds, Aggregation, DecisionRule, EmptyMaskPolicy, PartImportance,
};
pub use model::{ClassifierModel, ModelExplainer};
pub use segmentation::{PartColor, PartColorMap, SegmentationMap};
