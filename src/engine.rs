//! Engine variants tying an explainer to the part-importance pipeline

use crate::attribution::{Evidence, Explainer, ExplainerFamily, Reconstruction};
use crate::error::{AttributionError, Result};
use crate::importance::{
    build_table, classify, default_thresholds, Aggregation, DecisionRule, EmptyMaskPolicy,
    PartImportance, TableOptions,
};
use crate::segmentation::{PartColorMap, SegmentationMap};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Adaptation policy from explainer output to important parts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineVariant {
    /// Dense pixel attribution, summed per part, relative thresholds
    #[default]
    Attribution,
    /// Prototype evidence reconstructed as a weighted map and treated like a
    /// pixel attribution
    PrototypeAttribLike,
    /// Prototype boxes, averaged over each part's area, absolute thresholds
    PrototypeAreaAveraged,
}

impl EngineVariant {
    pub const ALL: [EngineVariant; 3] = [
        EngineVariant::Attribution,
        EngineVariant::PrototypeAttribLike,
        EngineVariant::PrototypeAreaAveraged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EngineVariant::Attribution => "attribution",
            EngineVariant::PrototypeAttribLike => "prototype-attrib-like",
            EngineVariant::PrototypeAreaAveraged => "prototype-area-averaged",
        }
    }

    /// Explainer family the variant knows how to adapt
    pub fn family(self) -> ExplainerFamily {
        match self {
            EngineVariant::Attribution => ExplainerFamily::Pixel,
            EngineVariant::PrototypeAttribLike | EngineVariant::PrototypeAreaAveraged => {
                ExplainerFamily::Prototype
            }
        }
    }

    pub fn decision_rule(self) -> DecisionRule {
        match self {
            EngineVariant::Attribution | EngineVariant::PrototypeAttribLike => {
                DecisionRule::Relative
            }
            EngineVariant::PrototypeAreaAveraged => DecisionRule::Absolute,
        }
    }

    /// Reconstruction and aggregation behind the thresholded table
    fn decision_stage(self) -> (Reconstruction, Aggregation) {
        match self {
            EngineVariant::Attribution | EngineVariant::PrototypeAttribLike => {
                (Reconstruction::Weighted, Aggregation::Sum)
            }
            EngineVariant::PrototypeAreaAveraged => {
                (Reconstruction::BinaryBox, Aggregation::AreaAveraged)
            }
        }
    }
}

impl fmt::Display for EngineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineVariant {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "attribution" | "pixel" => Ok(EngineVariant::Attribution),
            "prototype-attrib-like" | "prototype-attriblike" | "attrib-like" => {
                Ok(EngineVariant::PrototypeAttribLike)
            }
            "prototype-area-averaged" | "prototype" | "area-averaged" => {
                Ok(EngineVariant::PrototypeAreaAveraged)
            }
            _ => Err(AttributionError::UnknownExplainerVariant(s.to_string())),
        }
    }
}

/// Total mass the attrib-like prototype variant scales relative thresholds by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MassBaseline {
    /// Pixel area covered by the union of evidence boxes
    #[default]
    BoxCoverage,
    /// Sum of the weighted reconstruction
    Signal,
}

impl FromStr for MassBaseline {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "box-coverage" | "boxes" => Ok(MassBaseline::BoxCoverage),
            "signal" => Ok(MassBaseline::Signal),
            _ => Err(AttributionError::InvalidConfig(format!(
                "unknown mass baseline '{}' (expected box-coverage or signal)",
                s
            ))),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub variant: EngineVariant,
    pub baseline: MassBaseline,
    pub empty_mask: EmptyMaskPolicy,
    /// Sweep used by [`PartImportanceEngine::important_parts_default`]
    pub thresholds: Vec<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            variant: EngineVariant::default(),
            baseline: MassBaseline::default(),
            empty_mask: EmptyMaskPolicy::default(),
            thresholds: default_thresholds(),
        }
    }
}

impl EngineConfig {
    pub fn new(variant: EngineVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    pub fn with_baseline(mut self, baseline: MassBaseline) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_empty_mask(mut self, policy: EmptyMaskPolicy) -> Self {
        self.empty_mask = policy;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// Everything one threshold sweep computed
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub variant: EngineVariant,
    pub target: usize,
    /// Total mass the relative rule scales thresholds by
    pub total_attribution: f64,
    /// Table the thresholds were applied to
    pub part_importance: PartImportance,
    pub thresholds: Vec<f64>,
    pub important_parts: Vec<Vec<String>>,
}

/// Part-importance engine for one explainer
pub struct PartImportanceEngine {
    explainer: Explainer,
    config: EngineConfig,
}

impl PartImportanceEngine {
    /// Pair an explainer with a variant that can adapt its output
    pub fn new(explainer: Explainer, config: EngineConfig) -> Result<Self> {
        if explainer.family() != config.variant.family() {
            return Err(AttributionError::UnknownExplainerVariant(format!(
                "{} explainer '{}' under variant '{}'",
                explainer.family(),
                explainer.name(),
                config.variant
            )));
        }
        tracing::info!(
            "Engine ready: explainer={}, variant={}",
            explainer.name(),
            config.variant
        );
        Ok(Self { explainer, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn variant(&self) -> EngineVariant {
        self.config.variant
    }

    /// Importance of every part for `target`
    ///
    /// Always the plain masked sum: prototype evidence is reconstructed as a
    /// weighted activation map, even for the area-averaged variant whose
    /// decisions use box coverage instead.
    pub fn part_importance(
        &mut self,
        image: &Array4<f32>,
        part_map: &SegmentationMap,
        target: usize,
        colors: &PartColorMap,
        with_bg: bool,
    ) -> Result<PartImportance> {
        let evidence = self.explainer.evidence(image, target)?;
        let signal = evidence.reconstruct(Reconstruction::Weighted)?;
        build_table(
            &signal.grid,
            part_map,
            colors,
            self.table_options(Aggregation::Sum, with_bg),
        )
    }

    /// Important parts at each of `thresholds`, in threshold order
    pub fn important_parts(
        &mut self,
        image: &Array4<f32>,
        part_map: &SegmentationMap,
        target: usize,
        colors: &PartColorMap,
        thresholds: &[f64],
        with_bg: bool,
    ) -> Result<Vec<Vec<String>>> {
        let report = self.sweep(image, part_map, target, colors, thresholds, with_bg)?;
        Ok(report.important_parts)
    }

    /// [`Self::important_parts`] over the configured threshold sweep
    pub fn important_parts_default(
        &mut self,
        image: &Array4<f32>,
        part_map: &SegmentationMap,
        target: usize,
        colors: &PartColorMap,
        with_bg: bool,
    ) -> Result<Vec<Vec<String>>> {
        let thresholds = self.config.thresholds.clone();
        self.important_parts(image, part_map, target, colors, &thresholds, with_bg)
    }

    /// Run the explainer once and sweep the thresholds over its output
    pub fn sweep(
        &mut self,
        image: &Array4<f32>,
        part_map: &SegmentationMap,
        target: usize,
        colors: &PartColorMap,
        thresholds: &[f64],
        with_bg: bool,
    ) -> Result<SweepReport> {
        let variant = self.config.variant;
        let _span = tracing::info_span!("sweep", %variant, target).entered();

        let evidence = self.explainer.evidence(image, target)?;
        let (reconstruction, aggregation) = variant.decision_stage();
        let signal = evidence.reconstruct(reconstruction)?;
        let table = build_table(
            &signal.grid,
            part_map,
            colors,
            self.table_options(aggregation, with_bg),
        )?;

        let total = match variant {
            EngineVariant::PrototypeAttribLike => self.attrib_like_total(&evidence, signal.total)?,
            _ => signal.total,
        };

        let important_parts = classify(&table, total, thresholds, variant.decision_rule());
        tracing::debug!(
            "Total attribution {:.4}; {} parts at the lowest threshold",
            total,
            important_parts.first().map_or(0, Vec::len)
        );

        Ok(SweepReport {
            variant,
            target,
            total_attribution: total,
            part_importance: table,
            thresholds: thresholds.to_vec(),
            important_parts,
        })
    }

    fn attrib_like_total(&self, evidence: &Evidence, weighted_total: f64) -> Result<f64> {
        match self.config.baseline {
            MassBaseline::Signal => Ok(weighted_total),
            MassBaseline::BoxCoverage => Ok(evidence.reconstruct(Reconstruction::BinaryBox)?.total),
        }
    }

    fn table_options(&self, aggregation: Aggregation, with_bg: bool) -> TableOptions {
        TableOptions {
            aggregation,
            empty_mask: self.config.empty_mask,
            with_bg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{PrecomputedAttribution, PrecomputedEvidence};

    #[test]
    fn variant_names_round_trip() {
        for variant in EngineVariant::ALL {
            assert_eq!(variant.as_str().parse::<EngineVariant>().unwrap(), variant);
        }
        assert_eq!(
            "Prototype_Attribl".parse::<EngineVariant>().unwrap_err().to_string(),
            "no adaptation policy for explainer variant 'Prototype_Attribl'"
        );
    }

    #[test]
    fn variants_map_to_explainer_families() {
        assert_eq!(EngineVariant::Attribution.family(), ExplainerFamily::Pixel);
        assert_eq!(EngineVariant::PrototypeAttribLike.family(), ExplainerFamily::Prototype);
        assert_eq!(EngineVariant::PrototypeAreaAveraged.family(), ExplainerFamily::Prototype);

        let explainer = Explainer::prototype(PrecomputedEvidence::new(4, Vec::new()));
        assert_eq!(explainer.family(), ExplainerFamily::Prototype);
        for variant in [EngineVariant::PrototypeAttribLike, EngineVariant::PrototypeAreaAveraged] {
            let explainer = Explainer::prototype(PrecomputedEvidence::new(4, Vec::new()));
            assert!(PartImportanceEngine::new(explainer, EngineConfig::new(variant)).is_ok());
        }
    }

    #[test]
    fn unknown_baseline_is_a_config_error() {
        assert_eq!("signal".parse::<MassBaseline>().unwrap(), MassBaseline::Signal);
        assert_eq!("Box_Coverage".parse::<MassBaseline>().unwrap(), MassBaseline::BoxCoverage);

        let err = "coverage-ish".parse::<MassBaseline>().unwrap_err();
        assert!(matches!(err, AttributionError::InvalidConfig(_)));
        assert!(!err.to_string().contains("explainer variant"));
        assert!(err.to_string().contains("coverage-ish"));
    }

    #[test]
    fn mismatched_family_is_rejected() {
        let explainer = Explainer::prototype(PrecomputedEvidence::new(4, Vec::new()));
        let err = PartImportanceEngine::new(explainer, EngineConfig::new(EngineVariant::Attribution))
            .err()
            .unwrap();
        assert!(matches!(err, AttributionError::UnknownExplainerVariant(_)));

        let grid = ndarray::Array2::zeros((4, 4));
        let explainer = Explainer::pixel(PrecomputedAttribution::from_grid(grid));
        assert!(PartImportanceEngine::new(
            explainer,
            EngineConfig::new(EngineVariant::PrototypeAreaAveraged)
        )
        .is_err());
    }

    #[test]
    fn config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.variant, EngineVariant::Attribution);
        assert_eq!(config.baseline, MassBaseline::BoxCoverage);
        assert_eq!(config.empty_mask, EmptyMaskPolicy::Zero);
        assert_eq!(config.thresholds.len(), 80);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"variant":"prototype-area-averaged","empty_mask":"error"}"#)
                .unwrap();
        assert_eq!(config.variant, EngineVariant::PrototypeAreaAveraged);
        assert_eq!(config.empty_mask, EmptyMaskPolicy::Error);
        assert_eq!(config.thresholds, default_thresholds());
    }
}
