use super::aggregate::{aggregate, Aggregation, EmptyMaskPolicy};
use crate::error::{AttributionError, Result};
use crate::segmentation::{
    background_label, clean_label, part_mask, PartColor, PartColorMap, SegmentationMap,
};
use indexmap::IndexMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Importance of every named part, in the order parts were first seen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartImportance {
    scores: IndexMap<String, f64>,
}

impl PartImportance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the entry for `label`, creating it if needed
    pub fn accumulate(&mut self, label: impl Into<String>, value: f64) {
        *self.scores.entry(label.into()).or_insert(0.0) += value;
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.scores.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scores.iter().map(|(label, score)| (label.as_str(), *score))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.scores.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl FromIterator<(String, f64)> for PartImportance {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (label, value) in iter {
            table.accumulate(label, value);
        }
        table
    }
}

/// How masked attribution is reduced while building a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    pub aggregation: Aggregation,
    pub empty_mask: EmptyMaskPolicy,
    pub with_bg: bool,
}

/// Fold the part color map into a part importance table
///
/// Each color is masked, dilated and aggregated against `grid`; colors whose
/// cleaned labels coincide are summed into one entry. With `with_bg`, the 50
/// reserved background colors follow as `bg_000`..`bg_049`. Cleaned labels
/// hold letters only, so they never clash with background labels.
pub fn build_table(
    grid: &Array2<f32>,
    part_map: &SegmentationMap,
    colors: &PartColorMap,
    options: TableOptions,
) -> Result<PartImportance> {
    let (height, width) = part_map.dims();
    if grid.dim() != (height, width) {
        return Err(AttributionError::shape(
            "attribution grid vs segmentation map",
            &[height, width],
            grid.shape(),
        ));
    }

    let _span = tracing::debug_span!(
        "part_table",
        parts = colors.len(),
        with_bg = options.with_bg
    )
    .entered();

    let score = |color: PartColor, label: &str| -> Result<f64> {
        let mask = part_mask(part_map, color);
        aggregate(grid, &mask, options.aggregation, options.empty_mask, label)
    };

    let mut table = colors
        .iter()
        .try_fold(PartImportance::new(), |mut table, (color, label)| {
            let label = clean_label(label);
            let value = score(*color, &label)?;
            table.accumulate(label, value);
            Ok::<_, AttributionError>(table)
        })?;

    if options.with_bg {
        for (index, color) in PartColor::backgrounds() {
            let label = background_label(index);
            let value = score(color, &label)?;
            table.accumulate(label, value);
        }
    }

    tracing::debug!("Built importance table with {} entries", table.len());
    Ok(table)
}
