use crate::error::{AttributionError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Normalization applied to the attribution mass inside a part mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregation {
    /// Raw masked sum
    Sum,
    /// Masked sum divided by the mask area
    AreaAveraged,
}

/// What area averaging does with a part that covers no pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyMaskPolicy {
    /// The part scores 0.0, so it is never important at a positive threshold
    #[default]
    Zero,
    /// Fail the query with [`AttributionError::UndefinedAggregation`]
    Error,
}

/// Reduce the attribution inside `mask` to a single scalar
///
/// `part` names the mask in errors. Sums accumulate in f64.
pub fn aggregate(
    grid: &Array2<f32>,
    mask: &Array2<f32>,
    mode: Aggregation,
    empty_mask: EmptyMaskPolicy,
    part: &str,
) -> Result<f64> {
    if grid.dim() != mask.dim() {
        return Err(AttributionError::shape(
            "part mask",
            grid.shape(),
            mask.shape(),
        ));
    }

    let masked: f64 = grid
        .iter()
        .zip(mask.iter())
        .map(|(&a, &m)| a as f64 * m as f64)
        .sum();

    match mode {
        Aggregation::Sum => Ok(masked),
        Aggregation::AreaAveraged => {
            let area: f64 = mask.iter().map(|&m| m as f64).sum();
            if area > 0.0 {
                return Ok(masked / area);
            }
            match empty_mask {
                EmptyMaskPolicy::Zero => Ok(0.0),
                EmptyMaskPolicy::Error => Err(AttributionError::UndefinedAggregation {
                    part: part.to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::dilate;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn sum_mode_returns_masked_sum() {
        let grid = array![[1.0, 2.0], [3.0, -4.0]];
        let mask = array![[1.0, 0.0], [1.0, 1.0]];
        let value = aggregate(&grid, &mask, Aggregation::Sum, EmptyMaskPolicy::Zero, "p").unwrap();
        assert_relative_eq!(value, 0.0);
    }

    #[test]
    fn area_averaged_divides_by_mask_area() {
        let grid = array![[1.0, 2.0], [3.0, 4.0]];
        let mask = array![[1.0, 1.0], [0.0, 0.0]];
        let value = aggregate(
            &grid,
            &mask,
            Aggregation::AreaAveraged,
            EmptyMaskPolicy::Error,
            "p",
        )
        .unwrap();
        assert_relative_eq!(value, 1.5);
    }

    #[test]
    fn mask_against_itself_averages_to_one() {
        let mut mask = Array2::zeros((12, 12));
        mask[[3, 4]] = 1.0;
        mask[[9, 9]] = 1.0;
        let dilated = dilate(&mask);

        let value = aggregate(
            &dilated,
            &dilated,
            Aggregation::AreaAveraged,
            EmptyMaskPolicy::Error,
            "self",
        )
        .unwrap();
        assert_eq!(value, 1.0);
    }

    #[test]
    fn empty_mask_follows_policy() {
        let grid = Array2::from_elem((3, 3), 2.0);
        let mask = Array2::zeros((3, 3));

        let zero = aggregate(&grid, &mask, Aggregation::AreaAveraged, EmptyMaskPolicy::Zero, "tail")
            .unwrap();
        assert_eq!(zero, 0.0);

        let err = aggregate(&grid, &mask, Aggregation::AreaAveraged, EmptyMaskPolicy::Error, "tail")
            .unwrap_err();
        match err {
            AttributionError::UndefinedAggregation { part } => assert_eq!(part, "tail"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn empty_mask_is_fine_in_sum_mode() {
        let grid = Array2::from_elem((3, 3), 2.0);
        let mask = Array2::zeros((3, 3));
        let value = aggregate(&grid, &mask, Aggregation::Sum, EmptyMaskPolicy::Error, "tail").unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let grid = Array2::zeros((3, 3));
        let mask = Array2::zeros((3, 4));
        let err = aggregate(&grid, &mask, Aggregation::Sum, EmptyMaskPolicy::Zero, "p").unwrap_err();
        assert!(err.is_contract_violation());
    }
}
