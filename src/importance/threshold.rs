use super::table::PartImportance;
use serde::{Deserialize, Serialize};

/// Number of points in the default threshold sweep
pub const SWEEP_POINTS: usize = 80;
/// Smallest threshold of the default sweep
pub const SWEEP_START: f64 = 0.01;
/// Largest threshold of the default sweep
pub const SWEEP_END: f64 = 0.50;

/// When a part counts as important at threshold `t`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionRule {
    /// `importance > total_attribution * t`
    Relative,
    /// `importance > t`, for importances already normalized per pixel
    Absolute,
}

impl DecisionRule {
    fn cutoff(self, total: f64, threshold: f64) -> f64 {
        match self {
            DecisionRule::Relative => total * threshold,
            DecisionRule::Absolute => threshold,
        }
    }
}

/// `SWEEP_POINTS` thresholds evenly spaced over [0.01, 0.50], ends included
pub fn default_thresholds() -> Vec<f64> {
    linspace(SWEEP_START, SWEEP_END, SWEEP_POINTS)
}

/// `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Parts exceeding the cutoff at each threshold
///
/// One list per threshold, in threshold order; each list follows the table's
/// insertion order. The comparison is strict.
pub fn classify(
    table: &PartImportance,
    total: f64,
    thresholds: &[f64],
    rule: DecisionRule,
) -> Vec<Vec<String>> {
    let _span = tracing::debug_span!("classify", ?rule, thresholds = thresholds.len()).entered();

    thresholds
        .iter()
        .map(|&threshold| {
            let cutoff = rule.cutoff(total, threshold);
            table
                .iter()
                .filter(|(_, score)| *score > cutoff)
                .map(|(label, _)| label.to_string())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn table(entries: &[(&str, f64)]) -> PartImportance {
        entries
            .iter()
            .map(|(label, score)| (label.to_string(), *score))
            .collect()
    }

    #[test]
    fn default_sweep_shape() {
        let thresholds = default_thresholds();
        assert_eq!(thresholds.len(), 80);
        assert_eq!(thresholds[0], 0.01);
        assert_eq!(thresholds[79], 0.50);
        assert_relative_eq!(thresholds[1] - thresholds[0], 0.49 / 79.0, epsilon = 1e-12);
    }

    #[test]
    fn relative_rule_is_strict() {
        let scores = table(&[("beak", 100.0), ("wing", 0.0)]);
        let result = classify(&scores, 100.0, &[0.1, 0.9, 1.0], DecisionRule::Relative);
        assert_eq!(
            result,
            vec![vec!["beak".to_string()], vec!["beak".to_string()], vec![]]
        );
    }

    #[test]
    fn absolute_rule_ignores_total() {
        let scores = table(&[("beak", 0.3), ("tail", 0.05), ("bg_000", 0.6)]);
        let result = classify(&scores, 1e6, &[0.01, 0.3, 0.5], DecisionRule::Absolute);
        assert_eq!(result[0], vec!["beak", "tail", "bg_000"]);
        assert_eq!(result[1], vec!["bg_000"]);
        assert_eq!(result[2], vec!["bg_000"]);
    }

    #[test]
    fn negative_importance_is_never_selected_for_positive_total() {
        let scores = table(&[("eye", -3.0)]);
        let result = classify(&scores, 10.0, &default_thresholds(), DecisionRule::Relative);
        assert!(result.iter().all(Vec::is_empty));
    }

    #[test]
    fn empty_threshold_list() {
        let scores = table(&[("eye", 1.0)]);
        assert!(classify(&scores, 1.0, &[], DecisionRule::Relative).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_relative_sweep_is_monotone(
            scores in proptest::collection::vec(-50.0f64..50.0, 0..12),
            total in 0.0f64..100.0,
        ) {
            let entries: Vec<(String, f64)> = scores
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("part{}", i), *s))
                .collect();
            let scores: PartImportance = entries.into_iter().collect();
            let thresholds = default_thresholds();

            let result = classify(&scores, total, &thresholds, DecisionRule::Relative);
            prop_assert_eq!(result.len(), thresholds.len());
            for pair in result.windows(2) {
                prop_assert!(pair[1].len() <= pair[0].len());
            }
        }
    }
}
