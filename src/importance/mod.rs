//! Part-level reduction of an attribution grid and the threshold sweep

mod aggregate;
mod table;
mod threshold;

pub use aggregate::{aggregate, Aggregation, EmptyMaskPolicy};
pub use table::{build_table, PartImportance, TableOptions};
pub use threshold::{
    classify, default_thresholds, linspace, DecisionRule, SWEEP_END, SWEEP_POINTS, SWEEP_START,
};
