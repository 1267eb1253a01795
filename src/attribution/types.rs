use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Evidence region of one prototype, inclusive on both ends of each range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub y_min: usize,
    pub y_max: usize,
    pub x_min: usize,
    pub x_max: usize,
}

impl BoundingBox {
    pub fn new(y_min: usize, y_max: usize, x_min: usize, x_max: usize) -> Self {
        Self {
            y_min,
            y_max,
            x_min,
            x_max,
        }
    }

    /// Number of pixels covered
    pub fn area(&self) -> usize {
        (self.y_max.saturating_sub(self.y_min) + 1) * (self.x_max.saturating_sub(self.x_min) + 1)
    }
}

/// One prototype's contribution to a decision
#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeEvidence {
    pub bbox: BoundingBox,
    /// Activation pattern upsampled to the explainer's native grid
    pub activation_pattern: Array2<f32>,
    /// Maximum similarity of the prototype to any patch of the input
    pub activation: f32,
    /// Last-layer weight linking the prototype to the target class
    pub connection_weight: f32,
}

/// Raw explainer output, before reduction to a dense grid
#[derive(Debug, Clone)]
pub enum Evidence {
    /// Per-pixel attribution, channels already summed
    Dense(Array2<f32>),
    /// Prototype evidence in the order the explainer produced it
    Prototypes {
        img_size: usize,
        items: Vec<PrototypeEvidence>,
    },
}

/// How prototype evidence becomes a dense grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reconstruction {
    /// Sum of activation patterns scaled by their connection weights
    Weighted,
    /// Union of bounding boxes, 1.0 inside and 0.0 outside
    BinaryBox,
}

/// Dense attribution grid plus its total mass
#[derive(Debug, Clone)]
pub struct AttributionSignal {
    pub grid: Array2<f32>,
    pub total: f64,
}

impl AttributionSignal {
    pub fn new(grid: Array2<f32>) -> Self {
        let total = grid.iter().map(|&v| v as f64).sum();
        Self { grid, total }
    }

    /// Spatial dimensions as (height, width)
    pub fn dims(&self) -> (usize, usize) {
        self.grid.dim()
    }
}
