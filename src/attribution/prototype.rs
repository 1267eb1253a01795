//! Evidence extraction from a prototype network's raw outputs

use super::types::{BoundingBox, PrototypeEvidence};
use super::PrototypeAttribution;
use anyhow::{ensure, Result};
use image::{imageops, ImageBuffer, Luma};
use ndarray::{Array2, Array3, Array4, ArrayView2};

/// Percentile of the activation pattern that bounds a prototype's evidence box
pub const DEFAULT_CROP_PERCENTILE: f64 = 95.0;

/// Per-prototype similarities of one input
#[derive(Debug, Clone)]
pub struct PrototypeActivations {
    /// Maximum similarity of each prototype over all patches
    pub activations: Vec<f32>,
    /// Similarity maps at feature resolution, shape `[prototypes, h, w]`
    pub patterns: Array3<f32>,
}

/// A trained prototype network, seen only through its outputs
pub trait PrototypeNetwork {
    /// Similarity of every prototype to the patches of `image`
    fn activations(&mut self, image: &Array4<f32>) -> Result<PrototypeActivations>;

    /// Class each prototype was learned for
    fn prototype_classes(&self) -> &[usize];

    /// Last-layer weight from `prototype` to `class`
    fn connection(&self, class: usize, prototype: usize) -> f32;

    /// Side of the square input grid
    fn img_size(&self) -> usize;
}

/// Turns a prototype network into a [`PrototypeAttribution`] explainer
///
/// Prototypes of the target class are reported strongest first, each with its
/// activation pattern upsampled to the input grid and the box around its
/// high-activation region.
pub struct ActivationExplainer<N> {
    network: N,
    crop_percentile: f64,
}

impl<N: PrototypeNetwork> ActivationExplainer<N> {
    pub fn new(network: N) -> Self {
        Self {
            network,
            crop_percentile: DEFAULT_CROP_PERCENTILE,
        }
    }

    pub fn with_crop_percentile(mut self, percentile: f64) -> Self {
        self.crop_percentile = percentile.clamp(0.0, 100.0);
        self
    }

    pub fn network(&self) -> &N {
        &self.network
    }
}

impl<N: PrototypeNetwork> PrototypeAttribution for ActivationExplainer<N> {
    fn attribute(&mut self, image: &Array4<f32>, target: usize) -> Result<Vec<PrototypeEvidence>> {
        let outputs = self.network.activations(image)?;
        let classes = self.network.prototype_classes();
        let n_prototypes = outputs.activations.len();

        ensure!(
            outputs.patterns.shape()[0] == n_prototypes,
            "{} activation patterns for {} prototypes",
            outputs.patterns.shape()[0],
            n_prototypes
        );
        ensure!(
            classes.len() == n_prototypes,
            "{} prototype classes for {} prototypes",
            classes.len(),
            n_prototypes
        );

        let mut order: Vec<usize> = (0..n_prototypes).collect();
        order.sort_by(|&a, &b| {
            outputs.activations[b].total_cmp(&outputs.activations[a])
        });

        let img_size = self.network.img_size();
        let evidence = order
            .into_iter()
            .filter(|&p| classes[p] == target)
            .map(|p| {
                let pattern = upsample(outputs.patterns.index_axis(ndarray::Axis(0), p), img_size);
                let bbox = high_activation_crop(pattern.view(), self.crop_percentile);
                PrototypeEvidence {
                    bbox,
                    activation_pattern: pattern,
                    activation: outputs.activations[p],
                    connection_weight: self.network.connection(target, p),
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "{} of {} prototypes belong to class {}",
            evidence.len(),
            n_prototypes,
            target
        );
        Ok(evidence)
    }

    fn img_size(&self) -> usize {
        self.network.img_size()
    }

    fn name(&self) -> &str {
        "prototype-activations"
    }
}

/// Bounding box of the pixels at or above the given percentile
///
/// Percentiles interpolate linearly between the sorted values. An empty
/// pattern, or one where nothing reaches the threshold, gives the box at the
/// origin.
pub fn high_activation_crop(pattern: ArrayView2<'_, f32>, percentile: f64) -> BoundingBox {
    let mut sorted: Vec<f32> = pattern.iter().copied().collect();
    if sorted.is_empty() {
        return BoundingBox::new(0, 0, 0, 0);
    }
    sorted.sort_by(f32::total_cmp);

    let rank = percentile.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let threshold =
        sorted[lo] as f64 + (sorted[hi] as f64 - sorted[lo] as f64) * (rank - lo as f64);

    let mut rows: Option<(usize, usize)> = None;
    let mut cols: Option<(usize, usize)> = None;
    for ((y, x), &value) in pattern.indexed_iter() {
        if (value as f64) < threshold {
            continue;
        }
        rows = Some(rows.map_or((y, y), |(a, b)| (a.min(y), b.max(y))));
        cols = Some(cols.map_or((x, x), |(a, b)| (a.min(x), b.max(x))));
    }

    match (rows, cols) {
        (Some((y_min, y_max)), Some((x_min, x_max))) => BoundingBox::new(y_min, y_max, x_min, x_max),
        _ => BoundingBox::new(0, 0, 0, 0),
    }
}

/// Bicubic upsampling of a similarity map to `size x size`
///
/// `imageops::resize` clamps float pixels to [0, 1], so the map is rescaled
/// into that range for resampling and back afterwards.
fn upsample(pattern: ArrayView2<'_, f32>, size: usize) -> Array2<f32> {
    let (height, width) = pattern.dim();
    if (height, width) == (size, size) {
        return pattern.to_owned();
    }
    if height == 0 || width == 0 {
        return Array2::zeros((size, size));
    }

    let min = pattern.iter().copied().fold(f32::INFINITY, f32::min);
    let max = pattern.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range.is_nan() || range <= 0.0 {
        return Array2::from_elem((size, size), min);
    }

    let buffer: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            Luma([(pattern[[y as usize, x as usize]] - min) / range])
        });
    let resized = imageops::resize(
        &buffer,
        size as u32,
        size as u32,
        imageops::FilterType::CatmullRom,
    );

    Array2::from_shape_fn((size, size), |(y, x)| {
        min + resized.get_pixel(x as u32, y as u32)[0] * range
    })
}
