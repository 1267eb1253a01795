use super::types::{PartColor, SegmentationMap};
use ndarray::{Array2, Axis};

/// Half-width of the square dilation window (5x5)
///
/// Fixed so that part importances stay comparable across explainers.
pub const DILATION_RADIUS: usize = 2;

/// Binary occupancy mask of the pixels painted exactly in `color`
///
/// Returns 1.0 where all three channels match and 0.0 elsewhere. A color
/// absent from the map yields an all-zero mask.
pub fn color_mask(part_map: &SegmentationMap, color: PartColor) -> Array2<f32> {
    let pixels = part_map.view();
    let target: [u8; 3] = color.into();

    pixels.map_axis(Axis(2), |rgb| {
        if rgb.iter().zip(target.iter()).all(|(a, b)| a == b) {
            1.0
        } else {
            0.0
        }
    })
}

/// Morphological dilation by a 5x5 max filter, stride 1, zero padding 2
///
/// The rectangular window is separable, so the filter runs as a horizontal
/// pass followed by a vertical one. Output has the input's shape.
pub fn dilate(mask: &Array2<f32>) -> Array2<f32> {
    let _span = tracing::trace_span!("dilate").entered();

    let horizontal = max_filter_rows(mask, DILATION_RADIUS);
    let vertical = max_filter_rows(&horizontal.t().to_owned(), DILATION_RADIUS);
    vertical.t().to_owned()
}

/// Sliding max along each row; out-of-range positions count as zero
fn max_filter_rows(input: &Array2<f32>, radius: usize) -> Array2<f32> {
    let (height, width) = input.dim();
    Array2::from_shape_fn((height, width), |(y, x)| {
        let lo = x.saturating_sub(radius);
        let hi = (x + radius).min(width.saturating_sub(1));
        let window_max = (lo..=hi)
            .map(|i| input[[y, i]])
            .fold(f32::NEG_INFINITY, f32::max);

        // The window reaches into the zero padding near the borders
        if x < radius || x + radius >= width {
            window_max.max(0.0)
        } else {
            window_max
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const RED: PartColor = PartColor::new(255, 0, 0);

    #[test]
    fn absent_color_gives_empty_mask() {
        let map = SegmentationMap::filled(6, 6, RED);
        let mask = color_mask(&map, PartColor::new(0, 255, 0));
        assert_eq!(mask.sum(), 0.0);
    }

    #[test]
    fn color_match_is_exact() {
        let mut map = SegmentationMap::filled(3, 3, PartColor::new(0, 0, 0));
        map.paint(1, 1, 1, 1, RED);
        map.paint(0, 0, 0, 0, PartColor::new(255, 0, 1));

        let mask = color_mask(&map, RED);
        assert_eq!(mask.sum(), 1.0);
        assert_eq!(mask[[1, 1]], 1.0);
        assert_eq!(mask[[0, 0]], 0.0);
    }

    #[test]
    fn single_pixel_dilates_to_5x5_square() {
        let mut mask = Array2::zeros((9, 9));
        mask[[4, 4]] = 1.0;

        let dilated = dilate(&mask);
        assert_eq!(dilated.sum(), 25.0);
        assert_eq!(dilated[[2, 2]], 1.0);
        assert_eq!(dilated[[6, 6]], 1.0);
        assert_eq!(dilated[[1, 4]], 0.0);
        assert_eq!(dilated[[4, 7]], 0.0);
    }

    #[test]
    fn dilation_is_clipped_at_borders() {
        let mut mask = Array2::zeros((4, 6));
        mask[[0, 0]] = 1.0;

        let dilated = dilate(&mask);
        assert_eq!(dilated.dim(), (4, 6));
        // 3x3 corner block survives, the rest of the window is padding
        assert_eq!(dilated.sum(), 9.0);
    }

    #[test]
    fn dilation_of_empty_mask_is_empty() {
        let mask = Array2::<f32>::zeros((5, 7));
        assert_eq!(dilate(&mask).sum(), 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_dilation_never_removes_coverage(
            height in 1usize..12,
            width in 1usize..12,
            seed in proptest::collection::vec(any::<bool>(), 144),
        ) {
            let mask = Array2::from_shape_fn((height, width), |(y, x)| {
                if seed[y * 12 + x] { 1.0 } else { 0.0 }
            });
            let dilated = dilate(&mask);

            prop_assert_eq!(dilated.dim(), mask.dim());
            for ((idx, value), dilated_value) in mask.indexed_iter().zip(dilated.iter()) {
                if *value > 0.0 {
                    prop_assert_eq!(*dilated_value, 1.0, "pixel {:?} lost", idx);
                }
            }
        }
    }
}
