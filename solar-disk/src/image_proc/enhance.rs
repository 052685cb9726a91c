//! Intensity conversions applied before segmentation.

use ndarray::{Array2, ArrayView2, ArrayView3, Axis};

/// Collapse a `(rows, cols, channels)` color frame to grayscale by averaging channels.
pub fn to_grayscale(rgb: ArrayView3<f64>) -> Array2<f64> {
    let (rows, cols, _) = rgb.dim();
    rgb.mean_axis(Axis(2))
        .unwrap_or_else(|| Array2::zeros((rows, cols)))
}

/// Smallest and largest pixel values, or `None` for an empty image.
pub fn value_range(image: ArrayView2<f64>) -> Option<(f64, f64)> {
    if image.is_empty() {
        return None;
    }
    let min_val = image.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max_val = image.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    Some((min_val, max_val))
}

/// Histogram equalization onto `(0, 1]`.
///
/// Each pixel is mapped through the normalized cumulative histogram of the
/// image, interpolated linearly between bin centers. A flat image maps to all
/// ones.
pub fn equalize_histogram(image: ArrayView2<f64>, bins: usize) -> Array2<f64> {
    let bins = bins.max(2);
    let Some((min_val, max_val)) = value_range(image) else {
        return Array2::zeros(image.dim());
    };
    if max_val <= min_val {
        return Array2::ones(image.dim());
    }

    let bin_width = (max_val - min_val) / bins as f64;
    let bin_of = |v: f64| (((v - min_val) / bin_width) as usize).min(bins - 1);

    let mut histogram = vec![0usize; bins];
    for &v in image.iter() {
        histogram[bin_of(v)] += 1;
    }

    let total = image.len() as f64;
    let mut running = 0;
    let cdf: Vec<f64> = histogram
        .iter()
        .map(|&count| {
            running += count;
            running as f64 / total
        })
        .collect();

    image.mapv(|v| {
        // Position in units of bins, measured from the first bin center
        let pos = (v - min_val) / bin_width - 0.5;
        if pos <= 0.0 {
            return cdf[0];
        }
        let lower = pos.floor() as usize;
        if lower >= bins - 1 {
            return cdf[bins - 1];
        }
        let frac = pos - lower as f64;
        cdf[lower] + frac * (cdf[lower + 1] - cdf[lower])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr2, Array3};

    #[test]
    fn test_grayscale_is_channel_mean() {
        let mut rgb = Array3::zeros((2, 3, 3));
        rgb[[0, 0, 0]] = 0.3;
        rgb[[0, 0, 1]] = 0.6;
        rgb[[0, 0, 2]] = 0.9;
        rgb[[1, 2, 1]] = 1.5;

        let gray = to_grayscale(rgb.view());
        assert_eq!(gray.dim(), (2, 3));
        assert_relative_eq!(gray[[0, 0]], 0.6, epsilon = 1e-12);
        assert_relative_eq!(gray[[1, 2]], 0.5, epsilon = 1e-12);
        assert_eq!(gray[[0, 1]], 0.0);
    }

    #[test]
    fn test_equalize_preserves_order_and_range() {
        let image = arr2(&[[0.0, 0.1, 0.2], [0.25, 0.3, 10.0]]);
        let eq = equalize_histogram(image.view(), 256);

        let values: Vec<f64> = eq.iter().copied().collect();
        for pair in values.windows(2) {
            assert!(pair[0] <= pair[1], "not monotone: {values:?}");
        }
        assert!(values.iter().all(|&v| v > 0.0 && v <= 1.0));
        assert_relative_eq!(eq[[1, 2]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_equalize_spreads_clustered_values() {
        // Five dark pixels packed near zero and one bright outlier
        let image = arr2(&[[0.0, 0.001, 0.002], [0.003, 0.004, 1.0]]);
        let eq = equalize_histogram(image.view(), 1024);

        // The dark pixels covered under 1% of the input range
        assert!(eq[[1, 1]] - eq[[0, 0]] > 0.5);
    }

    #[test]
    fn test_equalize_flat_and_empty() {
        let flat = Array2::from_elem((3, 3), 0.7);
        assert!(equalize_histogram(flat.view(), 64).iter().all(|&v| v == 1.0));

        let empty = Array2::<f64>::zeros((0, 4));
        assert_eq!(equalize_histogram(empty.view(), 64).dim(), (0, 4));
    }
}
