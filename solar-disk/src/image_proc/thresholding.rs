//! Global thresholding and connected-component labeling
//!
//! Separates the bright solar disk from the sky background and splits the
//! foreground into individually labeled regions.

use ndarray::{Array2, ArrayView2, Zip};

use super::enhance::value_range;

/// 8-connectivity neighbor offsets as `(d_row, d_col)`
const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Calculate Otsu's threshold for a grayscale image
///
/// Picks the histogram split that maximizes the between-class variance of
/// background and foreground. A flat image returns its maximum so that no
/// pixel lies above the threshold; an empty image returns 0.
///
/// # Arguments
///
/// * `image` - Input grayscale image
/// * `bins` - Number of histogram bins
pub fn otsu_threshold(image: ArrayView2<f64>, bins: usize) -> f64 {
    let bins = bins.max(2);
    let Some((min_val, max_val)) = value_range(image) else {
        return 0.0;
    };
    if max_val - min_val < 1e-12 {
        return max_val;
    }

    let scale = (bins - 1) as f64 / (max_val - min_val);
    let mut histogram = vec![0u64; bins];
    for &pixel in image.iter() {
        let bin = (((pixel - min_val) * scale).round() as usize).min(bins - 1);
        histogram[bin] += 1;
    }

    let total = image.len() as f64;
    let total_moment: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut best_bin = 0;
    let mut max_variance = 0.0;
    let mut background_count = 0u64;
    let mut background_moment = 0.0;

    for (t, &count) in histogram.iter().enumerate().take(bins - 1) {
        background_count += count;
        background_moment += t as f64 * count as f64;

        let w_bg = background_count as f64 / total;
        if w_bg == 0.0 || w_bg == 1.0 {
            continue;
        }
        let w_fg = 1.0 - w_bg;

        let mean_bg = background_moment / background_count as f64;
        let mean_fg = (total_moment - background_moment) / (total - background_count as f64);

        let variance = w_bg * w_fg * (mean_bg - mean_fg).powi(2);
        if variance > max_variance {
            max_variance = variance;
            best_bin = t;
        }
    }

    min_val + best_bin as f64 / scale
}

/// Binary mask of pixels strictly above `threshold`.
pub fn apply_threshold(image: ArrayView2<f64>, threshold: f64) -> Array2<bool> {
    let mut mask = Array2::from_elem(image.dim(), false);
    Zip::from(&mut mask)
        .and(&image)
        .for_each(|m, &v| *m = v > threshold);
    mask
}

/// Label 8-connected regions of a binary mask.
///
/// Returns the label image (0 = background, regions numbered from 1 in
/// raster order of their first pixel) and the number of regions.
pub fn connected_components(mask: ArrayView2<bool>) -> (Array2<u32>, u32) {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::zeros((rows, cols));
    let mut label_count = 0;
    let mut stack = Vec::new();

    for ((row, col), &set) in mask.indexed_iter() {
        if !set || labels[[row, col]] != 0 {
            continue;
        }
        label_count += 1;
        labels[[row, col]] = label_count;
        stack.push((row, col));

        while let Some((y, x)) = stack.pop() {
            for &(dy, dx) in &NEIGHBORS {
                let Some((ny, nx)) = offset(y, x, dy, dx, rows, cols) else {
                    continue;
                };
                if mask[[ny, nx]] && labels[[ny, nx]] == 0 {
                    labels[[ny, nx]] = label_count;
                    stack.push((ny, nx));
                }
            }
        }
    }

    (labels, label_count)
}

/// Pixel count of each region, indexed by `label - 1`.
pub fn component_sizes(labels: ArrayView2<u32>, label_count: u32) -> Vec<usize> {
    let mut sizes = vec![0; label_count as usize];
    for &label in labels.iter().filter(|&&l| l > 0 && l <= label_count) {
        sizes[label as usize - 1] += 1;
    }
    sizes
}

/// Neighbor of `(row, col)` shifted by `(dy, dx)`, if inside a `rows x cols` grid.
pub(crate) fn offset(
    row: usize,
    col: usize,
    dy: isize,
    dx: isize,
    rows: usize,
    cols: usize,
) -> Option<(usize, usize)> {
    let ny = row.checked_add_signed(dy)?;
    let nx = col.checked_add_signed(dx)?;
    (ny < rows && nx < cols).then_some((ny, nx))
}
