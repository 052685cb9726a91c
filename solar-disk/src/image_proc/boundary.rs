//! Outer contour extraction by Moore-neighbor tracing.
//!
//! Contours are returned as pixel-center coordinates with `x` = column and
//! `y` = row, walked clockwise (in image orientation, rows growing downward)
//! from the first pixel of the region in raster order.

use nalgebra::Vector2;
use ndarray::ArrayView2;
use rayon::prelude::*;

use super::thresholding::offset;

/// Moore neighborhood as `(d_row, d_col)`, clockwise starting from west.
const MOORE: [(isize, isize); 8] = [
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
];

/// Index of west in [`MOORE`].
const WEST: usize = 0;

/// Ordered outer boundary of the region carrying `label`.
///
/// Returns an empty contour if no pixel has that label, and a single point for
/// an isolated pixel. Pixels on a one-pixel-wide neck appear once per pass.
pub fn trace_boundary(labels: ArrayView2<u32>, label: u32) -> Vec<Vector2<f64>> {
    labels
        .indexed_iter()
        .find(|(_, &l)| l == label)
        .map(|(start, _)| trace_from(labels, label, start))
        .unwrap_or_default()
}

/// Outer boundaries of regions `1..=label_count`, indexed by `label - 1`.
///
/// Start pixels are found in one raster pass and the regions are traced in
/// parallel.
pub fn trace_all_boundaries(labels: ArrayView2<u32>, label_count: u32) -> Vec<Vec<Vector2<f64>>> {
    let mut starts = vec![None; label_count as usize];
    for (pos, &label) in labels.indexed_iter() {
        if label > 0 && label <= label_count {
            let slot = &mut starts[label as usize - 1];
            if slot.is_none() {
                *slot = Some(pos);
            }
        }
    }

    starts
        .into_par_iter()
        .enumerate()
        .map(|(i, start)| match start {
            Some(start) => trace_from(labels, i as u32 + 1, start),
            None => Vec::new(),
        })
        .collect()
}

/// Trace from `start`, which must be the region's first pixel in raster order
/// so that its west neighbor is outside the region.
fn trace_from(labels: ArrayView2<u32>, label: u32, start: (usize, usize)) -> Vec<Vector2<f64>> {
    let (rows, cols) = labels.dim();

    // Next boundary pixel clockwise from `current`, scanning after the
    // backtrack direction, plus the new backtrack direction seen from it.
    let step = |current: (usize, usize), backtrack: usize| -> Option<((usize, usize), usize)> {
        for k in 1..=8 {
            let dir = (backtrack + k) % 8;
            let (dy, dx) = MOORE[dir];
            let Some(next) = offset(current.0, current.1, dy, dx, rows, cols) else {
                continue;
            };
            if labels[next] != label {
                continue;
            }
            // The previously examined neighbor is outside; re-express it from `next`
            let (py, px) = MOORE[(dir + 7) % 8];
            let rel = (
                current.0 as isize + py - next.0 as isize,
                current.1 as isize + px - next.1 as isize,
            );
            let new_backtrack = MOORE.iter().position(|&d| d == rel).unwrap_or(WEST);
            return Some((next, new_backtrack));
        }
        None
    };

    let to_point = |(row, col): (usize, usize)| Vector2::new(col as f64, row as f64);
    let mut contour = vec![to_point(start)];

    let Some((second, mut backtrack)) = step(start, WEST) else {
        return contour;
    };

    // Each boundary pixel is entered at most 4 times
    let max_steps = 4 * rows * cols + 8;
    let mut current = second;
    for _ in 0..max_steps {
        let Some((next, next_backtrack)) = step(current, backtrack) else {
            break;
        };
        // Back at the start and about to repeat the first move
        if current == start && next == second {
            break;
        }
        contour.push(to_point(current));
        current = next;
        backtrack = next_backtrack;
    }

    contour
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    fn xy(points: &[Vector2<f64>]) -> Vec<(f64, f64)> {
        points.iter().map(|p| (p.x, p.y)).collect()
    }

    #[test]
    fn test_square_boundary_is_clockwise() {
        let mut labels = Array2::zeros((5, 5));
        for row in 1..4 {
            for col in 1..4 {
                labels[[row, col]] = 1;
            }
        }

        let contour = trace_boundary(labels.view(), 1);

        assert_eq!(
            xy(&contour),
            vec![
                (1.0, 1.0),
                (2.0, 1.0),
                (3.0, 1.0),
                (3.0, 2.0),
                (3.0, 3.0),
                (2.0, 3.0),
                (1.0, 3.0),
                (1.0, 2.0),
            ]
        );
    }

    #[test]
    fn test_region_touching_frame_edge() {
        let labels = Array2::from_elem((2, 3), 1u32);
        let contour = trace_boundary(labels.view(), 1);

        assert_eq!(
            xy(&contour),
            vec![
                (0.0, 0.0),
                (1.0, 0.0),
                (2.0, 0.0),
                (2.0, 1.0),
                (1.0, 1.0),
                (0.0, 1.0),
            ]
        );
    }

    #[test]
    fn test_single_pixel_and_missing_label() {
        let mut labels = Array2::zeros((3, 3));
        labels[[1, 1]] = 4;

        assert_eq!(xy(&trace_boundary(labels.view(), 4)), vec![(1.0, 1.0)]);
        assert!(trace_boundary(labels.view(), 2).is_empty());
    }

    #[test]
    fn test_diagonal_neck_is_walked_both_ways() {
        // Two pixels joined only at a corner
        let labels = arr2(&[[1, 0], [0, 1]]);
        let contour = trace_boundary(labels.view(), 1);

        assert_eq!(xy(&contour), vec![(0.0, 0.0), (1.0, 1.0)]);
    }

    #[test]
    fn test_trace_all_matches_single_traces() {
        let labels = arr2(&[
            [1, 1, 0, 0, 0],
            [1, 1, 0, 2, 0],
            [0, 0, 0, 2, 2],
            [3, 0, 0, 2, 2],
        ]);

        let all = trace_all_boundaries(labels.view(), 3);
        assert_eq!(all.len(), 3);
        for label in 1..=3u32 {
            assert_eq!(all[label as usize - 1], trace_boundary(labels.view(), label));
        }
        assert_eq!(all[0].len(), 4);
        assert_eq!(all[2].len(), 1);
    }

    #[test]
    fn test_disk_boundary_lies_near_circle() {
        let (cx, cy, r) = (20.0, 18.0, 9.0);
        let labels = Array2::from_shape_fn((40, 40), |(row, col)| {
            let d = ((col as f64 - cx).powi(2) + (row as f64 - cy).powi(2)).sqrt();
            u32::from(d <= r)
        });

        let contour = trace_boundary(labels.view(), 1);
        assert!(contour.len() > 40);
        for p in &contour {
            let d = ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt();
            assert!(d <= r && d > r - 1.5, "boundary point at distance {d}");
        }
        // Consecutive points are 8-neighbors
        for pair in contour.windows(2) {
            let step = pair[1] - pair[0];
            assert!(step.x.abs() <= 1.0 && step.y.abs() <= 1.0 && step != Vector2::zeros());
        }
    }
}
