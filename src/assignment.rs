use ndarray::Array2;

use crate::bbox::{BBox, Ltwh};

/// Result of matching tracks (rows) against detections (columns).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    /// `(row, column, iou)` in commit order.
    pub matches: Vec<(usize, usize, f32)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

/// IoU of every row box against every column box.
pub fn iou_matrix(rows: &[BBox<Ltwh>], cols: &[BBox<Ltwh>]) -> Array2<f32> {
    Array2::from_shape_fn((rows.len(), cols.len()), |(r, c)| rows[r].iou(&cols[c]))
}

/// Greedy highest-IoU-first assignment.
///
/// Pairs below `threshold` are never matched. Among candidates the pair with
/// the highest IoU is committed first; equal IoUs go to the lower row key
/// and then to the lower column index. `row_keys` orders rows for that tie
/// break (track ids), so it must have one entry per row.
pub fn greedy(ious: &Array2<f32>, row_keys: &[u64], threshold: f32) -> Assignment {
    let (n_rows, n_cols) = ious.dim();
    debug_assert_eq!(row_keys.len(), n_rows);

    let mut candidates: Vec<(usize, usize, f32)> = ious
        .indexed_iter()
        .filter(|&(_, &iou)| iou >= threshold)
        .map(|((r, c), &iou)| (r, c, iou))
        .collect();

    candidates.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then_with(|| row_keys[a.0].cmp(&row_keys[b.0]))
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut row_used = vec![false; n_rows];
    let mut col_used = vec![false; n_cols];
    let mut matches = Vec::new();

    for (r, c, iou) in candidates {
        if row_used[r] || col_used[c] {
            continue;
        }

        row_used[r] = true;
        col_used[c] = true;
        matches.push((r, c, iou));
    }

    Assignment {
        matches,
        unmatched_rows: (0..n_rows).filter(|&r| !row_used[r]).collect(),
        unmatched_cols: (0..n_cols).filter(|&c| !col_used[c]).collect(),
    }
}
