//! Box-to-box matching algorithms.

use nalgebra::DMatrix;

use crate::Bbox;

/// A scored pairing between an element of `set_a` and one of `set_b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub index_a: usize,
    pub index_b: usize,
    pub iou: f64,
}

/// Intersection over union of two boxes, in `[0, 1]`.
///
/// Returns `0.0` when the boxes do not intersect or either has non-positive
/// area, so malformed input degrades to "no overlap" instead of failing.
pub fn overlap_score(a: &Bbox, b: &Bbox) -> f64 {
    let area_a = a.area();
    let area_b = b.area();
    if area_a <= 0 || area_b <= 0 {
        return 0.0;
    }

    let x_left = a.x1.max(b.x1);
    let y_top = a.y1.max(b.y1);
    let x_right = a.x2.min(b.x2);
    let y_bottom = a.y2.min(b.y2);

    if x_right <= x_left || y_bottom <= y_top {
        return 0.0;
    }

    let inter_w = i64::from(x_right) - i64::from(x_left);
    let inter_h = i64::from(y_bottom) - i64::from(y_top);
    let inter_area = (inter_w * inter_h) as f64;
    let union_area = area_a as f64 + area_b as f64 - inter_area;
    if union_area <= 0.0 {
        return 0.0;
    }
    inter_area / union_area
}

/// Compute the IoU matrix between two sets of boxes.
///
/// # Returns
/// Matrix of shape `(set_a.len(), set_b.len())`
pub fn iou_matrix(set_a: &[Bbox], set_b: &[Bbox]) -> DMatrix<f64> {
    DMatrix::from_fn(set_a.len(), set_b.len(), |i, j| overlap_score(&set_a[i], &set_b[j]))
}

/// Match two sets of boxes using greedy maximum-IoU assignment.
///
/// Pairs scoring at least `threshold` are visited from highest to lowest
/// score; a pair is accepted only if neither side is already taken. Equal
/// scores keep enumeration order (lower `i`, then lower `j`), which keeps the
/// output reproducible. This approximates maximum-weight bipartite matching
/// and is not globally optimal.
///
/// # Returns
/// Accepted matches in acceptance order.
pub fn assign(set_a: &[Bbox], set_b: &[Bbox], threshold: f64) -> Vec<Match> {
    if set_a.is_empty() || set_b.is_empty() {
        return Vec::new();
    }

    let scores = iou_matrix(set_a, set_b);

    // Collect all valid (i, j, iou) pairs in enumeration order
    let mut pairs: Vec<Match> = Vec::new();
    for i in 0..set_a.len() {
        for j in 0..set_b.len() {
            let iou = scores[(i, j)];
            if iou >= threshold {
                pairs.push(Match { index_a: i, index_b: j, iou });
            }
        }
    }

    // Stable sort, descending by score
    pairs.sort_by(|a, b| b.iou.total_cmp(&a.iou));

    let mut used_a = vec![false; set_a.len()];
    let mut used_b = vec![false; set_b.len()];
    let mut matches = Vec::new();

    for pair in pairs {
        if used_a[pair.index_a] || used_b[pair.index_b] {
            continue;
        }
        used_a[pair.index_a] = true;
        used_b[pair.index_b] = true;
        matches.push(pair);
    }

    matches
}

/// Indices in `0..total` that do not appear in `matched`, ascending.
pub fn unmatched(total: usize, matched: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut is_matched = vec![false; total];
    for idx in matched {
        if idx < total {
            is_matched[idx] = true;
        }
    }
    (0..total).filter(|&i| !is_matched[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn b(x1: i32, y1: i32, x2: i32, y2: i32) -> Bbox {
        Bbox::new(x1, y1, x2, y2)
    }

    // ===== overlap_score =====

    #[test]
    fn test_overlap_partial() {
        // Intersection: 5x5 = 25, Union: 100 + 100 - 25 = 175
        let score = overlap_score(&b(0, 0, 10, 10), &b(5, 5, 15, 15));
        assert_eq!(score, 25.0 / 175.0);
    }

    #[test]
    fn test_overlap_identity() {
        let a = b(3, 4, 17, 29);
        assert_relative_eq!(overlap_score(&a, &a), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_overlap_disjoint_and_touching() {
        assert_eq!(overlap_score(&b(0, 0, 10, 10), &b(20, 20, 30, 30)), 0.0);
        // Shared edge, no interior overlap
        assert_eq!(overlap_score(&b(0, 0, 10, 10), &b(10, 0, 20, 10)), 0.0);
    }

    #[test]
    fn test_overlap_zero_area() {
        let point = b(5, 5, 5, 5);
        assert_eq!(overlap_score(&point, &point), 0.0);
        assert_eq!(overlap_score(&point, &b(0, 0, 10, 10)), 0.0);
    }

    #[test]
    fn test_overlap_malformed() {
        let inverted = b(10, 10, 0, 0);
        assert_eq!(overlap_score(&inverted, &b(0, 0, 10, 10)), 0.0);
        assert_eq!(overlap_score(&inverted, &inverted), 0.0);
    }

    #[test]
    fn test_overlap_contained() {
        // 4x4 inside 10x10 -> 16 / 100
        assert_relative_eq!(overlap_score(&b(0, 0, 10, 10), &b(2, 2, 6, 6)), 0.16, epsilon = 1e-12);
    }

    #[test]
    fn test_overlap_extreme_corners() {
        let wide = b(-2_000_000_000, 0, 2_000_000_000, 10);
        assert_relative_eq!(overlap_score(&wide, &wide), 1.0, epsilon = 1e-12);
        // Intersection spans 2e9 of the 4e9 width
        assert_relative_eq!(overlap_score(&wide, &b(0, 0, 2_000_000_000, 10)), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_iou_matrix_shape() {
        let m = iou_matrix(&[b(0, 0, 10, 10), b(20, 20, 30, 30)], &[b(0, 0, 10, 10)]);
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.ncols(), 1);
        assert_relative_eq!(m[(0, 0)], 1.0, epsilon = 1e-12);
        assert_eq!(m[(1, 0)], 0.0);
    }

    // ===== assign =====

    #[test]
    fn test_assign_prefers_true_partner() {
        let a = [b(0, 0, 10, 10), b(20, 20, 30, 30)];
        let bs = [b(1, 1, 9, 9), b(21, 21, 29, 29)];
        let matches = assign(&a, &bs, 0.1);

        assert_eq!(matches.len(), 2);
        for m in &matches {
            assert_eq!(m.index_a, m.index_b);
        }
    }

    #[test]
    fn test_assign_empty_inputs() {
        assert!(assign(&[], &[b(0, 0, 1, 1)], 0.3).is_empty());
        assert!(assign(&[b(0, 0, 1, 1)], &[], 0.3).is_empty());
        assert!(assign(&[], &[], 0.3).is_empty());
    }

    #[test]
    fn test_assign_threshold_filtering() {
        // IoU 25/175 ~= 0.143
        let a = [b(0, 0, 10, 10)];
        let bs = [b(5, 5, 15, 15)];
        assert!(assign(&a, &bs, 0.3).is_empty());
        assert_eq!(assign(&a, &bs, 0.1).len(), 1);
        // Threshold is inclusive
        assert_eq!(assign(&a, &bs, 25.0 / 175.0).len(), 1);
    }

    #[test]
    fn test_assign_order_by_score() {
        // a0 overlaps b0 exactly, a1 overlaps b1 partially
        let a = [b(0, 0, 10, 10), b(100, 100, 110, 110)];
        let bs = [b(102, 100, 112, 110), b(0, 0, 10, 10)];
        let matches = assign(&a, &bs, 0.1);

        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].index_a, matches[0].index_b), (0, 1));
        assert_relative_eq!(matches[0].iou, 1.0, epsilon = 1e-12);
        assert_eq!((matches[1].index_a, matches[1].index_b), (1, 0));
    }

    #[test]
    fn test_assign_one_to_one_constraint() {
        // Both detections overlap the single track; the better one wins
        let a = [b(0, 0, 10, 10)];
        let bs = [b(1, 0, 11, 10), b(0, 0, 10, 10)];
        let matches = assign(&a, &bs, 0.1);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].index_b, 1);
    }

    #[test]
    fn test_assign_ties_break_by_index() {
        // Two identical boxes on each side: every pair scores 1.0
        let a = [b(0, 0, 10, 10), b(0, 0, 10, 10)];
        let bs = [b(0, 0, 10, 10), b(0, 0, 10, 10)];
        let matches = assign(&a, &bs, 0.5);

        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].index_a, matches[0].index_b), (0, 0));
        assert_eq!((matches[1].index_a, matches[1].index_b), (1, 1));
    }

    #[test]
    fn test_assign_greedy_not_optimal() {
        // a0 hits b0 best, which leaves a1 with nothing even though the
        // cross assignment would match both.
        let a = [b(0, 0, 10, 10), b(7, 0, 17, 10)];
        let bs = [b(3, 0, 13, 10), b(-6, 0, 4, 10)];
        let scores = iou_matrix(&a, &bs);
        assert!(scores[(0, 0)] > scores[(1, 0)]);

        let matches = assign(&a, &bs, 0.2);
        assert_eq!(matches.len(), 1);
        let used_a: HashSet<_> = matches.iter().map(|m| m.index_a).collect();
        let used_b: HashSet<_> = matches.iter().map(|m| m.index_b).collect();
        assert_eq!(used_a.len(), matches.len());
        assert_eq!(used_b.len(), matches.len());
        assert_eq!((matches[0].index_a, matches[0].index_b), (0, 0));
    }

    // ===== unmatched =====

    #[test]
    fn test_unmatched() {
        assert_eq!(unmatched(5, [1, 3]), vec![0, 2, 4]);
    }

    #[test]
    fn test_unmatched_none() {
        assert!(unmatched(3, [0, 1, 2]).is_empty());
    }

    #[test]
    fn test_unmatched_all() {
        assert_eq!(unmatched(3, []), vec![0, 1, 2]);
    }
}
