//! Property tests for overlap scoring and greedy assignment.

use proptest::prelude::*;
use rtb_tracker::{assign, overlap_score, Bbox, Tracker, TrackerConfig};
use std::collections::HashSet;

fn bbox_strategy() -> impl Strategy<Value = Bbox> {
    (0i32..200, 0i32..200, 0i32..60, 0i32..60).prop_map(|(x, y, w, h)| Bbox::from_xywh(x, y, w, h))
}

proptest! {
    #[test]
    fn overlap_is_symmetric(a in bbox_strategy(), b in bbox_strategy()) {
        prop_assert_eq!(overlap_score(&a, &b), overlap_score(&b, &a));
    }

    #[test]
    fn overlap_in_unit_range(a in bbox_strategy(), b in bbox_strategy()) {
        let score = overlap_score(&a, &b);
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn overlap_with_self_is_one(a in bbox_strategy()) {
        if a.area() > 0 {
            prop_assert!((overlap_score(&a, &a) - 1.0).abs() < 1e-12);
        } else {
            prop_assert_eq!(overlap_score(&a, &a), 0.0);
        }
    }

    #[test]
    fn assign_is_one_to_one(
        set_a in prop::collection::vec(bbox_strategy(), 0..12),
        set_b in prop::collection::vec(bbox_strategy(), 0..12),
        threshold in 0.0f64..1.0,
    ) {
        let matches = assign(&set_a, &set_b, threshold);
        let used_a: HashSet<_> = matches.iter().map(|m| m.index_a).collect();
        let used_b: HashSet<_> = matches.iter().map(|m| m.index_b).collect();
        prop_assert_eq!(used_a.len(), matches.len());
        prop_assert_eq!(used_b.len(), matches.len());

        for m in &matches {
            prop_assert!(m.iou >= threshold);
            prop_assert_eq!(m.iou, overlap_score(&set_a[m.index_a], &set_b[m.index_b]));
        }

        // Acceptance order is by non-increasing score
        for pair in matches.windows(2) {
            prop_assert!(pair[0].iou >= pair[1].iou);
        }
    }

    #[test]
    fn assign_is_deterministic(
        set_a in prop::collection::vec(bbox_strategy(), 0..8),
        set_b in prop::collection::vec(bbox_strategy(), 0..8),
    ) {
        prop_assert_eq!(assign(&set_a, &set_b, 0.1), assign(&set_a, &set_b, 0.1));
    }

    #[test]
    fn track_ids_unique_and_increasing(
        frames in prop::collection::vec(prop::collection::vec(bbox_strategy(), 0..6), 1..20),
    ) {
        let mut config = TrackerConfig::new();
        config.confirm_frames = 1;
        config.max_missed = 1;
        let mut tracker = Tracker::new(config).unwrap();

        let mut spawned = Vec::new();
        for (frame, detections) in frames.iter().enumerate() {
            for event in tracker.advance(frame as u64, detections, None, None) {
                if event.kind == rtb_tracker::EventKind::Spawn {
                    spawned.push(event.track_id);
                }
            }
        }

        for pair in spawned.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        prop_assert_eq!(spawned.len() as u64, tracker.total_object_count());
    }
}
