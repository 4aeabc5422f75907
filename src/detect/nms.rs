use super::result::Detection;

/// Greedy per-class non-max suppression.
///
/// Candidates are visited by descending confidence. A candidate is dropped when its
/// IoU with an already kept box of the same class exceeds `iou_threshold`.
/// The result is ordered by descending confidence.
pub fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if candidates.len() < 2 {
        return candidates;
    }

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_empty() {
        assert!(non_max_suppression(vec![], 0.5).is_empty());
    }

    #[test]
    fn nms_overlapping_keeps_most_confident() {
        let low = Detection::new(0, 0, 100, 100, 0.6, 0);
        let high = Detection::new(5, 5, 100, 100, 0.9, 0);
        let kept = non_max_suppression(vec![low, high], 0.5);
        assert_eq!(kept, vec![high]);
    }

    #[test]
    fn nms_keeps_overlapping_boxes_of_different_classes() {
        let pothole = Detection::new(0, 0, 100, 100, 0.9, 0);
        let crack = Detection::new(0, 0, 100, 100, 0.8, 1);
        let kept = non_max_suppression(vec![pothole, crack], 0.5);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn nms_keeps_boxes_below_iou_threshold() {
        // IoU of these two is 25/175 ~= 0.14.
        let a = Detection::new(10, 10, 20, 20, 0.9, 0);
        let b = Detection::new(15, 15, 25, 25, 0.8, 0);
        let kept = non_max_suppression(vec![b, a], 0.5);
        assert_eq!(kept, vec![a, b]);
    }
}
