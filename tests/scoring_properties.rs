use roadwatch::error::PipelineError;
use roadwatch::{score_frame, AreaMode, Detection, ScoringPolicy};

fn det(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> Detection {
    Detection::new(x1, y1, x2, y2, confidence, 0)
}

fn union_policy() -> ScoringPolicy {
    ScoringPolicy {
        area_mode: AreaMode::Union,
        ..ScoringPolicy::default()
    }
}

#[test]
fn no_detections_is_a_clean_road() {
    let score = score_frame(640, 480, &[], &ScoringPolicy::default()).unwrap();
    assert_eq!(score.score, 1.0);
    assert_eq!(score.boxes_area, 0);
}

#[test]
fn overlapping_pair_double_counts_in_summed_mode() {
    let dets = [det(10, 10, 20, 20, 0.9), det(15, 15, 25, 25, 0.8)];

    let summed = score_frame(100, 100, &dets, &ScoringPolicy::default()).unwrap();
    assert_eq!(summed.frame_area, 10_000);
    assert_eq!(summed.boxes_area, 200);
    assert!((summed.score - 0.98).abs() < 1e-12);

    let union = score_frame(100, 100, &dets, &union_policy()).unwrap();
    assert_eq!(union.boxes_area, 175);
    assert!((union.score - 0.9825).abs() < 1e-12);
}

#[test]
fn exact_tiling_scores_zero() {
    let dets = [
        det(0, 0, 50, 50, 0.9),
        det(50, 0, 100, 50, 0.9),
        det(0, 50, 50, 100, 0.9),
        det(50, 50, 100, 100, 0.9),
    ];
    for policy in [ScoringPolicy::default(), union_policy()] {
        let score = score_frame(100, 100, &dets, &policy).unwrap();
        assert!(score.score.abs() < 1e-9, "{:?}: {}", policy, score.score);
    }
}

#[test]
fn over_coverage_goes_negative_unless_clamped() {
    let dets = [det(0, 0, 100, 100, 0.9), det(0, 0, 100, 100, 0.8)];

    let legacy = score_frame(100, 100, &dets, &ScoringPolicy::default()).unwrap();
    assert!(legacy.score < 0.0);
    assert!((legacy.score + 1.0).abs() < 1e-12);

    let clamped = ScoringPolicy {
        clamp_negative: true,
        ..ScoringPolicy::default()
    };
    assert_eq!(score_frame(100, 100, &dets, &clamped).unwrap().score, 0.0);

    // Union mode cannot exceed the frame.
    assert_eq!(score_frame(100, 100, &dets, &union_policy()).unwrap().score, 0.0);
}

#[test]
fn score_ignores_detection_order() {
    let mut dets = vec![
        det(5, 5, 40, 30, 0.9),
        det(20, 10, 60, 50, 0.7),
        det(70, 70, 95, 99, 0.5),
        det(30, 25, 45, 80, 0.3),
    ];
    for policy in [ScoringPolicy::default(), union_policy()] {
        let forward = score_frame(100, 100, &dets, &policy).unwrap().score;
        dets.reverse();
        let reversed = score_frame(100, 100, &dets, &policy).unwrap().score;
        dets.rotate_left(1);
        let rotated = score_frame(100, 100, &dets, &policy).unwrap().score;
        assert_eq!(forward, reversed);
        assert_eq!(forward, rotated);
    }
}

#[test]
fn zero_area_frame_is_invalid() {
    let err = score_frame(0, 480, &[det(0, 0, 1, 1, 0.9)], &ScoringPolicy::default()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidFrame(_)));
    assert!(!err.is_fatal());
}

#[test]
fn degenerate_boxes_contribute_nothing() {
    let dets = [det(30, 30, 30, 60, 0.9), det(50, 50, 40, 40, 0.9)];
    let score = score_frame(100, 100, &dets, &ScoringPolicy::default()).unwrap();
    assert_eq!(score.boxes_area, 0);
    assert_eq!(score.score, 1.0);
}
