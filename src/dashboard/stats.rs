use serde::Serialize;

/// Summary table over 0..100 scores.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation; undefined below two points.
    pub std_dev: Option<f64>,
    pub median: f64,
}

/// `None` for an empty input.
pub fn summarize(scores: &[f64]) -> Option<Summary> {
    if scores.is_empty() {
        return None;
    }
    let count = scores.len();
    let mean = scores.iter().sum::<f64>() / count as f64;
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let std_dev = if count < 2 {
        None
    } else {
        let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        Some(var.sqrt())
    };

    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    Some(Summary {
        count,
        min,
        max,
        mean,
        std_dev,
        median,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ConditionBand {
    #[serde(rename = "Very Bad")]
    VeryBad,
    Bad,
    Moderate,
    Good,
    #[serde(rename = "Very Good")]
    VeryGood,
}

impl ConditionBand {
    pub const ALL: [ConditionBand; 5] = [
        ConditionBand::VeryBad,
        ConditionBand::Bad,
        ConditionBand::Moderate,
        ConditionBand::Good,
        ConditionBand::VeryGood,
    ];

    /// Band of a 0..100 score. Scores outside that range have no band.
    pub fn of(score: f64) -> Option<Self> {
        match score {
            s if (0.0..20.0).contains(&s) => Some(Self::VeryBad),
            s if (20.0..40.0).contains(&s) => Some(Self::Bad),
            s if (40.0..70.0).contains(&s) => Some(Self::Moderate),
            s if (70.0..80.0).contains(&s) => Some(Self::Good),
            s if (80.0..=100.0).contains(&s) => Some(Self::VeryGood),
            _ => None,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::VeryBad => "#dc3545",
            Self::Bad => "#fd7e14",
            Self::Moderate => "#ffc107",
            Self::Good => "#87cf3a",
            Self::VeryGood => "#28a745",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BandCount {
    pub band: ConditionBand,
    pub color: &'static str,
    pub count: usize,
}

/// Per-band counts in band order. Empty bands are left out.
pub fn distribution(scores: &[f64]) -> Vec<BandCount> {
    ConditionBand::ALL
        .iter()
        .filter_map(|&band| {
            let count = scores
                .iter()
                .filter(|&&s| ConditionBand::of(s) == Some(band))
                .count();
            (count > 0).then_some(BandCount {
                band,
                color: band.color(),
                count,
            })
        })
        .collect()
}

/// Map marker colour for a 0..100 score.
pub fn marker_color(score: f64) -> &'static str {
    if score >= 80.0 {
        "#28a745"
    } else if score >= 60.0 {
        "#87cf3a"
    } else if score >= 40.0 {
        "#ffc107"
    } else if score >= 20.0 {
        "#fd7e14"
    } else {
        "#dc3545"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_no_summary() {
        assert_eq!(summarize(&[]), None);
    }

    #[test]
    fn single_point_has_no_std_dev() {
        let s = summarize(&[42.0]).unwrap();
        assert_eq!(s.count, 1);
        assert_eq!(s.median, 42.0);
        assert_eq!(s.std_dev, None);
    }

    #[test]
    fn summary_matches_hand_computation() {
        let s = summarize(&[90.0, 10.0, 50.0, 30.0]).unwrap();
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 90.0);
        assert_eq!(s.mean, 45.0);
        assert_eq!(s.median, 40.0);
        // deviations 45, -35, 5, -15 → 2275 / 3
        let expected = (2275.0f64 / 3.0).sqrt();
        assert!((s.std_dev.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn band_edges_are_half_open() {
        assert_eq!(ConditionBand::of(0.0), Some(ConditionBand::VeryBad));
        assert_eq!(ConditionBand::of(19.99), Some(ConditionBand::VeryBad));
        assert_eq!(ConditionBand::of(20.0), Some(ConditionBand::Bad));
        assert_eq!(ConditionBand::of(69.9), Some(ConditionBand::Moderate));
        assert_eq!(ConditionBand::of(70.0), Some(ConditionBand::Good));
        assert_eq!(ConditionBand::of(80.0), Some(ConditionBand::VeryGood));
        assert_eq!(ConditionBand::of(100.0), Some(ConditionBand::VeryGood));
        assert_eq!(ConditionBand::of(-3.0), None);
    }

    #[test]
    fn distribution_skips_empty_bands() {
        let dist = distribution(&[5.0, 85.0, 95.0]);
        assert_eq!(dist.len(), 2);
        assert_eq!(dist[0].band, ConditionBand::VeryBad);
        assert_eq!(dist[0].count, 1);
        assert_eq!(dist[1].band, ConditionBand::VeryGood);
        assert_eq!(dist[1].count, 2);
        let json = serde_json::to_value(&dist[1]).unwrap();
        assert_eq!(json["band"], "Very Good");
    }

    #[test]
    fn marker_colors_follow_thresholds() {
        assert_eq!(marker_color(100.0), "#28a745");
        assert_eq!(marker_color(80.0), "#28a745");
        assert_eq!(marker_color(65.0), "#87cf3a");
        assert_eq!(marker_color(40.0), "#ffc107");
        assert_eq!(marker_color(20.0), "#fd7e14");
        assert_eq!(marker_color(19.9), "#dc3545");
    }

    #[test]
    fn bands_serialize_as_display_names() {
        let names: Vec<String> = ConditionBand::ALL
            .iter()
            .map(|band| serde_json::to_string(band).unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "\"Very Bad\"",
                "\"Bad\"",
                "\"Moderate\"",
                "\"Good\"",
                "\"Very Good\""
            ]
        );
    }
}
