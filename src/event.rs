//! Score events: the unit delivered to a dashboard sink.

use serde::{Deserialize, Serialize};

use crate::location::LocationFix;
use crate::score::FrameScore;

pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.7;

/// Scale the score is expressed on when it leaves the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreScale {
    /// 0..1
    #[default]
    Unit,
    /// 0..100
    Percent,
}

impl ScoreScale {
    pub fn factor(self) -> f64 {
        match self {
            Self::Unit => 1.0,
            Self::Percent => 100.0,
        }
    }

    pub fn to_scale(self, unit_score: f64) -> f64 {
        unit_score * self.factor()
    }

    pub fn to_unit(self, scaled: f64) -> f64 {
        scaled / self.factor()
    }
}

impl std::str::FromStr for ScoreScale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unit" | "1" => Ok(Self::Unit),
            "percent" | "100" => Ok(Self::Percent),
            other => Err(anyhow::anyhow!(
                "unknown score scale '{}'; expected unit or percent",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventPolicy {
    pub scale: ScoreScale,
    /// Warning threshold on the 0..1 scale, whatever the output scale is.
    pub score_threshold: f64,
}

impl Default for EventPolicy {
    fn default() -> Self {
        Self {
            scale: ScoreScale::Unit,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: String,
    pub score: f64,
    /// Presentation hint for the consumer. Never affects delivery.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub below_threshold: bool,
}

impl ScoreEvent {
    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Build the event for one scored frame.
pub fn assemble_event(score: &FrameScore, fix: &LocationFix, policy: &EventPolicy) -> ScoreEvent {
    ScoreEvent {
        latitude: fix.latitude,
        longitude: fix.longitude,
        timestamp: fix.timestamp.clone(),
        score: policy.scale.to_scale(score.score),
        below_threshold: score.score < policy.score_threshold,
    }
}
