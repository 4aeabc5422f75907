use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One ingested score event, score on the 0..100 scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScorePoint {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub below_threshold: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
}

/// Bounded buffer of recent points. Oldest point is evicted when full.
#[derive(Debug)]
pub struct EventRing {
    capacity: usize,
    points: Mutex<VecDeque<ScorePoint>>,
}

impl EventRing {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(anyhow!("ring capacity must be greater than zero"));
        }
        Ok(Self {
            capacity,
            points: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a point, returning the one evicted to make room.
    pub fn push(&self, point: ScorePoint) -> Option<ScorePoint> {
        let mut points = self.lock();
        let evicted = if points.len() == self.capacity {
            points.pop_front()
        } else {
            None
        };
        points.push_back(point);
        evicted
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Owned copy in arrival order, oldest first.
    pub fn snapshot(&self) -> Vec<ScorePoint> {
        self.lock().iter().cloned().collect()
    }

    pub fn reader(self: &Arc<Self>) -> SnapshotReader {
        SnapshotReader {
            ring: Arc::clone(self),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ScorePoint>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.points
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Read-only view of a ring for rendering.
#[derive(Clone, Debug)]
pub struct SnapshotReader {
    ring: Arc<EventRing>,
}

impl SnapshotReader {
    pub fn snapshot(&self) -> Vec<ScorePoint> {
        self.ring.snapshot()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.ring.lock().iter().map(|p| p.score).collect()
    }
}
