use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use super::{Coordinates, LocationProvider};

/// Drives a straight line from `start` to `end` over `duration`, then stays at `end`.
pub struct MockPath {
    start: Coordinates,
    end: Coordinates,
    duration: Duration,
    started_at: Instant,
}

impl MockPath {
    pub fn new(start: Coordinates, end: Coordinates, duration: Duration) -> Result<Self> {
        start.validate()?;
        end.validate()?;
        if duration.is_zero() {
            return Err(anyhow!("mock path duration must be greater than zero"));
        }
        Ok(Self {
            start,
            end,
            duration,
            started_at: Instant::now(),
        })
    }

    /// Position after `elapsed` time on the path.
    pub fn position_at(&self, elapsed: Duration) -> Coordinates {
        let t = (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0);
        Coordinates {
            latitude: self.start.latitude + (self.end.latitude - self.start.latitude) * t,
            longitude: self.start.longitude + (self.end.longitude - self.start.longitude) * t,
        }
    }
}

impl LocationProvider for MockPath {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn current(&mut self) -> Result<Coordinates> {
        Ok(self.position_at(self.started_at.elapsed()))
    }
}

pub struct FixedLocation {
    coords: Coordinates,
}

impl FixedLocation {
    pub fn new(coords: Coordinates) -> Self {
        Self { coords }
    }
}

impl LocationProvider for FixedLocation {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn current(&mut self) -> Result<Coordinates> {
        Ok(self.coords)
    }
}

pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn name(&self) -> &'static str {
        "none"
    }

    fn current(&mut self) -> Result<Coordinates> {
        Err(anyhow!("no location provider configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> MockPath {
        MockPath::new(
            Coordinates::new(43.0, -79.0),
            Coordinates::new(44.0, -80.0),
            Duration::from_secs(100),
        )
        .unwrap()
    }

    #[test]
    fn starts_at_start() {
        assert_eq!(path().position_at(Duration::ZERO), Coordinates::new(43.0, -79.0));
    }

    #[test]
    fn interpolates_linearly() {
        let p = path().position_at(Duration::from_secs(25));
        assert!((p.latitude - 43.25).abs() < 1e-9);
        assert!((p.longitude + 79.25).abs() < 1e-9);
    }

    #[test]
    fn clamps_at_end_after_duration() {
        let p = path().position_at(Duration::from_secs(1_000));
        assert_eq!(p, Coordinates::new(44.0, -80.0));
    }

    #[test]
    fn zero_duration_rejected() {
        let start = Coordinates::new(0.0, 0.0);
        assert!(MockPath::new(start, start, Duration::ZERO).is_err());
    }

    #[test]
    fn no_location_always_fails() {
        assert!(NoLocation.current().is_err());
    }
}
