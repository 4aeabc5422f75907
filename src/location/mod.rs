//! Location fixes for score events.
//!
//! Providers are interchangeable:
//! - `GeolocationApi`: live lookup against a geolocation HTTP endpoint
//! - `MockPath`: linear path between two fixed endpoints over a fixed duration
//! - `FixedLocation`: constant coordinates
//! - `NoLocation`: always unavailable
//!
//! A failed lookup never aborts a frame. [`acquire_fix`] logs it and returns a fix
//! with null coordinates and a valid timestamp.

mod geolocation;
mod mock;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub use geolocation::{GeolocationApi, DEFAULT_GEOLOCATION_URL};
pub use mock::{FixedLocation, MockPath, NoLocation};

use crate::config::{LocationProviderKind, LocationSettings};
use crate::error::PipelineError;

/// Local wall clock, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(anyhow!("latitude {} out of range", self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(anyhow!("longitude {} out of range", self.longitude));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocationFix {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: String,
}

impl LocationFix {
    pub fn at(coords: Coordinates, timestamp: String) -> Self {
        Self {
            latitude: Some(coords.latitude),
            longitude: Some(coords.longitude),
            timestamp,
        }
    }

    pub fn unavailable(timestamp: String) -> Self {
        Self {
            latitude: None,
            longitude: None,
            timestamp,
        }
    }
}

pub trait LocationProvider: Send {
    fn name(&self) -> &'static str;

    /// Current position. Errors are reported as `LocationUnavailable` by the caller.
    fn current(&mut self) -> Result<Coordinates>;
}

pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Query the provider and stamp the fix with the local time of the query.
pub fn acquire_fix(provider: &mut dyn LocationProvider) -> LocationFix {
    let coords = provider
        .current()
        .and_then(|c| c.validate().map(|_| c));
    let timestamp = format_timestamp(Local::now());
    match coords {
        Ok(coords) => LocationFix::at(coords, timestamp),
        Err(err) => {
            let err = PipelineError::location(format!("{}: {:#}", provider.name(), err));
            log::warn!("{}; continuing without coordinates", err);
            LocationFix::unavailable(timestamp)
        }
    }
}

pub fn provider_from_settings(settings: &LocationSettings) -> Result<Box<dyn LocationProvider>> {
    let provider: Box<dyn LocationProvider> = match settings.provider {
        LocationProviderKind::None => Box::new(NoLocation),
        LocationProviderKind::Fixed => {
            let coords = settings
                .fixed
                .ok_or_else(|| anyhow!("fixed location provider requires location.fixed"))?;
            coords.validate()?;
            Box::new(FixedLocation::new(coords))
        }
        LocationProviderKind::Mock => Box::new(MockPath::new(
            settings.mock.start,
            settings.mock.end,
            settings.mock.duration,
        )?),
        LocationProviderKind::Geolocation => {
            let key = settings
                .api_key
                .as_deref()
                .ok_or_else(|| anyhow!("geolocation provider requires an api key"))?;
            Box::new(GeolocationApi::new(&settings.api_url, key, settings.timeout)?)
        }
    };
    Ok(provider)
}
