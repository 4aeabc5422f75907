use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use url::Url;

use super::{Coordinates, LocationProvider};

pub const DEFAULT_GEOLOCATION_URL: &str = "https://www.googleapis.com/geolocation/v1/geolocate";

/// Geolocation over HTTP: POST an empty request body, read `location.lat/lng`.
pub struct GeolocationApi {
    endpoint: Url,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct GeolocateResponse {
    location: GeolocateLocation,
    #[serde(default)]
    accuracy: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GeolocateLocation {
    lat: f64,
    lng: f64,
}

impl GeolocationApi {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("geolocation api key is empty"));
        }
        let endpoint = Url::parse_with_params(base_url, &[("key", api_key)])
            .with_context(|| format!("invalid geolocation url '{}'", base_url))?;
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { endpoint, agent })
    }
}

impl LocationProvider for GeolocationApi {
    fn name(&self) -> &'static str {
        "geolocation"
    }

    fn current(&mut self) -> Result<Coordinates> {
        let response = self
            .agent
            .post(self.endpoint.as_str())
            .send_json(serde_json::json!({}))
            .map_err(|e| anyhow!("geolocation request failed: {}", redact_key(&e.to_string())))?;
        let body: GeolocateResponse = response
            .into_json()
            .context("geolocation response was not valid JSON")?;
        if let Some(accuracy) = body.accuracy {
            log::debug!("geolocation accuracy {:.0} m", accuracy);
        }
        Ok(Coordinates::new(body.location.lat, body.location.lng))
    }
}

/// ureq errors embed the request URL; keep the api key out of logs.
fn redact_key(message: &str) -> String {
    match message.find("key=") {
        Some(start) => {
            let value_start = start + "key=".len();
            let end = message[value_start..]
                .find(|c: char| c == '&' || c == ' ' || c == ':')
                .map(|i| value_start + i)
                .unwrap_or(message.len());
            format!("{}<redacted>{}", &message[..value_start], &message[end..])
        }
        None => message.to_string(),
    }
}
