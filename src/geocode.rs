/*!
 * Zip code to coordinate resolution
 *
 * Resolution never fails loudly: any network, status, or payload problem is
 * logged and reported as `None`, and the distance stage then becomes a no-op
 * for that filter pass. Lookups are not cached; a repeated zip code is
 * resolved again.
 */

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::LocatorConfig;
use crate::data_types::ZipCode;
use crate::fetch::build_client;
use crate::geo::Coordinates;
use crate::{LocatorError, Result};

/// Resolves a zip code to the coordinates of its centroid
#[async_trait]
pub trait GeocodeResolver: Send + Sync {
    /// `None` on any failure; callers skip distance filtering in that case
    async fn resolve(&self, zip: &ZipCode) -> Option<Coordinates>;
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Place {
    latitude: String,
    longitude: String,
}

/// Geocoder for zippopotam.us-style services: `GET <base>/<zip>`
pub struct HttpGeocoder {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGeocoder {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_config(base_url, &LocatorConfig::default())
    }

    pub fn with_config(base_url: impl Into<String>, config: &LocatorConfig) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(config)?,
        })
    }

    /// Single lookup with the failure reason preserved
    pub async fn lookup(&self, zip: &ZipCode) -> Result<Coordinates> {
        let url = format!("{}/{}", self.base_url, zip);
        let geocode_err = |message: String| LocatorError::Geocode {
            zip: zip.to_string(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| geocode_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(geocode_err(format!("HTTP status {}", response.status().as_u16())));
        }

        let body = response.text().await.map_err(|e| geocode_err(e.to_string()))?;
        parse_places(&body).map_err(geocode_err)
    }
}

#[async_trait]
impl GeocodeResolver for HttpGeocoder {
    async fn resolve(&self, zip: &ZipCode) -> Option<Coordinates> {
        match self.lookup(zip).await {
            Ok(coordinates) => {
                tracing::debug!(%zip, ?coordinates, "resolved zip code");
                Some(coordinates)
            }
            Err(e) => {
                tracing::warn!(%zip, error = %e, "geocoding failed, distance filter skipped");
                None
            }
        }
    }
}

/// Extract `places[0]` coordinates from a lookup response body
fn parse_places(body: &str) -> std::result::Result<Coordinates, String> {
    let response: PlacesResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response: {}", e))?;
    let place = response
        .places
        .first()
        .ok_or_else(|| "response has no places".to_string())?;

    let latitude = place.latitude.trim().parse::<f64>();
    let longitude = place.longitude.trim().parse::<f64>();
    match (latitude, longitude) {
        (Ok(lat), Ok(lng)) if lat.is_finite() && lng.is_finite() => Ok(Coordinates::new(lat, lng)),
        _ => Err(format!(
            "non-numeric coordinates '{}', '{}'",
            place.latitude, place.longitude
        )),
    }
}

/// In-memory zip table, for offline runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    table: HashMap<String, Coordinates>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, zip: &str, coordinates: Coordinates) -> Self {
        self.table.insert(zip.to_string(), coordinates);
        self
    }
}

#[async_trait]
impl GeocodeResolver for StaticGeocoder {
    async fn resolve(&self, zip: &ZipCode) -> Option<Coordinates> {
        let found = self.table.get(zip.as_str()).copied();
        if found.is_none() {
            tracing::warn!(%zip, "zip code not in static table");
        }
        found
    }
}
