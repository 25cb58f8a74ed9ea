//! Current conditions via open-meteo: geocode the caller's city, then read
//! the current weather block.

use async_trait::async_trait;
use serde_json::Value;

use potsbox_core::{CallContext, CapabilityFetcher, FieldMap};

use crate::FetchError;

const GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

pub struct WeatherFetcher {
    client: reqwest::Client,
}

impl WeatherFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn try_fetch(&self, ctx: &CallContext) -> Result<FieldMap, FetchError> {
        let geo: Value = self
            .client
            .get(GEOCODE_URL)
            .query(&[
                ("name", ctx.city.as_str()),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let hit = parse_geocode(&geo).ok_or(FetchError::Shape("no geocoding match"))?;

        let wx: Value = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", hit.latitude.to_string().as_str()),
                ("longitude", hit.longitude.to_string().as_str()),
                ("current", "temperature_2m,wind_speed_10m,precipitation"),
                ("temperature_unit", "fahrenheit"),
                ("wind_speed_unit", "mph"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_current(&wx, &hit.place).ok_or(FetchError::Shape("no current conditions"))
    }
}

#[async_trait]
impl CapabilityFetcher for WeatherFetcher {
    fn name(&self) -> &'static str {
        "weather"
    }

    fn provides(&self) -> &'static [&'static str] {
        &["place", "temp_f", "wind_mph", "precipitation_in"]
    }

    async fn fetch(&self, ctx: &CallContext) -> FieldMap {
        match self.try_fetch(ctx).await {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!(capability = self.name(), error = %err, "fetch failed");
                FieldMap::new()
            }
        }
    }
}

pub(crate) struct GeocodeHit {
    pub latitude: f64,
    pub longitude: f64,
    pub place: String,
}

pub(crate) fn parse_geocode(v: &Value) -> Option<GeocodeHit> {
    let hit = v.get("results")?.get(0)?;
    let latitude = hit.get("latitude")?.as_f64()?;
    let longitude = hit.get("longitude")?.as_f64()?;

    let place = ["name", "admin1", "country"]
        .iter()
        .filter_map(|k| hit.get(k).and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(", ");

    Some(GeocodeHit {
        latitude,
        longitude,
        place,
    })
}

pub(crate) fn parse_current(v: &Value, place: &str) -> Option<FieldMap> {
    let cur = v.get("current")?;
    let temp = cur.get("temperature_2m")?.as_f64()?;
    let wind = cur.get("wind_speed_10m")?.as_f64()?;
    let precipitation = cur.get("precipitation")?.as_f64()?;

    let mut map = FieldMap::new();
    map.insert("place".to_string(), place.to_string());
    map.insert("temp_f".to_string(), format!("{}", temp.round() as i64));
    map.insert("wind_mph".to_string(), format!("{}", wind.round() as i64));
    map.insert("precipitation_in".to_string(), precipitation.to_string());
    Some(map)
}
