//! Strongest earthquake of the past day, from the USGS all-day feed.

use async_trait::async_trait;
use serde_json::Value;

use potsbox_core::{CallContext, CapabilityFetcher, FieldMap};

use crate::FetchError;

const FEED_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_day.geojson";

pub struct EarthquakeFetcher {
    client: reqwest::Client,
}

impl EarthquakeFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn try_fetch(&self) -> Result<FieldMap, FetchError> {
        let feed: Value = self
            .client
            .get(FEED_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_quake_feed(&feed).ok_or(FetchError::Shape("no located earthquakes"))
    }
}

#[async_trait]
impl CapabilityFetcher for EarthquakeFetcher {
    fn name(&self) -> &'static str {
        "earthquake"
    }

    fn provides(&self) -> &'static [&'static str] {
        &["quake_report"]
    }

    async fn fetch(&self, _ctx: &CallContext) -> FieldMap {
        match self.try_fetch().await {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!(capability = self.name(), error = %err, "fetch failed");
                FieldMap::new()
            }
        }
    }
}

pub(crate) fn parse_quake_feed(v: &Value) -> Option<FieldMap> {
    let features = v.get("features")?.as_array()?;

    let strongest = features
        .iter()
        .filter_map(|f| {
            let props = f.get("properties")?;
            let mag = props.get("mag")?.as_f64()?;
            let place = props.get("place")?.as_str()?;
            Some((mag, place))
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))?;

    let mut map = FieldMap::new();
    map.insert(
        "quake_report".to_string(),
        format!(
            "Magnitude {} earthquake near {}.",
            strongest.0, strongest.1
        ),
    );
    Some(map)
}
