//! Latest natural event tracked by NASA EONET.

use async_trait::async_trait;
use serde_json::Value;

use potsbox_core::{CallContext, CapabilityFetcher, FieldMap};

use crate::FetchError;

const FEED_URL: &str = "https://eonet.gsfc.nasa.gov/api/v3/events";

pub struct NasaEventsFetcher {
    client: reqwest::Client,
}

impl NasaEventsFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn try_fetch(&self) -> Result<FieldMap, FetchError> {
        let feed: Value = self
            .client
            .get(FEED_URL)
            .query(&[("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_eonet(&feed).ok_or(FetchError::Shape("no events"))
    }
}

#[async_trait]
impl CapabilityFetcher for NasaEventsFetcher {
    fn name(&self) -> &'static str {
        "nasa"
    }

    fn provides(&self) -> &'static [&'static str] {
        &["nasa_event"]
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

pub(crate) fn parse_eonet(v: &Value) -> Option<FieldMap> {
    let event = v.get("events")?.get(0)?;
    let title = event.get("title")?.as_str()?;
    let category = event
        .get("categories")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("space event");

    let mut map = FieldMap::new();
    map.insert(
        "nasa_event".to_string(),
        format!("{}. Category: {}.", title, category),
    );
    Some(map)
}
