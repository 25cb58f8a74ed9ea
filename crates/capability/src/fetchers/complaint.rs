//! Most recent complaint filed with NYC 311, for the complaints desk.

use async_trait::async_trait;
use serde_json::Value;

use potsbox_core::{CallContext, CapabilityFetcher, FieldMap};

use crate::FetchError;

const FEED_URL: &str = "https://data.cityofnewyork.us/resource/erm2-nwe9.json";

pub struct ComplaintFetcher {
    client: reqwest::Client,
}

impl ComplaintFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn try_fetch(&self) -> Result<FieldMap, FetchError> {
        let rows: Value = self
            .client
            .get(FEED_URL)
            .query(&[("$limit", "1"), ("$order", "created_date DESC")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_complaints(&rows).ok_or(FetchError::Shape("no complaints on file"))
    }
}

#[async_trait]
impl CapabilityFetcher for ComplaintFetcher {
    fn name(&self) -> &'static str {
        "complaint"
    }

    fn provides(&self) -> &'static [&'static str] {
        &["complaint"]
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

pub(crate) fn parse_complaints(v: &Value) -> Option<FieldMap> {
    let row = v.get(0)?;
    let complaint_type = row.get("complaint_type")?.as_str()?;
    let borough = row.get("borough").and_then(Value::as_str);

    let text = match borough {
        Some(b) if !b.is_empty() => format!("{} in {}", complaint_type, b),
        _ => complaint_type.to_string(),
    };

    let mut map = FieldMap::new();
    map.insert("complaint".to_string(), text);
    Some(map)
}
