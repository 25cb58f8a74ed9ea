//! Two historical events for today's date, from the Wikipedia feed API.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use potsbox_core::{CallContext, CapabilityFetcher, FieldMap};

use crate::FetchError;

const FEED_URL: &str = "https://en.wikipedia.org/api/rest_v1/feed/onthisday/events";
const USER_AGENT: &str = "PotsBox/1.0 (on-this-day)";

static BRACKETED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());

pub struct OnThisDayFetcher {
    client: reqwest::Client,
}

impl OnThisDayFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn try_fetch(&self, ctx: &CallContext) -> Result<FieldMap, FetchError> {
        let url = format!(
            "{}/{:02}/{:02}",
            FEED_URL,
            ctx.now.month(),
            ctx.now.day()
        );

        let feed: Value = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_events(&feed, seed_from(&ctx.call_id))
            .ok_or(FetchError::Shape("no usable events"))
    }
}

#[async_trait]
impl CapabilityFetcher for OnThisDayFetcher {
    fn name(&self) -> &'static str {
        "onthisday"
    }

    fn provides(&self) -> &'static [&'static str] {
        &["history_items"]
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

/// Per-call seed so repeat callers hear different history.
fn seed_from(call_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    call_id.hash(&mut hasher);
    hasher.finish()
}

fn clean(text: &str) -> String {
    let stripped = BRACKETED_RE.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn parse_events(v: &Value, seed: u64) -> Option<FieldMap> {
    let events: Vec<(i64, &str)> = v
        .get("events")?
        .as_array()?
        .iter()
        .filter_map(|e| {
            let year = e.get("year")?.as_i64()?;
            let text = e.get("text")?.as_str()?;
            Some((year, text))
        })
        .collect();

    if events.is_empty() {
        return None;
    }

    // Prefer the last century or so; very old events read oddly on the line.
    let modern: Vec<&(i64, &str)> = events.iter().filter(|(y, _)| *y >= 1900).collect();
    let pool: Vec<&(i64, &str)> = if modern.is_empty() {
        events.iter().collect()
    } else {
        modern
    };

    let first = pool[(seed as usize) % pool.len()];
    let second = pool[(seed as usize / 7 + 1) % pool.len()];

    let mut lines = vec![format!("On this day in {}, {}", first.0, clean(first.1))];
    if second.0 != first.0 || second.1 != first.1 {
        lines.push(format!("On this day in {}, {}", second.0, clean(second.1)));
    }

    let mut map = FieldMap::new();
    map.insert("history_items".to_string(), lines.join(" "));
    Some(map)
}
