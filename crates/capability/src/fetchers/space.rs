//! Latest JPL news item, scraped from the RSS feed.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use potsbox_core::{CallContext, CapabilityFetcher, FieldMap};

use crate::FetchError;

const FEED_URL: &str = "https://www.jpl.nasa.gov/rss/news";

static ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<item>.*?<title><!\[CDATA\[(.*?)\]\]></title>.*?<description><!\[CDATA\[(.*?)\]\]>",
    )
    .unwrap()
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

pub struct SpaceNewsFetcher {
    client: reqwest::Client,
}

impl SpaceNewsFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn try_fetch(&self) -> Result<FieldMap, FetchError> {
        let rss = self
            .client
            .get(FEED_URL)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_rss(&rss).ok_or(FetchError::Shape("no news item"))
    }
}

#[async_trait]
impl CapabilityFetcher for SpaceNewsFetcher {
    fn name(&self) -> &'static str {
        "space"
    }

    fn provides(&self) -> &'static [&'static str] {
        &["space_event"]
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

pub(crate) fn parse_rss(rss: &str) -> Option<FieldMap> {
    let caps = ITEM_RE.captures(rss)?;
    let title = caps.get(1)?.as_str().trim();
    let description = TAG_RE.replace_all(caps.get(2)?.as_str(), "");
    let description = description.trim();

    if title.is_empty() {
        return None;
    }

    let mut map = FieldMap::new();
    map.insert(
        "space_event".to_string(),
        format!("{}. {}", title, description),
    );
    Some(map)
}
