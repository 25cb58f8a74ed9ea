//! Capability fetchers
//!
//! Each capability is a named external data provider declaring which
//! template fields it populates. Fetchers never error: anything that goes
//! wrong on the wire or in the feed collapses to an empty field map, and
//! the dispatcher's fail-closed template check takes it from there.

pub mod fetchers;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use potsbox_core::CapabilityFetcher;

pub use fetchers::complaint::ComplaintFetcher;
pub use fetchers::earthquake::EarthquakeFetcher;
pub use fetchers::nasa::NasaEventsFetcher;
pub use fetchers::onthisday::OnThisDayFetcher;
pub use fetchers::space::SpaceNewsFetcher;
pub use fetchers::weather::WeatherFetcher;

/// Internal fetch failure; never escapes a fetcher.
#[derive(Error, Debug)]
pub(crate) enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unusable feed: {0}")]
    Shape(&'static str),
}

/// Name-keyed set of fetchers the dispatcher resolves `requires` against.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    fetchers: HashMap<&'static str, Arc<dyn CapabilityFetcher>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, fetcher: Arc<dyn CapabilityFetcher>) {
        self.fetchers.insert(fetcher.name(), fetcher);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CapabilityFetcher>> {
        self.fetchers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    /// Fetcher name to provided fields, as the catalog validator wants it.
    pub fn infos(&self) -> HashMap<String, Vec<String>> {
        self.fetchers
            .values()
            .map(|f| {
                (
                    f.name().to_string(),
                    f.provides().iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect()
    }
}

/// All built-in capabilities, sharing one HTTP client.
pub fn builtin(client: reqwest::Client) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(WeatherFetcher::new(client.clone())));
    registry.register(Arc::new(EarthquakeFetcher::new(client.clone())));
    registry.register(Arc::new(OnThisDayFetcher::new(client.clone())));
    registry.register(Arc::new(SpaceNewsFetcher::new(client.clone())));
    registry.register(Arc::new(NasaEventsFetcher::new(client.clone())));
    registry.register(Arc::new(ComplaintFetcher::new(client)));
    registry
}
