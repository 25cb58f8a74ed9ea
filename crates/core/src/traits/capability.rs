//! Capability fetcher trait

use async_trait::async_trait;

use crate::call::CallContext;
use crate::tokens::FieldMap;

/// A named external data provider.
///
/// Fetchers are stateless and infallible by contract: transport failures,
/// empty feeds, and shape surprises all collapse to an empty map, so the
/// dispatcher's fail-closed check on template expansion is the single place
/// missing data is handled.
#[async_trait]
pub trait CapabilityFetcher: Send + Sync + 'static {
    /// Registry key, also used in service `requires` lists
    fn name(&self) -> &'static str;

    /// Field keys this fetcher populates on success
    fn provides(&self) -> &'static [&'static str];

    /// Fetch fields for the call. Never errors; failure is an empty map.
    async fn fetch(&self, ctx: &CallContext) -> FieldMap;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct StaticFetcher;

    #[async_trait]
    impl CapabilityFetcher for StaticFetcher {
        fn name(&self) -> &'static str {
            "static"
        }

        fn provides(&self) -> &'static [&'static str] {
            &["fact"]
        }

        async fn fetch(&self, _ctx: &CallContext) -> FieldMap {
            let mut map = FieldMap::new();
            map.insert("fact".to_string(), "42".to_string());
            map
        }
    }

    #[tokio::test]
    async fn test_fetcher_contract() {
        let fetcher = StaticFetcher;
        let ctx = CallContext::new(
            "c1",
            "0",
            "New York City",
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        );
        let map = fetcher.fetch(&ctx).await;
        assert_eq!(map.get("fact").map(String::as_str), Some("42"));
        assert_eq!(fetcher.provides(), ["fact"]);
    }
}
