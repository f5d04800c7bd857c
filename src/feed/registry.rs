use super::synthetic::{MarketScenario, SyntheticHistorical, SyntheticLiveFeed};
use super::{FeedKind, HistoricalSource, LiveFeed};
use crate::error::LoopError;
use crate::Result;
use std::collections::HashMap;

type HistoricalFactory = Box<dyn Fn() -> Box<dyn HistoricalSource> + Send + Sync>;
type LiveFactory = Box<dyn Fn() -> Box<dyn LiveFeed> + Send + Sync>;

/// Explicit identifier → data source table
///
/// Historical sources are keyed by free-form identifiers. Live feeds are
/// keyed by [`FeedKind`], so only the supported feed identifiers resolve.
pub struct SourceRegistry {
    historical: HashMap<String, HistoricalFactory>,
    live: HashMap<FeedKind, LiveFactory>,
    fake_feed_seed: u64,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            historical: HashMap::new(),
            live: HashMap::new(),
            fake_feed_seed: 42,
        }
    }

    /// Registry with the built-in synthetic sources
    ///
    /// Registers `synthetic` (sideways) plus `synthetic_<scenario>` for
    /// every scenario, and a synthetic feed behind every live feed kind.
    pub fn with_synthetic(seed: u64) -> Self {
        let mut registry = Self::new().with_fake_feed_seed(seed);

        registry.register_historical("synthetic", move || {
            Box::new(SyntheticHistorical::new(seed, MarketScenario::Sideways))
        });
        for (name, scenario) in [
            ("synthetic_uptrend", MarketScenario::Uptrend),
            ("synthetic_downtrend", MarketScenario::Downtrend),
            ("synthetic_sideways", MarketScenario::Sideways),
            ("synthetic_volatile", MarketScenario::Volatile),
            ("synthetic_drawdown", MarketScenario::Drawdown),
        ] {
            registry.register_historical(name, move || {
                Box::new(SyntheticHistorical::new(seed, scenario))
            });
        }

        for kind in FeedKind::ALL {
            registry.register_live(kind, move || Box::new(SyntheticLiveFeed::new(seed)));
        }

        registry
    }

    pub fn with_fake_feed_seed(mut self, seed: u64) -> Self {
        self.fake_feed_seed = seed;
        self
    }

    pub fn register_historical<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn HistoricalSource> + Send + Sync + 'static,
    {
        self.historical.insert(id.into(), Box::new(factory));
    }

    pub fn register_live<F>(&mut self, kind: FeedKind, factory: F)
    where
        F: Fn() -> Box<dyn LiveFeed> + Send + Sync + 'static,
    {
        self.live.insert(kind, Box::new(factory));
    }

    /// Build the historical source registered under `id`
    pub fn historical(&self, id: &str) -> Result<Box<dyn HistoricalSource>> {
        self.historical
            .get(id)
            .map(|factory| factory())
            .ok_or_else(|| LoopError::UnknownDataSource(id.to_string()))
    }

    /// Build the live feed for `kind`
    ///
    /// With `fake_feed` set, a deterministic synthetic feed is returned
    /// instead of whatever is registered.
    pub fn live(&self, kind: FeedKind, fake_feed: bool) -> Result<Box<dyn LiveFeed>> {
        if fake_feed {
            tracing::debug!(feed = %kind, "Using synthetic fake feed");
            return Ok(Box::new(SyntheticLiveFeed::new(self.fake_feed_seed)));
        }

        self.live
            .get(&kind)
            .map(|factory| factory())
            .ok_or_else(|| LoopError::UnknownDataSource(kind.to_string()))
    }

    /// Resolve a live feed identifier string, then build it
    pub fn live_by_id(&self, id: &str, fake_feed: bool) -> Result<(FeedKind, Box<dyn LiveFeed>)> {
        let kind: FeedKind = id.parse()?;
        Ok((kind, self.live(kind, fake_feed)?))
    }

    pub fn historical_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.historical.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::HistoricalRequest;
    use crate::models::Interval;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_unknown_historical_id() {
        let registry = SourceRegistry::with_synthetic(1);
        let result = registry.historical("nope");
        assert!(matches!(result, Err(LoopError::UnknownDataSource(ref id)) if id == "nope"));
    }

    #[test]
    fn test_synthetic_historical_registered() {
        let registry = SourceRegistry::with_synthetic(1);
        let mut source = registry.historical("synthetic_uptrend").unwrap();

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let request = HistoricalRequest {
            start,
            end: start + Duration::days(2),
            interval: Interval::D1,
        };
        assert_eq!(source.fetch("AAA", &request).unwrap().len(), 3);
        assert!(registry.historical_ids().contains(&"synthetic"));
    }

    #[test]
    fn test_live_by_id_rejects_unknown_feed() {
        let registry = SourceRegistry::with_synthetic(1);
        let result = registry.live_by_id("unknown_feed", true);
        assert!(matches!(result, Err(LoopError::InvalidDataFeedType(_))));
    }

    #[test]
    fn test_unregistered_live_kind() {
        let registry = SourceRegistry::new();
        let result = registry.live(FeedKind::UsStocks, false);
        assert!(matches!(result, Err(LoopError::UnknownDataSource(_))));
    }

    #[test]
    fn test_fake_feed_bypasses_registration() {
        let registry = SourceRegistry::new();
        let mut feed = registry.live(FeedKind::UsStocks, true).unwrap();
        assert_eq!(feed.poll("AAA").unwrap().symbol, "AAA");
    }
}
