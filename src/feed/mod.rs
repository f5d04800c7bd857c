// Market data sources consumed by the execution loop
pub mod registry;
pub mod synthetic;

pub use registry::SourceRegistry;
pub use synthetic::{MarketScenario, SyntheticDataGenerator, SyntheticHistorical, SyntheticLiveFeed};

use crate::error::LoopError;
use crate::models::{Bar, Interval};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Window requested from a historical source
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: Interval,
}

/// Finite, time-ordered bar series for one instrument
pub trait HistoricalSource: Send {
    /// Fetch every bar for `symbol` inside `[start, end]`
    fn fetch(&mut self, symbol: &str, request: &HistoricalRequest) -> anyhow::Result<Vec<Bar>>;
}

/// Unbounded stream of the latest bar for an instrument
pub trait LiveFeed: Send {
    /// Poll the most recent bar for `symbol`
    fn poll(&mut self, symbol: &str) -> anyhow::Result<Bar>;
}

/// The live feeds the loop knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// Crypto level-1 (top of book) feed
    CryptoLevel1,
    /// Crypto level-2 (depth) feed
    CryptoLevel2,
    /// US equities feed
    UsStocks,
}

impl FeedKind {
    pub const ALL: [FeedKind; 3] = [
        FeedKind::CryptoLevel1,
        FeedKind::CryptoLevel2,
        FeedKind::UsStocks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::CryptoLevel1 => "CRYPTO_live_feed",
            FeedKind::CryptoLevel2 => "CRYPTO_live_feed_level2",
            FeedKind::UsStocks => "US_STOCKS_live_feed",
        }
    }

    /// Crypto feeds are paced by the exchange rate limit
    pub fn is_crypto(&self) -> bool {
        matches!(self, FeedKind::CryptoLevel1 | FeedKind::CryptoLevel2)
    }
}

impl FromStr for FeedKind {
    type Err = LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LoopError::InvalidDataFeedType(s.to_string()))
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
