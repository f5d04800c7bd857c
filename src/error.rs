use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the execution loop and its collaborators
#[derive(Debug, Error)]
pub enum LoopError {
    /// Rolling buffer constructed with a bound below one
    #[error("invalid buffer capacity {capacity}: must be at least 1")]
    InvalidCapacity { capacity: usize },

    /// Live feed identifier outside the supported set
    #[error("data feed '{0}' is not available for live trading")]
    InvalidDataFeedType(String),

    #[error("symbol bucket is empty")]
    EmptySymbolBucket,

    /// Identifier is valid but nothing is registered for it
    #[error("no data source registered for '{0}'")]
    UnknownDataSource(String),

    #[error("data source failed for {symbol}: {source}")]
    DataSource {
        symbol: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("strategy {strategy} failed on {symbol}: {source}")]
    Strategy {
        strategy: String,
        symbol: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("bars for {symbol} out of order: {current} does not follow {previous}")]
    OutOfOrderBar {
        symbol: String,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("market state lookup failed: {0}")]
    MarketState(#[source] anyhow::Error),

    #[error("rate limit lookup failed: {0}")]
    RateLimit(#[source] anyhow::Error),

    #[error("ledger rejected update: {0}")]
    Ledger(#[source] anyhow::Error),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// External stop request (Ctrl-C or a triggered interrupt handle)
    #[error("run interrupted")]
    Interrupted,
}

impl LoopError {
    /// Returns true if this error represents a cooperative stop request
    pub fn is_interrupt(&self) -> bool {
        matches!(self, LoopError::Interrupted)
    }

    /// Returns true for errors raised before the loop starts streaming
    pub fn is_pre_loop(&self) -> bool {
        matches!(
            self,
            LoopError::InvalidCapacity { .. }
                | LoopError::InvalidDataFeedType(_)
                | LoopError::EmptySymbolBucket
                | LoopError::UnknownDataSource(_)
                | LoopError::Config(_)
                | LoopError::InvalidSetting(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_classification() {
        assert!(LoopError::Interrupted.is_interrupt());
        assert!(!LoopError::EmptySymbolBucket.is_interrupt());
    }

    #[test]
    fn test_pre_loop_classification() {
        assert!(LoopError::EmptySymbolBucket.is_pre_loop());
        assert!(LoopError::InvalidDataFeedType("unknown_feed".to_string()).is_pre_loop());
        assert!(!LoopError::Interrupted.is_pre_loop());

        let err = LoopError::DataSource {
            symbol: "AAA".to_string(),
            source: anyhow::anyhow!("timeout"),
        };
        assert!(!err.is_pre_loop());
    }

    #[test]
    fn test_messages_name_the_culprit() {
        let err = LoopError::Strategy {
            strategy: "sma_cross".to_string(),
            symbol: "BBB".to_string(),
            source: anyhow::anyhow!("boom"),
        };
        let msg = err.to_string();
        assert!(msg.contains("sma_cross"));
        assert!(msg.contains("BBB"));
        assert!(msg.contains("boom"));
    }
}
