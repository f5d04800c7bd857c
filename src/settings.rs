use crate::engine::{BacktestConfig, ExemptionFilters, LiveConfig};
use crate::error::LoopError;
use crate::execution::ContextSettings;
use crate::models::Interval;
use crate::Result;
use chrono::{NaiveDate, NaiveTime};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "BARLOOP";

/// Settings for a backtest or live run
///
/// Loaded from an optional TOML file, then `BARLOOP__*` environment
/// variables (`BARLOOP__LIVE__BATCH_SIZE=500`, `BARLOOP__SYMBOLS=AAA,BBB`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub symbols: Vec<String>,
    pub context: ContextSettings,
    pub backtest: BacktestSettings,
    pub live: LiveSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub source: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: String,
    pub isolate_symbol_failures: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    pub feed: String,
    pub batch_size: usize,
    pub feed_delay_ms: u64,
    pub fake_feed: bool,
    pub max_polls: Option<u64>,
    pub exempt_states: Vec<String>,
    pub exempt_weekdays: Vec<String>,
    pub exempt_dates: Vec<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            context: ContextSettings::default(),
            backtest: BacktestSettings::default(),
            live: LiveSettings::default(),
        }
    }
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            source: "synthetic".to_string(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap_or_default(),
            interval: "1d".to_string(),
            isolate_symbol_failures: false,
        }
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            feed: "US_STOCKS_live_feed".to_string(),
            batch_size: crate::engine::live::DEFAULT_BATCH_SIZE,
            feed_delay_ms: crate::engine::live::DEFAULT_FEED_DELAY.as_millis() as u64,
            fake_feed: false,
            max_polls: None,
            exempt_states: Vec::new(),
            exempt_weekdays: Vec::new(),
            exempt_dates: Vec::new(),
        }
    }
}

impl RunSettings {
    /// Load from `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            tracing::debug!("Loading settings from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }
        Self::build(builder)
    }

    /// Load from an in-memory TOML document and the environment
    pub fn from_toml(contents: &str) -> Result<Self> {
        Self::build(Config::builder().add_source(File::from_str(contents, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("symbols")
            .with_list_parse_key("live.exempt_states")
            .with_list_parse_key("live.exempt_weekdays")
            .with_list_parse_key("live.exempt_dates")
            .try_parsing(true);

        let settings = builder.add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn backtest_config(&self) -> Result<BacktestConfig> {
        if self.symbols.is_empty() {
            return Err(LoopError::EmptySymbolBucket);
        }
        if self.backtest.end < self.backtest.start {
            return Err(LoopError::InvalidSetting(format!(
                "backtest end {} is before start {}",
                self.backtest.end, self.backtest.start
            )));
        }

        let interval: Interval = self.backtest.interval.parse()?;

        Ok(BacktestConfig {
            symbols: self.symbols.clone(),
            source: self.backtest.source.clone(),
            start: self.backtest.start.and_time(NaiveTime::MIN).and_utc(),
            end: self.backtest.end.and_time(NaiveTime::MIN).and_utc(),
            interval,
            context: self.context.clone(),
            isolate_symbol_failures: self.backtest.isolate_symbol_failures,
        })
    }

    pub fn live_config(&self) -> Result<LiveConfig> {
        if self.symbols.is_empty() {
            return Err(LoopError::EmptySymbolBucket);
        }
        if self.live.batch_size == 0 {
            return Err(LoopError::InvalidCapacity { capacity: 0 });
        }

        Ok(LiveConfig {
            symbols: self.symbols.clone(),
            feed: self.live.feed.clone(),
            batch_size: self.live.batch_size,
            feed_delay: Duration::from_millis(self.live.feed_delay_ms),
            fake_feed: self.live.fake_feed,
            exemptions: ExemptionFilters::new(
                &self.live.exempt_states,
                &self.live.exempt_weekdays,
                &self.live.exempt_dates,
            )?,
            max_polls: self.live.max_polls,
            context: self.context.clone(),
        })
    }
}
