use super::exemption::{Exemption, ExemptionFilters, MarketStatus};
use super::pacing::{PacingController, RateLimitSource};
use super::state::{LoopState, StateMachine};
use super::Interrupt;
use crate::error::LoopError;
use crate::execution::{ContextSettings, ExecutionContext, Ledger, RollingBuffer, RollingLedger};
use crate::feed::{FeedKind, SourceRegistry};
use crate::models::SymbolBucket;
use crate::strategy::LiveStrategy;
use crate::Result;
use serde::Serialize;
use std::time::Duration;

/// Default number of bars kept in the live window
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default delay between polls for non-crypto feeds
pub const DEFAULT_FEED_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub symbols: Vec<String>,
    /// One of the [`FeedKind`] identifiers
    pub feed: String,
    pub batch_size: usize,
    pub feed_delay: Duration,
    /// Drive the loop from a deterministic synthetic feed
    pub fake_feed: bool,
    pub exemptions: ExemptionFilters,
    /// Stop after this many polls; `None` runs until exempted or interrupted
    pub max_polls: Option<u64>,
    pub context: ContextSettings,
}

impl LiveConfig {
    pub fn new(symbols: Vec<String>, feed: impl Into<String>) -> Self {
        Self {
            symbols,
            feed: feed.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            feed_delay: DEFAULT_FEED_DELAY,
            fake_feed: false,
            exemptions: ExemptionFilters::default(),
            max_polls: None,
            context: ContextSettings::default(),
        }
    }
}

/// Why a live run returned normally
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    Exempted(String),
    PollLimit,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveSummary {
    pub strategy: String,
    pub feed: String,
    pub polls: u64,
    pub buffered: usize,
    pub delay_ms: u64,
    pub marks_recorded: usize,
    pub marks_retained: usize,
    pub stop: StopReason,
}

/// Polls a live feed round-robin over the bucket and feeds a rolling window
/// to the strategy after every poll.
///
/// Before each poll the market state is fetched and checked against the
/// exemption filters; a match pauses the loop and the run returns.
pub struct LiveRunner {
    config: LiveConfig,
    interrupt: Interrupt,
    ledger: Option<Box<dyn Ledger>>,
    machine: StateMachine,
    exempted_by: Option<Exemption>,
}

impl LiveRunner {
    pub fn new(config: LiveConfig) -> Self {
        Self {
            config,
            interrupt: Interrupt::new(),
            ledger: None,
            machine: StateMachine::new(),
            exempted_by: None,
        }
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Ledger for the next run
    ///
    /// Without one, a [`RollingLedger`] holding the last `batch_size` marks
    /// is used.
    pub fn with_ledger(mut self, ledger: Box<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn state(&self) -> LoopState {
        self.machine.state()
    }

    /// The exemption that paused the loop, if any
    pub fn exempted_by(&self) -> Option<&Exemption> {
        self.exempted_by.as_ref()
    }

    pub async fn run<S: LiveStrategy>(
        &mut self,
        registry: &SourceRegistry,
        rate_limits: &dyn RateLimitSource,
        market: &mut dyn MarketStatus,
        strategy: &mut S,
    ) -> Result<LiveSummary> {
        self.machine.reset();
        self.exempted_by = None;
        let result = self.run_inner(registry, rate_limits, market, strategy).await;
        if self.machine.state() != LoopState::Paused {
            self.machine.advance(LoopState::Terminated);
        }
        result
    }

    async fn run_inner<S: LiveStrategy>(
        &mut self,
        registry: &SourceRegistry,
        rate_limits: &dyn RateLimitSource,
        market: &mut dyn MarketStatus,
        strategy: &mut S,
    ) -> Result<LiveSummary> {
        let bucket = SymbolBucket::new(self.config.symbols.iter().cloned())?;
        let kind: FeedKind = self.config.feed.parse()?;
        let mut buffer = RollingBuffer::new(self.config.batch_size)?;
        let pacing = PacingController::resolve(kind, self.config.feed_delay, rate_limits)?;
        let mut feed = registry.live(kind, self.config.fake_feed)?;

        let ledger = match self.ledger.take() {
            Some(ledger) => ledger,
            None => Box::new(RollingLedger::new(self.config.batch_size)?),
        };
        let mut ctx = ExecutionContext::new(self.config.context.clone(), ledger);

        tracing::info!(
            "Starting live run for {} on {} ({} symbols, window {}, delay {:?})",
            strategy.name(),
            kind,
            bucket.len(),
            self.config.batch_size,
            pacing.delay()
        );

        self.machine.advance(LoopState::Streaming);

        let mut polls: u64 = 0;
        let max_polls = self.config.max_polls;
        let limit_reached = move |polls: u64| max_polls.is_some_and(|max| polls >= max);

        let stop = 'outer: loop {
            for symbol in bucket.iter() {
                if limit_reached(polls) {
                    break 'outer StopReason::PollLimit;
                }
                self.interrupt.check()?;

                let state = market.market_state().map_err(LoopError::MarketState)?;
                if let Some(exemption) = self.config.exemptions.matches(&state, market.now()) {
                    tracing::info!("⏸  Live loop paused: {}", exemption);
                    let reason = StopReason::Exempted(exemption.to_string());
                    self.exempted_by = Some(exemption);
                    break 'outer reason;
                }

                let bar = feed.poll(symbol).map_err(|source| LoopError::DataSource {
                    symbol: symbol.to_string(),
                    source,
                })?;

                ctx.update_bar(&bar)?;
                if let Some(evicted) = buffer.append(bar) {
                    tracing::trace!(symbol = %evicted.symbol, "Evicted oldest bar");
                }

                strategy
                    .on_window(&buffer.snapshot())
                    .map_err(|source| LoopError::Strategy {
                        strategy: strategy.name().to_string(),
                        symbol: symbol.to_string(),
                        source,
                    })?;

                polls += 1;
                if limit_reached(polls) {
                    break 'outer StopReason::PollLimit;
                }

                pacing.pace(&self.interrupt).await?;
            }
        };

        if matches!(stop, StopReason::Exempted(_)) {
            self.machine.advance(LoopState::Paused);
        }

        tracing::info!(polls, "Live run stopped: {:?}", stop);

        Ok(LiveSummary {
            strategy: strategy.name().to_string(),
            feed: kind.to_string(),
            polls,
            buffered: buffer.len(),
            delay_ms: pacing.delay().as_millis() as u64,
            marks_recorded: ctx.ledger().mark_count(),
            marks_retained: ctx.ledger().retained_marks(),
            stop,
        })
    }
}
