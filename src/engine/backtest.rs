use super::state::{LoopState, StateMachine};
use super::Interrupt;
use crate::error::LoopError;
use crate::execution::{ContextSettings, ExecutionContext, InMemoryLedger, Ledger, RollingBuffer, SymbolReport};
use crate::feed::{HistoricalRequest, HistoricalSource, SourceRegistry};
use crate::models::{Interval, SymbolBucket};
use crate::strategy::BacktestStrategy;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

type LedgerFactory = Box<dyn Fn(&str) -> Box<dyn Ledger>>;

/// Everything a historical replay needs
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub symbols: Vec<String>,
    pub source: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: Interval,
    pub context: ContextSettings,
    /// Keep going with the next symbol when one fails (default: abort the run)
    pub isolate_symbol_failures: bool,
}

/// A symbol skipped because of an isolated failure
#[derive(Debug, Clone, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: String,
}

/// Result of replaying the whole bucket
#[derive(Debug, Clone, Serialize)]
pub struct BacktestSummary {
    pub strategy: String,
    pub reports: Vec<SymbolReport>,
    pub failures: Vec<SymbolFailure>,
}

impl BacktestSummary {
    /// Strategy invocations across all symbols
    pub fn total_bars(&self) -> usize {
        self.reports.iter().map(|r| r.bars).sum()
    }
}

/// Replays historical bars through a strategy, one symbol at a time
///
/// Every symbol gets a fresh [`ExecutionContext`] and a buffer sized to its
/// full series, so the strategy always sees the whole history so far.
pub struct BacktestRunner {
    config: BacktestConfig,
    interrupt: Interrupt,
    ledger_factory: LedgerFactory,
    machine: StateMachine,
}

impl BacktestRunner {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            interrupt: Interrupt::new(),
            ledger_factory: Box::new(|_: &str| -> Box<dyn Ledger> { Box::new(InMemoryLedger::new()) }),
            machine: StateMachine::new(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Use a custom ledger for each symbol's context
    pub fn with_ledger_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> Box<dyn Ledger> + 'static,
    {
        self.ledger_factory = Box::new(factory);
        self
    }

    pub fn state(&self) -> LoopState {
        self.machine.state()
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the backtest over the whole bucket
    ///
    /// A runner can be run again; each run starts from `Init`.
    pub fn run<S: BacktestStrategy>(
        &mut self,
        registry: &SourceRegistry,
        strategy: &mut S,
    ) -> Result<BacktestSummary> {
        self.machine.reset();
        let result = self.run_inner(registry, strategy);
        self.machine.advance(LoopState::Terminated);
        result
    }

    fn run_inner<S: BacktestStrategy>(
        &mut self,
        registry: &SourceRegistry,
        strategy: &mut S,
    ) -> Result<BacktestSummary> {
        let bucket = SymbolBucket::new(self.config.symbols.iter().cloned())?;
        let mut source = registry.historical(&self.config.source)?;

        let request = HistoricalRequest {
            start: self.config.start,
            end: self.config.end,
            interval: self.config.interval,
        };

        tracing::info!(
            "Starting backtest for {} from {} to {} ({}) with initial capital = {:.2}",
            strategy.name(),
            request.start,
            request.end,
            request.interval,
            self.config.context.initial_capital
        );

        self.machine.advance(LoopState::Streaming);

        let mut summary = BacktestSummary {
            strategy: strategy.name().to_string(),
            reports: Vec::with_capacity(bucket.len()),
            failures: Vec::new(),
        };

        for symbol in bucket.iter() {
            let span = tracing::info_span!("symbol", symbol = %symbol);
            let _entered = span.enter();

            match self.run_symbol(source.as_mut(), symbol, &request, strategy) {
                Ok(report) => {
                    report.log();
                    summary.reports.push(report);
                }
                Err(e) if self.config.isolate_symbol_failures && !e.is_interrupt() => {
                    tracing::warn!("✗ {} failed, continuing with next symbol: {}", symbol, e);
                    summary.failures.push(SymbolFailure {
                        symbol: symbol.to_string(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "Backtest complete: {} symbols, {} bars, {} failures",
            summary.reports.len(),
            summary.total_bars(),
            summary.failures.len()
        );

        Ok(summary)
    }

    fn run_symbol<S: BacktestStrategy>(
        &self,
        source: &mut dyn HistoricalSource,
        symbol: &str,
        request: &HistoricalRequest,
        strategy: &mut S,
    ) -> Result<SymbolReport> {
        self.interrupt.check()?;

        let series = source
            .fetch(symbol, request)
            .map_err(|source| LoopError::DataSource {
                symbol: symbol.to_string(),
                source,
            })?;

        let mut ctx = ExecutionContext::new(self.config.context.clone(), (self.ledger_factory)(symbol));

        if series.is_empty() {
            tracing::warn!("No bars for {} in requested window", symbol);
            return Ok(ctx.finalize(symbol));
        }

        tracing::debug!("Replaying {} bars", series.len());

        // Sized to the whole series: never evicts within one symbol
        let mut buffer = RollingBuffer::new(series.len())?;
        let mut previous: Option<DateTime<Utc>> = None;

        for bar in series {
            self.interrupt.check()?;

            if let Some(previous) = previous {
                if bar.timestamp <= previous {
                    return Err(LoopError::OutOfOrderBar {
                        symbol: symbol.to_string(),
                        previous,
                        current: bar.timestamp,
                    });
                }
            }
            previous = Some(bar.timestamp);

            ctx.update_bar(&bar)?;
            buffer.append(bar);

            strategy
                .on_bar(&mut ctx, &buffer.snapshot())
                .map_err(|source| LoopError::Strategy {
                    strategy: strategy.name().to_string(),
                    symbol: symbol.to_string(),
                    source,
                })?;
        }

        Ok(ctx.finalize(symbol))
    }
}
