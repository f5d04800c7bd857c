// Backtest and live execution loops
pub mod backtest;
pub mod boundary;
pub mod exemption;
pub mod interrupt;
pub mod live;
pub mod pacing;
pub mod state;

pub use backtest::{BacktestConfig, BacktestRunner, BacktestSummary, SymbolFailure};
pub use boundary::{FailureBoundary, RunOutcome};
pub use exemption::{Exemption, ExemptionFilters, MarketStatus, StaticMarketStatus};
pub use interrupt::Interrupt;
pub use live::{LiveConfig, LiveRunner, LiveSummary, StopReason};
pub use pacing::{DelaySource, FixedRateLimit, PacingController, RateLimitSource};
pub use state::LoopState;

use crate::feed::SourceRegistry;
use crate::strategy::{BacktestStrategy, LiveStrategy};
use crate::Result;
use tracing::Instrument;

/// Replay `config` through `strategy` behind a [`FailureBoundary`]
pub fn run_backtest<S: BacktestStrategy>(
    config: BacktestConfig,
    registry: &SourceRegistry,
    strategy: &mut S,
    interrupt: Interrupt,
) -> Result<RunOutcome<BacktestSummary>> {
    let boundary = FailureBoundary::new(strategy.name());
    let span = tracing::info_span!("backtest", strategy = %boundary.strategy());
    let _entered = span.enter();

    let mut runner = BacktestRunner::new(config).with_interrupt(interrupt);
    boundary.guard(|| runner.run(registry, strategy))
}

/// Drive `strategy` from a live feed behind a [`FailureBoundary`]
pub async fn run_live<S: LiveStrategy>(
    config: LiveConfig,
    registry: &SourceRegistry,
    rate_limits: &dyn RateLimitSource,
    market: &mut dyn MarketStatus,
    strategy: &mut S,
    interrupt: Interrupt,
) -> Result<RunOutcome<LiveSummary>> {
    let boundary = FailureBoundary::new(strategy.name());
    let span = tracing::info_span!("live", strategy = %boundary.strategy());

    let mut runner = LiveRunner::new(config).with_interrupt(interrupt);
    boundary
        .guard_async(runner.run(registry, rate_limits, market, strategy).instrument(span))
        .await
}
