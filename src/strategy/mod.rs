// Strategy contract driven by the execution loop
pub mod sma_cross;

pub use sma_cross::SmaCross;

use crate::execution::{ExecutionContext, Window};
use crate::models::Bar;

/// Strategy replayed over historical bars
///
/// Invoked once per bar with the run's context and every bar seen so far
/// for the current symbol. Returning an error aborts the run.
pub trait BacktestStrategy {
    fn name(&self) -> &str;

    fn on_bar(&mut self, ctx: &mut ExecutionContext, window: &Window<'_, Bar>) -> anyhow::Result<()>;
}

/// Strategy fed by live polls
///
/// Invoked after every poll with the most recent `batch_size` bars across
/// the whole symbol bucket. Returning an error aborts the run.
pub trait LiveStrategy {
    fn name(&self) -> &str;

    fn on_window(&mut self, window: &Window<'_, Bar>) -> anyhow::Result<()>;
}

/// Closure-backed strategy, see [`backtest_fn`] and [`live_fn`]
pub struct FnStrategy<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a named backtest strategy
pub fn backtest_fn<F>(name: impl Into<String>, f: F) -> FnStrategy<F>
where
    F: FnMut(&mut ExecutionContext, &Window<'_, Bar>) -> anyhow::Result<()>,
{
    FnStrategy {
        name: name.into(),
        f,
    }
}

/// Wrap a closure as a named live strategy
pub fn live_fn<F>(name: impl Into<String>, f: F) -> FnStrategy<F>
where
    F: FnMut(&Window<'_, Bar>) -> anyhow::Result<()>,
{
    FnStrategy {
        name: name.into(),
        f,
    }
}

impl<F> BacktestStrategy for FnStrategy<F>
where
    F: FnMut(&mut ExecutionContext, &Window<'_, Bar>) -> anyhow::Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_bar(&mut self, ctx: &mut ExecutionContext, window: &Window<'_, Bar>) -> anyhow::Result<()> {
        (self.f)(ctx, window)
    }
}

impl<F> LiveStrategy for FnStrategy<F>
where
    F: FnMut(&Window<'_, Bar>) -> anyhow::Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_window(&mut self, window: &Window<'_, Bar>) -> anyhow::Result<()> {
        (self.f)(window)
    }
}

/// Closing prices of a window, oldest first
pub fn closes(window: &Window<'_, Bar>) -> Vec<f64> {
    window.iter().map(|bar| bar.close).collect()
}
