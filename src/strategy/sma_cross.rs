use super::{BacktestStrategy, LiveStrategy};
use crate::execution::{ExecutionContext, Window};
use crate::models::Bar;

/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    Above,
    Below,
    None,
}

/// Moving-average crossover used by the demo binary
///
/// Goes long a fixed quantity when the short SMA crosses above the long
/// SMA and flattens when it crosses back below.
#[derive(Debug, Clone)]
pub struct SmaCross {
    short_period: usize,
    long_period: usize,
    quantity: f64,
    signals: usize,
}

impl SmaCross {
    pub fn new(short_period: usize, long_period: usize, quantity: f64) -> Self {
        Self {
            short_period,
            long_period,
            quantity,
            signals: 0,
        }
    }

    /// Number of crossovers seen so far
    pub fn signals(&self) -> usize {
        self.signals
    }

    /// Compare the crossover state of the latest price against the previous one
    pub fn crossover(&self, closes: &[f64]) -> Crossover {
        if closes.len() < self.long_period + 1 {
            return Crossover::None;
        }

        let previous = &closes[..closes.len() - 1];
        let spread = |prices: &[f64]| -> Option<f64> {
            Some(calculate_sma(prices, self.short_period)? - calculate_sma(prices, self.long_period)?)
        };

        match (spread(previous), spread(closes)) {
            (Some(before), Some(now)) if before <= 0.0 && now > 0.0 => Crossover::Above,
            (Some(before), Some(now)) if before >= 0.0 && now < 0.0 => Crossover::Below,
            _ => Crossover::None,
        }
    }
}

impl Default for SmaCross {
    fn default() -> Self {
        Self::new(5, 20, 10.0)
    }
}

impl BacktestStrategy for SmaCross {
    fn name(&self) -> &str {
        "sma_cross"
    }

    fn on_bar(&mut self, ctx: &mut ExecutionContext, window: &Window<'_, Bar>) -> anyhow::Result<()> {
        let closes = super::closes(window);
        let Some(bar) = window.last() else {
            return Ok(());
        };

        match self.crossover(&closes) {
            Crossover::Above if ctx.position(&bar.symbol) <= 0.0 => {
                self.signals += 1;
                ctx.buy(self.quantity)?;
            }
            Crossover::Below if ctx.position(&bar.symbol) > 0.0 => {
                self.signals += 1;
                let held = ctx.position(&bar.symbol);
                ctx.sell(held)?;
            }
            _ => {}
        }

        Ok(())
    }
}

impl LiveStrategy for SmaCross {
    fn name(&self) -> &str {
        "sma_cross"
    }

    fn on_window(&mut self, window: &Window<'_, Bar>) -> anyhow::Result<()> {
        let Some(latest) = window.last() else {
            return Ok(());
        };

        // Live windows interleave the whole bucket
        let closes: Vec<f64> = window
            .iter()
            .filter(|bar| bar.symbol == latest.symbol)
            .map(|bar| bar.close)
            .collect();

        let crossover = self.crossover(&closes);
        if crossover != Crossover::None {
            self.signals += 1;
            tracing::info!(
                symbol = %latest.symbol,
                price = latest.close,
                "Signal: {:?}",
                crossover
            );
        }

        Ok(())
    }
}
