use super::rolling_buffer::{RollingBuffer, Window};
use crate::error::LoopError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// Executed trade, as appended to the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,      // Includes slippage when enabled
    pub commission: f64, // Flat fee charged for this fill
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    /// Signed cash impact of this fill (negative for buys)
    pub fn cash_delta(&self) -> f64 {
        let notional = self.quantity * self.price;
        match self.side {
            Side::Buy => -notional - self.commission,
            Side::Sell => notional - self.commission,
        }
    }
}

/// Equity observation taken on every bar update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mark {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub equity: f64,
}

/// Append-only record of marks and fills
///
/// The execution context writes to it but never reads back or rewrites
/// entries. Implementations may persist elsewhere; errors abort the run.
pub trait Ledger: Send {
    fn record_mark(&mut self, mark: Mark) -> anyhow::Result<()>;

    fn record_fill(&mut self, fill: Fill) -> anyhow::Result<()>;

    fn fills(&self) -> &[Fill];

    /// Marks recorded over the whole run
    fn mark_count(&self) -> usize;

    /// Marks still held in memory
    fn retained_marks(&self) -> usize {
        self.mark_count()
    }
}

/// Ledger kept in memory for the lifetime of one run
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    marks: Vec<Mark>,
    fills: Vec<Fill>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// Lowest equity relative to the running peak, as a percentage
    pub fn max_drawdown_pct(&self) -> f64 {
        let mut peak = f64::MIN;
        let mut max_dd: f64 = 0.0;

        for mark in &self.marks {
            peak = peak.max(mark.equity);
            if peak > 0.0 {
                max_dd = max_dd.max((peak - mark.equity) / peak * 100.0);
            }
        }

        max_dd
    }
}

impl Ledger for InMemoryLedger {
    fn record_mark(&mut self, mark: Mark) -> anyhow::Result<()> {
        self.marks.push(mark);
        Ok(())
    }

    fn record_fill(&mut self, fill: Fill) -> anyhow::Result<()> {
        self.fills.push(fill);
        Ok(())
    }

    fn fills(&self) -> &[Fill] {
        &self.fills
    }

    fn mark_count(&self) -> usize {
        self.marks.len()
    }
}

/// Ledger holding only the most recent marks
///
/// Default for live runs, which have no natural end. Fills are kept in
/// full; live strategies do not trade through the context.
#[derive(Debug)]
pub struct RollingLedger {
    marks: RollingBuffer<Mark>,
    fills: Vec<Fill>,
    recorded: usize,
}

impl RollingLedger {
    pub fn new(capacity: usize) -> Result<Self, LoopError> {
        Ok(Self {
            marks: RollingBuffer::new(capacity)?,
            fills: Vec::new(),
            recorded: 0,
        })
    }

    pub fn marks(&self) -> Window<'_, Mark> {
        self.marks.snapshot()
    }
}

impl Ledger for RollingLedger {
    fn record_mark(&mut self, mark: Mark) -> anyhow::Result<()> {
        self.marks.append(mark);
        self.recorded += 1;
        Ok(())
    }

    fn record_fill(&mut self, fill: Fill) -> anyhow::Result<()> {
        self.fills.push(fill);
        Ok(())
    }

    fn fills(&self) -> &[Fill] {
        &self.fills
    }

    fn mark_count(&self) -> usize {
        self.recorded
    }

    fn retained_marks(&self) -> usize {
        self.marks.len()
    }
}
