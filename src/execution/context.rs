use super::ledger::{Fill, Ledger, Mark, Side};
use crate::error::LoopError;
use crate::models::Bar;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Run-level trading parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub initial_capital: f64,
    pub commission: f64, // Flat fee per fill
    pub enable_slippage: bool,
    pub slippage_pct: f64, // Applied against the trader when slippage is enabled
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            commission: 0.0,
            enable_slippage: true,
            slippage_pct: 0.0005, // 5 bps
        }
    }
}

/// Mutable state of one run, bridging the loop to the ledger
///
/// Backtests create one per symbol and drop it once the symbol is exhausted.
/// Live runs share one across the whole bucket.
pub struct ExecutionContext {
    settings: ContextSettings,
    cash: f64,
    positions: HashMap<String, f64>,
    last_prices: HashMap<String, f64>,
    last_bar: Option<Bar>,
    first_timestamp: Option<DateTime<Utc>>,
    bars_seen: usize,
    commission_paid: f64,
    ledger: Box<dyn Ledger>,
}

impl ExecutionContext {
    pub fn new(settings: ContextSettings, ledger: Box<dyn Ledger>) -> Self {
        Self {
            cash: settings.initial_capital,
            settings,
            positions: HashMap::new(),
            last_prices: HashMap::new(),
            last_bar: None,
            first_timestamp: None,
            bars_seen: 0,
            commission_paid: 0.0,
            ledger,
        }
    }

    /// Advance to a new bar and mark equity in the ledger
    pub fn update_bar(&mut self, bar: &Bar) -> Result<()> {
        self.last_prices.insert(bar.symbol.clone(), bar.close);
        self.first_timestamp.get_or_insert(bar.timestamp);
        self.bars_seen += 1;

        let mark = Mark {
            symbol: bar.symbol.clone(),
            timestamp: bar.timestamp,
            close: bar.close,
            equity: self.equity(),
        };
        self.last_bar = Some(bar.clone());

        self.ledger.record_mark(mark).map_err(LoopError::Ledger)
    }

    /// Buy `quantity` of the current bar's symbol at its close
    pub fn buy(&mut self, quantity: f64) -> Result<Fill> {
        let symbol = self.current_symbol()?;
        self.submit(&symbol, Side::Buy, quantity)
    }

    /// Sell `quantity` of the current bar's symbol at its close
    pub fn sell(&mut self, quantity: f64) -> Result<Fill> {
        let symbol = self.current_symbol()?;
        self.submit(&symbol, Side::Sell, quantity)
    }

    /// Fill an order for any symbol already seen in this run
    pub fn submit(&mut self, symbol: &str, side: Side, quantity: f64) -> Result<Fill> {
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(LoopError::InvalidOrder(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }

        let reference = *self.last_prices.get(symbol).ok_or_else(|| {
            LoopError::InvalidOrder(format!("no price seen yet for {}", symbol))
        })?;

        let slip = if self.settings.enable_slippage {
            self.settings.slippage_pct
        } else {
            0.0
        };
        let price = match side {
            Side::Buy => reference * (1.0 + slip),
            Side::Sell => reference * (1.0 - slip),
        };

        let fill = Fill {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            commission: self.settings.commission,
            timestamp: self
                .last_bar
                .as_ref()
                .map(|b| b.timestamp)
                .unwrap_or_else(Utc::now),
        };

        self.cash += fill.cash_delta();
        self.commission_paid += fill.commission;
        let signed = match side {
            Side::Buy => quantity,
            Side::Sell => -quantity,
        };
        *self.positions.entry(symbol.to_string()).or_insert(0.0) += signed;

        tracing::debug!(
            symbol = %symbol,
            side = ?side,
            quantity,
            price,
            "Filled order"
        );

        self.ledger
            .record_fill(fill.clone())
            .map_err(LoopError::Ledger)?;

        Ok(fill)
    }

    fn current_symbol(&self) -> Result<String> {
        self.last_bar
            .as_ref()
            .map(|b| b.symbol.clone())
            .ok_or_else(|| LoopError::InvalidOrder("no bar received yet".to_string()))
    }

    /// Cash plus open positions valued at their last close
    pub fn equity(&self) -> f64 {
        let holdings: f64 = self
            .positions
            .iter()
            .map(|(symbol, qty)| qty * self.last_prices.get(symbol).copied().unwrap_or(0.0))
            .sum();
        self.cash + holdings
    }

    pub fn capital(&self) -> f64 {
        self.settings.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn commission(&self) -> f64 {
        self.settings.commission
    }

    pub fn slippage_enabled(&self) -> bool {
        self.settings.enable_slippage
    }

    pub fn position(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.last_bar.as_ref()
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    pub fn fills(&self) -> &[Fill] {
        self.ledger.fills()
    }

    /// Close out the run and summarize the ledger
    pub fn finalize(self, symbol: &str) -> SymbolReport {
        let final_equity = self.equity();
        let initial = self.settings.initial_capital;
        let return_pct = if initial != 0.0 {
            (final_equity - initial) / initial * 100.0
        } else {
            0.0
        };

        SymbolReport {
            symbol: symbol.to_string(),
            bars: self.bars_seen,
            marks: self.ledger.mark_count(),
            fills: self.ledger.fills().len(),
            commission_paid: self.commission_paid,
            initial_capital: initial,
            final_equity,
            return_pct,
            first_timestamp: self.first_timestamp,
            last_timestamp: self.last_bar.map(|b| b.timestamp),
        }
    }
}

/// Ledger summary produced when a symbol is exhausted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub bars: usize,
    pub marks: usize,
    pub fills: usize,
    pub commission_paid: f64,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub return_pct: f64,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl SymbolReport {
    pub fn log(&self) {
        tracing::info!(
            symbol = %self.symbol,
            bars = self.bars,
            fills = self.fills,
            commission = %format!("{:.2}", self.commission_paid),
            "Ledger closed: equity ${:.2} ({:+.2}%)",
            self.final_equity,
            self.return_pct
        );
    }
}
