use super::{HistoricalRequest, HistoricalSource, LiveFeed};
use crate::models::{Bar, Interval};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Sideways/choppy market (±1% around mean)
    Sideways,
    /// High volatility (±5% large swings)
    Volatile,
    /// Normal growth, then a 25% slide over the second half
    Drawdown,
}

impl std::str::FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uptrend" => Ok(MarketScenario::Uptrend),
            "downtrend" => Ok(MarketScenario::Downtrend),
            "sideways" => Ok(MarketScenario::Sideways),
            "volatile" => Ok(MarketScenario::Volatile),
            "drawdown" => Ok(MarketScenario::Drawdown),
            other => Err(format!("unknown scenario '{}'", other)),
        }
    }
}

/// Seeded bar generator shared by the synthetic sources
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
            base_volume: 1_000_000.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Generate `count` bars for `symbol` starting at `start`
    ///
    /// Timestamps are spaced exactly `interval` apart.
    pub fn generate(
        &mut self,
        symbol: &str,
        scenario: MarketScenario,
        start: DateTime<Utc>,
        count: usize,
        interval: Interval,
    ) -> Vec<Bar> {
        let mut bars = Vec::with_capacity(count);
        let mut price = self.base_price;

        for i in 0..count {
            price = self.step(scenario, price, i, count, interval);
            let timestamp = start + Duration::minutes(i as i64 * interval.minutes());
            bars.push(self.create_bar(symbol, price, timestamp));
        }

        bars
    }

    fn step(
        &mut self,
        scenario: MarketScenario,
        price: f64,
        i: usize,
        count: usize,
        interval: Interval,
    ) -> f64 {
        let intervals_per_day = (24.0 * 60.0 / interval.minutes() as f64).max(1.0);

        let next = match scenario {
            MarketScenario::Uptrend => {
                let drift = price * 0.02 / intervals_per_day;
                price + drift + price * self.rng.gen_range(-0.001..0.001)
            }
            MarketScenario::Downtrend => {
                let drift = price * -0.02 / intervals_per_day;
                price + drift + price * self.rng.gen_range(-0.001..0.001)
            }
            MarketScenario::Sideways => {
                // 10% pull to mean
                let reversion = (self.base_price - price) * 0.1;
                price + reversion + price * self.rng.gen_range(-0.01..0.01)
            }
            MarketScenario::Volatile => {
                let moved = price + price * self.rng.gen_range(-0.05..0.05);
                moved.max(self.base_price * 0.5)
            }
            MarketScenario::Drawdown => {
                if i < count / 2 {
                    price + price * self.rng.gen_range(-0.005..0.01)
                } else {
                    let drop_rate = -0.25 / (count as f64 / 2.0);
                    price + price * drop_rate + price * self.rng.gen_range(-0.005..0.005)
                }
            }
        };

        next.max(0.01)
    }

    /// Random-walk step used by the live feed
    fn walk(&mut self, price: f64) -> f64 {
        (price * (1.0 + self.rng.gen_range(-0.005..0.005))).max(0.01)
    }

    fn create_bar(&mut self, symbol: &str, close: f64, timestamp: DateTime<Utc>) -> Bar {
        let noise_pct = 0.002; // ±0.2% intrabar movement

        let high = close * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = close * (1.0 - self.rng.gen_range(0.0..noise_pct));
        let open = (close * (1.0 + self.rng.gen_range(-noise_pct..noise_pct))).clamp(low, high);
        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);

        Bar {
            symbol: symbol.to_string(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Stable per-symbol seed offset (FNV-1a)
fn symbol_seed(seed: u64, symbol: &str) -> u64 {
    symbol
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64 ^ seed, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
        })
}

/// Deterministic historical source backed by [`SyntheticDataGenerator`]
///
/// Produces one bar per interval over the requested window; the same
/// seed and symbol always yield the same series.
pub struct SyntheticHistorical {
    seed: u64,
    scenario: MarketScenario,
    base_price: Option<f64>,
}

impl SyntheticHistorical {
    pub fn new(seed: u64, scenario: MarketScenario) -> Self {
        Self {
            seed,
            scenario,
            base_price: None,
        }
    }

    /// Start every series from `base_price` instead of the generator default
    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = Some(base_price);
        self
    }
}

impl HistoricalSource for SyntheticHistorical {
    fn fetch(&mut self, symbol: &str, request: &HistoricalRequest) -> anyhow::Result<Vec<Bar>> {
        if request.end < request.start {
            anyhow::bail!(
                "end {} is before start {}",
                request.end,
                request.start
            );
        }

        let span = (request.end - request.start).num_minutes();
        let count = (span / request.interval.minutes()) as usize + 1;

        let mut generator = SyntheticDataGenerator::new(symbol_seed(self.seed, symbol));
        if let Some(base_price) = self.base_price {
            generator = generator.with_base_price(base_price);
        }
        Ok(generator.generate(symbol, self.scenario, request.start, count, request.interval))
    }
}

struct SymbolWalk {
    generator: SyntheticDataGenerator,
    price: f64,
    polls: i64,
}

/// Deterministic stand-in for a live feed ("fake feed")
///
/// Each symbol gets its own seeded random walk; successive polls of a
/// symbol advance its timestamp by one interval.
pub struct SyntheticLiveFeed {
    seed: u64,
    start: DateTime<Utc>,
    interval: Interval,
    walks: HashMap<String, SymbolWalk>,
}

impl SyntheticLiveFeed {
    pub fn new(seed: u64) -> Self {
        Self::with_start(seed, Utc::now(), Interval::M1)
    }

    pub fn with_start(seed: u64, start: DateTime<Utc>, interval: Interval) -> Self {
        Self {
            seed,
            start,
            interval,
            walks: HashMap::new(),
        }
    }
}

impl LiveFeed for SyntheticLiveFeed {
    fn poll(&mut self, symbol: &str) -> anyhow::Result<Bar> {
        let seed = self.seed;
        let walk = self
            .walks
            .entry(symbol.to_string())
            .or_insert_with(|| {
                let generator = SyntheticDataGenerator::new(symbol_seed(seed, symbol));
                let price = generator.base_price;
                SymbolWalk {
                    generator,
                    price,
                    polls: 0,
                }
            });

        walk.price = walk.generator.walk(walk.price);
        let timestamp = self.start + Duration::minutes(walk.polls * self.interval.minutes());
        walk.polls += 1;

        Ok(walk.generator.create_bar(symbol, walk.price, timestamp))
    }
}
