use crate::error::LoopError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One OHLCV bar for one instrument at one timestamp
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered set of instruments for one run
///
/// Order is caller-supplied and preserved. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolBucket {
    symbols: Vec<String>,
}

impl SymbolBucket {
    /// Build a bucket, rejecting an empty list
    pub fn new<I, S>(symbols: I) -> Result<Self, LoopError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols: Vec<String> = symbols.into_iter().map(Into::into).collect();
        if symbols.is_empty() {
            return Err(LoopError::EmptySymbolBucket);
        }
        Ok(Self { symbols })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.symbols
    }
}

/// Bar interval for historical requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// 1 minute
    M1,
    /// 5 minutes
    M5,
    /// 15 minutes
    M15,
    /// 30 minutes
    M30,
    /// 1 hour
    H1,
    /// 4 hours
    H4,
    /// 1 day
    D1,
    /// 1 week
    W1,
}

impl Interval {
    pub fn minutes(&self) -> i64 {
        match self {
            Interval::M1 => 1,
            Interval::M5 => 5,
            Interval::M15 => 15,
            Interval::M30 => 30,
            Interval::H1 => 60,
            Interval::H4 => 240,
            Interval::D1 => 1440,
            Interval::W1 => 10_080,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
            Interval::W1 => "1w",
        }
    }
}

impl FromStr for Interval {
    type Err = LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Interval::M1),
            "5m" => Ok(Interval::M5),
            "15m" => Ok(Interval::M15),
            "30m" => Ok(Interval::M30),
            "1h" | "60m" => Ok(Interval::H1),
            "4h" => Ok(Interval::H4),
            "1d" => Ok(Interval::D1),
            "1w" | "7d" => Ok(Interval::W1),
            other => Err(LoopError::InvalidSetting(format!(
                "unsupported interval '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_preserves_order() {
        let bucket = SymbolBucket::new(["BBB", "AAA", "CCC"]).unwrap();
        let symbols: Vec<&str> = bucket.iter().collect();
        assert_eq!(symbols, vec!["BBB", "AAA", "CCC"]);
        assert_eq!(bucket.len(), 3);
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let result = SymbolBucket::new(Vec::<String>::new());
        assert!(matches!(result, Err(LoopError::EmptySymbolBucket)));
    }

    #[test]
    fn test_interval_parsing() {
        assert_eq!("1d".parse::<Interval>().unwrap(), Interval::D1);
        assert_eq!("5M".parse::<Interval>().unwrap(), Interval::M5);
        assert_eq!(" 1h ".parse::<Interval>().unwrap(), Interval::H1);
        assert!("3d".parse::<Interval>().is_err());
    }

    #[test]
    fn test_interval_duration() {
        assert_eq!(Interval::H4.duration(), Duration::hours(4));
        assert_eq!(Interval::D1.to_string(), "1d");
    }
}
