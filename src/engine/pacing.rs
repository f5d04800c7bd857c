use super::Interrupt;
use crate::error::LoopError;
use crate::feed::FeedKind;
use crate::Result;
use governor::Quota;
use std::num::NonZeroU32;
use std::time::Duration;

/// Published request budget of the exchange behind a feed
pub trait RateLimitSource {
    fn quota(&self, kind: FeedKind) -> anyhow::Result<Quota>;
}

/// Rate limit known up front
#[derive(Debug, Clone, Copy)]
pub struct FixedRateLimit {
    quota: Quota,
}

impl FixedRateLimit {
    pub fn new(quota: Quota) -> Self {
        Self { quota }
    }

    /// From an exchange `rateLimit` expressed in milliseconds per request
    pub fn from_millis(millis: u64) -> Option<Self> {
        Quota::with_period(Duration::from_millis(millis)).map(Self::new)
    }

    pub fn per_second(requests: NonZeroU32) -> Self {
        Self::new(Quota::per_second(requests))
    }
}

impl RateLimitSource for FixedRateLimit {
    fn quota(&self, _kind: FeedKind) -> anyhow::Result<Quota> {
        Ok(self.quota)
    }
}

/// Where the pacing delay came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelaySource {
    Configured,
    ExchangeRateLimit,
}

/// Inter-poll delay for the live loop
#[derive(Debug, Clone)]
pub struct PacingController {
    delay: Duration,
    source: DelaySource,
}

impl PacingController {
    /// Pick the delay for `kind`
    ///
    /// Crypto feeds use the exchange rate limit and ignore `configured`;
    /// every other feed uses `configured` as is.
    pub fn resolve(
        kind: FeedKind,
        configured: Duration,
        rate_limits: &dyn RateLimitSource,
    ) -> Result<Self> {
        if kind.is_crypto() {
            let quota = rate_limits.quota(kind).map_err(LoopError::RateLimit)?;
            let delay = quota.replenish_interval();

            tracing::info!(
                feed = %kind,
                delay_ms = delay.as_millis() as u64,
                "Pacing from exchange rate limit (overrides configured {:?})",
                configured
            );

            return Ok(Self {
                delay,
                source: DelaySource::ExchangeRateLimit,
            });
        }

        Ok(Self::fixed(configured))
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            source: DelaySource::Configured,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn source(&self) -> DelaySource {
        self.source
    }

    /// Wait out the delay, returning early with `Interrupted` if asked to stop
    pub async fn pace(&self, interrupt: &Interrupt) -> Result<()> {
        if self.delay.is_zero() {
            return interrupt.check();
        }

        tokio::select! {
            _ = tokio::time::sleep(self.delay) => interrupt.check(),
            _ = interrupt.triggered() => Err(LoopError::Interrupted),
        }
    }
}
