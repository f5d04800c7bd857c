use barloop::engine::{
    self, BacktestConfig, ExemptionFilters, FixedRateLimit, Interrupt, LiveConfig, LoopState,
    RunOutcome, StaticMarketStatus, StopReason,
};
use barloop::execution::{ContextSettings, Window};
use barloop::feed::{FeedKind, HistoricalRequest, HistoricalSource, LiveFeed, SourceRegistry};
use barloop::strategy::{backtest_fn, live_fn};
use barloop::{Bar, Interval, LoopError};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("barloop=debug")
        .try_init()
        .ok();
}

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::days(n)
}

fn bar(symbol: &str, n: i64, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp: day(n),
        open: close,
        high: close,
        low: close,
        close,
        volume: 100.0,
    }
}

/// Serves fixed series and counts fetches
#[derive(Clone)]
struct FixedSource {
    series: Arc<HashMap<String, Vec<Bar>>>,
    fetches: Arc<AtomicUsize>,
}

impl FixedSource {
    fn new(series: Vec<(&str, Vec<Bar>)>) -> Self {
        Self {
            series: Arc::new(
                series
                    .into_iter()
                    .map(|(symbol, bars)| (symbol.to_string(), bars))
                    .collect(),
            ),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn registry(&self) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        let source = self.clone();
        registry.register_historical("fixed", move || Box::new(source.clone()));
        registry
    }
}

impl HistoricalSource for FixedSource {
    fn fetch(&mut self, symbol: &str, _request: &HistoricalRequest) -> anyhow::Result<Vec<Bar>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.series
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no data for {}", symbol))
    }
}

fn backtest_config(symbols: &[&str]) -> BacktestConfig {
    BacktestConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        source: "fixed".to_string(),
        start: day(0),
        end: day(30),
        interval: Interval::D1,
        context: ContextSettings::default(),
        isolate_symbol_failures: false,
    }
}

fn live_config(symbols: &[&str], feed: &str, max_polls: u64) -> LiveConfig {
    let mut config = LiveConfig::new(symbols.iter().map(|s| s.to_string()).collect(), feed);
    config.fake_feed = true;
    config.max_polls = Some(max_polls);
    config.feed_delay = Duration::from_millis(200);
    config
}

fn rate_limits() -> FixedRateLimit {
    FixedRateLimit::from_millis(100).unwrap()
}

#[test]
fn test_backtest_visits_symbols_in_order_with_growing_windows() {
    init_logging();

    let source = FixedSource::new(vec![
        ("AAA", vec![bar("AAA", 0, 1.0), bar("AAA", 1, 2.0)]),
        ("BBB", vec![bar("BBB", 0, 10.0), bar("BBB", 1, 20.0)]),
    ]);
    let registry = source.registry();

    let mut calls: Vec<(String, Vec<f64>)> = Vec::new();
    let mut strategy = backtest_fn("record", |ctx, window: &Window<'_, Bar>| {
        let symbol = ctx.last_bar().map(|b| b.symbol.clone()).unwrap_or_default();
        calls.push((symbol, window.iter().map(|b| b.close).collect()));
        Ok(())
    });

    let outcome = engine::run_backtest(
        backtest_config(&["AAA", "BBB"]),
        &registry,
        &mut strategy,
        Interrupt::new(),
    )
    .unwrap();
    drop(strategy);

    let summary = outcome.completed().unwrap();
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(
        calls,
        vec![
            ("AAA".to_string(), vec![1.0]),
            ("AAA".to_string(), vec![1.0, 2.0]),
            ("BBB".to_string(), vec![10.0]),
            ("BBB".to_string(), vec![10.0, 20.0]),
        ]
    );
}

#[test]
fn test_backtest_final_window_holds_whole_series() {
    let bars: Vec<Bar> = (0..25).map(|i| bar("AAA", i, 100.0 + i as f64)).collect();
    let source = FixedSource::new(vec![("AAA", bars)]);
    let registry = source.registry();

    let mut invocations = 0;
    let mut last_len = 0;
    let mut strategy = backtest_fn("count", |_ctx, window| {
        invocations += 1;
        last_len = window.len();
        Ok(())
    });

    engine::run_backtest(backtest_config(&["AAA"]), &registry, &mut strategy, Interrupt::new())
        .unwrap();
    drop(strategy);

    assert_eq!(invocations, 25);
    assert_eq!(last_len, 25);
}

#[test]
fn test_backtest_empty_bucket_never_touches_source() {
    let source = FixedSource::new(vec![]);
    let registry = source.registry();

    let mut strategy = backtest_fn("noop", |_ctx, _window| Ok(()));
    let result = engine::run_backtest(backtest_config(&[]), &registry, &mut strategy, Interrupt::new());

    assert!(matches!(result, Err(LoopError::EmptySymbolBucket)));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
}

#[test]
fn test_backtest_strategy_error_passes_through_boundary() {
    let source = FixedSource::new(vec![("AAA", vec![bar("AAA", 0, 1.0), bar("AAA", 1, 2.0)])]);
    let registry = source.registry();

    let mut strategy = backtest_fn("broken", |_ctx, window| {
        if window.len() == 2 {
            anyhow::bail!("division by zero");
        }
        Ok(())
    });

    let result = engine::run_backtest(backtest_config(&["AAA"]), &registry, &mut strategy, Interrupt::new());
    match result {
        Err(LoopError::Strategy { strategy, symbol, source }) => {
            assert_eq!(strategy, "broken");
            assert_eq!(symbol, "AAA");
            assert_eq!(source.to_string(), "division by zero");
        }
        other => panic!("expected strategy error, got {:?}", other),
    }
}

#[test]
fn test_backtest_rejects_out_of_order_bars() {
    let source = FixedSource::new(vec![(
        "AAA",
        vec![bar("AAA", 2, 1.0), bar("AAA", 1, 2.0)],
    )]);
    let registry = source.registry();

    let mut strategy = backtest_fn("noop", |_ctx, _window| Ok(()));
    let result = engine::run_backtest(backtest_config(&["AAA"]), &registry, &mut strategy, Interrupt::new());

    assert!(matches!(result, Err(LoopError::OutOfOrderBar { ref symbol, .. }) if symbol == "AAA"));
}

#[test]
fn test_backtest_isolated_failure_continues() {
    let source = FixedSource::new(vec![("BBB", vec![bar("BBB", 0, 5.0)])]);
    let registry = source.registry();

    let mut config = backtest_config(&["MISSING", "BBB"]);
    config.isolate_symbol_failures = true;

    let mut strategy = backtest_fn("noop", |_ctx, _window| Ok(()));
    let summary = engine::run_backtest(config, &registry, &mut strategy, Interrupt::new())
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].symbol, "MISSING");
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].symbol, "BBB");
}

#[test]
fn test_backtest_failure_aborts_without_isolation() {
    let source = FixedSource::new(vec![("BBB", vec![bar("BBB", 0, 5.0)])]);
    let registry = source.registry();

    let mut calls = 0;
    let mut strategy = backtest_fn("count", |_ctx, _window| {
        calls += 1;
        Ok(())
    });
    let result = engine::run_backtest(
        backtest_config(&["MISSING", "BBB"]),
        &registry,
        &mut strategy,
        Interrupt::new(),
    );
    drop(strategy);

    assert!(matches!(result, Err(LoopError::DataSource { ref symbol, .. }) if symbol == "MISSING"));
    assert_eq!(calls, 0);
}

#[test]
fn test_backtest_interrupt_is_an_outcome() {
    let source = FixedSource::new(vec![("AAA", (0..10).map(|i| bar("AAA", i, 1.0)).collect())]);
    let registry = source.registry();
    let interrupt = Interrupt::new();
    let remote = interrupt.clone();

    let mut calls = 0;
    let mut strategy = backtest_fn("stopper", |_ctx, _window| {
        calls += 1;
        if calls == 3 {
            remote.trigger();
        }
        Ok(())
    });

    let outcome =
        engine::run_backtest(backtest_config(&["AAA"]), &registry, &mut strategy, interrupt).unwrap();
    drop(strategy);

    assert!(matches!(outcome, RunOutcome::Interrupted));
    assert_eq!(calls, 3);
}

#[tokio::test(start_paused = true)]
async fn test_live_unknown_feed_fails_before_strategy() {
    init_logging();

    let registry = SourceRegistry::with_synthetic(7);
    let mut market = StaticMarketStatus::new("open");

    let mut calls = 0;
    let mut strategy = live_fn("count", |_window| {
        calls += 1;
        Ok(())
    });

    let result = engine::run_live(
        live_config(&["AAA"], "unknown_feed", 5),
        &registry,
        &rate_limits(),
        &mut market,
        &mut strategy,
        Interrupt::new(),
    )
    .await;
    drop(strategy);

    assert!(matches!(result, Err(LoopError::InvalidDataFeedType(ref id)) if id == "unknown_feed"));
    assert_eq!(calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_live_invocations_match_polls() {
    let registry = SourceRegistry::with_synthetic(7);
    let mut market = StaticMarketStatus::new("open");

    let mut calls = 0;
    let mut strategy = live_fn("count", |_window| {
        calls += 1;
        Ok(())
    });

    let started = tokio::time::Instant::now();
    let outcome = engine::run_live(
        live_config(&["AAA"], FeedKind::UsStocks.as_str(), 8),
        &registry,
        &rate_limits(),
        &mut market,
        &mut strategy,
        Interrupt::new(),
    )
    .await
    .unwrap();
    drop(strategy);

    let summary = outcome.completed().unwrap();
    assert_eq!(summary.polls, 8);
    assert_eq!(calls, 8);
    assert_eq!(summary.stop, StopReason::PollLimit);

    // Seven pauses of 200ms between eight polls
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1400));
    assert!(elapsed < Duration::from_millis(1600));
}

#[tokio::test(start_paused = true)]
async fn test_live_exempt_weekday_never_invokes_strategy() {
    struct SaturdayMarket;

    impl barloop::engine::MarketStatus for SaturdayMarket {
        fn market_state(&mut self) -> anyhow::Result<String> {
            Ok("open".to_string())
        }

        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap()
        }
    }

    let registry = SourceRegistry::with_synthetic(7);
    let mut config = live_config(&["AAA", "BBB"], FeedKind::CryptoLevel1.as_str(), 100);
    config.exemptions = ExemptionFilters::default()
        .with_weekdays(["sat", "Sunday"])
        .unwrap();

    let mut calls = 0;
    let mut strategy = live_fn("count", |_window| {
        calls += 1;
        Ok(())
    });

    let mut runner = engine::LiveRunner::new(config);
    let summary = runner
        .run(&registry, &rate_limits(), &mut SaturdayMarket, &mut strategy)
        .await
        .unwrap();
    drop(strategy);

    assert_eq!(calls, 0);
    assert!(matches!(summary.stop, StopReason::Exempted(_)));
    assert_eq!(runner.state(), LoopState::Paused);
}

/// Reports "open" for a fixed number of checks, "closed" afterwards
struct ClosingMarket {
    open_checks: usize,
    checks: usize,
}

impl barloop::engine::MarketStatus for ClosingMarket {
    fn market_state(&mut self) -> anyhow::Result<String> {
        self.checks += 1;
        if self.checks > self.open_checks {
            Ok("closed".to_string())
        } else {
            Ok("open".to_string())
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_live_pauses_when_market_closes_mid_run() {
    init_logging();

    let registry = SourceRegistry::with_synthetic(7);
    let mut config = live_config(&["AAA", "BBB"], FeedKind::UsStocks.as_str(), 100);
    config.exemptions = ExemptionFilters::default().with_states(["closed"]);

    let mut market = ClosingMarket {
        open_checks: 5,
        checks: 0,
    };
    let mut seen = Vec::new();
    let mut strategy = live_fn("record", |window| {
        seen.push(window.last().map(|b| b.symbol.clone()).unwrap_or_default());
        Ok(())
    });

    let mut runner = engine::LiveRunner::new(config);
    let summary = runner
        .run(&registry, &rate_limits(), &mut market, &mut strategy)
        .await
        .unwrap();
    drop(strategy);

    assert_eq!(seen, vec!["AAA", "BBB", "AAA", "BBB", "AAA"]);
    assert_eq!(summary.polls, 5);
    assert_eq!(summary.stop, StopReason::Exempted("market state 'closed'".to_string()));
    assert_eq!(runner.state(), LoopState::Paused);
    // The sixth check paused the loop; nothing polled after it
    assert_eq!(market.checks, 6);
}

#[tokio::test(start_paused = true)]
async fn test_live_runner_resumes_after_pause() {
    let registry = SourceRegistry::with_synthetic(7);
    let mut config = live_config(&["AAA"], FeedKind::UsStocks.as_str(), 4);
    config.exemptions = ExemptionFilters::default().with_states(["closed"]);

    let mut calls = 0;
    let mut strategy = live_fn("count", |_window| {
        calls += 1;
        Ok(())
    });

    let mut runner = engine::LiveRunner::new(config);
    let mut market = ClosingMarket {
        open_checks: 2,
        checks: 0,
    };
    let paused = runner
        .run(&registry, &rate_limits(), &mut market, &mut strategy)
        .await
        .unwrap();
    assert!(matches!(paused.stop, StopReason::Exempted(_)));
    assert_eq!(runner.state(), LoopState::Paused);

    let resumed = runner
        .run(&registry, &rate_limits(), &mut StaticMarketStatus::new("open"), &mut strategy)
        .await
        .unwrap();
    drop(strategy);

    assert_eq!(resumed.stop, StopReason::PollLimit);
    assert_eq!(resumed.polls, 4);
    assert_eq!(calls, 6);
    assert_eq!(runner.state(), LoopState::Terminated);
    assert!(runner.exempted_by().is_none());
}

#[test]
fn test_backtest_runner_reruns_same_bucket() {
    let source = FixedSource::new(vec![
        ("AAA", vec![bar("AAA", 0, 1.0), bar("AAA", 1, 2.0)]),
        ("BBB", vec![bar("BBB", 0, 10.0)]),
    ]);
    let registry = source.registry();

    let mut calls = 0;
    let mut strategy = backtest_fn("count", |_ctx, _window| {
        calls += 1;
        Ok(())
    });

    let mut runner = engine::BacktestRunner::new(backtest_config(&["AAA", "BBB"]));
    for _ in 0..3 {
        let summary = runner.run(&registry, &mut strategy).unwrap();
        assert_eq!(summary.total_bars(), 3);
        assert_eq!(runner.state(), LoopState::Terminated);
    }
    drop(strategy);

    assert_eq!(calls, 9);
}

#[tokio::test(start_paused = true)]
async fn test_live_interrupt_during_pacing() {
    let registry = SourceRegistry::with_synthetic(7);
    let mut market = StaticMarketStatus::new("open");
    let interrupt = Interrupt::new();
    let remote = interrupt.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        remote.trigger();
    });

    let mut config = live_config(&["AAA"], FeedKind::UsStocks.as_str(), 0);
    config.max_polls = None;

    let mut calls = 0;
    let mut strategy = live_fn("forever", |_window| {
        calls += 1;
        Ok(())
    });

    let outcome = engine::run_live(
        config,
        &registry,
        &rate_limits(),
        &mut market,
        &mut strategy,
        interrupt,
    )
    .await
    .unwrap();
    drop(strategy);

    assert!(outcome.is_interrupted());
    // Polls at 0, 200 and 400ms; the interrupt lands during the third pause
    assert_eq!(calls, 3);
}

#[tokio::test(start_paused = true)]
async fn test_live_feed_error_carries_symbol() {
    struct DeadFeed;

    impl LiveFeed for DeadFeed {
        fn poll(&mut self, symbol: &str) -> anyhow::Result<Bar> {
            anyhow::bail!("connection reset while polling {}", symbol)
        }
    }

    let mut registry = SourceRegistry::new();
    registry.register_live(FeedKind::UsStocks, || Box::new(DeadFeed));
    let mut market = StaticMarketStatus::new("open");

    let mut config = live_config(&["AAA"], FeedKind::UsStocks.as_str(), 3);
    config.fake_feed = false;

    let mut strategy = live_fn("noop", |_window| Ok(()));
    let result = engine::run_live(
        config,
        &registry,
        &rate_limits(),
        &mut market,
        &mut strategy,
        Interrupt::new(),
    )
    .await;

    assert!(matches!(result, Err(LoopError::DataSource { ref symbol, .. }) if symbol == "AAA"));
}
