use barloop::engine::{self, FixedRateLimit, Interrupt, RunOutcome, StaticMarketStatus};
use barloop::feed::{MarketScenario, SourceRegistry, SyntheticHistorical};
use barloop::settings::RunSettings;
use barloop::strategy::SmaCross;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// Exchange rateLimit used when pacing crypto feeds
const CRYPTO_RATE_LIMIT_MS: u64 = 1000;
const SYNTHETIC_SEED: u64 = 42;
const CUSTOM_SOURCE: &str = "synthetic_custom";

#[derive(Parser, Debug)]
#[command(name = "barloop", about = "Bar-driven backtest and live strategy runner")]
struct Cli {
    /// TOML settings file (BARLOOP__* environment variables apply on top)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay historical bars through the SMA crossover strategy
    Backtest(BacktestArgs),
    /// Poll a live feed and hand the rolling window to the strategy
    Live(LiveArgs),
}

#[derive(Args, Debug)]
struct StrategyArgs {
    /// Comma-separated symbols, e.g. AAA,BBB
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,
    #[arg(long, default_value_t = 5)]
    short: usize,
    #[arg(long, default_value_t = 20)]
    long: usize,
    #[arg(long, default_value_t = 10.0)]
    quantity: f64,
}

#[derive(Args, Debug)]
struct BacktestArgs {
    #[command(flatten)]
    strategy: StrategyArgs,
    /// Historical source id (synthetic, synthetic_uptrend, ...)
    #[arg(long)]
    source: Option<String>,
    /// Synthetic scenario (uptrend, downtrend, sideways, volatile, drawdown); overrides --source
    #[arg(long)]
    scenario: Option<String>,
    /// Opening price for --scenario series
    #[arg(long, requires = "scenario")]
    base_price: Option<f64>,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Bar interval (1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w)
    #[arg(long)]
    interval: Option<String>,
    #[arg(long)]
    capital: Option<f64>,
    #[arg(long)]
    commission: Option<f64>,
    /// Disable slippage on fills
    #[arg(long)]
    no_slippage: bool,
    /// Continue with the next symbol when one fails
    #[arg(long)]
    isolate: bool,
}

#[derive(Args, Debug)]
struct LiveArgs {
    #[command(flatten)]
    strategy: StrategyArgs,
    /// CRYPTO_live_feed, CRYPTO_live_feed_level2 or US_STOCKS_live_feed
    #[arg(long)]
    feed: Option<String>,
    #[arg(long)]
    fake_feed: bool,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    feed_delay_ms: Option<u64>,
    #[arg(long)]
    max_polls: Option<u64>,
    /// Market state reported to the exemption filters
    #[arg(long, default_value = "open")]
    market_state: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut settings = RunSettings::load(cli.config.as_deref())?;

    let interrupt = Interrupt::new();
    interrupt.trigger_on_ctrl_c();

    let mut registry = SourceRegistry::with_synthetic(SYNTHETIC_SEED);

    match cli.command {
        Command::Backtest(args) => run_backtest(&mut settings, args, &mut registry, interrupt)?,
        Command::Live(args) => run_live(&mut settings, args, &registry, interrupt).await?,
    }

    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("barloop=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn apply_symbols(settings: &mut RunSettings, args: &StrategyArgs) {
    if !args.symbols.is_empty() {
        settings.symbols = args.symbols.clone();
    }
}

fn run_backtest(
    settings: &mut RunSettings,
    args: BacktestArgs,
    registry: &mut SourceRegistry,
    interrupt: Interrupt,
) -> anyhow::Result<()> {
    apply_symbols(settings, &args.strategy);
    if let Some(source) = args.source {
        settings.backtest.source = source;
    }
    if let Some(scenario) = args.scenario {
        let scenario: MarketScenario = scenario.parse().map_err(anyhow::Error::msg)?;
        let base_price = args.base_price;
        registry.register_historical(CUSTOM_SOURCE, move || {
            let source = SyntheticHistorical::new(SYNTHETIC_SEED, scenario);
            Box::new(match base_price {
                Some(price) => source.with_base_price(price),
                None => source,
            })
        });
        settings.backtest.source = CUSTOM_SOURCE.to_string();
    }
    if let Some(start) = args.start {
        settings.backtest.start = start;
    }
    if let Some(end) = args.end {
        settings.backtest.end = end;
    }
    if let Some(interval) = args.interval {
        settings.backtest.interval = interval;
    }
    if let Some(capital) = args.capital {
        settings.context.initial_capital = capital;
    }
    if let Some(commission) = args.commission {
        settings.context.commission = commission;
    }
    if args.no_slippage {
        settings.context.enable_slippage = false;
    }
    settings.backtest.isolate_symbol_failures |= args.isolate;

    let config = settings
        .backtest_config()
        .inspect_err(|e| tracing::error!(error = %e, "Invalid backtest settings"))?;
    let mut strategy = SmaCross::new(args.strategy.short, args.strategy.long, args.strategy.quantity);

    match engine::run_backtest(config, registry, &mut strategy, interrupt)? {
        RunOutcome::Completed(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        RunOutcome::Interrupted => tracing::warn!("Backtest interrupted, no summary"),
    }

    Ok(())
}

async fn run_live(
    settings: &mut RunSettings,
    args: LiveArgs,
    registry: &SourceRegistry,
    interrupt: Interrupt,
) -> anyhow::Result<()> {
    apply_symbols(settings, &args.strategy);
    if let Some(feed) = args.feed {
        settings.live.feed = feed;
    }
    if let Some(batch_size) = args.batch_size {
        settings.live.batch_size = batch_size;
    }
    if let Some(delay) = args.feed_delay_ms {
        settings.live.feed_delay_ms = delay;
    }
    if args.max_polls.is_some() {
        settings.live.max_polls = args.max_polls;
    }
    settings.live.fake_feed |= args.fake_feed;

    let config = settings
        .live_config()
        .inspect_err(|e| tracing::error!(error = %e, "Invalid live settings"))?;
    let rate_limits = FixedRateLimit::from_millis(CRYPTO_RATE_LIMIT_MS)
        .ok_or_else(|| anyhow::anyhow!("crypto rate limit must be positive"))?;
    let mut market = StaticMarketStatus::new(args.market_state);
    let mut strategy = SmaCross::new(args.strategy.short, args.strategy.long, args.strategy.quantity);

    let outcome = engine::run_live(
        config,
        registry,
        &rate_limits,
        &mut market,
        &mut strategy,
        interrupt,
    )
    .await?;

    match outcome {
        RunOutcome::Completed(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        RunOutcome::Interrupted => {
            tracing::warn!("Live run interrupted after {} signals", strategy.signals())
        }
    }

    Ok(())
}
