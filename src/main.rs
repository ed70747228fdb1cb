use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use whaleflow::bot::Bot;
use whaleflow::config::Settings;
use whaleflow::exchange::BinanceFuturesClient;
use whaleflow::feed::{NitterFeed, Poller};

#[derive(Debug, Parser)]
#[command(
    name = "whaleflow",
    about = "Shorts perp futures when whale wallets move size onto exchanges",
    version
)]
struct Args {
    /// Settings file (TOML); built-in defaults apply when omitted
    #[arg(long)]
    config: Option<String>,

    /// Run exactly one poll cycle, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;

    anyhow::ensure!(
        !settings.binance.api_key.is_empty(),
        "BINANCE_API_KEY not found in environment or settings"
    );
    anyhow::ensure!(
        !settings.binance.api_secret.is_empty(),
        "BINANCE_API_SECRET not found in environment or settings"
    );

    tracing::info!("🐋 whaleflow starting");
    tracing::info!("  feed: {} every {}s", settings.feed.url, settings.feed.poll_interval_secs);
    tracing::info!(
        "  min transfer: ${:.0}, account risk {:.0}%",
        settings.trading.min_notional_usd,
        settings.trading.account_risk * 100.0
    );
    tracing::info!("  instruments:");
    let mut symbols: Vec<_> = settings.instruments.keys().collect();
    symbols.sort();
    for symbol in symbols {
        let cfg = &settings.instruments[symbol];
        tracing::info!(
            "    {}: {}x, cap ${:.0}, tp {:.2}% / sl {:.2}%",
            symbol,
            cfg.leverage,
            cfg.max_notional_usd,
            cfg.take_profit_pct * 100.0,
            cfg.stop_loss_pct * 100.0
        );
    }

    let feed = NitterFeed::new(
        &settings.feed.url,
        Duration::from_secs(settings.feed.request_timeout_secs),
    )
    .context("building feed client")?;
    let client = BinanceFuturesClient::from_settings(&settings.binance)
        .context("building venue client")?;
    let exchange = Arc::new(client);

    let mut bot = Bot::new(settings, Poller::new(Box::new(feed)), exchange)?;

    if args.once {
        let outcome = bot.run_cycle().await?;
        tracing::info!(?outcome, "single cycle complete");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, stopping after the current cycle");
            let _ = shutdown_tx.send(true);
        }
    });

    bot.run(shutdown_rx).await;
    tracing::info!("whaleflow stopped");
    Ok(())
}

fn setup_logging() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "whaleflow=info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
