use anyhow::Result;
use clap::Parser;
use deploy_notifier::chain::{ChainReader, RpcChainReader};
use deploy_notifier::config::Config;
use deploy_notifier::fanout::NotificationFanout;
use deploy_notifier::feed::run_block_feed;
use deploy_notifier::ingestor::EventIngestor;
use deploy_notifier::metadata::MetadataEnricher;
use deploy_notifier::monitor::{MarketCapMonitor, MonitorSettings};
use deploy_notifier::pipeline::Pipeline;
use deploy_notifier::registry::{AlertRegistry, Language, SubscriberId, SubscriberRegistry};
use deploy_notifier::rpc::RpcClient;
use deploy_notifier::telegram::TelegramNotifier;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "notifier")]
#[command(about = "Announce factory token deployments and market cap alerts", long_about = None)]
struct Cli {
    /// Chat id to opt in at startup; repeatable.
    #[arg(long = "subscriber")]
    subscribers: Vec<i64>,

    /// Language for the subscribers given on the command line.
    #[arg(long, default_value = "en")]
    language: Language,

    /// Market cap alert threshold in USD for the subscribers given on the command line.
    #[arg(long)]
    threshold: Option<u64>,

    /// Only announce tokens with at least one website, telegram or twitter link.
    #[arg(long, default_value = "false")]
    require_media_link: bool,

    #[arg(long, default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting deployment notifier");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("Factory address: {:?}", config.factory_address);
    info!("Reference asset: {:?}", config.reference_asset);
    info!(
        "RPC URLs: {} endpoint(s) configured",
        config.json_rpc_urls.len()
    );

    let client = RpcClient::new(&config.json_rpc_urls, config.request_timeout)?;
    let chain: Arc<dyn ChainReader> = Arc::new(RpcChainReader::new(
        client,
        config.factory_address,
        config.dex_factory_address,
    ));
    info!("RPC client connected");

    let subscribers = SubscriberRegistry::new();
    for id in cli.subscribers.iter().copied().map(SubscriberId) {
        subscribers.opt_in(id);
        subscribers.set_language(id, cli.language);
        subscribers.set_require_media_link(id, cli.require_media_link);
        if let Some(threshold) = cli.threshold {
            subscribers.set_threshold(id, threshold)?;
        }
    }
    info!("{} subscriber(s) registered", subscribers.len());

    let fanout = Arc::new(NotificationFanout::new(
        subscribers,
        AlertRegistry::new(),
        Arc::new(TelegramNotifier::new(&config.telegram_bot_token)),
        config.send_timeout,
    ));

    let monitor = MarketCapMonitor::new(
        chain.clone(),
        fanout.clone(),
        MonitorSettings {
            reference_asset: config.reference_asset,
            interval: config.market_cap_interval,
            max_in_flight: config.max_in_flight_queries,
            read_timeout: config.request_timeout,
        },
    );

    let pipeline = Pipeline::new(
        EventIngestor::new(chain.clone(), config.request_timeout)
            .with_blocks_per_request(config.log_blocks_per_request),
        MetadataEnricher::new(chain.clone(), config.request_timeout),
        fanout,
        monitor,
    );

    let (tx, rx) = mpsc::channel(64);
    let feed = tokio::spawn(run_block_feed(chain, config.block_poll_interval, tx));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    pipeline
        .run(rx, config.market_cap_interval, shutdown)
        .await;

    feed.abort();
    info!("Notifier stopped");
    Ok(())
}
