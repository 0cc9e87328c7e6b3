use anyhow::{bail, Context};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use wager_agent::chain::{FeeSchedule, LcdWagerClient, PaperSubmitter, SettlementSubmitter};
use wager_agent::config::Config;
use wager_agent::dashboard::{self, DashboardState};
use wager_agent::executor::{RetryPolicy, SettlementExecutor};
use wager_agent::indexer::GraphqlIndexer;
use wager_agent::notify::{DiscordWebhook, MessageStyle, Notifier};
use wager_agent::poller::{EventPoller, MatchmakeAnnouncer, WagerIntake};
use wager_agent::prices::HttpPriceSource;
use wager_agent::registry::JobRegistry;
use wager_agent::scheduler::SettlementScheduler;

const CONFIG_PATH: &str = "wager-agent.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Load config
    let config_missing = !Path::new(CONFIG_PATH).exists();
    let config = if config_missing {
        Config::from_env()
    } else {
        Config::load(Path::new(CONFIG_PATH))?
    };

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("wager-agent v{} starting", env!("CARGO_PKG_VERSION"));
    if config_missing {
        info!("no {CONFIG_PATH} found, using env-only config");
    }

    config.validate().context("configuration incomplete")?;

    if config.chain.execute {
        bail!(
            "chain.execute = true requires a signing settlement submitter; \
             only paper mode is available in this build"
        );
    }

    // --- External clients ---
    let chain_timeout = Duration::from_secs(config.chain.request_timeout_secs);
    let reader = Arc::new(LcdWagerClient::new(
        config.chain.lcd_url.clone(),
        config.chain.wager_contract.clone(),
        chain_timeout,
    )?);

    let prices = Arc::new(HttpPriceSource::new(
        config.prices.base_url.clone(),
        Duration::from_secs(config.prices.timeout_secs),
    )?);

    let indexer = Arc::new(GraphqlIndexer::new(
        config.indexer.graphql_url.clone(),
        &config.indexer.contract_type,
        &["wager", "matchmake"],
        Duration::from_secs(config.indexer.request_timeout_secs),
    )?);

    let submitter: Arc<dyn SettlementSubmitter> = Arc::new(PaperSubmitter::new(
        config.chain.wager_contract.clone(),
        config.chain.operator_address.clone(),
        FeeSchedule::fixed(config.chain.fee_denom.clone(), config.chain.gas_limit),
    ));
    warn!(
        operator = %config.chain.operator_address,
        "paper mode: settlements are logged, not broadcast"
    );

    let notifier: Option<Arc<dyn Notifier>> = if config.notifications_enabled() {
        let webhook = DiscordWebhook::new(
            config.notify.webhook_url.clone(),
            Duration::from_secs(config.notify.timeout_secs),
        )?;
        Some(Arc::new(webhook) as Arc<dyn Notifier>)
    } else {
        info!("no WEBHOOK_URL set, notifications disabled");
        None
    };

    let style = MessageStyle {
        display_name: config.notify.display_name.clone(),
        avatar_base_url: config.notify.avatar_base_url.clone(),
        matchmake_url: config.notify.matchmake_url.clone(),
        coin: config.notify.coin.clone(),
    };

    // --- Core ---
    let registry = JobRegistry::new(prices.clone());

    let mut executor = SettlementExecutor::new(
        prices.clone(),
        reader.clone(),
        submitter,
        registry.clone(),
        RetryPolicy {
            attempts: config.settlement.price_retry_attempts,
            base_delay: Duration::from_millis(config.settlement.price_retry_base_ms),
        },
        Duration::from_secs(config.settlement.submit_timeout_secs),
    );
    if let Some(notifier) = &notifier {
        executor = executor.with_notifier(notifier.clone(), style.clone());
    }

    let scheduler = SettlementScheduler::new(Arc::new(executor), config.settlement.grace());

    let intake = Arc::new(WagerIntake::new(
        reader.clone(),
        prices,
        registry.clone(),
        scheduler.clone(),
    ));
    let announcer = Arc::new(MatchmakeAnnouncer::new(reader, notifier, style));

    let poller = Arc::new(EventPoller::new(
        indexer,
        intake,
        announcer,
        config.chain.wager_contract.clone(),
        config.indexer.freshness(),
    ));
    let poll_task = poller.start(config.indexer.poll_interval());

    // --- Dashboard ---
    let dash_state = DashboardState {
        registry,
        scheduler,
    };
    let bind = config.dashboard.bind_addr.clone();
    let dash_task = tokio::spawn(async move {
        if let Err(e) = dashboard::serve(dash_state, &bind).await {
            error!(error = %e, "dashboard server error");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down...");
        }
        res = poll_task => {
            error!(result = ?res, "event poller exited");
        }
    }

    dash_task.abort();
    Ok(())
}
