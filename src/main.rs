//! Threatdeck headless dashboard runner.
//! Stands in for the browser view: wires identity, store and scheduler,
//! then polls the aggregation backend and logs a summary per tick.
//!
//! See `README.md` for quickstart.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use threatdeck::aggregate::AggregateView;
use threatdeck::briefings::SavedBriefingsStore;
use threatdeck::client::{ApiClient, HttpApiClient};
use threatdeck::config::DashboardConfig;
use threatdeck::identity::ClientIdentity;
use threatdeck::scheduler::{spawn_saved_refresh, RefreshSchedulerCfg};
use threatdeck::storage::{FileStore, LocalStore};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("threatdeck=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = DashboardConfig::load()?;
    tracing::info!(
        api = %cfg.api_base_url,
        state = %cfg.state_path,
        "starting threatdeck"
    );

    let cache: Arc<dyn LocalStore> = Arc::new(FileStore::open(&cfg.state_path)?);
    let api: Arc<dyn ApiClient> = Arc::new(HttpApiClient::new(
        cfg.api_base_url.clone(),
        Duration::from_secs(cfg.request_timeout_secs),
    )?);

    let identity = ClientIdentity::new(cache.clone());
    let store = SavedBriefingsStore::initialize(&identity, api.clone(), cache.clone()).await?;
    tracing::info!(client_id = store.client_id(), saved = store.saved().len(), "store ready");

    let _refresh = spawn_saved_refresh(
        store.clone(),
        RefreshSchedulerCfg {
            interval_secs: cfg.saved_refresh_interval_secs,
        },
    );

    // Kick the ingestion pipeline once; results are re-read on the poll
    // below, never awaited here.
    if let Err(e) = api.trigger_live_fetch().await {
        tracing::warn!(error = ?e, "live fetch trigger failed");
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(
        cfg.results_poll_interval_secs.max(1),
    ));
    loop {
        ticker.tick().await;

        let payload = api.fetch_results().await;
        if let Some(err) = &payload.error {
            tracing::warn!(error = %err, "results degraded");
        }
        let view = AggregateView::from_payload(&payload, Utc::now());
        tracing::info!(
            feeds = payload.feeds.len(),
            iocs = payload.iocs.len(),
            top_source = view.top_sources.first().map(|s| s.name.as_str()).unwrap_or("-"),
            high_risk = view.high_risk.len(),
            topics = view.topics.len(),
            saved = store.saved().len(),
            "dashboard tick"
        );
    }
}
