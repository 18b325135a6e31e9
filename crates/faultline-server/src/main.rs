use anyhow::Result;
use chrono::{Datelike, Utc};
use faultline_alert::cache::{AlertCache, ProbingCache};
use faultline_alert::ingress::EventIngress;
use faultline_alert::silence::SilenceStore;
use faultline_notify::confirmation::ConfirmationNotifier;
use faultline_notify::resolver::WebhookResolver;
use faultline_probe::supervisor::ProbingSupervisor;
use faultline_server::duty::DutyCalendarService;
use faultline_server::quick_action::QuickActionService;
use faultline_server::state::AppState;
use faultline_server::{app, config};
use faultline_storage::memory::MemoryStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("faultline=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = Arc::new(config::load(args.get(1).map(String::as_str))?);
    faultline_common::id::init(config.machine_id, config.node_id);

    let store = Arc::new(MemoryStore::new());

    let cache = Arc::new(AlertCache::new());
    let probing_cache = Arc::new(ProbingCache::new());
    let silences = Arc::new(SilenceStore::new(store.clone()));
    let ingress = Arc::new(EventIngress::new(
        cache.clone(),
        silences.clone(),
        store.clone(),
    ));
    let supervisor = ProbingSupervisor::new(
        ingress.clone(),
        probing_cache.clone(),
        store.clone(),
        store.clone(),
    );

    let resolver = WebhookResolver::new(store.clone(), store.clone(), store.clone());
    let notifier = Arc::new(ConfirmationNotifier::new(resolver));
    let quick_actions = Arc::new(QuickActionService::new(
        cache.clone(),
        probing_cache.clone(),
        silences.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        notifier,
    ));
    let duty = Arc::new(DutyCalendarService::new(store.clone()));

    // spawn one worker per enabled probing rule
    supervisor.reload_all().await;

    // December-1 auto-extend of duty rosters; the generator itself skips
    // rosters that already have next-year rows, so re-checks are harmless
    {
        let duty = duty.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            loop {
                ticker.tick().await;
                let now = Utc::now();
                if now.month() == 12 && now.day() == 1 {
                    if let Err(e) = duty.auto_generate_next_year().await {
                        tracing::error!(error = %e, "自动生成次年值班表失败");
                    }
                }
            }
        });
    }

    let state = AppState {
        config: config.clone(),
        cache,
        probing_cache,
        silences,
        ingress,
        supervisor: supervisor.clone(),
        quick_actions,
        users: store.clone(),
        duty,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "faultline server listening");

    axum::serve(
        listener,
        app::build_http_app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    supervisor.stop_all();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
