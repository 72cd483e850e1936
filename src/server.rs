use crate::cache::CacheStore;
use crate::origin::HttpOrigin;
use crate::proxy::CachingProxy;
use crate::router::route_config::{read_routing_config, RouteTable};
use crate::router::router::Router;
use crate::server::http::handle_http_connections;
use crate::stats::{ProxyStats, StatsMessage};
use anyhow::Context;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

pub mod http;

const STATS_CHANNEL_CAPACITY: usize = 1024;

/// Fixed inputs the proxy is assembled from.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub route_config: PathBuf,
    pub cache_dir: PathBuf,
    pub origin_timeout: Option<Duration>,
    pub stats_interval: Option<Duration>,
}

/// Loads the route table, creates the cache root and builds the origin client.
pub async fn build_proxy(settings: &ProxySettings) -> anyhow::Result<CachingProxy> {
    let config = read_routing_config(&settings.route_config)?;
    let table = RouteTable::try_from(config)
        .with_context(|| format!("invalid route config {}", settings.route_config.display()))?;
    info!(
        "Loaded {} route(s) from {}",
        table.len(),
        settings.route_config.display()
    );

    let cache = CacheStore::open(&settings.cache_dir).await?;
    let origin = HttpOrigin::new(settings.origin_timeout)?;

    Ok(CachingProxy::new(Router::new(table), cache, Arc::new(origin)))
}

pub async fn spawn_proxy_server(
    listen_addr: &str,
    settings: &ProxySettings,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let proxy = Arc::new(build_proxy(settings).await?);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", listen_addr))?;
    info!("Proxy server listening on {}", listener.local_addr()?);

    run_proxy_server(listener, proxy, settings.stats_interval, shutdown_rx).await
}

/// Serves `listener` until the shutdown channel fires.
pub async fn run_proxy_server(
    listener: TcpListener,
    proxy: Arc<CachingProxy>,
    stats_interval: Option<Duration>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let (stats_tx, stats_rx) = mpsc::channel(STATS_CHANNEL_CAPACITY);
    let stats_task = spawn_stats_collector(stats_rx, stats_interval, shutdown_rx.clone());

    let mut http_task = tokio::spawn(handle_http_connections(
        listener,
        proxy,
        shutdown_rx.clone(),
        stats_tx,
    ));

    tokio::select! {
        _ = shutdown_rx.changed() => {
            info!("Shutdown signal received. Stopping HTTP task...");
        }
        result = &mut http_task => {
            if let Err(err) = result {
                error!("HTTP task ended with an error: {:?}", err);
            }
        }
    }

    if !http_task.is_finished() {
        if let Err(err) = http_task.await {
            error!("HTTP task ended with an error: {:?}", err);
        }
    }

    stats_task.await?;

    Ok(())
}

fn spawn_stats_collector(
    mut stats_rx: mpsc::Receiver<StatsMessage>,
    interval: Option<Duration>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stats = ProxyStats::new();
        let mut ticker =
            interval.map(|period| tokio::time::interval_at(Instant::now() + period, period));

        loop {
            tokio::select! {
                message = stats_rx.recv() => match message {
                    Some(message) => stats.handle_message(message),
                    None => break,
                },
                _ = next_tick(&mut ticker) => stats.print_stats(),
                _ = shutdown_rx.changed() => break,
            }
        }

        while let Ok(message) = stats_rx.try_recv() {
            stats.handle_message(message);
        }
        stats.print_stats();
    })
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
