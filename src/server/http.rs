use crate::error::ProxyError;
use crate::proxy::{CachingProxy, ResponseSource};
use crate::stats::{report, StatsMessage};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, HOST, X_CONTENT_TYPE_OPTIONS};
use http::request::Parts;
use http::{Request, Response};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::{error, info, warn};
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};

// Pause after a failed accept so descriptor exhaustion does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Source of inbound connections for [`handle_http_connections`].
#[async_trait]
pub trait Acceptor: Send + Sync + 'static {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

pub async fn handle_http_connections<L: Acceptor>(
    listener: L,
    proxy: Arc<CachingProxy>,
    mut shutdown_rx: watch::Receiver<bool>,
    stats_tx: mpsc::Sender<StatsMessage>,
) {
    let active_tasks: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>> =
        Arc::new(Mutex::new(Vec::new()));

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let socket = match accepted {
                    Ok((socket, _client_addr)) => socket,
                    Err(err) => {
                        warn!("Failed to accept connection: {}", err);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };

                let active_tasks_clone = active_tasks.clone();
                let proxy = proxy.clone();
                let stats_tx = stats_tx.clone();

                let task_handle = tokio::spawn(async move {
                    if let Err(err) = serve_connection(proxy, socket, stats_tx).await {
                        error!("Error handling HTTP connection: {:?}", err);
                    }

                    let mut tasks = active_tasks_clone.lock().await;
                    tasks.retain(|handle| !handle.is_finished());
                });

                active_tasks.lock().await.push(task_handle);
            }
            _ = shutdown_rx.changed() => {
                info!("Shutdown signal received in HTTP handler. Stopping...");

                let tasks = active_tasks.lock().await.drain(..).collect::<Vec<_>>();
                for task in tasks {
                    task.abort();
                    let _ = task.await;
                }
                break;
            }
        }
    }
}

async fn serve_connection(
    proxy: Arc<CachingProxy>,
    socket: TcpStream,
    stats_tx: mpsc::Sender<StatsMessage>,
) -> anyhow::Result<()> {
    let service = service_fn(move |request| {
        let proxy = proxy.clone();
        let stats_tx = stats_tx.clone();
        async move { Ok::<_, Infallible>(serve_request(&proxy, request, &stats_tx).await) }
    });

    http1::Builder::new()
        .serve_connection(TokioIo::new(socket), service)
        .await?;

    Ok(())
}

/// Answers one request. The method, headers and body of the inbound request
/// are not forwarded; only host, path and query take part.
pub async fn serve_request<B>(
    proxy: &CachingProxy,
    request: Request<B>,
    stats_tx: &mpsc::Sender<StatsMessage>,
) -> Response<Full<Bytes>> {
    let (parts, _) = request.into_parts();
    let host = request_host(&parts);
    let path = parts.uri.path();
    let raw_query = parts.uri.query().unwrap_or("");

    match proxy.handle(&host, path, raw_query).await {
        Ok(response) => {
            let message = match response.source {
                ResponseSource::Cache => StatsMessage::CacheHit { host },
                ResponseSource::Origin => StatsMessage::OriginFetched {
                    host,
                    bytes: response.body.len() as u64,
                },
            };
            report(stats_tx, message);
            Response::new(Full::new(response.body))
        }
        Err(err) => {
            let message = match &err {
                ProxyError::UnknownHost(_) => StatsMessage::UnknownHost { host },
                _ => StatsMessage::OriginFailed { host },
            };
            report(stats_tx, message);
            error_response(&err)
        }
    }
}

/// Host of an absolute-form request target wins over the `Host` header.
fn request_host(parts: &Parts) -> String {
    if let Some(authority) = parts.uri.authority() {
        return authority.as_str().to_string();
    }
    parts
        .headers
        .get(HOST)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default()
}

fn error_response(err: &ProxyError) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(format!("{}\n", err))));
    *response.status_mut() = err.status();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}
