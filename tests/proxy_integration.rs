use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use origin_cache_proxy::cache::{CacheKey, CacheStore};
use origin_cache_proxy::origin::HttpOrigin;
use origin_cache_proxy::proxy::CachingProxy;
use origin_cache_proxy::router::route_config::RouteTable;
use origin_cache_proxy::router::router::Router;
use origin_cache_proxy::server::run_proxy_server;

const VIRTUAL_HOST: &str = "localhost:9000";

// Minimal HTTP origin that records request targets
struct MockOrigin {
    listener: TcpListener,
    requests: Arc<Mutex<Vec<String>>>,
    status_line: &'static str,
    body: &'static str,
}

impl MockOrigin {
    async fn new(status_line: &'static str, body: &'static str) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        Ok(Self {
            listener,
            requests: Arc::new(Mutex::new(Vec::new())),
            status_line,
            body,
        })
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.listener.local_addr().unwrap())
    }

    async fn run(self) -> Result<()> {
        loop {
            let (mut socket, _) = self.listener.accept().await?;
            let requests = self.requests.clone();
            let status_line = self.status_line;
            let body = self.body;
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let mut data = Vec::new();
                loop {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    data.extend_from_slice(&buf[..n]);
                    if data.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let head = String::from_utf8_lossy(&data);
                let Some(target) = head
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                else {
                    return;
                };
                requests.lock().unwrap().push(target.to_string());

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.ok();
                socket.shutdown().await.ok();
            });
        }
    }
}

struct ProxyHarness {
    addr: SocketAddr,
    cache_dir: TempDir,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl ProxyHarness {
    async fn spawn(origin_base: &str) -> Result<Self> {
        let cache_dir = TempDir::new()?;
        let table = RouteTable::from_routes([(VIRTUAL_HOST, origin_base)])?;
        let proxy = CachingProxy::new(
            Router::new(table),
            CacheStore::open(cache_dir.path()).await?,
            Arc::new(HttpOrigin::new(Some(Duration::from_secs(5)))?),
        );

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_proxy_server(
            listener,
            Arc::new(proxy),
            None,
            shutdown_rx,
        ));

        Ok(Self {
            addr,
            cache_dir,
            shutdown_tx,
            task,
        })
    }

    async fn get(&self, host: &str, target: &str) -> Result<(u16, String)> {
        let mut stream = TcpStream::connect(self.addr).await?;
        let request =
            format!("GET {target} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await?;

        let mut raw = Vec::new();
        timeout(Duration::from_secs(10), stream.read_to_end(&mut raw)).await??;
        let raw = String::from_utf8(raw)?;

        let (head, body) = raw
            .split_once("\r\n\r\n")
            .ok_or_else(|| anyhow!("malformed response: {raw:?}"))?;
        let status = head
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| anyhow!("missing status: {head:?}"))?
            .parse()?;
        Ok((status, body.to_string()))
    }

    fn cache_entries(&self) -> usize {
        std::fs::read_dir(self.cache_dir.path()).unwrap().count()
    }

    async fn shutdown(self) -> Result<()> {
        self.shutdown_tx.send(true)?;
        timeout(Duration::from_secs(5), self.task).await???;
        Ok(())
    }
}

#[tokio::test]
async fn caches_successful_origin_response() -> Result<()> {
    let origin = MockOrigin::new("200 OK", "hello").await?;
    let origin_base = origin.base_url();
    let requests = origin.requests.clone();
    let origin_task = tokio::spawn(origin.run());

    let harness = ProxyHarness::spawn(&origin_base).await?;

    let (status, body) = harness.get(VIRTUAL_HOST, "/a/b?x=1").await?;
    assert_eq!(status, 200);
    assert_eq!(body, "hello");
    assert_eq!(*requests.lock().unwrap(), vec!["/a/b?x=1".to_string()]);

    let key = CacheKey::for_url(&format!("{origin_base}/a/b?x=1"));
    let stored = std::fs::read_to_string(harness.cache_dir.path().join(key.as_str()))?;
    assert_eq!(stored, "{\"text\":\"hello\"}\n");

    let (status, body) = harness.get(VIRTUAL_HOST, "/a/b?x=1").await?;
    assert_eq!(status, 200);
    assert_eq!(body, "hello");
    assert_eq!(requests.lock().unwrap().len(), 1);

    harness.shutdown().await?;
    origin_task.abort();
    Ok(())
}

#[tokio::test]
async fn error_status_is_forwarded_and_refetched() -> Result<()> {
    let origin = MockOrigin::new("500 Internal Server Error", "boom").await?;
    let origin_base = origin.base_url();
    let requests = origin.requests.clone();
    let origin_task = tokio::spawn(origin.run());

    let harness = ProxyHarness::spawn(&origin_base).await?;

    for _ in 0..2 {
        let (status, body) = harness.get(VIRTUAL_HOST, "/fail").await?;
        assert_eq!(status, 500);
        assert_eq!(body, "Error from origin: 500\n");
    }
    assert_eq!(requests.lock().unwrap().len(), 2);
    assert_eq!(harness.cache_entries(), 0);

    harness.shutdown().await?;
    origin_task.abort();
    Ok(())
}

#[tokio::test]
async fn unknown_host_never_reaches_origin() -> Result<()> {
    let origin = MockOrigin::new("200 OK", "hello").await?;
    let origin_base = origin.base_url();
    let requests = origin.requests.clone();
    let origin_task = tokio::spawn(origin.run());

    let harness = ProxyHarness::spawn(&origin_base).await?;

    let (status, body) = harness.get("localhost:9001", "/a").await?;
    assert_eq!(status, 404);
    assert_eq!(body, "Unknown origin: localhost:9001\n");
    assert!(requests.lock().unwrap().is_empty());
    assert_eq!(harness.cache_entries(), 0);

    harness.shutdown().await?;
    origin_task.abort();
    Ok(())
}

#[tokio::test]
async fn unreachable_origin_is_server_error() -> Result<()> {
    // Reserve a port, then close it so connections are refused.
    let closed = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let origin_base = format!("http://{}", closed.local_addr()?);
    drop(closed);

    let harness = ProxyHarness::spawn(&origin_base).await?;

    let (status, body) = harness.get(VIRTUAL_HOST, "/a").await?;
    assert_eq!(status, 500);
    assert!(
        body.starts_with("Error fetching from origin: "),
        "unexpected body: {body:?}"
    );
    assert_eq!(harness.cache_entries(), 0);

    harness.shutdown().await?;
    Ok(())
}
