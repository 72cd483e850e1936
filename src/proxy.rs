//! Per-request pipeline: route, look up the cache, fall back to the origin.

use crate::cache::{CacheKey, CacheStore};
use crate::error::ProxyError;
use crate::origin::{Origin, OriginResponse};
use crate::router::router::Router;
use bytes::Bytes;
use log::{error, info, warn};
use std::sync::Arc;

/// Builds the URL fetched from the origin. The `?` is appended even when the
/// query is empty, so `/a` and `/a?` share a cache key.
pub fn resolve_origin_url(origin: &str, path: &str, raw_query: &str) -> String {
    format!("{}{}?{}", origin, path, raw_query)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Origin,
}

#[derive(Debug)]
pub struct ProxyResponse {
    pub source: ResponseSource,
    pub body: Bytes,
}

pub struct CachingProxy {
    router: Router,
    cache: CacheStore,
    origin: Arc<dyn Origin>,
}

impl CachingProxy {
    pub fn new(router: Router, cache: CacheStore, origin: Arc<dyn Origin>) -> Self {
        CachingProxy {
            router,
            cache,
            origin,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub async fn handle(
        &self,
        host: &str,
        path: &str,
        raw_query: &str,
    ) -> Result<ProxyResponse, ProxyError> {
        let origin_base = self.router.resolve(host)?;
        let origin_url = resolve_origin_url(origin_base, path, raw_query);
        let key = CacheKey::for_url(&origin_url);

        if let Some(entry) = self.cache.get(&key).await {
            info!("Cache hit: {}", key);
            return Ok(ProxyResponse {
                source: ResponseSource::Cache,
                body: Bytes::from(entry.into_text()),
            });
        }

        info!("Fetching from origin: {}", origin_url);
        let response = match self.origin.fetch(&origin_url).await {
            Ok(response) => response,
            Err(err) => {
                error!("Fetching {} failed: {}", origin_url, err);
                return Err(err);
            }
        };

        match response {
            OriginResponse::Ok(body) => {
                let text = String::from_utf8_lossy(&body);
                if let Err(err) = self.cache.put(&key, &text).await {
                    warn!("Serving {} uncached: {}", origin_url, err);
                }
                Ok(ProxyResponse {
                    source: ResponseSource::Origin,
                    body,
                })
            }
            OriginResponse::Status(status) => {
                warn!("Origin answered {} for {}", status, origin_url);
                Err(ProxyError::OriginError(status))
            }
        }
    }
}
