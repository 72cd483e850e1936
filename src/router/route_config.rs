use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct Route {
    host: String,
    origin: String,
}

impl Route {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutingConfig {
    routes: Vec<Route>,
}

impl RoutingConfig {
    pub fn routes(&self) -> &Vec<Route> {
        &self.routes
    }
}

pub fn read_routing_config(file_path: &Path) -> Result<RoutingConfig> {
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("failed to read route config {}", file_path.display()))?;

    let config: RoutingConfig = serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("failed to parse route config {}", file_path.display()))?;

    Ok(config)
}

/// Immutable virtual host to origin base URL mapping. Lookups are exact,
/// case-sensitive string matches.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    origins: HashMap<String, String>,
}

impl RouteTable {
    pub fn from_routes<I, H, O>(routes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (H, O)>,
        H: Into<String>,
        O: Into<String>,
    {
        let mut origins = HashMap::new();
        for (host, origin) in routes {
            let host = host.into();
            let origin = origin.into();

            if host.is_empty() {
                bail!("route for origin `{}` has an empty host", origin);
            }
            validate_origin(&origin).with_context(|| format!("invalid origin for `{}`", host))?;

            if origins.contains_key(&host) {
                bail!("host `{}` is routed more than once", host);
            }
            origins.insert(host, origin);
        }

        Ok(RouteTable { origins })
    }

    pub fn get(&self, host: &str) -> Option<&str> {
        self.origins.get(host).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

impl TryFrom<RoutingConfig> for RouteTable {
    type Error = anyhow::Error;

    fn try_from(config: RoutingConfig) -> Result<Self> {
        RouteTable::from_routes(
            config
                .routes
                .into_iter()
                .map(|route| (route.host, route.origin)),
        )
    }
}

/// An origin is a bare `scheme://host[:port]`; request paths are appended to it verbatim.
fn validate_origin(origin: &str) -> Result<()> {
    let url = Url::parse(origin).with_context(|| format!("`{}` is not a valid URL", origin))?;

    if !matches!(url.scheme(), "http" | "https") {
        bail!("`{}` must use http or https", origin);
    }
    if url.host_str().is_none() {
        bail!("`{}` has no host", origin);
    }
    if origin.ends_with('/') || url.path() != "/" {
        bail!("`{}` must not carry a path", origin);
    }
    if url.query().is_some() || url.fragment().is_some() {
        bail!("`{}` must not carry a query or fragment", origin);
    }

    Ok(())
}
