use crate::error::ProxyError;
use crate::router::route_config::RouteTable;
use log::debug;

#[derive(Debug, Clone)]
pub struct Router {
    table: RouteTable,
}

impl Router {
    pub fn new(table: RouteTable) -> Self {
        Router { table }
    }

    /// Maps the request's virtual host to its origin base URL.
    pub fn resolve(&self, host: &str) -> Result<&str, ProxyError> {
        match self.table.get(host) {
            Some(origin) => {
                debug!("Route {} to origin {}", host, origin);
                Ok(origin)
            }
            None => Err(ProxyError::UnknownHost(host.to_string())),
        }
    }
}
