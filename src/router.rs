pub mod route_config;
#[allow(clippy::module_inception)]
pub mod router;
