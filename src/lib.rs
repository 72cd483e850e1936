//! Host-routed reverse proxy that keeps successful origin responses in a
//! flat on-disk cache keyed by a digest of the origin URL.

pub mod cache;
pub mod cli;
pub mod error;
pub mod origin;
pub mod proxy;
pub mod router;
pub mod server;
pub mod stats;
