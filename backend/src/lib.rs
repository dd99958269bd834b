//! Wiking: a small CMS dispatch core with its HTTP and PostgreSQL adapters.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;

pub use config::WikingSettings;
pub use middleware::Trace;
