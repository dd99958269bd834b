//! HTTP inbound adapter.
//!
//! A single catch-all handler feeds every request to the dispatch core; the
//! modules here translate between Actix and the transport-neutral types.

pub mod dispatch;
pub mod error;
pub mod flash;
pub mod session_config;
pub mod state;
#[cfg(test)]
pub mod test_utils;

pub use dispatch::dispatch;
pub use error::HttpResult;
