//! Inbound adapters translating external requests into dispatch core calls.
//!
//! HTTP is the only transport; it lives under [`http`].

pub mod http;
