//! dns-relay — a TCP-to-UDP DNS transport bridge.
//!
//! Accepts DNS-over-TCP queries on one or more local addresses and forwards
//! each to a single upstream resolver over UDP, returning the resolver's
//! answer to the originating TCP client. Treats every message as an opaque,
//! length-prefixed byte string; it never parses, caches, or rewrites DNS
//! content.
//!
//! # Architecture
//!
//! - [`relay`] - the per-connection TCP↔UDP state machine (the core)
//! - [`listener`] - accepts connections and enforces the admission policy
//! - [`supervisor`] - process-wide startup, shutdown, and signal handling
//! - [`admission`] - the global concurrent-connection cap
//! - [`config`] - CLI surface and numeric address resolution
//! - [`privilege`] - privilege drop and daemonization
//! - [`constants`] - wire and policy constants
//! - [`error`] - the startup/per-connection error taxonomy

pub mod admission;
pub mod config;
pub mod constants;
pub mod error;
pub mod listener;
pub mod privilege;
pub mod relay;
pub mod supervisor;
