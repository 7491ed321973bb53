//! Token feed service
//!
//! Wires the streaming ingest, the record store and the enrichment loops
//! into one startable unit used by the `tokenfeed` binary.

pub mod service;

pub use service::{ServiceSnapshot, TokenService};
