//! Core types and reconciliation logic for the Docket complaint history.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! turns fetched complaint batches into append-only history rows and derives
//! the current-state view and reports from that history.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod complaint;
pub mod error;
pub mod history;
pub mod latest;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod store;
pub mod window;

pub use error::{Error, Result};
