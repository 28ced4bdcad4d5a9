#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Command-line client for the iDRAC Lifecycle Controller log over Redfish.
//!
//! Layout:
//! - `cli.rs`: argument parsing and command dispatch
//! - `commands/`: capability probe, page walker, and retrieval handlers
//! - `client.rs`: session context, HTTP transport, and errors
//! - `filter.rs`: entry predicates and filter value types
//! - `output.rs`: console renderers and the artifact sink
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod commands;
pub(crate) mod filter;
pub(crate) mod output;

pub use cli::{run, run_from};
