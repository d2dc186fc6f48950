//! Lifecycle and consistency engine for a sequencing facility's
//! operations tracker.
//!
//! The crate models requests, samples, libraries, pools, lanes and
//! experiments as they move from client submission to sequencing. Its job
//! is to keep that graph honest: many-to-many links and their
//! denormalized counters always agree, status changes follow each kind's
//! state machine and cascade from the owning request, orphaned records
//! are cleaned up the moment their last reference goes, and
//! barcode/index clashes are caught before a lane is loaded.
//!
//! All writes go through [`Store::transaction`] as [`db::Write`]
//! operations; either the whole operation commits or none of it does.
//! Routing, rendering, authentication and file handling live elsewhere —
//! callers hand this core validated ids and get typed results back.

pub mod barcode;
pub mod config;
pub mod db;

pub use config::StoreOptions;
pub use db::store::Store;

use camino::Utf8Path;

/// Wires up the tracing subscriber: human-readable output for local work,
/// daily-rolling JSON files for deployments.
pub fn init_logging(log_dir: Option<&Utf8Path>) {
    use tracing::Level;
    use tracing_subscriber::{filter::Targets, prelude::*};

    let log_layer = tracing_subscriber::fmt::layer();

    match log_dir {
        None => {
            let dev_test_log_filter = Targets::new().with_target("seqtrack", Level::DEBUG);
            let log_layer = log_layer.pretty().with_filter(dev_test_log_filter);

            tracing_subscriber::registry().with(log_layer).init();
        }
        Some(path) => {
            let log_writer = tracing_appender::rolling::daily(path, "seqtrack.log");
            let prod_log_filter = Targets::new().with_target("seqtrack", Level::INFO);
            let log_layer = log_layer
                .json()
                .with_writer(log_writer)
                .with_filter(prod_log_filter);

            tracing_subscriber::registry().with(log_layer).init();
        }
    }
}
