//! Poll loop: watches the metadata version, rebuilds the context on change,
//! and publishes every configured template.

mod client;
mod error;
mod runtime;

pub use client::HttpMetadataClient;
pub use error::DaemonError;
pub use runtime::{
    init_tracing, run_until_signal, start_blocking, CycleReport, OutcomeStatus, PublishOutcome,
    Runner, CONNECT_RETRY, TRANSIENT_DELAY,
};
