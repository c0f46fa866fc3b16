//! Passive subdomain discovery and verification.
//!
//! Candidates are aggregated from passive intelligence sources, resolved
//! over DNS against a wildcard baseline, probed over HTTP(S), and merged
//! into one sorted record set per run.

mod candidates;
mod dns;
mod error;
mod model;
mod modules;
mod options;
mod probe;
mod scan;
mod wildcard;

pub use error::{Error, Result};
pub use model::{ensure_dir, export_to_json, export_to_markdown};
pub use model::{FinalRecord, ProbeFailure};
pub use modules::{display_all, source_names};
pub use options::EnumerateOptions;
pub use scan::{enumerate, enumerate_with_cancel};

// cancellation handle for `enumerate_with_cancel`
pub use tokio_util::sync::CancellationToken;
