//! Query orchestration for the vehicle catalog: remote lookups, per-make model
//! fan-out, and the selection state machine that sequences them.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod session;

pub use aggregator::ModelAggregator;
pub use catalog::{CatalogClient, HttpCatalogClient};
pub use config::{load_settings, CatalogSettings};
pub use error::{AggregationError, FailureKind, FetchFailure, RemoteFetchError, SelectionError};
pub use session::{
    CatalogSession, FailureContext, LoadOutcome, SearchOutcome, SelectionState, SessionEvent,
    SessionFailure, SessionPhase, SessionSnapshot,
};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
