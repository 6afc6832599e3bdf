//! Run persistence (C7) and the diff engine used by the feedback endpoint.

pub mod diff;
pub mod run_store;
