//! State management for deployment records.

pub mod record;

pub use record::{RecordStateError, RecordStateMachine};
