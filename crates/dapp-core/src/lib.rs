//! Core orchestration for the dApp toolkit.
//!
//! Ties the service crates together: the deployment orchestrator with its
//! dependency planner and background verification, the record state machine,
//! the transaction dispatcher for wallet sessions, chain read helpers, and the
//! builder that assembles all of them from configuration.

pub mod builder;
pub mod deployment;
pub mod dispatch;
pub mod reads;
pub mod state;

pub use builder::{BuilderError, DappBuilder};
pub use deployment::{DeployError, DeploymentOrchestrator, OrchestratorSettings};
pub use dispatch::{DispatchError, Dispatcher, TransactionOutcome, TxParams};
pub use reads::{Balance, ChainHead, ChainReader};
pub use state::{RecordStateError, RecordStateMachine};
