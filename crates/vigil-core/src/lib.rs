//! Domain model, workflow state machine, risk scorer, and agents for the
//! counterparty risk analysis orchestration engine.
//!
//! This crate defines contracts only (see [`traits`]) for everything the
//! workflow depends on outside its own pure logic — HTTP clients, LLM
//! providers, and storage are implemented in sibling crates and injected
//! through [`workflow::WorkflowDeps`], keeping this crate free of any
//! concrete provider or storage dependency.

pub mod agents;
pub mod error;
pub mod events;
pub mod inn;
pub mod model;
pub mod scorer;
pub mod sentiment;
pub mod traits;
pub mod workflow;

pub use error::{ErrorKind, ErrorPayload, Result, VigilError};
