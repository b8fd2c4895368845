//! Publication workflow for technical reports.
//!
//! A request runs an ordered list of steps. Each tick of the
//! [`Orchestrator`](orchestrator::Orchestrator) produces a new immutable
//! [`RequestState`](state_machine::RequestState) until the request reaches a
//! terminal status.

pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod request;
pub mod services;
pub mod state_machine;
pub mod ui;
