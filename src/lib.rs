//! Workflow engine that turns a topic into a reviewed standard operating
//! procedure: plan, research, draft, format, review, with bounded revision.

pub mod config;
pub mod domain;
pub mod engine;
pub mod paths;
pub mod router;
pub mod service;
pub mod state;
pub mod state_machine;
pub mod steps;
pub mod structured_logger;

#[cfg(test)]
pub(crate) mod test_fixtures;
