//! Domain model shared by the state, the steps and the engine.

pub mod artifacts;
pub mod errors;
pub mod failure;
pub mod types;

pub use artifacts::{
    Outline, ResearchFindings, ReviewResult, SectionContent, SectionOutline, SimilarSop,
};
pub use errors::{ErrorKind, ErrorRecord, WorkflowError};
pub use failure::{FailureKind, StepFailure};
pub use types::{StepKind, TimestampUtc, WorkflowId};
