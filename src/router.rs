//! Quality-gate routing after the review step.
//!
//! `decide` is the only decision point of a run. It is pure: the same
//! review outcome, retry counter and ceiling always yield the same route.

use crate::domain::ReviewResult;
use serde::Serialize;

/// Where the run goes after a successful review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// Stop and mark the run completed.
    Finish,
    /// Run draft, format and review again with `retry_count + 1`.
    Revise,
}

/// Routes an approved review to `Finish`, an exhausted retry budget to a
/// forced `Finish`, and everything else to `Revise`.
///
/// Because every `Revise` is followed by an increment of `retry_count`, a run
/// reaches `Finish` within `retry_ceiling + 1` review evaluations.
pub fn decide(review: &ReviewResult, retry_count: u32, retry_ceiling: u32) -> RouteDecision {
    if review.approved || retry_count >= retry_ceiling {
        RouteDecision::Finish
    } else {
        RouteDecision::Revise
    }
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
