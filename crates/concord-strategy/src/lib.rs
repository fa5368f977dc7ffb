//! Concord Strategy - Pure proposal strategy evaluation
//!
//! The evaluator is a side-effect-free function of the negotiation snapshot,
//! the proposal draft, and the proposer's profile. Given identical inputs it
//! always produces identical output, which is what makes it independently
//! testable: the negotiation engine calls it and persists the result on the
//! proposal, but the evaluator itself never touches storage or the clock.

pub mod evaluator;

pub use evaluator::*;
