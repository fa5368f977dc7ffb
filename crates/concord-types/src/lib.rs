//! Concord Types - Canonical domain types for the agent negotiation broker
//!
//! This crate contains all foundational types for Concord with zero dependencies
//! on other concord crates. It defines the complete type system for:
//!
//! - Identity types (AgentId, NegotiationId, ProposalId, etc.)
//! - Agent profiles with reputation and influence scores
//! - Negotiation lifecycle, proposals and strategy labels
//! - Influence records (the substrate for behavioral scoring)
//! - Error taxonomy
//!
//! # Architectural Invariants
//!
//! These types support the core Concord invariants:
//!
//! 1. Reputation and influence scores are always clamped to [0, 1]
//! 2. An agent never negotiates with itself
//! 3. Proposals are immutable once written - corrections are new proposals
//! 4. Terminal negotiations are frozen; final_value exists iff completed

pub mod identity;
pub mod agent;
pub mod negotiation;
pub mod influence;
pub mod error;

pub use identity::*;
pub use agent::*;
pub use negotiation::*;
pub use influence::*;
pub use error::*;

/// Version of the Concord types schema
pub const TYPES_VERSION: &str = "0.1.0";
