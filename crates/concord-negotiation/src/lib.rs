//! Concord Negotiation - Bilateral negotiation state machine
//!
//! Owns the negotiation lifecycle: round counting, value tracking, expiry,
//! and terminal transitions. Every proposal is scored by the strategy
//! evaluator before it is persisted; every state change flows through the
//! injected store traits, so the engine itself holds no mutable state.
//!
//! State machine:
//!
//! ```text
//! INITIATED -> ACTIVE <=> PENDING_RESPONSE <=> COUNTER_PROPOSED
//!           -> COMPLETED | REJECTED | CANCELLED | EXPIRED
//! ```

pub mod config;
pub mod engine;

pub use config::NegotiationConfig;
pub use engine::{CreateNegotiation, NegotiationEngine, RespondAction};
