//! Concord Store - Storage seams for the negotiation and scoring engines
//!
//! The engines never talk to a database directly; they are injected with the
//! three traits defined here:
//!
//! - [`AgentDirectory`]: agent identity, scores and activity counters
//! - [`NegotiationStore`]: negotiations plus their append-only proposal ledger
//! - [`InfluenceLedger`]: influence records, the substrate for scoring
//!
//! The in-memory implementations back the test suite and small deployments;
//! a persistence layer implements the same traits for production use.
//!
//! Scoring engines read history through [`AgentHistory`], an immutable
//! snapshot taken at a fixed `as_of` instant so concurrent writes are
//! excluded rather than partially counted.

pub mod traits;
pub mod memory;
pub mod snapshot;

pub use traits::*;
pub use memory::*;
pub use snapshot::*;
