//! Storage traits
//!
//! Writes that must be atomic are expressed as single trait methods
//! (`append_proposal`, `finalize`) so implementations can hold one write
//! section across the proposal append and the negotiation update.

use chrono::{DateTime, Utc};
use concord_types::{
    AgentId, AgentProfile, InfluenceOutcome, InfluenceRecord, Negotiation, NegotiationId,
    NegotiationPage, NegotiationStatus, Proposal, ProposalId, Result,
};

/// Agent directory: identity, scores, and activity tracking
///
/// The directory owns agent lifecycle; the core reads profiles and writes
/// scores and counters back through this seam.
#[async_trait::async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Register a new agent profile
    async fn register(&self, profile: AgentProfile) -> Result<()>;

    /// Fetch a profile
    async fn get(&self, id: &AgentId) -> Result<AgentProfile>;

    /// All known agent ids (used by the recalculation scheduler)
    async fn list_ids(&self) -> Result<Vec<AgentId>>;

    /// Write back an influence score, clamped to [0, 1]
    async fn write_influence_score(&self, id: &AgentId, score: f64) -> Result<()>;

    /// Write back a reputation score, clamped to [0, 1]
    async fn write_reputation_score(&self, id: &AgentId, score: f64) -> Result<()>;

    /// Count a newly started negotiation and mark the agent active
    async fn record_started(&self, id: &AgentId, now: DateTime<Utc>) -> Result<()>;

    /// Count a closed negotiation; `completed` marks a successful resolution
    async fn record_closed(&self, id: &AgentId, completed: bool, now: DateTime<Utc>)
        -> Result<()>;

    /// Mark the agent active at the given instant
    async fn touch(&self, id: &AgentId, now: DateTime<Utc>) -> Result<()>;
}

/// Negotiation store: negotiations plus their append-only proposal ledger
#[async_trait::async_trait]
pub trait NegotiationStore: Send + Sync {
    /// Insert a new negotiation together with its initial proposal
    async fn create(&self, negotiation: Negotiation, initial_proposal: Proposal) -> Result<()>;

    /// Fetch a negotiation
    async fn get(&self, id: &NegotiationId) -> Result<Negotiation>;

    /// Fetch a single proposal
    async fn get_proposal(&self, id: &ProposalId) -> Result<Proposal>;

    /// All proposals of a negotiation, in append order
    async fn proposals_for(&self, id: &NegotiationId) -> Result<Vec<Proposal>>;

    /// Append a proposal and advance the round, atomically
    ///
    /// Fails with `RoundConflict` when the stored round no longer matches
    /// `expected_round`: the first writer's advance is authoritative and the
    /// second submission must be retried with fresh state.
    async fn append_proposal(
        &self,
        expected_round: u32,
        proposal: Proposal,
        new_status: NegotiationStatus,
    ) -> Result<Negotiation>;

    /// Freeze the negotiation in a terminal state, atomically
    ///
    /// Carries the same optimistic guard as `append_proposal`: fails with
    /// `RoundConflict` when the stored round no longer matches
    /// `expected_round`, so an acceptance racing a concurrent submission
    /// cannot freeze a stale value. Optionally records a closing proposal
    /// (acceptance/rejection); closing proposals do not advance the round.
    async fn finalize(
        &self,
        id: &NegotiationId,
        expected_round: u32,
        status: NegotiationStatus,
        final_value: Option<f64>,
        closing_proposal: Option<Proposal>,
        now: DateTime<Utc>,
    ) -> Result<Negotiation>;

    /// One page of an agent's negotiations, newest first; `page` is 1-based
    async fn list_for_agent(
        &self,
        agent: &AgentId,
        page: usize,
        page_size: usize,
    ) -> Result<NegotiationPage>;

    /// Count of negotiations currently in play
    async fn active_count(&self) -> Result<usize>;

    /// Negotiations touching the agent, created at or before `as_of`
    async fn involving(&self, agent: &AgentId, as_of: DateTime<Utc>) -> Result<Vec<Negotiation>>;

    /// Proposals authored by the agent, created at or before `as_of`
    async fn authored_proposals(
        &self,
        agent: &AgentId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Proposal>>;
}

/// Influence ledger: append-only influence records with one-shot resolution
#[async_trait::async_trait]
pub trait InfluenceLedger: Send + Sync {
    /// Append a new record
    async fn append(&self, record: InfluenceRecord) -> Result<()>;

    /// Resolve every pending record of a negotiation to the given outcome
    ///
    /// Records resolve at most once; already-resolved records are left
    /// untouched. Returns the number of records resolved.
    async fn resolve_for_negotiation(
        &self,
        id: &NegotiationId,
        outcome: InfluenceOutcome,
    ) -> Result<usize>;

    /// Records where the agent is the influencer, created at or before `as_of`
    async fn outward_records(
        &self,
        agent: &AgentId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<InfluenceRecord>>;

    /// Records where the agent is the influenced party, created at or before `as_of`
    async fn inbound_records(
        &self,
        agent: &AgentId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<InfluenceRecord>>;
}
