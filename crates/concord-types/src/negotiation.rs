//! Negotiation lifecycle and proposal types
//!
//! A negotiation is a bilateral, multi-round exchange of proposals converging
//! on a value/terms agreement. Proposals are immutable once written and each
//! carries the strategy evaluation output produced at submission time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{AgentId, NegotiationId, ProposalId};

/// Negotiation status state machine
///
/// ```text
/// INITIATED -> ACTIVE <=> PENDING_RESPONSE <=> COUNTER_PROPOSED
///           -> { ACCEPTED | COMPLETED } | REJECTED | CANCELLED | EXPIRED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    Initiated,
    Active,
    PendingResponse,
    CounterProposed,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
    Completed,
}

impl NegotiationStatus {
    /// Terminal states freeze the negotiation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Accepted | Self::Rejected | Self::Cancelled | Self::Expired | Self::Completed
        )
    }

    /// States counting toward a successful resolution
    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Accepted | Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Active => "active",
            Self::PendingResponse => "pending_response",
            Self::CounterProposed => "counter_proposed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Completed => "completed",
        }
    }
}

/// Proposal type within a negotiation round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalType {
    InitialOffer,
    CounterOffer,
    FinalOffer,
    Acceptance,
    Rejection,
}

impl ProposalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialOffer => "initial_offer",
            Self::CounterOffer => "counter_offer",
            Self::FinalOffer => "final_offer",
            Self::Acceptance => "acceptance",
            Self::Rejection => "rejection",
        }
    }
}

/// Tactic label assigned to a proposal by the strategy evaluator
///
/// The classifier emits the first five labels; `Adaptive` exists so callers
/// can tag externally-derived tactics and is counted as innovative by the
/// influence metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Aggressive,
    Assertive,
    Analytical,
    Collaborative,
    Conservative,
    Adaptive,
}

impl StrategyType {
    /// Tactics the innovation component treats as innovative
    pub fn is_innovative(&self) -> bool {
        matches!(self, Self::Analytical | Self::Collaborative | Self::Adaptive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Assertive => "assertive",
            Self::Analytical => "analytical",
            Self::Collaborative => "collaborative",
            Self::Conservative => "conservative",
            Self::Adaptive => "adaptive",
        }
    }
}

/// A bilateral negotiation between an initiator and a responder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: NegotiationId,
    pub initiator: AgentId,
    pub responder: AgentId,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: NegotiationStatus,
    /// Current round, always within [0, max_rounds]
    pub current_round: u32,
    /// Round limit configured at creation, within [1, 50]
    pub max_rounds: u32,
    pub initial_value: f64,
    /// Value on the table; defined for every non-terminal negotiation
    pub current_value: f64,
    /// Set exactly when the negotiation completes successfully
    pub final_value: Option<f64>,
    pub currency: String,
    pub total_proposals: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Negotiation {
    /// Whether the given agent is one of the two participants
    pub fn is_participant(&self, agent: &AgentId) -> bool {
        &self.initiator == agent || &self.responder == agent
    }

    /// The other participant, if the given agent is one of the two
    pub fn counterparty_of(&self, agent: &AgentId) -> Option<&AgentId> {
        if agent == &self.initiator {
            Some(&self.responder)
        } else if agent == &self.responder {
            Some(&self.initiator)
        } else {
            None
        }
    }

    /// Whether the expiry deadline has passed at the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }

    /// Whether another proposal round is allowed
    pub fn has_rounds_left(&self) -> bool {
        self.current_round < self.max_rounds
    }
}

/// One immutable offer within a negotiation
///
/// The strategy fields (`influence_score`, `strategy_type`,
/// `confidence_level`) are produced by the strategy evaluator at submission
/// time and never change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub negotiation_id: NegotiationId,
    pub proposer: AgentId,
    pub proposal_type: ProposalType,
    /// Round number; matches the negotiation's current_round at submission
    pub round: u32,
    pub proposed_value: f64,
    /// proposed_value minus the negotiation's current_value at submission
    pub value_change: f64,
    pub justification: String,
    pub terms: BTreeMap<String, String>,
    pub conditions: BTreeMap<String, String>,
    pub influence_score: f64,
    pub strategy_type: StrategyType,
    pub confidence_level: f64,
    pub response_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One page of a negotiation listing, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationPage {
    pub negotiations: Vec<Negotiation>,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

/// A negotiation together with its full proposal history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationView {
    pub negotiation: Negotiation,
    pub proposals: Vec<Proposal>,
}
