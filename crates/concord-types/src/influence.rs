//! Influence record types
//!
//! Influence records are the substrate the influence metrics engine
//! aggregates over. One is appended at negotiation initiation and at each
//! proposal submission; its outcome is resolved exactly once when the owning
//! negotiation reaches a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{AgentId, InfluenceRecordId, NegotiationId};

/// Kind of interaction that produced the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfluenceType {
    NegotiationInitiation,
    ProposalSubmission,
}

impl InfluenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NegotiationInitiation => "negotiation_initiation",
            Self::ProposalSubmission => "proposal_submission",
        }
    }
}

/// Direction of the influence exerted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfluenceDirection {
    Positive,
    Negative,
    Neutral,
}

/// Resolution of the influence attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfluenceOutcome {
    Pending,
    Successful,
    Partial,
    Failed,
}

impl InfluenceOutcome {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One influence interaction between two agents inside a negotiation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluenceRecord {
    pub id: InfluenceRecordId,
    pub influencer: AgentId,
    pub influenced: AgentId,
    pub negotiation_id: NegotiationId,
    pub influence_type: InfluenceType,
    /// Strength of the influence exerted, within [0, 1]
    pub strength: f64,
    pub direction: InfluenceDirection,
    /// Free-form context captured at record time
    pub context: serde_json::Value,
    /// Negotiation value on the table when the record was created
    pub baseline_value: Option<f64>,
    pub outcome: InfluenceOutcome,
    pub created_at: DateTime<Utc>,
}

impl InfluenceRecord {
    pub fn new(
        influencer: AgentId,
        influenced: AgentId,
        negotiation_id: NegotiationId,
        influence_type: InfluenceType,
        strength: f64,
        direction: InfluenceDirection,
    ) -> Self {
        Self {
            id: InfluenceRecordId::new(),
            influencer,
            influenced,
            negotiation_id,
            influence_type,
            strength: strength.clamp(0.0, 1.0),
            direction,
            context: serde_json::Value::Null,
            baseline_value: None,
            outcome: InfluenceOutcome::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_baseline_value(mut self, value: f64) -> Self {
        self.baseline_value = Some(value);
        self
    }
}
