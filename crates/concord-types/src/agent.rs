//! Agent profile types
//!
//! An agent is a negotiating party (user-owned or autonomous) with a
//! reputation score and an influence score, both kept in [0, 1]. The profile
//! is owned by the agent directory; the negotiation and scoring engines read
//! it and write scores back through the directory seam.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{AgentId, UserId};

/// Negotiation style configured per agent, driving strategy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStyle {
    Aggressive,
    Balanced,
    Cooperative,
    Analytical,
    Adaptive,
}

impl Default for NegotiationStyle {
    fn default() -> Self {
        Self::Balanced
    }
}

impl NegotiationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Balanced => "balanced",
            Self::Cooperative => "cooperative",
            Self::Analytical => "analytical",
            Self::Adaptive => "adaptive",
        }
    }
}

/// Agent lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Suspended,
    Pending,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Reputation tier derived from the reputation score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationTier {
    Elite,
    Expert,
    Intermediate,
    Novice,
}

impl ReputationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elite => "elite",
            Self::Expert => "expert",
            Self::Intermediate => "intermediate",
            Self::Novice => "novice",
        }
    }
}

/// An agent profile as held by the agent directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub owner: UserId,
    pub name: String,
    pub status: AgentStatus,
    pub negotiation_style: NegotiationStyle,
    /// Longer-horizon trust score, clamped to [0, 1]
    pub reputation_score: f64,
    /// Windowed behavioral score, clamped to [0, 1]
    pub influence_score: f64,
    pub total_negotiations: u64,
    pub completed_negotiations: u64,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl AgentProfile {
    /// Create a new profile with zeroed scores and counters
    pub fn new(owner: UserId, name: impl Into<String>, style: NegotiationStyle) -> Self {
        let now = Utc::now();
        Self {
            id: AgentId::new(),
            owner,
            name: name.into(),
            status: AgentStatus::Active,
            negotiation_style: style,
            reputation_score: 0.0,
            influence_score: 0.0,
            total_negotiations: 0,
            completed_negotiations: 0,
            created_at: now,
            last_active: now,
        }
    }

    /// Set the reputation score, clamping to [0, 1]
    pub fn set_reputation(&mut self, score: f64) {
        self.reputation_score = score.clamp(0.0, 1.0);
    }

    /// Set the influence score, clamping to [0, 1]
    pub fn set_influence(&mut self, score: f64) {
        self.influence_score = score.clamp(0.0, 1.0);
    }

    /// Mark the agent as active at the given instant
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_active = now;
    }

    /// Whether the agent can take part in new negotiations
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    /// Reputation tier derived from the current score
    pub fn reputation_tier(&self) -> ReputationTier {
        if self.reputation_score >= 0.9 {
            ReputationTier::Elite
        } else if self.reputation_score >= 0.7 {
            ReputationTier::Expert
        } else if self.reputation_score >= 0.5 {
            ReputationTier::Intermediate
        } else {
            ReputationTier::Novice
        }
    }
}
