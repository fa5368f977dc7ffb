//! Reputation engine
//!
//! Longer-horizon trust score blending completion history, influence, peer
//! signal, experience, and recency, with inactivity decay beyond 30 days.
//! The decay never drives a score below half of its pre-decay value.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use concord_store::{AgentDirectory, AgentHistory, InfluenceLedger, NegotiationStore};
use concord_types::{AgentId, AgentProfile, InfluenceOutcome, Result};

use crate::stats::mean;

/// Factor weights
const W_COMPLETION: f64 = 0.30;
const W_INFLUENCE: f64 = 0.25;
const W_PEER_RATINGS: f64 = 0.20;
const W_EXPERIENCE: f64 = 0.15;
const W_RECENT_SUCCESS: f64 = 0.10;

/// Grace period before inactivity decay starts
const DECAY_GRACE_DAYS: i64 = 30;
/// Window for the recent-success factor
const RECENT_WINDOW_DAYS: i64 = 30;

/// The five weighted reputation factors, each within [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationFactors {
    pub completion_rate: f64,
    pub avg_influence: f64,
    pub peer_ratings: f64,
    pub experience: f64,
    pub recent_success: f64,
}

impl ReputationFactors {
    /// Weighted blend before decay, clamped to [0, 1]
    pub fn raw_score(&self) -> f64 {
        (self.completion_rate * W_COMPLETION
            + self.avg_influence * W_INFLUENCE
            + self.peer_ratings * W_PEER_RATINGS
            + self.experience * W_EXPERIENCE
            + self.recent_success * W_RECENT_SUCCESS)
            .clamp(0.0, 1.0)
    }
}

/// Confidence interval around a reputation score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// One reputation recomputation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationUpdate {
    pub agent_id: AgentId,
    pub score: f64,
    pub previous_score: f64,
    pub factors: ReputationFactors,
    pub confidence_interval: ConfidenceInterval,
    pub computed_at: DateTime<Utc>,
}

/// Reputation engine, dependency-injected over the store seams
#[derive(Clone)]
pub struct ReputationEngine {
    directory: Arc<dyn AgentDirectory>,
    store: Arc<dyn NegotiationStore>,
    ledger: Arc<dyn InfluenceLedger>,
}

impl ReputationEngine {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        store: Arc<dyn NegotiationStore>,
        ledger: Arc<dyn InfluenceLedger>,
    ) -> Self {
        Self {
            directory,
            store,
            ledger,
        }
    }

    /// Recompute the agent's reputation and write it back to the directory
    pub async fn calculate(&self, agent_id: &AgentId) -> Result<ReputationUpdate> {
        let profile = self.directory.get(agent_id).await?;
        let as_of = Utc::now();
        let history =
            AgentHistory::capture(agent_id.clone(), as_of, &*self.store, &*self.ledger).await?;

        let update = score_reputation(&profile, &history);
        self.directory
            .write_reputation_score(agent_id, update.score)
            .await?;

        info!(
            agent_id = %agent_id,
            score = update.score,
            previous = update.previous_score,
            "reputation recomputed"
        );
        Ok(update)
    }
}

/// Compute a reputation update from a profile and a history snapshot
///
/// Pure: no storage access, no clock reads beyond the snapshot's `as_of`.
pub fn score_reputation(profile: &AgentProfile, history: &AgentHistory) -> ReputationUpdate {
    let as_of = history.as_of;

    let completion_rate = if profile.total_negotiations == 0 {
        0.0
    } else {
        profile.completed_negotiations as f64 / profile.total_negotiations as f64
    };

    let successful_strengths: Vec<f64> = history
        .outward
        .iter()
        .filter(|r| r.outcome == InfluenceOutcome::Successful)
        .map(|r| r.strength)
        .collect();
    let avg_influence = mean(&successful_strengths);

    let successful_inbound = history
        .inbound
        .iter()
        .filter(|r| r.outcome == InfluenceOutcome::Successful)
        .count();
    let peer_ratings = (successful_inbound as f64 / 10.0).min(1.0);

    let days_since_creation = (as_of - profile.created_at).num_days().max(0) as f64;
    let experience = 0.5 * (days_since_creation / 365.0).min(1.0)
        + 0.5 * (profile.total_negotiations as f64 / 50.0).min(1.0);

    let recent_cutoff = as_of - Duration::days(RECENT_WINDOW_DAYS);
    let recent: Vec<_> = history
        .negotiations
        .iter()
        .filter(|n| n.created_at >= recent_cutoff)
        .collect();
    let recent_success = if recent.is_empty() {
        0.0
    } else {
        recent.iter().filter(|n| n.status.is_successful()).count() as f64 / recent.len() as f64
    };

    let factors = ReputationFactors {
        completion_rate,
        avg_influence,
        peer_ratings,
        experience,
        recent_success,
    };

    let days_inactive = (as_of - profile.last_active).num_days();
    let score = (factors.raw_score() * inactivity_decay(days_inactive)).clamp(0.0, 1.0);

    let margin = 0.1 * (1.0 - (profile.total_negotiations as f64 / 30.0).min(1.0));
    let confidence_interval = ConfidenceInterval {
        lower: (score - margin).max(0.0),
        upper: (score + margin).min(1.0),
    };

    ReputationUpdate {
        agent_id: profile.id.clone(),
        score,
        previous_score: profile.reputation_score,
        factors,
        confidence_interval,
        computed_at: as_of,
    }
}

/// Inactivity decay multiplier
///
/// Kicks in after the grace period and floors at 0.5 of the raw score.
pub fn inactivity_decay(days_inactive: i64) -> f64 {
    if days_inactive <= DECAY_GRACE_DAYS {
        return 1.0;
    }
    (1.0 - 0.01 * (days_inactive - DECAY_GRACE_DAYS) as f64).max(0.5)
}
