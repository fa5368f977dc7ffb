//! Influence metrics engine
//!
//! Computes a six-component behavioral score for one agent over a time
//! window, plus a linear-regression trend over the agent's outward influence
//! records. All component scores and the overall score stay within [0, 1].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use concord_store::{AgentDirectory, AgentHistory, InfluenceLedger, NegotiationStore};
use concord_types::{
    AgentId, InfluenceOutcome, InfluenceRecord, Negotiation, Proposal, Result, StrategyType,
};

use crate::stats::{linear_slope, mean, stdev};

/// Component weights for the overall score
const W_SUCCESS: f64 = 0.25;
const W_VALUE_CREATION: f64 = 0.20;
const W_PEER_RECOGNITION: f64 = 0.20;
const W_CONSISTENCY: f64 = 0.15;
const W_INNOVATION: f64 = 0.10;
const W_COLLABORATION: f64 = 0.10;

/// Slope thresholds for the trend classification
const TREND_SLOPE_THRESHOLD: f64 = 0.01;
/// Number of distinct strategy labels the classifier emits
const CLASSIFIER_LABEL_COUNT: f64 = 5.0;

/// Metrics engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Default aggregation window in days
    pub default_window_days: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            default_window_days: 30,
        }
    }
}

/// The six weighted behavioral components, each within [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub negotiation_success: f64,
    pub value_creation: f64,
    pub peer_recognition: f64,
    pub consistency: f64,
    pub innovation: f64,
    pub collaboration: f64,
}

impl ComponentScores {
    /// Weighted blend, clamped to [0, 1]
    pub fn overall(&self) -> f64 {
        (self.negotiation_success * W_SUCCESS
            + self.value_creation * W_VALUE_CREATION
            + self.peer_recognition * W_PEER_RECOGNITION
            + self.consistency * W_CONSISTENCY
            + self.innovation * W_INNOVATION
            + self.collaboration * W_COLLABORATION)
            .clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

/// Trend of outward influence strength over the window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    pub slope: f64,
    /// Sample-volume confidence, min(1, samples/10)
    pub confidence: f64,
    /// Mean of the most recent quartile of samples
    pub recent_average: f64,
}

impl TrendAnalysis {
    fn insufficient() -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            slope: 0.0,
            confidence: 0.0,
            recent_average: 0.0,
        }
    }
}

/// Full influence score for one agent at one instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluenceScore {
    pub agent_id: AgentId,
    pub overall: f64,
    pub components: ComponentScores,
    pub trend: TrendAnalysis,
    pub window_days: u32,
    pub as_of: DateTime<Utc>,
    /// How much to trust the score: volume and extremity blended
    pub confidence: f64,
}

/// Influence metrics engine, dependency-injected over the store seams
#[derive(Clone)]
pub struct InfluenceMetricsEngine {
    directory: Arc<dyn AgentDirectory>,
    store: Arc<dyn NegotiationStore>,
    ledger: Arc<dyn InfluenceLedger>,
    config: MetricsConfig,
}

impl InfluenceMetricsEngine {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        store: Arc<dyn NegotiationStore>,
        ledger: Arc<dyn InfluenceLedger>,
        config: MetricsConfig,
    ) -> Self {
        Self {
            directory,
            store,
            ledger,
            config,
        }
    }

    /// Compute the agent's influence score over the default window and write
    /// the overall score back to the directory
    pub async fn calculate(&self, agent_id: &AgentId) -> Result<InfluenceScore> {
        self.calculate_windowed(agent_id, self.config.default_window_days)
            .await
    }

    /// Compute over an explicit window
    pub async fn calculate_windowed(
        &self,
        agent_id: &AgentId,
        window_days: u32,
    ) -> Result<InfluenceScore> {
        // Fail fast on unknown agents before doing any aggregation work.
        self.directory.get(agent_id).await?;

        let as_of = Utc::now();
        let history =
            AgentHistory::capture(agent_id.clone(), as_of, &*self.store, &*self.ledger).await?;
        let score = score_history(&history, window_days);

        self.directory
            .write_influence_score(agent_id, score.overall)
            .await?;
        info!(
            agent_id = %agent_id,
            overall = score.overall,
            window_days,
            trend = ?score.trend.direction,
            "influence score recomputed"
        );
        Ok(score)
    }
}

/// Score a captured history over a window ending at its `as_of` instant
///
/// Pure: no storage access, no clock reads.
pub fn score_history(history: &AgentHistory, window_days: u32) -> InfluenceScore {
    let cutoff = history.as_of - Duration::days(window_days as i64);

    let negotiations: Vec<&Negotiation> = history
        .negotiations
        .iter()
        .filter(|n| n.created_at >= cutoff)
        .collect();
    let proposals: Vec<&Proposal> = history
        .proposals
        .iter()
        .filter(|p| p.created_at >= cutoff)
        .collect();
    let mut outward: Vec<&InfluenceRecord> = history
        .outward
        .iter()
        .filter(|r| r.created_at >= cutoff)
        .collect();
    outward.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let components = ComponentScores {
        negotiation_success: negotiation_success(&negotiations),
        value_creation: value_creation(&negotiations),
        peer_recognition: peer_recognition(&outward),
        consistency: consistency(&negotiations),
        innovation: innovation(&proposals),
        collaboration: collaboration(&negotiations, &proposals, &history.agent_id),
    };
    let overall = components.overall();

    // Volume and score-extremity terms, averaged.
    let volume_confidence = (negotiations.len() as f64 / 20.0).min(1.0);
    let extremity_confidence = 1.0 - 0.5 * (overall - 0.5).abs();
    let confidence = (volume_confidence + extremity_confidence) / 2.0;

    InfluenceScore {
        agent_id: history.agent_id.clone(),
        overall,
        components,
        trend: trend(&outward),
        window_days,
        as_of: history.as_of,
        confidence,
    }
}

// ============================================================================
// Components
// ============================================================================

/// Completion rate plus a small volume bonus
fn negotiation_success(negotiations: &[&Negotiation]) -> f64 {
    let total = negotiations.len();
    if total == 0 {
        return 0.0;
    }
    let completed = negotiations
        .iter()
        .filter(|n| n.status.is_successful())
        .count();
    let rate = completed as f64 / total as f64;
    let volume_bonus = (total as f64 * 0.01).min(0.2);
    (rate + volume_bonus).min(1.0)
}

/// Mean relative improvement over completed negotiations, damped by spread
fn value_creation(negotiations: &[&Negotiation]) -> f64 {
    let improvements: Vec<f64> = negotiations
        .iter()
        .filter(|n| n.status.is_successful() && n.initial_value > 0.0)
        .filter_map(|n| {
            n.final_value
                .map(|f| ((f - n.initial_value) / n.initial_value).max(0.0))
        })
        .collect();

    if improvements.is_empty() {
        return 0.0;
    }
    let consistency_bonus = 1.0 - stdev(&improvements);
    (mean(&improvements) * consistency_bonus).clamp(0.0, 1.0)
}

/// Mean strength of successful outward records plus a peer-network bonus
fn peer_recognition(outward: &[&InfluenceRecord]) -> f64 {
    let successful: Vec<&&InfluenceRecord> = outward
        .iter()
        .filter(|r| r.outcome == InfluenceOutcome::Successful)
        .collect();
    if successful.is_empty() {
        return 0.0;
    }
    let strengths: Vec<f64> = successful.iter().map(|r| r.strength).collect();
    let distinct_peers: HashSet<&AgentId> = successful.iter().map(|r| &r.influenced).collect();
    let network_bonus = (distinct_peers.len() as f64 * 0.05).min(0.3);
    (mean(&strengths) + network_bonus).min(1.0)
}

/// One minus the coefficient of variation of per-negotiation outcome ratios
///
/// Fewer than 3 resolved samples is insufficient data; the neutral 0.5 is a
/// default, not a measurement. An agent with no negotiations at all scores
/// 0 like every other component.
fn consistency(negotiations: &[&Negotiation]) -> f64 {
    if negotiations.is_empty() {
        return 0.0;
    }
    let mut resolved: Vec<&&Negotiation> = negotiations
        .iter()
        .filter(|n| n.status.is_successful() && n.initial_value > 0.0 && n.final_value.is_some())
        .collect();
    resolved.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));

    let ratios: Vec<f64> = resolved
        .iter()
        .filter_map(|n| n.final_value.map(|f| (f / n.initial_value).clamp(0.0, 2.0)))
        .collect();
    if ratios.len() < 3 {
        return 0.5;
    }
    let m = mean(&ratios);
    if m == 0.0 {
        return 0.0;
    }
    let cv = stdev(&ratios) / m;
    (1.0 - cv).clamp(0.0, 1.0)
}

/// Strategy diversity, confidence of innovative moves, and innovative share
fn innovation(proposals: &[&Proposal]) -> f64 {
    if proposals.is_empty() {
        return 0.0;
    }
    let unique: HashSet<StrategyType> = proposals.iter().map(|p| p.strategy_type).collect();
    let diversity = (unique.len() as f64 / CLASSIFIER_LABEL_COUNT).min(1.0);

    let innovative: Vec<&&Proposal> = proposals
        .iter()
        .filter(|p| p.strategy_type.is_innovative())
        .collect();
    let innovative_confidence = if innovative.is_empty() {
        0.0
    } else {
        mean(&innovative.iter().map(|p| p.confidence_level).collect::<Vec<_>>())
    };
    let innovative_ratio = innovative.len() as f64 / proposals.len() as f64;

    (0.4 * diversity + 0.4 * innovative_confidence + 0.2 * innovative_ratio).clamp(0.0, 1.0)
}

/// Share of negotiations the agent approached collaboratively, and how those
/// turned out
fn collaboration(
    negotiations: &[&Negotiation],
    proposals: &[&Proposal],
    agent_id: &AgentId,
) -> f64 {
    if negotiations.is_empty() {
        return 0.0;
    }
    let collaborative_negotiations: HashSet<_> = proposals
        .iter()
        .filter(|p| &p.proposer == agent_id && p.strategy_type == StrategyType::Collaborative)
        .map(|p| &p.negotiation_id)
        .collect();
    if collaborative_negotiations.is_empty() {
        return 0.0;
    }

    let ratio = collaborative_negotiations.len() as f64 / negotiations.len() as f64;
    let successful = negotiations
        .iter()
        .filter(|n| collaborative_negotiations.contains(&n.id) && n.status.is_successful())
        .count();
    let success_rate = successful as f64 / collaborative_negotiations.len() as f64;

    (0.6 * ratio.min(1.0) + 0.4 * success_rate).clamp(0.0, 1.0)
}

/// Linear-regression trend of outward strength over elapsed days
///
/// `outward` must be sorted by created_at ascending.
fn trend(outward: &[&InfluenceRecord]) -> TrendAnalysis {
    if outward.len() < 2 {
        return TrendAnalysis::insufficient();
    }

    let first = outward[0].created_at;
    let xs: Vec<f64> = outward
        .iter()
        .map(|r| (r.created_at - first).num_seconds() as f64 / 86_400.0)
        .collect();
    let ys: Vec<f64> = outward.iter().map(|r| r.strength).collect();

    let slope = linear_slope(&xs, &ys);
    let direction = if slope > TREND_SLOPE_THRESHOLD {
        TrendDirection::Improving
    } else if slope < -TREND_SLOPE_THRESHOLD {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    let quartile = (outward.len() / 4).max(1);
    let recent_average = mean(&ys[ys.len() - quartile..]);

    TrendAnalysis {
        direction,
        slope,
        confidence: (outward.len() as f64 / 10.0).min(1.0),
        recent_average,
    }
}
