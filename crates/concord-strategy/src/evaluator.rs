//! Strategy evaluation
//!
//! Scores one proposal draft against the negotiation's current state and the
//! proposer's profile. All inputs are passed in, including the evaluation
//! instant, so the function is deterministic and reproducible.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use concord_types::{AgentProfile, Negotiation, NegotiationStyle, StrategyType};

/// Justification length at which richness saturates
const JUSTIFICATION_SATURATION_LEN: f64 = 500.0;
/// Richness contribution per term entry
const TERM_RICHNESS_STEP: f64 = 0.1;
/// Bounds for the combined strategy modifier
const MODIFIER_MIN: f64 = 0.1;
const MODIFIER_MAX: f64 = 2.0;
/// Bounds for the confidence level
const CONFIDENCE_MIN: f64 = 0.1;
const CONFIDENCE_MAX: f64 = 1.0;

/// Fixed weight triple per negotiation style
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleWeights {
    pub pressure: f64,
    pub concession: f64,
    pub time_factor: f64,
}

/// Weight table: one hand-tuned triple per style
pub fn style_weights(style: NegotiationStyle) -> StyleWeights {
    match style {
        NegotiationStyle::Aggressive => StyleWeights {
            pressure: 0.8,
            concession: 0.2,
            time_factor: 0.9,
        },
        NegotiationStyle::Balanced => StyleWeights {
            pressure: 0.5,
            concession: 0.5,
            time_factor: 0.6,
        },
        NegotiationStyle::Cooperative => StyleWeights {
            pressure: 0.3,
            concession: 0.7,
            time_factor: 0.4,
        },
        NegotiationStyle::Analytical => StyleWeights {
            pressure: 0.4,
            concession: 0.4,
            time_factor: 0.2,
        },
        NegotiationStyle::Adaptive => StyleWeights {
            pressure: 0.6,
            concession: 0.4,
            time_factor: 0.5,
        },
    }
}

/// A proposal as drafted by the caller, before it is scored and persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub proposed_value: f64,
    pub justification: String,
    pub terms: BTreeMap<String, String>,
    pub conditions: BTreeMap<String, String>,
}

/// Output of one strategy evaluation
///
/// The intermediate factors are carried alongside the three persisted fields
/// so callers can explain how a score came to be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAnalysis {
    /// Influence exerted by this proposal, within [0, 1]
    pub influence_score: f64,
    /// Tactic classification
    pub strategy_type: StrategyType,
    /// Proposer's confidence in the move, within [0.1, 1.0]
    pub confidence_level: f64,
    /// Relative change against the value currently on the table
    pub value_change_pct: f64,
    /// Combined justification/terms modifier, within [0.1, 2.0]
    pub strategy_modifier: f64,
    /// Deadline pressure factor, within [0.8, 1.5]
    pub time_pressure: f64,
}

/// Evaluate a proposal draft against the current negotiation state
///
/// Pure and deterministic: identical `(negotiation, draft, proposer, now)`
/// always yields an identical analysis.
pub fn evaluate(
    negotiation: &Negotiation,
    draft: &ProposalDraft,
    proposer: &AgentProfile,
    now: DateTime<Utc>,
) -> StrategyAnalysis {
    let value_change_pct = if negotiation.current_value != 0.0 {
        (draft.proposed_value - negotiation.current_value) / negotiation.current_value
    } else {
        0.0
    };

    let weights = style_weights(proposer.negotiation_style);
    let strategy_modifier = strategy_modifier(draft, weights);
    let time_pressure = time_pressure(negotiation, now);

    let influence_score =
        (proposer.influence_score * strategy_modifier * time_pressure).min(1.0);

    let strategy_type = classify_strategy(value_change_pct, draft);
    let confidence_level =
        confidence_level(proposer, value_change_pct, negotiation.current_round);

    StrategyAnalysis {
        influence_score,
        strategy_type,
        confidence_level,
        value_change_pct,
        strategy_modifier,
        time_pressure,
    }
}

/// Combined effectiveness modifier from justification depth and term richness
fn strategy_modifier(draft: &ProposalDraft, weights: StyleWeights) -> f64 {
    let justification_richness =
        (draft.justification.len() as f64 / JUSTIFICATION_SATURATION_LEN).min(1.0);
    let terms_richness = (draft.terms.len() as f64 * TERM_RICHNESS_STEP).min(1.0);

    let modifier =
        justification_richness * weights.pressure + terms_richness * weights.concession;
    modifier.clamp(MODIFIER_MIN, MODIFIER_MAX)
}

/// Deadline pressure by remaining-time ratio
fn time_pressure(negotiation: &Negotiation, now: DateTime<Utc>) -> f64 {
    let Some(expires_at) = negotiation.expires_at else {
        return 1.0;
    };

    if now >= expires_at {
        return 1.5;
    }

    let total = (expires_at - negotiation.created_at).num_seconds() as f64;
    if total <= 0.0 {
        return 1.5;
    }

    let remaining_ratio = (expires_at - now).num_seconds() as f64 / total;
    if remaining_ratio <= 0.1 {
        1.4
    } else if remaining_ratio <= 0.3 {
        1.2
    } else if remaining_ratio <= 0.7 {
        1.0
    } else {
        0.8
    }
}

/// Tactic classification from the shape of the move
fn classify_strategy(value_change_pct: f64, draft: &ProposalDraft) -> StrategyType {
    if value_change_pct.abs() > 0.2 {
        StrategyType::Aggressive
    } else if value_change_pct.abs() > 0.1 {
        StrategyType::Assertive
    } else if draft.justification.len() > 200 {
        StrategyType::Analytical
    } else if draft.terms.len() > 3 {
        StrategyType::Collaborative
    } else {
        StrategyType::Conservative
    }
}

/// Confidence from reputation, boldness of the move, and round progression
fn confidence_level(proposer: &AgentProfile, value_change_pct: f64, current_round: u32) -> f64 {
    let boldness_factor = 1.0 - value_change_pct.abs() * 0.5;
    let round_factor = (1.0 - current_round as f64 * 0.1).max(0.5);

    (proposer.reputation_score * boldness_factor * round_factor)
        .clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}
