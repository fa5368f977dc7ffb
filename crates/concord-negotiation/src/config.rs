//! Engine configuration

use serde::{Deserialize, Serialize};

/// Negotiation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Upper bound accepted for a negotiation's max_rounds
    pub max_rounds_limit: u32,
    /// Upper bound accepted for a negotiation's duration
    pub max_duration_hours: i64,
    /// Hours a counterparty has to respond to a proposal
    pub response_deadline_hours: i64,
    /// Strength recorded for the initiation influence record
    pub initiation_influence_strength: f64,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_rounds_limit: 50,
            max_duration_hours: 24 * 365,
            response_deadline_hours: 24,
            initiation_influence_strength: 0.1,
        }
    }
}
