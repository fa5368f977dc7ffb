//! Consistent-as-of history snapshots
//!
//! Scoring runs over an immutable snapshot taken at a fixed instant. A
//! proposal submitted while a computation is in flight is simply excluded,
//! never partially counted.

use chrono::{DateTime, Utc};
use concord_types::{AgentId, InfluenceRecord, Negotiation, Proposal, Result};

use crate::traits::{InfluenceLedger, NegotiationStore};

/// Everything the scoring engines need to know about one agent's history,
/// frozen at `as_of`
#[derive(Debug, Clone)]
pub struct AgentHistory {
    pub agent_id: AgentId,
    pub as_of: DateTime<Utc>,
    /// Negotiations in which the agent is a participant
    pub negotiations: Vec<Negotiation>,
    /// Proposals authored by the agent
    pub proposals: Vec<Proposal>,
    /// Influence records where the agent is the influencer
    pub outward: Vec<InfluenceRecord>,
    /// Influence records where the agent is the influenced party
    pub inbound: Vec<InfluenceRecord>,
}

impl AgentHistory {
    /// Capture a snapshot for one agent at a fixed instant
    pub async fn capture(
        agent_id: AgentId,
        as_of: DateTime<Utc>,
        store: &dyn NegotiationStore,
        ledger: &dyn InfluenceLedger,
    ) -> Result<Self> {
        let negotiations = store.involving(&agent_id, as_of).await?;
        let proposals = store.authored_proposals(&agent_id, as_of).await?;
        let outward = ledger.outward_records(&agent_id, as_of).await?;
        let inbound = ledger.inbound_records(&agent_id, as_of).await?;

        Ok(Self {
            agent_id,
            as_of,
            negotiations,
            proposals,
            outward,
            inbound,
        })
    }

    /// An empty history, useful for agents with no activity yet
    pub fn empty(agent_id: AgentId, as_of: DateTime<Utc>) -> Self {
        Self {
            agent_id,
            as_of,
            negotiations: Vec::new(),
            proposals: Vec::new(),
            outward: Vec::new(),
            inbound: Vec::new(),
        }
    }
}
