//! In-memory storage implementations
//!
//! Back the test suite and small single-process deployments. Contention is
//! scoped per store; the proposal append and the negotiation round/status
//! update happen under one write guard so they succeed or fail together.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use concord_types::{
    AgentId, AgentProfile, ConcordError, InfluenceOutcome, InfluenceRecord, Negotiation,
    NegotiationId, NegotiationPage, NegotiationStatus, Proposal, ProposalId, Result,
};

use crate::traits::{AgentDirectory, InfluenceLedger, NegotiationStore};

// ============================================================================
// Agent Directory
// ============================================================================

/// In-memory agent directory
#[derive(Default)]
pub struct InMemoryAgentDirectory {
    agents: Arc<RwLock<HashMap<AgentId, AgentProfile>>>,
}

impl InMemoryAgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    async fn with_agent<F>(&self, id: &AgentId, f: F) -> Result<()>
    where
        F: FnOnce(&mut AgentProfile),
    {
        let mut agents = self.agents.write().await;
        let profile = agents
            .get_mut(id)
            .ok_or_else(|| ConcordError::AgentNotFound {
                agent_id: id.to_string(),
            })?;
        f(profile);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AgentDirectory for InMemoryAgentDirectory {
    async fn register(&self, profile: AgentProfile) -> Result<()> {
        self.agents
            .write()
            .await
            .insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn get(&self, id: &AgentId) -> Result<AgentProfile> {
        self.agents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ConcordError::AgentNotFound {
                agent_id: id.to_string(),
            })
    }

    async fn list_ids(&self) -> Result<Vec<AgentId>> {
        Ok(self.agents.read().await.keys().cloned().collect())
    }

    async fn write_influence_score(&self, id: &AgentId, score: f64) -> Result<()> {
        self.with_agent(id, |p| p.set_influence(score)).await
    }

    async fn write_reputation_score(&self, id: &AgentId, score: f64) -> Result<()> {
        self.with_agent(id, |p| p.set_reputation(score)).await
    }

    async fn record_started(&self, id: &AgentId, now: DateTime<Utc>) -> Result<()> {
        self.with_agent(id, |p| {
            p.total_negotiations += 1;
            p.touch(now);
        })
        .await
    }

    async fn record_closed(
        &self,
        id: &AgentId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_agent(id, |p| {
            if completed {
                p.completed_negotiations += 1;
            }
            p.touch(now);
        })
        .await
    }

    async fn touch(&self, id: &AgentId, now: DateTime<Utc>) -> Result<()> {
        self.with_agent(id, |p| p.touch(now)).await
    }
}

// ============================================================================
// Negotiation Store
// ============================================================================

#[derive(Default)]
struct NegotiationStoreInner {
    negotiations: HashMap<NegotiationId, Negotiation>,
    proposals: HashMap<ProposalId, Proposal>,
    /// Proposal ids per negotiation, in append order
    by_negotiation: HashMap<NegotiationId, Vec<ProposalId>>,
}

/// In-memory negotiation store with an append-only proposal ledger
#[derive(Default)]
pub struct InMemoryNegotiationStore {
    inner: Arc<RwLock<NegotiationStoreInner>>,
}

impl InMemoryNegotiationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn closed_error(negotiation: &Negotiation) -> ConcordError {
    ConcordError::NegotiationClosed {
        negotiation_id: negotiation.id.to_string(),
        status: negotiation.status.as_str().to_string(),
    }
}

#[async_trait::async_trait]
impl NegotiationStore for InMemoryNegotiationStore {
    async fn create(&self, negotiation: Negotiation, initial_proposal: Proposal) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .by_negotiation
            .insert(negotiation.id.clone(), vec![initial_proposal.id.clone()]);
        inner
            .proposals
            .insert(initial_proposal.id.clone(), initial_proposal);
        inner
            .negotiations
            .insert(negotiation.id.clone(), negotiation);
        Ok(())
    }

    async fn get(&self, id: &NegotiationId) -> Result<Negotiation> {
        self.inner
            .read()
            .await
            .negotiations
            .get(id)
            .cloned()
            .ok_or_else(|| ConcordError::NegotiationNotFound {
                negotiation_id: id.to_string(),
            })
    }

    async fn get_proposal(&self, id: &ProposalId) -> Result<Proposal> {
        self.inner
            .read()
            .await
            .proposals
            .get(id)
            .cloned()
            .ok_or_else(|| ConcordError::ProposalNotFound {
                proposal_id: id.to_string(),
            })
    }

    async fn proposals_for(&self, id: &NegotiationId) -> Result<Vec<Proposal>> {
        let inner = self.inner.read().await;
        let ids = inner
            .by_negotiation
            .get(id)
            .ok_or_else(|| ConcordError::NegotiationNotFound {
                negotiation_id: id.to_string(),
            })?;
        Ok(ids
            .iter()
            .filter_map(|pid| inner.proposals.get(pid).cloned())
            .collect())
    }

    async fn append_proposal(
        &self,
        expected_round: u32,
        proposal: Proposal,
        new_status: NegotiationStatus,
    ) -> Result<Negotiation> {
        let mut inner = self.inner.write().await;

        let negotiation = inner
            .negotiations
            .get(&proposal.negotiation_id)
            .ok_or_else(|| ConcordError::NegotiationNotFound {
                negotiation_id: proposal.negotiation_id.to_string(),
            })?;

        if negotiation.status.is_terminal() {
            return Err(closed_error(negotiation));
        }
        if negotiation.current_round != expected_round {
            return Err(ConcordError::RoundConflict {
                negotiation_id: negotiation.id.to_string(),
                expected: expected_round,
                actual: negotiation.current_round,
            });
        }

        let negotiation_id = proposal.negotiation_id.clone();
        inner
            .by_negotiation
            .entry(negotiation_id.clone())
            .or_default()
            .push(proposal.id.clone());

        let updated = {
            let negotiation = inner
                .negotiations
                .get_mut(&negotiation_id)
                .ok_or_else(|| ConcordError::NegotiationNotFound {
                    negotiation_id: negotiation_id.to_string(),
                })?;
            negotiation.current_value = proposal.proposed_value;
            negotiation.current_round += 1;
            negotiation.total_proposals += 1;
            negotiation.status = new_status;
            negotiation.updated_at = proposal.created_at;
            negotiation.clone()
        };
        inner.proposals.insert(proposal.id.clone(), proposal);

        Ok(updated)
    }

    async fn finalize(
        &self,
        id: &NegotiationId,
        expected_round: u32,
        status: NegotiationStatus,
        final_value: Option<f64>,
        closing_proposal: Option<Proposal>,
        now: DateTime<Utc>,
    ) -> Result<Negotiation> {
        if !status.is_terminal() {
            return Err(ConcordError::invalid_input(
                "status",
                format!("{} is not a terminal status", status.as_str()),
            ));
        }

        let mut inner = self.inner.write().await;

        let negotiation = inner
            .negotiations
            .get(id)
            .ok_or_else(|| ConcordError::NegotiationNotFound {
                negotiation_id: id.to_string(),
            })?;
        if negotiation.status.is_terminal() {
            return Err(closed_error(negotiation));
        }
        // A submission that advanced the round since the caller read state
        // invalidates the terminal decision; the caller retries with fresh
        // state.
        if negotiation.current_round != expected_round {
            return Err(ConcordError::RoundConflict {
                negotiation_id: negotiation.id.to_string(),
                expected: expected_round,
                actual: negotiation.current_round,
            });
        }

        if let Some(proposal) = closing_proposal {
            inner
                .by_negotiation
                .entry(id.clone())
                .or_default()
                .push(proposal.id.clone());
            inner.proposals.insert(proposal.id.clone(), proposal);
            if let Some(negotiation) = inner.negotiations.get_mut(id) {
                negotiation.total_proposals += 1;
            }
        }

        let negotiation = inner
            .negotiations
            .get_mut(id)
            .ok_or_else(|| ConcordError::NegotiationNotFound {
                negotiation_id: id.to_string(),
            })?;
        negotiation.status = status;
        negotiation.final_value = final_value;
        negotiation.completed_at = Some(now);
        negotiation.updated_at = now;
        Ok(negotiation.clone())
    }

    async fn list_for_agent(
        &self,
        agent: &AgentId,
        page: usize,
        page_size: usize,
    ) -> Result<NegotiationPage> {
        if page == 0 || page_size == 0 {
            return Err(ConcordError::invalid_input(
                "page",
                "page and page_size must be at least 1",
            ));
        }

        let inner = self.inner.read().await;
        let mut matching: Vec<Negotiation> = inner
            .negotiations
            .values()
            .filter(|n| n.is_participant(agent))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total_count = matching.len();
        let total_pages = total_count.div_ceil(page_size);
        let start = (page - 1) * page_size;
        let negotiations: Vec<Negotiation> = matching
            .into_iter()
            .skip(start)
            .take(page_size)
            .collect();

        Ok(NegotiationPage {
            negotiations,
            total_count,
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1 && total_count > 0,
        })
    }

    async fn active_count(&self) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner
            .negotiations
            .values()
            .filter(|n| {
                matches!(
                    n.status,
                    NegotiationStatus::Active
                        | NegotiationStatus::PendingResponse
                        | NegotiationStatus::CounterProposed
                )
            })
            .count())
    }

    async fn involving(&self, agent: &AgentId, as_of: DateTime<Utc>) -> Result<Vec<Negotiation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .negotiations
            .values()
            .filter(|n| n.is_participant(agent) && n.created_at <= as_of)
            .cloned()
            .collect())
    }

    async fn authored_proposals(
        &self,
        agent: &AgentId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Proposal>> {
        let inner = self.inner.read().await;
        Ok(inner
            .proposals
            .values()
            .filter(|p| &p.proposer == agent && p.created_at <= as_of)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Influence Ledger
// ============================================================================

/// In-memory influence ledger
#[derive(Default)]
pub struct InMemoryInfluenceLedger {
    records: Arc<RwLock<Vec<InfluenceRecord>>>,
}

impl InMemoryInfluenceLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl InfluenceLedger for InMemoryInfluenceLedger {
    async fn append(&self, record: InfluenceRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn resolve_for_negotiation(
        &self,
        id: &NegotiationId,
        outcome: InfluenceOutcome,
    ) -> Result<usize> {
        let mut records = self.records.write().await;
        let mut resolved = 0;
        for record in records
            .iter_mut()
            .filter(|r| &r.negotiation_id == id && r.outcome == InfluenceOutcome::Pending)
        {
            record.outcome = outcome;
            resolved += 1;
        }
        Ok(resolved)
    }

    async fn outward_records(
        &self,
        agent: &AgentId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<InfluenceRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| &r.influencer == agent && r.created_at <= as_of)
            .cloned()
            .collect())
    }

    async fn inbound_records(
        &self,
        agent: &AgentId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<InfluenceRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| &r.influenced == agent && r.created_at <= as_of)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_types::{
        InfluenceDirection, InfluenceType, NegotiationStyle, ProposalType, StrategyType, UserId,
    };
    use std::collections::BTreeMap;

    fn negotiation(initiator: &AgentId, responder: &AgentId) -> Negotiation {
        let now = Utc::now();
        Negotiation {
            id: NegotiationId::new(),
            initiator: initiator.clone(),
            responder: responder.clone(),
            title: "data feed".to_string(),
            description: None,
            category: None,
            status: NegotiationStatus::Initiated,
            current_round: 1,
            max_rounds: 5,
            initial_value: 500.0,
            current_value: 500.0,
            final_value: None,
            currency: "USD".to_string(),
            total_proposals: 1,
            created_at: now,
            updated_at: now,
            expires_at: Some(now + chrono::Duration::hours(24)),
            completed_at: None,
        }
    }

    fn proposal(n: &Negotiation, proposer: &AgentId, round: u32, value: f64) -> Proposal {
        Proposal {
            id: ProposalId::new(),
            negotiation_id: n.id.clone(),
            proposer: proposer.clone(),
            proposal_type: ProposalType::CounterOffer,
            round,
            proposed_value: value,
            value_change: value - n.current_value,
            justification: String::new(),
            terms: BTreeMap::new(),
            conditions: BTreeMap::new(),
            influence_score: 0.2,
            strategy_type: StrategyType::Conservative,
            confidence_level: 0.5,
            response_deadline: None,
            created_at: Utc::now(),
        }
    }

    async fn seeded_store() -> (InMemoryNegotiationStore, Negotiation, AgentId, AgentId) {
        let initiator = AgentId::new();
        let responder = AgentId::new();
        let store = InMemoryNegotiationStore::new();
        let n = negotiation(&initiator, &responder);
        let initial = proposal(&n, &initiator, 1, 500.0);
        store.create(n.clone(), initial).await.unwrap();
        (store, n, initiator, responder)
    }

    #[tokio::test]
    async fn test_append_advances_round_and_value() {
        let (store, n, _, responder) = seeded_store().await;

        let counter = proposal(&n, &responder, 1, 450.0);
        let updated = store
            .append_proposal(1, counter, NegotiationStatus::CounterProposed)
            .await
            .unwrap();

        assert_eq!(updated.current_round, 2);
        assert_eq!(updated.current_value, 450.0);
        assert_eq!(updated.total_proposals, 2);
        assert_eq!(updated.status, NegotiationStatus::CounterProposed);
    }

    #[tokio::test]
    async fn test_stale_round_is_a_conflict() {
        let (store, n, _, responder) = seeded_store().await;

        // Two submissions read the same expected round; the first advance
        // is authoritative, the second fails.
        let first = proposal(&n, &responder, 1, 450.0);
        let second = proposal(&n, &responder, 1, 475.0);

        store
            .append_proposal(1, first, NegotiationStatus::CounterProposed)
            .await
            .unwrap();
        let err = store
            .append_proposal(1, second, NegotiationStatus::CounterProposed)
            .await
            .unwrap_err();

        assert!(matches!(err, ConcordError::RoundConflict { expected: 1, actual: 2, .. }));
        assert!(err.is_retriable());
        // The first writer's state survived.
        let stored = store.get(&n.id).await.unwrap();
        assert_eq!(stored.current_value, 450.0);
        assert_eq!(stored.current_round, 2);
    }

    #[tokio::test]
    async fn test_append_to_terminal_negotiation_fails() {
        let (store, n, _, responder) = seeded_store().await;

        store
            .finalize(&n.id, 1, NegotiationStatus::Rejected, None, None, Utc::now())
            .await
            .unwrap();

        let err = store
            .append_proposal(
                1,
                proposal(&n, &responder, 1, 450.0),
                NegotiationStatus::Active,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::NegotiationClosed { .. }));
    }

    #[tokio::test]
    async fn test_finalize_sets_final_value_once() {
        let (store, n, _, _) = seeded_store().await;

        let updated = store
            .finalize(
                &n.id,
                1,
                NegotiationStatus::Completed,
                Some(450.0),
                None,
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(updated.final_value, Some(450.0));
        assert!(updated.completed_at.is_some());

        // A second finalize is rejected.
        let err = store
            .finalize(&n.id, 1, NegotiationStatus::Cancelled, None, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::NegotiationClosed { .. }));
    }

    #[tokio::test]
    async fn test_finalize_requires_terminal_status() {
        let (store, n, _, _) = seeded_store().await;
        let err = store
            .finalize(&n.id, 1, NegotiationStatus::Active, None, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_finalize_stale_round_is_a_conflict() {
        let (store, n, _, responder) = seeded_store().await;

        // An acceptance decided at round 1 races a counter that advances the
        // round first; the stale acceptance must not freeze the old value.
        store
            .append_proposal(
                1,
                proposal(&n, &responder, 1, 450.0),
                NegotiationStatus::CounterProposed,
            )
            .await
            .unwrap();

        let err = store
            .finalize(
                &n.id,
                1,
                NegotiationStatus::Completed,
                Some(500.0),
                None,
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::RoundConflict { expected: 1, actual: 2, .. }));
        assert!(err.is_retriable());

        let stored = store.get(&n.id).await.unwrap();
        assert!(!stored.status.is_terminal());
        assert_eq!(stored.current_value, 450.0);

        // A retry with fresh state goes through.
        store
            .finalize(
                &n.id,
                2,
                NegotiationStatus::Completed,
                Some(450.0),
                None,
                Utc::now(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pagination_newest_first() {
        let agent = AgentId::new();
        let other = AgentId::new();
        let store = InMemoryNegotiationStore::new();

        for i in 0..5 {
            let mut n = negotiation(&agent, &other);
            n.created_at = Utc::now() + chrono::Duration::seconds(i);
            let initial = proposal(&n, &agent, 1, 500.0);
            store.create(n, initial).await.unwrap();
        }

        let page = store.list_for_agent(&agent, 1, 2).await.unwrap();
        assert_eq!(page.negotiations.len(), 2);
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(!page.has_previous);
        assert!(page.negotiations[0].created_at >= page.negotiations[1].created_at);

        let last = store.list_for_agent(&agent, 3, 2).await.unwrap();
        assert_eq!(last.negotiations.len(), 1);
        assert!(!last.has_next);
        assert!(last.has_previous);
    }

    #[tokio::test]
    async fn test_directory_counters_and_scores() {
        let directory = InMemoryAgentDirectory::new();
        let profile = AgentProfile::new(UserId::new(), "a", NegotiationStyle::Balanced);
        let id = profile.id.clone();
        directory.register(profile).await.unwrap();

        let now = Utc::now();
        directory.record_started(&id, now).await.unwrap();
        directory.record_closed(&id, true, now).await.unwrap();
        directory.write_influence_score(&id, 1.8).await.unwrap();

        let stored = directory.get(&id).await.unwrap();
        assert_eq!(stored.total_negotiations, 1);
        assert_eq!(stored.completed_negotiations, 1);
        // Write-back clamps to [0, 1].
        assert_eq!(stored.influence_score, 1.0);
    }

    #[tokio::test]
    async fn test_ledger_resolution_is_one_shot() {
        let ledger = InMemoryInfluenceLedger::new();
        let negotiation_id = NegotiationId::new();
        let influencer = AgentId::new();
        let influenced = AgentId::new();

        for _ in 0..3 {
            ledger
                .append(InfluenceRecord::new(
                    influencer.clone(),
                    influenced.clone(),
                    negotiation_id.clone(),
                    InfluenceType::ProposalSubmission,
                    0.3,
                    InfluenceDirection::Positive,
                ))
                .await
                .unwrap();
        }

        let resolved = ledger
            .resolve_for_negotiation(&negotiation_id, InfluenceOutcome::Successful)
            .await
            .unwrap();
        assert_eq!(resolved, 3);

        // Resolution happens exactly once per record.
        let resolved_again = ledger
            .resolve_for_negotiation(&negotiation_id, InfluenceOutcome::Failed)
            .await
            .unwrap();
        assert_eq!(resolved_again, 0);

        let outward = ledger
            .outward_records(&influencer, Utc::now())
            .await
            .unwrap();
        assert!(outward
            .iter()
            .all(|r| r.outcome == InfluenceOutcome::Successful));
    }

    #[tokio::test]
    async fn test_snapshot_excludes_later_writes() {
        let (store, n, initiator, responder) = seeded_store().await;
        let as_of = Utc::now();

        // A proposal submitted after the snapshot instant is excluded.
        let mut late = proposal(&n, &responder, 1, 450.0);
        late.created_at = as_of + chrono::Duration::seconds(5);
        store
            .append_proposal(1, late, NegotiationStatus::CounterProposed)
            .await
            .unwrap();

        let authored = store.authored_proposals(&responder, as_of).await.unwrap();
        assert!(authored.is_empty());
        let authored_later = store
            .authored_proposals(&responder, as_of + chrono::Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(authored_later.len(), 1);

        let involving = store.involving(&initiator, as_of).await.unwrap();
        assert_eq!(involving.len(), 1);
    }
}
