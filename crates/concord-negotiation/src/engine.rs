//! Negotiation engine
//!
//! Each operation runs to completion within one call. The proposal append
//! and the round/status advance are a single atomic store write; a stale
//! expected round surfaces as a retriable `RoundConflict`. Expiry is checked
//! lazily on read and on every mutation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use concord_store::{AgentDirectory, InfluenceLedger, NegotiationStore};
use concord_strategy::{evaluate, ProposalDraft};
use concord_types::{
    AgentId, ConcordError, InfluenceDirection, InfluenceOutcome, InfluenceRecord, InfluenceType,
    Negotiation, NegotiationId, NegotiationPage, NegotiationStatus, NegotiationView, Proposal,
    ProposalId, ProposalType, Result,
};

use crate::config::NegotiationConfig;

/// Request to open a new negotiation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNegotiation {
    pub initiator: AgentId,
    pub responder: AgentId,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub initial_value: f64,
    pub currency: String,
    pub max_rounds: u32,
    pub duration_hours: i64,
}

/// Action taken in response to a pending proposal
#[derive(Debug, Clone)]
pub enum RespondAction {
    Accept,
    Reject,
    Counter(ProposalDraft),
}

/// The negotiation state machine, dependency-injected over the store seams
#[derive(Clone)]
pub struct NegotiationEngine {
    directory: Arc<dyn AgentDirectory>,
    store: Arc<dyn NegotiationStore>,
    ledger: Arc<dyn InfluenceLedger>,
    config: NegotiationConfig,
}

/// Influence outcome implied by a terminal negotiation status
fn outcome_for(status: NegotiationStatus) -> InfluenceOutcome {
    match status {
        NegotiationStatus::Accepted | NegotiationStatus::Completed => InfluenceOutcome::Successful,
        NegotiationStatus::Expired => InfluenceOutcome::Partial,
        _ => InfluenceOutcome::Failed,
    }
}

fn direction_for(value_change: f64) -> InfluenceDirection {
    if value_change > 0.0 {
        InfluenceDirection::Positive
    } else if value_change < 0.0 {
        InfluenceDirection::Negative
    } else {
        InfluenceDirection::Neutral
    }
}

impl NegotiationEngine {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        store: Arc<dyn NegotiationStore>,
        ledger: Arc<dyn InfluenceLedger>,
        config: NegotiationConfig,
    ) -> Self {
        Self {
            directory,
            store,
            ledger,
            config,
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Open a new negotiation and record its initial offer
    pub async fn create(&self, request: CreateNegotiation) -> Result<Negotiation> {
        self.create_at(request, Utc::now()).await
    }

    /// Submit a counter-proposal into an open negotiation
    pub async fn submit_proposal(
        &self,
        negotiation_id: &NegotiationId,
        proposer: &AgentId,
        draft: ProposalDraft,
    ) -> Result<Proposal> {
        self.submit_at(negotiation_id, proposer, draft, None, Utc::now())
            .await
    }

    /// Respond to the most recent proposal: accept, reject, or counter
    pub async fn respond(
        &self,
        proposal_id: &ProposalId,
        responder: &AgentId,
        action: RespondAction,
    ) -> Result<Negotiation> {
        self.respond_at(proposal_id, responder, action, Utc::now())
            .await
    }

    /// Cancel a non-terminal negotiation; either participant may cancel
    pub async fn cancel(
        &self,
        negotiation_id: &NegotiationId,
        requester: &AgentId,
    ) -> Result<Negotiation> {
        self.cancel_at(negotiation_id, requester, Utc::now()).await
    }

    /// Fetch a negotiation with its full proposal history
    ///
    /// Only participants may read a negotiation.
    pub async fn get(
        &self,
        negotiation_id: &NegotiationId,
        requester: &AgentId,
    ) -> Result<NegotiationView> {
        self.get_at(negotiation_id, requester, Utc::now()).await
    }

    /// One page of the agent's negotiations, newest first
    pub async fn list_for_agent(
        &self,
        agent: &AgentId,
        page: usize,
        page_size: usize,
    ) -> Result<NegotiationPage> {
        self.store.list_for_agent(agent, page, page_size).await
    }

    /// Count of negotiations currently in play
    pub async fn active_count(&self) -> Result<usize> {
        self.store.active_count().await
    }

    // ========================================================================
    // Clock-explicit implementations
    // ========================================================================

    async fn create_at(
        &self,
        request: CreateNegotiation,
        now: DateTime<Utc>,
    ) -> Result<Negotiation> {
        if request.initiator == request.responder {
            return Err(ConcordError::SelfNegotiation {
                agent_id: request.initiator.to_string(),
            });
        }
        if request.initial_value <= 0.0 {
            return Err(ConcordError::invalid_input(
                "initial_value",
                "must be positive",
            ));
        }
        if request.max_rounds == 0 || request.max_rounds > self.config.max_rounds_limit {
            return Err(ConcordError::invalid_input(
                "max_rounds",
                format!("must be within [1, {}]", self.config.max_rounds_limit),
            ));
        }
        if request.duration_hours <= 0 || request.duration_hours > self.config.max_duration_hours {
            return Err(ConcordError::invalid_input(
                "duration_hours",
                format!("must be within [1, {}]", self.config.max_duration_hours),
            ));
        }

        let initiator = self.directory.get(&request.initiator).await?;
        // Responder existence is checked up front so the failure is a clean
        // not-found rather than a half-created negotiation.
        self.directory.get(&request.responder).await?;

        let negotiation = Negotiation {
            id: NegotiationId::new(),
            initiator: request.initiator.clone(),
            responder: request.responder.clone(),
            title: request.title,
            description: request.description,
            category: request.category,
            status: NegotiationStatus::Initiated,
            current_round: 1,
            max_rounds: request.max_rounds,
            initial_value: request.initial_value,
            current_value: request.initial_value,
            final_value: None,
            currency: request.currency,
            total_proposals: 1,
            created_at: now,
            updated_at: now,
            expires_at: Some(now + Duration::hours(request.duration_hours)),
            completed_at: None,
        };

        let draft = ProposalDraft {
            proposed_value: request.initial_value,
            ..Default::default()
        };
        let analysis = evaluate(&negotiation, &draft, &initiator, now);

        let initial_proposal = Proposal {
            id: ProposalId::new(),
            negotiation_id: negotiation.id.clone(),
            proposer: request.initiator.clone(),
            proposal_type: ProposalType::InitialOffer,
            round: 1,
            proposed_value: request.initial_value,
            value_change: 0.0,
            justification: draft.justification,
            terms: draft.terms,
            conditions: draft.conditions,
            influence_score: analysis.influence_score,
            strategy_type: analysis.strategy_type,
            confidence_level: analysis.confidence_level,
            response_deadline: Some(now + Duration::hours(self.config.response_deadline_hours)),
            created_at: now,
        };

        self.store
            .create(negotiation.clone(), initial_proposal)
            .await?;

        let mut record = InfluenceRecord::new(
            request.initiator.clone(),
            request.responder.clone(),
            negotiation.id.clone(),
            InfluenceType::NegotiationInitiation,
            self.config.initiation_influence_strength,
            InfluenceDirection::Neutral,
        )
        .with_baseline_value(request.initial_value)
        .with_context(serde_json::json!({ "action": "negotiation_initiation" }));
        record.created_at = now;
        self.ledger.append(record).await?;

        self.directory.record_started(&request.initiator, now).await?;
        self.directory.record_started(&request.responder, now).await?;

        info!(
            negotiation_id = %negotiation.id,
            initiator = %negotiation.initiator,
            responder = %negotiation.responder,
            initial_value = negotiation.initial_value,
            max_rounds = negotiation.max_rounds,
            "negotiation created"
        );
        Ok(negotiation)
    }

    async fn submit_at(
        &self,
        negotiation_id: &NegotiationId,
        proposer: &AgentId,
        draft: ProposalDraft,
        status_override: Option<NegotiationStatus>,
        now: DateTime<Utc>,
    ) -> Result<Proposal> {
        if draft.proposed_value <= 0.0 {
            return Err(ConcordError::invalid_input(
                "proposed_value",
                "must be positive",
            ));
        }

        let negotiation = self.load_live(negotiation_id, now).await?;

        if !negotiation.is_participant(proposer) {
            return Err(ConcordError::NotAParticipant {
                agent_id: proposer.to_string(),
                negotiation_id: negotiation.id.to_string(),
            });
        }
        if !negotiation.has_rounds_left() {
            return Err(ConcordError::RoundsExhausted {
                negotiation_id: negotiation.id.to_string(),
                max_rounds: negotiation.max_rounds,
            });
        }

        let profile = self.directory.get(proposer).await?;
        let analysis = evaluate(&negotiation, &draft, &profile, now);

        // The last permitted submission is a final offer.
        let proposal_type = if negotiation.current_round + 1 >= negotiation.max_rounds {
            ProposalType::FinalOffer
        } else {
            ProposalType::CounterOffer
        };
        let new_status = status_override.unwrap_or(if proposer == &negotiation.initiator {
            NegotiationStatus::PendingResponse
        } else {
            NegotiationStatus::Active
        });

        let value_change = draft.proposed_value - negotiation.current_value;
        let proposal = Proposal {
            id: ProposalId::new(),
            negotiation_id: negotiation.id.clone(),
            proposer: proposer.clone(),
            proposal_type,
            round: negotiation.current_round,
            proposed_value: draft.proposed_value,
            value_change,
            justification: draft.justification,
            terms: draft.terms,
            conditions: draft.conditions,
            influence_score: analysis.influence_score,
            strategy_type: analysis.strategy_type,
            confidence_level: analysis.confidence_level,
            response_deadline: Some(now + Duration::hours(self.config.response_deadline_hours)),
            created_at: now,
        };
        let proposal_id = proposal.id.clone();

        // Atomic append + round advance; a concurrent submission that read
        // the same round loses here with a retriable conflict.
        self.store
            .append_proposal(negotiation.current_round, proposal, new_status)
            .await?;

        let counterparty = negotiation
            .counterparty_of(proposer)
            .ok_or_else(|| ConcordError::NotAParticipant {
                agent_id: proposer.to_string(),
                negotiation_id: negotiation.id.to_string(),
            })?
            .clone();

        let mut record = InfluenceRecord::new(
            proposer.clone(),
            counterparty,
            negotiation.id.clone(),
            InfluenceType::ProposalSubmission,
            analysis.influence_score,
            direction_for(value_change),
        )
        .with_baseline_value(negotiation.current_value)
        .with_context(serde_json::json!({
            "action": "proposal_submission",
            "round": negotiation.current_round,
            "strategy_type": analysis.strategy_type.as_str(),
        }));
        record.created_at = now;
        self.ledger.append(record).await?;

        self.directory.touch(proposer, now).await?;

        info!(
            negotiation_id = %negotiation.id,
            proposer = %proposer,
            round = negotiation.current_round,
            proposed_value = draft.proposed_value,
            strategy = analysis.strategy_type.as_str(),
            "proposal submitted"
        );
        self.store.get_proposal(&proposal_id).await
    }

    async fn respond_at(
        &self,
        proposal_id: &ProposalId,
        responder: &AgentId,
        action: RespondAction,
        now: DateTime<Utc>,
    ) -> Result<Negotiation> {
        let proposal = self.store.get_proposal(proposal_id).await?;
        let negotiation = self.load_live(&proposal.negotiation_id, now).await?;

        if !negotiation.is_participant(responder) {
            return Err(ConcordError::NotAParticipant {
                agent_id: responder.to_string(),
                negotiation_id: negotiation.id.to_string(),
            });
        }

        // Only the most recent proposal is open for a response.
        let history = self.store.proposals_for(&negotiation.id).await?;
        let is_latest = history
            .last()
            .map(|latest| latest.id == proposal.id)
            .unwrap_or(false);
        if !is_latest {
            return Err(ConcordError::ProposalNotPending {
                proposal_id: proposal.id.to_string(),
            });
        }
        if &proposal.proposer == responder {
            return Err(ConcordError::OwnProposalResponse {
                proposal_id: proposal.id.to_string(),
            });
        }

        match action {
            RespondAction::Accept => {
                let closing = self
                    .closing_proposal(&negotiation, responder, ProposalType::Acceptance, now)
                    .await?;
                self.close(
                    &negotiation,
                    NegotiationStatus::Completed,
                    Some(negotiation.current_value),
                    Some(closing),
                    now,
                )
                .await
            }
            RespondAction::Reject => {
                let closing = self
                    .closing_proposal(&negotiation, responder, ProposalType::Rejection, now)
                    .await?;
                self.close(&negotiation, NegotiationStatus::Rejected, None, Some(closing), now)
                    .await
            }
            RespondAction::Counter(draft) => {
                self.submit_at(
                    &negotiation.id,
                    responder,
                    draft,
                    Some(NegotiationStatus::CounterProposed),
                    now,
                )
                .await?;
                self.store.get(&negotiation.id).await
            }
        }
    }

    async fn cancel_at(
        &self,
        negotiation_id: &NegotiationId,
        requester: &AgentId,
        now: DateTime<Utc>,
    ) -> Result<Negotiation> {
        let negotiation = self.load_live(negotiation_id, now).await?;
        if !negotiation.is_participant(requester) {
            return Err(ConcordError::NotAParticipant {
                agent_id: requester.to_string(),
                negotiation_id: negotiation.id.to_string(),
            });
        }
        self.close(&negotiation, NegotiationStatus::Cancelled, None, None, now)
            .await
    }

    async fn get_at(
        &self,
        negotiation_id: &NegotiationId,
        requester: &AgentId,
        now: DateTime<Utc>,
    ) -> Result<NegotiationView> {
        let mut negotiation = self.store.get(negotiation_id).await?;
        if !negotiation.is_participant(requester) {
            return Err(ConcordError::forbidden(format!(
                "agent {requester} is not a participant in negotiation {negotiation_id}"
            )));
        }
        if !negotiation.status.is_terminal() && negotiation.is_expired_at(now) {
            negotiation = self.expire(&negotiation, now).await?;
        }
        let proposals = self.store.proposals_for(negotiation_id).await?;
        Ok(NegotiationView {
            negotiation,
            proposals,
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Load a negotiation that must still be open, applying lazy expiry
    async fn load_live(
        &self,
        negotiation_id: &NegotiationId,
        now: DateTime<Utc>,
    ) -> Result<Negotiation> {
        let negotiation = self.store.get(negotiation_id).await?;
        if !negotiation.status.is_terminal() && negotiation.is_expired_at(now) {
            let expired = self.expire(&negotiation, now).await?;
            return Err(ConcordError::NegotiationClosed {
                negotiation_id: expired.id.to_string(),
                status: expired.status.as_str().to_string(),
            });
        }
        if negotiation.status.is_terminal() {
            return Err(ConcordError::NegotiationClosed {
                negotiation_id: negotiation.id.to_string(),
                status: negotiation.status.as_str().to_string(),
            });
        }
        Ok(negotiation)
    }

    /// Transition a negotiation whose deadline passed to EXPIRED
    async fn expire(&self, negotiation: &Negotiation, now: DateTime<Utc>) -> Result<Negotiation> {
        warn!(negotiation_id = %negotiation.id, "negotiation expired before resolution");
        self.close(negotiation, NegotiationStatus::Expired, None, None, now)
            .await
    }

    /// Build a closing acceptance/rejection proposal at the current value
    ///
    /// Closing proposals are evaluated like any other but never advance the
    /// round.
    async fn closing_proposal(
        &self,
        negotiation: &Negotiation,
        responder: &AgentId,
        proposal_type: ProposalType,
        now: DateTime<Utc>,
    ) -> Result<Proposal> {
        let profile = self.directory.get(responder).await?;
        let draft = ProposalDraft {
            proposed_value: negotiation.current_value,
            ..Default::default()
        };
        let analysis = evaluate(negotiation, &draft, &profile, now);

        Ok(Proposal {
            id: ProposalId::new(),
            negotiation_id: negotiation.id.clone(),
            proposer: responder.clone(),
            proposal_type,
            round: negotiation.current_round,
            proposed_value: negotiation.current_value,
            value_change: 0.0,
            justification: draft.justification,
            terms: draft.terms,
            conditions: draft.conditions,
            influence_score: analysis.influence_score,
            strategy_type: analysis.strategy_type,
            confidence_level: analysis.confidence_level,
            response_deadline: None,
            created_at: now,
        })
    }

    /// Drive a negotiation to a terminal state and fan out the bookkeeping:
    /// influence record resolution and participant counters
    ///
    /// The round read with `negotiation` guards the freeze: a concurrent
    /// submission that advanced the round turns this into a retriable
    /// `RoundConflict` instead of freezing a stale value.
    async fn close(
        &self,
        negotiation: &Negotiation,
        status: NegotiationStatus,
        final_value: Option<f64>,
        closing_proposal: Option<Proposal>,
        now: DateTime<Utc>,
    ) -> Result<Negotiation> {
        let updated = self
            .store
            .finalize(
                &negotiation.id,
                negotiation.current_round,
                status,
                final_value,
                closing_proposal,
                now,
            )
            .await?;

        let resolved = self
            .ledger
            .resolve_for_negotiation(&negotiation.id, outcome_for(status))
            .await?;

        let completed = status.is_successful();
        self.directory
            .record_closed(&negotiation.initiator, completed, now)
            .await?;
        self.directory
            .record_closed(&negotiation.responder, completed, now)
            .await?;

        info!(
            negotiation_id = %negotiation.id,
            status = status.as_str(),
            final_value = ?final_value,
            influence_records_resolved = resolved,
            "negotiation closed"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_store::{InMemoryAgentDirectory, InMemoryInfluenceLedger, InMemoryNegotiationStore};
    use concord_types::{AgentProfile, ErrorKind, NegotiationStyle, StrategyType, UserId};

    struct Fixture {
        engine: NegotiationEngine,
        directory: Arc<InMemoryAgentDirectory>,
        ledger: Arc<InMemoryInfluenceLedger>,
        alice: AgentId,
        bob: AgentId,
    }

    async fn fixture() -> Fixture {
        let directory = Arc::new(InMemoryAgentDirectory::new());
        let store = Arc::new(InMemoryNegotiationStore::new());
        let ledger = Arc::new(InMemoryInfluenceLedger::new());

        let mut alice = AgentProfile::new(UserId::new(), "alice", NegotiationStyle::Balanced);
        alice.set_influence(0.6);
        alice.set_reputation(0.7);
        let mut bob = AgentProfile::new(UserId::new(), "bob", NegotiationStyle::Cooperative);
        bob.set_influence(0.5);
        bob.set_reputation(0.6);

        let alice_id = alice.id.clone();
        let bob_id = bob.id.clone();
        directory.register(alice).await.unwrap();
        directory.register(bob).await.unwrap();

        let engine = NegotiationEngine::new(
            directory.clone(),
            store.clone(),
            ledger.clone(),
            NegotiationConfig::default(),
        );
        Fixture {
            engine,
            directory,
            ledger,
            alice: alice_id,
            bob: bob_id,
        }
    }

    fn request(fx: &Fixture, initial_value: f64, max_rounds: u32) -> CreateNegotiation {
        CreateNegotiation {
            initiator: fx.alice.clone(),
            responder: fx.bob.clone(),
            title: "compute credits".to_string(),
            description: None,
            category: Some("services".to_string()),
            initial_value,
            currency: "USD".to_string(),
            max_rounds,
            duration_hours: 24,
        }
    }

    fn draft(value: f64) -> ProposalDraft {
        ProposalDraft {
            proposed_value: value,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_initial_state() {
        let fx = fixture().await;
        let n = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();

        assert_eq!(n.status, NegotiationStatus::Initiated);
        assert_eq!(n.current_value, 500.0);
        assert_eq!(n.current_round, 1);
        assert_eq!(n.total_proposals, 1);
        assert!(n.final_value.is_none());

        let view = fx.engine.get(&n.id, &fx.alice).await.unwrap();
        assert_eq!(view.proposals.len(), 1);
        assert_eq!(view.proposals[0].proposal_type, ProposalType::InitialOffer);
        assert_eq!(view.proposals[0].round, 1);

        // Initiation influence record is pending.
        let outward = fx
            .ledger
            .outward_records(&fx.alice, Utc::now())
            .await
            .unwrap();
        assert_eq!(outward.len(), 1);
        assert_eq!(outward[0].outcome, InfluenceOutcome::Pending);

        // Both participants picked up a started negotiation.
        let alice = fx.directory.get(&fx.alice).await.unwrap();
        let bob = fx.directory.get(&fx.bob).await.unwrap();
        assert_eq!(alice.total_negotiations, 1);
        assert_eq!(bob.total_negotiations, 1);
    }

    #[tokio::test]
    async fn test_create_validations() {
        let fx = fixture().await;

        let mut r = request(&fx, 500.0, 5);
        r.responder = r.initiator.clone();
        assert!(matches!(
            fx.engine.create(r).await.unwrap_err(),
            ConcordError::SelfNegotiation { .. }
        ));

        let err = fx.engine.create(request(&fx, 0.0, 5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = fx.engine.create(request(&fx, 500.0, 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = fx.engine.create(request(&fx, 500.0, 51)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut r = request(&fx, 500.0, 5);
        r.duration_hours = 0;
        assert_eq!(fx.engine.create(r).await.unwrap_err().kind(), ErrorKind::Validation);

        // Absurd durations are rejected, not fed into date arithmetic.
        let mut r = request(&fx, 500.0, 5);
        r.duration_hours = i64::MAX;
        assert_eq!(fx.engine.create(r).await.unwrap_err().kind(), ErrorKind::Validation);

        let mut r = request(&fx, 500.0, 5);
        r.initiator = AgentId::new();
        assert_eq!(fx.engine.create(r).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_counter_proposal_advances_round_and_value() {
        let fx = fixture().await;
        let n = fx.engine.create(request(&fx, 500.0, 3)).await.unwrap();

        let p = fx
            .engine
            .submit_proposal(&n.id, &fx.bob, draft(450.0))
            .await
            .unwrap();
        assert_eq!(p.round, 1);
        assert_eq!(p.proposed_value, 450.0);
        assert_eq!(p.value_change, -50.0);

        let view = fx.engine.get(&n.id, &fx.bob).await.unwrap();
        assert_eq!(view.negotiation.current_round, 2);
        assert_eq!(view.negotiation.current_value, 450.0);
        // Responder moved, so the ball is in the initiator's court.
        assert_eq!(view.negotiation.status, NegotiationStatus::Active);
    }

    #[tokio::test]
    async fn test_round_exhaustion() {
        let fx = fixture().await;
        let n = fx.engine.create(request(&fx, 500.0, 2)).await.unwrap();

        // Round 1 -> 2 reaches max_rounds; the submission is a final offer.
        let p = fx
            .engine
            .submit_proposal(&n.id, &fx.bob, draft(480.0))
            .await
            .unwrap();
        assert_eq!(p.proposal_type, ProposalType::FinalOffer);

        let err = fx
            .engine
            .submit_proposal(&n.id, &fx.alice, draft(490.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::RoundsExhausted { .. }));
        assert_eq!(err.kind(), ErrorKind::BusinessLogic);
    }

    #[tokio::test]
    async fn test_accept_freezes_final_value() {
        let fx = fixture().await;
        let n = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();
        let counter = fx
            .engine
            .submit_proposal(&n.id, &fx.bob, draft(450.0))
            .await
            .unwrap();

        let closed = fx
            .engine
            .respond(&counter.id, &fx.alice, RespondAction::Accept)
            .await
            .unwrap();
        assert_eq!(closed.status, NegotiationStatus::Completed);
        assert_eq!(closed.final_value, Some(450.0));
        assert!(closed.completed_at.is_some());

        // Terminal negotiations are immutable.
        let err = fx
            .engine
            .submit_proposal(&n.id, &fx.bob, draft(400.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::NegotiationClosed { .. }));
        let err = fx
            .engine
            .respond(&counter.id, &fx.alice, RespondAction::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::NegotiationClosed { .. }));

        // Influence records resolved successful, completion counters bumped.
        let outward = fx.ledger.outward_records(&fx.bob, Utc::now()).await.unwrap();
        assert!(!outward.is_empty());
        assert!(outward
            .iter()
            .all(|r| r.outcome == InfluenceOutcome::Successful));
        let alice = fx.directory.get(&fx.alice).await.unwrap();
        assert_eq!(alice.completed_negotiations, 1);

        // The acceptance itself is on the ledger but did not advance rounds.
        let view = fx.engine.get(&n.id, &fx.alice).await.unwrap();
        assert_eq!(view.proposals.len(), 3);
        assert_eq!(
            view.proposals.last().unwrap().proposal_type,
            ProposalType::Acceptance
        );
        assert_eq!(view.negotiation.current_round, 2);
    }

    #[tokio::test]
    async fn test_reject_is_terminal_without_value() {
        let fx = fixture().await;
        let n = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();
        let counter = fx
            .engine
            .submit_proposal(&n.id, &fx.bob, draft(450.0))
            .await
            .unwrap();

        let closed = fx
            .engine
            .respond(&counter.id, &fx.alice, RespondAction::Reject)
            .await
            .unwrap();
        assert_eq!(closed.status, NegotiationStatus::Rejected);
        assert!(closed.final_value.is_none());

        let outward = fx.ledger.outward_records(&fx.bob, Utc::now()).await.unwrap();
        assert!(outward.iter().all(|r| r.outcome == InfluenceOutcome::Failed));
        let alice = fx.directory.get(&fx.alice).await.unwrap();
        assert_eq!(alice.completed_negotiations, 0);
    }

    #[tokio::test]
    async fn test_counter_response_continues_negotiation() {
        let fx = fixture().await;
        let n = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();
        let first = fx
            .engine
            .submit_proposal(&n.id, &fx.bob, draft(450.0))
            .await
            .unwrap();

        let updated = fx
            .engine
            .respond(&first.id, &fx.alice, RespondAction::Counter(draft(475.0)))
            .await
            .unwrap();
        assert_eq!(updated.current_round, 3);
        assert_eq!(updated.current_value, 475.0);
        assert_eq!(updated.status, NegotiationStatus::CounterProposed);
        // A counter-proposed negotiation is still in play.
        assert_eq!(fx.engine.active_count().await.unwrap(), 1);

        // The exchange continues normally from the countered state.
        let view = fx.engine.get(&n.id, &fx.bob).await.unwrap();
        let latest = view.proposals.last().unwrap().id.clone();
        let closed = fx
            .engine
            .respond(&latest, &fx.bob, RespondAction::Accept)
            .await
            .unwrap();
        assert_eq!(closed.status, NegotiationStatus::Completed);
        assert_eq!(closed.final_value, Some(475.0));
    }

    #[tokio::test]
    async fn test_only_latest_proposal_is_pending() {
        let fx = fixture().await;
        let n = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();
        let first = fx
            .engine
            .submit_proposal(&n.id, &fx.bob, draft(450.0))
            .await
            .unwrap();
        let _second = fx
            .engine
            .submit_proposal(&n.id, &fx.alice, draft(475.0))
            .await
            .unwrap();

        let err = fx
            .engine
            .respond(&first.id, &fx.alice, RespondAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::ProposalNotPending { .. }));
    }

    #[tokio::test]
    async fn test_cannot_respond_to_own_proposal() {
        let fx = fixture().await;
        let n = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();
        let counter = fx
            .engine
            .submit_proposal(&n.id, &fx.bob, draft(450.0))
            .await
            .unwrap();

        let err = fx
            .engine
            .respond(&counter.id, &fx.bob, RespondAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::OwnProposalResponse { .. }));
    }

    #[tokio::test]
    async fn test_outsider_access() {
        let fx = fixture().await;
        let outsider = AgentProfile::new(UserId::new(), "mallory", NegotiationStyle::Aggressive);
        let outsider_id = outsider.id.clone();
        fx.directory.register(outsider).await.unwrap();

        let n = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();

        let err = fx
            .engine
            .submit_proposal(&n.id, &outsider_id, draft(450.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::NotAParticipant { .. }));

        let err = fx.engine.get(&n.id, &outsider_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_cancel() {
        let fx = fixture().await;
        let n = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();

        let closed = fx.engine.cancel(&n.id, &fx.bob).await.unwrap();
        assert_eq!(closed.status, NegotiationStatus::Cancelled);
        assert!(closed.final_value.is_none());

        let outward = fx
            .ledger
            .outward_records(&fx.alice, Utc::now())
            .await
            .unwrap();
        assert!(outward.iter().all(|r| r.outcome == InfluenceOutcome::Failed));
    }

    #[tokio::test]
    async fn test_lazy_expiry() {
        let fx = fixture().await;
        let past = Utc::now() - Duration::days(2);
        let n = fx
            .engine
            .create_at(request(&fx, 500.0, 5), past)
            .await
            .unwrap();

        // The deadline passed; the next mutation surfaces the expiry.
        let err = fx
            .engine
            .submit_proposal(&n.id, &fx.bob, draft(450.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::NegotiationClosed { .. }));

        let view = fx.engine.get(&n.id, &fx.alice).await.unwrap();
        assert_eq!(view.negotiation.status, NegotiationStatus::Expired);

        // Expiry resolves influence records as partial.
        let outward = fx
            .ledger
            .outward_records(&fx.alice, Utc::now())
            .await
            .unwrap();
        assert!(outward.iter().all(|r| r.outcome == InfluenceOutcome::Partial));
    }

    #[tokio::test]
    async fn test_expiry_on_read() {
        let fx = fixture().await;
        let past = Utc::now() - Duration::days(2);
        let n = fx
            .engine
            .create_at(request(&fx, 500.0, 5), past)
            .await
            .unwrap();

        let view = fx.engine.get(&n.id, &fx.alice).await.unwrap();
        assert_eq!(view.negotiation.status, NegotiationStatus::Expired);
    }

    #[tokio::test]
    async fn test_strategy_fields_recorded_on_proposal() {
        let fx = fixture().await;
        let n = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();

        // 25% swing classifies aggressive regardless of justification.
        let mut d = draft(625.0);
        d.justification = "extensive market analysis".repeat(20);
        let p = fx
            .engine
            .submit_proposal(&n.id, &fx.bob, d)
            .await
            .unwrap();
        assert_eq!(p.strategy_type, StrategyType::Aggressive);
        assert!(p.influence_score >= 0.0 && p.influence_score <= 1.0);
        assert!(p.confidence_level >= 0.1 && p.confidence_level <= 1.0);
    }

    #[tokio::test]
    async fn test_listing_and_active_count() {
        let fx = fixture().await;
        let open = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();
        for _ in 0..2 {
            fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();
        }
        let n = fx.engine.create(request(&fx, 500.0, 5)).await.unwrap();
        fx.engine.cancel(&n.id, &fx.alice).await.unwrap();

        let page = fx.engine.list_for_agent(&fx.alice, 1, 2).await.unwrap();
        assert_eq!(page.total_count, 4);
        assert_eq!(page.negotiations.len(), 2);
        assert!(page.has_next);

        // INITIATED negotiations are not yet in play; move one forward.
        assert_eq!(fx.engine.active_count().await.unwrap(), 0);
        fx.engine
            .submit_proposal(&open.id, &fx.bob, draft(480.0))
            .await
            .unwrap();
        assert_eq!(fx.engine.active_count().await.unwrap(), 1);
    }
}
