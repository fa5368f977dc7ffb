//! Error types for Concord
//!
//! The taxonomy mirrors how callers must react: validation failures are
//! surfaced verbatim, not-found maps to a 404-equivalent, business rule
//! violations to a 400-equivalent, and round conflicts are safe to retry
//! once with fresh state.

use thiserror::Error;

/// Result type for Concord operations
pub type Result<T> = std::result::Result<T, ConcordError>;

/// Broad error class, used by request handlers to pick a response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    BusinessLogic,
    ConcurrencyConflict,
    Forbidden,
    Internal,
}

/// Concord error types
#[derive(Debug, Clone, Error)]
pub enum ConcordError {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Malformed or out-of-range input
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    // ========================================================================
    // Not Found Errors
    // ========================================================================

    /// Agent not found
    #[error("Agent {agent_id} not found")]
    AgentNotFound { agent_id: String },

    /// Negotiation not found
    #[error("Negotiation {negotiation_id} not found")]
    NegotiationNotFound { negotiation_id: String },

    /// Proposal not found
    #[error("Proposal {proposal_id} not found")]
    ProposalNotFound { proposal_id: String },

    // ========================================================================
    // Business Logic Errors
    // ========================================================================

    /// An agent cannot negotiate with itself
    #[error("Agent {agent_id} cannot negotiate with itself")]
    SelfNegotiation { agent_id: String },

    /// The negotiation is in a terminal state and cannot be mutated
    #[error("Negotiation {negotiation_id} is closed (status: {status})")]
    NegotiationClosed {
        negotiation_id: String,
        status: String,
    },

    /// All rounds have been used
    #[error("Negotiation {negotiation_id} has exhausted its {max_rounds} rounds")]
    RoundsExhausted {
        negotiation_id: String,
        max_rounds: u32,
    },

    /// Agent is not one of the two participants
    #[error("Agent {agent_id} is not a participant in negotiation {negotiation_id}")]
    NotAParticipant {
        agent_id: String,
        negotiation_id: String,
    },

    /// Only the most recent proposal can be responded to
    #[error("Proposal {proposal_id} is not awaiting a response")]
    ProposalNotPending { proposal_id: String },

    /// A proposer cannot respond to their own proposal
    #[error("Agent cannot respond to own proposal {proposal_id}")]
    OwnProposalResponse { proposal_id: String },

    // ========================================================================
    // Concurrency Errors
    // ========================================================================

    /// Optimistic round check failed; retry once with fresh state
    #[error(
        "Round conflict on negotiation {negotiation_id}: expected round {expected}, found {actual}"
    )]
    RoundConflict {
        negotiation_id: String,
        expected: u32,
        actual: u32,
    },

    // ========================================================================
    // Access Errors
    // ========================================================================

    /// Requester may not see this resource
    #[error("Access denied: {reason}")]
    Forbidden { reason: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Unclassified internal failure
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ConcordError {
    /// Create a validation error
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Broad classification of the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::Validation,
            Self::AgentNotFound { .. }
            | Self::NegotiationNotFound { .. }
            | Self::ProposalNotFound { .. } => ErrorKind::NotFound,
            Self::SelfNegotiation { .. }
            | Self::NegotiationClosed { .. }
            | Self::RoundsExhausted { .. }
            | Self::NotAParticipant { .. }
            | Self::ProposalNotPending { .. }
            | Self::OwnProposalResponse { .. } => ErrorKind::BusinessLogic,
            Self::RoundConflict { .. } => ErrorKind::ConcurrencyConflict,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether the caller may retry the operation with fresh state
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::RoundConflict { .. })
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::AgentNotFound { .. } => "AGENT_NOT_FOUND",
            Self::NegotiationNotFound { .. } => "NEGOTIATION_NOT_FOUND",
            Self::ProposalNotFound { .. } => "PROPOSAL_NOT_FOUND",
            Self::SelfNegotiation { .. } => "SELF_NEGOTIATION",
            Self::NegotiationClosed { .. } => "NEGOTIATION_CLOSED",
            Self::RoundsExhausted { .. } => "ROUNDS_EXHAUSTED",
            Self::NotAParticipant { .. } => "NOT_A_PARTICIPANT",
            Self::ProposalNotPending { .. } => "PROPOSAL_NOT_PENDING",
            Self::OwnProposalResponse { .. } => "OWN_PROPOSAL_RESPONSE",
            Self::RoundConflict { .. } => "ROUND_CONFLICT",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
