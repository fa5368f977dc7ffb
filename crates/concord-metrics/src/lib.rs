//! Concord Metrics - Influence and reputation scoring
//!
//! Two window-scoped aggregation engines computed over immutable
//! [`concord_store::AgentHistory`] snapshots, plus a background scheduler
//! that recomputes scores for every known agent on an interval.
//!
//! Both engines are read-mostly and parallelizable across agents; the only
//! write is the score write-back to the agent directory, which happens after
//! the whole computation succeeds, so a failed run leaves prior scores
//! untouched.

pub mod influence;
pub mod reputation;
pub mod scheduler;
pub mod stats;

pub use influence::{
    ComponentScores, InfluenceMetricsEngine, InfluenceScore, MetricsConfig, TrendAnalysis,
    TrendDirection,
};
pub use reputation::{ConfidenceInterval, ReputationEngine, ReputationFactors, ReputationUpdate};
pub use scheduler::{RecalculationScheduler, SchedulerConfig, SchedulerHandle};
