use crate::model::{ResourceName, TaskId};
use rust_decimal::Decimal;

/// Everything that can go wrong while building or updating a schedule.
///
/// Each variant carries the data a caller needs to report the failure
/// without re-deriving it; no variant is a bare string.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("invalid task: {0}")]
    InvalidTask(#[from] InvalidTaskError),

    #[error("dependency cycle detected: {path:?}")]
    CycleDetected { path: Vec<TaskId> },

    #[error(
        "resource '{resource}' over-allocated on {day}: requested {requested}, available {available}"
    )]
    ResourceOverallocation {
        resource: ResourceName,
        day: chrono::NaiveDate,
        requested: Decimal,
        available: Decimal,
    },

    #[error("resource leveling did not converge within {iterations} iterations")]
    LevelingDidNotConverge { iterations: u32 },

    #[error("schedule() has already been called; planning-phase setters are no longer valid")]
    ScheduleAlreadyBuilt,

    #[error("task '{0}' is already completed")]
    TaskAlreadyCompleted(TaskId),

    #[error("unknown task id '{0}'")]
    UnknownTaskId(TaskId),

    #[error("unknown resource name '{0}'")]
    UnknownResourceName(ResourceName),
}

/// Validation failures for the inert data model (task/chain/buffer fields).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum InvalidTaskError {
    #[error("task id must not be empty")]
    EmptyId,

    #[error("duration must be non-negative, got {0}")]
    NegativeDuration(Decimal),

    #[error("safe_duration ({safe}) must be >= aggressive_duration ({aggressive})")]
    SafeLessThanAggressive { safe: Decimal, aggressive: Decimal },

    #[error("task '{0}' depends on non-existent task '{1}'")]
    UnknownDependency(TaskId, TaskId),

    #[error("task '{0}' requires unregistered resource '{1}'")]
    UnknownResource(TaskId, ResourceName),

    #[error("resource units must be positive, got {0}")]
    NonPositiveUnits(Decimal),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
