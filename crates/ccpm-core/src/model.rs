use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::InvalidTaskError;

pub type TaskId = String;
pub type ResourceName = String;
pub type ChainId = String;
pub type BufferId = String;

/// A `{name, units}` pair: how much of one resource a task consumes while active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    pub name: ResourceName,
    pub units: Decimal,
}

impl ResourceRequirement {
    pub fn new(name: impl Into<ResourceName>, units: Decimal) -> Result<Self, InvalidTaskError> {
        if units <= Decimal::ZERO {
            return Err(InvalidTaskError::NonPositiveUnits(units));
        }
        Ok(Self {
            name: name.into(),
            units,
        })
    }
}

/// A single row of `progress_history`: a self-contained snapshot, never mutated
/// once appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub date: NaiveDate,
    pub remaining: Decimal,
    pub completed_work: Decimal,
    pub progress_pct: Decimal,
}

/// Per-task state machine: `Planned -> InProgress -> Completed`, no backward
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Planned,
    InProgress,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planned => "Planned",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
        };
        write!(f, "{s}")
    }
}

/// A unit of work in the dependency network.
///
/// Construction and dependency/resource wiring happen through validated
/// builder methods during the planning phase; scheduling attributes
/// (`early_start`..`color`) are filled in by the engine during `schedule()`
/// and are `None` beforehand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub aggressive_duration: Decimal,
    pub safe_duration: Decimal,
    pub planned_duration: Option<Decimal>,
    pub resources: Vec<ResourceRequirement>,
    pub dependencies: BTreeSet<TaskId>,

    // Scheduling attributes, assigned by the engine. Measured in workdays
    // elapsed since the project start date (fractional, matching durations).
    pub early_start: Option<Decimal>,
    pub early_finish: Option<Decimal>,
    pub late_start: Option<Decimal>,
    pub late_finish: Option<Decimal>,
    pub slack: Option<Decimal>,
    pub is_critical: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub chain_id: Option<ChainId>,
    pub color: Option<u32>,

    // Execution attributes.
    pub status: TaskStatus,
    pub actual_start_date: Option<NaiveDate>,
    pub actual_end_date: Option<NaiveDate>,
    pub remaining_duration: Option<Decimal>,
    pub progress_history: Vec<ProgressRecord>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>) -> Result<Self, InvalidTaskError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InvalidTaskError::EmptyId);
        }
        Ok(Self {
            name: id.clone(),
            id,
            aggressive_duration: Decimal::ZERO,
            safe_duration: Decimal::ZERO,
            planned_duration: None,
            resources: Vec::new(),
            dependencies: BTreeSet::new(),
            early_start: None,
            early_finish: None,
            late_start: None,
            late_finish: None,
            slack: None,
            is_critical: false,
            start_date: None,
            end_date: None,
            chain_id: None,
            color: None,
            status: TaskStatus::Planned,
            actual_start_date: None,
            actual_end_date: None,
            remaining_duration: None,
            progress_history: Vec::new(),
        })
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn durations(
        mut self,
        aggressive: Decimal,
        safe: Decimal,
    ) -> Result<Self, InvalidTaskError> {
        if aggressive < Decimal::ZERO {
            return Err(InvalidTaskError::NegativeDuration(aggressive));
        }
        if safe < aggressive {
            return Err(InvalidTaskError::SafeLessThanAggressive { safe, aggressive });
        }
        self.aggressive_duration = aggressive;
        self.safe_duration = safe;
        self.remaining_duration = Some(aggressive);
        Ok(self)
    }

    #[must_use]
    pub fn depends_on(mut self, task_id: impl Into<TaskId>) -> Self {
        self.dependencies.insert(task_id.into());
        self
    }

    #[must_use]
    pub fn requires(mut self, requirement: ResourceRequirement) -> Self {
        self.resources.push(requirement);
        self
    }

    /// Locks `planned_duration` to the aggressive estimate; called by the
    /// scheduler when the planning phase ends.
    pub(crate) fn lock_planned_duration(&mut self) {
        self.planned_duration = Some(self.aggressive_duration);
    }

    /// Appends a record to `progress_history`, recomputes `completed_work`
    /// and `progress_pct`, and advances the task's state machine.
    ///
    /// Returns `Err` if the task is already `Completed` — no backward
    /// transitions are permitted.
    pub fn update_remaining(
        &mut self,
        remaining: Decimal,
        date: NaiveDate,
    ) -> Result<(), crate::error::SchedulerError> {
        use crate::error::SchedulerError;

        if matches!(self.status, TaskStatus::Completed) {
            return Err(SchedulerError::TaskAlreadyCompleted(self.id.clone()));
        }

        let planned = self.planned_duration.unwrap_or(self.aggressive_duration);
        let completed_work = (planned - remaining).max(Decimal::ZERO);
        let progress_pct = if planned > Decimal::ZERO {
            (completed_work / planned) * Decimal::from(100)
        } else {
            Decimal::from(100)
        };

        if self.actual_start_date.is_none() {
            self.actual_start_date = Some(date);
        }
        self.status = TaskStatus::InProgress;
        self.remaining_duration = Some(remaining);

        if remaining <= Decimal::ZERO {
            self.actual_end_date = Some(date);
            self.status = TaskStatus::Completed;
        }

        self.progress_history.push(ProgressRecord {
            date,
            remaining,
            completed_work,
            progress_pct,
        });

        Ok(())
    }

    /// Elapsed working days between `actual_start_date` and `actual_end_date`,
    /// i.e. the true duration once the task has completed — not the
    /// originally planned one.
    pub fn actual_duration(&self, calendar: &crate::calendar::Calendar) -> Option<Decimal> {
        let start = self.actual_start_date?;
        let end = self.actual_end_date?;
        Some(calendar.working_days_between(start, end))
    }
}

/// Which kind of chain a `Chain` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainKind {
    Critical,
    Feeding,
}

/// An ordered, contiguous run of tasks connected by direct dependencies:
/// either the single critical chain, or one of its feeding chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    pub id: ChainId,
    pub kind: ChainKind,
    pub tasks: Vec<TaskId>,
    pub buffer: Option<BufferId>,
    pub buffer_ratio: Decimal,
}

impl Chain {
    pub fn new(
        id: impl Into<ChainId>,
        kind: ChainKind,
        tasks: Vec<TaskId>,
    ) -> Result<Self, InvalidTaskError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InvalidTaskError::EmptyId);
        }
        if tasks.is_empty() {
            return Err(InvalidTaskError::UnknownDependency(id, String::new()));
        }
        Ok(Self {
            id,
            kind,
            tasks,
            buffer: None,
            buffer_ratio: Decimal::new(5, 1), // 0.5
        })
    }
}

/// Which kind of schedule reserve a `Buffer` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferKind {
    Project,
    Feeding,
}

/// A row of `consumption_history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub date: NaiveDate,
    pub remaining: Decimal,
    pub consumption_pct: Decimal,
}

/// A time reserve inserted by the scheduler: the project buffer after the
/// critical chain, or a feeding buffer before a merge point. Not a `Task` —
/// it has no resources and no dependency set of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buffer {
    pub id: BufferId,
    pub kind: BufferKind,
    pub size_days: Decimal,
    pub original_size: Decimal,
    pub remaining: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub attaches_to: TaskId,
    pub source_chain: ChainId,
    pub consumption_history: Vec<ConsumptionRecord>,
}

impl Buffer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<BufferId>,
        kind: BufferKind,
        size_days: Decimal,
        start_date: NaiveDate,
        end_date: NaiveDate,
        attaches_to: impl Into<TaskId>,
        source_chain: impl Into<ChainId>,
    ) -> Result<Self, InvalidTaskError> {
        if size_days <= Decimal::ZERO {
            return Err(InvalidTaskError::NegativeDuration(size_days));
        }
        Ok(Self {
            id: id.into(),
            kind,
            size_days,
            original_size: size_days,
            remaining: size_days,
            start_date,
            end_date,
            attaches_to: attaches_to.into(),
            source_chain: source_chain.into(),
            consumption_history: Vec::new(),
        })
    }

    /// `consumption_pct = (original_size - remaining) / original_size * 100`.
    #[must_use]
    pub fn consumption_pct(&self) -> Decimal {
        if self.original_size.is_zero() {
            return Decimal::ZERO;
        }
        ((self.original_size - self.remaining) / self.original_size) * Decimal::from(100)
    }

    /// Sets `remaining` and appends a self-contained record. Consumption
    /// history is append-only: callers never rewrite or remove a prior
    /// entry.
    pub fn record_consumption(&mut self, date: NaiveDate, remaining: Decimal) {
        self.remaining = remaining.max(Decimal::ZERO).min(self.original_size);
        let consumption_pct = self.consumption_pct();
        self.consumption_history.push(ConsumptionRecord {
            date,
            remaining: self.remaining,
            consumption_pct,
        });
    }
}
