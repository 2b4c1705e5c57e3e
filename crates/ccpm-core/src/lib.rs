//! Domain model for the critical-chain scheduling engine: tasks, resources,
//! calendars, chains and buffers, plus the errors and pure helper functions
//! that operate directly on that data.
//!
//! The graph, leveling and orchestration algorithms that turn this data into
//! a schedule live in `ccpm-engine`, which depends on this crate.

pub mod buffer_strategy;
pub mod calendar;
pub mod error;
pub mod fever_chart;
pub mod model;
pub mod resource;

pub use buffer_strategy::{BufferStrategy, ChainTaskDurations};
pub use calendar::Calendar;
pub use error::{InvalidTaskError, SchedulerError};
pub use fever_chart::{zone as fever_zone, FeverZone};
pub use model::{
    Buffer, BufferId, BufferKind, Chain, ChainId, ChainKind, ConsumptionRecord, ProgressRecord,
    ResourceName, ResourceRequirement, Task, TaskId, TaskStatus,
};
pub use resource::{Allocation, FlowEvent, FlowEventKind, Resource, ResourceRegistry};
