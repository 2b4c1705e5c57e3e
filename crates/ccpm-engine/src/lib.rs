//! Graph, CPM, leveling, critical-chain, feeding-chain, buffer-sizing and
//! execution-tracking algorithms that turn a `ccpm-core` task set into a
//! resource-feasible critical-chain schedule, and re-propagate it as
//! actuals are reported.
//!
//! `Scheduler` is the entry point; everything else is composed by it.

pub mod buffer_sizing;
pub mod cpm;
pub mod critical_chain;
pub mod dag;
pub mod execution;
pub mod feeding_chain;
pub mod leveling;
pub mod report;
pub mod scheduler;

pub use dag::{longest_path_by_duration, reverse_graph, topo_order, Dag};
pub use feeding_chain::FeedingChain;
pub use leveling::{level_resources, LevelingResult, UnresolvedConflict};
pub use scheduler::{ChainFeverData, Schedule, Scheduler};
