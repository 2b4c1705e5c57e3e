use std::collections::BTreeMap;

use ccpm_core::{Buffer, Calendar, SchedulerError, Task, TaskId, TaskStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::dag::Dag;

/// Re-propagates start/end dates forward from `as_of_date` given each
/// task's current state (§4.9 `recalculate_network_from_progress`):
/// completed tasks keep their actual dates, in-progress tasks finish
/// `remaining` workdays after `as_of`, and not-started tasks begin no
/// earlier than their predecessors' new end, against their own baseline
/// start as a floor. An unreported not-started task is never pushed past
/// its baseline by `as_of` alone — only a predecessor's new end (itself
/// driven by actual progress) can slip it later, so an on-track chain with
/// no progress reported yet stays at its baseline dates.
pub fn recalculate(
    tasks: &mut [Task],
    calendar: &Calendar,
    as_of: NaiveDate,
    project_start: NaiveDate,
) -> Result<(), SchedulerError> {
    let snapshot: Vec<Task> = tasks.to_vec();
    let dag = Dag::build(&snapshot)?;
    let order = dag.topo_order().to_vec();

    let mut new_start: BTreeMap<TaskId, NaiveDate> = BTreeMap::new();
    let mut new_end: BTreeMap<TaskId, NaiveDate> = BTreeMap::new();

    for id in &order {
        let task = dag.get(id).expect("topo order only contains known tasks");
        match task.status {
            TaskStatus::Completed => {
                let start = task
                    .actual_start_date
                    .or(task.start_date)
                    .unwrap_or(project_start);
                let end = task.actual_end_date.or(task.end_date).unwrap_or(start);
                new_start.insert(id.clone(), start);
                new_end.insert(id.clone(), end);
            }
            TaskStatus::InProgress => {
                let start = task
                    .actual_start_date
                    .or(task.start_date)
                    .unwrap_or(project_start);
                let remaining = task.remaining_duration.unwrap_or(Decimal::ZERO).max(Decimal::ZERO);
                let end = calendar.span_end(as_of, remaining);
                new_start.insert(id.clone(), start);
                new_end.insert(id.clone(), end);
            }
            TaskStatus::Planned => {
                let predecessor_end = dag
                    .predecessors_of(id)
                    .iter()
                    .filter_map(|p| new_end.get(p).copied())
                    .max();
                let baseline_start = task.start_date.unwrap_or(project_start);
                let start = predecessor_end.map_or(baseline_start, |pe| pe.max(baseline_start));
                let duration = task.planned_duration.unwrap_or(task.aggressive_duration);
                let end = calendar.span_end(start, duration);
                new_start.insert(id.clone(), start);
                new_end.insert(id.clone(), end);
            }
        }
    }

    for task in tasks.iter_mut() {
        if let Some(&start) = new_start.get(&task.id) {
            task.start_date = Some(start);
        }
        if let Some(&end) = new_end.get(&task.id) {
            task.end_date = Some(end);
        }
    }

    Ok(())
}

/// Updates one buffer's consumption after re-propagation (§4.10). `buffer`
/// doubles as its own baseline: its `start_date` and `original_size` are
/// fixed at `schedule()` time and never mutated afterward, so the delay is
/// always measured against the position the buffer was originally placed
/// at.
///
/// `reference_end` is the new end date of the task the buffer measures
/// against: the critical chain's last task for a project buffer, or the
/// feeding chain's last task for a feeding buffer.
pub fn update_buffer_consumption(
    buffer: &mut Buffer,
    calendar: &Calendar,
    as_of: NaiveDate,
    reference_end: NaiveDate,
) {
    let delay = if reference_end > buffer.start_date {
        calendar.working_days_between(buffer.start_date, reference_end)
    } else {
        Decimal::ZERO
    };
    let remaining = (buffer.original_size - delay).max(Decimal::ZERO);
    buffer.record_consumption(as_of, remaining);
}
