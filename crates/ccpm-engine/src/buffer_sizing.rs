use ccpm_core::{Buffer, BufferKind, Calendar, ChainId, InvalidTaskError, Task, TaskId};
use ccpm_core::BufferStrategy;

use crate::critical_chain::chain_durations;
use crate::feeding_chain::FeedingChain;

/// Builds the project buffer that follows the critical chain's last task.
/// Sized by the strategy's raw output over the whole chain, with no
/// `buffer_ratio` scaling (§4.8): the critical chain's own buffer_ratio does
/// not apply to itself.
pub fn project_buffer(
    strategy: &BufferStrategy,
    tasks: &[Task],
    critical_chain: &[TaskId],
    calendar: &Calendar,
    chain_id: impl Into<ChainId>,
) -> Result<Buffer, InvalidTaskError> {
    let last_id = critical_chain.last().expect("critical chain is non-empty");
    let last_task = tasks
        .iter()
        .find(|t| &t.id == last_id)
        .expect("critical chain references a known task");
    let durations = chain_durations(tasks, critical_chain);
    let size = strategy.project_buffer_size(&durations);

    let start = last_task.end_date.expect("critical chain task is scheduled");
    let end = calendar.span_end(start, size);

    Buffer::new(
        format!("PB-{}", chain_id.into()),
        BufferKind::Project,
        size,
        start,
        end,
        last_id.clone(),
        "critical",
    )
}

/// Builds one feeding buffer, placed As-Late-As-Possible before the chain's
/// merge point: `end_date = merge_task.start_date`, `start_date = end -
/// size`. If the feeding chain's last task would otherwise finish after the
/// buffer starts, it is shifted left so its `end_date <= buffer.start_date`.
pub fn feeding_buffer(
    strategy: &BufferStrategy,
    tasks: &mut [Task],
    chain: &FeedingChain,
    buffer_ratio: rust_decimal::Decimal,
    calendar: &Calendar,
) -> Result<Buffer, InvalidTaskError> {
    let merge_start = {
        let merge_task = tasks
            .iter()
            .find(|t| t.id == chain.merge_task)
            .expect("merge task is scheduled");
        merge_task
            .start_date
            .expect("critical-chain merge task is scheduled")
    };

    let durations = chain_durations(tasks, &chain.tasks);
    let size = strategy.feeding_buffer_size(&durations, buffer_ratio);

    let end = merge_start;
    let start = calendar.subtract_workdays(end, size);

    let last_task_id = chain.tasks.last().expect("feeding chain is non-empty").clone();
    if let Some(last_task) = tasks.iter_mut().find(|t| t.id == last_task_id) {
        let overruns = last_task.end_date.map_or(true, |e| e > start);
        if overruns {
            let duration = last_task.planned_duration.unwrap_or(last_task.aggressive_duration);
            let new_start = calendar.subtract_workdays(start, duration);
            last_task.start_date = Some(new_start);
            last_task.end_date = Some(start);
        }
    }

    Buffer::new(
        format!("FB-{}", chain.id),
        BufferKind::Feeding,
        size,
        start,
        end,
        chain.merge_task.clone(),
        chain.id.clone(),
    )
}
