use std::collections::BTreeSet;

use ccpm_core::{Calendar, SchedulerError, Task, TaskId};
use rust_decimal::Decimal;

use crate::dag::longest_path_by_duration;

/// Recomputes the critical chain through a resource-feasible (already
/// leveled) schedule: the longest path weighted by each task's *actual*
/// elapsed workdays (`start_date`..`end_date`) rather than its planned
/// duration, since leveling may have introduced gaps that lengthen some
/// paths more than others. Ties broken by lower terminal task id, per
/// `longest_path_by_duration`.
pub fn compute(tasks: &[Task], calendar: &Calendar) -> Result<Vec<TaskId>, SchedulerError> {
    longest_path_by_duration(tasks, |t| match (t.start_date, t.end_date) {
        (Some(s), Some(e)) => calendar.working_days_between(s, e),
        _ => t.aggressive_duration,
    })
}

/// Sets `is_critical` on every task according to membership in `chain`,
/// clearing it on every task not in the chain.
pub fn mark_critical(tasks: &mut [Task], chain: &[TaskId]) {
    let members: BTreeSet<&TaskId> = chain.iter().collect();
    for task in tasks.iter_mut() {
        task.is_critical = members.contains(&task.id);
    }
}

/// `Σ aggressive_duration` over a chain's aggressive and safe estimates, the
/// input `BufferStrategy` needs.
#[must_use]
pub fn chain_durations(tasks: &[Task], chain: &[TaskId]) -> Vec<(Decimal, Decimal)> {
    chain
        .iter()
        .filter_map(|id| tasks.iter().find(|t| &t.id == id))
        .map(|t| (t.aggressive_duration, t.safe_duration))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccpm_core::Task;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn uses_actual_dates_when_present() {
        let calendar = Calendar::new();
        let mut t1 = Task::new("T1").unwrap().durations(dec!(10), dec!(10)).unwrap();
        t1.start_date = Some(date(2025, 4, 1));
        t1.end_date = Some(date(2025, 4, 11));
        let mut t2 = Task::new("T2")
            .unwrap()
            .durations(dec!(5), dec!(5))
            .unwrap()
            .depends_on("T1");
        t2.start_date = Some(date(2025, 4, 11));
        t2.end_date = Some(date(2025, 4, 16));
        let tasks = vec![t1, t2];
        let chain = compute(&tasks, &calendar).unwrap();
        assert_eq!(chain, vec!["T1", "T2"]);
    }

    #[test]
    fn mark_critical_flags_only_chain_members() {
        let mut t1 = Task::new("T1").unwrap().durations(dec!(1), dec!(1)).unwrap();
        let t2 = Task::new("T2").unwrap().durations(dec!(1), dec!(1)).unwrap();
        t1.is_critical = false;
        let mut tasks = vec![t1, t2];
        mark_critical(&mut tasks, &["T1".to_string()]);
        assert!(tasks[0].is_critical);
        assert!(!tasks[1].is_critical);
    }
}
