use std::collections::BTreeMap;

use ccpm_core::{SchedulerError, Task, TaskId};
use rust_decimal::Decimal;

use crate::dag::Dag;

/// One task's forward/backward-pass results, in workdays elapsed since the
/// project start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpmResult {
    pub early_start: Decimal,
    pub early_finish: Decimal,
    pub late_start: Decimal,
    pub late_finish: Decimal,
    pub total_slack: Decimal,
    pub is_critical: bool,
}

/// The outcome of a full forward+backward pass over a task set.
#[derive(Debug, Clone)]
pub struct CpmSchedule {
    pub results: BTreeMap<TaskId, CpmResult>,
    pub project_end: Decimal,
}

impl CpmSchedule {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CpmResult> {
        self.results.get(id)
    }
}

/// Runs the textbook forward pass (ES/EF in topological order) then
/// backward pass (LF/LS in reverse topological order), then derives total
/// slack and the zero-slack critical-path flag, for every task in `tasks`.
///
/// `duration_fn` supplies the duration used for the pass — the aggressive
/// estimate for the initial planning pass.
pub fn compute(
    tasks: &[Task],
    duration_fn: impl Fn(&Task) -> Decimal,
) -> Result<CpmSchedule, SchedulerError> {
    let dag = Dag::build(tasks)?;
    let order = dag.topo_order();

    let mut es: BTreeMap<TaskId, Decimal> = BTreeMap::new();
    let mut ef: BTreeMap<TaskId, Decimal> = BTreeMap::new();

    for id in order {
        let task = dag.get(id).expect("topo order only contains known tasks");
        let preds = dag.predecessors_of(id);
        let start = preds
            .iter()
            .map(|p| *ef.get(p).expect("predecessor already processed"))
            .max()
            .unwrap_or(Decimal::ZERO);
        let duration = duration_fn(task);
        es.insert(id.clone(), start);
        ef.insert(id.clone(), start + duration);
    }

    let project_end = ef.values().copied().max().unwrap_or(Decimal::ZERO);

    let mut lf: BTreeMap<TaskId, Decimal> = BTreeMap::new();
    let mut ls: BTreeMap<TaskId, Decimal> = BTreeMap::new();

    for id in order.iter().rev() {
        let task = dag.get(id).expect("topo order only contains known tasks");
        let succs = dag.successors_of(id);
        let finish = if succs.is_empty() {
            project_end
        } else {
            succs
                .iter()
                .map(|s| *ls.get(s).expect("successor already processed"))
                .min()
                .expect("non-empty successor set")
        };
        let duration = duration_fn(task);
        lf.insert(id.clone(), finish);
        ls.insert(id.clone(), finish - duration);
    }

    let mut results = BTreeMap::new();
    for id in order {
        let early_start = es[id];
        let early_finish = ef[id];
        let late_start = ls[id];
        let late_finish = lf[id];
        let total_slack = late_start - early_start;
        results.insert(
            id.clone(),
            CpmResult {
                early_start,
                early_finish,
                late_start,
                late_finish,
                total_slack,
                is_critical: total_slack <= Decimal::ZERO,
            },
        );
    }

    Ok(CpmSchedule {
        results,
        project_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccpm_core::Task;
    use rust_decimal_macros::dec;

    #[test]
    fn linear_chain_has_zero_slack_throughout() {
        let t1 = Task::new("T1").unwrap().durations(dec!(30), dec!(30)).unwrap();
        let t2 = Task::new("T2")
            .unwrap()
            .durations(dec!(20), dec!(20))
            .unwrap()
            .depends_on("T1");
        let t3 = Task::new("T3")
            .unwrap()
            .durations(dec!(30), dec!(30))
            .unwrap()
            .depends_on("T2");
        let tasks = vec![t1, t2, t3];
        let schedule = compute(&tasks, |t| t.aggressive_duration).unwrap();

        assert_eq!(schedule.project_end, dec!(80));
        for id in ["T1", "T2", "T3"] {
            let r = schedule.get(id).unwrap();
            assert_eq!(r.total_slack, Decimal::ZERO);
            assert!(r.is_critical);
        }
        assert_eq!(schedule.get("T2").unwrap().early_start, dec!(30));
        assert_eq!(schedule.get("T3").unwrap().early_finish, dec!(80));
    }

    #[test]
    fn parallel_branch_has_positive_slack() {
        let t1 = Task::new("T1").unwrap().durations(dec!(10), dec!(10)).unwrap();
        let t2 = Task::new("T2")
            .unwrap()
            .durations(dec!(20), dec!(20))
            .unwrap()
            .depends_on("T1");
        let t3 = Task::new("T3")
            .unwrap()
            .durations(dec!(5), dec!(5))
            .unwrap()
            .depends_on("T1");
        let t4 = Task::new("T4")
            .unwrap()
            .durations(dec!(5), dec!(5))
            .unwrap()
            .depends_on("T2")
            .depends_on("T3");
        let tasks = vec![t1, t2, t3, t4];
        let schedule = compute(&tasks, |t| t.aggressive_duration).unwrap();

        assert!(schedule.get("T2").unwrap().is_critical);
        assert!(!schedule.get("T3").unwrap().is_critical);
        assert_eq!(schedule.get("T3").unwrap().total_slack, dec!(15));
    }
}
