use std::collections::BTreeSet;

use ccpm_core::{ChainId, SchedulerError, Task, TaskId};
use rust_decimal::Decimal;

use crate::dag::Dag;

/// One feeding chain: a maximal, vertex-disjoint run of non-critical tasks
/// that merges into `merge_task` on the critical chain, ordered source to
/// sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedingChain {
    pub id: ChainId,
    pub merge_task: TaskId,
    pub tasks: Vec<TaskId>,
}

/// Extracts every feeding chain: for each critical-chain task with
/// non-critical predecessors, walks backward choosing the predecessor with
/// the largest `early_finish` (tying on lower id) until a task with no
/// non-critical predecessors is reached, or a task already claimed by
/// another feeding chain (the walk stops without claiming it).
pub fn extract(tasks: &[Task], critical_chain: &[TaskId]) -> Result<Vec<FeedingChain>, SchedulerError> {
    let dag = Dag::build(tasks)?;
    let critical_set: BTreeSet<&TaskId> = critical_chain.iter().collect();
    let mut claimed: BTreeSet<TaskId> = BTreeSet::new();
    let mut chains = Vec::new();
    let mut counter: u32 = 0;

    for merge_task in critical_chain {
        let mut starters: Vec<TaskId> = dag
            .predecessors_of(merge_task)
            .into_iter()
            .filter(|p| !critical_set.contains(p))
            .collect();
        starters.sort();

        for start in starters {
            if claimed.contains(&start) {
                continue;
            }

            let mut walked = Vec::new();
            let mut current = start;
            loop {
                if claimed.contains(&current) {
                    break;
                }
                walked.push(current.clone());
                claimed.insert(current.clone());

                let mut candidates: Vec<TaskId> = dag
                    .predecessors_of(&current)
                    .into_iter()
                    .filter(|p| !critical_set.contains(p))
                    .collect();
                if candidates.is_empty() {
                    break;
                }
                candidates.sort();
                let next = candidates
                    .into_iter()
                    .max_by(|a, b| {
                        let ea = dag.get(a).and_then(|t| t.early_finish).unwrap_or(Decimal::MIN);
                        let eb = dag.get(b).and_then(|t| t.early_finish).unwrap_or(Decimal::MIN);
                        // tie-break: lower id wins, so reverse the id comparison.
                        ea.cmp(&eb).then_with(|| b.cmp(a))
                    })
                    .expect("candidates is non-empty");
                current = next;
            }

            if walked.is_empty() {
                continue;
            }
            walked.reverse(); // source -> sink
            counter += 1;
            chains.push(FeedingChain {
                id: format!("FC{counter}"),
                merge_task: merge_task.clone(),
                tasks: walked,
            });
        }
    }

    Ok(chains)
}
