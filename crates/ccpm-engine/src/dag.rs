use std::collections::{BTreeMap, BTreeSet};

use ccpm_core::{SchedulerError, Task, TaskId};
use rust_decimal::Decimal;

/// An immutable snapshot of the dependency DAG, built once per `schedule()`
/// or `recalculate_network_from_progress()` call. Every traversal method
/// iterates in ascending task-id order so results are reproducible
/// regardless of the input tasks' insertion order.
pub struct Dag<'a> {
    tasks: &'a [Task],
    index: BTreeMap<TaskId, usize>,
    /// task -> tasks that depend on it (reverse of `Task::dependencies`).
    successors: BTreeMap<TaskId, BTreeSet<TaskId>>,
    /// The canonical topological order, predecessors before successors.
    topo_order: Vec<TaskId>,
}

impl<'a> Dag<'a> {
    /// Builds the snapshot and computes its topological order up front,
    /// failing with `CycleDetected` if the dependency set has a cycle.
    pub fn build(tasks: &'a [Task]) -> Result<Self, SchedulerError> {
        let mut index = BTreeMap::new();
        for (i, t) in tasks.iter().enumerate() {
            index.insert(t.id.clone(), i);
        }

        let mut successors: BTreeMap<TaskId, BTreeSet<TaskId>> = BTreeMap::new();
        for t in tasks {
            successors.entry(t.id.clone()).or_default();
            for dep in &t.dependencies {
                successors.entry(dep.clone()).or_default().insert(t.id.clone());
            }
        }

        let topo_order = topo_order(tasks)?;

        Ok(Self {
            tasks,
            index,
            successors,
            topo_order,
        })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    #[must_use]
    pub fn topo_order(&self) -> &[TaskId] {
        &self.topo_order
    }

    #[must_use]
    pub fn predecessors_of(&self, id: &str) -> BTreeSet<TaskId> {
        self.get(id)
            .map(|t| t.dependencies.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn successors_of(&self, id: &str) -> BTreeSet<TaskId> {
        self.successors.get(id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        self.tasks
    }
}

/// Returns tasks in dependency order (predecessors before successors).
///
/// The ready queue is seeded and drained via a `BTreeSet`, never a
/// `HashMap`, so identical inputs always yield identical output order —
/// required by the determinism invariant regardless of insertion order.
pub fn topo_order(tasks: &[Task]) -> Result<Vec<TaskId>, SchedulerError> {
    let mut in_degree: BTreeMap<TaskId, usize> = BTreeMap::new();
    let mut successors: BTreeMap<TaskId, BTreeSet<TaskId>> = BTreeMap::new();

    for t in tasks {
        in_degree.entry(t.id.clone()).or_insert(0);
        successors.entry(t.id.clone()).or_default();
    }
    for t in tasks {
        for dep in &t.dependencies {
            successors.entry(dep.clone()).or_default().insert(t.id.clone());
            *in_degree.entry(t.id.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<TaskId> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| id.clone())
        .collect();

    let mut order = Vec::with_capacity(tasks.len());
    while let Some(id) = ready.iter().next().cloned() {
        ready.remove(&id);
        order.push(id.clone());
        for succ in successors.get(&id).into_iter().flatten() {
            let deg = in_degree.get_mut(succ).expect("successor must have in-degree entry");
            *deg -= 1;
            if *deg == 0 {
                ready.insert(succ.clone());
            }
        }
    }

    if order.len() != tasks.len() {
        let remaining: Vec<TaskId> = in_degree
            .into_iter()
            .filter(|(id, _)| !order.contains(id))
            .map(|(id, _)| id)
            .collect();
        return Err(SchedulerError::CycleDetected { path: remaining });
    }

    Ok(order)
}

/// The reverse graph, `task -> tasks that depend on it`: every original
/// edge `dep -> t` (from `t.dependencies`) flipped to `t -> dep`'s
/// successors entry. Used by the backward pass (§4.1), which walks from
/// sinks toward sources along this reversed adjacency rather than
/// `Task::dependencies` directly.
#[must_use]
pub fn reverse_graph(tasks: &[Task]) -> BTreeMap<TaskId, BTreeSet<TaskId>> {
    let mut reversed: BTreeMap<TaskId, BTreeSet<TaskId>> =
        tasks.iter().map(|t| (t.id.clone(), BTreeSet::new())).collect();
    for t in tasks {
        for dep in &t.dependencies {
            reversed.entry(t.id.clone()).or_default().insert(dep.clone());
        }
    }
    reversed
}

/// The longest path through the DAG by `Σ weight_fn(t)`, ties broken by
/// lower task id at every step (both for the starting task and whenever two
/// predecessors tie for best).
pub fn longest_path_by_duration(
    tasks: &[Task],
    weight_fn: impl Fn(&Task) -> Decimal,
) -> Result<Vec<TaskId>, SchedulerError> {
    let dag = Dag::build(tasks)?;
    let order = dag.topo_order();

    // best[id] = (total weight of the longest path ending at id, predecessor on that path).
    let mut best: BTreeMap<TaskId, (Decimal, Option<TaskId>)> = BTreeMap::new();

    for id in order {
        let task = dag.get(id).expect("topo order only contains known tasks");
        let w = weight_fn(task);

        let mut best_total = w;
        let mut best_pred: Option<TaskId> = None;
        for pred in dag.predecessors_of(id) {
            let (pred_total, _) = best.get(&pred).cloned().unwrap_or((Decimal::ZERO, None));
            let candidate = pred_total + w;
            let better = candidate > best_total
                || (candidate == best_total
                    && best_pred
                        .as_ref()
                        .map_or(true, |current| pred < *current));
            if better {
                best_total = candidate;
                best_pred = Some(pred);
            }
        }
        best.insert(id.clone(), (best_total, best_pred));
    }

    // Pick the terminal task with the highest total, ties broken by lower id.
    let terminal = best
        .iter()
        .max_by(|(id_a, (total_a, _)), (id_b, (total_b, _))| {
            total_a
                .cmp(total_b)
                .then_with(|| id_b.cmp(id_a)) // reversed: lower id wins ties
        })
        .map(|(id, _)| id.clone());

    let Some(mut current) = terminal else {
        return Ok(Vec::new());
    };

    let mut path = vec![current.clone()];
    while let Some((_, Some(pred))) = best.get(&current) {
        path.push(pred.clone());
        current = pred.clone();
    }
    path.reverse();
    Ok(path)
}
