use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use ccpm_core::{Calendar, ResourceName, ResourceRegistry, SchedulerError, Task, TaskId};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::dag::Dag;

const MAX_ITERATIONS: u32 = 8;

/// A resource day on which the leveling pass still could not find capacity
/// even after the full iteration budget — recorded, not silently dropped,
/// when the registry allows over-allocation (Open Question #3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedConflict {
    pub resource: ResourceName,
    pub day: NaiveDate,
    pub task_ids: Vec<TaskId>,
}

#[derive(Debug, Clone)]
pub struct LevelingResult {
    pub shifted_tasks: Vec<TaskId>,
    pub unresolved_conflicts: Vec<UnresolvedConflict>,
    pub iterations: u32,
}

/// Priority key used both for greedy coloring and for scheduling order
/// within a color class: critical-path tasks first, then earlier
/// `early_start`, then shorter `aggressive_duration`, then lower id.
///
/// `Ord` is derived field-by-field in priority order, and `level_resources`
/// sorts descending so the highest-priority task compares greatest.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PriorityKey {
    is_critical: bool,
    early_start: Decimal,
    aggressive_duration: Decimal,
    task_id: TaskId,
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.is_critical
            .cmp(&other.is_critical)
            .then_with(|| other.early_start.cmp(&self.early_start))
            .then_with(|| other.aggressive_duration.cmp(&self.aggressive_duration))
            .then_with(|| other.task_id.cmp(&self.task_id))
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn span_days(calendar: &Calendar, start: NaiveDate, duration: Decimal) -> Vec<NaiveDate> {
    if duration <= Decimal::ZERO {
        return Vec::new();
    }
    let mut days = Vec::new();
    let mut remaining = duration;
    let mut d = start;
    loop {
        let avail = calendar.availability(d);
        if avail > Decimal::ZERO {
            days.push(d);
            remaining -= avail;
        }
        if remaining <= Decimal::ZERO {
            break;
        }
        d = d.succ_opt().expect("date overflow");
    }
    days
}

/// Builds the conflict graph: an edge between two tasks that (i) share at
/// least one resource and (ii) are not related by dependency (so they
/// "could" overlap purely from the network topology).
fn conflict_graph(tasks: &[Task], dag: &Dag<'_>) -> BTreeMap<TaskId, BTreeSet<TaskId>> {
    let mut graph: BTreeMap<TaskId, BTreeSet<TaskId>> =
        tasks.iter().map(|t| (t.id.clone(), BTreeSet::new())).collect();

    for (i, a) in tasks.iter().enumerate() {
        for b in &tasks[i + 1..] {
            let shares_resource = a
                .resources
                .iter()
                .any(|ra| b.resources.iter().any(|rb| rb.name == ra.name));
            if !shares_resource {
                continue;
            }
            let related = is_ancestor(dag, &a.id, &b.id) || is_ancestor(dag, &b.id, &a.id);
            if related {
                continue;
            }
            graph.get_mut(&a.id).unwrap().insert(b.id.clone());
            graph.get_mut(&b.id).unwrap().insert(a.id.clone());
        }
    }
    graph
}

fn is_ancestor(dag: &Dag<'_>, candidate_ancestor: &str, descendant: &str) -> bool {
    let mut stack: Vec<TaskId> = dag.predecessors_of(descendant).into_iter().collect();
    let mut seen: BTreeSet<TaskId> = BTreeSet::new();
    while let Some(id) = stack.pop() {
        if id == candidate_ancestor {
            return true;
        }
        if !seen.insert(id.clone()) {
            continue;
        }
        stack.extend(dag.predecessors_of(&id));
    }
    false
}

/// Greedy graph coloring: processes tasks in descending priority order and
/// assigns each the lowest color not already used by a conflicting
/// neighbor, so critical-path tasks land in color 0.
fn color_graph(
    priority_order: &[TaskId],
    graph: &BTreeMap<TaskId, BTreeSet<TaskId>>,
) -> BTreeMap<TaskId, u32> {
    let mut colors: BTreeMap<TaskId, u32> = BTreeMap::new();
    for id in priority_order {
        let neighbor_colors: BTreeSet<u32> = graph
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|n| colors.get(n).copied())
            .collect();
        let mut color = 0;
        while neighbor_colors.contains(&color) {
            color += 1;
        }
        colors.insert(id.clone(), color);
    }
    colors
}

/// Finds the earliest start date `>= desired_start` at which every resource
/// `task` requires has the full `duration` span available, allocating on
/// success.
fn schedule_task(
    task: &Task,
    desired_start: NaiveDate,
    duration: Decimal,
    calendar: &Calendar,
    resources: &mut ResourceRegistry,
) -> Result<(NaiveDate, NaiveDate), SchedulerError> {
    let mut candidate = desired_start;
    loop {
        let days = span_days(calendar, candidate, duration);
        let fits = task.resources.iter().all(|req| {
            resources
                .get(&req.name)
                .map(|r| {
                    days.iter()
                        .all(|&d| r.utilization(d) + req.units <= r.available_units(d))
                })
                .unwrap_or(false)
        });
        if fits || task.resources.is_empty() {
            for req in &task.resources {
                resources.allocate(&req.name, &days, req.units, &task.id)?;
            }
            let end = calendar.span_end(candidate, duration);
            return Ok((candidate, end));
        }
        candidate = candidate.succ_opt().expect("date overflow");
    }
}

/// Shifts tasks until no resource is over-allocated on any day, using
/// priority-based greedy coloring plus forward scheduling (spec §4.7).
///
/// Iterates up to a fixed bound, deallocating and rescheduling every task
/// each pass, until the resulting start dates reach a fixed point. Returns
/// `LevelingDidNotConverge` if the bound is exceeded without stabilizing.
pub fn level_resources(
    tasks: &mut [Task],
    resources: &mut ResourceRegistry,
    calendar: &Calendar,
    project_start: NaiveDate,
) -> Result<LevelingResult, SchedulerError> {
    let dag_owned: Vec<Task> = tasks.to_vec();
    let mut previous_starts: Option<BTreeMap<TaskId, NaiveDate>> = None;
    let mut shifted: BTreeSet<TaskId> = BTreeSet::new();
    let mut iterations = 0;

    loop {
        iterations += 1;
        let dag = Dag::build(&dag_owned)?;
        let graph = conflict_graph(&dag_owned, &dag);

        let mut priority_keys: Vec<PriorityKey> = dag_owned
            .iter()
            .map(|t| PriorityKey {
                is_critical: t.is_critical,
                early_start: t.early_start.unwrap_or(Decimal::ZERO),
                aggressive_duration: t.aggressive_duration,
                task_id: t.id.clone(),
            })
            .collect();
        priority_keys.sort_by(|a, b| b.cmp(a));
        let priority_order: Vec<TaskId> = priority_keys.into_iter().map(|k| k.task_id).collect();

        let colors = color_graph(&priority_order, &graph);
        let mut by_color: BTreeMap<u32, Vec<TaskId>> = BTreeMap::new();
        for (id, color) in &colors {
            by_color.entry(*color).or_default().push(id.clone());
        }
        for ids in by_color.values_mut() {
            ids.sort_by_key(|id| {
                priority_order
                    .iter()
                    .position(|p| p == id)
                    .unwrap_or(usize::MAX)
            });
        }

        // Deallocate every task's prior allocation before rescheduling this pass.
        for task in tasks.iter() {
            if let (Some(start), Some(end)) = (task.start_date, task.end_date) {
                let days = span_days(calendar, start, calendar.working_days_between(start, end));
                for req in &task.resources {
                    resources.deallocate(&req.name, &days, &task.id);
                }
            }
        }

        let mut new_starts: BTreeMap<TaskId, NaiveDate> = BTreeMap::new();
        let mut new_ends: BTreeMap<TaskId, NaiveDate> = BTreeMap::new();

        for color in by_color.keys().copied().collect::<Vec<_>>() {
            for id in by_color[&color].clone() {
                let task = tasks.iter().find(|t| t.id == id).expect("task exists").clone();
                let predecessor_ends: Vec<NaiveDate> = dag
                    .predecessors_of(&id)
                    .iter()
                    .filter_map(|p| new_ends.get(p).copied())
                    .collect();
                let desired_start = predecessor_ends
                    .into_iter()
                    .max()
                    .unwrap_or(project_start)
                    .max(task.start_date.unwrap_or(project_start));

                let duration = task.planned_duration.unwrap_or(task.aggressive_duration);
                let (start, end) =
                    schedule_task(&task, desired_start, duration, calendar, resources)?;
                new_starts.insert(id.clone(), start);
                new_ends.insert(id.clone(), end);
            }
        }

        for task in tasks.iter_mut() {
            if let Some(&start) = new_starts.get(&task.id) {
                if task.start_date != Some(start) {
                    shifted.insert(task.id.clone());
                }
                task.start_date = Some(start);
                task.end_date = new_ends.get(&task.id).copied();
            }
        }

        let stable = previous_starts.as_ref().is_some_and(|prev| *prev == new_starts);
        previous_starts = Some(new_starts);

        if stable {
            break;
        }
        if iterations >= MAX_ITERATIONS {
            return Err(SchedulerError::LevelingDidNotConverge { iterations });
        }
    }

    let unresolved_conflicts = resources
        .iter()
        .flat_map(|(name, resource)| {
            resource.overallocated_days().into_iter().map(move |day| UnresolvedConflict {
                resource: name.clone(),
                day,
                task_ids: resource
                    .allocations
                    .get(&day)
                    .map(|allocs| allocs.iter().map(|a| a.task_id.clone()).collect())
                    .unwrap_or_default(),
            })
        })
        .collect();

    Ok(LevelingResult {
        shifted_tasks: shifted.into_iter().collect(),
        unresolved_conflicts,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccpm_core::{Resource, ResourceRequirement};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn independent_tasks_on_same_resource_are_sequenced() {
        let calendar = Calendar::new();
        let project_start = date(2025, 4, 1);

        let mut t1 = Task::new("T1")
            .unwrap()
            .durations(dec!(5), dec!(5))
            .unwrap()
            .requires(ResourceRequirement::new("Red", dec!(1)).unwrap());
        t1.is_critical = true;
        t1.early_start = Some(Decimal::ZERO);
        t1.planned_duration = Some(dec!(5));
        t1.start_date = Some(project_start);

        let mut t4 = Task::new("T4")
            .unwrap()
            .durations(dec!(5), dec!(5))
            .unwrap()
            .requires(ResourceRequirement::new("Red", dec!(1)).unwrap());
        t4.is_critical = false;
        t4.early_start = Some(Decimal::ZERO);
        t4.planned_duration = Some(dec!(5));
        t4.start_date = Some(project_start);

        let mut tasks = vec![t1, t4];
        let mut resources = ResourceRegistry::new();
        resources.register(Resource::new("Red", dec!(1.0), Calendar::new()));

        let result = level_resources(&mut tasks, &mut resources, &calendar, project_start).unwrap();
        assert!(result.unresolved_conflicts.is_empty());

        let t1_after = tasks.iter().find(|t| t.id == "T1").unwrap();
        let t4_after = tasks.iter().find(|t| t.id == "T4").unwrap();
        assert_eq!(t1_after.start_date, Some(project_start));
        assert!(t4_after.start_date.unwrap() >= t1_after.end_date.unwrap());
    }
}
