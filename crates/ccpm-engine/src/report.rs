use std::fmt::Write as _;

use ccpm_core::{Buffer, Calendar, Chain, ChainKind, Task, TaskStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;

fn chain_completion_pct(tasks: &[Task], chain: &Chain) -> Decimal {
    let mut completed = Decimal::ZERO;
    let mut planned = Decimal::ZERO;
    for id in &chain.tasks {
        if let Some(t) = tasks.iter().find(|t| &t.id == id) {
            planned += t.planned_duration.unwrap_or(t.aggressive_duration);
            completed += t
                .progress_history
                .last()
                .map(|r| r.completed_work)
                .unwrap_or(Decimal::ZERO);
        }
    }
    if planned.is_zero() {
        Decimal::ZERO
    } else {
        (completed / planned) * Decimal::from(100)
    }
}

/// The plain-text schedule report (§6): project header, critical chain
/// tasks, feeding chains, the complete task list by ascending start date,
/// and buffer sizing. Exact wording is not normative — downstream tests
/// check field values, not punctuation.
#[must_use]
pub fn schedule_report(
    tasks: &[Task],
    chains: &[Chain],
    buffers: &[Buffer],
    project_start: NaiveDate,
    project_end: NaiveDate,
) -> String {
    let mut out = String::new();
    let project_buffer = buffers.iter().find(|b| b.source_chain == "critical");
    let duration_days = project_end.signed_duration_since(project_start).num_days();

    writeln!(out, "=== Project Schedule ===").unwrap();
    writeln!(out, "Start: {project_start}").unwrap();
    writeln!(out, "Projected end: {project_end}").unwrap();
    writeln!(out, "Duration (calendar days): {duration_days}").unwrap();
    writeln!(
        out,
        "Project buffer size: {}",
        project_buffer.map_or(Decimal::ZERO, |b| b.size_days)
    )
    .unwrap();

    writeln!(out).unwrap();
    writeln!(out, "--- Critical Chain Tasks ---").unwrap();
    if let Some(critical) = chains.iter().find(|c| c.kind == ChainKind::Critical) {
        for id in &critical.tasks {
            if let Some(t) = tasks.iter().find(|t| &t.id == id) {
                writeln!(
                    out,
                    "{} | {} | start {} | end {}",
                    t.id,
                    t.name,
                    t.start_date.map_or_else(|| "-".to_string(), |d| d.to_string()),
                    t.end_date.map_or_else(|| "-".to_string(), |d| d.to_string()),
                )
                .unwrap();
            }
        }
    }

    writeln!(out).unwrap();
    writeln!(out, "--- Feeding Chains ---").unwrap();
    for chain in chains.iter().filter(|c| c.kind == ChainKind::Feeding) {
        let buffer = chain.buffer.as_ref().and_then(|id| buffers.iter().find(|b| &b.id == id));
        writeln!(
            out,
            "{} -> merges into {} | buffer size {}",
            chain.id,
            buffer.map_or_else(|| "-".to_string(), |b| b.attaches_to.clone()),
            buffer.map_or(Decimal::ZERO, |b| b.size_days),
        )
        .unwrap();
        for id in &chain.tasks {
            writeln!(out, "  {id}").unwrap();
        }
    }

    writeln!(out).unwrap();
    writeln!(out, "--- Complete Task Schedule ---").unwrap();
    let mut ordered: Vec<&Task> = tasks.iter().collect();
    ordered.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)));
    for t in ordered {
        writeln!(
            out,
            "{} | start {} | end {} | critical {}",
            t.id,
            t.start_date.map_or_else(|| "-".to_string(), |d| d.to_string()),
            t.end_date.map_or_else(|| "-".to_string(), |d| d.to_string()),
            t.is_critical,
        )
        .unwrap();
    }

    writeln!(out).unwrap();
    writeln!(out, "--- Buffer Information ---").unwrap();
    for b in buffers {
        writeln!(
            out,
            "{} | kind {:?} | size {} | attaches to {}",
            b.id, b.kind, b.size_days, b.attaches_to
        )
        .unwrap();
    }

    out
}

/// The plain-text execution report (§6): everything in the schedule report
/// plus buffer status (size/consumed/remaining/zone), in-progress tasks,
/// completed tasks with schedule variance, and upcoming tasks. Variance is
/// reported in workdays, via `Task::actual_duration` (§4.4), not raw
/// calendar days.
#[must_use]
pub fn execution_report(tasks: &[Task], chains: &[Chain], buffers: &[Buffer], calendar: &Calendar) -> String {
    let mut out = String::new();

    writeln!(out, "=== Execution Status ===").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "--- Buffer Status ---").unwrap();
    for chain in chains {
        let Some(buffer) = chain.buffer.as_ref().and_then(|id| buffers.iter().find(|b| &b.id == id))
        else {
            continue;
        };
        let completion = chain_completion_pct(tasks, chain);
        let zone = ccpm_core::fever_zone(completion, buffer.consumption_pct());
        writeln!(
            out,
            "{} | size {} | consumed {}% | remaining {} | zone {}",
            chain.id,
            buffer.size_days,
            buffer.consumption_pct(),
            buffer.remaining,
            zone,
        )
        .unwrap();
    }

    writeln!(out).unwrap();
    writeln!(out, "--- Tasks In Progress ---").unwrap();
    for t in tasks.iter().filter(|t| matches!(t.status, TaskStatus::InProgress)) {
        writeln!(
            out,
            "{} | remaining {}",
            t.id,
            t.remaining_duration.unwrap_or(Decimal::ZERO)
        )
        .unwrap();
    }

    writeln!(out).unwrap();
    writeln!(out, "--- Completed Tasks ---").unwrap();
    for t in tasks.iter().filter(|t| matches!(t.status, TaskStatus::Completed)) {
        let planned = t.planned_duration.unwrap_or(t.aggressive_duration);
        let actual = t.actual_duration(calendar).unwrap_or(planned);
        let variance = actual - planned;
        writeln!(out, "{} | variance {} workdays", t.id, variance).unwrap();
    }

    writeln!(out).unwrap();
    writeln!(out, "--- Upcoming Tasks ---").unwrap();
    for t in tasks.iter().filter(|t| matches!(t.status, TaskStatus::Planned)) {
        writeln!(
            out,
            "{} | start {}",
            t.id,
            t.start_date.map_or_else(|| "-".to_string(), |d| d.to_string())
        )
        .unwrap();
    }

    out
}
