//! End-to-end scenario tests (S1-S6) exercising the full `Scheduler` public
//! API, matching the scenarios worked through in spec.md section 8. Unit
//! tests alongside each module cover the same mechanics in isolation; these
//! drive the whole pipeline the way an external caller would.

use ccpm_core::{BufferKind, Calendar, ChainKind, FeverZone, Resource, ResourceRequirement, Task};
use ccpm_engine::Scheduler;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn resource(name: &str, capacity: Decimal) -> Resource {
    Resource::new(name, capacity, Calendar::new())
}

fn task(id: &str, aggressive: Decimal, safe: Decimal, resource_name: &str) -> Task {
    Task::new(id)
        .unwrap()
        .durations(aggressive, safe)
        .unwrap()
        .requires(ResourceRequirement::new(resource_name, dec!(1)).unwrap())
}

/// S1 — linear critical chain, no leveling, no feeding chains.
#[test]
fn s1_linear_critical_chain_no_leveling() {
    let mut scheduler = Scheduler::new(date(2025, 4, 1), ccpm_core::BufferStrategy::CutAndPaste);
    scheduler
        .set_resources(vec![
            resource("Red", dec!(1)),
            resource("Green", dec!(1)),
            resource("Magenta", dec!(1)),
        ])
        .unwrap();

    scheduler.add_task(task("T1", dec!(30), dec!(45), "Red")).unwrap();
    scheduler
        .add_task(task("T2", dec!(20), dec!(30), "Green").depends_on("T1"))
        .unwrap();
    scheduler
        .add_task(task("T3", dec!(30), dec!(45), "Magenta").depends_on("T2"))
        .unwrap();

    let schedule = scheduler.schedule().unwrap();

    let critical = schedule
        .chains
        .iter()
        .find(|c| c.kind == ChainKind::Critical)
        .unwrap();
    assert_eq!(critical.tasks, vec!["T1", "T2", "T3"]);
    assert_eq!(schedule.chains.len(), 1, "no feeding chains expected");

    let project_buffer = schedule
        .buffers
        .iter()
        .find(|b| b.kind == BufferKind::Project)
        .unwrap();
    assert_eq!(project_buffer.size_days, dec!(40));

    let t3 = schedule.tasks.iter().find(|t| t.id == "T3").unwrap();
    assert_eq!(project_buffer.start_date, t3.end_date.unwrap());
    assert_eq!(schedule.project_end, project_buffer.end_date);
}

/// S2 — a single feeding chain (T4 -> T5) merging into T3 alongside T2.
#[test]
fn s2_single_feeding_chain() {
    let mut scheduler = Scheduler::new(date(2025, 4, 1), ccpm_core::BufferStrategy::CutAndPaste);
    scheduler
        .set_resources(vec![
            resource("Red", dec!(1)),
            // Capacity 2 keeps this scenario focused on feeding-chain
            // extraction and buffer sizing rather than leveling, which S3
            // exercises directly.
            resource("Green", dec!(2)),
            resource("Magenta", dec!(1)),
            resource("Blue", dec!(1)),
        ])
        .unwrap();

    scheduler.add_task(task("T1", dec!(30), dec!(45), "Red")).unwrap();
    scheduler
        .add_task(task("T2", dec!(20), dec!(30), "Green").depends_on("T1"))
        .unwrap();
    scheduler.add_task(task("T4", dec!(20), dec!(20), "Blue")).unwrap();
    scheduler
        .add_task(task("T5", dec!(10), dec!(10), "Green").depends_on("T4"))
        .unwrap();
    scheduler
        .add_task(
            task("T3", dec!(30), dec!(45), "Magenta")
                .depends_on("T2")
                .depends_on("T5"),
        )
        .unwrap();

    let schedule = scheduler.schedule().unwrap();

    let critical = schedule
        .chains
        .iter()
        .find(|c| c.kind == ChainKind::Critical)
        .unwrap();
    assert_eq!(critical.tasks, vec!["T1", "T2", "T3"]);

    let feeding: Vec<_> = schedule
        .chains
        .iter()
        .filter(|c| c.kind == ChainKind::Feeding)
        .collect();
    assert_eq!(feeding.len(), 1);
    assert_eq!(feeding[0].tasks, vec!["T4", "T5"]);

    let feeding_buffer = schedule
        .buffers
        .iter()
        .find(|b| b.kind == BufferKind::Feeding)
        .unwrap();
    // 0.5 * (20 + 10) * 0.5 = 7.5 -> ceil -> 8 workdays.
    assert_eq!(feeding_buffer.size_days, dec!(8));

    let t3 = schedule.tasks.iter().find(|t| t.id == "T3").unwrap();
    assert_eq!(feeding_buffer.end_date, t3.start_date.unwrap(), "ALAP placement");

    let t5 = schedule.tasks.iter().find(|t| t.id == "T5").unwrap();
    assert!(t5.end_date.unwrap() <= feeding_buffer.start_date);
}

/// S3 — T1 and T4 contend for the same unit-capacity resource; T4 has no
/// dependencies and is off the critical chain, so leveling delays T4 rather
/// than lengthening the critical chain.
#[test]
fn s3_resource_conflict_delays_off_critical_task() {
    let mut scheduler = Scheduler::new(date(2025, 4, 1), ccpm_core::BufferStrategy::CutAndPaste);
    scheduler
        .set_resources(vec![
            resource("Red", dec!(1)),
            resource("Green", dec!(1)),
            resource("Magenta", dec!(1)),
        ])
        .unwrap();

    scheduler.add_task(task("T1", dec!(30), dec!(45), "Red")).unwrap();
    scheduler
        .add_task(task("T2", dec!(20), dec!(30), "Green").depends_on("T1"))
        .unwrap();
    scheduler
        .add_task(task("T3", dec!(30), dec!(45), "Magenta").depends_on("T2"))
        .unwrap();
    scheduler.add_task(task("T4", dec!(10), dec!(10), "Red")).unwrap();

    let schedule = scheduler.schedule().unwrap();

    let critical = schedule
        .chains
        .iter()
        .find(|c| c.kind == ChainKind::Critical)
        .unwrap();
    assert_eq!(
        critical.tasks,
        vec!["T1", "T2", "T3"],
        "critical chain is unaffected by T4's leveling delay"
    );

    let t1 = schedule.tasks.iter().find(|t| t.id == "T1").unwrap();
    let t4 = schedule.tasks.iter().find(|t| t.id == "T4").unwrap();
    assert!(!t4.is_critical);
    assert!(
        t4.start_date.unwrap() >= t1.end_date.unwrap(),
        "T4 must wait for Red to free up"
    );
}

/// S4 — starting from S2, T4 reports zero progress after 20 elapsed
/// workdays; its feeding buffer must be fully consumed (red) while the
/// project buffer, untouched, stays at zero consumption.
#[test]
fn s4_feeding_chain_slip_fully_consumes_feeding_buffer() {
    let mut scheduler = Scheduler::new(date(2025, 4, 1), ccpm_core::BufferStrategy::CutAndPaste);
    scheduler
        .set_resources(vec![
            resource("Red", dec!(1)),
            resource("Green", dec!(2)),
            resource("Magenta", dec!(1)),
            resource("Blue", dec!(1)),
        ])
        .unwrap();

    scheduler.add_task(task("T1", dec!(30), dec!(45), "Red")).unwrap();
    scheduler
        .add_task(task("T2", dec!(20), dec!(30), "Green").depends_on("T1"))
        .unwrap();
    scheduler.add_task(task("T4", dec!(20), dec!(20), "Blue")).unwrap();
    scheduler
        .add_task(task("T5", dec!(10), dec!(10), "Green").depends_on("T4"))
        .unwrap();
    scheduler
        .add_task(
            task("T3", dec!(30), dec!(45), "Magenta")
                .depends_on("T2")
                .depends_on("T5"),
        )
        .unwrap();

    scheduler.schedule().unwrap();

    scheduler
        .update_task_progress("T4", dec!(20), date(2025, 4, 21))
        .unwrap();
    scheduler
        .recalculate_network_from_progress(date(2025, 4, 21))
        .unwrap();

    let feeding_buffer = scheduler
        .buffers()
        .iter()
        .find(|b| b.kind == BufferKind::Feeding)
        .unwrap();
    assert_eq!(feeding_buffer.remaining, Decimal::ZERO);
    assert_eq!(feeding_buffer.consumption_pct(), dec!(100));

    let project_buffer = scheduler
        .buffers()
        .iter()
        .find(|b| b.kind == BufferKind::Project)
        .unwrap();
    assert_eq!(project_buffer.consumption_pct(), Decimal::ZERO);

    let feeding_chain_id = scheduler
        .chains()
        .iter()
        .find(|c| c.kind == ChainKind::Feeding)
        .unwrap()
        .id
        .clone();
    let fever = scheduler.fever_chart_data();
    let status = fever
        .get(&feeding_chain_id)
        .and_then(|d| d.status.last())
        .copied()
        .unwrap();
    assert_eq!(status, FeverZone::Red);
}

/// S5 — T1 (the first critical-chain task) is reported complete 10
/// workdays late; the project buffer absorbs exactly that delay.
#[test]
fn s5_project_buffer_consumption_on_critical_slip() {
    let mut scheduler = Scheduler::new(date(2025, 4, 1), ccpm_core::BufferStrategy::CutAndPaste);
    scheduler
        .set_resources(vec![
            resource("Red", dec!(1)),
            resource("Green", dec!(1)),
            resource("Magenta", dec!(1)),
        ])
        .unwrap();

    scheduler.add_task(task("T1", dec!(30), dec!(45), "Red")).unwrap();
    scheduler
        .add_task(task("T2", dec!(20), dec!(30), "Green").depends_on("T1"))
        .unwrap();
    scheduler
        .add_task(task("T3", dec!(30), dec!(45), "Magenta").depends_on("T2"))
        .unwrap();

    let schedule = scheduler.schedule().unwrap();
    let t1_planned_end = schedule.tasks.iter().find(|t| t.id == "T1").unwrap().end_date.unwrap();

    let calendar = Calendar::new();
    // 10 further workdays beyond the planned end, i.e. 10 workdays late.
    let actual_end = calendar.span_end(t1_planned_end, dec!(10));

    scheduler.update_task_progress("T1", Decimal::ZERO, actual_end).unwrap();
    scheduler.recalculate_network_from_progress(actual_end).unwrap();

    let project_buffer = scheduler
        .buffers()
        .iter()
        .find(|b| b.kind == BufferKind::Project)
        .unwrap();
    assert_eq!(project_buffer.original_size, dec!(40));
    assert_eq!(project_buffer.remaining, dec!(30));
    assert_eq!(project_buffer.consumption_pct(), dec!(25));
}

/// S6 — a dependency cycle must be rejected by `schedule()`, not silently
/// dropped or truncated.
#[test]
fn s6_cycle_rejected_direct_and_indirect() {
    let mut direct = Scheduler::new(date(2025, 4, 1), ccpm_core::BufferStrategy::CutAndPaste);
    let t1 = task("T1", dec!(5), dec!(5), "Red").depends_on("T1");
    direct
        .set_resources(vec![resource("Red", dec!(1))])
        .unwrap();
    direct.add_task(t1).unwrap();
    assert!(matches!(
        direct.schedule(),
        Err(ccpm_core::SchedulerError::CycleDetected { .. })
    ));

    let mut indirect = Scheduler::new(date(2025, 4, 1), ccpm_core::BufferStrategy::CutAndPaste);
    indirect
        .set_resources(vec![resource("Red", dec!(1)), resource("Green", dec!(1))])
        .unwrap();
    indirect
        .add_task(task("T1", dec!(5), dec!(5), "Red").depends_on("T2"))
        .unwrap();
    indirect
        .add_task(task("T2", dec!(5), dec!(5), "Green").depends_on("T1"))
        .unwrap();
    assert!(matches!(
        indirect.schedule(),
        Err(ccpm_core::SchedulerError::CycleDetected { .. })
    ));
}
