use std::collections::BTreeMap;

use ccpm_core::{
    BufferStrategy, Calendar, Chain, ChainId, ChainKind, FeverZone, InvalidTaskError, Resource,
    ResourceRegistry, SchedulerError, Task, TaskId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::instrument;

use crate::critical_chain;
use crate::dag;
use crate::execution;
use crate::feeding_chain;
use crate::{buffer_sizing, cpm, leveling};

/// An immutable snapshot returned by `schedule()`: the baseline every later
/// execution update is compared against.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub tasks: Vec<Task>,
    pub chains: Vec<Chain>,
    pub buffers: Vec<ccpm_core::Buffer>,
    pub project_start: NaiveDate,
    pub project_end: NaiveDate,
}

/// One chain's data for the fever-chart renderer: a point per recorded
/// buffer-consumption update.
#[derive(Debug, Clone, Default)]
pub struct ChainFeverData {
    pub dates: Vec<NaiveDate>,
    pub completion: Vec<Decimal>,
    pub consumption: Vec<Decimal>,
    pub status: Vec<FeverZone>,
}

fn offset_to_date(calendar: &Calendar, project_start: NaiveDate, offset: Decimal) -> NaiveDate {
    if offset <= Decimal::ZERO {
        project_start
    } else {
        let prior = project_start.pred_opt().expect("date underflow");
        calendar.add_workdays(prior, offset)
    }
}

/// Orchestrates the full planning pipeline (C1 -> forward/backward pass ->
/// C7 -> C5 -> C6 -> C8 -> buffer placement) and the execution-time
/// re-propagation (C10), owning the task registry, resource registry and
/// the chains/buffers it derives from them.
///
/// Single-threaded and non-reentrant per instance, per §5: all public
/// operations assume exclusive `&mut self` access and run to completion
/// synchronously.
#[derive(Debug, Clone)]
pub struct Scheduler {
    start_date: NaiveDate,
    buffer_strategy: BufferStrategy,
    calendar: Calendar,
    tasks: Vec<Task>,
    resources: ResourceRegistry,
    chains: Vec<Chain>,
    buffers: Vec<ccpm_core::Buffer>,
    built: bool,
}

// `BufferStrategy` carries a manual `Debug` impl (see `buffer_strategy.rs`);
// `Scheduler` derives `Debug`/`Clone` on top of that, matching the rest of
// the engine's plain-struct style.

impl Scheduler {
    #[must_use]
    pub fn new(start_date: NaiveDate, buffer_strategy: BufferStrategy) -> Self {
        Self {
            start_date,
            buffer_strategy,
            calendar: Calendar::new(),
            tasks: Vec::new(),
            resources: ResourceRegistry::new(),
            chains: Vec::new(),
            buffers: Vec::new(),
            built: false,
        }
    }

    #[must_use]
    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    fn ensure_not_built(&self) -> Result<(), SchedulerError> {
        if self.built {
            return Err(SchedulerError::ScheduleAlreadyBuilt);
        }
        Ok(())
    }

    pub fn set_resources(&mut self, resources: Vec<Resource>) -> Result<(), SchedulerError> {
        self.ensure_not_built()?;
        for resource in resources {
            self.resources.register(resource);
        }
        Ok(())
    }

    pub fn add_task(&mut self, task: Task) -> Result<(), SchedulerError> {
        self.ensure_not_built()?;
        for req in &task.resources {
            if !self.resources.contains(&req.name) {
                return Err(SchedulerError::InvalidTask(InvalidTaskError::UnknownResource(
                    task.id.clone(),
                    req.name.clone(),
                )));
            }
        }
        self.tasks.push(task);
        Ok(())
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    #[must_use]
    pub fn buffers(&self) -> &[ccpm_core::Buffer] {
        &self.buffers
    }

    fn validate_dependencies(&self) -> Result<(), SchedulerError> {
        let known: std::collections::BTreeSet<&TaskId> = self.tasks.iter().map(|t| &t.id).collect();
        for task in &self.tasks {
            for dep in &task.dependencies {
                if !known.contains(dep) {
                    return Err(SchedulerError::InvalidTask(InvalidTaskError::UnknownDependency(
                        task.id.clone(),
                        dep.clone(),
                    )));
                }
            }
        }
        Ok(())
    }

    /// Builds the baseline schedule: C1 -> forward/backward pass -> C7 ->
    /// C5 -> C6 -> C8 -> buffer placement, in that fixed order (§4.9). Every
    /// mutation is local to this call; on error the scheduler's state is
    /// left as it was before the call (no partial schedule is retained as
    /// `built`).
    #[instrument(skip(self))]
    pub fn schedule(&mut self) -> Result<Schedule, SchedulerError> {
        self.ensure_not_built()?;
        self.validate_dependencies()?;

        let mut tasks = self.tasks.clone();
        let mut resources = self.resources.clone();

        {
            let _span = tracing::debug_span!("topo_sort").entered();
            dag::topo_order(&tasks)?;
        }

        let cpm_schedule = {
            let _span = tracing::debug_span!("forward_pass_backward_pass").entered();
            cpm::compute(&tasks, |t| t.aggressive_duration)?
        };

        for task in &mut tasks {
            task.lock_planned_duration();
            if let Some(result) = cpm_schedule.get(&task.id) {
                task.early_start = Some(result.early_start);
                task.early_finish = Some(result.early_finish);
                task.late_start = Some(result.late_start);
                task.late_finish = Some(result.late_finish);
                task.slack = Some(result.total_slack);
                task.is_critical = result.is_critical;
                task.start_date = Some(offset_to_date(
                    &self.calendar,
                    self.start_date,
                    result.early_start,
                ));
                task.end_date = Some(
                    self.calendar
                        .span_end(task.start_date.unwrap(), task.aggressive_duration),
                );
            }
        }

        {
            let _span = tracing::debug_span!("level_resources").entered();
            leveling::level_resources(&mut tasks, &mut resources, &self.calendar, self.start_date)?;
        }

        let critical_path = {
            let _span = tracing::debug_span!("critical_chain").entered();
            let chain = critical_chain::compute(&tasks, &self.calendar)?;
            critical_chain::mark_critical(&mut tasks, &chain);
            chain
        };

        let feeding_chains = {
            let _span = tracing::debug_span!("feeding_chains").entered();
            feeding_chain::extract(&tasks, &critical_path)?
        };

        let mut chains = Vec::new();
        let mut buffers = Vec::new();

        {
            let _span = tracing::debug_span!("buffer_sizing").entered();

            let mut critical_chain_obj =
                Chain::new("critical", ChainKind::Critical, critical_path.clone())
                    .map_err(SchedulerError::InvalidTask)?;
            let project_buf = buffer_sizing::project_buffer(
                &self.buffer_strategy,
                &tasks,
                &critical_path,
                &self.calendar,
                critical_chain_obj.id.clone(),
            )
            .map_err(SchedulerError::InvalidTask)?;
            critical_chain_obj.buffer = Some(project_buf.id.clone());
            for id in &critical_path {
                if let Some(t) = tasks.iter_mut().find(|t| &t.id == id) {
                    t.chain_id = Some(critical_chain_obj.id.clone());
                }
            }
            buffers.push(project_buf);
            chains.push(critical_chain_obj);

            for fc in &feeding_chains {
                let mut chain_obj = Chain::new(fc.id.clone(), ChainKind::Feeding, fc.tasks.clone())
                    .map_err(SchedulerError::InvalidTask)?;
                let buffer = buffer_sizing::feeding_buffer(
                    &self.buffer_strategy,
                    &mut tasks,
                    fc,
                    chain_obj.buffer_ratio,
                    &self.calendar,
                )
                .map_err(SchedulerError::InvalidTask)?;
                chain_obj.buffer = Some(buffer.id.clone());
                for id in &fc.tasks {
                    if let Some(t) = tasks.iter_mut().find(|t| &t.id == id) {
                        t.chain_id = Some(chain_obj.id.clone());
                    }
                }
                buffers.push(buffer);
                chains.push(chain_obj);
            }
        }

        self.tasks = tasks;
        self.resources = resources;
        self.chains = chains;
        self.buffers = buffers;
        self.built = true;

        let project_end = self
            .buffers
            .first()
            .map(|b| b.end_date)
            .unwrap_or(self.start_date);

        Ok(Schedule {
            tasks: self.tasks.clone(),
            chains: self.chains.clone(),
            buffers: self.buffers.clone(),
            project_start: self.start_date,
            project_end,
        })
    }

    /// Records progress on one task (§4.4/§4.10's state machine). Not
    /// gated by `built` — a caller would normally only report progress
    /// after `schedule()`, but the engine does not enforce that ordering
    /// itself.
    pub fn update_task_progress(
        &mut self,
        task_id: &str,
        remaining: Decimal,
        as_of: NaiveDate,
    ) -> Result<(), SchedulerError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| SchedulerError::UnknownTaskId(task_id.to_string()))?;
        task.update_remaining(remaining, as_of)
    }

    /// Re-propagates dates from `as_of` (§4.9/§4.10) and appends a
    /// consumption-history record to every buffer.
    #[instrument(skip(self))]
    pub fn recalculate_network_from_progress(
        &mut self,
        as_of: NaiveDate,
    ) -> Result<(), SchedulerError> {
        execution::recalculate(&mut self.tasks, &self.calendar, as_of, self.start_date)?;

        for buffer in &mut self.buffers {
            let chain = self.chains.iter().find(|c| c.id == buffer.source_chain);
            let reference_end = chain
                .and_then(|c| c.tasks.last())
                .and_then(|id| self.tasks.iter().find(|t| &t.id == id))
                .and_then(|t| t.end_date);
            if let Some(reference_end) = reference_end {
                execution::update_buffer_consumption(buffer, &self.calendar, as_of, reference_end);
            }
        }

        Ok(())
    }

    /// The plain-text schedule report (§6).
    #[must_use]
    pub fn schedule_report(&self) -> String {
        let project_end = self
            .buffers
            .first()
            .map(|b| b.end_date)
            .unwrap_or(self.start_date);
        crate::report::schedule_report(
            &self.tasks,
            &self.chains,
            &self.buffers,
            self.start_date,
            project_end,
        )
    }

    /// The plain-text execution report (§6).
    #[must_use]
    pub fn execution_report(&self) -> String {
        crate::report::execution_report(&self.tasks, &self.chains, &self.buffers, &self.calendar)
    }

    fn chain_completion_pct(&self, chain: &Chain) -> Decimal {
        let mut completed = Decimal::ZERO;
        let mut planned = Decimal::ZERO;
        for id in &chain.tasks {
            if let Some(t) = self.tasks.iter().find(|t| &t.id == id) {
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

    /// Per-chain time series consumed by the fever-chart renderer: one
    /// point per recorded buffer-consumption update, paired with the
    /// chain's current completion percentage (§6).
    #[must_use]
    pub fn fever_chart_data(&self) -> BTreeMap<ChainId, ChainFeverData> {
        let mut out = BTreeMap::new();
        for chain in &self.chains {
            let Some(buffer_id) = &chain.buffer else { continue };
            let Some(buffer) = self.buffers.iter().find(|b| &b.id == buffer_id) else { continue };
            let completion = self.chain_completion_pct(chain);

            let mut data = ChainFeverData::default();
            for record in &buffer.consumption_history {
                data.dates.push(record.date);
                data.completion.push(completion);
                data.consumption.push(record.consumption_pct);
                data.status
                    .push(ccpm_core::fever_zone(completion, record.consumption_pct));
            }
            out.insert(chain.id.clone(), data);
        }
        out
    }
}
