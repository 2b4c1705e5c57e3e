use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::error::SchedulerError;
use crate::model::{ResourceName, TaskId};

/// One task's claim on a resource for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub task_id: TaskId,
    pub units: Decimal,
}

/// An arrival or departure of resource capacity (a new hire, a contractor
/// rolling off), recorded for the fever-chart/reporting collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEventKind {
    Arrival,
    Departure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub date: NaiveDate,
    pub kind: FlowEventKind,
}

/// A named pool of capacity: `capacity` concurrent units at full
/// availability, modulated day-by-day by `calendar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub name: ResourceName,
    pub capacity: Decimal,
    pub calendar: Calendar,
    pub allow_overallocation: bool,
    pub allocations: BTreeMap<NaiveDate, Vec<Allocation>>,
    pub tags: BTreeSet<String>,
    pub flow_events: Vec<FlowEvent>,
}

impl Resource {
    #[must_use]
    pub fn new(name: impl Into<ResourceName>, capacity: Decimal, calendar: Calendar) -> Self {
        Self {
            name: name.into(),
            capacity,
            calendar,
            allow_overallocation: false,
            allocations: BTreeMap::new(),
            tags: BTreeSet::new(),
            flow_events: Vec::new(),
        }
    }

    #[must_use]
    pub fn allow_overallocation(mut self, allow: bool) -> Self {
        self.allow_overallocation = allow;
        self
    }

    #[must_use]
    pub fn available_units(&self, day: NaiveDate) -> Decimal {
        self.capacity * self.calendar.availability(day)
    }

    #[must_use]
    pub fn utilization(&self, day: NaiveDate) -> Decimal {
        self.allocations
            .get(&day)
            .map(|entries| entries.iter().map(|a| a.units).sum())
            .unwrap_or(Decimal::ZERO)
    }

    /// Days (in ascending order) on which allocated units exceed the
    /// available capacity, regardless of `allow_overallocation`.
    #[must_use]
    pub fn overallocated_days(&self) -> Vec<NaiveDate> {
        self.allocations
            .keys()
            .copied()
            .filter(|day| self.utilization(*day) > self.available_units(*day))
            .collect()
    }

    fn allocate_day(
        &mut self,
        day: NaiveDate,
        units: Decimal,
        task_id: &TaskId,
    ) -> Result<(), SchedulerError> {
        let available = self.available_units(day);
        let requested = self.utilization(day) + units;
        if requested > available && !self.allow_overallocation {
            return Err(SchedulerError::ResourceOverallocation {
                resource: self.name.clone(),
                day,
                requested,
                available,
            });
        }
        self.allocations.entry(day).or_default().push(Allocation {
            task_id: task_id.clone(),
            units,
        });
        Ok(())
    }

    fn deallocate_day(&mut self, day: NaiveDate, task_id: &TaskId) {
        if let Some(entries) = self.allocations.get_mut(&day) {
            if let Some(pos) = entries.iter().position(|a| &a.task_id == task_id) {
                entries.remove(pos);
            }
            if entries.is_empty() {
                self.allocations.remove(&day);
            }
        }
    }

    /// Allocates `units` of this resource to `task_id` on every day in
    /// `days`. Transactional: if any day fails, every day already applied in
    /// this call is rolled back before the error is returned.
    pub fn allocate(
        &mut self,
        days: &[NaiveDate],
        units: Decimal,
        task_id: &TaskId,
    ) -> Result<(), SchedulerError> {
        let mut applied = Vec::with_capacity(days.len());
        for &day in days {
            match self.allocate_day(day, units, task_id) {
                Ok(()) => applied.push(day),
                Err(e) => {
                    for day in applied {
                        self.deallocate_day(day, task_id);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Removes `task_id`'s allocation on every day in `days`.
    pub fn deallocate(&mut self, days: &[NaiveDate], task_id: &TaskId) {
        for &day in days {
            self.deallocate_day(day, task_id);
        }
    }
}

/// The scheduler's owned collection of named resources, kept in a
/// `BTreeMap` so iteration is always in ascending-name order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRegistry {
    resources: BTreeMap<ResourceName, Resource>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource: Resource) {
        self.resources.insert(resource.name.clone(), resource);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Resource, SchedulerError> {
        self.resources
            .get_mut(name)
            .ok_or_else(|| SchedulerError::UnknownResourceName(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Ascending-name iteration, matching the canonical ordering rule used
    /// everywhere else in the engine.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceName, &Resource)> {
        self.resources.iter()
    }

    pub fn allocate(
        &mut self,
        name: &str,
        days: &[NaiveDate],
        units: Decimal,
        task_id: &TaskId,
    ) -> Result<(), SchedulerError> {
        self.get_mut(name)?.allocate(days, units, task_id)
    }

    pub fn deallocate(&mut self, name: &str, days: &[NaiveDate], task_id: &TaskId) {
        if let Ok(resource) = self.get_mut(name) {
            resource.deallocate(days, task_id);
        }
    }

    #[must_use]
    pub fn is_overallocated(&self) -> bool {
        self.resources
            .values()
            .any(|r| !r.overallocated_days().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn allocate_within_capacity_succeeds() {
        let mut r = Resource::new("Red", dec!(1.0), Calendar::new());
        let days = vec![date(2025, 4, 1), date(2025, 4, 2)];
        r.allocate(&days, dec!(1.0), &"T1".to_string()).unwrap();
        assert_eq!(r.utilization(date(2025, 4, 1)), dec!(1.0));
    }

    #[test]
    fn overallocation_is_rejected_and_rolled_back() {
        let mut r = Resource::new("Red", dec!(1.0), Calendar::new());
        let days = vec![date(2025, 4, 1), date(2025, 4, 2), date(2025, 4, 3)];
        r.allocate(&days, dec!(1.0), &"T1".to_string()).unwrap();

        // T2 would conflict on day 2 of its 3-day request; days 0 and 1 must
        // be rolled back rather than left dangling.
        let t2_days = vec![date(2025, 4, 4), date(2025, 4, 2), date(2025, 4, 5)];
        let err = r.allocate(&t2_days, dec!(1.0), &"T2".to_string());
        assert!(err.is_err());
        assert_eq!(r.utilization(date(2025, 4, 4)), Decimal::ZERO);
        assert_eq!(r.utilization(date(2025, 4, 5)), Decimal::ZERO);
        assert_eq!(r.utilization(date(2025, 4, 2)), dec!(1.0)); // only T1's
    }

    #[test]
    fn allow_overallocation_permits_exceeding_capacity() {
        let mut r = Resource::new("Red", dec!(1.0), Calendar::new()).allow_overallocation(true);
        let days = vec![date(2025, 4, 1)];
        r.allocate(&days, dec!(1.0), &"T1".to_string()).unwrap();
        r.allocate(&days, dec!(1.0), &"T2".to_string()).unwrap();
        assert_eq!(r.utilization(date(2025, 4, 1)), dec!(2.0));
        assert_eq!(r.overallocated_days(), vec![date(2025, 4, 1)]);
    }

    #[test]
    fn registry_reports_overallocation() {
        let mut reg = ResourceRegistry::new();
        reg.register(Resource::new("Red", dec!(1.0), Calendar::new()).allow_overallocation(true));
        let days = vec![date(2025, 4, 1)];
        reg.allocate("Red", &days, dec!(1.0), &"T1".to_string())
            .unwrap();
        reg.allocate("Red", &days, dec!(1.0), &"T2".to_string())
            .unwrap();
        assert!(reg.is_overallocated());
    }

    #[test]
    fn unknown_resource_errors() {
        let mut reg = ResourceRegistry::new();
        let err = reg.allocate("Ghost", &[date(2025, 4, 1)], dec!(1.0), &"T1".to_string());
        assert!(matches!(err, Err(SchedulerError::UnknownResourceName(_))));
    }
}
