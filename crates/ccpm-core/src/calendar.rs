use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A mapping `date -> availability in [0, 1]`, layered over a default of
/// 1.0 on Mon-Fri and 0.0 on Sat-Sun. Overrides (holidays, half-days) take
/// precedence over the default wherever present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Calendar {
    overrides: BTreeMap<NaiveDate, Decimal>,
}

fn default_availability(date: NaiveDate) -> Decimal {
    match date.weekday() {
        Weekday::Sat | Weekday::Sun => Decimal::ZERO,
        _ => Decimal::ONE,
    }
}

impl Calendar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The override for `date` if one was set, else the Mon-Fri default.
    #[must_use]
    pub fn availability(&self, date: NaiveDate) -> Decimal {
        self.overrides
            .get(&date)
            .copied()
            .unwrap_or_else(|| default_availability(date))
    }

    #[must_use]
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.availability(date) > Decimal::ZERO
    }

    /// Sets availability to 0 for every day in `[from, to]`, inclusive.
    pub fn add_unavailable_period(&mut self, from: NaiveDate, to: NaiveDate) {
        let mut d = from;
        while d <= to {
            self.overrides.insert(d, Decimal::ZERO);
            d = d.succ_opt().expect("date overflow");
        }
    }

    /// Sets a specific override availability (e.g. a half-day) for one date.
    pub fn set_availability(&mut self, date: NaiveDate, availability: Decimal) {
        self.overrides.insert(date, availability);
    }

    /// Advances from `start`, skipping non-working days, until the
    /// cumulative availability reaches `n` workdays, and returns the date on
    /// which the nth working day lands. Fractional-availability days count
    /// proportionally.
    #[must_use]
    pub fn add_workdays(&self, start: NaiveDate, n: Decimal) -> NaiveDate {
        if n <= Decimal::ZERO {
            return start;
        }
        let mut remaining = n;
        let mut date = start;
        loop {
            date = date.succ_opt().expect("date overflow");
            let avail = self.availability(date);
            if avail <= Decimal::ZERO {
                continue;
            }
            remaining -= avail;
            if remaining <= Decimal::ZERO {
                return date;
            }
        }
    }

    /// The exclusive end of a span that starts on `start` and consumes
    /// `duration` workdays, counting `start` itself as the first workday if
    /// it is one. Satisfies `working_days_between(start, span_end(start,
    /// duration)) == duration`.
    #[must_use]
    pub fn span_end(&self, start: NaiveDate, duration: Decimal) -> NaiveDate {
        if duration <= Decimal::ZERO {
            return start;
        }
        let prior = start.pred_opt().expect("date underflow");
        self.add_workdays(prior, duration)
            .succ_opt()
            .expect("date overflow")
    }

    /// The mirror image of `add_workdays`: steps backward from `end` until
    /// cumulative availability reaches `n`, returning the start of a span
    /// that consumes exactly `n` workdays ending (exclusively) at `end`.
    #[must_use]
    pub fn subtract_workdays(&self, end: NaiveDate, n: Decimal) -> NaiveDate {
        if n <= Decimal::ZERO {
            return end;
        }
        let mut remaining = n;
        let mut date = end;
        loop {
            date = date.pred_opt().expect("date underflow");
            let avail = self.availability(date);
            if avail <= Decimal::ZERO {
                continue;
            }
            remaining -= avail;
            if remaining <= Decimal::ZERO {
                return date;
            }
        }
    }

    /// The number of working days consumed by the half-open range
    /// `[start, end)`: `Σ availability(d)` for `d` in that range.
    #[must_use]
    pub fn working_days_between(&self, start: NaiveDate, end: NaiveDate) -> Decimal {
        let mut total = Decimal::ZERO;
        let mut d = start;
        while d < end {
            total += self.availability(d);
            d = d.succ_opt().expect("date overflow");
        }
        total
    }
}
