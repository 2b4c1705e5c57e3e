use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

/// `(aggressive_duration, safe_duration)` for one task on a chain — the only
/// inputs a buffer strategy is allowed to see.
pub type ChainTaskDurations = (Decimal, Decimal);

/// How a chain's buffer size is derived from its tasks' duration estimates.
///
/// Modeled as a tagged variant rather than a trait object, per the engine's
/// convention of pure functions over chain data: each arm is a pure
/// function from `&[ChainTaskDurations]` to a size in days.
#[derive(Clone, Copy)]
pub enum BufferStrategy {
    /// `0.5 * Σ aggressive_duration` over the chain.
    CutAndPaste,
    /// `sqrt(Σ (safe - aggressive)^2)` over the chain.
    SumOfSquares,
    /// A caller-supplied pure function, for experimentation with other
    /// sizing policies without touching the engine.
    Custom(fn(&[ChainTaskDurations]) -> Decimal),
}

impl fmt::Debug for BufferStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CutAndPaste => write!(f, "BufferStrategy::CutAndPaste"),
            Self::SumOfSquares => write!(f, "BufferStrategy::SumOfSquares"),
            Self::Custom(_) => write!(f, "BufferStrategy::Custom(..)"),
        }
    }
}

impl BufferStrategy {
    /// The strategy's raw output, before any chain-level ratio scaling or
    /// rounding is applied.
    #[must_use]
    pub fn raw_size(&self, durations: &[ChainTaskDurations]) -> Decimal {
        match self {
            Self::CutAndPaste => {
                let sum: Decimal = durations.iter().map(|(aggressive, _)| *aggressive).sum();
                dec!(0.5) * sum
            }
            Self::SumOfSquares => {
                let sum_sq: Decimal = durations
                    .iter()
                    .map(|(aggressive, safe)| (*safe - *aggressive) * (*safe - *aggressive))
                    .sum();
                sum_sq.sqrt().unwrap_or(Decimal::ZERO)
            }
            Self::Custom(f) => f(durations),
        }
    }

    /// The project buffer's size: the strategy's raw output, rounded up to
    /// whole working days. No `buffer_ratio` scaling — the critical chain's
    /// own buffer is not a feeding chain.
    #[must_use]
    pub fn project_buffer_size(&self, durations: &[ChainTaskDurations]) -> Decimal {
        self.raw_size(durations).ceil()
    }

    /// A feeding chain's buffer size: the strategy's raw output scaled by
    /// the chain's `buffer_ratio`, rounded up to whole working days.
    #[must_use]
    pub fn feeding_buffer_size(
        &self,
        durations: &[ChainTaskDurations],
        buffer_ratio: Decimal,
    ) -> Decimal {
        (self.raw_size(durations) * buffer_ratio).ceil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_and_paste_project_buffer_matches_s1() {
        let durations = vec![(dec!(30), dec!(45)), (dec!(20), dec!(30)), (dec!(30), dec!(45))];
        let size = BufferStrategy::CutAndPaste.project_buffer_size(&durations);
        assert_eq!(size, dec!(40));
    }

    #[test]
    fn cut_and_paste_feeding_buffer_matches_s2() {
        let durations = vec![(dec!(20), dec!(20)), (dec!(10), dec!(10))];
        let size =
            BufferStrategy::CutAndPaste.feeding_buffer_size(&durations, dec!(0.5));
        // 0.5 * 30 * 0.5 = 7.5 -> ceil -> 8.
        assert_eq!(size, dec!(8));
    }

    #[test]
    fn single_task_feeding_chain_uses_half_aggressive() {
        // Open Question #1: a one-task C&P feeding chain buffer is
        // 0.5 * aggressive_duration * buffer_ratio, same uniform rule as
        // any other chain length.
        let durations = vec![(dec!(10), dec!(10))];
        let size = BufferStrategy::CutAndPaste.feeding_buffer_size(&durations, dec!(0.5));
        // 0.5 * 10 * 0.5 = 2.5 -> ceil -> 3.
        assert_eq!(size, dec!(3));
    }

    #[test]
    fn sum_of_squares_sizes_from_duration_gaps() {
        let durations = vec![(dec!(30), dec!(45)), (dec!(20), dec!(30))];
        // sqrt(15^2 + 10^2) = sqrt(225 + 100) = sqrt(325) ~= 18.03.
        let size = BufferStrategy::SumOfSquares.project_buffer_size(&durations);
        assert_eq!(size, dec!(19));
    }

    #[test]
    fn custom_strategy_is_invoked() {
        fn flat_five(_durations: &[ChainTaskDurations]) -> Decimal {
            dec!(5)
        }
        let strategy = BufferStrategy::Custom(flat_five);
        assert_eq!(strategy.raw_size(&[]), dec!(5));
    }
}
