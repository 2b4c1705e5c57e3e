use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// The green/yellow/red classification of a chain's `(completion%,
/// consumption%)` pair, the core datum behind the fever-chart renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeverZone {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for FeverZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        };
        write!(f, "{s}")
    }
}

/// A pure total function of `(completion_pct, consumption_pct)`:
/// green if `y < 10 + 0.6x`, yellow if `y < 30 + 0.6x`, red otherwise.
#[must_use]
pub fn zone(completion_pct: Decimal, consumption_pct: Decimal) -> FeverZone {
    let yellow_threshold = dec!(10) + dec!(0.6) * completion_pct;
    let red_threshold = dec!(30) + dec!(0.6) * completion_pct;

    if consumption_pct < yellow_threshold {
        FeverZone::Green
    } else if consumption_pct < red_threshold {
        FeverZone::Yellow
    } else {
        FeverZone::Red
    }
}
