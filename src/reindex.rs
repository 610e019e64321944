//! Projection of a series onto a uniform daily calendar.

use crate::calendar::CalendarRange;
use crate::series::Series;
use serde::{Deserialize, Serialize};

/// How dates without an observation are filled when reindexing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Uncovered dates stay missing
    #[default]
    None,
    /// Uncovered dates carry the most recent prior value
    ForwardFill,
}

/// Reindexes `series` onto every date of `range`.
///
/// The output has exactly `range.len()` entries.
///
/// With [`FillPolicy::None`] a date takes the observed value or stays missing;
/// nothing is fabricated.
///
/// With [`FillPolicy::ForwardFill`] a date takes the most recent non-missing
/// observation dated at or before it, including observations that precede
/// `range.start()`. This treats a once-a-month reading as the value for every
/// day until the next reading, which is an approximation of the underlying
/// quantity, not a measurement. Dates before the first observation stay
/// missing.
pub fn reindex(series: &Series, range: &CalendarRange, policy: FillPolicy) -> Series {
    match policy {
        FillPolicy::None => Series::from_pairs(range.dates().map(|date| (date, series.get(date)))),
        FillPolicy::ForwardFill => {
            let mut carried = series
                .latest_on_or_before(range.start())
                .map(|(_, value)| value);

            Series::from_pairs(range.dates().map(|date| {
                if let Some(value) = series.get(date) {
                    carried = Some(value);
                }
                (date, carried)
            }))
        }
    }
}
