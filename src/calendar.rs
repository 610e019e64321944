use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Contiguous, inclusive range of calendar dates.
///
/// A `CalendarRange` can only be built through its validating constructors,
/// so every value has `start <= end` and enumerates every day in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl CalendarRange {
    /// Creates a new range covering `start..=end`.
    ///
    /// # Errors
    /// Returns `CalendarGapError::Inverted` if `end` is before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CalendarGapError> {
        if start > end {
            return Err(CalendarGapError::Inverted { start, end });
        }
        Ok(CalendarRange { start, end })
    }

    /// Range ending at `end` and reaching `days` calendar days back.
    ///
    /// `trailing(end, 31)` covers 32 dates: the end date plus 31 prior days.
    ///
    /// # Errors
    /// Returns `CalendarGapError::OutOfRange` if the start would fall before
    /// the earliest representable date.
    pub fn trailing(end: NaiveDate, days: u32) -> Result<Self, CalendarGapError> {
        let start = end
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or(CalendarGapError::OutOfRange { end, days })?;
        Ok(CalendarRange { start, end })
    }

    /// Builds a range from an explicit date sequence.
    ///
    /// The sequence must be ascending with exactly one day between neighbours.
    pub fn from_dates(dates: &[NaiveDate]) -> Result<Self, CalendarGapError> {
        let (first, last) = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(CalendarGapError::Empty),
        };

        for pair in dates.windows(2) {
            if pair[1] != pair[0] + Duration::days(1) {
                return Err(CalendarGapError::NonContiguous {
                    after: pair[0],
                    found: pair[1],
                });
            }
        }

        CalendarRange::new(first, last)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of dates in the range.
    pub fn len(&self) -> usize {
        // start <= end is guaranteed by construction
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Iterates every date in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.len() as i64).map(move |offset| self.start + Duration::days(offset))
    }

    /// Smallest range covering both `self` and `other`.
    pub fn span(&self, other: &CalendarRange) -> CalendarRange {
        CalendarRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Raised when a requested calendar is not a contiguous, ordered range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarGapError {
    /// End date precedes start date
    Inverted { start: NaiveDate, end: NaiveDate },
    /// A date sequence skips or repeats a day
    NonContiguous { after: NaiveDate, found: NaiveDate },
    /// No dates supplied
    Empty,
    /// A trailing window reaches past the earliest representable date
    OutOfRange { end: NaiveDate, days: u32 },
}

impl std::fmt::Display for CalendarGapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarGapError::Inverted { start, end } => {
                write!(f, "Calendar range is inverted: {} is after {}", start, end)
            }
            CalendarGapError::NonContiguous { after, found } => write!(
                f,
                "Calendar is not contiguous: {} follows {}",
                found, after
            ),
            CalendarGapError::Empty => write!(f, "Calendar contains no dates"),
            CalendarGapError::OutOfRange { end, days } => write!(
                f,
                "Calendar window of {} days before {} is out of range",
                days, end
            ),
        }
    }
}

impl std::error::Error for CalendarGapError {}
