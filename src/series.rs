use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Date-ordered mapping from calendar date to value-or-missing.
///
/// `None` is the explicit missing marker. A date absent from the map is
/// outside the series' support, which is different from a date present with
/// `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: BTreeMap<NaiveDate, Option<f64>>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a series from `(date, value)` pairs; a repeated date keeps the last value.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        Series {
            points: pairs.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, date: NaiveDate, value: Option<f64>) {
        self.points.insert(date, value);
    }

    /// Value at `date`; `None` when the date is missing or outside the support.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points.get(&date).copied().flatten()
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.points.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.points.iter().map(|(date, value)| (*date, *value))
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.keys().copied()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.values().copied().collect()
    }

    /// Dates carrying an actual value.
    pub fn observed_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points
            .iter()
            .filter(|(_, value)| value.is_some())
            .map(|(date, _)| *date)
    }

    pub fn missing_count(&self) -> usize {
        self.points.values().filter(|value| value.is_none()).count()
    }

    /// Most recent non-missing value dated at or before `date`.
    pub fn latest_on_or_before(&self, date: NaiveDate) -> Option<(NaiveDate, f64)> {
        self.points
            .range(..=date)
            .rev()
            .find_map(|(d, value)| value.map(|v| (*d, v)))
    }

    /// Latest date carrying an actual value.
    pub fn last_observed(&self) -> Option<NaiveDate> {
        self.points
            .iter()
            .rev()
            .find_map(|(date, value)| value.map(|_| *date))
    }

    /// Rounds every value to `decimals` places.
    pub fn rounded(&self, decimals: u32) -> Series {
        let scale = 10f64.powi(decimals as i32);
        Series {
            points: self
                .points
                .iter()
                .map(|(date, value)| (*date, value.map(|v| (v * scale).round() / scale)))
                .collect(),
        }
    }
}
