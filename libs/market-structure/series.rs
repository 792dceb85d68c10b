//! Append-only bar-indexed series
//!
//! A `Series` is the algorithm's memory: values are only ever pushed, and
//! lookups count backwards from the newest entry the way chart scripts do
//! (`at(0)` is the current bar, `at(1)` the previous one).

use crate::error::{Result, SeriesError};

#[derive(Debug, Clone, PartialEq)]
pub struct Series<T> {
    data: Vec<T>,
}

impl<T> Default for Series<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T: Clone> Series<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a series seeded with a single value
    pub fn with_initial(value: T) -> Self {
        Self { data: vec![value] }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Newest value, if any
    #[inline]
    pub fn current(&self) -> Option<&T> {
        self.data.last()
    }

    /// Second-newest value
    pub fn previous(&self) -> Result<&T> {
        self.at(1)
    }

    /// Value `index` bars back from the newest one
    pub fn at(&self, index: usize) -> Result<&T> {
        let len = self.data.len();
        if index >= len {
            return Err(SeriesError::OutOfRange { index, len });
        }
        Ok(&self.data[len - 1 - index])
    }

    pub fn push(&mut self, value: T) {
        self.data.push(value);
    }

    /// Carry the current value forward one bar
    pub fn next(&mut self) {
        if let Some(current) = self.data.last().cloned() {
            self.data.push(current);
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl Series<i32> {
    /// Difference between the newest and the previous value
    pub fn change(&self) -> Result<i32> {
        Ok(*self.at(0)? - *self.at(1)?)
    }
}

/// Highest of the last `length` values
pub fn highest(values: &[f64], length: usize) -> Result<f64> {
    if values.len() < length {
        return Err(SeriesError::OutOfRange {
            index: length,
            len: values.len(),
        });
    }
    let mut highest = f64::NEG_INFINITY;
    for &value in &values[values.len() - length..] {
        if value > highest {
            highest = value;
        }
    }
    Ok(highest)
}

/// Lowest of the last `length` values
pub fn lowest(values: &[f64], length: usize) -> Result<f64> {
    if values.len() < length {
        return Err(SeriesError::OutOfRange {
            index: length,
            len: values.len(),
        });
    }
    let mut lowest = f64::INFINITY;
    for &value in &values[values.len() - length..] {
        if value < lowest {
            lowest = value;
        }
    }
    Ok(lowest)
}

/// `true` when the value moved from at-or-below the level to strictly above it.
/// NaN levels never cross.
#[inline]
pub fn crossover(previous: f64, current: f64, previous_level: f64, level: f64) -> bool {
    previous <= previous_level && current > level
}

/// `true` when the value moved from strictly above the level to strictly below it.
#[inline]
pub fn crossunder(previous: f64, current: f64, previous_level: f64, level: f64) -> bool {
    previous > previous_level && current < level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_previous_at() {
        let mut series = Series::new();
        for value in [1, 2, 3, 4, 5] {
            series.push(value);
        }
        assert_eq!(series.current(), Some(&5));
        assert_eq!(series.previous(), Ok(&4));
        assert_eq!(series.at(2), Ok(&3));
        assert_eq!(series.at(4), Ok(&1));
        assert_eq!(
            series.at(5),
            Err(SeriesError::OutOfRange { index: 5, len: 5 })
        );
    }

    #[test]
    fn test_next_duplicates_current() {
        let mut series = Series::with_initial(7);
        series.next();
        series.next();
        assert_eq!(series.as_slice(), &[7, 7, 7]);

        let mut empty: Series<i32> = Series::new();
        empty.next();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_previous_requires_two_values() {
        let series = Series::with_initial(1.0);
        assert!(series.previous().is_err());
    }

    #[test]
    fn test_change() {
        let mut legs = Series::with_initial(0);
        legs.push(1);
        assert_eq!(legs.change(), Ok(1));
        legs.push(0);
        assert_eq!(legs.change(), Ok(-1));
        legs.push(0);
        assert_eq!(legs.change(), Ok(0));
    }

    #[test]
    fn test_highest_lowest_window() {
        let values = [5.0, 9.0, 1.0, 3.0, 4.0];
        assert_eq!(highest(&values, 3), Ok(4.0));
        assert_eq!(highest(&values, 4), Ok(9.0));
        assert_eq!(lowest(&values, 3), Ok(1.0));
        assert_eq!(lowest(&values, 2), Ok(3.0));
        assert!(highest(&values, 6).is_err());
        assert!(lowest(&values, 6).is_err());
    }

    #[test]
    fn test_crosses_ignore_nan_levels() {
        assert!(crossover(1.0, 3.0, 2.0, 2.0));
        assert!(crossover(2.0, 3.0, 2.0, 2.0));
        assert!(!crossover(2.5, 3.0, 2.0, 2.0));
        assert!(!crossover(1.0, 3.0, f64::NAN, f64::NAN));

        assert!(crossunder(3.0, 1.0, 2.0, 2.0));
        assert!(!crossunder(2.0, 1.0, 2.0, 2.0));
        assert!(!crossunder(3.0, 1.0, f64::NAN, f64::NAN));
    }
}
