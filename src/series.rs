//! Series alignment for history tables and comparison charts.
//!
//! History endpoints return five parallel arrays that are meant to be index
//! aligned but are not guaranteed to be the same length. Alignment is by index
//! over the *longest* array: a short array leaves `None` holes, it never
//! truncates the series.

use serde::Serialize;
use serde_json::Value;

use crate::error::AlignmentError;
use crate::station::models::{RawSeries, StatisticalResponse, value_as_f64, value_as_label};

/// One historical sample. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: Option<String>,
    pub hour: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

/// Samples in the order received (oldest first).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    #[must_use]
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Display order: most recent sample first.
    pub fn newest_first(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.points.iter().rev()
    }
}

impl From<Vec<SeriesPoint>> for Series {
    fn from(points: Vec<SeriesPoint>) -> Self {
        Self { points }
    }
}

fn require<'a>(
    field: &'a Option<Vec<Value>>,
    name: &'static str,
) -> Result<&'a [Value], AlignmentError> {
    field.as_deref().ok_or(AlignmentError::MissingField(name))
}

/// Align the five history arrays into a [`Series`] of `max(len)` points.
///
/// Slot `i` of every array lands in point `i`; slots past the end of a shorter
/// array, `null`s, and values of the wrong type become `None`.
///
/// # Errors
///
/// `AlignmentError::MissingField` when one of the arrays is absent altogether.
/// All arrays present but empty is a valid, empty series.
pub fn align(raw: &RawSeries) -> Result<Series, AlignmentError> {
    let date = require(&raw.date, "date")?;
    let hour = require(&raw.hour, "hour")?;
    let temperature = require(&raw.temperature, "temperature")?;
    let humidity = require(&raw.humidity, "humidity")?;
    let pressure = require(&raw.pressure, "pressure")?;

    let n = [
        date.len(),
        hour.len(),
        temperature.len(),
        humidity.len(),
        pressure.len(),
    ]
    .into_iter()
    .max()
    .unwrap_or(0);

    let points = (0..n)
        .map(|i| SeriesPoint {
            date: date.get(i).and_then(value_as_label),
            hour: hour.get(i).and_then(value_as_label),
            temperature: temperature.get(i).and_then(value_as_f64),
            humidity: humidity.get(i).and_then(value_as_f64),
            pressure: pressure.get(i).and_then(value_as_f64),
        })
        .collect();

    Ok(Series { points })
}

/// Two sensors against one shared hour axis, for the comparison charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonSeries {
    pub labels: Vec<String>,
    pub sensor1: Vec<Option<f64>>,
    pub sensor2: Vec<Option<f64>>,
}

impl ComparisonSeries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Zip two datasets against an hour axis, padding every shorter input with
/// `None` (empty label for the axis) up to the longest one.
#[must_use]
pub fn align_by_hour(hours: &[Value], dataset1: &[Value], dataset2: &[Value]) -> ComparisonSeries {
    let n = hours.len().max(dataset1.len()).max(dataset2.len());

    ComparisonSeries {
        labels: (0..n)
            .map(|i| hours.get(i).and_then(value_as_label).unwrap_or_default())
            .collect(),
        sensor1: (0..n).map(|i| dataset1.get(i).and_then(value_as_f64)).collect(),
        sensor2: (0..n).map(|i| dataset2.get(i).and_then(value_as_f64)).collect(),
    }
}

impl From<&StatisticalResponse> for ComparisonSeries {
    fn from(response: &StatisticalResponse) -> Self {
        align_by_hour(&response.hours, &response.data1, &response.data2)
    }
}
