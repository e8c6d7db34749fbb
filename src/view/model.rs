use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::directory::SensorDescriptor;
use crate::series::{ComparisonSeries, Series};
use crate::station::models::{
    AggregateKind, CapteurMesures, DateFilter, Esp32Device, LatestValues, MesureValue, SensorId,
};

/// Connectivity indicator driven by the snapshot and status classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    #[default]
    Loading,
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    Temperature,
    Humidity,
    Pressure,
}

impl MeasurementKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Pressure => "Pressure",
        }
    }

    #[must_use]
    pub fn default_unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%",
            Self::Pressure => "hPa",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
        }
    }
}

/// `value: None` means "no data yet", which is not the same as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub kind: MeasurementKind,
    pub value: Option<f64>,
    pub unit: String,
}

impl Measurement {
    #[must_use]
    pub fn new(kind: MeasurementKind, value: Option<f64>) -> Self {
        Self {
            kind,
            value,
            unit: kind.default_unit().to_string(),
        }
    }

    fn from_mesure(kind: MeasurementKind, mesure: Option<&MesureValue>) -> Self {
        let unit = mesure
            .and_then(|m| m.unite.clone())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| kind.default_unit().to_string());
        Self {
            kind,
            value: mesure.and_then(|m| m.valeur),
            unit,
        }
    }
}

/// Latest values of one sensor card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReadings {
    pub temperature: Measurement,
    pub humidity: Measurement,
    pub pressure: Measurement,
}

impl SensorReadings {
    #[must_use]
    pub fn measurements(&self) -> [&Measurement; 3] {
        [&self.temperature, &self.humidity, &self.pressure]
    }
}

impl From<&LatestValues> for SensorReadings {
    fn from(values: &LatestValues) -> Self {
        Self {
            temperature: Measurement::new(MeasurementKind::Temperature, values.temperature),
            humidity: Measurement::new(MeasurementKind::Humidity, values.humidity),
            pressure: Measurement::new(MeasurementKind::Pressure, values.pressure),
        }
    }
}

impl From<&CapteurMesures> for SensorReadings {
    fn from(mesures: &CapteurMesures) -> Self {
        Self {
            temperature: Measurement::from_mesure(
                MeasurementKind::Temperature,
                mesures.temperature.as_ref(),
            ),
            humidity: Measurement::from_mesure(MeasurementKind::Humidity, mesures.humidite.as_ref()),
            pressure: Measurement::from_mesure(MeasurementKind::Pressure, mesures.pression.as_ref()),
        }
    }
}

/// A panel that has no meaningful "previous" state to fall back to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "lowercase")]
pub enum Panel<T> {
    #[default]
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Panel<T> {
    #[must_use]
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }
}

/// Everything the renderer projects. Each refresh class writes a disjoint set
/// of fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewModel {
    /// Every sensor ever listed; never pruned.
    known_sensors: BTreeMap<SensorId, SensorDescriptor>,
    /// Sensors of the last successful listing, in listing order.
    active_sensors: Vec<SensorId>,
    directory_loaded: bool,

    connectivity: Connectivity,
    last_update: Option<DateTime<Utc>>,
    latest: BTreeMap<SensorId, SensorReadings>,

    history: BTreeMap<SensorId, Panel<Series>>,
    aggregates: BTreeMap<AggregateKind, Panel<ComparisonSeries>>,
    date_filter: DateFilter,
    dates: Panel<Vec<String>>,

    devices: Panel<Vec<Esp32Device>>,
}

impl ViewModel {
    #[must_use]
    pub fn new(date_filter: DateFilter) -> Self {
        Self {
            date_filter,
            ..Self::default()
        }
    }

    // Status

    /// Replace the active sensor set with a successful listing. View state of
    /// sensors absent from the listing is cleared; their descriptors are kept.
    pub fn apply_directory(&mut self, descriptors: Vec<SensorDescriptor>) {
        self.active_sensors = descriptors.iter().map(|d| d.id.clone()).collect();
        for fresh in descriptors {
            match self.known_sensors.get_mut(&fresh.id) {
                Some(known) => known.merge(fresh),
                None => {
                    self.known_sensors.insert(fresh.id.clone(), fresh);
                }
            }
        }

        let active: BTreeSet<&SensorId> = self.active_sensors.iter().collect();
        self.latest.retain(|id, _| active.contains(id));
        self.history.retain(|id, _| active.contains(id));
        self.directory_loaded = true;
    }

    /// Active sensors in listing order.
    pub fn sensors(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.active_sensors
            .iter()
            .filter_map(|id| self.known_sensors.get(id))
    }

    #[must_use]
    pub fn sensor_ids(&self) -> Vec<SensorId> {
        self.active_sensors.clone()
    }

    #[must_use]
    pub fn sensor(&self, id: &SensorId) -> Option<&SensorDescriptor> {
        self.known_sensors.get(id)
    }

    #[must_use]
    pub fn is_active(&self, id: &SensorId) -> bool {
        self.active_sensors.contains(id)
    }

    #[must_use]
    pub fn directory_loaded(&self) -> bool {
        self.directory_loaded
    }

    // LatestSnapshot

    /// Store a successful snapshot. Values for sensors outside the current
    /// directory are ignored.
    pub fn apply_latest(
        &mut self,
        readings: BTreeMap<SensorId, SensorReadings>,
        now: DateTime<Utc>,
    ) {
        for (id, values) in readings {
            if self.is_active(&id) {
                self.latest.insert(id, values);
            }
        }
        self.mark_online(now);
    }

    pub fn mark_online(&mut self, now: DateTime<Utc>) {
        self.connectivity = Connectivity::Online;
        self.last_update = Some(now);
    }

    /// Background refresh failed: keep what is displayed, flag connectivity.
    pub fn mark_offline(&mut self) {
        self.connectivity = Connectivity::Offline;
    }

    #[must_use]
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    #[must_use]
    pub fn readings(&self, id: &SensorId) -> Option<&SensorReadings> {
        self.latest.get(id)
    }

    // History

    pub fn apply_history(&mut self, panels: Vec<(SensorId, Panel<Series>)>) {
        for (id, panel) in panels {
            if self.is_active(&id) {
                self.history.insert(id, panel);
            }
        }
    }

    #[must_use]
    pub fn history(&self, id: &SensorId) -> Option<&Panel<Series>> {
        self.history.get(id)
    }

    // Aggregate

    pub fn apply_aggregate(&mut self, kind: AggregateKind, panel: Panel<ComparisonSeries>) {
        self.aggregates.insert(kind, panel);
    }

    #[must_use]
    pub fn aggregate(&self, kind: AggregateKind) -> Option<&Panel<ComparisonSeries>> {
        self.aggregates.get(&kind)
    }

    // Date filter and Dates

    pub fn set_date_filter(&mut self, date: DateFilter) {
        self.date_filter = date;
    }

    #[must_use]
    pub fn date_filter(&self) -> &DateFilter {
        &self.date_filter
    }

    pub fn apply_dates(&mut self, dates: Panel<Vec<String>>) {
        self.dates = dates;
    }

    #[must_use]
    pub fn dates(&self) -> &Panel<Vec<String>> {
        &self.dates
    }

    // Devices

    pub fn apply_devices(&mut self, devices: Panel<Vec<Esp32Device>>) {
        self.devices = devices;
    }

    #[must_use]
    pub fn devices(&self) -> &Panel<Vec<Esp32Device>> {
        &self.devices
    }
}
