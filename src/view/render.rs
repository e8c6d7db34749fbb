//! Idempotent projection of the [`ViewModel`] onto the [`Document`] and the
//! comparison charts.
//!
//! - The sensor grid and the device list are keyed: the subtree is rebuilt only
//!   when the ordered key set changes, otherwise only value elements are
//!   touched so interaction state (open selectors, typed input) survives.
//! - History tables and chart panels are replaced wholesale on every pass.
//! - Charts are created once per kind and then fed new data in place.

use chrono::{DateTime, Duration, Local, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::directory::{SensorDescriptor, SensorStatus};
use crate::series::{ComparisonSeries, SeriesPoint};
use crate::station::models::{AggregateKind, DateFilter, Esp32Device, SensorId};
use crate::view::dom::{Document, Element};
use crate::view::model::{
    Connectivity, Measurement, MeasurementKind, Panel, SensorReadings, ViewModel,
};

pub const PLACEHOLDER: &str = "--";

/// Presentation thresholds, recomputed at every pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPolicy {
    pub hot_threshold: f64,
    pub online_window: Duration,
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self {
            hot_threshold: 22.0,
            online_window: Duration::minutes(5),
        }
    }
}

impl From<&Config> for RenderPolicy {
    fn from(config: &Config) -> Self {
        Self {
            hot_threshold: config.hot_temperature_celsius,
            online_window: Duration::try_seconds(config.online_window_seconds)
                .unwrap_or_else(|| Self::default().online_window),
        }
    }
}

impl RenderPolicy {
    #[must_use]
    pub fn is_hot(&self, temperature: Option<f64>) -> bool {
        temperature.is_some_and(|t| t >= self.hot_threshold)
    }
}

/// Opaque chart object: receives data in place, then redraws.
pub trait ChartSink: Send {
    fn create(kind: AggregateKind) -> Self
    where
        Self: Sized;

    fn set_data(&mut self, labels: &[String], datasets: [&[Option<f64>]; 2]);

    fn redraw(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartStyle {
    Line,
    Bar,
}

/// In-memory chart, served as JSON to whatever draws it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartBuffer {
    pub kind: AggregateKind,
    pub style: ChartStyle,
    pub unit: &'static str,
    pub labels: Vec<String>,
    pub datasets: [Vec<Option<f64>>; 2],
    pub redraws: u64,
}

impl ChartSink for ChartBuffer {
    fn create(kind: AggregateKind) -> Self {
        Self {
            kind,
            style: match kind {
                AggregateKind::Humidity => ChartStyle::Bar,
                _ => ChartStyle::Line,
            },
            unit: kind.unit(),
            labels: Vec::new(),
            datasets: [Vec::new(), Vec::new()],
            redraws: 0,
        }
    }

    fn set_data(&mut self, labels: &[String], datasets: [&[Option<f64>]; 2]) {
        self.labels.clear();
        self.labels.extend_from_slice(labels);
        for (buffer, data) in self.datasets.iter_mut().zip(datasets) {
            buffer.clear();
            buffer.extend_from_slice(data);
        }
    }

    fn redraw(&mut self) {
        self.redraws += 1;
    }
}

/// Counters exposing how the last passes touched the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub passes: u64,
    pub grid_rebuilds: u64,
    pub device_rebuilds: u64,
    pub charts_created: u64,
    pub chart_updates: u64,
}

pub struct Renderer<C: ChartSink = ChartBuffer> {
    policy: RenderPolicy,
    document: Document,
    grid_keys: Option<Vec<SensorId>>,
    device_keys: Option<Vec<String>>,
    /// Sensor slot each selector was last rendered with, by device key
    device_slots: BTreeMap<String, Option<u32>>,
    charts: BTreeMap<AggregateKind, C>,
    chart_data: BTreeMap<AggregateKind, ComparisonSeries>,
    stats: RenderStats,
}

impl<C: ChartSink> Renderer<C> {
    #[must_use]
    pub fn new(policy: RenderPolicy) -> Self {
        Self {
            policy,
            document: Document::default(),
            grid_keys: None,
            device_keys: None,
            device_slots: BTreeMap::new(),
            charts: BTreeMap::new(),
            chart_data: BTreeMap::new(),
            stats: RenderStats::default(),
        }
    }

    pub fn render(&mut self, model: &ViewModel, now: DateTime<Utc>) {
        self.stats.passes += 1;
        self.render_status(model);
        self.render_dates(model);
        self.render_grid(model, now);
        self.render_history(model);
        self.render_charts(model);
        self.render_devices(model);
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct access for interaction state the renderer must not clobber.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    #[must_use]
    pub fn chart(&self, kind: AggregateKind) -> Option<&C> {
        self.charts.get(&kind)
    }

    pub fn charts(&self) -> impl Iterator<Item = (&AggregateKind, &C)> {
        self.charts.iter()
    }

    #[must_use]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    fn render_status(&mut self, model: &ViewModel) {
        let (class, text) = match model.connectivity() {
            Connectivity::Loading => ("status-indicator", "Updating..."),
            Connectivity::Online => ("status-indicator online", "Connected"),
            Connectivity::Offline => ("status-indicator offline", "Offline"),
        };
        let last_update = model.last_update().map_or_else(
            || PLACEHOLDER.to_string(),
            |t| t.with_timezone(&Local).format("%H:%M:%S").to_string(),
        );

        self.document.status.children = vec![
            Element::new("span").with_id("status-indicator").with_class(class),
            Element::new("span").with_id("status-text").with_text(text),
            Element::new("span").with_id("last-update").with_text(last_update),
        ];
    }

    fn render_dates(&mut self, model: &ViewModel) {
        let selected = model.date_filter().as_str();
        let option = |value: &str, label: &str| {
            let el = Element::new("option").with_attr("value", value).with_text(label);
            if value == selected { el.with_attr("selected", "selected") } else { el }
        };

        self.document.dates.children = match model.dates() {
            Panel::Failed(_) => vec![Element::new("option").with_attr("value", "").with_text("Error")],
            Panel::Loading => vec![option(DateFilter::TODAY, "Today")],
            Panel::Ready(dates) => std::iter::once(option(DateFilter::TODAY, "Today"))
                .chain(
                    dates
                        .iter()
                        .filter(|d| d.as_str() != DateFilter::TODAY)
                        .map(|d| option(d.as_str(), d.as_str())),
                )
                .collect(),
        };
    }

    fn render_grid(&mut self, model: &ViewModel, now: DateTime<Utc>) {
        let keys = model.sensor_ids();
        if keys.is_empty() {
            if !matches!(self.grid_keys.as_deref(), Some([])) {
                self.document.grid.children = vec![
                    Element::new("div")
                        .with_id("empty-state")
                        .with_class("empty-state"),
                ];
                self.grid_keys = Some(Vec::new());
                self.stats.grid_rebuilds += 1;
            }
            let text = if model.directory_loaded() {
                "No sensors detected"
            } else {
                "Loading sensors..."
            };
            set_text(&mut self.document, "empty-state", text);
            return;
        }

        if self.grid_keys.as_ref() != Some(&keys) {
            self.document.grid.children = model
                .sensors()
                .map(sensor_card)
                .collect();
            self.grid_keys = Some(keys);
            self.stats.grid_rebuilds += 1;
        }

        for sensor in model.sensors() {
            self.update_card(sensor, model.readings(&sensor.id), now);
        }
    }

    fn update_card(
        &mut self,
        sensor: &SensorDescriptor,
        readings: Option<&SensorReadings>,
        now: DateTime<Utc>,
    ) {
        let id = sensor.id.as_str();
        let status = sensor.status_at(now, self.policy.online_window);
        let status_label = match status {
            SensorStatus::Online => "Online",
            SensorStatus::Offline => "Offline",
        };
        let seen = sensor.last_seen_at.map_or_else(
            || "Never connected".to_string(),
            |t| format!("Last seen {}", t.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
        );

        let doc = &mut self.document;
        if let Some(card) = doc.find_mut(&format!("sensor-{id}")) {
            card.set_classes(&format!("sensor-card {}", status.as_str()));
        }
        set_text(doc, &format!("name-{id}"), &sensor.display_name);
        set_text(
            doc,
            &format!("location-{id}"),
            sensor.location.as_deref().unwrap_or("Not set"),
        );
        set_text(doc, &format!("seen-{id}"), &seen);
        if let Some(el) = doc.find_mut(&format!("status-{id}")) {
            el.set_classes(&format!("sensor-status {}", status.as_str()));
            el.set_text(status_label);
        }

        for measurement in readings.map_or_else(|| empty_measurements().to_vec(), |r| {
            r.measurements().into_iter().cloned().collect()
        }) {
            set_text(
                doc,
                &format!("{}-{id}", measurement.kind.as_str()),
                &format_measurement(&measurement),
            );
        }
    }

    fn render_history(&mut self, model: &ViewModel) {
        let policy = self.policy;
        self.document.history.children = model
            .sensors()
            .map(|sensor| {
                let id = sensor.id.as_str();
                let rows = match model.history(&sensor.id) {
                    None | Some(Panel::Loading) => vec![message_row("Loading...", "loading-row")],
                    Some(Panel::Failed(message)) => {
                        vec![message_row(&format!("Error: {message}"), "error-row")]
                    }
                    Some(Panel::Ready(series)) if series.is_empty() => {
                        vec![message_row("No data", "empty-row")]
                    }
                    Some(Panel::Ready(series)) => series
                        .newest_first()
                        .map(|point| history_row(point, &policy))
                        .collect(),
                };

                Element::new("section")
                    .with_id(format!("history-{id}"))
                    .with_class("history-panel")
                    .child(Element::new("h2").with_text(sensor.display_name.clone()))
                    .child(
                        Element::new("table").child(
                            Element::new("tbody")
                                .with_id(format!("history-{id}-body"))
                                .children(rows),
                        ),
                    )
            })
            .collect();
    }

    fn render_charts(&mut self, model: &ViewModel) {
        let mut panels = Vec::with_capacity(AggregateKind::ALL.len());

        for kind in AggregateKind::ALL {
            let name = kind.as_str();
            let panel = Element::new("div")
                .with_id(format!("chart-{name}"))
                .with_class("chart-panel");

            let body = match model.aggregate(kind) {
                None | Some(Panel::Loading) => Element::new("div")
                    .with_class("chart-loading")
                    .with_text("Loading..."),
                Some(Panel::Failed(message)) => Element::new("div")
                    .with_class("chart-error")
                    .with_text(format!("Error: {message}")),
                Some(Panel::Ready(series)) => {
                    self.update_chart(kind, series);
                    Element::new("canvas").with_id(format!("chart-{name}-canvas"))
                }
            };
            panels.push(panel.child(body));
        }

        self.document.charts.children = panels;
    }

    fn update_chart(&mut self, kind: AggregateKind, series: &ComparisonSeries) {
        if self.chart_data.get(&kind) == Some(series) {
            return;
        }

        let chart = self.charts.entry(kind).or_insert_with(|| {
            self.stats.charts_created += 1;
            C::create(kind)
        });
        chart.set_data(&series.labels, [&series.sensor1, &series.sensor2]);
        chart.redraw();

        self.chart_data.insert(kind, series.clone());
        self.stats.chart_updates += 1;
    }

    fn render_devices(&mut self, model: &ViewModel) {
        let devices = match model.devices() {
            Panel::Loading => return,
            Panel::Failed(_) => {
                self.document.devices.children = vec![
                    Element::new("div")
                        .with_class("error-message")
                        .with_text("Could not reach the station server"),
                ];
                self.device_keys = None;
                return;
            }
            Panel::Ready(devices) => devices,
        };

        if devices.is_empty() {
            if !matches!(self.device_keys.as_deref(), Some([])) {
                self.document.devices.children = vec![
                    Element::new("div")
                        .with_class("no-devices")
                        .with_text("No ESP32 registered yet"),
                ];
                self.device_keys = Some(Vec::new());
                self.stats.device_rebuilds += 1;
            }
            return;
        }

        let keys: Vec<String> = devices.iter().map(|d| d.mac_address.clone()).collect();
        if self.device_keys.as_ref() != Some(&keys) {
            self.document.devices.children = devices.iter().map(device_card).collect();
            self.device_slots = devices
                .iter()
                .map(|d| (device_key(&d.mac_address), d.sensor_number))
                .collect();
            self.device_keys = Some(keys);
            self.stats.device_rebuilds += 1;
        }

        for device in devices {
            let key = device_key(&device.mac_address);
            let doc = &mut self.document;
            // Reset the selector only when the server-side slot moved, so an
            // unsaved pick survives passes that bring no new assignment.
            if self.device_slots.get(&key) != Some(&device.sensor_number)
                && let Some(select) = doc.find_mut(&format!("sensor-select-{key}"))
            {
                select.children = sensor_options(device.sensor_number);
                self.device_slots.insert(key.clone(), device.sensor_number);
            }
            if let Some(dot) = doc.find_mut(&format!("device-{key}-dot")) {
                dot.set_classes(&format!("status-dot {}", device_status(device)));
            }
            set_text(
                doc,
                &format!("device-{key}-status"),
                device.status_text.as_deref().unwrap_or("Unknown"),
            );
            set_text(doc, &format!("device-{key}-ip"), &device_ip(device));
            set_text(doc, &format!("device-{key}-name"), &device_name(device));
        }
    }
}

fn set_text(doc: &mut Document, id: &str, text: &str) {
    if let Some(el) = doc.find_mut(id) {
        el.set_text(text);
    }
}

/// `--` for missing values, one decimal otherwise.
#[must_use]
pub fn format_measurement(measurement: &Measurement) -> String {
    match measurement.value {
        Some(v) if v.is_finite() => format!("{v:.1} {}", measurement.unit),
        _ => PLACEHOLDER.to_string(),
    }
}

fn format_cell(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v} {unit}"),
        _ => PLACEHOLDER.to_string(),
    }
}

fn empty_measurements() -> [Measurement; 3] {
    [
        Measurement::new(MeasurementKind::Temperature, None),
        Measurement::new(MeasurementKind::Humidity, None),
        Measurement::new(MeasurementKind::Pressure, None),
    ]
}

fn sensor_card(sensor: &SensorDescriptor) -> Element {
    let id = sensor.id.as_str();
    let measurements = empty_measurements().map(|m| {
        Element::new("div")
            .with_class("measurement")
            .child(
                Element::new("div")
                    .with_id(format!("{}-{id}", m.kind.as_str()))
                    .with_class("measurement-value")
                    .with_text(PLACEHOLDER),
            )
            .child(
                Element::new("div")
                    .with_class("measurement-label")
                    .with_text(m.kind.label()),
            )
    });

    Element::new("div")
        .with_id(format!("sensor-{id}"))
        .with_class("sensor-card")
        .child(
            Element::new("div")
                .with_class("sensor-header")
                .child(Element::new("div").with_id(format!("name-{id}")).with_class("sensor-name"))
                .child(
                    Element::new("div")
                        .with_id(format!("location-{id}"))
                        .with_class("sensor-location"),
                )
                .child(Element::new("span").with_id(format!("status-{id}")).with_class("sensor-status"))
                .child(Element::new("div").with_id(format!("seen-{id}")).with_class("sensor-seen")),
        )
        .child(
            Element::new("div")
                .with_class("sensor-measurements")
                .children(measurements),
        )
}

fn message_row(text: &str, class: &str) -> Element {
    Element::new("tr").with_class(class).child(
        Element::new("td")
            .with_attr("colspan", "5")
            .with_text(text),
    )
}

fn history_row(point: &SeriesPoint, policy: &RenderPolicy) -> Element {
    let temp_class = if policy.is_hot(point.temperature) {
        "temp-cell hot"
    } else {
        "temp-cell"
    };

    Element::new("tr")
        .child(Element::new("td").with_text(point.date.as_deref().unwrap_or(PLACEHOLDER)))
        .child(Element::new("td").with_text(point.hour.as_deref().unwrap_or(PLACEHOLDER)))
        .child(
            Element::new("td")
                .with_class(temp_class)
                .with_text(format_cell(point.temperature, "°C")),
        )
        .child(Element::new("td").with_text(format_cell(point.humidity, "%")))
        .child(Element::new("td").with_text(format_cell(point.pressure, "hPa")))
}

/// MAC without separators, usable inside element ids.
fn device_key(mac: &str) -> String {
    mac.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn device_status(device: &Esp32Device) -> &str {
    match device.status.as_deref() {
        Some(s @ ("online" | "recent" | "offline")) => s,
        _ => "unknown",
    }
}

fn device_ip(device: &Esp32Device) -> String {
    format!("IP: {}", device.ip_address.as_deref().unwrap_or("Unknown"))
}

fn device_name(device: &Esp32Device) -> String {
    device
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "Not configured".to_string())
}

fn sensor_options(selected: Option<u32>) -> Vec<Element> {
    std::iter::once(
        Element::new("option")
            .with_attr("value", "")
            .with_text("-- Choose --"),
    )
    .chain((1..=10u32).map(|n| {
        let option = Element::new("option")
            .with_attr("value", n.to_string())
            .with_text(format!("Sensor {n}"));
        if selected == Some(n) {
            option.with_attr("selected", "selected")
        } else {
            option
        }
    }))
    .collect()
}

fn device_card(device: &Esp32Device) -> Element {
    let key = device_key(&device.mac_address);

    Element::new("div")
        .with_id(format!("device-{key}"))
        .with_class("device-card")
        .child(
            Element::new("div")
                .with_class("device-header")
                .child(
                    Element::new("span")
                        .with_class("device-mac")
                        .with_text(device.mac_address.clone()),
                )
                .child(Element::new("span").with_id(format!("device-{key}-dot"))),
        )
        .child(
            Element::new("div")
                .with_class("device-info")
                .child(Element::new("p").with_id(format!("device-{key}-status")).with_class("device-status"))
                .child(Element::new("p").with_id(format!("device-{key}-ip")).with_class("device-ip"))
                .child(Element::new("p").with_id(format!("device-{key}-name")).with_class("device-name")),
        )
        .child(
            Element::new("div")
                .with_class("device-config")
                .child(
                    Element::new("select")
                        .with_id(format!("sensor-select-{key}"))
                        .with_class("sensor-select")
                        .children(sensor_options(device.sensor_number)),
                )
                .child(
                    Element::new("input")
                        .with_id(format!("name-input-{key}"))
                        .with_class("name-input")
                        .with_attr("type", "text")
                        .with_attr("value", device.name.clone().unwrap_or_default()),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::SensorListing;
    use crate::series::{Series, align};
    use crate::station::models::{LatestValues, RawSeries};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn model_with(names: &[&str]) -> ViewModel {
        let mut model = ViewModel::default();
        model.apply_directory(
            SensorListing::Legacy(names.iter().map(|n| (*n).to_string()).collect()).normalize(),
        );
        model
    }

    fn latest(id: &str, values: LatestValues) -> BTreeMap<SensorId, SensorReadings> {
        BTreeMap::from([(SensorId::new(id), SensorReadings::from(&values))])
    }

    fn series(value: serde_json::Value) -> Series {
        align(&serde_json::from_value::<RawSeries>(value).unwrap()).unwrap()
    }

    fn text<'a>(renderer: &'a Renderer, id: &str) -> &'a str {
        &renderer.document().find(id).unwrap().text
    }

    #[test]
    fn missing_values_render_placeholder() {
        let mut model = model_with(&["esp1"]);
        model.apply_latest(
            latest(
                "esp1",
                LatestValues {
                    temperature: Some(0.0),
                    humidity: None,
                    pressure: None,
                },
            ),
            now(),
        );

        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());
        renderer.render(&model, now());

        assert_eq!(text(&renderer, "temperature-esp1"), "0.0 °C");
        for id in ["humidity-esp1", "pressure-esp1"] {
            assert_eq!(text(&renderer, id), "--");
        }
        let html = renderer.document().to_html();
        assert!(!html.contains("null"));
        assert!(!html.contains("NaN"));
    }

    #[test]
    fn history_rows_are_newest_first_with_hot_flag() {
        let mut model = model_with(&["esp1"]);
        model.apply_history(vec![(
            SensorId::new("esp1"),
            Panel::Ready(series(json!({
                "date": ["2024-01-01", "2024-01-01"],
                "hour": ["10:00", "11:00"],
                "temperature": [20, 23],
                "humidity": [40],
                "pressure": []
            }))),
        )]);

        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());
        renderer.render(&model, now());

        let body = renderer.document().find("history-esp1-body").unwrap();
        assert_eq!(body.children.len(), 2);
        let first = &body.children[0].children;
        let second = &body.children[1].children;
        assert_eq!(first[1].text, "11:00");
        assert_eq!(first[2].text, "23 °C");
        assert!(first[2].has_class("hot"));
        assert_eq!(first[3].text, "--");
        assert_eq!(second[2].text, "20 °C");
        assert!(!second[2].has_class("hot"));
        assert_eq!(second[3].text, "40 %");
    }

    #[test]
    fn failed_history_renders_error_row() {
        let mut model = model_with(&["esp1"]);
        model.apply_history(vec![(SensorId::new("esp1"), Panel::Failed("HTTP 500".into()))]);

        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());
        renderer.render(&model, now());

        let body = renderer.document().find("history-esp1-body").unwrap();
        assert_eq!(body.children.len(), 1);
        assert!(body.children[0].has_class("error-row"));
        assert_eq!(body.children[0].children[0].text, "Error: HTTP 500");
    }

    #[test]
    fn rendering_twice_is_idempotent() {
        let mut model = model_with(&["esp1", "esp2"]);
        model.apply_latest(
            latest(
                "esp2",
                LatestValues {
                    temperature: Some(21.26),
                    ..Default::default()
                },
            ),
            now(),
        );
        model.apply_aggregate(
            AggregateKind::Temperature,
            Panel::Ready(crate::series::align_by_hour(
                &[json!("10h")],
                &[json!(20.0)],
                &[json!(21.0)],
            )),
        );

        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());
        renderer.render(&model, now());
        let html = renderer.document().to_html();
        let nodes = renderer.document().node_count();
        let chart = renderer.chart(AggregateKind::Temperature).cloned();

        renderer.render(&model, now());

        assert_eq!(renderer.document().to_html(), html);
        assert_eq!(renderer.document().node_count(), nodes);
        assert_eq!(renderer.chart(AggregateKind::Temperature).cloned(), chart);
        assert_eq!(renderer.stats().grid_rebuilds, 1);
        assert_eq!(renderer.stats().chart_updates, 1);
    }

    #[test]
    fn value_updates_do_not_rebuild_the_grid() {
        let mut model = model_with(&["esp1"]);
        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());
        renderer.render(&model, now());

        // Interaction state the renderer does not own.
        renderer
            .document_mut()
            .find_mut("sensor-esp1")
            .unwrap()
            .attrs
            .insert("data-modal".into(), "open".into());

        model.apply_latest(
            latest(
                "esp1",
                LatestValues {
                    temperature: Some(19.0),
                    ..Default::default()
                },
            ),
            now(),
        );
        renderer.render(&model, now());

        assert_eq!(renderer.stats().grid_rebuilds, 1);
        assert_eq!(text(&renderer, "temperature-esp1"), "19.0 °C");
        let card = renderer.document().find("sensor-esp1").unwrap();
        assert_eq!(card.attrs.get("data-modal").map(String::as_str), Some("open"));

        let mut grown = model_with(&["esp1", "esp2"]);
        grown.apply_latest(BTreeMap::new(), now());
        renderer.render(&grown, now());
        assert_eq!(renderer.stats().grid_rebuilds, 2);
        assert!(renderer.document().find("sensor-esp2").is_some());
    }

    #[test]
    fn status_is_recomputed_each_pass() {
        let mut model = ViewModel::default();
        let mut sensor = SensorListing::Legacy(vec!["esp1".into()]).normalize().remove(0);
        sensor.last_seen_at = Some(now() - Duration::minutes(1));
        model.apply_directory(vec![sensor]);

        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());
        renderer.render(&model, now());
        assert_eq!(text(&renderer, "status-esp1"), "Online");

        renderer.render(&model, now() + Duration::minutes(10));
        assert_eq!(text(&renderer, "status-esp1"), "Offline");
        assert!(renderer.document().find("sensor-esp1").unwrap().has_class("offline"));
    }

    #[test]
    fn charts_are_created_once_and_updated_in_place() {
        let mut model = ViewModel::default();
        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());

        for value in [20.0, 21.0, 22.0] {
            model.apply_aggregate(
                AggregateKind::Humidity,
                Panel::Ready(crate::series::align_by_hour(
                    &[json!("10h")],
                    &[json!(value)],
                    &[],
                )),
            );
            renderer.render(&model, now());
        }

        let chart = renderer.chart(AggregateKind::Humidity).unwrap();
        assert_eq!(renderer.stats().charts_created, 1);
        assert_eq!(chart.redraws, 3);
        assert_eq!(chart.style, ChartStyle::Bar);
        assert_eq!(chart.datasets[0], [Some(22.0)]);
        assert_eq!(chart.datasets[1], [None]);
    }

    #[test]
    fn device_value_updates_keep_selector_state() {
        let device = Esp32Device {
            mac_address: "AA:BB:CC:DD:EE:FF".into(),
            status: Some("online".into()),
            status_text: Some("En ligne".into()),
            ..Default::default()
        };
        let mut model = ViewModel::default();
        model.apply_devices(Panel::Ready(vec![device.clone()]));

        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());
        renderer.render(&model, now());
        renderer
            .document_mut()
            .find_mut("name-input-AABBCCDDEEFF")
            .unwrap()
            .attrs
            .insert("value".into(), "typed by user".into());

        let offline = Esp32Device {
            status: Some("offline".into()),
            status_text: Some("Hors ligne (12 min)".into()),
            ..device
        };
        model.apply_devices(Panel::Ready(vec![offline]));
        renderer.render(&model, now());

        assert_eq!(renderer.stats().device_rebuilds, 1);
        let doc = renderer.document();
        assert!(doc.find("device-AABBCCDDEEFF-dot").unwrap().has_class("offline"));
        assert_eq!(doc.find("device-AABBCCDDEEFF-status").unwrap().text, "Hors ligne (12 min)");
        assert_eq!(
            doc.find("name-input-AABBCCDDEEFF").unwrap().attrs["value"],
            "typed by user"
        );
    }

    #[test]
    fn card_status_ignores_server_label() {
        let listing: crate::station::models::SensorsStatusResponse =
            serde_json::from_value(json!({"sensors": [{
                "number": "1",
                "last_date": "2020-01-01",
                "last_hour": "10:00:00",
                "status": "online",
                "status_text": "En ligne"
            }]}))
            .unwrap();
        let mut model = ViewModel::default();
        model.apply_directory(SensorListing::Status(listing.sensors).normalize());

        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());
        renderer.render(&model, now());

        assert_eq!(text(&renderer, "status-esp1"), "Offline");
        assert_eq!(text(&renderer, "seen-esp1"), "Last seen 2020-01-01 10:00");
        assert!(!renderer.document().to_html().contains("En ligne"));
    }

    #[test]
    fn oversized_online_window_falls_back_to_default() {
        let config = Config {
            online_window_seconds: i64::MAX,
            ..Config::default()
        };
        assert_eq!(RenderPolicy::from(&config).online_window, Duration::minutes(5));

        let config = Config {
            online_window_seconds: 120,
            ..Config::default()
        };
        assert_eq!(RenderPolicy::from(&config).online_window, Duration::minutes(2));
    }

    fn selected_slots(renderer: &Renderer, key: &str) -> Vec<String> {
        renderer
            .document()
            .find(&format!("sensor-select-{key}"))
            .unwrap()
            .children
            .iter()
            .filter(|o| o.attrs.contains_key("selected"))
            .map(|o| o.attrs["value"].clone())
            .collect()
    }

    #[test]
    fn reassigned_sensor_slot_updates_selector_without_rebuild() {
        let device = Esp32Device {
            mac_address: "AA:BB:CC:DD:EE:FF".into(),
            sensor_number: Some(1),
            ..Default::default()
        };
        let mut model = ViewModel::default();
        model.apply_devices(Panel::Ready(vec![device.clone()]));
        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());
        renderer.render(&model, now());
        assert_eq!(selected_slots(&renderer, "AABBCCDDEEFF"), ["1"]);

        model.apply_devices(Panel::Ready(vec![Esp32Device {
            sensor_number: Some(3),
            ..device
        }]));
        renderer.render(&model, now());

        assert_eq!(selected_slots(&renderer, "AABBCCDDEEFF"), ["3"]);
        assert_eq!(renderer.stats().device_rebuilds, 1);
    }

    #[test]
    fn empty_directory_shows_empty_state() {
        let model = model_with(&[]);
        let mut renderer: Renderer = Renderer::new(RenderPolicy::default());
        renderer.render(&model, now());
        renderer.render(&model, now());
        assert_eq!(text(&renderer, "empty-state"), "No sensors detected");
        assert_eq!(renderer.stats().grid_rebuilds, 1);

        let mut fresh: Renderer = Renderer::new(RenderPolicy::default());
        fresh.render(&ViewModel::default(), now());
        assert_eq!(text(&fresh, "empty-state"), "Loading sensors...");
    }
}
