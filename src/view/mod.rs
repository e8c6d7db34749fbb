//! View model and its projection onto the dashboard document.

pub mod dom;
pub mod model;
pub mod render;

pub use dom::{Document, Element};
pub use model::{Connectivity, Measurement, MeasurementKind, Panel, SensorReadings, ViewModel};
pub use render::{ChartBuffer, ChartSink, RenderPolicy, RenderStats, Renderer};
