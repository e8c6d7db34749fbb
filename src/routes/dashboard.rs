use axum::{
    Json,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
};
use std::collections::BTreeMap;

use crate::common::AppState;
use crate::station::StationApi;
use crate::station::models::AggregateKind;
use crate::view::{ChartBuffer, ViewModel};

/// Rendered dashboard document
pub async fn index<S: StationApi + 'static>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let body = state.engine.document_html();
    let refresh_secs = state.config.refresh_latest_seconds.max(1);

    (
        [(header::CACHE_CONTROL, "no-store")],
        Html(format!(
            "{PAGE_HEAD}<meta http-equiv=\"refresh\" content=\"{refresh_secs}\">\n</head>\n<body>\n{body}</body>\n</html>\n"
        )),
    )
}

/// JSON snapshot of the view model
pub async fn view<S: StationApi + 'static>(State(state): State<AppState<S>>) -> Json<ViewModel> {
    Json(state.engine.view_model())
}

/// Chart buffers keyed by aggregate kind
pub async fn charts<S: StationApi + 'static>(
    State(state): State<AppState<S>>,
) -> Json<BTreeMap<AggregateKind, ChartBuffer>> {
    Json(state.engine.charts())
}

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Weather Station</title>
    <style>
        body { font-family: system-ui, -apple-system, sans-serif; background: #f8fafc; color: #1e293b; margin: 0; padding: 1.5rem; }
        header { display: flex; gap: 1rem; align-items: center; margin-bottom: 1rem; }
        .status-indicator { width: 0.75rem; height: 0.75rem; border-radius: 50%; background: #94a3b8; display: inline-block; }
        .status-indicator.online, .status-dot.online { background: #16a34a; }
        .status-indicator.offline, .status-dot.offline { background: #dc2626; }
        .status-dot { width: 0.6rem; height: 0.6rem; border-radius: 50%; display: inline-block; background: #94a3b8; }
        .status-dot.recent { background: #f59e0b; }
        .sensors-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(260px, 1fr)); gap: 1rem; }
        .sensor-card, .device-card { background: #fff; border: 1px solid #e2e8f0; border-radius: 0.5rem; padding: 1rem; }
        .sensor-card.offline { opacity: 0.6; }
        .measurement-value { font-size: 1.5rem; font-weight: 600; }
        table { border-collapse: collapse; width: 100%; margin-bottom: 1.5rem; }
        td { border-bottom: 1px solid #e2e8f0; padding: 0.25rem 0.5rem; }
        .temp-cell.hot { color: #dc2626; font-weight: 600; }
        .error-row, .chart-error, .error-message { color: #dc2626; }
        .empty-state, .no-devices { color: #64748b; padding: 2rem; text-align: center; }
    </style>
"#;
