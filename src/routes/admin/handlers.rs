use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::common::AppState;
use crate::error::AppResult;
use crate::station::StationApi;
use crate::station::models::{Capteur, DateFilter, DeleteDeviceRequest, NewCapteur};

use super::types::{ActionResponse, ConfigureDeviceBody, RefreshRequest, RefreshResponse};

/// Manual refresh of history and aggregates, optionally switching the date
/// filter first.
pub async fn refresh<S: StationApi + 'static>(
    State(state): State<AppState<S>>,
    body: Option<Json<RefreshRequest>>,
) -> Json<RefreshResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let (history, aggregate) = match request.date {
        Some(date) => state.engine.set_date_filter(DateFilter::new(date)).await,
        None => state.engine.refresh_date_scoped().await,
    };

    Json(RefreshResponse {
        date: state.engine.view_model().date_filter().to_string(),
        history,
        aggregate,
    })
}

pub async fn configure_device<S: StationApi + 'static>(
    State(state): State<AppState<S>>,
    Json(body): Json<ConfigureDeviceBody>,
) -> AppResult<Json<ActionResponse>> {
    state
        .engine
        .configure_device(&body.mac_address, body.sensor_number, body.name.as_deref())
        .await?;
    Ok(Json(ActionResponse::new("Device configured")))
}

pub async fn delete_device<S: StationApi + 'static>(
    State(state): State<AppState<S>>,
    Json(body): Json<DeleteDeviceRequest>,
) -> AppResult<Json<ActionResponse>> {
    state.engine.delete_device(&body.mac_address).await?;
    Ok(Json(ActionResponse::new("Device deleted")))
}

pub async fn add_capteur<S: StationApi + 'static>(
    State(state): State<AppState<S>>,
    Json(body): Json<NewCapteur>,
) -> AppResult<(StatusCode, Json<Capteur>)> {
    let created = state.engine.add_capteur(body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_capteur<S: StationApi + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> AppResult<Json<ActionResponse>> {
    state.engine.delete_capteur(id).await?;
    Ok(Json(ActionResponse::new("Capteur deleted")))
}
