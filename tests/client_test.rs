//! Endpoint client tests against an in-process stub of the station server.
//!
//! Run with: cargo test --test client_test

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

use meteo_sync::config::Config;
use meteo_sync::directory;
use meteo_sync::error::{FetchError, FetchErrorKind};
use meteo_sync::series;
use meteo_sync::station::models::{
    AggregateKind, ConfigureDeviceRequest, DateFilter, NewCapteur, SensorId,
};
use meteo_sync::station::{ApiClient, StationApi};

async fn history(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let date = params.get("date").cloned().unwrap_or_default();
    Json(json!({
        "date": [date, date],
        "hour": ["10:00", "11:00"],
        "temperature": [20.0, "23"],
        "humidity": [null, 44],
        "pressure": [1013.2]
    }))
}

async fn statistical(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let kind = params.get("type").cloned().unwrap_or_default();
    Json(json!({
        "hours": ["10h", "11h", kind],
        "data1": [20.1, 20.4],
        "data2": [19.0, null, 18.2]
    }))
}

async fn configure(Json(body): Json<ConfigureDeviceRequest>) -> impl IntoResponse {
    if body.sensor_number == 2 {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Sensor 2 is already assigned" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "success": true })))
    }
}

async fn add_capteur(Json(body): Json<NewCapteur>) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(json!({
            "id": 12,
            "esp_id": body.esp_id,
            "nom": body.nom,
            "localisation": body.localisation,
            "actif": true
        })),
    )
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "{}"
}

fn stub() -> Router {
    Router::new()
        .route(
            "/api/sensors/status",
            get(|| async { (StatusCode::NOT_FOUND, "Not Found") }),
        )
        .route(
            "/api/sensors",
            get(|| async { Json(json!({ "sensors": ["esp1", "esp2"] })) }),
        )
        .route("/api/history1", get(history))
        .route("/api/statistical", get(statistical))
        .route("/api/statistical_refresh", get(|| async { "" }))
        .route(
            "/api/dates_unique",
            get(|| async { Json(json!(["2024-01-02", "2024-01-01", null])) }),
        )
        .route(
            "/api/all/latest",
            get(|| async { "<html>maintenance</html>" }),
        )
        .route("/api/esp32/devices", get(slow))
        .route("/api/esp32/configure", post(configure))
        .route("/api/capteurs", post(add_capteur))
        .route(
            "/api/capteurs/{id}",
            delete(|| async { Json(json!({ "message": "deleted" })) }),
        )
}

async fn serve_stub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, stub()).await.unwrap();
    });
    format!("http://{addr}")
}

fn client_for(url: String, timeout_seconds: u64) -> ApiClient {
    let config = Config {
        station_api_url: url,
        request_timeout_seconds: timeout_seconds,
        ..Config::default()
    };
    ApiClient::new(&config).unwrap()
}

#[tokio::test]
async fn history_arrays_are_fetched_with_date_and_aligned() {
    let client = client_for(serve_stub().await, 10);

    let raw = assert_ok!(
        client
            .history(&SensorId::new("esp1"), &DateFilter::new("2024-01-01"))
            .await
    );
    let series = assert_ok!(series::align(&raw));

    assert_eq!(series.len(), 2);
    let newest = series.newest_first().next().unwrap();
    assert_eq!(newest.date.as_deref(), Some("2024-01-01"));
    assert_eq!(newest.temperature, Some(23.0));
    assert_eq!(newest.humidity, Some(44.0));
    assert_eq!(newest.pressure, None);
}

#[tokio::test]
async fn statistical_response_pads_to_longest_dataset() {
    let client = client_for(serve_stub().await, 10);

    let response = assert_ok!(
        client
            .statistical(AggregateKind::Pressure, &DateFilter::default())
            .await
    );
    let aligned = series::ComparisonSeries::from(&response);

    assert_eq!(aligned.labels, ["10h", "11h", "pressure"]);
    assert_eq!(aligned.sensor1, [Some(20.1), Some(20.4), None]);
    assert_eq!(aligned.sensor2, [Some(19.0), None, Some(18.2)]);
}

#[tokio::test]
async fn directory_falls_back_to_legacy_listing_on_404() {
    let client = client_for(serve_stub().await, 10);

    let err = assert_err!(client.sensors_status().await);
    assert_eq!(err.kind(), FetchErrorKind::HttpStatus);
    assert!(err.is_not_found());

    let sensors = assert_ok!(
        directory::list_sensors(&client, meteo_sync::config::ApiFlavor::Esp).await
    );
    let ids: Vec<_> = sensors.iter().map(|s| s.id.as_str().to_string()).collect();
    assert_eq!(ids, ["esp1", "esp2"]);
    assert_eq!(sensors[1].display_name, "Sensor 2");
}

#[tokio::test]
async fn server_error_message_is_surfaced() {
    let client = client_for(serve_stub().await, 10);

    let request = ConfigureDeviceRequest {
        mac_address: "AA:BB:CC:DD:EE:FF".into(),
        sensor_number: 2,
        name: "Sensor 2".into(),
    };
    let err = assert_err!(client.configure_device(&request).await);
    assert_eq!(
        err,
        FetchError::HttpStatus {
            status: 400,
            message: "Sensor 2 is already assigned".into(),
        }
    );

    let ok = ConfigureDeviceRequest {
        sensor_number: 3,
        ..request
    };
    assert_ok!(client.configure_device(&ok).await);
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let client = client_for(serve_stub().await, 10);

    let err = assert_err!(client.all_latest().await);
    assert_eq!(err.kind(), FetchErrorKind::Parse);
}

#[tokio::test]
async fn empty_and_loose_bodies_are_accepted() {
    let client = client_for(serve_stub().await, 10);

    assert_ok!(client.statistical_refresh(&DateFilter::default()).await);
    assert_ok!(client.delete_capteur(12).await);

    let dates = assert_ok!(client.dates_unique().await);
    assert_eq!(dates, ["2024-01-02", "2024-01-01"]);

    let created = assert_ok!(
        client
            .add_capteur(&NewCapteur {
                esp_id: "esp5".into(),
                nom: "Attic".into(),
                localisation: None,
            })
            .await
    );
    assert_eq!(created.id, 12);
    assert_eq!(created.esp_id, "esp5");
    assert_eq!(created.actif, Some(true));
}

#[tokio::test]
async fn raw_json_and_text_accessors() {
    let client = client_for(serve_stub().await, 10);

    let value = assert_ok!(client.get_json("/api/sensors", &[]).await);
    assert_eq!(value["sensors"][1], "esp2");

    let text = assert_ok!(client.get_text("/api/all/latest", &[]).await);
    assert_eq!(text, "<html>maintenance</html>");

    let err = assert_err!(client.get_json("/api/missing", &[]).await);
    assert_eq!(
        err,
        FetchError::HttpStatus {
            status: 404,
            message: "Not Found".into(),
        }
    );
}

#[tokio::test]
async fn slow_server_times_out() {
    let client = client_for(serve_stub().await, 1);

    let err = assert_err!(client.esp32_devices().await);
    assert_eq!(err.kind(), FetchErrorKind::Timeout);
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(format!("http://{addr}"), 2);
    let err = assert_err!(client.dates_unique().await);
    assert_eq!(err.kind(), FetchErrorKind::Network);
}
