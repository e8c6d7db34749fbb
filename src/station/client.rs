use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::station::StationApi;
use crate::station::models::{
    AggregateKind, AllLatestResponse, ApiErrorBody, Capteur, CapteurLatest,
    ConfigureDeviceRequest, DateFilter, DeleteDeviceRequest, DevicesResponse,
    LegacySensorsResponse, NewCapteur, RawSeries, SensorId, SensorsStatusResponse,
    StatisticalResponse, value_as_label,
};

/// Typed wrapper around the station API. Stateless: no retries, no caching.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: String,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
            base_url: config.station_api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and return the body as loose JSON.
    ///
    /// # Errors
    ///
    /// Any transport, status or parse failure, classified.
    pub async fn get_json(&self, path: &str, params: &[(&str, &str)]) -> FetchResult<Value> {
        self.get(path, params).await
    }

    /// GET `path` and return the body as text.
    ///
    /// # Errors
    ///
    /// Any transport or status failure, classified.
    pub async fn get_text(&self, path: &str, params: &[(&str, &str)]) -> FetchResult<String> {
        let request = self.http_client.get(self.url(path)).query(params);
        let response = execute(request).await?;
        response.text().await.map_err(classify)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> FetchResult<T> {
        let request = self.http_client.get(self.url(path)).query(params);
        parse_body(path, execute(request).await?).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> FetchResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http_client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        parse_body(path, execute(request).await?).await
    }
}

/// Send the request and turn any non-2xx status into `FetchError::HttpStatus`.
async fn execute(request: RequestBuilder) -> FetchResult<Response> {
    let response = request.send().await.map_err(classify)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(FetchError::HttpStatus {
        status: status.as_u16(),
        message: error_message(status, &text),
    })
}

/// Server-provided `{error}` when present, else a generic message.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}

async fn parse_body<T: DeserializeOwned>(path: &str, response: Response) -> FetchResult<T> {
    let text = response.text().await.map_err(classify)?;
    // Some action endpoints answer 2xx with an empty body.
    let text = if text.trim().is_empty() { "null" } else { text.as_str() };

    serde_json::from_str(text).map_err(|e| {
        tracing::warn!(
            error = %e,
            path,
            body_preview = %text.chars().take(200).collect::<String>(),
            "Failed to parse station API response"
        );
        FetchError::Parse(e.to_string())
    })
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e.to_string())
    } else if e.is_decode() {
        FetchError::Parse(e.to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}

impl StationApi for ApiClient {
    async fn sensors_status(&self) -> FetchResult<SensorsStatusResponse> {
        self.get("/api/sensors/status", &[]).await
    }

    async fn sensors_legacy(&self) -> FetchResult<LegacySensorsResponse> {
        self.get("/api/sensors", &[]).await
    }

    async fn all_latest(&self) -> FetchResult<AllLatestResponse> {
        self.get("/api/all/latest", &[]).await
    }

    async fn mesures_latest(&self) -> FetchResult<Vec<CapteurLatest>> {
        self.get("/api/mesures/latest", &[]).await
    }

    async fn history(&self, sensor: &SensorId, date: &DateFilter) -> FetchResult<RawSeries> {
        let path = format!("/api/history{}", sensor.history_key());
        self.get(&path, &[("date", date.as_str())]).await
    }

    async fn dates_unique(&self) -> FetchResult<Vec<String>> {
        let dates: Vec<Value> = self.get("/api/dates_unique", &[]).await?;
        Ok(dates.iter().filter_map(value_as_label).collect())
    }

    async fn statistical(
        &self,
        kind: AggregateKind,
        date: &DateFilter,
    ) -> FetchResult<StatisticalResponse> {
        self.get(
            "/api/statistical",
            &[("type", kind.as_str()), ("date", date.as_str())],
        )
        .await
    }

    async fn statistical_refresh(&self, date: &DateFilter) -> FetchResult<()> {
        self.get_text("/api/statistical_refresh", &[("date", date.as_str())])
            .await
            .map(|_| ())
    }

    async fn esp32_devices(&self) -> FetchResult<DevicesResponse> {
        self.get("/api/esp32/devices", &[]).await
    }

    async fn configure_device(&self, request: &ConfigureDeviceRequest) -> FetchResult<()> {
        let _: Value = self
            .send_json(Method::POST, "/api/esp32/configure", Some(request))
            .await?;
        Ok(())
    }

    async fn delete_device(&self, mac_address: &str) -> FetchResult<()> {
        let body = DeleteDeviceRequest {
            mac_address: mac_address.to_string(),
        };
        let _: Value = self
            .send_json(Method::POST, "/api/esp32/delete", Some(&body))
            .await?;
        Ok(())
    }

    async fn add_capteur(&self, capteur: &NewCapteur) -> FetchResult<Capteur> {
        self.send_json(Method::POST, "/api/capteurs", Some(capteur))
            .await
    }

    async fn delete_capteur(&self, id: i64) -> FetchResult<()> {
        let path = format!("/api/capteurs/{id}");
        let _: Value = self.send_json::<(), _>(Method::DELETE, &path, None).await?;
        Ok(())
    }
}
