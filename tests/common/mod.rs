//! In-memory station API with scripted, optionally gated, responses.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};
use tokio::sync::oneshot;

use meteo_sync::error::{FetchError, FetchResult};
use meteo_sync::station::StationApi;
use meteo_sync::station::models::{
    AggregateKind, AllLatestResponse, Capteur, CapteurLatest, ConfigureDeviceRequest, DateFilter,
    DevicesResponse, LatestValues, LegacySensorsResponse, NewCapteur, RawSeries, SensorId,
    SensorsStatusResponse, StatisticalResponse,
};

enum Reply<T> {
    Now(FetchResult<T>),
    Gated(oneshot::Receiver<FetchResult<T>>),
}

/// Responses of one endpoint: queued replies first, then the fallback.
pub struct Script<T> {
    queue: Mutex<VecDeque<Reply<T>>>,
    fallback: Mutex<FetchResult<T>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new(fallback: FetchResult<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
        }
    }

    /// Response for every call once the queue is drained.
    pub fn set(&self, reply: FetchResult<T>) {
        *self.fallback.lock().unwrap() = reply;
    }

    pub fn push(&self, reply: FetchResult<T>) {
        self.queue.lock().unwrap().push_back(Reply::Now(reply));
    }

    /// Queue a reply that only resolves when the returned sender fires.
    pub fn gate(&self) -> oneshot::Sender<FetchResult<T>> {
        let (tx, rx) = oneshot::channel();
        self.queue.lock().unwrap().push_back(Reply::Gated(rx));
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self) -> FetchResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Now(self.fallback.lock().unwrap().clone()));

        match reply {
            Reply::Now(result) => result,
            Reply::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(FetchError::Network("gate dropped".into()))),
        }
    }
}

pub struct FakeStation {
    pub sensors_status: Script<SensorsStatusResponse>,
    pub sensors_legacy: Script<LegacySensorsResponse>,
    pub all_latest: Script<AllLatestResponse>,
    pub mesures_latest: Script<Vec<CapteurLatest>>,
    pub history: Script<RawSeries>,
    /// Per-sensor replies that take precedence over `history`'s fallback
    pub history_by_sensor: Mutex<HashMap<String, FetchResult<RawSeries>>>,
    pub history_requests: Mutex<Vec<(SensorId, DateFilter)>>,
    pub dates_unique: Script<Vec<String>>,
    pub statistical: Script<StatisticalResponse>,
    pub statistical_requests: Mutex<Vec<(AggregateKind, DateFilter)>>,
    pub statistical_refresh: Script<()>,
    pub esp32_devices: Script<DevicesResponse>,
    pub configure_device: Script<()>,
    pub configured: Mutex<Vec<ConfigureDeviceRequest>>,
    pub delete_device: Script<()>,
    pub add_capteur: Script<Capteur>,
    pub delete_capteur: Script<()>,
}

impl Default for FakeStation {
    fn default() -> Self {
        Self {
            sensors_status: Script::new(Ok(SensorsStatusResponse::default())),
            sensors_legacy: Script::new(Ok(LegacySensorsResponse::default())),
            all_latest: Script::new(Ok(AllLatestResponse::new())),
            mesures_latest: Script::new(Ok(Vec::new())),
            history: Script::new(Ok(empty_series())),
            history_by_sensor: Mutex::new(HashMap::new()),
            history_requests: Mutex::new(Vec::new()),
            dates_unique: Script::new(Ok(Vec::new())),
            statistical: Script::new(Ok(StatisticalResponse::default())),
            statistical_requests: Mutex::new(Vec::new()),
            statistical_refresh: Script::new(Ok(())),
            esp32_devices: Script::new(Ok(DevicesResponse::default())),
            configure_device: Script::new(Ok(())),
            configured: Mutex::new(Vec::new()),
            delete_device: Script::new(Ok(())),
            add_capteur: Script::new(Ok(Capteur::default())),
            delete_capteur: Script::new(Ok(())),
        }
    }
}

impl StationApi for FakeStation {
    async fn sensors_status(&self) -> FetchResult<SensorsStatusResponse> {
        self.sensors_status.next().await
    }

    async fn sensors_legacy(&self) -> FetchResult<LegacySensorsResponse> {
        self.sensors_legacy.next().await
    }

    async fn all_latest(&self) -> FetchResult<AllLatestResponse> {
        self.all_latest.next().await
    }

    async fn mesures_latest(&self) -> FetchResult<Vec<CapteurLatest>> {
        self.mesures_latest.next().await
    }

    async fn history(&self, sensor: &SensorId, date: &DateFilter) -> FetchResult<RawSeries> {
        self.history_requests
            .lock()
            .unwrap()
            .push((sensor.clone(), date.clone()));
        let scripted = self
            .history_by_sensor
            .lock()
            .unwrap()
            .get(sensor.as_str())
            .cloned();
        match scripted {
            Some(reply) => {
                self.history.calls.fetch_add(1, Ordering::SeqCst);
                reply
            }
            None => self.history.next().await,
        }
    }

    async fn dates_unique(&self) -> FetchResult<Vec<String>> {
        self.dates_unique.next().await
    }

    async fn statistical(
        &self,
        kind: AggregateKind,
        date: &DateFilter,
    ) -> FetchResult<StatisticalResponse> {
        self.statistical_requests
            .lock()
            .unwrap()
            .push((kind, date.clone()));
        self.statistical.next().await
    }

    async fn statistical_refresh(&self, _date: &DateFilter) -> FetchResult<()> {
        self.statistical_refresh.next().await
    }

    async fn esp32_devices(&self) -> FetchResult<DevicesResponse> {
        self.esp32_devices.next().await
    }

    async fn configure_device(&self, request: &ConfigureDeviceRequest) -> FetchResult<()> {
        self.configured.lock().unwrap().push(request.clone());
        self.configure_device.next().await
    }

    async fn delete_device(&self, _mac_address: &str) -> FetchResult<()> {
        self.delete_device.next().await
    }

    async fn add_capteur(&self, _capteur: &NewCapteur) -> FetchResult<Capteur> {
        self.add_capteur.next().await
    }

    async fn delete_capteur(&self, _id: i64) -> FetchResult<()> {
        self.delete_capteur.next().await
    }
}

pub fn status_listing(numbers: &[&str]) -> SensorsStatusResponse {
    serde_json::from_value(json!({
        "sensors": numbers
            .iter()
            .map(|n| json!({ "number": n, "status": "online", "status_text": "En ligne" }))
            .collect::<Vec<_>>()
    }))
    .unwrap()
}

pub fn latest(entries: &[(&str, Option<f64>)]) -> AllLatestResponse {
    entries
        .iter()
        .map(|(id, temperature)| {
            (
                (*id).to_string(),
                LatestValues {
                    temperature: *temperature,
                    ..Default::default()
                },
            )
        })
        .collect()
}

pub fn raw_series(value: Value) -> RawSeries {
    serde_json::from_value(value).unwrap()
}

pub fn empty_series() -> RawSeries {
    raw_series(json!({
        "date": [], "hour": [], "temperature": [], "humidity": [], "pressure": []
    }))
}

/// Yield to the runtime until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
