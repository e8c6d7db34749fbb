//! Endpoint client for the station API.
//!
//! [`StationApi`] is the seam between the synchronization engine and the
//! network: [`ApiClient`] implements it over HTTP, tests implement it in memory.

mod client;
pub mod models;

use std::future::Future;

pub use client::ApiClient;

use crate::error::FetchResult;
use models::{
    AggregateKind, AllLatestResponse, Capteur, CapteurLatest, ConfigureDeviceRequest, DateFilter,
    DevicesResponse, LegacySensorsResponse, NewCapteur, RawSeries, SensorId,
    SensorsStatusResponse, StatisticalResponse,
};

/// Every collaborator endpoint the dashboard reads or writes.
pub trait StationApi: Send + Sync {
    /// `GET /api/sensors/status`
    fn sensors_status(&self) -> impl Future<Output = FetchResult<SensorsStatusResponse>> + Send;

    /// `GET /api/sensors`
    fn sensors_legacy(&self) -> impl Future<Output = FetchResult<LegacySensorsResponse>> + Send;

    /// `GET /api/all/latest`
    fn all_latest(&self) -> impl Future<Output = FetchResult<AllLatestResponse>> + Send;

    /// `GET /api/mesures/latest`
    fn mesures_latest(&self) -> impl Future<Output = FetchResult<Vec<CapteurLatest>>> + Send;

    /// `GET /api/history<N>?date=`
    fn history(
        &self,
        sensor: &SensorId,
        date: &DateFilter,
    ) -> impl Future<Output = FetchResult<RawSeries>> + Send;

    /// `GET /api/dates_unique`
    fn dates_unique(&self) -> impl Future<Output = FetchResult<Vec<String>>> + Send;

    /// `GET /api/statistical?type=&date=`
    fn statistical(
        &self,
        kind: AggregateKind,
        date: &DateFilter,
    ) -> impl Future<Output = FetchResult<StatisticalResponse>> + Send;

    /// `GET /api/statistical_refresh?date=`
    fn statistical_refresh(&self, date: &DateFilter) -> impl Future<Output = FetchResult<()>> + Send;

    /// `GET /api/esp32/devices`
    fn esp32_devices(&self) -> impl Future<Output = FetchResult<DevicesResponse>> + Send;

    /// `POST /api/esp32/configure`
    fn configure_device(
        &self,
        request: &ConfigureDeviceRequest,
    ) -> impl Future<Output = FetchResult<()>> + Send;

    /// `POST /api/esp32/delete`
    fn delete_device(&self, mac_address: &str) -> impl Future<Output = FetchResult<()>> + Send;

    /// `POST /api/capteurs`
    fn add_capteur(&self, capteur: &NewCapteur) -> impl Future<Output = FetchResult<Capteur>> + Send;

    /// `DELETE /api/capteurs/<id>`
    fn delete_capteur(&self, id: i64) -> impl Future<Output = FetchResult<()>> + Send;
}
