//! Refresh cycles: fetch outside the lock, apply under it, then repaint.
//!
//! Every class goes through the same three steps:
//!
//! 1. `begin` the cycle in [`SchedulerState`] (a tick may be skipped here),
//! 2. fetch from the [`StationApi`] without holding any lock,
//! 3. apply the result only if the cycle is still the current generation,
//!    then render.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::{ApiFlavor, Config};
use crate::directory::{self, capteur_id};
use crate::error::{AppError, AppResult, FetchError, FetchResult};
use crate::series::{self, ComparisonSeries, Series};
use crate::station::StationApi;
use crate::station::models::{
    AggregateKind, Capteur, ConfigureDeviceRequest, DateFilter, NewCapteur, SensorId,
};
use crate::sync::state::{RefreshClass, RefreshCycle, SchedulerState, Trigger};
use crate::view::{ChartBuffer, Document, Panel, RenderPolicy, RenderStats, Renderer, SensorReadings, ViewModel};

/// Highest sensor slot a device can be bound to.
pub const MAX_SENSOR_NUMBER: u32 = 10;

/// How a refresh request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Tick arrived while the class already had a cycle in flight
    Skipped,
    Applied,
    /// Applied, but in its degraded or error form
    Failed,
    /// A newer cycle started meanwhile; the result was discarded
    Superseded,
}

/// Inputs captured when a cycle begins, so the fetch never reads shared state.
struct CycleContext {
    cycle: RefreshCycle,
    date: DateFilter,
    sensors: Vec<SensorId>,
}

/// State mutated by apply steps. Only ever touched under the engine lock.
struct Dashboard {
    scheduler: SchedulerState,
    model: ViewModel,
    renderer: Renderer,
}

impl Dashboard {
    fn repaint(&mut self) {
        self.renderer.render(&self.model, Utc::now());
    }
}

pub struct SyncEngine<S> {
    api: S,
    flavor: ApiFlavor,
    dashboard: Mutex<Dashboard>,
}

impl<S: StationApi> SyncEngine<S> {
    pub fn new(api: S, config: &Config) -> Self {
        let mut dashboard = Dashboard {
            scheduler: SchedulerState::new(),
            model: ViewModel::new(DateFilter::new(config.default_date_filter.as_str())),
            renderer: Renderer::new(RenderPolicy::from(config)),
        };
        dashboard.repaint();

        Self {
            api,
            flavor: config.station_api_flavor,
            dashboard: Mutex::new(dashboard),
        }
    }

    pub fn api(&self) -> &S {
        &self.api
    }

    fn lock(&self) -> MutexGuard<'_, Dashboard> {
        self.dashboard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one refresh cycle for `class`.
    pub async fn refresh(&self, class: RefreshClass, trigger: Trigger) -> CycleOutcome {
        let Some(ctx) = self.begin(class, trigger) else {
            tracing::debug!(class = class.as_str(), "Previous cycle still in flight, skipping tick");
            return CycleOutcome::Skipped;
        };
        let _release = ReleaseOnDrop {
            dashboard: &self.dashboard,
            cycle: ctx.cycle,
        };

        tracing::debug!(
            class = class.as_str(),
            generation = ctx.cycle.generation,
            ?trigger,
            "Refresh cycle started"
        );

        let outcome = match class {
            RefreshClass::Status => self.refresh_status(&ctx).await,
            RefreshClass::LatestSnapshot => self.refresh_latest(&ctx).await,
            RefreshClass::History => self.refresh_history(&ctx).await,
            RefreshClass::Aggregate => self.refresh_aggregate(&ctx, trigger).await,
            RefreshClass::Dates => self.refresh_dates(&ctx).await,
            RefreshClass::Devices => self.refresh_devices(&ctx).await,
        };

        if outcome == CycleOutcome::Superseded {
            tracing::debug!(
                class = class.as_str(),
                generation = ctx.cycle.generation,
                "Discarding result of superseded cycle"
            );
        }
        outcome
    }

    fn begin(&self, class: RefreshClass, trigger: Trigger) -> Option<CycleContext> {
        let mut dashboard = self.lock();
        let cycle = dashboard.scheduler.begin(class, trigger, Utc::now())?;
        Some(CycleContext {
            cycle,
            date: dashboard.model.date_filter().clone(),
            sensors: dashboard.model.sensor_ids(),
        })
    }

    /// Apply `update` if `cycle` is still current, then repaint. `failed`
    /// decides between `Applied` and `Failed`.
    fn apply(
        &self,
        cycle: &RefreshCycle,
        failed: bool,
        update: impl FnOnce(&mut ViewModel),
    ) -> CycleOutcome {
        let mut dashboard = self.lock();
        if !dashboard.scheduler.complete(cycle) {
            return CycleOutcome::Superseded;
        }
        update(&mut dashboard.model);
        dashboard.repaint();

        if failed {
            CycleOutcome::Failed
        } else {
            CycleOutcome::Applied
        }
    }

    async fn refresh_status(&self, ctx: &CycleContext) -> CycleOutcome {
        match directory::list_sensors(&self.api, self.flavor).await {
            Ok(sensors) => {
                let count = sensors.len();
                let outcome = self.apply(&ctx.cycle, false, |model| {
                    model.apply_directory(sensors);
                    model.mark_online(Utc::now());
                });
                if outcome == CycleOutcome::Applied {
                    tracing::debug!(sensors = count, "Sensor directory updated");
                }
                outcome
            }
            Err(e) => {
                log_failure(RefreshClass::Status, &e);
                self.apply(&ctx.cycle, true, ViewModel::mark_offline)
            }
        }
    }

    async fn refresh_latest(&self, ctx: &CycleContext) -> CycleOutcome {
        match self.fetch_latest().await {
            Ok(readings) => self.apply(&ctx.cycle, false, |model| {
                model.apply_latest(readings, Utc::now());
            }),
            Err(e) => {
                log_failure(RefreshClass::LatestSnapshot, &e);
                self.apply(&ctx.cycle, true, ViewModel::mark_offline)
            }
        }
    }

    async fn fetch_latest(&self) -> FetchResult<BTreeMap<SensorId, SensorReadings>> {
        Ok(match self.flavor {
            ApiFlavor::Esp => self
                .api
                .all_latest()
                .await?
                .into_iter()
                .map(|(id, values)| (SensorId::new(id), SensorReadings::from(&values)))
                .collect(),
            ApiFlavor::Capteurs => self
                .api
                .mesures_latest()
                .await?
                .into_iter()
                .map(|record| (capteur_id(&record), SensorReadings::from(&record.mesures)))
                .collect(),
        })
    }

    async fn refresh_history(&self, ctx: &CycleContext) -> CycleOutcome {
        let fetches = ctx.sensors.iter().map(|sensor| async move {
            let panel = match self.api.history(sensor, &ctx.date).await {
                Ok(raw) => match series::align(&raw) {
                    Ok(series) => Panel::Ready(series),
                    Err(e) => {
                        tracing::warn!(sensor = %sensor, error = %e, "Malformed history response");
                        Panel::Failed(e.to_string())
                    }
                },
                Err(e) => {
                    tracing::warn!(sensor = %sensor, error = %e, "History fetch failed");
                    Panel::Failed(e.to_string())
                }
            };
            (sensor.clone(), panel)
        });
        let panels: Vec<(SensorId, Panel<Series>)> = join_all(fetches).await;

        let failed = panels.iter().any(|(_, p)| matches!(p, Panel::Failed(_)));
        self.apply(&ctx.cycle, failed, |model| model.apply_history(panels))
    }

    async fn refresh_aggregate(&self, ctx: &CycleContext, trigger: Trigger) -> CycleOutcome {
        if trigger == Trigger::Manual
            && let Err(e) = self.api.statistical_refresh(&ctx.date).await
        {
            tracing::warn!(date = %ctx.date, error = %e, "Statistics recompute failed");
        }

        let fetches = AggregateKind::ALL.into_iter().map(|kind| async move {
            let panel = match self.api.statistical(kind, &ctx.date).await {
                Ok(response) => Panel::Ready(ComparisonSeries::from(&response)),
                Err(e) => {
                    tracing::warn!(kind = kind.as_str(), error = %e, "Aggregate fetch failed");
                    Panel::Failed(e.to_string())
                }
            };
            (kind, panel)
        });
        let panels = join_all(fetches).await;

        let failed = panels.iter().any(|(_, p)| matches!(p, Panel::Failed(_)));
        self.apply(&ctx.cycle, failed, |model| {
            for (kind, panel) in panels {
                model.apply_aggregate(kind, panel);
            }
        })
    }

    async fn refresh_dates(&self, ctx: &CycleContext) -> CycleOutcome {
        match self.api.dates_unique().await {
            Ok(dates) => self.apply(&ctx.cycle, false, |model| {
                model.apply_dates(Panel::Ready(dates));
            }),
            Err(e) => {
                log_failure(RefreshClass::Dates, &e);
                self.apply(&ctx.cycle, true, |model| {
                    model.apply_dates(Panel::Failed(e.to_string()));
                })
            }
        }
    }

    async fn refresh_devices(&self, ctx: &CycleContext) -> CycleOutcome {
        match self.api.esp32_devices().await {
            Ok(response) => self.apply(&ctx.cycle, false, |model| {
                model.apply_devices(Panel::Ready(response.devices));
            }),
            Err(e) => {
                log_failure(RefreshClass::Devices, &e);
                self.apply(&ctx.cycle, true, |model| {
                    model.apply_devices(Panel::Failed(e.to_string()));
                })
            }
        }
    }

    /// Change the date filter and immediately refresh everything scoped by it,
    /// superseding any periodic cycle in flight.
    pub async fn set_date_filter(&self, date: DateFilter) -> (CycleOutcome, CycleOutcome) {
        tracing::info!(date = %date, "Date filter changed");
        {
            let mut dashboard = self.lock();
            dashboard.model.set_date_filter(date);
            dashboard.repaint();
        }
        self.refresh_date_scoped().await
    }

    /// Manual refresh of the history tables and comparison charts.
    pub async fn refresh_date_scoped(&self) -> (CycleOutcome, CycleOutcome) {
        tokio::join!(
            self.refresh(RefreshClass::History, Trigger::Manual),
            self.refresh(RefreshClass::Aggregate, Trigger::Manual),
        )
    }

    /// Bind a device to a sensor slot. A blank name defaults to `Sensor <n>`.
    ///
    /// # Errors
    ///
    /// `AppError::BadRequest` for an out-of-range slot or an empty MAC address,
    /// otherwise the station API error.
    pub async fn configure_device(
        &self,
        mac_address: &str,
        sensor_number: Option<u32>,
        name: Option<&str>,
    ) -> AppResult<()> {
        let mac_address = mac_address.trim();
        if mac_address.is_empty() {
            return Err(AppError::BadRequest("MAC address is required".to_string()));
        }
        let sensor_number = sensor_number
            .filter(|n| (1..=MAX_SENSOR_NUMBER).contains(n))
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Please choose a sensor number between 1 and {MAX_SENSOR_NUMBER}"
                ))
            })?;
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| format!("Sensor {sensor_number}"), str::to_string);

        let request = ConfigureDeviceRequest {
            mac_address: mac_address.to_string(),
            sensor_number,
            name,
        };
        self.api.configure_device(&request).await?;
        tracing::info!(mac = %request.mac_address, sensor_number, "Device configured");

        self.refresh(RefreshClass::Devices, Trigger::Manual).await;
        Ok(())
    }

    /// # Errors
    ///
    /// `AppError::BadRequest` for an empty MAC address, otherwise the station
    /// API error.
    pub async fn delete_device(&self, mac_address: &str) -> AppResult<()> {
        let mac_address = mac_address.trim();
        if mac_address.is_empty() {
            return Err(AppError::BadRequest("MAC address is required".to_string()));
        }
        self.api.delete_device(mac_address).await?;
        tracing::info!(mac = %mac_address, "Device deleted");

        self.refresh(RefreshClass::Devices, Trigger::Manual).await;
        Ok(())
    }

    /// # Errors
    ///
    /// `AppError::BadRequest` when `esp_id` or `nom` is blank, otherwise the
    /// station API error.
    pub async fn add_capteur(&self, capteur: NewCapteur) -> AppResult<Capteur> {
        let capteur = NewCapteur {
            esp_id: capteur.esp_id.trim().to_string(),
            nom: capteur.nom.trim().to_string(),
            localisation: capteur
                .localisation
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
        };
        if capteur.esp_id.is_empty() || capteur.nom.is_empty() {
            return Err(AppError::BadRequest(
                "ESP ID and name are required".to_string(),
            ));
        }

        let created = self.api.add_capteur(&capteur).await?;
        tracing::info!(id = created.id, esp_id = %created.esp_id, "Capteur added");

        self.refresh_directory().await;
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns the station API error.
    pub async fn delete_capteur(&self, id: i64) -> AppResult<()> {
        self.api.delete_capteur(id).await?;
        tracing::info!(id, "Capteur deleted");

        self.refresh_directory().await;
        Ok(())
    }

    async fn refresh_directory(&self) {
        self.refresh(RefreshClass::Status, Trigger::Manual).await;
        self.refresh(RefreshClass::LatestSnapshot, Trigger::Manual).await;
    }

    #[must_use]
    pub fn view_model(&self) -> ViewModel {
        self.lock().model.clone()
    }

    #[must_use]
    pub fn document(&self) -> Document {
        self.lock().renderer.document().clone()
    }

    #[must_use]
    pub fn document_html(&self) -> String {
        self.lock().renderer.document().to_html()
    }

    #[must_use]
    pub fn charts(&self) -> BTreeMap<AggregateKind, ChartBuffer> {
        self.lock()
            .renderer
            .charts()
            .map(|(kind, chart)| (*kind, chart.clone()))
            .collect()
    }

    #[must_use]
    pub fn render_stats(&self) -> RenderStats {
        self.lock().renderer.stats()
    }

    #[must_use]
    pub fn generation(&self, class: RefreshClass) -> u64 {
        self.lock().scheduler.current_generation(class)
    }

    #[must_use]
    pub fn in_flight(&self, class: RefreshClass) -> bool {
        self.lock().scheduler.in_flight(class)
    }
}

/// Frees the class if the refresh future is dropped between `begin` and
/// `apply`. After a normal apply this finds nothing to release.
struct ReleaseOnDrop<'a> {
    dashboard: &'a Mutex<Dashboard>,
    cycle: RefreshCycle,
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        let mut dashboard = self.dashboard.lock().unwrap_or_else(PoisonError::into_inner);
        if dashboard.scheduler.abandon(&self.cycle) {
            tracing::debug!(
                class = self.cycle.class.as_str(),
                generation = self.cycle.generation,
                "Refresh cycle dropped before completion"
            );
        }
    }
}

fn log_failure(class: RefreshClass, error: &FetchError) {
    tracing::warn!(
        class = class.as_str(),
        kind = ?error.kind(),
        error = %error,
        "Refresh failed"
    );
}
