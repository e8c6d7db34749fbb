use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::config::Config;
use crate::station::StationApi;
use crate::sync::engine::SyncEngine;
use crate::sync::state::{RefreshClass, Trigger};

/// Timer period for a refresh class. Zero is bumped to one second.
#[must_use]
pub fn refresh_period(config: &Config, class: RefreshClass) -> Duration {
    let secs = match class {
        RefreshClass::Status => config.refresh_status_seconds,
        RefreshClass::LatestSnapshot => config.refresh_latest_seconds,
        RefreshClass::History => config.refresh_history_seconds,
        RefreshClass::Aggregate => config.refresh_aggregate_seconds,
        RefreshClass::Dates => config.refresh_dates_seconds,
        RefreshClass::Devices => config.refresh_devices_seconds,
    };
    Duration::from_secs(secs.max(1))
}

/// Run the timer of one refresh class forever.
///
/// Each tick spawns its own cycle so the timer keeps its cadence; whether a
/// tick actually fetches is decided by the engine, which skips it while the
/// previous cycle of the class is unresolved.
pub async fn run_refresh_class<S: StationApi + 'static>(
    engine: Arc<SyncEngine<S>>,
    class: RefreshClass,
    period: Duration,
    start: Instant,
) {
    tracing::info!(
        class = class.as_str(),
        interval_secs = period.as_secs(),
        "Starting refresh timer"
    );

    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine.refresh(class, Trigger::Tick).await;
        });
    }
}

/// Owns every refresh timer. Dropping it stops them.
pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Load the sensor directory once, then start one timer per class.
    ///
    /// The directory timer waits a full period before its first tick since
    /// the initial listing already ran; every other class fires immediately.
    pub async fn start<S: StationApi + 'static>(engine: Arc<SyncEngine<S>>, config: &Config) -> Self {
        let outcome = engine.refresh(RefreshClass::Status, Trigger::Manual).await;
        tracing::info!(?outcome, "Initial sensor directory load");

        let now = Instant::now();
        let handles = RefreshClass::ALL
            .into_iter()
            .map(|class| {
                let period = refresh_period(config, class);
                let start = if class == RefreshClass::Status {
                    now + period
                } else {
                    now
                };
                tokio::spawn(run_refresh_class(Arc::clone(&engine), class, period, start))
            })
            .collect();

        Self { handles }
    }

    pub fn shutdown(self) {
        tracing::info!("Stopping refresh timers");
        drop(self);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
