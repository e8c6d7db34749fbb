//! Sensor directory: the only source of truth for which sensors exist right now.
//!
//! The station API has served three listing shapes over time. They are folded
//! into [`SensorListing`] at the boundary and normalized into
//! [`SensorDescriptor`]s so nothing downstream branches on API version.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;

use crate::config::ApiFlavor;
use crate::error::FetchResult;
use crate::station::StationApi;
use crate::station::models::{CapteurLatest, SensorId, SensorStatusEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorDescriptor {
    pub id: SensorId,
    pub display_name: String,
    pub location: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Capteur primary key, only known from the capteur listing
    pub record_id: Option<i64>,
}

impl SensorDescriptor {
    /// Derived at render time, never stored.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>, online_window: Duration) -> SensorStatus {
        match self.last_seen_at {
            Some(seen) if now - seen < online_window => SensorStatus::Online,
            _ => SensorStatus::Offline,
        }
    }

    /// Fold a fresh listing entry into an already known descriptor.
    pub fn merge(&mut self, fresh: SensorDescriptor) {
        let last_seen_at = fresh.last_seen_at.or(self.last_seen_at);
        let record_id = fresh.record_id.or(self.record_id);
        *self = SensorDescriptor {
            last_seen_at,
            record_id,
            ..fresh
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Online,
    Offline,
}

impl SensorStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// A sensor listing in whichever shape the server produced.
#[derive(Debug, Clone)]
pub enum SensorListing {
    /// `/api/sensors`: bare table names
    Legacy(Vec<String>),
    /// `/api/sensors/status`
    Status(Vec<SensorStatusEntry>),
    /// `/api/mesures/latest`
    Capteurs(Vec<CapteurLatest>),
}

impl SensorListing {
    /// Normalize into descriptors, in listing order, dropping duplicates and
    /// entries without a usable identifier.
    #[must_use]
    pub fn normalize(self) -> Vec<SensorDescriptor> {
        let descriptors: Vec<SensorDescriptor> = match self {
            Self::Legacy(names) => names
                .into_iter()
                .filter(|n| !n.trim().is_empty())
                .map(|name| {
                    let id = SensorId::new(name.trim());
                    SensorDescriptor {
                        display_name: format!("Sensor {}", id.history_key()),
                        id,
                        location: None,
                        last_seen_at: None,
                        record_id: None,
                    }
                })
                .collect(),
            Self::Status(entries) => entries.into_iter().filter_map(from_status_entry).collect(),
            Self::Capteurs(records) => records.into_iter().map(from_capteur).collect(),
        };

        let mut seen = std::collections::HashSet::new();
        descriptors
            .into_iter()
            .filter(|d| seen.insert(d.id.clone()))
            .collect()
    }
}

fn from_status_entry(entry: SensorStatusEntry) -> Option<SensorDescriptor> {
    let id = match (&entry.id, &entry.number) {
        (Some(id), _) if !id.trim().is_empty() => SensorId::new(id.trim()),
        (_, Some(number)) if !number.trim().is_empty() => SensorId::from_number(number),
        _ => return None,
    };

    let last_seen_at = match (&entry.last_date, &entry.last_hour) {
        (Some(date), Some(hour)) => parse_timestamp(&format!("{date} {hour}")),
        _ => None,
    };

    Some(SensorDescriptor {
        display_name: entry
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Sensor {}", id.history_key())),
        id,
        location: None,
        last_seen_at,
        record_id: None,
    })
}

/// Identifier a capteur record is listed under: its `esp_id`, else its row id.
#[must_use]
pub fn capteur_id(record: &CapteurLatest) -> SensorId {
    record
        .esp_id
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map_or_else(|| SensorId::new(record.id.to_string()), SensorId::new)
}

fn from_capteur(record: CapteurLatest) -> SensorDescriptor {
    let id = capteur_id(&record);

    SensorDescriptor {
        display_name: if record.nom.trim().is_empty() {
            format!("Sensor {}", id.history_key())
        } else {
            record.nom
        },
        id,
        location: record.localisation.filter(|l| !l.trim().is_empty()),
        last_seen_at: record.derniere_connexion.as_deref().and_then(parse_timestamp),
        record_id: Some(record.id),
    }
}

/// RFC 3339, or a naive `YYYY-MM-DD[ T]HH:MM:SS[.f]` in local time (the station
/// server records wall-clock time without an offset).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}

/// Fetch the current sensor set.
///
/// In the `esp` flavor the status listing is preferred; servers that predate it
/// answer 404 and are asked for the legacy bare list instead. Pure fetch and
/// normalize: keeping the last good set on failure is the caller's job.
///
/// # Errors
///
/// Returns the fetch error of the listing request.
pub async fn list_sensors<S: StationApi>(
    api: &S,
    flavor: ApiFlavor,
) -> FetchResult<Vec<SensorDescriptor>> {
    let listing = match flavor {
        ApiFlavor::Capteurs => SensorListing::Capteurs(api.mesures_latest().await?),
        ApiFlavor::Esp => match api.sensors_status().await {
            Ok(status) => SensorListing::Status(status.sensors),
            Err(e) if e.is_not_found() => {
                tracing::debug!("Status listing unavailable, using legacy sensor list");
                SensorListing::Legacy(api.sensors_legacy().await?.sensors)
            }
            Err(e) => return Err(e),
        },
    };

    Ok(listing.normalize())
}
