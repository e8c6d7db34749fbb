use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

/// Which family of collaborator endpoints feeds the sensor directory and the
/// latest-value snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    /// `/api/sensors/status` (legacy `/api/sensors`) and `/api/all/latest`
    Esp,
    /// `/api/mesures/latest` capteur records
    Capteurs,
}

impl ApiFlavor {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "capteurs" | "capteur" | "mesures" => Self::Capteurs,
            _ => Self::Esp,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Station API
    pub station_api_url: String,
    pub station_api_flavor: ApiFlavor,
    pub request_timeout_seconds: u64,

    // Refresh periods
    pub refresh_status_seconds: u64,
    pub refresh_latest_seconds: u64,
    pub refresh_history_seconds: u64,
    pub refresh_aggregate_seconds: u64,
    pub refresh_dates_seconds: u64,
    pub refresh_devices_seconds: u64,

    // Presentation policy
    pub online_window_seconds: i64,
    pub hot_temperature_celsius: f64,
    pub default_date_filter: String,

    // Local dashboard surface
    pub api_host: String,
    pub api_port: u16,

    // Application metadata
    pub deployment: Deployment,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            station_api_url: "http://127.0.0.1:5000".to_string(),
            station_api_flavor: ApiFlavor::Esp,
            request_timeout_seconds: 10,
            refresh_status_seconds: 60,
            refresh_latest_seconds: 20,
            refresh_history_seconds: 20,
            refresh_aggregate_seconds: 20,
            refresh_dates_seconds: 300,
            refresh_devices_seconds: 30,
            online_window_seconds: 300,
            hot_temperature_celsius: 22.0,
            default_date_filter: "today".to_string(),
            api_host: "127.0.0.1".to_string(),
            api_port: 8080,
            deployment: Deployment::Local,
        }
    }
}

/// Read `key` and parse it, falling back to `default` when unset or unparseable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `STATION_API_URL` is not an http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let station_api_url = env::var("STATION_API_URL")
            .unwrap_or(defaults.station_api_url)
            .trim_end_matches('/')
            .to_string();
        if !station_api_url.starts_with("http://") && !station_api_url.starts_with("https://") {
            return Err(ConfigError::Invalid("STATION_API_URL", station_api_url));
        }

        Ok(Self {
            station_api_url,
            station_api_flavor: ApiFlavor::from_str(
                &env::var("STATION_API_FLAVOR").unwrap_or_else(|_| "esp".to_string()),
            ),
            request_timeout_seconds: env_or(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),

            refresh_status_seconds: env_or("REFRESH_STATUS_SECONDS", defaults.refresh_status_seconds),
            refresh_latest_seconds: env_or("REFRESH_LATEST_SECONDS", defaults.refresh_latest_seconds),
            refresh_history_seconds: env_or(
                "REFRESH_HISTORY_SECONDS",
                defaults.refresh_history_seconds,
            ),
            refresh_aggregate_seconds: env_or(
                "REFRESH_AGGREGATE_SECONDS",
                defaults.refresh_aggregate_seconds,
            ),
            refresh_dates_seconds: env_or("REFRESH_DATES_SECONDS", defaults.refresh_dates_seconds),
            refresh_devices_seconds: env_or(
                "REFRESH_DEVICES_SECONDS",
                defaults.refresh_devices_seconds,
            ),

            online_window_seconds: env_or("ONLINE_WINDOW_SECONDS", defaults.online_window_seconds),
            hot_temperature_celsius: env_or(
                "HOT_TEMPERATURE_CELSIUS",
                defaults.hot_temperature_celsius,
            ),
            default_date_filter: env::var("DEFAULT_DATE_FILTER")
                .unwrap_or(defaults.default_date_filter),

            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: env_or("API_PORT", defaults.api_port),

            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Client-side request timeout; `None` leaves requests outstanding until the
    /// transport itself fails them.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_seconds > 0).then(|| Duration::from_secs(self.request_timeout_seconds))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flavor_parsing_defaults_to_esp() {
        assert_eq!(ApiFlavor::from_str("capteurs"), ApiFlavor::Capteurs);
        assert_eq!(ApiFlavor::from_str("MESURES"), ApiFlavor::Capteurs);
        assert_eq!(ApiFlavor::from_str("esp"), ApiFlavor::Esp);
        assert_eq!(ApiFlavor::from_str("whatever"), ApiFlavor::Esp);
    }

    #[test]
    fn zero_timeout_disables_client_timeout() {
        let mut config = Config::default();
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));
        config.request_timeout_seconds = 0;
        assert_eq!(config.request_timeout(), None);
    }
}
