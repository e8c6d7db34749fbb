use serde::{Deserialize, Serialize};

use crate::station::models::de_opt_u32;
use crate::sync::CycleOutcome;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    /// New date filter; omitted keeps the current one
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub date: String,
    pub history: CycleOutcome,
    pub aggregate: CycleOutcome,
}

#[derive(Debug, Deserialize)]
pub struct ConfigureDeviceBody {
    pub mac_address: String,
    /// Selector value; an empty choice arrives as `""`
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub sensor_number: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
