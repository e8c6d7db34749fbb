mod handlers;
mod types;

pub use handlers::{add_capteur, configure_device, delete_capteur, delete_device, refresh};
pub use types::{ActionResponse, ConfigureDeviceBody, RefreshRequest, RefreshResponse};
