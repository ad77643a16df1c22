use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    backend::RemoteStore,
    error::{MonitorError, MonitorResult},
    models::DefaultThresholds,
};

/// Realtime path of the pump flag.
pub const WATERING_PATH: &str = "watering";
/// Realtime path of the user's default thresholds record.
pub const DEFAULTS_PATH: &str = "default";

/// Writes command flags the device reacts to. The device never acknowledges,
/// so success only means the write landed.
pub struct CommandDispatcher {
    store: Arc<dyn RemoteStore>,
}

impl CommandDispatcher {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub async fn set_watering(&self, on: bool) -> MonitorResult<()> {
        self.store
            .write(WATERING_PATH, &Value::from(on as i64))
            .await?;
        info!(on, "Watering flag written");
        Ok(())
    }

    /// Overwrites the whole record; all three fields are always sent.
    pub async fn set_defaults(&self, thresholds: DefaultThresholds) -> MonitorResult<()> {
        let value = serde_json::to_value(thresholds).map_err(anyhow::Error::from)?;
        self.store.write(DEFAULTS_PATH, &value).await?;
        info!(?thresholds, "Default thresholds saved");
        Ok(())
    }

    pub async fn get_defaults(&self) -> MonitorResult<DefaultThresholds> {
        let value = self
            .store
            .read(DEFAULTS_PATH)
            .await?
            .ok_or(MonitorError::NoData)?;
        debug!(%value, "Default thresholds read");

        serde_json::from_value(value)
            .map_err(|e| MonitorError::Remote(format!("Malformed default thresholds: {e}")))
    }
}
