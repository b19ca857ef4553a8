use crate::engine::{Availability, ControlError, MonitorHandle};
use crate::presenter::PanelState;
use deskguard_core::context::OptionsSnapshot;
use deskguard_core::{CurrentIdentity, DisplayOption, LockStatus};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use zbus::interface;

pub const BUS_NAME: &str = "io.deskguard.Monitor1";
pub const OBJECT_PATH: &str = "/io/deskguard/Monitor1";

/// Operator log lines included in a status reply.
const STATUS_LOG_LINES: usize = 20;

/// D-Bus control surface for the monitor.
///
/// Bus name: io.deskguard.Monitor1
/// Object path: /io/deskguard/Monitor1
pub struct MonitorService {
    monitor: Arc<MonitorHandle>,
    panel: watch::Receiver<PanelState>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    version: &'static str,
    lock: LockStatus,
    banner: String,
    admin: String,
    identity: CurrentIdentity,
    static_mode: bool,
    controls_enabled: bool,
    scanning: bool,
    options: OptionsSnapshot,
    services: Availability,
    recent_log: Vec<String>,
}

impl MonitorService {
    pub fn new(monitor: Arc<MonitorHandle>, panel: watch::Receiver<PanelState>) -> Self {
        Self { monitor, panel }
    }

    fn report(&self) -> StatusReport {
        let ctx = self.monitor.context();
        let panel = self.panel.borrow();
        StatusReport {
            version: env!("CARGO_PKG_VERSION"),
            lock: ctx.lock().status(),
            banner: panel.banner.clone(),
            admin: ctx.admin_id().to_string(),
            identity: ctx.current_identity(),
            static_mode: self.monitor.is_static(),
            controls_enabled: panel.controls_enabled,
            scanning: self.monitor.analysis().is_scanning(),
            options: ctx.options().snapshot(),
            services: self.monitor.availability(),
            recent_log: panel.recent_log(STATUS_LOG_LINES),
        }
    }
}

#[interface(name = "io.deskguard.Monitor1")]
impl MonitorService {
    /// Return monitor status as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        serde_json::to_string(&self.report()).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Toggle an overlay or voice option. Returns the new value.
    async fn set_option(&self, name: &str, enabled: bool) -> zbus::fdo::Result<bool> {
        let option: DisplayOption = name.parse().map_err(zbus::fdo::Error::InvalidArgs)?;
        self.monitor.context().options().set(option, enabled);
        tracing::info!(option = name, enabled, "option changed");
        Ok(enabled)
    }

    /// Start a scene analysis: `started`, `locked`, `busy` or `unavailable`.
    async fn analyze(&self) -> zbus::fdo::Result<String> {
        let outcome = match self.monitor.analysis().trigger() {
            Ok(_) => "started".to_string(),
            Err(rejected) => rejected.to_string(),
        };
        tracing::info!(outcome = %outcome, "analyze requested");
        Ok(outcome)
    }

    /// Switch to a still image and identify whoever is in it.
    async fn load_image(&self, path: &str) -> zbus::fdo::Result<bool> {
        let monitor = self.monitor.clone();
        let path = PathBuf::from(path);
        let result = tokio::task::spawn_blocking(move || monitor.load_image(&path))
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Ok(control_outcome("load_image", result))
    }

    /// Switch back to the live camera.
    async fn use_camera(&self) -> zbus::fdo::Result<bool> {
        Ok(control_outcome("use_camera", self.monitor.use_camera()))
    }

    /// Write the latest composited frame to `path` as PNG.
    async fn snapshot(&self, path: &str) -> zbus::fdo::Result<bool> {
        let Some(frame) = self.panel.borrow().frame.clone() else {
            tracing::info!("snapshot requested before any frame was rendered");
            return Ok(false);
        };
        let path = PathBuf::from(path);
        let saved = tokio::task::spawn_blocking(move || {
            frame.image.save_with_format(&path, image::ImageFormat::Png)
        })
        .await
        .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        match saved {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "snapshot failed");
                Ok(false)
            }
        }
    }

    /// Path of the CSV event journal.
    async fn log_path(&self) -> zbus::fdo::Result<String> {
        Ok(self.monitor.log_path().display().to_string())
    }
}

fn control_outcome(action: &str, result: Result<(), ControlError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::info!(action, reason = %e, "control refused");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskguard_core::FrameError;

    #[test]
    fn test_control_outcome() {
        assert!(control_outcome("use_camera", Ok(())));
        assert!(!control_outcome("use_camera", Err(ControlError::Locked)));
        assert!(!control_outcome(
            "load_image",
            Err(ControlError::Image(FrameError::InvalidLength { expected: 3, actual: 0 }))
        ));
    }
}
