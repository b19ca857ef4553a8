use crate::config::Config;
use crate::face_search::{HttpIdentityOracle, UnconfiguredOracle};
use crate::http::HttpBridge;
use crate::object_detect::HttpObjectDetector;
use crate::vision::GeminiVision;
use deskguard_core::detector::ScrfdDetector;
use deskguard_core::journal::JournalError;
use deskguard_core::trap::TrapError;
use deskguard_core::{
    ui_queue, AnalysisAction, Announcer, DisplayOptions, EventJournal, FaceRegionDetector,
    FrameError, FrameSource, IdentityOracle, IntrusionTrap, ObjectDetector, RenderLoop,
    SecurityCommands, SecurityContext, SecurityLoop, ServiceError, SourceSelector, UiEvent,
    UiQueue, VisionLanguageService,
};
use deskguard_hw::{Camera, LiveCamera};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
    #[error("evidence directory error: {0}")]
    Trap(#[from] TrapError),
    #[error("http client error: {0}")]
    Http(#[from] ServiceError),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

/// Operator control refused or failed.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("controls are disabled while the system is locked")]
    Locked,
    #[error("could not load image: {0}")]
    Image(#[from] FrameError),
}

/// Which collaborators came up at startup.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Availability {
    pub camera: bool,
    pub face_boxes: bool,
    pub face_search: bool,
    pub object_detection: bool,
    pub vision: bool,
}

/// Handle to the running monitor.
///
/// The loop threads are detached; they observe the shutdown flag and exit
/// within one tick.
pub struct MonitorHandle {
    ctx: Arc<SecurityContext>,
    source: Arc<SourceSelector>,
    analysis: AnalysisAction,
    commands: SecurityCommands,
    ui: UiQueue,
    log_path: PathBuf,
    availability: Availability,
    stopped: AtomicBool,
}

impl MonitorHandle {
    pub fn context(&self) -> Arc<SecurityContext> {
        self.ctx.clone()
    }

    pub fn analysis(&self) -> &AnalysisAction {
        &self.analysis
    }

    pub fn is_static(&self) -> bool {
        self.source.is_static()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    /// Freeze on an uploaded still and queue a one-shot identity check of it.
    pub fn load_image(&self, path: &Path) -> Result<(), ControlError> {
        if self.ctx.is_locked() {
            return Err(ControlError::Locked);
        }
        let frame = deskguard_hw::load_still(path)?;
        self.source.load_still(frame.clone());
        if !self.commands.identify_still(frame) {
            tracing::warn!("security loop is gone; still image will not be identified");
        }
        self.ui.log_line("Image Loaded.");
        Ok(())
    }

    pub fn use_camera(&self) -> Result<(), ControlError> {
        if self.ctx.is_locked() {
            return Err(ControlError::Locked);
        }
        self.source.use_live();
        self.ui.log_line("Switched to Live Camera.");
        Ok(())
    }

    /// Stop both loops and release the camera. Later calls do nothing.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.ctx.request_shutdown();
        self.source.release();
        tracing::info!("monitor stopped");
    }
}

/// Build every component from `config` and start the security and render
/// threads.
///
/// Missing hardware, models and services degrade the monitor instead of
/// failing startup. Only local storage problems are fatal.
pub fn spawn_monitor(
    config: &Config,
    runtime: Handle,
) -> Result<(MonitorHandle, Receiver<UiEvent>), EngineError> {
    let ctx = SecurityContext::new(
        config.admin_id.clone(),
        DisplayOptions::new(config.show_identity, config.show_objects, config.voice),
    );

    let journal = Arc::new(EventJournal::open(&config.log_file)?);
    tracing::info!(path = %config.log_file.display(), "event journal open");

    let (ui, events) = ui_queue();
    let announcer: Arc<dyn Announcer> = Arc::new(ui.clone());

    let camera = match Camera::open(&config.camera_device) {
        Ok(camera) => {
            tracing::info!(
                device = %config.camera_device,
                width = camera.width,
                height = camera.height,
                format = ?camera.pixel_format(),
                "camera opened"
            );
            LiveCamera::new(camera)
        }
        Err(e) => {
            let available: Vec<String> = Camera::list_devices()
                .into_iter()
                .map(|d| format!("{} ({}, {})", d.path, d.name, d.driver))
                .collect();
            tracing::warn!(
                device = %config.camera_device,
                error = %e,
                ?available,
                "camera unavailable; live frames disabled"
            );
            LiveCamera::disconnected()
        }
    };
    let camera_open = camera.is_open();
    let source = Arc::new(SourceSelector::new(Box::new(camera)));

    let model_path = config.scrfd_model_path();
    let faces: Option<Box<dyn FaceRegionDetector>> = match ScrfdDetector::load(&model_path) {
        Ok(detector) => Some(Box::new(detector)),
        Err(e) => {
            tracing::warn!(path = %model_path.display(), error = %e, "face boxes disabled");
            None
        }
    };
    let face_boxes = faces.is_some();

    let http = HttpBridge::new(runtime)?;

    let oracle: Arc<dyn IdentityOracle> = match &config.face_search_url {
        Some(url) => {
            tracing::info!(url = %url, "face search service configured");
            Arc::new(HttpIdentityOracle::new(url.clone(), http.clone()))
        }
        None => {
            tracing::warn!("DESKGUARD_FACE_SEARCH_URL not set; the system cannot unlock");
            Arc::new(UnconfiguredOracle)
        }
    };

    let objects: Option<Arc<dyn ObjectDetector>> = match &config.object_detect_url {
        Some(url) => Some(Arc::new(HttpObjectDetector::new(url.clone(), http.clone()))),
        None => {
            tracing::warn!("DESKGUARD_OBJECT_DETECT_URL not set; object boxes disabled");
            None
        }
    };

    let vision: Option<Arc<dyn VisionLanguageService>> = match &config.vision_api_key {
        Some(key) => Some(Arc::new(GeminiVision::new(
            key.clone(),
            config.vision_model.clone(),
            http,
        ))),
        None => {
            tracing::warn!("DESKGUARD_VISION_API_KEY not set; scene analysis unavailable");
            None
        }
    };

    let availability = Availability {
        camera: camera_open,
        face_boxes,
        face_search: config.face_search_url.is_some(),
        object_detection: objects.is_some(),
        vision: vision.is_some(),
    };

    let trap = IntrusionTrap::new(
        &config.intruder_dir,
        config.intruder_cooldown,
        journal.clone(),
        announcer.clone(),
    )?;

    let (security, commands) = SecurityLoop::new(
        ctx.clone(),
        source.clone(),
        oracle,
        trap,
        journal.clone(),
        announcer.clone(),
    );
    let security = security.with_intervals(config.security_interval, config.static_idle);

    let frames: Arc<dyn FrameSource> = source.clone();
    let render = RenderLoop::new(ctx.clone(), frames.clone(), faces, objects, ui.clone())
        .with_interval(config.render_interval)
        .with_object_confidence(config.object_confidence);

    let analysis = AnalysisAction::new(ctx.clone(), frames, vision, journal, announcer);

    spawn("deskguard-security", move || security.run())?;
    spawn("deskguard-render", move || render.run())?;

    tracing::info!(admin = %config.admin_id, ?availability, "monitor running");

    let handle = MonitorHandle {
        ctx,
        source,
        analysis,
        commands,
        ui,
        log_path: config.log_file.clone(),
        availability,
        stopped: AtomicBool::new(false),
    };
    Ok((handle, events))
}

fn spawn(name: &'static str, body: impl FnOnce() + Send + 'static) -> Result<(), EngineError> {
    std::thread::Builder::new()
        .name(name.into())
        .spawn(body)
        .map(drop)
        .map_err(|source| EngineError::Spawn { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config(dir: &Path) -> Config {
        Config {
            camera_device: "/dev/nonexistent-video".into(),
            admin_id: "admin".into(),
            log_file: dir.join("project_logs.csv"),
            intruder_dir: dir.join("intruders"),
            model_dir: dir.join("models"),
            face_search_url: None,
            object_detect_url: None,
            vision_api_key: None,
            vision_model: "gemini-2.0-flash".into(),
            intruder_cooldown: Duration::from_secs(5),
            security_interval: Duration::from_millis(10),
            static_idle: Duration::from_millis(10),
            render_interval: Duration::from_millis(10),
            object_confidence: 0.6,
            show_identity: true,
            show_objects: true,
            voice: false,
            speech_command: String::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_degraded_startup_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, _events) = spawn_monitor(&test_config(dir.path()), Handle::current()).unwrap();

        let availability = monitor.availability();
        assert!(!availability.camera);
        assert!(!availability.face_boxes);
        assert!(!availability.vision);
        assert!(monitor.context().is_locked());
        assert!(monitor.log_path().exists());
        assert!(dir.path().join("intruders").is_dir());

        monitor.shutdown();
        monitor.shutdown();
        assert!(monitor.context().is_shutting_down());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_source_controls_rejected_while_locked() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, _events) = spawn_monitor(&test_config(dir.path()), Handle::current()).unwrap();

        let still = dir.path().join("still.png");
        image::RgbImage::new(4, 4).save(&still).unwrap();

        assert!(matches!(monitor.load_image(&still), Err(ControlError::Locked)));
        assert!(matches!(monitor.use_camera(), Err(ControlError::Locked)));
        assert!(!monitor.is_static());
        monitor.shutdown();
    }
}
