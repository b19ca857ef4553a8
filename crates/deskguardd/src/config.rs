use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Reference-database group label that unlocks the system.
    pub admin_id: String,
    /// CSV event journal.
    pub log_file: PathBuf,
    /// Directory for intruder evidence photos.
    pub intruder_dir: PathBuf,
    /// Directory containing the SCRFD face detector model.
    pub model_dir: PathBuf,
    /// Face search endpoint backing the identity oracle.
    pub face_search_url: Option<String>,
    /// Object detection endpoint.
    pub object_detect_url: Option<String>,
    /// API key for the vision-language service. Unset disables analysis.
    pub vision_api_key: Option<String>,
    pub vision_model: String,
    pub intruder_cooldown: Duration,
    pub security_interval: Duration,
    /// Security loop pause while a static image is shown.
    pub static_idle: Duration,
    pub render_interval: Duration,
    /// Minimum confidence for object overlay boxes.
    pub object_confidence: f32,
    pub show_identity: bool,
    pub show_objects: bool,
    pub voice: bool,
    /// Text-to-speech program, invoked with the text as its only argument.
    /// Empty disables speech output.
    pub speech_command: String,
}

impl Config {
    /// Load configuration from `DESKGUARD_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = var("DESKGUARD_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| {
            var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                    PathBuf::from(home).join(".local/share")
                })
                .join("deskguard")
        });

        let millis = |key: &str, default: u64| Duration::from_millis(parse_or(&var, key, default));
        let flag = |key: &str| var(key).map(|v| v != "0").unwrap_or(true);
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        Self {
            camera_device: var("DESKGUARD_CAMERA_DEVICE")
                .unwrap_or_else(|| "/dev/video0".to_string()),
            admin_id: var("DESKGUARD_ADMIN").unwrap_or_else(|| "admin".to_string()),
            log_file: var("DESKGUARD_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("project_logs.csv")),
            intruder_dir: var("DESKGUARD_INTRUDER_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("intruders")),
            model_dir: var("DESKGUARD_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/usr/share/deskguard/models")),
            face_search_url: non_empty("DESKGUARD_FACE_SEARCH_URL"),
            object_detect_url: non_empty("DESKGUARD_OBJECT_DETECT_URL"),
            vision_api_key: non_empty("DESKGUARD_VISION_API_KEY"),
            vision_model: var("DESKGUARD_VISION_MODEL")
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            intruder_cooldown: Duration::from_secs(parse_or(&var, "DESKGUARD_INTRUDER_COOLDOWN_SECS", 5)),
            security_interval: millis("DESKGUARD_SECURITY_INTERVAL_MS", 500),
            static_idle: millis("DESKGUARD_STATIC_IDLE_MS", 1000),
            render_interval: millis("DESKGUARD_RENDER_INTERVAL_MS", 30),
            object_confidence: parse_or(&var, "DESKGUARD_OBJECT_CONFIDENCE", 0.60),
            show_identity: flag("DESKGUARD_SHOW_IDENTITY"),
            show_objects: flag("DESKGUARD_SHOW_OBJECTS"),
            voice: flag("DESKGUARD_VOICE"),
            speech_command: var("DESKGUARD_SPEECH_COMMAND")
                .unwrap_or_else(|| default_speech_command().to_string()),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> PathBuf {
        self.model_dir.join("det_10g.onnx")
    }
}

fn default_speech_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak"
    }
}

fn parse_or<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
