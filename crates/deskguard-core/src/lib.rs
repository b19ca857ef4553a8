//! deskguard-core: Security decision loop for the DeskGuard monitor.
//!
//! Fuses identity-oracle results with the lock state, traps intruders
//! behind a cooldown, renders detection overlays on an independent
//! cadence and gates on-demand scene analysis.

pub mod analysis;
pub mod announce;
pub mod context;
pub mod detector;
pub mod frame;
pub mod gate;
pub mod identity;
pub mod journal;
pub mod lock;
pub mod render;
pub mod security;
pub mod services;
pub mod source;
pub mod trap;
pub mod types;

pub use analysis::{AnalysisAction, Rejected};
pub use announce::{ui_queue, UiEvent, UiQueue};
pub use context::{DisplayOption, DisplayOptions, SecurityContext};
pub use frame::{Frame, FrameError, FrameOrigin};
pub use identity::{CurrentIdentity, IdentityResult};
pub use journal::{EventJournal, EventKind};
pub use lock::{LockState, LockStatus};
pub use render::{RenderLoop, RenderedFrame};
pub use security::{SecurityCommands, SecurityLoop};
pub use services::{
    Announcer, FaceRegionDetector, FrameSource, IdentityOracle, ObjectDetector, OracleError,
    ServiceError, VisionLanguageService,
};
pub use source::SourceSelector;
pub use trap::{IntrusionEvent, IntrusionTrap};
pub use types::{BoundingBox, Candidate, ObjectDetection};
