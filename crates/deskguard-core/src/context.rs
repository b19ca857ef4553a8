//! State shared by the security loop, render loop and control surface.

use crate::identity::CurrentIdentity;
use crate::lock::LockState;
use serde::Serialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Operator toggles exposed on the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOption {
    IdentityBoxes,
    ObjectBoxes,
    Voice,
}

impl FromStr for DisplayOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "identity_boxes" => Ok(DisplayOption::IdentityBoxes),
            "object_boxes" => Ok(DisplayOption::ObjectBoxes),
            "voice" => Ok(DisplayOption::Voice),
            other => Err(format!("unknown option: {other}")),
        }
    }
}

#[derive(Debug)]
pub struct DisplayOptions {
    identity_boxes: AtomicBool,
    object_boxes: AtomicBool,
    voice: AtomicBool,
}

impl DisplayOptions {
    pub fn new(identity_boxes: bool, object_boxes: bool, voice: bool) -> Self {
        Self {
            identity_boxes: AtomicBool::new(identity_boxes),
            object_boxes: AtomicBool::new(object_boxes),
            voice: AtomicBool::new(voice),
        }
    }

    fn flag(&self, option: DisplayOption) -> &AtomicBool {
        match option {
            DisplayOption::IdentityBoxes => &self.identity_boxes,
            DisplayOption::ObjectBoxes => &self.object_boxes,
            DisplayOption::Voice => &self.voice,
        }
    }

    pub fn get(&self, option: DisplayOption) -> bool {
        self.flag(option).load(Ordering::Relaxed)
    }

    pub fn set(&self, option: DisplayOption, enabled: bool) {
        self.flag(option).store(enabled, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OptionsSnapshot {
        OptionsSnapshot {
            identity_boxes: self.get(DisplayOption::IdentityBoxes),
            object_boxes: self.get(DisplayOption::ObjectBoxes),
            voice: self.get(DisplayOption::Voice),
        }
    }
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self::new(true, true, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptionsSnapshot {
    pub identity_boxes: bool,
    pub object_boxes: bool,
    pub voice: bool,
}

/// Lock state, current identity, options and the shutdown flag.
///
/// Lock state and identity are written only by the security loop; every
/// other holder of the handle reads.
#[derive(Debug)]
pub struct SecurityContext {
    lock: LockState,
    identity: RwLock<CurrentIdentity>,
    options: DisplayOptions,
    shutdown: AtomicBool,
}

impl SecurityContext {
    pub fn new(admin_id: impl Into<String>, options: DisplayOptions) -> Arc<Self> {
        Arc::new(Self {
            lock: LockState::new(admin_id),
            identity: RwLock::new(CurrentIdentity::None),
            options,
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn lock(&self) -> &LockState {
        &self.lock
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn admin_id(&self) -> &str {
        self.lock.admin_id()
    }

    pub fn options(&self) -> &DisplayOptions {
        &self.options
    }

    pub fn current_identity(&self) -> CurrentIdentity {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_identity(&self, identity: CurrentIdentity) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_names() {
        assert_eq!("identity_boxes".parse::<DisplayOption>(), Ok(DisplayOption::IdentityBoxes));
        assert_eq!("object-boxes".parse::<DisplayOption>(), Ok(DisplayOption::ObjectBoxes));
        assert_eq!("voice".parse::<DisplayOption>(), Ok(DisplayOption::Voice));
        assert!("volume".parse::<DisplayOption>().is_err());
    }

    #[test]
    fn test_options_toggle() {
        let options = DisplayOptions::default();
        options.set(DisplayOption::Voice, false);
        let snap = options.snapshot();
        assert!(snap.identity_boxes && snap.object_boxes && !snap.voice);
    }

    #[test]
    fn test_fresh_context() {
        let ctx = SecurityContext::new("admin", DisplayOptions::default());
        assert!(ctx.is_locked());
        assert_eq!(ctx.current_identity(), CurrentIdentity::None);
        assert!(!ctx.is_shutting_down());
        ctx.request_shutdown();
        assert!(ctx.is_shutting_down());
    }
}
