//! The security loop: recognition, unlock and intrusion trapping.
//!
//! Runs on its own OS thread at roughly 2 Hz. It is the only writer of the
//! lock state and the current identity. Oracle failures degrade the
//! identity to `None` and never stop the loop.

use crate::context::{DisplayOption, SecurityContext};
use crate::frame::Frame;
use crate::identity::{CurrentIdentity, IdentityResult};
use crate::journal::{EventJournal, EventKind};
use crate::lock::UnlockOutcome;
use crate::services::{Announcer, FrameSource, IdentityOracle};
use crate::source::SourceSelector;
use crate::trap::{IntrusionEvent, IntrusionTrap};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_STATIC_IDLE: Duration = Duration::from_secs(1);

/// Requests handled on the security thread between ticks.
#[derive(Debug)]
pub enum SecurityCommand {
    /// One-shot identification of an uploaded still. Updates the current
    /// identity only; never unlocks or traps.
    IdentifyStill(Frame),
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    StaticMode,
    NoFrame,
    /// Unlocked with identity boxes off: recognition has no observer.
    Idle,
    Identified {
        result: IdentityResult,
        unlocked: bool,
        intrusion: Option<IntrusionEvent>,
    },
}

/// Sending half for [`SecurityCommand`]s.
#[derive(Debug, Clone)]
pub struct SecurityCommands {
    tx: mpsc::Sender<SecurityCommand>,
}

impl SecurityCommands {
    pub fn identify_still(&self, frame: Frame) -> bool {
        self.tx.send(SecurityCommand::IdentifyStill(frame)).is_ok()
    }
}

pub struct SecurityLoop {
    ctx: Arc<SecurityContext>,
    source: Arc<SourceSelector>,
    oracle: Arc<dyn IdentityOracle>,
    trap: IntrusionTrap,
    journal: Arc<EventJournal>,
    announcer: Arc<dyn Announcer>,
    commands: mpsc::Receiver<SecurityCommand>,
    interval: Duration,
    static_idle: Duration,
    /// Last oracle failure reason, so a persistent outage warns once.
    last_error: Option<String>,
}

impl SecurityLoop {
    pub fn new(
        ctx: Arc<SecurityContext>,
        source: Arc<SourceSelector>,
        oracle: Arc<dyn IdentityOracle>,
        trap: IntrusionTrap,
        journal: Arc<EventJournal>,
        announcer: Arc<dyn Announcer>,
    ) -> (Self, SecurityCommands) {
        let (tx, commands) = mpsc::channel();
        let this = Self {
            ctx,
            source,
            oracle,
            trap,
            journal,
            announcer,
            commands,
            interval: DEFAULT_INTERVAL,
            static_idle: DEFAULT_STATIC_IDLE,
            last_error: None,
        };
        (this, SecurityCommands { tx })
    }

    /// Override the tick pause and the static-mode idle pause.
    pub fn with_intervals(mut self, interval: Duration, static_idle: Duration) -> Self {
        self.interval = interval;
        self.static_idle = static_idle;
        self
    }

    /// Run until the context's shutdown flag is set.
    pub fn run(mut self) {
        tracing::info!(admin = self.ctx.admin_id(), "security loop started");
        while !self.ctx.is_shutting_down() {
            self.drain_commands();
            let pause = match self.tick(Instant::now()) {
                TickOutcome::StaticMode => self.static_idle,
                _ => self.interval,
            };
            std::thread::sleep(pause);
        }
        tracing::info!("security loop exiting");
    }

    /// Handle queued commands without blocking.
    pub fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                SecurityCommand::IdentifyStill(frame) => self.identify_still(&frame),
            }
        }
    }

    /// One recognition pass.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.source.is_static() {
            return TickOutcome::StaticMode;
        }

        let Some(frame) = self.source.current_frame() else {
            tracing::debug!("no frame available; skipping tick");
            return TickOutcome::NoFrame;
        };
        // A still may have been loaded while the capture was blocking.
        if self.source.is_static() {
            return TickOutcome::StaticMode;
        }

        let locked = self.ctx.is_locked();
        if !locked && !self.ctx.options().get(DisplayOption::IdentityBoxes) {
            return TickOutcome::Idle;
        }

        let result = IdentityResult::from_oracle(self.oracle.find(&frame));
        match &result {
            IdentityResult::Indeterminate => tracing::debug!("no face in frame"),
            IdentityResult::Error(reason) if self.last_error.as_ref() != Some(reason) => {
                tracing::warn!(reason = %reason, "identity oracle failed");
            }
            IdentityResult::Error(reason) => tracing::debug!(reason = %reason, "identity oracle still failing"),
            IdentityResult::Matched(label) => tracing::debug!(label = %label, "face matched"),
            IdentityResult::Unmatched => tracing::debug!("face not in reference database"),
        }
        self.last_error = match &result {
            IdentityResult::Error(reason) => Some(reason.clone()),
            _ => None,
        };
        self.ctx.set_identity(result.current_identity());

        let mut unlocked = false;
        let mut intrusion = None;
        match &result {
            IdentityResult::Matched(_) => {
                if self.ctx.lock().try_unlock(&result) == UnlockOutcome::Unlocked {
                    self.announce_unlock();
                    unlocked = true;
                }
            }
            IdentityResult::Unmatched if locked => {
                intrusion = self.trap.maybe_trap(&frame, now);
            }
            _ => {}
        }

        TickOutcome::Identified {
            result,
            unlocked,
            intrusion,
        }
    }

    fn identify_still(&mut self, frame: &Frame) {
        let identity = match IdentityResult::from_oracle(self.oracle.find(frame)) {
            IdentityResult::Matched(label) => CurrentIdentity::Known(label),
            _ => CurrentIdentity::Unknown,
        };
        tracing::info!(identity = %identity, "still image identified");
        self.ctx.set_identity(identity);
    }

    fn announce_unlock(&self) {
        let admin = self.ctx.admin_id();
        let line = format!("System Unlocked by {admin}");
        tracing::info!(admin, "access granted");
        self.announcer.speak(&format!("Welcome Administrator {admin}"));
        self.announcer.log_line(&line);
        if let Err(e) = self.journal.append(EventKind::AccessGranted, &line) {
            tracing::warn!(error = %e, "failed to journal unlock");
        }
    }
}
