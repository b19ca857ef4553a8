//! On-demand scene description, gated by lock state and the scan gate.

use crate::context::SecurityContext;
use crate::gate::{ScanGate, ScanPermit};
use crate::journal::{EventJournal, EventKind};
use crate::services::{Announcer, FrameSource, VisionLanguageService};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

pub const ANALYSIS_PROMPT: &str = "Describe this image concisely. List people and objects.";

/// Why a trigger did not start a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rejected {
    /// Action is disabled while the system is locked.
    Locked,
    /// A scan is already in flight.
    Busy,
    /// No vision-language service is configured.
    Unavailable,
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rejected::Locked => "locked",
            Rejected::Busy => "busy",
            Rejected::Unavailable => "unavailable",
        })
    }
}

#[derive(Clone)]
pub struct AnalysisAction {
    ctx: Arc<SecurityContext>,
    source: Arc<dyn FrameSource>,
    service: Option<Arc<dyn VisionLanguageService>>,
    gate: Arc<ScanGate>,
    journal: Arc<EventJournal>,
    announcer: Arc<dyn Announcer>,
}

impl AnalysisAction {
    pub fn new(
        ctx: Arc<SecurityContext>,
        source: Arc<dyn FrameSource>,
        service: Option<Arc<dyn VisionLanguageService>>,
        journal: Arc<EventJournal>,
        announcer: Arc<dyn Announcer>,
    ) -> Self {
        Self {
            ctx,
            source,
            service,
            gate: ScanGate::new(),
            journal,
            announcer,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.gate.is_busy()
    }

    /// Start a scan on a background thread.
    ///
    /// Rejections never queue. A locked system is rejected before the gate
    /// is touched.
    pub fn trigger(&self) -> Result<JoinHandle<()>, Rejected> {
        if self.ctx.is_locked() {
            return Err(Rejected::Locked);
        }
        let permit = self.gate.try_acquire().ok_or(Rejected::Busy)?;

        let Some(service) = self.service.clone() else {
            self.announcer.log_line("Error: vision service not connected.");
            return Err(Rejected::Unavailable);
        };

        let this = self.clone();
        std::thread::Builder::new()
            .name("deskguard-analysis".into())
            .spawn(move || this.run(permit, service))
            .map_err(|e| {
                tracing::error!(error = %e, "failed to spawn analysis thread");
                Rejected::Unavailable
            })
    }

    fn run(&self, _permit: ScanPermit, service: Arc<dyn VisionLanguageService>) {
        self.announcer.log_line("Sending to AI...");

        let Some(frame) = self.source.current_frame() else {
            tracing::debug!("analysis: no frame available");
            return;
        };

        match service.describe(ANALYSIS_PROMPT, &frame) {
            Ok(text) => {
                tracing::info!(chars = text.len(), "analysis complete");
                self.announcer.log_line(&format!("AI: {text}"));
                if let Err(e) = self.journal.append(EventKind::AiAnalysis, &text) {
                    tracing::warn!(error = %e, "failed to journal analysis");
                }
                self.announcer.speak(&text);
            }
            Err(e) => {
                tracing::error!(error = %e, "vision service call failed");
                self.announcer.log_line(&format!("Error: {e}"));
            }
        }
    }
}
