//! Hand-off from background loops to the presentation layer.
//!
//! Loops never touch presentation state. They post [`UiEvent`]s onto a
//! queue that the presentation task drains once per tick on its own
//! thread of control.

use crate::render::RenderedFrame;
use crate::services::Announcer;
use std::sync::mpsc;
use std::sync::Arc;

/// Messages for the presentation layer.
#[derive(Debug)]
pub enum UiEvent {
    /// Operator log line.
    Log(String),
    /// Text to speak if voice is enabled.
    Speak(String),
    /// Latest composited video frame.
    Frame(Arc<RenderedFrame>),
}

/// Sending half of the presentation queue. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct UiQueue {
    tx: mpsc::Sender<UiEvent>,
}

/// Create the queue. The receiver belongs to the presentation task.
pub fn ui_queue() -> (UiQueue, mpsc::Receiver<UiEvent>) {
    let (tx, rx) = mpsc::channel();
    (UiQueue { tx }, rx)
}

impl UiQueue {
    pub fn post(&self, event: UiEvent) {
        // The receiver only disappears during shutdown.
        if self.tx.send(event).is_err() {
            tracing::trace!("presentation queue closed; dropping event");
        }
    }
}

impl Announcer for UiQueue {
    fn speak(&self, text: &str) {
        self.post(UiEvent::Speak(text.to_string()));
    }

    fn log_line(&self, text: &str) {
        tracing::info!(target: "deskguard::operator", "{text}");
        self.post(UiEvent::Log(text.to_string()));
    }
}
