//! Presentation task: the only owner of panel state.
//!
//! Background loops post [`UiEvent`]s; this task drains them once per tick
//! and publishes the resulting [`PanelState`] over a watch channel for the
//! control surface to read.

use crate::speech::Speaker;
use chrono::{Local, NaiveTime};
use deskguard_core::{DisplayOption, RenderedFrame, SecurityContext, UiEvent};
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const TICK: Duration = Duration::from_millis(30);
/// Operator log lines kept for status queries.
pub const LOG_CAPACITY: usize = 200;

pub const LOCKED_BANNER: &str = "SYSTEM LOCKED - SCANNING...";

#[derive(Debug, Clone, Default)]
pub struct PanelState {
    pub banner: String,
    /// Analysis and source controls; disabled while locked.
    pub controls_enabled: bool,
    /// `[HH:MM:SS] line`, oldest first.
    pub log: VecDeque<String>,
    pub frame: Option<Arc<RenderedFrame>>,
}

impl PanelState {
    pub fn recent_log(&self, count: usize) -> Vec<String> {
        let skip = self.log.len().saturating_sub(count);
        self.log.iter().skip(skip).cloned().collect()
    }
}

pub struct Presenter {
    ctx: Arc<SecurityContext>,
    events: Receiver<UiEvent>,
    speaker: Speaker,
    panel: watch::Sender<PanelState>,
}

impl Presenter {
    pub fn new(
        ctx: Arc<SecurityContext>,
        events: Receiver<UiEvent>,
        speaker: Speaker,
    ) -> (Self, watch::Receiver<PanelState>) {
        let initial = PanelState {
            banner: LOCKED_BANNER.to_string(),
            ..PanelState::default()
        };
        let (panel, rx) = watch::channel(initial);
        (
            Self {
                ctx,
                events,
                speaker,
                panel,
            },
            rx,
        )
    }

    /// Drain the queue every [`TICK`] until shutdown.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!("presentation task started");
        loop {
            ticker.tick().await;
            if self.ctx.is_shutting_down() || !self.drain(Local::now().time()) {
                break;
            }
        }
        tracing::info!("presentation task exiting");
    }

    /// Apply every pending event and refresh the banner.
    ///
    /// Returns `false` once all senders are gone.
    pub fn drain(&mut self, now: NaiveTime) -> bool {
        let mut connected = true;
        let mut pending = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => pending.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    connected = false;
                    break;
                }
            }
        }

        let locked = self.ctx.is_locked();
        let admin = self.ctx.admin_id().to_string();
        let voice = self.ctx.options().get(DisplayOption::Voice);

        self.panel.send_if_modified(|panel| {
            let mut changed = false;
            let (banner, controls) = if locked {
                (LOCKED_BANNER.to_string(), false)
            } else {
                (format!("ACCESS GRANTED: {admin}"), true)
            };
            if panel.banner != banner || panel.controls_enabled != controls {
                panel.banner = banner;
                panel.controls_enabled = controls;
                changed = true;
            }

            for event in pending {
                match event {
                    UiEvent::Log(line) => {
                        if panel.log.len() == LOG_CAPACITY {
                            panel.log.pop_front();
                        }
                        panel.log.push_back(format!("[{}] {line}", now.format("%H:%M:%S")));
                        changed = true;
                    }
                    UiEvent::Speak(text) => {
                        if voice {
                            self.speaker.say(&text);
                        }
                    }
                    UiEvent::Frame(frame) => {
                        panel.frame = Some(frame);
                        changed = true;
                    }
                }
            }
            changed
        });

        connected
    }
}
