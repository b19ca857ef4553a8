//! Intruder evidence capture with a single global cooldown.

use crate::frame::Frame;
use crate::journal::{EventJournal, EventKind};
use crate::services::Announcer;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum TrapError {
    #[error("cannot create evidence directory {path}: {source}")]
    EvidenceDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A trapped intrusion. Never modified after creation.
#[derive(Debug, Clone)]
pub struct IntrusionEvent {
    pub timestamp: DateTime<Local>,
    pub evidence_path: PathBuf,
    pub note: String,
}

pub struct IntrusionTrap {
    evidence_dir: PathBuf,
    cooldown: Duration,
    last_trap: Option<Instant>,
    journal: Arc<EventJournal>,
    announcer: Arc<dyn Announcer>,
}

impl IntrusionTrap {
    pub fn new(
        evidence_dir: impl Into<PathBuf>,
        cooldown: Duration,
        journal: Arc<EventJournal>,
        announcer: Arc<dyn Announcer>,
    ) -> Result<Self, TrapError> {
        let evidence_dir = evidence_dir.into();
        std::fs::create_dir_all(&evidence_dir).map_err(|source| TrapError::EvidenceDir {
            path: evidence_dir.clone(),
            source,
        })?;
        Ok(Self {
            evidence_dir,
            cooldown,
            last_trap: None,
            journal,
            announcer,
        })
    }

    pub fn evidence_dir(&self) -> &Path {
        &self.evidence_dir
    }

    /// Record an intrusion unless one was recorded within the cooldown.
    ///
    /// The caller is responsible for only invoking this while locked and
    /// unmatched.
    pub fn maybe_trap(&mut self, frame: &Frame, now: Instant) -> Option<IntrusionEvent> {
        if let Some(last) = self.last_trap {
            if now.saturating_duration_since(last) <= self.cooldown {
                return None;
            }
        }
        self.last_trap = Some(now);

        let timestamp = Local::now();
        let evidence_path = self.evidence_path(&timestamp);

        // A failed write still counts as a trap and starts the cooldown.
        let note = match frame.to_rgb_image().save(&evidence_path) {
            Ok(()) => "INTRUDER! Photo saved.".to_string(),
            Err(e) => {
                tracing::warn!(path = %evidence_path.display(), error = %e, "failed to save evidence photo");
                format!("INTRUDER! Photo could not be saved: {e}")
            }
        };

        let detail = format!("Saved to {}", evidence_path.display());
        if let Err(e) = self.journal.append(EventKind::SecurityAlert, &detail) {
            tracing::warn!(error = %e, "failed to journal intrusion");
        }

        tracing::warn!(path = %evidence_path.display(), "intruder trapped");
        self.announcer.log_line(&note);
        self.announcer.speak("Warning. Intruder detected.");

        Some(IntrusionEvent {
            timestamp,
            evidence_path,
            note,
        })
    }

    /// `Intruder_HH-MM-SS.jpg`, or `Intruder_HH-MM-SS_N.jpg` when that name is
    /// already taken by an earlier event.
    fn evidence_path(&self, timestamp: &DateTime<Local>) -> PathBuf {
        let stem = format!("Intruder_{}", timestamp.format("%H-%M-%S"));
        let first = self.evidence_dir.join(format!("{stem}.jpg"));
        if !first.exists() {
            return first;
        }
        (2u32..)
            .map(|n| self.evidence_dir.join(format!("{stem}_{n}.jpg")))
            .find(|path| !path.exists())
            .unwrap_or(first)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::frame::FrameOrigin;
    use std::sync::Mutex;

    /// Announcer that records everything it is asked to say.
    #[derive(Default)]
    pub(crate) struct RecordingAnnouncer {
        pub spoken: Mutex<Vec<String>>,
        pub logged: Mutex<Vec<String>>,
    }

    impl RecordingAnnouncer {
        pub fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }

        pub fn logged(&self) -> Vec<String> {
            self.logged.lock().unwrap().clone()
        }
    }

    impl Announcer for RecordingAnnouncer {
        fn speak(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }

        fn log_line(&self, text: &str) {
            self.logged.lock().unwrap().push(text.to_string());
        }
    }

    pub(crate) fn test_frame() -> Frame {
        Frame::from_rgb(vec![90; 4 * 4 * 3], 4, 4, FrameOrigin::Live, 1).unwrap()
    }

    fn trap_in(dir: &Path) -> (IntrusionTrap, Arc<RecordingAnnouncer>, Arc<EventJournal>) {
        trap_with_cooldown(dir, DEFAULT_COOLDOWN)
    }

    fn trap_with_cooldown(
        dir: &Path,
        cooldown: Duration,
    ) -> (IntrusionTrap, Arc<RecordingAnnouncer>, Arc<EventJournal>) {
        let journal = Arc::new(EventJournal::open(dir.join("logs.csv")).unwrap());
        let announcer = Arc::new(RecordingAnnouncer::default());
        let trap = IntrusionTrap::new(
            dir.join("intruders"),
            cooldown,
            journal.clone(),
            announcer.clone(),
        )
        .unwrap();
        (trap, announcer, journal)
    }

    #[test]
    fn test_first_trap_fires_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (mut trap, announcer, journal) = trap_in(dir.path());

        let event = trap.maybe_trap(&test_frame(), Instant::now()).unwrap();

        assert!(event.evidence_path.exists());
        let name = event.evidence_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Intruder_") && name.ends_with(".jpg"), "{name}");
        assert_eq!(announcer.spoken(), vec!["Warning. Intruder detected."]);
        assert_eq!(announcer.logged(), vec!["INTRUDER! Photo saved."]);

        let log = std::fs::read_to_string(journal.path()).unwrap();
        assert!(log.lines().nth(1).unwrap().contains(",SECURITY ALERT,Saved to "));
    }

    #[test]
    fn test_cooldown_suppresses_ticks_one_second_apart() {
        let dir = tempfile::tempdir().unwrap();
        let (mut trap, announcer, _) = trap_in(dir.path());
        let t0 = Instant::now();
        let frame = test_frame();

        let fired: Vec<_> = (0..3)
            .filter_map(|i| trap.maybe_trap(&frame, t0 + Duration::from_secs(i)))
            .collect();

        assert_eq!(fired.len(), 1);
        assert_eq!(announcer.spoken().len(), 1);
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let (mut trap, _, _) = trap_in(dir.path());
        let t0 = Instant::now();
        let frame = test_frame();

        assert!(trap.maybe_trap(&frame, t0).is_some());
        assert!(trap.maybe_trap(&frame, t0 + DEFAULT_COOLDOWN).is_none());
        assert!(trap
            .maybe_trap(&frame, t0 + DEFAULT_COOLDOWN + Duration::from_millis(1))
            .is_some());
    }

    #[test]
    fn test_event_count_bounded_by_window() {
        let dir = tempfile::tempdir().unwrap();
        let (mut trap, _, _) = trap_in(dir.path());
        let t0 = Instant::now();
        let frame = test_frame();

        // Half-second ticks for 30s.
        let fired: Vec<Instant> = (0..60u64)
            .map(|i| t0 + Duration::from_millis(i * 500))
            .filter(|&now| trap.maybe_trap(&frame, now).is_some())
            .collect();

        let window = Duration::from_secs(30);
        let bound = window.as_secs().div_ceil(DEFAULT_COOLDOWN.as_secs()) as usize;
        assert!(fired.len() <= bound, "{} > {bound}", fired.len());
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] >= DEFAULT_COOLDOWN);
        }
    }

    #[test]
    fn test_same_second_traps_keep_every_photo() {
        let dir = tempfile::tempdir().unwrap();
        let (mut trap, _, journal) = trap_with_cooldown(dir.path(), Duration::ZERO);
        let t0 = Instant::now();
        let frame = test_frame();

        let paths: Vec<PathBuf> = (1..=3u64)
            .filter_map(|i| trap.maybe_trap(&frame, t0 + Duration::from_millis(i)))
            .map(|event| event.evidence_path)
            .collect();

        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p.exists()));
        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[1], paths[2]);
        assert_ne!(paths[0], paths[2]);
        assert_eq!(std::fs::read_dir(trap.evidence_dir()).unwrap().count(), 3);

        let log = std::fs::read_to_string(journal.path()).unwrap();
        assert_eq!(log.matches("SECURITY ALERT").count(), 3);
    }
}
