//! Live/static frame source selection.

use crate::frame::{Frame, FrameOrigin};
use crate::services::FrameSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// Serves frames from the live camera, or from a frozen still while in
/// static mode. Both loops sample it independently.
pub struct SourceSelector {
    live: Box<dyn FrameSource>,
    still: RwLock<Option<Frame>>,
    static_mode: AtomicBool,
}

impl SourceSelector {
    pub fn new(live: Box<dyn FrameSource>) -> Self {
        Self {
            live,
            still: RwLock::new(None),
            static_mode: AtomicBool::new(false),
        }
    }

    pub fn is_static(&self) -> bool {
        self.static_mode.load(Ordering::Acquire)
    }

    /// Freeze on `frame` and enter static mode.
    pub fn load_still(&self, frame: Frame) {
        let frame = Frame {
            origin: FrameOrigin::Static,
            ..frame
        };
        *self.still.write().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        self.static_mode.store(true, Ordering::Release);
    }

    /// Leave static mode. The still is kept but no longer served.
    pub fn use_live(&self) {
        self.static_mode.store(false, Ordering::Release);
    }
}

impl FrameSource for SourceSelector {
    fn current_frame(&self) -> Option<Frame> {
        if self.is_static() {
            self.still
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .map(Frame::resampled)
        } else {
            self.live.current_frame()
        }
    }

    fn release(&self) {
        self.live.release();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Live source that counts captures and returns a fixed frame.
    #[derive(Default)]
    pub(crate) struct CountingSource {
        pub captures: Arc<AtomicUsize>,
        pub empty: bool,
    }

    impl FrameSource for CountingSource {
        fn current_frame(&self) -> Option<Frame> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return None;
            }
            Frame::from_rgb(vec![40; 6 * 4 * 3], 6, 4, FrameOrigin::Live, 0).ok()
        }
    }

    fn still() -> Frame {
        Frame::from_rgb(vec![200; 2 * 2 * 3], 2, 2, FrameOrigin::Live, 0).unwrap()
    }

    #[test]
    fn test_live_by_default() {
        let selector = SourceSelector::new(Box::new(CountingSource::default()));
        let frame = selector.current_frame().unwrap();
        assert_eq!(frame.origin, FrameOrigin::Live);
        assert!(!selector.is_static());
    }

    #[test]
    fn test_static_mode_serves_still_without_capturing() {
        let live = CountingSource::default();
        let captures = live.captures.clone();
        let selector = SourceSelector::new(Box::new(live));

        selector.load_still(still());
        let frame = selector.current_frame().unwrap();

        assert!(selector.is_static());
        assert_eq!(frame.origin, FrameOrigin::Static);
        assert_eq!((frame.width, frame.height), (2, 2));
        assert_eq!(captures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_use_live_resumes_camera() {
        let selector = SourceSelector::new(Box::new(CountingSource::default()));
        selector.load_still(still());
        selector.use_live();
        assert_eq!(selector.current_frame().unwrap().origin, FrameOrigin::Live);
    }
}
