//! Overlay rendering on its own short cadence.
//!
//! Face boxes come from the local detector; their label is whatever the
//! security loop last identified, applied to every box alike. Object
//! boxes are only drawn while unlocked.

use crate::announce::{UiEvent, UiQueue};
use crate::context::{DisplayOption, SecurityContext};
use crate::frame::{Frame, FrameOrigin};
use crate::identity::CurrentIdentity;
use crate::services::{FaceRegionDetector, FrameSource, ObjectDetector};
use crate::types::{BoundingBox, ObjectDetection};
use image::{Rgb, RgbImage};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30);
pub const DEFAULT_OBJECT_CONFIDENCE: f32 = 0.60;
/// Object boxes larger than this fraction of the frame are dropped.
pub const MAX_OBJECT_AREA_FRACTION: f32 = 0.70;

const BOX_THICKNESS: u32 = 2;
const OBJECT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// How a face box is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceStyle {
    Admin,
    Known,
    Unknown,
    /// Identity not established yet.
    Human,
}

impl FaceStyle {
    pub fn color(self) -> Rgb<u8> {
        match self {
            FaceStyle::Admin => Rgb([0, 255, 0]),
            FaceStyle::Known => Rgb([0, 165, 255]),
            FaceStyle::Unknown => Rgb([255, 0, 0]),
            FaceStyle::Human => Rgb([255, 255, 0]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FaceOverlay {
    pub bbox: BoundingBox,
    pub label: String,
    pub style: FaceStyle,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectOverlay {
    pub bbox: BoundingBox,
    pub label: String,
}

/// A composited frame ready for display.
#[derive(Debug)]
pub struct RenderedFrame {
    pub image: RgbImage,
    pub origin: FrameOrigin,
    pub faces: Vec<FaceOverlay>,
    pub objects: Vec<ObjectOverlay>,
}

/// Label and style for every face box given the last known identity.
pub fn face_style(identity: &CurrentIdentity, admin_id: &str) -> (String, FaceStyle) {
    match identity {
        CurrentIdentity::Known(label) if label == admin_id => (label.clone(), FaceStyle::Admin),
        CurrentIdentity::Known(label) => (label.clone(), FaceStyle::Known),
        CurrentIdentity::Unknown => ("Unknown".to_string(), FaceStyle::Unknown),
        CurrentIdentity::None => ("Human".to_string(), FaceStyle::Human),
    }
}

/// Object filter: drops near-full-frame boxes and people.
pub fn keep_object(detection: &ObjectDetection, frame_area: f32) -> bool {
    if detection.bbox.area() > frame_area * MAX_OBJECT_AREA_FRACTION {
        return false;
    }
    !detection.label.eq_ignore_ascii_case("person")
}

/// "cell phone" → "Cell Phone".
pub fn title_case(label: &str) -> String {
    label
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct RenderLoop {
    ctx: Arc<SecurityContext>,
    source: Arc<dyn FrameSource>,
    faces: Option<Box<dyn FaceRegionDetector>>,
    objects: Option<Arc<dyn ObjectDetector>>,
    object_confidence: f32,
    interval: Duration,
    ui: UiQueue,
}

impl RenderLoop {
    pub fn new(
        ctx: Arc<SecurityContext>,
        source: Arc<dyn FrameSource>,
        faces: Option<Box<dyn FaceRegionDetector>>,
        objects: Option<Arc<dyn ObjectDetector>>,
        ui: UiQueue,
    ) -> Self {
        Self {
            ctx,
            source,
            faces,
            objects,
            object_confidence: DEFAULT_OBJECT_CONFIDENCE,
            interval: DEFAULT_INTERVAL,
            ui,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_object_confidence(mut self, confidence: f32) -> Self {
        self.object_confidence = confidence;
        self
    }

    /// Run until shutdown, posting each composited frame to the presentation queue.
    pub fn run(mut self) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "render loop started");
        while !self.ctx.is_shutting_down() {
            let started = Instant::now();
            if let Some(rendered) = self.tick() {
                self.ui.post(UiEvent::Frame(Arc::new(rendered)));
            }
            if let Some(rest) = self.interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        tracing::info!("render loop exiting");
    }

    /// Compose one frame. `None` when there is nothing to draw this tick.
    pub fn tick(&mut self) -> Option<RenderedFrame> {
        let frame = self.source.current_frame()?;
        let locked = self.ctx.is_locked();
        let show_faces = locked || self.ctx.options().get(DisplayOption::IdentityBoxes);
        let show_objects = !locked && self.ctx.options().get(DisplayOption::ObjectBoxes);

        let faces = if show_faces {
            self.face_overlays(&frame)
        } else {
            Vec::new()
        };

        let objects = if show_objects {
            self.object_overlays(&frame)
        } else {
            Vec::new()
        };

        let mut image = frame.to_rgb_image();
        for face in &faces {
            draw_box(&mut image, &face.bbox, face.style.color());
        }
        for object in &objects {
            draw_box(&mut image, &object.bbox, OBJECT_COLOR);
        }

        Some(RenderedFrame {
            image,
            origin: frame.origin,
            faces,
            objects,
        })
    }

    fn face_overlays(&mut self, frame: &Frame) -> Vec<FaceOverlay> {
        let Some(detector) = self.faces.as_mut() else {
            return Vec::new();
        };
        let regions = match detector.detect(frame) {
            Ok(regions) => regions,
            Err(e) => {
                tracing::debug!(error = %e, "face region detection failed");
                return Vec::new();
            }
        };

        let (label, style) = face_style(&self.ctx.current_identity(), self.ctx.admin_id());
        regions
            .into_iter()
            .map(|bbox| FaceOverlay {
                bbox,
                label: label.clone(),
                style,
            })
            .collect()
    }

    fn object_overlays(&self, frame: &Frame) -> Vec<ObjectOverlay> {
        let Some(detector) = self.objects.as_ref() else {
            return Vec::new();
        };
        match detector.detect(frame, self.object_confidence) {
            Ok(detections) => detections
                .into_iter()
                .filter(|d| keep_object(d, frame.area()))
                .map(|d| ObjectOverlay {
                    label: title_case(&d.label),
                    bbox: d.bbox,
                })
                .collect(),
            Err(e) => {
                tracing::debug!(error = %e, "object detection failed");
                Vec::new()
            }
        }
    }
}

/// Draw a rectangle outline, clipped to the image.
fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let clamp_x = |v: f32| (v.max(0.0) as u32).min(w - 1);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(h - 1);
    let (x0, x1) = (clamp_x(bbox.x), clamp_x(bbox.x + bbox.width));
    let (y0, y1) = (clamp_y(bbox.y), clamp_y(bbox.y + bbox.height));

    for t in 0..BOX_THICKNESS {
        let top = (y0 + t).min(y1);
        let bottom = y1.saturating_sub(t).max(y0);
        for x in x0..=x1 {
            image.put_pixel(x, top, color);
            image.put_pixel(x, bottom, color);
        }
        let left = (x0 + t).min(x1);
        let right = x1.saturating_sub(t).max(x0);
        for y in y0..=y1 {
            image.put_pixel(left, y, color);
            image.put_pixel(right, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DisplayOptions;
    use crate::detector::DetectorError;
    use crate::services::ServiceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedFrame;

    impl FrameSource for FixedFrame {
        fn current_frame(&self) -> Option<Frame> {
            Frame::from_rgb(vec![0; 100 * 100 * 3], 100, 100, FrameOrigin::Live, 0).ok()
        }
    }

    struct NoFrame;

    impl FrameSource for NoFrame {
        fn current_frame(&self) -> Option<Frame> {
            None
        }
    }

    struct TwoFaces;

    impl FaceRegionDetector for TwoFaces {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>, DetectorError> {
            Ok(vec![
                BoundingBox::from_corners(10.0, 10.0, 30.0, 30.0, 0.9),
                BoundingBox::from_corners(60.0, 10.0, 80.0, 30.0, 0.8),
            ])
        }
    }

    #[derive(Default)]
    struct Objects {
        calls: AtomicUsize,
    }

    impl ObjectDetector for Objects {
        fn detect(&self, _frame: &Frame, confidence: f32) -> Result<Vec<ObjectDetection>, ServiceError> {
            assert_eq!(confidence, DEFAULT_OBJECT_CONFIDENCE);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                detection("cell phone", 10.0, 50.0, 30.0, 70.0),
                detection("person", 40.0, 40.0, 60.0, 90.0),
                // 80% of the frame.
                detection("dining table", 0.0, 0.0, 100.0, 80.0),
            ])
        }
    }

    fn detection(label: &str, x1: f32, y1: f32, x2: f32, y2: f32) -> ObjectDetection {
        ObjectDetection {
            bbox: BoundingBox::from_corners(x1, y1, x2, y2, 0.9),
            label: label.to_string(),
        }
    }

    fn render_loop(
        ctx: Arc<SecurityContext>,
        source: Arc<dyn FrameSource>,
        objects: Option<Arc<dyn ObjectDetector>>,
    ) -> RenderLoop {
        let (ui, _rx) = crate::announce::ui_queue();
        RenderLoop::new(ctx, source, Some(Box::new(TwoFaces)), objects, ui)
    }

    #[test]
    fn test_face_style_table() {
        let admin = "admin";
        assert_eq!(face_style(&CurrentIdentity::Known("admin".into()), admin).1, FaceStyle::Admin);
        assert_eq!(face_style(&CurrentIdentity::Known("bob".into()), admin).1, FaceStyle::Known);
        assert_eq!(
            face_style(&CurrentIdentity::Unknown, admin),
            ("Unknown".to_string(), FaceStyle::Unknown)
        );
        assert_eq!(
            face_style(&CurrentIdentity::None, admin),
            ("Human".to_string(), FaceStyle::Human)
        );
    }

    #[test]
    fn test_large_box_suppressed_regardless_of_label() {
        let big = detection("cup", 0.0, 0.0, 100.0, 80.0);
        assert!(!keep_object(&big, 100.0 * 100.0));
        let small = detection("cup", 0.0, 0.0, 10.0, 10.0);
        assert!(keep_object(&small, 100.0 * 100.0));
    }

    #[test]
    fn test_person_suppressed() {
        let person = detection("Person", 0.0, 0.0, 10.0, 10.0);
        assert!(!keep_object(&person, 100.0 * 100.0));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("cell phone"), "Cell Phone");
        assert_eq!(title_case("TV"), "Tv");
    }

    #[test]
    fn test_locked_draws_faces_but_no_objects() {
        let ctx = SecurityContext::new("admin", DisplayOptions::new(false, true, true));
        let objects = Arc::new(Objects::default());
        let mut render = render_loop(ctx, Arc::new(FixedFrame), Some(objects.clone()));

        let frame = render.tick().unwrap();
        assert_eq!(frame.faces.len(), 2);
        assert!(frame.faces.iter().all(|f| f.style == FaceStyle::Human));
        assert!(frame.objects.is_empty());
        assert_eq!(objects.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*frame.image.get_pixel(10, 10), FaceStyle::Human.color());
    }

    #[test]
    fn test_stale_identity_labels_every_face() {
        let ctx = SecurityContext::new("admin", DisplayOptions::default());
        ctx.set_identity(CurrentIdentity::Known("admin".into()));
        let mut render = render_loop(ctx, Arc::new(FixedFrame), None);

        let frame = render.tick().unwrap();
        assert!(frame.faces.iter().all(|f| f.label == "admin" && f.style == FaceStyle::Admin));
    }

    #[test]
    fn test_unlocked_filters_objects() {
        let ctx = SecurityContext::new("admin", DisplayOptions::default());
        let _ = ctx
            .lock()
            .try_unlock(&crate::identity::IdentityResult::Matched("admin".into()));
        let mut render = render_loop(ctx, Arc::new(FixedFrame), Some(Arc::new(Objects::default())));

        let frame = render.tick().unwrap();
        let labels: Vec<_> = frame.objects.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Cell Phone"]);
        assert_eq!(*frame.image.get_pixel(10, 50), OBJECT_COLOR);
    }

    #[test]
    fn test_unlocked_without_identity_boxes_draws_no_faces() {
        let ctx = SecurityContext::new("admin", DisplayOptions::new(false, false, true));
        let _ = ctx
            .lock()
            .try_unlock(&crate::identity::IdentityResult::Matched("admin".into()));
        let mut render = render_loop(ctx, Arc::new(FixedFrame), None);

        let frame = render.tick().unwrap();
        assert!(frame.faces.is_empty() && frame.objects.is_empty());
    }

    #[test]
    fn test_no_frame_skips_draw() {
        let ctx = SecurityContext::new("admin", DisplayOptions::default());
        let mut render = render_loop(ctx, Arc::new(NoFrame), None);
        assert!(render.tick().is_none());
    }

    #[test]
    fn test_draw_box_clips_to_image() {
        let mut image = RgbImage::new(10, 10);
        let bbox = BoundingBox::from_corners(-5.0, -5.0, 50.0, 50.0, 1.0);
        draw_box(&mut image, &bbox, OBJECT_COLOR);
        assert_eq!(*image.get_pixel(0, 0), OBJECT_COLOR);
        assert_eq!(*image.get_pixel(9, 9), OBJECT_COLOR);
        assert_eq!(*image.get_pixel(5, 5), Rgb([0, 0, 0]));
    }
}
