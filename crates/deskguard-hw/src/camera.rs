//! V4L2 camera capture via the `v4l` crate.

use crate::frame;
use deskguard_core::{Frame, FrameOrigin, FrameSource};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("{0} is not a capture device")]
    NotCapture(String),
    #[error("{path} offers {fourcc}; need YUYV, GREY or Y16")]
    Unsupported { path: String, fourcc: String },
    #[error("frame read failed: {0}")]
    Read(String),
}

/// A capture-capable V4L2 node.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
}

/// Pixel layouts the capture path can convert to RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 4:2:2, one U/V pair per two pixels.
    Yuyv,
    Grey,
    /// Little-endian 16-bit luma.
    Y16,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(Self::Yuyv),
            b"GREY" => Some(Self::Grey),
            b"Y16 " | b"Y16\0" => Some(Self::Y16),
            _ => None,
        }
    }
}

/// An open webcam negotiated to 640x480.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open `device_path` and request colour YUYV at the capture size. Drivers
    /// that only stream grayscale are accepted as-is.
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        let open_err = |source| CameraError::Open {
            path: device_path.to_string(),
            source,
        };

        let device = Device::with_path(device_path).map_err(open_err)?;
        let caps = device.query_caps().map_err(open_err)?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            return Err(CameraError::NotCapture(device_path.to_string()));
        }

        let mut wanted = device.format().map_err(open_err)?;
        wanted.fourcc = FourCC::new(b"YUYV");
        wanted.width = CAPTURE_WIDTH;
        wanted.height = CAPTURE_HEIGHT;
        let granted = device.set_format(&wanted).map_err(open_err)?;

        let pixel_format =
            PixelFormat::from_fourcc(granted.fourcc).ok_or_else(|| CameraError::Unsupported {
                path: device_path.to_string(),
                fourcc: String::from_utf8_lossy(&granted.fourcc.repr).into_owned(),
            })?;

        tracing::debug!(
            device = device_path,
            card = %caps.card,
            width = granted.width,
            height = granted.height,
            ?pixel_format,
            "capture format granted"
        );

        Ok(Self {
            device,
            width: granted.width,
            height: granted.height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Grab the next frame and convert it to RGB.
    pub fn capture_frame(&self) -> Result<Frame, CameraError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, 2)
            .map_err(|e| CameraError::Read(format!("mmap stream: {e}")))?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::Read(format!("dequeue: {e}")))?;

        let (w, h) = (self.width, self.height);
        let rgb = match self.pixel_format {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, w, h),
            PixelFormat::Grey => frame::grey_to_rgb(buf, w, h),
            PixelFormat::Y16 => frame::y16_to_rgb(buf, w, h),
        }
        .map_err(|e| CameraError::Read(e.to_string()))?;

        Frame::from_rgb(rgb, w, h, FrameOrigin::Live, meta.sequence)
            .map_err(|e| CameraError::Read(e.to_string()))
    }

    /// Capture-capable nodes among `/dev/video0` to `/dev/video15`.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..16)
            .map(|i| format!("/dev/video{i}"))
            .filter(|path| Path::new(path).exists())
            .filter_map(|path| {
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card,
                        driver: caps.driver,
                    })
            })
            .collect()
    }
}

/// Shared live camera, safe to poll from several loops.
///
/// A failed read yields no frame rather than an error. After `release` the
/// device is closed and every read yields no frame.
pub struct LiveCamera {
    inner: Mutex<Option<Camera>>,
}

impl LiveCamera {
    pub fn new(camera: Camera) -> Self {
        Self {
            inner: Mutex::new(Some(camera)),
        }
    }

    /// A source with no device behind it, used when the camera failed to open.
    pub fn disconnected() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl FrameSource for LiveCamera {
    fn current_frame(&self) -> Option<Frame> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let camera = guard.as_ref()?;
        match camera.capture_frame() {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::debug!(device = %camera.device_path, error = %e, "frame read failed");
                None
            }
        }
    }

    fn release(&self) {
        if let Some(camera) = take_device(&self.inner) {
            tracing::info!(device = %camera.device_path, "camera released");
        }
    }
}

/// Empty the slot even if a capture panicked while holding it.
fn take_device<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_pixel_format_from_fourcc() {
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"YUYV")), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"GREY")), Some(PixelFormat::Grey));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"Y16 ")), Some(PixelFormat::Y16));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"MJPG")), None);
    }

    #[test]
    fn test_open_missing_device() {
        let err = Camera::open("/dev/nonexistent-video").err().unwrap();
        assert!(matches!(err, CameraError::Open { ref path, .. } if path == "/dev/nonexistent-video"));
    }

    #[test]
    fn test_disconnected_yields_nothing() {
        let camera = LiveCamera::disconnected();
        assert!(!camera.is_open());
        assert!(camera.current_frame().is_none());
        camera.release();
        camera.release();
        assert!(camera.current_frame().is_none());
    }

    #[test]
    fn test_release_after_panicked_capture() {
        struct FakeDevice(Arc<AtomicBool>);
        impl Drop for FakeDevice {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let slot = Arc::new(Mutex::new(Some(FakeDevice(dropped.clone()))));
        let poisoner = slot.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("capture panicked");
        })
        .join();
        assert!(slot.is_poisoned());

        drop(take_device(&slot));

        assert!(dropped.load(Ordering::SeqCst));
        assert!(take_device(&slot).is_none());
    }
}
