//! Pixel format conversion to packed RGB8, and still-image loading.

use deskguard_core::{Frame, FrameError, FrameOrigin};
use std::path::Path;

/// Convert packed YUYV 4:2:2 to RGB8 using integer BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(expected / 2 * 3);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (u, v) = (chunk[1], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(chunk[0], u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(chunk[2], u, v));
    }
    Ok(rgb)
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

/// Replicate 8-bit grayscale into RGB8.
pub fn grey_to_rgb(gray: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    if gray.len() < pixels {
        return Err(FrameError::InvalidLength {
            expected: pixels,
            actual: gray.len(),
        });
    }
    Ok(gray[..pixels].iter().flat_map(|&g| [g, g, g]).collect())
}

/// Downscale 16-bit little-endian grayscale to 8 bits, then replicate into RGB8.
pub fn y16_to_rgb(raw: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    if raw.len() < pixels * 2 {
        return Err(FrameError::InvalidLength {
            expected: pixels * 2,
            actual: raw.len(),
        });
    }
    // The high byte of a little-endian sample is the 8-bit value.
    Ok(raw[..pixels * 2]
        .chunks_exact(2)
        .flat_map(|px| [px[1], px[1], px[1]])
        .collect())
}

/// Decode an uploaded image file into a static frame.
pub fn load_still(path: &Path) -> Result<Frame, FrameError> {
    let image = image::open(path)?.into_rgb8();
    tracing::info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "loaded still image"
    );
    Ok(Frame::from_image(image, FrameOrigin::Static))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_black_and_white() {
        // 2x1: Y0=16 (black), Y1=235 (white), neutral chroma.
        let rgb = yuyv_to_rgb(&[16, 128, 235, 128], 2, 1).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_yuyv_red_chroma() {
        // High V pushes red up and green down.
        let rgb = yuyv_to_rgb(&[128, 128, 128, 240], 2, 1).unwrap();
        assert!(rgb[0] > rgb[1] && rgb[0] > rgb[2], "{rgb:?}");
        assert_eq!(&rgb[..3], &rgb[3..]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(matches!(
            yuyv_to_rgb(&[16, 128], 2, 1),
            Err(FrameError::InvalidLength { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_grey_replicates() {
        assert_eq!(grey_to_rgb(&[7, 200], 2, 1).unwrap(), vec![7, 7, 7, 200, 200, 200]);
        assert!(grey_to_rgb(&[7], 2, 1).is_err());
    }

    #[test]
    fn test_y16_takes_high_byte() {
        let raw = [0x34, 0x12, 0xFF, 0x80];
        assert_eq!(y16_to_rgb(&raw, 2, 1).unwrap(), vec![0x12, 0x12, 0x12, 0x80, 0x80, 0x80]);
    }

    #[test]
    fn test_load_still_is_static() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let frame = load_still(&path).unwrap();
        assert_eq!(frame.origin, FrameOrigin::Static);
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(&frame.pixels()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_load_still_missing_file() {
        assert!(load_still(Path::new("/nonexistent/still.png")).is_err());
    }
}
