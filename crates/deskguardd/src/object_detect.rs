use crate::http::{frame_to_base64, HttpBridge};
use deskguard_core::{BoundingBox, Frame, ObjectDetection, ObjectDetector, ServiceError};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct DetectRequest<'a> {
    image: &'a str,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    label: String,
    confidence: f32,
}

impl From<RawDetection> for ObjectDetection {
    fn from(raw: RawDetection) -> Self {
        ObjectDetection {
            bbox: BoundingBox::from_corners(raw.x1, raw.y1, raw.x2, raw.y2, raw.confidence),
            label: raw.label,
        }
    }
}

/// Object detector served over HTTP; boxes arrive as corner coordinates.
pub struct HttpObjectDetector {
    url: String,
    http: HttpBridge,
}

impl HttpObjectDetector {
    pub fn new(url: impl Into<String>, http: HttpBridge) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }
}

impl ObjectDetector for HttpObjectDetector {
    fn detect(&self, frame: &Frame, confidence: f32) -> Result<Vec<ObjectDetection>, ServiceError> {
        let image = frame_to_base64(frame)?;
        let request = self.http.post(&self.url).json(&DetectRequest {
            image: &image,
            confidence,
        });
        let response: DetectResponse = self.http.send_json(request)?;
        Ok(response
            .detections
            .into_iter()
            .filter(|d| d.confidence >= confidence)
            .map(ObjectDetection::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_corners_to_box() {
        let response: DetectResponse = serde_json::from_str(
            r#"{"detections": [
                {"x1": 10, "y1": 20, "x2": 110, "y2": 70, "label": "cell phone", "confidence": 0.91}
            ]}"#,
        )
        .unwrap();
        let detection = ObjectDetection::from(response.detections.into_iter().next().unwrap());
        assert_eq!(detection.label, "cell phone");
        assert_eq!(detection.bbox.x, 10.0);
        assert_eq!(detection.bbox.y, 20.0);
        assert_eq!(detection.bbox.width, 100.0);
        assert_eq!(detection.bbox.height, 50.0);
    }

    #[test]
    fn test_missing_detections_is_empty() {
        let response: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(response.detections.is_empty());
    }
}
