//! Identity oracle backed by a face-search HTTP service.
//!
//! The service searches a reference database laid out one directory per
//! identity and answers with the matching sample paths, best first.

use crate::http::{frame_to_base64, HttpBridge};
use deskguard_core::{Candidate, Frame, IdentityOracle, OracleError};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct SearchRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    face_detected: bool,
    #[serde(default)]
    matches: Vec<SearchMatch>,
}

#[derive(Debug, Deserialize)]
struct SearchMatch {
    identity: String,
    distance: f32,
}

impl SearchResponse {
    fn into_candidates(self) -> Result<Vec<Candidate>, OracleError> {
        if !self.face_detected {
            return Err(OracleError::NoFace);
        }
        Ok(self
            .matches
            .into_iter()
            .map(|m| Candidate {
                identity_path: m.identity,
                score: m.distance,
            })
            .collect())
    }
}

pub struct HttpIdentityOracle {
    url: String,
    http: HttpBridge,
}

impl HttpIdentityOracle {
    pub fn new(url: impl Into<String>, http: HttpBridge) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }
}

impl IdentityOracle for HttpIdentityOracle {
    fn find(&self, frame: &Frame) -> Result<Vec<Candidate>, OracleError> {
        let image = frame_to_base64(frame).map_err(|e| OracleError::Service(e.to_string()))?;
        let response: SearchResponse = self
            .http
            .send_json(self.http.post(&self.url).json(&SearchRequest { image: &image }))
            .map_err(|e| OracleError::Service(e.to_string()))?;
        response.into_candidates()
    }
}

/// Stand-in when no face-search endpoint is configured: every search fails.
pub struct UnconfiguredOracle;

impl IdentityOracle for UnconfiguredOracle {
    fn find(&self, _frame: &Frame) -> Result<Vec<Candidate>, OracleError> {
        Err(OracleError::Service("face search service not configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskguard_core::{FrameOrigin, IdentityResult};

    fn parse(json: &str) -> Result<Vec<Candidate>, OracleError> {
        serde_json::from_str::<SearchResponse>(json)
            .unwrap()
            .into_candidates()
    }

    #[test]
    fn test_no_face_is_typed() {
        assert_eq!(parse(r#"{"face_detected": false}"#), Err(OracleError::NoFace));
    }

    #[test]
    fn test_matches_keep_order() {
        let candidates = parse(
            r#"{"face_detected": true, "matches": [
                {"identity": "dataset/admin/img1.jpg", "distance": 0.21},
                {"identity": "dataset/bob/img3.jpg", "distance": 0.35}
            ]}"#,
        )
        .unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].identity_path, "dataset/admin/img1.jpg");
        assert_eq!(
            IdentityResult::from_oracle(Ok(candidates)),
            IdentityResult::Matched("admin".into())
        );
    }

    #[test]
    fn test_face_without_matches_is_unmatched() {
        let candidates = parse(r#"{"face_detected": true}"#).unwrap();
        assert_eq!(IdentityResult::from_oracle(Ok(candidates)), IdentityResult::Unmatched);
    }

    #[test]
    fn test_unconfigured_is_error() {
        let frame = Frame::from_rgb(vec![0; 3], 1, 1, FrameOrigin::Live, 0).unwrap();
        let result = IdentityResult::from_oracle(UnconfiguredOracle.find(&frame));
        assert!(matches!(result, IdentityResult::Error(_)));
    }
}
