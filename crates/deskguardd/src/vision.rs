//! Gemini `generateContent` client for on-demand scene descriptions.

use crate::http::{frame_to_base64, HttpBridge};
use deskguard_core::{Frame, ServiceError, VisionLanguageService};
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated.
    fn into_text(self) -> Result<String, ServiceError> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

pub struct GeminiVision {
    api_key: String,
    model: String,
    http: HttpBridge,
}

impl GeminiVision {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, http: HttpBridge) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            http,
        }
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/{}:generateContent", self.model)
    }
}

impl VisionLanguageService for GeminiVision {
    fn describe(&self, prompt: &str, frame: &Frame) -> Result<String, ServiceError> {
        let image = frame_to_base64(frame)?;
        let body = GenerateRequest {
            contents: [Content {
                parts: [
                    Part::Text { text: prompt },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: &image,
                        },
                    },
                ],
            }],
        };

        let request = self
            .http
            .post(&self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let response: GenerateResponse = self.http.send_json(request)?;
        response.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let body = GenerateRequest {
            contents: [Content {
                parts: [
                    Part::Text { text: "Describe" },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: "AAAA",
                        },
                    },
                ],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Describe");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/jpeg"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["data"], "AAAA");
    }

    #[test]
    fn test_parts_are_joined() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [
                {"text": "A laptop, "}, {"text": "a mug and one person."}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "A laptop, a mug and one person.");
    }

    #[test]
    fn test_blocked_response_is_empty() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert!(matches!(response.into_text(), Err(ServiceError::EmptyResponse)));
        assert!(matches!(
            GenerateResponse::default().into_text(),
            Err(ServiceError::EmptyResponse)
        ));
    }
}
