//! Request/response fallback for frames while the socket is down.

use crate::assets::JPEG_QUALITY;
use crate::media::StillFrame;
use crate::transport::TransportError;
use crate::transport::envelope::ServerEvent;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

pub struct RecognizeClient {
    base_url: String,
}

impl RecognizeClient {
    pub fn new(base_url: impl Into<String>) -> RecognizeClient {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        RecognizeClient { base_url }
    }

    /// One-shot recognition of a single frame.
    pub async fn recognize_realtime(
        &self,
        frame: &StillFrame,
    ) -> Result<ServerEvent, TransportError> {
        let payload = RecognizePayload {
            image: frame.to_base64(),
            format: frame.format,
            quality: JPEG_QUALITY,
        };

        let response = HTTP_CLIENT
            .post(format!("{}/recognize/realtime", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::Runtime(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::Runtime(e.to_string()))?
            .json::<RecognizeResponse>()
            .await
            .map_err(|e| TransportError::Runtime(e.to_string()))?;

        Ok(response.into_event())
    }
}

#[derive(Debug, Serialize)]
struct RecognizePayload {
    image: String,
    format: &'static str,
    quality: u8,
}

/// Recognition answer; the service names its fields inconsistently, so every
/// known spelling maps onto the two canonical ones.
#[derive(Debug, Default, Deserialize)]
pub struct RecognizeResponse {
    #[serde(default, alias = "detected", alias = "word", alias = "signInput")]
    input: Option<String>,
    #[serde(
        default,
        alias = "translated",
        alias = "text",
        alias = "signTranslation"
    )]
    translation: Option<String>,
}

impl RecognizeResponse {
    pub fn into_event(self) -> ServerEvent {
        ServerEvent::Recognition {
            input: self.input,
            translation: self.translation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_for(json: &str) -> ServerEvent {
        serde_json::from_str::<RecognizeResponse>(json)
            .unwrap()
            .into_event()
    }

    #[test]
    fn response_field_spellings_all_map() {
        for json in [
            r#"{"detected":"A","translated":"B"}"#,
            r#"{"word":"A","text":"B"}"#,
            r#"{"input":"A","translation":"B"}"#,
            r#"{"signInput":"A","signTranslation":"B"}"#,
        ] {
            assert_eq!(
                event_for(json),
                ServerEvent::Recognition {
                    input: Some("A".into()),
                    translation: Some("B".into()),
                }
            );
        }
    }

    #[test]
    fn missing_fields_stay_empty() {
        assert_eq!(
            event_for("{}"),
            ServerEvent::Recognition {
                input: None,
                translation: None,
            }
        );
        assert_eq!(
            event_for(r#"{"word":"A"}"#),
            ServerEvent::Recognition {
                input: Some("A".into()),
                translation: None,
            }
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = RecognizeClient::new("http://localhost:8000/");
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
