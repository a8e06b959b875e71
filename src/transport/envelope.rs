//! Wire envelopes and the canonical inbound event.
//!
//! The service answers with loosely shaped objects; the keys vary by purpose
//! and any subset may be present. Everything is resolved exactly once, here,
//! into `ServerEvent` so downstream code never inspects raw keys.

use crate::media::StillFrame;
use serde::{Deserialize, Serialize};

/// Outbound frame message.
#[derive(Debug, Clone, Serialize)]
pub struct FrameEnvelope {
    #[serde(rename = "type")]
    kind: &'static str,
    data: String,
}

impl FrameEnvelope {
    pub fn detect_sign(frame: &StillFrame) -> FrameEnvelope {
        FrameEnvelope {
            kind: "detect_sign",
            data: frame.to_base64(),
        }
    }
}

/// Canonical inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    ChatReply(String),
    Recognition {
        input: Option<String>,
        translation: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default, rename = "signInput")]
    sign_input: Option<String>,
    #[serde(default, rename = "signTranslation")]
    sign_translation: Option<String>,
}

/// Resolve a raw payload into a canonical event. `Ok(None)` means the object
/// parsed but carried no recognized fields.
pub fn resolve(raw: &str) -> Result<Option<ServerEvent>, serde_json::Error> {
    let inbound: RawInbound = serde_json::from_str(raw)?;

    if inbound.sign_input.is_some() || inbound.sign_translation.is_some() {
        return Ok(Some(ServerEvent::Recognition {
            input: inbound.sign_input,
            translation: inbound.sign_translation,
        }));
    }

    let reply = inbound
        .response
        .or(inbound.message)
        .or(inbound.text)
        .or(inbound.answer);
    Ok(reply.map(ServerEvent::ChatReply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn frame_envelope_shape() {
        let frame = StillFrame::from_rgb(&RgbImage::new(2, 2), 80).unwrap();
        let json = serde_json::to_value(FrameEnvelope::detect_sign(&frame)).unwrap();

        assert_eq!(json["type"], "detect_sign");
        assert_eq!(json["data"].as_str().unwrap(), frame.to_base64());
    }

    #[test]
    fn resolves_translation_keys_with_any_subset() {
        let event = resolve(r#"{"signInput":"hello","signTranslation":"ciao"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ServerEvent::Recognition {
                input: Some("hello".into()),
                translation: Some("ciao".into()),
            }
        );

        let event = resolve(r#"{"signTranslation":"ciao"}"#).unwrap().unwrap();
        assert_eq!(
            event,
            ServerEvent::Recognition {
                input: None,
                translation: Some("ciao".into()),
            }
        );
    }

    #[test]
    fn resolves_chat_keys_in_preference_order() {
        let event = resolve(r#"{"message":"b","answer":"d"}"#).unwrap().unwrap();
        assert_eq!(event, ServerEvent::ChatReply("b".into()));

        let event = resolve(r#"{"response":"a","text":"c"}"#).unwrap().unwrap();
        assert_eq!(event, ServerEvent::ChatReply("a".into()));

        let event = resolve(r#"{"answer":"d"}"#).unwrap().unwrap();
        assert_eq!(event, ServerEvent::ChatReply("d".into()));
    }

    #[test]
    fn recognition_keys_win_over_chat_keys() {
        let event = resolve(r#"{"text":"hi","signInput":"wave"}"#).unwrap().unwrap();
        assert_eq!(
            event,
            ServerEvent::Recognition {
                input: Some("wave".into()),
                translation: None,
            }
        );
    }

    #[test]
    fn unknown_objects_resolve_to_nothing() {
        assert!(resolve(r#"{"status":"ok"}"#).unwrap().is_none());
        assert!(resolve("{}").unwrap().is_none());
    }

    #[test]
    fn malformed_payloads_error() {
        assert!(resolve("not json").is_err());
        assert!(resolve("[1,2]").is_err());
    }
}
