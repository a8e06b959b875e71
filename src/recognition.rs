//! Last-known recognition texts, read by the presentation layer.

use crate::transport::ServerEvent;
use chrono::{DateTime, Local};
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct RecognitionResult {
    pub sign_input: Option<String>,
    pub sign_translation: Option<String>,
    pub chat_reply: Option<String>,
    pub updated_at: Option<DateTime<Local>>,
}

/// Mutated only by inbound channel events or fallback responses; everything
/// else reads snapshots.
pub struct ResultStore {
    inner: Mutex<RecognitionResult>,
}

impl ResultStore {
    pub fn new() -> ResultStore {
        ResultStore {
            inner: Mutex::new(RecognitionResult::default()),
        }
    }

    /// Apply a canonical server event. Absent fields leave the previous
    /// values untouched.
    pub fn apply(&self, event: &ServerEvent) {
        let mut result = self.inner.lock().unwrap();
        match event {
            ServerEvent::Recognition { input, translation } => {
                if let Some(input) = input {
                    result.sign_input = Some(input.clone());
                }
                if let Some(translation) = translation {
                    result.sign_translation = Some(translation.clone());
                }
            }
            ServerEvent::ChatReply(text) => {
                result.chat_reply = Some(text.clone());
            }
        }
        result.updated_at = Some(Local::now());
    }

    pub fn snapshot(&self) -> RecognitionResult {
        self.inner.lock().unwrap().clone()
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}
