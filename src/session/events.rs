//! Structured status events published by a session.

use crate::defaults;
use serde::{Deserialize, Serialize};

/// Whether synthesized audio for a token is starting or finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsState {
    Start,
    Stop,
}

/// One status event. Serializes with a `type` tag:
///
/// ```text
/// {"type":"stt","text":"1 2"}
/// {"type":"tts","state":"start","text":"2"}
/// {"type":"tts","state":"stop"}
/// {"type":"llm","emotion":"neutral"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Full transcript as of the latest recognition update.
    Stt { text: String },
    /// Synthesis bracket around the packets of one token.
    Tts {
        state: TtsState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Annotation published when the transcript changed.
    Llm { emotion: String },
}

impl SessionEvent {
    pub fn stt(text: impl Into<String>) -> Self {
        Self::Stt { text: text.into() }
    }

    pub fn tts_start(text: impl Into<String>) -> Self {
        Self::Tts {
            state: TtsState::Start,
            text: Some(text.into()),
        }
    }

    pub fn tts_stop() -> Self {
        Self::Tts {
            state: TtsState::Stop,
            text: None,
        }
    }

    pub fn neutral_annotation() -> Self {
        Self::Llm {
            emotion: defaults::NEUTRAL_EMOTION.to_string(),
        }
    }

    /// Value of the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stt { .. } => "stt",
            Self::Tts { .. } => "tts",
            Self::Llm { .. } => "llm",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
