//! Error taxonomy for the playback engine.
//!
//! Only [`EngineError::MissingVoice`] and [`EngineError::Synthesis`] abort a cut; audio
//! playback errors are recovered by the scheduler and parse problems are plain warnings.

use serde::Serialize;
use thiserror::Error;

use crate::script::SpeakerRole;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no {role} voice assigned for speaker '{speaker}'")]
    MissingVoice { role: SpeakerRole, speaker: String },

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("playback already active")]
    AlreadyActive,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Storage(format!("{err:#}"))
    }
}

/// Text-to-speech failure (quota, auth, network). Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("speech synthesis failed for voice '{voice_id}': {message}")]
pub struct SynthesisError {
    pub voice_id: String,
    pub message: String,
}

impl SynthesisError {
    pub fn new(voice_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioPlaybackError {
    #[error("audio decode failed: {0}")]
    Decode(String),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("audio fetch failed: {0}")]
    Fetch(String),

    #[error("audio handle already released")]
    Released,
}

/// A script line the parser dropped. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseWarning {
    /// 1-based line number in the source text.
    pub line: usize,
    pub reason: String,
    pub text: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {} ({:?})", self.line, self.reason, self.text)
    }
}
