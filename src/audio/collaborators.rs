//! Services the engine consumes but does not own: speech synthesis, stored recordings,
//! personal voice models, media lookup and per-segment preference storage.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;
use crate::script::MediaRef;

use super::AudioPreference;

/// A contributor's captured clip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    /// Contribution (message) identifier.
    pub id: String,
    pub speaker_tag: String,
    pub audio_url: String,
    pub transcript: Option<String>,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, SynthesisError>;
}

#[async_trait]
pub trait RecordingStore: Send + Sync {
    async fn recording_by_message_id(&self, message_id: &str) -> Result<Option<Recording>>;

    /// All of a speaker's recordings, in contribution order.
    async fn recordings_for_speaker(&self, speaker_tag: &str) -> Result<Vec<Recording>>;
}

#[async_trait]
pub trait VoiceModelStore: Send + Sync {
    async fn personal_voice(&self, user_id: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve_media(&self, media_ref: &MediaRef) -> Result<Option<String>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn stored_preference(
        &self,
        cut_id: &str,
        segment_key: &str,
    ) -> Result<Option<AudioPreference>>;

    async fn set_stored_preference(
        &self,
        cut_id: &str,
        segment_key: &str,
        preference: AudioPreference,
    ) -> Result<()>;
}

/// Everything the resolver and timeline builder may call out to. Only the
/// synthesizer is mandatory.
#[derive(Clone)]
pub struct Collaborators {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub recordings: Option<Arc<dyn RecordingStore>>,
    pub voices: Option<Arc<dyn VoiceModelStore>>,
    pub media: Option<Arc<dyn MediaResolver>>,
    pub preferences: Option<Arc<dyn PreferenceStore>>,
}

impl Collaborators {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            synthesizer,
            recordings: None,
            voices: None,
            media: None,
            preferences: None,
        }
    }

    pub fn with_recordings(mut self, store: Arc<dyn RecordingStore>) -> Self {
        self.recordings = Some(store);
        self
    }

    pub fn with_voices(mut self, store: Arc<dyn VoiceModelStore>) -> Self {
        self.voices = Some(store);
        self
    }

    pub fn with_media(mut self, resolver: Arc<dyn MediaResolver>) -> Self {
        self.media = Some(resolver);
        self
    }

    pub fn with_preferences(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(store);
        self
    }
}
