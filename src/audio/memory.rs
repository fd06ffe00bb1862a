//! In-memory collaborators for callers without a backing service.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::script::MediaRef;

use super::collaborators::{MediaResolver, PreferenceStore, Recording, RecordingStore, VoiceModelStore};
use super::AudioPreference;

#[derive(Default)]
pub struct MemoryRecordings {
    recordings: Vec<Recording>,
}

impl MemoryRecordings {
    pub fn new(recordings: Vec<Recording>) -> Self {
        Self { recordings }
    }
}

#[async_trait]
impl RecordingStore for MemoryRecordings {
    async fn recording_by_message_id(&self, message_id: &str) -> Result<Option<Recording>> {
        Ok(self.recordings.iter().find(|r| r.id == message_id).cloned())
    }

    async fn recordings_for_speaker(&self, speaker_tag: &str) -> Result<Vec<Recording>> {
        Ok(self
            .recordings
            .iter()
            .filter(|r| r.speaker_tag.eq_ignore_ascii_case(speaker_tag))
            .cloned()
            .collect())
    }
}

/// User id -> personal voice id.
#[derive(Default)]
pub struct MemoryVoices {
    voices: HashMap<String, String>,
}

impl MemoryVoices {
    pub fn new(voices: HashMap<String, String>) -> Self {
        Self { voices }
    }
}

#[async_trait]
impl VoiceModelStore for MemoryVoices {
    async fn personal_voice(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.voices.get(user_id).cloned())
    }
}

/// Media id or name -> URL.
#[derive(Default)]
pub struct MemoryMedia {
    urls: HashMap<String, String>,
}

impl MemoryMedia {
    pub fn new(urls: HashMap<String, String>) -> Self {
        Self { urls }
    }
}

#[async_trait]
impl MediaResolver for MemoryMedia {
    async fn resolve_media(&self, media_ref: &MediaRef) -> Result<Option<String>> {
        let key = match media_ref {
            MediaRef::Id(id) => id,
            MediaRef::Name(name) => name,
        };
        Ok(self.urls.get(key).cloned())
    }
}

#[derive(Default)]
pub struct MemoryPreferences {
    entries: Mutex<HashMap<(String, String), AudioPreference>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferences {
    async fn stored_preference(
        &self,
        cut_id: &str,
        segment_key: &str,
    ) -> Result<Option<AudioPreference>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(&(cut_id.to_string(), segment_key.to_string()))
            .copied())
    }

    async fn set_stored_preference(
        &self,
        cut_id: &str,
        segment_key: &str,
        preference: AudioPreference,
    ) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert((cut_id.to_string(), segment_key.to_string()), preference);
        Ok(())
    }
}
