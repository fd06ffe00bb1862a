use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::script::{Segment, SpeakerRole};
use crate::settings::{EngineSettings, SettingsStore};

use super::collaborators::{Collaborators, Recording};
use super::handle::AudioHandle;
use super::matcher::{best_match, ConsumedSet};
use super::AudioPreference;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const SYNTHESIZED_MIME: &str = "audio/mpeg";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SourceType {
    Recorded,
    PersonalVoice,
    GenericSynthesis,
}

/// The single playable outcome for one voice segment.
#[derive(Debug, Clone)]
pub struct AudioResolution {
    pub source_type: SourceType,
    pub handle: AudioHandle,
    /// Text the audio speaks; drives sentence display.
    pub text_used: String,
    pub voice_id: Option<String>,
    pub recording_id: Option<String>,
}

/// Per-cut state handed to every resolver call. The engine keeps nothing between cuts.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    pub cut_id: String,
    pub narrator_voice_id: Option<String>,
    pub ember_voice_id: Option<String>,
    /// Contributor speaker tag -> user id, for personal-voice lookup.
    pub contributor_user_ids: HashMap<String, String>,
    /// Segment key -> preference chosen in this session; wins over stored preferences.
    pub preference_overrides: HashMap<String, AudioPreference>,
    consumed: ConsumedSet,
}

impl ResolutionContext {
    pub fn new(cut_id: impl Into<String>) -> Self {
        Self {
            cut_id: cut_id.into(),
            ..Self::default()
        }
    }

    pub fn with_narrator_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.narrator_voice_id = Some(voice_id.into());
        self
    }

    pub fn with_ember_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.ember_voice_id = Some(voice_id.into());
        self
    }

    pub fn with_contributor(mut self, speaker_tag: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.contributor_user_ids
            .insert(speaker_tag.into(), user_id.into());
        self
    }

    pub fn consumed(&self) -> &ConsumedSet {
        &self.consumed
    }

    fn assigned_voice(&self, role: SpeakerRole) -> Option<&str> {
        match role {
            SpeakerRole::Ember => self.ember_voice_id.as_deref(),
            SpeakerRole::Narrator => self.narrator_voice_id.as_deref(),
            SpeakerRole::Contributor => None,
        }
    }

    fn attribution_voice(&self) -> Option<&str> {
        self.narrator_voice_id
            .as_deref()
            .or(self.ember_voice_id.as_deref())
    }

    fn user_id_for<'a>(&'a self, speaker_tag: &'a str) -> &'a str {
        self.contributor_user_ids
            .get(speaker_tag)
            .map(String::as_str)
            .unwrap_or(speaker_tag)
    }
}

/// Stable key for per-segment preferences: the message id when present, otherwise
/// speaker tag plus spoken text.
pub fn segment_key(segment: &Segment) -> String {
    match &segment.message_id {
        Some(id) => id.clone(),
        None => format!("{}:{}", segment.speaker_tag, segment.audio_content),
    }
}

pub struct AudioResolver {
    collaborators: Collaborators,
    settings: Arc<SettingsStore>,
}

impl AudioResolver {
    /// Resolver with fixed settings.
    pub fn new(collaborators: Collaborators, settings: EngineSettings) -> Self {
        Self::with_settings_store(collaborators, Arc::new(SettingsStore::in_memory(settings)))
    }

    /// Resolver that reads `settings` on every call, so updates reach the next cut.
    pub fn with_settings_store(collaborators: Collaborators, settings: Arc<SettingsStore>) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings.current()
    }

    /// Session override, then stored preference, then the configured default.
    pub async fn preference_for(&self, segment: &Segment, ctx: &ResolutionContext) -> AudioPreference {
        let key = segment_key(segment);
        if let Some(preference) = ctx.preference_overrides.get(&key) {
            return *preference;
        }

        if let Some(store) = &self.collaborators.preferences {
            match store.stored_preference(&ctx.cut_id, &key).await {
                Ok(Some(preference)) => return preference,
                Ok(None) => {}
                Err(err) => log_warn!("preference lookup failed for '{}': {err:#}", key),
            }
        }

        self.settings.current().default_preference
    }

    /// Record a user's choice for this session and persist it when a store is configured.
    pub async fn set_preference(
        &self,
        segment: &Segment,
        preference: AudioPreference,
        ctx: &mut ResolutionContext,
    ) -> EngineResult<()> {
        let key = segment_key(segment);
        ctx.preference_overrides.insert(key.clone(), preference);
        if let Some(store) = &self.collaborators.preferences {
            store
                .set_stored_preference(&ctx.cut_id, &key, preference)
                .await?;
        }
        Ok(())
    }

    pub async fn resolve(
        &self,
        segment: &Segment,
        ctx: &mut ResolutionContext,
    ) -> EngineResult<AudioResolution> {
        let preference = self.preference_for(segment, ctx).await;
        self.resolve_with_preference(segment, preference, ctx).await
    }

    pub async fn resolve_with_preference(
        &self,
        segment: &Segment,
        preference: AudioPreference,
        ctx: &mut ResolutionContext,
    ) -> EngineResult<AudioResolution> {
        let role = segment.speaker_role;

        if role.is_ai() {
            let voice_id = ctx
                .assigned_voice(role)
                .ok_or_else(|| EngineError::MissingVoice {
                    role,
                    speaker: segment.speaker_tag.clone(),
                })?
                .to_string();
            return self
                .synthesize(SourceType::GenericSynthesis, &segment.audio_content, voice_id, None)
                .await;
        }

        match preference {
            AudioPreference::Recorded => {
                if let Some(recording) = self.find_recording(segment, ctx).await {
                    log_debug!("using recording {} for '{}'", recording.id, segment.speaker_tag);
                    let text_used = recording
                        .transcript
                        .clone()
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| segment.audio_content.clone());
                    return Ok(AudioResolution {
                        source_type: SourceType::Recorded,
                        handle: AudioHandle::from_url(recording.audio_url),
                        text_used,
                        voice_id: None,
                        recording_id: Some(recording.id),
                    });
                }
            }
            AudioPreference::Personal => {
                if let Some(voice_id) = self.personal_voice(segment, ctx).await {
                    let recording = self.find_recording(segment, ctx).await;
                    let text = recording
                        .as_ref()
                        .and_then(|r| r.transcript.clone())
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| segment.audio_content.clone());
                    return self
                        .synthesize(
                            SourceType::PersonalVoice,
                            &text,
                            voice_id,
                            recording.map(|r| r.id),
                        )
                        .await;
                }
            }
            AudioPreference::Text => {}
        }

        self.attributed(segment, ctx).await
    }

    async fn attributed(
        &self,
        segment: &Segment,
        ctx: &ResolutionContext,
    ) -> EngineResult<AudioResolution> {
        let voice_id = ctx
            .attribution_voice()
            .ok_or_else(|| EngineError::MissingVoice {
                role: SpeakerRole::Narrator,
                speaker: segment.speaker_tag.clone(),
            })?
            .to_string();
        let text = format!("{} said, \"{}\"", segment.speaker_tag, segment.audio_content);
        self.synthesize(SourceType::GenericSynthesis, &text, voice_id, None)
            .await
    }

    async fn synthesize(
        &self,
        source_type: SourceType,
        text: &str,
        voice_id: String,
        recording_id: Option<String>,
    ) -> EngineResult<AudioResolution> {
        let bytes = self
            .collaborators
            .synthesizer
            .synthesize(text, &voice_id)
            .await?;

        Ok(AudioResolution {
            source_type,
            handle: AudioHandle::from_bytes(bytes, SYNTHESIZED_MIME),
            text_used: text.to_string(),
            voice_id: Some(voice_id),
            recording_id,
        })
    }

    async fn personal_voice(&self, segment: &Segment, ctx: &ResolutionContext) -> Option<String> {
        let store = self.collaborators.voices.as_ref()?;
        let user_id = ctx.user_id_for(&segment.speaker_tag);
        match store.personal_voice(user_id).await {
            Ok(voice) => voice,
            Err(err) => {
                log_warn!("personal voice lookup failed for '{}': {err:#}", user_id);
                None
            }
        }
    }

    /// A segment with a message id is resolved by id only; otherwise the legacy
    /// content matcher picks among the speaker's unconsumed recordings.
    async fn find_recording(
        &self,
        segment: &Segment,
        ctx: &mut ResolutionContext,
    ) -> Option<Recording> {
        let store = self.collaborators.recordings.as_ref()?;

        if let Some(message_id) = &segment.message_id {
            let found = match store.recording_by_message_id(message_id).await {
                Ok(found) => found,
                Err(err) => {
                    log_warn!("recording lookup failed for message {}: {err:#}", message_id);
                    None
                }
            };
            let recording = found.filter(|r| !r.audio_url.is_empty())?;
            ctx.consumed.consume(&recording.id);
            return Some(recording);
        }

        let candidates = match store.recordings_for_speaker(&segment.speaker_tag).await {
            Ok(candidates) => candidates,
            Err(err) => {
                log_warn!(
                    "recording lookup failed for speaker '{}': {err:#}",
                    segment.speaker_tag
                );
                return None;
            }
        };

        let matcher = self.settings.current().matcher;
        let (index, kind) = best_match(
            &segment.audio_content,
            &candidates,
            &ctx.consumed,
            &matcher,
        )?;
        let recording = candidates.into_iter().nth(index)?;
        log_warn!(
            "script line for '{}' has no message id; matched recording {} by content ({:?})",
            segment.speaker_tag,
            recording.id,
            kind
        );
        ctx.consumed.consume(&recording.id);
        Some(recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::memory::{MemoryPreferences, MemoryRecordings, MemoryVoices};
    use crate::audio::{PreferenceStore, SpeechSynthesizer};
    use crate::error::SynthesisError;
    use crate::script::parse;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSynth {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for RecordingSynth {
        async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, SynthesisError> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), voice_id.to_string()));
            Ok(vec![0xFF, 0xFB])
        }
    }

    struct FailingSynth;

    #[async_trait]
    impl SpeechSynthesizer for FailingSynth {
        async fn synthesize(&self, _text: &str, voice_id: &str) -> Result<Vec<u8>, SynthesisError> {
            Err(SynthesisError::new(voice_id, "quota exceeded"))
        }
    }

    fn sarah_recording() -> Recording {
        Recording {
            id: "msg-1".into(),
            speaker_tag: "Sarah".into(),
            audio_url: "https://audio.example/msg-1.mp3".into(),
            transcript: Some("We swam every summer at the lake.".into()),
        }
    }

    fn contributor() -> Segment {
        parse("[Sarah] We swam every summer at the lake.").remove(0)
    }

    fn resolver(recording: bool, personal: bool, synth: Arc<RecordingSynth>) -> AudioResolver {
        let recordings = if recording {
            vec![sarah_recording()]
        } else {
            Vec::new()
        };
        let mut voices = HashMap::new();
        if personal {
            voices.insert("user-sarah".to_string(), "voice-sarah".to_string());
        }
        let collaborators = Collaborators::new(synth)
            .with_recordings(Arc::new(MemoryRecordings::new(recordings)))
            .with_voices(Arc::new(MemoryVoices::new(voices)));
        AudioResolver::new(collaborators, EngineSettings::default())
    }

    fn context() -> ResolutionContext {
        ResolutionContext::new("cut-1")
            .with_narrator_voice("voice-narrator")
            .with_ember_voice("voice-ember")
            .with_contributor("Sarah", "user-sarah")
    }

    #[tokio::test]
    async fn cascade_covers_every_combination() {
        use AudioPreference::*;
        let cases = [
            (Recorded, false, false, SourceType::GenericSynthesis),
            (Recorded, false, true, SourceType::GenericSynthesis),
            (Recorded, true, false, SourceType::Recorded),
            (Recorded, true, true, SourceType::Recorded),
            (Personal, false, false, SourceType::GenericSynthesis),
            (Personal, false, true, SourceType::PersonalVoice),
            (Personal, true, false, SourceType::GenericSynthesis),
            (Personal, true, true, SourceType::PersonalVoice),
            (Text, false, false, SourceType::GenericSynthesis),
            (Text, false, true, SourceType::GenericSynthesis),
            (Text, true, false, SourceType::GenericSynthesis),
            (Text, true, true, SourceType::GenericSynthesis),
        ];

        for (preference, has_recording, has_voice, expected) in cases {
            let synth = Arc::new(RecordingSynth::default());
            let resolver = resolver(has_recording, has_voice, synth);
            let resolution = resolver
                .resolve_with_preference(&contributor(), preference, &mut context())
                .await
                .unwrap_or_else(|err| panic!("{preference:?}/{has_recording}/{has_voice}: {err}"));
            assert_eq!(
                resolution.source_type, expected,
                "{preference:?} recording={has_recording} voice={has_voice}"
            );
        }
    }

    #[tokio::test]
    async fn missing_recording_falls_back_to_attribution() {
        let synth = Arc::new(RecordingSynth::default());
        let resolver = resolver(false, false, synth.clone());
        let resolution = resolver
            .resolve_with_preference(&contributor(), AudioPreference::Recorded, &mut context())
            .await
            .unwrap();

        assert_eq!(resolution.source_type, SourceType::GenericSynthesis);
        assert_eq!(
            resolution.text_used,
            "Sarah said, \"We swam every summer at the lake.\""
        );
        assert_eq!(resolution.voice_id.as_deref(), Some("voice-narrator"));
        assert_eq!(synth.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn attribution_uses_ember_when_no_narrator() {
        let synth = Arc::new(RecordingSynth::default());
        let resolver = resolver(false, false, synth);
        let mut ctx = ResolutionContext::new("cut-1").with_ember_voice("voice-ember");
        let resolution = resolver
            .resolve_with_preference(&contributor(), AudioPreference::Text, &mut ctx)
            .await
            .unwrap();
        assert_eq!(resolution.voice_id.as_deref(), Some("voice-ember"));
    }

    #[tokio::test]
    async fn attribution_without_any_voice_is_fatal() {
        let synth = Arc::new(RecordingSynth::default());
        let resolver = resolver(false, false, synth);
        let err = resolver
            .resolve_with_preference(&contributor(), AudioPreference::Text, &mut ResolutionContext::new("cut-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingVoice { .. }));
    }

    #[tokio::test]
    async fn personal_voice_prefers_recording_transcript() {
        let synth = Arc::new(RecordingSynth::default());
        let resolver = resolver(true, true, synth.clone());
        let segment = parse("[Sarah] we swam every summer at the lake").remove(0);
        let resolution = resolver
            .resolve_with_preference(&segment, AudioPreference::Personal, &mut context())
            .await
            .unwrap();

        assert_eq!(resolution.source_type, SourceType::PersonalVoice);
        assert_eq!(resolution.text_used, "We swam every summer at the lake.");
        assert_eq!(resolution.recording_id.as_deref(), Some("msg-1"));
        assert_eq!(
            synth.calls.lock().unwrap()[0],
            ("We swam every summer at the lake.".to_string(), "voice-sarah".to_string())
        );
    }

    #[tokio::test]
    async fn ai_roles_require_assigned_voice() {
        let synth = Arc::new(RecordingSynth::default());
        let resolver = resolver(false, false, synth);
        let segment = parse("[EMBER VOICE] A quiet morning.").remove(0);
        let mut ctx = ResolutionContext::new("cut-1").with_narrator_voice("voice-narrator");

        let err = resolver.resolve(&segment, &mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingVoice {
                role: SpeakerRole::Ember,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn message_id_skips_similarity_matching() {
        let synth = Arc::new(RecordingSynth::default());
        let resolver = resolver(true, false, synth);
        // Same text as the stored recording, but the id points elsewhere.
        let segment = parse("[Sarah|msg-404] We swam every summer at the lake.").remove(0);
        let resolution = resolver
            .resolve_with_preference(&segment, AudioPreference::Recorded, &mut context())
            .await
            .unwrap();
        assert_eq!(resolution.source_type, SourceType::GenericSynthesis);

        let by_id = parse("[Sarah|msg-1] Something else entirely.").remove(0);
        let resolution = resolver
            .resolve_with_preference(&by_id, AudioPreference::Recorded, &mut context())
            .await
            .unwrap();
        assert_eq!(resolution.source_type, SourceType::Recorded);
        assert_eq!(resolution.recording_id.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn one_recording_serves_one_line() {
        let synth = Arc::new(RecordingSynth::default());
        let resolver = resolver(true, false, synth);
        let segments = parse(
            "[Sarah] We swam every summer at the lake.\n[Sarah] We swam every summer at the lake!",
        );
        let mut ctx = context();

        let first = resolver
            .resolve_with_preference(&segments[0], AudioPreference::Recorded, &mut ctx)
            .await
            .unwrap();
        let second = resolver
            .resolve_with_preference(&segments[1], AudioPreference::Recorded, &mut ctx)
            .await
            .unwrap();

        assert_eq!(first.source_type, SourceType::Recorded);
        assert_eq!(second.source_type, SourceType::GenericSynthesis);
        assert!(ctx.consumed().contains("msg-1"));
    }

    #[tokio::test]
    async fn synthesis_failure_propagates() {
        let collaborators = Collaborators::new(Arc::new(FailingSynth));
        let resolver = AudioResolver::new(collaborators, EngineSettings::default());
        let segment = parse("[NARRATOR] Hello.").remove(0);
        let err = resolver.resolve(&segment, &mut context()).await.unwrap_err();
        assert!(matches!(err, EngineError::Synthesis(_)));
    }

    #[tokio::test]
    async fn preferences_flow_from_override_then_store_then_default() {
        let synth = Arc::new(RecordingSynth::default());
        let store = Arc::new(MemoryPreferences::new());
        let collaborators = Collaborators::new(synth).with_preferences(store.clone());
        let resolver = AudioResolver::new(collaborators, EngineSettings::default());
        let segment = contributor();
        let mut ctx = context();

        assert_eq!(resolver.preference_for(&segment, &ctx).await, AudioPreference::Recorded);

        store
            .set_stored_preference("cut-1", &segment_key(&segment), AudioPreference::Personal)
            .await
            .unwrap();
        assert_eq!(resolver.preference_for(&segment, &ctx).await, AudioPreference::Personal);

        resolver
            .set_preference(&segment, AudioPreference::Text, &mut ctx)
            .await
            .unwrap();
        assert_eq!(resolver.preference_for(&segment, &ctx).await, AudioPreference::Text);
        assert_eq!(
            store.stored_preference("cut-1", &segment_key(&segment)).await.unwrap(),
            Some(AudioPreference::Text)
        );
    }
}
