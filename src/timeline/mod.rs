//! Merge parsed segments and resolved audio into the ordered step list the
//! playback controller executes.

use serde::Serialize;

use crate::audio::{AudioHandle, AudioResolution, AudioResolver, ResolutionContext, SourceType};
use crate::error::EngineResult;
use crate::script::{MediaRef, Segment, SegmentKind};
use crate::visual::{decode_all, VisualAction};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone)]
pub struct DirectiveStep {
    pub kind: SegmentKind,
    pub duration_secs: f64,
    pub visual_actions: Vec<VisualAction>,
    pub media_ref: Option<MediaRef>,
    pub media_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VoiceStep {
    pub segment: Segment,
    pub resolution: AudioResolution,
    pub visual_actions: Vec<VisualAction>,
}

#[derive(Debug, Clone)]
pub enum TimelineStep {
    Directive(DirectiveStep),
    Voice(VoiceStep),
}

impl TimelineStep {
    pub fn kind(&self) -> SegmentKind {
        match self {
            TimelineStep::Directive(step) => step.kind,
            TimelineStep::Voice(_) => SegmentKind::Voice,
        }
    }

    pub fn audio_handle(&self) -> Option<&AudioHandle> {
        match self {
            TimelineStep::Voice(step) => Some(&step.resolution.handle),
            TimelineStep::Directive(_) => None,
        }
    }
}

/// Serializable outline of a step, for logs and presentation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub kind: SegmentKind,
    pub speaker_tag: Option<String>,
    pub duration_secs: Option<f64>,
    pub source_type: Option<SourceType>,
}

/// Built once, consumed top to bottom, never mutated during playback.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    steps: Vec<TimelineStep>,
}

impl Timeline {
    pub fn new(steps: Vec<TimelineStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[TimelineStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn audio_handles(&self) -> impl Iterator<Item = &AudioHandle> {
        self.steps.iter().filter_map(TimelineStep::audio_handle)
    }

    /// Release every audio handle; returns how many were still open.
    pub fn release_all(&self) -> usize {
        self.audio_handles().filter(|h| h.release()).count()
    }

    pub fn summary(&self) -> Vec<StepSummary> {
        self.steps
            .iter()
            .map(|step| match step {
                TimelineStep::Directive(d) => StepSummary {
                    kind: d.kind,
                    speaker_tag: None,
                    duration_secs: Some(d.duration_secs),
                    source_type: None,
                },
                TimelineStep::Voice(v) => StepSummary {
                    kind: SegmentKind::Voice,
                    speaker_tag: Some(v.segment.speaker_tag.clone()),
                    duration_secs: None,
                    source_type: Some(v.resolution.source_type),
                },
            })
            .collect()
    }
}

/// Steps resolved so far. Dropping it before [`PendingSteps::into_timeline`]
/// (an error, or the build future being cancelled) releases every handle.
struct PendingSteps {
    steps: Vec<TimelineStep>,
}

impl PendingSteps {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            steps: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, step: TimelineStep) {
        self.steps.push(step);
    }

    fn into_timeline(mut self) -> Timeline {
        Timeline::new(std::mem::take(&mut self.steps))
    }
}

impl Drop for PendingSteps {
    fn drop(&mut self) {
        let released = self
            .steps
            .iter()
            .filter_map(TimelineStep::audio_handle)
            .filter(|h| h.release())
            .count();
        if released > 0 {
            log_warn!("timeline build abandoned, {} handles released", released);
        }
    }
}

/// Resolve every voice segment up front, in order, so playback never waits on
/// synthesis. Any fatal resolution error releases the handles created so far.
pub async fn build(
    segments: &[Segment],
    resolver: &AudioResolver,
    ctx: &mut ResolutionContext,
) -> EngineResult<Timeline> {
    let settings = resolver.settings();
    let mut steps = PendingSteps::with_capacity(segments.len());

    for segment in segments {
        let visual_actions = decode_all(&segment.visual_actions);

        match segment.kind {
            SegmentKind::Voice => match resolver.resolve(segment, ctx).await {
                Ok(resolution) => steps.push(TimelineStep::Voice(VoiceStep {
                    segment: segment.clone(),
                    resolution,
                    visual_actions,
                })),
                Err(err) => {
                    log_warn!("timeline build aborted at '{}': {err}", segment.speaker_tag);
                    return Err(err);
                }
            },
            kind => {
                let default_secs = match kind {
                    SegmentKind::Media => settings.media_duration_secs,
                    _ => settings.hold_duration_secs,
                };
                let duration_secs = segment.explicit_duration.unwrap_or(default_secs).max(0.0);
                let media_url = resolve_media_url(resolver, segment.media_ref.as_ref()).await;

                steps.push(TimelineStep::Directive(DirectiveStep {
                    kind,
                    duration_secs,
                    visual_actions,
                    media_ref: segment.media_ref.clone(),
                    media_url,
                }));
            }
        }
    }

    let timeline = steps.into_timeline();
    log_info!("timeline built with {} steps", timeline.len());
    Ok(timeline)
}

async fn resolve_media_url(resolver: &AudioResolver, media_ref: Option<&MediaRef>) -> Option<String> {
    let media_ref = media_ref?;
    let media = resolver.collaborators().media.as_ref()?;
    match media.resolve_media(media_ref).await {
        Ok(url) => {
            if url.is_none() {
                log_warn!("media {} not found", media_ref);
            }
            url
        }
        Err(err) => {
            log_warn!("media lookup failed for {}: {err:#}", media_ref);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Collaborators, MemoryMedia, SpeechSynthesizer};
    use std::sync::atomic::{AtomicBool, Ordering};
    use crate::error::{EngineError, SynthesisError};
    use crate::script::parse;
    use crate::settings::EngineSettings;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Fails for one voice id, succeeds for the rest.
    struct PickySynth {
        broken_voice: &'static str,
    }

    #[async_trait]
    impl SpeechSynthesizer for PickySynth {
        async fn synthesize(&self, _text: &str, voice_id: &str) -> Result<Vec<u8>, SynthesisError> {
            if voice_id == self.broken_voice {
                Err(SynthesisError::new(voice_id, "unauthorized"))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    fn resolver(broken_voice: &'static str) -> AudioResolver {
        let mut urls = HashMap::new();
        urls.insert("photo-1".to_string(), "https://cdn.example/photo-1.jpg".to_string());
        let collaborators = Collaborators::new(Arc::new(PickySynth { broken_voice }))
            .with_media(Arc::new(MemoryMedia::new(urls)));
        AudioResolver::new(collaborators, EngineSettings::default())
    }

    fn context() -> ResolutionContext {
        ResolutionContext::new("cut-1")
            .with_narrator_voice("narrator")
            .with_ember_voice("ember")
    }

    #[tokio::test]
    async fn steps_follow_segment_order() {
        let segments = parse(
            "[[HOLD]] <COLOR:#000000,duration=2>\n[[MEDIA]] id=photo-1\n[NARRATOR] First.\n[EMBER VOICE] Second.",
        );
        let timeline = build(&segments, &resolver("none"), &mut context()).await.unwrap();

        assert_eq!(timeline.len(), 4);
        let summary = timeline.summary();
        assert_eq!(summary[0].kind, SegmentKind::Hold);
        assert_eq!(summary[0].duration_secs, Some(2.0));
        assert_eq!(summary[1].kind, SegmentKind::Media);
        assert_eq!(summary[1].duration_secs, Some(2.0));
        assert_eq!(summary[2].speaker_tag.as_deref(), Some("NARRATOR"));
        assert_eq!(summary[3].speaker_tag.as_deref(), Some("EMBER VOICE"));
        assert_eq!(summary[3].source_type, Some(SourceType::GenericSynthesis));

        match &timeline.steps()[1] {
            TimelineStep::Directive(step) => {
                assert_eq!(step.media_url.as_deref(), Some("https://cdn.example/photo-1.jpg"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn default_durations() {
        let segments = parse("[[HOLD]] <COLOR:#FFFFFF>\n[[MEDIA]] name=\"Unknown\"");
        let timeline = build(&segments, &resolver("none"), &mut context()).await.unwrap();
        let durations: Vec<_> = timeline.summary().iter().map(|s| s.duration_secs).collect();
        assert_eq!(durations, vec![Some(3.0), Some(2.0)]);
    }

    #[tokio::test]
    async fn synthesis_failure_aborts_build() {
        let segments = parse("[NARRATOR] One.\n[NARRATOR] Two.\n[EMBER VOICE] Three.");
        let ok = build(&segments[..2], &resolver("ember"), &mut context()).await.unwrap();
        assert_eq!(ok.release_all(), 2);

        let err = build(&segments, &resolver("ember"), &mut context())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Synthesis(_)));
    }

    #[test]
    fn dropped_pending_steps_release_their_handles() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        let handle = AudioHandle::from_bytes(vec![1], "audio/mpeg")
            .with_release_hook(move || flag.store(true, Ordering::SeqCst));

        let mut pending = PendingSteps::with_capacity(1);
        pending.push(TimelineStep::Voice(VoiceStep {
            segment: parse("[NARRATOR] Hi.").remove(0),
            resolution: AudioResolution {
                source_type: SourceType::GenericSynthesis,
                handle: handle.clone(),
                text_used: "Hi.".into(),
                voice_id: Some("narrator".into()),
                recording_id: None,
            },
            visual_actions: Vec::new(),
        }));
        drop(pending);

        assert!(handle.is_released());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn finished_build_keeps_handles_open() {
        let segments = parse("[NARRATOR] One.");
        let timeline = build(&segments, &resolver("none"), &mut context()).await.unwrap();
        assert!(timeline.audio_handles().all(|h| !h.is_released()));
    }
}
