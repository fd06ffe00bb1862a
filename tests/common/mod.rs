#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use storycut::audio::{AudioHandle, AudioSink, AudioSource, SpeechSynthesizer};
use storycut::error::{AudioPlaybackError, SynthesisError};
use storycut::playback::PlaybackEvent;

/// Returns the voice id as the audio bytes, so the sink can tell clips apart.
#[derive(Default)]
pub struct FakeSynth {
    pub calls: Mutex<Vec<(String, String)>>,
    fail: bool,
    delay: Option<Duration>,
}

impl FakeSynth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    /// Every call takes `delay` of (virtual) time.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, SynthesisError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice_id.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SynthesisError::new(voice_id, "quota exceeded"));
        }
        Ok(voice_id.as_bytes().to_vec())
    }
}

/// Plays every clip for a fixed virtual duration. `halt` rewinds and interrupts.
pub struct MockSink {
    clip: Duration,
    broken: Option<Vec<u8>>,
    halted: Notify,
    pub halts: AtomicUsize,
    pub position_ms: AtomicU64,
    pub played: Mutex<Vec<AudioHandle>>,
}

impl MockSink {
    pub fn new(clip: Duration) -> Arc<Self> {
        Arc::new(Self {
            clip,
            broken: None,
            halted: Notify::new(),
            halts: AtomicUsize::new(0),
            position_ms: AtomicU64::new(0),
            played: Mutex::new(Vec::new()),
        })
    }

    /// Clips whose bytes equal `bytes` fail to decode.
    pub fn failing_on(clip: Duration, bytes: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            clip,
            broken: Some(bytes.to_vec()),
            halted: Notify::new(),
            halts: AtomicUsize::new(0),
            position_ms: AtomicU64::new(0),
            played: Mutex::new(Vec::new()),
        })
    }

    pub fn played(&self) -> Vec<AudioHandle> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioSink for MockSink {
    async fn play(&self, handle: &AudioHandle) -> Result<(), AudioPlaybackError> {
        self.played.lock().unwrap().push(handle.clone());

        let source = handle.source().ok_or(AudioPlaybackError::Released)?;
        if let (AudioSource::Memory { bytes, .. }, Some(broken)) = (&source, &self.broken) {
            if bytes.as_slice() == broken.as_slice() {
                return Err(AudioPlaybackError::Decode("corrupt clip".into()));
            }
        }

        self.position_ms.store(1, Ordering::SeqCst);
        tokio::select! {
            _ = tokio::time::sleep(self.clip) => {}
            _ = self.halted.notified() => {}
        }
        Ok(())
    }

    fn halt(&self) {
        self.halts.fetch_add(1, Ordering::SeqCst);
        self.position_ms.store(0, Ordering::SeqCst);
        self.halted.notify_waiters();
    }
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn names(events: &[PlaybackEvent]) -> Vec<&'static str> {
    events.iter().map(PlaybackEvent::name).collect()
}
