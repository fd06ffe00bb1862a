pub mod collaborators;
#[cfg(feature = "device")]
pub mod device;
pub mod handle;
pub mod matcher;
pub mod memory;
pub mod resolver;
pub mod sink;
pub mod tts;

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

pub use collaborators::{
    Collaborators, MediaResolver, PreferenceStore, Recording, RecordingStore, SpeechSynthesizer,
    VoiceModelStore,
};
#[cfg(feature = "device")]
pub use device::DeviceSink;
pub use handle::{AudioHandle, AudioSource};
pub use matcher::{ConsumedSet, MatchKind};
pub use memory::{MemoryMedia, MemoryPreferences, MemoryRecordings, MemoryVoices};
pub use resolver::{segment_key, AudioResolution, AudioResolver, ResolutionContext, SourceType};
pub use sink::AudioSink;
pub use tts::HttpSpeechSynthesizer;

/// Which source a contributor line should prefer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AudioPreference {
    Recorded,
    Personal,
    Text,
}

impl AudioPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioPreference::Recorded => "recorded",
            AudioPreference::Personal => "personal",
            AudioPreference::Text => "text",
        }
    }
}

impl fmt::Display for AudioPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioPreference {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "recorded" => Ok(AudioPreference::Recorded),
            "personal" => Ok(AudioPreference::Personal),
            "text" => Ok(AudioPreference::Text),
            other => Err(anyhow!("unknown audio preference '{other}'")),
        }
    }
}
