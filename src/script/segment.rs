use serde::{Deserialize, Serialize};
use std::fmt;

pub const NARRATOR_TAG: &str = "NARRATOR";
pub const EMBER_TAG: &str = "EMBER VOICE";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SegmentKind {
    Voice,
    Media,
    Hold,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Voice => "voice",
            SegmentKind::Media => "media",
            SegmentKind::Hold => "hold",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SpeakerRole {
    Ember,
    Narrator,
    Contributor,
}

impl SpeakerRole {
    /// Only the exact tags `EMBER VOICE` and `NARRATOR` are AI voices.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            EMBER_TAG => SpeakerRole::Ember,
            NARRATOR_TAG => SpeakerRole::Narrator,
            _ => SpeakerRole::Contributor,
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, SpeakerRole::Ember | SpeakerRole::Narrator)
    }
}

impl fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SpeakerRole::Ember => "ember",
            SpeakerRole::Narrator => "narrator",
            SpeakerRole::Contributor => "contributor",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", tag = "by", content = "value")]
pub enum MediaRef {
    Id(String),
    Name(String),
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaRef::Id(id) => write!(f, "id={id}"),
            MediaRef::Name(name) => write!(f, "name=\"{name}\""),
        }
    }
}

/// One parsed script line. Immutable once the parser hands it out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub kind: SegmentKind,
    /// Speaker label; empty for media/hold directives.
    pub speaker_tag: String,
    pub speaker_role: SpeakerRole,
    /// Contribution identifier carried as `[TAG|id]`, when the generator supplied one.
    pub message_id: Option<String>,
    /// Line payload with action tokens left in place.
    pub display_content: String,
    /// Payload with action tokens removed; the literal text to speak.
    pub audio_content: String,
    /// Raw action tokens without the angle brackets, in source order.
    pub visual_actions: Vec<String>,
    pub media_ref: Option<MediaRef>,
    pub explicit_duration: Option<f64>,
}

impl Segment {
    pub fn is_voice(&self) -> bool {
        self.kind == SegmentKind::Voice
    }
}
