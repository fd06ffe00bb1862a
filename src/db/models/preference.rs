use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::AudioPreference;

/// A contributor line's saved source choice, scoped to one cut.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredPreference {
    pub cut_id: String,
    pub segment_key: String,
    pub preference: AudioPreference,
    pub updated_at: DateTime<Utc>,
}
