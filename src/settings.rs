use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::audio::AudioPreference;
use crate::script::SpeakerRole;

/// Overlay colour applied while a voice of the given role speaks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayColors {
    pub ember: String,
    pub narrator: String,
    pub contributor: String,
}

impl Default for OverlayColors {
    fn default() -> Self {
        Self {
            ember: "#FF0000".into(),
            narrator: "#0000FF".into(),
            contributor: "#00FF00".into(),
        }
    }
}

impl OverlayColors {
    pub fn for_role(&self, role: SpeakerRole) -> &str {
        match role {
            SpeakerRole::Ember => &self.ember,
            SpeakerRole::Narrator => &self.narrator,
            SpeakerRole::Contributor => &self.contributor,
        }
    }
}

/// Thresholds for the legacy content-to-recording matcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatcherSettings {
    pub min_overlap_ratio: f64,
    pub min_shared_words: usize,
    /// Words of this length or shorter are not significant.
    pub max_insignificant_len: usize,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            min_overlap_ratio: 0.5,
            min_shared_words: 2,
            max_insignificant_len: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TtsSettings {
    pub base_url: String,
    pub model: String,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "tts-1".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub media_duration_secs: f64,
    pub hold_duration_secs: f64,
    /// Speaking-rate estimate used when the real audio duration is unknown.
    pub seconds_per_char: f64,
    pub min_sentence_window_secs: f64,
    pub overlay_transparency: f32,
    pub overlay_colors: OverlayColors,
    pub matcher: MatcherSettings,
    pub default_preference: AudioPreference,
    pub tts: TtsSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            media_duration_secs: 2.0,
            hold_duration_secs: 3.0,
            seconds_per_char: 0.08,
            min_sentence_window_secs: 1.0,
            overlay_transparency: 0.2,
            overlay_colors: OverlayColors::default(),
            matcher: MatcherSettings::default(),
            default_preference: AudioPreference::Recorded,
            tts: TtsSettings::default(),
        }
    }
}

impl EngineSettings {
    /// `STORYCUT_DEBUG=1` (or `true`) turns on verbose scheduler logging.
    pub fn debug_mode() -> bool {
        std::env::var("STORYCUT_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

/// Shared between the resolver and the controller; both read it per cut, so an
/// `update` or `reload` applies to the next `play`.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring malformed settings at {}: {}",
                    path.display(),
                    err
                );
                EngineSettings::default()
            })
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// A store with no backing file. `update` only changes memory.
    pub fn in_memory(settings: EngineSettings) -> Self {
        Self {
            path: None,
            data: RwLock::new(settings),
        }
    }

    /// Snapshot that survives a poisoned lock.
    pub fn current(&self) -> EngineSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn get(&self) -> Result<EngineSettings> {
        self.data
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow!("settings lock poisoned"))
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let data: EngineSettings = serde_json::from_str(&contents)?;
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get().unwrap(), EngineSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"holdDurationSecs": 5.0}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get().unwrap();
        assert_eq!(settings.hold_duration_secs, 5.0);
        assert_eq!(settings.media_duration_secs, 2.0);
        assert_eq!(settings.default_preference, AudioPreference::Recorded);
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.get().unwrap();
        settings.overlay_transparency = 0.4;
        settings.default_preference = AudioPreference::Text;
        store.update(settings.clone()).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        reopened.reload().unwrap();
        assert_eq!(reopened.get().unwrap(), settings);
    }

    #[test]
    fn in_memory_store_never_touches_disk() {
        let store = SettingsStore::in_memory(EngineSettings::default());
        let mut settings = store.current();
        settings.hold_duration_secs = 0.5;
        store.update(settings).unwrap();
        store.reload().unwrap();
        assert_eq!(store.current().hold_duration_secs, 0.5);
    }
}
