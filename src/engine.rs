use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::audio::{AudioResolver, AudioSink, Collaborators, ResolutionContext, SpeechSynthesizer};
use crate::db::Database;
use crate::error::EngineResult;
use crate::playback::{PlaybackController, PlaybackSnapshot, Presenter};
use crate::script::{self, ParseOutput};
use crate::settings::SettingsStore;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const DATABASE_FILE: &str = "storycut.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// One data directory wired to a resolver and a playback controller.
pub struct StoryEngine {
    data_dir: PathBuf,
    database: Database,
    settings: Arc<SettingsStore>,
    resolver: AudioResolver,
    controller: PlaybackController,
}

impl StoryEngine {
    /// Open (or create) `data_dir`, load settings (shared with the resolver and
    /// controller, so later updates apply to the next cut) and attach the preference database
    /// to `collaborators` unless they already carry a preference store.
    pub fn open(
        data_dir: &Path,
        collaborators: Collaborators,
        presenter: Arc<dyn Presenter>,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let database = Database::new(data_dir.join(DATABASE_FILE))?;
        let settings = Arc::new(SettingsStore::new(data_dir.join(SETTINGS_FILE))?);

        let collaborators = if collaborators.preferences.is_some() {
            collaborators
        } else {
            collaborators.with_preferences(Arc::new(database.clone()))
        };

        let resolver = AudioResolver::with_settings_store(collaborators, Arc::clone(&settings));
        let controller = PlaybackController::with_settings_store(presenter, sink, Arc::clone(&settings));

        log_info!("story engine ready at {}", data_dir.display());

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            database,
            settings,
            resolver,
            controller,
        })
    }

    /// Shorthand for [`StoryEngine::open`] with only a synthesizer.
    pub fn with_synthesizer(
        data_dir: &Path,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        presenter: Arc<dyn Presenter>,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Self> {
        Self::open(data_dir, Collaborators::new(synthesizer), presenter, sink)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn resolver(&self) -> &AudioResolver {
        &self.resolver
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    /// Parse `script` and start playing it. Parse warnings are returned alongside;
    /// they never stop playback.
    pub async fn play_script(
        &self,
        script: &str,
        ctx: &mut ResolutionContext,
    ) -> EngineResult<ParseOutput> {
        let parsed = script::parse_with_warnings(script);
        if !parsed.warnings.is_empty() {
            log_warn!("script has {} malformed lines", parsed.warnings.len());
        }
        self.controller
            .play(&parsed.segments, &self.resolver, ctx)
            .await?;
        Ok(parsed)
    }

    pub async fn stop(&self) -> EngineResult<()> {
        self.controller.stop().await
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        self.controller.snapshot().await
    }
}
