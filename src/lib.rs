//! Story cut playback engine.
//!
//! Raw script text is parsed into [`script::Segment`]s, voice segments are resolved to
//! playable audio by [`audio::AudioResolver`], the result is assembled into a
//! [`timeline::Timeline`] and [`playback::PlaybackController`] walks it, pushing visual
//! and text state to a [`playback::Presenter`].

mod utils;

pub mod audio;
pub mod db;
pub mod engine;
pub mod error;
pub mod playback;
pub mod script;
pub mod settings;
pub mod timeline;
pub mod visual;

pub use engine::StoryEngine;
pub use error::{EngineError, EngineResult};
pub use settings::{EngineSettings, SettingsStore};

/// Install `env_logger` at info level; `RUST_LOG` still overrides per module.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
