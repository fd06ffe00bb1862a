use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::visual::VisualState;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextState {
    pub display_text: String,
    pub speaker_tag: String,
    pub sentence_index: usize,
    pub sentence_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadingState {
    pub is_loading: bool,
    pub message: String,
}

/// The presentation layer the engine pushes state to. Callbacks run on the
/// playback task and must not block or call back into the controller.
pub trait Presenter: Send + Sync {
    fn on_visual_state(&self, state: &VisualState);
    fn on_text_state(&self, state: &TextState);
    fn on_loading_state(&self, state: &LoadingState);
    fn on_playback_finished(&self);
    fn on_playback_error(&self, error: &EngineError);
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum PlaybackEvent {
    VisualState(VisualState),
    TextState(TextState),
    LoadingState(LoadingState),
    PlaybackFinished,
    PlaybackError { message: String },
}

impl PlaybackEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackEvent::VisualState(_) => "visual-state-changed",
            PlaybackEvent::TextState(_) => "text-state-changed",
            PlaybackEvent::LoadingState(_) => "loading-state-changed",
            PlaybackEvent::PlaybackFinished => "playback-finished",
            PlaybackEvent::PlaybackError { .. } => "playback-error",
        }
    }
}

/// Forwards every callback as a [`PlaybackEvent`]. Send failures are ignored;
/// a dropped receiver just means nobody is watching.
#[derive(Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<PlaybackEvent>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.tx.send(event);
    }
}

impl Presenter for ChannelPresenter {
    fn on_visual_state(&self, state: &VisualState) {
        self.emit(PlaybackEvent::VisualState(state.clone()));
    }

    fn on_text_state(&self, state: &TextState) {
        self.emit(PlaybackEvent::TextState(state.clone()));
    }

    fn on_loading_state(&self, state: &LoadingState) {
        self.emit(PlaybackEvent::LoadingState(state.clone()));
    }

    fn on_playback_finished(&self) {
        self.emit(PlaybackEvent::PlaybackFinished);
    }

    fn on_playback_error(&self, error: &EngineError) {
        self.emit(PlaybackEvent::PlaybackError {
            message: error.to_string(),
        });
    }
}

/// Session-scoped view of the presenter. Once closed, nothing more gets through;
/// closing waits for an in-flight callback to return.
pub(crate) struct PresenterGate {
    presenter: Arc<dyn Presenter>,
    open: Mutex<bool>,
}

impl PresenterGate {
    pub(crate) fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self {
            presenter,
            open: Mutex::new(true),
        }
    }

    pub(crate) fn close(&self) {
        match self.open.lock() {
            Ok(mut open) => *open = false,
            Err(poisoned) => *poisoned.into_inner() = false,
        }
    }

    fn emit<F: FnOnce(&dyn Presenter)>(&self, f: F) -> bool {
        let Ok(open) = self.open.lock() else {
            return false;
        };
        if !*open {
            return false;
        }
        f(self.presenter.as_ref());
        true
    }

    pub(crate) fn visual(&self, state: &VisualState) -> bool {
        self.emit(|p| p.on_visual_state(state))
    }

    pub(crate) fn text(&self, state: &TextState) -> bool {
        self.emit(|p| p.on_text_state(state))
    }

    pub(crate) fn loading(&self, is_loading: bool, message: &str) -> bool {
        let state = LoadingState {
            is_loading,
            message: message.to_string(),
        };
        self.emit(|p| p.on_loading_state(&state))
    }

    pub(crate) fn finished(&self) -> bool {
        self.emit(|p| p.on_playback_finished())
    }

    pub(crate) fn error(&self, error: &EngineError) -> bool {
        self.emit(|p| p.on_playback_error(error))
    }
}
