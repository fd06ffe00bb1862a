pub mod controller;
pub mod presenter;
pub mod state;
pub mod sync;

pub use controller::PlaybackController;
pub use presenter::{ChannelPresenter, LoadingState, PlaybackEvent, Presenter, TextState};
pub use state::{PlaybackSnapshot, PlaybackState, PlaybackStatus};
pub use sync::{estimate_duration, plan, secs_to_duration, split_sentences, SentenceCue, SentenceSync, SyncHandle, TimerCount};
