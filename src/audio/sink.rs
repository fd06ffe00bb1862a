use std::time::Duration;

use async_trait::async_trait;

use crate::error::AudioPlaybackError;

use super::handle::AudioHandle;

/// Where resolved audio is played.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Start playback and resolve when it ends. Dropping the future does not stop
    /// the audio; call [`AudioSink::halt`] for that.
    async fn play(&self, handle: &AudioHandle) -> Result<(), AudioPlaybackError>;

    /// Pause whatever is playing and rewind it to the start.
    fn halt(&self);

    /// Real duration when it can be known before playback.
    fn duration_of(&self, _handle: &AudioHandle) -> Option<Duration> {
        None
    }
}
