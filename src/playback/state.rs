use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Building,
    Playing,
    Completed,
    Cancelled,
    Failed,
}

impl PlaybackStatus {
    /// Building or playing; a new session may not start.
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackStatus::Building | PlaybackStatus::Playing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackStatus::Completed | PlaybackStatus::Cancelled | PlaybackStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub session_id: Option<String>,
    pub current_step: Option<usize>,
    pub step_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_building(&mut self, session_id: String, now: DateTime<Utc>) {
        *self = Self {
            status: PlaybackStatus::Building,
            session_id: Some(session_id),
            started_at: Some(now),
            ..Self::default()
        };
    }

    pub fn begin_playing(&mut self, step_count: usize) {
        self.status = PlaybackStatus::Playing;
        self.step_count = step_count;
        self.current_step = None;
    }

    pub fn advance(&mut self, index: usize) {
        self.current_step = Some(index);
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.finish(PlaybackStatus::Completed, now);
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.finish(PlaybackStatus::Cancelled, now);
    }

    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.finish(PlaybackStatus::Failed, now);
    }

    fn finish(&mut self, status: PlaybackStatus, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.finished_at = Some(now);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    /// Hold timers and sentence cues still scheduled.
    pub pending_timers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_is_sticky() {
        let mut state = PlaybackState::new();
        state.begin_building("s1".into(), Utc::now());
        state.begin_playing(3);
        state.advance(1);
        assert!(state.status.is_active());

        state.complete(Utc::now());
        state.cancel(Utc::now());
        assert_eq!(state.status, PlaybackStatus::Completed);
        assert_eq!(state.current_step, Some(1));
    }

    #[test]
    fn new_session_resets_progress() {
        let mut state = PlaybackState::new();
        state.begin_building("s1".into(), Utc::now());
        state.begin_playing(2);
        state.advance(1);
        state.fail(Utc::now());

        state.begin_building("s2".into(), Utc::now());
        assert_eq!(state.status, PlaybackStatus::Building);
        assert_eq!(state.session_id.as_deref(), Some("s2"));
        assert_eq!(state.step_count, 0);
        assert!(state.finished_at.is_none());
    }
}
