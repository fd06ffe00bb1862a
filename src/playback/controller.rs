use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audio::{AudioResolver, AudioSink, ResolutionContext};
use crate::error::{EngineError, EngineResult};
use crate::script::Segment;
use crate::settings::{EngineSettings, SettingsStore};
use crate::timeline::{self, DirectiveStep, Timeline, TimelineStep, VoiceStep};
use crate::visual::VisualState;

use super::presenter::{Presenter, PresenterGate, TextState};
use super::state::{PlaybackSnapshot, PlaybackState, PlaybackStatus};
use super::sync::{estimate_duration, secs_to_duration, SentenceSync, TimerCount};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const LOADING_MESSAGE: &str = "Preparing story";

struct ActiveSession {
    token: CancellationToken,
    gate: Arc<PresenterGate>,
    timeline: Option<Arc<Timeline>>,
    runner: Option<JoinHandle<()>>,
}

/// Owns at most one playback session and walks its timeline one step at a time.
#[derive(Clone)]
pub struct PlaybackController {
    state: Arc<Mutex<PlaybackState>>,
    status_tx: Arc<watch::Sender<PlaybackStatus>>,
    session: Arc<Mutex<Option<ActiveSession>>>,
    presenter: Arc<dyn Presenter>,
    sink: Arc<dyn AudioSink>,
    settings: Arc<SettingsStore>,
    timers: TimerCount,
    verbose: bool,
}

impl PlaybackController {
    pub fn new(presenter: Arc<dyn Presenter>, sink: Arc<dyn AudioSink>, settings: EngineSettings) -> Self {
        Self::with_settings_store(presenter, sink, Arc::new(SettingsStore::in_memory(settings)))
    }

    /// Controller that snapshots `settings` when each session starts playing.
    pub fn with_settings_store(
        presenter: Arc<dyn Presenter>,
        sink: Arc<dyn AudioSink>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        let (status_tx, _) = watch::channel(PlaybackStatus::Idle);
        Self {
            state: Arc::new(Mutex::new(PlaybackState::new())),
            status_tx: Arc::new(status_tx),
            session: Arc::new(Mutex::new(None)),
            presenter,
            sink,
            settings,
            timers: TimerCount::default(),
            verbose: EngineSettings::debug_mode(),
        }
    }

    pub async fn state(&self) -> PlaybackState {
        self.state.lock().await.clone()
    }

    pub async fn status(&self) -> PlaybackStatus {
        self.state.lock().await.status
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state().await,
            pending_timers: self.timers.get(),
        }
    }

    /// Resolve `segments` into a timeline and play it. Returns once playback has
    /// started; resolution errors are reported to the presenter and returned.
    pub async fn play(
        &self,
        segments: &[Segment],
        resolver: &AudioResolver,
        ctx: &mut ResolutionContext,
    ) -> EngineResult<()> {
        let (token, gate) = self.open_session().await?;
        gate.loading(true, LOADING_MESSAGE);

        let built = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = timeline::build(segments, resolver, ctx) => Some(result),
        };

        match built {
            // stop() already settled the session
            None => Ok(()),
            Some(Err(err)) => {
                self.fail(&gate, &err).await;
                Err(err)
            }
            Some(Ok(timeline)) => {
                gate.loading(false, LOADING_MESSAGE);
                self.start_runner(token, gate, timeline).await
            }
        }
    }

    /// Play a timeline that was built elsewhere.
    pub async fn play_timeline(&self, timeline: Timeline) -> EngineResult<()> {
        let (token, gate) = self.open_session().await?;
        self.start_runner(token, gate, timeline).await
    }

    /// Cancel the active session: no further step, timer or presenter callback
    /// runs after this returns, the sink is halted and every handle is released.
    pub async fn stop(&self) -> EngineResult<()> {
        let mut session = self.session.lock().await;
        let Some(active) = session.take() else {
            return Ok(());
        };

        active.token.cancel();
        if active.runner.is_none() {
            // still building; play() returns without touching the presenter again
            active.gate.loading(false, LOADING_MESSAGE);
        }
        active.gate.close();
        self.sink.halt();

        if let Some(runner) = active.runner {
            if let Err(err) = runner.await {
                log_error!("playback runner failed to join: {err}");
            }
        }

        let released = active.timeline.as_ref().map_or(0, |t| t.release_all());

        let status = {
            let mut state = self.state.lock().await;
            state.cancel(Utc::now());
            state.status
        };
        self.status_tx.send_replace(status);

        log_info!(
            "playback stopped ({:?}), {} handles released, {} timers pending",
            status,
            released,
            self.timers.get()
        );
        Ok(())
    }

    /// Wait until the current session leaves `Building`/`Playing`.
    pub async fn wait(&self) -> PlaybackStatus {
        let mut rx = self.status_tx.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            if !status.is_active() {
                return status;
            }
            if rx.changed().await.is_err() {
                return status;
            }
        }
    }

    async fn open_session(&self) -> EngineResult<(CancellationToken, Arc<PresenterGate>)> {
        let mut session = self.session.lock().await;

        let session_id = {
            let mut state = self.state.lock().await;
            if state.status.is_active() {
                return Err(EngineError::AlreadyActive);
            }
            let session_id = Uuid::new_v4().to_string();
            state.begin_building(session_id.clone(), Utc::now());
            session_id
        };
        self.status_tx.send_replace(PlaybackStatus::Building);

        if let Some(previous) = session.take() {
            previous.gate.close();
            if let Some(timeline) = previous.timeline {
                timeline.release_all();
            }
        }

        let token = CancellationToken::new();
        let gate = Arc::new(PresenterGate::new(Arc::clone(&self.presenter)));
        *session = Some(ActiveSession {
            token: token.clone(),
            gate: Arc::clone(&gate),
            timeline: None,
            runner: None,
        });

        log_info!("playback session {session_id} opened");
        Ok((token, gate))
    }

    async fn start_runner(
        &self,
        token: CancellationToken,
        gate: Arc<PresenterGate>,
        timeline: Timeline,
    ) -> EngineResult<()> {
        let timeline = Arc::new(timeline);
        let mut session = self.session.lock().await;

        if token.is_cancelled() {
            timeline.release_all();
            return Ok(());
        }

        self.state.lock().await.begin_playing(timeline.len());
        self.status_tx.send_replace(PlaybackStatus::Playing);

        let runner = Runner {
            timeline: Arc::clone(&timeline),
            token,
            gate,
            sink: Arc::clone(&self.sink),
            settings: self.settings.current(),
            state: Arc::clone(&self.state),
            status_tx: Arc::clone(&self.status_tx),
            timers: self.timers.clone(),
            verbose: self.verbose,
        };
        let handle = tokio::spawn(runner.run());

        if let Some(active) = session.as_mut() {
            active.timeline = Some(timeline);
            active.runner = Some(handle);
        }
        Ok(())
    }

    async fn fail(&self, gate: &Arc<PresenterGate>, err: &EngineError) {
        log_error!("playback failed before start: {err}");

        gate.loading(false, LOADING_MESSAGE);
        gate.visual(&VisualState::cleared());
        gate.error(err);
        gate.close();

        let mut session = self.session.lock().await;
        if session.as_ref().is_some_and(|active| Arc::ptr_eq(&active.gate, gate)) {
            session.take();
        }

        let status = {
            let mut state = self.state.lock().await;
            state.fail(Utc::now());
            state.status
        };
        self.status_tx.send_replace(status);
    }
}

/// Everything the spawned playback task needs, detached from the controller.
struct Runner {
    timeline: Arc<Timeline>,
    token: CancellationToken,
    gate: Arc<PresenterGate>,
    sink: Arc<dyn AudioSink>,
    settings: EngineSettings,
    state: Arc<Mutex<PlaybackState>>,
    status_tx: Arc<watch::Sender<PlaybackStatus>>,
    timers: TimerCount,
    verbose: bool,
}

impl Runner {
    async fn run(self) {
        for (index, step) in self.timeline.steps().iter().enumerate() {
            if self.token.is_cancelled() {
                return;
            }
            self.state.lock().await.advance(index);

            let advanced = match step {
                TimelineStep::Directive(directive) => self.run_directive(index, directive).await,
                TimelineStep::Voice(voice) => self.run_voice(index, voice).await,
            };
            if !advanced {
                return;
            }
        }

        if self.token.is_cancelled() {
            return;
        }

        self.gate.visual(&VisualState::cleared());
        self.gate.finished();
        self.timeline.release_all();

        let status = {
            let mut state = self.state.lock().await;
            state.complete(Utc::now());
            state.status
        };
        self.status_tx.send_replace(status);
        log_info!("playback completed after {} steps", self.timeline.len());
    }

    /// Returns false when the session was cancelled mid-step.
    async fn run_directive(&self, index: usize, step: &DirectiveStep) -> bool {
        self.trace(index, &format!("{} for {:.2}s", step.kind.as_str(), step.duration_secs));

        let visual = VisualState::for_directive(
            step.kind,
            &step.visual_actions,
            step.media_url.clone(),
            &self.settings,
        );
        self.gate.visual(&visual);

        let duration = secs_to_duration(step.duration_secs);
        let _timer = self.timers.track();
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = time::sleep(duration) => true,
        }
    }

    async fn run_voice(&self, index: usize, step: &VoiceStep) -> bool {
        let segment = &step.segment;
        let handle = &step.resolution.handle;
        self.trace(
            index,
            &format!("voice '{}' via {:?}", segment.speaker_tag, step.resolution.source_type),
        );

        let visual = VisualState::for_voice(segment.speaker_role, &step.visual_actions, &self.settings);
        self.gate.visual(&visual);

        let text = &step.resolution.text_used;
        let duration = self
            .sink
            .duration_of(handle)
            .unwrap_or_else(|| estimate_duration(text, &self.settings));

        let gate = Arc::clone(&self.gate);
        let speaker_tag = segment.speaker_tag.clone();
        let sync = SentenceSync::new(self.timers.clone())
            .with_parent(&self.token)
            .schedule(text, duration, move |sentence, sentence_index, sentence_count| {
                gate.text(&TextState {
                    display_text: sentence.to_string(),
                    speaker_tag: speaker_tag.clone(),
                    sentence_index,
                    sentence_count,
                });
            });

        let outcome = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            result = self.sink.play(handle) => Some(result),
        };

        sync.shutdown().await;
        handle.release();

        match outcome {
            None => false,
            Some(Ok(())) => true,
            Some(Err(err)) => {
                log_warn!("audio for step {index} ('{}') failed, skipping: {err}", segment.speaker_tag);
                true
            }
        }
    }

    fn trace(&self, index: usize, what: &str) {
        if self.verbose {
            log_info!("step {}/{}: {}", index + 1, self.timeline.len(), what);
        } else {
            log_debug!("step {}/{}: {}", index + 1, self.timeline.len(), what);
        }
    }
}
