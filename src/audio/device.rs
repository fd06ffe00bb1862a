//! Default-output-device playback. rodio's stream is not `Send`, so it lives on a
//! dedicated thread driven by commands.

use std::io::Cursor;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, RecvTimeoutError, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use rodio::{Decoder, OutputStream, Sink, Source};
use tokio::sync::oneshot;

use crate::error::AudioPlaybackError;

use super::handle::{AudioHandle, AudioSource};
use super::sink::AudioSink;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

type Done = oneshot::Sender<Result<(), AudioPlaybackError>>;

enum AudioCommand {
    Play { bytes: Arc<Vec<u8>>, done: Done },
    Halt,
    SetVolume(f32),
}

pub struct DeviceSink {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    is_playing: Arc<AtomicBool>,
    http: reqwest::Client,
}

impl Default for DeviceSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSink {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            is_playing: Arc::new(AtomicBool::new(false)),
            http: reqwest::Client::new(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::SeqCst)
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), AudioPlaybackError> {
        self.send(AudioCommand::SetVolume(volume))
    }

    fn send(&self, command: AudioCommand) -> Result<(), AudioPlaybackError> {
        let tx = self.ensure_thread()?;
        tx.send(command)
            .map_err(|e| AudioPlaybackError::Device(e.to_string()))
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, AudioPlaybackError> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| AudioPlaybackError::Device(e.to_string()))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let is_playing = Arc::clone(&self.is_playing);

        thread::Builder::new()
            .name("storycut-audio".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;
                let mut pending: Option<Done> = None;
                let mut volume = 1.0_f32;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                    volume: f32,
                ) -> Result<(), AudioPlaybackError> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| AudioPlaybackError::Device(e.to_string()))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| AudioPlaybackError::Device(e.to_string()))?;
                        new_sink.set_volume(volume);
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                loop {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(AudioCommand::Play { bytes, done }) => {
                            if let Some(old) = sink.as_ref() {
                                old.stop();
                            }
                            pending = None;

                            if let Err(err) = ensure_sink(&mut _stream, &mut sink, volume) {
                                log_error!("audio device unavailable: {err}");
                                let _ = done.send(Err(err));
                                continue;
                            }

                            let decoded = Decoder::new(Cursor::new(bytes.as_ref().clone()))
                                .map_err(|e| AudioPlaybackError::Decode(e.to_string()));
                            match (decoded, sink.as_ref()) {
                                (Ok(source), Some(s)) => {
                                    s.append(source.convert_samples::<f32>());
                                    s.play();
                                    is_playing.store(true, Ordering::SeqCst);
                                    pending = Some(done);
                                }
                                (Err(err), _) => {
                                    let _ = done.send(Err(err));
                                }
                                (Ok(_), None) => {
                                    let _ = done.send(Err(AudioPlaybackError::Device(
                                        "no output sink".into(),
                                    )));
                                }
                            }
                        }
                        Ok(AudioCommand::Halt) => {
                            if let Some(s) = sink.take() {
                                s.pause();
                                s.stop();
                            }
                            _stream = None;
                            pending = None;
                            is_playing.store(false, Ordering::SeqCst);
                        }
                        Ok(AudioCommand::SetVolume(v)) => {
                            volume = v.clamp(0.0, 1.0);
                            if let Some(s) = sink.as_ref() {
                                s.set_volume(volume);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            let finished = sink.as_ref().map(|s| s.empty()).unwrap_or(true);
                            if finished {
                                if let Some(done) = pending.take() {
                                    is_playing.store(false, Ordering::SeqCst);
                                    let _ = done.send(Ok(()));
                                }
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                log_info!("audio thread shutting down");
            })
            .map_err(|e| AudioPlaybackError::Device(e.to_string()))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    async fn load(&self, handle: &AudioHandle) -> Result<Arc<Vec<u8>>, AudioPlaybackError> {
        match handle.source().ok_or(AudioPlaybackError::Released)? {
            AudioSource::Memory { bytes, .. } => Ok(bytes),
            AudioSource::Url { url } => {
                let res = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .and_then(|res| res.error_for_status())
                    .map_err(|e| AudioPlaybackError::Fetch(e.to_string()))?;
                let bytes = res
                    .bytes()
                    .await
                    .map_err(|e| AudioPlaybackError::Fetch(e.to_string()))?;
                Ok(Arc::new(bytes.to_vec()))
            }
        }
    }
}

#[async_trait]
impl AudioSink for DeviceSink {
    async fn play(&self, handle: &AudioHandle) -> Result<(), AudioPlaybackError> {
        let bytes = self.load(handle).await?;
        let (done, finished) = oneshot::channel();
        self.send(AudioCommand::Play { bytes, done })?;
        // A dropped sender means playback was halted or replaced.
        finished.await.unwrap_or(Ok(()))
    }

    fn halt(&self) {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Halt);
        }
    }

    fn duration_of(&self, handle: &AudioHandle) -> Option<Duration> {
        match handle.source()? {
            AudioSource::Memory { bytes, .. } => Decoder::new(Cursor::new(bytes.as_ref().clone()))
                .ok()?
                .total_duration(),
            AudioSource::Url { .. } => None,
        }
    }
}
