//! Sub-sentence text display timed against a voice step's audio.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::settings::EngineSettings;

/// Split on `.`, `!` and `?`, keeping each run of terminal punctuation with the
/// clause before it. Text with no terminal punctuation comes back whole.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.trim().chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        while let Some(&next) = chars.peek() {
            if !matches!(next, '.' | '!' | '?') {
                break;
            }
            current.push(next);
            chars.next();
        }
        let at_boundary = chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        sentences.push(piece.to_string());
    }
}

/// Fallback duration when the real audio length is unknown.
pub fn estimate_duration(text: &str, settings: &EngineSettings) -> Duration {
    let chars = text.trim().chars().count() as f64;
    let secs = (chars * settings.seconds_per_char).max(settings.min_sentence_window_secs);
    secs_to_duration(secs)
}

/// Non-positive and NaN become zero; anything too large to represent saturates.
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentenceCue {
    pub text: String,
    pub offset: Duration,
}

/// Each sentence starts at its cumulative share of `total`, weighted by character count.
pub fn plan(text: &str, total: Duration) -> Vec<SentenceCue> {
    let sentences = split_sentences(text);
    let total_chars: usize = sentences.iter().map(|s| s.chars().count()).sum();
    if total_chars == 0 {
        return Vec::new();
    }

    let mut elapsed_chars = 0usize;
    sentences
        .into_iter()
        .map(|sentence| {
            let offset = total.mul_f64(elapsed_chars as f64 / total_chars as f64);
            elapsed_chars += sentence.chars().count();
            SentenceCue {
                text: sentence,
                offset,
            }
        })
        .collect()
}

/// Shared count of armed timers, so a session can prove it left none behind.
#[derive(Debug, Clone, Default)]
pub struct TimerCount(Arc<AtomicUsize>);

impl TimerCount {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn track(&self) -> TimerGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        TimerGuard(Arc::clone(&self.0))
    }
}

pub struct TimerGuard(Arc<AtomicUsize>);

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cancels every cue scheduled by one [`SentenceSync::schedule`] call.
pub struct SyncHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel and wait until no cue can fire anymore.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[derive(Clone, Default)]
pub struct SentenceSync {
    timers: TimerCount,
    parent: Option<CancellationToken>,
}

impl SentenceSync {
    pub fn new(timers: TimerCount) -> Self {
        Self {
            timers,
            parent: None,
        }
    }

    /// Cancelling `token` also cancels every handle scheduled from here on.
    pub fn with_parent(mut self, token: &CancellationToken) -> Self {
        self.parent = Some(token.clone());
        self
    }

    /// Show the first sentence now and the rest at their offsets within `duration`.
    pub fn schedule<F>(&self, text: &str, duration: Duration, on_sentence: F) -> SyncHandle
    where
        F: Fn(&str, usize, usize) + Send + Sync + 'static,
    {
        let token = match &self.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let cues = plan(text, duration);
        let count = cues.len();

        let Some(first) = cues.first() else {
            return SyncHandle { token, task: None };
        };
        on_sentence(&first.text, 0, count);
        if count == 1 {
            return SyncHandle { token, task: None };
        }

        let start = Instant::now();
        let guard = self.timers.track();
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            for (index, cue) in cues.iter().enumerate().skip(1) {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => return,
                    _ = time::sleep_until(start + cue.offset) => {}
                }
                if task_token.is_cancelled() {
                    return;
                }
                on_sentence(&cue.text, index, count);
            }
        });

        SyncHandle {
            token,
            task: Some(task),
        }
    }
}
