use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum AudioSource {
    Url { url: String },
    /// Synthesized audio held in memory until the handle is released.
    Memory {
        #[serde(skip)]
        bytes: Arc<Vec<u8>>,
        mime: String,
    },
}

type ReleaseHook = Box<dyn FnOnce() + Send + 'static>;

struct HandleInner {
    id: Uuid,
    source: Mutex<Option<AudioSource>>,
    released: AtomicBool,
    on_release: Mutex<Option<ReleaseHook>>,
}

/// Playable audio plus its cleanup hook. Clones share one underlying resource;
/// `release` runs the hook and drops in-memory bytes exactly once.
#[derive(Clone)]
pub struct AudioHandle {
    inner: Arc<HandleInner>,
}

impl AudioHandle {
    pub fn new(source: AudioSource) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                source: Mutex::new(Some(source)),
                released: AtomicBool::new(false),
                on_release: Mutex::new(None),
            }),
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self::new(AudioSource::Url { url: url.into() })
    }

    pub fn from_bytes(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self::new(AudioSource::Memory {
            bytes: Arc::new(bytes),
            mime: mime.into(),
        })
    }

    pub fn with_release_hook<F>(self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        if let Ok(mut guard) = self.inner.on_release.lock() {
            *guard = Some(Box::new(hook));
        }
        self
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// `None` once released.
    pub fn source(&self) -> Option<AudioSource> {
        self.inner
            .source
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Returns `true` only for the call that actually released the handle.
    pub fn release(&self) -> bool {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return false;
        }

        if let Ok(mut source) = self.inner.source.lock() {
            source.take();
        }
        let hook = self
            .inner
            .on_release
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(hook) = hook {
            hook();
        }
        true
    }
}

impl fmt::Debug for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioHandle")
            .field("id", &self.inner.id)
            .field("released", &self.is_released())
            .finish()
    }
}
