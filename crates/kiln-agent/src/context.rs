use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::events::{EventEmitter, SessionEvent};

/// Receives notice that cached knowledge about a working tree is stale.
///
/// Called after every successful write or delete and after every command
/// that exits with status 0.
pub trait ContextInvalidator: Send + Sync {
    fn invalidate(&self, cwd: &Path);
}

#[derive(Default)]
pub struct NoopContextInvalidator;

impl ContextInvalidator for NoopContextInvalidator {
    fn invalidate(&self, _cwd: &Path) {}
}

/// Remembers every invalidated directory, in call order.
#[derive(Clone, Default)]
pub struct RecordingContextInvalidator {
    inner: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingContextInvalidator {
    pub fn invalidated(&self) -> Vec<PathBuf> {
        self.inner
            .lock()
            .expect("invalidator mutex poisoned")
            .clone()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().expect("invalidator mutex poisoned").len()
    }
}

impl ContextInvalidator for RecordingContextInvalidator {
    fn invalidate(&self, cwd: &Path) {
        self.inner
            .lock()
            .expect("invalidator mutex poisoned")
            .push(cwd.to_path_buf());
    }
}

/// Reports every invalidation as a [`SessionEvent`] and then forwards it.
pub struct EventContextInvalidator {
    emitter: Arc<dyn EventEmitter>,
    session_id: String,
    inner: Arc<dyn ContextInvalidator>,
}

impl EventContextInvalidator {
    pub fn new(
        emitter: Arc<dyn EventEmitter>,
        session_id: impl Into<String>,
        inner: Arc<dyn ContextInvalidator>,
    ) -> Self {
        Self {
            emitter,
            session_id: session_id.into(),
            inner,
        }
    }
}

impl ContextInvalidator for EventContextInvalidator {
    fn invalidate(&self, cwd: &Path) {
        let event =
            SessionEvent::context_invalidated(self.session_id.clone(), cwd.display().to_string());
        if let Err(error) = self.emitter.emit(event) {
            debug!(error = %error, "failed to report context invalidation");
        }
        self.inner.invalidate(cwd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BufferedEventEmitter, EventKind};

    #[test]
    fn recording_invalidator_keeps_call_order() {
        let recorder = RecordingContextInvalidator::default();
        recorder.invalidate(Path::new("/a"));
        recorder.invalidate(Path::new("/b"));
        assert_eq!(
            recorder.invalidated(),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn event_invalidator_emits_and_forwards() {
        let emitter = BufferedEventEmitter::default();
        let recorder = RecordingContextInvalidator::default();
        let invalidator = EventContextInvalidator::new(
            Arc::new(emitter.clone()),
            "session",
            Arc::new(recorder.clone()),
        );

        invalidator.invalidate(Path::new("/work"));

        let events = emitter.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::ContextInvalidated);
        assert_eq!(events[0].data_str("cwd"), Some("/work"));
        assert_eq!(recorder.count(), 1);
    }
}
