use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::command::{CommandError, CommandObject, KeyRemap, SharedCommand};
use crate::keys::KeyCode;

#[derive(Debug)]
pub struct LatestSlot<T> {
    value: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for LatestSlot<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            value: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, value: T) {
        *self.lock() = Some(value);
    }

    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.value
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> LatestSlot<T> {
    pub fn peek(&self) -> Option<T> {
        self.lock().clone()
    }
}

pub trait SuggestionSource: Send + Sync + 'static {
    fn query(&self, text: &str) -> Result<Vec<String>, String>;
}

impl<F> SuggestionSource for F
where
    F: Fn(&str) -> Result<Vec<String>, String> + Send + Sync + 'static,
{
    fn query(&self, text: &str) -> Result<Vec<String>, String> {
        self(text)
    }
}

pub type SessionSuggestions = (u64, Vec<String>);

pub struct SuggestionWorker {
    sender: Sender<(u64, String)>,
    cancelled: Arc<AtomicBool>,
}

impl SuggestionWorker {
    pub fn spawn(
        source: Arc<dyn SuggestionSource>,
        window: Duration,
        results: LatestSlot<SessionSuggestions>,
    ) -> Result<Self, std::io::Error> {
        let (sender, receiver) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        thread::Builder::new()
            .name("param-suggest".to_string())
            .spawn(move || worker_loop(source.as_ref(), window, &receiver, &flag, &results))?;
        Ok(Self { sender, cancelled })
    }

    /// Hands the newest parameter text to the worker. Returns false once the
    /// worker has stopped.
    pub fn submit(&self, session_id: u64, text: &str) -> bool {
        !self.is_cancelled() && self.sender.send((session_id, text.to_string())).is_ok()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for SuggestionWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn worker_loop(
    source: &dyn SuggestionSource,
    window: Duration,
    receiver: &Receiver<(u64, String)>,
    cancelled: &AtomicBool,
    results: &LatestSlot<SessionSuggestions>,
) {
    loop {
        let Ok(mut latest) = receiver.recv() else {
            return;
        };
        if cancelled.load(Ordering::SeqCst) {
            return;
        }

        let deadline = Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining) {
                Ok(newer) => latest = newer,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        if cancelled.load(Ordering::SeqCst) {
            return;
        }

        let (session_id, text) = latest;
        match source.query(&text) {
            Ok(found) => {
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                debug!(session_id, %text, count = found.len(), "parameter suggestions ready");
                results.publish((session_id, found));
            }
            Err(error) => warn!(session_id, %text, %error, "parameter suggestion query failed"),
        }
    }
}

#[derive(Default)]
struct SessionState {
    session_id: u64,
    worker: Option<SuggestionWorker>,
    suggestions: Option<Vec<String>>,
}

pub struct SuggestingCommand {
    inner: SharedCommand,
    source: Arc<dyn SuggestionSource>,
    window: Duration,
    results: LatestSlot<SessionSuggestions>,
    state: Mutex<SessionState>,
}

impl SuggestingCommand {
    pub fn new(inner: SharedCommand, source: Arc<dyn SuggestionSource>, window: Duration) -> Self {
        Self {
            inner,
            source,
            window,
            results: LatestSlot::new(),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn shared(self) -> SharedCommand {
        Arc::new(self)
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CommandObject for SuggestingCommand {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn help(&self) -> &str {
        self.inner.help()
    }

    fn key_remap(&self) -> Option<&KeyRemap> {
        self.inner.key_remap()
    }

    fn run(&self) -> Result<(), CommandError> {
        self.inner.run()
    }

    fn on_parameter_modified(&self, key_code: KeyCode, previous: &str, current: &str, session_id: u64) {
        self.inner
            .on_parameter_modified(key_code, previous, current, session_id);

        let mut state = self.state();
        if state.session_id != session_id {
            if let Some(stale) = state.worker.take() {
                stale.cancel();
            }
            state.session_id = session_id;
            state.suggestions = None;
        }
        if state.worker.is_none() {
            match SuggestionWorker::spawn(Arc::clone(&self.source), self.window, self.results.clone()) {
                Ok(worker) => state.worker = Some(worker),
                Err(error) => {
                    warn!(command = %self.inner.name(), %error, "could not start suggestion worker");
                    return;
                }
            }
        }
        if let Some(worker) = &state.worker {
            worker.submit(session_id, current);
        }
    }

    fn parameter_suggestions(&self) -> Option<Vec<String>> {
        let mut state = self.state();
        if let Some((session_id, found)) = self.results.take() {
            if session_id == state.session_id && state.worker.is_some() {
                state.suggestions = Some(found);
            }
        }
        state.suggestions.clone()
    }

    fn set_parameter_suggestions(&self, suggestions: Option<Vec<String>>) {
        self.state().suggestions = suggestions;
    }

    fn on_session_ended(&self, session_id: u64) {
        self.inner.on_session_ended(session_id);
        let mut state = self.state();
        if state.session_id == session_id {
            if let Some(worker) = state.worker.take() {
                worker.cancel();
            }
            state.suggestions = None;
        }
        drop(state);
        self.results.take();
    }
}
