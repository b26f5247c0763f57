//! The stream state machine
//!
//! Converts a provider's raw chunk sequence into the normalized
//! start/delta/complete/error event protocol with backpressure, pause/resume,
//! inactivity timeout, and cancellation. Per message id: `Start` precedes any
//! `Delta`, deltas keep arrival order (including across pause/resume), and
//! exactly one terminal event is ever emitted.

use super::types::{StreamConfig, StreamEvent, StreamState};
use crate::error::{ErrorKind, ProviderError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Inner {
    state: StreamState,
    content: String,
    // deltas held back while paused, in arrival order
    buffered: VecDeque<StreamEvent>,
    last_activity: Instant,
    watchdog: Option<JoinHandle<()>>,
}

/// Stream state machine for one message
///
/// Cloning yields another handle onto the same stream; all methods take
/// `&self` and are safe to call concurrently. Terminal states are sticky:
/// once completed, cancelled, or failed, every further call is a logged
/// no-op.
#[derive(Clone)]
pub struct StreamController {
    message_id: Arc<String>,
    config: Arc<StreamConfig>,
    tx: mpsc::Sender<StreamEvent>,
    inner: Arc<Mutex<Inner>>,
}

impl StreamController {
    /// Create a controller and the receiving end of its event stream
    pub fn new(
        message_id: impl Into<String>,
        config: StreamConfig,
    ) -> (Self, mpsc::Receiver<StreamEvent>) {
        // +1 keeps room for the terminal event even when deltas fill the
        // backpressure window
        let (tx, rx) = mpsc::channel(config.max_buffer_size + 1);
        let controller = Self {
            message_id: Arc::new(message_id.into()),
            config: Arc::new(config),
            tx,
            inner: Arc::new(Mutex::new(Inner {
                state: StreamState::Idle,
                content: String::new(),
                buffered: VecDeque::new(),
                last_activity: Instant::now(),
                watchdog: None,
            })),
        };
        (controller, rx)
    }

    /// The message id all emitted events are addressed to
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Current state
    pub fn state(&self) -> StreamState {
        self.inner.lock().state
    }

    /// The content accumulated so far
    pub fn content(&self) -> String {
        self.inner.lock().content.clone()
    }

    /// True while the stream is mid-flight without a terminal signal
    ///
    /// Callers use this after the provider call resolves to detect streams
    /// that ended without completing, which must surface as
    /// `StreamInterrupted`.
    pub fn is_interrupted(&self) -> bool {
        matches!(self.state(), StreamState::Streaming | StreamState::Paused)
    }

    /// Begin streaming: `Idle -> Streaming`, emits `Start`
    ///
    /// Arms the inactivity watchdog, which fails the stream with a synthetic
    /// timeout error if no chunk arrives within the configured window.
    pub async fn start(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.state != StreamState::Idle {
                return Err(ProviderError::new(
                    ErrorKind::Validation,
                    format!("cannot start stream in state {:?}", inner.state),
                ));
            }
            inner.state = StreamState::Streaming;
            inner.last_activity = Instant::now();
        }

        self.emit(StreamEvent::Start {
            message_id: self.message_id.to_string(),
        })
        .await;

        let watchdog = tokio::spawn(Self::watchdog_loop(self.clone()));
        self.inner.lock().watchdog = Some(watchdog);
        Ok(())
    }

    /// Feed one raw text chunk
    ///
    /// Streaming: appends and emits a `Delta`, auto-pausing when the consumer
    /// is `max_buffer_size` events behind. Paused: appends and buffers the
    /// delta. Terminal states: logged no-op. Never awaits, so a cancellation
    /// observed between chunks takes effect before the next one.
    pub fn on_chunk(&self, text: &str) {
        let mut inner = self.inner.lock();
        match inner.state {
            StreamState::Streaming => {
                inner.content.push_str(text);
                inner.last_activity = Instant::now();
                let event = StreamEvent::Delta {
                    message_id: self.message_id.to_string(),
                    content: text.to_string(),
                    is_complete: false,
                };
                match self.tx.try_send(event) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(event)) => {
                        debug!(
                            message_id = %self.message_id,
                            "consumer fell behind, pausing stream"
                        );
                        inner.state = StreamState::Paused;
                        inner.buffered.push_back(event);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        warn!(message_id = %self.message_id, "event consumer dropped");
                    }
                }
            }
            StreamState::Paused => {
                inner.content.push_str(text);
                inner.last_activity = Instant::now();
                inner.buffered.push_back(StreamEvent::Delta {
                    message_id: self.message_id.to_string(),
                    content: text.to_string(),
                    is_complete: false,
                });
            }
            StreamState::Idle => {
                warn!(message_id = %self.message_id, "chunk before start ignored");
            }
            state => {
                debug!(message_id = %self.message_id, ?state, "chunk after terminal state ignored");
            }
        }
    }

    /// `Streaming -> Paused`; deltas are buffered until resumed
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != StreamState::Streaming {
            return Err(ProviderError::new(
                ErrorKind::Validation,
                format!("cannot pause stream in state {:?}", inner.state),
            ));
        }
        inner.state = StreamState::Paused;
        Ok(())
    }

    /// `Paused -> Streaming`; flushes buffered deltas in arrival order first
    pub async fn resume(&self) -> Result<()> {
        if self.state() != StreamState::Paused {
            return Err(ProviderError::new(
                ErrorKind::Validation,
                format!("cannot resume stream in state {:?}", self.state()),
            ));
        }

        self.flush_buffered().await;

        let mut inner = self.inner.lock();
        if inner.state == StreamState::Paused {
            inner.state = StreamState::Streaming;
            inner.last_activity = Instant::now();
        }
        Ok(())
    }

    /// Finish successfully: emits one `Complete` carrying the full content
    ///
    /// Buffered deltas are flushed first so their order is preserved. The
    /// completion event carries the entire accumulated text rather than the
    /// last fragment; late subscribers rely on it being cumulative.
    pub async fn complete(&self) {
        match self.state() {
            StreamState::Streaming | StreamState::Paused => {}
            state => {
                debug!(message_id = %self.message_id, ?state, "complete ignored");
                return;
            }
        }

        self.flush_buffered().await;

        let content = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.state = StreamState::Completed;
            inner.content.clone()
        };

        self.emit(StreamEvent::Complete {
            message_id: self.message_id.to_string(),
            content,
            is_complete: true,
        })
        .await;
        self.stop_watchdog();
    }

    /// Cancel from any non-terminal state; idempotent
    ///
    /// Clears all buffers and emits a single `Error` event with a
    /// cancellation message.
    pub async fn cancel(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                debug!(message_id = %self.message_id, "cancel after terminal state ignored");
                return;
            }
            inner.state = StreamState::Cancelled;
            inner.buffered.clear();
            inner.content.clear();
        }

        self.emit(StreamEvent::Error {
            message_id: self.message_id.to_string(),
            message: "stream cancelled".to_string(),
        })
        .await;
        self.stop_watchdog();
    }

    /// Fail from any non-terminal state; idempotent with cancellation
    pub async fn on_error(&self, err: &ProviderError) {
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                debug!(message_id = %self.message_id, "error after terminal state ignored");
                return;
            }
            inner.state = StreamState::Failed;
            inner.buffered.clear();
        }

        self.emit(StreamEvent::Error {
            message_id: self.message_id.to_string(),
            message: err.user_message().to_string(),
        })
        .await;
        self.stop_watchdog();
    }

    /// Drain buffered deltas to the consumer, preserving order
    async fn flush_buffered(&self) {
        loop {
            let event = {
                let mut inner = self.inner.lock();
                match inner.buffered.pop_front() {
                    Some(event) => event,
                    None => return,
                }
            };
            if self.tx.send(event).await.is_err() {
                warn!(message_id = %self.message_id, "event consumer dropped during flush");
                return;
            }
        }
    }

    async fn emit(&self, event: StreamEvent) {
        if self.tx.send(event).await.is_err() {
            warn!(message_id = %self.message_id, "event consumer dropped");
        }
    }

    fn stop_watchdog(&self) {
        if let Some(handle) = self.inner.lock().watchdog.take() {
            handle.abort();
        }
    }

    async fn watchdog_loop(controller: StreamController) {
        let timeout = controller.config.inactivity_timeout;
        loop {
            let (deadline, terminal) = {
                let inner = controller.inner.lock();
                (inner.last_activity + timeout, inner.state.is_terminal())
            };
            if terminal {
                return;
            }

            let now = Instant::now();
            if now < deadline {
                tokio::time::sleep(deadline - now).await;
                continue;
            }

            warn!(
                message_id = %controller.message_id,
                timeout_secs = timeout.as_secs(),
                "stream inactivity timeout"
            );
            let err = ProviderError::new(
                ErrorKind::Timeout,
                format!("no stream activity for {}s", timeout.as_secs()),
            );
            controller.on_error(&err).await;
            return;
        }
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("message_id", &self.message_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn controller() -> (StreamController, mpsc::Receiver<StreamEvent>) {
        StreamController::new("m1", StreamConfig::default())
    }

    fn small_buffer() -> StreamConfig {
        StreamConfig {
            max_buffer_size: 3,
            inactivity_timeout: Duration::from_secs(30),
        }
    }

    async fn drain(rx: &mut mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = vec![];
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    // ==================== Lifecycle Tests ====================

    #[tokio::test]
    async fn test_start_emits_start_event() {
        let (controller, mut rx) = controller();
        controller.start().await.unwrap();

        assert_eq!(controller.state(), StreamState::Streaming);
        assert_eq!(
            rx.recv().await.unwrap(),
            StreamEvent::Start {
                message_id: "m1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_start_twice_is_an_error() {
        let (controller, _rx) = controller();
        controller.start().await.unwrap();
        let err = controller.start().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_complete_carries_cumulative_content() {
        let (controller, mut rx) = controller();
        controller.start().await.unwrap();
        for chunk in ["Hel", "lo, ", "world"] {
            controller.on_chunk(chunk);
        }
        controller.complete().await;

        let events = drain(&mut rx).await;
        let last = events.last().unwrap();
        assert_eq!(
            *last,
            StreamEvent::Complete {
                message_id: "m1".to_string(),
                content: "Hello, world".to_string(),
                is_complete: true,
            }
        );
        assert_eq!(controller.state(), StreamState::Completed);
    }

    #[tokio::test]
    async fn test_start_before_deltas_and_single_terminal() {
        let (controller, mut rx) = controller();
        controller.start().await.unwrap();
        controller.on_chunk("a");
        controller.on_chunk("b");
        controller.complete().await;
        // post-terminal calls are no-ops
        controller.on_chunk("c");
        controller.complete().await;
        controller.cancel().await;

        let events = drain(&mut rx).await;
        assert!(matches!(events[0], StreamEvent::Start { .. }));
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminals, 1);
        assert_eq!(events.len(), 4); // start, 2 deltas, complete
    }

    // ==================== Pause / Resume Tests ====================

    #[tokio::test]
    async fn test_pause_buffers_and_resume_flushes_in_order() {
        let (controller, mut rx) = controller();
        controller.start().await.unwrap();
        controller.on_chunk("one ");
        controller.pause().unwrap();
        controller.on_chunk("two ");
        controller.on_chunk("three");
        // nothing new on the channel while paused
        let _ = rx.recv().await; // start
        let _ = rx.recv().await; // "one "
        assert!(rx.try_recv().is_err());

        controller.resume().await.unwrap();
        assert_eq!(controller.state(), StreamState::Streaming);

        let events = drain(&mut rx).await;
        let texts: Vec<_> = events
            .iter()
            .map(|e| match e {
                StreamEvent::Delta { content, .. } => content.as_str(),
                _ => panic!("expected deltas"),
            })
            .collect();
        assert_eq!(texts, vec!["two ", "three"]);
        assert_eq!(controller.content(), "one two three");
    }

    #[tokio::test]
    async fn test_pause_only_from_streaming() {
        let (controller, _rx) = controller();
        assert!(controller.pause().is_err());
        controller.start().await.unwrap();
        controller.pause().unwrap();
        assert!(controller.pause().is_err());
        assert!(controller.resume().await.is_ok());
        assert!(controller.resume().await.is_err());
    }

    #[tokio::test]
    async fn test_backpressure_auto_pauses() {
        let (controller, _rx) = StreamController::new("m1", small_buffer());
        controller.start().await.unwrap();
        // capacity 3 + 1; start consumed one slot, so a few deltas fill it
        for n in 0..10 {
            controller.on_chunk(&format!("chunk{n}"));
        }
        assert_eq!(controller.state(), StreamState::Paused);
        // content keeps accumulating regardless
        assert!(controller.content().contains("chunk9"));
    }

    #[tokio::test]
    async fn test_backpressure_resume_after_draining() {
        let (controller, mut rx) = StreamController::new("m1", small_buffer());
        controller.start().await.unwrap();
        for n in 0..6 {
            controller.on_chunk(&format!("{n}"));
        }
        assert_eq!(controller.state(), StreamState::Paused);

        // drain the channel, then resume; all deltas arrive in order
        let consumer = tokio::spawn(async move {
            let mut texts = vec![];
            while let Some(event) = rx.recv().await {
                if let StreamEvent::Delta { content, .. } = event {
                    texts.push(content);
                }
            }
            texts
        });
        controller.resume().await.unwrap();
        controller.complete().await;
        drop(controller);

        let texts = consumer.await.unwrap();
        assert_eq!(texts, vec!["0", "1", "2", "3", "4", "5"]);
    }

    // ==================== Cancellation Tests ====================

    #[tokio::test]
    async fn test_cancel_emits_single_error_and_is_idempotent() {
        let (controller, mut rx) = controller();
        controller.start().await.unwrap();
        controller.on_chunk("partial");
        controller.cancel().await;
        controller.cancel().await; // no-op

        let events = drain(&mut rx).await;
        let errors: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Error { .. }))
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(controller.state(), StreamState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_from_idle() {
        let (controller, mut rx) = controller();
        controller.cancel().await;
        assert_eq!(controller.state(), StreamState::Cancelled);
        let events = drain(&mut rx).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }

    #[tokio::test]
    async fn test_error_then_cancel_first_wins() {
        let (controller, mut rx) = controller();
        controller.start().await.unwrap();
        controller
            .on_error(&ProviderError::new(ErrorKind::Network, "gone"))
            .await;
        controller.cancel().await;

        assert_eq!(controller.state(), StreamState::Failed);
        let events = drain(&mut rx).await;
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    // ==================== Interruption / Timeout Tests ====================

    #[tokio::test]
    async fn test_is_interrupted() {
        let (controller, _rx) = controller();
        assert!(!controller.is_interrupted());
        controller.start().await.unwrap();
        assert!(controller.is_interrupted());
        controller.pause().unwrap();
        assert!(controller.is_interrupted());
        controller.resume().await.unwrap();
        controller.complete().await;
        assert!(!controller.is_interrupted());
    }

    #[tokio::test]
    async fn test_inactivity_timeout_fails_stream() {
        let (controller, mut rx) = StreamController::new(
            "m1",
            StreamConfig {
                max_buffer_size: 100,
                inactivity_timeout: Duration::from_millis(30),
            },
        );
        controller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(controller.state(), StreamState::Failed);
        let events = drain(&mut rx).await;
        assert!(matches!(events.last().unwrap(), StreamEvent::Error { .. }));
    }

    #[tokio::test]
    async fn test_chunks_keep_stream_alive() {
        let (controller, _rx) = StreamController::new(
            "m1",
            StreamConfig {
                max_buffer_size: 100,
                inactivity_timeout: Duration::from_millis(60),
            },
        );
        controller.start().await.unwrap();
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(30)).await;
            controller.on_chunk("tick");
        }
        assert_eq!(controller.state(), StreamState::Streaming);
        controller.complete().await;
        assert_eq!(controller.state(), StreamState::Completed);
    }
}
