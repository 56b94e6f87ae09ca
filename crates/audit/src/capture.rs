//! Per-request capture of interactions and the lossy audit queue.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};

use vantage_core::{Interaction, ANONYMOUS_USER};

/// Default number of interactions buffered between the proxy and the worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Header carrying the caller identity.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Create the bounded audit queue.
pub fn audit_channel(capacity: usize) -> (AuditSender, mpsc::Receiver<Interaction>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sender = AuditSender {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, rx)
}

/// Producer side of the audit queue.
///
/// Enqueueing never waits: when the queue is full the new interaction is
/// discarded and counted.
#[derive(Clone)]
pub struct AuditSender {
    tx: mpsc::Sender<Interaction>,
    dropped: Arc<AtomicU64>,
}

impl AuditSender {
    /// Offer an interaction to the worker. Returns `false` if it was dropped.
    pub fn enqueue(&self, interaction: Interaction) -> bool {
        match self.tx.try_send(interaction) {
            Ok(()) => true,
            Err(TrySendError::Full(interaction)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    method = %interaction.method,
                    path = %interaction.path,
                    "Audit queue full, dropping interaction"
                );
                false
            }
            Err(TrySendError::Closed(interaction)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    method = %interaction.method,
                    path = %interaction.path,
                    "Audit worker gone, dropping interaction"
                );
                false
            }
        }
    }

    /// Interactions discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// An interaction whose response has not finished yet.
#[derive(Debug, Clone)]
pub struct PendingInteraction {
    timestamp: DateTime<Utc>,
    started: Instant,
    user_id: String,
    method: String,
    path: String,
    request_body: Bytes,
    status_code: u16,
    is_blocked: bool,
    is_redacted: bool,
}

impl PendingInteraction {
    /// Start the clock for a request. A missing or blank identity becomes
    /// [`ANONYMOUS_USER`].
    pub fn start(user_id: Option<&str>, method: impl Into<String>, path: impl Into<String>) -> Self {
        let user_id = user_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(ANONYMOUS_USER);

        Self {
            timestamp: Utc::now(),
            started: Instant::now(),
            user_id: user_id.to_string(),
            method: method.into(),
            path: path.into(),
            request_body: Bytes::new(),
            status_code: 200,
            is_blocked: false,
            is_redacted: false,
        }
    }

    /// Record the body that was forwarded (or refused) and the filter flags.
    pub fn with_request(mut self, body: Bytes, is_blocked: bool, is_redacted: bool) -> Self {
        self.request_body = body;
        self.is_blocked = is_blocked;
        self.is_redacted = is_redacted;
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Close the interaction with whatever response body was relayed.
    pub fn complete(self, response_body: Bytes) -> Interaction {
        Interaction {
            timestamp: self.timestamp,
            user_id: self.user_id,
            method: self.method,
            path: self.path,
            request_body: self.request_body,
            response_body,
            status_code: self.status_code,
            duration: self.started.elapsed(),
            is_blocked: self.is_blocked,
            is_redacted: self.is_redacted,
        }
    }
}

/// Response body stream that copies every chunk into a buffer.
///
/// The interaction is enqueued exactly once: when the inner stream ends or
/// errors, or when the body is dropped before that (client went away).
pub struct CaptureBody<S> {
    inner: S,
    buffer: BytesMut,
    pending: Option<PendingInteraction>,
    sender: AuditSender,
}

impl<S> CaptureBody<S> {
    pub fn new(inner: S, pending: PendingInteraction, sender: AuditSender) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            pending: Some(pending),
            sender,
        }
    }

    fn finish(&mut self) {
        if let Some(pending) = self.pending.take() {
            let body = std::mem::take(&mut self.buffer).freeze();
            self.sender.enqueue(pending.complete(body));
        }
    }
}

impl<S, E> Stream for CaptureBody<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.buffer.extend_from_slice(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for CaptureBody<S> {
    fn drop(&mut self) {
        self.finish();
    }
}
