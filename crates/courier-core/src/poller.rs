//! # Queue Poller
//!
//! Drives the receive → despatch → delete-or-release loop for one queue.
//!
//! Each iteration receives at most one message. A message whose despatch
//! succeeds is deleted; any despatch failure releases it (visibility timeout
//! reset to zero) so another delivery can happen right away. Failures are
//! isolated at two boundaries:
//!
//! - **Receive**: a failed receive is logged and the next iteration receives
//!   again without delay. A run of failures is logged at error level on the
//!   first failure and then once per hundred.
//! - **Message**: a failed despatch, delete or release is logged and never
//!   escapes the iteration.
//!
//! The shutdown signal is checked between iterations only; an in-flight
//! receive or despatch always completes first.

use crate::config::PollingConfig;
use crate::despatcher::MessageDespatcher;
use crate::envelope::{ReceiptHandle, ReceivedEnvelope};
use crate::transport::{QueueTransport, ReceiveRequest};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

// ============================================================================
// Shutdown Signal
// ============================================================================

/// Create a connected shutdown trigger and signal.
pub fn shutdown_signal() -> (ShutdownTrigger, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        ShutdownTrigger {
            sender: Arc::new(sender),
        },
        ShutdownSignal { receiver },
    )
}

/// Requests shutdown of every poller holding a matching [`ShutdownSignal`].
#[derive(Clone)]
pub struct ShutdownTrigger {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Create another signal observing this trigger.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Cancellation signal observed by pollers between iterations.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Check whether shutdown was requested
    pub fn is_requested(&self) -> bool {
        *self.receiver.borrow()
    }
}

// ============================================================================
// QueuePoller
// ============================================================================

/// While receives keep failing, only every Nth failure is logged at error level.
const RECEIVE_ERROR_LOG_INTERVAL: u32 = 100;

/// Polls one queue and despatches each message it receives.
pub struct QueuePoller {
    transport: Arc<dyn QueueTransport>,
    despatcher: Arc<dyn MessageDespatcher>,
    config: PollingConfig,
    receive_failures: AtomicU32,
}

impl QueuePoller {
    /// Create a poller for `config.queue_identifier`.
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        despatcher: Arc<dyn MessageDespatcher>,
        config: PollingConfig,
    ) -> Self {
        Self {
            transport,
            despatcher,
            config,
            receive_failures: AtomicU32::new(0),
        }
    }

    /// Polling configuration
    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Number of receives that have failed since the last successful one.
    pub fn consecutive_receive_failures(&self) -> u32 {
        self.receive_failures.load(Ordering::Relaxed)
    }

    /// Receive parameters used for every iteration.
    pub fn receive_request(&self) -> ReceiveRequest {
        ReceiveRequest {
            max_messages: 1,
            wait_time_seconds: self.config.wait_time_seconds,
            visibility_timeout_seconds: self
                .config
                .effective_visibility_timeout(self.transport.max_visibility_timeout_seconds()),
        }
    }

    /// Poll until `shutdown` is requested.
    pub async fn poll(&self, shutdown: ShutdownSignal) {
        let queue = self.config.queue_identifier.as_str();
        let request = self.receive_request();

        info!(
            queue = %queue,
            wait_time_seconds = request.wait_time_seconds,
            visibility_timeout_seconds = request.visibility_timeout_seconds,
            "Starting queue poller"
        );

        while !shutdown.is_requested() {
            self.poll_once(request).await;
        }

        info!(queue = %queue, "Queue poller stopped");
    }

    /// Run [`poll`](Self::poll) on a new task.
    pub fn spawn(self, shutdown: ShutdownSignal) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.poll(shutdown).await })
    }

    /// Run a single receive and process whatever it returned.
    ///
    /// Returns the number of messages received.
    pub async fn poll_once(&self, request: ReceiveRequest) -> usize {
        let queue = self.config.queue_identifier.as_str();
        debug!(queue = %queue, "Polling queue");

        let messages = match self.transport.receive(queue, request).await {
            Ok(messages) => {
                let failures = self.receive_failures.swap(0, Ordering::Relaxed);
                if failures > 0 {
                    info!(queue = %queue, consecutive_failures = failures, "Receiving recovered");
                }
                messages
            }
            Err(error) => {
                let failures = self.receive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures == 1 || failures % RECEIVE_ERROR_LOG_INTERVAL == 0 {
                    error!(
                        queue = %queue,
                        error = %error,
                        transient = error.is_transient(),
                        consecutive_failures = failures,
                        "Error while polling queue"
                    );
                } else {
                    debug!(
                        queue = %queue,
                        error = %error,
                        consecutive_failures = failures,
                        "Error while polling queue"
                    );
                }
                return 0;
            }
        };

        let count = messages.len();
        for received in messages {
            self.process(received).await;
        }
        count
    }

    /// Despatch one message, then delete it or release it.
    async fn process(&self, received: ReceivedEnvelope) {
        let queue = self.config.queue_identifier.as_str();
        let receive_count = received.receive_count();
        let (envelope, receipt) = received.into_parts();
        let correlation_id = envelope.correlation_id();

        let span = info_span!(
            "despatch",
            queue = %queue,
            message_id = %envelope.log_id(),
            correlation_id = %correlation_id
        );

        async move {
            debug!(receive_count = receive_count, "Despatching message");

            match self.despatcher.despatch(correlation_id, &envelope).await {
                Ok(()) => {
                    debug!("Deleting message");
                    if let Err(error) = self.transport.delete(queue, receipt).await {
                        warn!(
                            error = %error,
                            "Failed to delete handled message; it will be redelivered when its visibility timeout expires"
                        );
                    }
                }
                Err(error) => {
                    error!(
                        error = %error,
                        kind = error.kind(),
                        transient = error.is_transient(),
                        "Error while handling message"
                    );
                    self.release(receipt).await;
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Make a message immediately visible to other consumers.
    async fn release(&self, receipt: ReceiptHandle) {
        let queue = self.config.queue_identifier.as_str();
        debug!("Releasing message");

        if let Err(error) = self.transport.change_visibility(queue, receipt, 0).await {
            warn!(
                error = %error,
                "Failed to release message; it will be redelivered when its visibility timeout expires"
            );
        }
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
