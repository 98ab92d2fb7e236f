//! Cancelable subscription to the provider's event stream.
//!
//! A producer task pulls from the provider stream and forwards each event
//! into the orchestrator queue, tagged with the subscription id. Cancelling
//! stops the task before it forwards anything further and drops the
//! provider stream.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::provider::EventStream;
use crate::runtime::SessionEvent;

/// Why a subscription's producer task stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Cancelled,
    /// The provider stream ended on its own
    Finished,
    /// Nobody is consuming the queue any more
    QueueClosed,
}

#[derive(Debug)]
pub struct Subscription {
    id: u64,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Start forwarding `stream` into `queue`. `on_termination` runs exactly
    /// once, after the stream has been dropped.
    pub fn spawn<F>(
        id: u64,
        mut stream: EventStream,
        queue: mpsc::Sender<SessionEvent>,
        on_termination: F,
    ) -> Self
    where
        F: FnOnce(u64, Termination) + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            let reason = loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break Termination::Cancelled,
                    next = stream.next() => {
                        let Some(event) = next else {
                            break Termination::Finished;
                        };
                        let forwarded = SessionEvent::Provider { subscription: id, event };
                        tokio::select! {
                            biased;
                            _ = cancelled.cancelled() => break Termination::Cancelled,
                            sent = queue.send(forwarded) => {
                                if sent.is_err() {
                                    break Termination::QueueClosed;
                                }
                            }
                        }
                    }
                }
            };
            drop(stream);
            on_termination(id, reason);
        });

        Self { id, token, task }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the producer task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
