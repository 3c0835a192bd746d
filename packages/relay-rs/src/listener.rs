//! Fan a merged message channel out to registered handlers.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Receives every raw message the listener pulls.
///
/// Handlers own their failures: decode errors and downstream errors are
/// logged inside `handle` and never stop the listener.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, payload: &[u8]);
}

/// Serial dispatcher from one channel to an ordered list of handlers.
pub struct Listener {
    receiver: mpsc::Receiver<Bytes>,
    handlers: Vec<Arc<dyn Handler>>,
}

impl Listener {
    pub fn new(receiver: mpsc::Receiver<Bytes>) -> Self {
        Self {
            receiver,
            handlers: Vec::new(),
        }
    }

    /// Register a handler. Handlers are invoked in registration order.
    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Consume the channel until it closes or `shutdown` fires.
    ///
    /// Every handler finishes with a message before the next handler sees it,
    /// and before the next message is pulled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(handlers = self.handlers.len(), "listener started");

        loop {
            let payload = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("listener shutting down");
                    break;
                }
                next = self.receiver.recv() => match next {
                    Some(payload) => payload,
                    None => {
                        debug!("listener channel closed");
                        break;
                    }
                },
            };

            for handler in &self.handlers {
                handler.handle(&payload).await;
            }
        }

        info!("listener stopped");
    }

    /// Run on a background task.
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
