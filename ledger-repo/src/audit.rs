//! Audit emitters.
//!
//! - [`TracingAuditEmitter`] writes events to the `audit` tracing target.
//! - [`HttpAuditEmitter`] queues events for an [`AuditWorker`] that POSTs
//!   them to a compliance sink with bounded retries.
//! - [`MemoryAuditLog`] records events for inspection in tests.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use ledger_types::{AuditEmitter, AuditEvent};

// ─────────────────────────────────────────────────────────────────────────────
// Tracing sink
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditEmitter;

impl AuditEmitter for TracingAuditEmitter {
    fn emit(&self, event: AuditEvent) {
        info!(
            target: "audit",
            event_id = %event.id,
            action = ?event.action,
            outcome = %event.outcome,
            details = %event.details,
            "audit event"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP sink
// ─────────────────────────────────────────────────────────────────────────────

/// Queues events for background delivery. Never blocks the caller.
#[derive(Clone)]
pub struct HttpAuditEmitter {
    queue: mpsc::UnboundedSender<AuditEvent>,
}

impl HttpAuditEmitter {
    /// Creates the emitter together with the worker that drains its queue.
    /// The worker must be spawned by the caller.
    pub fn new(target_url: String, max_attempts: u32) -> (Self, AuditWorker) {
        let (queue, rx) = mpsc::unbounded_channel();
        let worker = AuditWorker {
            rx,
            client: reqwest::Client::new(),
            target_url,
            max_attempts: max_attempts.max(1),
            backoff: Duration::from_millis(250),
        };
        (Self { queue }, worker)
    }
}

impl AuditEmitter for HttpAuditEmitter {
    fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.queue.send(event) {
            error!(event_id = %e.0.id, "Audit worker is gone, event dropped");
        }
    }
}

pub struct AuditWorker {
    rx: mpsc::UnboundedReceiver<AuditEvent>,
    client: reqwest::Client,
    target_url: String,
    max_attempts: u32,
    backoff: Duration,
}

impl AuditWorker {
    /// Delivers events until every emitter has been dropped.
    #[instrument(skip(self), fields(target_url = %self.target_url))]
    pub async fn run(mut self) {
        info!("Starting audit worker");
        while let Some(event) = self.rx.recv().await {
            self.deliver(event).await;
        }
        info!("Audit queue closed, worker stopping");
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, outcome = %event.outcome))]
    async fn deliver(&self, event: AuditEvent) {
        for attempt in 1..=self.max_attempts {
            let result = self.client.post(&self.target_url).json(&event).send().await;

            let failure = match result {
                Ok(resp) if resp.status().is_success() => return,
                Ok(resp) => format!("HTTP {}", resp.status()),
                Err(e) => e.to_string(),
            };

            if attempt == self.max_attempts {
                error!(attempt, error = %failure, "Giving up on audit event");
            } else {
                warn!(attempt, error = %failure, "Audit delivery failed, retrying");
                sleep(self.backoff * attempt).await;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory recorder
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AuditEmitter for MemoryAuditLog {
    fn emit(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
