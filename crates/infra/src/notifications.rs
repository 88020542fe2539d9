//! Publication of ledger events and their delivery to a notification sink.
//!
//! Mutations publish after their locks are released; a background worker drains
//! the bus and hands each envelope to the sink. Delivery is at-least-once and a
//! failing sink never affects the ledger.

use std::io;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use stockledger_core::TenantId;
use stockledger_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use stockledger_inventory::StockEvent;

/// Bus carrying every ledger event as a JSON envelope.
pub type LedgerBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

/// Publishes ledger events; failures are logged, never propagated.
#[derive(Debug, Clone)]
pub struct LedgerPublisher {
    bus: Arc<LedgerBus>,
}

impl LedgerPublisher {
    pub fn new(bus: Arc<LedgerBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<LedgerBus> {
        &self.bus
    }

    pub fn publish(&self, envelope: EventEnvelope<JsonValue>) {
        let event_type = envelope.event_type().to_string();
        if let Err(err) = self.bus.publish(envelope) {
            warn!(event_type, error = ?err, "failed to publish ledger event");
        }
    }

    /// Publish a movement/alert event on a single-event stream named by `stream_id`.
    pub fn publish_stock(&self, stream_id: Uuid, event: &StockEvent) {
        let stream_type = match event {
            StockEvent::MovementRecorded(_) => "inventory.movement",
            StockEvent::AlertRaised(_) => "inventory.alert",
        };
        match EventEnvelope::from_event(event.tenant_id(), stream_id, stream_type, 1, event) {
            Ok(envelope) => self.publish(envelope),
            Err(err) => warn!(stream_type, error = %err, "failed to encode ledger event"),
        }
    }
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Where ledger notifications end up (email, webhook, queue...).
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), NotificationError>;
}

impl<S> NotificationSink for Arc<S>
where
    S: NotificationSink + ?Sized,
{
    fn deliver(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), NotificationError> {
        (**self).deliver(envelope)
    }
}

/// Sink that writes each notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn deliver(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), NotificationError> {
        info!(
            company_id = %envelope.tenant_id(),
            event_type = envelope.event_type(),
            stream_id = %envelope.stream_id(),
            "ledger notification"
        );
        Ok(())
    }
}

/// Sink that keeps everything it receives, for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNotificationSink {
    delivered: Mutex<Vec<EventEnvelope<JsonValue>>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<EventEnvelope<JsonValue>> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn deliver(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), NotificationError> {
        self.delivered
            .lock()
            .map_err(|_| NotificationError("sink lock poisoned".to_string()))?
            .push(envelope.clone());
        Ok(())
    }
}

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Drains the ledger bus into a `NotificationSink`.
#[derive(Debug)]
pub struct NotificationWorker;

impl NotificationWorker {
    /// Spawn the worker thread. The subscription is taken before returning, so no
    /// event published afterwards is missed.
    ///
    /// - `tenant_id`: when provided, other companies' events are ignored
    pub fn spawn<S>(
        bus: &LedgerBus,
        sink: S,
        tenant_id: Option<TenantId>,
    ) -> io::Result<WorkerHandle>
    where
        S: NotificationSink + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();

        let join = thread::Builder::new()
            .name("ledger-notifications".to_string())
            .spawn(move || worker_loop(sub, shutdown_rx, tenant_id, &sink))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<S: NotificationSink>(
    sub: Subscription<EventEnvelope<JsonValue>>,
    shutdown_rx: mpsc::Receiver<()>,
    tenant_id: Option<TenantId>,
    sink: &S,
) {
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(envelope) => {
                if tenant_id.is_some_and(|t| envelope.tenant_id() != t) {
                    continue;
                }
                if let Err(err) = sink.deliver(&envelope) {
                    warn!(
                        event_type = envelope.event_type(),
                        error = %err,
                        "notification delivery failed"
                    );
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn envelope(tenant_id: TenantId) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            Uuid::now_v7(),
            "inventory.movement",
            1,
            "inventory.movement.recorded",
            Utc::now(),
            json!({}),
        )
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn worker_delivers_only_its_company() {
        let bus = Arc::new(LedgerBus::new());
        let sink = Arc::new(InMemoryNotificationSink::new());
        let tenant = TenantId::new();
        let handle = NotificationWorker::spawn(&bus, sink.clone(), Some(tenant)).unwrap();

        let publisher = LedgerPublisher::new(bus.clone());
        publisher.publish(envelope(TenantId::new()));
        publisher.publish(envelope(tenant));

        wait_for(|| !sink.delivered().is_empty());
        handle.shutdown();

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].tenant_id(), tenant);
    }
}
