use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockledger_core::TenantId;

use crate::Event;

/// Envelope for an event, containing company + stream metadata.
///
/// This is the unit published on the bus and handed to notification sinks.
///
/// Notes:
/// - **Multi-tenancy** is enforced here via `tenant_id` (the company).
/// - `stream_id` identifies what the event is about (a transfer, movement or alert);
///   `stream_type` names the kind of stream (e.g. "inventory.transfer").
/// - `sequence_number` is monotonically increasing per stream. Streams that only ever
///   hold one event (movements, alerts) use 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,

    stream_id: Uuid,
    stream_type: String,

    /// Monotonically increasing position in the stream.
    sequence_number: u64,

    event_type: String,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        stream_id: Uuid,
        stream_type: impl Into<String>,
        sequence_number: u64,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            stream_id,
            stream_type: stream_type.into(),
            sequence_number,
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<JsonValue> {
    /// Wrap a typed event, serializing its payload to JSON.
    pub fn from_event<T>(
        tenant_id: TenantId,
        stream_id: Uuid,
        stream_type: impl Into<String>,
        sequence_number: u64,
        event: &T,
    ) -> Result<Self, serde_json::Error>
    where
        T: Event + Serialize,
    {
        let payload = serde_json::to_value(event)?;
        Ok(Self::new(
            Uuid::now_v7(),
            tenant_id,
            stream_id,
            stream_type,
            sequence_number,
            event.event_type(),
            event.occurred_at(),
            payload,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Counted {
        at: DateTime<Utc>,
        quantity: u64,
    }

    impl Event for Counted {
        fn event_type(&self) -> &'static str {
            "inventory.test.counted"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn from_event_captures_metadata_and_payload() {
        let tenant = TenantId::new();
        let stream = Uuid::now_v7();
        let at = Utc::now();
        let env = EventEnvelope::from_event(
            tenant,
            stream,
            "inventory.test",
            1,
            &Counted { at, quantity: 7 },
        )
        .unwrap();

        assert_eq!(env.tenant_id(), tenant);
        assert_eq!(env.stream_id(), stream);
        assert_eq!(env.event_type(), "inventory.test.counted");
        assert_eq!(env.occurred_at(), at);
        assert_eq!(env.payload()["quantity"], 7);
    }
}
