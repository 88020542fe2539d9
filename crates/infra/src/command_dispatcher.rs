//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the stream (company-scoped) and check it is well-formed
//!   ↓
//! 2. Rehydrate the aggregate
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append with an exact expected version
//!   ↓
//! 5. Publish the committed events on the ledger bus
//! ```
//!
//! Publication happens after the append and its failures are only logged, so
//! delivery is at-least-once from the store's point of view.

use serde::Serialize;
use serde::de::DeserializeOwned;

use stockledger_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use stockledger_events::Event;

use crate::error::{EngineError, EngineResult};
use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
use crate::notifications::LedgerPublisher;

/// Outcome of a dispatched command: the aggregate after the new events were applied,
/// plus the events as committed.
#[derive(Debug)]
pub struct Dispatched<A> {
    pub aggregate: A,
    pub committed: Vec<StoredEvent>,
}

#[derive(Debug)]
pub struct CommandDispatcher<S> {
    store: S,
    publisher: LedgerPublisher,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S, publisher: LedgerPublisher) -> Self {
        Self { store, publisher }
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// Rehydrate an aggregate from its stream. A missing stream (or one that only
    /// exists under another company) yields the factory's empty aggregate.
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> EngineResult<A>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Run `command` against the current state of `aggregate_id`.
    ///
    /// The append expects exactly the version that was loaded; a concurrent writer
    /// surfaces as a retryable concurrency error and nothing is published.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> EngineResult<Dispatched<A>>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(Dispatched {
                aggregate,
                committed: vec![],
            });
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(tenant_id, aggregate_id, aggregate_type, ev))
            .collect::<Result<Vec<_>, _>>()?;
        let committed = self.store.append(uncommitted, expected)?;

        for ev in &decided {
            aggregate.apply(ev);
        }
        for stored in &committed {
            self.publisher.publish(stored.to_envelope());
        }

        Ok(Dispatched {
            aggregate,
            committed,
        })
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> EngineResult<()> {
    // A misbehaving backend must not leak another company's events into an aggregate.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id || e.aggregate_id != aggregate_id {
            return Err(EventStoreError::TenantIsolation(format!(
                "loaded stream contains a foreign event at index {idx}"
            ))
            .into());
        }
        if e.sequence_number <= last {
            return Err(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))
            .into());
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> EngineResult<()>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| EngineError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
