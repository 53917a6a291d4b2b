//! Multi-stream unit of work.
//!
//! Loads aggregates while remembering the version each stream was read at,
//! stages the events decided by commands, and commits every touched stream in
//! one atomic append. Dropping a unit of work without committing discards
//! everything it staged.

use std::ops::Deref;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use shopledger_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use shopledger_events::{EventBus, EventEnvelope, execute};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent, StreamAppend, UncommittedEvent};

/// An aggregate loaded inside a unit of work.
#[derive(Debug, Clone)]
pub struct Tracked<A> {
    aggregate: A,
    aggregate_id: AggregateId,
    aggregate_type: &'static str,
    /// Stream version at load time; the commit expects exactly this version.
    loaded_version: u64,
}

impl<A> Tracked<A> {
    pub fn into_inner(self) -> A {
        self.aggregate
    }
}

impl<A> Deref for Tracked<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.aggregate
    }
}

pub struct UnitOfWork<'d, S, B> {
    dispatcher: &'d CommandDispatcher<S, B>,
    tenant_id: TenantId,
    staged: Vec<(AggregateId, StreamAppend)>,
}

impl<'d, S, B> UnitOfWork<'d, S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub(crate) fn new(dispatcher: &'d CommandDispatcher<S, B>, tenant_id: TenantId) -> Self {
        Self {
            dispatcher,
            tenant_id,
            staged: Vec::new(),
        }
    }

    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        empty: A,
    ) -> Result<Tracked<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let (aggregate, loaded_version) = self.dispatcher.load(self.tenant_id, aggregate_id, empty)?;
        Ok(Tracked {
            aggregate,
            aggregate_id,
            aggregate_type,
            loaded_version,
        })
    }

    /// Run `command` against `tracked` and stage the resulting events.
    ///
    /// On a domain error neither the aggregate nor the staged batch changes.
    pub fn execute<A>(
        &mut self,
        tracked: &mut Tracked<A>,
        command: &A::Command,
    ) -> Result<Vec<A::Event>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: shopledger_events::Event + Serialize,
    {
        let events = execute(&mut tracked.aggregate, command)?;
        if events.is_empty() {
            return Ok(events);
        }

        let uncommitted = events
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    self.tenant_id,
                    tracked.aggregate_id,
                    tracked.aggregate_type,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        match self
            .staged
            .iter_mut()
            .find(|(id, _)| *id == tracked.aggregate_id)
        {
            Some((_, append)) => append.events.extend(uncommitted),
            None => self.staged.push((
                tracked.aggregate_id,
                StreamAppend::new(uncommitted, ExpectedVersion::Exact(tracked.loaded_version)),
            )),
        }

        Ok(events)
    }

    /// Append every staged stream atomically, then publish.
    pub fn commit(self) -> Result<Vec<StoredEvent>, DispatchError> {
        if self.staged.is_empty() {
            return Ok(vec![]);
        }
        let batch = self.staged.into_iter().map(|(_, append)| append).collect();
        self.dispatcher.commit_batch(batch)
    }
}
