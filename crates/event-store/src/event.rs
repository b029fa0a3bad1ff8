use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{AggregateId, IdGenerator, PartyType};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::payload::{EventPayload, EventType};

/// Schema version written by this version of the engine.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Draws a fresh event ID from a generator.
    pub fn generate(ids: &dyn IdGenerator) -> Self {
        Self(ids.next_id())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Position of an event within its deal's log.
///
/// Sequences start at 1 for the first event; `0` stands for "before any
/// event" and is what an empty log reports as its latest sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(u64);

impl Sequence {
    /// Creates a sequence from a raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the sequence of an empty log (0).
    pub const fn initial() -> Self {
        Self(0)
    }

    /// Returns the sequence of the first event (1).
    pub const fn first() -> Self {
        Self(1)
    }

    /// Returns the next sequence.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw sequence value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Sequence> for u64 {
    fn from(sequence: Sequence) -> Self {
        sequence.0
    }
}

/// Who caused an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub party_type: PartyType,
    pub organization_id: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, party_type: PartyType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            party_type,
            organization_id: None,
        }
    }

    /// Sets the organization the actor belongs to.
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// The actor used for events raised by the platform itself.
    pub fn system() -> Self {
        Self::new("system", "System", PartyType::ThirdParty)
    }
}

/// An immutable fact in a deal's history.
///
/// On the wire an event is a flat JSON object: camelCase envelope fields at
/// the top level, a `type` name, and a `payload` object whose shape depends
/// on the type.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub aggregate_id: AggregateId,
    pub sequence: Sequence,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    /// Shared by every event raised while handling one request.
    pub correlation_id: Option<String>,
    /// The event that directly led to this one.
    pub causation_id: Option<EventId>,
    pub schema_version: u32,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub payload: EventPayload,
}

impl Event {
    /// Starts building an event for a deal at the given sequence.
    ///
    /// The id is always supplied by the caller, usually drawn from an
    /// injected [`IdGenerator`] via [`EventId::generate`].
    pub fn builder(
        id: EventId,
        aggregate_id: AggregateId,
        sequence: impl Into<Sequence>,
        payload: EventPayload,
    ) -> EventBuilder {
        EventBuilder {
            id,
            aggregate_id,
            sequence: sequence.into(),
            timestamp: None,
            actor: Actor::system(),
            correlation_id: None,
            causation_id: None,
            schema_version: CURRENT_SCHEMA_VERSION,
            metadata: BTreeMap::new(),
            payload,
        }
    }

    /// Returns the typed event type, or `None` for unrecognized events.
    pub fn event_type(&self) -> Option<EventType> {
        self.payload.event_type()
    }

    /// Returns the wire type name.
    pub fn type_name(&self) -> &str {
        self.payload.type_name()
    }

    /// Returns the term this event is scoped to, if any.
    pub fn term_id(&self) -> Option<&str> {
        self.payload.term_id()
    }
}

/// Builder for constructing events.
#[derive(Debug)]
pub struct EventBuilder {
    id: EventId,
    aggregate_id: AggregateId,
    sequence: Sequence,
    timestamp: Option<DateTime<Utc>>,
    actor: Actor,
    correlation_id: Option<String>,
    causation_id: Option<EventId>,
    schema_version: u32,
    metadata: BTreeMap<String, serde_json::Value>,
    payload: EventPayload,
}

impl EventBuilder {
    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the actor. Defaults to [`Actor::system`].
    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn causation_id(mut self, causation_id: EventId) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    pub fn schema_version(mut self, schema_version: u32) -> Self {
        self.schema_version = schema_version;
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the event.
    pub fn build(self) -> Event {
        Event {
            id: self.id,
            aggregate_id: self.aggregate_id,
            sequence: self.sequence,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            actor: self.actor,
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
            schema_version: self.schema_version,
            metadata: self.metadata,
            payload: self.payload,
        }
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Event", 14)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("type", self.type_name())?;
        s.serialize_field("aggregateId", &self.aggregate_id)?;
        s.serialize_field("sequence", &self.sequence)?;
        s.serialize_field("timestamp", &self.timestamp)?;
        s.serialize_field("actorId", &self.actor.id)?;
        s.serialize_field("actorName", &self.actor.name)?;
        s.serialize_field("actorPartyType", &self.actor.party_type)?;
        s.serialize_field("actorOrganizationId", &self.actor.organization_id)?;
        s.serialize_field("correlationId", &self.correlation_id)?;
        s.serialize_field("causationId", &self.causation_id)?;
        s.serialize_field("schemaVersion", &self.schema_version)?;
        s.serialize_field("metadata", &self.metadata)?;
        s.serialize_field("payload", &self.payload)?;
        s.end()
    }
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

/// Flat wire shape of an event, before the payload is decoded.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    id: EventId,
    #[serde(rename = "type")]
    event_type: String,
    aggregate_id: AggregateId,
    sequence: Sequence,
    timestamp: DateTime<Utc>,
    actor_id: String,
    actor_name: String,
    actor_party_type: PartyType,
    #[serde(default)]
    actor_organization_id: Option<String>,
    #[serde(default)]
    correlation_id: Option<String>,
    #[serde(default)]
    causation_id: Option<EventId>,
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    metadata: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    payload: serde_json::Value,
}

impl From<WireEvent> for Event {
    fn from(wire: WireEvent) -> Self {
        Event {
            id: wire.id,
            aggregate_id: wire.aggregate_id,
            sequence: wire.sequence,
            timestamp: wire.timestamp,
            actor: Actor {
                id: wire.actor_id,
                name: wire.actor_name,
                party_type: wire.actor_party_type,
                organization_id: wire.actor_organization_id,
            },
            correlation_id: wire.correlation_id,
            causation_id: wire.causation_id,
            schema_version: wire.schema_version,
            metadata: wire.metadata.unwrap_or_default(),
            payload: EventPayload::decode(&wire.event_type, wire.payload),
        }
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireEvent::deserialize(deserializer).map(Event::from)
    }
}
