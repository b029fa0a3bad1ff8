use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a deal, the aggregate whose history is one event stream.
///
/// Wraps a UUID so deal ids cannot be mixed up with event or scenario ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an aggregate ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

/// Which side of the table an actor or participant negotiates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyType {
    BorrowerSide,
    LenderSide,
    ThirdParty,
}

impl PartyType {
    /// Returns the wire name of the party type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyType::BorrowerSide => "borrower_side",
            PartyType::LenderSide => "lender_side",
            PartyType::ThirdParty => "third_party",
        }
    }
}

impl std::fmt::Display for PartyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_id_new_creates_unique_ids() {
        let id1 = AggregateId::new();
        let id2 = AggregateId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn aggregate_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = AggregateId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn aggregate_id_is_a_bare_uuid_on_the_wire() {
        let id = AggregateId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }

    #[test]
    fn party_type_uses_snake_case_names() {
        let json = serde_json::to_string(&PartyType::BorrowerSide).unwrap();
        assert_eq!(json, "\"borrower_side\"");

        let parsed: PartyType = serde_json::from_str("\"lender_side\"").unwrap();
        assert_eq!(parsed, PartyType::LenderSide);
        assert_eq!(PartyType::ThirdParty.to_string(), "third_party");
    }
}
