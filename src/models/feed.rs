use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use super::{EventId, UserId};

/// Kind of social action a feed event describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Like,
    Friend,
    Review,
}

/// What happened to the entity the event refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Add,
    Remove,
    Update,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Like => "LIKE",
            EventType::Friend => "FRIEND",
            EventType::Review => "REVIEW",
        }
    }
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "ADD",
            Operation::Remove => "REMOVE",
            Operation::Update => "UPDATE",
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a persisted feed column holds an unknown tag
#[derive(Debug, thiserror::Error)]
#[error("unknown feed tag: {0}")]
pub struct UnknownFeedTag(pub String);

impl FromStr for EventType {
    type Err = UnknownFeedTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIKE" => Ok(EventType::Like),
            "FRIEND" => Ok(EventType::Friend),
            "REVIEW" => Ok(EventType::Review),
            other => Err(UnknownFeedTag(other.to_string())),
        }
    }
}

impl FromStr for Operation {
    type Err = UnknownFeedTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD" => Ok(Operation::Add),
            "REMOVE" => Ok(Operation::Remove),
            "UPDATE" => Ok(Operation::Update),
            other => Err(UnknownFeedTag(other.to_string())),
        }
    }
}

/// An event that has not been written to the feed yet.
///
/// Stores turn this into a [`FeedEvent`] by assigning the id and timestamp
/// at append time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewFeedEvent {
    pub user_id: UserId,
    pub event_type: EventType,
    pub operation: Operation,
    pub entity_id: i64,
}

impl NewFeedEvent {
    pub fn new(
        user_id: UserId,
        event_type: EventType,
        operation: Operation,
        entity_id: impl Into<i64>,
    ) -> Self {
        Self {
            user_id,
            event_type,
            operation,
            entity_id: entity_id.into(),
        }
    }

    /// Seals the event with its log position and wall-clock time
    pub fn into_event(self, event_id: EventId, timestamp: i64) -> FeedEvent {
        FeedEvent {
            event_id,
            user_id: self.user_id,
            entity_id: self.entity_id,
            event_type: self.event_type,
            operation: self.operation,
            timestamp,
        }
    }
}

/// Immutable feed journal entry.
///
/// Fields are private to the crate so nothing outside the feed log can forge
/// or rewrite an entry; readers get accessors only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    pub(crate) event_id: EventId,
    pub(crate) user_id: UserId,
    pub(crate) entity_id: i64,
    pub(crate) event_type: EventType,
    pub(crate) operation: Operation,
    /// Milliseconds since the Unix epoch
    pub(crate) timestamp: i64,
}

impl FeedEvent {
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn entity_id(&self) -> i64 {
        self.entity_id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip_through_storage_strings() {
        for event_type in [EventType::Like, EventType::Friend, EventType::Review] {
            assert_eq!(event_type.as_str().parse::<EventType>().unwrap(), event_type);
        }
        for operation in [Operation::Add, Operation::Remove, Operation::Update] {
            assert_eq!(operation.as_str().parse::<Operation>().unwrap(), operation);
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = "POKE".parse::<EventType>().unwrap_err();
        assert!(err.to_string().contains("POKE"));
        assert!("like".parse::<Operation>().is_err());
    }

    #[test]
    fn test_feed_event_json_shape() {
        let event = NewFeedEvent::new(UserId(1), EventType::Friend, Operation::Remove, 2)
            .into_event(EventId(10), 1_700_000_000_000);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventId"], 10);
        assert_eq!(json["userId"], 1);
        assert_eq!(json["entityId"], 2);
        assert_eq!(json["eventType"], "FRIEND");
        assert_eq!(json["operation"], "REMOVE");
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
    }
}
