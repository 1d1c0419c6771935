use std::sync::Arc;

use crate::{
    db::{Directory, FeedStore},
    error::AppResult,
    models::{EventType, FeedEvent, NewFeedEvent, Operation, UserId},
};

use super::require_user;

/// Per-user activity journal.
///
/// Only appends and reads are exposed. Graph components write their entries
/// through the store together with the edge change; `record` is the entry
/// point for collaborators such as the review service.
#[derive(Clone)]
pub struct FeedLog {
    directory: Arc<dyn Directory>,
    feed: Arc<dyn FeedStore>,
}

impl FeedLog {
    pub fn new(directory: Arc<dyn Directory>, feed: Arc<dyn FeedStore>) -> Self {
        Self { directory, feed }
    }

    #[tracing::instrument(skip_all, fields(%user_id, %event_type, %operation))]
    pub async fn record(
        &self,
        user_id: UserId,
        event_type: EventType,
        operation: Operation,
        entity_id: impl Into<i64>,
    ) -> AppResult<FeedEvent> {
        let event = self
            .feed
            .append(NewFeedEvent::new(user_id, event_type, operation, entity_id))
            .await?;

        tracing::info!(
            event_id = %event.event_id(),
            entity_id = event.entity_id(),
            "Feed event recorded"
        );
        Ok(event)
    }

    /// Every event of the user, oldest first
    #[tracing::instrument(skip_all, fields(%user_id))]
    pub async fn feed_for(&self, user_id: UserId) -> AppResult<Vec<FeedEvent>> {
        require_user(self.directory.as_ref(), user_id).await?;

        let events = self.feed.events_for(user_id).await?;
        tracing::debug!(count = events.len(), "Feed loaded");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::AppError;
    use crate::models::{FilmId, ReviewId};
    use crate::services::fixtures::seeded_store;

    #[tokio::test]
    async fn test_record_assigns_increasing_ids() {
        let store = Arc::new(seeded_store(1, 0).await);
        let feed = FeedLog::new(store.clone(), store.clone());

        let first = feed
            .record(UserId(1), EventType::Review, Operation::Add, ReviewId(4))
            .await
            .unwrap();
        let second = feed
            .record(UserId(1), EventType::Review, Operation::Update, ReviewId(4))
            .await
            .unwrap();

        assert!(first.event_id() < second.event_id());
        assert!(first.timestamp() <= second.timestamp());
        assert!(first.timestamp() > 0);
    }

    #[tokio::test]
    async fn test_feed_is_per_user_and_ordered() {
        let store = Arc::new(seeded_store(2, 0).await);
        let feed = FeedLog::new(store.clone(), store.clone());

        feed.record(UserId(1), EventType::Like, Operation::Add, FilmId(1))
            .await
            .unwrap();
        feed.record(UserId(2), EventType::Like, Operation::Add, FilmId(2))
            .await
            .unwrap();
        feed.record(UserId(1), EventType::Like, Operation::Remove, FilmId(1))
            .await
            .unwrap();

        let events = feed.feed_for(UserId(1)).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.user_id() == UserId(1)));
        assert_eq!(events[0].operation(), Operation::Add);
        assert_eq!(events[1].operation(), Operation::Remove);
    }

    #[tokio::test]
    async fn test_earlier_reads_are_prefixes_of_later_reads() {
        let store = Arc::new(seeded_store(1, 0).await);
        let feed = FeedLog::new(store.clone(), store.clone());

        feed.record(UserId(1), EventType::Friend, Operation::Add, UserId(2))
            .await
            .unwrap();
        let before = feed.feed_for(UserId(1)).await.unwrap();

        feed.record(UserId(1), EventType::Friend, Operation::Remove, UserId(2))
            .await
            .unwrap();
        let after = feed.feed_for(UserId(1)).await.unwrap();

        assert_eq!(after[..before.len()], before[..]);
    }

    #[tokio::test]
    async fn test_feed_for_unknown_user_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let feed = FeedLog::new(store.clone(), store);

        let err = feed.feed_for(UserId(1)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
