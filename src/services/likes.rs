use std::sync::Arc;

use crate::{
    db::{Directory, Journal, LikeStore},
    error::AppResult,
    models::{EdgeOutcome, EventType, Film, FilmId, NewFeedEvent, Operation, UserId},
};

use super::{films_in_order, require_film, require_user};

/// Which users liked which films
#[derive(Clone)]
pub struct LikeGraph {
    directory: Arc<dyn Directory>,
    likes: Arc<dyn LikeStore>,
}

impl LikeGraph {
    pub fn new(directory: Arc<dyn Directory>, likes: Arc<dyn LikeStore>) -> Self {
        Self { directory, likes }
    }

    /// Records that the user likes the film.
    ///
    /// Liking twice is a no-op on the graph but is still journaled, so the
    /// feed shows every like action the user performed.
    #[tracing::instrument(skip_all, fields(%film_id, %user_id))]
    pub async fn add_like(&self, film_id: FilmId, user_id: UserId) -> AppResult<EdgeOutcome> {
        require_film(self.directory.as_ref(), film_id).await?;
        require_user(self.directory.as_ref(), user_id).await?;

        let event = NewFeedEvent::new(user_id, EventType::Like, Operation::Add, film_id);
        let outcome = self
            .likes
            .add_like(film_id, user_id, Journal::Always(event))
            .await?;

        tracing::info!(?outcome, "Like recorded");
        Ok(outcome)
    }

    /// Withdraws the user's like; a missing edge is not an error
    #[tracing::instrument(skip_all, fields(%film_id, %user_id))]
    pub async fn remove_like(&self, film_id: FilmId, user_id: UserId) -> AppResult<EdgeOutcome> {
        require_film(self.directory.as_ref(), film_id).await?;
        require_user(self.directory.as_ref(), user_id).await?;

        let event = NewFeedEvent::new(user_id, EventType::Like, Operation::Remove, film_id);
        let outcome = self
            .likes
            .remove_like(film_id, user_id, Journal::IfApplied(event))
            .await?;

        tracing::info!(?outcome, "Like removed");
        Ok(outcome)
    }

    pub async fn like_count(&self, film_id: FilmId) -> AppResult<i64> {
        self.likes.like_count(film_id).await
    }

    /// Films liked by both users, most liked overall first
    #[tracing::instrument(skip_all, fields(%user_id, %friend_id))]
    pub async fn common_films(&self, user_id: UserId, friend_id: UserId) -> AppResult<Vec<Film>> {
        require_user(self.directory.as_ref(), user_id).await?;
        require_user(self.directory.as_ref(), friend_id).await?;

        let ids = self.likes.common_films(user_id, friend_id).await?;
        tracing::debug!(count = ids.len(), "Common films found");

        films_in_order(self.directory.as_ref(), &ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FeedStore, MemoryStore, MockDirectory};
    use crate::error::AppError;
    use crate::services::fixtures::seeded_store;

    fn graph(store: &Arc<MemoryStore>) -> LikeGraph {
        LikeGraph::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_add_like_is_idempotent() {
        let store = Arc::new(seeded_store(2, 2).await);
        let likes = graph(&store);

        let first = likes.add_like(FilmId(1), UserId(1)).await.unwrap();
        let second = likes.add_like(FilmId(1), UserId(1)).await.unwrap();

        assert_eq!(first, EdgeOutcome::Applied);
        assert_eq!(second, EdgeOutcome::AlreadyApplied);
        assert_eq!(likes.like_count(FilmId(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_like_is_silent() {
        let store = Arc::new(seeded_store(1, 1).await);
        let likes = graph(&store);

        let outcome = likes.remove_like(FilmId(1), UserId(1)).await.unwrap();

        assert_eq!(outcome, EdgeOutcome::NotFound);
        assert_eq!(likes.like_count(FilmId(1)).await.unwrap(), 0);
        assert!(store.events_for(UserId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_like_then_unlike_journals_both() {
        let store = Arc::new(seeded_store(1, 1).await);
        let likes = graph(&store);

        likes.add_like(FilmId(1), UserId(1)).await.unwrap();
        likes.remove_like(FilmId(1), UserId(1)).await.unwrap();

        let ops: Vec<Operation> = store
            .events_for(UserId(1))
            .await
            .unwrap()
            .iter()
            .map(|event| event.operation())
            .collect();
        assert_eq!(ops, vec![Operation::Add, Operation::Remove]);
    }

    #[tokio::test]
    async fn test_unknown_film_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let mut directory = MockDirectory::new();
        directory.expect_find_film().returning(|_| Ok(None));
        directory.expect_find_user().never();

        let likes = LikeGraph::new(Arc::new(directory), store.clone());
        let err = likes.add_like(FilmId(42), UserId(1)).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("film")));
        assert_eq!(store.like_count(FilmId(42)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let store = Arc::new(seeded_store(1, 1).await);
        let likes = graph(&store);

        let err = likes.add_like(FilmId(1), UserId(99)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = likes.remove_like(FilmId(1), UserId(99)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_common_films_resolves_records() {
        let store = Arc::new(seeded_store(2, 3).await);
        let likes = graph(&store);

        for (film, user) in [(1, 1), (2, 1), (2, 2), (3, 2)] {
            likes.add_like(FilmId(film), UserId(user)).await.unwrap();
        }

        let common = likes.common_films(UserId(1), UserId(2)).await.unwrap();
        let ids: Vec<FilmId> = common.iter().map(|film| film.id).collect();
        assert_eq!(ids, vec![FilmId(2)]);
    }
}
