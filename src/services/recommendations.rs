use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    db::{Directory, LikeStore, RankingStore},
    error::AppResult,
    models::{Film, FilmId, UserId},
};

use super::{films_in_order, require_user};

/// Nearest-neighbour collaborative filtering over the like graph
#[derive(Clone)]
pub struct RecommendationEngine {
    directory: Arc<dyn Directory>,
    likes: Arc<dyn LikeStore>,
    ranking: Arc<dyn RankingStore>,
}

impl RecommendationEngine {
    pub fn new(
        directory: Arc<dyn Directory>,
        likes: Arc<dyn LikeStore>,
        ranking: Arc<dyn RankingStore>,
    ) -> Self {
        Self {
            directory,
            likes,
            ranking,
        }
    }

    /// Films the closest neighbour liked that the user has not.
    ///
    /// The neighbour is the other user sharing the most liked films with
    /// the target; ties go to the lowest user id. Without any overlapping
    /// user the result is empty. Films come back in id order.
    #[tracing::instrument(skip_all, fields(%user_id))]
    pub async fn recommendations_for(&self, user_id: UserId) -> AppResult<Vec<Film>> {
        require_user(self.directory.as_ref(), user_id).await?;

        let Some(neighbor) = self.ranking.nearest_neighbor(user_id).await? else {
            tracing::debug!("No overlapping user, nothing to recommend");
            return Ok(Vec::new());
        };

        let seen: BTreeSet<FilmId> = self.likes.liked_films(user_id).await?.into_iter().collect();
        let candidates: Vec<FilmId> = self
            .likes
            .liked_films(neighbor.user_id)
            .await?
            .into_iter()
            .filter(|film_id| !seen.contains(film_id))
            .collect();

        tracing::info!(
            neighbor_id = %neighbor.user_id,
            overlap = neighbor.overlap,
            count = candidates.len(),
            "Recommendations computed"
        );
        films_in_order(self.directory.as_ref(), &candidates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Journal, MemoryStore, MockDirectory};
    use crate::error::AppError;
    use crate::models::{EventType, NewFeedEvent, Operation};
    use crate::services::fixtures::seeded_store;

    async fn like(store: &MemoryStore, user: i64, film: i64) {
        let event = NewFeedEvent::new(UserId(user), EventType::Like, Operation::Add, film);
        store
            .add_like(FilmId(film), UserId(user), Journal::Always(event))
            .await
            .unwrap();
    }

    fn engine(store: &Arc<MemoryStore>) -> RecommendationEngine {
        RecommendationEngine::new(store.clone(), store.clone(), store.clone())
    }

    fn ids(films: &[Film]) -> Vec<FilmId> {
        films.iter().map(|film| film.id).collect()
    }

    #[tokio::test]
    async fn test_recommends_neighbor_films_not_yet_liked() {
        let store = Arc::new(seeded_store(3, 5).await);
        for (user, film) in [(1, 1), (1, 2), (2, 1), (2, 2), (2, 3), (3, 1), (3, 4), (3, 5)] {
            like(&store, user, film).await;
        }

        let films = engine(&store).recommendations_for(UserId(1)).await.unwrap();
        assert_eq!(ids(&films), vec![FilmId(3)]);
    }

    #[tokio::test]
    async fn test_ties_go_to_lowest_user_id() {
        let store = Arc::new(seeded_store(3, 4).await);
        for (user, film) in [(3, 1), (3, 4), (1, 1), (2, 1), (2, 3)] {
            like(&store, user, film).await;
        }

        // users 1 and 2 both share one film with user 3
        let films = engine(&store).recommendations_for(UserId(3)).await.unwrap();
        assert!(films.is_empty());

        like(&store, 1, 2).await;
        let films = engine(&store).recommendations_for(UserId(3)).await.unwrap();
        assert_eq!(ids(&films), vec![FilmId(2)]);
    }

    #[tokio::test]
    async fn test_no_overlap_yields_nothing() {
        let store = Arc::new(seeded_store(2, 2).await);
        like(&store, 1, 1).await;
        like(&store, 2, 2).await;

        let films = engine(&store).recommendations_for(UserId(1)).await.unwrap();
        assert!(films.is_empty());
    }

    #[tokio::test]
    async fn test_result_never_contains_liked_films() {
        let store = Arc::new(seeded_store(2, 4).await);
        for (user, film) in [(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3), (2, 4)] {
            like(&store, user, film).await;
        }

        let films = engine(&store).recommendations_for(UserId(1)).await.unwrap();
        let liked = store.liked_films(UserId(1)).await.unwrap();
        assert!(films.iter().all(|film| !liked.contains(&film.id)));
        assert_eq!(ids(&films), vec![FilmId(4)]);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let mut directory = MockDirectory::new();
        directory.expect_find_user().returning(|_| Ok(None));
        let store = Arc::new(MemoryStore::new());

        let engine = RecommendationEngine::new(Arc::new(directory), store.clone(), store);
        let err = engine.recommendations_for(UserId(5)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
