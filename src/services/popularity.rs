use std::sync::Arc;

use crate::{
    db::RankingStore,
    error::{AppError, AppResult},
    models::{PopularityFilter, RankedFilm},
};

/// Number of films returned when the caller does not ask for a count
pub const DEFAULT_COUNT: i64 = 10;

/// Ranks films by how many users liked them
#[derive(Clone)]
pub struct PopularityRanker {
    ranking: Arc<dyn RankingStore>,
}

impl PopularityRanker {
    pub fn new(ranking: Arc<dyn RankingStore>) -> Self {
        Self { ranking }
    }

    /// The `count` most liked films matching `filter`.
    ///
    /// Films nobody liked still qualify and sort after every liked film.
    /// Equal like counts are ordered by ascending film id.
    #[tracing::instrument(skip(self))]
    pub async fn popular_films(
        &self,
        count: i64,
        filter: PopularityFilter,
    ) -> AppResult<Vec<RankedFilm>> {
        if count <= 0 {
            tracing::warn!("Rejected non-positive count");
            return Err(AppError::Validation(format!(
                "count must be positive, got {}",
                count
            )));
        }

        let films = self.ranking.popular_films(count, filter).await?;
        tracing::debug!(returned = films.len(), "Popular films ranked");
        Ok(films)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Journal, LikeStore, MemoryStore};
    use crate::models::{EventType, FilmId, GenreId, NewFeedEvent, Operation, UserId};
    use crate::services::fixtures::film;

    async fn store_with_likes(likes: &[(i64, i64)]) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_film(film(1, 1999, &[1])).await;
        store.insert_film(film(2, 2001, &[1, 2])).await;
        store.insert_film(film(3, 2001, &[2])).await;
        store.insert_film(film(4, 1999, &[2])).await;

        for &(film_id, user_id) in likes {
            let event =
                NewFeedEvent::new(UserId(user_id), EventType::Like, Operation::Add, film_id);
            store
                .add_like(FilmId(film_id), UserId(user_id), Journal::Always(event))
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    fn ids(films: &[RankedFilm]) -> Vec<FilmId> {
        films.iter().map(|ranked| ranked.film.id).collect()
    }

    #[tokio::test]
    async fn test_non_positive_count_is_rejected() {
        let ranker = PopularityRanker::new(store_with_likes(&[]).await);

        for count in [0, -3] {
            let err = ranker
                .popular_films(count, PopularityFilter::default())
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_ranking_includes_unliked_films_last() {
        let ranker = PopularityRanker::new(store_with_likes(&[(3, 1), (3, 2), (1, 1)]).await);

        let films = ranker
            .popular_films(10, PopularityFilter::default())
            .await
            .unwrap();

        assert_eq!(ids(&films), vec![FilmId(3), FilmId(1), FilmId(2), FilmId(4)]);
        let counts: Vec<i64> = films.iter().map(|ranked| ranked.like_count).collect();
        assert_eq!(counts, vec![2, 1, 0, 0]);
    }

    #[tokio::test]
    async fn test_count_caps_the_result() {
        let ranker = PopularityRanker::new(store_with_likes(&[(2, 1)]).await);

        let films = ranker
            .popular_films(2, PopularityFilter::default())
            .await
            .unwrap();
        assert_eq!(ids(&films), vec![FilmId(2), FilmId(1)]);
    }

    #[tokio::test]
    async fn test_genre_and_year_filters_combine() {
        let ranker = PopularityRanker::new(store_with_likes(&[(3, 1), (2, 1), (2, 2)]).await);

        let by_genre = PopularityFilter {
            genre_id: Some(GenreId(2)),
            year: None,
        };
        let by_year = PopularityFilter {
            genre_id: None,
            year: Some(1999),
        };
        let both = PopularityFilter {
            genre_id: Some(GenreId(2)),
            year: Some(2001),
        };

        let films = ranker.popular_films(10, by_genre).await.unwrap();
        assert_eq!(ids(&films), vec![FilmId(2), FilmId(3), FilmId(4)]);

        let films = ranker.popular_films(10, by_year).await.unwrap();
        assert_eq!(ids(&films), vec![FilmId(1), FilmId(4)]);

        let films = ranker.popular_films(10, both).await.unwrap();
        assert_eq!(ids(&films), vec![FilmId(2), FilmId(3)]);
    }
}
