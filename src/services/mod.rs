//! The social-aggregation engine.
//!
//! Each component owns one concern and reaches storage only through the
//! narrow traits in [`crate::db`]. Referenced users, films and reviews are
//! resolved through the [`Directory`] collaborator before anything is written.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    db::{Directory, SocialStore},
    error::{AppError, AppResult},
    models::{Film, FilmId, ReviewId, ReviewRef, User, UserId},
};

pub mod feed;
pub mod friends;
pub mod likes;
pub mod popularity;
pub mod recommendations;
pub mod usefulness;

pub use feed::FeedLog;
pub use friends::FriendGraph;
pub use likes::LikeGraph;
pub use popularity::PopularityRanker;
pub use recommendations::RecommendationEngine;
pub use usefulness::UsefulnessTally;

/// All engine components wired to one backing store
#[derive(Clone)]
pub struct Social {
    pub likes: LikeGraph,
    pub friends: FriendGraph,
    pub feed: FeedLog,
    pub popularity: PopularityRanker,
    pub recommendations: RecommendationEngine,
    pub usefulness: UsefulnessTally,
}

impl Social {
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: SocialStore + 'static,
    {
        Self {
            likes: LikeGraph::new(store.clone(), store.clone()),
            friends: FriendGraph::new(store.clone(), store.clone()),
            feed: FeedLog::new(store.clone(), store.clone()),
            popularity: PopularityRanker::new(store.clone()),
            recommendations: RecommendationEngine::new(store.clone(), store.clone(), store.clone()),
            usefulness: UsefulnessTally::new(store.clone(), store),
        }
    }
}

pub(crate) async fn require_user(directory: &dyn Directory, id: UserId) -> AppResult<User> {
    directory
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::user_not_found(id))
}

pub(crate) async fn require_film(directory: &dyn Directory, id: FilmId) -> AppResult<Film> {
    directory
        .find_film(id)
        .await?
        .ok_or_else(|| AppError::film_not_found(id))
}

pub(crate) async fn require_review(
    directory: &dyn Directory,
    id: ReviewId,
) -> AppResult<ReviewRef> {
    directory
        .find_review(id)
        .await?
        .ok_or_else(|| AppError::review_not_found(id))
}

/// Resolves film ids to records, keeping the order of `ids`
pub(crate) async fn films_in_order(
    directory: &dyn Directory,
    ids: &[FilmId],
) -> AppResult<Vec<Film>> {
    let mut by_id: HashMap<FilmId, Film> = directory
        .find_films(ids)
        .await?
        .into_iter()
        .map(|film| (film.id, film))
        .collect();

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;

    use crate::db::MemoryStore;
    use crate::models::{Film, FilmId, GenreId, ReviewId, ReviewRef, User, UserId};

    pub fn user(id: i64) -> User {
        User {
            id: UserId(id),
            email: format!("user{}@example.com", id),
            login: format!("user{}", id),
            name: None,
            birthday: None,
        }
    }

    pub fn film(id: i64, year: i32, genres: &[i64]) -> Film {
        Film {
            id: FilmId(id),
            name: format!("Film {}", id),
            description: None,
            release_date: NaiveDate::from_ymd_opt(year, 1, 1),
            duration: Some(100),
            genres: genres.iter().copied().map(GenreId).collect(),
        }
    }

    /// Users 1..=users and films 1..=films (all from 2000, genre 1)
    pub async fn seeded_store(users: i64, films: i64) -> MemoryStore {
        let store = MemoryStore::new();
        for id in 1..=users {
            store.insert_user(user(id)).await;
        }
        for id in 1..=films {
            store.insert_film(film(id, 2000, &[1])).await;
        }
        store
            .insert_review(ReviewRef {
                review_id: ReviewId(1),
                user_id: UserId(1),
                film_id: FilmId(1),
            })
            .await;
        store
    }
}
