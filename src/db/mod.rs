//! Storage seams of the aggregation engine.
//!
//! Each component talks to storage through one narrow trait. Both
//! [`PgStore`] and [`MemoryStore`] implement all of them, so a single store
//! value can be shared behind every trait object.

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{
        EdgeOutcome, FeedEvent, Film, FilmId, Neighbor, NewFeedEvent, PopularityFilter,
        RankedFilm, ReviewId, ReviewRef, User, UserId,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, run_migrations, PgStore};

/// Feed entry that must be written in the same unit of work as an edge mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Journal {
    /// Append whatever the mutation outcome was
    Always(NewFeedEvent),
    /// Append only when the mutation changed the store
    IfApplied(NewFeedEvent),
}

impl Journal {
    /// The event to append for the given outcome, if any
    pub fn event_for(&self, outcome: EdgeOutcome) -> Option<NewFeedEvent> {
        match self {
            Journal::Always(event) => Some(*event),
            Journal::IfApplied(event) if outcome.is_applied() => Some(*event),
            Journal::IfApplied(_) => None,
        }
    }
}

/// Lookups into the user, film and review records owned by the CRUD layer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>>;

    /// Resolves many users at once; unknown ids are skipped
    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<User>>;

    async fn find_film(&self, id: FilmId) -> AppResult<Option<Film>>;

    /// Resolves many films at once; unknown ids are skipped
    async fn find_films(&self, ids: &[FilmId]) -> AppResult<Vec<Film>>;

    async fn find_review(&self, id: ReviewId) -> AppResult<Option<ReviewRef>>;
}

/// Like edges between users and films
#[async_trait]
pub trait LikeStore: Send + Sync {
    /// Inserts the edge if missing and writes the journal entry atomically with it
    async fn add_like(
        &self,
        film_id: FilmId,
        user_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome>;

    /// Deletes the edge if present and writes the journal entry atomically with it
    async fn remove_like(
        &self,
        film_id: FilmId,
        user_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome>;

    async fn like_count(&self, film_id: FilmId) -> AppResult<i64>;

    /// Films the user liked, ascending by id
    async fn liked_films(&self, user_id: UserId) -> AppResult<Vec<FilmId>>;

    /// Films both users liked, most liked overall first, then ascending id
    async fn common_films(&self, user_id: UserId, friend_id: UserId) -> AppResult<Vec<FilmId>>;
}

/// Directed follow edges between users
#[async_trait]
pub trait FriendStore: Send + Sync {
    async fn follow(
        &self,
        user_id: UserId,
        friend_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome>;

    async fn unfollow(
        &self,
        user_id: UserId,
        friend_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome>;

    /// Users the given user follows, ascending by id
    async fn followees(&self, user_id: UserId) -> AppResult<Vec<UserId>>;

    /// Users followed by both, ascending by id
    async fn common_followees(
        &self,
        user_id: UserId,
        other_id: UserId,
    ) -> AppResult<Vec<UserId>>;
}

/// The append-only feed journal
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn append(&self, event: NewFeedEvent) -> AppResult<FeedEvent>;

    /// Every event of the user, oldest first
    async fn events_for(&self, user_id: UserId) -> AppResult<Vec<FeedEvent>>;
}

/// Aggregations over the like graph
#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Films ranked by like count, descending, ties by ascending id
    async fn popular_films(
        &self,
        limit: i64,
        filter: PopularityFilter,
    ) -> AppResult<Vec<RankedFilm>>;

    /// The other user sharing the most liked films, see [`Neighbor::closest`]
    async fn nearest_neighbor(&self, user_id: UserId) -> AppResult<Option<Neighbor>>;
}

/// Usefulness votes on reviews
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Inserts or replaces the user's vote on the review
    async fn upsert_vote(
        &self,
        review_id: ReviewId,
        user_id: UserId,
        is_like: bool,
    ) -> AppResult<EdgeOutcome>;

    async fn delete_vote(&self, review_id: ReviewId, user_id: UserId) -> AppResult<EdgeOutcome>;

    /// `(likes, dislikes)` for the review
    async fn tally(&self, review_id: ReviewId) -> AppResult<(i64, i64)>;
}

/// Everything the engine needs from a single backing store
pub trait SocialStore:
    Directory + LikeStore + FriendStore + FeedStore + RankingStore + VoteStore
{
}

impl<T> SocialStore for T where
    T: Directory + LikeStore + FriendStore + FeedStore + RankingStore + VoteStore
{
}
