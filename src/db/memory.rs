use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Directory, FeedStore, FriendStore, Journal, LikeStore, RankingStore, VoteStore};
use crate::{
    error::AppResult,
    models::{
        EdgeOutcome, EventId, FeedEvent, Film, FilmId, Neighbor, NewFeedEvent, PopularityFilter,
        RankedFilm, ReviewId, ReviewRef, User, UserId,
    },
};

/// Social graph held in process memory.
///
/// One lock guards the edge sets and the feed together, so an edge mutation
/// and its journal entry are applied in a single critical section. The store
/// also carries a seedable directory of users, films and reviews.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: BTreeMap<UserId, User>,
    films: BTreeMap<FilmId, Film>,
    reviews: BTreeMap<ReviewId, ReviewRef>,
    /// film -> users who liked it
    likers: BTreeMap<FilmId, BTreeSet<UserId>>,
    /// user -> films they liked
    liked: BTreeMap<UserId, BTreeSet<FilmId>>,
    /// follower -> followees
    follows: BTreeMap<UserId, BTreeSet<UserId>>,
    votes: BTreeMap<(ReviewId, UserId), bool>,
    feed: Vec<FeedEvent>,
    last_event_id: i64,
    last_timestamp: i64,
}

impl MemoryStoreInner {
    fn append(&mut self, event: NewFeedEvent) -> FeedEvent {
        self.last_event_id += 1;
        // Wall clocks can step backwards; the journal must not.
        self.last_timestamp = Utc::now().timestamp_millis().max(self.last_timestamp);

        let event = event.into_event(EventId(self.last_event_id), self.last_timestamp);
        self.feed.push(event.clone());
        event
    }

    fn journal(&mut self, journal: Journal, outcome: EdgeOutcome) {
        if let Some(event) = journal.event_for(outcome) {
            self.append(event);
        }
    }

    fn like_count(&self, film_id: FilmId) -> i64 {
        self.likers.get(&film_id).map_or(0, |users| users.len() as i64)
    }
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a user record
    pub async fn insert_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id, user);
    }

    /// Registers or replaces a film record
    pub async fn insert_film(&self, mut film: Film) {
        film.genres.sort();
        film.genres.dedup();
        self.inner.write().await.films.insert(film.id, film);
    }

    /// Registers or replaces a review reference
    pub async fn insert_review(&self, review: ReviewRef) {
        self.inner
            .write()
            .await
            .reviews
            .insert(review.review_id, review);
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<User>> {
        let inner = self.inner.read().await;
        let wanted: BTreeSet<UserId> = ids.iter().copied().collect();
        Ok(wanted
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }

    async fn find_film(&self, id: FilmId) -> AppResult<Option<Film>> {
        Ok(self.inner.read().await.films.get(&id).cloned())
    }

    async fn find_films(&self, ids: &[FilmId]) -> AppResult<Vec<Film>> {
        let inner = self.inner.read().await;
        let wanted: BTreeSet<FilmId> = ids.iter().copied().collect();
        Ok(wanted
            .iter()
            .filter_map(|id| inner.films.get(id).cloned())
            .collect())
    }

    async fn find_review(&self, id: ReviewId) -> AppResult<Option<ReviewRef>> {
        Ok(self.inner.read().await.reviews.get(&id).copied())
    }
}

#[async_trait]
impl LikeStore for MemoryStore {
    async fn add_like(
        &self,
        film_id: FilmId,
        user_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome> {
        let mut inner = self.inner.write().await;

        let inserted = inner.likers.entry(film_id).or_default().insert(user_id);
        inner.liked.entry(user_id).or_default().insert(film_id);

        let outcome = if inserted {
            EdgeOutcome::Applied
        } else {
            EdgeOutcome::AlreadyApplied
        };
        inner.journal(journal, outcome);
        Ok(outcome)
    }

    async fn remove_like(
        &self,
        film_id: FilmId,
        user_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome> {
        let mut inner = self.inner.write().await;

        let removed = inner
            .likers
            .get_mut(&film_id)
            .map_or(false, |users| users.remove(&user_id));
        if let Some(films) = inner.liked.get_mut(&user_id) {
            films.remove(&film_id);
        }

        let outcome = if removed {
            EdgeOutcome::Applied
        } else {
            EdgeOutcome::NotFound
        };
        inner.journal(journal, outcome);
        Ok(outcome)
    }

    async fn like_count(&self, film_id: FilmId) -> AppResult<i64> {
        Ok(self.inner.read().await.like_count(film_id))
    }

    async fn liked_films(&self, user_id: UserId) -> AppResult<Vec<FilmId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .liked
            .get(&user_id)
            .map(|films| films.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn common_films(&self, user_id: UserId, friend_id: UserId) -> AppResult<Vec<FilmId>> {
        let inner = self.inner.read().await;
        let (Some(mine), Some(theirs)) = (inner.liked.get(&user_id), inner.liked.get(&friend_id))
        else {
            return Ok(Vec::new());
        };

        let mut common: Vec<FilmId> = mine.intersection(theirs).copied().collect();
        // Ascending ids from the set survive the stable sort as the tie-break.
        common.sort_by_key(|film_id| std::cmp::Reverse(inner.like_count(*film_id)));
        Ok(common)
    }
}

#[async_trait]
impl FriendStore for MemoryStore {
    async fn follow(
        &self,
        user_id: UserId,
        friend_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome> {
        let mut inner = self.inner.write().await;

        let outcome = if inner.follows.entry(user_id).or_default().insert(friend_id) {
            EdgeOutcome::Applied
        } else {
            EdgeOutcome::AlreadyApplied
        };
        inner.journal(journal, outcome);
        Ok(outcome)
    }

    async fn unfollow(
        &self,
        user_id: UserId,
        friend_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome> {
        let mut inner = self.inner.write().await;

        let removed = inner
            .follows
            .get_mut(&user_id)
            .map_or(false, |followees| followees.remove(&friend_id));

        let outcome = if removed {
            EdgeOutcome::Applied
        } else {
            EdgeOutcome::NotFound
        };
        inner.journal(journal, outcome);
        Ok(outcome)
    }

    async fn followees(&self, user_id: UserId) -> AppResult<Vec<UserId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .follows
            .get(&user_id)
            .map(|followees| followees.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn common_followees(
        &self,
        user_id: UserId,
        other_id: UserId,
    ) -> AppResult<Vec<UserId>> {
        let inner = self.inner.read().await;
        match (inner.follows.get(&user_id), inner.follows.get(&other_id)) {
            (Some(a), Some(b)) => Ok(a.intersection(b).copied().collect()),
            _ => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn append(&self, event: NewFeedEvent) -> AppResult<FeedEvent> {
        Ok(self.inner.write().await.append(event))
    }

    async fn events_for(&self, user_id: UserId) -> AppResult<Vec<FeedEvent>> {
        let inner = self.inner.read().await;
        let mut events: Vec<FeedEvent> = inner
            .feed
            .iter()
            .filter(|event| event.user_id == user_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.timestamp, event.event_id));
        Ok(events)
    }
}

#[async_trait]
impl RankingStore for MemoryStore {
    async fn popular_films(
        &self,
        limit: i64,
        filter: PopularityFilter,
    ) -> AppResult<Vec<RankedFilm>> {
        let inner = self.inner.read().await;

        let mut ranked: Vec<RankedFilm> = inner
            .films
            .values()
            .filter(|film| filter.matches(film))
            .map(|film| RankedFilm {
                film: film.clone(),
                like_count: inner.like_count(film.id),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.like_count
                .cmp(&a.like_count)
                .then(a.film.id.cmp(&b.film.id))
        });
        ranked.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(ranked)
    }

    async fn nearest_neighbor(&self, user_id: UserId) -> AppResult<Option<Neighbor>> {
        let inner = self.inner.read().await;
        let Some(mine) = inner.liked.get(&user_id) else {
            return Ok(None);
        };

        let candidates = inner
            .liked
            .iter()
            .filter(|(other, _)| **other != user_id)
            .map(|(other, films)| Neighbor {
                user_id: *other,
                overlap: films.intersection(mine).count() as i64,
            });

        Ok(Neighbor::closest(candidates))
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn upsert_vote(
        &self,
        review_id: ReviewId,
        user_id: UserId,
        is_like: bool,
    ) -> AppResult<EdgeOutcome> {
        let mut inner = self.inner.write().await;
        let previous = inner.votes.insert((review_id, user_id), is_like);

        Ok(match previous {
            Some(old) if old == is_like => EdgeOutcome::AlreadyApplied,
            _ => EdgeOutcome::Applied,
        })
    }

    async fn delete_vote(&self, review_id: ReviewId, user_id: UserId) -> AppResult<EdgeOutcome> {
        let mut inner = self.inner.write().await;

        Ok(match inner.votes.remove(&(review_id, user_id)) {
            Some(_) => EdgeOutcome::Applied,
            None => EdgeOutcome::NotFound,
        })
    }

    async fn tally(&self, review_id: ReviewId) -> AppResult<(i64, i64)> {
        let inner = self.inner.read().await;
        let (likes, dislikes) = inner
            .votes
            .range((review_id, UserId(i64::MIN))..=(review_id, UserId(i64::MAX)))
            .fold((0, 0), |(likes, dislikes), (_, is_like)| {
                if *is_like {
                    (likes + 1, dislikes)
                } else {
                    (likes, dislikes + 1)
                }
            });
        Ok((likes, dislikes))
    }
}
