use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgConnection, PgPool};
use std::collections::HashMap;

use super::{Directory, FeedStore, FriendStore, Journal, LikeStore, RankingStore, VoteStore};
use crate::{
    error::AppResult,
    models::{
        EdgeOutcome, EventId, FeedEvent, Film, FilmId, GenreId, Neighbor, NewFeedEvent,
        PopularityFilter, RankedFilm, ReviewId, ReviewRef, User, UserId,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    email: String,
    login: String,
    name: Option<String>,
    birthday: Option<NaiveDate>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId(row.id),
            email: row.email,
            login: row.login,
            name: row.name,
            birthday: row.birthday,
        }
    }
}

#[derive(FromRow)]
struct FilmRow {
    id: i64,
    name: String,
    description: Option<String>,
    release_date: Option<NaiveDate>,
    duration: Option<i32>,
}

impl FilmRow {
    fn into_film(self, genres: Vec<GenreId>) -> Film {
        Film {
            id: FilmId(self.id),
            name: self.name,
            description: self.description,
            release_date: self.release_date,
            duration: self.duration,
            genres,
        }
    }
}

#[derive(FromRow)]
struct RankedFilmRow {
    #[sqlx(flatten)]
    film: FilmRow,
    like_count: i64,
}

#[derive(FromRow)]
struct FeedRow {
    id: i64,
    entity_id: i64,
    user_id: i64,
    time_stamp: i64,
    event_type: String,
    operation: String,
}

impl TryFrom<FeedRow> for FeedEvent {
    type Error = crate::models::UnknownFeedTag;

    fn try_from(row: FeedRow) -> Result<Self, Self::Error> {
        Ok(FeedEvent {
            event_id: EventId(row.id),
            user_id: UserId(row.user_id),
            entity_id: row.entity_id,
            event_type: row.event_type.parse()?,
            operation: row.operation.parse()?,
            timestamp: row.time_stamp,
        })
    }
}

const FILM_COLUMNS: &str = "f.id, f.name, f.description, f.release_date, f.duration";

/// Social graph persisted in PostgreSQL.
///
/// Every edge mutation runs in one transaction together with its feed
/// append, so the journal never disagrees with the graph after a crash.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads genre tags for the given films, keyed by film id
    async fn genres_for(&self, film_ids: &[i64]) -> AppResult<HashMap<i64, Vec<GenreId>>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT film_id, genre_id FROM film_genre WHERE film_id = ANY($1) ORDER BY genre_id",
        )
        .bind(film_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut genres: HashMap<i64, Vec<GenreId>> = HashMap::new();
        for (film_id, genre_id) in rows {
            genres.entry(film_id).or_default().push(GenreId(genre_id));
        }
        Ok(genres)
    }

    async fn with_genres(&self, rows: Vec<FilmRow>) -> AppResult<Vec<Film>> {
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut genres = self.genres_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let tags = genres.remove(&row.id).unwrap_or_default();
                row.into_film(tags)
            })
            .collect())
    }

    /// Runs one edge mutation and its journal entry as a single transaction
    async fn mutate_edge(
        &self,
        sql: &str,
        left: i64,
        right: i64,
        journal: Journal,
        absent: EdgeOutcome,
    ) -> AppResult<EdgeOutcome> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(sql)
            .bind(left)
            .bind(right)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let outcome = if rows > 0 { EdgeOutcome::Applied } else { absent };

        if let Some(event) = journal.event_for(outcome) {
            append_event(&mut *tx, event).await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

/// Appends a feed row on an existing connection or transaction.
///
/// The stored timestamp never falls behind the user's latest entry, so a
/// wall clock stepping back cannot reorder the feed.
async fn append_event(conn: &mut PgConnection, event: NewFeedEvent) -> AppResult<FeedEvent> {
    let (id, timestamp): (i64, i64) = sqlx::query_as(
        r#"
        INSERT INTO feed (entity_id, user_id, time_stamp, event_type, operation)
        SELECT $1, $2, GREATEST($3, COALESCE(MAX(time_stamp), 0)), $4, $5
        FROM feed
        WHERE user_id = $2
        RETURNING id, time_stamp
        "#,
    )
    .bind(event.entity_id)
    .bind(event.user_id.0)
    .bind(Utc::now().timestamp_millis())
    .bind(event.event_type.as_str())
    .bind(event.operation.as_str())
    .fetch_one(conn)
    .await?;

    tracing::debug!(
        event_id = id,
        user_id = %event.user_id,
        event_type = %event.event_type,
        operation = %event.operation,
        "Feed event appended"
    );

    Ok(event.into_event(EventId(id), timestamp))
}

#[async_trait]
impl Directory for PgStore {
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, email, login, name, birthday FROM users WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<User>> {
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, email, login, name, birthday FROM users WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_film(&self, id: FilmId) -> AppResult<Option<Film>> {
        Ok(self.find_films(&[id]).await?.into_iter().next())
    }

    async fn find_films(&self, ids: &[FilmId]) -> AppResult<Vec<Film>> {
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let sql = format!("SELECT {FILM_COLUMNS} FROM films f WHERE f.id = ANY($1) ORDER BY f.id");
        let rows: Vec<FilmRow> = sqlx::query_as(&sql).bind(ids).fetch_all(&self.pool).await?;
        self.with_genres(rows).await
    }

    async fn find_review(&self, id: ReviewId) -> AppResult<Option<ReviewRef>> {
        let row: Option<(i64, i64, i64)> =
            sqlx::query_as("SELECT id, user_id, film_id FROM reviews WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(review_id, user_id, film_id)| ReviewRef {
            review_id: ReviewId(review_id),
            user_id: UserId(user_id),
            film_id: FilmId(film_id),
        }))
    }
}

#[async_trait]
impl LikeStore for PgStore {
    async fn add_like(
        &self,
        film_id: FilmId,
        user_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome> {
        self.mutate_edge(
            "INSERT INTO film_like (user_id, film_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            user_id.0,
            film_id.0,
            journal,
            EdgeOutcome::AlreadyApplied,
        )
        .await
    }

    async fn remove_like(
        &self,
        film_id: FilmId,
        user_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome> {
        self.mutate_edge(
            "DELETE FROM film_like WHERE user_id = $1 AND film_id = $2",
            user_id.0,
            film_id.0,
            journal,
            EdgeOutcome::NotFound,
        )
        .await
    }

    async fn like_count(&self, film_id: FilmId) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM film_like WHERE film_id = $1")
            .bind(film_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn liked_films(&self, user_id: UserId) -> AppResult<Vec<FilmId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT film_id FROM film_like WHERE user_id = $1 ORDER BY film_id")
                .bind(user_id.0)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().map(FilmId).collect())
    }

    async fn common_films(&self, user_id: UserId, friend_id: UserId) -> AppResult<Vec<FilmId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT mine.film_id
            FROM film_like AS mine
            JOIN film_like AS theirs ON theirs.film_id = mine.film_id AND theirs.user_id = $2
            JOIN (
                SELECT film_id, COUNT(*) AS like_count FROM film_like GROUP BY film_id
            ) AS totals ON totals.film_id = mine.film_id
            WHERE mine.user_id = $1
            ORDER BY totals.like_count DESC, mine.film_id ASC
            "#,
        )
        .bind(user_id.0)
        .bind(friend_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(FilmId).collect())
    }
}

#[async_trait]
impl FriendStore for PgStore {
    async fn follow(
        &self,
        user_id: UserId,
        friend_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome> {
        self.mutate_edge(
            "INSERT INTO friendship (user1_id, user2_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            user_id.0,
            friend_id.0,
            journal,
            EdgeOutcome::AlreadyApplied,
        )
        .await
    }

    async fn unfollow(
        &self,
        user_id: UserId,
        friend_id: UserId,
        journal: Journal,
    ) -> AppResult<EdgeOutcome> {
        self.mutate_edge(
            "DELETE FROM friendship WHERE user1_id = $1 AND user2_id = $2",
            user_id.0,
            friend_id.0,
            journal,
            EdgeOutcome::NotFound,
        )
        .await
    }

    async fn followees(&self, user_id: UserId) -> AppResult<Vec<UserId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT user2_id FROM friendship WHERE user1_id = $1 ORDER BY user2_id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(UserId).collect())
    }

    async fn common_followees(
        &self,
        user_id: UserId,
        other_id: UserId,
    ) -> AppResult<Vec<UserId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT a.user2_id
            FROM friendship AS a
            JOIN friendship AS b ON b.user2_id = a.user2_id AND b.user1_id = $2
            WHERE a.user1_id = $1
            ORDER BY a.user2_id
            "#,
        )
        .bind(user_id.0)
        .bind(other_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(UserId).collect())
    }
}

#[async_trait]
impl FeedStore for PgStore {
    async fn append(&self, event: NewFeedEvent) -> AppResult<FeedEvent> {
        let mut conn = self.pool.acquire().await?;
        append_event(&mut *conn, event).await
    }

    async fn events_for(&self, user_id: UserId) -> AppResult<Vec<FeedEvent>> {
        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, entity_id, user_id, time_stamp, event_type, operation
            FROM feed
            WHERE user_id = $1
            ORDER BY time_stamp ASC, id ASC
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| FeedEvent::try_from(row).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl RankingStore for PgStore {
    async fn popular_films(
        &self,
        limit: i64,
        filter: PopularityFilter,
    ) -> AppResult<Vec<RankedFilm>> {
        // Each filter combination joins differently, so each gets its own statement.
        let rows: Vec<RankedFilmRow> = match (filter.genre_id, filter.year) {
            (None, None) => {
                let sql = format!(
                    "SELECT {FILM_COLUMNS}, COUNT(fl.user_id) AS like_count \
                     FROM films f \
                     LEFT JOIN film_like fl ON fl.film_id = f.id \
                     GROUP BY f.id \
                     ORDER BY like_count DESC, f.id ASC \
                     LIMIT $1"
                );
                sqlx::query_as(&sql).bind(limit).fetch_all(&self.pool).await?
            }
            (Some(genre_id), None) => {
                let sql = format!(
                    "SELECT {FILM_COLUMNS}, COUNT(fl.user_id) AS like_count \
                     FROM films f \
                     JOIN film_genre fg ON fg.film_id = f.id AND fg.genre_id = $2 \
                     LEFT JOIN film_like fl ON fl.film_id = f.id \
                     GROUP BY f.id \
                     ORDER BY like_count DESC, f.id ASC \
                     LIMIT $1"
                );
                sqlx::query_as(&sql)
                    .bind(limit)
                    .bind(genre_id.0)
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, Some(year)) => {
                let sql = format!(
                    "SELECT {FILM_COLUMNS}, COUNT(fl.user_id) AS like_count \
                     FROM films f \
                     LEFT JOIN film_like fl ON fl.film_id = f.id \
                     WHERE EXTRACT(YEAR FROM f.release_date)::INT = $2 \
                     GROUP BY f.id \
                     ORDER BY like_count DESC, f.id ASC \
                     LIMIT $1"
                );
                sqlx::query_as(&sql)
                    .bind(limit)
                    .bind(year)
                    .fetch_all(&self.pool)
                    .await?
            }
            (Some(genre_id), Some(year)) => {
                let sql = format!(
                    "SELECT {FILM_COLUMNS}, COUNT(fl.user_id) AS like_count \
                     FROM films f \
                     JOIN film_genre fg ON fg.film_id = f.id AND fg.genre_id = $2 \
                     LEFT JOIN film_like fl ON fl.film_id = f.id \
                     WHERE EXTRACT(YEAR FROM f.release_date)::INT = $3 \
                     GROUP BY f.id \
                     ORDER BY like_count DESC, f.id ASC \
                     LIMIT $1"
                );
                sqlx::query_as(&sql)
                    .bind(limit)
                    .bind(genre_id.0)
                    .bind(year)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let counts: Vec<i64> = rows.iter().map(|row| row.like_count).collect();
        let films = self
            .with_genres(rows.into_iter().map(|row| row.film).collect())
            .await?;

        Ok(films
            .into_iter()
            .zip(counts)
            .map(|(film, like_count)| RankedFilm { film, like_count })
            .collect())
    }

    async fn nearest_neighbor(&self, user_id: UserId) -> AppResult<Option<Neighbor>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT other.user_id, COUNT(*) AS overlap
            FROM film_like AS mine
            JOIN film_like AS other
                ON other.film_id = mine.film_id AND other.user_id <> mine.user_id
            WHERE mine.user_id = $1
            GROUP BY other.user_id
            ORDER BY overlap DESC, other.user_id ASC
            LIMIT 1
            "#,
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(user_id, overlap)| Neighbor {
            user_id: UserId(user_id),
            overlap,
        }))
    }
}

#[async_trait]
impl VoteStore for PgStore {
    async fn upsert_vote(
        &self,
        review_id: ReviewId,
        user_id: UserId,
        is_like: bool,
    ) -> AppResult<EdgeOutcome> {
        let rows = sqlx::query(
            r#"
            INSERT INTO useful (review_id, user_id, is_like)
            VALUES ($1, $2, $3)
            ON CONFLICT (review_id, user_id)
            DO UPDATE SET is_like = EXCLUDED.is_like
            WHERE useful.is_like IS DISTINCT FROM EXCLUDED.is_like
            "#,
        )
        .bind(review_id.0)
        .bind(user_id.0)
        .bind(is_like)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(if rows > 0 {
            EdgeOutcome::Applied
        } else {
            EdgeOutcome::AlreadyApplied
        })
    }

    async fn delete_vote(&self, review_id: ReviewId, user_id: UserId) -> AppResult<EdgeOutcome> {
        let rows = sqlx::query("DELETE FROM useful WHERE review_id = $1 AND user_id = $2")
            .bind(review_id.0)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(if rows > 0 {
            EdgeOutcome::Applied
        } else {
            EdgeOutcome::NotFound
        })
    }

    async fn tally(&self, review_id: ReviewId) -> AppResult<(i64, i64)> {
        let tally: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE is_like) AS likes,
                COUNT(*) FILTER (WHERE NOT is_like) AS dislikes
            FROM useful
            WHERE review_id = $1
            "#,
        )
        .bind(review_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(tally)
    }
}
