use serde::{Deserialize, Serialize};

mod catalog;
mod feed;
mod ids;

pub use catalog::{Film, ReviewRef, User};
pub use feed::{EventType, FeedEvent, NewFeedEvent, Operation, UnknownFeedTag};
pub use ids::{EventId, FilmId, GenreId, ReviewId, UserId};

/// Result of an idempotent edge mutation.
///
/// Redundant mutations are reported here rather than as errors: re-adding an
/// existing edge yields `AlreadyApplied`, removing a missing one yields
/// `NotFound`. Missing users, films or reviews are still errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOutcome {
    /// The store changed
    Applied,
    /// The store already held the requested state
    AlreadyApplied,
    /// The edge (or vote) to remove did not exist
    NotFound,
}

impl EdgeOutcome {
    /// Whether a row was actually written or deleted
    pub fn is_applied(&self) -> bool {
        matches!(self, EdgeOutcome::Applied)
    }
}

/// A film together with the number of users who liked it
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankedFilm {
    #[serde(flatten)]
    pub film: Film,
    pub like_count: i64,
}

/// Filters for the popularity ranking; both are optional and conjunctive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularityFilter {
    pub genre_id: Option<GenreId>,
    pub year: Option<i32>,
}

impl PopularityFilter {
    pub fn matches(&self, film: &Film) -> bool {
        let genre_ok = self.genre_id.map_or(true, |genre| film.has_genre(genre));
        let year_ok = self.year.map_or(true, |year| film.release_year() == Some(year));
        genre_ok && year_ok
    }
}

/// Another user whose liked films overlap with a target user's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub user_id: UserId,
    /// Number of films both users liked
    pub overlap: i64,
}

impl Neighbor {
    /// Picks the candidate with the largest overlap.
    ///
    /// Equal overlaps resolve to the lowest user id. Candidates with no shared
    /// film never qualify.
    pub fn closest(candidates: impl IntoIterator<Item = Neighbor>) -> Option<Neighbor> {
        candidates
            .into_iter()
            .filter(|candidate| candidate.overlap > 0)
            .min_by(|a, b| b.overlap.cmp(&a.overlap).then(a.user_id.cmp(&b.user_id)))
    }
}

/// Like/dislike tally on a single review
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Usefulness {
    pub review_id: ReviewId,
    pub likes: i64,
    pub dislikes: i64,
    pub useful: i64,
}

impl Usefulness {
    pub fn new(review_id: ReviewId, likes: i64, dislikes: i64) -> Self {
        Self {
            review_id,
            likes,
            dislikes,
            useful: likes - dislikes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn film(genres: Vec<GenreId>, year: i32) -> Film {
        Film {
            id: FilmId(1),
            name: "Solaris".to_string(),
            description: None,
            release_date: NaiveDate::from_ymd_opt(year, 3, 20),
            duration: None,
            genres,
        }
    }

    #[test]
    fn test_edge_outcome_is_applied() {
        assert!(EdgeOutcome::Applied.is_applied());
        assert!(!EdgeOutcome::AlreadyApplied.is_applied());
        assert!(!EdgeOutcome::NotFound.is_applied());
    }

    #[test]
    fn test_filter_without_criteria_matches_everything() {
        assert!(PopularityFilter::default().matches(&film(vec![], 1972)));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let f = film(vec![GenreId(3)], 1972);
        let both = PopularityFilter {
            genre_id: Some(GenreId(3)),
            year: Some(1972),
        };
        let wrong_year = PopularityFilter {
            genre_id: Some(GenreId(3)),
            year: Some(2002),
        };
        let wrong_genre = PopularityFilter {
            genre_id: Some(GenreId(1)),
            year: Some(1972),
        };

        assert!(both.matches(&f));
        assert!(!wrong_year.matches(&f));
        assert!(!wrong_genre.matches(&f));
    }

    #[test]
    fn test_closest_neighbor_prefers_overlap_then_lowest_id() {
        let picked = Neighbor::closest(vec![
            Neighbor { user_id: UserId(9), overlap: 2 },
            Neighbor { user_id: UserId(4), overlap: 3 },
            Neighbor { user_id: UserId(7), overlap: 3 },
        ]);
        assert_eq!(picked, Some(Neighbor { user_id: UserId(4), overlap: 3 }));
    }

    #[test]
    fn test_closest_neighbor_ignores_zero_overlap() {
        let picked = Neighbor::closest(vec![Neighbor { user_id: UserId(2), overlap: 0 }]);
        assert_eq!(picked, None);
        assert_eq!(Neighbor::closest(Vec::new()), None);
    }

    #[test]
    fn test_usefulness_score() {
        let tally = Usefulness::new(ReviewId(5), 3, 5);
        assert_eq!(tally.useful, -2);
    }

    #[test]
    fn test_ranked_film_flattens_film_fields() {
        let ranked = RankedFilm {
            film: film(vec![], 1972),
            like_count: 4,
        };
        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json["name"], "Solaris");
        assert_eq!(json["likeCount"], 4);
    }
}
