use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{FilmId, GenreId, ReviewId, UserId};

/// A registered user, as resolved through the user directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub login: String,
    pub name: Option<String>,
    pub birthday: Option<NaiveDate>,
}

/// A film, as resolved through the film catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub id: FilmId,
    pub name: String,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub duration: Option<i32>,
    /// Genres the film is tagged with, ascending by id
    #[serde(default)]
    pub genres: Vec<GenreId>,
}

impl Film {
    /// Release year, if the release date is known
    pub fn release_year(&self) -> Option<i32> {
        self.release_date.map(|date| date.year())
    }

    /// Whether the film is tagged with the given genre
    pub fn has_genre(&self, genre_id: GenreId) -> bool {
        self.genres.contains(&genre_id)
    }
}

/// The slice of a review the aggregation core cares about.
///
/// Review text lives with the review collaborator and is never loaded here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRef {
    pub review_id: ReviewId,
    pub user_id: UserId,
    pub film_id: FilmId,
}
