use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Declares a numeric identifier newtype backed by a Postgres `BIGINT`
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_type!(
    /// Identifier of a user record owned by the user directory
    UserId
);
id_type!(
    /// Identifier of a film record owned by the film catalog
    FilmId
);
id_type!(
    /// Identifier of a genre
    GenreId
);
id_type!(
    /// Identifier of a review
    ReviewId
);
id_type!(
    /// Identifier assigned by the feed log on append
    EventId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", UserId(42)), "42");
        assert_eq!(FilmId::from(7).to_string(), "7");
    }

    #[test]
    fn test_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&FilmId(12)).unwrap();
        assert_eq!(json, "12");

        let id: UserId = serde_json::from_str("3").unwrap();
        assert_eq!(id, UserId(3));
    }

    #[test]
    fn test_id_ordering() {
        let mut ids = vec![UserId(3), UserId(1), UserId(2)];
        ids.sort();
        assert_eq!(ids, vec![UserId(1), UserId(2), UserId(3)]);
    }
}
