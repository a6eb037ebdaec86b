use std::{fmt, hash::Hash};

use serde::{Deserialize, Serialize};

/// Identifier of a tournament as issued by the calendar backend.
pub type TournamentId = u64;

/// Storage key holding the favorites collection.
pub const FAVORITES_KEY: &str = "favoriteTournaments";
/// Storage key holding the rating book.
pub const RATINGS_KEY: &str = "tournamentRatings";
/// Storage key holding the comparison selection.
pub const COMPARISON_KEY: &str = "comparisonTournaments";
/// Storage key holding the recently viewed tournaments.
pub const HISTORY_KEY: &str = "tournament_history";
/// Storage key holding the accessibility settings record.
pub const ACCESSIBILITY_KEY: &str = "accessibility_settings";
/// Storage key holding the colour theme.
pub const THEME_KEY: &str = "theme";
/// Storage key holding the keyboard shortcuts switch.
pub const SHORTCUTS_ENABLED_KEY: &str = "keyboard_shortcuts_enabled";
/// Storage key holding per-network share counters.
pub const SHARES_KEY: &str = "tournament_shares";
/// Storage key holding the last search queries.
pub const RECENT_SEARCHES_KEY: &str = "recentSearches";
/// Storage key holding the tournament list filter state.
pub const FILTER_STATE_KEY: &str = "filterState";
/// Storage key holding named filter presets.
pub const FILTER_PRESETS_KEY: &str = "filterPresets";

/// Anything stored in a collection must expose the key that makes it unique.
pub trait Keyed {
    type Key: Clone + Eq + Hash + fmt::Debug;

    fn key(&self) -> Self::Key;
}

impl Keyed for TournamentId {
    type Key = TournamentId;

    fn key(&self) -> TournamentId {
        *self
    }
}

/// Search queries are their own key.
impl Keyed for String {
    type Key = String;

    fn key(&self) -> String {
        self.clone()
    }
}

/// Denormalised tournament snapshot kept for offline display of favorites and history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    /// Tournament identifier; unique inside a collection.
    pub id: TournamentId,
    /// Display name of the tournament.
    pub name: String,
    /// City or venue.
    #[serde(default)]
    pub location: String,
    /// First day, `YYYY-MM-DD`.
    #[serde(default, alias = "start_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Last day, `YYYY-MM-DD`.
    #[serde(default, alias = "end_date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    /// Tournament category (classic, rapid, blitz...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// RFC 3339 timestamp of the last visit; only set for history entries.
    #[serde(default, alias = "viewed_at", skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<String>,
}

impl Keyed for CollectionEntry {
    type Key = TournamentId;

    fn key(&self) -> TournamentId {
        self.id
    }
}

/// Aggregated local rating state for one tournament.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    /// Sum of all scores given.
    pub score: u32,
    /// Number of scorers contributing to `score`.
    pub count: u32,
    /// Score given by the current user, `0` when unset.
    #[serde(default)]
    pub user_rating: u8,
    /// Reviews, newest first.
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl RatingRecord {
    /// Mean score, or `0.0` when nobody rated yet.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            f64::from(self.score) / f64::from(self.count)
        }
    }
}

/// Free-text review attached to a rating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Review {
    pub author: String,
    /// Score the author had given when writing the review.
    pub rating: u8,
    pub text: String,
    /// RFC 3339 timestamp.
    pub date: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_accepts_snake_case_dates() {
        let entry: CollectionEntry = serde_json::from_str(
            r#"{"id": 12, "name": "Moscow Open", "start_date": "2024-03-10", "end_date": "2024-03-12"}"#,
        )
        .unwrap();

        assert_eq!(entry.start_date.as_deref(), Some("2024-03-10"));
        assert_eq!(entry.location, "");
        let encoded = serde_json::to_value(&entry).unwrap();
        assert_eq!(encoded["startDate"], "2024-03-10");
        assert!(encoded.get("viewedAt").is_none());
    }

    #[test]
    fn average_is_zero_without_scorers() {
        let record = RatingRecord::default();
        assert_eq!(record.average(), 0.0);

        let record = RatingRecord {
            score: 9,
            count: 2,
            ..RatingRecord::default()
        };
        assert_eq!(record.average(), 4.5);
    }
}
