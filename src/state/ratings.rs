use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    dao::{
        models::{RATINGS_KEY, RatingRecord, Review, TournamentId},
        storage::{KeyValueStore, StorageError, read_json, write_json},
    },
    dto::format_timestamp,
};

/// Highest score a user can give.
pub const MAX_SCORE: u8 = 5;

/// Failures raised by the rating book.
#[derive(Debug, Error)]
pub enum RatingError {
    #[error("score must be between 1 and {MAX_SCORE} (got {score})")]
    ScoreOutOfRange { score: u8 },
    #[error("review text is empty")]
    EmptyReview,
    #[error("tournament {id} must be rated before it can be reviewed")]
    NotRated { id: TournamentId },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Local per-tournament ratings and reviews, persisted as one JSON object keyed by id.
pub struct RatingBook {
    store: Arc<dyn KeyValueStore>,
    records: IndexMap<TournamentId, RatingRecord>,
}

impl RatingBook {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let records = read_json(store.as_ref(), RATINGS_KEY).unwrap_or_default();
        Self { store, records }
    }

    /// Record for `id`, or an empty record when nobody rated it yet.
    pub fn get(&self, id: TournamentId) -> RatingRecord {
        self.records.get(&id).cloned().unwrap_or_default()
    }

    pub fn average(&self, id: TournamentId) -> f64 {
        self.records.get(&id).map_or(0.0, RatingRecord::average)
    }

    pub fn records(&self) -> &IndexMap<TournamentId, RatingRecord> {
        &self.records
    }

    /// Set the current user's score for `id`.
    ///
    /// A first rating adds a scorer; a re-rating only shifts the total by the difference.
    pub fn rate(&mut self, id: TournamentId, score: u8) -> Result<RatingRecord, RatingError> {
        if !(1..=MAX_SCORE).contains(&score) {
            return Err(RatingError::ScoreOutOfRange { score });
        }

        let mut record = self.get(id);
        let previous = record.user_rating;
        if previous > 0 {
            record.score = (record.score + u32::from(score)).saturating_sub(u32::from(previous));
        } else {
            record.score += u32::from(score);
            record.count += 1;
        }
        record.user_rating = score;

        self.commit(id, record.clone())?;
        debug!(id, score, previous, "tournament rated");
        Ok(record)
    }

    /// Prepend a review carrying the user's current score.
    pub fn submit_review(
        &mut self,
        id: TournamentId,
        author: &str,
        text: &str,
        now: OffsetDateTime,
    ) -> Result<Review, RatingError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RatingError::EmptyReview);
        }

        let mut record = self.get(id);
        if record.user_rating == 0 {
            return Err(RatingError::NotRated { id });
        }

        let review = Review {
            author: author.to_string(),
            rating: record.user_rating,
            text: text.to_string(),
            date: format_timestamp(now),
        };
        record.reviews.insert(0, review.clone());

        self.commit(id, record)?;
        Ok(review)
    }

    fn commit(&mut self, id: TournamentId, record: RatingRecord) -> Result<(), StorageError> {
        let mut candidate = self.records.clone();
        candidate.insert(id, record);
        write_json(self.store.as_ref(), RATINGS_KEY, &candidate)?;
        self.records = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::dao::memory_store::MemoryStore;

    fn book() -> (Arc<dyn KeyValueStore>, RatingBook) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        (store.clone(), RatingBook::load(store))
    }

    #[test]
    fn rerating_shifts_score_without_new_scorer() {
        let (_, mut ratings) = book();
        let first = ratings.rate(7, 4).unwrap();
        assert_eq!((first.score, first.count), (4, 1));

        let second = ratings.rate(7, 5).unwrap();
        assert_eq!((second.score, second.count), (5, 1));
        assert_eq!(second.user_rating, 5);
        assert_eq!(ratings.average(7), 5.0);
    }

    #[test]
    fn rating_outside_range_is_rejected_without_change() {
        let (_, mut ratings) = book();
        assert!(matches!(
            ratings.rate(1, 0),
            Err(RatingError::ScoreOutOfRange { score: 0 })
        ));
        assert!(matches!(
            ratings.rate(1, 6),
            Err(RatingError::ScoreOutOfRange { score: 6 })
        ));
        assert!(ratings.records().is_empty());
    }

    #[test]
    fn review_requires_text_and_prior_rating() {
        let (_, mut ratings) = book();
        let now = datetime!(2024-03-10 12:00 UTC);

        assert!(matches!(
            ratings.submit_review(3, "Пользователь", "   ", now),
            Err(RatingError::EmptyReview)
        ));
        assert!(matches!(
            ratings.submit_review(3, "Пользователь", "Отличный турнир", now),
            Err(RatingError::NotRated { id: 3 })
        ));
        assert!(ratings.get(3).reviews.is_empty());
    }

    #[test]
    fn reviews_are_newest_first_and_persisted() {
        let (store, mut ratings) = book();
        ratings.rate(3, 4).unwrap();
        ratings
            .submit_review(3, "Анна", "first", datetime!(2024-03-10 12:00 UTC))
            .unwrap();
        let latest = ratings
            .submit_review(3, "Борис", "second", datetime!(2024-03-11 09:30 UTC))
            .unwrap();
        assert_eq!(latest.rating, 4);
        assert_eq!(latest.date, "2024-03-11T09:30:00Z");

        let reloaded = RatingBook::load(store);
        let texts: Vec<_> = reloaded
            .get(3)
            .reviews
            .iter()
            .map(|review| review.text.clone())
            .collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[test]
    fn stored_map_uses_string_keys() {
        let (store, mut ratings) = book();
        ratings.rate(42, 3).unwrap();

        let raw = store.get(RATINGS_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["42"]["score"], 3);
        assert_eq!(value["42"]["userRating"], 3);
    }
}
