use chrono::{DateTime, Utc};
use leaderboard::RankingEntry;
use sentiment::{Classification, SentimentLabel};
use serde::{Deserialize, Serialize};

pub type RestaurantId = u64;
pub type ReviewId = u64;

/// The running aggregate owned by a restaurant.
///
/// `average_score` is always `total_score / review_count`, or zero when there
/// are no reviews. Only [`crate::aggregator::ScoreAggregator`] changes it on
/// a persisted restaurant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub total_score: f64,
    pub review_count: u64,
    pub average_score: f64,
}

impl Aggregate {
    pub const EMPTY: Aggregate = Aggregate {
        total_score: 0.0,
        review_count: 0,
        average_score: 0.0,
    };

    pub fn with_new_review(self, score: f64) -> Self {
        let total_score = self.total_score + score;
        let review_count = self.review_count + 1;
        Aggregate {
            total_score,
            review_count,
            average_score: total_score / review_count as f64,
        }
    }

    /// Removing the last review resets to [`Aggregate::EMPTY`] instead of
    /// subtracting, so the count never goes negative and rounding residue in
    /// the total is discarded.
    pub fn with_removal(self, score: f64) -> Self {
        if self.review_count <= 1 {
            return Self::EMPTY;
        }
        let total_score = self.total_score - score;
        let review_count = self.review_count - 1;
        Aggregate {
            total_score,
            review_count,
            average_score: total_score / review_count as f64,
        }
    }
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub cuisine_type: Option<String>,
    #[serde(flatten)]
    pub aggregate: Aggregate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Restaurant {
    pub fn ranking_entry(&self) -> RankingEntry {
        RankingEntry {
            restaurant_id: self.id,
            name: self.name.clone(),
            average_score: self.aggregate.average_score,
            review_count: self.aggregate.review_count,
            cuisine_type: self.cuisine_type.clone(),
        }
    }
}

/// Descriptive fields of a restaurant, used to register or edit one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RestaurantDetails {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub cuisine_type: Option<String>,
}

impl RestaurantDetails {
    pub fn named(name: impl Into<String>) -> Self {
        RestaurantDetails {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A persisted review. Immutable once written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub restaurant_id: RestaurantId,
    pub text: String,
    pub reviewer_name: Option<String>,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: f64,
    pub confidence: f64,
    pub is_positive: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn classification(&self) -> Classification {
        Classification {
            label: self.sentiment_label,
            score: self.sentiment_score,
            confidence: self.confidence,
            is_positive: self.is_positive,
        }
    }
}

/// A review about to be persisted; the store assigns id and timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct NewReview {
    pub restaurant_id: RestaurantId,
    pub text: String,
    pub reviewer_name: Option<String>,
    pub classification: Classification,
}

/// Sentiment counts over a restaurant's current reviews.
///
/// Neutral reviews (no `is_positive` verdict) count towards
/// `average_sentiment` but not towards `total_count`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewStatistics {
    pub positive_count: u64,
    pub negative_count: u64,
    pub total_count: u64,
    pub average_sentiment: f64,
    pub positive_percentage: f64,
}

impl ReviewStatistics {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        let positive_count = reviews
            .iter()
            .filter(|r| r.is_positive == Some(true))
            .count() as u64;
        let negative_count = reviews
            .iter()
            .filter(|r| r.is_positive == Some(false))
            .count() as u64;
        let total_count = positive_count + negative_count;

        let average_sentiment = if reviews.is_empty() {
            0.0
        } else {
            reviews.iter().map(|r| r.sentiment_score).sum::<f64>() / reviews.len() as f64
        };
        let positive_percentage = if total_count > 0 {
            positive_count as f64 / total_count as f64 * 100.0
        } else {
            0.0
        };

        ReviewStatistics {
            positive_count,
            negative_count,
            total_count,
            average_sentiment,
            positive_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_additions_sum_scores() {
        let scores = [0.9, -0.3, 0.0, 0.45, -1.0];
        let aggregate = scores
            .iter()
            .fold(Aggregate::EMPTY, |agg, s| agg.with_new_review(*s));

        assert_eq!(aggregate.review_count, 5);
        assert_close(aggregate.total_score, scores.iter().sum());
        assert_close(aggregate.average_score, aggregate.total_score / 5.0);
    }

    #[test]
    fn test_new_review_numeric_example() {
        let aggregate = Aggregate {
            total_score: 8.0,
            review_count: 4,
            average_score: 2.0,
        }
        .with_new_review(-2.0);

        assert_close(aggregate.total_score, 6.0);
        assert_eq!(aggregate.review_count, 5);
        assert_close(aggregate.average_score, 1.2);
    }

    #[test]
    fn test_removal_of_one_of_many() {
        let aggregate = Aggregate {
            total_score: 2.5,
            review_count: 3,
            average_score: 2.5 / 3.0,
        }
        .with_removal(0.5);

        assert_close(aggregate.total_score, 2.0);
        assert_eq!(aggregate.review_count, 2);
        assert_close(aggregate.average_score, 1.0);
    }

    #[test]
    fn test_removal_of_last_review_resets() {
        let aggregate = Aggregate::EMPTY.with_new_review(0.7).with_removal(0.7000001);
        assert_eq!(aggregate, Aggregate::EMPTY);

        // Already empty stays empty
        assert_eq!(Aggregate::EMPTY.with_removal(1.0), Aggregate::EMPTY);
    }

    fn review(score: f64, is_positive: Option<bool>) -> Review {
        Review {
            id: 1,
            restaurant_id: 1,
            text: "text".into(),
            reviewer_name: None,
            sentiment_label: SentimentLabel::Neutral,
            sentiment_score: score,
            confidence: 0.5,
            is_positive,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_statistics() {
        let reviews = vec![
            review(0.9, Some(true)),
            review(0.6, Some(true)),
            review(-0.6, Some(false)),
            review(0.0, None),
        ];
        let stats = ReviewStatistics::from_reviews(&reviews);

        assert_eq!(stats.positive_count, 2);
        assert_eq!(stats.negative_count, 1);
        assert_eq!(stats.total_count, 3);
        assert_close(stats.average_sentiment, 0.225);
        assert_close(stats.positive_percentage, 200.0 / 3.0);
    }

    #[test]
    fn test_statistics_without_verdicts() {
        let empty = ReviewStatistics::from_reviews(&[]);
        assert_eq!(empty.total_count, 0);
        assert_eq!(empty.average_sentiment, 0.0);
        assert_eq!(empty.positive_percentage, 0.0);

        let neutral_only = ReviewStatistics::from_reviews(&[review(0.0, None)]);
        assert_eq!(neutral_only.total_count, 0);
        assert_eq!(neutral_only.positive_percentage, 0.0);
    }
}
