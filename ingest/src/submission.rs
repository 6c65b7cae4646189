use crate::aggregator::ScoreAggregator;
use crate::cache_sync::{CacheSync, sync_cache};
use crate::errors::{Result, ReviewError};
use crate::metrics_defs::{PERSISTENCE_ABORTS, REVIEWS_SUBMITTED};
use crate::store::ReviewStore;
use crate::types::{NewReview, Restaurant, RestaurantId, Review};
use leaderboard::RankingCache;
use sentiment::{Classification, SentimentAnalyzer};
use serde::Serialize;
use shared::counter;
use std::sync::Arc;

/// A review that made it through the pipeline.
#[derive(Clone, Debug, Serialize)]
pub struct ReviewSubmission {
    pub review: Review,
    /// The restaurant with the review's score applied.
    pub restaurant: Restaurant,
    pub cache: CacheSync,
}

impl ReviewSubmission {
    pub fn classification(&self) -> Classification {
        self.review.classification()
    }
}

/// Classify, persist, aggregate, then sync the ranking cache.
///
/// The restaurant lookup and the classification call run on the caller's
/// task and stop if the caller goes away. Everything from the review insert
/// onward runs on a spawned task so it completes even if the caller is
/// dropped mid-write.
#[derive(Clone)]
pub struct ReviewIngestionPipeline {
    store: Arc<dyn ReviewStore>,
    classifier: Arc<dyn SentimentAnalyzer>,
    aggregator: Arc<ScoreAggregator>,
    cache: RankingCache,
}

impl ReviewIngestionPipeline {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        classifier: Arc<dyn SentimentAnalyzer>,
        aggregator: Arc<ScoreAggregator>,
        cache: RankingCache,
    ) -> Self {
        ReviewIngestionPipeline {
            store,
            classifier,
            aggregator,
            cache,
        }
    }

    pub async fn submit(
        &self,
        restaurant_id: RestaurantId,
        text: &str,
        reviewer_name: Option<String>,
    ) -> Result<ReviewSubmission> {
        if self.store.get_restaurant(restaurant_id).await?.is_none() {
            return Err(ReviewError::RestaurantNotFound(restaurant_id));
        }

        let classification = self.classifier.classify(text).await;
        let new_review = NewReview {
            restaurant_id,
            text: text.to_string(),
            reviewer_name,
            classification,
        };

        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.persist(new_review).await }).await?
    }

    async fn persist(&self, new_review: NewReview) -> Result<ReviewSubmission> {
        let restaurant_id = new_review.restaurant_id;
        // Held from the insert through the cache sync, so a retraction that
        // sees the new review also sees its score in the aggregate.
        let guard = self.aggregator.lock(restaurant_id).await;
        guard.load().await?;

        let review = self
            .store
            .insert_review(new_review)
            .await
            .map_err(ReviewError::from)
            .inspect_err(|e| record_abort(restaurant_id, "review", e))?;

        let restaurant = match guard.apply_new_review(review.sentiment_score).await {
            Ok(restaurant) => restaurant,
            Err(e) => {
                record_abort(restaurant_id, "aggregate", &e);
                if let Err(cleanup) = self.store.delete_review(review.id).await {
                    tracing::error!(
                        review_id = review.id,
                        error = %cleanup,
                        "Review persisted without its score in the aggregate"
                    );
                }
                return Err(e);
            }
        };
        // Synced while the lock is held so the last cache write for a
        // restaurant always carries its latest aggregate.
        let cache = sync_cache(&self.cache, &restaurant, "submit").await;
        drop(guard);

        let classification = review.classification();
        let kind = if classification.is_fallback() {
            "fallback"
        } else {
            "real"
        };
        counter!(REVIEWS_SUBMITTED, "classification" => kind).increment(1);
        tracing::info!(
            review_id = review.id,
            restaurant_id,
            sentiment = %classification.label,
            score = classification.score,
            "Review submitted"
        );

        Ok(ReviewSubmission {
            review,
            restaurant,
            cache,
        })
    }
}

/// A restaurant deleted mid-submission is the caller's problem, not a
/// persistence failure.
fn record_abort(restaurant_id: RestaurantId, step: &'static str, e: &ReviewError) {
    if e.is_client_error() {
        tracing::info!(restaurant_id, step, error = %e, "Submission abandoned");
    } else {
        counter!(PERSISTENCE_ABORTS, "op" => "submit", "step" => step).increment(1);
        tracing::error!(restaurant_id, step, error = %e, "Failed to persist review");
    }
}
