use crate::aggregator::ScoreAggregator;
use crate::cache_sync::{CacheSync, sync_cache};
use crate::errors::{Result, ReviewError};
use crate::metrics_defs::{PERSISTENCE_ABORTS, REVIEWS_RETRACTED};
use crate::store::ReviewStore;
use crate::types::{Restaurant, RestaurantId, Review, ReviewId};
use leaderboard::RankingCache;
use serde::Serialize;
use shared::counter;
use std::sync::Arc;

/// A review that was deleted, with the restaurant as recomputed without it.
#[derive(Clone, Debug, Serialize)]
pub struct ReviewRetraction {
    pub review: Review,
    pub restaurant: Restaurant,
    pub cache: CacheSync,
}

/// Recompute, persist, sync the cache, then delete the review row.
///
/// The restaurant's aggregate lock is held across all four steps, and the
/// review is looked up again once the lock is taken, so two concurrent
/// retractions of one review decrement the aggregate only once.
#[derive(Clone)]
pub struct ReviewRetractionFlow {
    store: Arc<dyn ReviewStore>,
    aggregator: Arc<ScoreAggregator>,
    cache: RankingCache,
}

impl ReviewRetractionFlow {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        aggregator: Arc<ScoreAggregator>,
        cache: RankingCache,
    ) -> Self {
        ReviewRetractionFlow {
            store,
            aggregator,
            cache,
        }
    }

    pub async fn retract(&self, review_id: ReviewId) -> Result<ReviewRetraction> {
        let review = self
            .store
            .get_review(review_id)
            .await?
            .ok_or(ReviewError::ReviewNotFound(review_id))?;

        let flow = self.clone();
        tokio::spawn(async move { flow.apply(review.restaurant_id, review_id).await }).await?
    }

    async fn apply(
        &self,
        restaurant_id: RestaurantId,
        review_id: ReviewId,
    ) -> Result<ReviewRetraction> {
        let guard = self.aggregator.lock(restaurant_id).await;

        let review = self
            .store
            .get_review(review_id)
            .await?
            .ok_or(ReviewError::ReviewNotFound(review_id))?;
        let previous = guard.load().await?.aggregate;

        let restaurant = guard
            .apply_removal(review.sentiment_score)
            .await
            .inspect_err(|e| {
                counter!(PERSISTENCE_ABORTS, "op" => "retract", "step" => "aggregate").increment(1);
                tracing::error!(restaurant_id, review_id, error = %e, "Failed to remove review score");
            })?;

        let cache = sync_cache(&self.cache, &restaurant, "retract").await;

        if let Err(e) = self.store.delete_review(review_id).await {
            counter!(PERSISTENCE_ABORTS, "op" => "retract", "step" => "review").increment(1);
            tracing::error!(
                restaurant_id,
                review_id,
                error = %e,
                "Failed to delete review, restoring aggregate"
            );
            match guard.restore(previous).await {
                Ok(restored) => {
                    sync_cache(&self.cache, &restored, "retract").await;
                }
                Err(restore_err) => {
                    tracing::error!(
                        restaurant_id,
                        review_id,
                        error = %restore_err,
                        "Aggregate no longer counts a review that still exists"
                    );
                }
            }
            return Err(e.into());
        }
        drop(guard);

        counter!(REVIEWS_RETRACTED).increment(1);
        tracing::info!(
            review_id,
            restaurant_id,
            review_count = restaurant.aggregate.review_count,
            average_score = restaurant.aggregate.average_score,
            "Review deleted"
        );

        Ok(ReviewRetraction {
            review,
            restaurant,
            cache,
        })
    }
}
