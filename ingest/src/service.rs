use crate::aggregator::ScoreAggregator;
use crate::cache_sync::{evict_cache, sync_cache};
use crate::errors::{Result, ReviewError};
use crate::retraction::{ReviewRetraction, ReviewRetractionFlow};
use crate::store::{ReviewQuery, ReviewStore, StoreError};
use crate::submission::{ReviewIngestionPipeline, ReviewSubmission};
use crate::types::{Restaurant, RestaurantDetails, RestaurantId, Review, ReviewId, ReviewStatistics};
use chrono::{Duration, Utc};
use leaderboard::{RankedEntry, RankingCache};
use sentiment::{SentimentAnalyzer, SentimentLabel};
use std::sync::Arc;

/// Operations exposed to the request layer.
///
/// Only durable-store failures and missing or duplicate entities surface as
/// errors. Ranking reads degrade to "nothing ranked" when the cache is down.
pub struct ReviewService {
    store: Arc<dyn ReviewStore>,
    aggregator: Arc<ScoreAggregator>,
    cache: RankingCache,
    ingestion: ReviewIngestionPipeline,
    retraction: ReviewRetractionFlow,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        classifier: Arc<dyn SentimentAnalyzer>,
        cache: RankingCache,
    ) -> Self {
        let aggregator = Arc::new(ScoreAggregator::new(store.clone()));
        let ingestion = ReviewIngestionPipeline::new(
            store.clone(),
            classifier,
            aggregator.clone(),
            cache.clone(),
        );
        let retraction = ReviewRetractionFlow::new(store.clone(), aggregator.clone(), cache.clone());
        Self::from_parts(store, aggregator, cache, ingestion, retraction)
    }

    pub(crate) fn from_parts(
        store: Arc<dyn ReviewStore>,
        aggregator: Arc<ScoreAggregator>,
        cache: RankingCache,
        ingestion: ReviewIngestionPipeline,
        retraction: ReviewRetractionFlow,
    ) -> Self {
        ReviewService {
            store,
            aggregator,
            cache,
            ingestion,
            retraction,
        }
    }

    pub async fn submit_review(
        &self,
        restaurant_id: RestaurantId,
        text: &str,
        reviewer_name: Option<String>,
    ) -> Result<ReviewSubmission> {
        self.ingestion.submit(restaurant_id, text, reviewer_name).await
    }

    pub async fn delete_review(&self, review_id: ReviewId) -> Result<ReviewRetraction> {
        self.retraction.retract(review_id).await
    }

    pub async fn top_restaurants(&self, limit: usize) -> Vec<RankedEntry> {
        match self.cache.top_k(limit).await {
            Ok(ranked) => {
                tracing::debug!(count = ranked.len(), "Retrieved ranked restaurants");
                ranked
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read ranking cache");
                Vec::new()
            }
        }
    }

    /// 1-based rank, or `None` when unranked or the cache cannot answer.
    pub async fn restaurant_rank(&self, restaurant_id: RestaurantId) -> Option<u64> {
        match self.cache.rank_of(restaurant_id).await {
            Ok(rank) => rank,
            Err(e) => {
                tracing::error!(restaurant_id, error = %e, "Failed to read restaurant rank");
                None
            }
        }
    }

    /// Registers a restaurant with an empty aggregate and seeds its cache
    /// entry at score zero.
    pub async fn create_restaurant(&self, details: RestaurantDetails) -> Result<Restaurant> {
        if self.store.find_restaurant_by_name(&details.name).await?.is_some() {
            return Err(ReviewError::DuplicateRestaurant(details.name));
        }
        let restaurant = match self.store.insert_restaurant(&details).await {
            Ok(restaurant) => restaurant,
            // Lost a race with a concurrent registration of the same name
            Err(StoreError::Conflict(_)) => {
                return Err(ReviewError::DuplicateRestaurant(details.name));
            }
            Err(e) => return Err(e.into()),
        };

        sync_cache(&self.cache, &restaurant, "create_restaurant").await;
        tracing::info!(restaurant_id = restaurant.id, name = %restaurant.name, "Restaurant created");
        Ok(restaurant)
    }

    pub async fn get_restaurant(&self, restaurant_id: RestaurantId) -> Result<Restaurant> {
        self.store
            .get_restaurant(restaurant_id)
            .await?
            .ok_or(ReviewError::RestaurantNotFound(restaurant_id))
    }

    /// Changes descriptive fields only. The cache entry is re-synced since it
    /// carries the name and cuisine.
    pub async fn update_restaurant(
        &self,
        restaurant_id: RestaurantId,
        details: RestaurantDetails,
    ) -> Result<Restaurant> {
        let guard = self.aggregator.lock(restaurant_id).await;
        let current = guard.load().await?;

        if !current.name.eq_ignore_ascii_case(&details.name)
            && self.store.find_restaurant_by_name(&details.name).await?.is_some()
        {
            return Err(ReviewError::DuplicateRestaurant(details.name));
        }

        let restaurant = guard.update_details(&details).await?;
        sync_cache(&self.cache, &restaurant, "update_restaurant").await;
        tracing::info!(restaurant_id, "Restaurant updated");
        Ok(restaurant)
    }

    /// Deletes the restaurant and its reviews, then drops its cache entry.
    pub async fn delete_restaurant(&self, restaurant_id: RestaurantId) -> Result<()> {
        let guard = self.aggregator.lock(restaurant_id).await;
        guard.load().await?;

        self.store.delete_restaurant(restaurant_id).await?;
        evict_cache(&self.cache, restaurant_id).await;
        drop(guard);

        tracing::info!(restaurant_id, "Restaurant deleted");
        Ok(())
    }

    pub async fn get_review(&self, review_id: ReviewId) -> Result<Review> {
        self.store
            .get_review(review_id)
            .await?
            .ok_or(ReviewError::ReviewNotFound(review_id))
    }

    /// Newest first, optionally restricted to one sentiment label.
    pub async fn reviews_for_restaurant(
        &self,
        restaurant_id: RestaurantId,
        label: Option<SentimentLabel>,
    ) -> Result<Vec<Review>> {
        self.get_restaurant(restaurant_id).await?;
        let query = ReviewQuery {
            label,
            ..ReviewQuery::for_restaurant(restaurant_id)
        };
        Ok(self.store.list_reviews(&query).await?)
    }

    /// Reviews written in the last `hours` hours, newest first.
    pub async fn recent_reviews(
        &self,
        restaurant_id: RestaurantId,
        hours: u32,
    ) -> Result<Vec<Review>> {
        self.get_restaurant(restaurant_id).await?;
        let query = ReviewQuery {
            since: Some(Utc::now() - Duration::hours(i64::from(hours))),
            ..ReviewQuery::for_restaurant(restaurant_id)
        };
        Ok(self.store.list_reviews(&query).await?)
    }

    pub async fn review_statistics(&self, restaurant_id: RestaurantId) -> Result<ReviewStatistics> {
        self.get_restaurant(restaurant_id).await?;
        let reviews = self
            .store
            .list_reviews(&ReviewQuery::for_restaurant(restaurant_id))
            .await?;
        Ok(ReviewStatistics::from_reviews(&reviews))
    }

    /// Whether the ranking cache answers at all.
    pub async fn cache_reachable(&self) -> bool {
        self.cache.ping().await.is_ok()
    }
}
