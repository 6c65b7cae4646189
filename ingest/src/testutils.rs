use crate::aggregator::ScoreAggregator;
use crate::retraction::ReviewRetractionFlow;
use crate::service::ReviewService;
use crate::store::{InMemoryStore, ReviewQuery, ReviewStore, StoreError};
use crate::submission::ReviewIngestionPipeline;
use crate::types::{NewReview, Restaurant, RestaurantDetails, RestaurantId, Review, ReviewId};
use async_trait::async_trait;
use leaderboard::{
    InMemoryRankingStore, LeaderboardConfig, RankingCache, RankingError, RankingStore,
    RankingStoreType,
};
use sentiment::{Classification, SentimentAnalyzer, SentimentLabel};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Analyzer that answers every text with the same classification.
pub struct StaticAnalyzer(pub Classification);

#[async_trait]
impl SentimentAnalyzer for StaticAnalyzer {
    async fn classify(&self, _text: &str) -> Classification {
        self.0.clone()
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

pub fn classification(score: f64) -> Classification {
    let label = if score > 0.0 {
        SentimentLabel::Positive
    } else if score < 0.0 {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };
    Classification {
        label,
        score,
        confidence: score.abs().min(1.0),
        is_positive: (score != 0.0).then_some(score > 0.0),
    }
}

/// In-memory store with switchable failures per write path.
///
/// With `pause_after_review_insert` set, `insert_review` commits, signals
/// `review_inserted` and then waits for `resume_review_insert`.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    pub fail_review_insert: AtomicBool,
    pub fail_review_delete: AtomicBool,
    pub fail_restaurant_save: AtomicBool,
    pub pause_after_review_insert: AtomicBool,
    pub review_inserted: Notify,
    pub resume_review_insert: Notify,
}

impl FlakyStore {
    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{what} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for FlakyStore {
    async fn get_restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>, StoreError> {
        self.inner.get_restaurant(id).await
    }

    async fn find_restaurant_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Restaurant>, StoreError> {
        self.inner.find_restaurant_by_name(name).await
    }

    async fn insert_restaurant(
        &self,
        details: &RestaurantDetails,
    ) -> Result<Restaurant, StoreError> {
        self.inner.insert_restaurant(details).await
    }

    async fn save_restaurant(&self, restaurant: &Restaurant) -> Result<(), StoreError> {
        Self::check(&self.fail_restaurant_save, "restaurant save")?;
        self.inner.save_restaurant(restaurant).await
    }

    async fn delete_restaurant(&self, id: RestaurantId) -> Result<(), StoreError> {
        self.inner.delete_restaurant(id).await
    }

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>, StoreError> {
        self.inner.get_review(id).await
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, StoreError> {
        Self::check(&self.fail_review_insert, "review insert")?;
        let review = self.inner.insert_review(review).await?;
        if self.pause_after_review_insert.load(Ordering::SeqCst) {
            self.review_inserted.notify_one();
            self.resume_review_insert.notified().await;
        }
        Ok(review)
    }

    async fn delete_review(&self, id: ReviewId) -> Result<(), StoreError> {
        Self::check(&self.fail_review_delete, "review delete")?;
        self.inner.delete_review(id).await
    }

    async fn list_reviews(&self, query: &ReviewQuery) -> Result<Vec<Review>, StoreError> {
        self.inner.list_reviews(query).await
    }
}

/// Ranking store that is permanently down.
pub struct DownRankingStore;

#[async_trait]
impl RankingStore for DownRankingStore {
    async fn upsert_score(&self, _: &str, _: &str, _: f64) -> Result<(), RankingError> {
        Err(RankingError::Unavailable("connection refused".into()))
    }
    async fn reverse_range_with_scores(
        &self,
        _: &str,
        _: usize,
        _: usize,
    ) -> Result<Vec<(String, f64)>, RankingError> {
        Err(RankingError::Unavailable("connection refused".into()))
    }
    async fn reverse_rank(&self, _: &str, _: &str) -> Result<Option<usize>, RankingError> {
        Err(RankingError::Unavailable("connection refused".into()))
    }
    async fn remove_member(&self, _: &str, _: &str) -> Result<(), RankingError> {
        Err(RankingError::Unavailable("connection refused".into()))
    }
    async fn put_detail(&self, _: &str, _: &str) -> Result<(), RankingError> {
        Err(RankingError::Unavailable("connection refused".into()))
    }
    async fn get_detail(&self, _: &str) -> Result<Option<String>, RankingError> {
        Err(RankingError::Unavailable("connection refused".into()))
    }
    async fn delete_detail(&self, _: &str) -> Result<(), RankingError> {
        Err(RankingError::Unavailable("connection refused".into()))
    }
    async fn ping(&self) -> Result<(), RankingError> {
        Err(RankingError::Unavailable("connection refused".into()))
    }
}

/// Everything a pipeline needs, wired over in-process backends.
pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub cache: RankingCache,
    pub aggregator: Arc<ScoreAggregator>,
    pub classifier: Arc<dyn SentimentAnalyzer>,
}

impl Harness {
    pub fn new(classifier: Arc<dyn SentimentAnalyzer>) -> Self {
        Self::with_ranking_store(classifier, Arc::new(InMemoryRankingStore::new()))
    }

    pub fn scoring(score: f64) -> Self {
        Self::new(Arc::new(StaticAnalyzer(classification(score))))
    }

    pub fn with_ranking_store(
        classifier: Arc<dyn SentimentAnalyzer>,
        ranking_store: Arc<dyn RankingStore>,
    ) -> Self {
        let store = Arc::new(FlakyStore::default());
        let cache = RankingCache::new(
            ranking_store,
            &LeaderboardConfig::new(RankingStoreType::Memory),
        );
        let aggregator = Arc::new(ScoreAggregator::new(store.clone()));
        Harness {
            store,
            cache,
            aggregator,
            classifier,
        }
    }

    pub fn ingestion(&self) -> ReviewIngestionPipeline {
        ReviewIngestionPipeline::new(
            self.store.clone(),
            self.classifier.clone(),
            self.aggregator.clone(),
            self.cache.clone(),
        )
    }

    pub fn retraction(&self) -> ReviewRetractionFlow {
        ReviewRetractionFlow::new(self.store.clone(), self.aggregator.clone(), self.cache.clone())
    }

    pub fn service(&self) -> ReviewService {
        ReviewService::from_parts(
            self.store.clone(),
            self.aggregator.clone(),
            self.cache.clone(),
            self.ingestion(),
            self.retraction(),
        )
    }

    pub async fn restaurant(&self, name: &str) -> Restaurant {
        self.store
            .insert_restaurant(&RestaurantDetails {
                name: name.into(),
                cuisine_type: Some("Italian".into()),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn reload(&self, id: RestaurantId) -> Restaurant {
        self.store.get_restaurant(id).await.unwrap().unwrap()
    }
}
