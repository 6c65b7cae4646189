use crate::types::{
    NewReview, Restaurant, RestaurantDetails, RestaurantId, Review, ReviewId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sentiment::SentimentLabel;
use std::collections::HashMap;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("restaurant {0} does not exist")]
    RestaurantMissing(RestaurantId),
}

/// Filter for listing reviews. Results are newest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReviewQuery {
    pub restaurant_id: RestaurantId,
    pub label: Option<SentimentLabel>,
    pub since: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ReviewQuery {
    pub fn for_restaurant(restaurant_id: RestaurantId) -> Self {
        ReviewQuery {
            restaurant_id,
            ..Default::default()
        }
    }

    fn matches(&self, review: &Review) -> bool {
        review.restaurant_id == self.restaurant_id
            && self.label.is_none_or(|label| review.sentiment_label == label)
            && self.since.is_none_or(|since| review.created_at >= since)
    }
}

/// The durable store: single source of truth for restaurants and reviews.
///
/// Writes are whole-record saves. Callers that read-modify-write a restaurant
/// must serialize through [`crate::aggregator::ScoreAggregator`].
#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn get_restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>, StoreError>;

    /// Case-insensitive lookup.
    async fn find_restaurant_by_name(&self, name: &str)
    -> Result<Option<Restaurant>, StoreError>;

    /// Persists a new restaurant with an empty aggregate. Fails with
    /// `Conflict` when the name is taken.
    async fn insert_restaurant(&self, details: &RestaurantDetails)
    -> Result<Restaurant, StoreError>;

    /// Overwrites an existing restaurant. Fails with `RestaurantMissing` when
    /// it was deleted and `Conflict` when a rename collides.
    async fn save_restaurant(&self, restaurant: &Restaurant) -> Result<(), StoreError>;

    /// Deletes the restaurant along with every review it owns.
    async fn delete_restaurant(&self, id: RestaurantId) -> Result<(), StoreError>;

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>, StoreError>;

    /// Fails with `RestaurantMissing` when the owning restaurant is gone.
    async fn insert_review(&self, review: NewReview) -> Result<Review, StoreError>;

    async fn delete_review(&self, id: ReviewId) -> Result<(), StoreError>;

    async fn list_reviews(&self, query: &ReviewQuery) -> Result<Vec<Review>, StoreError>;
}

#[derive(Default)]
struct Tables {
    restaurants: HashMap<RestaurantId, Restaurant>,
    reviews: HashMap<ReviewId, Review>,
    next_restaurant_id: RestaurantId,
    next_review_id: ReviewId,
}

/// Process-local store. Ids start at 1.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn name_taken(tables: &Tables, name: &str, except: Option<RestaurantId>) -> bool {
    tables
        .restaurants
        .values()
        .any(|r| Some(r.id) != except && r.name.eq_ignore_ascii_case(name))
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn get_restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>, StoreError> {
        Ok(self.tables.read().restaurants.get(&id).cloned())
    }

    async fn find_restaurant_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Restaurant>, StoreError> {
        Ok(self
            .tables
            .read()
            .restaurants
            .values()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn insert_restaurant(
        &self,
        details: &RestaurantDetails,
    ) -> Result<Restaurant, StoreError> {
        let mut tables = self.tables.write();
        if name_taken(&tables, &details.name, None) {
            return Err(StoreError::Conflict(format!(
                "restaurant name {} already exists",
                details.name
            )));
        }

        tables.next_restaurant_id += 1;
        let now = Utc::now();
        let restaurant = Restaurant {
            id: tables.next_restaurant_id,
            name: details.name.clone(),
            description: details.description.clone(),
            address: details.address.clone(),
            cuisine_type: details.cuisine_type.clone(),
            aggregate: Default::default(),
            created_at: now,
            updated_at: now,
        };
        tables.restaurants.insert(restaurant.id, restaurant.clone());
        Ok(restaurant)
    }

    async fn save_restaurant(&self, restaurant: &Restaurant) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if !tables.restaurants.contains_key(&restaurant.id) {
            return Err(StoreError::RestaurantMissing(restaurant.id));
        }
        if name_taken(&tables, &restaurant.name, Some(restaurant.id)) {
            return Err(StoreError::Conflict(format!(
                "restaurant name {} already exists",
                restaurant.name
            )));
        }
        tables.restaurants.insert(restaurant.id, restaurant.clone());
        Ok(())
    }

    async fn delete_restaurant(&self, id: RestaurantId) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        tables.reviews.retain(|_, review| review.restaurant_id != id);
        tables.restaurants.remove(&id);
        Ok(())
    }

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>, StoreError> {
        Ok(self.tables.read().reviews.get(&id).cloned())
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, StoreError> {
        let mut tables = self.tables.write();
        if !tables.restaurants.contains_key(&review.restaurant_id) {
            return Err(StoreError::RestaurantMissing(review.restaurant_id));
        }

        tables.next_review_id += 1;
        let classification = review.classification;
        let review = Review {
            id: tables.next_review_id,
            restaurant_id: review.restaurant_id,
            text: review.text,
            reviewer_name: review.reviewer_name,
            sentiment_label: classification.label,
            sentiment_score: classification.score,
            confidence: classification.confidence,
            is_positive: classification.is_positive,
            created_at: Utc::now(),
        };
        tables.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn delete_review(&self, id: ReviewId) -> Result<(), StoreError> {
        self.tables.write().reviews.remove(&id);
        Ok(())
    }

    async fn list_reviews(&self, query: &ReviewQuery) -> Result<Vec<Review>, StoreError> {
        let tables = self.tables.read();
        let mut reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|review| query.matches(review))
            .cloned()
            .collect();
        // Ids are monotonic, so they break ties between equal timestamps
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(reviews
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }
}
