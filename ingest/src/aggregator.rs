use crate::errors::{Result, ReviewError};
use crate::metrics_defs::AGGREGATE_LOCK_WAIT;
use crate::store::ReviewStore;
use crate::types::{Aggregate, Restaurant, RestaurantDetails, RestaurantId};
use chrono::Utc;
use parking_lot::Mutex;
use shared::histogram;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type KeyLocks = Arc<Mutex<HashMap<RestaurantId, Arc<AsyncMutex<()>>>>>;

/// Serializes read-modify-write of restaurant records per restaurant id.
///
/// Holders of an [`AggregateGuard`] for one restaurant exclude each other;
/// guards for different restaurants never contend. Lock entries live only
/// while some task holds or waits for them.
pub struct ScoreAggregator {
    store: Arc<dyn ReviewStore>,
    locks: KeyLocks,
}

impl ScoreAggregator {
    pub fn new(store: Arc<dyn ReviewStore>) -> Self {
        ScoreAggregator {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn lock(&self, restaurant_id: RestaurantId) -> AggregateGuard {
        let start = Instant::now();
        let key_lock = self.locks.lock().entry(restaurant_id).or_default().clone();
        let permit = key_lock.lock_owned().await;
        histogram!(AGGREGATE_LOCK_WAIT).record(start.elapsed().as_secs_f64());

        AggregateGuard {
            restaurant_id,
            store: self.store.clone(),
            locks: self.locks.clone(),
            _permit: permit,
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Exclusive access to one restaurant's record. Every mutation reloads the
/// restaurant from the store, so the guard never works on a stale copy.
pub struct AggregateGuard {
    restaurant_id: RestaurantId,
    store: Arc<dyn ReviewStore>,
    locks: KeyLocks,
    _permit: OwnedMutexGuard<()>,
}

impl AggregateGuard {
    pub fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    pub async fn load(&self) -> Result<Restaurant> {
        self.store
            .get_restaurant(self.restaurant_id)
            .await?
            .ok_or(ReviewError::RestaurantNotFound(self.restaurant_id))
    }

    /// Adds `score` to the total and bumps the count.
    pub async fn apply_new_review(&self, score: f64) -> Result<Restaurant> {
        self.update(|r| r.aggregate = r.aggregate.with_new_review(score))
            .await
    }

    /// Takes `score` back out of the aggregate; removing the last review
    /// resets it to empty.
    pub async fn apply_removal(&self, score: f64) -> Result<Restaurant> {
        self.update(|r| r.aggregate = r.aggregate.with_removal(score))
            .await
    }

    /// Puts back an aggregate captured earlier under this same guard.
    pub async fn restore(&self, aggregate: Aggregate) -> Result<Restaurant> {
        self.update(|r| r.aggregate = aggregate).await
    }

    /// Replaces descriptive fields, leaving the aggregate untouched.
    pub async fn update_details(&self, details: &RestaurantDetails) -> Result<Restaurant> {
        self.update(|r| {
            r.name = details.name.clone();
            r.description = details.description.clone();
            r.address = details.address.clone();
            r.cuisine_type = details.cuisine_type.clone();
        })
        .await
    }

    async fn update(&self, apply: impl FnOnce(&mut Restaurant) + Send) -> Result<Restaurant> {
        let mut restaurant = self.load().await?;
        apply(&mut restaurant);
        restaurant.updated_at = Utc::now();
        self.store.save_restaurant(&restaurant).await?;
        Ok(restaurant)
    }
}

impl Drop for AggregateGuard {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // One reference is the map's, the other is our permit's. Anything
        // more is a waiter that still needs the entry.
        if locks
            .get(&self.restaurant_id)
            .is_some_and(|key_lock| Arc::strong_count(key_lock) == 2)
        {
            locks.remove(&self.restaurant_id);
        }
    }
}
