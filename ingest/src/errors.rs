use crate::store::StoreError;
use crate::types::{RestaurantId, ReviewId};
use thiserror::Error;

/// Result type alias for review operations
pub type Result<T, E = ReviewError> = std::result::Result<T, E>;

/// Errors surfaced to callers of [`crate::service::ReviewService`].
///
/// Classification and cache failures never appear here: they are resolved
/// to a fallback or logged inside the pipelines.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("restaurant {0} not found")]
    RestaurantNotFound(RestaurantId),

    #[error("review {0} not found")]
    ReviewNotFound(ReviewId),

    #[error("restaurant named {0} already exists")]
    DuplicateRestaurant(String),

    #[error("persistence failed: {0}")]
    Persistence(StoreError),

    /// The task running the durable writes panicked or was aborted.
    #[error("review operation interrupted: {0}")]
    Interrupted(String),
}

impl ReviewError {
    /// Whether the error was caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        match self {
            ReviewError::RestaurantNotFound(_)
            | ReviewError::ReviewNotFound(_)
            | ReviewError::DuplicateRestaurant(_) => true,
            ReviewError::Persistence(_) | ReviewError::Interrupted(_) => false,
        }
    }
}

impl From<StoreError> for ReviewError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::RestaurantMissing(id) => ReviewError::RestaurantNotFound(id),
            e => ReviewError::Persistence(e),
        }
    }
}

impl From<tokio::task::JoinError> for ReviewError {
    fn from(e: tokio::task::JoinError) -> Self {
        ReviewError::Interrupted(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(ReviewError::RestaurantNotFound(1).is_client_error());
        assert!(ReviewError::ReviewNotFound(1).is_client_error());
        assert!(ReviewError::DuplicateRestaurant("x".into()).is_client_error());
        assert!(!ReviewError::Persistence(StoreError::Unavailable("db".into())).is_client_error());
        assert!(!ReviewError::Interrupted("panic".into()).is_client_error());
    }

    #[test]
    fn test_missing_restaurant_is_not_found() {
        let err: ReviewError = StoreError::RestaurantMissing(9).into();
        assert!(matches!(err, ReviewError::RestaurantNotFound(9)));
        assert!(err.is_client_error());

        let err: ReviewError = StoreError::Conflict("name".into()).into();
        assert!(matches!(err, ReviewError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_join_error_maps_to_interrupted() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err: ReviewError = handle.await.unwrap_err().into();
        assert!(matches!(err, ReviewError::Interrupted(_)));
    }
}
