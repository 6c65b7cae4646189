use crate::config::{Config, LoggingConfig, MetricsConfig};
use leaderboard::{RankingCache, RankingError};
use metrics_exporter_statsd::StatsdBuilder;
use sentiment::{ClassifierError, SentimentAnalyzer, SentimentClassifier};
use shared::admin_service::{AdminService, ComponentStatus};
use shared::http::run_http_service;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("classifier setup failed: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("ranking store error: {0}")]
    Ranking(#[from] RankingError),
    #[error("metrics setup failed: {0}")]
    Metrics(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Installs the fmt subscriber and, when a DSN is configured, Sentry with its
/// tracing layer. The returned guard flushes Sentry on drop.
pub fn init_logging(config: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(sentry_layer)
        .init();

    guard
}

/// Routes the `metrics` facade to statsd and registers every metric description.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), AppError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(&config.prefix))
        .map_err(|e| AppError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder)
        .map_err(|_| AppError::Metrics("a metrics recorder is already installed".into()))?;

    for defs in [
        sentiment::metrics_defs::ALL_METRICS,
        leaderboard::metrics_defs::ALL_METRICS,
    ] {
        shared::metrics_defs::describe_all(defs);
    }
    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Metrics exporter installed"
    );
    Ok(())
}

/// Last polled state of the dependencies reported on `/ready`.
#[derive(Default)]
pub struct Readiness {
    classifier: AtomicBool,
}

impl Readiness {
    pub fn components(&self) -> ComponentStatus {
        ComponentStatus::from([("classifier", self.classifier.load(Ordering::Relaxed))])
    }
}

/// Refreshes `readiness` every `interval`. Ranking cache reachability is
/// logged but never gates readiness, since the cache is best-effort.
pub async fn monitor_readiness(
    classifier: Arc<dyn SentimentAnalyzer>,
    cache: RankingCache,
    readiness: Arc<Readiness>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut cache_reachable = true;

    loop {
        ticker.tick().await;

        let ready = classifier.is_ready().await;
        let was_ready = readiness.classifier.swap(ready, Ordering::Relaxed);
        if ready != was_ready {
            tracing::info!(ready, "Classifier readiness changed");
        }
        if !ready && !classifier.is_healthy().await {
            tracing::warn!("Classification service is unreachable or unhealthy");
        }

        let reachable = cache.ping().await.is_ok();
        if reachable != cache_reachable {
            if reachable {
                tracing::info!("Ranking cache reachable again");
            } else {
                tracing::warn!("Ranking cache unreachable, rankings will go stale");
            }
            cache_reachable = reachable;
        }
    }
}

async fn build_cache(config: &Config) -> Result<RankingCache, AppError> {
    let store = leaderboard::get_store(&config.leaderboard.store).await?;
    Ok(RankingCache::new(store, &config.leaderboard))
}

/// Serves the admin endpoints and keeps the readiness monitor running
/// until ctrl-c.
pub async fn run(config: Config) -> Result<(), AppError> {
    let classifier: Arc<dyn SentimentAnalyzer> =
        Arc::new(SentimentClassifier::new(config.classifier.clone())?);
    let cache = build_cache(&config).await?;
    tracing::info!(key = %config.leaderboard.key, "Dependencies initialized");

    let readiness = Arc::new(Readiness::default());
    let monitor = tokio::spawn(monitor_readiness(
        classifier,
        cache,
        readiness.clone(),
        config.classifier.readiness_poll_interval(),
    ));

    let admin = AdminService::<_, AppError>::new(move || readiness.components());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
    };

    let result = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin,
        shutdown,
    )
    .await;
    monitor.abort();
    result
}

/// One-shot classification. Prints the fallback when the service cannot answer.
pub async fn classify(config: Config, text: &str) -> Result<(), AppError> {
    let classifier = SentimentClassifier::new(config.classifier)?;
    let classification = classifier.classify(text).await;
    if classification.is_fallback() {
        tracing::warn!("Classification service did not answer, showing fallback");
    }
    println!("{}", serde_json::to_string_pretty(&classification)?);
    Ok(())
}

pub async fn leaderboard(config: Config, limit: usize) -> Result<(), AppError> {
    let cache = build_cache(&config).await?;
    let ranked = cache.top_k(limit).await?;
    println!("{}", serde_json::to_string_pretty(&ranked)?);
    Ok(())
}

pub async fn rank(config: Config, restaurant_id: u64) -> Result<(), AppError> {
    let cache = build_cache(&config).await?;
    match cache.rank_of(restaurant_id).await? {
        Some(rank) => println!("restaurant {restaurant_id}: rank {rank}"),
        None => println!("restaurant {restaurant_id}: not ranked"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use leaderboard::{InMemoryRankingStore, LeaderboardConfig, RankingStoreType};
    use sentiment::Classification;

    struct FlippingAnalyzer {
        ready: AtomicBool,
    }

    #[async_trait]
    impl SentimentAnalyzer for FlippingAnalyzer {
        async fn classify(&self, _text: &str) -> Classification {
            Classification::fallback()
        }

        async fn is_ready(&self) -> bool {
            self.ready.load(Ordering::Relaxed)
        }

        async fn is_healthy(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_readiness_monitor_tracks_classifier() {
        let analyzer = Arc::new(FlippingAnalyzer {
            ready: AtomicBool::new(false),
        });
        let cache = RankingCache::new(
            Arc::new(InMemoryRankingStore::new()),
            &LeaderboardConfig::new(RankingStoreType::Memory),
        );
        let readiness = Arc::new(Readiness::default());

        let monitor = tokio::spawn(monitor_readiness(
            analyzer.clone(),
            cache,
            readiness.clone(),
            Duration::from_millis(10),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(readiness.components()["classifier"], false);

        analyzer.ready.store(true, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(readiness.components()["classifier"], true);

        monitor.abort();
    }
}
