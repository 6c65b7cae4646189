use crate::config::ClassifierConfig;
use crate::metrics_defs::{
    CLASSIFY_DURATION, CLASSIFY_FALLBACKS, CLASSIFY_REQUESTS, CLASSIFY_RETRIES,
};
use crate::types::{
    AnalyzeRequest, AnalyzeResponse, Classification, HealthResponse, ReadyResponse,
};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use shared::{counter, histogram};
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

const PREVIEW_CHARS: usize = 50;

#[derive(thiserror::Error, Debug)]
pub enum ClassifierError {
    /// The service is up but its model is still loading. This is the only
    /// error the retry loop acts on.
    #[error("classification service not ready")]
    NotReady,
    #[error("classification service returned {0}")]
    UnexpectedStatus(StatusCode),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("classification did not complete within {0:?}")]
    DeadlineExceeded(Duration),
}

impl ClassifierError {
    fn reason(&self) -> &'static str {
        match self {
            ClassifierError::NotReady => "not_ready",
            ClassifierError::UnexpectedStatus(_) => "status",
            ClassifierError::Http(_) => "http",
            ClassifierError::InvalidResponse(_) => "invalid_response",
            ClassifierError::InvalidUrl(_) => "invalid_url",
            ClassifierError::DeadlineExceeded(_) => "deadline",
        }
    }
}

/// Anything that can turn review text into a [`Classification`].
///
/// Implementations must not fail: errors are resolved to
/// [`Classification::fallback`] before returning.
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn classify(&self, text: &str) -> Classification;

    /// True only once the remote model reports it is loaded.
    async fn is_ready(&self) -> bool;

    /// True when the service reports itself healthy or degraded.
    async fn is_healthy(&self) -> bool;
}

pub struct SentimentClassifier {
    client: reqwest::Client,
    analyze_url: Url,
    ready_url: Url,
    health_url: Url,
    config: ClassifierConfig,
}

impl SentimentClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        Ok(SentimentClassifier {
            client: reqwest::Client::new(),
            analyze_url: endpoint(&config.url, "analyze")?,
            ready_url: endpoint(&config.url, "ready")?,
            health_url: endpoint(&config.url, "health")?,
            config,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classifies `text`, retrying while the service reports not ready and
    /// falling back to a neutral result on any other failure or once the
    /// overall deadline passes.
    pub async fn classify(&self, text: &str) -> Classification {
        debug!(preview = %preview(text), "Analyzing sentiment");
        counter!(CLASSIFY_REQUESTS).increment(1);

        let started = Instant::now();
        let deadline = self.config.timeout();
        let result = match timeout(deadline, self.classify_with_retries(text)).await {
            Ok(result) => result,
            // Dropping the retry future cancels any in-flight request or backoff sleep
            Err(_) => Err(ClassifierError::DeadlineExceeded(deadline)),
        };
        histogram!(CLASSIFY_DURATION).record(started.elapsed().as_secs_f64());

        match result {
            Ok(classification) => {
                info!(
                    label = %classification.label,
                    confidence = classification.confidence,
                    "Sentiment analysis completed"
                );
                classification
            }
            Err(err) => {
                warn!(error = %err, "Sentiment analysis failed, using fallback classification");
                counter!(CLASSIFY_FALLBACKS, "reason" => err.reason()).increment(1);
                Classification::fallback()
            }
        }
    }

    async fn classify_with_retries(&self, text: &str) -> Result<Classification, ClassifierError> {
        let mut retries = 0;

        loop {
            match self.analyze(text).await {
                Err(ClassifierError::NotReady) if retries < self.config.max_retries => {
                    let delay = self.config.backoff_delay(retries);
                    warn!(
                        retry = retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Classification service not ready, will retry"
                    );
                    counter!(CLASSIFY_RETRIES).increment(1);
                    sleep(delay).await;
                    retries += 1;
                }
                result => return result,
            }
        }
    }

    async fn analyze(&self, text: &str) -> Result<Classification, ClassifierError> {
        let response = self
            .client
            .post(self.analyze_url.clone())
            .json(&AnalyzeRequest { text })
            .send()
            .await?;

        match response.status() {
            StatusCode::SERVICE_UNAVAILABLE => Err(ClassifierError::NotReady),
            status if status.is_success() => {
                let body = response
                    .json::<AnalyzeResponse>()
                    .await
                    .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

                if !body.score.is_finite() || !(0.0..=1.0).contains(&body.confidence) {
                    return Err(ClassifierError::InvalidResponse(format!(
                        "score {} / confidence {} out of range",
                        body.score, body.confidence
                    )));
                }

                Ok(body.into())
            }
            status => Err(ClassifierError::UnexpectedStatus(status)),
        }
    }

    pub async fn is_ready(&self) -> bool {
        match self
            .probe::<ReadyResponse>(&self.ready_url, self.config.ready_timeout())
            .await
        {
            Ok(body) => body.model_ready,
            Err(ClassifierError::NotReady) => {
                debug!("Classification model is still loading");
                false
            }
            Err(err) => {
                warn!(error = %err, "Classification service readiness check failed");
                false
            }
        }
    }

    pub async fn is_healthy(&self) -> bool {
        match self
            .probe::<HealthResponse>(&self.health_url, self.config.health_timeout())
            .await
        {
            Ok(body) => matches!(body.status.as_str(), "healthy" | "degraded"),
            Err(err) => {
                warn!(error = %err, "Classification service health check failed");
                false
            }
        }
    }

    async fn probe<T: DeserializeOwned>(
        &self,
        url: &Url,
        probe_timeout: Duration,
    ) -> Result<T, ClassifierError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(probe_timeout)
            .send()
            .await?;

        match response.status() {
            StatusCode::SERVICE_UNAVAILABLE => Err(ClassifierError::NotReady),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| ClassifierError::InvalidResponse(e.to_string())),
            status => Err(ClassifierError::UnexpectedStatus(status)),
        }
    }
}

#[async_trait]
impl SentimentAnalyzer for SentimentClassifier {
    async fn classify(&self, text: &str) -> Classification {
        SentimentClassifier::classify(self, text).await
    }

    async fn is_ready(&self) -> bool {
        SentimentClassifier::is_ready(self).await
    }

    async fn is_healthy(&self) -> bool {
        SentimentClassifier::is_healthy(self).await
    }
}

fn endpoint(base: &Url, name: &str) -> Result<Url, ClassifierError> {
    let full = format!("{}/{}", base.as_str().trim_end_matches('/'), name);
    Url::parse(&full).map_err(|e| ClassifierError::InvalidUrl(e.to_string()))
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().nth(PREVIEW_CHARS).is_some() {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SentimentLabel;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(uri: &str) -> ClassifierConfig {
        let mut config = ClassifierConfig::new(Url::parse(uri).unwrap());
        config.backoff_base_ms = 10;
        config.timeout_secs = 5;
        config
    }

    fn positive_body() -> serde_json::Value {
        json!({
            "sentiment": "POSITIVE",
            "confidence": 0.97,
            "score": 0.97,
            "is_positive": true,
            "processed_at": "2025-01-01T12:00:00"
        })
    }

    async fn analyze_requests(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/analyze")
            .count()
    }

    #[tokio::test]
    async fn test_classify_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_json(json!({"text": "The pasta was wonderful"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(positive_body()))
            .mount(&server)
            .await;

        let classifier = SentimentClassifier::new(test_config(&server.uri())).unwrap();
        let result = classifier.classify("The pasta was wonderful").await;

        assert_eq!(result.label, SentimentLabel::Positive);
        assert_eq!(result.score, 0.97);
        assert_eq!(result.is_positive, Some(true));
        assert_eq!(analyze_requests(&server).await, 1);
    }

    #[tokio::test]
    async fn test_classify_retries_until_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(positive_body()))
            .mount(&server)
            .await;

        let classifier = SentimentClassifier::new(test_config(&server.uri())).unwrap();
        let result = classifier.classify("Great service").await;

        // Third attempt succeeds: the real result comes back, not the fallback
        assert_eq!(result.label, SentimentLabel::Positive);
        assert!(!result.is_fallback());
        assert_eq!(analyze_requests(&server).await, 3);
    }

    #[tokio::test]
    async fn test_classify_falls_back_when_never_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let classifier = SentimentClassifier::new(test_config(&server.uri())).unwrap();
        let result = classifier.classify("Great service").await;

        assert_eq!(result, Classification::fallback());
        // One initial attempt plus max_retries
        assert_eq!(analyze_requests(&server).await, 4);
    }

    #[tokio::test]
    async fn test_terminal_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let classifier = SentimentClassifier::new(test_config(&server.uri())).unwrap();
        let result = classifier.classify("Cold soup").await;

        assert_eq!(result, Classification::fallback());
        assert_eq!(analyze_requests(&server).await, 1);
    }

    #[tokio::test]
    async fn test_invalid_body_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sentiment": "POSITIVE",
                "confidence": 3.0,
                "score": 0.5,
                "is_positive": true
            })))
            .mount(&server)
            .await;

        let classifier = SentimentClassifier::new(test_config(&server.uri())).unwrap();
        assert_eq!(
            classifier.classify("Fine").await,
            Classification::fallback()
        );
    }

    #[tokio::test]
    async fn test_deadline_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(positive_body())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.timeout_secs = 1;
        let classifier = SentimentClassifier::new(config).unwrap();

        let started = Instant::now();
        let result = classifier.classify("Slow kitchen").await;

        assert_eq!(result, Classification::fallback());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        let classifier = SentimentClassifier::new(test_config("http://127.0.0.1:1")).unwrap();
        assert_eq!(
            classifier.classify("Anything").await,
            Classification::fallback()
        );
        assert!(!classifier.is_ready().await);
        assert!(!classifier.is_healthy().await);
    }

    #[tokio::test]
    async fn test_readiness_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ready"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "status": "not_ready",
                "model_ready": false,
                "model_loading": true
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ready"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ready",
                "model_ready": true
            })))
            .mount(&server)
            .await;

        let classifier = SentimentClassifier::new(test_config(&server.uri())).unwrap();
        assert!(!classifier.is_ready().await);
        assert!(classifier.is_ready().await);
    }

    #[tokio::test]
    async fn test_health_probe() {
        for (status_code, status, expected) in [
            (200, "healthy", true),
            (200, "degraded", true),
            (200, "unhealthy", false),
            (503, "healthy", false),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/health"))
                .respond_with(
                    ResponseTemplate::new(status_code).set_body_json(json!({"status": status})),
                )
                .mount(&server)
                .await;

            let classifier = SentimentClassifier::new(test_config(&server.uri())).unwrap();
            assert_eq!(classifier.is_healthy().await, expected, "{status_code} {status}");
        }
    }

    #[test]
    fn test_endpoint_join() {
        let base = Url::parse("http://nlp:5000/").unwrap();
        assert_eq!(
            endpoint(&base, "analyze").unwrap().as_str(),
            "http://nlp:5000/analyze"
        );

        let nested = Url::parse("http://gateway/nlp").unwrap();
        assert_eq!(
            endpoint(&nested, "ready").unwrap().as_str(),
            "http://gateway/nlp/ready"
        );
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let text = "é".repeat(60);
        let shown = preview(&text);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }
}
