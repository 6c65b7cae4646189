use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
            SentimentLabel::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one piece of review text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: SentimentLabel,
    /// Signed: positive reviews score above zero, negative below.
    pub score: f64,
    /// In `0.0..=1.0`.
    pub confidence: f64,
    pub is_positive: Option<bool>,
}

impl Classification {
    /// The neutral result substituted whenever the service cannot produce one.
    pub const fn fallback() -> Self {
        Classification {
            label: SentimentLabel::Neutral,
            score: 0.0,
            confidence: 0.5,
            is_positive: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

#[derive(Serialize)]
pub(crate) struct AnalyzeRequest<'a> {
    pub text: &'a str,
}

#[derive(Deserialize, Debug)]
pub(crate) struct AnalyzeResponse {
    pub sentiment: SentimentLabel,
    pub score: f64,
    pub confidence: f64,
    pub is_positive: Option<bool>,
    #[allow(dead_code)]
    pub processed_at: Option<String>,
}

impl From<AnalyzeResponse> for Classification {
    fn from(response: AnalyzeResponse) -> Self {
        Classification {
            label: response.sentiment,
            score: response.score,
            confidence: response.confidence,
            is_positive: response.is_positive,
        }
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct HealthResponse {
    pub status: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ReadyResponse {
    #[serde(default)]
    pub model_ready: bool,
}
