use std::collections::HashSet;
use std::time::Duration;
use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use crate::config::{SentimentBackendKind, SentimentConfig};
use crate::data::cache::SentimentCache;
use crate::data::types::{SentimentLabel, SentimentSignal};
use crate::error::PipelineError;

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "growth", "growing", "boom", "booming", "rise", "rising",
    "strong", "demand", "appreciation", "appreciate", "gain", "gains", "profit", "profitable",
    "improve", "improving", "upbeat", "optimistic", "bullish", "surge", "safe", "stable",
    "affordable", "opportunity", "recovery", "positive",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "poor", "decline", "declining", "fall", "falling", "drop", "crash", "slump",
    "weak", "oversupply", "glut", "loss", "losses", "risky", "bearish", "pessimistic",
    "stagnant", "stagnation", "expensive", "overpriced", "bubble", "uncertain", "uncertainty",
    "negative", "default", "slowdown", "recession",
];

const NEGATIONS: &[&str] = &["not", "no", "never", "without", "hardly"];

/// Outcome of asking the sentiment engine, with the failure kept as data
#[derive(Debug, Clone, PartialEq)]
pub enum SentimentResolution {
    Signal(SentimentSignal),
    Unavailable(PipelineError),
}

impl SentimentResolution {
    pub fn is_available(&self) -> bool {
        matches!(self, SentimentResolution::Signal(_))
    }

    /// Neutral 50.0 stands in for an unreachable engine
    pub fn or_neutral(self) -> SentimentSignal {
        match self {
            SentimentResolution::Signal(signal) => signal,
            SentimentResolution::Unavailable(_) => SentimentSignal::neutral(),
        }
    }
}

/// Built-in word-list scorer, deterministic and offline
pub struct LexiconScorer {
    token_re: Regex,
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

impl LexiconScorer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            token_re: Regex::new(r"[a-z]+(?:'[a-z]+)?")?,
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
        })
    }

    pub fn score(&self, text: &str) -> SentimentSignal {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = self.token_re.find_iter(&lowered).map(|m| m.as_str()).collect();

        let mut positive_hits = 0usize;
        let mut negative_hits = 0usize;
        for (i, token) in tokens.iter().enumerate() {
            let negated = i > 0 && NEGATIONS.contains(&tokens[i - 1]);
            let polarity = if self.positive.contains(token) {
                1
            } else if self.negative.contains(token) {
                -1
            } else {
                0
            };
            match (polarity, negated) {
                (1, false) | (-1, true) => positive_hits += 1,
                (-1, false) | (1, true) => negative_hits += 1,
                _ => {}
            }
        }

        // +1 smoothing keeps a single hit away from the extremes
        let balance = positive_hits as f64 - negative_hits as f64;
        let score = 50.0 + 50.0 * balance / (positive_hits + negative_hits + 1) as f64;

        SentimentSignal {
            label: label_for_score(score),
            score,
            raw: json!({
                "engine": "lexicon",
                "tokens": tokens.len(),
                "positive_hits": positive_hits,
                "negative_hits": negative_hits,
            }),
        }
    }
}

fn label_for_score(score: f64) -> SentimentLabel {
    if score >= 60.0 {
        SentimentLabel::Positive
    } else if score <= 40.0 {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// HTTP client for an external sentiment service
pub struct RemoteSentimentClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    label: String,
    score: f64,
    #[serde(default)]
    raw: serde_json::Value,
}

impl RemoteSentimentClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build sentiment HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn analyze(&self, request: AnalyzeRequest<'_>) -> Result<SentimentSignal, PipelineError> {
        let url = format!("{}/analyze", self.base_url);

        let response: AnalyzeResponse = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::ExternalService(format!("sentiment request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| PipelineError::ExternalService(format!("bad sentiment response: {}", e)))?;

        let label = SentimentLabel::parse(&response.label).ok_or_else(|| {
            PipelineError::ExternalService(format!("unknown sentiment label '{}'", response.label))
        })?;
        if !response.score.is_finite() {
            return Err(PipelineError::ExternalService(
                "sentiment score is not finite".to_string(),
            ));
        }

        Ok(SentimentSignal {
            label,
            score: response.score.clamp(0.0, 100.0),
            raw: response.raw,
        })
    }
}

pub enum SentimentEngine {
    Lexicon(LexiconScorer),
    Remote(RemoteSentimentClient),
    Disabled,
}

impl SentimentEngine {
    pub fn from_config(config: &SentimentConfig) -> Result<Self> {
        match config.backend {
            SentimentBackendKind::Lexicon => Ok(SentimentEngine::Lexicon(LexiconScorer::new()?)),
            SentimentBackendKind::Remote => {
                let url = config
                    .service_url
                    .clone()
                    .context("sentiment.backend = \"remote\" needs a service_url")?;
                let client =
                    RemoteSentimentClient::new(url, Duration::from_millis(config.timeout_ms))?;
                Ok(SentimentEngine::Remote(client))
            }
            SentimentBackendKind::Disabled => Ok(SentimentEngine::Disabled),
        }
    }

    pub async fn analyze_text(&self, text: &str) -> Result<SentimentSignal, PipelineError> {
        match self {
            SentimentEngine::Lexicon(scorer) => Ok(scorer.score(text)),
            SentimentEngine::Remote(client) => {
                client
                    .analyze(AnalyzeRequest { text: Some(text), topic: None })
                    .await
            }
            SentimentEngine::Disabled => Err(disabled()),
        }
    }

    pub async fn analyze_topic(&self, topic: &str) -> Result<SentimentSignal, PipelineError> {
        match self {
            SentimentEngine::Lexicon(scorer) => Ok(scorer.score(topic)),
            SentimentEngine::Remote(client) => {
                client
                    .analyze(AnalyzeRequest { text: None, topic: Some(topic) })
                    .await
            }
            SentimentEngine::Disabled => Err(disabled()),
        }
    }
}

fn disabled() -> PipelineError {
    PipelineError::ExternalService("sentiment engine disabled".to_string())
}

/// Picks user text over topic lookup and caches topic results
pub struct SentimentResolver {
    engine: SentimentEngine,
    cache: SentimentCache,
    default_topic: String,
}

impl SentimentResolver {
    pub fn new(engine: SentimentEngine, cache_ttl: Duration, default_topic: String) -> Self {
        Self {
            engine,
            cache: SentimentCache::new(cache_ttl),
            default_topic,
        }
    }

    /// Bound the number of cached topics
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = SentimentCache::with_capacity(self.cache.ttl(), capacity);
        self
    }

    pub async fn analyze_text(&self, text: &str) -> SentimentResolution {
        match self.engine.analyze_text(text).await {
            Ok(signal) => SentimentResolution::Signal(signal),
            Err(e) => {
                warn!("Sentiment analysis unavailable: {}", e);
                SentimentResolution::Unavailable(e)
            }
        }
    }

    /// User text when present, otherwise the location (or default topic)
    pub async fn resolve(&self, text: Option<&str>, location: &str) -> SentimentResolution {
        if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
            return self.analyze_text(text).await;
        }

        let topic = if location.trim().is_empty() {
            self.default_topic.as_str()
        } else {
            location.trim()
        };

        if let Some(signal) = self.cache.get(topic) {
            debug!("Sentiment cache hit for topic '{}'", topic);
            return SentimentResolution::Signal(signal);
        }

        match self.engine.analyze_topic(topic).await {
            Ok(signal) => {
                self.cache.insert(topic, signal.clone());
                SentimentResolution::Signal(signal)
            }
            Err(e) => {
                warn!("Topic sentiment for '{}' unavailable: {}", topic, e);
                SentimentResolution::Unavailable(e)
            }
        }
    }
}
