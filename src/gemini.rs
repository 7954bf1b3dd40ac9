use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use bytes::Bytes;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use url::Url;

use crate::oracle::{MISSING_KEY_MESSAGE, MarketOracle, SummaryOutcome, summary_failure_message};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    /// Must end with `/`; the `v1beta/...` path is joined onto it.
    pub api_base: Url,
    pub model: String,
    pub user_agent: String,
    pub max_concurrency: usize,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: Url,
    semaphore: Arc<Semaphore>,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .context("build reqwest client")?;
        let endpoint = config
            .api_base
            .join(&format!("v1beta/models/{}:generateContent", config.model))
            .with_context(|| format!("build endpoint from {}", config.api_base))?;
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        if api_key.is_none() {
            tracing::warn!("no Gemini API key configured; ticker validation will fail closed");
        }
        Ok(Self {
            client,
            api_key,
            endpoint,
            semaphore: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn generate(&self, prompt: &str, temperature: Option<f32>) -> anyhow::Result<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Gemini API key is not set"))?;
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: temperature.map(|temperature| GenerationConfig { temperature }),
        };
        let body = self.post_json(key, &request).await?;
        let response: GenerateResponse =
            serde_json::from_slice(&body).context("parse generateContent response")?;
        response
            .text()
            .ok_or_else(|| anyhow!("generateContent response carried no text"))
    }

    async fn post_json(&self, key: &str, request: &GenerateRequest<'_>) -> anyhow::Result<Bytes> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .context("acquire request permit")?;

        let mut backoff = Duration::from_millis(250);
        let max_attempts = 5usize;

        for attempt in 1..=max_attempts {
            let resp = self
                .client
                .post(self.endpoint.clone())
                .header(API_KEY_HEADER, key)
                .json(request)
                .send()
                .await
                .with_context(|| format!("POST {}", self.endpoint))?;

            let status = resp.status();
            let headers = resp.headers().clone();

            if status.is_success() {
                return resp.bytes().await.context("read response body");
            }

            if status.as_u16() == 429 || status.as_u16() == 503 {
                if attempt == max_attempts {
                    break;
                }
                let wait = retry_after_duration(&headers).unwrap_or(backoff);
                tracing::warn!(
                    %status,
                    attempt,
                    wait_ms = wait.as_millis(),
                    "throttled; backing off"
                );
                tokio::time::sleep(wait).await;
                backoff = (backoff * 2).min(Duration::from_secs(10));
                continue;
            }

            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "POST {} failed with status {}: {}",
                self.endpoint,
                status,
                text.trim()
            ));
        }

        Err(anyhow!(
            "POST {} still throttled after {max_attempts} attempts",
            self.endpoint
        ))
    }
}

impl MarketOracle for GeminiClient {
    async fn validate_ticker(&self, ticker: &str) -> bool {
        if !self.has_api_key() {
            tracing::error!(ticker, "API key is not set; ticker treated as invalid");
            return false;
        }
        match self.generate(&validation_prompt(ticker), Some(0.1)).await {
            Ok(answer) => {
                let valid = parse_verdict(&answer);
                tracing::debug!(ticker, valid, answer = answer.trim(), "ticker verdict");
                valid
            }
            Err(err) => {
                tracing::warn!(ticker, "ticker validation failed: {err:#}");
                false
            }
        }
    }

    async fn fetch_summary(&self, ticker: &str) -> SummaryOutcome {
        if !self.has_api_key() {
            return SummaryOutcome::Failed(MISSING_KEY_MESSAGE.to_string());
        }
        match self.generate(&summary_prompt(ticker), None).await {
            Ok(text) => SummaryOutcome::Summary(text.trim().to_string()),
            Err(err) => {
                tracing::warn!(ticker, "summary fetch failed: {err:#}");
                SummaryOutcome::Failed(summary_failure_message(ticker))
            }
        }
    }
}

fn validation_prompt(ticker: &str) -> String {
    format!(
        "Is \"{ticker}\" a valid stock ticker symbol for a company listed on a major US stock \
         exchange (like NYSE or NASDAQ)? Examples of valid tickers are AAPL, GOOGL. Respond with \
         only the word \"VALID\" or \"INVALID\"."
    )
}

fn summary_prompt(ticker: &str) -> String {
    format!(
        "Give a short summary of the US-listed stock with ticker {ticker}. Cover its main \
         business, market position and recent performance. Keep it concise and useful to an \
         investor."
    )
}

/// Only an answer that is exactly `VALID` (ignoring case, whitespace and
/// surrounding punctuation) counts; `INVALID` or anything chatty is rejected.
pub fn parse_verdict(answer: &str) -> bool {
    let word = answer.trim().trim_matches(|c: char| !c.is_alphanumeric());
    word.eq_ignore_ascii_case("VALID")
}

fn retry_after_duration(headers: &HeaderMap) -> Option<Duration> {
    let v = headers.get(RETRY_AFTER)?;
    let s = v.to_str().ok()?.trim();
    let seconds: u64 = s.parse().ok()?;
    Some(Duration::from_secs(seconds))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}
