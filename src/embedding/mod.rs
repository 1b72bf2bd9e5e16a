//! 임베딩 모듈 - Gemini API를 통한 조문 벡터화
//!
//! 조문 저장용(RETRIEVAL_DOCUMENT)과 질의용(RETRIEVAL_QUERY) 임베딩을 구분합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::from_env()?;
//! let doc = embedder.embed("第一条 为了保护民事主体的合法权益……").await?;
//! let query = embedder.embed_query("什么是正当防卫？").await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 문서(조문) 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 질의 임베딩 (기본 구현: 문서 임베딩과 동일)
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// source: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

const GEMINI_EMBED_MODEL: &str = "models/gemini-embedding-001";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// 허용 차원 (MRL)
pub const VALID_DIMENSIONS: [usize; 3] = [768, 1536, 3072];

/// Gemini 무료 티어: 60 RPM
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const MIN_DELAY_MS: u64 = 1000;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;

/// 임베딩 용도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// 저장할 조문
    Document,
    /// 사용자 질문
    Query,
}

impl TaskType {
    fn as_api_str(self) -> &'static str {
        match self {
            TaskType::Document => "RETRIEVAL_DOCUMENT",
            TaskType::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    dimension: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// 슬라이딩 윈도우 + 최소 간격 Rate Limiter
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration, min_delay: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay,
            last_request: None,
        }
    }

    /// 다음 요청까지 기다려야 하는 시간
    fn wait_time(&mut self, now: Instant) -> Duration {
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        let mut wait = self
            .last_request
            .map(|last| self.min_delay.saturating_sub(now.duration_since(last)))
            .unwrap_or_default();

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                wait = wait.max(self.window.saturating_sub(now.duration_since(oldest)));
            }
        }

        wait
    }

    /// 요청 가능할 때까지 대기 후 기록
    async fn acquire(&mut self) {
        let wait = self.wait_time(Instant::now());
        if !wait.is_zero() {
            tracing::debug!("Rate limit: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiEmbedding {
    /// 기본 차원(768)으로 생성
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_dimension(api_key, DEFAULT_DIMENSION)
    }

    /// 차원을 지정하여 생성 (768, 1536, 3072)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self> {
        if !VALID_DIMENSIONS.contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            RATE_LIMIT_RPM,
            RATE_LIMIT_WINDOW,
            Duration::from_millis(MIN_DELAY_MS),
        )));

        Ok(Self {
            api_key,
            client,
            dimension,
            rate_limiter,
        })
    }

    /// 환경변수의 API 키로 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }

    /// 환경변수의 API 키 + 차원 지정
    pub fn from_env_with_dimension(dimension: usize) -> Result<Self> {
        Self::with_dimension(get_api_key()?, dimension)
    }

    fn build_request(&self, text: &str, task: TaskType) -> EmbedRequest {
        EmbedRequest {
            model: GEMINI_EMBED_MODEL.to_string(),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: task.as_api_str().to_string(),
            output_dimensionality: Some(self.dimension),
        }
    }

    /// 용도를 지정한 임베딩 (429/전송 실패 시 지수 백오프 재시도)
    pub async fn embed_with_task(&self, text: &str, task: TaskType) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = self.build_request(text, task);
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            self.rate_limiter.lock().await.acquire().await;

            let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));

            let response = match self
                .client
                .post(GEMINI_EMBED_URL)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Embedding request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                return Ok(parsed.embedding.values);
            }

            if status.as_u16() != 429 {
                return Err(gemini_api_error(status, &body));
            }

            tracing::warn!(
                "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                backoff,
                attempt + 1,
                MAX_RETRIES
            );
            last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));
            if attempt < MAX_RETRIES {
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini 에러 응답 본문
#[derive(Debug, Deserialize)]
pub(crate) struct GeminiError {
    pub(crate) error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiErrorDetail {
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) status: String,
}

/// 실패 응답을 에러로 변환 (Gemini 에러 형식이면 메시지 추출)
pub(crate) fn gemini_api_error(status: reqwest::StatusCode, body: &str) -> anyhow::Error {
    match serde_json::from_str::<GeminiError>(body) {
        Ok(err) => anyhow::anyhow!(
            "Gemini API error ({}): {}",
            err.error.status,
            err.error.message
        ),
        Err(_) => anyhow::anyhow!("Gemini API error ({}): {}", status, body),
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::Document).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::Query).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // 배치 API 없음 - Rate limiter가 간격 조절
        let mut results = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}

// ============================================================================
// API Key Management
// ============================================================================

const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"];

/// API 키 로드 (GEMINI_API_KEY > GOOGLE_AI_API_KEY)
pub fn get_api_key() -> Result<String> {
    for var in API_KEY_VARS {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

/// API 키 존재 여부
pub fn has_api_key() -> bool {
    API_KEY_VARS
        .iter()
        .any(|var| std::env::var(var).map(|k| !k.is_empty()).unwrap_or(false))
}

/// 임베딩 프로바이더 생성
pub fn create_embedder(dimension: usize) -> Result<GeminiEmbedding> {
    let embedder = GeminiEmbedding::from_env_with_dimension(dimension)?;
    tracing::info!("Using Gemini API embedding (dimension: {})", dimension);
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
