//! LLM 모듈 - Gemini generateContent 기반 답변 생성
//!
//! 검색된 조문을 담은 프롬프트를 받아 자유 텍스트 답변을 돌려줍니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::{gemini_api_error, get_api_key};

/// 기본 답변 모델
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;

// ============================================================================
// ChatModel Trait
// ============================================================================

/// 답변 생성 요청
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// 시스템 지시문
    pub system: Option<String>,
    /// 사용자 입력 (프롬프트)
    pub user: String,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
            temperature: 0.3,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// 채팅 모델 트레이트
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 프롬프트 -> 답변 텍스트
    async fn generate(&self, request: &ChatRequest) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Gemini Chat
// ============================================================================

/// Gemini generateContent 구현체
///
/// source: https://ai.google.dev/api/generate-content
#[derive(Debug)]
pub struct GeminiChat {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiChat {
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.into(),
            client,
        })
    }

    /// 환경변수의 API 키로 생성
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        Self::new(get_api_key()?, model)
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.model)
    }

    fn build_body(request: &ChatRequest) -> GenerateRequest {
        GenerateRequest {
            system_instruction: request.system.as_ref().map(|s| Content {
                role: None,
                parts: vec![Part { text: s.clone() }],
            }),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.user.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: 8192,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// 응답에서 첫 후보의 텍스트 추출
fn extract_text(response: GenerateResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        anyhow::bail!("Gemini returned no candidates");
    }
    Ok(text)
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn generate(&self, request: &ChatRequest) -> Result<String> {
        let body = Self::build_body(request);
        let url = self.endpoint();

        for attempt in 0..=MAX_RETRIES {
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .context("Failed to send generateContent request")?;

            let status = response.status();
            let text = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: GenerateResponse =
                    serde_json::from_str(&text).context("Failed to parse generateContent response")?;
                return extract_text(parsed);
            }

            if status.as_u16() == 429 && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            return Err(gemini_api_error(status, &text));
        }

        anyhow::bail!("generateContent failed after {} retries", MAX_RETRIES)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
