//! RAG 모듈 - 조문 검색 + 답변 생성
//!
//! 질문 -> 질의 임베딩 -> 벡터 검색 (retrieve_k) -> 재정렬 (rerank_k)
//! -> 컨텍스트/프롬프트 구성 -> ChatModel 답변 -> 대화 기록.

mod rerank;

pub use rerank::{LexicalReranker, Reranker};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::knowledge::{LawSearchHit, VectorStore};
use crate::llm::{ChatModel, ChatRequest};

/// 검색 결과가 없을 때의 컨텍스트
pub const NO_CONTEXT: &str = "未找到相关的法律条文。";

/// 답변 모델의 시스템 지시문
pub const SYSTEM_INSTRUCTION: &str =
    "你是一个专业的法律AI助手，请基于以下相关法律条文并结合你的法律知识来回答用户的问题。";

// ============================================================================
// Options / Types
// ============================================================================

/// 검색 개수 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RagOptions {
    /// 재정렬 전 1차 검색 개수
    pub retrieve_k: usize,
    /// 재정렬 후 남기는 개수
    pub rerank_k: usize,
    /// 재정렬기가 없을 때 검색 개수
    pub n_results: usize,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            retrieve_k: 10,
            rerank_k: 5,
            n_results: 8,
        }
    }
}

/// 질문 유형 (키워드 기반, 앞의 규칙이 우선)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuestionType {
    Concept,
    Procedure,
    RightsDuties,
    Case,
    Comparison,
    General,
}

const QUESTION_RULES: [(QuestionType, &[&str]); 5] = [
    (QuestionType::Concept, &["是什么", "什么是", "定义", "概念", "介绍"]),
    (
        QuestionType::Procedure,
        &["怎么办", "如何处理", "怎么解决", "步骤", "程序"],
    ),
    (
        QuestionType::RightsDuties,
        &["权利", "义务", "责任", "应当", "必须"],
    ),
    (QuestionType::Case, &["案例", "例子", "举例", "实际情况"]),
    (QuestionType::Comparison, &["区别", "不同", "对比"]),
];

impl QuestionType {
    pub fn classify(query: &str) -> Self {
        let query = query.to_lowercase();
        QUESTION_RULES
            .iter()
            .find(|(_, words)| words.iter().any(|w| query.contains(w)))
            .map(|(kind, _)| *kind)
            .unwrap_or(QuestionType::General)
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::Concept => "概念解释型问题",
            QuestionType::Procedure => "操作指导型问题",
            QuestionType::RightsDuties => "权利义务型问题",
            QuestionType::Case => "案例咨询型问题",
            QuestionType::Comparison => "比较分析型问题",
            QuestionType::General => "一般咨询型问题",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 답변 근거 조문
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub law: String,
    pub chapter: String,
    #[serde(rename = "type")]
    pub law_type: String,
    pub article_title: String,
    pub content: String,
    /// 검색 유사도 (소수점 3자리)
    pub relevance: f32,
}

impl From<&LawSearchHit> for Source {
    fn from(hit: &LawSearchHit) -> Self {
        Self {
            law: hit.record.law.clone(),
            chapter: hit.record.chunk.chapter.clone(),
            law_type: hit.record.law_type.clone(),
            article_title: hit.record.chunk.article_title.clone(),
            content: hit.record.content().to_string(),
            relevance: (hit.similarity * 1000.0).round() / 1000.0,
        }
    }
}

/// 질문 결과
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub query: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub has_relevant_laws: bool,
    pub question_type: QuestionType,
}

impl Answer {
    /// 관련도 내림차순, `min_relevance` 초과만, 최대 `limit` 개
    pub fn top_sources(&self, limit: usize, min_relevance: f32) -> Vec<&Source> {
        let mut sorted: Vec<&Source> = self.sources.iter().collect();
        sorted.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
            .into_iter()
            .take(limit)
            .filter(|s| s.relevance > min_relevance)
            .collect()
    }
}

/// 대화 기록 한 턴
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub query: String,
    pub answer: String,
    pub asked_at: DateTime<Local>,
}

// ============================================================================
// LawRagSystem
// ============================================================================

/// 법률 질의응답 시스템
pub struct LawRagSystem {
    embedder: Box<dyn EmbeddingProvider>,
    store: Box<dyn VectorStore>,
    chat: Box<dyn ChatModel>,
    reranker: Option<Box<dyn Reranker>>,
    options: RagOptions,
    history: Vec<HistoryEntry>,
}

impl LawRagSystem {
    pub fn new(
        embedder: Box<dyn EmbeddingProvider>,
        store: Box<dyn VectorStore>,
        chat: Box<dyn ChatModel>,
    ) -> Self {
        Self {
            embedder,
            store,
            chat,
            reranker: None,
            options: RagOptions::default(),
            history: Vec::new(),
        }
    }

    pub fn with_reranker(mut self, reranker: Box<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_options(mut self, options: RagOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RagOptions {
        &self.options
    }

    /// 벡터 저장소가 비어 있으면 에러
    pub async fn ensure_ready(&self) -> Result<usize> {
        let count = self.store.count().await?;
        if count == 0 {
            anyhow::bail!("Vector store is empty. Run `lawrag index` first");
        }
        tracing::debug!("Vector store ready ({} entries)", count);
        Ok(count)
    }

    /// 질의 임베딩 후 벡터 검색
    pub async fn search_relevant_laws(&self, query: &str, n: usize) -> Result<Vec<LawSearchHit>> {
        let embedding = self
            .embedder
            .embed_query(query)
            .await
            .context("Failed to embed query")?;
        self.store.search(&embedding, n).await
    }

    /// 재정렬 후 상위 `k` 개
    ///
    /// 재정렬기가 없거나 실패하면 검색 순서를 그대로 사용합니다.
    pub async fn rerank(
        &self,
        query: &str,
        hits: Vec<LawSearchHit>,
        k: usize,
    ) -> Vec<LawSearchHit> {
        let Some(reranker) = &self.reranker else {
            return hits.into_iter().take(k).collect();
        };

        let documents: Vec<String> = hits.iter().map(|h| h.record.content().to_string()).collect();
        let scores = match reranker.score(query, &documents).await {
            Ok(scores) if scores.len() == hits.len() => scores,
            Ok(scores) => {
                tracing::warn!(
                    "Reranker returned {} scores for {} candidates, keeping retrieval order",
                    scores.len(),
                    hits.len()
                );
                return hits.into_iter().take(k).collect();
            }
            Err(e) => {
                tracing::warn!("Reranker failed, keeping retrieval order: {}", e);
                return hits.into_iter().take(k).collect();
            }
        };

        let mut scored: Vec<(f32, LawSearchHit)> = scores.into_iter().zip(hits).collect();
        // 동점이면 검색 순서 유지 (stable sort)
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(k).map(|(_, hit)| hit).collect()
    }

    /// 검색 + (재정렬) 파이프라인
    pub async fn retrieve(&self, query: &str) -> Result<Vec<LawSearchHit>> {
        if self.reranker.is_some() {
            let candidates = self
                .search_relevant_laws(query, self.options.retrieve_k)
                .await?;
            Ok(self.rerank(query, candidates, self.options.rerank_k).await)
        } else {
            self.search_relevant_laws(query, self.options.n_results).await
        }
    }

    /// 질문 -> 답변
    pub async fn ask(&mut self, query: &str) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() {
            anyhow::bail!("Question is empty");
        }

        tracing::info!("Retrieving laws for: {}", query);
        let hits = self.retrieve(query).await?;
        tracing::debug!("{} relevant laws", hits.len());

        let question_type = QuestionType::classify(query);
        let context = format_context(&hits);
        let prompt = build_prompt(query, &context, question_type);

        let answer = self
            .chat
            .generate(&ChatRequest::new(prompt).with_system(SYSTEM_INSTRUCTION))
            .await
            .with_context(|| format!("{} failed to answer", self.chat.name()))?;

        self.history.push(HistoryEntry {
            query: query.to_string(),
            answer: answer.clone(),
            asked_at: Local::now(),
        });

        Ok(Answer {
            query: query.to_string(),
            answer,
            sources: hits.iter().map(Source::from).collect(),
            has_relevant_laws: !hits.is_empty(),
            question_type,
        })
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

// ============================================================================
// Prompt
// ============================================================================

/// 검색 결과를 프롬프트 컨텍스트로
pub fn format_context(hits: &[LawSearchHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let rule = "-".repeat(50);
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let mut block = format!(
                "【相关条文 {} - 相似度 {:.3}】\n法律名称: {}\n章节: {}\n",
                i + 1,
                hit.similarity,
                hit.record.law,
                hit.record.chunk.chapter
            );
            if !hit.record.chunk.article_title.is_empty() {
                block.push_str(&format!("条款: {}\n", hit.record.chunk.article_title));
            }
            block.push_str(&format!("内容: {}\n{}", hit.record.content(), rule));
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 답변 생성 프롬프트 (사용자 턴, 지시문은 `SYSTEM_INSTRUCTION`)
pub fn build_prompt(query: &str, context: &str, question_type: QuestionType) -> String {
    format!(
        "相关法律条文：
{context}

用户问题：{query}

请按照以下要求回答：
1. 首先理解用户问题的意图：{question_type}
2. 如果检索到的条文相关，请基于这些条文进行解释和说明
3. 如果条文不相关或不足以完整回答问题，请结合你的法律知识进行补充
4. 对于概念性问题，请先给出定义，再引用相关条文
5. 对于具体案例咨询，请分析相关法律规定
6. 回答要专业、准确、易懂，避免过于技术化的表述
7. 适当举例说明，帮助用户理解

请基于以上要求，给出专业且有用的回答："
    )
}

// ============================================================================
// Tests
// ============================================================================
