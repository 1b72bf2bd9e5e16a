//! Vector Store - 조문 벡터 저장소 트레이트 및 유틸리티
//!
//! LanceDB 구현은 `lance.rs`, 테스트/소규모 용도의 메모리 구현은 여기에 있습니다.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::law::LawRecord;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct LawVectorEntry {
    /// 엔트리 ID (UUID)
    pub id: String,
    /// 조문 레코드 (메타데이터 + 본문)
    pub record: LawRecord,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct LawSearchHit {
    pub id: String,
    pub record: LawRecord,
    /// 저장소 고유 거리 (작을수록 가까움)
    pub distance: f32,
    /// 유사도 스코어 (높을수록 관련)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입, 삽입 개수 반환
    async fn insert_batch(&self, entries: &[LawVectorEntry]) -> Result<usize>;

    /// 유사도 높은 순으로 최대 `limit` 개
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<LawSearchHit>>;

    /// 저장된 벡터 개수
    async fn count(&self) -> Result<usize>;

    /// 전체 삭제
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// InMemoryVectorStore
// ============================================================================

/// 메모리 벡터 저장소 (코사인 유사도 전수 탐색)
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<LawVectorEntry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert_batch(&self, entries: &[LawVectorEntry]) -> Result<usize> {
        let mut guard = self
            .entries
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        guard.extend_from_slice(entries);
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<LawSearchHit>> {
        let guard = self
            .entries
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut hits: Vec<LawSearchHit> = guard
            .iter()
            .map(|entry| {
                let similarity = cosine_similarity(query_embedding, &entry.embedding);
                LawSearchHit {
                    id: entry.id.clone(),
                    record: entry.record.clone(),
                    distance: 1.0 - similarity,
                    similarity,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let guard = self
            .entries
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(guard.len())
    }

    async fn clear(&self) -> Result<()> {
        self.entries
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?
            .clear();
        Ok(())
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 (-1.0 ~ 1.0), 길이가 다르거나 영벡터면 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
