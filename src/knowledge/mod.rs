//! Knowledge 모듈 - 조문 벡터 지식 저장소
//!
//! - Vector: VectorStore 트레이트 + 메모리 구현
//! - LanceDB: 조문 메타데이터 포함 벡터 검색 (ANN)
//! - Indexer: 레코드 배치 임베딩 및 적재

mod indexer;
mod lance;
mod vector;

// Re-exports
pub use indexer::{embedding_text, IndexSummary, Indexer};
pub use lance::{LanceVectorStore, TABLE_NAME};
pub use vector::{cosine_similarity, InMemoryVectorStore, LawSearchHit, LawVectorEntry, VectorStore};
