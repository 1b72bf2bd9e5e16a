//! lawrag - 중국 법률 조문 RAG 시스템
//!
//! 법률 Markdown을 장/조문 단위로 분할하고, Gemini 임베딩과 LanceDB 벡터 검색으로
//! 관련 조문을 찾아 답변을 생성합니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod knowledge;
pub mod law;
pub mod llm;
pub mod rag;

// Re-exports
pub use config::Config;
pub use embedding::{create_embedder, get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use knowledge::{
    embedding_text, IndexSummary, Indexer, InMemoryVectorStore, LanceVectorStore, LawSearchHit,
    LawVectorEntry, VectorStore,
};
pub use law::{segment, segment_with, Chunk, LawProcessor, LawRecord, ProcessError, SegmenterOptions};
pub use llm::{ChatModel, ChatRequest, GeminiChat};
pub use rag::{Answer, LawRagSystem, LexicalReranker, QuestionType, RagOptions, Reranker, Source};
