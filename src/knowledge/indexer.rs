//! Indexer - 조문 레코드를 배치 단위로 임베딩하여 벡터 저장소에 적재

use anyhow::Result;

use super::vector::{LawVectorEntry, VectorStore};
use crate::embedding::EmbeddingProvider;
use crate::law::LawRecord;

/// 인덱싱 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// 시도한 배치 수
    pub batches: usize,
    /// 실패하여 건너뛴 배치 수
    pub skipped_batches: usize,
    /// 저장된 엔트리 수
    pub added: usize,
    /// 본문이 비어 제외된 레코드 수
    pub skipped_empty: usize,
}

/// 임베딩할 텍스트 (법률 이름 + 장 + 본문)
///
/// 저장되는 본문은 `content` 그대로이며, 검색 품질을 위해 임베딩 입력에만 문맥을 붙입니다.
pub fn embedding_text(record: &LawRecord) -> String {
    let prefix: Vec<&str> = [record.law.as_str(), record.chunk.chapter.as_str()]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();

    if prefix.is_empty() {
        record.content().to_string()
    } else {
        format!("{} | {}", prefix.join(" "), record.content())
    }
}

/// 배치 인덱서
pub struct Indexer<'a> {
    embedder: &'a dyn EmbeddingProvider,
    store: &'a dyn VectorStore,
}

impl<'a> Indexer<'a> {
    pub fn new(embedder: &'a dyn EmbeddingProvider, store: &'a dyn VectorStore) -> Self {
        Self { embedder, store }
    }

    /// 레코드 전체를 `batch_size` 단위로 적재
    ///
    /// 한 배치의 임베딩/삽입 실패는 경고 후 건너뛰고 다음 배치를 계속합니다.
    pub async fn index(&self, records: &[LawRecord], batch_size: usize) -> Result<IndexSummary> {
        if batch_size == 0 {
            anyhow::bail!("batch size must be greater than 0");
        }

        let valid: Vec<&LawRecord> = records
            .iter()
            .filter(|r| !r.content().trim().is_empty())
            .collect();

        let mut summary = IndexSummary {
            skipped_empty: records.len() - valid.len(),
            ..Default::default()
        };

        if summary.skipped_empty > 0 {
            tracing::warn!("Skipping {} records with empty content", summary.skipped_empty);
        }

        let total_batches = valid.len().div_ceil(batch_size);

        for (i, batch) in valid.chunks(batch_size).enumerate() {
            summary.batches += 1;

            match self.index_batch(batch).await {
                Ok(added) => {
                    summary.added += added;
                    tracing::info!(
                        "Batch {}/{} indexed ({} records)",
                        i + 1,
                        total_batches,
                        added
                    );
                }
                Err(e) => {
                    summary.skipped_batches += 1;
                    tracing::warn!("Batch {}/{} failed: {:#}", i + 1, total_batches, e);
                }
            }
        }

        Ok(summary)
    }

    async fn index_batch(&self, batch: &[&LawRecord]) -> Result<usize> {
        let texts: Vec<String> = batch.iter().map(|r| embedding_text(r)).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != batch.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} texts",
                embeddings.len(),
                batch.len()
            );
        }

        let entries: Vec<LawVectorEntry> = batch
            .iter()
            .zip(embeddings)
            .map(|(record, embedding)| LawVectorEntry {
                id: uuid::Uuid::new_v4().to_string(),
                record: (*record).clone(),
                embedding,
            })
            .collect();

        self.store.insert_batch(&entries).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::InMemoryVectorStore;
    use crate::law::Chunk;
    use async_trait::async_trait;

    /// "FAIL"이 들어간 텍스트에서 실패하는 가짜 임베더
    struct FakeEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("FAIL") {
                anyhow::bail!("boom");
            }
            Ok(vec![text.chars().count() as f32, 1.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn record(law: &str, chapter: &str, content: &str) -> LawRecord {
        LawRecord {
            chunk: Chunk {
                chapter: chapter.to_string(),
                section: None,
                article_title: String::new(),
                content: content.to_string(),
                is_chapter_title: false,
                article_number: 0,
            },
            law_type: "刑法".to_string(),
            law: law.to_string(),
            source_file: "刑法/刑法.md".to_string(),
            content_length: content.chars().count(),
        }
    }

    #[test]
    fn test_embedding_text() {
        let r = record("中华人民共和国刑法", "第一章 总则", "第一条 为了惩罚犯罪。");
        assert_eq!(
            embedding_text(&r),
            "中华人民共和国刑法 第一章 总则 | 第一条 为了惩罚犯罪。"
        );

        let bare = record("", "", "正文");
        assert_eq!(embedding_text(&bare), "正文");
    }

    #[tokio::test]
    async fn test_index_in_batches() {
        let store = InMemoryVectorStore::new();
        let indexer = Indexer::new(&FakeEmbedder, &store);

        let records: Vec<LawRecord> = (1..=5)
            .map(|i| record("刑法", "第一章 总则", &format!("第{}条", i)))
            .collect();

        let summary = indexer.index(&records, 2).await.unwrap();
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.added, 5);
        assert_eq!(summary.skipped_batches, 0);
        assert_eq!(store.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_index_skips_empty_and_failed_batches() {
        let store = InMemoryVectorStore::new();
        let indexer = Indexer::new(&FakeEmbedder, &store);

        let records = vec![
            record("刑法", "第一章 总则", "第一条 甲"),
            record("刑法", "第一章 总则", "   "),
            record("刑法", "第一章 总则", "FAIL"),
            record("刑法", "第一章 总则", "第三条 丙"),
        ];

        let summary = indexer.index(&records, 1).await.unwrap();
        assert_eq!(summary.skipped_empty, 1);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.skipped_batches, 1);
        assert_eq!(summary.added, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_index_assigns_unique_ids() {
        let store = InMemoryVectorStore::new();
        let indexer = Indexer::new(&FakeEmbedder, &store);
        let records = vec![record("刑法", "", "同一内容"), record("刑法", "", "同一内容")];
        indexer.index(&records, 10).await.unwrap();

        let hits = store.search(&[1.0, 1.0], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_ne!(hits[0].id, hits[1].id);
    }

    #[tokio::test]
    async fn test_index_zero_batch_size() {
        let store = InMemoryVectorStore::new();
        let indexer = Indexer::new(&FakeEmbedder, &store);
        assert!(indexer.index(&[], 0).await.is_err());
    }
}
