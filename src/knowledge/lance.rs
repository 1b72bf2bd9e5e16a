//! LanceDB Vector Store - 조문 벡터 검색
//!
//! 조문 메타데이터 전체를 컬럼으로 저장하므로 검색 결과만으로 LawRecord를 복원합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, BooleanArray, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    StringArray, UInt32Array, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::{LawSearchHit, LawVectorEntry, VectorStore};
use crate::law::{Chunk, LawRecord};

/// 벡터 테이블 이름
pub const TABLE_NAME: &str = "chinese_laws";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소
///
/// 임베딩 차원은 테이블 스키마(FixedSizeList)에 고정되므로 생성 시 지정합니다.
pub struct LanceVectorStore {
    db: Connection,
    dimension: usize,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `dimension` - 임베딩 차원
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        tracing::debug!("Opened LanceDB at {} (dim={})", path.display(), dimension);
        Ok(Self { db, dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 조문 테이블 스키마
    fn create_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("law", DataType::Utf8, false),
            Field::new("law_type", DataType::Utf8, false),
            Field::new("chapter", DataType::Utf8, false),
            Field::new("section", DataType::Utf8, true),
            Field::new("article_title", DataType::Utf8, false),
            Field::new("article_number", DataType::UInt32, false),
            Field::new("is_chapter_title", DataType::Boolean, false),
            Field::new("source_file", DataType::Utf8, false),
            Field::new("content_length", DataType::UInt64, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[LawVectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != self.dimension) {
            anyhow::bail!(
                "Embedding dimension mismatch for {}: expected {}, got {}",
                bad.id,
                self.dimension,
                bad.embedding.len()
            );
        }

        let strings = |f: fn(&LawVectorEntry) -> &str| -> StringArray {
            StringArray::from(entries.iter().map(f).collect::<Vec<&str>>())
        };

        let sections: Vec<Option<&str>> = entries
            .iter()
            .map(|e| e.record.chunk.section.as_deref())
            .collect();
        let article_numbers: Vec<u32> = entries
            .iter()
            .map(|e| e.record.chunk.article_number)
            .collect();
        let chapter_flags: Vec<bool> = entries
            .iter()
            .map(|e| e.record.chunk.is_chapter_title)
            .collect();
        let lengths: Vec<u64> = entries
            .iter()
            .map(|e| e.record.content_length as u64)
            .collect();

        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(Float32Array::from(embeddings_flat)) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(self.create_schema()),
            vec![
                Arc::new(strings(|e| e.id.as_str())),
                Arc::new(strings(|e| e.record.law.as_str())),
                Arc::new(strings(|e| e.record.law_type.as_str())),
                Arc::new(strings(|e| e.record.chunk.chapter.as_str())),
                Arc::new(StringArray::from(sections)),
                Arc::new(strings(|e| e.record.chunk.article_title.as_str())),
                Arc::new(UInt32Array::from(article_numbers)),
                Arc::new(BooleanArray::from(chapter_flags)),
                Arc::new(strings(|e| e.record.source_file.as_str())),
                Arc::new(UInt64Array::from(lengths)),
                Arc::new(strings(|e| e.record.chunk.content.as_str())),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 검색 결과 배치를 LawSearchHit로 변환
    fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<LawSearchHit>> {
        let ids = column::<StringArray>(batch, "id")?;
        let laws = column::<StringArray>(batch, "law")?;
        let law_types = column::<StringArray>(batch, "law_type")?;
        let chapters = column::<StringArray>(batch, "chapter")?;
        let sections = column::<StringArray>(batch, "section")?;
        let titles = column::<StringArray>(batch, "article_title")?;
        let numbers = column::<UInt32Array>(batch, "article_number")?;
        let chapter_flags = column::<BooleanArray>(batch, "is_chapter_title")?;
        let sources = column::<StringArray>(batch, "source_file")?;
        let lengths = column::<UInt64Array>(batch, "content_length")?;
        let contents = column::<StringArray>(batch, "content")?;
        // _distance 컬럼 (LanceDB가 자동 추가)
        let distances = column::<Float32Array>(batch, "_distance")?;

        let hits = (0..batch.num_rows())
            .map(|i| {
                let distance = distances.value(i);
                LawSearchHit {
                    id: ids.value(i).to_string(),
                    record: LawRecord {
                        chunk: Chunk {
                            chapter: chapters.value(i).to_string(),
                            section: (!sections.is_null(i))
                                .then(|| sections.value(i).to_string()),
                            article_title: titles.value(i).to_string(),
                            content: contents.value(i).to_string(),
                            is_chapter_title: chapter_flags.value(i),
                            article_number: numbers.value(i),
                        },
                        law_type: law_types.value(i).to_string(),
                        law: laws.value(i).to_string(),
                        source_file: sources.value(i).to_string(),
                        content_length: lengths.value(i) as usize,
                    },
                    distance,
                    // L2 거리 -> (0, 1] 유사도
                    similarity: 1.0 / (1.0 + distance),
                }
            })
            .collect();

        Ok(hits)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?;
        Ok(names.iter().any(|n| n == TABLE_NAME))
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .with_context(|| format!("Failed to open table {}", TABLE_NAME))
    }
}

/// 이름으로 컬럼을 찾아 구체 타입으로 다운캐스트
fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, entries: &[LawVectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await? {
            self.open_table()
                .await?
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<LawSearchHit>> {
        if limit == 0 || !self.table_exists().await? {
            return Ok(vec![]);
        }

        if query_embedding.len() != self.dimension {
            anyhow::bail!(
                "Query dimension mismatch: expected {}, got {}",
                self.dimension,
                query_embedding.len()
            );
        }

        let results = self
            .open_table()
            .await?
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(Self::batch_to_hits(batch)?);
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .context("Failed to count rows")?;
        Ok(count)
    }

    async fn clear(&self) -> Result<()> {
        if !self.table_exists().await? {
            return Ok(());
        }

        self.db
            .drop_table(TABLE_NAME)
            .await
            .context("Failed to drop table")?;
        tracing::info!("Dropped table {}", TABLE_NAME);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 8;

    fn create_test_entry(id: &str, article_number: u32, section: Option<&str>, hot: usize) -> LawVectorEntry {
        let content = format!("第{}条 测试内容。", article_number);
        let mut embedding = vec![0.0; DIM];
        embedding[hot % DIM] = 1.0;

        LawVectorEntry {
            id: id.to_string(),
            record: LawRecord {
                content_length: content.chars().count(),
                chunk: Chunk {
                    chapter: "第一章 总则".to_string(),
                    section: section.map(str::to_string),
                    article_title: format!("第{}条", article_number),
                    content,
                    is_chapter_title: false,
                    article_number,
                },
                law_type: "刑法".to_string(),
                law: "中华人民共和国刑法".to_string(),
                source_file: "刑法/中华人民共和国刑法.md".to_string(),
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn test_lance_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("test.lance");

        let store = LanceVectorStore::open(&lance_path, DIM).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[0.0; DIM], 3).await.unwrap().is_empty());

        let entries = vec![
            create_test_entry("a", 1, None, 0),
            create_test_entry("b", 2, None, 1),
        ];
        assert_eq!(store.insert_batch(&entries).await.unwrap(), 2);
        assert_eq!(store.insert_batch(&[]).await.unwrap(), 0);

        // 두 번째 배치는 기존 테이블에 추가
        let more = vec![create_test_entry("c", 3, None, 2)];
        store.insert_batch(&more).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_lance_search_restores_record() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("search_test.lance");

        let store = LanceVectorStore::open(&lance_path, DIM).await.unwrap();
        let entries = vec![
            create_test_entry("a", 1, None, 0),
            create_test_entry("b", 2, Some("第一节 犯罪"), 1),
            create_test_entry("c", 3, None, 2),
        ];
        store.insert_batch(&entries).await.unwrap();

        let mut query = vec![0.0; DIM];
        query[1] = 1.0;
        let hits = store.search(&query, 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "b");
        assert!(hits[0].distance <= hits[1].distance);
        assert!((hits[0].similarity - 1.0).abs() < 1e-4);

        let record = &hits[0].record;
        assert_eq!(record.chunk, entries[1].record.chunk);
        assert_eq!(record.law, "中华人民共和国刑法");
        assert_eq!(record.law_type, "刑法");
        assert_eq!(record.content_length, entries[1].record.content_length);
        assert_eq!(hits[1].record.chunk.section, None);
    }

    #[tokio::test]
    async fn test_table_exists_tracks_table_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("exists.lance"), DIM)
            .await
            .unwrap();

        assert!(!store.table_exists().await.unwrap());
        store
            .insert_batch(&[create_test_entry("a", 1, None, 0)])
            .await
            .unwrap();
        assert!(store.table_exists().await.unwrap());
        store.clear().await.unwrap();
        assert!(!store.table_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_lance_dimension_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("dim.lance"), DIM)
            .await
            .unwrap();

        let mut entry = create_test_entry("a", 1, None, 0);
        entry.embedding.push(0.5);
        assert!(store.insert_batch(&[entry]).await.is_err());

        store
            .insert_batch(&[create_test_entry("b", 2, None, 0)])
            .await
            .unwrap();
        assert!(store.search(&[1.0; 3], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_lance_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("clear.lance"), DIM)
            .await
            .unwrap();

        store.clear().await.unwrap();
        store
            .insert_batch(&[create_test_entry("a", 1, None, 0)])
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        // 삭제 후 재생성
        store
            .insert_batch(&[create_test_entry("b", 2, None, 1)])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
