//! 법률 파일 처리
//!
//! Markdown 법률 파일 -> 조문 분할 -> 메타데이터 부착 -> JSON 저장.
//! 파일 하나가 실패해도 나머지는 계속 처리합니다.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use super::metadata::{content_length, law_name_from_file, law_type_from_folder, split_preamble};
use super::segmenter::{segment_with, Chunk, SegmenterOptions};

// ============================================================================
// Errors
// ============================================================================

/// 법률 파일 처리 에러
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Malformed law file {}: expected exactly one '<!-- INFO END -->', found {count}",
        .path.display()
    )]
    MalformedSeparator { path: PathBuf, count: usize },

    #[error("No records produced from {}", .path.display())]
    NoRecords { path: PathBuf },

    #[error("No markdown files found under {}", .dir.display())]
    NoMarkdownFiles { dir: PathBuf },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, ProcessError>;

// ============================================================================
// Types
// ============================================================================

/// 메타데이터가 붙은 조문 레코드 (JSON 한 항목)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawRecord {
    #[serde(flatten)]
    pub chunk: Chunk,
    /// 법률 종류 (폴더 이름에서)
    #[serde(rename = "type", default)]
    pub law_type: String,
    /// 법률 이름 (파일 이름에서)
    #[serde(default)]
    pub law: String,
    /// 원본 파일 이름
    #[serde(default)]
    pub source_file: String,
    /// 본문 문자 수
    #[serde(default)]
    pub content_length: usize,
}

impl LawRecord {
    pub fn content(&self) -> &str {
        &self.chunk.content
    }
}

/// 디렉토리 처리 요약
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub files_found: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub records: usize,
}

/// 디렉토리 처리 결과
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub records: Vec<LawRecord>,
    pub summary: ProcessSummary,
}

// ============================================================================
// LawProcessor
// ============================================================================

/// 법률 파일 처리기
#[derive(Debug, Clone, Default)]
pub struct LawProcessor {
    options: SegmenterOptions,
}

impl LawProcessor {
    pub fn new(options: SegmenterOptions) -> Self {
        Self { options }
    }

    /// 파일 내용(문자열)을 레코드로 변환
    ///
    /// `path` 는 메타데이터(폴더/파일 이름) 계산과 에러 메시지에만 사용됩니다.
    pub fn process_content(&self, path: &Path, content: &str) -> Result<Vec<LawRecord>> {
        let (_, body) = split_preamble(content).map_err(|c| ProcessError::MalformedSeparator {
            path: path.to_path_buf(),
            count: c.0,
        })?;

        let folder_name = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let law_type = law_type_from_folder(folder_name);
        let law = law_name_from_file(file_name);

        let records: Vec<LawRecord> = segment_with(body, self.options)
            .into_iter()
            .map(|chunk| LawRecord {
                content_length: content_length(&chunk.content),
                chunk,
                law_type: law_type.clone(),
                law: law.clone(),
                source_file: file_name.to_string(),
            })
            .collect();

        if records.is_empty() {
            return Err(ProcessError::NoRecords {
                path: path.to_path_buf(),
            });
        }

        Ok(records)
    }

    /// 단일 법률 파일 처리
    pub fn process_file(&self, path: &Path) -> Result<Vec<LawRecord>> {
        let content = std::fs::read_to_string(path).map_err(|source| ProcessError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let records = self.process_content(path, &content)?;
        tracing::debug!("Segmented {:?} into {} records", path, records.len());
        Ok(records)
    }

    /// 디렉토리의 모든 `.md` 파일 처리 (재귀)
    pub fn process_directory(&self, raw_dir: &Path) -> Result<ProcessOutput> {
        let files = collect_markdown_files(raw_dir)?;
        if files.is_empty() {
            return Err(ProcessError::NoMarkdownFiles {
                dir: raw_dir.to_path_buf(),
            });
        }

        tracing::info!("Found {} markdown files under {:?}", files.len(), raw_dir);

        let mut summary = ProcessSummary {
            files_found: files.len(),
            ..Default::default()
        };
        let mut records = Vec::new();

        for (i, path) in files.iter().enumerate() {
            match self.process_file(path) {
                Ok(file_records) => {
                    tracing::info!(
                        "[{}/{}] {:?}: {} records",
                        i + 1,
                        files.len(),
                        path.strip_prefix(raw_dir).unwrap_or(path),
                        file_records.len()
                    );
                    summary.files_processed += 1;
                    records.extend(file_records);
                }
                Err(e) => {
                    tracing::warn!("Skipping file: {}", e);
                    summary.files_failed += 1;
                }
            }
        }

        summary.records = records.len();
        Ok(ProcessOutput { records, summary })
    }
}

/// `.md` 파일 수집 (정렬됨)
fn collect_markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let is_md = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("md"))
            .unwrap_or(false);

        if is_md {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

// ============================================================================
// JSON I/O
// ============================================================================

/// 레코드를 JSON 배열로 저장 (부모 디렉토리 생성)
pub fn write_records(path: &Path, records: &[LawRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| ProcessError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json).map_err(|source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Wrote {} records to {:?}", records.len(), path);
    Ok(())
}

/// JSON 배열에서 레코드 읽기
pub fn read_records(path: &Path) -> Result<Vec<LawRecord>> {
    let json = std::fs::read_to_string(path).map_err(|source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LAW_FILE: &str = "# 中华人民共和国测试法\n\n发布日期: 2020-01-01\n<!-- INFO END -->\n## 第一章 总则\n第一条 为了测试，制定本法。\n第二条 本法适用于测试。\n测试包括单元测试。\n";

    fn write_file(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_process_file_attaches_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "03-行政法/测试法(2020-01-01).md", LAW_FILE);

        let records = LawProcessor::default().process_file(&path).unwrap();
        assert_eq!(records.len(), 3);

        for record in &records {
            assert_eq!(record.law_type, "行政法");
            assert_eq!(record.law, "测试法");
            assert_eq!(record.source_file, "测试法(2020-01-01).md");
            assert_eq!(record.content_length, record.content().chars().count());
        }

        assert!(records[0].chunk.is_chapter_title);
        assert_eq!(records[2].chunk.article_number, 2);
        assert_eq!(
            records[2].content(),
            "第二条 本法适用于测试。\n测试包括单元测试。"
        );
        // 머리말은 분할 대상이 아님
        assert!(records.iter().all(|r| !r.content().contains("发布日期")));
    }

    #[test]
    fn test_process_file_rejects_missing_separator() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "宪法/宪法.md", "## 第一章\n第一条 内容。");

        let err = LawProcessor::default().process_file(&path).unwrap_err();
        assert!(matches!(err, ProcessError::MalformedSeparator { count: 0, .. }));
    }

    #[test]
    fn test_process_file_rejects_duplicate_separator() {
        let dir = TempDir::new().unwrap();
        let content = "meta\n<!-- INFO END -->\n第一条 a\n<!-- INFO END -->\n";
        let path = write_file(dir.path(), "宪法/宪法.md", content);

        let err = LawProcessor::default().process_file(&path).unwrap_err();
        assert!(matches!(err, ProcessError::MalformedSeparator { count: 2, .. }));
    }

    #[test]
    fn test_process_file_rejects_empty_body() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "宪法/空.md", "meta\n<!-- INFO END -->\n\n\n");

        let err = LawProcessor::default().process_file(&path).unwrap_err();
        assert!(matches!(err, ProcessError::NoRecords { .. }));
    }

    #[test]
    fn test_process_file_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = LawProcessor::default()
            .process_file(&dir.path().join("nope.md"))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Io { .. }));
    }

    #[test]
    fn test_process_directory_skips_bad_files() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "01-宪法/宪法.md", LAW_FILE);
        write_file(dir.path(), "02-民法/民法典.md", LAW_FILE);
        write_file(dir.path(), "02-民法/坏文件.md", "没有分隔符");
        write_file(dir.path(), "02-民法/readme.txt", "ignored");

        let output = LawProcessor::default().process_directory(dir.path()).unwrap();
        assert_eq!(output.summary.files_found, 3);
        assert_eq!(output.summary.files_processed, 2);
        assert_eq!(output.summary.files_failed, 1);
        assert_eq!(output.summary.records, 6);
        assert_eq!(output.records.len(), 6);

        // 파일 이름 순으로 정렬되어 처리됨
        assert_eq!(output.records[0].law, "宪法");
        assert_eq!(output.records[3].law, "民法典");
    }

    #[test]
    fn test_process_directory_without_markdown() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.txt", "x");

        let err = LawProcessor::default()
            .process_directory(dir.path())
            .unwrap_err();
        assert!(matches!(err, ProcessError::NoMarkdownFiles { .. }));
    }

    #[test]
    fn test_write_and_read_records() {
        let dir = TempDir::new().unwrap();
        let src = write_file(dir.path(), "01-宪法/宪法.md", LAW_FILE);
        let records = LawProcessor::default().process_file(&src).unwrap();

        let out = dir.path().join("processed/laws_processed.json");
        write_records(&out, &records).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json[1]["type"], "宪法");
        assert_eq!(json[1]["article_title"], "第一条");
        assert_eq!(json[1]["content_length"], 14);
        assert!(json[1].get("section").is_none());

        let loaded = read_records(&out).unwrap();
        assert_eq!(loaded, records);
    }
}
