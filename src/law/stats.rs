//! 처리 결과 통계
//!
//! 조문 분포 분석과 데이터 일관성 점검.

use std::collections::HashMap;

use serde::Serialize;

use super::processor::LawRecord;

/// 길이 구간 (문자 수)
pub const LENGTH_BUCKETS: [(&str, usize, usize); 4] = [
    ("<100", 0, 100),
    ("100-300", 100, 300),
    ("300-500", 300, 500),
    (">=500", 500, usize::MAX),
];

// ============================================================================
// ArticleDistribution
// ============================================================================

/// 길이 구간 한 칸
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthBucket {
    pub label: &'static str,
    pub count: usize,
    pub percentage: f64,
}

/// 조문 분포
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleDistribution {
    pub total: usize,
    pub chapter_titles: usize,
    pub articles: usize,
    pub other: usize,
    pub avg_length: f64,
    pub min_length: usize,
    pub max_length: usize,
    pub buckets: Vec<LengthBucket>,
}

impl ArticleDistribution {
    pub fn from_records(records: &[LawRecord]) -> Self {
        let total = records.len();
        let chapter_titles = records.iter().filter(|r| r.chunk.is_chapter_title).count();
        let articles = records.iter().filter(|r| r.chunk.is_article()).count();

        let lengths: Vec<usize> = records.iter().map(|r| r.content_length).collect();
        let avg_length = if total == 0 {
            0.0
        } else {
            lengths.iter().sum::<usize>() as f64 / total as f64
        };

        let buckets = LENGTH_BUCKETS
            .iter()
            .map(|&(label, lo, hi)| {
                let count = lengths.iter().filter(|&&l| l >= lo && l < hi).count();
                LengthBucket {
                    label,
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect();

        Self {
            total,
            chapter_titles,
            articles,
            other: total - chapter_titles - articles,
            avg_length,
            min_length: lengths.iter().copied().min().unwrap_or(0),
            max_length: lengths.iter().copied().max().unwrap_or(0),
            buckets,
        }
    }
}

// ============================================================================
// ConsistencyReport
// ============================================================================

/// 데이터 일관성 점검 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub total: usize,
    /// 중복된 본문 종류 수
    pub duplicate_contents: usize,
    /// 중복 예시 (본문, 횟수) - 최대 3개
    pub duplicate_examples: Vec<(String, usize)>,
    pub empty_contents: usize,
    pub distinct_laws: usize,
    /// 레코드 수 기준 상위 법률 (최대 5개)
    pub top_laws: Vec<(String, usize)>,
    pub chapter_titles: usize,
    pub articles: usize,
}

impl ConsistencyReport {
    pub fn from_records(records: &[LawRecord]) -> Self {
        let mut content_counts: HashMap<&str, usize> = HashMap::new();
        let mut law_counts: HashMap<&str, usize> = HashMap::new();

        for record in records {
            *content_counts.entry(record.content()).or_default() += 1;
            *law_counts.entry(record.law.as_str()).or_default() += 1;
        }

        let mut duplicates: Vec<(String, usize)> = content_counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(c, n)| (c.to_string(), n))
            .collect();
        duplicates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let distinct_laws = law_counts.len();
        let mut top_laws: Vec<(String, usize)> = law_counts
            .into_iter()
            .map(|(l, n)| (l.to_string(), n))
            .collect();
        top_laws.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_laws.truncate(5);

        Self {
            total: records.len(),
            duplicate_contents: duplicates.len(),
            duplicate_examples: duplicates.into_iter().take(3).collect(),
            empty_contents: records
                .iter()
                .filter(|r| r.content().trim().is_empty())
                .count(),
            distinct_laws,
            top_laws,
            chapter_titles: records.iter().filter(|r| r.chunk.is_chapter_title).count(),
            articles: records.iter().filter(|r| r.chunk.is_article()).count(),
        }
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}
