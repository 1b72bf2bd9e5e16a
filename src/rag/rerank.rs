//! Reranker - 검색 후보 재정렬
//!
//! 1차 벡터 검색 결과(retrieve_k)를 질의와 다시 비교하여 상위 rerank_k 개를 고릅니다.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

/// 재정렬 트레이트
#[async_trait]
pub trait Reranker: Send + Sync {
    /// 후보마다 질의 관련도 점수 (높을수록 관련), 입력 순서와 같은 길이
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;

    fn name(&self) -> &str;
}

/// 문자 bigram Dice 계수 기반 재정렬기
///
/// 중국어는 공백 분절이 없으므로 단어 대신 인접 문자 쌍을 비교합니다.
/// 공백과 구두점은 무시합니다.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalReranker;

impl LexicalReranker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let query_grams = bigrams(query);
        Ok(documents
            .iter()
            .map(|doc| dice(&query_grams, &bigrams(doc)))
            .collect())
    }

    fn name(&self) -> &str {
        "lexical-bigram"
    }
}

/// 문자 bigram 다중집합 (한 글자뿐이면 그 글자 자체)
fn bigrams(text: &str) -> HashMap<(char, char), usize> {
    let chars: Vec<char> = text.chars().filter(|c| c.is_alphanumeric()).collect();
    let mut grams = HashMap::new();

    match chars.len() {
        0 => {}
        1 => {
            grams.insert((chars[0], '\0'), 1);
        }
        _ => {
            for pair in chars.windows(2) {
                *grams.entry((pair[0], pair[1])).or_insert(0) += 1;
            }
        }
    }

    grams
}

/// Dice 계수: 2|A∩B| / (|A| + |B|)
fn dice(a: &HashMap<(char, char), usize>, b: &HashMap<(char, char), usize>) -> f32 {
    let total: usize = a.values().sum::<usize>() + b.values().sum::<usize>();
    if total == 0 {
        return 0.0;
    }

    let overlap: usize = a
        .iter()
        .filter_map(|(gram, n)| b.get(gram).map(|m| (*n).min(*m)))
        .sum();

    2.0 * overlap as f32 / total as f32
}
