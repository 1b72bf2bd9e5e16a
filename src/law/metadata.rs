//! 법률 파일 메타데이터
//!
//! 파일 경로에서 법률 이름/종류를 뽑고, 메타데이터 머리말과 본문을 나눕니다.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::segmenter::INFO_END_MARKER;

/// 구분자 개수가 정확히 1개가 아님
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeparatorCount(pub usize);

/// 머리말(메타데이터)과 본문 분리
///
/// 구분자 `<!-- INFO END -->` 는 정확히 한 번 나와야 합니다.
pub fn split_preamble(content: &str) -> Result<(&str, &str), SeparatorCount> {
    let count = content.matches(INFO_END_MARKER).count();
    if count != 1 {
        return Err(SeparatorCount(count));
    }

    content
        .split_once(INFO_END_MARKER)
        .ok_or(SeparatorCount(0))
}

/// 폴더 이름에서 법률 종류 추출 ("01-宪法" -> "宪法")
pub fn law_type_from_folder(folder_name: &str) -> String {
    match folder_name.split_once('-') {
        Some((_, rest)) => rest.to_string(),
        None => folder_name.to_string(),
    }
}

/// 파일 이름에서 법률 이름 추출 (끝의 괄호 부분 제거)
///
/// "中华人民共和国宪法(2018-03-11).md" -> "中华人民共和国宪法"
pub fn law_name_from_file(file_name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\s*(\([^)]+\)|（[^）]+）)$").expect("law name suffix regex")
    });

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    re.replace(stem, "").into_owned()
}

/// 문자 수 기준 길이 (바이트 아님)
pub fn content_length(text: &str) -> usize {
    text.chars().count()
}
