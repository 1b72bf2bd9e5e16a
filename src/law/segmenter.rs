//! 법률 조문 분할기 (Segmenter)
//!
//! Markdown 형식의 중국 법률 본문을 줄 단위로 읽어
//! 장(章) 제목 / 조문(条) / 독립 설명문 청크로 나눕니다.
//!
//! - `## ` 로 시작하는 줄: 장 제목. 열린 조문을 닫고 즉시 제목 청크를 내보냄
//! - `第<숫자>条` 로 시작하는 줄: 새 조문 시작 (이전 조문은 flush)
//! - 그 밖의 줄: 열린 조문이 있으면 이어 붙이고, 없으면 독립 청크
//!
//! 순수 함수이며 I/O나 실패 경로가 없습니다.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 본문 앞 메타데이터 구분자 (본문 안에 남아 있으면 건너뜀)
pub const INFO_END_MARKER: &str = "<!-- INFO END -->";

/// 장 제목이 나오기 전까지 사용하는 기본 장
pub const DEFAULT_CHAPTER: &str = "第一章 总则";

const CHAPTER_PREFIX: &str = "## ";
const SECTION_PREFIX: &str = "### ";

/// 조문 시작 패턴: 第 + (한자 숫자 | ASCII 숫자) + 条
fn article_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(第[一二三四五六七八九十百千万零0-9]+条)").expect("article marker regex")
    })
}

// ============================================================================
// Types
// ============================================================================

/// 분할 결과 한 건
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 청크가 닫힐 때의 장 제목 (`## ` 제외)
    pub chapter: String,
    /// 절(节) 제목 - 절 추적을 켠 경우에만 채워짐
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// 조문 표지 (예: "第十二条"), 장 제목/설명문이면 빈 문자열
    #[serde(default)]
    pub article_title: String,
    /// 청크 본문
    pub content: String,
    /// 장 제목 청크 여부
    pub is_chapter_title: bool,
    /// 1부터 시작하는 조문 번호, 조문이 아니면 0
    pub article_number: u32,
}

impl Chunk {
    /// 실제 조문 청크인지
    pub fn is_article(&self) -> bool {
        self.article_number > 0
    }
}

/// 분할 옵션
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmenterOptions {
    /// `### ` 절 제목을 추적할지 (기본: 꺼짐 - 일반 텍스트로 취급)
    pub track_sections: bool,
}

/// 줄 분류
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    /// 빈 줄 또는 구분자 줄
    Skip,
    /// 장 제목 (원문 줄, 제목 텍스트)
    Chapter(&'a str, &'a str),
    /// 절 제목 (원문 줄, 제목 텍스트)
    Section(&'a str, &'a str),
    /// 조문 시작 (원문 줄, 조문 표지)
    Article(&'a str, &'a str),
    /// 그 밖의 텍스트
    Text(&'a str),
}

fn classify(line: &str, options: SegmenterOptions) -> Line<'_> {
    if line.is_empty() || line == INFO_END_MARKER {
        return Line::Skip;
    }

    if let Some(rest) = line.strip_prefix(CHAPTER_PREFIX) {
        return Line::Chapter(line, rest.trim());
    }

    if options.track_sections {
        if let Some(rest) = line.strip_prefix(SECTION_PREFIX) {
            return Line::Section(line, rest.trim());
        }
    }

    match article_marker_re().captures(line).and_then(|c| c.get(1)) {
        Some(marker) => Line::Article(line, marker.as_str()),
        None => Line::Text(line),
    }
}

// ============================================================================
// Segmenter
// ============================================================================

/// 줄 단위 상태 기계
///
/// 누산기(현재 장/절, 열린 조문, 조문 카운터)를 들고 한 번만 훑습니다.
#[derive(Debug)]
pub struct Segmenter {
    options: SegmenterOptions,
    chapter: String,
    section: Option<String>,
    marker: String,
    lines: Vec<String>,
    counter: u32,
    output: Vec<Chunk>,
}

impl Segmenter {
    pub fn new(options: SegmenterOptions) -> Self {
        Self {
            options,
            chapter: DEFAULT_CHAPTER.to_string(),
            section: None,
            marker: String::new(),
            lines: Vec::new(),
            counter: 0,
            output: Vec::new(),
        }
    }

    /// 한 줄 처리
    pub fn push_line(&mut self, raw: &str) {
        match classify(raw.trim(), self.options) {
            Line::Skip => {}
            Line::Chapter(line, title) => {
                self.flush();
                self.chapter = title.to_string();
                self.section = None;
                self.emit_standalone(line, true);
            }
            Line::Section(line, title) => {
                self.flush();
                self.section = Some(title.to_string());
                self.emit_standalone(line, false);
            }
            Line::Article(line, marker) => {
                // 조문 안에서 다시 표지가 나오면 새 조문 (중첩 없음)
                self.flush();
                self.marker = marker.to_string();
                self.lines.push(line.to_string());
            }
            Line::Text(line) => {
                if self.lines.is_empty() {
                    self.emit_standalone(line, false);
                } else {
                    self.lines.push(line.to_string());
                }
            }
        }
    }

    /// 마지막 조문을 닫고 결과 반환
    pub fn finish(mut self) -> Vec<Chunk> {
        self.flush();
        self.output
    }

    /// 열린 조문을 내보내고 누산기 초기화
    fn flush(&mut self) {
        if self.marker.is_empty() || self.lines.is_empty() {
            return;
        }

        self.counter += 1;
        let content = self.lines.join("\n").trim().to_string();
        self.output.push(Chunk {
            chapter: self.chapter.clone(),
            section: self.section.clone(),
            article_title: std::mem::take(&mut self.marker),
            content,
            is_chapter_title: false,
            article_number: self.counter,
        });
        self.lines.clear();
    }

    fn emit_standalone(&mut self, line: &str, is_chapter_title: bool) {
        self.output.push(Chunk {
            chapter: self.chapter.clone(),
            section: self.section.clone(),
            article_title: String::new(),
            content: line.to_string(),
            is_chapter_title,
            article_number: 0,
        });
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(SegmenterOptions::default())
    }
}

/// 기본 옵션으로 법률 본문 분할
pub fn segment(text: &str) -> Vec<Chunk> {
    segment_with(text, SegmenterOptions::default())
}

/// 옵션을 지정하여 법률 본문 분할
pub fn segment_with(text: &str, options: SegmenterOptions) -> Vec<Chunk> {
    let mut segmenter = Segmenter::new(options);
    for line in text.split('\n') {
        segmenter.push_line(line);
    }
    segmenter.finish()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: &str = "## 第一章 总则\n第一条 本法适用于中华人民共和国领域。\n适用主体包括公民和法人。\n## 第二章 权利\n第二条 公民享有言论自由。";

    fn article_numbers(chunks: &[Chunk]) -> Vec<u32> {
        chunks
            .iter()
            .filter(|c| c.is_article())
            .map(|c| c.article_number)
            .collect()
    }

    #[test]
    fn test_scenario_a() {
        let chunks = segment(SCENARIO_A);
        assert_eq!(chunks.len(), 4);

        assert!(chunks[0].is_chapter_title);
        assert_eq!(chunks[0].content, "## 第一章 总则");
        assert_eq!(chunks[0].chapter, "第一章 总则");
        assert_eq!(chunks[0].article_number, 0);

        assert_eq!(chunks[1].article_title, "第一条");
        assert_eq!(chunks[1].article_number, 1);
        assert_eq!(
            chunks[1].content,
            "第一条 本法适用于中华人民共和国领域。\n适用主体包括公民和法人。"
        );
        assert_eq!(chunks[1].chapter, "第一章 总则");

        assert!(chunks[2].is_chapter_title);
        assert_eq!(chunks[2].content, "## 第二章 权利");
        assert_eq!(chunks[2].chapter, "第二章 权利");

        assert_eq!(chunks[3].article_title, "第二条");
        assert_eq!(chunks[3].article_number, 2);
        assert_eq!(chunks[3].content, "第二条 公民享有言论自由。");
        assert_eq!(chunks[3].chapter, "第二章 权利");
    }

    #[test]
    fn test_scenario_b_blank_and_sentinel_lines() {
        let text = "\n<!-- INFO END -->\n## 第一章 总则\n\n第一条 第一行。\n\n<!-- INFO END -->\n   \n第二行。\n";
        let chunks = segment(text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "第一条 第一行。\n第二行。");
        for chunk in &chunks {
            assert!(!chunk.content.contains("INFO END"));
            assert!(!chunk.content.contains("\n\n"));
        }
    }

    #[test]
    fn test_scenario_c_trailing_article_is_flushed() {
        let chunks = segment("第一条 甲。\n第二条 乙。\n乙的补充。");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].article_title, "第二条");
        assert_eq!(chunks[1].content, "第二条 乙。\n乙的补充。");
        assert_eq!(chunks[1].chapter, DEFAULT_CHAPTER);
    }

    #[test]
    fn test_empty_input() {
        assert!(segment("").is_empty());
        assert!(segment("\n\n   \n<!-- INFO END -->\n").is_empty());
    }

    #[test]
    fn test_no_markers_yields_free_text_only() {
        let chunks = segment("说明一。\n说明二。");
        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert_eq!(chunk.article_number, 0);
            assert!(!chunk.is_chapter_title);
            assert!(chunk.article_title.is_empty());
            assert_eq!(chunk.chapter, DEFAULT_CHAPTER);
        }
    }

    #[test]
    fn test_free_text_under_chapter_before_first_article() {
        let chunks = segment("## 第三章 附则\n本章说明文字。\n第九条 内容。");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].content, "本章说明文字。");
        assert_eq!(chunks[1].chapter, "第三章 附则");
        assert_eq!(chunks[1].article_number, 0);
        assert!(!chunks[1].is_chapter_title);
        assert_eq!(chunks[2].article_number, 1);
    }

    #[test]
    fn test_numeral_forms() {
        let text = "第12条 阿拉伯数字。\n第十二条 中文数字。\n第一百零八条 复合数字。\n第一千二百六十条 大数字。";
        let chunks = segment(text);
        let titles: Vec<&str> = chunks.iter().map(|c| c.article_title.as_str()).collect();
        assert_eq!(titles, vec!["第12条", "第十二条", "第一百零八条", "第一千二百六十条"]);
        assert_eq!(article_numbers(&chunks), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_marker_must_be_at_line_start() {
        let chunks = segment("第一条 依照第二条的规定。\n依照第三条执行。");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "第一条 依照第二条的规定。\n依照第三条执行。");
    }

    #[test]
    fn test_non_numeral_between_di_and_tiao_is_text() {
        let chunks = segment("第几条 不是条文。");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].article_number, 0);
    }

    #[test]
    fn test_chapter_heading_force_closes_article() {
        let chunks = segment("## 第一章 甲\n第一条 未完，\n## 第二章 乙\n续写内容。");
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[1].content, "第一条 未完，");
        assert_eq!(chunks[1].chapter, "第一章 甲");
        // 장 제목 뒤 조문이 없으므로 독립 청크
        assert_eq!(chunks[3].content, "续写内容。");
        assert_eq!(chunks[3].article_number, 0);
        assert_eq!(chunks[3].chapter, "第二章 乙");
    }

    #[test]
    fn test_chapter_heading_is_verbatim_and_title_is_trimmed() {
        let chunks = segment("  ##    第五章   法律责任  \n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "##    第五章   法律责任");
        assert_eq!(chunks[0].chapter, "第五章   法律责任");
    }

    #[test]
    fn test_whitespace_and_crlf_are_trimmed() {
        let chunks = segment("第一条　全角空格开头。\r\n\u{3000}续行。\r\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "第一条　全角空格开头。\n续行。");
    }

    #[test]
    fn test_article_numbers_are_sequential() {
        let text = "## 第一章\n第一条 a\n说明\n第二条 b\n## 第二章\n第三条 c\n第四条 d";
        let chunks = segment(text);
        assert_eq!(article_numbers(&chunks), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_order_follows_source_lines() {
        let chunks = segment("前言。\n## 第一章 总则\n第一条 甲。\n## 第二章 分则\n第二条 乙。");
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["前言。", "## 第一章 总则", "第一条 甲。", "## 第二章 分则", "第二条 乙。"]
        );
    }

    #[test]
    fn test_concatenation_matches_separate_runs() {
        let first = "## 第一章 总则\n第一条 甲。\n甲续。\n第二条 乙。";
        let second = "## 第二章 分则\n说明。\n第一条 丙。";

        let joined = segment(&format!("{}\n{}", first, second));

        let mut expected = segment(first);
        let offset = expected.iter().filter(|c| c.is_article()).count() as u32;
        expected.extend(segment(second).into_iter().map(|mut c| {
            if c.article_number > 0 {
                c.article_number += offset;
            }
            c
        }));

        assert_eq!(joined, expected);
    }

    #[test]
    fn test_sections_ignored_by_default() {
        let chunks = segment("## 第一章 总则\n### 第一节 一般规定\n第一条 甲。\n### 第二节 特别规定\n第二条 乙。");
        // 첫 절 제목은 독립 청크, 두 번째는 第一条 뒤에 이어 붙음
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[1].content, "### 第一节 一般规定");
        assert_eq!(chunks[2].content, "第一条 甲。\n### 第二节 特别规定");
        assert!(chunks.iter().all(|c| c.section.is_none()));
    }

    #[test]
    fn test_section_tracking() {
        let options = SegmenterOptions { track_sections: true };
        let text = "## 第一章 总则\n### 第一节 一般规定\n第一条 甲。\n### 第二节 特别规定\n第二条 乙。\n## 第二章 分则\n第三条 丙。";
        let chunks = segment_with(text, options);

        assert_eq!(chunks.len(), 7);
        assert_eq!(chunks[2].article_title, "第一条");
        assert_eq!(chunks[2].content, "第一条 甲。");
        assert_eq!(chunks[2].section.as_deref(), Some("第一节 一般规定"));

        assert_eq!(chunks[3].content, "### 第二节 特别规定");
        assert!(!chunks[3].is_chapter_title);
        assert_eq!(chunks[3].article_number, 0);

        assert_eq!(chunks[4].section.as_deref(), Some("第二节 特别规定"));
        // 장이 바뀌면 절 초기화
        assert_eq!(chunks[6].section, None);
        assert_eq!(article_numbers(&chunks), vec![1, 2, 3]);
    }

    #[test]
    fn test_chunk_serializes_without_section() {
        let chunks = segment("第一条 甲。");
        let json = serde_json::to_value(&chunks[0]).unwrap();
        assert!(json.get("section").is_none());
        assert_eq!(json["article_title"], "第一条");
        assert_eq!(json["article_number"], 1);
    }
}
