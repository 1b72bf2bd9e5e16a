//! CLI 모듈
//!
//! lawrag CLI 명령어 정의 및 구현
//!
//! process -> index -> ask/chat 순서로 사용합니다.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::embedding::{create_embedder, has_api_key, EmbeddingProvider};
use crate::knowledge::{Indexer, LanceVectorStore, VectorStore};
use crate::law::{
    read_records, write_records, ArticleDistribution, ConsistencyReport, LawProcessor,
    SegmenterOptions,
};
use crate::llm::GeminiChat;
use crate::rag::{Answer, LawRagSystem, LexicalReranker};

/// 답변 줄바꿈 폭 (문자 수)
const WRAP_WIDTH: usize = 80;
/// 출력할 최대 근거 조문 수
const MAX_SOURCES_SHOWN: usize = 5;
/// 출력할 근거 조문의 최소 관련도
const MIN_SOURCE_RELEVANCE: f32 = 0.1;

const API_KEY_HELP: &str = "API 키가 설정되지 않았습니다.\n\n\
     설정 방법:\n  \
     export GEMINI_API_KEY=your-api-key\n  \
     또는\n  \
     export GOOGLE_AI_API_KEY=your-api-key\n\n\
     API 키 발급: https://aistudio.google.com/app/apikey";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "lawrag")]
#[command(version, about = "중국 법률 조문 RAG 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 원본 Markdown 법률 파일을 조문 레코드(JSON)로 변환
    Process {
        /// 원본 디렉토리 (법률 종류별 하위 폴더)
        #[arg(short, long)]
        raw_dir: Option<PathBuf>,

        /// 출력 JSON 경로
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// `### ` 절 제목 추적
        #[arg(long)]
        sections: bool,
    },

    /// 처리된 JSON의 일관성 점검
    Check {
        /// 입력 JSON 경로
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// 조문 레코드를 임베딩하여 벡터 저장소에 적재
    Index {
        /// 입력 JSON 경로
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// 배치 크기
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// 기존 벡터를 지우고 다시 적재
        #[arg(long)]
        force: bool,
    },

    /// 조문 검색 (답변 생성 없음)
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// 질문 하나에 답변
    Ask {
        /// 질문
        question: String,

        /// 재정렬 끄기
        #[arg(long)]
        no_rerank: bool,
    },

    /// 대화형 질의응답
    Chat {
        /// 재정렬 끄기
        #[arg(long)]
        no_rerank: bool,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Process {
            raw_dir,
            output,
            sections,
        } => cmd_process(&config, raw_dir, output, sections),
        Commands::Check { input } => cmd_check(&config, input),
        Commands::Index {
            input,
            batch_size,
            force,
        } => cmd_index(&config, input, batch_size, force).await,
        Commands::Query { query, limit } => cmd_query(&config, &query, limit).await,
        Commands::Ask {
            question,
            no_rerank,
        } => cmd_ask(&config, &question, no_rerank).await,
        Commands::Chat { no_rerank } => cmd_chat(&config, no_rerank).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 처리 명령어 (process)
fn cmd_process(
    config: &Config,
    raw_dir: Option<PathBuf>,
    output: Option<PathBuf>,
    sections: bool,
) -> Result<()> {
    let raw_dir = raw_dir.unwrap_or_else(|| config.raw_dir.clone());
    let output = output.unwrap_or_else(|| config.processed_file.clone());

    println!("[*] 법률 파일 처리 중: {}", raw_dir.display());

    let processor = LawProcessor::new(SegmenterOptions {
        track_sections: sections,
    });
    let result = processor
        .process_directory(&raw_dir)
        .context("법률 파일 처리 실패")?;

    write_records(&output, &result.records).context("결과 저장 실패")?;

    let summary = &result.summary;
    println!(
        "[OK] 파일 {} 개 중 {} 개 처리 (실패 {})",
        summary.files_found, summary.files_processed, summary.files_failed
    );
    println!("     레코드: {} 건", summary.records);
    println!("     저장: {}", output.display());
    println!();

    print_distribution(&ArticleDistribution::from_records(&result.records));
    Ok(())
}

/// 점검 명령어 (check)
fn cmd_check(config: &Config, input: Option<PathBuf>) -> Result<()> {
    let input = input.unwrap_or_else(|| config.processed_file.clone());
    let records = read_records(&input).context("처리된 데이터 읽기 실패")?;
    let report = ConsistencyReport::from_records(&records);

    println!("[*] 데이터 점검: {}", input.display());
    println!("    총 레코드: {}", report.total);
    println!(
        "    장 제목: {}, 조문: {}",
        report.chapter_titles, report.articles
    );
    println!("    법률 수: {}", report.distinct_laws);
    for (law, count) in &report.top_laws {
        println!("      - {}: {}", law, count);
    }

    if report.duplicate_contents > 0 {
        println!("[!] 중복 내용: {} 종류", report.duplicate_contents);
        for (content, count) in &report.duplicate_examples {
            println!("      ({}회) {}", count, truncate_text(content, 50));
        }
    } else {
        println!("[OK] 중복 내용 없음");
    }

    if report.empty_contents > 0 {
        println!("[!] 빈 내용: {} 건", report.empty_contents);
    } else {
        println!("[OK] 빈 내용 없음");
    }

    Ok(())
}

/// 적재 명령어 (index)
async fn cmd_index(
    config: &Config,
    input: Option<PathBuf>,
    batch_size: Option<usize>,
    force: bool,
) -> Result<()> {
    if !has_api_key() {
        bail!(API_KEY_HELP);
    }

    let input = input.unwrap_or_else(|| config.processed_file.clone());
    let batch_size = batch_size.unwrap_or(config.batch_size);

    let records = read_records(&input).context("처리된 데이터 읽기 실패")?;
    println!("[*] 레코드 {} 건 로드: {}", records.len(), input.display());

    if batch_size == 0 {
        bail!("배치 크기는 1 이상이어야 합니다");
    }

    // 저장소를 건드리기 전에 임베더부터 준비
    let embedder = create_embedder(config.embedding_dimension).context("임베더 생성 실패")?;
    let store = LanceVectorStore::open(&config.vector_db_dir, config.embedding_dimension)
        .await
        .context("LanceDB 열기 실패")?;

    let cleared = prepare_store(&store, force).await?;
    if cleared > 0 {
        println!("[*] 기존 벡터 {} 건 삭제", cleared);
    }

    println!(
        "[*] 임베딩 생성 중 ({}, 배치 {})",
        embedder.name(),
        batch_size
    );

    let summary = Indexer::new(&embedder, &store)
        .index(&records, batch_size)
        .await?;

    println!(
        "[OK] {} 건 적재 (배치 {} 개, 실패 {})",
        summary.added, summary.batches, summary.skipped_batches
    );
    if summary.skipped_empty > 0 {
        println!("[!] 빈 내용 {} 건 제외", summary.skipped_empty);
    }
    println!("     벡터 총계: {}", store.count().await?);

    Ok(())
}

/// 검색 명령어 (query)
async fn cmd_query(config: &Config, query: &str, limit: usize) -> Result<()> {
    if !has_api_key() {
        bail!(API_KEY_HELP);
    }

    println!("[*] 검색 중: \"{}\"", query);

    let store = LanceVectorStore::open(&config.vector_db_dir, config.embedding_dimension)
        .await
        .context("LanceDB 열기 실패")?;
    let embedder = create_embedder(config.embedding_dimension)?;

    let embedding = embedder.embed_query(query).await.context("질의 임베딩 실패")?;
    let hits = store.search(&embedding, limit).await.context("검색 실패")?;

    if hits.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [유사도: {:.3}] 《{}》 {}",
            i + 1,
            hit.similarity,
            hit.record.law,
            hit.record.chunk.chapter
        );
        if !hit.record.chunk.article_title.is_empty() {
            println!("   조문: {}", hit.record.chunk.article_title);
        }
        println!("   내용: {}", truncate_text(hit.record.content(), 200));
        println!();
    }

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(config: &Config, question: &str, no_rerank: bool) -> Result<()> {
    let mut system = build_rag(config, no_rerank).await?;
    system.ensure_ready().await?;

    println!("[*] 관련 조문 검색 중: \"{}\"", question);
    let answer = system.ask(question).await?;
    print_answer(&answer);
    Ok(())
}

/// 대화 명령어 (chat)
async fn cmd_chat(config: &Config, no_rerank: bool) -> Result<()> {
    let mut system = build_rag(config, no_rerank).await?;
    let count = system.ensure_ready().await?;

    println!("{}", "=".repeat(70));
    println!("법률 질의응답 (조문 {} 건)", count);
    println!("  예: 什么是正当防卫？ / 劳动者有哪些权利？ / 如何申请行政复议？");
    println!("  'history' 대화 기록, 'clear' 기록 삭제, 'quit' / 'exit' / '退出' 종료");
    println!("{}", "=".repeat(70));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n질문> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };

        match parse_chat_input(&line) {
            ChatInput::Quit => break,
            ChatInput::Empty => println!("[!] 질문을 입력하세요"),
            ChatInput::Clear => {
                system.clear_history();
                println!("[OK] 대화 기록을 삭제했습니다");
            }
            ChatInput::History => {
                if system.history().is_empty() {
                    println!("[!] 대화 기록이 없습니다");
                }
                for (i, entry) in system.history().iter().enumerate() {
                    println!(
                        "{}. [{}] Q: {}",
                        i + 1,
                        entry.asked_at.format("%H:%M:%S"),
                        entry.query
                    );
                    println!("   A: {}", truncate_text(&entry.answer, 100));
                }
            }
            ChatInput::Question(q) => match system.ask(q).await {
                Ok(answer) => print_answer(&answer),
                Err(e) => println!("[!] 처리 실패: {:#}", e),
            },
        }
    }

    println!("\n[OK] 종료합니다");
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &Config) -> Result<()> {
    println!("lawrag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 원본 디렉토리: {}", config.raw_dir.display());
    println!(
        "[*] 모델: {} / 임베딩 차원 {}",
        config.chat_model, config.embedding_dimension
    );

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    if config.processed_file.exists() {
        match read_records(&config.processed_file) {
            Ok(records) => println!("[OK] 처리된 레코드: {} 건", records.len()),
            Err(e) => println!("[!] 처리된 데이터 읽기 실패: {}", e),
        }
    } else {
        println!("[!] 처리된 데이터 없음 (lawrag process 실행 필요)");
    }

    match LanceVectorStore::open(&config.vector_db_dir, config.embedding_dimension).await {
        Ok(store) => match store.count().await {
            Ok(count) => println!("[OK] 벡터 인덱스: {} 건", count),
            Err(e) => println!("[!] 벡터 개수 조회 실패: {}", e),
        },
        Err(e) => println!("[!] LanceDB 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// RAG 시스템 구성
async fn build_rag(config: &Config, no_rerank: bool) -> Result<LawRagSystem> {
    if !has_api_key() {
        bail!(API_KEY_HELP);
    }

    let embedder = create_embedder(config.embedding_dimension).context("임베더 생성 실패")?;
    let store = LanceVectorStore::open(&config.vector_db_dir, config.embedding_dimension)
        .await
        .context("LanceDB 열기 실패")?;
    let chat = GeminiChat::from_env(config.chat_model.as_str()).context("채팅 모델 생성 실패")?;

    let system = LawRagSystem::new(Box::new(embedder), Box::new(store), Box::new(chat));
    Ok(if no_rerank {
        system
    } else {
        system.with_reranker(Box::new(LexicalReranker::new()))
    })
}

/// 적재 전 저장소 점검
///
/// 비어 있지 않으면 `force` 일 때만 비우고, 삭제한 개수를 반환합니다.
async fn prepare_store(store: &dyn VectorStore, force: bool) -> Result<usize> {
    let existing = store.count().await?;
    if existing == 0 {
        return Ok(0);
    }

    if !force {
        bail!(
            "벡터 저장소에 이미 {} 건이 있습니다. 다시 적재하려면 --force 를 사용하세요",
            existing
        );
    }

    store.clear().await.context("벡터 저장소 초기화 실패")?;
    Ok(existing)
}

/// 대화 입력 종류
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Quit,
    Empty,
    Clear,
    History,
    Question(&'a str),
}

fn parse_chat_input(line: &str) -> ChatInput<'_> {
    let input = line.trim();
    match input.to_lowercase().as_str() {
        "quit" | "exit" | "退出" => ChatInput::Quit,
        "" => ChatInput::Empty,
        "clear" => ChatInput::Clear,
        "history" => ChatInput::History,
        _ => ChatInput::Question(input),
    }
}

fn print_section_header(title: &str) {
    println!("\n{}", "━".repeat(60));
    println!("{}", title);
    println!("{}", "━".repeat(60));
}

/// 답변 + 근거 조문 출력
fn print_answer(answer: &Answer) {
    print_section_header(&format!("답변 ({})", answer.question_type));
    println!("{}", wrap_text(&answer.answer, WRAP_WIDTH));

    if !answer.has_relevant_laws {
        print_section_header("참고");
        println!("관련 조문을 찾지 못했습니다. 위 답변은 모델의 일반 법률 지식에 기반합니다.");
        return;
    }

    print_section_header("관련 조문");
    println!("총 {} 건", answer.sources.len());

    for (i, source) in answer
        .top_sources(MAX_SOURCES_SHOWN, MIN_SOURCE_RELEVANCE)
        .iter()
        .enumerate()
    {
        println!("\n{}. 《{}》", i + 1, source.law);
        println!("   장: {}", source.chapter);
        if !source.article_title.is_empty() {
            println!("   조문: {}", source.article_title);
        }
        println!("   관련도: {:.3}", source.relevance);
        for line in wrap_text(&source.content, 70).lines() {
            println!("   {}", line);
        }
    }

    let remaining = answer.sources.len().saturating_sub(MAX_SOURCES_SHOWN);
    if remaining > 0 {
        println!("\n[*] 표시되지 않은 조문 {} 건", remaining);
    }
}

/// 문자 수 기준 줄바꿈 (짧은 줄은 그대로)
fn wrap_text(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut wrapped = Vec::new();
    for line in text.lines() {
        let chars: Vec<char> = line.chars().collect();
        if chars.len() <= width {
            wrapped.push(line.to_string());
        } else {
            wrapped.extend(chars.chunks(width).map(|c| c.iter().collect::<String>()));
        }
    }
    wrapped.join("\n")
}

fn print_distribution(dist: &ArticleDistribution) {
    println!("[*] 조문 분포");
    println!(
        "    장 제목: {}, 조문: {}, 기타: {}",
        dist.chapter_titles, dist.articles, dist.other
    );
    println!(
        "    길이: 평균 {:.1}, 최소 {}, 최대 {}",
        dist.avg_length, dist.min_length, dist.max_length
    );
    for bucket in &dist.buckets {
        println!(
            "      {:>8}: {:>6} ({:.1}%)",
            bucket.label, bucket.count, bucket.percentage
        );
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::InMemoryVectorStore;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate_text("中华人民共和国宪法", 4), "中华人民...");
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("短句", 80), "短句");
        assert_eq!(wrap_text("一二三四五", 2), "一二\n三四\n五");
        assert_eq!(wrap_text("ab\ncdef", 3), "ab\ncde\nf");
        assert_eq!(wrap_text("abc", 0), "abc");
    }

    #[test]
    fn test_parse_chat_input() {
        assert_eq!(parse_chat_input(" quit "), ChatInput::Quit);
        assert_eq!(parse_chat_input("EXIT"), ChatInput::Quit);
        assert_eq!(parse_chat_input("退出"), ChatInput::Quit);
        assert_eq!(parse_chat_input("   "), ChatInput::Empty);
        assert_eq!(parse_chat_input("Clear"), ChatInput::Clear);
        assert_eq!(parse_chat_input("history"), ChatInput::History);
        assert_eq!(
            parse_chat_input(" 什么是正当防卫？\n"),
            ChatInput::Question("什么是正当防卫？")
        );
    }

    fn stored_entry() -> crate::knowledge::LawVectorEntry {
        crate::knowledge::LawVectorEntry {
            id: "a".to_string(),
            record: crate::law::LawRecord {
                chunk: crate::law::Chunk {
                    chapter: "第一章 总则".to_string(),
                    section: None,
                    article_title: "第一条".to_string(),
                    content: "第一条 甲。".to_string(),
                    is_chapter_title: false,
                    article_number: 1,
                },
                law_type: "宪法".to_string(),
                law: "宪法".to_string(),
                source_file: "宪法.md".to_string(),
                content_length: 6,
            },
            embedding: vec![1.0, 0.0],
        }
    }

    #[tokio::test]
    async fn test_prepare_store_empty() {
        let store = InMemoryVectorStore::new();
        assert_eq!(prepare_store(&store, false).await.unwrap(), 0);
        assert_eq!(prepare_store(&store, true).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_prepare_store_refuses_to_append() {
        let store = InMemoryVectorStore::new();
        store.insert_batch(&[stored_entry()]).await.unwrap();

        let err = prepare_store(&store, false).await.unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prepare_store_force_clears() {
        let store = InMemoryVectorStore::new();
        store.insert_batch(&[stored_entry()]).await.unwrap();

        assert_eq!(prepare_store(&store, true).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["lawrag", "index", "--batch-size", "100", "--force"]).unwrap();
        match cli.command {
            Commands::Index {
                batch_size, force, ..
            } => {
                assert_eq!(batch_size, Some(100));
                assert!(force);
            }
            _ => panic!("expected index"),
        }

        let cli = Cli::try_parse_from(["lawrag", "ask", "什么是正当防卫？", "--no-rerank"]).unwrap();
        assert!(matches!(cli.command, Commands::Ask { no_rerank: true, .. }));
    }
}
