//! 설정 - 환경변수 기반 경로/모델/배치 크기

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::embedding::{DEFAULT_DIMENSION, VALID_DIMENSIONS};
use crate::llm::DEFAULT_CHAT_MODEL;

pub const ENV_DATA_DIR: &str = "LAWRAG_DATA_DIR";
pub const ENV_RAW_DIR: &str = "LAWRAG_RAW_DIR";
pub const ENV_EMBEDDING_DIMENSION: &str = "LAWRAG_EMBEDDING_DIMENSION";
pub const ENV_CHAT_MODEL: &str = "LAWRAG_CHAT_MODEL";
pub const ENV_BATCH_SIZE: &str = "LAWRAG_BATCH_SIZE";

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// 기본 데이터 디렉토리 (~/.local/share/.lawrag 등)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lawrag")
}

/// 실행 설정
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// 원본 Markdown 루트 (법률 종류별 하위 폴더)
    pub raw_dir: PathBuf,
    /// 처리 결과 JSON
    pub processed_file: PathBuf,
    /// LanceDB 디렉토리
    pub vector_db_dir: PathBuf,
    pub embedding_dimension: usize,
    pub chat_model: String,
    pub batch_size: usize,
}

impl Config {
    /// 프로세스 환경변수에서 로드
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수에서 로드 (빈 값은 미설정으로 취급)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = get(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let raw_dir = get(ENV_RAW_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("raw"));

        let embedding_dimension = parse_or(
            get(ENV_EMBEDDING_DIMENSION),
            ENV_EMBEDDING_DIMENSION,
            DEFAULT_DIMENSION,
        )?;
        if !VALID_DIMENSIONS.contains(&embedding_dimension) {
            anyhow::bail!(
                "Invalid {}: {} (valid: {:?})",
                ENV_EMBEDDING_DIMENSION,
                embedding_dimension,
                VALID_DIMENSIONS
            );
        }

        Ok(Self {
            processed_file: data_dir.join("processed").join("laws_processed.json"),
            vector_db_dir: data_dir.join("vectors.lance"),
            raw_dir,
            embedding_dimension,
            chat_model: get(ENV_CHAT_MODEL).unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            batch_size: parse_or(get(ENV_BATCH_SIZE), ENV_BATCH_SIZE, DEFAULT_BATCH_SIZE)?,
            data_dir,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {:?}", key, v)),
        None => Ok(default),
    }
}
