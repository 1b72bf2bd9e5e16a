//! Law 모듈 - 중국 법률 Markdown 처리
//!
//! - Segmenter: 줄 단위 상태 기계로 장/조문 분할
//! - Metadata: 파일 경로 기반 법률 이름/종류, 머리말 분리
//! - Processor: 파일/디렉토리 처리, JSON 입출력
//! - Stats: 분포 분석, 일관성 점검

mod metadata;
mod processor;
mod segmenter;
mod stats;

// Re-exports
pub use metadata::{
    content_length, law_name_from_file, law_type_from_folder, split_preamble, SeparatorCount,
};
pub use processor::{
    read_records, write_records, LawProcessor, LawRecord, ProcessError, ProcessOutput,
    ProcessSummary,
};
pub use segmenter::{
    segment, segment_with, Chunk, Segmenter, SegmenterOptions, DEFAULT_CHAPTER, INFO_END_MARKER,
};
pub use stats::{ArticleDistribution, ConsistencyReport, LengthBucket, LENGTH_BUCKETS};
