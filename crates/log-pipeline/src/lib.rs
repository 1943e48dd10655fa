#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: 입력 수집기 (파일, 표준 입력, syslog UDP/TCP)
//! - [`parser`]: 레코드 추출 파서, syslog 메시지 파서
//! - [`filter`]: 필터 매처와 컴파일된 필터
//! - [`aggregate`]: 필터별 주기 통계 누적 및 디스패치
//! - [`output`]: 출력 레지스트리와 싱크 (console, zabbix)
//! - [`scheduler`]: 주기 틱 구동 (드레인/파싱/집계/디스패치)
//! - [`buffer`]: 수집기 입력 버퍼
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 컴파일된 파이프라인 설정
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Collector -> InputBuffer -> Scheduler -> RecordParser -> AggregatorSet -> OutputGroup
//!     |                           |                            |
//! File/Stdin/Syslog          period tick              per-filter Aggregator
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scheduler;

pub mod aggregate;
pub mod collector;
pub mod filter;
pub mod output;
pub mod parser;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{StatsPipeline, StatsPipelineBuilder};

// 설정
pub use config::PipelineConfig;

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::{RecordParser, SyslogMessage, SyslogMessageParser};

// 필터
pub use filter::{FilterSpec, Matcher};

// 집계
pub use aggregate::{Aggregator, AggregatorSet, DispatchReport};

// 스케줄러
pub use scheduler::{Scheduler, SchedulerPhase, TickReport};

// 수집기
pub use collector::{InputCollector, InputDsn, open_collector};

// 출력
pub use output::{OutputGroup, OutputRegistry};

// 버퍼
pub use buffer::InputBuffer;
