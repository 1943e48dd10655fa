//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 수집/파싱/집계/출력 중 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LogstatError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! # 에러 분류
//! - 시작 시 치명적: `InvalidDsn`, `UnsupportedProtocol`, `Regex`, `Config`
//! - 레코드 단위 복구 가능: `EmptyResult`, `UnknownFormat`
//! - 정책에 따라 다름: `NumericField`

use logstat_core::error::{LogstatError, OutputError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// DSN이 `syslog:<protocol>:<listen>/<application>` 형식이 아님
    #[error("invalid DSN: {0}")]
    InvalidDsn(String),

    /// syslog 프로토콜이 udp/tcp가 아님
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// 추출 정규식이 라인에 매칭되지 않음
    #[error("bad string or regular expression: {line}")]
    EmptyResult {
        /// 매칭에 실패한 라인
        line: String,
    },

    /// syslog 메시지가 알려진 형식 어디에도 맞지 않음
    #[error("unknown syslog message format: {0}")]
    UnknownFormat(String),

    /// 집계 필드 값이 숫자가 아님
    #[error("field '{field}' has non-numeric value '{value}'")]
    NumericField {
        /// 필드 이름
        field: String,
        /// 원본 값
        value: String,
    },

    /// 수집기 에러 (파일 I/O, 네트워크 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (file, stdin, syslog_udp, syslog_tcp)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 출력 싱크 에러
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl LogPipelineError {
    /// 레코드 하나만 버리고 계속 진행할 수 있는 에러인지 여부
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptyResult { .. } | Self::UnknownFormat(_))
    }
}

impl From<LogPipelineError> for LogstatError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Output(e) => LogstatError::Output(e),
            LogPipelineError::Io(e) => LogstatError::Io(e),
            other => LogstatError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
