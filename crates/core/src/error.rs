//! 에러 타입 -- 도메인별 에러 정의

/// logstat 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogstatError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 출력 싱크 에러
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 필터가 하나도 없음
    #[error("filters not set")]
    FiltersNotSet,

    /// 출력이 하나도 없음
    #[error("at least one output must be specified, 0 found")]
    OutputsNotSet,

    /// 분류할 수 없는 메트릭 이름
    #[error("unknown metric '{metric}' for field '{field}'")]
    UnknownMetric { field: String, metric: String },

    /// 메트릭이 요구하는 필드 집합에 필드가 선언되지 않음
    #[error("field '{field}' must be declared in '{expected}' because metric '{metric}' is requested")]
    FieldNotDeclared {
        field: String,
        metric: String,
        expected: String,
    },

    /// 알 수 없는 입력 DSN 스킴
    #[error("unknown input type: {0}")]
    UnknownInput(String),
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 스케줄러 실행 중 치명적 에러
    #[error("scheduler failed: {0}")]
    Scheduler(String),
}

/// 출력 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// 등록되지 않은 출력 유형
    #[error("unknown output type: {0}")]
    UnknownType(String),

    /// 설정 누락 또는 잘못된 설정
    #[error("output '{output}' init failed: {reason}")]
    InitFailed { output: String, reason: String },

    /// 배치 전송 실패
    #[error("output '{output}' send failed: {reason}")]
    SendFailed { output: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_not_declared_display_names_everything() {
        let err = ConfigError::FieldNotDeclared {
            field: "status".to_owned(),
            metric: "cps_200".to_owned(),
            expected: "counts".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("status"));
        assert!(msg.contains("cps_200"));
        assert!(msg.contains("counts"));
    }

    #[test]
    fn config_error_converts_to_top_level() {
        let err: LogstatError = ConfigError::FiltersNotSet.into();
        assert!(matches!(err, LogstatError::Config(ConfigError::FiltersNotSet)));
    }

    #[test]
    fn output_error_display() {
        let err = OutputError::SendFailed {
            output: "zabbix".to_owned(),
            reason: "connection refused".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "output 'zabbix' send failed: connection refused"
        );
    }
}
