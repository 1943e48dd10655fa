//! 설정 관리 -- 설정 파일 파싱 및 검증
//!
//! [`LogstatConfig`]는 입력 DSN, 추출 정규식, 주기, 필드 분류, 필터, 출력을 담는
//! 최상위 구조체입니다. 프로세스 시작 시 한 번 로드되고 이후 변경되지 않습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, daemon에서 적용)
//! 2. 환경변수 (`LOGSTAT_GENERAL_LOG_LEVEL=debug` 형식)
//! 3. 설정 파일 (`.toml`, `.json`, `.yaml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logstat_core::error::LogstatError> {
//! use logstat_core::config::LogstatConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드 + 검증
//! let config = LogstatConfig::load("logstat.toml").await?;
//! let period = config.period_duration()?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogstatError};
use crate::types::{FieldKind, Metric};

/// 알려진 입력 DSN 스킴
pub const INPUT_SCHEMES: [&str; 3] = ["file:", "stdin:", "syslog:"];

/// 설정 파일 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    /// 파일 확장자로 형식을 판별합니다. 알 수 없으면 TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Toml,
        }
    }
}

/// logstat 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogstatConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 입력 DSN (`file:<path>`, `stdin:`, `syslog:<udp|tcp>:<addr>/<app>`)
    #[serde(default)]
    pub input: String,
    /// 레코드 추출 정규식 (named group 필수)
    #[serde(default)]
    pub regexp: String,
    /// 집계 주기 (`"10s"`, `"1m"`)
    #[serde(default = "default_period")]
    pub period: String,
    /// 값별 출현 횟수를 세는 필드
    #[serde(default)]
    pub counts: Vec<String>,
    /// 숫자 시리즈로 누적하는 필드
    #[serde(default)]
    pub aggregates: Vec<String>,
    /// 필터 목록 (순서 유지)
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    /// 출력 싱크 목록 (순서 유지)
    #[serde(default, rename = "output", alias = "outputs")]
    pub outputs: Vec<OutputConfig>,
    /// 파일 입력 설정
    #[serde(default)]
    pub tail: TailConfig,
    /// syslog 입력 설정
    #[serde(default)]
    pub syslog: SyslogConfig,
}

fn default_period() -> String {
    "60s".to_owned()
}

impl Default for LogstatConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            input: String::new(),
            regexp: String::new(),
            period: default_period(),
            counts: Vec::new(),
            aggregates: Vec::new(),
            filters: Vec::new(),
            outputs: Vec::new(),
            tail: TailConfig::default(),
            syslog: SyslogConfig::default(),
        }
    }
}

impl LogstatConfig {
    /// 파일에서 설정을 로드하고 환경변수 오버라이드를 적용한 뒤 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogstatError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    ///
    /// 형식은 확장자로 결정됩니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogstatError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogstatError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogstatError::Io(e)
            }
        })?;
        Self::parse_as(&content, ConfigFormat::from_path(path))
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogstatError> {
        Self::parse_as(toml_str, ConfigFormat::Toml)
    }

    /// 지정한 형식으로 설정 문자열을 파싱합니다.
    pub fn parse_as(content: &str, format: ConfigFormat) -> Result<Self, LogstatError> {
        let parsed = match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| LogstatError::Config(ConfigError::ParseFailed { reason }))
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSTAT_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "LOGSTAT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSTAT_GENERAL_LOG_FORMAT");
        override_string(&mut self.input, "LOGSTAT_INPUT");
        override_string(&mut self.period, "LOGSTAT_PERIOD");
        override_bool(&mut self.tail.from_start, "LOGSTAT_TAIL_FROM_START");
        override_usize(
            &mut self.syslog.max_connections,
            "LOGSTAT_SYSLOG_MAX_CONNECTIONS",
        );
    }

    /// 주기를 `Duration`으로 파싱합니다. 0이면 에러.
    pub fn period_duration(&self) -> Result<Duration, ConfigError> {
        let period =
            humantime::parse_duration(self.period.trim()).map_err(|e| ConfigError::InvalidValue {
                field: "period".to_owned(),
                reason: format!("'{}': {e}", self.period),
            })?;
        if period.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "period".to_owned(),
                reason: "period must be greater than zero".to_owned(),
            });
        }
        Ok(period)
    }

    /// 필드가 해당 분류 섹션에 선언되어 있는지 확인합니다.
    pub fn is_declared(&self, field: &str, kind: FieldKind) -> bool {
        let declared = match kind {
            FieldKind::Aggregate => &self.aggregates,
            FieldKind::Count => &self.counts,
        };
        declared.iter().any(|f| f == field)
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 정규식 컴파일과 DSN 세부 형식은 파이프라인 빌드 시 검증됩니다.
    pub fn validate(&self) -> Result<(), LogstatError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.input.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "input".to_owned(),
                reason: "input DSN must not be empty".to_owned(),
            }
            .into());
        }
        if !INPUT_SCHEMES
            .iter()
            .any(|scheme| self.input.starts_with(scheme))
        {
            return Err(ConfigError::UnknownInput(self.input.clone()).into());
        }

        if self.regexp.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "regexp".to_owned(),
                reason: "extraction pattern must not be empty".to_owned(),
            }
            .into());
        }

        self.period_duration()?;

        if self.filters.is_empty() {
            return Err(ConfigError::FiltersNotSet.into());
        }
        for filter in &self.filters {
            self.validate_filter(filter)?;
        }

        if self.outputs.is_empty() {
            return Err(ConfigError::OutputsNotSet.into());
        }
        for (idx, output) in self.outputs.iter().enumerate() {
            if output.output_type.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("output[{idx}].type"),
                    reason: "output type must not be empty".to_owned(),
                }
                .into());
            }
        }

        if self.tail.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tail.poll_interval_ms".to_owned(),
                reason: "must be greater than zero".to_owned(),
            }
            .into());
        }
        if self.syslog.max_connections == 0 || self.syslog.max_line_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "syslog".to_owned(),
                reason: "max_connections and max_line_length must be greater than zero"
                    .to_owned(),
            }
            .into());
        }
        if self.syslog.max_connections > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(ConfigError::InvalidValue {
                field: "syslog.max_connections".to_owned(),
                reason: format!(
                    "must not exceed {}",
                    tokio::sync::Semaphore::MAX_PERMITS
                ),
            }
            .into());
        }

        Ok(())
    }

    /// 필터의 모든 메트릭이 분류 가능하고, 필드가 맞는 섹션에 선언되었는지 검증합니다.
    fn validate_filter(&self, filter: &FilterConfig) -> Result<(), ConfigError> {
        for item in &filter.items {
            for name in &item.metrics {
                let metric = Metric::parse(name).ok_or_else(|| ConfigError::UnknownMetric {
                    field: item.field.clone(),
                    metric: name.clone(),
                })?;
                let kind = metric.kind();
                if !self.is_declared(&item.field, kind) {
                    return Err(ConfigError::FieldNotDeclared {
                        field: item.field.clone(),
                        metric: name.clone(),
                        expected: kind.section().to_owned(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// 숫자 필드 파싱 실패 시 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericParsePolicy {
    /// 경고 로그를 남기고 해당 값만 건너뜀 (기본값)
    #[default]
    Skip,
    /// 스케줄러를 중단하고 프로세스를 종료
    Fatal,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 집계 필드 값이 숫자가 아닐 때의 정책
    pub numeric_parse_policy: NumericParsePolicy,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            numeric_parse_policy: NumericParsePolicy::default(),
        }
    }
}

/// 필터 설정
///
/// `filter`가 빈 문자열, `*`, `.+`, `.*`이면 모든 레코드에 매칭됩니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// 매칭 문자열 (부분 문자열 또는 정규식)
    #[serde(default)]
    pub filter: String,
    /// 메트릭 키 접두어
    #[serde(default)]
    pub prefix: String,
    /// 필드별 메트릭 목록
    #[serde(default)]
    pub items: Vec<FilterItem>,
}

/// 필드 하나와 그 필드에 대해 계산할 메트릭 목록
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterItem {
    /// 필드 이름
    pub field: String,
    /// 메트릭 이름 목록
    #[serde(default)]
    pub metrics: Vec<String>,
}

/// 출력 싱크 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 출력 유형 (console, zabbix)
    #[serde(rename = "type")]
    pub output_type: String,
    /// 유형별 설정
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

/// 파일 입력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// 파일 처음부터 읽을지 여부 (기본: 끝에서 시작)
    pub from_start: bool,
    /// 파일 상태 체크 주기 (밀리초)
    pub poll_interval_ms: u64,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            from_start: false,
            poll_interval_ms: 250,
        }
    }
}

/// syslog 입력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// TCP 최대 동시 연결 수
    pub max_connections: usize,
    /// TCP 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            max_connections: 256,
            max_line_length: 64 * 1024, // 64KB
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> LogstatConfig {
        LogstatConfig {
            input: "stdin:".to_owned(),
            regexp: r"status=(?P<status>\d+) time=(?P<time>[\d.]+)".to_owned(),
            period: "1s".to_owned(),
            counts: vec!["status".to_owned()],
            aggregates: vec!["time".to_owned()],
            filters: vec![FilterConfig {
                filter: ".+".to_owned(),
                prefix: String::new(),
                items: vec![
                    FilterItem {
                        field: "status".to_owned(),
                        metrics: vec!["cps_200".to_owned(), "uniq".to_owned()],
                    },
                    FilterItem {
                        field: "time".to_owned(),
                        metrics: vec!["avg".to_owned(), "cent_95".to_owned()],
                    },
                ],
            }],
            outputs: vec![OutputConfig {
                output_type: "console".to_owned(),
                settings: HashMap::new(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = LogstatConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(
            config.general.numeric_parse_policy,
            NumericParsePolicy::Skip
        );
        assert_eq!(config.period, "60s");
        assert!(!config.tail.from_start);
        assert_eq!(config.syslog.max_connections, 256);
    }

    #[test]
    fn valid_config_passes_validation() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn syslog_max_connections_is_bounded() {
        let mut config = valid_config();
        config.syslog.max_connections = usize::MAX;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            LogstatError::Config(ConfigError::InvalidValue { ref field, .. })
                if field == "syslog.max_connections"
        ));

        config.syslog.max_connections = tokio::sync::Semaphore::MAX_PERMITS;
        config.validate().unwrap();
    }

    #[test]
    fn period_duration_parses_human_format() {
        let mut config = valid_config();
        config.period = "1m".to_owned();
        assert_eq!(config.period_duration().unwrap(), Duration::from_secs(60));
        config.period = "500ms".to_owned();
        assert_eq!(
            config.period_duration().unwrap(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut config = valid_config();
        config.period = "0s".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("period"));
    }

    #[test]
    fn garbage_period_is_rejected() {
        let mut config = valid_config();
        config.period = "soon".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_filters_rejected() {
        let mut config = valid_config();
        config.filters.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            LogstatError::Config(ConfigError::FiltersNotSet)
        ));
    }

    #[test]
    fn missing_outputs_rejected() {
        let mut config = valid_config();
        config.outputs.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            LogstatError::Config(ConfigError::OutputsNotSet)
        ));
    }

    #[test]
    fn unknown_input_scheme_rejected() {
        let mut config = valid_config();
        config.input = "kafka:topic".to_owned();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            LogstatError::Config(ConfigError::UnknownInput(_))
        ));
    }

    #[test]
    fn count_metric_on_aggregate_field_rejected() {
        let mut config = valid_config();
        config.filters[0].items[1].metrics.push("cps_1".to_owned());
        let err = config.validate().unwrap_err();
        match err {
            LogstatError::Config(ConfigError::FieldNotDeclared {
                field, expected, ..
            }) => {
                assert_eq!(field, "time");
                assert_eq!(expected, "counts");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn aggregate_metric_on_count_field_rejected() {
        let mut config = valid_config();
        config.filters[0].items[0].metrics.push("max".to_owned());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("aggregates"));
    }

    #[test]
    fn unknown_metric_rejected() {
        let mut config = valid_config();
        config.filters[0].items[0].metrics.push("median".to_owned());
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            LogstatError::Config(ConfigError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn invalid_log_level_rejected() {
        let mut config = valid_config();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn parse_toml() {
        let toml = r#"
input = "syslog:udp:127.0.0.1:5514/nginx"
regexp = '(?P<status>\d{3})'
period = "10s"
counts = ["status"]

[general]
log_level = "debug"
numeric_parse_policy = "fatal"

[[filters]]
filter = "GET"
prefix = "get"

[[filters.items]]
field = "status"
metrics = ["cps_200", "percentage_500"]

[[output]]
type = "console"

[output.settings]
format = "json"
"#;
        let config = LogstatConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(
            config.general.numeric_parse_policy,
            NumericParsePolicy::Fatal
        );
        assert_eq!(config.filters[0].prefix, "get");
        assert_eq!(config.outputs[0].settings["format"], "json");
        config.validate().unwrap();
    }

    #[test]
    fn parse_json_with_original_layout() {
        let json = r#"{
            "input": "file:/var/log/nginx/access.log",
            "regexp": "(?P<time>[0-9.]+)$",
            "period": "1m",
            "aggregates": ["time"],
            "filters": [{"filter": ".+", "items": [{"field": "time", "metrics": ["avg"]}]}],
            "output": [{"type": "console", "settings": {}}]
        }"#;
        let config = LogstatConfig::parse_as(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.outputs.len(), 1);
        config.validate().unwrap();
    }

    #[test]
    fn parse_yaml() {
        let yaml = r#"
input: "stdin:"
regexp: '(?P<code>\w+)'
period: 5s
counts: [code]
filters:
  - filter: "*"
    items:
      - field: code
        metrics: [uniq]
outputs:
  - type: console
"#;
        let config = LogstatConfig::parse_as(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.filters[0].filter, "*");
        config.validate().unwrap();
    }

    #[test]
    fn invalid_toml_returns_parse_error() {
        let err = LogstatConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            LogstatError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.json")),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.yml")),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.toml")),
            ConfigFormat::Toml
        );
        assert_eq!(ConfigFormat::from_path(Path::new("a")), ConfigFormat::Toml);
    }

    #[test]
    #[serial_test::serial]
    fn env_override_string() {
        let mut config = valid_config();
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("LOGSTAT_PERIOD", "2s") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("LOGSTAT_PERIOD") };
        assert_eq!(config.period, "2s");
    }

    #[test]
    #[serial_test::serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = false;
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("TEST_LOGSTAT_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_LOGSTAT_BOOL_BAD");
        assert!(!val);
        unsafe { std::env::remove_var("TEST_LOGSTAT_BOOL_BAD") };
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = LogstatConfig::from_file("/nonexistent/path/logstat.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogstatError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
