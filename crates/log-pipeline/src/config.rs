//! 파이프라인 실행 설정
//!
//! [`PipelineConfig`]는 core의 [`LogstatConfig`]를 컴파일한 결과입니다.
//! DSN 해석, 추출 정규식과 필터 매처 컴파일이 여기서 한 번 수행되며,
//! 이후 프로세스 수명 동안 변경되지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! use logstat_core::config::LogstatConfig;
//! use logstat_log_pipeline::config::PipelineConfig;
//!
//! let core_config = LogstatConfig::load("logstat.toml").await?;
//! let config = PipelineConfig::from_core(&core_config)?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use logstat_core::config::{LogstatConfig, NumericParsePolicy, OutputConfig};

use crate::aggregate::FieldSets;
use crate::collector::{CollectorOptions, InputDsn};
use crate::error::LogPipelineError;
use crate::filter::FilterSpec;
use crate::parser::RecordParser;

/// 컴파일된 파이프라인 설정
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 입력 소스
    pub input: InputDsn,
    /// 집계 주기
    pub period: Duration,
    /// 레코드 추출 파서
    pub parser: RecordParser,
    /// 선언된 집계/카운트 필드
    pub fields: Arc<FieldSets>,
    /// 컴파일된 필터 (설정 순서)
    pub filters: Vec<Arc<FilterSpec>>,
    /// 출력 싱크 설정 (설정 순서)
    pub outputs: Vec<OutputConfig>,
    /// 숫자 필드 파싱 실패 정책
    pub numeric_parse_policy: NumericParsePolicy,
    /// 수집기 옵션
    pub collector: CollectorOptions,
}

impl PipelineConfig {
    /// core 설정을 컴파일합니다.
    ///
    /// 메트릭/필드 분류 검증은 [`LogstatConfig::validate`]의 책임이며,
    /// 여기서는 DSN 형식, 정규식 컴파일, 필터/출력 존재 여부를 확인합니다.
    pub fn from_core(core: &LogstatConfig) -> Result<Self, LogPipelineError> {
        let input = InputDsn::parse(&core.input)?;
        let period = core
            .period_duration()
            .map_err(|e| LogPipelineError::Config {
                field: "period".to_owned(),
                reason: e.to_string(),
            })?;

        if core.regexp.is_empty() {
            return Err(LogPipelineError::Config {
                field: "regexp".to_owned(),
                reason: "extraction pattern must not be empty".to_owned(),
            });
        }
        let parser = RecordParser::new(&core.regexp)?;

        if core.filters.is_empty() {
            return Err(LogPipelineError::Config {
                field: "filters".to_owned(),
                reason: "filters not set".to_owned(),
            });
        }
        let filters = core
            .filters
            .iter()
            .map(|f| FilterSpec::from_config(f).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        if core.outputs.is_empty() {
            return Err(LogPipelineError::Config {
                field: "output".to_owned(),
                reason: "at least one output must be specified".to_owned(),
            });
        }

        Ok(Self {
            input,
            period,
            parser,
            fields: Arc::new(FieldSets::new(
                core.aggregates.iter().cloned(),
                core.counts.iter().cloned(),
            )),
            filters,
            outputs: core.outputs.clone(),
            numeric_parse_policy: core.general.numeric_parse_policy,
            collector: CollectorOptions {
                tail: core.tail.clone(),
                syslog: core.syslog.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logstat_core::config::{FilterConfig, FilterItem};

    fn core_config() -> LogstatConfig {
        LogstatConfig {
            input: "stdin:".to_owned(),
            regexp: r"status=(?P<status>\d+)".to_owned(),
            period: "10s".to_owned(),
            counts: vec!["status".to_owned()],
            filters: vec![FilterConfig {
                filter: "*".to_owned(),
                prefix: String::new(),
                items: vec![FilterItem {
                    field: "status".to_owned(),
                    metrics: vec!["cps_200".to_owned()],
                }],
            }],
            outputs: vec![OutputConfig {
                output_type: "console".to_owned(),
                settings: Default::default(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn compiles_valid_config() {
        let config = PipelineConfig::from_core(&core_config()).unwrap();
        assert_eq!(config.input, InputDsn::Stdin);
        assert_eq!(config.period, Duration::from_secs(10));
        assert_eq!(config.parser.field_names(), ["status"]);
        assert!(config.fields.counts.contains("status"));
        assert_eq!(config.filters.len(), 1);
        assert_eq!(config.numeric_parse_policy, NumericParsePolicy::Skip);
    }

    #[test]
    fn bad_dsn_is_fatal() {
        let mut core = core_config();
        core.input = "syslog:foo:127.0.0.1:514/app".to_owned();
        let err = PipelineConfig::from_core(&core).unwrap_err();
        assert!(matches!(err, LogPipelineError::UnsupportedProtocol(_)));
    }

    #[test]
    fn bad_pattern_is_fatal() {
        let mut core = core_config();
        core.regexp = "(?P<status>".to_owned();
        assert!(matches!(
            PipelineConfig::from_core(&core).unwrap_err(),
            LogPipelineError::Regex(_)
        ));
    }

    #[test]
    fn bad_filter_regex_is_fatal() {
        let mut core = core_config();
        core.filters[0].filter = "GET (".to_owned();
        assert!(PipelineConfig::from_core(&core).is_err());
    }

    #[test]
    fn missing_filters_and_outputs() {
        let mut core = core_config();
        core.filters.clear();
        assert!(matches!(
            PipelineConfig::from_core(&core).unwrap_err(),
            LogPipelineError::Config { ref field, .. } if field == "filters"
        ));

        let mut core = core_config();
        core.outputs.clear();
        assert!(matches!(
            PipelineConfig::from_core(&core).unwrap_err(),
            LogPipelineError::Config { ref field, .. } if field == "output"
        ));
    }

    #[test]
    fn zero_period_is_fatal() {
        let mut core = core_config();
        core.period = "0s".to_owned();
        assert!(matches!(
            PipelineConfig::from_core(&core).unwrap_err(),
            LogPipelineError::Config { ref field, .. } if field == "period"
        ));
    }
}
