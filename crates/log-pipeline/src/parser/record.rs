//! 레코드 파서 -- 추출 정규식의 named group으로 라인을 필드 맵으로 변환
//!
//! 운영자가 지정한 정규식은 반드시 이름 있는 캡처 그룹을 하나 이상 가져야 하며,
//! 그룹 이름이 곧 [`Record`]의 필드 키가 됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use logstat_log_pipeline::parser::RecordParser;
//!
//! let parser = RecordParser::new(r"status=(?P<status>\d+)")?;
//! let record = parser.parse("GET / status=200")?;
//! assert_eq!(record.field("status"), Some("200"));
//! ```

use logstat_core::types::Record;
use regex::Regex;

use crate::error::LogPipelineError;

/// 추출 정규식 기반 레코드 파서
#[derive(Debug, Clone)]
pub struct RecordParser {
    pattern: Regex,
    /// named group 이름 (정의 순서)
    field_names: Vec<String>,
}

impl RecordParser {
    /// 추출 정규식을 컴파일합니다.
    ///
    /// 정규식 문법 오류 또는 named group이 없는 패턴은 시작 시 치명적 에러입니다.
    pub fn new(pattern: &str) -> Result<Self, LogPipelineError> {
        let pattern = Regex::new(pattern)?;
        let field_names: Vec<String> = pattern
            .capture_names()
            .flatten()
            .map(str::to_owned)
            .collect();

        if field_names.is_empty() {
            return Err(LogPipelineError::Config {
                field: "regexp".to_owned(),
                reason: "extraction pattern must declare at least one named group".to_owned(),
            });
        }

        Ok(Self {
            pattern,
            field_names,
        })
    }

    /// 라인 하나를 레코드로 변환합니다.
    ///
    /// 패턴이 매칭되지 않으면 [`LogPipelineError::EmptyResult`]를 반환합니다.
    /// 매칭되었지만 참여하지 않은 선택적 그룹은 필드에 포함되지 않습니다.
    pub fn parse(&self, line: &str) -> Result<Record, LogPipelineError> {
        let caps = self
            .pattern
            .captures(line)
            .ok_or_else(|| LogPipelineError::EmptyResult {
                line: line.to_owned(),
            })?;

        let fields = self
            .field_names
            .iter()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.clone(), m.as_str().to_owned()))
            })
            .collect();

        Ok(Record {
            fields,
            raw: line.to_owned(),
        })
    }

    /// 패턴이 선언한 필드 이름 목록
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// 원본 패턴 문자열
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NGINX_PATTERN: &str =
        r#"(?P<method>[A-Z]+) (?P<path>\S+) HTTP/[\d.]+" (?P<status>\d{3}) (?P<bytes>\d+)"#;

    #[test]
    fn parse_extracts_named_groups() {
        let parser = RecordParser::new(NGINX_PATTERN).unwrap();
        let line = r#"127.0.0.1 - - "GET /index.html HTTP/1.1" 200 512"#;
        let record = parser.parse(line).unwrap();

        assert_eq!(record.field("method"), Some("GET"));
        assert_eq!(record.field("path"), Some("/index.html"));
        assert_eq!(record.field("status"), Some("200"));
        assert_eq!(record.field("bytes"), Some("512"));
        assert_eq!(record.raw, line);
    }

    #[test]
    fn non_matching_line_is_empty_result() {
        let parser = RecordParser::new(NGINX_PATTERN).unwrap();
        let err = parser.parse("garbage").unwrap_err();
        assert!(matches!(err, LogPipelineError::EmptyResult { ref line } if line == "garbage"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn optional_group_absent_from_fields() {
        let parser = RecordParser::new(r"status=(?P<status>\d+)(?: time=(?P<time>[\d.]+))?").unwrap();
        let record = parser.parse("status=404").unwrap();
        assert_eq!(record.field("status"), Some("404"));
        assert!(!record.fields.contains_key("time"));
    }

    #[test]
    fn pattern_without_named_groups_rejected() {
        let err = RecordParser::new(r"(\d+)").unwrap_err();
        assert!(matches!(err, LogPipelineError::Config { .. }));
    }

    #[test]
    fn malformed_pattern_rejected() {
        let err = RecordParser::new(r"(?P<status>\d+").unwrap_err();
        assert!(matches!(err, LogPipelineError::Regex(_)));
    }

    #[test]
    fn field_names_in_declaration_order() {
        let parser = RecordParser::new(NGINX_PATTERN).unwrap();
        assert_eq!(parser.field_names(), ["method", "path", "status", "bytes"]);
    }
}
