//! Syslog 메시지 파서
//!
//! syslog 수집기가 받은 메시지에서 애플리케이션 이름과 본문을 분리합니다.
//! 두 가지 형식을 순서대로 시도하며, 처음 매칭되는 형식을 사용합니다.
//!
//! # 지원 형식
//! ```text
//! 1. BSD (RFC 3164):   <PRI>MMM DD HH:MM:SS HOSTNAME APP[PID]: MESSAGE
//! 2. RFC 5424 축약형:  <PRI>VERSION TIMESTAMP HOSTNAME APP ... [SD] MESSAGE
//! ```
//!
//! # 사용 예시
//! ```ignore
//! use logstat_log_pipeline::parser::SyslogMessageParser;
//!
//! let parser = SyslogMessageParser::new();
//! let msg = parser.parse("<149>Oct  7 13:51:20 node2 nginx: GET / 200")?;
//! assert_eq!(msg.application, "nginx");
//! assert_eq!(msg.message, "GET / 200");
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::error::LogPipelineError;

/// BSD 형식: 우선순위, 날짜, 호스트, 애플리케이션, 메시지
static BSD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*<(\d+)>(\S+\s+\w+\s+\S+)\s+(\S+)\s+([\w\-./]+)(?:\[\d+\])?:\s*(.+)$")
        .unwrap_or_else(|e| unreachable!("static BSD pattern: {e}"))
});

/// RFC 5424 축약형: 우선순위, 타임스탬프, 호스트, 태그, SD 이후 메시지
static STRUCTURED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*<(\d+)>(?:\d{1,2}\s+)?([0-9\-T:.+Z]+)\s+(\S+)\s+(\S+)[^\]]*\]\s*(.+)$")
        .unwrap_or_else(|e| unreachable!("static structured pattern: {e}"))
});

/// 파싱된 syslog 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogMessage {
    /// PRI 값 (facility * 8 + severity). 범위를 검사하지 않음
    pub priority: u32,
    /// 날짜 문자열 (형식별 원문 그대로)
    pub date: String,
    /// 송신 호스트
    pub hostname: String,
    /// 애플리케이션 이름 (수집기 필터링 기준)
    pub application: String,
    /// 메시지 본문
    pub message: String,
}

impl SyslogMessage {
    /// facility 코드
    pub fn facility(&self) -> u32 {
        self.priority / 8
    }

    /// severity 코드
    pub fn severity(&self) -> u32 {
        self.priority % 8
    }
}

/// 두 가지 syslog 형식을 인식하는 파서
#[derive(Debug, Clone)]
pub struct SyslogMessageParser {
    bsd: &'static Regex,
    structured: &'static Regex,
}

impl SyslogMessageParser {
    /// 새 파서를 생성합니다.
    pub fn new() -> Self {
        Self {
            bsd: &BSD_PATTERN,
            structured: &STRUCTURED_PATTERN,
        }
    }

    /// syslog 메시지 한 개를 파싱합니다.
    ///
    /// 어느 형식에도 맞지 않으면 [`LogPipelineError::UnknownFormat`]을 반환합니다.
    /// 호출자는 이를 로그로 남기고 메시지를 버립니다.
    pub fn parse(&self, input: &str) -> Result<SyslogMessage, LogPipelineError> {
        let input = input.trim_end_matches(['\r', '\n']);

        for pattern in [self.bsd, self.structured] {
            let Some(caps) = pattern.captures(input) else {
                continue;
            };

            // u32를 넘는 PRI는 이 형식 불일치로 보고 다음 형식을 시도
            let Ok(priority) = caps[1].parse::<u32>() else {
                continue;
            };

            return Ok(SyslogMessage {
                priority,
                date: caps[2].to_owned(),
                hostname: caps[3].to_owned(),
                application: caps[4].to_owned(),
                message: caps[5].to_owned(),
            });
        }

        Err(LogPipelineError::UnknownFormat(input.to_owned()))
    }
}

impl Default for SyslogMessageParser {
    fn default() -> Self {
        Self::new()
    }
}
