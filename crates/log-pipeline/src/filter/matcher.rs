//! 필터 매처 -- 항상 매칭 / 부분 문자열 / 정규식
//!
//! [`Matcher`]는 필터 문자열 하나로부터 생성 시점에 변형이 결정되며 이후 불변입니다.
//!
//! # 선택 규칙
//! 1. `""`, `"*"`, `".+"`, `".*"` → [`Matcher::Always`]
//! 2. `[ ] { } + * \ ( )` 중 하나라도 포함 → [`Matcher::Regex`]
//! 3. 그 외 → [`Matcher::Substring`]

use std::fmt;

use regex::Regex;

use crate::error::LogPipelineError;

/// 항상 매칭으로 취급하는 필터 문자열
const ALWAYS_PATTERNS: [&str; 4] = ["", "*", ".+", ".*"];

/// 정규식으로 취급하게 만드는 메타 문자
const REGEX_META_CHARS: [char; 9] = ['[', ']', '{', '}', '+', '*', '\\', '(', ')'];

/// 레코드 원문에 대한 필터 매처
#[derive(Debug, Clone)]
pub enum Matcher {
    /// 모든 입력에 매칭
    Always,
    /// 부분 문자열 포함 여부
    Substring(String),
    /// 정규식 검색
    Regex(Regex),
}

impl Matcher {
    /// 필터 문자열로 매처를 생성합니다.
    ///
    /// 정규식으로 분류되었으나 컴파일에 실패하면 시작 시 치명적 에러입니다.
    pub fn new(filter: &str) -> Result<Self, LogPipelineError> {
        if ALWAYS_PATTERNS.contains(&filter) {
            return Ok(Self::Always);
        }
        if filter.contains(REGEX_META_CHARS) {
            return Ok(Self::Regex(Regex::new(filter)?));
        }
        Ok(Self::Substring(filter.to_owned()))
    }

    /// 입력 문자열이 매칭되는지 확인합니다.
    pub fn matches(&self, input: &str) -> bool {
        match self {
            Self::Always => true,
            Self::Substring(needle) => input.contains(needle.as_str()),
            Self::Regex(re) => re.is_match(input),
        }
    }

    /// 변형 이름 (로그용)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Substring(_) => "substring",
            Self::Regex(_) => "regex",
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("*"),
            Self::Substring(s) => f.write_str(s),
            Self::Regex(re) => f.write_str(re.as_str()),
        }
    }
}
