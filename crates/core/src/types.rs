//! 도메인 타입 -- 레코드, 메트릭 분류, 메트릭 값

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 파싱된 로그 한 줄
///
/// 추출 정규식의 named group이 `fields`가 되고, 원본 라인은 `raw`에 보존됩니다.
/// 한 주기 동안 모든 집계기가 읽고 나면 버려집니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 필드 이름 -> 값
    pub fields: HashMap<String, String>,
    /// 원본 라인 (개행 제외)
    pub raw: String,
}

impl Record {
    /// 필드 값을 조회합니다.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// 메트릭이 요구하는 필드 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// 숫자 시리즈로 누적되는 필드 (`aggregates`)
    Aggregate,
    /// 값별 출현 횟수를 세는 필드 (`counts`)
    Count,
}

impl FieldKind {
    /// 설정 파일에서 이 분류를 선언하는 섹션 이름
    pub fn section(&self) -> &'static str {
        match self {
            Self::Aggregate => "aggregates",
            Self::Count => "counts",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// 메트릭 이름의 분류 결과
///
/// | 이름 | 분류 |
/// |---|---|
/// | `min`, `max`, `avg`, `sum`, `len`, `sum_ps`, `ips`, `cent_<p>` | aggregate |
/// | `uniq`, `uniq_ps`, `cps_<value>`, `percentage_<value>` | count |
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Min,
    Max,
    Avg,
    Sum,
    Len,
    SumPerSecond,
    ItemsPerSecond,
    /// `cent_<p>` -- p 백분위수 (0..=100)
    Percentile(f64),
    Uniq,
    UniqPerSecond,
    /// `cps_<value>` -- 값의 초당 출현 횟수
    CountPerSecond(String),
    /// `percentage_<value>` -- 전체 대비 값의 비율
    Percentage(String),
}

impl Metric {
    /// 메트릭 이름을 분류합니다. 알 수 없는 이름이면 `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let metric = match name {
            "min" => Self::Min,
            "max" => Self::Max,
            "avg" => Self::Avg,
            "sum" => Self::Sum,
            "len" => Self::Len,
            "sum_ps" => Self::SumPerSecond,
            "ips" => Self::ItemsPerSecond,
            "uniq" => Self::Uniq,
            "uniq_ps" => Self::UniqPerSecond,
            _ => {
                if let Some(cent) = name.strip_prefix("cent_") {
                    let p: f64 = cent.parse().ok()?;
                    if !p.is_finite() || !(0.0..=100.0).contains(&p) {
                        return None;
                    }
                    Self::Percentile(p)
                } else if let Some(value) = name.strip_prefix("cps_") {
                    if value.is_empty() {
                        return None;
                    }
                    Self::CountPerSecond(value.to_owned())
                } else if let Some(value) = name.strip_prefix("percentage_") {
                    if value.is_empty() {
                        return None;
                    }
                    Self::Percentage(value.to_owned())
                } else {
                    return None;
                }
            }
        };
        Some(metric)
    }

    /// 이 메트릭이 요구하는 필드 분류
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Min
            | Self::Max
            | Self::Avg
            | Self::Sum
            | Self::Len
            | Self::SumPerSecond
            | Self::ItemsPerSecond
            | Self::Percentile(_) => FieldKind::Aggregate,
            Self::Uniq | Self::UniqPerSecond | Self::CountPerSecond(_) | Self::Percentage(_) => {
                FieldKind::Count
            }
        }
    }
}

/// 계산된 메트릭 값
///
/// 개수(`len`, `uniq`)는 정수로, 나머지는 소수점 3자리로 출력됩니다.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Integer(u64),
    Fractional(f64),
}

impl MetricValue {
    /// f64로 변환합니다.
    pub fn as_f64(&self) -> f64 {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(v) => *v as f64,
            Self::Fractional(v) => *v,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Fractional(v) => write!(f, "{v:.3}"),
        }
    }
}
