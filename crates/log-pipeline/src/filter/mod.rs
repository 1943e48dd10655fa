//! 필터 모듈 -- 설정의 필터를 컴파일된 [`FilterSpec`]으로 변환
//!
//! 필터 하나는 매처, 메트릭 키 접두어, `(필드, 메트릭 목록)` 항목으로 구성됩니다.
//! 로드 후 불변이며 집계기 하나가 읽기 전용으로 소유합니다.

pub mod matcher;

pub use matcher::Matcher;

use logstat_core::config::FilterConfig;
use logstat_core::types::Metric;

use crate::error::LogPipelineError;

/// 컴파일된 메트릭 요청
#[derive(Debug, Clone)]
pub struct MetricSpec {
    /// 설정에 적힌 메트릭 이름 (키 생성에 사용)
    pub name: String,
    /// 분류 결과. 알 수 없는 이름이면 `None`이며 계산 시 무시됩니다.
    pub metric: Option<Metric>,
}

/// 필드 하나에 대한 메트릭 목록
#[derive(Debug, Clone)]
pub struct FilterItem {
    pub field: String,
    pub metrics: Vec<MetricSpec>,
}

/// 컴파일된 필터
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub matcher: Matcher,
    /// 메트릭 키 접두어 (비어있으면 생략)
    pub prefix: String,
    pub items: Vec<FilterItem>,
}

impl FilterSpec {
    /// 설정의 필터를 컴파일합니다.
    pub fn from_config(config: &FilterConfig) -> Result<Self, LogPipelineError> {
        let matcher = Matcher::new(&config.filter)?;
        let items = config
            .items
            .iter()
            .map(|item| FilterItem {
                field: item.field.clone(),
                metrics: item
                    .metrics
                    .iter()
                    .map(|name| MetricSpec {
                        name: name.clone(),
                        metric: Metric::parse(name),
                    })
                    .collect(),
            })
            .collect();

        Ok(Self {
            matcher,
            prefix: config.prefix.clone(),
            items,
        })
    }

    /// 출력 메트릭 키: `<prefix>_<field>_<metric>`, 접두어가 없으면 `<field>_<metric>`
    pub fn metric_key(&self, field: &str, metric_name: &str) -> String {
        if self.prefix.is_empty() {
            format!("{field}_{metric_name}")
        } else {
            format!("{}_{field}_{metric_name}", self.prefix)
        }
    }

    /// 이 필터가 요청한 메트릭 총 개수
    pub fn metric_count(&self) -> usize {
        self.items.iter().map(|item| item.metrics.len()).sum()
    }
}
