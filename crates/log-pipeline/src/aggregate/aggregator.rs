//! 필터별 집계기
//!
//! [`Aggregator`]는 필터 하나에 매칭되는 레코드로부터 한 주기 동안
//! 숫자 시리즈(`aggregates` 필드)와 값별 출현 횟수(`counts` 필드)를 누적하고,
//! 주기 끝에 설정된 메트릭을 계산하여 출력 그룹으로 전달합니다.
//!
//! # 주기 상태 소유권
//! 주기 상태([`PeriodState`])는 파싱 단계 동안 집계기가 소유하고,
//! [`Aggregator::take_period`]로 [`AggregatorDispatch`]에 이동된 뒤
//! 디스패치 단계가 소유합니다. 집계기에는 빈 상태가 남으므로
//! 다음 주기 파싱과 이전 주기 디스패치는 서로 다른 데이터를 다룹니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use logstat_core::config::NumericParsePolicy;
use logstat_core::metrics as m;
use logstat_core::types::{Metric, MetricValue, Record};

use super::stats;
use crate::error::LogPipelineError;
use crate::filter::FilterSpec;
use crate::output::OutputGroup;

/// 선언된 필드 분류 (모든 집계기가 공유)
#[derive(Debug, Clone, Default)]
pub struct FieldSets {
    /// 숫자 시리즈로 누적하는 필드
    pub aggregates: HashSet<String>,
    /// 값별 출현 횟수를 세는 필드
    pub counts: HashSet<String>,
}

impl FieldSets {
    /// 필드 목록으로 생성합니다.
    pub fn new<A, C>(aggregates: A, counts: C) -> Self
    where
        A: IntoIterator<Item = String>,
        C: IntoIterator<Item = String>,
    {
        Self {
            aggregates: aggregates.into_iter().collect(),
            counts: counts.into_iter().collect(),
        }
    }
}

/// 한 주기 동안 누적된 집계 상태
#[derive(Debug, Default)]
pub struct PeriodState {
    /// 필드 -> 도착 순서대로의 숫자 샘플
    float_series: HashMap<String, Vec<f64>>,
    /// 필드 -> (값 -> 출현 횟수)
    count_table: HashMap<String, HashMap<String, u64>>,
    /// 필드 -> 정렬된 시리즈 (첫 접근 시 계산)
    sorted_cache: HashMap<String, Vec<f64>>,
}

impl PeriodState {
    /// 숫자 샘플을 추가합니다.
    pub fn push_sample(&mut self, field: &str, value: f64) {
        self.float_series
            .entry(field.to_owned())
            .or_default()
            .push(value);
        self.sorted_cache.remove(field);
    }

    /// 값의 출현 횟수를 1 증가시킵니다.
    pub fn increment(&mut self, field: &str, value: &str) {
        *self
            .count_table
            .entry(field.to_owned())
            .or_default()
            .entry(value.to_owned())
            .or_insert(0) += 1;
    }

    /// 필드의 도착 순서 시리즈
    pub fn series(&self, field: &str) -> &[f64] {
        self.float_series.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// 필드 값의 출현 횟수 (본 적 없으면 0)
    pub fn count(&self, field: &str, value: &str) -> u64 {
        self.count_table
            .get(field)
            .and_then(|counts| counts.get(value))
            .copied()
            .unwrap_or(0)
    }

    /// 필드의 전체 출현 횟수
    pub fn total(&self, field: &str) -> u64 {
        self.count_table
            .get(field)
            .map_or(0, |counts| counts.values().sum())
    }

    /// 필드의 서로 다른 값 개수
    pub fn uniq(&self, field: &str) -> u64 {
        self.count_table
            .get(field)
            .map_or(0, |counts| counts.len() as u64)
    }

    /// 필드의 관측된 값 목록
    pub fn observed_values(&self, field: &str) -> Vec<&str> {
        self.count_table
            .get(field)
            .map(|counts| counts.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// 아무것도 누적되지 않았는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.float_series.is_empty() && self.count_table.is_empty()
    }

    fn sorted(&mut self, field: &str) -> &[f64] {
        if !self.sorted_cache.contains_key(field) {
            let sorted = stats::sorted_copy(self.series(field));
            self.sorted_cache.insert(field.to_owned(), sorted);
        }
        self.sorted_cache.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// 메트릭 하나를 계산합니다.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(&mut self, field: &str, metric: &Metric, period_secs: f64) -> MetricValue {
        use MetricValue::{Fractional, Integer};

        match metric {
            Metric::Min => Fractional(stats::min(self.sorted(field))),
            Metric::Max => Fractional(stats::max(self.sorted(field))),
            Metric::Avg => Fractional(stats::mean(self.series(field))),
            Metric::Sum => Fractional(stats::sum(self.series(field))),
            Metric::Len => Integer(self.series(field).len() as u64),
            Metric::SumPerSecond => Fractional(stats::sum(self.series(field)) / period_secs),
            Metric::ItemsPerSecond => Fractional(self.series(field).len() as f64 / period_secs),
            Metric::Percentile(p) => Fractional(stats::percentile(self.sorted(field), *p)),
            Metric::Uniq => Integer(self.uniq(field)),
            Metric::UniqPerSecond => Fractional(self.uniq(field) as f64 / period_secs),
            Metric::CountPerSecond(value) => {
                Fractional(self.count(field, value) as f64 / period_secs)
            }
            Metric::Percentage(value) => {
                let total = self.total(field);
                if total == 0 {
                    Fractional(0.0)
                } else {
                    Fractional(100.0 * self.count(field, value) as f64 / total as f64)
                }
            }
        }
    }
}

/// 필터 하나에 대한 집계기
#[derive(Debug)]
pub struct Aggregator {
    filter: Arc<FilterSpec>,
    fields: Arc<FieldSets>,
    /// 주기 길이 (초), 생성 시 한 번 계산
    period_secs: f64,
    policy: NumericParsePolicy,
    state: PeriodState,
    outputs: Arc<Mutex<OutputGroup>>,
}

impl Aggregator {
    /// 새 집계기를 생성합니다.
    pub fn new(
        filter: Arc<FilterSpec>,
        fields: Arc<FieldSets>,
        period: Duration,
        policy: NumericParsePolicy,
        outputs: OutputGroup,
    ) -> Self {
        Self {
            filter,
            fields,
            period_secs: period.as_secs_f64(),
            policy,
            state: PeriodState::default(),
            outputs: Arc::new(Mutex::new(outputs)),
        }
    }

    /// 레코드 원문이 이 집계기의 필터에 매칭되는지 확인합니다.
    pub fn matches(&self, record: &Record) -> bool {
        self.filter.matcher.matches(&record.raw)
    }

    /// 레코드의 필드를 주기 상태에 누적합니다.
    ///
    /// 집계 필드 값이 숫자가 아니면 정책에 따라 건너뛰거나
    /// [`LogPipelineError::NumericField`]를 반환합니다.
    pub fn observe(&mut self, record: &Record) -> Result<(), LogPipelineError> {
        for (field, value) in &record.fields {
            if self.fields.aggregates.contains(field) {
                match value.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() => self.state.push_sample(field, v),
                    _ => match self.policy {
                        NumericParsePolicy::Skip => {
                            tracing::warn!(
                                field = %field,
                                value = %value,
                                "non-numeric value in aggregate field, skipping"
                            );
                            metrics::counter!(m::RECORDS_SKIPPED_TOTAL).increment(1);
                        }
                        NumericParsePolicy::Fatal => {
                            return Err(LogPipelineError::NumericField {
                                field: field.clone(),
                                value: value.clone(),
                            });
                        }
                    },
                }
            }
            if self.fields.counts.contains(field) {
                self.state.increment(field, value);
            }
        }
        Ok(())
    }

    /// 현재 주기 상태로 메트릭 하나를 계산합니다.
    ///
    /// 알 수 없는 메트릭 이름은 `None`을 반환합니다.
    pub fn compute_metric(&mut self, field: &str, metric_name: &str) -> Option<MetricValue> {
        let metric = Metric::parse(metric_name)?;
        Some(self.state.compute(field, &metric, self.period_secs))
    }

    /// 주기 상태를 비웁니다.
    pub fn reset(&mut self) {
        self.state = PeriodState::default();
    }

    /// 주기 상태를 디스패치 작업으로 이동시키고 빈 상태로 교체합니다.
    pub fn take_period(&mut self) -> AggregatorDispatch {
        AggregatorDispatch {
            filter: Arc::clone(&self.filter),
            outputs: Arc::clone(&self.outputs),
            state: std::mem::take(&mut self.state),
            period_secs: self.period_secs,
        }
    }

    /// 필터 설정
    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// 현재 주기 상태
    pub fn state(&self) -> &PeriodState {
        &self.state
    }

    /// 주기 길이 (초)
    pub fn period_secs(&self) -> f64 {
        self.period_secs
    }
}

/// 한 주기의 디스패치 작업 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// 디스패치된 집계기 수
    pub aggregators: usize,
    /// 출력 그룹에 전달된 메트릭 수
    pub metrics: usize,
    /// 실패한 싱크 전송 수
    pub failed_sends: usize,
}

impl DispatchReport {
    pub(crate) fn merge(&mut self, other: DispatchReport) {
        self.aggregators += other.aggregators;
        self.metrics += other.metrics;
        self.failed_sends += other.failed_sends;
    }
}

/// 집계기 하나의 주기 디스패치 작업
///
/// 주기 상태를 독점 소유하므로 다음 주기 파싱과 동시에 실행될 수 있습니다.
#[derive(Debug)]
pub struct AggregatorDispatch {
    filter: Arc<FilterSpec>,
    outputs: Arc<Mutex<OutputGroup>>,
    state: PeriodState,
    period_secs: f64,
}

impl AggregatorDispatch {
    /// 필터의 모든 `(필드, 메트릭)` 항목을 계산하여 `(키, 값)` 목록을 만듭니다.
    ///
    /// 알 수 없는 메트릭은 건너뜁니다.
    pub fn compute_all(&mut self) -> Vec<(String, MetricValue)> {
        let mut out = Vec::with_capacity(self.filter.metric_count());
        for item in &self.filter.items {
            for spec in &item.metrics {
                let Some(metric) = &spec.metric else {
                    continue;
                };
                let value = self.state.compute(&item.field, metric, self.period_secs);
                out.push((self.filter.metric_key(&item.field, &spec.name), value));
            }
        }
        out
    }

    /// 메트릭을 계산하고 출력 그룹으로 전송합니다.
    ///
    /// 같은 집계기의 이전 주기 전송이 끝날 때까지 출력 그룹 잠금을 기다립니다.
    pub async fn run(mut self) -> DispatchReport {
        let messages = self.compute_all();

        let mut group = self.outputs.lock().await;
        for (key, value) in &messages {
            group.add_message(key, &value.to_string());
        }
        let failed_sends = group.send_all().await;

        metrics::counter!(m::METRICS_DISPATCHED_TOTAL).increment(messages.len() as u64);
        tracing::debug!(
            filter = %self.filter.matcher,
            metrics = messages.len(),
            failed_sends,
            "aggregator dispatched"
        );

        DispatchReport {
            aggregators: 1,
            metrics: messages.len(),
            failed_sends,
        }
    }
}
