//! 집계기 세트 -- 레코드 팬아웃과 주기 디스패치 팬아웃

use logstat_core::types::Record;
use tokio::task::JoinSet;

use super::aggregator::{Aggregator, AggregatorDispatch, DispatchReport};
use crate::error::LogPipelineError;

/// 설정된 필터마다 하나씩의 집계기를 소유합니다.
#[derive(Debug, Default)]
pub struct AggregatorSet {
    aggregators: Vec<Aggregator>,
}

impl AggregatorSet {
    /// 집계기 목록으로 세트를 생성합니다.
    pub fn new(aggregators: Vec<Aggregator>) -> Self {
        Self { aggregators }
    }

    /// 모든 집계기의 주기 상태를 비웁니다.
    ///
    /// 주기 시작 시, 해당 주기의 첫 `feed` 전에 한 번 호출합니다.
    pub fn reset_all(&mut self) {
        for aggregator in &mut self.aggregators {
            aggregator.reset();
        }
    }

    /// 필터가 매칭되는 모든 집계기에 레코드를 전달합니다.
    ///
    /// 매칭된 집계기 수를 반환합니다. 한 레코드가 여러 필터에 매칭될 수 있습니다.
    pub fn feed(&mut self, record: &Record) -> Result<usize, LogPipelineError> {
        let mut matched = 0;
        for aggregator in &mut self.aggregators {
            if aggregator.matches(record) {
                aggregator.observe(record)?;
                matched += 1;
            }
        }
        Ok(matched)
    }

    /// 모든 집계기의 주기 상태를 디스패치 배치로 이동시킵니다.
    pub fn take_period(&mut self) -> PeriodBatch {
        PeriodBatch {
            dispatches: self
                .aggregators
                .iter_mut()
                .map(Aggregator::take_period)
                .collect(),
        }
    }

    /// 현재 주기를 디스패치하고 모든 집계기의 전송이 끝날 때까지 기다립니다.
    pub async fn dispatch_all(&mut self) -> DispatchReport {
        self.take_period().dispatch().await
    }

    /// 집계기 수
    pub fn len(&self) -> usize {
        self.aggregators.len()
    }

    /// 집계기가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.aggregators.is_empty()
    }

    /// 집계기 순회
    pub fn iter(&self) -> impl Iterator<Item = &Aggregator> {
        self.aggregators.iter()
    }

    /// 집계기 가변 순회
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Aggregator> {
        self.aggregators.iter_mut()
    }
}

/// 한 주기 분량의 디스패치 작업 묶음
#[derive(Debug)]
pub struct PeriodBatch {
    dispatches: Vec<AggregatorDispatch>,
}

impl PeriodBatch {
    /// 집계기별 디스패치를 동시에 실행하고 모두 끝날 때까지 기다립니다.
    pub async fn dispatch(self) -> DispatchReport {
        let mut tasks = JoinSet::new();
        for dispatch in self.dispatches {
            tasks.spawn(dispatch.run());
        }

        let mut report = DispatchReport::default();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(partial) => report.merge(partial),
                Err(e) => tracing::error!(error = %e, "aggregator dispatch task failed"),
            }
        }
        report
    }

    /// 배치에 포함된 집계기 수
    pub fn len(&self) -> usize {
        self.dispatches.len()
    }

    /// 배치가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty()
    }
}
