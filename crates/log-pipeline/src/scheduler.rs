//! 주기 스케줄러 -- 드레인/파싱/집계/디스패치 사이클 구동
//!
//! 틱마다 다음을 수행합니다.
//!
//! 1. 수집 단계 진입권을 얻음 (한 번에 하나의 수집 단계만 실행, 이전 단계가 끝날 때까지 대기)
//! 2. 입력 수집기 버퍼를 드레인
//! 3. 모든 집계기의 주기 상태를 비움
//! 4. 라인 단위로 분리하여 레코드로 파싱하고 집계기 세트에 전달
//! 5. 주기 상태를 디스패치 배치로 옮기고 진입권을 반환한 뒤, 디스패치를 분리된 태스크로 실행
//!
//! 주기 상태는 디스패치 배치로 소유권이 이동하므로, 주기 N의 디스패치와
//! 주기 N+1의 파싱은 서로 다른 데이터만 다룹니다.
//!
//! ```text
//! Idle -> Draining -> Parsing -> Idle
//!                        \
//!                         +--> (detached) PeriodBatch::dispatch
//! ```

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use logstat_core::metrics as m;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::{AggregatorSet, DispatchReport, PeriodBatch};
use crate::collector::InputCollector;
use crate::error::LogPipelineError;
use crate::parser::{RecordParser, split_lines};

/// 스케줄러 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// 다음 틱 대기 중
    Idle,
    /// 입력 버퍼 드레인 중
    Draining,
    /// 레코드 파싱 및 집계 중
    Parsing,
}

impl std::fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Draining => f.write_str("draining"),
            Self::Parsing => f.write_str("parsing"),
        }
    }
}

/// 한 틱의 수집 단계 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 드레인된 바이트 수
    pub bytes: usize,
    /// 비어있지 않은 라인 수
    pub lines: usize,
    /// 레코드로 파싱된 라인 수
    pub records: usize,
    /// 추출 정규식과 맞지 않아 건너뛴 라인 수
    pub skipped: usize,
    /// 하나 이상의 필터에 매칭된 레코드 수
    pub matched: usize,
}

/// 수집 단계가 독점하는 상태
#[derive(Debug)]
struct Ingest {
    parser: RecordParser,
    aggregators: AggregatorSet,
}

/// 주기 스케줄러
///
/// `tick`은 여러 곳에서 동시에 호출되어도 수집 단계를 직렬화합니다.
pub struct Scheduler {
    collector: Arc<dyn InputCollector>,
    period: Duration,
    /// 단일 슬롯 진입 가드 겸 수집 상태
    ingest: Mutex<Ingest>,
    phase: StdMutex<SchedulerPhase>,
    /// 분리 실행 중인 디스패치 태스크
    dispatches: StdMutex<JoinSet<DispatchReport>>,
}

impl Scheduler {
    /// 새 스케줄러를 생성합니다.
    pub fn new(
        collector: Arc<dyn InputCollector>,
        parser: RecordParser,
        aggregators: AggregatorSet,
        period: Duration,
    ) -> Self {
        Self {
            collector,
            period,
            ingest: Mutex::new(Ingest {
                parser,
                aggregators,
            }),
            phase: StdMutex::new(SchedulerPhase::Idle),
            dispatches: StdMutex::new(JoinSet::new()),
        }
    }

    /// 집계 주기
    pub fn period(&self) -> Duration {
        self.period
    }

    /// 현재 단계
    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 아직 끝나지 않은 디스패치 태스크 수
    pub fn in_flight_dispatches(&self) -> usize {
        let mut dispatches = self.dispatches.lock().unwrap_or_else(PoisonError::into_inner);
        while dispatches.try_join_next().is_some() {}
        dispatches.len()
    }

    fn set_phase(&self, phase: SchedulerPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// 수집 단계(드레인, 리셋, 파싱, 집계)를 실행하고 주기 배치를 반환합니다.
    ///
    /// 이전 수집 단계가 진행 중이면 끝날 때까지 기다립니다.
    /// 숫자 필드 정책이 `fatal`일 때의 `NumericField` 에러만 전파됩니다.
    pub async fn ingest(&self) -> Result<(PeriodBatch, TickReport), LogPipelineError> {
        let mut ingest = self.ingest.lock().await;
        let started = Instant::now();

        self.set_phase(SchedulerPhase::Draining);
        let data = self.collector.drain_and_reset();
        ingest.aggregators.reset_all();

        self.set_phase(SchedulerPhase::Parsing);
        let result = parse_into(&mut ingest, &data);
        // 실패해도 다음 주기와 섞이지 않도록 상태는 항상 꺼냄
        let batch = ingest.aggregators.take_period();
        self.set_phase(SchedulerPhase::Idle);
        drop(ingest);

        let mut report = result?;
        report.bytes = data.len();

        metrics::counter!(m::TICKS_TOTAL).increment(1);
        metrics::histogram!(m::TICK_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(
            bytes = report.bytes,
            lines = report.lines,
            records = report.records,
            skipped = report.skipped,
            matched = report.matched,
            "tick ingested"
        );

        Ok((batch, report))
    }

    /// 한 틱을 실행하고 디스패치를 분리된 태스크로 시작합니다.
    ///
    /// 디스패치 완료를 기다리지 않으므로 다음 틱의 수집 단계와 겹쳐 실행될 수 있습니다.
    pub async fn tick(&self) -> Result<TickReport, LogPipelineError> {
        let (batch, report) = self.ingest().await?;
        let mut dispatches = self.dispatches.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(finished) = dispatches.try_join_next() {
            if let Err(e) = finished {
                warn!(error = %e, "dispatch task failed");
            }
        }
        dispatches.spawn(batch.dispatch());
        Ok(report)
    }

    /// 한 틱을 실행하고 디스패치가 끝날 때까지 기다립니다.
    ///
    /// 일회성 실행 모드에서 사용합니다.
    pub async fn tick_and_dispatch(&self) -> Result<(TickReport, DispatchReport), LogPipelineError> {
        let (batch, report) = self.ingest().await?;
        let dispatched = batch.dispatch().await;
        Ok((report, dispatched))
    }

    /// 취소될 때까지 주기마다 틱을 실행합니다.
    ///
    /// 첫 틱은 시작 후 한 주기가 지난 시점에 실행됩니다. 틱이 밀리면 건너뛰지 않고
    /// 연달아 실행합니다. 치명적 에러가 발생하면 루프를 중단하고 에러를 반환합니다.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), LogPipelineError> {
        let start = tokio::time::Instant::now() + self.period;
        let mut interval = tokio::time::interval_at(start, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

        info!(
            period = ?self.period,
            input = self.collector.name(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduler received shutdown signal");
                    return Ok(());
                }
                _ = interval.tick() => {
                    self.tick().await?;
                }
            }
        }
    }

    /// 진행 중인 디스패치 태스크가 끝나기를 기다립니다.
    ///
    /// 제한 시간이 지나면 남은 태스크를 중단합니다.
    pub async fn wait_dispatches(&self, timeout: Duration) -> DispatchReport {
        let mut pending = std::mem::take(
            &mut *self.dispatches.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let mut total = DispatchReport::default();

        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = pending.join_next().await {
                match result {
                    Ok(report) => total.merge(report),
                    Err(e) => warn!(error = %e, "dispatch task failed"),
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(remaining = pending.len(), "dispatch tasks did not finish in time, aborting");
            pending.abort_all();
        }
        total
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("input", &self.collector.name())
            .field("period", &self.period)
            .field("phase", &self.phase())
            .finish()
    }
}

/// 드레인된 바이트를 라인으로 나누어 파싱하고 집계기 세트에 전달합니다.
fn parse_into(ingest: &mut Ingest, data: &[u8]) -> Result<TickReport, LogPipelineError> {
    let mut report = TickReport::default();

    for line in split_lines(data) {
        report.lines += 1;
        let record = match ingest.parser.parse(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = %line, error = %e, "line does not match extraction pattern, skipped");
                report.skipped += 1;
                continue;
            }
        };
        report.records += 1;
        if ingest.aggregators.feed(&record)? > 0 {
            report.matched += 1;
        }
    }

    metrics::counter!(m::RECORDS_PARSED_TOTAL).increment(report.records as u64);
    metrics::counter!(m::RECORDS_SKIPPED_TOTAL).increment(report.skipped as u64);
    Ok(report)
}
