//! 파이프라인 오케스트레이션 -- 수집/파싱/집계/출력의 전체 흐름을 관리합니다.
//!
//! [`StatsPipeline`]은 core의 [`Pipeline`](logstat_core::pipeline::Pipeline) trait을 구현하여
//! `logstat-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! InputCollector -> InputBuffer -> Scheduler(tick) -> RecordParser -> AggregatorSet
//!                                                                         |
//!                                              (detached) PeriodBatch -> OutputGroup
//! ```

use std::sync::Arc;
use std::time::Duration;

use logstat_core::config::LogstatConfig;
use logstat_core::error::{LogstatError, PipelineError};
use logstat_core::pipeline::{HealthStatus, Pipeline};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{Aggregator, AggregatorSet, DispatchReport};
use crate::collector::{CollectorStatus, InputCollector, open_collector};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::output::OutputRegistry;
use crate::scheduler::{Scheduler, TickReport};

/// 정지 시 진행 중인 디스패치를 기다리는 최대 시간
const DISPATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 실행 중에만 존재하는 구성요소
struct Running {
    collector: Arc<dyn InputCollector>,
    scheduler: Arc<Scheduler>,
    cancel: CancellationToken,
    /// 스케줄러 루프 태스크 (`wait`에서 완료를 관측하면 `None`)
    task: Option<JoinHandle<Result<(), LogPipelineError>>>,
}

/// 로그 통계 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use logstat_log_pipeline::StatsPipelineBuilder;
///
/// let mut pipeline = StatsPipelineBuilder::new()
///     .config(config)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct StatsPipeline {
    config: PipelineConfig,
    state: PipelineState,
    /// 시작 전까지 보관하는 집계기 세트 (시작 시 스케줄러로 이동)
    aggregators: Option<AggregatorSet>,
    running: Option<Running>,
}

impl StatsPipeline {
    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 컴파일된 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 실행 중인 입력 수집기
    pub fn collector(&self) -> Option<&Arc<dyn InputCollector>> {
        self.running.as_ref().map(|r| &r.collector)
    }

    /// 실행 중인 스케줄러
    pub fn scheduler(&self) -> Option<&Arc<Scheduler>> {
        self.running.as_ref().map(|r| &r.scheduler)
    }

    fn take_aggregators(&mut self) -> Result<AggregatorSet, LogstatError> {
        self.aggregators
            .take()
            .ok_or_else(|| PipelineError::InitFailed("pipeline cannot be restarted".to_owned()).into())
    }

    /// 한 주기만 실행하고 종료합니다.
    ///
    /// 수집기를 열고 한 주기를 기다린 뒤 틱 하나를 실행하며, 디스패치가
    /// 끝날 때까지 기다린 후 수집기를 닫습니다.
    pub async fn run_once(&mut self) -> Result<(TickReport, DispatchReport), LogstatError> {
        if self.state != PipelineState::Initialized {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let collector = open_collector(&self.config.input, &self.config.collector).await?;
        let aggregators = match self.take_aggregators() {
            Ok(aggregators) => aggregators,
            Err(e) => {
                collector.close().await;
                return Err(e);
            }
        };
        let scheduler = Scheduler::new(
            Arc::clone(&collector),
            self.config.parser.clone(),
            aggregators,
            self.config.period,
        );

        tracing::info!(period = ?self.config.period, "running a single tick");
        tokio::time::sleep(self.config.period).await;
        let result = scheduler.tick_and_dispatch().await;

        collector.close().await;
        self.state = PipelineState::Stopped;

        let (report, dispatched) = result?;
        tracing::info!(
            records = report.records,
            skipped = report.skipped,
            metrics = dispatched.metrics,
            failed_sends = dispatched.failed_sends,
            "single tick completed"
        );
        Ok((report, dispatched))
    }

    /// 스케줄러 루프가 끝날 때까지 기다립니다.
    ///
    /// 정상 취소면 `Ok`, 치명적 에러로 중단되었으면 그 에러를 반환합니다.
    /// 실행 중이 아니면 즉시 `NotRunning`.
    pub async fn wait(&mut self) -> Result<(), LogstatError> {
        let running = self
            .running
            .as_mut()
            .ok_or(LogstatError::Pipeline(PipelineError::NotRunning))?;
        let Some(task) = running.task.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        running.task = None;
        match joined {
            Ok(result) => result.map_err(LogstatError::from),
            Err(e) => Err(PipelineError::Scheduler(e.to_string()).into()),
        }
    }
}

impl Pipeline for StatsPipeline {
    async fn start(&mut self) -> Result<(), LogstatError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(input = ?self.config.input, "starting stats pipeline");

        let collector = open_collector(&self.config.input, &self.config.collector).await?;
        let aggregators = match self.take_aggregators() {
            Ok(aggregators) => aggregators,
            Err(e) => {
                collector.close().await;
                return Err(e);
            }
        };
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&collector),
            self.config.parser.clone(),
            aggregators,
            self.config.period,
        ));

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            let cancel = cancel.clone();
            async move {
                let result = scheduler.run(cancel).await;
                if let Err(e) = &result {
                    tracing::error!(error = %e, "scheduler stopped");
                }
                result
            }
        });

        self.running = Some(Running {
            collector,
            scheduler,
            cancel,
            task: Some(task),
        });
        self.state = PipelineState::Running;
        tracing::info!("stats pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogstatError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        let Some(running) = self.running.take() else {
            return Err(PipelineError::NotRunning.into());
        };

        tracing::info!("stopping stats pipeline");

        // 1. 타이머 중단 (진행 중인 주기 상태는 버려짐)
        running.cancel.cancel();
        if let Some(task) = running.task {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "scheduler had already failed"),
                Err(e) => tracing::warn!(error = %e, "scheduler task panicked"),
            }
        }

        // 2. 이미 끝난 주기의 디스패치 완료 대기
        let report = running.scheduler.wait_dispatches(DISPATCH_DRAIN_TIMEOUT).await;
        if report.aggregators > 0 {
            tracing::info!(metrics = report.metrics, "in-flight dispatches completed");
        }

        // 3. 수집기 종료 (대기 중인 read/accept 해제)
        running.collector.close().await;

        self.state = PipelineState::Stopped;
        tracing::info!("stats pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match (self.state, &self.running) {
            (PipelineState::Running, Some(running)) => {
                if running.task.as_ref().is_none_or(JoinHandle::is_finished) {
                    return HealthStatus::Unhealthy("scheduler exited".to_owned());
                }
                match running.collector.status() {
                    CollectorStatus::Error(reason) => {
                        HealthStatus::Degraded(format!("{}: {reason}", running.collector.name()))
                    }
                    CollectorStatus::Stopped => {
                        HealthStatus::Degraded(format!("{} input finished", running.collector.name()))
                    }
                    CollectorStatus::Idle | CollectorStatus::Running => HealthStatus::Healthy,
                }
            }
            (PipelineState::Initialized, _) => HealthStatus::Unhealthy("not started".to_owned()),
            _ => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

impl std::fmt::Debug for StatsPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsPipeline")
            .field("state", &self.state)
            .field("input", &self.config.input)
            .field("filters", &self.config.filters.len())
            .finish()
    }
}

/// 통계 파이프라인 빌더
///
/// 설정을 컴파일하고 필터마다 집계기와 출력 그룹을 생성합니다.
pub struct StatsPipelineBuilder {
    config: LogstatConfig,
    registry: OutputRegistry,
}

impl StatsPipelineBuilder {
    /// 새 빌더를 생성합니다. 기본 출력 유형(console, zabbix)이 등록됩니다.
    pub fn new() -> Self {
        Self {
            config: LogstatConfig::default(),
            registry: OutputRegistry::with_defaults(),
        }
    }

    /// 설정을 지정합니다.
    pub fn config(mut self, config: LogstatConfig) -> Self {
        self.config = config;
        self
    }

    /// 출력 레지스트리를 교체합니다.
    pub fn registry(mut self, registry: OutputRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// DSN, 정규식, 출력 유형/설정 오류는 여기서 치명적 에러로 보고됩니다.
    pub fn build(self) -> Result<StatsPipeline, LogPipelineError> {
        let config = PipelineConfig::from_core(&self.config)?;

        let aggregators = config
            .filters
            .iter()
            .map(|filter| {
                let outputs = self.registry.build_group(&config.outputs)?;
                Ok(Aggregator::new(
                    Arc::clone(filter),
                    Arc::clone(&config.fields),
                    config.period,
                    config.numeric_parse_policy,
                    outputs,
                ))
            })
            .collect::<Result<Vec<_>, LogPipelineError>>()?;

        tracing::debug!(
            filters = aggregators.len(),
            outputs = config.outputs.len(),
            "stats pipeline built"
        );

        Ok(StatsPipeline {
            config,
            state: PipelineState::Initialized,
            aggregators: Some(AggregatorSet::new(aggregators)),
            running: None,
        })
    }
}

impl Default for StatsPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
