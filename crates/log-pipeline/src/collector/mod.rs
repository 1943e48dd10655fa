//! 입력 수집 모듈 -- 파일, 표준 입력, syslog 리스너
//!
//! # 수집기
//! - [`FileCollector`]: 파일 감시 (tail -f 방식, 로테이션/truncation 감지)
//! - [`StdinCollector`]: 표준 입력을 EOF까지 읽음
//! - [`SyslogCollector`]: UDP 또는 TCP syslog 리스너, 애플리케이션 이름으로 필터링
//!
//! # 아키텍처
//! 각 수집기는 자체 [`InputBuffer`]를 독점 소유합니다. 생산자 태스크(파일 리더,
//! syslog 연결 핸들러)는 완성된 라인만 버퍼에 추가하고, 스케줄러는 틱마다
//! [`InputCollector::drain_and_reset`]으로 누적된 바이트를 한 번에 가져갑니다.
//!
//! ```text
//! producer tasks --append_line--> InputBuffer <--drain_and_reset-- Scheduler
//! ```

pub mod file;
pub mod stdin;
pub mod syslog;
pub mod syslog_tcp;
pub mod syslog_udp;

pub use file::FileCollector;
pub use stdin::StdinCollector;
pub use syslog::{SyslogCollector, SyslogDsn, SyslogProtocol};

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use logstat_core::config::{SyslogConfig, TailConfig};
use logstat_core::metrics as m;
use logstat_core::pipeline::BoxFuture;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::InputBuffer;
use crate::error::LogPipelineError;

/// 종료 시 생산자 태스크를 기다리는 최대 시간
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// 입력 수집기 trait
///
/// 생산자는 `append_observed`로 바이트를 추가하고, 스케줄러는 틱마다
/// `drain_and_reset`을 정확히 한 번 호출합니다.
pub trait InputCollector: Send + Sync {
    /// 수집 소스 유형 (`"file"`, `"stdin"`, `"syslog"`)
    fn name(&self) -> &str;

    /// 관측된 바이트를 버퍼에 추가합니다.
    fn append_observed(&self, data: &[u8]);

    /// 이전 드레인 이후 추가된 모든 바이트를 가져가고 버퍼를 비웁니다.
    fn drain_and_reset(&self) -> Bytes;

    /// 수집기 상태
    fn status(&self) -> CollectorStatus;

    /// 생산자 태스크를 중단하고 파일 핸들과 소켓을 해제합니다.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨 (close 또는 입력 EOF)
    Stopped,
}

/// 수집기 생성 옵션
#[derive(Debug, Clone, Default)]
pub struct CollectorOptions {
    pub tail: TailConfig,
    pub syslog: SyslogConfig,
}

/// 파싱된 입력 DSN
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputDsn {
    /// `file:<path>`
    File(PathBuf),
    /// `stdin:<anything>`
    Stdin,
    /// `syslog:<udp|tcp>:<listen>/<application>`
    Syslog(SyslogDsn),
}

impl InputDsn {
    /// DSN 문자열을 스킴에 따라 해석합니다.
    pub fn parse(dsn: &str) -> Result<Self, LogPipelineError> {
        if let Some(path) = dsn.strip_prefix("file:") {
            if path.is_empty() {
                return Err(LogPipelineError::InvalidDsn(dsn.to_owned()));
            }
            Ok(Self::File(PathBuf::from(path)))
        } else if dsn.starts_with("stdin:") {
            Ok(Self::Stdin)
        } else if dsn.starts_with("syslog:") {
            SyslogDsn::parse(dsn).map(Self::Syslog)
        } else {
            Err(LogPipelineError::InvalidDsn(format!(
                "unknown input scheme: {dsn}"
            )))
        }
    }
}

/// DSN에 맞는 수집기를 생성하고 생산자 태스크를 시작합니다.
///
/// 파일 열기, 소켓 바인드 실패는 시작 시 치명적 에러입니다.
pub async fn open_collector(
    dsn: &InputDsn,
    options: &CollectorOptions,
) -> Result<Arc<dyn InputCollector>, LogPipelineError> {
    let collector: Arc<dyn InputCollector> = match dsn {
        InputDsn::File(path) => Arc::new(FileCollector::open(path, &options.tail).await?),
        InputDsn::Stdin => Arc::new(StdinCollector::spawn()),
        InputDsn::Syslog(syslog) => {
            Arc::new(SyslogCollector::bind(syslog.clone(), &options.syslog).await?)
        }
    };
    tracing::info!(input = collector.name(), "input collector opened");
    Ok(collector)
}

/// 버퍼에 추가하면서 수집 메트릭을 기록하는 핸들
#[derive(Debug, Clone)]
pub(crate) struct AppendSink {
    buffer: Arc<InputBuffer>,
    source: &'static str,
}

impl AppendSink {
    pub(crate) fn new(source: &'static str) -> Self {
        Self {
            buffer: Arc::new(InputBuffer::new()),
            source,
        }
    }

    pub(crate) fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.buffer.append(data);
        metrics::counter!(m::INPUT_BYTES_APPENDED_TOTAL, m::LABEL_INPUT => self.source)
            .increment(data.len() as u64);
    }

    pub(crate) fn append_line(&self, line: &[u8]) {
        self.buffer.append_line(line);
        metrics::counter!(m::INPUT_BYTES_APPENDED_TOTAL, m::LABEL_INPUT => self.source)
            .increment(line.len() as u64 + 1);
    }

    pub(crate) fn drain(&self) -> Bytes {
        let data = self.buffer.drain();
        metrics::counter!(m::INPUT_BYTES_DRAINED_TOTAL, m::LABEL_INPUT => self.source)
            .increment(data.len() as u64);
        data
    }
}

/// 수집기 공통 런타임: 버퍼, 취소 토큰, 생산자 태스크, 상태
#[derive(Debug)]
pub(crate) struct CollectorRuntime {
    sink: AppendSink,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    status: Arc<Mutex<CollectorStatus>>,
}

impl CollectorRuntime {
    pub(crate) fn new(source: &'static str) -> Self {
        Self {
            sink: AppendSink::new(source),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            status: Arc::new(Mutex::new(CollectorStatus::Idle)),
        }
    }

    pub(crate) fn source(&self) -> &'static str {
        self.sink.source
    }

    pub(crate) fn sink(&self) -> AppendSink {
        self.sink.clone()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn status_handle(&self) -> StatusHandle {
        StatusHandle(Arc::clone(&self.status))
    }

    /// 생산자 태스크를 시작하고 상태를 Running으로 바꿉니다.
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.status_handle().set(CollectorStatus::Running);
        let handle = tokio::spawn(task);
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    pub(crate) fn append(&self, data: &[u8]) {
        self.sink.append(data);
    }

    pub(crate) fn drain(&self) -> Bytes {
        self.sink.drain()
    }

    pub(crate) fn status(&self) -> CollectorStatus {
        self.status_handle().get()
    }

    /// 취소 신호를 보내고 생산자 태스크가 끝나기를 기다립니다.
    ///
    /// 제한 시간 안에 끝나지 않는 태스크는 중단(abort)합니다.
    pub(crate) async fn close(&self) {
        self.cancel.cancel();
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in tasks {
            let abort = handle.abort_handle();
            if tokio::time::timeout(CLOSE_TIMEOUT, handle).await.is_err() {
                tracing::warn!(input = self.source(), "collector task did not stop in time, aborting");
                abort.abort();
            }
        }

        self.status_handle().set(CollectorStatus::Stopped);
        tracing::info!(input = self.source(), "input collector closed");
    }
}

/// 생산자 태스크가 공유하는 상태 핸들
#[derive(Debug, Clone)]
pub(crate) struct StatusHandle(Arc<Mutex<CollectorStatus>>);

impl StatusHandle {
    pub(crate) fn set(&self, status: CollectorStatus) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub(crate) fn get(&self) -> CollectorStatus {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// 청크 스트림을 완성된 라인 단위로 모으는 조립기
///
/// 마지막 개행 이후의 부분 라인은 다음 청크가 올 때까지 보류합니다.
#[derive(Debug, Default)]
pub(crate) struct LineAssembler {
    pending: BytesMut,
}

impl LineAssembler {
    /// 청크를 추가하고, 개행으로 끝나는 완성된 라인 묶음이 있으면 반환합니다.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Option<Bytes> {
        self.pending.extend_from_slice(chunk);
        let last_newline = self.pending.iter().rposition(|&b| b == b'\n')?;
        Some(self.pending.split_to(last_newline + 1).freeze())
    }

    /// 보류 중인 부분 라인을 꺼냅니다.
    pub(crate) fn take_partial(&mut self) -> Option<Bytes> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.split().freeze())
        }
    }

    /// 보류 중인 부분 라인을 버립니다.
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
