//! 파일 기반 입력 수집기
//!
//! 로그 파일을 감시하며 새로운 라인이 추가되면 버퍼에 누적합니다.
//! `tail -f`와 유사한 동작을 비동기 폴링으로 구현합니다.
//!
//! # 로테이션 감지
//! - inode 변경 감지 (logrotate 등, Unix 전용) → 새 파일을 처음부터 읽음
//! - 파일 크기 축소 감지 (truncation) → 처음부터 다시 읽음
//!
//! 완성된 라인만 버퍼에 추가되며, 개행 없는 마지막 부분 라인은 개행이 올 때까지 보류됩니다.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use logstat_core::config::TailConfig;
use logstat_core::pipeline::BoxFuture;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    AppendSink, CollectorRuntime, CollectorStatus, InputCollector, LineAssembler, StatusHandle,
};
use crate::error::LogPipelineError;

const SOURCE: &str = "file";

/// 한 번의 폴링에서 읽는 최대 바이트
const MAX_READ_PER_POLL: u64 = 4 * 1024 * 1024;

/// 파일 기반 입력 수집기
#[derive(Debug)]
pub struct FileCollector {
    path: PathBuf,
    runtime: CollectorRuntime,
}

impl FileCollector {
    /// 파일을 열고 감시 태스크를 시작합니다.
    ///
    /// `from_start`가 아니면 현재 파일 끝에서부터 읽습니다.
    pub async fn open(path: &Path, tail: &TailConfig) -> Result<Self, LogPipelineError> {
        let file = File::open(path).await.map_err(|e| collector_error(path, &e))?;
        let metadata = file.metadata().await.map_err(|e| collector_error(path, &e))?;
        let offset = if tail.from_start { 0 } else { metadata.len() };

        let runtime = CollectorRuntime::new(SOURCE);
        let state = TailState {
            path: path.to_path_buf(),
            file,
            offset,
            inode: inode_of(&metadata),
            lines: LineAssembler::default(),
        };

        info!(path = %path.display(), offset, "tailing file");
        runtime.spawn(tail_loop(
            state,
            Duration::from_millis(tail.poll_interval_ms),
            runtime.sink(),
            runtime.cancel_token(),
            runtime.status_handle(),
        ));

        Ok(Self {
            path: path.to_path_buf(),
            runtime,
        })
    }

    /// 감시 중인 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InputCollector for FileCollector {
    fn name(&self) -> &str {
        SOURCE
    }

    fn append_observed(&self, data: &[u8]) {
        self.runtime.append(data);
    }

    fn drain_and_reset(&self) -> Bytes {
        self.runtime.drain()
    }

    fn status(&self) -> CollectorStatus {
        self.runtime.status()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.runtime.close())
    }
}

fn collector_error(path: &Path, err: &std::io::Error) -> LogPipelineError {
    LogPipelineError::Collector {
        source_type: SOURCE.to_owned(),
        reason: format!("{}: {err}", path.display()),
    }
}

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}

/// 감시 중인 파일의 추적 상태
struct TailState {
    path: PathBuf,
    file: File,
    /// 다음 읽기 위치 (바이트 오프셋)
    offset: u64,
    inode: Option<u64>,
    lines: LineAssembler,
}

impl TailState {
    /// 로테이션/truncation을 확인하고 새로 추가된 내용을 읽습니다.
    async fn poll(&mut self, sink: &AppendSink) -> std::io::Result<()> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => {
                let inode = inode_of(&metadata);
                if inode.is_some() && inode != self.inode {
                    // 이전 파일의 남은 내용을 먼저 읽고 새 파일로 교체
                    self.read_new(sink).await?;
                    self.reopen(inode).await?;
                } else if metadata.len() < self.offset {
                    info!(path = %self.path.display(), "file truncated, reading from start");
                    self.offset = 0;
                    self.lines.clear();
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // 로테이션 직후 새 파일이 아직 없음; 열린 핸들은 계속 읽음
                debug!(path = %self.path.display(), "file missing, waiting for it to reappear");
            }
            Err(e) => return Err(e),
        }

        self.read_new(sink).await
    }

    async fn reopen(&mut self, inode: Option<u64>) -> std::io::Result<()> {
        info!(path = %self.path.display(), "file rotated, reopening");
        self.file = File::open(&self.path).await?;
        self.offset = 0;
        self.inode = inode;
        if self.lines.pending_len() > 0 {
            debug!(bytes = self.lines.pending_len(), "dropping partial line from rotated file");
            self.lines.clear();
        }
        Ok(())
    }

    async fn read_new(&mut self, sink: &AppendSink) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(self.offset)).await?;
        let mut chunk = Vec::new();
        let read = (&mut self.file)
            .take(MAX_READ_PER_POLL)
            .read_to_end(&mut chunk)
            .await?;
        if read == 0 {
            return Ok(());
        }
        self.offset += read as u64;
        if let Some(lines) = self.lines.push(&chunk) {
            sink.append(&lines);
        }
        Ok(())
    }
}

async fn tail_loop(
    mut state: TailState,
    poll_interval: Duration,
    sink: AppendSink,
    cancel: CancellationToken,
    status: StatusHandle,
) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(path = %state.path.display(), "file tail received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = state.poll(&sink).await {
                    // 일시적 I/O 에러는 다음 폴링에서 재시도
                    warn!(path = %state.path.display(), error = %e, "file read failed");
                    status.set(CollectorStatus::Error(e.to_string()));
                } else if matches!(status.get(), CollectorStatus::Error(_)) {
                    status.set(CollectorStatus::Running);
                }
            }
        }
    }
}
