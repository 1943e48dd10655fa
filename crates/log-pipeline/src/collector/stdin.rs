//! 표준 입력 수집기
//!
//! 표준 입력을 EOF까지 청크 단위로 읽어 완성된 라인을 버퍼에 추가합니다.
//! EOF에서 개행 없이 끝난 마지막 라인은 개행을 붙여 추가합니다.

use bytes::Bytes;
use logstat_core::pipeline::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AppendSink, CollectorRuntime, CollectorStatus, InputCollector, LineAssembler, StatusHandle};

const SOURCE: &str = "stdin";

/// 읽기 청크 크기
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// 표준 입력 수집기
#[derive(Debug)]
pub struct StdinCollector {
    runtime: CollectorRuntime,
}

impl StdinCollector {
    /// 프로세스 표준 입력을 읽는 수집기를 시작합니다.
    pub fn spawn() -> Self {
        Self::with_reader(tokio::io::stdin())
    }

    /// 임의의 비동기 리더를 표준 입력 대신 읽는 수집기를 시작합니다.
    pub fn with_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let runtime = CollectorRuntime::new(SOURCE);
        runtime.spawn(read_loop(
            reader,
            runtime.sink(),
            runtime.cancel_token(),
            runtime.status_handle(),
        ));
        Self { runtime }
    }
}

impl InputCollector for StdinCollector {
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

async fn read_loop<R>(mut reader: R, sink: AppendSink, cancel: CancellationToken, status: StatusHandle)
where
    R: AsyncRead + Unpin,
{
    let mut lines = LineAssembler::default();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("stdin reader received shutdown signal");
                return;
            }
            result = reader.read(&mut chunk) => result,
        };

        match read {
            Ok(0) => {
                if let Some(partial) = lines.take_partial() {
                    sink.append_line(&partial);
                }
                info!("stdin reached EOF");
                status.set(CollectorStatus::Stopped);
                return;
            }
            Ok(n) => {
                if let Some(complete) = lines.push(&chunk[..n]) {
                    sink.append(&complete);
                }
            }
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                status.set(CollectorStatus::Error(e.to_string()));
                return;
            }
        }
    }
}
