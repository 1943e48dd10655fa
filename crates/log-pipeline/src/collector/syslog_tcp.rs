//! TCP syslog 리스너
//!
//! 개행으로 구분된 syslog 메시지를 수신합니다. 각 연결은 별도의 tokio 태스크에서
//! 처리되며, 동시 연결 수는 세마포어로 제한합니다.

use std::sync::Arc;

use logstat_core::config::SyslogConfig;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::syslog::{SyslogHandler, trim_line_end};

/// 연결 수락 루프를 실행합니다.
///
/// 최대 연결 수에 도달하면 새 연결을 즉시 닫습니다.
/// accept 에러는 로그만 남기고 루프를 계속합니다.
pub(crate) async fn serve(
    listener: TcpListener,
    handler: SyslogHandler,
    config: SyslogConfig,
    cancel: CancellationToken,
) {
    let handler = Arc::new(handler);
    let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, addr) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "syslog tcp accept failed");
                        continue;
                    }
                };

                let Ok(permit) = Arc::clone(&connection_semaphore).try_acquire_owned() else {
                    warn!(peer = %addr, "max connections reached, rejecting connection");
                    continue;
                };

                debug!(peer = %addr, "accepted syslog connection");
                let handler = Arc::clone(&handler);
                let cancel = cancel.clone();
                let max_line_length = config.max_line_length;
                tokio::spawn(async move {
                    handle_connection(stream, &handler, max_line_length, cancel).await;
                    drop(permit);
                });
            }
            _ = cancel.cancelled() => {
                info!("syslog tcp listener received shutdown signal");
                break;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    handler: &SyslogHandler,
    max_line_length: usize,
    cancel: CancellationToken,
) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_owned());
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    loop {
        let frame = tokio::select! {
            frame = next_frame(&mut reader, &mut line, max_line_length) => frame,
            _ = cancel.cancelled() => {
                debug!(peer = %peer, "syslog connection received shutdown signal");
                return;
            }
        };

        match frame {
            Ok(Frame::Line) => {
                let message = trim_line_end(&line);
                if !message.is_empty() {
                    handler.handle(message);
                }
            }
            Ok(Frame::TooLong) => {
                warn!(peer = %peer, max_line_length, "syslog line exceeds max length, dropped");
            }
            Ok(Frame::Eof) => {
                debug!(peer = %peer, "syslog connection closed by peer");
                return;
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "syslog connection read failed");
                return;
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// `line`에 한 라인이 채워짐
    Line,
    /// 최대 길이를 넘는 라인을 끝까지 버림
    TooLong,
    Eof,
}

/// 다음 개행까지 읽습니다.
///
/// 최대 길이를 넘으면 라인 끝까지 소비만 하고 버퍼에 쌓지 않습니다.
/// EOF에서 개행 없이 남은 데이터는 마지막 라인으로 취급합니다.
async fn next_frame<R>(
    reader: &mut R,
    line: &mut Vec<u8>,
    max_line_length: usize,
) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let mut overflow = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match (overflow, line.is_empty()) {
                (true, _) => Frame::TooLong,
                (false, true) => Frame::Eof,
                (false, false) => Frame::Line,
            });
        }

        let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (&available[..=pos], true),
            None => (available, false),
        };
        let consumed = chunk.len();

        if !overflow {
            if line.len() + consumed > max_line_length + 1 {
                overflow = true;
                line.clear();
            } else {
                line.extend_from_slice(chunk);
            }
        }
        reader.consume(consumed);

        if done {
            return Ok(if overflow { Frame::TooLong } else { Frame::Line });
        }
    }
}
