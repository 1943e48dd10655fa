//! Syslog 입력 수집기
//!
//! `syslog:<udp|tcp>:<listen>/<application>` DSN으로 리스너를 열고,
//! 수신한 메시지 중 애플리케이션 이름이 일치하는 것의 본문만 버퍼에 추가합니다.
//!
//! - 형식을 인식할 수 없는 메시지는 로그를 남기고 버립니다.
//! - 다른 애플리케이션의 메시지는 조용히 버립니다.

use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use logstat_core::config::SyslogConfig;
use logstat_core::metrics as m;
use logstat_core::pipeline::BoxFuture;
use regex::Regex;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{info, trace, warn};

use super::{AppendSink, CollectorRuntime, CollectorStatus, InputCollector};
use super::{syslog_tcp, syslog_udp};
use crate::error::LogPipelineError;
use crate::parser::SyslogMessageParser;

const SOURCE: &str = "syslog";

static DSN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(syslog):([a-zA-Z0-9]+):([^/]+)/(\S+)$")
        .unwrap_or_else(|e| unreachable!("static DSN pattern: {e}"))
});

/// syslog 전송 프로토콜
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogProtocol {
    Udp,
    Tcp,
}

impl std::fmt::Display for SyslogProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// 파싱된 syslog DSN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogDsn {
    pub protocol: SyslogProtocol,
    /// 바인드 주소 (예: `0.0.0.0:5514`)
    pub listen: String,
    /// 수집할 애플리케이션 이름
    pub application: String,
}

impl SyslogDsn {
    /// DSN 문자열을 파싱합니다.
    ///
    /// 형식이 맞지 않으면 `InvalidDsn`, 프로토콜이 udp/tcp가 아니면 `UnsupportedProtocol`.
    pub fn parse(dsn: &str) -> Result<Self, LogPipelineError> {
        let caps = DSN_PATTERN
            .captures(dsn)
            .ok_or_else(|| LogPipelineError::InvalidDsn(dsn.to_owned()))?;

        let protocol = match &caps[2] {
            "udp" => SyslogProtocol::Udp,
            "tcp" => SyslogProtocol::Tcp,
            other => return Err(LogPipelineError::UnsupportedProtocol(other.to_owned())),
        };

        Ok(Self {
            protocol,
            listen: caps[3].to_owned(),
            application: caps[4].to_owned(),
        })
    }
}

/// 수신 메시지를 파싱하고 애플리케이션으로 필터링하여 버퍼에 추가하는 처리기
///
/// 모든 연결 핸들러와 UDP 수신 루프가 공유합니다.
#[derive(Debug, Clone)]
pub(crate) struct SyslogHandler {
    parser: SyslogMessageParser,
    application: Arc<str>,
    sink: AppendSink,
}

impl SyslogHandler {
    pub(crate) fn new(application: &str, sink: AppendSink) -> Self {
        Self {
            parser: SyslogMessageParser::new(),
            application: Arc::from(application),
            sink,
        }
    }

    /// 메시지 하나를 처리합니다. 버퍼에 추가되었으면 true.
    pub(crate) fn handle(&self, payload: &[u8]) -> bool {
        let text = String::from_utf8_lossy(trim_line_end(payload));
        match self.parser.parse(&text) {
            Ok(msg) if msg.application == *self.application => {
                self.sink.append_line(msg.message.as_bytes());
                true
            }
            Ok(msg) => {
                trace!(application = %msg.application, "syslog message for other application dropped");
                metrics::counter!(m::SYSLOG_MESSAGES_DROPPED_TOTAL).increment(1);
                false
            }
            Err(e) => {
                warn!(error = %e, "unrecognized syslog message dropped");
                metrics::counter!(m::SYSLOG_MESSAGES_DROPPED_TOTAL).increment(1);
                false
            }
        }
    }
}

/// 끝의 개행 문자(`\r`, `\n`)를 제거합니다.
pub(crate) fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

/// Syslog 입력 수집기
#[derive(Debug)]
pub struct SyslogCollector {
    dsn: SyslogDsn,
    local_addr: SocketAddr,
    runtime: CollectorRuntime,
}

impl SyslogCollector {
    /// DSN의 주소에 바인드하고 수신 태스크를 시작합니다.
    pub async fn bind(dsn: SyslogDsn, config: &SyslogConfig) -> Result<Self, LogPipelineError> {
        let runtime = CollectorRuntime::new(SOURCE);
        let handler = SyslogHandler::new(&dsn.application, runtime.sink());
        let bind_error = |e: std::io::Error| LogPipelineError::Collector {
            source_type: format!("syslog_{}", dsn.protocol),
            reason: format!("failed to bind to {}: {e}", dsn.listen),
        };

        let local_addr = match dsn.protocol {
            SyslogProtocol::Tcp => {
                let listener = TcpListener::bind(&dsn.listen).await.map_err(bind_error)?;
                let local_addr = listener.local_addr().map_err(bind_error)?;
                runtime.spawn(syslog_tcp::serve(
                    listener,
                    handler,
                    config.clone(),
                    runtime.cancel_token(),
                ));
                local_addr
            }
            SyslogProtocol::Udp => {
                let socket = UdpSocket::bind(&dsn.listen).await.map_err(bind_error)?;
                let local_addr = socket.local_addr().map_err(bind_error)?;
                runtime.spawn(syslog_udp::serve(socket, handler, runtime.cancel_token()));
                local_addr
            }
        };

        info!(
            protocol = %dsn.protocol,
            addr = %local_addr,
            application = %dsn.application,
            "syslog collector listening"
        );

        Ok(Self {
            dsn,
            local_addr,
            runtime,
        })
    }

    /// 실제 바인드된 주소 (포트 0 바인드 시 할당된 포트 포함)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 수집기 DSN
    pub fn dsn(&self) -> &SyslogDsn {
        &self.dsn
    }
}

impl InputCollector for SyslogCollector {
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
