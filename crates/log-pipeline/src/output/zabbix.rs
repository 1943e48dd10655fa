//! Zabbix sender 출력 싱크
//!
//! 주기마다 누적된 메트릭을 Zabbix sender 프로토콜로 서버(trapper)에 전송합니다.
//!
//! # 프레임 형식
//! ```text
//! "ZBXD" | 0x01 | payload length (u64 LE) | JSON payload
//! ```
//!
//! # 설정
//! - `server`: `host:port` (필수)
//! - `host`: Zabbix에 등록된 모니터링 대상 호스트 이름 (필수)
//! - `timeout_ms`: 연결/송수신 타임아웃 (기본 3000)

use std::collections::HashMap;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use logstat_core::error::OutputError;
use logstat_core::pipeline::{BoxFuture, Output};

/// 레지스트리 유형 이름
pub const TYPE_NAME: &str = "zabbix";

/// 프로토콜 헤더 (`ZBXD` + 버전 1)
const HEADER: &[u8; 5] = b"ZBXD\x01";

/// 헤더 + 길이 필드
const HEADER_LEN: usize = HEADER.len() + 8;

/// 응답 페이로드 최대 크기
const MAX_RESPONSE_LEN: u64 = 1024 * 1024;

/// 기본 타임아웃 (밀리초)
const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// 전송 항목 하나
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZabbixItem {
    pub host: String,
    pub key: String,
    pub value: String,
    pub clock: i64,
}

#[derive(Debug, Serialize)]
struct SenderRequest<'a> {
    request: &'static str,
    data: &'a [ZabbixItem],
    clock: i64,
}

#[derive(Debug, Deserialize)]
struct SenderResponse {
    response: String,
    #[serde(default)]
    info: String,
}

/// Zabbix sender 싱크
#[derive(Debug)]
pub struct ZabbixOutput {
    server: String,
    host: String,
    timeout: Duration,
    batch: Vec<ZabbixItem>,
}

impl ZabbixOutput {
    /// 초기화 전 싱크를 생성합니다. 사용 전에 `init`이 필요합니다.
    pub fn new() -> Self {
        Self {
            server: String::new(),
            host: String::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            batch: Vec::new(),
        }
    }

    fn send_error(reason: impl Into<String>) -> OutputError {
        OutputError::SendFailed {
            output: TYPE_NAME.to_owned(),
            reason: reason.into(),
        }
    }

    async fn exchange(&self, frame: &[u8]) -> Result<SenderResponse, OutputError> {
        let mut stream = TcpStream::connect(&self.server)
            .await
            .map_err(|e| Self::send_error(format!("connect {}: {e}", self.server)))?;

        stream
            .write_all(frame)
            .await
            .map_err(|e| Self::send_error(format!("write: {e}")))?;

        let mut header = [0u8; HEADER_LEN];
        stream
            .read_exact(&mut header)
            .await
            .map_err(|e| Self::send_error(format!("read header: {e}")))?;
        let len = decode_header(&header)?;

        let mut payload = vec![0u8; len];
        stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| Self::send_error(format!("read payload: {e}")))?;

        serde_json::from_slice(&payload).map_err(|e| Self::send_error(format!("bad response: {e}")))
    }
}

impl Default for ZabbixOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// 페이로드를 sender 프레임으로 감쌉니다.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_slice(HEADER);
    buf.put_u64_le(payload.len() as u64);
    buf.put_slice(payload);
    buf.freeze()
}

/// 응답 헤더를 검증하고 페이로드 길이를 반환합니다.
fn decode_header(header: &[u8; HEADER_LEN]) -> Result<usize, OutputError> {
    if &header[..HEADER.len()] != HEADER {
        return Err(ZabbixOutput::send_error("response header is not ZBXD"));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&header[HEADER.len()..]);
    let len = u64::from_le_bytes(len_bytes);
    if len > MAX_RESPONSE_LEN {
        return Err(ZabbixOutput::send_error(format!(
            "response too large: {len} bytes"
        )));
    }
    usize::try_from(len).map_err(|_| ZabbixOutput::send_error("response length overflow"))
}

fn required(settings: &HashMap<String, String>, key: &str) -> Result<String, OutputError> {
    settings
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| OutputError::InitFailed {
            output: TYPE_NAME.to_owned(),
            reason: format!("setting '{key}' is required"),
        })
}

impl Output for ZabbixOutput {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn init(&mut self, settings: &HashMap<String, String>) -> Result<(), OutputError> {
        self.server = required(settings, "server")?;
        self.host = required(settings, "host")?;
        if let Some(raw) = settings.get("timeout_ms") {
            let ms: u64 = raw.parse().map_err(|_| OutputError::InitFailed {
                output: TYPE_NAME.to_owned(),
                reason: format!("timeout_ms '{raw}' is not a number"),
            })?;
            self.timeout = Duration::from_millis(ms);
        }
        tracing::debug!(server = %self.server, host = %self.host, "zabbix output initialized");
        Ok(())
    }

    fn add_message(&mut self, key: &str, value: &str) {
        self.batch.push(ZabbixItem {
            host: self.host.clone(),
            key: key.to_owned(),
            value: value.to_owned(),
            clock: chrono::Utc::now().timestamp(),
        });
    }

    fn send(&mut self) -> BoxFuture<'_, Result<(), OutputError>> {
        Box::pin(async move {
            let batch = std::mem::take(&mut self.batch);
            if batch.is_empty() {
                return Ok(());
            }

            let request = SenderRequest {
                request: "sender data",
                data: &batch,
                clock: chrono::Utc::now().timestamp(),
            };
            let payload = serde_json::to_vec(&request)
                .map_err(|e| Self::send_error(format!("serialize: {e}")))?;
            let frame = encode_frame(&payload);

            let response = tokio::time::timeout(self.timeout, self.exchange(&frame))
                .await
                .map_err(|_| Self::send_error(format!("timed out after {:?}", self.timeout)))??;

            if response.response != "success" {
                return Err(Self::send_error(format!(
                    "server answered '{}': {}",
                    response.response, response.info
                )));
            }

            tracing::debug!(items = batch.len(), info = %response.info, "zabbix batch sent");
            Ok(())
        })
    }
}
