//! 콘솔 출력 싱크 -- 주기마다 메트릭을 표준 출력에 한 줄씩 기록
//!
//! # 설정
//! - `format`: `plain` (기본, `<key> <value>`) 또는 `json`
//!   (`{"key":..,"value":..,"clock":..}`)

use std::collections::HashMap;
use std::io::Write;

use logstat_core::error::OutputError;
use logstat_core::pipeline::{BoxFuture, Output};

/// 레지스트리 유형 이름
pub const TYPE_NAME: &str = "console";

/// 출력 라인 형식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsoleFormat {
    #[default]
    Plain,
    Json,
}

/// 콘솔 출력 싱크
pub struct ConsoleOutput {
    format: ConsoleFormat,
    batch: Vec<(String, String)>,
    writer: Box<dyn Write + Send>,
}

impl ConsoleOutput {
    /// 표준 출력에 기록하는 싱크를 생성합니다.
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    /// 지정한 writer에 기록하는 싱크를 생성합니다.
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            format: ConsoleFormat::default(),
            batch: Vec::new(),
            writer,
        }
    }

    /// 현재 출력 형식
    pub fn format(&self) -> ConsoleFormat {
        self.format
    }

    fn render(&self, key: &str, value: &str, clock: i64) -> String {
        match self.format {
            ConsoleFormat::Plain => format!("{key} {value}"),
            ConsoleFormat::Json => {
                serde_json::json!({ "key": key, "value": value, "clock": clock }).to_string()
            }
        }
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for ConsoleOutput {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn init(&mut self, settings: &HashMap<String, String>) -> Result<(), OutputError> {
        self.format = match settings.get("format").map(String::as_str) {
            None | Some("" | "plain") => ConsoleFormat::Plain,
            Some("json") => ConsoleFormat::Json,
            Some(other) => {
                return Err(OutputError::InitFailed {
                    output: TYPE_NAME.to_owned(),
                    reason: format!("unknown format '{other}', expected plain or json"),
                });
            }
        };
        Ok(())
    }

    fn add_message(&mut self, key: &str, value: &str) {
        self.batch.push((key.to_owned(), value.to_owned()));
    }

    fn send(&mut self) -> BoxFuture<'_, Result<(), OutputError>> {
        Box::pin(async move {
            let batch = std::mem::take(&mut self.batch);
            if batch.is_empty() {
                return Ok(());
            }

            let clock = chrono::Utc::now().timestamp();
            let mut out = String::new();
            for (key, value) in &batch {
                out.push_str(&self.render(key, value, clock));
                out.push('\n');
            }

            self.writer
                .write_all(out.as_bytes())
                .and_then(|()| self.writer.flush())
                .map_err(|e| OutputError::SendFailed {
                    output: TYPE_NAME.to_owned(),
                    reason: e.to_string(),
                })
        })
    }
}
