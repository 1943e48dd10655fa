//! 파싱 모듈 -- 레코드 추출과 syslog 메시지 파싱
//!
//! - [`RecordParser`]: 추출 정규식으로 라인을 [`Record`](logstat_core::types::Record)로 변환
//! - [`SyslogMessageParser`]: syslog 수집기가 수신한 메시지에서 애플리케이션과 본문을 분리
//!
//! 드레인된 버퍼는 [`split_lines`]로 라인 단위로 나눈 뒤 레코드 파서에 전달됩니다.

pub mod record;
pub mod syslog;

pub use record::RecordParser;
pub use syslog::{SyslogMessage, SyslogMessageParser};

/// 드레인된 바이트를 라인으로 나눕니다.
///
/// `\n`으로 분리하고 끝의 `\r`을 제거하며, 빈 라인은 건너뜁니다.
/// UTF-8이 아닌 바이트는 대체 문자로 치환됩니다.
pub fn split_lines(data: &[u8]) -> impl Iterator<Item = std::borrow::Cow<'_, str>> {
    data.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(String::from_utf8_lossy)
}
