//! 입력 버퍼 -- 수집기가 채우고 스케줄러가 비우는 바이트 누적기
//!
//! [`InputBuffer`]는 수집기 하나가 독점 소유하는 append-only 바이트 버퍼입니다.
//! 여러 생산자(파일 리더, syslog 연결 핸들러)가 동시에 추가하고,
//! 스케줄러가 틱마다 한 번 [`InputBuffer::drain`]으로 전체를 가져가며 비웁니다.
//!
//! # 동기화
//! 추가와 드레인은 모두 같은 뮤텍스를 잡은 상태에서 수행되므로,
//! 드레인과 동시에 추가가 일어나도 바이트가 유실되거나 두 번 전달되지 않습니다.
//! 임계 구역은 memcpy 수준으로 짧아 `std::sync::Mutex`를 사용합니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::{BufMut, Bytes, BytesMut};

/// 초기 버퍼 용량
const INITIAL_CAPACITY: usize = 64 * 1024;

/// 스레드 안전 입력 버퍼
#[derive(Debug)]
pub struct InputBuffer {
    /// 누적된 바이트
    inner: Mutex<BytesMut>,
    /// 지금까지 추가된 바이트 수
    appended: AtomicU64,
    /// 지금까지 드레인된 바이트 수
    drained: AtomicU64,
}

impl InputBuffer {
    /// 빈 버퍼를 생성합니다.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BytesMut::with_capacity(INITIAL_CAPACITY)),
            appended: AtomicU64::new(0),
            drained: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BytesMut> {
        // 패닉한 생산자가 있어도 버퍼 내용 자체는 유효함
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 바이트를 그대로 추가합니다.
    pub fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut buf = self.lock();
        buf.extend_from_slice(data);
        self.appended.fetch_add(data.len() as u64, Ordering::Relaxed);
    }

    /// 바이트 뒤에 개행을 붙여 하나의 라인으로 추가합니다.
    ///
    /// 라인과 개행이 같은 임계 구역에서 추가되므로 다른 생산자의 라인과 섞이지 않습니다.
    pub fn append_line(&self, line: &[u8]) {
        let mut buf = self.lock();
        buf.reserve(line.len() + 1);
        buf.extend_from_slice(line);
        buf.put_u8(b'\n');
        self.appended
            .fetch_add(line.len() as u64 + 1, Ordering::Relaxed);
    }

    /// 누적된 내용을 모두 가져가고 버퍼를 비웁니다.
    pub fn drain(&self) -> Bytes {
        let mut buf = self.lock();
        let taken = buf.split().freeze();
        self.drained.fetch_add(taken.len() as u64, Ordering::Relaxed);
        taken
    }

    /// 현재 누적된 바이트 수
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 지금까지 추가된 총 바이트 수
    pub fn total_appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }

    /// 지금까지 드레인된 총 바이트 수
    pub fn total_drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}
