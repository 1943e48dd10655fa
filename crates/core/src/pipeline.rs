//! 파이프라인 trait -- 모듈 확장 포인트 정의

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::{LogstatError, OutputError};

/// trait 객체에서 사용하는 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 컴포넌트 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하
    Degraded(String),
    /// 비정상
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 여부
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 생명주기를 가진 파이프라인 trait
///
/// `logstat-daemon`은 이 trait을 통해 파이프라인을 시작/정지합니다.
pub trait Pipeline: Send {
    /// 파이프라인을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogstatError>> + Send;

    /// 파이프라인을 정지합니다. 진행 중인 주기의 데이터는 버려집니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogstatError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 메트릭 출력 싱크 trait
///
/// 새로운 출력 대상을 지원하려면 이 trait을 구현하고
/// 출력 레지스트리에 유형 이름으로 등록합니다.
///
/// 한 주기 동안 `add_message`가 여러 번 호출된 뒤 `send`가 한 번 호출됩니다.
/// `send`는 누적된 배치를 비웁니다.
pub trait Output: Send {
    /// 출력 유형 이름 (예: `"console"`)
    fn type_name(&self) -> &str;

    /// 설정값으로 싱크를 초기화합니다.
    fn init(&mut self, settings: &HashMap<String, String>) -> Result<(), OutputError>;

    /// 배치에 메트릭 하나를 추가합니다.
    fn add_message(&mut self, key: &str, value: &str);

    /// 누적된 배치를 전송하고 비웁니다.
    fn send(&mut self) -> BoxFuture<'_, Result<(), OutputError>>;
}
