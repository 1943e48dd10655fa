//! 출력 모듈 -- 출력 싱크 레지스트리와 집계기별 출력 그룹
//!
//! [`OutputRegistry`]는 유형 이름(`"console"`, `"zabbix"`)을 싱크 생성자에 매핑합니다.
//! 유형은 파이프라인 빌드 시 한 번만 해석되며, 알 수 없는 유형은 시작 시 치명적 에러입니다.
//!
//! [`OutputGroup`]은 설정된 출력 목록마다 초기화된 싱크 하나씩을 묶은 것으로,
//! 집계기 하나가 소유합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logstat_log_pipeline::output::OutputRegistry;
//!
//! let registry = OutputRegistry::with_defaults();
//! let mut group = registry.build_group(&config.outputs)?;
//! group.add_message("status_cps_200", "3.000");
//! group.send_all().await;
//! ```

pub mod console;
pub mod zabbix;

pub use console::ConsoleOutput;
pub use zabbix::ZabbixOutput;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use logstat_core::config::OutputConfig;
use logstat_core::error::OutputError;
use logstat_core::metrics as m;
use logstat_core::pipeline::Output;

/// 싱크 생성자
pub type OutputFactory = Arc<dyn Fn() -> Box<dyn Output> + Send + Sync>;

/// 유형 이름 -> 싱크 생성자 레지스트리
#[derive(Clone)]
pub struct OutputRegistry {
    factories: HashMap<String, OutputFactory>,
}

impl OutputRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// 기본 싱크(console, zabbix)가 등록된 레지스트리를 생성합니다.
    pub fn with_defaults() -> Self {
        Self::new()
            .register(
                console::TYPE_NAME,
                Arc::new(|| -> Box<dyn Output> { Box::new(ConsoleOutput::new()) }),
            )
            .register(
                zabbix::TYPE_NAME,
                Arc::new(|| -> Box<dyn Output> { Box::new(ZabbixOutput::new()) }),
            )
    }

    /// 생성자를 등록합니다. 같은 이름이 있으면 교체됩니다.
    pub fn register(mut self, type_name: &str, factory: OutputFactory) -> Self {
        self.factories.insert(type_name.to_owned(), factory);
        self
    }

    /// 설정 하나로 싱크를 생성하고 초기화합니다.
    pub fn create(&self, config: &OutputConfig) -> Result<Box<dyn Output>, OutputError> {
        let factory = self
            .factories
            .get(&config.output_type)
            .ok_or_else(|| OutputError::UnknownType(config.output_type.clone()))?;
        let mut output = factory();
        output.init(&config.settings)?;
        Ok(output)
    }

    /// 출력 설정 목록 전체로 출력 그룹을 만듭니다.
    pub fn build_group(&self, configs: &[OutputConfig]) -> Result<OutputGroup, OutputError> {
        let sinks = configs
            .iter()
            .map(|config| self.create(config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(OutputGroup::new(sinks))
    }

    /// 등록된 유형 이름 목록
    pub fn registered_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for OutputRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for OutputRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

/// 집계기 하나가 소유하는 초기화된 싱크 묶음
pub struct OutputGroup {
    sinks: Vec<Box<dyn Output>>,
}

impl OutputGroup {
    /// 싱크 목록으로 그룹을 생성합니다.
    pub fn new(sinks: Vec<Box<dyn Output>>) -> Self {
        Self { sinks }
    }

    /// 모든 싱크의 배치에 메시지를 추가합니다.
    pub fn add_message(&mut self, key: &str, value: &str) {
        for sink in &mut self.sinks {
            sink.add_message(key, value);
        }
    }

    /// 모든 싱크의 배치를 전송합니다.
    ///
    /// 한 싱크의 실패는 로그로 남기고 나머지 싱크 전송을 계속합니다.
    /// 실패한 싱크 수를 반환합니다.
    pub async fn send_all(&mut self) -> usize {
        let mut failures = 0;
        for sink in &mut self.sinks {
            let output = sink.type_name().to_owned();
            match sink.send().await {
                Ok(()) => {
                    metrics::counter!(m::OUTPUT_SENDS_TOTAL, m::LABEL_OUTPUT => output, m::LABEL_RESULT => "success")
                        .increment(1);
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(output = %output, error = %e, "output send failed");
                    metrics::counter!(m::OUTPUT_SENDS_TOTAL, m::LABEL_OUTPUT => output, m::LABEL_RESULT => "failure")
                        .increment(1);
                }
            }
        }
        failures
    }

    /// 싱크 수
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// 싱크가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for OutputGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&str> = self.sinks.iter().map(|s| s.type_name()).collect();
        f.debug_struct("OutputGroup").field("sinks", &types).finish()
    }
}
