//! 통합 테스트 -- 수집부터 출력까지의 전체 흐름 검증
//!
//! 공개 API만 사용하여 수집기, 스케줄러, 집계기, 출력 싱크를 조립합니다.
//! syslog 테스트는 루프백 소켓을 사용합니다.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

use logstat_core::config::{
    FilterConfig, FilterItem, LogstatConfig, NumericParsePolicy, OutputConfig, SyslogConfig,
};
use logstat_core::error::OutputError;
use logstat_core::pipeline::{BoxFuture, Output, Pipeline};
use logstat_log_pipeline::collector::{
    CollectorStatus, StdinCollector, SyslogCollector, SyslogDsn, SyslogProtocol,
};
use logstat_log_pipeline::{
    Aggregator, AggregatorSet, InputCollector, InputDsn, LogPipelineError, OutputRegistry,
    RecordParser, Scheduler, StatsPipelineBuilder,
};
use logstat_log_pipeline::aggregate::FieldSets;
use logstat_log_pipeline::filter::FilterSpec;

type Batches = Arc<Mutex<Vec<Vec<(String, String)>>>>;

/// 전송된 배치를 기록하는 출력 싱크
struct CaptureOutput {
    pending: Vec<(String, String)>,
    batches: Batches,
}

impl Output for CaptureOutput {
    fn type_name(&self) -> &str {
        "capture"
    }

    fn init(&mut self, _settings: &HashMap<String, String>) -> Result<(), OutputError> {
        Ok(())
    }

    fn add_message(&mut self, key: &str, value: &str) {
        self.pending.push((key.to_owned(), value.to_owned()));
    }

    fn send(&mut self) -> BoxFuture<'_, Result<(), OutputError>> {
        Box::pin(async move {
            let batch = std::mem::take(&mut self.pending);
            self.batches.lock().unwrap().push(batch);
            Ok(())
        })
    }
}

fn capture_registry(batches: &Batches) -> OutputRegistry {
    let batches = Arc::clone(batches);
    OutputRegistry::new().register(
        "capture",
        Arc::new(move || -> Box<dyn Output> {
            Box::new(CaptureOutput {
                pending: Vec::new(),
                batches: Arc::clone(&batches),
            })
        }),
    )
}

fn status_config(input: &str, metrics: &[&str]) -> LogstatConfig {
    LogstatConfig {
        input: input.to_owned(),
        regexp: r"status=(?P<status>\d+)".to_owned(),
        period: "1s".to_owned(),
        counts: vec!["status".to_owned()],
        filters: vec![FilterConfig {
            filter: "*".to_owned(),
            prefix: String::new(),
            items: vec![FilterItem {
                field: "status".to_owned(),
                metrics: metrics.iter().map(|m| (*m).to_owned()).collect(),
            }],
        }],
        outputs: vec![OutputConfig {
            output_type: "capture".to_owned(),
            settings: HashMap::new(),
        }],
        ..Default::default()
    }
}

/// 설정에서 스케줄러를 직접 조립합니다.
fn scheduler_for(
    collector: Arc<dyn InputCollector>,
    config: &LogstatConfig,
    batches: &Batches,
) -> Scheduler {
    let registry = capture_registry(batches);
    let fields = Arc::new(FieldSets::new(
        config.aggregates.iter().cloned(),
        config.counts.iter().cloned(),
    ));
    let aggregators = config
        .filters
        .iter()
        .map(|f| {
            Aggregator::new(
                Arc::new(FilterSpec::from_config(f).unwrap()),
                Arc::clone(&fields),
                Duration::from_secs(1),
                NumericParsePolicy::Skip,
                registry.build_group(&config.outputs).unwrap(),
            )
        })
        .collect();
    Scheduler::new(
        collector,
        RecordParser::new(&config.regexp).unwrap(),
        AggregatorSet::new(aggregators),
        Duration::from_secs(1),
    )
}

async fn wait_for_status(collector: &dyn InputCollector, status: CollectorStatus) {
    for _ in 0..200 {
        if collector.status() == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("collector did not reach {status:?}");
}

fn value_of<'a>(batch: &'a [(String, String)], key: &str) -> Option<&'a str> {
    batch
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// stdin 입력 3건의 200과 1건의 404가 한 주기에 들어오면 cps가 3.000/1.000
#[tokio::test]
async fn test_stdin_cps_end_to_end() {
    let batches: Batches = Arc::default();
    let config = status_config("stdin:", &["cps_200", "cps_404"]);
    let collector: Arc<dyn InputCollector> = Arc::new(StdinCollector::with_reader(
        &b"GET /a status=200\nGET /b status=200\nGET /c status=404\nGET /d status=200\n"[..],
    ));
    wait_for_status(collector.as_ref(), CollectorStatus::Stopped).await;

    let scheduler = scheduler_for(Arc::clone(&collector), &config, &batches);
    let (report, dispatched) = scheduler.tick_and_dispatch().await.unwrap();

    assert_eq!(report.records, 4);
    assert_eq!(dispatched.metrics, 2);
    let batches = batches.lock().unwrap();
    assert_eq!(value_of(&batches[0], "status_cps_200"), Some("3.000"));
    assert_eq!(value_of(&batches[0], "status_cps_404"), Some("1.000"));
}

/// 레코드 하나가 여러 필터에 독립적으로 매칭됨
#[tokio::test]
async fn test_record_matches_multiple_filters() {
    let batches: Batches = Arc::default();
    let mut config = status_config("stdin:", &["cps_200"]);
    config.filters.push(FilterConfig {
        filter: "GET".to_owned(),
        prefix: "get".to_owned(),
        items: vec![FilterItem {
            field: "status".to_owned(),
            metrics: vec!["uniq".to_owned(), "percentage_200".to_owned()],
        }],
    });
    config.filters.push(FilterConfig {
        filter: r"^POST\s".to_owned(),
        prefix: "post".to_owned(),
        items: vec![FilterItem {
            field: "status".to_owned(),
            metrics: vec!["cps_200".to_owned()],
        }],
    });

    let collector: Arc<dyn InputCollector> = Arc::new(StdinCollector::with_reader(
        &b"GET /a status=200\nGET /b status=500\nPOST /c status=200\n"[..],
    ));
    wait_for_status(collector.as_ref(), CollectorStatus::Stopped).await;

    let scheduler = scheduler_for(Arc::clone(&collector), &config, &batches);
    let (report, dispatched) = scheduler.tick_and_dispatch().await.unwrap();
    assert_eq!(report.matched, 3);
    assert_eq!(dispatched.aggregators, 3);

    let batches = batches.lock().unwrap();
    let all: Vec<(String, String)> = batches.iter().flatten().cloned().collect();
    assert_eq!(value_of(&all, "status_cps_200"), Some("2.000"));
    assert_eq!(value_of(&all, "get_status_uniq"), Some("2"));
    assert_eq!(value_of(&all, "get_status_percentage_200"), Some("50.000"));
    assert_eq!(value_of(&all, "post_status_cps_200"), Some("1.000"));
}

/// TCP syslog: 애플리케이션이 일치하는 메시지의 본문만 집계됨
#[tokio::test]
async fn test_syslog_tcp_end_to_end() {
    let dsn = SyslogDsn::parse("syslog:tcp:127.0.0.1:0/nginx").unwrap();
    assert_eq!(dsn.protocol, SyslogProtocol::Tcp);
    let syslog = Arc::new(SyslogCollector::bind(dsn, &SyslogConfig::default()).await.unwrap());
    let addr = syslog.local_addr();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"<13>Oct 11 22:14:15 web1 nginx: GET / status=200\r\n\
              <13>Oct 11 22:14:15 web1 sshd: status=200\n\
              not a syslog line\n\
              <13>1 2024-01-15T12:00:00Z web1 nginx 1234 - [meta x=\"1\"] GET / status=404\n\
              <13>Oct 11 22:14:16 web1 nginx[42]: GET / status=200\n",
        )
        .await
        .unwrap();
    stream.shutdown().await.unwrap();
    drop(stream);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let batches: Batches = Arc::default();
    let config = status_config("stdin:", &["cps_200", "cps_404"]);
    let collector: Arc<dyn InputCollector> = syslog.clone();
    let scheduler = scheduler_for(collector, &config, &batches);
    let (report, _) = scheduler.tick_and_dispatch().await.unwrap();
    assert_eq!(report.records, 3);

    {
        let batches = batches.lock().unwrap();
        assert_eq!(value_of(&batches[0], "status_cps_200"), Some("2.000"));
        assert_eq!(value_of(&batches[0], "status_cps_404"), Some("1.000"));
    }

    syslog.close().await;
    assert_eq!(syslog.status(), CollectorStatus::Stopped);
}

/// UDP syslog: 데이터그램 하나가 메시지 하나
#[tokio::test]
async fn test_syslog_udp_end_to_end() {
    let dsn = SyslogDsn::parse("syslog:udp:127.0.0.1:0/app1").unwrap();
    let syslog = SyslogCollector::bind(dsn, &SyslogConfig::default()).await.unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    for payload in [
        &b"<14>Oct 11 22:14:15 host app1: status=200"[..],
        &b"<14>Oct 11 22:14:15 host app2: status=200"[..],
        &b"<14>Oct 11 22:14:15 host app1: status=503"[..],
    ] {
        client.send_to(payload, syslog.local_addr()).await.unwrap();
    }

    let mut drained = Vec::new();
    for _ in 0..100 {
        drained.extend_from_slice(&syslog.drain_and_reset());
        if drained.len() >= b"status=200\nstatus=503\n".len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(drained, b"status=200\nstatus=503\n");
    assert!(syslog.drain_and_reset().is_empty());

    syslog.close().await;
}

/// 2048 바이트를 넘는 UDP 데이터그램은 잘려서 처리됨
#[tokio::test]
async fn test_syslog_udp_oversized_datagram_truncated() {
    let dsn = SyslogDsn::parse("syslog:udp:127.0.0.1:0/app1").unwrap();
    let syslog = SyslogCollector::bind(dsn, &SyslogConfig::default()).await.unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let header = b"<14>Oct 11 22:14:15 host app1: ";
    let mut payload = header.to_vec();
    payload.extend(std::iter::repeat_n(b'a', 3000));
    client.send_to(&payload, syslog.local_addr()).await.unwrap();

    let mut drained = Vec::new();
    for _ in 0..100 {
        drained.extend_from_slice(&syslog.drain_and_reset());
        if !drained.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(drained.len(), 2048 - header.len() + 1);
    assert!(drained.ends_with(b"a\n"));

    syslog.close().await;
}

/// DSN 형식 검증
#[test]
fn test_input_dsn_shapes() {
    let dsn = SyslogDsn::parse("syslog:tcp:127.0.0.1:0/app1").unwrap();
    assert_eq!(dsn.protocol, SyslogProtocol::Tcp);
    assert_eq!(dsn.application, "app1");

    assert!(matches!(
        InputDsn::parse("syslog:foo:127.0.0.1:0/app1"),
        Err(LogPipelineError::UnsupportedProtocol(_))
    ));
    assert!(matches!(
        InputDsn::parse("not-a-dsn"),
        Err(LogPipelineError::InvalidDsn(_))
    ));
    assert_eq!(InputDsn::parse("stdin:-").unwrap(), InputDsn::Stdin);
}

/// 여러 생산자가 동시에 추가하는 동안 드레인해도 바이트가 유실/중복되지 않음
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_and_drain() {
    let (_writer, reader) = tokio::io::duplex(8);
    let collector: Arc<dyn InputCollector> = Arc::new(StdinCollector::with_reader(reader));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let collector = Arc::clone(&collector);
            tokio::spawn(async move {
                for _ in 0..500 {
                    collector.append_observed(b"status=200\n");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let mut total = 0;
    while producers.iter().any(|p| !p.is_finished()) {
        total += collector.drain_and_reset().len();
        tokio::task::yield_now().await;
    }
    for producer in producers {
        producer.await.unwrap();
    }
    total += collector.drain_and_reset().len();

    assert_eq!(total, 4 * 500 * b"status=200\n".len());
    collector.close().await;
}

/// 파일 입력으로 파이프라인 전체 생명주기 실행
#[tokio::test(flavor = "multi_thread")]
async fn test_file_pipeline_lifecycle() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let batches: Batches = Arc::default();
    let mut config = status_config(&format!("file:{}", file.path().display()), &["cps_200"]);
    config.tail.poll_interval_ms = 10;

    let mut pipeline = StatsPipelineBuilder::new()
        .config(config)
        .registry(capture_registry(&batches))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();
    assert!(pipeline.health_check().await.is_healthy());

    writeln!(file, "status=200").unwrap();
    writeln!(file, "status=200").unwrap();
    writeln!(file, "status=200").unwrap();
    file.flush().unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    pipeline.stop().await.unwrap();

    // 라인이 어느 주기에 들어갔든 주기별 cps 합은 전체 건수
    let total: f64 = batches
        .lock()
        .unwrap()
        .iter()
        .filter_map(|batch| value_of(batch, "status_cps_200"))
        .map(|v| v.parse::<f64>().unwrap())
        .sum();
    assert!((total - 3.0).abs() < 1e-9, "total cps {total}");
}
