//! 메트릭 상수 및 설명 등록
//!
//! logstat 자체의 운영 메트릭 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 아무 동작도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logstat_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 입력 소스 레이블 키 (file, stdin, syslog)
pub const LABEL_INPUT: &str = "input";

/// 출력 유형 레이블 키 (console, zabbix)
pub const LABEL_OUTPUT: &str = "output";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 수집 메트릭 ────────────────────────────────────────────────────

/// 수집기 버퍼에 추가된 바이트 수 (counter)
pub const INPUT_BYTES_APPENDED_TOTAL: &str = "logstat_input_bytes_appended_total";

/// 스케줄러가 드레인한 바이트 수 (counter)
pub const INPUT_BYTES_DRAINED_TOTAL: &str = "logstat_input_bytes_drained_total";

/// 형식 불일치 또는 애플리케이션 불일치로 버려진 syslog 메시지 수 (counter)
pub const SYSLOG_MESSAGES_DROPPED_TOTAL: &str = "logstat_syslog_messages_dropped_total";

// ─── 처리 메트릭 ────────────────────────────────────────────────────

/// 레코드로 파싱된 라인 수 (counter)
pub const RECORDS_PARSED_TOTAL: &str = "logstat_records_parsed_total";

/// 추출 정규식과 맞지 않아 건너뛴 라인 수 (counter)
pub const RECORDS_SKIPPED_TOTAL: &str = "logstat_records_skipped_total";

/// 완료된 틱 수 (counter)
pub const TICKS_TOTAL: &str = "logstat_ticks_total";

/// 드레인부터 집계까지 걸린 시간 (histogram, 초)
pub const TICK_DURATION_SECONDS: &str = "logstat_tick_duration_seconds";

// ─── 출력 메트릭 ────────────────────────────────────────────────────

/// 출력 싱크로 전달된 메트릭 메시지 수 (counter)
pub const METRICS_DISPATCHED_TOTAL: &str = "logstat_metrics_dispatched_total";

/// 출력 싱크 전송 결과 (counter, labels: output, result)
pub const OUTPUT_SENDS_TOTAL: &str = "logstat_output_sends_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        INPUT_BYTES_APPENDED_TOTAL,
        "Total bytes appended to the input buffer by collectors"
    );
    describe_counter!(
        INPUT_BYTES_DRAINED_TOTAL,
        "Total bytes drained from the input buffer by the scheduler"
    );
    describe_counter!(
        SYSLOG_MESSAGES_DROPPED_TOTAL,
        "Syslog messages dropped because of unknown format or application mismatch"
    );
    describe_counter!(
        RECORDS_PARSED_TOTAL,
        "Lines successfully parsed into records"
    );
    describe_counter!(
        RECORDS_SKIPPED_TOTAL,
        "Lines skipped because the extraction pattern did not match"
    );
    describe_counter!(TICKS_TOTAL, "Completed scheduler ticks");
    describe_histogram!(
        TICK_DURATION_SECONDS,
        "Time from buffer drain to end of aggregation in seconds"
    );
    describe_counter!(
        METRICS_DISPATCHED_TOTAL,
        "Metric messages handed to output sinks"
    );
    describe_counter!(OUTPUT_SENDS_TOTAL, "Output batch sends by result");
}
