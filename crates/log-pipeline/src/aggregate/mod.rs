//! 집계 모듈 -- 필터별 통계 누적과 주기 디스패치
//!
//! - [`Aggregator`]: 필터 하나의 주기 상태 누적 및 메트릭 계산
//! - [`AggregatorSet`]: 레코드를 모든 매칭 집계기에 전달, 주기 끝 디스패치
//! - [`stats`]: 정렬된 시리즈에 대한 통계 함수
//!
//! # 메트릭 분류
//! | 메트릭 | 필드 | 계산 |
//! |---|---|---|
//! | `min`, `max`, `avg`, `sum`, `len` | aggregate | 시리즈 통계 |
//! | `sum_ps`, `ips` | aggregate | `sum / 주기`, `len / 주기` |
//! | `cent_<p>` | aggregate | 선형 보간 백분위수 |
//! | `uniq`, `uniq_ps` | count | 고유 값 개수, `/ 주기` |
//! | `cps_<v>` | count | `count[v] / 주기` |
//! | `percentage_<v>` | count | `100 * count[v] / total` |

pub mod aggregator;
pub mod set;
pub mod stats;

pub use aggregator::{Aggregator, AggregatorDispatch, DispatchReport, FieldSets, PeriodState};
pub use set::{AggregatorSet, PeriodBatch};
