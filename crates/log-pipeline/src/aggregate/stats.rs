//! 숫자 시리즈 통계 함수
//!
//! 모든 함수는 빈 시리즈에 대해 0.0을 반환합니다.
//! `min`, `max`, `percentile`은 오름차순 정렬된 입력을 요구합니다.

/// 합계
pub fn sum(series: &[f64]) -> f64 {
    series.iter().sum()
}

/// 산술 평균
pub fn mean(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = series.len() as f64;
    sum(series) / len
}

/// 최솟값 (정렬된 입력)
pub fn min(sorted: &[f64]) -> f64 {
    sorted.first().copied().unwrap_or(0.0)
}

/// 최댓값 (정렬된 입력)
pub fn max(sorted: &[f64]) -> f64 {
    sorted.last().copied().unwrap_or(0.0)
}

/// p 백분위수 (정렬된 입력, 0 <= p <= 100)
///
/// 순위 `p/100 * (n-1)`을 감싸는 두 값 사이를 선형 보간합니다.
/// `p = 0`이면 최솟값, `p = 100`이면 최댓값입니다.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// 오름차순으로 정렬된 복사본을 만듭니다.
pub fn sorted_copy(series: &[f64]) -> Vec<f64> {
    let mut sorted = series.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    sorted
}
