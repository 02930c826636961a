//! 동기화 통계 구조체.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 피드 동기화 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    /// 처리 대상 수 (전체 피드는 1, 엔티티별 피드는 엔티티 수)
    pub total: usize,
    /// 데이터를 저장한 대상 수
    pub synced: usize,
    /// 건너뛴 대상 수 (이미 최신 상태)
    pub skipped: usize,
    /// 데이터 없음으로 건너뛴 수집 구간 수
    pub empty: usize,
    /// 수집 구간 수
    pub units: usize,
    /// 저장된 총 행 수
    pub rows: u64,
    /// 수정주가 변경으로 전체 재수집한 대상 수
    pub revised: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 다른 통계 합산 (소요 시간 제외).
    pub fn merge(&mut self, other: &SyncStats) {
        self.total += other.total;
        self.synced += other.synced;
        self.skipped += other.skipped;
        self.empty += other.empty;
        self.units += other.units;
        self.rows += other.rows;
        self.revised += other.revised;
    }

    /// 최신화 비율 계산 (%)
    ///
    /// 이미 최신이던 대상도 최신화된 것으로 봅니다.
    pub fn up_to_date_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            ((self.synced + self.skipped) as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            synced = self.synced,
            skipped = self.skipped,
            empty = self.empty,
            units = self.units,
            rows = self.rows,
            revised = self.revised,
            up_to_date = format!("{:.1}%", self.up_to_date_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 완료"
        );
    }
}
