//! 실행 원장.
//!
//! 주문 결과를 JSONL 파일에 한 줄씩 추가 기록하고, 배치 종료 시 결과
//! 스냅샷 JSON과 요약 집계를 제공합니다. 기록된 항목은 절대 수정하지
//! 않습니다.

use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use trader_core::{OrderOutcome, OutcomeStatus};

// =============================================================================
// 에러
// =============================================================================

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("원장 파일 쓰기 실패 ({path}): {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("결과 직렬화 실패: {0}")]
    Serialize(#[from] serde_json::Error),
}

// =============================================================================
// 요약
// =============================================================================

/// 배치 실행 요약 집계.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub filled: usize,
    pub partially_filled: usize,
    pub cancelled: usize,
    pub rejected: usize,
    pub timed_out: usize,
    pub errors: usize,
}

impl ExecutionSummary {
    fn count(&mut self, status: OutcomeStatus) {
        self.total += 1;
        match status {
            OutcomeStatus::Filled => self.filled += 1,
            OutcomeStatus::PartiallyFilled => self.partially_filled += 1,
            OutcomeStatus::Cancelled => self.cancelled += 1,
            OutcomeStatus::Rejected => self.rejected += 1,
            OutcomeStatus::TimedOut => self.timed_out += 1,
            OutcomeStatus::Error => self.errors += 1,
        }
    }
}

// =============================================================================
// 원장
// =============================================================================

/// 추가 전용 실행 원장.
pub struct ExecutionLedger {
    path: PathBuf,
    entries: Vec<OrderOutcome>,
}

impl ExecutionLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    fn io_error(path: &Path, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// 결과 한 건을 파일과 메모리에 추가.
    pub fn append(&mut self, outcome: OrderOutcome) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Self::io_error(&self.path, e))?;
            }
        }
        let line = serde_json::to_string(&outcome)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Self::io_error(&self.path, e))?;
        writeln!(file, "{}", line).map_err(|e| Self::io_error(&self.path, e))?;
        self.entries.push(outcome);
        Ok(())
    }

    /// 이번 배치에서 기록된 결과들.
    pub fn entries(&self) -> &[OrderOutcome] {
        &self.entries
    }

    /// 상태별 집계.
    pub fn summary(&self) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();
        for entry in &self.entries {
            summary.count(entry.status);
        }
        summary
    }

    /// 배치 결과 스냅샷을 타임스탬프 파일로 저장, 경로 반환.
    pub fn save_results(&self, dir: &Path) -> Result<PathBuf, LedgerError> {
        std::fs::create_dir_all(dir).map_err(|e| Self::io_error(dir, e))?;
        let filename = format!("results_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(filename);

        #[derive(Serialize)]
        struct ResultsFile<'a> {
            generated_at: chrono::DateTime<Utc>,
            summary: ExecutionSummary,
            outcomes: &'a [OrderOutcome],
        }

        let body = serde_json::to_string_pretty(&ResultsFile {
            generated_at: Utc::now(),
            summary: self.summary(),
            outcomes: &self.entries,
        })?;
        std::fs::write(&path, body).map_err(|e| Self::io_error(&path, e))?;
        info!(path = %path.display(), count = self.entries.len(), "실행 결과 저장");
        Ok(path)
    }
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use trader_core::{Brokerage, OrderRequest, OrderType, Side, TradingSession};

    fn outcome(status: OutcomeStatus) -> OrderOutcome {
        let request = OrderRequest {
            brokerage: Brokerage::Schwab,
            ticker: "AAPL".to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            quantity: 1,
            limit_price: None,
            session: TradingSession::Normal,
        };
        OrderOutcome::resolved_locally(request, status, Utc::now(), "test")
    }

    #[test]
    fn test_append_writes_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let mut ledger = ExecutionLedger::new(&path);

        ledger.append(outcome(OutcomeStatus::Rejected)).unwrap();
        ledger.append(outcome(OutcomeStatus::Filled)).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["status"], "rejected");
        assert_eq!(first["request"]["ticker"], "AAPL");
    }

    #[test]
    fn test_append_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let mut first = ExecutionLedger::new(&path);
        first.append(outcome(OutcomeStatus::Filled)).unwrap();
        drop(first);

        let mut second = ExecutionLedger::new(&path);
        second.append(outcome(OutcomeStatus::Error)).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_summary_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ExecutionLedger::new(dir.path().join("l.jsonl"));
        ledger.append(outcome(OutcomeStatus::Filled)).unwrap();
        ledger.append(outcome(OutcomeStatus::Filled)).unwrap();
        ledger.append(outcome(OutcomeStatus::TimedOut)).unwrap();

        let summary = ledger.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.filled, 2);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.errors, 0);
    }

    #[test]
    fn test_save_results_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ExecutionLedger::new(dir.path().join("l.jsonl"));
        ledger.append(outcome(OutcomeStatus::Filled)).unwrap();

        let path = ledger.save_results(dir.path()).unwrap();
        let body: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(body["summary"]["total"], 1);
        assert_eq!(body["outcomes"].as_array().unwrap().len(), 1);
    }
}
