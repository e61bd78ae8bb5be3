//! 배치 주문 실행.
//!
//! 이 crate는 다음을 제공합니다:
//! - 주문 배치를 계좌별로 직렬, 계좌 간 병렬로 처리하는 실행 엔진
//! - 모든 주문의 최종 결과를 추가 전용으로 기록하는 실행 원장
//!
//! 엔진은 브로커를 [`trader_core::BrokerAdapter`]로만 바라보며, 모든
//! 주문 요청은 어떤 경로를 타든 정확히 하나의 결과로 원장에 남습니다.

pub mod engine;
pub mod ledger;

// 주요 타입 재내보내기
pub use engine::{BrokerHandle, ExecutionEngine, ExecutionSettings};
pub use ledger::{ExecutionLedger, ExecutionSummary, LedgerError};
