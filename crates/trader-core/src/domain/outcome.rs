//! 주문 실행 결과 타입.
//!
//! [`OrderOutcome`]은 실행 엔진이 생성하여 실행 원장(Ledger)에 한 번
//! 추가된 뒤 절대 수정되지 않습니다. 정정이 필요하면 원본을 참조하는
//! 새 레코드를 추가합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::order::OrderRequest;

// =============================================================================
// 결과 상태
// =============================================================================

/// 주문의 최종 상태.
///
/// 모든 [`OrderRequest`]는 정확히 하나의 최종 상태로 귀결됩니다.
/// 제출된 주문의 생사를 확인할 수 없는 경우에도 조용히 버리지 않고
/// `Error`로 기록하여 수동 확인 대상으로 남깁니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// 전량 체결
    Filled,
    /// 부분 체결
    PartiallyFilled,
    /// 취소됨 (배치 중단 포함)
    Cancelled,
    /// Risk Gate 또는 브로커 측 거부
    Rejected,
    /// 타임아웃 후 취소 성공
    TimedOut,
    /// 실행 실패 (상세는 error_detail 참조)
    Error,
}

impl OutcomeStatus {
    /// 성공으로 집계되는 상태 여부.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Filled | Self::PartiallyFilled)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Filled => "filled",
            Self::PartiallyFilled => "partially_filled",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
            Self::TimedOut => "timed_out",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// 주문 결과
// =============================================================================

/// 주문 하나의 최종 실행 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderOutcome {
    /// 원본 주문 요청
    pub request: OrderRequest,
    /// 최종 상태
    pub status: OutcomeStatus,
    /// 브로커 주문번호 (제출 전 실패 시 None)
    pub broker_order_id: Option<String>,
    /// 체결 수량
    pub filled_quantity: u32,
    /// 체결 평균가
    pub filled_price: Option<Decimal>,
    /// 처리 시작 시각
    pub submitted_at: DateTime<Utc>,
    /// 최종 상태 확정 시각
    pub resolved_at: DateTime<Utc>,
    /// 실패/거부 상세 메시지
    pub error_detail: Option<String>,
}

impl OrderOutcome {
    /// 네트워크 호출 없이 확정된 결과 생성 (거부, 설정 오류 등).
    pub fn resolved_locally(
        request: OrderRequest,
        status: OutcomeStatus,
        submitted_at: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            request,
            status,
            broker_order_id: None,
            filled_quantity: 0,
            filled_price: None,
            submitted_at,
            resolved_at: Utc::now(),
            error_detail: Some(detail.into()),
        }
    }
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Brokerage, OrderType, Side, TradingSession};

    fn sample_request() -> OrderRequest {
        OrderRequest {
            brokerage: Brokerage::Robinhood,
            ticker: "NVDA".to_string(),
            side: Side::Sell,
            order_type: OrderType::Market,
            quantity: 2,
            limit_price: None,
            session: TradingSession::Extended,
        }
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&OutcomeStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
        let parsed: OutcomeStatus = serde_json::from_str("\"partially_filled\"").unwrap();
        assert_eq!(parsed, OutcomeStatus::PartiallyFilled);
    }

    #[test]
    fn test_resolved_locally_has_no_order_id() {
        let outcome = OrderOutcome::resolved_locally(
            sample_request(),
            OutcomeStatus::Rejected,
            Utc::now(),
            "주문 금액 한도 초과",
        );
        assert_eq!(outcome.status, OutcomeStatus::Rejected);
        assert!(outcome.broker_order_id.is_none());
        assert_eq!(outcome.filled_quantity, 0);
        assert!(outcome.error_detail.is_some());
    }

    #[test]
    fn test_success_statuses() {
        assert!(OutcomeStatus::Filled.is_success());
        assert!(OutcomeStatus::PartiallyFilled.is_success());
        assert!(!OutcomeStatus::TimedOut.is_success());
        assert!(!OutcomeStatus::Error.is_success());
    }
}
