//! 주문 사전 리스크 검증.
//!
//! 순수 함수로만 구성되며 I/O가 없습니다. 같은 입력에 같은 결과를
//! 보장하므로 모의 실행에서도 실거래와 동일한 판정 경로를 탑니다.

use rust_decimal::Decimal;
use thiserror::Error;

use trader_core::{OrderRequest, OrderType, TradingSession};

// =============================================================================
// 위반 유형
// =============================================================================

/// 리스크 검증 위반. 첫 위반에서 즉시 중단합니다.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskViolation {
    #[error("잘못된 주문: {0}")]
    MalformedOrder(String),

    #[error("주문 금액 한도 초과: {value} > {limit}")]
    OrderValueExceeded { value: Decimal, limit: Decimal },

    #[error("지원하지 않는 세션: {session}")]
    SessionUnsupported { session: TradingSession },
}

// =============================================================================
// 리스크 설정
// =============================================================================

/// 브로커 하나에 적용되는 리스크 한도.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// 주문 1건당 명목 금액 상한
    pub max_order_value: Decimal,
    /// 해당 브로커가 라우팅 가능한 거래 세션
    pub supported_sessions: Vec<TradingSession>,
}

// =============================================================================
// 검증
// =============================================================================

/// 주문 검증. 순서대로 검사하고 첫 위반에서 반환합니다.
///
/// `quote`는 시장가 주문의 금액 추정에 쓰이는 현재가입니다. 호출자가
/// 시세를 조회하지 않은 경우(None) 시장가 주문의 금액 검사는 건너뛰고,
/// 지정가 주문은 항상 `limit_price`로 검사합니다.
pub fn validate(
    order: &OrderRequest,
    config: &RiskConfig,
    quote: Option<Decimal>,
) -> Result<(), RiskViolation> {
    // 1. 수량
    if order.quantity == 0 {
        return Err(RiskViolation::MalformedOrder(
            "수량은 1 이상이어야 함".to_string(),
        ));
    }

    // 2. 가격 정합성
    let estimate_price = match order.order_type {
        OrderType::Limit => match order.limit_price {
            Some(price) if price > Decimal::ZERO => Some(price),
            Some(_) => {
                return Err(RiskViolation::MalformedOrder(
                    "지정가는 0보다 커야 함".to_string(),
                ))
            }
            None => {
                return Err(RiskViolation::MalformedOrder(
                    "지정가 주문에 가격 없음".to_string(),
                ))
            }
        },
        // 시장가는 limit_price를 무시하고 시세 추정치만 사용
        OrderType::Market => quote,
    };

    // 3. 주문 금액 한도
    if let Some(price) = estimate_price {
        let value = price * Decimal::from(order.quantity);
        if value > config.max_order_value {
            return Err(RiskViolation::OrderValueExceeded {
                value,
                limit: config.max_order_value,
            });
        }
    }

    // 4. 세션 호환성
    if !config.supported_sessions.contains(&order.session) {
        return Err(RiskViolation::SessionUnsupported {
            session: order.session,
        });
    }

    Ok(())
}

// =============================================================================
// 테스트
// =============================================================================
