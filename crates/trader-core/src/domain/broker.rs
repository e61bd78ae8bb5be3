//! 브로커 어댑터 추상화.
//!
//! 실행 엔진은 이 트레이트만 바라보고, Schwab/Robinhood 구현체는
//! trader-broker 크레이트에 있습니다. 새 브로커 추가 시 이 트레이트만
//! 구현하면 됩니다.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

use super::order::{Brokerage, OrderRequest};
use super::token::TokenRecord;

// =============================================================================
// 에러 타입
// =============================================================================

/// 브로커 계층 에러.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("네트워크 오류: {0}")]
    Network(#[from] reqwest::Error),

    #[error("인증 실패: {0}")]
    Authentication(String),

    #[error("API 오류 ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("응답 파싱 실패: {0}")]
    Parse(String),

    #[error("요청 한도 초과, 잠시 후 재시도하세요")]
    RateLimit,

    #[error("토큰 저장소 오류: {0}")]
    TokenStore(String),

    #[error("지원하지 않는 기능: {0}")]
    Unsupported(String),

    #[error("설정 오류: {0}")]
    Config(String),
}

impl BrokerError {
    /// 재인증으로 복구 가능한 인증 계열 오류 여부.
    ///
    /// 실행 엔진은 이 판정이 참일 때만 재인증 후 정확히 한 번 재시도하고,
    /// 그 외의 오류는 그대로 실패 처리합니다.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Authentication(_) => true,
            Self::Api { status, message } => {
                if matches!(status, 401 | 403) {
                    return true;
                }
                let lower = message.to_lowercase();
                ["unauthorized", "invalid_grant", "token_expired", "invalid token"]
                    .iter()
                    .any(|kw| lower.contains(kw))
            }
            _ => false,
        }
    }
}

// =============================================================================
// 세션 / 주문 상태
// =============================================================================

/// 인증 완료된 계좌 세션. 실행 중 자유롭게 복제됩니다.
#[derive(Debug, Clone)]
pub struct Session {
    /// 브로커 측 계좌 식별자 (Schwab은 해시, Robinhood는 계좌번호)
    pub account_id: String,
    /// 유효한 토큰
    pub token: Arc<TokenRecord>,
}

/// 브로커가 보고하는 주문 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerOrderStatus {
    /// 접수됨, 체결 대기
    Working,
    Filled,
    PartiallyFilled,
    Cancelled,
    Rejected,
    Expired,
}

impl BrokerOrderStatus {
    /// 더 이상 변하지 않는 최종 상태 여부.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Working)
    }
}

/// 주문 상태 조회 결과.
#[derive(Debug, Clone)]
pub struct OrderStatusSnapshot {
    pub status: BrokerOrderStatus,
    pub filled_quantity: u32,
    pub filled_price: Option<Decimal>,
}

// =============================================================================
// 브로커 어댑터 트레이트
// =============================================================================

/// 브로커별 세션 어댑터.
///
/// 인증 계열(`authenticate`/`refresh`)과 거래 계열로 나뉘며, 거래 계열은
/// 모두 유효한 [`Session`]을 요구합니다. 토큰 수명 관리는 이 트레이트
/// 바깥(CredentialLifecycle)의 책임입니다.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// 로그용 브로커 이름.
    fn broker_name(&self) -> &str;

    /// 담당 브로커.
    fn brokerage(&self) -> Brokerage;

    /// 설정된 부트스트랩 자격증명으로 전체 재인증.
    async fn authenticate(&self) -> Result<TokenRecord, BrokerError>;

    /// 리프레시 토큰으로 액세스 토큰 갱신.
    async fn refresh(&self, current: &TokenRecord) -> Result<TokenRecord, BrokerError>;

    /// 주문 제출, 브로커 주문번호 반환.
    async fn submit_order(
        &self,
        session: &Session,
        order: &OrderRequest,
    ) -> Result<String, BrokerError>;

    /// 주문 상태 조회.
    async fn order_status(
        &self,
        session: &Session,
        order_id: &str,
    ) -> Result<OrderStatusSnapshot, BrokerError>;

    /// 미체결 주문 취소. 이미 최종 상태면 false.
    async fn cancel_order(&self, session: &Session, order_id: &str) -> Result<bool, BrokerError>;

    /// 현재가 조회.
    async fn quote(&self, session: &Session, ticker: &str) -> Result<Decimal, BrokerError>;

    /// 예수금(매수 가능 금액) 조회.
    async fn account_balance(&self, session: &Session) -> Result<Decimal, BrokerError>;
}

// =============================================================================
// 테스트
// =============================================================================
