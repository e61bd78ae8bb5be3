//! 주문 실행 시스템의 브로커 중립 도메인 타입.
//!
//! 이 crate는 다음을 제공합니다:
//! - 주문 요청/결과 타입 ([`OrderRequest`], [`OrderOutcome`])
//! - 브로커 추상화 trait ([`BrokerAdapter`])과 공통 에러 타입 ([`BrokerError`])
//! - 토큰 레코드 및 상태 리포트 ([`TokenRecord`], [`TokenStatusReport`])
//! - 설정 타입 ([`AppConfig`], [`AccountMap`])
//!
//! 브로커별 serde 타입은 `trader-broker` 내부에 유지되며,
//! 이 crate의 중립 타입으로 변환되어 전달됩니다.

pub mod config;
pub mod domain;

// 주요 타입 재내보내기
pub use config::{
    AccountMap, AppConfig, ConfigError, RobinhoodConfig, SchwabConfig, TokenPolicy, TradingConfig,
};
pub use domain::broker::{
    BrokerAdapter, BrokerError, BrokerOrderStatus, OrderStatusSnapshot, Session,
};
pub use domain::order::{Brokerage, OrderRequest, OrderType, Side, TradingSession};
pub use domain::outcome::{OrderOutcome, OutcomeStatus};
pub use domain::token::{TokenPhase, TokenRecord, TokenStatusReport};
