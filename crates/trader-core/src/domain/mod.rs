//! 도메인 타입 모듈.

pub mod broker;
pub mod order;
pub mod outcome;
pub mod token;

pub use broker::{BrokerAdapter, BrokerError, BrokerOrderStatus, OrderStatusSnapshot, Session};
pub use order::{Brokerage, OrderRequest, OrderType, Side, TradingSession};
pub use outcome::{OrderOutcome, OutcomeStatus};
pub use token::{TokenPhase, TokenRecord, TokenStatusReport};
