//! 브로커 연동 계층.
//!
//! - `connector`: 브로커별 HTTP 클라이언트 (Schwab, Robinhood)
//! - `provider`: [`trader_core::BrokerAdapter`] 구현체
//! - `auth`: 토큰 저장소와 자격증명 수명 관리자
//!
//! 실행 엔진은 `provider`의 어댑터와 `auth`의 수명 관리자만 사용하며,
//! `connector`의 와이어 타입은 이 crate 밖으로 나가지 않습니다.

pub mod auth;
pub mod connector;
pub mod provider;

pub use auth::lifecycle::CredentialLifecycle;
pub use auth::store::{FileTokenStore, TokenStore};
pub use provider::robinhood::RobinhoodAdapter;
pub use provider::schwab::SchwabAdapter;
