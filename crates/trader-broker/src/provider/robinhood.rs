//! Robinhood [`BrokerAdapter`] 구현.
//!
//! 세션의 `account_id`는 Robinhood 계좌번호입니다. 재인증은 설정의
//! 아이디/비밀번호(필요 시 MFA 코드)로 수행합니다.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use tracing::info;

use trader_core::{
    BrokerAdapter, BrokerError, Brokerage, OrderRequest, OrderStatusSnapshot, RobinhoodConfig,
    Session, TokenRecord,
};

use crate::connector::robinhood::RobinhoodClient;

pub struct RobinhoodAdapter {
    client: RobinhoodClient,
}

impl RobinhoodAdapter {
    pub fn new(config: &RobinhoodConfig) -> Self {
        Self {
            client: RobinhoodClient::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
                config.mfa_code.clone(),
                config.default_time_in_force.clone(),
                config.base_url.clone(),
            ),
        }
    }
}

#[async_trait]
impl BrokerAdapter for RobinhoodAdapter {
    fn broker_name(&self) -> &str {
        "robinhood"
    }

    fn brokerage(&self) -> Brokerage {
        Brokerage::Robinhood
    }

    async fn authenticate(&self) -> Result<TokenRecord, BrokerError> {
        info!("Robinhood 로그인 수행");
        let response = self.client.login().await?;
        Ok(TokenRecord::new(
            response.access_token,
            response.refresh_token,
        ))
    }

    async fn refresh(&self, current: &TokenRecord) -> Result<TokenRecord, BrokerError> {
        let response = self
            .client
            .refresh(current.refresh_token.expose_secret())
            .await?;
        Ok(TokenRecord::new(
            response.access_token,
            response.refresh_token,
        ))
    }

    async fn submit_order(
        &self,
        session: &Session,
        order: &OrderRequest,
    ) -> Result<String, BrokerError> {
        self.client
            .place_order(
                session.token.access_token.expose_secret(),
                &session.account_id,
                order,
            )
            .await
    }

    async fn order_status(
        &self,
        session: &Session,
        order_id: &str,
    ) -> Result<OrderStatusSnapshot, BrokerError> {
        self.client
            .order_status(session.token.access_token.expose_secret(), order_id)
            .await
    }

    async fn cancel_order(&self, session: &Session, order_id: &str) -> Result<bool, BrokerError> {
        self.client
            .cancel_order(session.token.access_token.expose_secret(), order_id)
            .await
    }

    async fn quote(&self, session: &Session, ticker: &str) -> Result<Decimal, BrokerError> {
        self.client
            .quote(session.token.access_token.expose_secret(), ticker)
            .await
    }

    async fn account_balance(&self, session: &Session) -> Result<Decimal, BrokerError> {
        self.client
            .account_balance(
                session.token.access_token.expose_secret(),
                &session.account_id,
            )
            .await
    }
}
