//! Schwab [`BrokerAdapter`] 구현.
//!
//! 세션의 `account_id`는 Schwab 계좌 해시입니다. 재인증은 최초 동의
//! 플로우에서 확보한 부트스트랩 리프레시 토큰으로 수행합니다.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use tracing::info;

use trader_core::{
    BrokerAdapter, BrokerError, Brokerage, OrderRequest, OrderStatusSnapshot, SchwabConfig,
    Session, TokenRecord,
};

use crate::connector::schwab::SchwabClient;

pub struct SchwabAdapter {
    client: SchwabClient,
}

impl SchwabAdapter {
    pub fn new(config: &SchwabConfig) -> Self {
        Self {
            client: SchwabClient::new(
                config.app_key.clone(),
                config.app_secret.expose_secret().to_string(),
                config.bootstrap_refresh_token.expose_secret().to_string(),
                config.base_url.clone(),
            ),
        }
    }

    /// 계좌번호 → 계좌 해시 목록 실시간 조회 (CLI `accounts --live`).
    pub async fn account_numbers(
        &self,
        session: &Session,
    ) -> Result<Vec<(String, String)>, BrokerError> {
        let entries = self
            .client
            .account_numbers(session.token.access_token.expose_secret())
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| (e.account_number, e.hash_value))
            .collect())
    }
}

#[async_trait]
impl BrokerAdapter for SchwabAdapter {
    fn broker_name(&self) -> &str {
        "schwab"
    }

    fn brokerage(&self) -> Brokerage {
        Brokerage::Schwab
    }

    async fn authenticate(&self) -> Result<TokenRecord, BrokerError> {
        info!("Schwab 재인증 수행");
        let response = self.client.authenticate().await?;
        let refresh = response
            .refresh_token
            .unwrap_or_default();
        Ok(TokenRecord::new(response.access_token, refresh))
    }

    async fn refresh(&self, current: &TokenRecord) -> Result<TokenRecord, BrokerError> {
        let response = self
            .client
            .refresh(current.refresh_token.expose_secret())
            .await?;
        // 새 리프레시 토큰이 안 내려오면 기존 것을 유지
        let refresh = response
            .refresh_token
            .unwrap_or_else(|| current.refresh_token.expose_secret().to_string());
        Ok(TokenRecord::new(response.access_token, refresh))
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
            .order_status(
                session.token.access_token.expose_secret(),
                &session.account_id,
                order_id,
            )
            .await
    }

    async fn cancel_order(&self, session: &Session, order_id: &str) -> Result<bool, BrokerError> {
        self.client
            .cancel_order(
                session.token.access_token.expose_secret(),
                &session.account_id,
                order_id,
            )
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
