//! Robinhood 비공식 API 클라이언트.
//!
//! 비밀번호 그랜트 로그인과 주문·시세·계좌 REST 호출을 담당합니다.
//! 응답의 수치 필드는 문자열로 내려오므로 Decimal로 직접 파싱합니다.

use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::debug;

use trader_core::{
    BrokerError, BrokerOrderStatus, OrderRequest, OrderStatusSnapshot, OrderType, Side,
    TradingSession,
};

const DEFAULT_BASE_URL: &str = "https://api.robinhood.com";
/// Robinhood 공개 웹 클라이언트 ID
const CLIENT_ID: &str = "c82SH0WZOsabOXGP2sxqcj34FxkvfnWRZBKlBjFS";

// ============================================================================
// 설정
// ============================================================================

#[derive(Clone)]
pub struct RobinhoodClientConfig {
    pub username: String,
    pub password: String,
    pub mfa_code: Option<String>,
    /// 지정가 주문 기본 유효 기간 (gfd/gtc)
    pub time_in_force: String,
    pub base_url: String,
}

impl std::fmt::Debug for RobinhoodClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobinhoodClientConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .field("mfa_code", &"***")
            .field("time_in_force", &self.time_in_force)
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ============================================================================
// 응답 타입
// ============================================================================

#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Deserialize, Debug)]
struct Paginated<T> {
    results: Vec<T>,
}

#[derive(Deserialize, Debug)]
struct AccountEntry {
    account_number: String,
    url: String,
}

#[derive(Deserialize, Debug)]
struct InstrumentEntry {
    url: String,
}

#[derive(Deserialize, Debug)]
struct OrderEntry {
    id: String,
    state: String,
    #[serde(default)]
    cumulative_quantity: Option<String>,
    #[serde(default)]
    average_price: Option<String>,
}

// ============================================================================
// 클라이언트
// ============================================================================

pub struct RobinhoodClient {
    client: Client,
    config: RobinhoodClientConfig,
}

impl RobinhoodClient {
    pub fn new(
        username: String,
        password: String,
        mfa_code: Option<String>,
        time_in_force: String,
        base_url: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            config: RobinhoodClientConfig {
                username,
                password,
                mfa_code,
                time_in_force,
                base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            },
        }
    }

    /// 주문에 적용할 유효 기간 결정. Robinhood는 gfd/gtc만 받으며
    /// 시장가 주문은 gtc를 거부하므로 항상 gfd로 제출합니다.
    fn resolve_time_in_force(&self, order_type: OrderType) -> &'static str {
        let tif = match self.config.time_in_force.to_lowercase().as_str() {
            "gtc" | "good_till_cancel" | "good_till_cancelled" | "good_till_canceled" => "gtc",
            _ => "gfd",
        };
        if order_type == OrderType::Market {
            "gfd"
        } else {
            tif
        }
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, BrokerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %message, "Robinhood API 오류 응답");
        match status.as_u16() {
            401 | 403 => Err(BrokerError::Authentication(format!(
                "Robinhood 인증 거부 ({}): {}",
                status, message
            ))),
            429 => Err(BrokerError::RateLimit),
            code => Err(BrokerError::Api {
                status: code,
                message,
            }),
        }
    }

    /// 비밀번호 그랜트 로그인.
    pub async fn login(&self) -> Result<TokenResponse, BrokerError> {
        let url = format!("{}/oauth2/token/", self.config.base_url);
        let mut body = json!({
            "grant_type": "password",
            "client_id": CLIENT_ID,
            "scope": "internal",
            "username": self.config.username,
            "password": self.config.password,
        });
        if let Some(mfa) = &self.config.mfa_code {
            body["mfa_code"] = json!(mfa);
        }

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BrokerError::Authentication(format!(
                "Robinhood 로그인 실패 ({}): {}",
                status, text
            )));
        }
        serde_json::from_str(&text)
            .map_err(|e| BrokerError::Parse(format!("Robinhood 토큰 응답 파싱 실패: {}", e)))
    }

    /// 리프레시 토큰으로 갱신.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, BrokerError> {
        let url = format!("{}/oauth2/token/", self.config.base_url);
        let body = json!({
            "grant_type": "refresh_token",
            "client_id": CLIENT_ID,
            "refresh_token": refresh_token,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BrokerError::Authentication(format!(
                "Robinhood 토큰 갱신 실패 ({}): {}",
                status, text
            )));
        }
        serde_json::from_str(&text)
            .map_err(|e| BrokerError::Parse(format!("Robinhood 토큰 응답 파싱 실패: {}", e)))
    }

    async fn account_url(
        &self,
        access_token: &str,
        account_number: &str,
    ) -> Result<String, BrokerError> {
        let url = format!("{}/accounts/", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = self.check(response).await?;
        let page: Paginated<AccountEntry> = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("계좌 목록 파싱 실패: {}", e)))?;
        page.results
            .into_iter()
            .find(|a| a.account_number == account_number)
            .map(|a| a.url)
            .ok_or_else(|| {
                BrokerError::Config(format!("Robinhood 계좌 {} 없음", account_number))
            })
    }

    async fn instrument_url(
        &self,
        access_token: &str,
        ticker: &str,
    ) -> Result<String, BrokerError> {
        let url = format!("{}/instruments/?symbol={}", self.config.base_url, ticker);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = self.check(response).await?;
        let page: Paginated<InstrumentEntry> = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("종목 조회 파싱 실패: {}", e)))?;
        page.results
            .into_iter()
            .next()
            .map(|i| i.url)
            .ok_or_else(|| BrokerError::Parse(format!("종목 {} 조회 결과 없음", ticker)))
    }

    /// 주문 제출, 주문 ID 반환.
    pub async fn place_order(
        &self,
        access_token: &str,
        account_number: &str,
        order: &OrderRequest,
    ) -> Result<String, BrokerError> {
        let account_url = self.account_url(access_token, account_number).await?;
        let instrument_url = self.instrument_url(access_token, &order.ticker).await?;

        let market_hours = match order.session {
            TradingSession::Normal => "regular_hours",
            TradingSession::Extended => "extended_hours",
            TradingSession::TwentyFourHour => "all_day_hours",
        };
        let mut body = json!({
            "account": account_url,
            "instrument": instrument_url,
            "symbol": order.ticker,
            "side": match order.side {
                Side::Buy => "buy",
                Side::Sell => "sell",
            },
            "type": match order.order_type {
                OrderType::Market => "market",
                OrderType::Limit => "limit",
            },
            "time_in_force": self.resolve_time_in_force(order.order_type),
            "trigger": "immediate",
            "quantity": order.quantity,
            "extended_hours": order.session.is_extended(),
            "market_hours": market_hours,
        });
        if let Some(price) = order.limit_price {
            body["price"] = json!(price.to_string());
        }

        let url = format!("{}/orders/", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let response = self.check(response).await?;
        let entry: OrderEntry = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("주문 응답 파싱 실패: {}", e)))?;
        Ok(entry.id)
    }

    fn parse_decimal(raw: &Option<String>) -> Option<Decimal> {
        raw.as_deref().and_then(|s| Decimal::from_str(s).ok())
    }

    /// 주문 상태 조회.
    pub async fn order_status(
        &self,
        access_token: &str,
        order_id: &str,
    ) -> Result<OrderStatusSnapshot, BrokerError> {
        let url = format!("{}/orders/{}/", self.config.base_url, order_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = self.check(response).await?;
        let entry: OrderEntry = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("주문 상태 파싱 실패: {}", e)))?;

        let filled_quantity = Self::parse_decimal(&entry.cumulative_quantity)
            .and_then(|d| d.trunc().to_u32())
            .unwrap_or(0);
        let status = match entry.state.as_str() {
            "filled" => BrokerOrderStatus::Filled,
            "cancelled" | "canceled" => BrokerOrderStatus::Cancelled,
            "rejected" | "failed" => BrokerOrderStatus::Rejected,
            "expired" => BrokerOrderStatus::Expired,
            "partially_filled" => BrokerOrderStatus::PartiallyFilled,
            "queued" | "unconfirmed" | "confirmed" | "pending" => BrokerOrderStatus::Working,
            other => {
                debug!(state = other, "알 수 없는 Robinhood 주문 상태, 대기로 처리");
                BrokerOrderStatus::Working
            }
        };

        Ok(OrderStatusSnapshot {
            status,
            filled_quantity,
            filled_price: Self::parse_decimal(&entry.average_price),
        })
    }

    /// 미체결 주문 취소.
    pub async fn cancel_order(
        &self,
        access_token: &str,
        order_id: &str,
    ) -> Result<bool, BrokerError> {
        let url = format!("{}/orders/{}/cancel/", self.config.base_url, order_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        // 이미 최종 상태면 400
        if response.status().as_u16() == 400 {
            return Ok(false);
        }
        self.check(response).await?;
        Ok(true)
    }

    /// 현재가 조회 (last_trade_price).
    pub async fn quote(&self, access_token: &str, ticker: &str) -> Result<Decimal, BrokerError> {
        let url = format!("{}/quotes/{}/", self.config.base_url, ticker);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = self.check(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("시세 응답 파싱 실패: {}", e)))?;

        body["last_trade_price"]
            .as_str()
            .and_then(|s| Decimal::from_str(s).ok())
            .ok_or_else(|| {
                BrokerError::Parse(format!("{} 시세 응답에 last_trade_price 없음", ticker))
            })
    }

    /// 매수 가능 금액 조회.
    pub async fn account_balance(
        &self,
        access_token: &str,
        account_number: &str,
    ) -> Result<Decimal, BrokerError> {
        let url = format!(
            "{}/accounts/{}/",
            self.config.base_url, account_number
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = self.check(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("계좌 응답 파싱 실패: {}", e)))?;

        body["buying_power"]
            .as_str()
            .and_then(|s| Decimal::from_str(s).ok())
            .ok_or_else(|| BrokerError::Parse("계좌 응답에 buying_power 없음".to_string()))
    }
}

// ============================================================================
// 테스트
// ============================================================================
