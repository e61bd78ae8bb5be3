//! Schwab Trader API 클라이언트.
//!
//! OAuth 토큰 발급/갱신과 주문·시세·계좌 REST 호출을 담당합니다.
//! 와이어 타입은 이 모듈 안에만 존재하며, 밖으로는 중립 타입으로
//! 변환되어 나갑니다.

use base64::Engine;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use trader_core::{
    BrokerError, BrokerOrderStatus, OrderRequest, OrderStatusSnapshot, OrderType, Side,
    TradingSession,
};

const DEFAULT_BASE_URL: &str = "https://api.schwabapi.com";

// ============================================================================
// 설정
// ============================================================================

#[derive(Clone)]
pub struct SchwabClientConfig {
    pub app_key: String,
    pub app_secret: String,
    pub bootstrap_refresh_token: String,
    pub base_url: String,
}

impl std::fmt::Debug for SchwabClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchwabClientConfig")
            .field("app_key", &"***")
            .field("app_secret", &"***")
            .field("bootstrap_refresh_token", &"***")
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
    pub refresh_token: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccountNumberEntry {
    pub account_number: String,
    pub hash_value: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct OrderDetail {
    status: String,
    #[serde(default)]
    filled_quantity: Option<Decimal>,
    #[serde(default)]
    order_activity_collection: Option<Vec<OrderActivity>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct OrderActivity {
    #[serde(default)]
    execution_legs: Option<Vec<ExecutionLeg>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ExecutionLeg {
    price: Decimal,
}

// ============================================================================
// 클라이언트
// ============================================================================

pub struct SchwabClient {
    client: Client,
    config: SchwabClientConfig,
}

impl SchwabClient {
    pub fn new(
        app_key: String,
        app_secret: String,
        bootstrap_refresh_token: String,
        base_url: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            config: SchwabClientConfig {
                app_key,
                app_secret,
                bootstrap_refresh_token,
                base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            },
        }
    }

    fn basic_auth_header(&self) -> String {
        let raw = format!("{}:{}", self.config.app_key, self.config.app_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }

    async fn token_grant(&self, refresh_token: &str) -> Result<TokenResponse, BrokerError> {
        let url = format!("{}/v1/oauth/token", self.config.base_url);
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.basic_auth_header())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BrokerError::Authentication(format!(
                "Schwab 토큰 발급 실패 ({}): {}",
                status, text
            )));
        }
        serde_json::from_str(&text)
            .map_err(|e| BrokerError::Parse(format!("Schwab 토큰 응답 파싱 실패: {}", e)))
    }

    /// 부트스트랩 리프레시 토큰으로 전체 재인증.
    pub async fn authenticate(&self) -> Result<TokenResponse, BrokerError> {
        self.token_grant(&self.config.bootstrap_refresh_token).await
    }

    /// 보유 중인 리프레시 토큰으로 갱신.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, BrokerError> {
        self.token_grant(refresh_token).await
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, BrokerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %message, "Schwab API 오류 응답");
        match status.as_u16() {
            401 | 403 => Err(BrokerError::Authentication(format!(
                "Schwab 인증 거부 ({}): {}",
                status, message
            ))),
            429 => Err(BrokerError::RateLimit),
            code => Err(BrokerError::Api {
                status: code,
                message,
            }),
        }
    }

    /// 계좌번호 → 계좌 해시 목록 조회.
    pub async fn account_numbers(
        &self,
        access_token: &str,
    ) -> Result<Vec<AccountNumberEntry>, BrokerError> {
        let url = format!("{}/trader/v1/accounts/accountNumbers", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = self.check(response).await?;
        response
            .json::<Vec<AccountNumberEntry>>()
            .await
            .map_err(|e| BrokerError::Parse(format!("계좌 목록 파싱 실패: {}", e)))
    }

    fn order_body(order: &OrderRequest) -> Result<Value, BrokerError> {
        let session = match order.session {
            TradingSession::Normal => "NORMAL",
            TradingSession::Extended => "EQUITY_EXTENDED",
            TradingSession::TwentyFourHour => {
                return Err(BrokerError::Unsupported(
                    "Schwab은 24시간 세션을 지원하지 않음".to_string(),
                ))
            }
        };
        let instruction = match order.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let mut body = json!({
            "orderType": match order.order_type {
                OrderType::Market => "MARKET",
                OrderType::Limit => "LIMIT",
            },
            "session": session,
            "duration": "DAY",
            "orderStrategyType": "SINGLE",
            "orderLegCollection": [{
                "instruction": instruction,
                "quantity": order.quantity,
                "instrument": {
                    "symbol": order.ticker,
                    "assetType": "EQUITY",
                },
            }],
        });
        if order.order_type == OrderType::Limit {
            let price = order.limit_price.ok_or_else(|| {
                BrokerError::Unsupported("지정가 주문에 가격 없음".to_string())
            })?;
            body["price"] = json!(price.to_string());
        }
        Ok(body)
    }

    /// 주문 제출. 응답의 Location 헤더에서 주문번호를 추출합니다.
    pub async fn place_order(
        &self,
        access_token: &str,
        account_hash: &str,
        order: &OrderRequest,
    ) -> Result<String, BrokerError> {
        let url = format!(
            "{}/trader/v1/accounts/{}/orders",
            self.config.base_url, account_hash
        );
        let body = Self::order_body(order)?;
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let response = self.check(response).await?;

        // Location: .../accounts/<hash>/orders/<id>
        let location = response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                BrokerError::Parse("주문 응답에 Location 헤더 없음".to_string())
            })?;
        location
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty() && *id != "orders")
            .map(str::to_string)
            .ok_or_else(|| {
                BrokerError::Parse(format!("Location 헤더에서 주문번호 추출 실패: {}", location))
            })
    }

    /// 주문 상태 조회.
    pub async fn order_status(
        &self,
        access_token: &str,
        account_hash: &str,
        order_id: &str,
    ) -> Result<OrderStatusSnapshot, BrokerError> {
        let url = format!(
            "{}/trader/v1/accounts/{}/orders/{}",
            self.config.base_url, account_hash, order_id
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = self.check(response).await?;
        let detail: OrderDetail = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("주문 상태 파싱 실패: {}", e)))?;

        let status = match detail.status.as_str() {
            "FILLED" => BrokerOrderStatus::Filled,
            "CANCELED" => BrokerOrderStatus::Cancelled,
            "REJECTED" => BrokerOrderStatus::Rejected,
            "EXPIRED" => BrokerOrderStatus::Expired,
            "WORKING" | "QUEUED" | "ACCEPTED" | "PENDING_ACTIVATION" => BrokerOrderStatus::Working,
            other => {
                let filled = detail.filled_quantity.unwrap_or_default();
                if filled > Decimal::ZERO {
                    BrokerOrderStatus::PartiallyFilled
                } else {
                    debug!(status = other, "알 수 없는 Schwab 주문 상태, 대기로 처리");
                    BrokerOrderStatus::Working
                }
            }
        };

        let filled_quantity = detail
            .filled_quantity
            .and_then(|d| d.trunc().to_u32())
            .unwrap_or(0);
        let filled_price = detail
            .order_activity_collection
            .as_ref()
            .and_then(|acts| acts.first())
            .and_then(|act| act.execution_legs.as_ref())
            .and_then(|legs| legs.first())
            .map(|leg| leg.price);

        Ok(OrderStatusSnapshot {
            status,
            filled_quantity,
            filled_price,
        })
    }

    /// 미체결 주문 취소.
    pub async fn cancel_order(
        &self,
        access_token: &str,
        account_hash: &str,
        order_id: &str,
    ) -> Result<bool, BrokerError> {
        let url = format!(
            "{}/trader/v1/accounts/{}/orders/{}",
            self.config.base_url, account_hash, order_id
        );
        let response = self
            .client
            .delete(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        // 이미 최종 상태인 주문의 취소는 400으로 거절됨
        if response.status().as_u16() == 400 {
            return Ok(false);
        }
        self.check(response).await?;
        Ok(true)
    }

    /// 현재가 조회.
    pub async fn quote(&self, access_token: &str, ticker: &str) -> Result<Decimal, BrokerError> {
        let url = format!("{}/marketdata/v1/{}/quotes", self.config.base_url, ticker);
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

        body[ticker]["quote"]["lastPrice"]
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| {
                BrokerError::Parse(format!("{} 시세 응답에 lastPrice 없음", ticker))
            })
    }

    /// 매수 가능 현금 조회.
    pub async fn account_balance(
        &self,
        access_token: &str,
        account_hash: &str,
    ) -> Result<Decimal, BrokerError> {
        let url = format!("{}/trader/v1/accounts/{}", self.config.base_url, account_hash);
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

        let balances = &body["securitiesAccount"]["currentBalances"];
        balances["cashAvailableForTrading"]
            .as_f64()
            .or_else(|| balances["buyingPower"].as_f64())
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| BrokerError::Parse("계좌 응답에 예수금 정보 없음".to_string()))
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trader_core::Brokerage;

    fn client(base_url: &str) -> SchwabClient {
        SchwabClient::new(
            "key".to_string(),
            "secret".to_string(),
            "bootstrap-rt".to_string(),
            Some(base_url.to_string()),
        )
    }

    fn limit_order() -> OrderRequest {
        OrderRequest {
            brokerage: Brokerage::Schwab,
            ticker: "MSFT".to_string(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            quantity: 10,
            limit_price: Some(dec!(300.50)),
            session: TradingSession::Extended,
        }
    }

    #[test]
    fn test_order_body_limit_extended() {
        let body = SchwabClient::order_body(&limit_order()).unwrap();
        assert_eq!(body["orderType"], "LIMIT");
        assert_eq!(body["session"], "EQUITY_EXTENDED");
        assert_eq!(body["price"], "300.50");
        assert_eq!(body["orderLegCollection"][0]["instruction"], "BUY");
        assert_eq!(body["orderLegCollection"][0]["quantity"], 10);
    }

    #[test]
    fn test_order_body_market_has_no_price() {
        let mut order = limit_order();
        order.order_type = OrderType::Market;
        order.limit_price = None;
        order.session = TradingSession::Normal;
        let body = SchwabClient::order_body(&order).unwrap();
        assert_eq!(body["orderType"], "MARKET");
        assert_eq!(body["session"], "NORMAL");
        assert!(body.get("price").is_none());
    }

    #[test]
    fn test_order_body_rejects_24h_session() {
        let mut order = limit_order();
        order.session = TradingSession::TwentyFourHour;
        assert!(matches!(
            SchwabClient::order_body(&order),
            Err(BrokerError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/oauth/token")
            .match_header("Authorization", mockito::Matcher::Regex("^Basic ".into()))
            .with_status(200)
            .with_body(r#"{"access_token": "at-1", "refresh_token": "rt-1"}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        let token = client.authenticate().await.unwrap();
        assert_eq!(token.access_token, "at-1");
        assert_eq!(token.refresh_token.as_deref(), Some("rt-1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_grant_is_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/oauth/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        let err = client.refresh("dead-rt").await.unwrap_err();
        assert!(matches!(err, BrokerError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_place_order_extracts_location_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/trader/v1/accounts/HASH_A/orders")
            .with_status(201)
            .with_header(
                "Location",
                "https://api.example.com/trader/v1/accounts/HASH_A/orders/100123",
            )
            .create_async()
            .await;

        let client = client(&server.url());
        let id = client
            .place_order("at", "HASH_A", &limit_order())
            .await
            .unwrap();
        assert_eq!(id, "100123");
    }

    #[tokio::test]
    async fn test_401_translates_to_authentication() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/trader/v1/accounts/accountNumbers")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let client = client(&server.url());
        let err = client.account_numbers("stale").await.unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_order_status_filled() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/trader/v1/accounts/HASH_A/orders/42")
            .with_status(200)
            .with_body(
                r#"{
                    "status": "FILLED",
                    "filledQuantity": 10,
                    "orderActivityCollection": [
                        {"executionLegs": [{"price": 300.25}]}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let client = client(&server.url());
        let snapshot = client.order_status("at", "HASH_A", "42").await.unwrap();
        assert_eq!(snapshot.status, BrokerOrderStatus::Filled);
        assert_eq!(snapshot.filled_quantity, 10);
        assert_eq!(snapshot.filled_price, Some(dec!(300.25)));
    }

    #[tokio::test]
    async fn test_quote_last_price() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/marketdata/v1/AAPL/quotes")
            .with_status(200)
            .with_body(r#"{"AAPL": {"quote": {"lastPrice": 150.25}}}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        let price = client.quote("at", "AAPL").await.unwrap();
        assert_eq!(price, dec!(150.25));
    }
}
