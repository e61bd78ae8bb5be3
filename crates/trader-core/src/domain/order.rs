//! 주문 요청 타입 정의.
//!
//! 배치 파일 한 줄이 하나의 [`OrderRequest`]로 변환됩니다.
//! 생성 이후 불변이며, 하나의 요청은 정확히 하나의
//! [`OrderOutcome`](super::outcome::OrderOutcome)으로 귀결됩니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// 브로커리지
// =============================================================================

/// 지원 브로커리지 플랫폼.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brokerage {
    /// Charles Schwab
    Schwab,
    /// Robinhood
    Robinhood,
}

impl Brokerage {
    /// 배치 파일의 플랫폼 코드 파싱.
    ///
    /// 원본 배치 포맷의 축약 코드(`sch`, `hood` 등)를 함께 허용합니다.
    pub fn parse_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "schwab" | "sch" | "shh" => Some(Self::Schwab),
            "robinhood" | "hood" => Some(Self::Robinhood),
            _ => None,
        }
    }

    /// 파일명과 로그에 쓰는 소문자 코드.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schwab => "schwab",
            Self::Robinhood => "robinhood",
        }
    }
}

impl fmt::Display for Brokerage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schwab => write!(f, "Schwab"),
            Self::Robinhood => write!(f, "Robinhood"),
        }
    }
}

// =============================================================================
// 매수/매도 및 주문 유형
// =============================================================================

/// 매수/매도 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// 시장가
    Market,
    /// 지정가
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit => write!(f, "limit"),
        }
    }
}

// =============================================================================
// 거래 세션
// =============================================================================

/// 거래 세션 (시간대 구분).
///
/// 브로커리지별 지원 여부는 설정 데이터(`supported_sessions`)로 판단하며
/// 코드에 하드코딩하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingSession {
    /// 정규장
    #[serde(rename = "normal")]
    Normal,
    /// 시간외 (프리/애프터 마켓)
    #[serde(rename = "extended-hours")]
    Extended,
    /// 24시간 거래
    #[serde(rename = "24-hour")]
    TwentyFourHour,
}

impl TradingSession {
    /// 배치 파일의 세션 토큰 파싱.
    pub fn parse_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "extended-hours" | "ext" => Some(Self::Extended),
            "24-hour" | "24" => Some(Self::TwentyFourHour),
            _ => None,
        }
    }

    /// 정규장 외 세션 여부.
    pub fn is_extended(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl fmt::Display for TradingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Extended => write!(f, "extended-hours"),
            Self::TwentyFourHour => write!(f, "24-hour"),
        }
    }
}

// =============================================================================
// 주문 요청
// =============================================================================

/// 브로커 중립 주문 요청.
///
/// 지정가 주문은 `limit_price`가 필수이며, 시장가 주문의 `limit_price`는
/// 무시됩니다. 유효성 검증은 `trader-risk`의 Risk Gate가 담당합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 대상 브로커리지
    pub brokerage: Brokerage,
    /// 종목 심볼 (예: "AAPL")
    pub ticker: String,
    /// 매수/매도
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 수량 (주 단위, 양의 정수)
    pub quantity: u32,
    /// 지정가 (지정가 주문 필수)
    pub limit_price: Option<Decimal>,
    /// 거래 세션
    pub session: TradingSession,
}

impl OrderRequest {
    /// 지정가 기준 주문 금액 추정.
    ///
    /// 시장가 주문은 지정가가 없으므로 `None`을 반환하며,
    /// 호출자가 시세 조회로 추정치를 보충해야 합니다.
    pub fn limit_value(&self) -> Option<Decimal> {
        self.limit_price
            .map(|price| price * Decimal::from(self.quantity))
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} x{}",
            self.brokerage, self.side, self.order_type, self.ticker, self.quantity
        )?;
        if let Some(price) = self.limit_price {
            write!(f, " @ {}", price)?;
        }
        write!(f, " ({})", self.session)
    }
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_brokerage_parse_code() {
        assert_eq!(Brokerage::parse_code("sch"), Some(Brokerage::Schwab));
        assert_eq!(Brokerage::parse_code("SCHWAB"), Some(Brokerage::Schwab));
        assert_eq!(Brokerage::parse_code("hood"), Some(Brokerage::Robinhood));
        assert_eq!(Brokerage::parse_code("fidelity"), None);
    }

    #[test]
    fn test_session_parse_code() {
        assert_eq!(
            TradingSession::parse_code("normal"),
            Some(TradingSession::Normal)
        );
        assert_eq!(
            TradingSession::parse_code("extended-hours"),
            Some(TradingSession::Extended)
        );
        assert_eq!(
            TradingSession::parse_code("24-hour"),
            Some(TradingSession::TwentyFourHour)
        );
        assert_eq!(TradingSession::parse_code("overnight"), None);
    }

    #[test]
    fn test_session_serde_tokens() {
        let json = serde_json::to_string(&TradingSession::TwentyFourHour).unwrap();
        assert_eq!(json, "\"24-hour\"");
        let parsed: TradingSession = serde_json::from_str("\"extended-hours\"").unwrap();
        assert_eq!(parsed, TradingSession::Extended);
    }

    #[test]
    fn test_limit_value() {
        let order = OrderRequest {
            brokerage: Brokerage::Schwab,
            ticker: "GOOGL".to_string(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            quantity: 25,
            limit_price: Some(dec!(2800.00)),
            session: TradingSession::Normal,
        };
        assert_eq!(order.limit_value(), Some(dec!(70000.00)));

        let market = OrderRequest {
            order_type: OrderType::Market,
            limit_price: None,
            ..order
        };
        assert_eq!(market.limit_value(), None);
    }
}
