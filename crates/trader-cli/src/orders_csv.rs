//! 주문 CSV 파싱.
//!
//! 형식: `exchange,ticker,action,order_type,quantity,price,session`
//! 헤더 줄은 선택이며, 빈 줄과 `#` 주석은 무시합니다. 검증 실패는
//! 줄 번호와 함께 전체 배치를 거부합니다. 일부만 실행되는 배치보다
//! 전부 거부가 디버깅하기 쉽습니다.

use rust_decimal::Decimal;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use trader_core::{Brokerage, OrderRequest, OrderType, Side, TradingSession};

// =============================================================================
// 에러
// =============================================================================

#[derive(Debug)]
pub struct CsvParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for CsvParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}행: {}", self.line, self.message)
    }
}

impl std::error::Error for CsvParseError {}

fn err(line: usize, message: impl Into<String>) -> CsvParseError {
    CsvParseError {
        line,
        message: message.into(),
    }
}

// =============================================================================
// 파싱
// =============================================================================

/// CSV 파일을 주문 목록으로 파싱. 한 줄이라도 잘못되면 전체 실패.
pub fn parse_file(path: &Path) -> Result<Vec<OrderRequest>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("주문 파일을 읽을 수 없음 ({}): {}", path.display(), e))?;
    Ok(parse_str(&raw)?)
}

pub fn parse_str(raw: &str) -> Result<Vec<OrderRequest>, CsvParseError> {
    let mut orders = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        // 헤더 줄은 건너뜀
        if trimmed.to_lowercase().starts_with("exchange,") {
            continue;
        }
        orders.push(parse_line(trimmed, line_no)?);
    }
    Ok(orders)
}

fn parse_line(line: &str, line_no: usize) -> Result<OrderRequest, CsvParseError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 7 {
        return Err(err(
            line_no,
            format!("필드 7개 필요, {}개 발견", fields.len()),
        ));
    }

    let brokerage = Brokerage::parse_code(fields[0])
        .ok_or_else(|| err(line_no, format!("알 수 없는 거래소 코드: {}", fields[0])))?;

    let ticker = fields[1].to_uppercase();
    if ticker.is_empty() {
        return Err(err(line_no, "티커가 비어 있음"));
    }

    let side = match fields[2].to_lowercase().as_str() {
        "buy" => Side::Buy,
        "sell" => Side::Sell,
        other => return Err(err(line_no, format!("알 수 없는 매매 구분: {}", other))),
    };

    let order_type = match fields[3].to_lowercase().as_str() {
        "market" => OrderType::Market,
        "limit" => OrderType::Limit,
        other => return Err(err(line_no, format!("알 수 없는 주문 유형: {}", other))),
    };

    if fields[4].starts_with('$') {
        return Err(err(
            line_no,
            "금액 기반 수량($)은 지원하지 않음, 주식 수로 지정",
        ));
    }
    let quantity: u32 = fields[4]
        .parse()
        .map_err(|_| err(line_no, format!("잘못된 수량: {}", fields[4])))?;

    let limit_price = if fields[5].is_empty() {
        None
    } else {
        Some(
            Decimal::from_str(fields[5])
                .map_err(|_| err(line_no, format!("잘못된 가격: {}", fields[5])))?,
        )
    };

    match order_type {
        OrderType::Limit if limit_price.is_none() => {
            return Err(err(line_no, "지정가 주문에 가격 없음"));
        }
        OrderType::Market if limit_price.is_some() => {
            return Err(err(line_no, "시장가 주문에 가격을 지정할 수 없음"));
        }
        _ => {}
    }

    let session = if fields[6].is_empty() {
        TradingSession::Normal
    } else {
        TradingSession::parse_code(fields[6])
            .ok_or_else(|| err(line_no, format!("알 수 없는 세션 코드: {}", fields[6])))?
    };

    Ok(OrderRequest {
        brokerage,
        ticker,
        side,
        order_type,
        quantity,
        limit_price,
        session,
    })
}

/// 예제 주문 CSV 본문 (`sample` 서브커맨드 출력).
pub fn sample_csv() -> &'static str {
    "exchange,ticker,action,order_type,quantity,price,session\n\
     hood,AAPL,buy,market,10,,normal\n\
     sch,GOOGL,buy,market,3,,normal\n\
     sch,TSLA,buy,limit,5,310.50,normal\n\
     hood,NVDA,sell,market,2,,ext\n\
     hood,MSFT,sell,limit,50,350.00,ext\n"
}

// =============================================================================
// 테스트
// =============================================================================
