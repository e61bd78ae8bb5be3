//! 주문 실행 엔진.
//!
//! 배치를 (브로커, 계좌) 그룹으로 나눠 그룹 간에는 병렬, 같은 계좌
//! 안에서는 순서대로 처리합니다. 같은 계좌의 주문을 병렬화하지 않는
//! 이유는 세션 갱신 경합을 만들지 않기 위해서입니다.
//!
//! 모든 주문은 어떤 경로를 타든 정확히 하나의 [`OrderOutcome`]을
//! 만듭니다. 취소 토큰은 새 제출을 막을 뿐, 이미 제출된 주문은 취소
//! 경로를 거쳐 반드시 최종 상태에 도달합니다.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use trader_broker::CredentialLifecycle;
use trader_core::{
    AccountMap, BrokerAdapter, BrokerError, BrokerOrderStatus, Brokerage, OrderOutcome,
    OrderRequest, OrderStatusSnapshot, OrderType, OutcomeStatus, Session,
};
use trader_risk::RiskConfig;

use crate::ledger::{ExecutionLedger, LedgerError};

// =============================================================================
// 설정
// =============================================================================

/// 실행 동작 설정.
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    /// 모의 실행 모드
    pub dry_run: bool,
    /// 지정가 주문 체결 대기 한도
    pub limit_order_timeout: Duration,
    /// 주문 상태 폴링 간격
    pub poll_interval: Duration,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            dry_run: true,
            limit_order_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(3),
        }
    }
}

// =============================================================================
// 브로커 핸들
// =============================================================================

/// 브로커 하나를 실행하는 데 필요한 구성 요소 묶음.
#[derive(Clone)]
pub struct BrokerHandle {
    pub adapter: Arc<dyn BrokerAdapter>,
    pub lifecycle: Arc<CredentialLifecycle>,
    pub risk: RiskConfig,
    pub accounts: AccountMap,
}

// =============================================================================
// 실행 엔진
// =============================================================================

pub struct ExecutionEngine {
    handles: HashMap<Brokerage, BrokerHandle>,
    settings: ExecutionSettings,
}

impl ExecutionEngine {
    pub fn new(settings: ExecutionSettings) -> Self {
        Self {
            handles: HashMap::new(),
            settings,
        }
    }

    pub fn register_broker(&mut self, handle: BrokerHandle) {
        self.handles.insert(handle.adapter.brokerage(), handle);
    }

    /// 배치 실행. 입력 순서대로 결과를 반환하며, 주문마다 결과가
    /// 정확히 하나씩 존재합니다.
    pub async fn execute_batch(
        &self,
        orders: Vec<OrderRequest>,
        cancel: CancellationToken,
    ) -> Vec<OrderOutcome> {
        // (브로커, 계좌)별 그룹. 그룹 내 순서는 입력 순서 유지
        let mut groups: HashMap<(Brokerage, String), Vec<(usize, OrderRequest)>> = HashMap::new();
        let mut immediate: Vec<(usize, OrderOutcome)> = Vec::new();

        for (index, order) in orders.into_iter().enumerate() {
            let submitted_at = Utc::now();
            let Some(handle) = self.handles.get(&order.brokerage) else {
                immediate.push((
                    index,
                    OrderOutcome::resolved_locally(
                        order,
                        OutcomeStatus::Error,
                        submitted_at,
                        "해당 브로커가 설정에서 비활성화됨",
                    ),
                ));
                continue;
            };
            let Some(account_id) = handle.accounts.account_for_ticker(&order.ticker) else {
                immediate.push((
                    index,
                    OrderOutcome::resolved_locally(
                        order,
                        OutcomeStatus::Rejected,
                        submitted_at,
                        "티커에 대응하는 계좌를 찾을 수 없음",
                    ),
                ));
                continue;
            };
            groups
                .entry((order.brokerage, account_id.to_string()))
                .or_default()
                .push((index, order));
        }

        let mut tasks = JoinSet::new();
        for ((brokerage, account_id), group) in groups {
            // unwrap 불가 케이스: 그룹은 핸들 존재 확인 후에만 생김
            let Some(handle) = self.handles.get(&brokerage).cloned() else {
                continue;
            };
            let settings = self.settings.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let mut outcomes = Vec::with_capacity(group.len());
                for (index, order) in group {
                    let outcome = if cancel.is_cancelled() {
                        OrderOutcome::resolved_locally(
                            order,
                            OutcomeStatus::Cancelled,
                            Utc::now(),
                            "배치 중단으로 제출 생략",
                        )
                    } else {
                        execute_one(&handle, &settings, &account_id, order, &cancel).await
                    };
                    outcomes.push((index, outcome));
                }
                outcomes
            });
        }

        let mut all = immediate;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcomes) => all.extend(outcomes),
                Err(e) => error!(error = %e, "실행 태스크 비정상 종료"),
            }
        }
        all.sort_by_key(|(index, _)| *index);
        all.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// 배치 실행 후 결과를 원장에 기록.
    pub async fn execute_and_record(
        &self,
        orders: Vec<OrderRequest>,
        cancel: CancellationToken,
        ledger: &mut ExecutionLedger,
    ) -> Result<(), LedgerError> {
        let outcomes = self.execute_batch(orders, cancel).await;
        for outcome in outcomes {
            ledger.append(outcome)?;
        }
        Ok(())
    }
}

// =============================================================================
// 개별 주문 실행
// =============================================================================

async fn execute_one(
    handle: &BrokerHandle,
    settings: &ExecutionSettings,
    account_id: &str,
    order: OrderRequest,
    cancel: &CancellationToken,
) -> OrderOutcome {
    let submitted_at = Utc::now();

    // 1. 리스크 검증 (네트워크 없이)
    if let Err(violation) = trader_risk::validate(&order, &handle.risk, None) {
        info!(order = %order, violation = %violation, "리스크 검증 거부");
        return OrderOutcome::resolved_locally(
            order,
            OutcomeStatus::Rejected,
            submitted_at,
            violation.to_string(),
        );
    }

    // 2. 모의 실행: 검증과 계좌 해석까지만 실거래와 같은 경로를 타고,
    //    원격 호출 없이 체결을 합성
    if settings.dry_run {
        info!(order = %order, account = account_id, "모의 실행 체결 합성");
        let quantity = order.quantity;
        let price = order.limit_price;
        return OrderOutcome {
            request: order,
            status: OutcomeStatus::Filled,
            broker_order_id: Some(format!("dry_run_{}", Utc::now().timestamp_millis())),
            filled_quantity: quantity,
            filled_price: price,
            submitted_at,
            resolved_at: Utc::now(),
            error_detail: None,
        };
    }

    // 3. 세션 획득 (필요 시 갱신/재인증까지 수행됨)
    let session = match handle.lifecycle.get_session(account_id).await {
        Ok(session) => session,
        Err(e) => {
            error!(account = account_id, error = %e, "세션 획득 실패");
            return OrderOutcome::resolved_locally(
                order,
                OutcomeStatus::Error,
                submitted_at,
                format!("세션 획득 실패: {}", e),
            );
        }
    };

    // 4. 시장가 주문은 현재가로 금액 한도 재검증
    if order.order_type == OrderType::Market {
        match handle.adapter.quote(&session, &order.ticker).await {
            Ok(quote) => {
                if let Err(violation) = trader_risk::validate(&order, &handle.risk, Some(quote)) {
                    info!(order = %order, violation = %violation, "시세 기준 리스크 거부");
                    return OrderOutcome::resolved_locally(
                        order,
                        OutcomeStatus::Rejected,
                        submitted_at,
                        violation.to_string(),
                    );
                }
            }
            Err(e) => {
                warn!(ticker = %order.ticker, error = %e, "시세 조회 실패, 금액 검사 생략");
            }
        }
    }

    // 5. 제출, 인증 오류 시 재인증 후 정확히 한 번만 재시도
    let (order_id, session) =
        match submit_with_reauth(handle, session, account_id, &order).await {
            Ok(pair) => pair,
            Err(e) => {
                error!(order = %order, error = %e, "주문 제출 실패");
                return OrderOutcome::resolved_locally(
                    order,
                    OutcomeStatus::Error,
                    submitted_at,
                    format!("주문 제출 실패: {}", e),
                );
            }
        };
    info!(order = %order, order_id = %order_id, "주문 제출 완료");

    // 6.-7. 체결 확인 (지정가는 마감 시한까지 폴링, 시장가도 최소 1회 확인)
    monitor_until_terminal(handle, settings, &session, order, order_id, submitted_at, cancel).await
}

async fn submit_with_reauth(
    handle: &BrokerHandle,
    session: Session,
    account_id: &str,
    order: &OrderRequest,
) -> Result<(String, Session), BrokerError> {
    match handle.adapter.submit_order(&session, order).await {
        Ok(order_id) => Ok((order_id, session)),
        Err(e) if e.is_auth_error() => {
            warn!(account = account_id, error = %e, "제출 중 인증 오류, 재인증 후 1회 재시도");
            handle.lifecycle.report_auth_failure(account_id).await;
            let fresh = handle.lifecycle.get_session(account_id).await?;
            // 두 번째 실패는 종류와 무관하게 종결
            let order_id = handle.adapter.submit_order(&fresh, order).await?;
            Ok((order_id, fresh))
        }
        Err(e) => Err(e),
    }
}

fn outcome_from_snapshot(
    order: OrderRequest,
    order_id: String,
    snapshot: OrderStatusSnapshot,
    submitted_at: chrono::DateTime<Utc>,
) -> OrderOutcome {
    let status = match snapshot.status {
        BrokerOrderStatus::Filled => OutcomeStatus::Filled,
        BrokerOrderStatus::PartiallyFilled => OutcomeStatus::PartiallyFilled,
        BrokerOrderStatus::Cancelled => OutcomeStatus::Cancelled,
        BrokerOrderStatus::Rejected => OutcomeStatus::Rejected,
        BrokerOrderStatus::Expired => OutcomeStatus::TimedOut,
        BrokerOrderStatus::Working => OutcomeStatus::Error,
    };
    OrderOutcome {
        request: order,
        status,
        broker_order_id: Some(order_id),
        filled_quantity: snapshot.filled_quantity,
        filled_price: snapshot.filled_price,
        submitted_at,
        resolved_at: Utc::now(),
        error_detail: None,
    }
}

async fn monitor_until_terminal(
    handle: &BrokerHandle,
    settings: &ExecutionSettings,
    session: &Session,
    order: OrderRequest,
    order_id: String,
    submitted_at: chrono::DateTime<Utc>,
    cancel: &CancellationToken,
) -> OrderOutcome {
    let deadline = Instant::now() + settings.limit_order_timeout;

    loop {
        match handle.adapter.order_status(session, &order_id).await {
            Ok(snapshot) if snapshot.status.is_terminal() => {
                return outcome_from_snapshot(order, order_id, snapshot, submitted_at);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "주문 상태 조회 실패, 계속 폴링");
            }
        }

        if Instant::now() >= deadline {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(order_id = %order_id, "배치 중단, 미체결 주문 취소 시도");
                return cancel_and_resolve(
                    handle, session, order, order_id, submitted_at,
                    OutcomeStatus::Cancelled, "배치 중단으로 취소",
                ).await;
            }
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }
    }

    info!(order_id = %order_id, "체결 대기 시간 초과, 취소 시도");
    cancel_and_resolve(
        handle, session, order, order_id, submitted_at,
        OutcomeStatus::TimedOut, "체결 대기 시간 초과로 취소",
    )
    .await
}

/// 주문을 취소하고 최종 상태를 확정합니다. 취소 실패는 주문이 아직
/// 살아 있을 수 있다는 뜻이므로 숨기지 않고 `error`로 드러냅니다.
async fn cancel_and_resolve(
    handle: &BrokerHandle,
    session: &Session,
    order: OrderRequest,
    order_id: String,
    submitted_at: chrono::DateTime<Utc>,
    cancelled_status: OutcomeStatus,
    detail: &str,
) -> OrderOutcome {
    match handle.adapter.cancel_order(session, &order_id).await {
        Ok(true) => OrderOutcome {
            request: order,
            status: cancelled_status,
            broker_order_id: Some(order_id),
            filled_quantity: 0,
            filled_price: None,
            submitted_at,
            resolved_at: Utc::now(),
            error_detail: Some(detail.to_string()),
        },
        // 취소가 거절됐다면 그 사이 최종 상태에 도달한 것
        Ok(false) => match handle.adapter.order_status(session, &order_id).await {
            Ok(snapshot) if snapshot.status.is_terminal() => {
                outcome_from_snapshot(order, order_id, snapshot, submitted_at)
            }
            _ => OrderOutcome {
                request: order,
                status: OutcomeStatus::Error,
                broker_order_id: Some(order_id),
                filled_quantity: 0,
                filled_price: None,
                submitted_at,
                resolved_at: Utc::now(),
                error_detail: Some("취소 거절 후 최종 상태 확인 실패, 수동 확인 필요".to_string()),
            },
        },
        Err(e) => {
            error!(order_id = %order_id, error = %e, "주문 취소 실패");
            OrderOutcome {
                request: order,
                status: OutcomeStatus::Error,
                broker_order_id: Some(order_id),
                filled_quantity: 0,
                filled_price: None,
                submitted_at,
                resolved_at: Utc::now(),
                error_detail: Some(format!(
                    "취소 실패, 주문이 아직 살아 있을 수 있음: {}",
                    e
                )),
            }
        }
    }
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use trader_broker::FileTokenStore;
    use trader_core::{Side, TokenPolicy, TokenRecord, TradingSession};

    struct MockBroker {
        submit_calls: AtomicU32,
        quote_calls: AtomicU32,
        status_calls: AtomicU32,
        cancel_calls: AtomicU32,
        auth_failures_remaining: AtomicU32,
        quote_price: Decimal,
        statuses: Mutex<VecDeque<OrderStatusSnapshot>>,
    }

    impl MockBroker {
        fn new() -> Self {
            Self {
                submit_calls: AtomicU32::new(0),
                quote_calls: AtomicU32::new(0),
                status_calls: AtomicU32::new(0),
                cancel_calls: AtomicU32::new(0),
                auth_failures_remaining: AtomicU32::new(0),
                quote_price: dec!(150),
                statuses: Mutex::new(VecDeque::new()),
            }
        }

        fn with_auth_failures(self, n: u32) -> Self {
            self.auth_failures_remaining.store(n, Ordering::SeqCst);
            self
        }

        fn push_status(&self, status: BrokerOrderStatus, filled: u32) {
            self.statuses
                .lock()
                .unwrap()
                .push_back(OrderStatusSnapshot {
                    status,
                    filled_quantity: filled,
                    filled_price: Some(dec!(150)),
                });
        }

        fn network_calls(&self) -> u32 {
            self.submit_calls.load(Ordering::SeqCst)
                + self.quote_calls.load(Ordering::SeqCst)
                + self.status_calls.load(Ordering::SeqCst)
                + self.cancel_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BrokerAdapter for MockBroker {
        fn broker_name(&self) -> &str {
            "mock"
        }

        fn brokerage(&self) -> Brokerage {
            Brokerage::Schwab
        }

        async fn authenticate(&self) -> Result<TokenRecord, BrokerError> {
            Ok(TokenRecord::new("fresh-access", "fresh-refresh"))
        }

        async fn refresh(&self, _current: &TokenRecord) -> Result<TokenRecord, BrokerError> {
            Ok(TokenRecord::new("refreshed-access", "refreshed-refresh"))
        }

        async fn submit_order(
            &self,
            _session: &Session,
            _order: &OrderRequest,
        ) -> Result<String, BrokerError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.auth_failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.auth_failures_remaining
                    .store(remaining - 1, Ordering::SeqCst);
                return Err(BrokerError::Authentication("token rejected".to_string()));
            }
            Ok("ord-1".to_string())
        }

        async fn order_status(
            &self,
            _session: &Session,
            _order_id: &str,
        ) -> Result<OrderStatusSnapshot, BrokerError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.statuses.lock().unwrap().pop_front();
            Ok(next.unwrap_or(OrderStatusSnapshot {
                status: BrokerOrderStatus::Working,
                filled_quantity: 0,
                filled_price: None,
            }))
        }

        async fn cancel_order(
            &self,
            _session: &Session,
            _order_id: &str,
        ) -> Result<bool, BrokerError> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn quote(&self, _session: &Session, _ticker: &str) -> Result<Decimal, BrokerError> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.quote_price)
        }

        async fn account_balance(&self, _session: &Session) -> Result<Decimal, BrokerError> {
            Ok(dec!(100000))
        }
    }

    fn handle_for(adapter: Arc<MockBroker>, dir: &tempfile::TempDir) -> BrokerHandle {
        let store = Arc::new(FileTokenStore::new(dir.path()));
        let lifecycle = Arc::new(CredentialLifecycle::new(
            adapter.clone(),
            store,
            TokenPolicy::default(),
        ));
        let mut accounts = std::collections::HashMap::new();
        accounts.insert("12345678".to_string(), "HASH_A".to_string());
        BrokerHandle {
            adapter,
            lifecycle,
            risk: RiskConfig {
                max_order_value: dec!(10000),
                supported_sessions: vec![
                    TradingSession::Normal,
                    TradingSession::Extended,
                ],
            },
            accounts: AccountMap::new(&accounts, &std::collections::HashMap::new(), Some("12345678".to_string())),
        }
    }

    fn engine_with(
        adapter: Arc<MockBroker>,
        dir: &tempfile::TempDir,
        dry_run: bool,
    ) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(ExecutionSettings {
            dry_run,
            limit_order_timeout: Duration::from_millis(80),
            poll_interval: Duration::from_millis(10),
        });
        engine.register_broker(handle_for(adapter, dir));
        engine
    }

    fn market_order(ticker: &str, quantity: u32) -> OrderRequest {
        OrderRequest {
            brokerage: Brokerage::Schwab,
            ticker: ticker.to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            session: TradingSession::Normal,
        }
    }

    fn limit_order(ticker: &str, quantity: u32, price: Decimal) -> OrderRequest {
        OrderRequest {
            brokerage: Brokerage::Schwab,
            ticker: ticker.to_string(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            quantity,
            limit_price: Some(price),
            session: TradingSession::Normal,
        }
    }

    #[tokio::test]
    async fn test_dry_run_fills_without_network() {
        // 시장가 100주, 시세 없이 금액 검사는 생략되고 원격 호출도 없음
        let adapter = Arc::new(MockBroker::new());
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter.clone(), &dir, true);

        let outcomes = engine
            .execute_batch(vec![market_order("AAPL", 100)], CancellationToken::new())
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, OutcomeStatus::Filled);
        assert!(outcomes[0]
            .broker_order_id
            .as_deref()
            .unwrap()
            .starts_with("dry_run_"));
        assert_eq!(adapter.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_value_exceeded_rejected_without_network() {
        // 25 × 2800 = 70000 > 10000
        let adapter = Arc::new(MockBroker::new());
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter.clone(), &dir, false);

        let outcomes = engine
            .execute_batch(
                vec![limit_order("GOOGL", 25, dec!(2800.00))],
                CancellationToken::new(),
            )
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Rejected);
        assert!(outcomes[0]
            .error_detail
            .as_deref()
            .unwrap()
            .contains("한도 초과"));
        assert_eq!(adapter.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_limit_timeout_cancels_order() {
        // 상태가 계속 Working이면 마감 후 취소가 호출되고 timed_out
        let adapter = Arc::new(MockBroker::new());
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter.clone(), &dir, false);

        let outcomes = engine
            .execute_batch(
                vec![limit_order("MSFT", 10, dec!(350.00))],
                CancellationToken::new(),
            )
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::TimedOut);
        assert_eq!(adapter.cancel_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_limit_fill_before_timeout() {
        let adapter = Arc::new(MockBroker::new());
        adapter.push_status(BrokerOrderStatus::Working, 0);
        adapter.push_status(BrokerOrderStatus::Filled, 10);
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter.clone(), &dir, false);

        let outcomes = engine
            .execute_batch(
                vec![limit_order("MSFT", 10, dec!(350.00))],
                CancellationToken::new(),
            )
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Filled);
        assert_eq!(outcomes[0].filled_quantity, 10);
        assert_eq!(outcomes[0].broker_order_id.as_deref(), Some("ord-1"));
        assert_eq!(adapter.cancel_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_retried_exactly_once_then_succeeds() {
        let adapter = Arc::new(MockBroker::new().with_auth_failures(1));
        adapter.push_status(BrokerOrderStatus::Filled, 5);
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter.clone(), &dir, false);

        let outcomes = engine
            .execute_batch(
                vec![limit_order("NVDA", 5, dec!(100.00))],
                CancellationToken::new(),
            )
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Filled);
        assert_eq!(adapter.submit_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_auth_failure_is_terminal() {
        let adapter = Arc::new(MockBroker::new().with_auth_failures(2));
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter.clone(), &dir, false);

        let outcomes = engine
            .execute_batch(
                vec![limit_order("NVDA", 5, dec!(100.00))],
                CancellationToken::new(),
            )
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Error);
        // 최초 1회 + 재시도 1회, 그 이상은 없다
        assert_eq!(adapter.submit_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_market_order_quote_revalidation() {
        // 시장가 100주 × 시세 150 = 15000 > 10000 → 제출 없이 거부
        let adapter = Arc::new(MockBroker::new());
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter.clone(), &dir, false);

        let outcomes = engine
            .execute_batch(vec![market_order("AAPL", 100)], CancellationToken::new())
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Rejected);
        assert_eq!(adapter.quote_calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_market_order_confirmed_with_status_poll() {
        let adapter = Arc::new(MockBroker::new());
        adapter.push_status(BrokerOrderStatus::Filled, 10);
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter.clone(), &dir, false);

        let outcomes = engine
            .execute_batch(vec![market_order("AAPL", 10)], CancellationToken::new())
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Filled);
        assert!(adapter.status_calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_every_order_gets_exactly_one_outcome() {
        let adapter = Arc::new(MockBroker::new());
        adapter.push_status(BrokerOrderStatus::Filled, 1);
        adapter.push_status(BrokerOrderStatus::Filled, 1);
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter.clone(), &dir, false);

        let orders = vec![
            limit_order("AAPL", 1, dec!(100)),
            limit_order("GOOGL", 25, dec!(2800.00)), // 거부
            limit_order("MSFT", 1, dec!(100)),
        ];
        let outcomes = engine
            .execute_batch(orders.clone(), CancellationToken::new())
            .await;

        assert_eq!(outcomes.len(), orders.len());
        // 입력 순서 보존
        assert_eq!(outcomes[0].request.ticker, "AAPL");
        assert_eq!(outcomes[1].request.ticker, "GOOGL");
        assert_eq!(outcomes[1].status, OutcomeStatus::Rejected);
        assert_eq!(outcomes[2].request.ticker, "MSFT");
    }

    #[tokio::test]
    async fn test_cancelled_batch_skips_submission() {
        let adapter = Arc::new(MockBroker::new());
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter.clone(), &dir, false);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcomes = engine
            .execute_batch(vec![limit_order("AAPL", 1, dec!(100))], cancel)
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Cancelled);
        assert_eq!(adapter.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_poll_resolves_submitted_order() {
        // 제출 후 Working 상태로 폴링 중 배치가 중단되면
        // 브로커 취소가 호출되고 최종 결과는 Cancelled
        let adapter = Arc::new(MockBroker::new());
        let dir = tempfile::tempdir().unwrap();
        let mut engine = ExecutionEngine::new(ExecutionSettings {
            dry_run: false,
            limit_order_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(10),
        });
        engine.register_broker(handle_for(adapter.clone(), &dir));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            trigger.cancel();
        });

        let outcomes = engine
            .execute_batch(vec![limit_order("MSFT", 10, dec!(350.00))], cancel)
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Cancelled);
        assert_eq!(outcomes[0].broker_order_id.as_deref(), Some("ord-1"));
        assert_eq!(adapter.submit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.cancel_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_brokerage_yields_error_outcome() {
        let adapter = Arc::new(MockBroker::new());
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(adapter, &dir, false);

        let mut order = limit_order("AAPL", 1, dec!(100));
        order.brokerage = Brokerage::Robinhood;
        let outcomes = engine
            .execute_batch(vec![order], CancellationToken::new())
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, OutcomeStatus::Error);
    }
}
