//! 자격증명 수명 관리자.
//!
//! 계좌마다 토큰 레코드 하나를 소유하고 "사용 가능한 세션 획득"과
//! "세션 무효 보고" 두 연산을 제공합니다. 같은 계좌의 요청은 슬롯
//! 뮤텍스로 직렬화되어 갱신 경합이 없고, 서로 다른 계좌는 동시에
//! 진행됩니다.
//!
//! 토큰 레코드가 바뀌는 모든 전이는 반환 전에 저장소에 기록됩니다.
//! 재시작 시 저장된 레코드를 다시 읽어 같은 만료 규칙으로 재검증하므로
//! 프로세스 크래시로 유효한 토큰을 잃지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use trader_core::{
    BrokerAdapter, BrokerError, Session, TokenPhase, TokenPolicy, TokenRecord, TokenStatusReport,
};

use super::store::TokenStore;

// =============================================================================
// 계좌 슬롯
// =============================================================================

struct AccountSlot {
    record: Option<Arc<TokenRecord>>,
    /// 브로커가 토큰을 거부한 상태. 재인증 전까지 record를 쓰지 않음
    invalid: bool,
    /// 저장소에서 최초 로드를 마쳤는지
    loaded: bool,
}

impl AccountSlot {
    fn empty() -> Self {
        Self {
            record: None,
            invalid: false,
            loaded: false,
        }
    }
}

// =============================================================================
// 수명 관리자
// =============================================================================

/// 브로커 하나의 계좌별 토큰 수명 관리자.
pub struct CredentialLifecycle {
    adapter: Arc<dyn BrokerAdapter>,
    store: Arc<dyn TokenStore>,
    policy: TokenPolicy,
    slots: Mutex<HashMap<String, Arc<Mutex<AccountSlot>>>>,
}

impl CredentialLifecycle {
    pub fn new(
        adapter: Arc<dyn BrokerAdapter>,
        store: Arc<dyn TokenStore>,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            adapter,
            store,
            policy,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot_for(&self, account_id: &str) -> Arc<Mutex<AccountSlot>> {
        let mut slots = self.slots.lock().await;
        slots
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(AccountSlot::empty())))
            .clone()
    }

    /// 사용 가능한 세션 반환. 필요하면 갱신 또는 재인증을 수행하며,
    /// 재인증이 확정적으로 실패할 때만 에러를 반환합니다.
    pub async fn get_session(&self, account_id: &str) -> Result<Session, BrokerError> {
        let slot = self.slot_for(account_id).await;
        let mut slot = slot.lock().await;

        if !slot.loaded {
            slot.record = self
                .store
                .load(self.adapter.brokerage(), account_id)
                .map(Arc::new);
            slot.loaded = true;
        }

        let now = chrono::Utc::now();
        let phase = match (&slot.record, slot.invalid) {
            (_, true) => TokenPhase::Invalid,
            (None, _) => TokenPhase::Missing,
            (Some(record), _) => {
                record.phase(now, self.policy.lifetime(), self.policy.refresh_threshold())
            }
        };

        match phase {
            TokenPhase::Valid => {}
            TokenPhase::NearExpiry => {
                if self.policy.enable_proactive_refresh {
                    self.try_proactive_refresh(account_id, &mut slot, now).await?;
                } else {
                    info!(
                        broker = self.adapter.broker_name(),
                        account = account_id,
                        "토큰 갱신 임계 초과, 선제 갱신 비활성화 상태"
                    );
                }
            }
            TokenPhase::Missing | TokenPhase::Expired | TokenPhase::Invalid => {
                info!(
                    broker = self.adapter.broker_name(),
                    account = account_id,
                    phase = %phase,
                    "재인증 수행"
                );
                let fresh = self.adapter.authenticate().await?;
                self.store
                    .save(self.adapter.brokerage(), account_id, &fresh)?;
                slot.record = Some(Arc::new(fresh));
                slot.invalid = false;
            }
        }

        let token = slot
            .record
            .clone()
            .ok_or_else(|| BrokerError::Authentication("인증 후에도 토큰 없음".to_string()))?;
        Ok(Session {
            account_id: account_id.to_string(),
            token,
        })
    }

    /// 선제 갱신. 실패해도 기존 토큰이 아직 유효하므로 경고만 남깁니다.
    async fn try_proactive_refresh(
        &self,
        account_id: &str,
        slot: &mut AccountSlot,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), BrokerError> {
        let current = match &slot.record {
            Some(record) => record.clone(),
            None => return Ok(()),
        };

        info!(
            broker = self.adapter.broker_name(),
            account = account_id,
            "선제 토큰 갱신 시도"
        );

        match self.adapter.refresh(&current).await {
            Ok(mut fresh) => {
                fresh.last_refresh_attempt = Some(now);
                self.store
                    .save(self.adapter.brokerage(), account_id, &fresh)?;
                slot.record = Some(Arc::new(fresh));
                info!(
                    broker = self.adapter.broker_name(),
                    account = account_id,
                    "선제 갱신 완료"
                );
            }
            Err(e) => {
                // 기존 토큰은 아직 살아 있으므로 계속 사용
                warn!(
                    broker = self.adapter.broker_name(),
                    account = account_id,
                    error = %e,
                    "선제 갱신 실패, 기존 토큰 계속 사용"
                );
                let mut kept = (*current).clone();
                kept.last_refresh_attempt = Some(now);
                self.store
                    .save(self.adapter.brokerage(), account_id, &kept)?;
                slot.record = Some(Arc::new(kept));
            }
        }
        Ok(())
    }

    /// 어댑터가 인증 오류를 보고할 때 호출. 토큰을 무효화하고 저장소에서
    /// 제거하여 다음 `get_session`이 재인증하도록 만듭니다.
    pub async fn report_auth_failure(&self, account_id: &str) {
        let slot = self.slot_for(account_id).await;
        let mut slot = slot.lock().await;
        slot.invalid = true;
        warn!(
            broker = self.adapter.broker_name(),
            account = account_id,
            "인증 오류 보고됨, 토큰 무효화"
        );
        if let Err(e) = self.store.remove(self.adapter.brokerage(), account_id) {
            warn!(
                broker = self.adapter.broker_name(),
                account = account_id,
                error = %e,
                "무효 토큰 파일 제거 실패"
            );
        }
    }

    /// 모니터링용 읽기 전용 상태 조회. 갱신이나 재인증을 유발하지 않습니다.
    pub async fn token_status(&self, account_id: &str) -> TokenStatusReport {
        let slot = self.slot_for(account_id).await;
        let mut slot = slot.lock().await;

        if !slot.loaded {
            slot.record = self
                .store
                .load(self.adapter.brokerage(), account_id)
                .map(Arc::new);
            slot.loaded = true;
        }

        let now = chrono::Utc::now();
        let (phase, issued_at, expires_at) = match (&slot.record, slot.invalid) {
            (_, true) => (TokenPhase::Invalid, None, None),
            (None, _) => (TokenPhase::Missing, None, None),
            (Some(record), _) => (
                record.phase(now, self.policy.lifetime(), self.policy.refresh_threshold()),
                Some(record.issued_at),
                Some(record.expires_at(self.policy.lifetime())),
            ),
        };

        TokenStatusReport {
            brokerage: self.adapter.brokerage().to_string(),
            account_id: account_id.to_string(),
            phase,
            issued_at,
            expires_at,
            recommendation: TokenStatusReport::recommendation_for(phase).to_string(),
        }
    }
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::FileTokenStore;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use std::sync::atomic::{AtomicU32, Ordering};
    use trader_core::{Brokerage, OrderRequest, OrderStatusSnapshot};

    struct MockAdapter {
        auth_calls: AtomicU32,
        refresh_calls: AtomicU32,
        fail_refresh: bool,
    }

    impl MockAdapter {
        fn new() -> Self {
            Self {
                auth_calls: AtomicU32::new(0),
                refresh_calls: AtomicU32::new(0),
                fail_refresh: false,
            }
        }

        fn failing_refresh() -> Self {
            Self {
                fail_refresh: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl BrokerAdapter for MockAdapter {
        fn broker_name(&self) -> &str {
            "mock"
        }

        fn brokerage(&self) -> Brokerage {
            Brokerage::Schwab
        }

        async fn authenticate(&self) -> Result<TokenRecord, BrokerError> {
            let n = self.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenRecord::new(format!("auth-{}", n), "refresh-new"))
        }

        async fn refresh(&self, _current: &TokenRecord) -> Result<TokenRecord, BrokerError> {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_refresh {
                return Err(BrokerError::Api {
                    status: 500,
                    message: "refresh unavailable".to_string(),
                });
            }
            Ok(TokenRecord::new(format!("refreshed-{}", n), "refresh-next"))
        }

        async fn submit_order(
            &self,
            _session: &Session,
            _order: &OrderRequest,
        ) -> Result<String, BrokerError> {
            unimplemented!()
        }

        async fn order_status(
            &self,
            _session: &Session,
            _order_id: &str,
        ) -> Result<OrderStatusSnapshot, BrokerError> {
            unimplemented!()
        }

        async fn cancel_order(
            &self,
            _session: &Session,
            _order_id: &str,
        ) -> Result<bool, BrokerError> {
            unimplemented!()
        }

        async fn quote(&self, _session: &Session, _ticker: &str) -> Result<Decimal, BrokerError> {
            unimplemented!()
        }

        async fn account_balance(&self, _session: &Session) -> Result<Decimal, BrokerError> {
            unimplemented!()
        }
    }

    fn lifecycle_with(
        adapter: Arc<MockAdapter>,
    ) -> (tempfile::TempDir, CredentialLifecycle) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTokenStore::new(dir.path()));
        let lifecycle = CredentialLifecycle::new(adapter, store, TokenPolicy::default());
        (dir, lifecycle)
    }

    fn seed_token(dir: &tempfile::TempDir, account: &str, age_days: i64) {
        let store = FileTokenStore::new(dir.path());
        let mut record = TokenRecord::new("seeded-access", "seeded-refresh");
        record.issued_at = Utc::now() - Duration::days(age_days);
        store.save(Brokerage::Schwab, account, &record).unwrap();
    }

    #[tokio::test]
    async fn test_missing_token_triggers_authentication() {
        let adapter = Arc::new(MockAdapter::new());
        let (_dir, lifecycle) = lifecycle_with(adapter.clone());

        let session = lifecycle.get_session("ACCT").await.unwrap();
        assert_eq!(session.token.access_token.expose_secret(), "auth-1");
        assert_eq!(adapter.auth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_valid_token_is_idempotent() {
        let adapter = Arc::new(MockAdapter::new());
        let (dir, lifecycle) = lifecycle_with(adapter.clone());
        seed_token(&dir, "ACCT", 1);

        let first = lifecycle.get_session("ACCT").await.unwrap();
        let second = lifecycle.get_session("ACCT").await.unwrap();

        assert_eq!(
            first.token.access_token.expose_secret(),
            second.token.access_token.expose_secret()
        );
        assert_eq!(adapter.auth_calls.load(Ordering::SeqCst), 0);
        assert_eq!(adapter.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_near_expiry_triggers_proactive_refresh() {
        let adapter = Arc::new(MockAdapter::new());
        let (dir, lifecycle) = lifecycle_with(adapter.clone());
        // 6일 경과, 임계 5일, 수명 7일
        seed_token(&dir, "ACCT", 6);

        let session = lifecycle.get_session("ACCT").await.unwrap();
        assert_eq!(session.token.access_token.expose_secret(), "refreshed-1");
        assert_eq!(adapter.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.auth_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_proactive_refresh_keeps_old_token() {
        let adapter = Arc::new(MockAdapter::failing_refresh());
        let (dir, lifecycle) = lifecycle_with(adapter.clone());
        seed_token(&dir, "ACCT", 6);

        let session = lifecycle.get_session("ACCT").await.unwrap();
        assert_eq!(session.token.access_token.expose_secret(), "seeded-access");
        assert!(session.token.last_refresh_attempt.is_some());
    }

    #[tokio::test]
    async fn test_expired_token_triggers_reauth() {
        let adapter = Arc::new(MockAdapter::new());
        let (dir, lifecycle) = lifecycle_with(adapter.clone());
        seed_token(&dir, "ACCT", 8);

        let session = lifecycle.get_session("ACCT").await.unwrap();
        assert_eq!(session.token.access_token.expose_secret(), "auth-1");
        assert_eq!(adapter.auth_calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_report_auth_failure_forces_reauth() {
        let adapter = Arc::new(MockAdapter::new());
        let (dir, lifecycle) = lifecycle_with(adapter.clone());
        seed_token(&dir, "ACCT", 1);

        let first = lifecycle.get_session("ACCT").await.unwrap();
        assert_eq!(first.token.access_token.expose_secret(), "seeded-access");

        lifecycle.report_auth_failure("ACCT").await;
        let second = lifecycle.get_session("ACCT").await.unwrap();
        assert_eq!(second.token.access_token.expose_secret(), "auth-1");
    }

    #[tokio::test]
    async fn test_refresh_never_decreases_expiry() {
        let adapter = Arc::new(MockAdapter::new());
        let (dir, lifecycle) = lifecycle_with(adapter.clone());
        seed_token(&dir, "ACCT", 6);
        let policy = TokenPolicy::default();
        let old_expiry = Utc::now() - Duration::days(6) + policy.lifetime();

        let session = lifecycle.get_session("ACCT").await.unwrap();
        let new_expiry = session.token.expires_at(policy.lifetime());
        assert!(new_expiry > old_expiry);
    }

    #[tokio::test]
    async fn test_token_status_reports_without_refreshing() {
        let adapter = Arc::new(MockAdapter::new());
        let (dir, lifecycle) = lifecycle_with(adapter.clone());
        seed_token(&dir, "ACCT", 6);

        let report = lifecycle.token_status("ACCT").await;
        assert_eq!(report.phase, TokenPhase::NearExpiry);
        assert_eq!(adapter.refresh_calls.load(Ordering::SeqCst), 0);

        let missing = lifecycle.token_status("OTHER").await;
        assert_eq!(missing.phase, TokenPhase::Missing);
    }
}
