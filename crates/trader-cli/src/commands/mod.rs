pub mod accounts;
pub mod run;
pub mod tokens;

use std::sync::Arc;

use trader_broker::{CredentialLifecycle, FileTokenStore, RobinhoodAdapter, SchwabAdapter};
use trader_core::{AppConfig, BrokerAdapter, Brokerage};
use trader_execution::BrokerHandle;
use trader_risk::RiskConfig;

/// 활성화된 브로커마다 어댑터/수명관리자/리스크 설정을 묶어 생성.
pub(crate) fn build_handles(config: &AppConfig) -> Vec<BrokerHandle> {
    let mut handles = Vec::new();
    for brokerage in config.enabled_brokerages() {
        let adapter: Arc<dyn BrokerAdapter> = match brokerage {
            Brokerage::Schwab => Arc::new(SchwabAdapter::new(&config.schwab)),
            Brokerage::Robinhood => Arc::new(RobinhoodAdapter::new(&config.robinhood)),
        };
        let store = Arc::new(FileTokenStore::new(&config.trading.token_dir));
        let lifecycle = Arc::new(CredentialLifecycle::new(
            adapter.clone(),
            store,
            config.token_policy.clone(),
        ));
        handles.push(BrokerHandle {
            adapter,
            lifecycle,
            risk: RiskConfig {
                max_order_value: config.trading.max_order_value,
                supported_sessions: config.supported_sessions(brokerage).to_vec(),
            },
            accounts: config.account_map(brokerage),
        });
    }
    handles
}
