//! `accounts` 서브커맨드: 계좌 식별자와 라우팅 확인.

use std::path::Path;

use trader_broker::SchwabAdapter;
use trader_core::{AppConfig, Brokerage};

use super::build_handles;

pub async fn show_accounts(
    config_path: &Path,
    live: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let enabled = config.enabled_brokerages();
    if enabled.is_empty() {
        println!("활성화된 브로커가 없습니다.");
        return Ok(());
    }

    for brokerage in &enabled {
        let map = config.account_map(*brokerage);
        println!("\n{} 계좌", brokerage);
        println!("{}", "=".repeat(60));
        let accounts = map.canonical_accounts();
        if accounts.is_empty() {
            println!("  (설정된 계좌 없음)");
        }
        for account in accounts {
            println!("  {}", account);
        }
    }

    // Schwab는 계좌번호 → 해시 맵을 API에서 직접 확인할 수 있음
    if live && config.schwab.enabled {
        println!("\nSchwab 실시간 계좌 조회");
        println!("{}", "=".repeat(60));
        let handles = build_handles(&config);
        let handle = handles
            .iter()
            .find(|h| h.adapter.brokerage() == Brokerage::Schwab)
            .ok_or("Schwab 핸들 생성 실패")?;

        let account_id = handle
            .accounts
            .canonical_accounts()
            .into_iter()
            .next()
            .unwrap_or_else(|| "default".to_string());
        let session = handle.lifecycle.get_session(&account_id).await?;

        let adapter = SchwabAdapter::new(&config.schwab);
        for (number, hash) in adapter.account_numbers(&session).await? {
            println!("  {:<12} -> {}", number, hash);
        }

        match handle.adapter.account_balance(&session).await {
            Ok(balance) => println!("  거래 가능 금액: ${}", balance),
            Err(e) => println!("  거래 가능 금액 조회 실패: {}", e),
        }
    }

    Ok(())
}
