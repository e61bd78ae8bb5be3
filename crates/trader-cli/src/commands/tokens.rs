//! `tokens` 서브커맨드: 토큰 수명 상태와 권장 조치 출력.
//!
//! 읽기 전용 조회입니다. 갱신이나 재인증을 유발하지 않으므로 모니터링
//! 용도로 반복 호출해도 안전합니다.

use std::path::Path;

use trader_core::AppConfig;

use super::build_handles;

pub async fn show_token_status(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let handles = build_handles(&config);
    if handles.is_empty() {
        println!("활성화된 브로커가 없습니다.");
        return Ok(());
    }

    println!("\n토큰 상태");
    println!("{}", "=".repeat(90));
    println!(
        "{:<10} {:<14} {:<12} {:<21} {:<21}",
        "브로커", "계좌", "상태", "발급", "만료"
    );
    println!("{}", "-".repeat(90));

    for handle in &handles {
        let mut accounts = handle.accounts.canonical_accounts();
        if accounts.is_empty() {
            accounts.push("default".to_string());
        }
        for account in accounts {
            let report = handle.lifecycle.token_status(&account).await;
            let fmt_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
                t.map(|v| v.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "-".to_string())
            };
            println!(
                "{:<10} {:<14} {:<12} {:<21} {:<21}",
                report.brokerage,
                report.account_id,
                report.phase.to_string(),
                fmt_time(report.issued_at),
                fmt_time(report.expires_at),
            );
            println!("           └ {}", report.recommendation);
        }
    }
    println!("{}", "=".repeat(90));
    Ok(())
}
