//! `run` 서브커맨드: 주문 CSV 배치 실행.

use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use trader_core::{AppConfig, OrderOutcome, OutcomeStatus};
use trader_execution::{ExecutionEngine, ExecutionLedger, ExecutionSettings};

use crate::orders_csv;

use super::build_handles;

pub struct RunConfig {
    pub orders_file: PathBuf,
    pub config_path: PathBuf,
    pub force_live: bool,
    pub force_dry_run: bool,
    pub output: Option<PathBuf>,
}

pub async fn run_batch(run: RunConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(&run.config_path)?;
    let orders = orders_csv::parse_file(&run.orders_file)?;
    if orders.is_empty() {
        return Err("주문 파일에 실행할 주문이 없음".into());
    }
    info!(count = orders.len(), file = %run.orders_file.display(), "주문 배치 로드");

    let dry_run = if run.force_live {
        false
    } else if run.force_dry_run {
        true
    } else {
        config.trading.dry_run
    };
    if dry_run {
        println!("\n모의 실행 모드: 실제 주문이 제출되지 않습니다.");
    }

    let settings = ExecutionSettings {
        dry_run,
        limit_order_timeout: Duration::from_secs(config.trading.limit_order_timeout_secs),
        poll_interval: Duration::from_secs(config.trading.poll_interval_secs),
    };
    let mut engine = ExecutionEngine::new(settings);
    let handles = build_handles(&config);
    if handles.is_empty() {
        return Err("활성화된 브로커가 없음 (config.json의 enabled 확인)".into());
    }
    for handle in handles {
        engine.register_broker(handle);
    }

    // Ctrl-C는 새 제출을 막고, 이미 제출된 주문은 취소 경로로 정리됨
    let cancel = CancellationToken::new();
    let abort = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("중단 요청 수신, 남은 주문 제출을 건너뜁니다");
            abort.cancel();
        }
    });

    let mut ledger = ExecutionLedger::new(&config.trading.ledger_file);
    engine
        .execute_and_record(orders, cancel, &mut ledger)
        .await?;

    let results_path = match &run.output {
        Some(path) => {
            let dir = path.parent().unwrap_or(std::path::Path::new("."));
            std::fs::create_dir_all(dir)?;
            let body = serde_json::to_string_pretty(ledger.entries())?;
            std::fs::write(path, body)?;
            path.clone()
        }
        None => ledger.save_results(&config.trading.results_dir)?,
    };

    print_summary(ledger.entries());
    println!("결과 저장 위치: {}", results_path.display());
    Ok(())
}

fn print_summary(outcomes: &[OrderOutcome]) {
    let total = outcomes.len();
    let succeeded = outcomes.iter().filter(|o| o.status.is_success()).count();

    println!("\n{}", "=".repeat(50));
    println!("주문 실행 요약");
    println!("{}", "=".repeat(50));
    println!("전체: {}건", total);
    println!("성공: {}건", succeeded);
    println!("실패: {}건", total - succeeded);
    if total > 0 {
        println!("성공률: {:.1}%", (succeeded as f64 / total as f64) * 100.0);
    }

    println!("\n상세 결과:");
    println!("{}", "-".repeat(50));
    for (i, outcome) in outcomes.iter().enumerate() {
        let icon = if outcome.status.is_success() {
            "PASS"
        } else {
            "FAIL"
        };
        let detail = match outcome.status {
            OutcomeStatus::Filled | OutcomeStatus::PartiallyFilled => outcome
                .broker_order_id
                .as_deref()
                .unwrap_or("-")
                .to_string(),
            _ => outcome
                .error_detail
                .clone()
                .unwrap_or_else(|| outcome.status.to_string()),
        };
        println!(
            "{:2}. {} {:9} {:4} {:4} {:6} - {}",
            i + 1,
            icon,
            outcome.request.brokerage.to_string(),
            outcome.request.side.to_string(),
            outcome.request.quantity,
            outcome.request.ticker,
            detail,
        );
    }
    println!("{}", "=".repeat(50));
}
