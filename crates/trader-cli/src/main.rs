//! 배치 주문 실행 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 예제 주문 CSV 생성
//! trader sample
//!
//! # 모의 실행 (config.json의 dryRun 기본값 사용)
//! trader run -o sample_trades.csv
//!
//! # 실거래 실행
//! trader run -o trades.csv --live
//!
//! # 설정된 계좌 맵 확인
//! trader accounts
//!
//! # 토큰 상태 확인
//! trader tokens
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

mod commands;
mod orders_csv;

use commands::{accounts, run, tokens};

#[derive(Parser)]
#[command(name = "trader")]
#[command(about = "Schwab/Robinhood 배치 주문 실행 봇", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 경로
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 주문 CSV 배치 실행
    Run {
        /// 주문 CSV 파일 (exchange,ticker,action,order_type,quantity,price,session)
        #[arg(short, long)]
        orders: PathBuf,

        /// 실거래 모드 (설정의 dryRun을 무시하고 실제 주문 제출)
        #[arg(long, conflicts_with = "dry_run")]
        live: bool,

        /// 모의 실행 강제 (설정과 무관하게 주문 미제출)
        #[arg(long)]
        dry_run: bool,

        /// 결과 JSON 출력 경로 (기본: resultsDir에 자동 생성)
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,
    },

    /// 설정된 계좌 식별자와 라우팅 확인
    Accounts {
        /// Schwab API에서 계좌번호/해시 목록을 실시간 조회
        #[arg(long)]
        live: bool,
    },

    /// 브로커별 토큰 상태와 권장 조치 확인
    Tokens,

    /// 예제 주문 CSV 생성 (sample_trades.csv)
    Sample,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (없어도 에러 안남)
    dotenvy::dotenv().ok();

    // 트레이싱 초기화
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            orders,
            live,
            dry_run,
            output,
        } => {
            let run_config = run::RunConfig {
                orders_file: orders,
                config_path: cli.config,
                force_live: live,
                force_dry_run: dry_run,
                output,
            };
            if let Err(e) = run::run_batch(run_config).await {
                error!("배치 실행 실패: {}", e);
                return Err(e);
            }
        }

        Commands::Accounts { live } => {
            accounts::show_accounts(&cli.config, live).await?;
        }

        Commands::Tokens => {
            tokens::show_token_status(&cli.config).await?;
        }

        Commands::Sample => {
            let path = "sample_trades.csv";
            std::fs::write(path, orders_csv::sample_csv())?;
            println!("예제 주문 파일 생성: {}", path);
            println!("형식: exchange,ticker,action,order_type,quantity,price,session");
        }
    }

    Ok(())
}
