//! 애플리케이션 설정.
//!
//! `config.json`을 기본으로 읽고, 비밀값(앱 키, 비밀번호 등)은 환경
//! 변수가 있으면 환경 변수를 우선합니다. `.env` 파일은 dotenvy로
//! 로드합니다.

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::order::{Brokerage, TradingSession};

// =============================================================================
// 에러
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("설정 파일을 읽을 수 없음 ({path}): {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("설정 파일 파싱 실패: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("설정 검증 실패: {0}")]
    Validation(String),
}

// =============================================================================
// 환경 변수 헬퍼
// =============================================================================

fn env_override(current: &mut String, key: &str) {
    if let Ok(value) = std::env::var(key) {
        if !value.is_empty() {
            *current = value;
        }
    }
}

fn env_override_opt(current: &mut Option<String>, key: &str) {
    if let Ok(value) = std::env::var(key) {
        if !value.is_empty() {
            *current = Some(value);
        }
    }
}

fn env_override_secret(current: &mut SecretString, key: &str) {
    if let Ok(value) = std::env::var(key) {
        if !value.is_empty() {
            *current = SecretString::from(value);
        }
    }
}

// =============================================================================
// 거래 설정
// =============================================================================

/// 실행 동작 전반의 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradingConfig {
    /// 모의 실행 모드. 네트워크 호출 없이 성공을 합성합니다.
    pub dry_run: bool,
    /// 주문 1건당 명목 금액 상한 (USD)
    pub max_order_value: rust_decimal::Decimal,
    /// 지정가 주문 체결 대기 한도 (초)
    pub limit_order_timeout_secs: u64,
    /// 주문 상태 폴링 간격 (초)
    pub poll_interval_secs: u64,
    /// 실행 결과 JSON 출력 디렉터리
    pub results_dir: PathBuf,
    /// 실행 원장(JSONL) 경로
    pub ledger_file: PathBuf,
    /// 토큰 파일 저장 디렉터리
    pub token_dir: PathBuf,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            max_order_value: rust_decimal::Decimal::new(10_000, 0),
            limit_order_timeout_secs: 30,
            poll_interval_secs: 3,
            results_dir: PathBuf::from("results"),
            ledger_file: PathBuf::from("results/execution_ledger.jsonl"),
            token_dir: PathBuf::from("tokens"),
        }
    }
}

// =============================================================================
// 토큰 정책
// =============================================================================

/// 토큰 수명 정책. 만료는 발급 시각에서 파생됩니다.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenPolicy {
    /// 토큰 수명 (일)
    pub lifetime_days: i64,
    /// 선제 갱신 임계 (일)
    pub refresh_threshold_days: i64,
    /// 세션 요청 시 임계 초과 토큰을 자동 갱신할지 여부
    pub enable_proactive_refresh: bool,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            lifetime_days: 7,
            refresh_threshold_days: 5,
            enable_proactive_refresh: true,
        }
    }
}

impl TokenPolicy {
    pub fn lifetime(&self) -> Duration {
        Duration::days(self.lifetime_days)
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::days(self.refresh_threshold_days)
    }
}

// =============================================================================
// 브로커별 설정
// =============================================================================

fn default_schwab_sessions() -> Vec<TradingSession> {
    vec![TradingSession::Normal, TradingSession::Extended]
}

fn default_robinhood_sessions() -> Vec<TradingSession> {
    vec![
        TradingSession::Normal,
        TradingSession::Extended,
        TradingSession::TwentyFourHour,
    ]
}

/// Schwab 설정.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchwabConfig {
    pub enabled: bool,
    /// OAuth 앱 키 (환경 변수 SCHWAB_APP_KEY 우선)
    pub app_key: String,
    /// OAuth 앱 시크릿 (환경 변수 SCHWAB_APP_SECRET 우선)
    pub app_secret: SecretString,
    /// 최초 동의 플로우에서 얻은 부트스트랩 리프레시 토큰
    pub bootstrap_refresh_token: SecretString,
    /// API 베이스 URL (테스트 시 오버라이드)
    pub base_url: Option<String>,
    /// 라우팅 가능한 거래 세션 (기본: normal, extended-hours)
    #[serde(default = "default_schwab_sessions")]
    pub supported_sessions: Vec<TradingSession>,
    /// 계좌번호/표시명 → 계좌 해시 맵
    pub accounts: HashMap<String, String>,
    /// 티커 → 계좌 식별자 라우팅
    pub account_by_ticker: HashMap<String, String>,
    /// 미지정 티커의 기본 계좌 식별자
    pub default_account: Option<String>,
}

impl Default for SchwabConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            app_key: String::new(),
            app_secret: SecretString::from(""),
            bootstrap_refresh_token: SecretString::from(""),
            base_url: None,
            supported_sessions: default_schwab_sessions(),
            accounts: HashMap::new(),
            account_by_ticker: HashMap::new(),
            default_account: None,
        }
    }
}

// 비밀값이 로그에 찍히지 않도록 수동 구현
impl std::fmt::Debug for SchwabConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchwabConfig")
            .field("enabled", &self.enabled)
            .field("app_key", &self.app_key)
            .field("app_secret", &"***")
            .field("bootstrap_refresh_token", &"***")
            .field("base_url", &self.base_url)
            .field("supported_sessions", &self.supported_sessions)
            .field("accounts", &self.accounts)
            .field("account_by_ticker", &self.account_by_ticker)
            .field("default_account", &self.default_account)
            .finish()
    }
}

fn default_time_in_force() -> String {
    "gfd".to_string()
}

/// Robinhood 설정.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RobinhoodConfig {
    pub enabled: bool,
    /// 로그인 아이디 (환경 변수 ROBINHOOD_USERNAME 우선)
    pub username: String,
    /// 비밀번호 (환경 변수 ROBINHOOD_PASSWORD 우선)
    pub password: SecretString,
    /// TOTP 기반 MFA 코드 시드 (환경 변수 ROBINHOOD_MFA_CODE 우선)
    pub mfa_code: Option<String>,
    /// API 베이스 URL (테스트 시 오버라이드)
    pub base_url: Option<String>,
    /// 지정가 주문 기본 유효 기간. gfd(당일) 또는 gtc(취소 시까지).
    /// 시장가 주문은 항상 gfd로 제출됩니다.
    #[serde(default = "default_time_in_force")]
    pub default_time_in_force: String,
    /// 라우팅 가능한 거래 세션 (기본: normal, extended-hours, 24-hour)
    #[serde(default = "default_robinhood_sessions")]
    pub supported_sessions: Vec<TradingSession>,
    /// 계좌번호/표시명 → 계좌번호 맵
    pub accounts: HashMap<String, String>,
    /// 티커 → 계좌 식별자 라우팅
    pub account_by_ticker: HashMap<String, String>,
    /// 미지정 티커의 기본 계좌 식별자
    pub default_account: Option<String>,
}

impl Default for RobinhoodConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            username: String::new(),
            password: SecretString::from(""),
            mfa_code: None,
            base_url: None,
            default_time_in_force: default_time_in_force(),
            supported_sessions: default_robinhood_sessions(),
            accounts: HashMap::new(),
            account_by_ticker: HashMap::new(),
            default_account: None,
        }
    }
}

// 비밀값이 로그에 찍히지 않도록 수동 구현
impl std::fmt::Debug for RobinhoodConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobinhoodConfig")
            .field("enabled", &self.enabled)
            .field("username", &self.username)
            .field("password", &"***")
            .field("mfa_code", &self.mfa_code.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("default_time_in_force", &self.default_time_in_force)
            .field("supported_sessions", &self.supported_sessions)
            .field("accounts", &self.accounts)
            .field("account_by_ticker", &self.account_by_ticker)
            .field("default_account", &self.default_account)
            .finish()
    }
}

// =============================================================================
// 계좌 맵
// =============================================================================

/// 티커와 느슨한 계좌 식별자를 브로커 측 정식 계좌 ID로 해석합니다.
///
/// 식별자는 계좌번호, 표시명, 정식 ID 자체 중 무엇이든 될 수 있으며
/// 대소문자를 구분하지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct AccountMap {
    /// 소문자 식별자 → 정식 계좌 ID
    identifiers: HashMap<String, String>,
    /// 소문자 티커 → 식별자
    by_ticker: HashMap<String, String>,
    default_account: Option<String>,
}

impl AccountMap {
    pub fn new(
        accounts: &HashMap<String, String>,
        account_by_ticker: &HashMap<String, String>,
        default_account: Option<String>,
    ) -> Self {
        let mut identifiers = HashMap::new();
        for (alias, canonical) in accounts {
            identifiers.insert(alias.to_lowercase(), canonical.clone());
            // 정식 ID 자신으로도 찾을 수 있어야 함
            identifiers.insert(canonical.to_lowercase(), canonical.clone());
        }
        let by_ticker = account_by_ticker
            .iter()
            .map(|(t, id)| (t.to_lowercase(), id.clone()))
            .collect();
        Self {
            identifiers,
            by_ticker,
            default_account,
        }
    }

    /// 느슨한 식별자를 정식 계좌 ID로 해석.
    pub fn resolve_identifier(&self, identifier: &str) -> Option<&str> {
        self.identifiers
            .get(&identifier.to_lowercase())
            .map(String::as_str)
    }

    /// 티커가 라우팅될 정식 계좌 ID.
    pub fn account_for_ticker(&self, ticker: &str) -> Option<&str> {
        let identifier = self
            .by_ticker
            .get(&ticker.to_lowercase())
            .map(String::as_str)
            .or(self.default_account.as_deref())?;
        self.resolve_identifier(identifier)
    }

    /// 등록된 정식 계좌 ID 목록 (중복 제거, 정렬).
    pub fn canonical_accounts(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.identifiers.values().cloned().collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

// =============================================================================
// 애플리케이션 설정
// =============================================================================

/// 최상위 설정.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub trading: TradingConfig,
    pub token_policy: TokenPolicy,
    pub schwab: SchwabConfig,
    pub robinhood: RobinhoodConfig,
}

impl AppConfig {
    /// 파일에서 설정 로드 후 환경 변수 적용.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// 비밀값 환경 변수 오버라이드.
    fn apply_env(&mut self) {
        env_override(&mut self.schwab.app_key, "SCHWAB_APP_KEY");
        env_override_secret(&mut self.schwab.app_secret, "SCHWAB_APP_SECRET");
        env_override_secret(
            &mut self.schwab.bootstrap_refresh_token,
            "SCHWAB_REFRESH_TOKEN",
        );
        env_override(&mut self.robinhood.username, "ROBINHOOD_USERNAME");
        env_override_secret(&mut self.robinhood.password, "ROBINHOOD_PASSWORD");
        env_override_opt(&mut self.robinhood.mfa_code, "ROBINHOOD_MFA_CODE");
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.schwab.enabled
            && (self.schwab.app_key.is_empty() || self.schwab.app_secret.expose_secret().is_empty())
        {
            return Err(ConfigError::Validation(
                "Schwab 활성화 시 appKey/appSecret 필요".to_string(),
            ));
        }
        if self.robinhood.enabled
            && (self.robinhood.username.is_empty()
                || self.robinhood.password.expose_secret().is_empty())
        {
            return Err(ConfigError::Validation(
                "Robinhood 활성화 시 username/password 필요".to_string(),
            ));
        }
        if !matches!(
            self.robinhood.default_time_in_force.to_lowercase().as_str(),
            "gfd" | "day" | "gtc" | "good_till_cancel" | "good_till_cancelled" | "good_till_canceled"
        ) {
            return Err(ConfigError::Validation(format!(
                "defaultTimeInForce 값이 올바르지 않음: {} (gfd 또는 gtc)",
                self.robinhood.default_time_in_force
            )));
        }
        if self.token_policy.refresh_threshold_days >= self.token_policy.lifetime_days {
            return Err(ConfigError::Validation(
                "갱신 임계는 토큰 수명보다 짧아야 함".to_string(),
            ));
        }
        if self.trading.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "pollIntervalSecs는 0일 수 없음".to_string(),
            ));
        }
        Ok(())
    }

    /// 브로커별 계좌 맵 구성.
    pub fn account_map(&self, brokerage: Brokerage) -> AccountMap {
        match brokerage {
            Brokerage::Schwab => AccountMap::new(
                &self.schwab.accounts,
                &self.schwab.account_by_ticker,
                self.schwab.default_account.clone(),
            ),
            Brokerage::Robinhood => AccountMap::new(
                &self.robinhood.accounts,
                &self.robinhood.account_by_ticker,
                self.robinhood.default_account.clone(),
            ),
        }
    }

    /// 브로커별 지원 거래 세션.
    pub fn supported_sessions(&self, brokerage: Brokerage) -> &[TradingSession] {
        match brokerage {
            Brokerage::Schwab => &self.schwab.supported_sessions,
            Brokerage::Robinhood => &self.robinhood.supported_sessions,
        }
    }

    /// 활성화된 브로커 목록.
    pub fn enabled_brokerages(&self) -> Vec<Brokerage> {
        let mut list = Vec::new();
        if self.schwab.enabled {
            list.push(Brokerage::Schwab);
        }
        if self.robinhood.enabled {
            list.push(Brokerage::Robinhood);
        }
        list
    }
}

// =============================================================================
// 테스트
// =============================================================================
