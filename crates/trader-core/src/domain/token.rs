//! OAuth 토큰 레코드와 수명 관리 타입.
//!
//! 브로커가 내려주는 토큰 자체에는 만료 정보가 없거나 신뢰할 수 없는
//! 경우가 있어, 발급 시각과 정책([`crate::config::TokenPolicy`])에서
//! 만료를 파생합니다. 토큰 원문은 [`SecretString`]으로 보관하여 로그와
//! Debug 출력에 노출되지 않습니다.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::fmt;

// =============================================================================
// 토큰 상태
// =============================================================================

/// 자격증명의 수명 주기 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPhase {
    /// 저장된 토큰 없음
    Missing,
    /// 유효, 갱신 임계 이전
    Valid,
    /// 유효하나 갱신 임계 초과, 선제 갱신 대상
    NearExpiry,
    /// 수명 만료, 재인증 필요
    Expired,
    /// 브로커가 거부한 토큰, 재인증 전까지 사용 불가
    Invalid,
}

impl fmt::Display for TokenPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Missing => "missing",
            Self::Valid => "valid",
            Self::NearExpiry => "near_expiry",
            Self::Expired => "expired",
            Self::Invalid => "invalid",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// 토큰 레코드
// =============================================================================

/// 발급된 토큰 한 벌.
///
/// `issued_at` 기준으로 만료를 파생하므로, 갱신에 성공할 때마다 새
/// 레코드를 만들어 `issued_at`을 현재 시각으로 초기화합니다.
#[derive(Clone)]
pub struct TokenRecord {
    /// Bearer 액세스 토큰
    pub access_token: SecretString,
    /// 갱신용 리프레시 토큰
    pub refresh_token: SecretString,
    /// 발급(또는 마지막 갱신 성공) 시각
    pub issued_at: DateTime<Utc>,
    /// 마지막 갱신 시도 시각 (성공 여부 무관)
    pub last_refresh_attempt: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// 발급 시각을 현재로 하는 새 레코드 생성.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            issued_at: Utc::now(),
            last_refresh_attempt: None,
        }
    }

    /// 정책상 수명 기준 만료 시각.
    pub fn expires_at(&self, lifetime: Duration) -> DateTime<Utc> {
        self.issued_at + lifetime
    }

    /// 발급 후 경과 시간.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.issued_at
    }

    /// 수명 만료 여부.
    pub fn is_expired(&self, now: DateTime<Utc>, lifetime: Duration) -> bool {
        now >= self.expires_at(lifetime)
    }

    /// 갱신 임계 초과 여부. 만료된 토큰은 갱신이 아니라 재인증 대상.
    pub fn needs_refresh(&self, now: DateTime<Utc>, refresh_threshold: Duration) -> bool {
        self.age(now) >= refresh_threshold
    }

    /// 현재 수명 단계 판정.
    pub fn phase(&self, now: DateTime<Utc>, lifetime: Duration, refresh_threshold: Duration) -> TokenPhase {
        if self.is_expired(now, lifetime) {
            TokenPhase::Expired
        } else if self.needs_refresh(now, refresh_threshold) {
            TokenPhase::NearExpiry
        } else {
            TokenPhase::Valid
        }
    }

    /// Authorization 헤더 값.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("issued_at", &self.issued_at)
            .field("last_refresh_attempt", &self.last_refresh_attempt)
            .finish()
    }
}

// =============================================================================
// 상태 리포트
// =============================================================================

/// 운영자 확인용 토큰 상태 요약 (CLI `tokens` 서브커맨드 출력).
#[derive(Debug, Clone, Serialize)]
pub struct TokenStatusReport {
    pub brokerage: String,
    pub account_id: String,
    pub phase: TokenPhase,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// 권장 조치 (갱신 필요, 재인증 필요 등)
    pub recommendation: String,
}

impl TokenStatusReport {
    /// 단계별 권장 조치 문구.
    pub fn recommendation_for(phase: TokenPhase) -> &'static str {
        match phase {
            TokenPhase::Missing => "인증 필요: 토큰이 없습니다",
            TokenPhase::Valid => "정상: 조치 불필요",
            TokenPhase::NearExpiry => "갱신 권장: 다음 실행 시 자동 갱신됩니다",
            TokenPhase::Expired => "재인증 필요: 토큰 수명이 만료되었습니다",
            TokenPhase::Invalid => "재인증 필요: 브로커가 토큰을 거부했습니다",
        }
    }
}

// =============================================================================
// 테스트
// =============================================================================
