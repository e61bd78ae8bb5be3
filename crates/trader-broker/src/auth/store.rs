//! 토큰 파일 저장소.
//!
//! 계좌당 JSON 파일 하나를 유지합니다. 손상되거나 없는 파일은 치명적
//! 오류가 아니라 "토큰 없음"으로 취급하여 재인증을 유도합니다.

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use trader_core::{BrokerError, Brokerage, TokenRecord};

// =============================================================================
// 저장 포맷
// =============================================================================

/// 디스크 직렬화용 DTO. [`TokenRecord`]의 SecretString은 직렬화가
/// 막혀 있어 저장 시점에만 평문으로 풀어서 기록합니다.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTokenRecord {
    access_token: String,
    refresh_token: String,
    issued_at: DateTime<Utc>,
    last_refresh_attempt: Option<DateTime<Utc>>,
}

impl From<&TokenRecord> for StoredTokenRecord {
    fn from(record: &TokenRecord) -> Self {
        Self {
            access_token: record.access_token.expose_secret().to_string(),
            refresh_token: record.refresh_token.expose_secret().to_string(),
            issued_at: record.issued_at,
            last_refresh_attempt: record.last_refresh_attempt,
        }
    }
}

impl From<StoredTokenRecord> for TokenRecord {
    fn from(stored: StoredTokenRecord) -> Self {
        let mut record = TokenRecord::new(stored.access_token, stored.refresh_token);
        record.issued_at = stored.issued_at;
        record.last_refresh_attempt = stored.last_refresh_attempt;
        record
    }
}

// =============================================================================
// 저장소 트레이트
// =============================================================================

/// 토큰 영속화 추상화. 수명 관리자는 이 트레이트로만 저장소를 봅니다.
pub trait TokenStore: Send + Sync {
    /// 저장된 토큰 로드. 없거나 손상되면 None.
    fn load(&self, brokerage: Brokerage, account_id: &str) -> Option<TokenRecord>;

    /// 토큰 저장. 수명 전이 중 저장 실패는 해당 계좌의 오류로 전파됩니다.
    fn save(
        &self,
        brokerage: Brokerage,
        account_id: &str,
        record: &TokenRecord,
    ) -> Result<(), BrokerError>;

    /// 토큰 삭제 (무효화 영속).
    fn remove(&self, brokerage: Brokerage, account_id: &str) -> Result<(), BrokerError>;
}

// =============================================================================
// 파일 저장소
// =============================================================================

/// 디렉터리 하나에 `<브로커>_<계좌>.json` 파일을 쓰는 저장소.
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, brokerage: Brokerage, account_id: &str) -> PathBuf {
        let sanitized: String = account_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{}_{}.json", brokerage.code(), sanitized))
    }

    fn io_error(context: &str, err: std::io::Error) -> BrokerError {
        BrokerError::TokenStore(format!("{}: {}", context, err))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, brokerage: Brokerage, account_id: &str) -> Option<TokenRecord> {
        let path = self.path_for(brokerage, account_id);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<StoredTokenRecord>(&raw) {
            Ok(stored) => Some(stored.into()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "토큰 파일 손상, 없음으로 처리");
                None
            }
        }
    }

    fn save(
        &self,
        brokerage: Brokerage,
        account_id: &str,
        record: &TokenRecord,
    ) -> Result<(), BrokerError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Self::io_error("토큰 디렉터리 생성 실패", e))?;
        let path = self.path_for(brokerage, account_id);
        let stored = StoredTokenRecord::from(record);
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| BrokerError::TokenStore(format!("토큰 직렬화 실패: {}", e)))?;
        // 쓰다 만 파일이 남지 않도록 임시 파일에 쓴 뒤 교체
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| Self::io_error("토큰 파일 쓰기 실패", e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Self::io_error("토큰 파일 교체 실패", e))?;
        Ok(())
    }

    fn remove(&self, brokerage: Brokerage, account_id: &str) -> Result<(), BrokerError> {
        let path = self.path_for(brokerage, account_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error("토큰 파일 삭제 실패", e)),
        }
    }
}

// =============================================================================
// 테스트
// =============================================================================
