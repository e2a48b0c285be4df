//! Claim and transfer error taxonomy
//!
//! Every variant except `Storage` is an expected, user-facing rejection.
//! Rejections abort the enclosing transaction, so no partial writes survive.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("user not found")]
    Unauthenticated,

    #[error("a bounty was already claimed by this account during the cooldown window")]
    CooldownActive,

    #[error("invalid claim code or inactive bounty")]
    InvalidOrInactiveBounty,

    #[error("maximum claims for this bounty reached")]
    QuotaExceeded,

    #[error("this account has already claimed this bounty")]
    AlreadyClaimed,

    #[error("bounty already claimed from this IP address")]
    IpAlreadyClaimed,

    #[error("no IP address associated with this account")]
    NoIpOnRecord,

    #[error("no available NFTs for claiming")]
    NoAvailableNft,

    #[error("nft not found")]
    NftNotFound,

    #[error("nft is not owned by the requester")]
    NotOwner,

    #[error("recipient account not found")]
    RecipientNotFound,

    /// Optimistic-concurrency retries exhausted. Never reported as success
    /// or as a business rejection.
    #[error("store contention, please retry")]
    Contention,

    #[error("storage error: {0}")]
    Storage(rusqlite::Error),
}

impl ClaimError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            ClaimError::Unauthenticated => "UNAUTHENTICATED",
            ClaimError::CooldownActive => "COOLDOWN_ACTIVE",
            ClaimError::InvalidOrInactiveBounty => "INVALID_OR_INACTIVE_BOUNTY",
            ClaimError::QuotaExceeded => "QUOTA_EXCEEDED",
            ClaimError::AlreadyClaimed => "ALREADY_CLAIMED",
            ClaimError::IpAlreadyClaimed => "IP_ALREADY_CLAIMED",
            ClaimError::NoIpOnRecord => "NO_IP_ON_RECORD",
            ClaimError::NoAvailableNft => "NO_AVAILABLE_NFT",
            ClaimError::NftNotFound => "NFT_NOT_FOUND",
            ClaimError::NotOwner => "NOT_OWNER",
            ClaimError::RecipientNotFound => "RECIPIENT_NOT_FOUND",
            ClaimError::Contention => "CONTENTION",
            ClaimError::Storage(_) => "STORAGE",
        }
    }

    /// Whether re-running the transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClaimError::Contention)
    }
}

impl From<rusqlite::Error> for ClaimError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == ErrorCode::DatabaseBusy || f.code == ErrorCode::DatabaseLocked =>
            {
                ClaimError::Contention
            }
            _ => ClaimError::Storage(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_maps_to_contention() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let err: ClaimError = busy.into();
        assert!(matches!(err, ClaimError::Contention));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ClaimError::QuotaExceeded.code(), "QUOTA_EXCEEDED");
        assert_eq!(ClaimError::AlreadyClaimed.code(), "ALREADY_CLAIMED");
        assert!(!ClaimError::QuotaExceeded.is_retryable());
    }
}
