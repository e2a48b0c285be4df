//! Fraud checks for claim attempts
//!
//! Purely read-only evaluation of the claim ledger and IP associations.
//! Must run inside the same transaction as the subsequent writes so a
//! concurrent claim cannot pass the checks before the first one commits.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::config::FraudConfig;
use crate::error::ClaimError;
use crate::store::{self, Bounty};

#[derive(Debug, Clone)]
pub struct FraudGuard {
    cooldown: Duration,
    require_ip: bool,
}

impl FraudGuard {
    pub fn new(config: &FraudConfig) -> Self {
        Self {
            cooldown: Duration::hours(config.cooldown_hours as i64),
            require_ip: config.require_ip,
        }
    }

    /// Evaluate a claim attempt. Checks run in a fixed order and each
    /// failure is a hard stop:
    /// 1. cooldown since the user's most recent claim (any bounty)
    /// 2. duplicate claim for this (user, bounty) pair
    /// 3. IP collusion across accounts sharing the user's recorded address
    pub fn check(
        &self,
        conn: &Connection,
        user_id: Uuid,
        bounty: &Bounty,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        if let Some(last) = store::latest_claim_at(conn, user_id)? {
            if now - last < self.cooldown {
                debug!("claim by {} denied: cooldown until {}", user_id, last + self.cooldown);
                return Err(ClaimError::CooldownActive);
            }
        }

        if store::has_claim(conn, user_id, bounty.id)? {
            debug!("claim by {} denied: already claimed bounty {}", user_id, bounty.id);
            return Err(ClaimError::AlreadyClaimed);
        }

        if !store::user_has_ip(conn, user_id)? {
            if self.require_ip {
                debug!("claim by {} denied: no IP on record", user_id);
                return Err(ClaimError::NoIpOnRecord);
            }
            // Without a recorded address there is nothing to correlate.
            return Ok(());
        }

        if store::ip_peer_claimed(conn, user_id, bounty.id)? {
            debug!("claim by {} denied: bounty {} claimed from same IP", user_id, bounty.id);
            return Err(ClaimError::IpAlreadyClaimed);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LedgerStore, NewBounty};

    fn guard(cooldown_hours: u64, require_ip: bool) -> FraudGuard {
        FraudGuard::new(&FraudConfig {
            cooldown_hours,
            require_ip,
        })
    }

    fn fixture() -> (LedgerStore, Uuid, Bounty, Bounty) {
        let store = LedgerStore::in_memory().unwrap();
        let user = store.create_user("collector").unwrap();
        store.attach_ip(user.id, "203.0.113.7").unwrap();
        let track = store.create_track("Midnight Echo", "Velvet Fox").unwrap();
        let bounty_a = store
            .create_bounty(NewBounty {
                claim_code: "aaaa000011112222".to_string(),
                track_id: track.id,
                is_active: true,
                is_public: false,
                is_random: false,
                max_claim: None,
            })
            .unwrap();
        let bounty_b = store
            .create_bounty(NewBounty {
                claim_code: "bbbb000011112222".to_string(),
                track_id: track.id,
                is_active: true,
                is_public: false,
                is_random: false,
                max_claim: None,
            })
            .unwrap();
        (store, user.id, bounty_a, bounty_b)
    }

    #[test]
    fn test_cooldown_denies_recent_claimer() {
        let (store, user, bounty_a, bounty_b) = fixture();
        let now = Utc::now();
        store
            .transaction(|tx| {
                store::record_claim(tx, user, bounty_a.id, now - Duration::hours(2)).map(|_| ())
            })
            .unwrap();

        let err = store
            .transaction(|tx| guard(24, true).check(tx, user, &bounty_b, now))
            .unwrap_err();
        assert!(matches!(err, ClaimError::CooldownActive));
    }

    #[test]
    fn test_cooldown_expires_at_window_boundary() {
        let (store, user, bounty_a, bounty_b) = fixture();
        let now = Utc::now();
        store
            .transaction(|tx| {
                store::record_claim(tx, user, bounty_a.id, now - Duration::hours(24)).map(|_| ())
            })
            .unwrap();

        // Exactly 24h later the cooldown no longer applies.
        store
            .transaction(|tx| guard(24, true).check(tx, user, &bounty_b, now))
            .unwrap();
    }

    #[test]
    fn test_duplicate_claim_denied_regardless_of_age() {
        let (store, user, bounty_a, _) = fixture();
        let now = Utc::now();
        store
            .transaction(|tx| {
                store::record_claim(tx, user, bounty_a.id, now - Duration::days(90)).map(|_| ())
            })
            .unwrap();

        let err = store
            .transaction(|tx| guard(24, true).check(tx, user, &bounty_a, now))
            .unwrap_err();
        assert!(matches!(err, ClaimError::AlreadyClaimed));
    }

    #[test]
    fn test_ip_collusion_denied() {
        let (store, user, bounty_a, _) = fixture();
        let accomplice = store.create_user("accomplice").unwrap();
        store.attach_ip(accomplice.id, "203.0.113.7").unwrap();
        let now = Utc::now();
        store
            .transaction(|tx| store::record_claim(tx, user, bounty_a.id, now).map(|_| ()))
            .unwrap();

        let err = store
            .transaction(|tx| guard(24, true).check(tx, accomplice.id, &bounty_a, now))
            .unwrap_err();
        assert!(matches!(err, ClaimError::IpAlreadyClaimed));
    }

    #[test]
    fn test_distinct_ip_passes() {
        let (store, user, bounty_a, _) = fixture();
        let stranger = store.create_user("stranger").unwrap();
        store.attach_ip(stranger.id, "198.51.100.1").unwrap();
        let now = Utc::now();
        store
            .transaction(|tx| store::record_claim(tx, user, bounty_a.id, now).map(|_| ()))
            .unwrap();

        store
            .transaction(|tx| guard(24, true).check(tx, stranger.id, &bounty_a, now))
            .unwrap();
    }

    #[test]
    fn test_missing_ip_depends_on_config() {
        let (store, _, bounty_a, _) = fixture();
        let ghost = store.create_user("ghost").unwrap();
        let now = Utc::now();

        let err = store
            .transaction(|tx| guard(24, true).check(tx, ghost.id, &bounty_a, now))
            .unwrap_err();
        assert!(matches!(err, ClaimError::NoIpOnRecord));

        store
            .transaction(|tx| guard(24, false).check(tx, ghost.id, &bounty_a, now))
            .unwrap();
    }
}
