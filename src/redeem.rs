//! Redemption engine
//!
//! Runs a claim attempt as one logical transaction: caller check, bounty
//! resolution, fraud checks, quota reservation, NFT allocation and the claim
//! ledger append either all commit together or none of them do. Store-level
//! contention re-runs the whole transaction up to a bound before surfacing
//! `Contention`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Transaction;
use tracing::{debug, info};
use uuid::Uuid;

use crate::allocate;
use crate::auth::Caller;
use crate::config::Config;
use crate::error::ClaimError;
use crate::fraud::FraudGuard;
use crate::store::{self, LedgerStore, Nft};

#[derive(Clone)]
pub struct RedemptionEngine {
    store: Arc<LedgerStore>,
    fraud: FraudGuard,
    max_pick_retries: u32,
    max_tx_retries: u32,
}

impl RedemptionEngine {
    pub fn new(store: Arc<LedgerStore>, config: &Config) -> Self {
        Self {
            store,
            fraud: FraudGuard::new(&config.fraud),
            max_pick_retries: config.allocation.max_pick_retries,
            max_tx_retries: config.allocation.max_tx_retries,
        }
    }

    /// Redeem a claim code for one NFT of the bounty's track.
    pub fn claim(&self, caller: &Caller, claim_code: &str) -> Result<Nft, ClaimError> {
        let mut attempt = 0;
        loop {
            let now = Utc::now();
            let result = self
                .store
                .transaction(|tx| self.claim_in_tx(tx, caller.user_id, claim_code, now));

            match result {
                Ok(nft) => {
                    info!(
                        "user {} claimed nft #{} ({})",
                        caller.user_id, nft.number, nft.id
                    );
                    return Ok(nft);
                }
                Err(e) if e.is_retryable() && attempt < self.max_tx_retries => {
                    attempt += 1;
                    debug!("claim transaction contended, retry {attempt}");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The claim pipeline. Fixed order, each failure short-circuits and
    /// aborts the enclosing transaction.
    fn claim_in_tx(
        &self,
        tx: &Transaction,
        user_id: Uuid,
        claim_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Nft, ClaimError> {
        if !store::user_exists(tx, user_id)? {
            return Err(ClaimError::Unauthenticated);
        }

        let bounty =
            store::bounty_by_code(tx, claim_code)?.ok_or(ClaimError::InvalidOrInactiveBounty)?;

        self.fraud.check(tx, user_id, &bounty, now)?;

        if !store::reserve_quota(tx, bounty.id)? {
            return Err(ClaimError::QuotaExceeded);
        }

        let nft = allocate::allocate(tx, &bounty, user_id, self.max_pick_retries)?;

        store::record_claim(tx, user_id, bounty.id, now)?;

        Ok(nft)
    }
}
