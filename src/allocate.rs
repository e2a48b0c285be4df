//! NFT allocation
//!
//! Selects one unowned NFT from the bounty's track and assigns it to the
//! claiming user. The assignment is a conditional update guarded by "still
//! unowned"; losing that race re-selects from the remaining pool instead of
//! failing the whole claim.

use rand::Rng;
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::error::ClaimError;
use crate::store::{self, Bounty, Nft};

/// Pick and assign one NFT. Selection policy: uniform random among the
/// available pool when `bounty.is_random`, otherwise the lowest number.
pub fn allocate(
    conn: &Connection,
    bounty: &Bounty,
    user_id: Uuid,
    max_pick_retries: u32,
) -> Result<Nft, ClaimError> {
    for attempt in 0..=max_pick_retries {
        let available = store::available_nfts(conn, bounty.track_id)?;
        if available.is_empty() {
            return Err(ClaimError::NoAvailableNft);
        }

        let pick = if bounty.is_random {
            let idx = rand::thread_rng().gen_range(0..available.len());
            &available[idx]
        } else {
            // available_nfts returns lowest number first
            &available[0]
        };

        if store::assign_nft(conn, pick.id, user_id)? {
            return Ok(Nft {
                owner_id: Some(user_id),
                ..pick.clone()
            });
        }

        debug!(
            "nft {} taken by a concurrent claim, re-picking (attempt {})",
            pick.id, attempt
        );
    }

    Err(ClaimError::NoAvailableNft)
}
