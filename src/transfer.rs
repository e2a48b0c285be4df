//! Peer-to-peer NFT transfer
//!
//! Lets an NFT's current owner reassign it to another known user. No quota
//! or fraud logic applies; the only concurrency-sensitive step is the owner
//! swap itself, guarded by the observed current owner.

use tracing::info;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::ClaimError;
use crate::store::{self, LedgerStore, Nft};

pub fn send_nft(
    store: &LedgerStore,
    caller: &Caller,
    nft_id: Uuid,
    new_owner_id: Uuid,
) -> Result<Nft, ClaimError> {
    let nft = store.transaction(|tx| {
        if !store::user_exists(tx, caller.user_id)? {
            return Err(ClaimError::Unauthenticated);
        }

        let nft = store::nft_by_id(tx, nft_id)?.ok_or(ClaimError::NftNotFound)?;
        if nft.owner_id != Some(caller.user_id) {
            return Err(ClaimError::NotOwner);
        }

        if !store::user_exists(tx, new_owner_id)? {
            return Err(ClaimError::RecipientNotFound);
        }

        if !store::reassign_nft(tx, nft_id, caller.user_id, new_owner_id)? {
            // Ownership moved between the read and the swap.
            return Err(ClaimError::NotOwner);
        }

        Ok(Nft {
            owner_id: Some(new_owner_id),
            ..nft
        })
    })?;

    info!(
        "nft #{} ({}) transferred from {} to {}",
        nft.number, nft.id, caller.user_id, new_owner_id
    );
    Ok(nft)
}
