//! NFT Bounty - Redeem secret claim codes for limited track collectibles
//!
//! Each media track carries a numbered pool of NFTs. A bounty attaches a
//! secret claim code to one track; redeeming the code grants exclusive
//! ownership of one NFT from the pool, picked sequentially or at random.
//!
//! # How it works
//!
//! 1. Tracks, NFT pools and bounties are created externally (seeder, admin)
//! 2. An upstream gateway authenticates users and forwards their identity
//! 3. A user posts a claim code; the redemption engine validates and, in one
//!    transaction, reserves quota, allocates an NFT and appends a claim
//! 4. Owners can pass collectibles on to other users peer-to-peer
//!
//! # Anti-abuse measures
//!
//! - One successful claim per account per cooldown window (24h by default)
//! - At most one claim per account per bounty, ever
//! - Accounts sharing an IP address count as one claimer per bounty
//! - Optional quota caps the total redemptions of a bounty
//! - Allocation is guarded so each NFT is granted exactly once

pub mod allocate;
pub mod auth;
pub mod config;
pub mod error;
pub mod fraud;
pub mod redeem;
pub mod seed;
pub mod server;
pub mod store;
pub mod transfer;

pub use auth::Caller;
pub use config::Config;
pub use error::ClaimError;
pub use fraud::FraudGuard;
pub use redeem::RedemptionEngine;
pub use store::{Bounty, Claim, LedgerStore, NewBounty, Nft, Track, User};
pub use transfer::send_nft;
