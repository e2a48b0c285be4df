//! Demo data generation
//!
//! Populates a ledger with users (each with a recorded IP), tracks carrying
//! a numbered NFT pool, and claim-code bounties on a fraction of tracks.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::error::ClaimError;
use crate::store::{Bounty, LedgerStore, NewBounty, User};

pub const NFTS_PER_TRACK: i64 = 50;
const BOUNTY_PROBABILITY: f64 = 0.4;

const ADJECTIVES: &[&str] = &[
    "velvet", "neon", "rusty", "midnight", "golden", "electric", "lonely", "crimson", "silent",
    "wild",
];
const NOUNS: &[&str] = &[
    "echo", "harbor", "fox", "orchid", "satellite", "ember", "mirage", "cascade", "lantern",
    "meteor",
];

#[derive(Debug, Default)]
pub struct SeedReport {
    pub users: Vec<User>,
    pub tracks: usize,
    pub nfts: usize,
    pub bounties: Vec<Bounty>,
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn two_word_name(rng: &mut impl Rng) -> String {
    let adjective = ADJECTIVES.choose(rng).unwrap_or(&"velvet");
    let noun = NOUNS.choose(rng).unwrap_or(&"echo");
    format!("{} {}", capitalize(adjective), capitalize(noun))
}

fn claim_code(rng: &mut impl Rng) -> String {
    hex::encode(rng.gen::<[u8; 8]>())
}

/// Populate `store` with demo data. Every user gets one recorded IP so the
/// collusion check has something to correlate.
pub fn run(store: &LedgerStore, tracks: usize, users: usize) -> Result<SeedReport, ClaimError> {
    let mut rng = rand::thread_rng();
    let mut report = SeedReport::default();

    for i in 0..users {
        let noun = NOUNS.choose(&mut rng).unwrap_or(&"echo");
        let username = format!("{}_{}_{}", ADJECTIVES.choose(&mut rng).unwrap_or(&"wild"), noun, i);
        let user = store.create_user(&username)?;
        let address = format!(
            "10.{}.{}.{}",
            rng.gen_range(0..=255u8),
            rng.gen_range(0..=255u8),
            rng.gen_range(1..=254u8)
        );
        store.attach_ip(user.id, &address)?;
        report.users.push(user);
    }

    for _ in 0..tracks {
        let track = store.create_track(&two_word_name(&mut rng), &two_word_name(&mut rng))?;
        for number in 1..=NFTS_PER_TRACK {
            store.insert_nft(track.id, number)?;
            report.nfts += 1;
        }
        report.tracks += 1;

        if rng.gen_bool(BOUNTY_PROBABILITY) {
            let bounty = store.create_bounty(NewBounty {
                claim_code: claim_code(&mut rng),
                track_id: track.id,
                is_active: true,
                is_public: rng.gen_bool(0.5),
                is_random: rng.gen_bool(0.5),
                max_claim: if rng.gen_bool(0.3) {
                    None
                } else {
                    Some(rng.gen_range(1..=10))
                },
            })?;
            report.bounties.push(bounty);
        }
    }

    info!(
        "Seeded {} users, {} tracks, {} nfts, {} bounties",
        report.users.len(),
        report.tracks,
        report.nfts,
        report.bounties.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_populates_ledger() {
        let store = LedgerStore::in_memory().unwrap();
        let report = run(&store, 4, 3).unwrap();

        assert_eq!(report.users.len(), 3);
        assert_eq!(report.tracks, 4);
        assert_eq!(report.nfts, 4 * NFTS_PER_TRACK as usize);

        for bounty in &report.bounties {
            assert!(bounty.is_active);
            assert_eq!(bounty.claim_code.len(), 16);
            // Seeded bounties are immediately claimable.
            let found = store
                .transaction(|tx| crate::store::bounty_by_code(tx, &bounty.claim_code))
                .unwrap();
            assert!(found.is_some());
        }
    }

    #[test]
    fn test_claim_codes_are_unique_hex() {
        let mut rng = rand::thread_rng();
        let a = claim_code(&mut rng);
        let b = claim_code(&mut rng);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
