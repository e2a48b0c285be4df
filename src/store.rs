//! Ledger store for users, IP associations, tracks, bounties, claims and NFTs
//!
//! SQLite persistence behind a single connection. Every read-then-write
//! sequence of the redemption pipeline runs inside one immediate transaction
//! obtained from [`LedgerStore::transaction`]; the free functions in this
//! module accept any `Connection` so they compose both inside and outside a
//! transaction scope.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::ClaimError;

const BUSY_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAddress {
    pub id: Uuid,
    pub address: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bounty {
    pub id: Uuid,
    pub claim_code: String,
    pub is_active: bool,
    pub is_public: bool,
    pub is_random: bool,
    pub max_claim: Option<i64>,
    pub claim_count: i64,
    pub track_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// One row per successful redemption. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: Uuid,
    pub bounty_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nft {
    pub id: Uuid,
    pub number: i64,
    pub track_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a bounty. Bounties are created externally to the
/// redemption core (seeder, tests, admin tooling).
#[derive(Debug, Clone)]
pub struct NewBounty {
    pub claim_code: String,
    pub track_id: Uuid,
    pub is_active: bool,
    pub is_public: bool,
    pub is_random: bool,
    pub max_claim: Option<i64>,
}

// ============================================================================
// LEDGER STORE
// ============================================================================

pub struct LedgerStore {
    conn: Mutex<Connection>,
}

impl LedgerStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ClaimError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, ClaimError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, ClaimError> {
        conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), ClaimError> {
        let conn = self.conn.lock();

        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
            [],
            |row| row.get(0),
        )?;

        if !exists {
            conn.execute_batch(include_str!("../migrations/001_schema.sql"))?;
            info!("Applied migration 001_schema");
        }

        Ok(())
    }

    /// Run `f` inside one immediate (writer) transaction. Commits on `Ok`,
    /// rolls back on `Err`, so a rejection never leaves partial writes.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Transaction) -> Result<T, ClaimError>,
    ) -> Result<T, ClaimError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                // Dropping the transaction rolls it back; make it explicit.
                let _ = tx.rollback();
                Err(e)
            }
        }
    }

    // ========================================================================
    // ENTITY CREATION (external collaborators: seeder, tests, admin CLI)
    // ========================================================================

    pub fn create_user(&self, username: &str) -> Result<User, ClaimError> {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            created_at: Utc::now(),
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
            params![
                user.id.to_string(),
                user.username,
                user.created_at.to_rfc3339()
            ],
        )?;
        Ok(user)
    }

    pub fn attach_ip(&self, user_id: Uuid, address: &str) -> Result<IpAddress, ClaimError> {
        let ip = IpAddress {
            id: Uuid::new_v4(),
            address: address.to_string(),
            user_id,
            created_at: Utc::now(),
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ip_addresses (id, address, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                ip.id.to_string(),
                ip.address,
                ip.user_id.to_string(),
                ip.created_at.to_rfc3339()
            ],
        )?;
        Ok(ip)
    }

    pub fn create_track(&self, title: &str, artist: &str) -> Result<Track, ClaimError> {
        let track = Track {
            id: Uuid::new_v4(),
            title: title.to_string(),
            artist: artist.to_string(),
            created_at: Utc::now(),
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tracks (id, title, artist, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                track.id.to_string(),
                track.title,
                track.artist,
                track.created_at.to_rfc3339()
            ],
        )?;
        Ok(track)
    }

    pub fn insert_nft(&self, track_id: Uuid, number: i64) -> Result<Nft, ClaimError> {
        let nft = Nft {
            id: Uuid::new_v4(),
            number,
            track_id,
            owner_id: None,
            created_at: Utc::now(),
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO nfts (id, number, track_id, owner_id, created_at) VALUES (?1, ?2, ?3, NULL, ?4)",
            params![
                nft.id.to_string(),
                nft.number,
                nft.track_id.to_string(),
                nft.created_at.to_rfc3339()
            ],
        )?;
        Ok(nft)
    }

    pub fn create_bounty(&self, new: NewBounty) -> Result<Bounty, ClaimError> {
        let bounty = Bounty {
            id: Uuid::new_v4(),
            claim_code: new.claim_code,
            is_active: new.is_active,
            is_public: new.is_public,
            is_random: new.is_random,
            max_claim: new.max_claim,
            claim_count: 0,
            track_id: new.track_id,
            created_at: Utc::now(),
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO bounties (id, claim_code, is_active, is_public, is_random, max_claim, claim_count, track_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)",
            params![
                bounty.id.to_string(),
                bounty.claim_code,
                bounty.is_active,
                bounty.is_public,
                bounty.is_random,
                bounty.max_claim,
                bounty.track_id.to_string(),
                bounty.created_at.to_rfc3339()
            ],
        )?;
        Ok(bounty)
    }

    // ========================================================================
    // POINT READS
    // ========================================================================

    pub fn nft(&self, nft_id: Uuid) -> Result<Option<Nft>, ClaimError> {
        let conn = self.conn.lock();
        nft_by_id(&conn, nft_id)
    }

    pub fn bounty(&self, bounty_id: Uuid) -> Result<Option<Bounty>, ClaimError> {
        let conn = self.conn.lock();
        let bounty = conn
            .query_row(
                &format!("{BOUNTY_SELECT} WHERE id = ?1"),
                params![bounty_id.to_string()],
                bounty_from_row,
            )
            .optional()?;
        Ok(bounty)
    }

    pub fn list_active_bounties(&self) -> Result<Vec<Bounty>, ClaimError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("{BOUNTY_SELECT} WHERE is_active = 1 ORDER BY created_at"))?;
        let bounties = stmt
            .query_map([], bounty_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bounties)
    }

    /// Committed claims for a bounty, straight from the ledger table.
    pub fn claims_for_bounty(&self, bounty_id: Uuid) -> Result<i64, ClaimError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM claims WHERE bounty_id = ?1",
            params![bounty_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn owned_nfts(&self, track_id: Uuid) -> Result<i64, ClaimError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nfts WHERE track_id = ?1 AND owner_id IS NOT NULL",
            params![track_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ============================================================================
// TRANSACTION-SCOPED HELPERS
// ============================================================================

const BOUNTY_SELECT: &str = "SELECT id, claim_code, is_active, is_public, is_random, max_claim, claim_count, track_id, created_at FROM bounties";
const NFT_SELECT: &str = "SELECT id, number, track_id, owner_id, created_at FROM nfts";

pub fn user_exists(conn: &Connection, user_id: Uuid) -> Result<bool, ClaimError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        params![user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Active bounty whose stored code matches `claim_code` verbatim.
pub fn bounty_by_code(conn: &Connection, claim_code: &str) -> Result<Option<Bounty>, ClaimError> {
    let bounty = conn
        .query_row(
            &format!("{BOUNTY_SELECT} WHERE claim_code = ?1 AND is_active = 1"),
            params![claim_code],
            bounty_from_row,
        )
        .optional()?;
    Ok(bounty)
}

/// Timestamp of the user's most recent claim against any bounty.
pub fn latest_claim_at(
    conn: &Connection,
    user_id: Uuid,
) -> Result<Option<DateTime<Utc>>, ClaimError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT timestamp FROM claims WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT 1",
            params![user_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(parse_ts(&s)?)),
        None => Ok(None),
    }
}

pub fn has_claim(conn: &Connection, user_id: Uuid, bounty_id: Uuid) -> Result<bool, ClaimError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM claims WHERE user_id = ?1 AND bounty_id = ?2)",
        params![user_id.to_string(), bounty_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn user_has_ip(conn: &Connection, user_id: Uuid) -> Result<bool, ClaimError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM ip_addresses WHERE user_id = ?1)",
        params![user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Whether any account sharing one of the user's recorded IP addresses
/// already holds a claim against this bounty. Includes the user itself,
/// which the dedup check has already ruled out by the time this runs.
pub fn ip_peer_claimed(
    conn: &Connection,
    user_id: Uuid,
    bounty_id: Uuid,
) -> Result<bool, ClaimError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM claims c
            JOIN ip_addresses peer ON peer.user_id = c.user_id
            JOIN ip_addresses mine ON mine.address = peer.address
            WHERE c.bounty_id = ?1 AND mine.user_id = ?2
        )",
        params![bounty_id.to_string(), user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Conditional quota increment. The guard re-validates the count inside the
/// UPDATE itself, so a stale read can never push the count past `max_claim`.
/// Returns false when the quota is already exhausted.
pub fn reserve_quota(conn: &Connection, bounty_id: Uuid) -> Result<bool, ClaimError> {
    let updated = conn.execute(
        "UPDATE bounties SET claim_count = claim_count + 1
         WHERE id = ?1 AND (max_claim IS NULL OR claim_count < max_claim)",
        params![bounty_id.to_string()],
    )?;
    Ok(updated > 0)
}

/// Unowned NFTs of a track, lowest number first.
pub fn available_nfts(conn: &Connection, track_id: Uuid) -> Result<Vec<Nft>, ClaimError> {
    let mut stmt = conn.prepare(&format!(
        "{NFT_SELECT} WHERE track_id = ?1 AND owner_id IS NULL ORDER BY number ASC"
    ))?;
    let nfts = stmt
        .query_map(params![track_id.to_string()], nft_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(nfts)
}

/// Assign ownership guarded by "still unowned". Returns false when a
/// concurrent allocation won the race for this NFT.
pub fn assign_nft(conn: &Connection, nft_id: Uuid, owner_id: Uuid) -> Result<bool, ClaimError> {
    let updated = conn.execute(
        "UPDATE nfts SET owner_id = ?1 WHERE id = ?2 AND owner_id IS NULL",
        params![owner_id.to_string(), nft_id.to_string()],
    )?;
    Ok(updated > 0)
}

/// Append one claim row. A unique violation on (user_id, bounty_id) means a
/// concurrent duplicate slipped past the read check and is reported as
/// `AlreadyClaimed`.
pub fn record_claim(
    conn: &Connection,
    user_id: Uuid,
    bounty_id: Uuid,
    at: DateTime<Utc>,
) -> Result<Claim, ClaimError> {
    let claim = Claim {
        id: Uuid::new_v4(),
        timestamp: at,
        user_id,
        bounty_id,
    };
    let result = conn.execute(
        "INSERT INTO claims (id, timestamp, user_id, bounty_id) VALUES (?1, ?2, ?3, ?4)",
        params![
            claim.id.to_string(),
            claim.timestamp.to_rfc3339(),
            claim.user_id.to_string(),
            claim.bounty_id.to_string()
        ],
    );
    match result {
        Ok(_) => Ok(claim),
        Err(rusqlite::Error::SqliteFailure(f, _)) if f.code == ErrorCode::ConstraintViolation => {
            Err(ClaimError::AlreadyClaimed)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn nft_by_id(conn: &Connection, nft_id: Uuid) -> Result<Option<Nft>, ClaimError> {
    let nft = conn
        .query_row(
            &format!("{NFT_SELECT} WHERE id = ?1"),
            params![nft_id.to_string()],
            nft_from_row,
        )
        .optional()?;
    Ok(nft)
}

/// Owner swap guarded by the observed current owner.
pub fn reassign_nft(
    conn: &Connection,
    nft_id: Uuid,
    from_owner: Uuid,
    to_owner: Uuid,
) -> Result<bool, ClaimError> {
    let updated = conn.execute(
        "UPDATE nfts SET owner_id = ?1 WHERE id = ?2 AND owner_id = ?3",
        params![to_owner.to_string(), nft_id.to_string(), from_owner.to_string()],
    )?;
    Ok(updated > 0)
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) => Uuid::parse_str(&s)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, ClaimError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            ClaimError::Storage(rusqlite::Error::FromSqlConversionFailure(
                0,
                Type::Text,
                Box::new(e),
            ))
        })
}

fn bounty_from_row(row: &Row<'_>) -> rusqlite::Result<Bounty> {
    Ok(Bounty {
        id: uuid_col(row, 0)?,
        claim_code: row.get(1)?,
        is_active: row.get(2)?,
        is_public: row.get(3)?,
        is_random: row.get(4)?,
        max_claim: row.get(5)?,
        claim_count: row.get(6)?,
        track_id: uuid_col(row, 7)?,
        created_at: ts_col(row, 8)?,
    })
}

fn nft_from_row(row: &Row<'_>) -> rusqlite::Result<Nft> {
    Ok(Nft {
        id: uuid_col(row, 0)?,
        number: row.get(1)?,
        track_id: uuid_col(row, 2)?,
        owner_id: opt_uuid_col(row, 3)?,
        created_at: ts_col(row, 4)?,
    })
}
