//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - Server binding settings
//! - Ledger database path
//! - Fraud check parameters (cooldown window, IP requirement)
//! - Allocation retry bounds

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub fraud: FraudConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Ledger database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "bounty.db".to_string(),
        }
    }
}

/// Fraud check parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudConfig {
    /// Minimum time between two successful claims by the same account
    pub cooldown_hours: u64,
    /// Deny claims from accounts that have no recorded IP address.
    /// When false, accounts without an IP skip the collusion check.
    pub require_ip: bool,
}

/// Allocation and transaction retry bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Re-picks after losing an NFT to a concurrent claim
    pub max_pick_retries: u32,
    /// Re-runs of a claim transaction after store contention
    pub max_tx_retries: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_pick_retries: 3,
            max_tx_retries: 3,
        }
    }
}

impl Config {
    /// Load from config.toml or use defaults
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load from specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            // Use embedded default config
            toml::from_str(DEFAULT_CONFIG).context("Failed to parse default config")
        }
    }

    /// Database path (BOUNTY_DB env var takes precedence)
    pub fn database_path(&self) -> String {
        match std::env::var("BOUNTY_DB") {
            Ok(path) if !path.is_empty() => path,
            _ => self.database.path.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        // The embedded default config is validated at compile time,
        // so this should never fail. Using a fallback for robustness.
        toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig::default(),
            fraud: FraudConfig {
                cooldown_hours: 24,
                require_ip: true,
            },
            allocation: AllocationConfig::default(),
        })
    }
}
