//! NFT Bounty admin CLI
//!
//! Operator tooling around the ledger: seed demo data, list claim codes.

use clap::{Parser, Subcommand};
use nft_bounty::{seed, Config, LedgerStore};

#[derive(Parser)]
#[command(name = "bounty")]
#[command(author = "CortexLM")]
#[command(version)]
#[command(about = "NFT Bounty - operate the claim ledger", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Ledger database path (defaults to the configured path)
    #[arg(long, env = "BOUNTY_DB", global = true)]
    db: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate the ledger with demo users, tracks, NFT pools and bounties
    Seed {
        /// Number of tracks to create (each with a 50-NFT pool)
        #[arg(long, default_value = "5")]
        tracks: usize,

        /// Number of demo users to create
        #[arg(long, default_value = "10")]
        users: usize,
    },

    /// List active bounties and their claim codes
    Codes,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("debug").init();
    }

    let config = Config::load()?;
    let db_path = cli.db.unwrap_or_else(|| config.database_path());
    let store = LedgerStore::new(&db_path)?;

    match cli.command {
        Commands::Seed { tracks, users } => {
            let report = seed::run(&store, tracks, users)?;
            println!(
                "Seeded {} users, {} tracks ({} NFTs), {} bounties into {}",
                report.users.len(),
                report.tracks,
                report.nfts,
                report.bounties.len(),
                db_path
            );
            for user in &report.users {
                println!("  user {}  {}", user.id, user.username);
            }
            for bounty in &report.bounties {
                println!(
                    "  bounty {}  code={}  random={}  max_claim={}",
                    bounty.id,
                    bounty.claim_code,
                    bounty.is_random,
                    bounty
                        .max_claim
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "unlimited".to_string())
                );
            }
        }
        Commands::Codes => {
            let bounties = store.list_active_bounties()?;
            if bounties.is_empty() {
                println!("No active bounties in {db_path}");
            }
            for bounty in bounties {
                println!(
                    "{}  code={}  claims={}/{}",
                    bounty.id,
                    bounty.claim_code,
                    bounty.claim_count,
                    bounty
                        .max_claim
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "∞".to_string())
                );
            }
        }
    }

    Ok(())
}
