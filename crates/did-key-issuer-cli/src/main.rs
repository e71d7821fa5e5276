//! did-key-issuer CLI — `did-issuer` command.
//!
//! A thin adapter over `IssuanceService`: parses arguments, opens the
//! file-backed stores, and prints results as snake_case JSON in the same
//! shape the issuance endpoint returns.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use did_key_issuer::codec::public_key_from_identifier;
use did_key_issuer::config::DATA_DIR_ENV;
use did_key_issuer::{IdentityRecord, IssuanceService, IssuerConfig, IssuerError};

/// Exit code when the identity was committed but the vault write failed.
const EXIT_PARTIAL_ISSUANCE: i32 = 3;

// ── Response shape ────────────────────────────────────────────────────────────

/// Wire form of an identity record.
#[derive(Debug, Serialize)]
struct IssuedDid<'a> {
    user_id: &'a str,
    did: &'a str,
    method: &'static str,
    public_key_multibase: &'a str,
    key_type: &'static str,
    issued_at: String,
    status: &'static str,
}

impl<'a> From<&'a IdentityRecord> for IssuedDid<'a> {
    fn from(record: &'a IdentityRecord) -> Self {
        Self {
            user_id: &record.user_id,
            did: &record.identifier,
            method: record.method.as_str(),
            public_key_multibase: &record.public_key_multibase,
            key_type: record.key_type.as_str(),
            issued_at: record.issued_at_iso8601(),
            status: record.status.as_str(),
        }
    }
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// Issue, rotate and inspect did:key identities.
#[derive(Parser, Debug)]
#[command(
    name = "did-issuer",
    about = "did:key issuer CLI",
    version,
    long_about = "did-issuer — did:key issuer CLI\n\nIssue Ed25519 did:key identities per user, rotate them, and inspect\nthe identity ledger. Secret keys are written to a separate vault file."
)]
struct Cli {
    /// Directory holding the identity ledger and the vault
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue an identity, returning the existing one unless --rotate is set
    Issue {
        /// User to issue for
        #[arg(long)]
        user_id: String,

        /// Replace the active identity with a freshly generated one
        #[arg(long)]
        rotate: bool,
    },

    /// Show the active identity of a user
    Show {
        #[arg(long)]
        user_id: String,
    },

    /// List every identity issued to a user, oldest first
    History {
        #[arg(long)]
        user_id: String,
    },

    /// Decode the Ed25519 public key embedded in a did:key identifier
    Resolve {
        /// A did:key identifier
        did: String,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let config = match cli.data_dir {
        Some(dir) => IssuerConfig::with_data_dir(dir),
        None => IssuerConfig::from_env(),
    };
    log::debug!("using data directory {}", config.data_dir().display());
    let verbose = cli.verbose;

    let result = match cli.command {
        Commands::Issue { user_id, rotate } => cmd_issue(&config, &user_id, rotate, verbose),
        Commands::Show { user_id } => cmd_show(&config, &user_id),
        Commands::History { user_id } => cmd_history(&config, &user_id, verbose),
        Commands::Resolve { did } => cmd_resolve(&did),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(e: &anyhow::Error) -> i32 {
    let partial = e.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<IssuerError>(),
            Some(IssuerError::PartialIssuanceFailure { .. })
        )
    });
    if partial {
        EXIT_PARTIAL_ISSUANCE
    } else {
        1
    }
}

fn open_service(config: &IssuerConfig) -> Result<IssuanceService> {
    IssuanceService::open(config).with_context(|| {
        format!(
            "failed to open issuer stores in {}",
            config.data_dir().display()
        )
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

// ── Command implementations ───────────────────────────────────────────────────

/// `did-issuer issue --user-id ID [--rotate]`
fn cmd_issue(config: &IssuerConfig, user_id: &str, rotate: bool, verbose: bool) -> Result<()> {
    let service = open_service(config)?;
    let record = service.issue(user_id, rotate)?;

    if verbose {
        let issued = service.history(user_id)?.len();
        eprintln!("{} identity record(s) on file for {user_id}", issued);
        eprintln!("ledger: {}", config.identity_path().display());
    }

    print_json(&IssuedDid::from(&record))
}

/// `did-issuer show --user-id ID`
fn cmd_show(config: &IssuerConfig, user_id: &str) -> Result<()> {
    let service = open_service(config)?;
    let record = service
        .active(user_id)?
        .ok_or_else(|| anyhow!("no active identity for user '{user_id}'"))?;
    print_json(&IssuedDid::from(&record))
}

/// `did-issuer history --user-id ID`
fn cmd_history(config: &IssuerConfig, user_id: &str, verbose: bool) -> Result<()> {
    let service = open_service(config)?;
    let history = service.history(user_id)?;

    if verbose {
        let rotated = history.iter().filter(|r| !r.is_active()).count();
        eprintln!("{} record(s), {rotated} rotated", history.len());
    }

    let out: Vec<IssuedDid<'_>> = history.iter().map(IssuedDid::from).collect();
    print_json(&out)
}

/// `did-issuer resolve DID`
fn cmd_resolve(did: &str) -> Result<()> {
    let key = public_key_from_identifier(did).context("not a valid Ed25519 did:key")?;
    let out = serde_json::json!({
        "did": did,
        "key_type": "Ed25519",
        "public_key_base64": base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            key,
        ),
    });
    print_json(&out)
}
