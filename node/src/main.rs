// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # VeilPay Node
//!
//! Entry point for the `veilpay-node` binary. Parses CLI arguments, loads
//! the node config, initializes logging, opens the sled-backed ledger, and
//! runs one command against it.
//!
//! Every mutation is built as an `Instruction`, signed with the key file
//! given on the command line, and handed to `Ledger::submit`, so the CLI
//! goes through exactly the authentication a remote client would. The
//! resulting event is printed to stdout as JSON and appended to
//! `events.jsonl`.

mod cli;
mod config;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use veilpay_protocol::amount::encode;
use veilpay_protocol::crypto::keys::Keypair;
use veilpay_protocol::events::{JsonLinesSink, TracingSink};
use veilpay_protocol::ledger::{transfer_commitment, transfer_tag};
use veilpay_protocol::state::PendingTransfer;
use veilpay_protocol::{Address, Instruction, Ledger, LedgerEvent, SignedInstruction, SledStore};

use cli::{Commands, EscrowCommands, VeilPayCli};
use config::NodeConfig;
use logging::LogFormat;

fn main() -> Result<()> {
    let cli = VeilPayCli::parse();

    match cli.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Keygen(args) => {
            logging::init_logging(cli.log.as_deref().unwrap_or("info"), LogFormat::Pretty);
            keygen(&args.out)
        }
        Commands::Init(args) => {
            logging::init_logging(cli.log.as_deref().unwrap_or("info"), LogFormat::Pretty);
            init_node(&cli.data_dir, cli.config.as_deref(), args)
        }
        command => {
            let config_path = config::resolve_path(&cli.data_dir, cli.config.as_deref());
            let node_config = NodeConfig::load(&config_path)
                .context("run `veilpay-node init` first to create the data directory")?;
            let filter = cli.log.as_deref().unwrap_or(&node_config.log_level);
            logging::init_logging(filter, node_config.log_format);

            let ledger = open_ledger(&cli.data_dir, &node_config)?;
            let result = run_command(&ledger, command);
            ledger
                .store()
                .flush()
                .context("failed to flush ledger to disk")?;
            result
        }
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Creates the data directory, the authority key, the config, and the vault.
fn init_node(data_dir: &Path, explicit_config: Option<&Path>, args: cli::InitArgs) -> Result<()> {
    let config_path = config::resolve_path(data_dir, explicit_config);
    if config_path.exists() {
        bail!("{} already exists; refusing to re-initialize", config_path.display());
    }

    tracing::info!(data_dir = %data_dir.display(), "initializing ledger");
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let (authority, key_path) = match args.authority_key {
        Some(path) => (load_keypair(&path)?, path),
        None => {
            let path = data_dir.join(config::AUTHORITY_KEY_FILE);
            write_new_key(&path)?;
            (load_keypair(&path)?, path)
        }
    };

    let mut node_config = NodeConfig::new(authority.identity());
    if let Some(reserve) = args.vault_reserve {
        node_config.ledger = node_config.ledger.with_vault_reserve(reserve);
    }
    if let Some(tolerance) = args.drift_tolerance {
        node_config.ledger = node_config.ledger.with_drift_tolerance(tolerance);
    }
    node_config.save(&config_path)?;

    // Opening the ledger bootstraps the vault.
    let ledger = open_ledger(data_dir, &node_config)?;
    let vault = ledger.vault()?;
    ledger.store().flush()?;

    println!("Ledger initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config         : {}", config_path.display());
    println!("  Authority key  : {}", key_path.display());
    println!("  Authority      : {}", authority.identity());
    println!("  Vault custody  : {}", vault.total_custody);
    Ok(())
}

/// Generates an owner keypair into `out`.
fn keygen(out: &Path) -> Result<()> {
    write_new_key(out)?;
    let keypair = load_keypair(out)?;
    tracing::info!(identity = %keypair.identity(), path = %out.display(), "keypair generated");
    println!("{}", keypair.identity());
    Ok(())
}

fn open_ledger(data_dir: &Path, node_config: &NodeConfig) -> Result<Ledger<SledStore>> {
    let db_path = data_dir.join(config::LEDGER_DIR);
    let store = SledStore::open(&db_path)
        .with_context(|| format!("failed to open ledger database at {}", db_path.display()))?;

    let events_path = data_dir.join(config::EVENTS_FILE);
    let events = JsonLinesSink::open(&events_path)
        .with_context(|| format!("failed to open event log at {}", events_path.display()))?;

    let ledger = Ledger::open(store, node_config.ledger.clone())
        .context("failed to open ledger")?
        .with_sink(Arc::new(events))
        .with_sink(Arc::new(TracingSink));
    Ok(ledger)
}

// ---------------------------------------------------------------------------
// Key files
// ---------------------------------------------------------------------------

fn write_new_key(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists; refusing to overwrite a key", path.display());
    }
    let keypair = Keypair::generate();
    std::fs::write(path, keypair.secret_hex())
        .with_context(|| format!("failed to write key to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn load_keypair(path: &Path) -> Result<Keypair> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))?;
    Keypair::from_hex(&text).with_context(|| format!("malformed key file {}", path.display()))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_command(ledger: &Ledger<SledStore>, command: Commands) -> Result<()> {
    match command {
        Commands::MintInit(args) => {
            let signer = load_keypair(&args.key.key)?;
            let config = hex::decode(args.config_hex.trim()).context("--config-hex is not hex")?;
            submit(ledger, &signer, Instruction::InitializeMint { config })
        }
        Commands::OpenAccount(args) => {
            let signer = load_keypair(&args.key)?;
            let owner = signer.identity();
            submit(ledger, &signer, Instruction::InitializeBalance { owner })
        }
        Commands::Deposit(args) => {
            let signer = load_keypair(&args.key.key)?;
            let ix = Instruction::Deposit {
                owner: signer.identity(),
                amount: args.amount,
                encoded_amount: encode(args.amount),
            };
            submit(ledger, &signer, ix)
        }
        Commands::Withdraw(args) => {
            let signer = load_keypair(&args.key.key)?;
            let ix = Instruction::Withdraw {
                owner: signer.identity(),
                amount: args.amount,
                encoded_amount: encode(args.amount),
            };
            submit(ledger, &signer, ix)
        }
        Commands::Transfer(args) => {
            let signer = load_keypair(&args.key.key)?;
            let sender = signer.identity();
            let nonce = match args.nonce {
                Some(n) => n,
                None => ledger.nonce(&sender)?,
            };
            let encoded_amount = encode(args.amount);
            let ix = Instruction::PrivateTransfer {
                sender,
                receiver: args.to,
                encoded_amount,
                expected_nonce: nonce,
                commitment: transfer_commitment(&encoded_amount, nonce, &args.to),
                tag: transfer_tag(&args.to, &signer.secret_bytes()),
            };
            submit(ledger, &signer, ix)
        }
        Commands::Escrow(escrow) => run_escrow(ledger, escrow),
        Commands::Balance(args) => {
            let record = ledger
                .balance_record(&args.owner)?
                .with_context(|| format!("no account for {}", args.owner))?;
            let drift = ledger.account_drift(&args.owner)?;
            print_json(&serde_json::json!({
                "owner": args.owner,
                "balance": drift.balance,
                "nonce": record.nonce,
                "withdrawable": drift.withdrawable,
                "exceeds_custody": drift.exceeds_custody,
            }))
        }
        Commands::Reconcile => {
            let report = ledger.reconcile()?;
            print_json(&report)
        }
        other => bail!("{other:?} does not run against an open ledger"),
    }
}

fn run_escrow(ledger: &Ledger<SledStore>, command: EscrowCommands) -> Result<()> {
    match command {
        EscrowCommands::Create(args) => {
            let signer = load_keypair(&args.key.key)?;
            let sender = signer.identity();
            let nonce = match args.nonce {
                Some(n) => n,
                None => ledger.nonce(&sender)?,
            };
            let ix = Instruction::CreateTransfer {
                sender,
                recipient: args.to,
                encoded_amount: encode(args.amount),
                nonce,
            };
            submit(ledger, &signer, ix)
        }
        EscrowCommands::Claim(args) => {
            let signer = load_keypair(&args.key.key)?;
            submit(
                ledger,
                &signer,
                Instruction::ClaimTransfer {
                    address: args.address,
                },
            )
        }
        EscrowCommands::Cancel(args) => {
            let signer = load_keypair(&args.key.key)?;
            submit(
                ledger,
                &signer,
                Instruction::CancelTransfer {
                    address: args.address,
                },
            )
        }
        EscrowCommands::List(args) => {
            let incoming = listing(ledger.pending_transfers_for(&args.owner)?);
            let outgoing = listing(ledger.pending_transfers_from(&args.owner)?);
            print_json(&serde_json::json!({
                "owner": args.owner,
                "incoming": incoming,
                "outgoing": outgoing,
            }))
        }
    }
}

/// Signs `instruction` with `signer`, submits it, and prints the event.
fn submit(ledger: &Ledger<SledStore>, signer: &Keypair, instruction: Instruction) -> Result<()> {
    let name = instruction.name();
    let signed = SignedInstruction::sign(instruction, signer)?;
    let event: LedgerEvent = ledger
        .submit(&signed)
        .with_context(|| format!("{name} rejected"))?;
    print_json(&event)
}

fn listing(entries: Vec<(Address, PendingTransfer)>) -> Vec<serde_json::Value> {
    entries
        .into_iter()
        .map(|(address, pending)| serde_json::json!({ "address": address, "transfer": pending }))
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("veilpay-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {}", veilpay_protocol::config::PROTOCOL_VERSION);
}
