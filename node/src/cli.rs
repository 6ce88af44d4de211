//! # CLI Interface
//!
//! Defines the command-line argument structure for `veilpay-node` using
//! `clap` derive. Every subcommand works against the ledger in one data
//! directory:
//!
//! ```text
//! <data_dir>/
//!   config.json     NodeConfig
//!   authority.key   hex secret of the mint authority (written by `init`)
//!   ledger/         sled database
//!   events.jsonl    one ledger event per line, append-only
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use veilpay_protocol::{Address, Identity};

/// VeilPay ledger operator.
///
/// Opens accounts, moves funds, and audits the vault on a local
/// sled-backed ledger. Mutations are signed with a key file and go through
/// the same authentication path a remote client would use.
#[derive(Parser, Debug)]
#[command(
    name = "veilpay-node",
    about = "VeilPay ledger operator",
    version,
    propagate_version = true
)]
pub struct VeilPayCli {
    /// Ledger data directory.
    #[arg(
        long,
        short = 'd',
        env = "VEILPAY_DATA_DIR",
        default_value = ".veilpay",
        global = true
    )]
    pub data_dir: PathBuf,

    /// Config file. Defaults to `config.json` inside the data directory.
    #[arg(long, short = 'c', env = "VEILPAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `veilpay_protocol=debug`. Overrides the
    /// config file; `RUST_LOG` overrides both.
    #[arg(long, env = "VEILPAY_LOG", global = true)]
    pub log: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory, the authority key, the config file, and
    /// the vault.
    Init(InitArgs),
    /// Generate a fresh owner keypair into a key file.
    Keygen(KeygenArgs),
    /// Record the mint configuration. Authority only, once.
    MintInit(MintInitArgs),
    /// Create the balance record for the key's owner.
    OpenAccount(KeyArgs),
    /// Move external funds into the vault and credit the owner.
    Deposit(AmountArgs),
    /// Debit the owner and release funds from the vault.
    Withdraw(AmountArgs),
    /// Direct transfer to an initialized account.
    Transfer(TransferArgs),
    /// Escrowed transfers.
    #[command(subcommand)]
    Escrow(EscrowCommands),
    /// Show an account's balance, nonce, and standing against custody.
    Balance(OwnerArgs),
    /// Compare all balances and open escrows against vault custody.
    Reconcile,
    /// Print version information and exit.
    Version,
}

/// Escrow subcommands.
#[derive(Subcommand, Debug)]
pub enum EscrowCommands {
    /// Lock funds for a recipient, who need not have an account yet.
    Create(TransferArgs),
    /// Claim an escrow as its recipient.
    Claim(EscrowAddressArgs),
    /// Cancel an escrow as its sender and take the funds back.
    Cancel(EscrowAddressArgs),
    /// List open escrows involving an owner.
    List(OwnerArgs),
}

/// Arguments for `init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Use an existing authority key instead of generating one.
    #[arg(long)]
    pub authority_key: Option<PathBuf>,

    /// Custody the vault always retains.
    #[arg(long)]
    pub vault_reserve: Option<u64>,

    /// Dust buffer for reconciliation warnings.
    #[arg(long)]
    pub drift_tolerance: Option<u64>,
}

/// Arguments for `keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Where to write the hex secret. Refuses to overwrite.
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}

/// A signing key file.
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Hex secret key file of the signer.
    #[arg(long, short = 'k')]
    pub key: PathBuf,
}

/// Arguments for `mint-init`.
#[derive(Args, Debug)]
pub struct MintInitArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Opaque mint configuration, hex encoded (at most 64 bytes).
    #[arg(long, default_value = "")]
    pub config_hex: String,
}

/// Arguments for `deposit` and `withdraw`.
#[derive(Args, Debug)]
pub struct AmountArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Amount in base units.
    #[arg(long, short = 'a')]
    pub amount: u64,
}

/// Arguments for `transfer` and `escrow create`.
#[derive(Args, Debug)]
pub struct TransferArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Recipient identity (base58).
    #[arg(long)]
    pub to: Identity,

    /// Amount in base units.
    #[arg(long, short = 'a')]
    pub amount: u64,

    /// Sender nonce to bind to. Defaults to the current one.
    #[arg(long)]
    pub nonce: Option<u64>,
}

/// Arguments for `escrow claim` and `escrow cancel`.
#[derive(Args, Debug)]
pub struct EscrowAddressArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Escrow address (base58), as printed by `escrow create`.
    #[arg(long)]
    pub address: Address,
}

/// An owner to look up.
#[derive(Args, Debug)]
pub struct OwnerArgs {
    /// Owner identity (base58).
    #[arg(long)]
    pub owner: Identity,
}
