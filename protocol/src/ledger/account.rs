//! Setup and custody operations: the mint singleton, balance records, and
//! the deposit/withdraw pair that moves real value in and out of the vault.

use chrono::Utc;
use tracing::info;

use super::Ledger;
use crate::address::{balance_address, mint_address};
use crate::amount::EncodedAmount;
use crate::config::MAX_MINT_CONFIG_SIZE;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{EventKind, LedgerEvent};
use crate::identity::{Caller, Identity};
use crate::state::{BalanceRecord, MintRecord};
use crate::storage::{LedgerStore, Precondition, VaultWrite, WriteBatch};

impl<S: LedgerStore> Ledger<S> {
    /// Create the mint/config singleton. Only the configured authority may.
    ///
    /// # Errors
    ///
    /// `MissingSigner`/`UnauthorizedAccess` for anyone else,
    /// `InvalidMintConfig` past 64 bytes, `AlreadyInitialized` the second
    /// time.
    pub fn initialize_mint(&self, caller: &Caller, config: &[u8]) -> LedgerResult<LedgerEvent> {
        self.sequenced("initialize_mint", || {
            let authority = self.config.authority;
            caller.require(&authority)?;
            if config.len() > MAX_MINT_CONFIG_SIZE {
                return Err(LedgerError::InvalidMintConfig {
                    len: config.len(),
                    max: MAX_MINT_CONFIG_SIZE,
                });
            }

            let (address, bump) = mint_address()?;
            if self.store.mint()?.is_some() {
                return Err(LedgerError::AlreadyInitialized(address));
            }

            let record = MintRecord {
                authority,
                config: config.to_vec(),
                bump,
                initialized_at: Utc::now(),
            };
            let committed = self.store.commit(&WriteBatch::new().mint(address, record))?;
            info!(slot = committed.slot, %authority, config_len = config.len(), "mint initialized");

            Ok(self.publish(
                committed.slot,
                EventKind::MintInitialized {
                    authority,
                    config: config.to_vec(),
                },
            ))
        })
    }

    /// Create `owner`'s balance record with a zero balance and nonce zero.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` if the record exists.
    pub fn initialize_balance(&self, caller: &Caller, owner: &Identity) -> LedgerResult<LedgerEvent> {
        self.sequenced("initialize_balance", || {
            caller.require(owner)?;
            let (address, bump) = balance_address(owner)?;
            if self.store.balance(&address)?.is_some() {
                return Err(LedgerError::AlreadyInitialized(address));
            }

            let record = BalanceRecord::new(*owner, bump, self.codec());
            let owner_commitment = record.owner_commitment.to_vec();
            let batch = WriteBatch::new().put_balance(address, Precondition::Absent, record);
            let committed = self.store.commit(&batch)?;
            info!(slot = committed.slot, %owner, %address, "balance initialized");

            Ok(self.publish(
                committed.slot,
                EventKind::BalanceInitialized {
                    owner: *owner,
                    owner_commitment,
                },
            ))
        })
    }

    /// Move `amount` of real value into custody and credit the same amount
    /// to `owner`'s balance. The owner's nonce does not move.
    ///
    /// # Errors
    ///
    /// `AmountMismatch` if `encoded` does not decode to `amount`,
    /// `AccountNotInitialized` for an unknown owner, `Overflow` if the
    /// balance or custody would pass `u64::MAX`.
    pub fn deposit(
        &self,
        caller: &Caller,
        owner: &Identity,
        amount: u64,
        encoded: &EncodedAmount,
    ) -> LedgerResult<LedgerEvent> {
        self.sequenced("deposit", || {
            caller.require(owner)?;
            self.check_declared(amount, encoded)?;
            let (address, record) = self.load_balance(owner)?;

            let credited = record.apply_deposit(self.codec(), encoded)?;
            let batch = WriteBatch::new()
                .put_balance(address, Precondition::unchanged(&record), credited)
                .vault(VaultWrite::Credit(amount));
            let committed = self.store.commit(&batch)?;
            let custody = committed.vault.map(|v| v.total_custody).unwrap_or_default();
            info!(slot = committed.slot, %owner, amount, custody, "deposit");

            Ok(self.publish(
                committed.slot,
                EventKind::Deposit {
                    owner: *owner,
                    amount,
                    encoded_amount: *encoded,
                    custody,
                },
            ))
        })
    }

    /// Debit `owner`'s balance and release the same amount of custody.
    ///
    /// The withdrawal can never exceed the lesser of the owner's balance and
    /// custody above the configured reserve. The owner's nonce does not move.
    ///
    /// # Errors
    ///
    /// `AmountMismatch`, `AccountNotInitialized`, `InsufficientBalance` if
    /// the balance is short, `InsufficientFunds` if the vault is.
    pub fn withdraw(
        &self,
        caller: &Caller,
        owner: &Identity,
        amount: u64,
        encoded: &EncodedAmount,
    ) -> LedgerResult<LedgerEvent> {
        self.sequenced("withdraw", || {
            caller.require(owner)?;
            self.check_declared(amount, encoded)?;
            let (address, record) = self.load_balance(owner)?;

            let debited = record.apply_withdrawal(self.codec(), encoded)?;
            let batch = WriteBatch::new()
                .put_balance(address, Precondition::unchanged(&record), debited)
                .vault(VaultWrite::Debit {
                    amount,
                    reserve: self.config.vault_reserve,
                });
            let committed = self.store.commit(&batch)?;
            let custody = committed.vault.map(|v| v.total_custody).unwrap_or_default();
            info!(slot = committed.slot, %owner, amount, custody, "withdrawal");

            Ok(self.publish(
                committed.slot,
                EventKind::Withdrawal {
                    owner: *owner,
                    amount,
                    encoded_amount: *encoded,
                    custody,
                },
            ))
        })
    }

    fn check_declared(&self, amount: u64, encoded: &EncodedAmount) -> LedgerResult<()> {
        let decoded = self.codec().decode(encoded);
        if decoded != amount {
            return Err(LedgerError::AmountMismatch {
                declared: amount,
                encoded: decoded,
            });
        }
        Ok(())
    }
}
