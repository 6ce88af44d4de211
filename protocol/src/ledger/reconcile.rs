//! # Reconciliation
//!
//! Read-only comparison of the two books: what the balances say the vault
//! owes, and what the vault actually holds. Liabilities are every decoded
//! balance plus every open escrow, since escrowed funds left a balance but
//! never left custody.
//!
//! The report is advisory. A shortfall is logged at `warn` and returned;
//! nothing here writes. Withdrawals already refuse to go past the lesser
//! of balance and custody, which is what keeps a shortfall from turning
//! into an overdraft.

use serde::Serialize;
use tracing::{debug, warn};

use super::Ledger;
use crate::error::LedgerResult;
use crate::identity::Identity;
use crate::storage::LedgerStore;

/// How custody compares to liabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Balanced,
    /// Custody exceeds liabilities by `amount`.
    Surplus { amount: u128 },
    /// Liabilities exceed custody by `amount`.
    Shortfall { amount: u128 },
}

/// Ledger-wide reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub custody: u64,
    pub total_balances: u128,
    pub total_escrowed: u128,
    pub accounts: usize,
    pub pending_transfers: usize,
    pub status: ReconciliationStatus,
    /// Owners whose balance exceeds custody by more than the drift
    /// tolerance.
    pub flagged: Vec<Identity>,
}

impl ReconciliationReport {
    pub fn liabilities(&self) -> u128 {
        self.total_balances + self.total_escrowed
    }
}

/// One account against the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountDrift {
    pub owner: Identity,
    pub balance: u64,
    pub custody: u64,
    /// What a withdrawal could take right now: the lesser of the balance
    /// and custody above the reserve.
    pub withdrawable: u64,
    /// Balance exceeds custody by more than the drift tolerance.
    pub exceeds_custody: bool,
}

impl<S: LedgerStore> Ledger<S> {
    /// Compare every balance and escrow against custody.
    pub fn reconcile(&self) -> LedgerResult<ReconciliationReport> {
        let custody = self.vault()?.total_custody;
        let balances = self.store.balances()?;
        let pending = self.store.pending_transfers()?;

        let mut total_balances: u128 = 0;
        let mut flagged = Vec::new();
        for record in &balances {
            let balance = record.balance(self.codec());
            total_balances += u128::from(balance);
            if self.exceeds_custody(balance, custody) {
                flagged.push(record.owner);
            }
        }
        let total_escrowed: u128 = pending
            .iter()
            .map(|(_, p)| u128::from(self.codec().decode(&p.encoded_amount)))
            .sum();

        let liabilities = total_balances + total_escrowed;
        let held = u128::from(custody);
        let status = if held == liabilities {
            ReconciliationStatus::Balanced
        } else if held > liabilities {
            ReconciliationStatus::Surplus {
                amount: held - liabilities,
            }
        } else {
            ReconciliationStatus::Shortfall {
                amount: liabilities - held,
            }
        };

        match status {
            ReconciliationStatus::Shortfall { amount }
                if amount > u128::from(self.config.drift_tolerance) =>
            {
                warn!(custody, %liabilities, shortfall = %amount, "vault shortfall");
            }
            _ => debug!(custody, %liabilities, ?status, "reconciled"),
        }

        Ok(ReconciliationReport {
            custody,
            total_balances,
            total_escrowed,
            accounts: balances.len(),
            pending_transfers: pending.len(),
            status,
            flagged,
        })
    }

    /// Compare one account against custody.
    pub fn account_drift(&self, owner: &Identity) -> LedgerResult<AccountDrift> {
        let vault = self.vault()?;
        let balance = self.balance(owner)?;
        let withdrawable = balance.min(vault.withdrawable(self.config.vault_reserve));
        Ok(AccountDrift {
            owner: *owner,
            balance,
            custody: vault.total_custody,
            withdrawable,
            exceeds_custody: self.exceeds_custody(balance, vault.total_custody),
        })
    }

    fn exceeds_custody(&self, balance: u64, custody: u64) -> bool {
        balance > custody.saturating_add(self.config.drift_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::balance_address;
    use crate::amount::encode;
    use crate::config::LedgerConfig;
    use crate::identity::Caller;
    use crate::storage::{MemoryStore, Precondition, WriteBatch};

    const ALICE: Identity = Identity::from_bytes([0xA1; 32]);
    const BOB: Identity = Identity::from_bytes([0xB0; 32]);

    fn ledger(tolerance: u64, reserve: u64) -> Ledger<MemoryStore> {
        let config = LedgerConfig::new(ALICE)
            .with_drift_tolerance(tolerance)
            .with_vault_reserve(reserve);
        let ledger = Ledger::open(MemoryStore::new(), config).unwrap();
        let alice = Caller::Verified(ALICE);
        ledger.initialize_balance(&alice, &ALICE).unwrap();
        ledger.deposit(&alice, &ALICE, 50_000, &encode(50_000)).unwrap();
        ledger
    }

    /// Credit a balance behind the vault's back, the way a foreign encoder
    /// would have.
    fn inflate(ledger: &Ledger<MemoryStore>, owner: &Identity, extra: u64) {
        let (address, _) = balance_address(owner).unwrap();
        let record = ledger.balance_record(owner).unwrap().unwrap();
        let inflated = record.apply_deposit(ledger.codec(), &encode(extra)).unwrap();
        ledger
            .store()
            .commit(&WriteBatch::new().put_balance(
                address,
                Precondition::unchanged(&record),
                inflated,
            ))
            .unwrap();
    }

    #[test]
    fn normal_operation_stays_balanced() {
        let ledger = ledger(10_000, 0);
        let nonce = ledger.nonce(&ALICE).unwrap();
        ledger
            .create_transfer(&Caller::Verified(ALICE), &ALICE, &BOB, &encode(5_000), nonce)
            .unwrap();

        let report = ledger.reconcile().unwrap();
        assert_eq!(report.status, ReconciliationStatus::Balanced);
        assert_eq!(report.custody, 50_000);
        assert_eq!(report.total_balances, 45_000);
        assert_eq!(report.total_escrowed, 5_000);
        assert_eq!(report.liabilities(), 50_000);
        assert_eq!((report.accounts, report.pending_transfers), (1, 1));
        assert!(report.flagged.is_empty());
    }

    #[test]
    fn shortfall_is_reported_not_fixed() {
        let ledger = ledger(10_000, 0);
        inflate(&ledger, &ALICE, 70_000);

        let report = ledger.reconcile().unwrap();
        assert_eq!(report.status, ReconciliationStatus::Shortfall { amount: 70_000 });
        assert_eq!(report.flagged, vec![ALICE]);
        // Still there.
        assert_eq!(ledger.balance(&ALICE).unwrap(), 120_000);
    }

    #[test]
    fn drift_within_tolerance_is_not_flagged() {
        let ledger = ledger(10_000, 0);
        inflate(&ledger, &ALICE, 5_000);

        let drift = ledger.account_drift(&ALICE).unwrap();
        assert_eq!(drift.balance, 55_000);
        assert!(!drift.exceeds_custody);
        assert_eq!(drift.withdrawable, 50_000);
    }

    #[test]
    fn withdrawable_is_capped_by_reserve() {
        let ledger = ledger(10_000, 3_000);
        let drift = ledger.account_drift(&ALICE).unwrap();
        assert_eq!(drift.custody, 50_000);
        assert_eq!(drift.withdrawable, 47_000);
    }
}
