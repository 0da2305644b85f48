//! In-Memory Store
//!
//! Process-local implementation of the storage contract.
//!
//! Units of work are serialised behind one async mutex: `begin` takes the
//! lock, writes go to a private copy of the tables, `commit` publishes the
//! copy and `rollback` (or drop) discards it. That gives every unit of work
//! a serializable view without any row-level locking of its own.
//!
//! For tests the store can also:
//! - fail any storage operation on its n-th call ([`MemoryStore::fail_on`])
//! - pretend a concurrent creator won a reference-data insert
//!   ([`MemoryStore::race_next_reference_creation`])
//! - report the order in which account balances were touched
//!   ([`MemoryStore::balance_lock_order`])

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use super::{Lookup, Store, StoreError, UnitOfWork};
use crate::core_types::{AccountId, TransactionId, UserId};
use crate::models::{
    Account, Currency, Entry, NewCurrency, NewEntry, NewTransaction, TransactionRecord,
    TransactionStatus, TransactionType,
};

/// Storage operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    CreateTransaction,
    CreateEntry,
    AddBalance,
    UpdateStatus,
    CreateReference,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    transactions: BTreeMap<TransactionId, TransactionRecord>,
    entries: Vec<Entry>,
    statuses: BTreeMap<String, TransactionStatus>,
    types: BTreeMap<String, TransactionType>,
    currencies: BTreeMap<String, Currency>,
    last_account_id: AccountId,
    last_transaction_id: TransactionId,
    last_entry_id: i64,
}

#[derive(Debug, Default)]
struct Faults {
    /// point -> remaining calls until failure (1 = next call fails)
    armed: HashMap<FaultPoint, usize>,
    reference_races: usize,
}

#[derive(Debug, Default)]
struct Probes {
    faults: Mutex<Faults>,
    balance_log: Mutex<Vec<AccountId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Probes {
    fn trip(&self, point: FaultPoint) -> Result<(), StoreError> {
        let mut faults = lock(&self.faults);
        if let Some(remaining) = faults.armed.get_mut(&point) {
            if *remaining <= 1 {
                faults.armed.remove(&point);
                debug!(?point, "Injected storage failure");
                return Err(StoreError::Backend(format!(
                    "injected failure at {:?}",
                    point
                )));
            }
            *remaining -= 1;
        }
        Ok(())
    }

    fn take_reference_race(&self) -> bool {
        let mut faults = lock(&self.faults);
        if faults.reference_races > 0 {
            faults.reference_races -= 1;
            true
        } else {
            false
        }
    }
}

/// In-process store. Cheap to clone; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<AsyncMutex<Tables>>,
    probes: Arc<Probes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an active account with an initial balance (outside any unit of work)
    pub async fn open_account(
        &self,
        user_id: UserId,
        currency_code: &str,
        balance: Decimal,
    ) -> Account {
        let mut tables = self.tables.lock().await;
        tables.last_account_id += 1;
        let now = Utc::now();
        let account = Account {
            account_id: tables.last_account_id,
            user_id,
            account_number: format!("ACC{:010}", tables.last_account_id),
            account_type: "CHECKING".to_string(),
            currency_code: currency_code.to_string(),
            balance,
            interest_rate: Decimal::ZERO,
            overdraft_limit: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.accounts.insert(account.account_id, account.clone());
        account
    }

    /// Soft-close an account
    pub async fn deactivate_account(&self, account_id: AccountId) {
        let mut tables = self.tables.lock().await;
        if let Some(account) = tables.accounts.get_mut(&account_id) {
            account.is_active = false;
        }
    }

    pub async fn account(&self, account_id: AccountId) -> Option<Account> {
        self.tables.lock().await.accounts.get(&account_id).cloned()
    }

    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.tables.lock().await.transactions.values().cloned().collect()
    }

    pub async fn entries(&self) -> Vec<Entry> {
        self.tables.lock().await.entries.clone()
    }

    pub async fn statuses(&self) -> Vec<TransactionStatus> {
        self.tables.lock().await.statuses.values().cloned().collect()
    }

    pub async fn transaction_types(&self) -> Vec<TransactionType> {
        self.tables.lock().await.types.values().cloned().collect()
    }

    pub async fn currencies(&self) -> Vec<Currency> {
        self.tables.lock().await.currencies.values().cloned().collect()
    }

    /// Fail the `occurrence`-th call to `point` from now on (1 = next call)
    pub fn fail_on(&self, point: FaultPoint, occurrence: usize) {
        lock(&self.probes.faults)
            .armed
            .insert(point, occurrence.max(1));
    }

    /// The next reference-data insert behaves as if another transaction had
    /// created the same code first: the row appears and the insert reports a
    /// unique violation.
    pub fn race_next_reference_creation(&self) {
        lock(&self.probes.faults).reference_races += 1;
    }

    /// Account IDs in the order `add_account_balance` touched them,
    /// across all units of work (committed or not)
    pub fn balance_lock_order(&self) -> Vec<AccountId> {
        lock(&self.probes.balance_log).clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type UnitOfWork = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork, StoreError> {
        self.probes.trip(FaultPoint::Begin)?;
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryUnitOfWork {
            guard,
            working,
            probes: self.probes.clone(),
        })
    }
}

/// Exclusive unit of work over a private copy of the tables
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    probes: Arc<Probes>,
}

impl MemoryUnitOfWork {
    fn foreign_key(what: String) -> StoreError {
        StoreError::Backend(format!("foreign key violation: {}", what))
    }

    fn check_account(&self, account_id: AccountId) -> Result<(), StoreError> {
        if self.working.accounts.contains_key(&account_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("account {}", account_id)))
        }
    }

    fn check_status(&self, code: &str) -> Result<(), StoreError> {
        if self.working.statuses.contains_key(code) {
            Ok(())
        } else {
            Err(Self::foreign_key(format!("transaction status {}", code)))
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        let MemoryUnitOfWork {
            mut guard,
            working,
            probes,
        } = self;
        probes.trip(FaultPoint::Commit)?;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.probes.trip(FaultPoint::Rollback)
    }

    async fn get_account(&mut self, account_id: AccountId) -> Result<Lookup<Account>, StoreError> {
        Ok(self.working.accounts.get(&account_id).cloned().into())
    }

    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Account, StoreError> {
        lock(&self.probes.balance_log).push(account_id);
        self.probes.trip(FaultPoint::AddBalance)?;

        let account = self
            .working
            .accounts
            .get_mut(&account_id)
            .filter(|a| a.is_active)
            .ok_or_else(|| StoreError::NotFound(format!("active account {}", account_id)))?;
        account.balance += delta;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn create_transaction(
        &mut self,
        new: &NewTransaction,
    ) -> Result<TransactionRecord, StoreError> {
        self.probes.trip(FaultPoint::CreateTransaction)?;

        self.check_account(new.from_account_id)?;
        self.check_account(new.to_account_id)?;
        self.check_status(&new.status_code)?;
        if !self.working.types.contains_key(&new.type_code) {
            return Err(Self::foreign_key(format!(
                "transaction type {}",
                new.type_code
            )));
        }
        if !self.working.currencies.contains_key(&new.currency_code) {
            return Err(Self::foreign_key(format!("currency {}", new.currency_code)));
        }
        let duplicate = self
            .working
            .transactions
            .values()
            .any(|t| t.reference_number.as_deref() == Some(new.reference_number.as_str()));
        if duplicate {
            return Err(StoreError::UniqueViolation(format!(
                "reference number {}",
                new.reference_number
            )));
        }

        self.working.last_transaction_id += 1;
        let now = Utc::now();
        let record = TransactionRecord {
            transaction_id: self.working.last_transaction_id,
            from_account_id: Some(new.from_account_id),
            to_account_id: Some(new.to_account_id),
            type_code: new.type_code.clone(),
            amount: new.amount,
            currency_code: new.currency_code.clone(),
            exchange_rate: new.exchange_rate,
            status_code: new.status_code.clone(),
            description: new.description.clone(),
            reference_number: Some(new.reference_number.clone()),
            transaction_date: new.transaction_date,
            created_at: now,
            updated_at: now,
        };
        self.working
            .transactions
            .insert(record.transaction_id, record.clone());
        Ok(record)
    }

    async fn get_transaction(
        &mut self,
        transaction_id: TransactionId,
    ) -> Result<Lookup<TransactionRecord>, StoreError> {
        Ok(self.working.transactions.get(&transaction_id).cloned().into())
    }

    async fn update_transaction_status(
        &mut self,
        transaction_id: TransactionId,
        status_code: &str,
    ) -> Result<TransactionRecord, StoreError> {
        self.probes.trip(FaultPoint::UpdateStatus)?;
        self.check_status(status_code)?;

        let record = self
            .working
            .transactions
            .get_mut(&transaction_id)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {}", transaction_id)))?;
        record.status_code = status_code.to_string();
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn create_entry(&mut self, new: &NewEntry) -> Result<Entry, StoreError> {
        self.probes.trip(FaultPoint::CreateEntry)?;
        self.check_account(new.account_id)?;
        if !self.working.transactions.contains_key(&new.transaction_id) {
            return Err(Self::foreign_key(format!(
                "transaction {}",
                new.transaction_id
            )));
        }

        self.working.last_entry_id += 1;
        let entry = Entry {
            entry_id: self.working.last_entry_id,
            account_id: Some(new.account_id),
            transaction_id: Some(new.transaction_id),
            amount: new.amount,
            created_at: Utc::now(),
        };
        self.working.entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_entries_for_transaction(
        &mut self,
        transaction_id: TransactionId,
    ) -> Result<Vec<Entry>, StoreError> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| e.transaction_id == Some(transaction_id))
            .cloned()
            .collect())
    }

    async fn get_transaction_status(
        &mut self,
        code: &str,
    ) -> Result<Lookup<TransactionStatus>, StoreError> {
        Ok(self.working.statuses.get(code).cloned().into())
    }

    async fn create_transaction_status(
        &mut self,
        code: &str,
        description: &str,
    ) -> Result<TransactionStatus, StoreError> {
        self.probes.trip(FaultPoint::CreateReference)?;
        let raced = self.probes.take_reference_race();
        if raced || self.working.statuses.contains_key(code) {
            self.working
                .statuses
                .entry(code.to_string())
                .or_insert_with(|| TransactionStatus {
                    status_code: code.to_string(),
                    description: description.to_string(),
                    is_active: true,
                });
            return Err(StoreError::UniqueViolation(format!(
                "transaction status {}",
                code
            )));
        }

        let status = TransactionStatus {
            status_code: code.to_string(),
            description: description.to_string(),
            is_active: true,
        };
        self.working
            .statuses
            .insert(code.to_string(), status.clone());
        Ok(status)
    }

    async fn get_transaction_type(
        &mut self,
        code: &str,
    ) -> Result<Lookup<TransactionType>, StoreError> {
        Ok(self.working.types.get(code).cloned().into())
    }

    async fn create_transaction_type(
        &mut self,
        code: &str,
        description: &str,
    ) -> Result<TransactionType, StoreError> {
        self.probes.trip(FaultPoint::CreateReference)?;
        let raced = self.probes.take_reference_race();
        if raced || self.working.types.contains_key(code) {
            self.working
                .types
                .entry(code.to_string())
                .or_insert_with(|| TransactionType {
                    type_code: code.to_string(),
                    description: description.to_string(),
                    is_active: true,
                });
            return Err(StoreError::UniqueViolation(format!(
                "transaction type {}",
                code
            )));
        }

        let kind = TransactionType {
            type_code: code.to_string(),
            description: description.to_string(),
            is_active: true,
        };
        self.working.types.insert(code.to_string(), kind.clone());
        Ok(kind)
    }

    async fn get_currency(&mut self, code: &str) -> Result<Lookup<Currency>, StoreError> {
        Ok(self.working.currencies.get(code).cloned().into())
    }

    async fn create_currency(&mut self, new: &NewCurrency) -> Result<Currency, StoreError> {
        self.probes.trip(FaultPoint::CreateReference)?;
        let currency = Currency {
            currency_code: new.currency_code.clone(),
            currency_name: new.currency_name.clone(),
            symbol: new.symbol.clone(),
            is_active: true,
            exchange_rate: new.exchange_rate,
            last_updated_at: Utc::now(),
        };

        let raced = self.probes.take_reference_race();
        if raced || self.working.currencies.contains_key(&new.currency_code) {
            self.working
                .currencies
                .entry(new.currency_code.clone())
                .or_insert(currency);
            return Err(StoreError::UniqueViolation(format!(
                "currency {}",
                new.currency_code
            )));
        }

        self.working
            .currencies
            .insert(new.currency_code.clone(), currency.clone());
        Ok(currency)
    }
}
