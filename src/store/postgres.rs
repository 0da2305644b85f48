//! PostgreSQL Store
//!
//! sqlx-backed implementation of the storage contract. Every
//! [`PgUnitOfWork`] wraps one `sqlx::Transaction`; dropping it without a
//! commit rolls the transaction back.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use super::{Lookup, Store, StoreError, UnitOfWork};
use crate::core_types::{AccountId, TransactionId};
use crate::models::{
    Account, Currency, Entry, NewCurrency, NewEntry, NewTransaction, TransactionRecord,
    TransactionStatus, TransactionType,
};

const ACCOUNT_COLUMNS: &str = "account_id, user_id, account_number, account_type, currency_code, \
     balance, interest_rate, overdraft_limit, is_active, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "transaction_id, from_account_id, to_account_id, type_code, \
     amount, currency_code, exchange_rate, status_code, description, reference_number, \
     transaction_date, created_at, updated_at";

const ENTRY_COLUMNS: &str = "entry_id, account_id, transaction_id, amount, created_at";

const CURRENCY_COLUMNS: &str =
    "currency_code, currency_name, symbol, is_active, exchange_rate, last_updated_at";

const FK_FROM_ACCOUNT: &str = "transactions_from_account_id_fkey";
const FK_TO_ACCOUNT: &str = "transactions_to_account_id_fkey";

/// PostgreSQL unit-of-work factory
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    type UnitOfWork = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgUnitOfWork { tx })
    }
}

/// One open PostgreSQL transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

/// Map an empty `RETURNING` on a write to a typed error
fn required<T>(row: Option<T>, what: impl FnOnce() -> String) -> Result<T, StoreError> {
    row.ok_or_else(|| StoreError::NotFound(what()))
}

/// Map constraint failures of the transaction insert to typed errors.
///
/// Reference rows are resolved before the insert, so a foreign-key failure
/// on the account columns means the account does not exist.
fn transaction_insert_error(e: sqlx::Error, new: &NewTransaction) -> StoreError {
    let Some(db) = e.as_database_error() else {
        return StoreError::Database(e);
    };
    if db.is_unique_violation() {
        return StoreError::UniqueViolation(format!("reference number {}", new.reference_number));
    }
    if db.is_foreign_key_violation() {
        match db.constraint() {
            Some(FK_FROM_ACCOUNT) => {
                return StoreError::NotFound(format!("account {}", new.from_account_id));
            }
            Some(FK_TO_ACCOUNT) => {
                return StoreError::NotFound(format!("account {}", new.to_account_id));
            }
            _ => {}
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn get_account(&mut self, account_id: AccountId) -> Result<Lookup<Account>, StoreError> {
        let sql = format!("SELECT {} FROM accounts WHERE account_id = $1", ACCOUNT_COLUMNS);
        let row: Option<Account> = sqlx::query_as(&sql)
            .bind(account_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Account, StoreError> {
        // Row lock and arithmetic in one statement; the lock is held until
        // the unit of work ends.
        let sql = format!(
            r#"
            UPDATE accounts
            SET balance = balance + $2, updated_at = NOW()
            WHERE account_id = $1 AND is_active = TRUE
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );
        let row: Option<Account> = sqlx::query_as(&sql)
            .bind(account_id)
            .bind(delta)
            .fetch_optional(&mut *self.tx)
            .await?;
        required(row, || format!("active account {}", account_id))
    }

    async fn create_transaction(
        &mut self,
        new: &NewTransaction,
    ) -> Result<TransactionRecord, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO transactions
                (from_account_id, to_account_id, type_code, amount, currency_code,
                 exchange_rate, status_code, description, reference_number, transaction_date)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );
        let record: TransactionRecord = sqlx::query_as(&sql)
            .bind(new.from_account_id)
            .bind(new.to_account_id)
            .bind(&new.type_code)
            .bind(new.amount)
            .bind(&new.currency_code)
            .bind(new.exchange_rate)
            .bind(&new.status_code)
            .bind(&new.description)
            .bind(&new.reference_number)
            .bind(new.transaction_date)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| transaction_insert_error(e, new))?;
        Ok(record)
    }

    async fn get_transaction(
        &mut self,
        transaction_id: TransactionId,
    ) -> Result<Lookup<TransactionRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE transaction_id = $1",
            TRANSACTION_COLUMNS
        );
        let row: Option<TransactionRecord> = sqlx::query_as(&sql)
            .bind(transaction_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn update_transaction_status(
        &mut self,
        transaction_id: TransactionId,
        status_code: &str,
    ) -> Result<TransactionRecord, StoreError> {
        let sql = format!(
            r#"
            UPDATE transactions
            SET status_code = $2, updated_at = NOW()
            WHERE transaction_id = $1
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );
        let row: Option<TransactionRecord> = sqlx::query_as(&sql)
            .bind(transaction_id)
            .bind(status_code)
            .fetch_optional(&mut *self.tx)
            .await?;
        required(row, || format!("transaction {}", transaction_id))
    }

    async fn create_entry(&mut self, new: &NewEntry) -> Result<Entry, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO entries (account_id, transaction_id, amount)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );
        let entry: Entry = sqlx::query_as(&sql)
            .bind(new.account_id)
            .bind(new.transaction_id)
            .bind(new.amount)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(entry)
    }

    async fn list_entries_for_transaction(
        &mut self,
        transaction_id: TransactionId,
    ) -> Result<Vec<Entry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM entries WHERE transaction_id = $1 ORDER BY entry_id",
            ENTRY_COLUMNS
        );
        let rows: Vec<Entry> = sqlx::query_as(&sql)
            .bind(transaction_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn get_transaction_status(
        &mut self,
        code: &str,
    ) -> Result<Lookup<TransactionStatus>, StoreError> {
        let row: Option<TransactionStatus> = sqlx::query_as(
            "SELECT status_code, description, is_active FROM transaction_statuses WHERE status_code = $1",
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn create_transaction_status(
        &mut self,
        code: &str,
        description: &str,
    ) -> Result<TransactionStatus, StoreError> {
        // Losing to a concurrent creator must not abort the transaction
        let row: Option<TransactionStatus> = sqlx::query_as(
            r#"
            INSERT INTO transaction_statuses (status_code, description)
            VALUES ($1, $2)
            ON CONFLICT (status_code) DO NOTHING
            RETURNING status_code, description, is_active
            "#,
        )
        .bind(code)
        .bind(description)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.ok_or_else(|| StoreError::UniqueViolation(format!("transaction status {}", code)))
    }

    async fn get_transaction_type(
        &mut self,
        code: &str,
    ) -> Result<Lookup<TransactionType>, StoreError> {
        let row: Option<TransactionType> = sqlx::query_as(
            "SELECT type_code, description, is_active FROM transaction_types WHERE type_code = $1",
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn create_transaction_type(
        &mut self,
        code: &str,
        description: &str,
    ) -> Result<TransactionType, StoreError> {
        let row: Option<TransactionType> = sqlx::query_as(
            r#"
            INSERT INTO transaction_types (type_code, description)
            VALUES ($1, $2)
            ON CONFLICT (type_code) DO NOTHING
            RETURNING type_code, description, is_active
            "#,
        )
        .bind(code)
        .bind(description)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.ok_or_else(|| StoreError::UniqueViolation(format!("transaction type {}", code)))
    }

    async fn get_currency(&mut self, code: &str) -> Result<Lookup<Currency>, StoreError> {
        let sql = format!(
            "SELECT {} FROM account_currencies WHERE currency_code = $1",
            CURRENCY_COLUMNS
        );
        let row: Option<Currency> = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn create_currency(&mut self, new: &NewCurrency) -> Result<Currency, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO account_currencies
                (currency_code, currency_name, symbol, exchange_rate, last_updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (currency_code) DO NOTHING
            RETURNING {}
            "#,
            CURRENCY_COLUMNS
        );
        let row: Option<Currency> = sqlx::query_as(&sql)
            .bind(&new.currency_code)
            .bind(&new.currency_name)
            .bind(&new.symbol)
            .bind(new.exchange_rate)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.ok_or_else(|| StoreError::UniqueViolation(format!("currency {}", new.currency_code)))
    }
}
