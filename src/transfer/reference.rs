//! Reference-Data Resolver
//!
//! Statuses, transaction types and currencies are resolved lazily on first
//! use: fetch by code, create from the static catalog when absent.
//!
//! Creation can lose against a concurrent caller doing the same thing. The
//! store reports that as a unique violation without poisoning the unit of
//! work, and the resolver re-fetches the winner's row in the same unit of
//! work instead of failing the surrounding transfer.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::TransferError;
use super::executor::UnitOfWorkExecutor;
use super::state::{TransactionStatusCode, TransactionTypeCode};
use crate::models::{Currency, NewCurrency, TransactionStatus, TransactionType};
use crate::money::exchange_rate_from_f64;
use crate::store::{Lookup, Store, StoreError, UnitOfWork};

pub const STATUS_TABLE: &str = "transaction status";
pub const TYPE_TABLE: &str = "transaction type";
pub const CURRENCY_TABLE: &str = "currency";

pub const UNKNOWN_STATUS_DESCRIPTION: &str = "Unknown transaction status";
pub const UNKNOWN_TYPE_DESCRIPTION: &str = "Unknown transaction type";
pub const UNKNOWN_CURRENCY_NAME: &str = "Unknown Currency";

// ============================================================
// CATALOGS
// ============================================================

/// Static currency catalog entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
    /// Rate against USD
    pub rate: f64,
}

pub static KNOWN_CURRENCIES: [CurrencyInfo; 4] = [
    CurrencyInfo {
        code: "USD",
        name: "US Dollar",
        symbol: "$",
        rate: 1.0,
    },
    CurrencyInfo {
        code: "EUR",
        name: "Euro",
        symbol: "€",
        rate: 1.08,
    },
    CurrencyInfo {
        code: "GBP",
        name: "British Pound",
        symbol: "£",
        rate: 1.26,
    },
    CurrencyInfo {
        code: "JPY",
        name: "Japanese Yen",
        symbol: "¥",
        rate: 0.0067,
    },
];

pub fn currency_info(code: &str) -> Option<&'static CurrencyInfo> {
    KNOWN_CURRENCIES.iter().find(|c| c.code == code)
}

pub fn status_description(code: &str) -> &'static str {
    TransactionStatusCode::from_code(code)
        .map(|s| s.description())
        .unwrap_or(UNKNOWN_STATUS_DESCRIPTION)
}

pub fn type_description(code: &str) -> &'static str {
    TransactionTypeCode::from_code(code)
        .map(|t| t.description())
        .unwrap_or(UNKNOWN_TYPE_DESCRIPTION)
}

/// Row to insert for a currency seen for the first time.
///
/// Unknown codes get a placeholder name and a 1.0 rate.
pub fn new_currency(code: &str) -> Result<NewCurrency, TransferError> {
    let (name, symbol, rate) = match currency_info(code) {
        Some(info) => (info.name, Some(info.symbol.to_string()), info.rate),
        None => (UNKNOWN_CURRENCY_NAME, None, 1.0),
    };
    let exchange_rate = exchange_rate_from_f64(rate).map_err(TransferError::InvalidExchangeRate)?;

    Ok(NewCurrency {
        currency_code: code.to_string(),
        currency_name: name.to_string(),
        symbol,
        exchange_rate,
    })
}

// ============================================================
// IN-FLOW RESOLUTION (caller's unit of work)
// ============================================================

fn reference_error(table: &'static str, code: &str) -> impl FnOnce(StoreError) -> TransferError {
    let code = code.to_string();
    move |source| TransferError::ReferenceData {
        table,
        code,
        source,
    }
}

fn vanished(table: &'static str, code: &str) -> TransferError {
    TransferError::ReferenceVanished {
        table,
        code: code.to_string(),
    }
}

/// A code-keyed reference table
#[async_trait]
trait ReferenceTable: Sized + Send {
    const TABLE: &'static str;

    /// Insert payload for a code seen for the first time
    type New: Send + Sync;

    fn code(&self) -> &str;

    fn prepare(code: &str) -> Result<Self::New, TransferError>;

    async fn fetch<U: UnitOfWork>(uow: &mut U, code: &str) -> Result<Lookup<Self>, StoreError>;

    async fn create<U: UnitOfWork>(
        uow: &mut U,
        code: &str,
        new: &Self::New,
    ) -> Result<Self, StoreError>;
}

#[async_trait]
impl ReferenceTable for TransactionStatus {
    const TABLE: &'static str = STATUS_TABLE;
    type New = &'static str;

    fn code(&self) -> &str {
        &self.status_code
    }

    fn prepare(code: &str) -> Result<&'static str, TransferError> {
        Ok(status_description(code))
    }

    async fn fetch<U: UnitOfWork>(uow: &mut U, code: &str) -> Result<Lookup<Self>, StoreError> {
        uow.get_transaction_status(code).await
    }

    async fn create<U: UnitOfWork>(
        uow: &mut U,
        code: &str,
        description: &&'static str,
    ) -> Result<Self, StoreError> {
        uow.create_transaction_status(code, description).await
    }
}

#[async_trait]
impl ReferenceTable for TransactionType {
    const TABLE: &'static str = TYPE_TABLE;
    type New = &'static str;

    fn code(&self) -> &str {
        &self.type_code
    }

    fn prepare(code: &str) -> Result<&'static str, TransferError> {
        Ok(type_description(code))
    }

    async fn fetch<U: UnitOfWork>(uow: &mut U, code: &str) -> Result<Lookup<Self>, StoreError> {
        uow.get_transaction_type(code).await
    }

    async fn create<U: UnitOfWork>(
        uow: &mut U,
        code: &str,
        description: &&'static str,
    ) -> Result<Self, StoreError> {
        uow.create_transaction_type(code, description).await
    }
}

#[async_trait]
impl ReferenceTable for Currency {
    const TABLE: &'static str = CURRENCY_TABLE;
    type New = NewCurrency;

    fn code(&self) -> &str {
        &self.currency_code
    }

    fn prepare(code: &str) -> Result<NewCurrency, TransferError> {
        new_currency(code)
    }

    async fn fetch<U: UnitOfWork>(uow: &mut U, code: &str) -> Result<Lookup<Self>, StoreError> {
        uow.get_currency(code).await
    }

    async fn create<U: UnitOfWork>(
        uow: &mut U,
        _code: &str,
        new: &NewCurrency,
    ) -> Result<Self, StoreError> {
        uow.create_currency(new).await
    }
}

/// Fetch `code`, creating it when absent. A lost creation race re-fetches
/// the winner's row in the same unit of work.
async fn resolve_or_create<R: ReferenceTable, U: UnitOfWork>(
    uow: &mut U,
    code: &str,
) -> Result<R, TransferError> {
    if code.is_empty() {
        return Err(TransferError::EmptyReferenceCode);
    }

    let existing = R::fetch(uow, code)
        .await
        .map_err(reference_error(R::TABLE, code))?;
    if let Lookup::Found(row) = existing
        && row.code() == code
    {
        return Ok(row);
    }

    let new = R::prepare(code)?;
    match R::create(uow, code, &new).await {
        Ok(row) => {
            debug!(table = R::TABLE, code, "Reference row created");
            Ok(row)
        }
        Err(e) if e.is_unique_violation() => {
            warn!(table = R::TABLE, code, "Lost reference creation race, re-fetching");
            R::fetch(uow, code)
                .await
                .map_err(reference_error(R::TABLE, code))?
                .into_option()
                .ok_or_else(|| vanished(R::TABLE, code))
        }
        Err(e) => Err(reference_error(R::TABLE, code)(e)),
    }
}

pub async fn resolve_transaction_status<U: UnitOfWork>(
    uow: &mut U,
    code: &str,
) -> Result<TransactionStatus, TransferError> {
    resolve_or_create(uow, code).await
}

pub async fn resolve_transaction_type<U: UnitOfWork>(
    uow: &mut U,
    code: &str,
) -> Result<TransactionType, TransferError> {
    resolve_or_create(uow, code).await
}

pub async fn resolve_currency<U: UnitOfWork>(
    uow: &mut U,
    code: &str,
) -> Result<Currency, TransferError> {
    resolve_or_create(uow, code).await
}

/// Reference rows a transfer needs
#[derive(Debug, Clone)]
pub struct TransferReferences {
    pub pending: TransactionStatus,
    pub completed: TransactionStatus,
    pub transfer_type: TransactionType,
    pub currency: Currency,
}

pub async fn resolve_transfer_references<U: UnitOfWork>(
    uow: &mut U,
    currency_code: &str,
) -> Result<TransferReferences, TransferError> {
    let transfer_type = resolve_transaction_type(uow, TransactionTypeCode::Transfer.as_str()).await?;
    let pending = resolve_transaction_status(uow, TransactionStatusCode::Pending.as_str()).await?;
    let completed =
        resolve_transaction_status(uow, TransactionStatusCode::Completed.as_str()).await?;
    let currency = resolve_currency(uow, currency_code).await?;

    Ok(TransferReferences {
        pending,
        completed,
        transfer_type,
        currency,
    })
}

// ============================================================
// STANDALONE RESOLVER (own unit of work per call)
// ============================================================

/// Catalog rows written by [`ReferenceResolver::seed_catalogs`]
#[derive(Debug, Clone, Default)]
pub struct SeededCatalogs {
    pub statuses: Vec<TransactionStatus>,
    pub types: Vec<TransactionType>,
    pub currencies: Vec<Currency>,
}

/// Resolves reference rows outside a transfer
pub struct ReferenceResolver<S: Store> {
    executor: UnitOfWorkExecutor<S>,
}

impl<S: Store> Clone for ReferenceResolver<S> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<S: Store> ReferenceResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            executor: UnitOfWorkExecutor::new(store),
        }
    }

    pub fn with_executor(executor: UnitOfWorkExecutor<S>) -> Self {
        Self { executor }
    }

    pub async fn transaction_status(&self, code: &str) -> Result<TransactionStatus, TransferError> {
        let code = code.to_string();
        self.executor
            .execute(move |uow| Box::pin(async move { resolve_transaction_status(uow, &code).await }))
            .await
    }

    pub async fn transaction_type(&self, code: &str) -> Result<TransactionType, TransferError> {
        let code = code.to_string();
        self.executor
            .execute(move |uow| Box::pin(async move { resolve_transaction_type(uow, &code).await }))
            .await
    }

    pub async fn currency(&self, code: &str) -> Result<Currency, TransferError> {
        let code = code.to_string();
        self.executor
            .execute(move |uow| Box::pin(async move { resolve_currency(uow, &code).await }))
            .await
    }

    /// Make sure every catalog code has a row. Idempotent.
    pub async fn seed_catalogs(&self) -> Result<SeededCatalogs, TransferError> {
        self.executor
            .execute(|uow| {
                Box::pin(async move {
                    let mut seeded = SeededCatalogs::default();
                    for status in TransactionStatusCode::ALL {
                        seeded
                            .statuses
                            .push(resolve_transaction_status(uow, status.as_str()).await?);
                    }
                    for kind in TransactionTypeCode::ALL {
                        seeded
                            .types
                            .push(resolve_transaction_type(uow, kind.as_str()).await?);
                    }
                    for info in KNOWN_CURRENCIES.iter() {
                        seeded.currencies.push(resolve_currency(uow, info.code).await?);
                    }
                    Ok(seeded)
                })
            })
            .await
    }
}
