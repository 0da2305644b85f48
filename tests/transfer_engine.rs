//! Crate-level tests through the public API, backed by the in-memory store.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use transfer_engine::config::AppConfig;
use transfer_engine::store::FaultPoint;
use transfer_engine::transfer::{TransactionStatusCode, TransferStep};
use transfer_engine::{
    MemoryStore, Store, TransferCoordinator, TransferError, TransferParams, UnitOfWork,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn test_transfer_then_audit() {
    let store = Arc::new(MemoryStore::new());
    let alice = store.open_account(1, "USD", dec("100.00")).await;
    let bob = store.open_account(2, "USD", dec("50.00")).await;
    let coordinator = TransferCoordinator::new(store.clone());

    let result = coordinator
        .transfer(TransferParams::new(
            alice.account_id,
            bob.account_id,
            dec("10.00"),
            "USD",
        ))
        .await
        .unwrap();

    assert_eq!(
        result.transaction.status_code,
        TransactionStatusCode::Completed.as_str()
    );
    assert_eq!(result.from_account.balance, dec("90.00"));
    assert_eq!(result.to_account.balance, dec("60.00"));

    let audit = coordinator
        .verify_ledger(result.transaction.transaction_id)
        .await
        .unwrap();
    assert_eq!(audit.entries, vec![result.from_entry, result.to_entry]);
}

#[tokio::test]
async fn test_configured_coordinator() {
    let yaml = r#"
log_level: "debug"
log_dir: "./logs"
log_file: "test.log"
use_json: false
rotation: "never"
transfer:
  timeout_ms: 5000
  description: "Configured"
"#;
    let config = AppConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.transfer.timeout(), Some(Duration::from_secs(5)));

    let store = Arc::new(MemoryStore::new());
    let a = store.open_account(1, "GBP", dec("10")).await;
    let b = store.open_account(2, "GBP", dec("0")).await;
    let coordinator = TransferCoordinator::from_config(store, &config.transfer);

    let result = coordinator
        .transfer(
            TransferParams::new(a.account_id, b.account_id, dec("2.5"), "GBP")
                .with_exchange_rate(1.26),
        )
        .await
        .unwrap();
    assert_eq!(result.transaction.description.as_deref(), Some("Configured"));
    assert_eq!(result.currency.symbol.as_deref(), Some("£"));
    assert_eq!(result.transaction.exchange_rate, dec("1.26"));
}

#[tokio::test]
async fn test_rejected_input_is_not_retryable() {
    let store = Arc::new(MemoryStore::new());
    let a = store.open_account(1, "USD", dec("10")).await;
    let coordinator = TransferCoordinator::new(store.clone());

    for params in [
        TransferParams::new(a.account_id, a.account_id + 1, dec("0"), "USD"),
        TransferParams::new(a.account_id, a.account_id + 1, dec("1"), "usd$"),
        TransferParams::new(a.account_id, a.account_id + 1, dec("1"), "USD")
            .with_exchange_rate(-1.0),
        TransferParams::new(a.account_id, a.account_id + 1, dec("1"), "USD")
            .with_exchange_rate(f64::INFINITY),
    ] {
        let err = coordinator.transfer(params).await.unwrap_err();
        assert_eq!(err.http_status(), 400, "unexpected status for {}", err);
        assert!(!err.is_retryable());
    }
    assert!(store.transactions().await.is_empty());
}

#[tokio::test]
async fn test_partial_progress_is_never_visible() {
    let store = Arc::new(MemoryStore::new());
    let a = store.open_account(1, "USD", dec("100")).await;
    let b = store.open_account(2, "USD", dec("100")).await;
    let coordinator = TransferCoordinator::new(store.clone());

    store.fail_on(FaultPoint::UpdateStatus, 1);
    let err = coordinator
        .transfer(TransferParams::new(
            a.account_id,
            b.account_id,
            dec("30"),
            "USD",
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::Storage {
            step: TransferStep::UpdateStatus,
            ..
        }
    ));

    // a fresh unit of work sees the pre-call state
    let mut uow = store.begin().await.unwrap();
    let seen = uow
        .get_account(a.account_id)
        .await
        .unwrap()
        .into_option()
        .unwrap();
    assert_eq!(seen.balance, dec("100"));
    assert!(uow.list_entries_for_transaction(1).await.unwrap().is_empty());
    uow.rollback().await.unwrap();

    // and the same transfer goes through afterwards
    let result = coordinator
        .transfer(TransferParams::new(
            a.account_id,
            b.account_id,
            dec("30"),
            "USD",
        ))
        .await
        .unwrap();
    assert_eq!(result.from_account.balance, dec("70"));
    assert_eq!(result.to_account.balance, dec("130"));
}
