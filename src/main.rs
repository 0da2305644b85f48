//! Transfer Engine - operator CLI
//!
//! ```text
//! transfer_engine [--env <name>] migrate
//! transfer_engine [--env <name>] seed
//! transfer_engine [--env <name>] health
//! transfer_engine [--env <name>] transfer --from <id> --to <id> --amount <decimal>
//!                                 --currency <code> [--rate <f64>] [--reference <s>]
//!                                 [--description <s>]
//! transfer_engine [--env <name>] verify --transaction <id>
//! ```
//!
//! Results are printed to stdout as JSON; logs go to the configured file.

use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;

use transfer_engine::config::AppConfig;
use transfer_engine::db::Database;
use transfer_engine::money::parse_amount;
use transfer_engine::transfer::{TransferCoordinator, TransferParams};
use transfer_engine::{AccountId, TransactionId};

/// Fraction digits accepted for `--amount` (cents)
const AMOUNT_DECIMALS: u32 = 2;

// ============================================================
// ARGUMENTS
// ============================================================

fn get_arg(args: &[String], names: &[&str]) -> Option<String> {
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn require_arg(args: &[String], name: &str) -> anyhow::Result<String> {
    get_arg(args, &[name]).with_context(|| format!("missing required argument {}", name))
}

fn get_env(args: &[String]) -> String {
    get_arg(args, &["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

/// First argument that is neither a flag nor a flag's value
fn get_command(args: &[String]) -> Option<&str> {
    let mut skip_next = false;
    for arg in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with('-') {
            skip_next = true;
            continue;
        }
        return Some(arg.as_str());
    }
    None
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn transfer_params(args: &[String]) -> anyhow::Result<TransferParams> {
    let from: AccountId = require_arg(args, "--from")?
        .parse()
        .context("--from must be an account id")?;
    let to: AccountId = require_arg(args, "--to")?
        .parse()
        .context("--to must be an account id")?;
    let amount = parse_amount(&require_arg(args, "--amount")?, AMOUNT_DECIMALS)
        .context("invalid --amount")?;
    let currency = require_arg(args, "--currency")?;

    let mut params = TransferParams::new(from, to, amount, currency);
    if let Some(rate) = get_arg(args, &["--rate"]) {
        params = params.with_exchange_rate(rate.parse::<f64>().context("--rate must be a number")?);
    }
    if let Some(reference) = get_arg(args, &["--reference"]) {
        params = params.with_reference_number(reference);
    }
    if let Some(description) = get_arg(args, &["--description"]) {
        params = params.with_description(description);
    }
    Ok(params)
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let env = get_env(&args);
    let app_config = AppConfig::load(&env)?;
    let _log_guard = transfer_engine::logging::init_logging(&app_config);

    tracing::info!(
        env = %env,
        git_hash = env!("GIT_HASH"),
        "Starting transfer engine"
    );

    let Some(command) = get_command(&args) else {
        bail!("usage: transfer_engine [--env <name>] <migrate|seed|health|transfer|verify> [options]");
    };

    let db = Database::connect(&app_config.postgres)
        .await
        .context("Failed to connect to PostgreSQL")?;

    match command {
        "migrate" => {
            db.migrate().await.context("Migration failed")?;
            println!("migrations applied");
        }
        "health" => {
            db.health_check().await.context("Health check failed")?;
            println!("ok");
        }
        "seed" => {
            let coordinator = TransferCoordinator::new(Arc::new(db.store()));
            let seeded = coordinator.resolver().seed_catalogs().await?;
            print_json(&serde_json::json!({
                "statuses": seeded.statuses,
                "types": seeded.types,
                "currencies": seeded.currencies,
            }))?;
        }
        "transfer" => {
            let params = transfer_params(&args)?;
            let coordinator =
                TransferCoordinator::from_config(Arc::new(db.store()), &app_config.transfer);
            match coordinator.transfer(params).await {
                Ok(result) => print_json(&result)?,
                Err(e) => {
                    print_json(&serde_json::json!({
                        "code": e.code(),
                        "status": e.http_status(),
                        "retryable": e.is_retryable(),
                        "message": e.to_string(),
                    }))?;
                    bail!(e);
                }
            }
        }
        "verify" => {
            let transaction_id: TransactionId = require_arg(&args, "--transaction")?
                .parse()
                .context("--transaction must be a transaction id")?;
            let coordinator = TransferCoordinator::new(Arc::new(db.store()));
            let audit = coordinator.verify_ledger(transaction_id).await?;
            print_json(&audit)?;
        }
        other => bail!("unknown command: {}", other),
    }

    Ok(())
}
