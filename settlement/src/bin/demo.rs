//! Walkthrough binary: provisions a wallet, credits it, places an order,
//! and replays the credit to show the idempotent path.

use anyhow::Result;
use rust_decimal::Decimal;
use settlement::{Config, CreditRequest, SettlementEngine, UserId};
use wallet_core::types::EntryFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting PanelPay settlement demo");

    let mut config = Config::from_env()?;
    if std::env::var("SETTLEMENT_LEDGER_DIR").is_err() {
        config.ledger_data_dir =
            std::env::temp_dir().join(format!("panelpay-demo-{}", std::process::id()));
    }

    let engine = SettlementEngine::new(config)?;
    let user = UserId::new("demo-user");
    engine.create_wallet(&user).await?;

    // Gateway-confirmed top-up
    let credit = engine
        .credit_funds(
            CreditRequest::new(user.clone(), Decimal::new(10000, 2), "Wallet Top-up via Credit Card")
                .with_external_ref("PP_1")
                .with_payment_method("card"),
        )
        .await?;
    tracing::info!(balance = %credit.wallet.balance, "Funds credited");

    // Order 1000 Instagram followers, priced by the catalog
    let receipt = engine
        .place_order(&user, "ig-followers", 1000, "https://instagram.com/example")
        .await?;
    tracing::info!(
        order = %receipt.order.order_id,
        price = %receipt.order.price,
        balance = %receipt.wallet.balance,
        "Order placed"
    );

    // The gateway retries its webhook; nothing moves twice
    let replay = engine
        .credit_funds(
            CreditRequest::new(user.clone(), Decimal::new(10000, 2), "Wallet Top-up via Credit Card")
                .with_external_ref("PP_1"),
        )
        .await?;
    tracing::info!(replayed = replay.replayed, balance = %replay.wallet.balance, "Webhook retry absorbed");

    let wallet = engine.wallet(&user).await?;
    let entries = engine.entries(&user, EntryFilter::default()).await?;
    println!("{}", serde_json::to_string_pretty(&wallet)?);
    tracing::info!(entries = entries.len(), "Demo complete");

    Ok(())
}
