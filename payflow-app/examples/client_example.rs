//! Client example demonstrating a debit and its refund against a running server.
//!
//! Run with: cargo run -p payflow-app --example client_example --no-default-features --features sqlite

use std::net::SocketAddr;
use std::sync::Arc;

use payflow_client::PayflowClient;
use payflow_hex::{PaymentService, inbound::HttpServer};
use payflow_repo::build_repo;
use payflow_types::{CreatePaymentMethodRequest, CreateTransactionRequest, PartyRole, PaymentDetails};
use rust_decimal_macros::dec;
use tempfile::tempdir;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Bind an available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;

    // Use a temp file-backed SQLite DB
    let tmp = tempdir()?;
    let db_path = tmp.path().join("payflow.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    println!("🚀 Starting server on {addr}...");
    println!("   Database: {db_url}");

    // Build repository (handles connection and migration)
    let repo = Arc::new(build_repo(&db_url).await?);

    // Start server in background
    let service = PaymentService::new(repo.clone(), repo);
    let router = HttpServer::new(service).router();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router.into_make_service()).await {
            eprintln!("server stopped: {e}");
        }
    });

    let base_url = format!("http://{addr}");
    let anonymous = PayflowClient::new(&base_url);

    // Health check
    let health = anonymous.health().await?;
    println!("✅ Server health: {health}");

    // Calls without an identity are rejected
    let response = anonymous.me().await;
    assert!(response.is_err());
    println!("✅ Rejected without x-user-id: {}", response.unwrap_err());

    // Register accounts
    let alice = anonymous
        .register("Alice", "alice@example.com", true, false)
        .await?;
    println!("✅ Registered payer: {} (id={})", alice.name, alice.id);
    let bob = anonymous
        .register("Bob", "bob@example.com", false, true)
        .await?;
    println!("✅ Registered payee: {} (id={})", bob.name, bob.id);

    let as_alice = PayflowClient::new(&base_url).with_user(alice.id);
    let as_bob = PayflowClient::new(&base_url).with_user(bob.id);

    as_alice.set_balance(PartyRole::Payer, dec!(100)).await?;
    println!("✅ Seeded Alice with 100.00");

    let card = as_alice
        .create_payment_method(&CreatePaymentMethodRequest {
            method_type: "card".into(),
            card_number: Some("4111111111111111".into()),
            expiry_date: Some("12/27".into()),
            ..Default::default()
        })
        .await?;
    println!("✅ Stored card (id={})", card.id);

    let details = PaymentDetails {
        card_number: Some("4111111111111111".into()),
        expiry_date: Some("12/27".into()),
        cvv: Some("123".into()),
        ..Default::default()
    };

    // Debit Alice, credit Bob
    let debit = as_alice
        .create_transaction(&CreateTransactionRequest {
            transaction_id: None,
            payer_id: None,
            payee_id: bob.id,
            status: None,
            amount: dec!(35),
            transaction_type: "debit".into(),
            payment_method_id: card.id,
            payment_details: details.clone(),
        })
        .await?;
    println!(
        "✅ Debit {} is {} ({})",
        debit.transaction_id, debit.status, debit.message
    );

    let alice_now = as_alice.me().await?;
    let bob_now = as_bob.me().await?;
    println!("   Alice payer balance: {:?}", alice_now.payer_balance);
    println!("   Bob payee balance: {:?}", bob_now.payee_balance);

    // Refund it
    let refund = as_alice
        .create_transaction(&CreateTransactionRequest {
            transaction_id: Some(debit.transaction_id),
            payer_id: None,
            payee_id: bob.id,
            status: None,
            amount: dec!(35),
            transaction_type: "refund".into(),
            payment_method_id: card.id,
            payment_details: details,
        })
        .await?;
    println!("✅ Refund {} is {}", refund.transaction_id, refund.status);

    println!("\n📋 Audit trail of the debit:");
    for entry in as_alice.audit_trail(debit.transaction_id).await? {
        println!("   - {}: {}", entry.action, entry.details);
    }

    println!("\n🎉 Example completed successfully!");

    Ok(())
}
