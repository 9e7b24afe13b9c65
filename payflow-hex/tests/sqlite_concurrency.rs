//! Concurrent debits against a file-backed SQLite ledger (WAL, pooled connections).

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use payflow_hex::PaymentService;
use payflow_repo::SqliteRepo;
use payflow_types::{
    AccountId, CreatePaymentMethodRequest, InitializeTransaction, PartyRole, PaymentDetails,
    PaymentMethodId, RegisterAccountRequest, SetBalanceRequest, TransactionStatus,
};

struct Ledger {
    _dir: TempDir,
    service: Arc<PaymentService<SqliteRepo>>,
    payer: AccountId,
    payee: AccountId,
    method: PaymentMethodId,
}

async fn file_ledger(balance: Decimal) -> Ledger {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("ledger.db").display()
    );
    let repo = Arc::new(SqliteRepo::new(&url).await.unwrap());
    let service = PaymentService::new(repo.clone(), repo);

    let payer = service
        .register_account(RegisterAccountRequest {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            as_payer: true,
            as_payee: false,
        })
        .await
        .unwrap()
        .id;
    let payee = service
        .register_account(RegisterAccountRequest {
            name: "Bob".into(),
            email: "bob@example.com".into(),
            as_payer: false,
            as_payee: true,
        })
        .await
        .unwrap()
        .id;
    service
        .set_balance(
            payer,
            SetBalanceRequest {
                role: PartyRole::Payer,
                balance,
            },
        )
        .await
        .unwrap();
    let method = service
        .create_payment_method(
            payer,
            CreatePaymentMethodRequest {
                method_type: "card".into(),
                card_number: Some("4111111111111111".into()),
                expiry_date: Some("12/27".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id;

    Ledger {
        _dir: dir,
        service: Arc::new(service),
        payer,
        payee,
        method,
    }
}

fn debit(ledger: &Ledger, amount: Decimal) -> InitializeTransaction {
    InitializeTransaction {
        transaction_id: None,
        payer_id: ledger.payer,
        payee_id: ledger.payee,
        amount,
        transaction_type: "debit".into(),
        payment_method_id: ledger.method,
        payment_details: PaymentDetails {
            card_number: Some("4111111111111111".into()),
            expiry_date: Some("12/27".into()),
            cvv: Some("123".into()),
            ..Default::default()
        },
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_debits_never_overdraw_on_sqlite() {
    let ledger = file_ledger(dec!(100)).await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let service = ledger.service.clone();
            let cmd = debit(&ledger, dec!(20));
            tokio::spawn(async move { service.initialize_transaction(cmd).await })
        })
        .collect();

    let mut completed = 0u32;
    let mut errors: HashMap<&'static str, u32> = HashMap::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(tx) => {
                assert_eq!(tx.status, TransactionStatus::Completed);
                completed += 1;
            }
            Err(err) => *errors.entry(err.reason()).or_default() += 1,
        }
    }
    for reason in errors.keys() {
        assert!(
            matches!(*reason, "insufficient_funds" | "storage_error"),
            "unexpected failure: {reason}"
        );
    }

    let payer = ledger.service.get_payer(ledger.payer).await.unwrap();
    let payee = ledger.service.get_payee(ledger.payee).await.unwrap();

    assert!((1..=5).contains(&completed));
    assert!(payer.balance.amount() >= Decimal::ZERO);
    assert_eq!(payer.balance.amount() + payee.balance.amount(), dec!(100));
    assert_eq!(payee.balance.amount(), dec!(20) * Decimal::from(completed));

    let rows = ledger.service.list_transactions(ledger.payer).await.unwrap();
    assert_eq!(rows.len(), 20);
    for tx in &rows {
        assert_ne!(tx.status, TransactionStatus::Reserved, "stuck row {}", tx.id);
        assert!(tx.reserved_amount.is_zero(), "held funds on {}", tx.id);
    }
    let settled = rows
        .iter()
        .filter(|tx| tx.status == TransactionStatus::Completed)
        .count();
    assert_eq!(settled as u32, completed);
}
