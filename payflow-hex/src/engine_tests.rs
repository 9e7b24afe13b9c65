//! Transaction engine tests against the in-memory ledger.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use payflow_types::{
        AccountId, AppError, InitializeTransaction, LedgerRepository, MethodStatus, Money,
        PartyRole, PaymentDetails, PaymentMethod, SetBalanceRequest, Transaction, TransactionId,
        TransactionStatus, TransactionType, UpdatePaymentMethodRequest,
    };

    use crate::service_tests::tests::{
        CommitFault, FailingSink, MockRepo, card_request, register, service,
    };
    use crate::{EngineConfig, PaymentService};

    struct Fixture {
        repo: Arc<MockRepo>,
        service: PaymentService<MockRepo>,
        payer: AccountId,
        payee: AccountId,
        method: PaymentMethod,
    }

    async fn fixture_with(
        repo: Arc<MockRepo>,
        service: PaymentService<MockRepo>,
        balance: Decimal,
    ) -> Fixture {
        let payer = register(&service, "Alice", true, false).await;
        let payee = register(&service, "Bob", false, true).await;
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
            .create_payment_method(payer, card_request())
            .await
            .unwrap();

        Fixture {
            repo,
            service,
            payer,
            payee,
            method,
        }
    }

    async fn fixture(balance: Decimal) -> Fixture {
        let repo = Arc::new(MockRepo::new());
        let service = service(&repo);
        fixture_with(repo, service, balance).await
    }

    fn card_details() -> PaymentDetails {
        PaymentDetails {
            card_number: Some("4111111111111111".into()),
            expiry_date: Some("12/27".into()),
            cvv: Some("123".into()),
            ..Default::default()
        }
    }

    fn command(f: &Fixture, kind: &str, amount: Decimal) -> InitializeTransaction {
        InitializeTransaction {
            transaction_id: None,
            payer_id: f.payer,
            payee_id: f.payee,
            amount,
            transaction_type: kind.into(),
            payment_method_id: f.method.id,
            payment_details: card_details(),
        }
    }

    async fn balances(f: &Fixture) -> (Decimal, Decimal) {
        let payer = f.service.get_payer(f.payer).await.unwrap();
        let payee = f.service.get_payee(f.payee).await.unwrap();
        (payer.balance.amount(), payee.balance.amount())
    }

    async fn actions(f: &Fixture, id: TransactionId) -> Vec<String> {
        f.repo
            .list_audit_entries(id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    async fn stored(f: &Fixture) -> Vec<Transaction> {
        f.service.list_transactions(f.payer).await.unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Debit & Credit
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_debit_moves_funds() {
        let f = fixture(dec!(100)).await;

        let tx = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(40)))
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.transaction_type, TransactionType::Debit);
        assert!(tx.reserved_amount.is_zero());
        assert_eq!(balances(&f).await, (dec!(60), dec!(40)));
        assert_eq!(actions(&f, tx.id).await, vec!["Transaction Created"]);
    }

    #[tokio::test]
    async fn test_transaction_type_is_case_insensitive() {
        let f = fixture(dec!(100)).await;

        let tx = f
            .service
            .initialize_transaction(command(&f, "DeBiT", dec!(1)))
            .await
            .unwrap();

        assert_eq!(tx.transaction_type, TransactionType::Debit);
    }

    #[tokio::test]
    async fn test_debit_insufficient_funds_fails_row() {
        let f = fixture(dec!(10)).await;

        let err = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(50)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::State {
                reason: "insufficient_funds",
                ..
            }
        ));
        assert_eq!(balances(&f).await, (dec!(10), dec!(0)));

        let rows = stored(&f).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TransactionStatus::Failed);
        assert!(rows[0].reserved_amount.is_zero());

        let trail = f.repo.list_audit_entries(rows[0].id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, "Transaction Process Failed");
        assert!(trail[0].details.starts_with("insufficient_funds"));
    }

    #[tokio::test]
    async fn test_credit_leaves_payer_untouched() {
        let f = fixture(dec!(0)).await;

        let tx = f
            .service
            .initialize_transaction(command(&f, "credit", dec!(25)))
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(balances(&f).await, (dec!(0), dec!(25)));
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected_before_storage() {
        let f = fixture(dec!(100)).await;

        for amount in [dec!(0), dec!(-5)] {
            let result = f
                .service
                .initialize_transaction(command(&f, "debit", amount))
                .await;
            assert!(matches!(result, Err(AppError::Validation { .. })));
        }

        assert!(stored(&f).await.is_empty());
        assert_eq!(balances(&f).await, (dec!(100), dec!(0)));
    }

    #[tokio::test]
    async fn test_unknown_transaction_type() {
        let f = fixture(dec!(100)).await;

        let result = f
            .service
            .initialize_transaction(command(&f, "transfer", dec!(5)))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Validation {
                reason: "invalid_payload",
                ..
            })
        ));
        assert!(stored(&f).await.is_empty());
    }

    #[tokio::test]
    async fn test_self_payment_rejected() {
        let repo = Arc::new(MockRepo::new());
        let service = service(&repo);
        let both = register(&service, "Alice", true, true).await;
        let method = service
            .create_payment_method(both, card_request())
            .await
            .unwrap();

        let result = service
            .initialize_transaction(InitializeTransaction {
                transaction_id: None,
                payer_id: both,
                payee_id: both,
                amount: dec!(1),
                transaction_type: "debit".into(),
                payment_method_id: method.id,
                payment_details: card_details(),
            })
            .await;

        assert!(matches!(
            result,
            Err(AppError::Validation {
                reason: "self_payment",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_payee() {
        let f = fixture(dec!(100)).await;
        let mut cmd = command(&f, "debit", dec!(5));
        cmd.payee_id = AccountId::new();

        let result = f.service.initialize_transaction(cmd).await;

        assert!(matches!(
            result,
            Err(AppError::NotFound {
                reason: "payee_not_found",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_client_chosen_id_is_kept_and_reuse_conflicts() {
        let f = fixture(dec!(100)).await;
        let id = TransactionId::new();
        let mut cmd = command(&f, "debit", dec!(10));
        cmd.transaction_id = Some(id);

        let tx = f.service.initialize_transaction(cmd.clone()).await.unwrap();
        assert_eq!(tx.id, id);

        let err = f.service.initialize_transaction(cmd).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Conflict {
                reason: "duplicate_transaction",
                ..
            }
        ));
        assert_eq!(balances(&f).await, (dec!(90), dec!(10)));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payment method checks
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_mismatched_details_rejected_before_storage() {
        let f = fixture(dec!(100)).await;
        let mut cmd = command(&f, "debit", dec!(5));
        cmd.payment_details.card_number = Some("4000000000000002".into());

        let result = f.service.initialize_transaction(cmd).await;

        assert!(matches!(
            result,
            Err(AppError::State {
                reason: "method_mismatch",
                ..
            })
        ));
        assert!(stored(&f).await.is_empty());
        assert_eq!(balances(&f).await, (dec!(100), dec!(0)));
    }

    #[tokio::test]
    async fn test_cvv_is_not_compared() {
        let f = fixture(dec!(100)).await;
        let mut cmd = command(&f, "debit", dec!(5));
        cmd.payment_details.cvv = None;

        assert!(f.service.initialize_transaction(cmd).await.is_ok());
    }

    #[tokio::test]
    async fn test_foreign_method_is_not_valid() {
        let f = fixture(dec!(100)).await;
        let carol = register(&f.service, "Carol", true, false).await;
        let mut cmd = command(&f, "debit", dec!(5));
        cmd.payer_id = carol;

        let result = f.service.initialize_transaction(cmd).await;

        assert!(matches!(
            result,
            Err(AppError::NotFound {
                reason: "no_valid_payment_method",
                ..
            })
        ));
    }

    async fn deactivate(f: &Fixture) {
        f.service
            .update_payment_method(
                f.payer,
                f.method.id,
                UpdatePaymentMethodRequest {
                    status: Some(MethodStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_inactive_method_rejected_for_debit() {
        let f = fixture(dec!(100)).await;
        deactivate(&f).await;

        let result = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(5)))
            .await;

        assert!(matches!(
            result,
            Err(AppError::NotFound {
                reason: "no_valid_payment_method",
                ..
            })
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Refunds
    // ─────────────────────────────────────────────────────────────────────────────

    fn refund_of(f: &Fixture, original: TransactionId, amount: Decimal) -> InitializeTransaction {
        InitializeTransaction {
            transaction_id: Some(original),
            ..command(f, "refund", amount)
        }
    }

    #[tokio::test]
    async fn test_refund_reverses_original() {
        let f = fixture(dec!(100)).await;
        let original = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(40)))
            .await
            .unwrap();

        let refund = f
            .service
            .initialize_transaction(refund_of(&f, original.id, dec!(40)))
            .await
            .unwrap();

        assert_ne!(refund.id, original.id);
        assert_eq!(refund.status, TransactionStatus::Completed);
        assert_eq!(refund.original_transaction_id, Some(original.id));
        assert_eq!(balances(&f).await, (dec!(100), dec!(0)));

        let original = f.service.get_transaction(f.payer, original.id).await.unwrap();
        assert_eq!(original.status, TransactionStatus::Refunded);
        assert_eq!(
            actions(&f, original.id).await,
            vec!["Transaction Created", "Transaction Refunded"]
        );
    }

    #[tokio::test]
    async fn test_refund_amount_must_match() {
        let f = fixture(dec!(100)).await;
        let original = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(40)))
            .await
            .unwrap();

        let result = f
            .service
            .initialize_transaction(refund_of(&f, original.id, dec!(30)))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Conflict {
                reason: "refund_amount_mismatch",
                ..
            })
        ));
        assert_eq!(balances(&f).await, (dec!(60), dec!(40)));
    }

    #[tokio::test]
    async fn test_refund_twice_conflicts() {
        let f = fixture(dec!(100)).await;
        let original = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(40)))
            .await
            .unwrap();
        f.service
            .initialize_transaction(refund_of(&f, original.id, dec!(40)))
            .await
            .unwrap();

        let result = f
            .service
            .initialize_transaction(refund_of(&f, original.id, dec!(40)))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Conflict {
                reason: "already_refunded",
                ..
            })
        ));
        assert_eq!(balances(&f).await, (dec!(100), dec!(0)));
    }

    #[tokio::test]
    async fn test_refund_requires_original_id() {
        let f = fixture(dec!(100)).await;

        let result = f
            .service
            .initialize_transaction(command(&f, "refund", dec!(5)))
            .await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_refund_allowed_on_deactivated_method() {
        let f = fixture(dec!(100)).await;
        let original = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(40)))
            .await
            .unwrap();
        deactivate(&f).await;

        let refund = f
            .service
            .initialize_transaction(refund_of(&f, original.id, dec!(40)))
            .await
            .unwrap();

        assert_eq!(refund.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_refund_fails_when_payee_spent_funds() {
        let f = fixture(dec!(100)).await;
        let original = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(40)))
            .await
            .unwrap();
        f.service
            .set_balance(
                f.payee,
                SetBalanceRequest {
                    role: PartyRole::Payee,
                    balance: dec!(10),
                },
            )
            .await
            .unwrap();

        let result = f
            .service
            .initialize_transaction(refund_of(&f, original.id, dec!(40)))
            .await;

        assert!(matches!(
            result,
            Err(AppError::State {
                reason: "insufficient_refund_funds",
                ..
            })
        ));
        let original = f.service.get_transaction(f.payer, original.id).await.unwrap();
        assert_eq!(original.status, TransactionStatus::Completed);
        assert_eq!(balances(&f).await, (dec!(60), dec!(10)));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Failures & compensation
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_process_failure_releases_reservation() {
        let f = fixture(dec!(100)).await;
        // Commit 1 reserves, commit 2 processes.
        f.repo.fault_commit(2, CommitFault::Fail);

        let err = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(40)))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(balances(&f).await, (dec!(100), dec!(0)));

        let rows = stored(&f).await;
        assert_eq!(rows[0].status, TransactionStatus::Failed);
        assert!(rows[0].reserved_amount.is_zero());
        assert_eq!(
            actions(&f, rows[0].id).await,
            vec!["Reservation Rolled Back", "Transaction Process Failed"]
        );
    }

    #[tokio::test]
    async fn test_phase_timeout_is_storage_error_and_rolls_back() {
        let repo = Arc::new(MockRepo::new());
        let service = PaymentService::with_config(
            repo.clone(),
            repo.clone(),
            EngineConfig {
                phase_timeout: Duration::from_millis(50),
            },
        );
        let f = fixture_with(repo, service, dec!(100)).await;
        f.repo
            .fault_commit(2, CommitFault::Stall(Duration::from_millis(500)));

        let err = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(40)))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(balances(&f).await, (dec!(100), dec!(0)));
        assert_eq!(stored(&f).await[0].status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_rollback_releases_reserved_funds() {
        let f = fixture(dec!(100)).await;
        let amount = Money::new(dec!(30)).unwrap();
        let tx = Transaction::pending(
            TransactionId::new(),
            f.payer,
            f.payee,
            amount,
            TransactionType::Debit,
            f.method.id,
            None,
        )
        .unwrap();
        f.repo.insert_transaction(&tx).await.unwrap();

        let mut unit = f.repo.begin().await.unwrap();
        let mut payer = unit.payer_for_update(f.payer).await.unwrap().unwrap();
        let mut locked = unit.transaction_for_update(tx.id).await.unwrap().unwrap();
        payer.debit(amount).unwrap();
        locked.reserve().unwrap();
        unit.save_payer(&payer).await.unwrap();
        unit.save_transaction(&locked).await.unwrap();
        unit.commit().await.unwrap();
        drop(unit);
        assert_eq!(balances(&f).await, (dec!(70), dec!(0)));

        let rolled = f.service.rollback_reservation(tx.id).await.unwrap();

        assert_eq!(rolled.status, TransactionStatus::Failed);
        assert!(rolled.reserved_amount.is_zero());
        assert_eq!(balances(&f).await, (dec!(100), dec!(0)));
        assert_eq!(actions(&f, tx.id).await, vec!["Reservation Rolled Back"]);

        let again = f.service.rollback_reservation(tx.id).await.unwrap();
        assert_eq!(again.status, TransactionStatus::Failed);
        assert_eq!(balances(&f).await, (dec!(100), dec!(0)));
        assert_eq!(actions(&f, tx.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_leaves_completed_untouched() {
        let f = fixture(dec!(100)).await;
        let tx = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(40)))
            .await
            .unwrap();

        let after = f.service.rollback_reservation(tx.id).await.unwrap();

        assert_eq!(after.status, TransactionStatus::Completed);
        assert_eq!(balances(&f).await, (dec!(60), dec!(40)));
    }

    #[tokio::test]
    async fn test_rollback_unknown_transaction() {
        let f = fixture(dec!(100)).await;

        let result = f.service.rollback_reservation(TransactionId::new()).await;

        assert!(matches!(
            result,
            Err(AppError::NotFound {
                reason: "transaction_not_found",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_transaction() {
        let repo = Arc::new(MockRepo::new());
        let service = PaymentService::new(repo.clone(), Arc::new(FailingSink));
        let f = fixture_with(repo, service, dec!(100)).await;

        let tx = f
            .service
            .initialize_transaction(command(&f, "debit", dec!(40)))
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(f.repo.audit_entries().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_overdraw() {
        let f = Arc::new(fixture(dec!(100)).await);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let f = f.clone();
                tokio::spawn(async move {
                    f.service
                        .initialize_transaction(command(&f, "debit", dec!(30)))
                        .await
                })
            })
            .collect();

        let mut completed = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                completed += 1;
            }
        }

        assert_eq!(completed, 3);
        assert_eq!(balances(&f).await, (dec!(10), dec!(90)));
        let failed = stored(&f)
            .await
            .iter()
            .filter(|t| t.status == TransactionStatus::Failed)
            .count();
        assert_eq!(failed, 7);
    }
}
