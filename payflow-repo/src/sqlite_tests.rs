//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use payflow_types::{
        AccountId, AuditAction, AuditLogEntry, AuditSink, LedgerRepository, LedgerUnit, MethodDetails,
        MethodStatus, MethodType, Money, PaymentMethod, Payee, Payer, RepoError, Transaction,
        TransactionId, TransactionStatus, TransactionType,
    };
    use rust_decimal_macros::dec;

    use crate::SqliteRepo;

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    fn card() -> MethodDetails {
        MethodDetails::Card {
            card_number: "4111111111111111".into(),
            expiry_date: "12/27".into(),
        }
    }

    /// Payer with a card and a separate payee.
    async fn seed(repo: &SqliteRepo) -> (Payer, Payee, PaymentMethod) {
        let mut payer = Payer::new(AccountId::new(), "Alice".into(), "alice@example.com".into())
            .unwrap();
        payer.set_balance(Money::new(dec!(100)).unwrap());
        let payee =
            Payee::new(AccountId::new(), "Bob".into(), "bob@example.com".into()).unwrap();

        let mut unit = repo.begin().await.unwrap();
        unit.insert_payer(&payer).await.unwrap();
        unit.insert_payee(&payee).await.unwrap();
        unit.commit().await.unwrap();

        let method = PaymentMethod::new(payer.id, card());
        repo.insert_payment_method(&method).await.unwrap();

        (payer, payee, method)
    }

    fn pending(payer: &Payer, payee: &Payee, method: &PaymentMethod) -> Transaction {
        Transaction::pending(
            TransactionId::new(),
            payer.id,
            payee.id,
            Money::new(dec!(40)).unwrap(),
            TransactionType::Debit,
            method.id,
            None,
        )
        .unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Parties
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_and_get_payer() {
        let repo = setup_repo().await;
        let (payer, _, _) = seed(&repo).await;

        let fetched = repo.get_payer(payer.id).await.unwrap().unwrap();

        assert_eq!(fetched.id, payer.id);
        assert_eq!(fetched.name, "Alice");
        assert_eq!(fetched.balance.amount(), dec!(100));
    }

    #[tokio::test]
    async fn test_payer_and_payee_tables_are_separate() {
        let repo = setup_repo().await;
        let (payer, payee, _) = seed(&repo).await;

        assert!(repo.get_payee(payer.id).await.unwrap().is_none());
        assert!(repo.get_payer(payee.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_payer_conflicts() {
        let repo = setup_repo().await;
        let (payer, _, _) = seed(&repo).await;

        let mut unit = repo.begin().await.unwrap();
        let result = unit.insert_payer(&payer).await;

        assert!(matches!(result, Err(RepoError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_set_balance() {
        let repo = setup_repo().await;
        let (payer, payee, _) = seed(&repo).await;

        repo.set_payer_balance(payer.id, Money::new(dec!(12.34)).unwrap())
            .await
            .unwrap();
        repo.set_payee_balance(payee.id, Money::new(dec!(5)).unwrap())
            .await
            .unwrap();

        let payer = repo.get_payer(payer.id).await.unwrap().unwrap();
        let payee = repo.get_payee(payee.id).await.unwrap().unwrap();
        assert_eq!(payer.balance.amount(), dec!(12.34));
        assert_eq!(payee.balance.amount(), dec!(5));
    }

    #[tokio::test]
    async fn test_set_balance_missing_party() {
        let repo = setup_repo().await;

        let result = repo.set_payer_balance(AccountId::new(), Money::ZERO).await;

        assert!(matches!(result, Err(RepoError::NotFound)));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payment methods
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_payment_method_round_trip() {
        let repo = setup_repo().await;
        let (payer, _, method) = seed(&repo).await;

        let fetched = repo.get_payment_method(method.id).await.unwrap().unwrap();
        assert_eq!(fetched.details, card());
        assert_eq!(fetched.status, MethodStatus::Active);

        let found = repo
            .find_active_payment_method(payer.id, MethodType::Card, "4111111111111111")
            .await
            .unwrap();
        assert_eq!(found.map(|m| m.id), Some(method.id));

        let listed = repo.list_payment_methods(payer.id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_active_method_conflicts() {
        let repo = setup_repo().await;
        let (payer, _, _) = seed(&repo).await;

        let again = PaymentMethod::new(payer.id, card());
        let result = repo.insert_payment_method(&again).await;

        assert!(matches!(result, Err(RepoError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_inactive_method_frees_the_slot() {
        let repo = setup_repo().await;
        let (payer, _, mut method) = seed(&repo).await;

        method.status = MethodStatus::Inactive;
        repo.update_payment_method(&method).await.unwrap();

        assert!(
            repo.find_active_payment_method(payer.id, MethodType::Card, "4111111111111111")
                .await
                .unwrap()
                .is_none()
        );

        let replacement = PaymentMethod::new(payer.id, card());
        repo.insert_payment_method(&replacement).await.unwrap();
        assert_eq!(repo.list_payment_methods(payer.id).await.unwrap().len(), 2);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_transaction_round_trip() {
        let repo = setup_repo().await;
        let (payer, payee, method) = seed(&repo).await;
        let tx = pending(&payer, &payee, &method);

        repo.insert_transaction(&tx).await.unwrap();
        let fetched = repo.get_transaction(tx.id).await.unwrap().unwrap();

        assert_eq!(fetched.status, TransactionStatus::Pending);
        assert_eq!(fetched.amount.amount(), dec!(40));
        assert_eq!(fetched.transaction_type, TransactionType::Debit);
        assert_eq!(fetched.payment_method_id, method.id);
    }

    #[tokio::test]
    async fn test_reused_transaction_id_conflicts() {
        let repo = setup_repo().await;
        let (payer, payee, method) = seed(&repo).await;
        let tx = pending(&payer, &payee, &method);

        repo.insert_transaction(&tx).await.unwrap();
        let result = repo.insert_transaction(&tx).await;

        assert!(matches!(result, Err(RepoError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_transactions_for_both_sides() {
        let repo = setup_repo().await;
        let (payer, payee, method) = seed(&repo).await;
        let first = pending(&payer, &payee, &method);
        let second = pending(&payer, &payee, &method);
        repo.insert_transaction(&first).await.unwrap();
        repo.insert_transaction(&second).await.unwrap();

        let as_payer = repo.list_transactions_for_party(payer.id).await.unwrap();
        let as_payee = repo.list_transactions_for_party(payee.id).await.unwrap();

        assert_eq!(as_payer.len(), 2);
        assert_eq!(as_payee.len(), 2);
        // newest first
        assert_eq!(as_payer[0].id, second.id);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Audit
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_audit_entries_in_order() {
        let repo = setup_repo().await;
        let tx_id = TransactionId::new();

        repo.append(&AuditLogEntry::new(tx_id, AuditAction::TransactionCreated, "first"))
            .await
            .unwrap();
        repo.append(&AuditLogEntry::new(tx_id, AuditAction::TransactionRefunded, "second"))
            .await
            .unwrap();

        let entries = repo.list_audit_entries(tx_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "Transaction Created");
        assert_eq!(entries[1].details, "second");
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Units
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_unit_commit_applies_all_writes() {
        let repo = setup_repo().await;
        let (payer, payee, method) = seed(&repo).await;
        let tx = pending(&payer, &payee, &method);
        repo.insert_transaction(&tx).await.unwrap();

        let mut unit = repo.begin().await.unwrap();
        let mut locked_payer = unit.payer_for_update(payer.id).await.unwrap().unwrap();
        let mut locked_tx = unit.transaction_for_update(tx.id).await.unwrap().unwrap();
        locked_payer.debit(locked_tx.amount).unwrap();
        locked_tx.reserve().unwrap();
        unit.save_payer(&locked_payer).await.unwrap();
        unit.save_transaction(&locked_tx).await.unwrap();
        unit.commit().await.unwrap();
        drop(unit);

        let payer = repo.get_payer(payer.id).await.unwrap().unwrap();
        let tx = repo.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(payer.balance.amount(), dec!(60));
        assert_eq!(tx.status, TransactionStatus::Reserved);
        assert_eq!(tx.reserved_amount.amount(), dec!(40));
    }

    #[tokio::test]
    async fn test_dropped_unit_discards_inserted_parties() {
        let repo = setup_repo().await;
        let id = AccountId::new();

        {
            let mut unit = repo.begin().await.unwrap();
            let payer = Payer::new(id, "Carol".into(), "carol@example.com".into()).unwrap();
            let payee = Payee::new(id, "Carol".into(), "carol@example.com".into()).unwrap();
            unit.insert_payer(&payer).await.unwrap();
            unit.insert_payee(&payee).await.unwrap();
        }

        assert!(repo.get_payer(id).await.unwrap().is_none());
        assert!(repo.get_payee(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unit_saves_profile_fields() {
        let repo = setup_repo().await;
        let (payer, _, _) = seed(&repo).await;

        let mut unit = repo.begin().await.unwrap();
        let mut locked = unit.payer_for_update(payer.id).await.unwrap().unwrap();
        locked
            .update_profile(Some("Alicia".into()), Some("alicia@example.com".into()))
            .unwrap();
        unit.save_payer(&locked).await.unwrap();
        unit.commit().await.unwrap();
        drop(unit);

        let fetched = repo.get_payer(payer.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Alicia");
        assert_eq!(fetched.email, "alicia@example.com");
        assert_eq!(fetched.balance.amount(), dec!(100));
    }

    #[tokio::test]
    async fn test_dropped_unit_rolls_back() {
        let repo = setup_repo().await;
        let (_, payee, _) = seed(&repo).await;

        {
            let mut unit = repo.begin().await.unwrap();
            let mut locked = unit.payee_for_update(payee.id).await.unwrap().unwrap();
            locked.credit(Money::new(dec!(999)).unwrap()).unwrap();
            unit.save_payee(&locked).await.unwrap();
        }

        let payee = repo.get_payee(payee.id).await.unwrap().unwrap();
        assert!(payee.balance.is_zero());
    }

    #[tokio::test]
    async fn test_unit_is_spent_after_commit() {
        let repo = setup_repo().await;
        let (payer, _, _) = seed(&repo).await;

        let mut unit = repo.begin().await.unwrap();
        unit.commit().await.unwrap();

        assert!(matches!(
            unit.payer_for_update(payer.id).await,
            Err(RepoError::Transaction(_))
        ));
        assert!(matches!(unit.commit().await, Err(RepoError::Transaction(_))));
    }

    #[tokio::test]
    async fn test_unit_lookup_of_missing_rows() {
        let repo = setup_repo().await;

        let mut unit = repo.begin().await.unwrap();
        assert!(unit.payer_for_update(AccountId::new()).await.unwrap().is_none());
        assert!(
            unit.transaction_for_update(TransactionId::new())
                .await
                .unwrap()
                .is_none()
        );
    }
}
