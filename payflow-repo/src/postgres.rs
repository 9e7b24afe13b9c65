//! PostgreSQL repository adapter.
//!
//! Units run at SERIALIZABLE isolation and lock the rows they read with
//! `SELECT ... FOR UPDATE`. Callers lock payers, then payees, then transactions.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Executor, PgConnection, PgPool, Postgres};

use payflow_types::{
    AccountId, AuditLogEntry, AuditSink, LedgerRepository, LedgerUnit, MethodType, Money,
    PaymentMethod, PaymentMethodId, Payee, Payer, RepoError, Transaction, TransactionId,
    domain::{Party, PayeeSide, PayerSide},
};

use crate::types::pg::{DbAuditLog, DbParty, DbPaymentMethod, DbTransaction};
use crate::write_error;

// ─────────────────────────────────────────────────────────────────────────────
// Table SQL per party side
// ─────────────────────────────────────────────────────────────────────────────

trait PgSide: Send + 'static {
    const INSERT: &'static str;
    const SELECT: &'static str;
    const SELECT_FOR_UPDATE: &'static str;
    const UPDATE: &'static str;
    const SET_BALANCE: &'static str;
}

macro_rules! party_table {
    ($side:ty, $table:literal) => {
        impl PgSide for $side {
            const INSERT: &'static str = concat!(
                "INSERT INTO ",
                $table,
                " (id, name, email, balance, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)"
            );
            const SELECT: &'static str = concat!(
                "SELECT id, name, email, balance, status, created_at, updated_at FROM ",
                $table,
                " WHERE id = $1"
            );
            const SELECT_FOR_UPDATE: &'static str = concat!(
                "SELECT id, name, email, balance, status, created_at, updated_at FROM ",
                $table,
                " WHERE id = $1 FOR UPDATE"
            );
            const UPDATE: &'static str = concat!(
                "UPDATE ",
                $table,
                " SET name = $1, email = $2, balance = $3, status = $4, updated_at = $5 WHERE id = $6"
            );
            const SET_BALANCE: &'static str = concat!(
                "UPDATE ",
                $table,
                " SET balance = $1, updated_at = $2 WHERE id = $3"
            );
        }
    };
}

party_table!(PayerSide, "payers");
party_table!(PayeeSide, "payees");

const TX_COLUMNS: &str = "id, payer_id, payee_id, amount, reserved_amount, transaction_type, status, \
     payment_method_id, original_transaction_id, created_at, updated_at";

const METHOD_COLUMNS: &str = "id, payer_id, method_type, card_number, expiry_date, account_number, \
     details, status, created_at, updated_at";

// ─────────────────────────────────────────────────────────────────────────────
// Executor-generic helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn fetch_party<'e, S, E>(
    exec: E,
    sql: &'static str,
    id: AccountId,
) -> Result<Option<Party<S>>, RepoError>
where
    S: PgSide,
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<DbParty> = sqlx::query_as(sql)
        .bind(id.into_uuid())
        .fetch_optional(exec)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

    row.map(DbParty::into_domain).transpose()
}

async fn update_party<'e, S, E>(exec: E, party: &Party<S>) -> Result<(), RepoError>
where
    S: PgSide,
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(S::UPDATE)
        .bind(&party.name)
        .bind(&party.email)
        .bind(party.balance.amount())
        .bind(party.status.as_str())
        .bind(party.updated_at)
        .bind(party.id.into_uuid())
        .execute(exec)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

async fn insert_party<'e, S, E>(exec: E, party: &Party<S>) -> Result<(), RepoError>
where
    S: PgSide,
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(S::INSERT)
        .bind(party.id.into_uuid())
        .bind(&party.name)
        .bind(&party.email)
        .bind(party.balance.amount())
        .bind(party.status.as_str())
        .bind(party.created_at)
        .bind(party.updated_at)
        .execute(exec)
        .await
        .map_err(write_error)?;
    Ok(())
}

async fn set_party_balance<S: PgSide>(
    pool: &PgPool,
    id: AccountId,
    balance: Money,
) -> Result<(), RepoError> {
    let result = sqlx::query(S::SET_BALANCE)
        .bind(balance.amount())
        .bind(Utc::now())
        .bind(id.into_uuid())
        .execute(pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

async fn fetch_transaction<'e, E>(
    exec: E,
    id: TransactionId,
    for_update: bool,
) -> Result<Option<Transaction>, RepoError>
where
    E: Executor<'e, Database = Postgres>,
{
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {TX_COLUMNS} FROM transactions WHERE id = $1{lock}");
    let row: Option<DbTransaction> = sqlx::query_as(&sql)
        .bind(id.into_uuid())
        .fetch_optional(exec)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

    row.map(DbTransaction::into_domain).transpose()
}

async fn update_transaction_row<'e, E>(exec: E, tx: &Transaction) -> Result<(), RepoError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"UPDATE transactions SET reserved_amount = $1, status = $2, updated_at = $3 WHERE id = $4"#,
    )
    .bind(tx.reserved_amount.amount())
    .bind(tx.status.as_str())
    .bind(tx.updated_at)
    .bind(tx.id.into_uuid())
    .execute(exec)
    .await
    .map_err(|e| RepoError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository with row-level locking.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        execute_migration(
            &pool,
            include_str!("../migrations/0001_create_ledger_tables_pg.sql"),
            "0001",
        )
        .await?;
        tracing::debug!("postgres ledger ready");
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerRepository for PostgresRepo {
    async fn get_payer(&self, id: AccountId) -> Result<Option<Payer>, RepoError> {
        fetch_party(&self.pool, PayerSide::SELECT, id).await
    }

    async fn get_payee(&self, id: AccountId) -> Result<Option<Payee>, RepoError> {
        fetch_party(&self.pool, PayeeSide::SELECT, id).await
    }

    async fn set_payer_balance(&self, id: AccountId, balance: Money) -> Result<(), RepoError> {
        set_party_balance::<PayerSide>(&self.pool, id, balance).await
    }

    async fn set_payee_balance(&self, id: AccountId, balance: Money) -> Result<(), RepoError> {
        set_party_balance::<PayeeSide>(&self.pool, id, balance).await
    }

    async fn insert_payment_method(&self, method: &PaymentMethod) -> Result<(), RepoError> {
        let fields = method.details.to_fields();
        sqlx::query(
            r#"INSERT INTO payment_methods
               (id, payer_id, method_type, card_number, expiry_date, account_number, details,
                fingerprint, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(method.id.into_uuid())
        .bind(method.payer_id.into_uuid())
        .bind(method.method_type().as_str())
        .bind(fields.card_number)
        .bind(fields.expiry_date)
        .bind(fields.account_number)
        .bind(fields.details)
        .bind(method.details.fingerprint())
        .bind(method.status.as_str())
        .bind(method.created_at)
        .bind(method.updated_at)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(())
    }

    async fn get_payment_method(
        &self,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, RepoError> {
        let sql = format!("SELECT {METHOD_COLUMNS} FROM payment_methods WHERE id = $1");
        let row: Option<DbPaymentMethod> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbPaymentMethod::into_domain).transpose()
    }

    async fn find_active_payment_method(
        &self,
        payer_id: AccountId,
        method_type: MethodType,
        fingerprint: &str,
    ) -> Result<Option<PaymentMethod>, RepoError> {
        let sql = format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods \
             WHERE payer_id = $1 AND method_type = $2 AND fingerprint = $3 AND status = 'active'"
        );
        let row: Option<DbPaymentMethod> = sqlx::query_as(&sql)
            .bind(payer_id.into_uuid())
            .bind(method_type.as_str())
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbPaymentMethod::into_domain).transpose()
    }

    async fn list_payment_methods(
        &self,
        payer_id: AccountId,
    ) -> Result<Vec<PaymentMethod>, RepoError> {
        let sql = format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE payer_id = $1 ORDER BY created_at ASC"
        );
        let rows: Vec<DbPaymentMethod> = sqlx::query_as(&sql)
            .bind(payer_id.into_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbPaymentMethod::into_domain).collect()
    }

    async fn update_payment_method(&self, method: &PaymentMethod) -> Result<(), RepoError> {
        let fields = method.details.to_fields();
        let result = sqlx::query(
            r#"UPDATE payment_methods
               SET card_number = $1, expiry_date = $2, account_number = $3, details = $4,
                   fingerprint = $5, status = $6, updated_at = $7
               WHERE id = $8"#,
        )
        .bind(fields.card_number)
        .bind(fields.expiry_date)
        .bind(fields.account_number)
        .bind(fields.details)
        .bind(method.details.fingerprint())
        .bind(method.status.as_str())
        .bind(method.updated_at)
        .bind(method.id.into_uuid())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn insert_transaction(&self, tx: &Transaction) -> Result<(), RepoError> {
        let sql = format!(
            "INSERT INTO transactions ({TX_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        sqlx::query(&sql)
            .bind(tx.id.into_uuid())
            .bind(tx.payer_id.into_uuid())
            .bind(tx.payee_id.into_uuid())
            .bind(tx.amount.amount())
            .bind(tx.reserved_amount.amount())
            .bind(tx.transaction_type.as_str())
            .bind(tx.status.as_str())
            .bind(tx.payment_method_id.into_uuid())
            .bind(tx.original_transaction_id.map(TransactionId::into_uuid))
            .bind(tx.created_at)
            .bind(tx.updated_at)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        fetch_transaction(&self.pool, id, false).await
    }

    async fn list_transactions_for_party(
        &self,
        id: AccountId,
    ) -> Result<Vec<Transaction>, RepoError> {
        let sql = format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE payer_id = $1 OR payee_id = $1 \
             ORDER BY created_at DESC"
        );
        let rows: Vec<DbTransaction> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbTransaction::into_domain).collect()
    }

    async fn list_audit_entries(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<AuditLogEntry>, RepoError> {
        let rows: Vec<DbAuditLog> = sqlx::query_as(
            r#"SELECT id, transaction_id, action, details, created_at FROM audit_logs
               WHERE transaction_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(transaction_id.into_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(DbAuditLog::into_domain).collect())
    }

    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(Box::new(PgUnit { tx: Some(tx) }))
    }
}

#[async_trait]
impl AuditSink for PostgresRepo {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO audit_logs (id, transaction_id, action, details, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(entry.id.into_uuid())
        .bind(entry.transaction_id.into_uuid())
        .bind(&entry.action)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Atomic unit
// ─────────────────────────────────────────────────────────────────────────────

/// A serializable database transaction. Dropped without commit, it rolls back.
pub struct PgUnit {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PgUnit {
    fn conn(&mut self) -> Result<&mut PgConnection, RepoError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| RepoError::Transaction("unit already committed".into()))
    }
}

#[async_trait]
impl LedgerUnit for PgUnit {
    async fn insert_payer(&mut self, payer: &Payer) -> Result<(), RepoError> {
        insert_party(self.conn()?, payer).await
    }

    async fn insert_payee(&mut self, payee: &Payee) -> Result<(), RepoError> {
        insert_party(self.conn()?, payee).await
    }

    async fn payer_for_update(&mut self, id: AccountId) -> Result<Option<Payer>, RepoError> {
        fetch_party(self.conn()?, PayerSide::SELECT_FOR_UPDATE, id).await
    }

    async fn payee_for_update(&mut self, id: AccountId) -> Result<Option<Payee>, RepoError> {
        fetch_party(self.conn()?, PayeeSide::SELECT_FOR_UPDATE, id).await
    }

    async fn transaction_for_update(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, RepoError> {
        fetch_transaction(self.conn()?, id, true).await
    }

    async fn save_payer(&mut self, payer: &Payer) -> Result<(), RepoError> {
        update_party(self.conn()?, payer).await
    }

    async fn save_payee(&mut self, payee: &Payee) -> Result<(), RepoError> {
        update_party(self.conn()?, payee).await
    }

    async fn save_transaction(&mut self, tx: &Transaction) -> Result<(), RepoError> {
        update_transaction_row(self.conn()?, tx).await
    }

    async fn commit(&mut self) -> Result<(), RepoError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| RepoError::Transaction("unit already committed".into()))?;
        tx.commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))
    }
}
