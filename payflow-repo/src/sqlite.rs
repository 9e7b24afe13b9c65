//! SQLite repository adapter.
//!
//! Ids, amounts and timestamps are stored as TEXT. Units take the database
//! write lock on their first read so two units never interleave.
#![allow(clippy::collapsible_if)]

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};

use payflow_types::{
    AccountId, AuditLogEntry, AuditSink, LedgerRepository, LedgerUnit, MethodType, Money,
    PaymentMethod, PaymentMethodId, Payee, Payer, RepoError, Transaction, TransactionId,
    domain::{Party, PayeeSide, PayerSide},
};

use crate::types::sqlite::{DbAuditLog, DbParty, DbPaymentMethod, DbTransaction};
use crate::types::ts;
use crate::write_error;

const MIGRATION: &str = include_str!("../migrations/0001_create_ledger_tables.sql");

// ─────────────────────────────────────────────────────────────────────────────
// Table SQL per party side
// ─────────────────────────────────────────────────────────────────────────────

trait SqliteSide: Send + 'static {
    const INSERT: &'static str;
    const SELECT: &'static str;
    const UPDATE: &'static str;
    const SET_BALANCE: &'static str;
    const TOUCH: &'static str;
}

macro_rules! party_table {
    ($side:ty, $table:literal) => {
        impl SqliteSide for $side {
            const INSERT: &'static str = concat!(
                "INSERT INTO ",
                $table,
                " (id, name, email, balance, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
            );
            const SELECT: &'static str = concat!(
                "SELECT id, name, email, balance, status, created_at, updated_at FROM ",
                $table,
                " WHERE id = ?"
            );
            const UPDATE: &'static str = concat!(
                "UPDATE ",
                $table,
                " SET name = ?, email = ?, balance = ?, status = ?, updated_at = ? WHERE id = ?"
            );
            const SET_BALANCE: &'static str = concat!(
                "UPDATE ",
                $table,
                " SET balance = ?, updated_at = ? WHERE id = ?"
            );
            const TOUCH: &'static str = concat!("UPDATE ", $table, " SET id = id WHERE id = ?");
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
// Executor-generic helpers (shared by the pool and by units)
// ─────────────────────────────────────────────────────────────────────────────

async fn insert_party<'e, S, E>(exec: E, party: &Party<S>) -> Result<(), RepoError>
where
    S: SqliteSide,
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(S::INSERT)
        .bind(party.id.to_string())
        .bind(&party.name)
        .bind(&party.email)
        .bind(party.balance.amount().to_string())
        .bind(party.status.as_str())
        .bind(ts(&party.created_at))
        .bind(ts(&party.updated_at))
        .execute(exec)
        .await
        .map_err(write_error)?;
    Ok(())
}

async fn fetch_party<'e, S, E>(exec: E, id: AccountId) -> Result<Option<Party<S>>, RepoError>
where
    S: SqliteSide,
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<DbParty> = sqlx::query_as(S::SELECT)
        .bind(id.to_string())
        .fetch_optional(exec)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

    row.map(DbParty::into_domain).transpose()
}

async fn update_party<'e, S, E>(exec: E, party: &Party<S>) -> Result<(), RepoError>
where
    S: SqliteSide,
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(S::UPDATE)
        .bind(&party.name)
        .bind(&party.email)
        .bind(party.balance.amount().to_string())
        .bind(party.status.as_str())
        .bind(ts(&party.updated_at))
        .bind(party.id.to_string())
        .execute(exec)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

async fn set_party_balance<S: SqliteSide>(
    pool: &SqlitePool,
    id: AccountId,
    balance: Money,
) -> Result<(), RepoError> {
    let result = sqlx::query(S::SET_BALANCE)
        .bind(balance.amount().to_string())
        .bind(ts(&chrono::Utc::now()))
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

async fn fetch_transaction<'e, E>(exec: E, id: TransactionId) -> Result<Option<Transaction>, RepoError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {TX_COLUMNS} FROM transactions WHERE id = ?");
    let row: Option<DbTransaction> = sqlx::query_as(&sql)
        .bind(id.to_string())
        .fetch_optional(exec)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

    row.map(DbTransaction::into_domain).transpose()
}

async fn update_transaction_row<'e, E>(exec: E, tx: &Transaction) -> Result<(), RepoError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"UPDATE transactions SET reserved_amount = ?, status = ?, updated_at = ? WHERE id = ?"#,
    )
    .bind(tx.reserved_amount.amount().to_string())
    .bind(tx.status.as_str())
    .bind(ts(&tx.updated_at))
    .bind(tx.id.to_string())
    .execute(exec)
    .await
    .map_err(|e| RepoError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    ///
    /// In-memory databases live on a single pooled connection that is never
    /// recycled, otherwise each connection would see its own empty database.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        if !in_memory {
            if let Some(path) = database_url.strip_prefix("sqlite://") {
                let path = path.split('?').next().unwrap_or(path);
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };

        let repo = Self { pool };
        repo.create_schema().await?;
        tracing::debug!(in_memory, "sqlite ledger ready");
        Ok(repo)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the ledger tables if they do not exist.
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerRepository for SqliteRepo {
    async fn get_payer(&self, id: AccountId) -> Result<Option<Payer>, RepoError> {
        fetch_party(&self.pool, id).await
    }

    async fn get_payee(&self, id: AccountId) -> Result<Option<Payee>, RepoError> {
        fetch_party(&self.pool, id).await
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
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(method.id.to_string())
        .bind(method.payer_id.to_string())
        .bind(method.method_type().as_str())
        .bind(fields.card_number)
        .bind(fields.expiry_date)
        .bind(fields.account_number)
        .bind(fields.details)
        .bind(method.details.fingerprint())
        .bind(method.status.as_str())
        .bind(ts(&method.created_at))
        .bind(ts(&method.updated_at))
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(())
    }

    async fn get_payment_method(
        &self,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, RepoError> {
        let sql = format!("SELECT {METHOD_COLUMNS} FROM payment_methods WHERE id = ?");
        let row: Option<DbPaymentMethod> = sqlx::query_as(&sql)
            .bind(id.to_string())
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
             WHERE payer_id = ? AND method_type = ? AND fingerprint = ? AND status = 'active'"
        );
        let row: Option<DbPaymentMethod> = sqlx::query_as(&sql)
            .bind(payer_id.to_string())
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
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE payer_id = ? ORDER BY created_at ASC"
        );
        let rows: Vec<DbPaymentMethod> = sqlx::query_as(&sql)
            .bind(payer_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbPaymentMethod::into_domain).collect()
    }

    async fn update_payment_method(&self, method: &PaymentMethod) -> Result<(), RepoError> {
        let fields = method.details.to_fields();
        let result = sqlx::query(
            r#"UPDATE payment_methods
               SET card_number = ?, expiry_date = ?, account_number = ?, details = ?,
                   fingerprint = ?, status = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(fields.card_number)
        .bind(fields.expiry_date)
        .bind(fields.account_number)
        .bind(fields.details)
        .bind(method.details.fingerprint())
        .bind(method.status.as_str())
        .bind(ts(&method.updated_at))
        .bind(method.id.to_string())
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
            "INSERT INTO transactions ({TX_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        sqlx::query(&sql)
            .bind(tx.id.to_string())
            .bind(tx.payer_id.to_string())
            .bind(tx.payee_id.to_string())
            .bind(tx.amount.amount().to_string())
            .bind(tx.reserved_amount.amount().to_string())
            .bind(tx.transaction_type.as_str())
            .bind(tx.status.as_str())
            .bind(tx.payment_method_id.to_string())
            .bind(tx.original_transaction_id.map(|id| id.to_string()))
            .bind(ts(&tx.created_at))
            .bind(ts(&tx.updated_at))
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        fetch_transaction(&self.pool, id).await
    }

    async fn list_transactions_for_party(
        &self,
        id: AccountId,
    ) -> Result<Vec<Transaction>, RepoError> {
        let sql = format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE payer_id = ? OR payee_id = ? \
             ORDER BY created_at DESC, rowid DESC"
        );
        let id_str = id.to_string();
        let rows: Vec<DbTransaction> = sqlx::query_as(&sql)
            .bind(&id_str)
            .bind(&id_str)
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
               WHERE transaction_id = ? ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(transaction_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbAuditLog::into_domain).collect()
    }

    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, RepoError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;
        Ok(Box::new(SqliteUnit { tx: Some(tx) }))
    }
}

#[async_trait]
impl AuditSink for SqliteRepo {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO audit_logs (id, transaction_id, action, details, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.transaction_id.to_string())
        .bind(&entry.action)
        .bind(&entry.details)
        .bind(ts(&entry.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Atomic unit
// ─────────────────────────────────────────────────────────────────────────────

/// A `BEGIN`..`COMMIT` block on one pooled connection.
///
/// Dropping the unit without committing rolls the transaction back.
pub struct SqliteUnit {
    tx: Option<sqlx::Transaction<'static, Sqlite>>,
}

impl SqliteUnit {
    fn conn(&mut self) -> Result<&mut SqliteConnection, RepoError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| RepoError::Transaction("unit already committed".into()))
    }

    /// A no-op write that upgrades the unit to the database write lock.
    async fn lock(&mut self, sql: &'static str, id: String) -> Result<(), RepoError> {
        sqlx::query(sql)
            .bind(id)
            .execute(self.conn()?)
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerUnit for SqliteUnit {
    async fn insert_payer(&mut self, payer: &Payer) -> Result<(), RepoError> {
        insert_party(self.conn()?, payer).await
    }

    async fn insert_payee(&mut self, payee: &Payee) -> Result<(), RepoError> {
        insert_party(self.conn()?, payee).await
    }

    async fn payer_for_update(&mut self, id: AccountId) -> Result<Option<Payer>, RepoError> {
        self.lock(PayerSide::TOUCH, id.to_string()).await?;
        fetch_party(self.conn()?, id).await
    }

    async fn payee_for_update(&mut self, id: AccountId) -> Result<Option<Payee>, RepoError> {
        self.lock(PayeeSide::TOUCH, id.to_string()).await?;
        fetch_party(self.conn()?, id).await
    }

    async fn transaction_for_update(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, RepoError> {
        self.lock("UPDATE transactions SET id = id WHERE id = ?", id.to_string())
            .await?;
        fetch_transaction(self.conn()?, id).await
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
