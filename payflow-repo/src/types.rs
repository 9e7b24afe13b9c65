//! Database row types and their conversion into domain values.
//!
//! SQLite stores ids, money and timestamps as TEXT; PostgreSQL uses native
//! UUID, NUMERIC and TIMESTAMPTZ columns. Each backend gets its own row module.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use payflow_types::{
    AccountId, AuditLogEntry, AuditLogId, MethodDetails, MethodFields, MethodStatus, MethodType,
    Money, PaymentMethod, PaymentMethodId, RepoError, Transaction, TransactionId,
    TransactionStatus, TransactionType,
    domain::{Party, PartyStatus},
};

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

fn corrupt(what: &str, err: impl std::fmt::Display) -> RepoError {
    RepoError::Database(format!("Corrupt {what} column: {err}"))
}

pub fn parse_enum<T: FromStr>(what: &str, s: &str) -> Result<T, RepoError>
where
    T::Err: std::fmt::Display,
{
    s.parse().map_err(|e| corrupt(what, e))
}

pub fn parse_money(amount: Decimal) -> Result<Money, RepoError> {
    Money::new(amount).map_err(|e| corrupt("money", e))
}

pub fn method_details(
    method_type: &str,
    card_number: Option<String>,
    expiry_date: Option<String>,
    account_number: Option<String>,
    details: Option<String>,
) -> Result<MethodDetails, RepoError> {
    let method_type: MethodType = parse_enum("method_type", method_type)?;
    MethodDetails::from_fields(
        method_type,
        MethodFields {
            card_number,
            expiry_date,
            account_number,
            details,
        },
    )
    .map_err(|e| corrupt("payment method", e))
}

#[cfg(feature = "sqlite")]
fn parse_uuid(s: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(s).map_err(|e| corrupt("uuid", e))
}

#[cfg(feature = "sqlite")]
fn parse_decimal(s: &str) -> Result<Decimal, RepoError> {
    Decimal::from_str(s).map_err(|e| corrupt("decimal", e))
}

#[cfg(feature = "sqlite")]
fn parse_ts(s: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt("timestamp", e))
}

/// Fixed-width RFC 3339 so TEXT columns sort chronologically.
#[cfg(feature = "sqlite")]
pub fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite rows
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
pub mod sqlite {
    use super::*;
    use sqlx::FromRow;

    /// Payer or payee row.
    #[derive(FromRow)]
    pub struct DbParty {
        pub id: String,
        pub name: String,
        pub email: String,
        pub balance: String,
        pub status: String,
        pub created_at: String,
        pub updated_at: String,
    }

    impl DbParty {
        pub fn into_domain<Side>(self) -> Result<Party<Side>, RepoError> {
            let status: PartyStatus = parse_enum("status", &self.status)?;
            Ok(Party::from_parts(
                AccountId::from_uuid(parse_uuid(&self.id)?),
                self.name,
                self.email,
                parse_money(parse_decimal(&self.balance)?)?,
                status,
                parse_ts(&self.created_at)?,
                parse_ts(&self.updated_at)?,
            ))
        }
    }

    #[derive(FromRow)]
    pub struct DbPaymentMethod {
        pub id: String,
        pub payer_id: String,
        pub method_type: String,
        pub card_number: Option<String>,
        pub expiry_date: Option<String>,
        pub account_number: Option<String>,
        pub details: Option<String>,
        pub status: String,
        pub created_at: String,
        pub updated_at: String,
    }

    impl DbPaymentMethod {
        pub fn into_domain(self) -> Result<PaymentMethod, RepoError> {
            let status: MethodStatus = parse_enum("status", &self.status)?;
            let details = method_details(
                &self.method_type,
                self.card_number,
                self.expiry_date,
                self.account_number,
                self.details,
            )?;
            Ok(PaymentMethod::from_parts(
                PaymentMethodId::from_uuid(parse_uuid(&self.id)?),
                AccountId::from_uuid(parse_uuid(&self.payer_id)?),
                details,
                status,
                parse_ts(&self.created_at)?,
                parse_ts(&self.updated_at)?,
            ))
        }
    }

    #[derive(FromRow)]
    pub struct DbTransaction {
        pub id: String,
        pub payer_id: String,
        pub payee_id: String,
        pub amount: String,
        pub reserved_amount: String,
        pub transaction_type: String,
        pub status: String,
        pub payment_method_id: String,
        pub original_transaction_id: Option<String>,
        pub created_at: String,
        pub updated_at: String,
    }

    impl DbTransaction {
        pub fn into_domain(self) -> Result<Transaction, RepoError> {
            let tx_type: TransactionType = parse_enum("transaction_type", &self.transaction_type)?;
            let status: TransactionStatus = parse_enum("status", &self.status)?;
            let original = self
                .original_transaction_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?
                .map(TransactionId::from_uuid);

            Ok(Transaction::from_parts(
                TransactionId::from_uuid(parse_uuid(&self.id)?),
                AccountId::from_uuid(parse_uuid(&self.payer_id)?),
                AccountId::from_uuid(parse_uuid(&self.payee_id)?),
                parse_money(parse_decimal(&self.amount)?)?,
                parse_money(parse_decimal(&self.reserved_amount)?)?,
                tx_type,
                status,
                PaymentMethodId::from_uuid(parse_uuid(&self.payment_method_id)?),
                original,
                parse_ts(&self.created_at)?,
                parse_ts(&self.updated_at)?,
            ))
        }
    }

    #[derive(FromRow)]
    pub struct DbAuditLog {
        pub id: String,
        pub transaction_id: String,
        pub action: String,
        pub details: String,
        pub created_at: String,
    }

    impl DbAuditLog {
        pub fn into_domain(self) -> Result<AuditLogEntry, RepoError> {
            Ok(AuditLogEntry {
                id: AuditLogId::from_uuid(parse_uuid(&self.id)?),
                transaction_id: TransactionId::from_uuid(parse_uuid(&self.transaction_id)?),
                action: self.action,
                details: self.details,
                created_at: parse_ts(&self.created_at)?,
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL rows
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "postgres")]
pub mod pg {
    use super::*;
    use sqlx::FromRow;

    /// Payer or payee row.
    #[derive(FromRow)]
    pub struct DbParty {
        pub id: Uuid,
        pub name: String,
        pub email: String,
        pub balance: Decimal,
        pub status: String,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl DbParty {
        pub fn into_domain<Side>(self) -> Result<Party<Side>, RepoError> {
            let status: PartyStatus = parse_enum("status", &self.status)?;
            Ok(Party::from_parts(
                AccountId::from_uuid(self.id),
                self.name,
                self.email,
                parse_money(self.balance)?,
                status,
                self.created_at,
                self.updated_at,
            ))
        }
    }

    #[derive(FromRow)]
    pub struct DbPaymentMethod {
        pub id: Uuid,
        pub payer_id: Uuid,
        pub method_type: String,
        pub card_number: Option<String>,
        pub expiry_date: Option<String>,
        pub account_number: Option<String>,
        pub details: Option<String>,
        pub status: String,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl DbPaymentMethod {
        pub fn into_domain(self) -> Result<PaymentMethod, RepoError> {
            let status: MethodStatus = parse_enum("status", &self.status)?;
            let details = method_details(
                &self.method_type,
                self.card_number,
                self.expiry_date,
                self.account_number,
                self.details,
            )?;
            Ok(PaymentMethod::from_parts(
                PaymentMethodId::from_uuid(self.id),
                AccountId::from_uuid(self.payer_id),
                details,
                status,
                self.created_at,
                self.updated_at,
            ))
        }
    }

    #[derive(FromRow)]
    pub struct DbTransaction {
        pub id: Uuid,
        pub payer_id: Uuid,
        pub payee_id: Uuid,
        pub amount: Decimal,
        pub reserved_amount: Decimal,
        pub transaction_type: String,
        pub status: String,
        pub payment_method_id: Uuid,
        pub original_transaction_id: Option<Uuid>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl DbTransaction {
        pub fn into_domain(self) -> Result<Transaction, RepoError> {
            let tx_type: TransactionType = parse_enum("transaction_type", &self.transaction_type)?;
            let status: TransactionStatus = parse_enum("status", &self.status)?;
            Ok(Transaction::from_parts(
                TransactionId::from_uuid(self.id),
                AccountId::from_uuid(self.payer_id),
                AccountId::from_uuid(self.payee_id),
                parse_money(self.amount)?,
                parse_money(self.reserved_amount)?,
                tx_type,
                status,
                PaymentMethodId::from_uuid(self.payment_method_id),
                self.original_transaction_id.map(TransactionId::from_uuid),
                self.created_at,
                self.updated_at,
            ))
        }
    }

    #[derive(FromRow)]
    pub struct DbAuditLog {
        pub id: Uuid,
        pub transaction_id: Uuid,
        pub action: String,
        pub details: String,
        pub created_at: DateTime<Utc>,
    }

    impl DbAuditLog {
        pub fn into_domain(self) -> AuditLogEntry {
            AuditLogEntry {
                id: AuditLogId::from_uuid(self.id),
                transaction_id: TransactionId::from_uuid(self.transaction_id),
                action: self.action,
                details: self.details,
                created_at: self.created_at,
            }
        }
    }
}
