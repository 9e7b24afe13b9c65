//! Balance-bearing ledger parties (payers and payees).

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::AccountId;
use super::money::Money;
use crate::error::DomainError;

/// Lifecycle status of a payer or payee row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Inactive,
    Suspended,
}

impl PartyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyStatus::Active => "active",
            PartyStatus::Inactive => "inactive",
            PartyStatus::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for PartyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PartyStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PartyStatus::Active),
            "inactive" => Ok(PartyStatus::Inactive),
            "suspended" => Ok(PartyStatus::Suspended),
            other => Err(DomainError::Validation(format!(
                "unknown party status: {other}"
            ))),
        }
    }
}

/// Which side of the ledger a party row sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Payer,
    Payee,
}

/// Marker for payer rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayerSide {}

/// Marker for payee rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayeeSide {}

/// A balance-holding party. Use the [`Payer`] and [`Payee`] aliases; the
/// marker keeps the two tables from being mixed up at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Party<Side> {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub balance: Money,
    pub status: PartyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    side: PhantomData<Side>,
}

/// Account balance-holder who sends funds in a Debit transaction.
pub type Payer = Party<PayerSide>;

/// Account balance-holder who receives funds.
pub type Payee = Party<PayeeSide>;

impl<Side> Party<Side> {
    /// Creates an active party with zero balance.
    ///
    /// # Validation
    /// - Name and email cannot be empty
    pub fn new(id: AccountId, name: String, email: String) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::Validation("name cannot be empty".into()));
        }
        if email.trim().is_empty() {
            return Err(DomainError::Validation("email cannot be empty".into()));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            name,
            email,
            balance: Money::ZERO,
            status: PartyStatus::Active,
            created_at: now,
            updated_at: now,
            side: PhantomData,
        })
    }

    /// Reconstructs a party from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: AccountId,
        name: String,
        email: String,
        balance: Money,
        status: PartyStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            balance,
            status,
            created_at,
            updated_at,
            side: PhantomData,
        }
    }

    /// Replaces name and/or email. Same rules as [`Party::new`]; on error
    /// nothing changes.
    pub fn update_profile(
        &mut self,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<(), DomainError> {
        if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::Validation("name cannot be empty".into()));
        }
        if email.as_deref().is_some_and(|e| e.trim().is_empty()) {
            return Err(DomainError::Validation("email cannot be empty".into()));
        }

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(email) = email {
            self.email = email;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Credits (adds) money to the balance.
    pub fn credit(&mut self, amount: Money) -> Result<(), DomainError> {
        self.balance = self.balance.checked_add(amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Debits (subtracts) money from the balance.
    pub fn debit(&mut self, amount: Money) -> Result<(), DomainError> {
        self.balance = self.balance.checked_sub(amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn has_sufficient_funds(&self, amount: &Money) -> bool {
        self.balance >= *amount
    }

    /// Overwrites the balance (administrative seeding).
    pub fn set_balance(&mut self, balance: Money) {
        self.balance = balance;
        self.updated_at = Utc::now();
    }
}
