//! Stored payment instruments and the details a caller presents with a transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{AccountId, PaymentMethodId};
use crate::error::DomainError;

/// Kind of payment instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MethodType {
    Card,
    BankTransfer,
    Upi,
    Wallet,
    Cheque,
}

impl MethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodType::Card => "card",
            MethodType::BankTransfer => "bank_transfer",
            MethodType::Upi => "upi",
            MethodType::Wallet => "wallet",
            MethodType::Cheque => "cheque",
        }
    }
}

impl std::fmt::Display for MethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MethodType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(MethodType::Card),
            "bank_transfer" => Ok(MethodType::BankTransfer),
            "upi" => Ok(MethodType::Upi),
            "wallet" => Ok(MethodType::Wallet),
            "cheque" => Ok(MethodType::Cheque),
            _ => Err(DomainError::Validation("invalid payment method type".into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MethodStatus {
    Active,
    Inactive,
}

impl MethodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodStatus::Active => "active",
            MethodStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for MethodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MethodStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MethodStatus::Active),
            "inactive" => Ok(MethodStatus::Inactive),
            other => Err(DomainError::Validation(format!(
                "unknown payment method status: {other}"
            ))),
        }
    }
}

/// Type-specific fields of a payment method. Each variant carries only what
/// identifies that kind of instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method_type", rename_all = "snake_case")]
pub enum MethodDetails {
    Card {
        card_number: String,
        expiry_date: String,
    },
    BankTransfer {
        account_number: String,
    },
    Upi {
        upi_id: String,
    },
    Wallet {
        wallet_id: String,
    },
    Cheque {
        cheque_number: String,
    },
}

/// Loose field bag as it arrives from callers and storage; turned into
/// [`MethodDetails`] by [`MethodDetails::from_fields`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodFields {
    pub card_number: Option<String>,
    pub expiry_date: Option<String>,
    pub account_number: Option<String>,
    pub details: Option<String>,
}

impl MethodDetails {
    /// Builds and validates details for `method_type` from a loose field bag.
    ///
    /// Fields that don't belong to the type are ignored here; callers that
    /// need to reject them check before calling.
    pub fn from_fields(method_type: MethodType, fields: MethodFields) -> Result<Self, DomainError> {
        let details = match method_type {
            MethodType::Card => MethodDetails::Card {
                card_number: fields.card_number.unwrap_or_default(),
                expiry_date: fields.expiry_date.unwrap_or_default(),
            },
            MethodType::BankTransfer => MethodDetails::BankTransfer {
                account_number: fields.account_number.unwrap_or_default(),
            },
            MethodType::Upi => MethodDetails::Upi {
                upi_id: fields.details.unwrap_or_default(),
            },
            MethodType::Wallet => MethodDetails::Wallet {
                wallet_id: fields.details.unwrap_or_default(),
            },
            MethodType::Cheque => MethodDetails::Cheque {
                cheque_number: fields.details.unwrap_or_default(),
            },
        };
        details.validate()?;
        Ok(details)
    }

    /// Flattens back into the loose field bag (storage layout).
    pub fn to_fields(&self) -> MethodFields {
        match self {
            MethodDetails::Card {
                card_number,
                expiry_date,
            } => MethodFields {
                card_number: Some(card_number.clone()),
                expiry_date: Some(expiry_date.clone()),
                ..MethodFields::default()
            },
            MethodDetails::BankTransfer { account_number } => MethodFields {
                account_number: Some(account_number.clone()),
                ..MethodFields::default()
            },
            MethodDetails::Upi { upi_id: token }
            | MethodDetails::Wallet { wallet_id: token }
            | MethodDetails::Cheque {
                cheque_number: token,
            } => MethodFields {
                details: Some(token.clone()),
                ..MethodFields::default()
            },
        }
    }

    pub fn method_type(&self) -> MethodType {
        match self {
            MethodDetails::Card { .. } => MethodType::Card,
            MethodDetails::BankTransfer { .. } => MethodType::BankTransfer,
            MethodDetails::Upi { .. } => MethodType::Upi,
            MethodDetails::Wallet { .. } => MethodType::Wallet,
            MethodDetails::Cheque { .. } => MethodType::Cheque,
        }
    }

    /// The identifying field used for duplicate detection.
    pub fn fingerprint(&self) -> &str {
        match self {
            MethodDetails::Card { card_number, .. } => card_number,
            MethodDetails::BankTransfer { account_number } => account_number,
            MethodDetails::Upi { upi_id } => upi_id,
            MethodDetails::Wallet { wallet_id } => wallet_id,
            MethodDetails::Cheque { cheque_number } => cheque_number,
        }
    }

    /// Format rules per instrument type.
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            MethodDetails::Card {
                card_number,
                expiry_date,
            } => {
                if card_number.len() != 16 || !is_numeric(card_number) {
                    return invalid("invalid card number, must be 16 digits");
                }
                if !is_expiry_date(expiry_date) {
                    return invalid("invalid expiry date, format should be MM/YY");
                }
            }
            MethodDetails::BankTransfer { account_number } => {
                if !(11..=16).contains(&account_number.chars().count()) {
                    return invalid("invalid account number");
                }
            }
            MethodDetails::Upi { upi_id } => {
                if upi_id.is_empty() {
                    return invalid("UPI ID is required");
                }
                if !is_upi_id(upi_id) {
                    return invalid("invalid UPI ID format, must be in the format example@upi");
                }
            }
            MethodDetails::Wallet { wallet_id } => {
                if wallet_id.is_empty() {
                    return invalid("wallet details are required");
                }
                if wallet_id.chars().count() < 5 {
                    return invalid("wallet ID must be at least 5 characters long");
                }
            }
            MethodDetails::Cheque { cheque_number } => {
                if cheque_number.is_empty() {
                    return invalid("cheque number is required");
                }
                if !is_numeric(cheque_number) {
                    return invalid("cheque number must be numeric");
                }
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Result<(), DomainError> {
    Err(DomainError::Validation(message.to_string()))
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `MM/YY` with month 01-12.
fn is_expiry_date(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 5 || b[2] != b'/' {
        return false;
    }
    if !b[..2].iter().chain(&b[3..]).all(u8::is_ascii_digit) {
        return false;
    }
    let month = (b[0] - b'0') * 10 + (b[1] - b'0');
    (1..=12).contains(&month)
}

/// `local@handle`, both halves from `[A-Za-z0-9_.-]`.
fn is_upi_id(s: &str) -> bool {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
    match s.split_once('@') {
        Some((local, handle)) => {
            !local.is_empty()
                && !handle.is_empty()
                && local.chars().all(allowed)
                && handle.chars().all(allowed)
        }
        None => false,
    }
}

/// Details presented by the caller alongside a transaction.
///
/// The CVV is accepted for wire compatibility but is never stored or compared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "4111111111111111")]
    pub card_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "12/27")]
    pub expiry_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cheque: Option<String>,
}

/// A stored, validated payment instrument owned by a payer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub payer_id: AccountId,
    #[serde(flatten)]
    pub details: MethodDetails,
    pub status: MethodStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    /// Creates an active method. `details` must already be validated.
    pub fn new(payer_id: AccountId, details: MethodDetails) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentMethodId::new(),
            payer_id,
            details,
            status: MethodStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a method from stored fields.
    pub fn from_parts(
        id: PaymentMethodId,
        payer_id: AccountId,
        details: MethodDetails,
        status: MethodStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payer_id,
            details,
            status,
            created_at,
            updated_at,
        }
    }

    pub fn method_type(&self) -> MethodType {
        self.details.method_type()
    }

    pub fn is_active(&self) -> bool {
        self.status == MethodStatus::Active
    }

    /// Fails with `InactiveMethod` unless the method is active.
    pub fn ensure_active(&self) -> Result<(), DomainError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DomainError::InactiveMethod)
        }
    }

    /// Compares the stored identifying fields with what the caller supplied.
    ///
    /// Exact byte comparison; a missing supplied field never matches.
    pub fn match_details(&self, supplied: &PaymentDetails) -> Result<(), DomainError> {
        fn same(stored: &str, supplied: &Option<String>) -> bool {
            supplied.as_deref() == Some(stored)
        }

        match &self.details {
            MethodDetails::Card {
                card_number,
                expiry_date,
            } => {
                if !same(card_number, &supplied.card_number) {
                    return Err(DomainError::MethodMismatch("card number"));
                }
                if !same(expiry_date, &supplied.expiry_date) {
                    return Err(DomainError::MethodMismatch("expiry date"));
                }
            }
            MethodDetails::BankTransfer { account_number } => {
                if !same(account_number, &supplied.account_number) {
                    return Err(DomainError::MethodMismatch("account number"));
                }
            }
            MethodDetails::Upi { upi_id } => {
                if !same(upi_id, &supplied.upi_id) {
                    return Err(DomainError::MethodMismatch("UPI ID"));
                }
            }
            MethodDetails::Wallet { wallet_id } => {
                if !same(wallet_id, &supplied.wallet) {
                    return Err(DomainError::MethodMismatch("wallet"));
                }
            }
            MethodDetails::Cheque { cheque_number } => {
                if !same(cheque_number, &supplied.cheque) {
                    return Err(DomainError::MethodMismatch("cheque number"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str, expiry: &str) -> Result<MethodDetails, DomainError> {
        MethodDetails::from_fields(
            MethodType::Card,
            MethodFields {
                card_number: Some(number.into()),
                expiry_date: Some(expiry.into()),
                ..MethodFields::default()
            },
        )
    }

    fn token(method_type: MethodType, details: &str) -> Result<MethodDetails, DomainError> {
        MethodDetails::from_fields(
            method_type,
            MethodFields {
                details: Some(details.into()),
                ..MethodFields::default()
            },
        )
    }

    fn message(result: Result<MethodDetails, DomainError>) -> String {
        match result {
            Err(DomainError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_card() {
        assert!(card("4111111111111111", "12/27").is_ok());
    }

    #[test]
    fn test_fifteen_digit_card_rejected() {
        assert_eq!(
            message(card("411111111111111", "12/27")),
            "invalid card number, must be 16 digits"
        );
    }

    #[test]
    fn test_non_numeric_card_rejected() {
        assert_eq!(
            message(card("4111-1111-1111-1", "12/27")),
            "invalid card number, must be 16 digits"
        );
    }

    #[test]
    fn test_expiry_format() {
        for bad in ["13/27", "00/27", "1/27", "12-27", "12/2027", "ab/cd"] {
            assert_eq!(
                message(card("4111111111111111", bad)),
                "invalid expiry date, format should be MM/YY",
                "{bad} should be rejected"
            );
        }
        assert!(card("4111111111111111", "01/00").is_ok());
    }

    #[test]
    fn test_account_number_length() {
        let bank = |n: &str| {
            MethodDetails::from_fields(
                MethodType::BankTransfer,
                MethodFields {
                    account_number: Some(n.into()),
                    ..MethodFields::default()
                },
            )
        };
        assert_eq!(message(bank("1234567890")), "invalid account number");
        assert!(bank("12345678901").is_ok());
        assert!(bank("1234567890123456").is_ok());
        assert_eq!(message(bank("12345678901234567")), "invalid account number");
    }

    #[test]
    fn test_upi_rules() {
        assert_eq!(message(token(MethodType::Upi, "")), "UPI ID is required");
        assert_eq!(
            message(token(MethodType::Upi, "alice.upi")),
            "invalid UPI ID format, must be in the format example@upi"
        );
        assert_eq!(
            message(token(MethodType::Upi, "ali ce@upi")),
            "invalid UPI ID format, must be in the format example@upi"
        );
        assert!(token(MethodType::Upi, "alice_01@ok-bank").is_ok());
    }

    #[test]
    fn test_wallet_rules() {
        assert_eq!(
            message(token(MethodType::Wallet, "")),
            "wallet details are required"
        );
        assert_eq!(
            message(token(MethodType::Wallet, "abcd")),
            "wallet ID must be at least 5 characters long"
        );
        assert!(token(MethodType::Wallet, "abcde").is_ok());
    }

    #[test]
    fn test_cheque_rules() {
        assert_eq!(
            message(token(MethodType::Cheque, "")),
            "cheque number is required"
        );
        assert_eq!(
            message(token(MethodType::Cheque, "12a4")),
            "cheque number must be numeric"
        );
        assert!(token(MethodType::Cheque, "000123").is_ok());
    }

    #[test]
    fn test_unknown_method_type() {
        let result = "crypto".parse::<MethodType>();
        assert!(matches!(result, Err(DomainError::Validation(msg)) if msg == "invalid payment method type"));
    }

    #[test]
    fn test_match_details_card() {
        let method = PaymentMethod::new(AccountId::new(), card("4111111111111111", "12/27").unwrap());
        let mut supplied = PaymentDetails {
            card_number: Some("4111111111111111".into()),
            expiry_date: Some("12/27".into()),
            cvv: Some("123".into()),
            ..PaymentDetails::default()
        };
        assert!(method.match_details(&supplied).is_ok());

        supplied.card_number = Some("4111111111111112".into());
        assert_eq!(
            method.match_details(&supplied),
            Err(DomainError::MethodMismatch("card number"))
        );

        supplied.card_number = Some("4111111111111111".into());
        supplied.expiry_date = Some("11/27".into());
        assert_eq!(
            method.match_details(&supplied),
            Err(DomainError::MethodMismatch("expiry date"))
        );
    }

    #[test]
    fn test_match_details_missing_field_never_matches() {
        let method = PaymentMethod::new(AccountId::new(), token(MethodType::Wallet, "wallet-01").unwrap());
        assert_eq!(
            method.match_details(&PaymentDetails::default()),
            Err(DomainError::MethodMismatch("wallet"))
        );
    }

    #[test]
    fn test_fields_round_trip_through_storage_layout() {
        let details = token(MethodType::Upi, "bob@upi").unwrap();
        let back = MethodDetails::from_fields(MethodType::Upi, details.to_fields()).unwrap();
        assert_eq!(details, back);
        assert_eq!(back.fingerprint(), "bob@upi");
    }

    #[test]
    fn test_serialized_method_carries_type_tag() {
        let method = PaymentMethod::new(AccountId::new(), card("4111111111111111", "12/27").unwrap());
        let json = serde_json::to_value(&method).unwrap();
        assert_eq!(json["method_type"], "card");
        assert_eq!(json["status"], "active");
        assert_eq!(json["card_number"], "4111111111111111");
    }
}
