//! Domain models for the payflow engine.

pub mod audit;
pub mod ids;
pub mod money;
pub mod party;
pub mod payment_method;
pub mod transaction;

pub use audit::{AuditAction, AuditLogEntry};
pub use ids::{AccountId, AuditLogId, PaymentMethodId, TransactionId};
pub use money::Money;
pub use party::{Party, PartyRole, PartyStatus, Payee, PayeeSide, Payer, PayerSide};
pub use payment_method::{
    MethodDetails, MethodFields, MethodStatus, MethodType, PaymentDetails, PaymentMethod,
};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
