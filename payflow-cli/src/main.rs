//! Payflow CLI
//!
//! Command-line interface for the Payflow API.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use payflow_client::PayflowClient;
use payflow_types::{
    AccountId, CreatePaymentMethodRequest, CreateTransactionRequest, MethodStatus, PartyRole,
    PaymentDetails, PaymentMethodId, TransactionId, UpdateAccountRequest,
    UpdatePaymentMethodRequest,
};

#[derive(Parser)]
#[command(name = "payflow")]
#[command(author, version, about = "Payflow API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Payflow API
    #[arg(long, env = "PAYFLOW_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Account id to act as (sent as x-user-id)
    #[arg(long, env = "PAYFLOW_USER_ID")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account operations
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },
    /// Payment method operations
    Method {
        #[command(subcommand)]
        action: MethodCommands,
    },
    /// Transaction operations
    Transaction {
        #[command(subcommand)]
        action: TransactionCommands,
    },
    /// Check API health
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Payer,
    Payee,
}

impl From<Role> for PartyRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Payer => PartyRole::Payer,
            Role::Payee => PartyRole::Payee,
        }
    }
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Register a new user
    Register {
        name: String,
        email: String,
        /// Register without a payer role
        #[arg(long)]
        no_payer: bool,
        /// Also register as payee
        #[arg(long)]
        payee: bool,
    },
    /// Show the current user's account
    Me,
    /// Change the current user's name and/or email
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Overwrite one of the current user's balances
    SetBalance {
        #[arg(long, value_enum)]
        role: Role,
        #[arg(long)]
        balance: Decimal,
    },
}

#[derive(Subcommand)]
enum MethodCommands {
    /// Register a payment method
    Create {
        /// card, bank_transfer, upi, wallet or cheque
        #[arg(long = "type")]
        method_type: String,
        #[arg(long)]
        card_number: Option<String>,
        #[arg(long)]
        expiry_date: Option<String>,
        #[arg(long)]
        account_number: Option<String>,
        /// UPI id, wallet id or cheque number
        #[arg(long)]
        details: Option<String>,
    },
    /// List the current user's payment methods
    List,
    /// Show one payment method
    Get { id: String },
    /// Activate or deactivate a payment method
    SetStatus {
        id: String,
        #[arg(long)]
        active: bool,
    },
    /// Check that a payment method exists and is active
    Validate { id: String },
}

#[derive(Subcommand)]
enum TransactionCommands {
    /// Debit, credit or refund with the current user as payer
    Create {
        #[arg(long)]
        payee: String,
        #[arg(long)]
        amount: Decimal,
        /// debit, credit or refund
        #[arg(long = "type", default_value = "debit")]
        transaction_type: String,
        #[arg(long)]
        method: String,
        /// Client-chosen id, or the original transaction for a refund
        #[arg(long)]
        transaction_id: Option<String>,
        #[arg(long)]
        card_number: Option<String>,
        #[arg(long)]
        expiry_date: Option<String>,
        #[arg(long)]
        cvv: Option<String>,
        #[arg(long)]
        account_number: Option<String>,
        #[arg(long)]
        upi_id: Option<String>,
        #[arg(long)]
        wallet: Option<String>,
        #[arg(long)]
        cheque: Option<String>,
    },
    /// List transactions of the current user
    List,
    /// Show one transaction
    Get { id: String },
    /// Show the audit trail of a transaction
    Audit { id: String },
}

fn parse_id<T: std::str::FromStr>(s: &str, what: &str) -> Result<T> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid {} ID: {}", what, s))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = PayflowClient::new(&cli.api_url);
    if let Some(user) = &cli.user {
        let user: AccountId = parse_id(user, "user")?;
        client = client.with_user(user);
    }

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Account { action } => match action {
            AccountCommands::Register {
                name,
                email,
                no_payer,
                payee,
            } => print_json(&client.register(&name, &email, !no_payer, payee).await?)?,
            AccountCommands::Me => print_json(&client.me().await?)?,
            AccountCommands::Update { name, email } => {
                let req = UpdateAccountRequest { name, email };
                print_json(&client.update_account(&req).await?)?
            }
            AccountCommands::SetBalance { role, balance } => {
                print_json(&client.set_balance(role.into(), balance).await?)?
            }
        },

        Commands::Method { action } => match action {
            MethodCommands::Create {
                method_type,
                card_number,
                expiry_date,
                account_number,
                details,
            } => {
                let req = CreatePaymentMethodRequest {
                    method_type,
                    card_number,
                    expiry_date,
                    account_number,
                    details,
                };
                print_json(&client.create_payment_method(&req).await?)?
            }
            MethodCommands::List => print_json(&client.list_payment_methods().await?)?,
            MethodCommands::Get { id } => {
                let id: PaymentMethodId = parse_id(&id, "payment method")?;
                print_json(&client.get_payment_method(id).await?)?
            }
            MethodCommands::SetStatus { id, active } => {
                let id: PaymentMethodId = parse_id(&id, "payment method")?;
                let req = UpdatePaymentMethodRequest {
                    status: Some(if active {
                        MethodStatus::Active
                    } else {
                        MethodStatus::Inactive
                    }),
                    ..Default::default()
                };
                print_json(&client.update_payment_method(id, &req).await?)?
            }
            MethodCommands::Validate { id } => {
                let id: PaymentMethodId = parse_id(&id, "payment method")?;
                print_json(&client.validate_payment_method(id).await?)?
            }
        },

        Commands::Transaction { action } => match action {
            TransactionCommands::Create {
                payee,
                amount,
                transaction_type,
                method,
                transaction_id,
                card_number,
                expiry_date,
                cvv,
                account_number,
                upi_id,
                wallet,
                cheque,
            } => {
                let req = CreateTransactionRequest {
                    transaction_id: transaction_id
                        .as_deref()
                        .map(|id| parse_id(id, "transaction"))
                        .transpose()?,
                    payer_id: None,
                    payee_id: parse_id(&payee, "payee")?,
                    status: None,
                    amount,
                    transaction_type,
                    payment_method_id: parse_id(&method, "payment method")?,
                    payment_details: PaymentDetails {
                        account_number,
                        card_number,
                        cvv,
                        expiry_date,
                        upi_id,
                        wallet,
                        cheque,
                    },
                };
                print_json(&client.create_transaction(&req).await?)?
            }
            TransactionCommands::List => print_json(&client.list_transactions().await?)?,
            TransactionCommands::Get { id } => {
                let id: TransactionId = parse_id(&id, "transaction")?;
                print_json(&client.get_transaction(id).await?)?
            }
            TransactionCommands::Audit { id } => {
                let id: TransactionId = parse_id(&id, "transaction")?;
                print_json(&client.audit_trail(id).await?)?
            }
        },
    }

    Ok(())
}
