//! SETO Coffee CLI - Database migrations, catalog seeding and payment tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! seto-cli migrate
//!
//! # Upsert the product catalog
//! seto-cli seed products
//!
//! # Inspect, cancel or refund a PayPay payment
//! seto-cli payment status order_3f1c9a2e-5b7d-4e8f-9a6b-2c4d8e0f1a3b
//! seto-cli payment cancel order_3f1c9a2e-5b7d-4e8f-9a6b-2c4d8e0f1a3b
//! seto-cli payment refund 04123456789012345678 --amount 1200 --reason "破損"
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed products` - Upsert the coffee catalog
//! - `payment` - Payment provider operations (status, cancel, refund)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "seto-cli")]
#[command(author, version, about = "SETO Coffee CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Payment provider operations
    Payment {
        #[command(subcommand)]
        action: PaymentAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert the coffee product catalog
    Products,
}

#[derive(Subcommand)]
enum PaymentAction {
    /// Show the provider's view of a payment
    Status {
        /// Merchant payment id
        merchant_payment_id: String,
    },
    /// Cancel a payment
    Cancel {
        /// Merchant payment id
        merchant_payment_id: String,
    },
    /// Refund a completed payment
    Refund {
        /// PayPay payment id (not the merchant payment id)
        payment_id: String,

        /// Amount to refund in yen
        #[arg(short, long)]
        amount: u64,

        /// Reason shown to the customer
        #[arg(short, long)]
        reason: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products => commands::seed::products().await?,
        },
        Commands::Payment { action } => match action {
            PaymentAction::Status {
                merchant_payment_id,
            } => commands::payment::status(&merchant_payment_id).await?,
            PaymentAction::Cancel {
                merchant_payment_id,
            } => commands::payment::cancel(&merchant_payment_id).await?,
            PaymentAction::Refund {
                payment_id,
                amount,
                reason,
            } => commands::payment::refund(&payment_id, amount, &reason).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_refund() {
        let cli = Cli::try_parse_from([
            "seto-cli", "payment", "refund", "04123", "--amount", "1200", "--reason", "破損",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Payment {
                action: PaymentAction::Refund { amount: 1200, .. }
            })
        ));
    }

    #[test]
    fn test_refund_requires_amount() {
        assert!(Cli::try_parse_from(["seto-cli", "payment", "refund", "04123"]).is_err());
    }
}
