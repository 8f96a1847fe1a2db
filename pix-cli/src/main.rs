//! PIX CLI
//!
//! Command-line interface for the PIX checkout proxy.

mod checkout;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use pix_client::PixClient;
use pix_hex::{CheckoutConfig, CheckoutSession};
use pix_types::{Amount, CustomerForm, Field, ValidationMode, validation};

#[derive(Parser)]
#[command(name = "pix")]
#[command(author, version, about = "PIX checkout proxy CLI client", long_about = None)]
struct Cli {
    /// Base URL of the PIX checkout proxy
    #[arg(long, env = "PIX_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "PIX_API_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Validate one payer field
    Validate {
        field: FieldArg,
        value: String,
        /// strict or lenient
        #[arg(long, env = "PIX_VALIDATION", default_value = "strict")]
        mode: ValidationMode,
    },
    /// Apply the display mask to a CPF or phone number
    Mask { kind: MaskKind, value: String },
    /// Create a PIX charge and wait for payment
    Checkout {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// CPF, masked or digits only
        #[arg(long)]
        tax_id: String,
        #[arg(long)]
        phone: String,
        /// Amount in reais, e.g. 42.50
        #[arg(long)]
        amount: String,
        /// Seconds between status checks
        #[arg(long, default_value_t = 5)]
        poll_secs: u64,
        /// strict or lenient
        #[arg(long, env = "PIX_VALIDATION", default_value = "strict")]
        mode: ValidationMode,
    },
    /// Transaction operations
    Transaction {
        #[command(subcommand)]
        action: TransactionCommands,
    },
}

#[derive(Subcommand)]
enum TransactionCommands {
    /// Get the status of a transaction
    Get { id: String },
    /// Cancel (refund) a transaction
    Cancel { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum FieldArg {
    FullName,
    Email,
    TaxId,
    Phone,
}

impl From<FieldArg> for Field {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::FullName => Field::FullName,
            FieldArg::Email => Field::Email,
            FieldArg::TaxId => Field::TaxId,
            FieldArg::Phone => Field::Phone,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MaskKind {
    TaxId,
    Phone,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let client = PixClient::new(&cli.api_url).with_timeout(Duration::from_secs(cli.timeout_secs));

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            if health.status != "healthy" {
                std::process::exit(1);
            }
        }

        Commands::Validate { field, value, mode } => {
            let result = validation::validate_with(mode, field.into(), &value);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.valid {
                std::process::exit(1);
            }
        }

        Commands::Mask { kind, value } => {
            let masked = match kind {
                MaskKind::TaxId => validation::format_tax_id(&value),
                MaskKind::Phone => validation::format_phone(&value),
            };
            println!("{}", masked);
        }

        Commands::Checkout {
            name,
            email,
            tax_id,
            phone,
            amount,
            poll_secs,
            mode,
        } => {
            let amount = Amount::parse_reais(&amount)?;
            let config = CheckoutConfig::new(amount).with_validation(mode);
            let session = CheckoutSession::new(client, config);
            let form = CustomerForm {
                full_name: name,
                email,
                tax_id,
                phone,
            };
            checkout::run(&session, &form, Duration::from_secs(poll_secs.max(1))).await?;
        }

        Commands::Transaction { action } => match action {
            TransactionCommands::Get { id } => {
                let status = client.get_transaction(&id).await?;
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            TransactionCommands::Cancel { id } => {
                let cancelled = client.cancel_transaction(&id).await?;
                println!("{}", serde_json::to_string_pretty(&cancelled)?);
            }
        },
    }

    Ok(())
}
