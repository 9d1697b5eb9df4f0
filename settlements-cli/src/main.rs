//! Settlements CLI
//!
//! Command-line interface for the Settlements API.

use anyhow::Result;
use clap::{Parser, Subcommand};

use settlements_client::SettlementsClient;
use settlements_types::ServicePaymentId;
use settlements_types::dto::{CreateServiceCheckoutRequest, CreateSubscriptionCheckoutRequest};

#[derive(Parser)]
#[command(name = "settlements")]
#[command(author, version, about = "Settlements API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Settlements API
    #[arg(
        long,
        env = "SETTLEMENTS_API_URL",
        default_value = "http://localhost:3000"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan catalog operations
    Plan {
        #[command(subcommand)]
        action: PlanCommands,
    },
    /// Checkout session creation
    Checkout {
        #[command(subcommand)]
        action: CheckoutCommands,
    },
    /// Completion operations (idempotent)
    Complete {
        #[command(subcommand)]
        action: CompleteCommands,
    },
    /// Verify a checkout session against the gateway
    Verify {
        /// Gateway checkout session id
        session_id: String,
    },
    /// Gateway-side status of a transaction
    Status {
        /// Configured gateway name (e.g. stripe)
        provider: String,
        /// Gateway transaction reference
        transaction_ref: String,
    },
    /// Refund operations
    Refund {
        #[command(subcommand)]
        action: RefundCommands,
    },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum PlanCommands {
    /// List plans for one side of the marketplace
    List {
        /// "owner" or "provider"
        #[arg(long, default_value = "owner")]
        user_type: String,
    },
    /// Get a plan by id
    Get {
        /// Plan id
        id: i64,
    },
    /// Upgrade a user's plan without a payment flow
    Upgrade {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        plan: i64,
    },
}

#[derive(Subcommand)]
enum CheckoutCommands {
    /// Open a checkout session for a subscription plan
    Subscription {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        plan: i64,
        #[arg(long, default_value = "http://localhost:5173/payments/success")]
        success_url: String,
        #[arg(long, default_value = "http://localhost:5173/payments/cancel")]
        cancel_url: String,
    },
    /// Open a checkout session paying for a completed work order
    Service {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        work_order: i64,
        #[arg(long)]
        success_url: Option<String>,
        #[arg(long)]
        cancel_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum CompleteCommands {
    /// Complete a subscription plan upgrade
    Upgrade {
        /// Gateway checkout session id
        session_id: String,
    },
    /// Complete an Owner → Provider service payment
    Service {
        /// Gateway checkout session id
        session_id: String,
    },
}

#[derive(Subcommand)]
enum RefundCommands {
    /// Refund a completed subscription payment
    Subscription {
        /// Gateway checkout session id
        session_id: String,
    },
    /// Refund a completed service payment
    Service {
        /// Service payment id (UUID)
        id: String,
    },
}

fn parse_service_payment_id(s: &str) -> Result<ServicePaymentId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid service payment ID: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let client = SettlementsClient::new(&cli.api_url);

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

        Commands::Plan { action } => match action {
            PlanCommands::List { user_type } => {
                let plans = client.list_plans(&user_type).await?;
                println!("{}", serde_json::to_string_pretty(&plans)?);
            }
            PlanCommands::Get { id } => {
                let plan = client.get_plan(id).await?;
                println!("{}", serde_json::to_string_pretty(&plan)?);
            }
            PlanCommands::Upgrade { user, plan } => {
                let upgraded = client.upgrade_plan(user, plan).await?;
                println!("{}", serde_json::to_string_pretty(&upgraded)?);
            }
        },

        Commands::Checkout { action } => match action {
            CheckoutCommands::Subscription {
                user,
                plan,
                success_url,
                cancel_url,
            } => {
                let req = CreateSubscriptionCheckoutRequest {
                    user_id: user,
                    plan_id: plan,
                    success_url,
                    cancel_url,
                };
                let session = client.create_subscription_checkout(&req).await?;
                println!("{}", serde_json::to_string_pretty(&session)?);
            }
            CheckoutCommands::Service {
                user,
                work_order,
                success_url,
                cancel_url,
            } => {
                let req = CreateServiceCheckoutRequest {
                    user_id: user,
                    work_order_id: work_order,
                    success_url,
                    cancel_url,
                };
                let session = client.create_service_checkout(&req).await?;
                println!("{}", serde_json::to_string_pretty(&session)?);
            }
        },

        Commands::Complete { action } => match action {
            CompleteCommands::Upgrade { session_id } => {
                let outcome = client.complete_upgrade(&session_id).await?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
            CompleteCommands::Service { session_id } => {
                let outcome = client.complete_service_payment(&session_id).await?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
        },

        Commands::Verify { session_id } => {
            let state = client.verify_session(&session_id).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }

        Commands::Status {
            provider,
            transaction_ref,
        } => {
            let status = client.payment_status(&provider, &transaction_ref).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::Refund { action } => match action {
            RefundCommands::Subscription { session_id } => {
                let outcome = client.refund_subscription(&session_id).await?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
            RefundCommands::Service { id } => {
                let id = parse_service_payment_id(&id)?;
                let outcome = client.refund_service_payment(id).await?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
        },
    }

    Ok(())
}
