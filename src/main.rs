//! Vehicle History Ledger CLI
//!
//! Management CLI for a role-gated, append-only vehicle history ledger.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────┐
//!                    │               VEHICLE LEDGER CLI              │
//!                    │                                               │
//!   Mutating intent  │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!   ─────────────────┼─▶│ intent  │──▶│custodian │──▶│  signer   │  │
//!                    │  │validate │   │ (key)    │   │fresh nonce│  │
//!                    │  └─────────┘   └──────────┘   └─────┬─────┘  │
//!                    │                                     │        │
//!                    │                                     ▼        │
//!                    │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │     Backend
//!   History view     │  │ history │◀──│  remote  │◀──│  client   │◀─┼───  (JSON-RPC,
//!   ◀────────────────┼──│ reader  │   │  view    │   │ submit/   │  │     contract)
//!                    │  └─────────┘   └──────────┘   │ eth_call  │  │
//!                    │                               └───────────┘  │
//!                    │  ┌─────────────────────────────────────────┐ │
//!                    │  │ config · roles · deployment resolution  │ │
//!                    │  └─────────────────────────────────────────┘ │
//!                    └───────────────────────────────────────────────┘
//! ```
//!
//! Every mutation is followed by a read-through history refresh; the
//! CLI never trusts its own view of ledger state.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vehicle_ledger::chain::client::LedgerClient;
use vehicle_ledger::chain::custodian::{
    EnvKeyCustodian, KeyCustodian, PromptKeyCustodian, PRIVATE_KEY_ENV_VAR,
};
use vehicle_ledger::chain::signer::TxSigner;
use vehicle_ledger::chain::types::ConfirmationStatus;
use vehicle_ledger::config::loader::load_config;
use vehicle_ledger::config::schema::LedgerConfig;
use vehicle_ledger::pipeline::executor::{MutationPipeline, Outcome};
use vehicle_ledger::pipeline::intent::MutationIntent;
use vehicle_ledger::roles::directory::Role;

#[derive(Parser)]
#[command(name = "vehicle-ledger")]
#[command(about = "Append-only vehicle history ledger client", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "ledger.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a vehicle (Admin/DMV only)
    Register {
        vin: String,
        /// Initial owner address
        owner: String,
        #[arg(default_value = "")]
        payload: String,
    },
    /// Transfer ownership (current owner only)
    Transfer {
        vin: String,
        /// New owner address
        new_owner: String,
        #[arg(default_value = "")]
        payload: String,
    },
    /// Append a service record (Service role)
    Service {
        vin: String,
        #[arg(default_value = "")]
        payload: String,
    },
    /// Append an accident record (Insurer role)
    Accident {
        vin: String,
        #[arg(default_value = "")]
        payload: String,
    },
    /// Append an odometer snapshot (Service role)
    Odometer {
        vin: String,
        #[arg(default_value = "")]
        payload: String,
    },
    /// Print a VIN's full history
    History { vin: String },
    /// Grant a role to an address (Admin only, setup-time operation)
    GrantRole {
        address: String,
        /// One of: service, insurer
        role: Role,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vehicle_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        match load_config(&cli.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        tracing::warn!(path = %cli.config.display(), "Config file not found, using defaults");
        LedgerConfig::default()
    };

    match run(config, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: LedgerConfig, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let client = LedgerClient::new(config.backend.clone()).await?;
    client.verify_network().await?;

    if let Commands::History { vin } = &command {
        return print_history(&config, client, vin).await;
    }

    let intent = match command {
        Commands::Register {
            vin,
            owner,
            payload,
        } => MutationIntent::Register {
            vin,
            initial_owner: owner,
            payload,
        },
        Commands::Transfer {
            vin,
            new_owner,
            payload,
        } => MutationIntent::Transfer {
            vin,
            new_owner,
            payload,
        },
        Commands::Service { vin, payload } => MutationIntent::Service { vin, payload },
        Commands::Accident { vin, payload } => MutationIntent::Accident { vin, payload },
        Commands::Odometer { vin, payload } => MutationIntent::Odometer { vin, payload },
        Commands::GrantRole { address, role } => MutationIntent::GrantRole {
            account: address,
            role,
        },
        Commands::History { .. } => unreachable!("handled above"),
    };

    let vin = mutated_vin(&intent).map(str::to_string);
    let outcome = execute_intent(&config, client.clone(), &intent).await?;

    match outcome {
        Outcome::Cancelled => {
            // Not an error: the user declined to sign.
            println!("Cancelled; nothing was submitted.");
        }
        Outcome::Submitted {
            tx_hash,
            confirmation,
        } => {
            match confirmation {
                ConfirmationStatus::Confirmed { block_number } => {
                    println!("Confirmed in block {} ({})", block_number, tx_hash);
                }
                ConfirmationStatus::Failed(reason) => {
                    println!("Submission failed: {} ({})", reason, tx_hash);
                }
                status => {
                    println!(
                        "Submitted as {}; confirmation still {:?}. Re-run `history` to verify.",
                        tx_hash, status
                    );
                }
            }
            // Read-through refresh rather than trusting the receipt.
            if let Some(vin) = vin {
                print_history(&config, client, &vin).await?;
            }
        }
    }
    Ok(())
}

async fn execute_intent(
    config: &LedgerConfig,
    client: LedgerClient,
    intent: &MutationIntent,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let registry = config.deployment_registry()?;
    let roles = std::sync::Arc::new(config.role_directory()?);
    let signer = TxSigner::new(client.clone(), config.gas.clone());

    let custodian = custodian();
    let pipeline = MutationPipeline::connect(
        client,
        signer,
        &registry,
        roles,
        custodian,
        config.confirmation_timeout_secs,
    )
    .await?;

    Ok(pipeline.execute(intent).await?)
}

fn mutated_vin(intent: &MutationIntent) -> Option<&str> {
    match intent {
        MutationIntent::Register { vin, .. }
        | MutationIntent::Transfer { vin, .. }
        | MutationIntent::Service { vin, .. }
        | MutationIntent::Accident { vin, .. }
        | MutationIntent::Odometer { vin, .. } => Some(vin),
        MutationIntent::GrantRole { .. } => None,
    }
}

/// Prefer the environment variable; fall back to the one-shot prompt.
fn custodian() -> Box<dyn KeyCustodian> {
    if std::env::var(PRIVATE_KEY_ENV_VAR).is_ok() {
        Box::new(EnvKeyCustodian)
    } else {
        Box::new(PromptKeyCustodian)
    }
}

async fn print_history(
    config: &LedgerConfig,
    client: LedgerClient,
    vin: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    use vehicle_ledger::chain::view::RemoteLedger;
    use vehicle_ledger::history::reader::HistoryReader;

    let registry = config.deployment_registry()?;
    let network = client.network_id().await?;
    let target = registry.resolve(network.0)?;

    let reader = HistoryReader::new(RemoteLedger::new(client, target));
    let records = reader.reconstruct(vin).await?;

    if records.is_empty() {
        println!("No records for {} yet", vin);
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
