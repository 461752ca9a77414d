mod aggregate;
mod auth;
mod config;
mod error;
mod estimate;
mod inventory;
mod models;
mod pricing;
mod report;
mod service;

use crate::config::{load_config, save_active_subscription, AppConfig};
use crate::error::AppError;
use crate::report::Palette;
use crate::service::CostService;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "autopilot")]
#[command(about = "Azure inventory and retail cost estimates")]
struct Cli {
    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    /// Name fragment that marks a VM as a virtual desktop host
    #[arg(long, global = true, value_name = "TEXT")]
    desktop_marker: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log in to Azure and list subscriptions
    Login,
    /// Show or set the active subscription
    Subscription {
        #[arg(long = "set", value_name = "SUBSCRIPTION_ID")]
        set: Option<String>,
    },
    /// List all resources in the active subscription
    Resources {
        /// Estimate VM and disk costs
        #[arg(long)]
        cost: bool,
        /// Write the costed listing to a CSV file
        #[arg(long, value_name = "PATH", requires = "cost")]
        csv: Option<PathBuf>,
    },
    /// Estimate monthly VM costs under usage and savings scenarios
    Vm,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves the active subscription, printing a hint when none is set.
fn active_subscription(cfg: &AppConfig) -> Option<String> {
    match cfg.subscription() {
        Ok(id) => Some(id.to_string()),
        Err(_) => {
            println!(
                "No active subscription set. Set one using the 'subscription --set' command."
            );
            None
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut cfg = load_config()?;
    if let Some(marker) = cli.desktop_marker {
        cfg.desktop_marker = marker;
    }
    let palette = Palette::detect(cli.no_color);

    match cli.command {
        Commands::Login => {
            auth::interactive_login(&cfg).await?;
            let svc = CostService::connect(&cfg).await?;
            let subs = svc.subscriptions().await?;
            print!(
                "{}",
                report::render_subscriptions(&subs, cfg.subscription().ok(), palette)
            );
        }
        Commands::Subscription { set: None } => match cfg.subscription() {
            Ok(id) => println!("Active subscription: {id}"),
            Err(_) => println!(
                "No active subscription set. Use the 'subscription --set' command to set one."
            ),
        },
        Commands::Subscription { set: Some(id) } => {
            let svc = CostService::connect(&cfg).await?;
            let Some(found) = svc.find_subscription(&id).await? else {
                return Err(AppError::UnknownSubscription(id));
            };
            save_active_subscription(&found.id)?;
            println!("Subscription set to {} ({})", found.id, found.display_name);
        }
        Commands::Resources { cost, csv } => {
            let Some(sub) = active_subscription(&cfg) else {
                return Ok(());
            };
            let mut svc = CostService::connect(&cfg).await?;
            if cost {
                let costs = svc.resource_costs(&sub).await?;
                print!("{}", report::render_resources(&sub, &costs.groups, palette));
                print!("{}", report::render_totals(&costs.report.totals, palette));
                if let Some(path) = csv {
                    let rows = report::write_csv(&path, &costs.groups)?;
                    println!("Exported {rows} rows to {}", path.display());
                }
            } else {
                let groups = svc.list_resources(&sub).await?;
                print!("{}", report::render_resources(&sub, &groups, palette));
            }
        }
        Commands::Vm => {
            let Some(sub) = active_subscription(&cfg) else {
                return Ok(());
            };
            let mut svc = CostService::connect(&cfg).await?;
            let vm_report = svc.vm_report(&sub).await?;
            print!("{}", report::render_vm_report(&vm_report, palette));
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
