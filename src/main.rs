use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use serde::Serialize;
use std::path::{Path, PathBuf};

use toon_client::models::toon::{Agreement, AgreementId, FlowChannel, StatusSnapshot};
use toon_client::{Config, ToonClient};

#[derive(Parser)]
#[command(name = "toon", version, about = "Query a Toon thermostat through the Toon API")]
struct Cli {
    /// Read settings from this file instead of `.env` in the working directory.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the devices bound to the account.
    Agreements,
    /// Show thermostat and usage status; all agreements when no id is given.
    Status { agreement_id: Option<String> },
    /// Gas consumption per hour/day/week/month/year.
    GasFlow(FlowArgs),
    /// Electricity consumption per hour/day/week/month/year.
    ElectricityFlow(FlowArgs),
}

#[derive(Args)]
struct FlowArgs {
    agreement_id: String,
    /// Start of the window (RFC 3339). Server default when omitted.
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    /// End of the window (RFC 3339). Server default when omitted.
    #[arg(long)]
    to: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct AgreementStatus<'a> {
    agreement: &'a Agreement,
    status: StatusSnapshot,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| format!("rendering output failed: {}", e))?;
    println!("{}", rendered);
    Ok(())
}

fn run(command: Command) -> Result<(), String> {
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (base_url={}, tenant={}, connect_timeout={}s, request_timeout={}s, status_max_attempts={}, status_poll_delay={}ms, refresh_grant={})",
        cfg.base_url,
        cfg.credentials.tenant_id,
        cfg.timeouts.connect.as_secs(),
        cfg.timeouts.request.as_secs(),
        cfg.status_poll.max_attempts.get(),
        cfg.status_poll.delay.as_millis(),
        cfg.refresh_grant
    );

    let client = ToonClient::from_config(&cfg);

    match command {
        Command::Agreements => {
            let agreements = client
                .list_agreements()
                .map_err(|e| format!("list_agreements failed: {}", e))?;
            print_json(&agreements)
        }
        Command::Status {
            agreement_id: Some(id),
        } => {
            let status = client
                .get_status(&AgreementId(id.clone()))
                .map_err(|e| format!("get_status({id}) failed: {}", e))?;
            print_json(&status)
        }
        Command::Status { agreement_id: None } => {
            let agreements = client
                .list_agreements()
                .map_err(|e| format!("list_agreements failed: {}", e))?;
            info!("Fetching status for {} agreement(s)", agreements.len());
            for agreement in &agreements {
                let status = client
                    .get_status(&agreement.agreement_id)
                    .map_err(|e| format!("get_status({}) failed: {}", agreement.agreement_id, e))?;
                print_json(&AgreementStatus { agreement, status })?;
            }
            Ok(())
        }
        Command::GasFlow(args) => print_flow(&client, FlowChannel::Gas, args),
        Command::ElectricityFlow(args) => print_flow(&client, FlowChannel::Electricity, args),
    }
}

fn print_flow(client: &ToonClient, channel: FlowChannel, args: FlowArgs) -> Result<(), String> {
    let id = AgreementId(args.agreement_id);
    let flow = client
        .get_flow(&id, channel, args.from, args.to)
        .map_err(|e| format!("get_flow({}, {}) failed: {}", id, channel.as_str(), e))?;
    print_json(&flow)
}

/// Load `.env`-style settings; variables already in the environment win.
fn load_env_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, String> {
    match explicit {
        Some(path) => dotenvy::from_path(path)
            .map(|_| Some(path.to_path_buf()))
            .map_err(|e| format!("failed to load {}: {}", path.display(), e)),
        None => match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(format!("failed to load .env: {}", e)),
        },
    }
}

fn main() {
    let cli = Cli::parse();

    let loaded_env = match load_env_file(cli.env_file.as_deref()) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(path) = loaded_env.as_ref() {
        let origin = if cli.env_file.is_some() { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, path.display());
    }

    info!(
        "toon {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli.command) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
