//! CLI entrypoint: plans one request against a reservation snapshot.

use std::io::Read;
use std::path::PathBuf;
use std::{fs, process};

use anyhow::{Context, Result};
use bus_planner::haversine::HaversineTable;
use bus_planner::osrm::{OsrmClient, OsrmConfig};
use bus_planner::pool::InMemorySource;
use bus_planner::{DistanceProvider, ErrorResponse, PlanRequest, Planner, PlannerConfig};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bus-plan", about = "Assign tour reservations to buses")]
struct Arguments {
    /// Reservation snapshot (JSON with busSizes and tours)
    #[arg(short, long, value_name = "path")]
    snapshot: PathBuf,
    /// Planning request (JSON); read from stdin when omitted
    #[arg(short, long, value_name = "path")]
    request: Option<PathBuf>,
    /// OSRM base URL; falls back to OSRM_URL, then great-circle distances
    #[arg(long, value_name = "url")]
    osrm_url: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,bus_planner=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Arguments::parse()) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(error) => {
            eprintln!("bus-plan: {error:#}");
            process::exit(2);
        }
    }
}

/// Prints the plan or the error payload. `Ok(false)` when planning failed.
fn run(arguments: Arguments) -> Result<bool> {
    let config = PlannerConfig::from_env().context("loading planner configuration")?;

    let snapshot = fs::read_to_string(&arguments.snapshot)
        .with_context(|| format!("reading snapshot {}", arguments.snapshot.display()))?;
    let source = InMemorySource::from_json(&snapshot).context("parsing snapshot")?;

    let body = match &arguments.request {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading request {}", path.display()))?,
        None => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body).context("reading request from stdin")?;
            body
        }
    };

    let provider = distance_provider(arguments.osrm_url, &config)?;
    info!(provider = provider.name(), "distance provider ready");
    let planner = Planner::new(source, provider, config);

    let outcome = PlanRequest::from_json(&body).and_then(|request| planner.plan(&request, &CancellationToken::new()));
    match outcome {
        Ok(plan) => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(true)
        }
        Err(err) => {
            tracing::error!(error = %err, category = err.category(), "planning failed");
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&err))?);
            Ok(false)
        }
    }
}

fn distance_provider(osrm_url: Option<String>, config: &PlannerConfig) -> Result<Box<dyn DistanceProvider>> {
    let osrm = match osrm_url {
        Some(base_url) => Some(OsrmConfig {
            base_url,
            ..OsrmConfig::default()
        }),
        None => OsrmConfig::from_env(),
    };

    Ok(match osrm {
        Some(osrm) => {
            let osrm = osrm.within_budget(config.provider_timeout);
            Box::new(OsrmClient::new(osrm).context("building OSRM client")?)
        }
        None => Box::new(HaversineTable::default()),
    })
}
