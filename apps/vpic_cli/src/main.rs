use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use catalog_core::{
    load_settings, CatalogSession, HttpCatalogClient, LoadOutcome, SearchOutcome, SessionEvent,
};
use clap::Parser;
use shared::domain::{MakeId, VehicleMake};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "vpic", about = "Narrow the NHTSA vehicle catalog by type, make and year")]
struct Args {
    /// Overrides the catalog base URL from catalog.toml / environment.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    list_types: bool,
    #[arg(long = "vehicle-type")]
    vehicle_type: Option<String>,
    /// Make id or name; repeat to search several makes at once.
    #[arg(long = "make", requires = "vehicle_type")]
    makes: Vec<String>,
    #[arg(long, requires = "vehicle_type")]
    year: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(base_url) = args.base_url.clone() {
        settings.base_url = base_url;
    }
    let client = HttpCatalogClient::new(&settings).context("failed to build catalog client")?;
    tracing::info!(base_url = %client.base_url(), "using vehicle catalog");

    let session = CatalogSession::with_event_capacity(Arc::new(client), settings.event_capacity);
    spawn_transition_logger(&session);

    expect_applied(session.bootstrap().await, "load vehicle types")?;

    let Some(vehicle_type) = args.vehicle_type.as_deref().filter(|_| !args.list_types) else {
        print!("{}", render::vehicle_types(&session.snapshot().await.vehicle_types));
        return Ok(());
    };

    expect_applied(
        session.select_type(vehicle_type).await,
        &format!("load makes for '{vehicle_type}'"),
    )?;
    let offered = session.snapshot().await.makes;
    if args.makes.is_empty() {
        print!("{}", render::makes(&offered));
        return Ok(());
    }

    let make_ids = resolve_makes(&args.makes, &offered)?;
    session
        .set_selected_makes(&make_ids)
        .await
        .context("invalid make selection")?;
    if let Some(year) = args.year {
        session.set_year_filter_enabled(true).await;
        session.set_year_value(year).await;
    }

    match session.search().await {
        SearchOutcome::Completed { .. } => {
            print!("{}", render::models(&session.snapshot().await.models));
            Ok(())
        }
        SearchOutcome::Failed(failure) => Err(anyhow!(render::failure(&failure))),
        other => bail!("search did not complete: {other:?}"),
    }
}

fn expect_applied(outcome: LoadOutcome, what: &str) -> Result<()> {
    match outcome {
        LoadOutcome::Applied => Ok(()),
        LoadOutcome::Failed(failure) => {
            Err(anyhow!(render::failure(&failure))).with_context(|| format!("failed to {what}"))
        }
        LoadOutcome::Stale => bail!("failed to {what}: superseded by a newer request"),
    }
}

/// Maps each `--make` argument to an offered make, by id first and then by name.
fn resolve_makes(requested: &[String], offered: &[VehicleMake]) -> Result<Vec<MakeId>> {
    requested
        .iter()
        .map(|raw| {
            let raw = raw.trim();
            let found = match raw.parse::<i64>() {
                Ok(id) => offered.iter().find(|make| make.make_id == MakeId(id)),
                Err(_) => offered
                    .iter()
                    .find(|make| make.make_name.trim().eq_ignore_ascii_case(raw)),
            };
            found
                .map(|make| make.make_id)
                .ok_or_else(|| anyhow!("make '{raw}' is not offered for the selected vehicle type"))
        })
        .collect()
}

fn spawn_transition_logger(session: &Arc<CatalogSession>) {
    let mut rx = session.subscribe_events();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::StateChanged(snapshot)) => tracing::debug!(
                    phase = ?snapshot.phase,
                    vehicle_type = %snapshot.selection.selected_type,
                    makes = snapshot.makes.len(),
                    selected = snapshot.selection.selected_make_ids.len(),
                    models = snapshot.models.len(),
                    "session transition"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "transition logger lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
