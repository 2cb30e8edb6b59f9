//! Licmeter binary
//!
//! Runs one metering tick against the configured tenant. Schedule it once a
//! minute; the window snapshot carries state between runs.

use anyhow::Result;
use chrono::Local;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use licmeter_common::VERSION;
use licmeter_engine::{MeterConfig, MeteringEngine};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting licmeter v{}", VERSION);

    let config = MeterConfig::load()?;
    info!(
        tenant = %config.tenant_url,
        endpoint = %config.endpoint_name,
        cache = %config.cache_path().display(),
        "Loaded configuration"
    );

    let engine = MeteringEngine::from_config(config)?;
    let report = engine.run_tick(&Local::now()).await?;

    info!(
        tick_id = %report.tick_id,
        kind = report.plan.kind.as_str(),
        hosts = report.hosts_tracked,
        host_unit_lines = report.host_units.lines,
        dem_rum_lines = report.dem_rum.lines,
        dem_synthetic_lines = report.dem_synthetic.lines,
        ddu_lines = report.ddu.lines,
        "Tick complete"
    );
    if let Some(zones) = report.zones.as_ref().filter(|z| !z.is_clean()) {
        for (zone, err) in &zones.failed {
            warn!(zone = %zone, error = %err, "Management zone left without rule");
        }
    }

    Ok(())
}
