use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use vetcare_core::{
    config::Config,
    db,
    gateway::postgres::PgGateway,
    lifecycle::AppointmentService,
    models::DATE_FORMAT,
    validator::{AppointmentValidator, SystemClock, ValidationRules},
};

/// Prints the agenda (active and completed visits) for a day as JSON.
/// Usage: vetcare-core [DD-MM-YYYY]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let validator = AppointmentValidator::new(ValidationRules::standard());
    let date = match std::env::args().nth(1) {
        Some(raw) => validator.parse_date(&raw)?,
        None => Utc::now().date_naive(),
    };

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg).await?;
    let gateway = PgGateway::new(pool, cfg.query_timeout);
    let service = AppointmentService::new(Arc::new(gateway), validator, Arc::new(SystemClock));

    let agenda = service.get_by_status_and_date(date).await?;
    tracing::info!(date = %date.format(DATE_FORMAT), count = agenda.len(), "agenda loaded");
    println!("{}", serde_json::to_string_pretty(&agenda)?);
    Ok(())
}
