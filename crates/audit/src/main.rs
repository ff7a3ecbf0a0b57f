use anyhow::{anyhow, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cflows_audit::config::{AuditConfig, LogFormat};
use cflows_audit::report::{AuditSummary, CarReport, OrganizationReport};
use cflows_db::repositories::{OrganizationRepo, StationWorkflowRepo};
use cflows_db::DbConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AuditConfig::from_env().map_err(|e| anyhow!(e))?;

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cflows_audit=info,cflows_db=info".into());
    match config.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    // --- Database ---
    let db_config = DbConfig::from_env().context("Invalid database configuration")?;
    let pool = cflows_db::create_pool(&db_config)
        .await
        .context("Failed to connect to database")?;
    cflows_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    cflows_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Organizations ---
    let organizations = match &config.organization {
        Some(slug) => vec![OrganizationRepo::find_by_slug(&pool, slug)
            .await
            .context("Failed to load organization")?
            .ok_or_else(|| anyhow!("No organization with slug '{slug}'"))?],
        None => OrganizationRepo::list(&pool, config.include_inactive)
            .await
            .context("Failed to list organizations")?,
    };

    // --- Audit ---
    let mut summary = AuditSummary::default();
    for organization in &organizations {
        let audits = StationWorkflowRepo::audit_organization(&pool, organization.id)
            .await
            .with_context(|| format!("Failed to audit organization '{}'", organization.slug))?;

        for audit in &audits {
            for violation in &audit.violations {
                tracing::warn!(
                    organization = %organization.slug,
                    car_id = audit.car_id,
                    car = %audit.label,
                    %violation,
                    "Station state mismatch"
                );
            }
        }

        let report = OrganizationReport {
            organization_id: organization.id,
            slug: organization.slug.clone(),
            cars: audits
                .into_iter()
                .map(|a| CarReport {
                    car_id: a.car_id,
                    label: a.label,
                    violations: a.violations,
                })
                .collect(),
        };
        tracing::info!(
            organization = %report.slug,
            mismatched_cars = report.cars.len(),
            "Organization audited"
        );
        summary.add(&report);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
    );

    pool.close().await;

    if !summary.is_clean() {
        tracing::warn!(
            violations = summary.violations,
            mismatched_cars = summary.mismatched_cars,
            "Audit found station state mismatches"
        );
        std::process::exit(1);
    }
    tracing::info!(organizations = summary.organizations, "Audit clean");
    Ok(())
}
