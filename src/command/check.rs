use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;

use campus_health::config::ConfigSnapshot;
use campus_health::health::{
    tcp_probes, HealthAggregator, HealthEndpoint, HealthReport, HealthStatus, HEALTH_PATH,
};
use campus_health::runtime::{Phase, RuntimeStateStore};
use campus_health::startup::StartupContext;

fn status_icon(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "✅",
        HealthStatus::Degraded => "⚠️ ",
        HealthStatus::Unhealthy => "❌",
    }
}

fn print_report(report: &HealthReport) {
    println!("Overall: {} {}", status_icon(report.overall), report.overall);
    for check in &report.checks {
        println!(
            "   {} {:<10} {}",
            status_icon(check.status),
            check.service,
            check.message
        );
    }
    println!(
        "   {} critical, {} warnings in {}ms",
        report.critical_failure_count, report.warning_count, report.total_duration_ms
    );
}

pub async fn run_check(json: bool, connect: bool) -> Result<()> {
    let store = RuntimeStateStore::new();
    let snapshot = ConfigSnapshot::from_env();
    let probes = if connect { tcp_probes(&snapshot) } else { Vec::new() };
    let aggregator = Arc::new(
        probes
            .into_iter()
            .fold(HealthAggregator::new(snapshot), |agg, (kind, probe)| {
                agg.with_probe(kind, probe)
            }),
    );
    let mut ctx = StartupContext::new(store.clone(), aggregator.clone());

    let boot = ctx.ensure_all().await;

    // What a client polling the health boundary would see right now.
    let response = HealthEndpoint::new(store.clone(), aggregator).handle().await;
    let state = store.get().context("Runtime state missing after boot")?;

    if json {
        let output = json!({
            "summary": store.get_summary(),
            "state": state,
            "health": {
                "path": HEALTH_PATH,
                "statusCode": response.status.as_u16(),
                "body": response.body,
            },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match &state.health_check_results {
            Some(report) => print_report(report),
            None => println!("No health report recorded."),
        }
        for warning in &state.warnings {
            println!("⚠️  {}", warning);
        }
        for error in &state.errors {
            println!("❌ {}", error);
        }
        println!("GET {} -> HTTP {}", HEALTH_PATH, response.status);
    }

    if let Err(e) = boot {
        anyhow::bail!("Startup checks failed: {}", e);
    }
    if state.phase == Phase::Failed {
        anyhow::bail!("Startup checks failed");
    }
    Ok(())
}
