//! avp-sync
//!
//! Validates local Verified Permissions inputs and converges a policy store
//! to them: schema, guardrails, caller policies, then canary checks.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod cli;
mod config;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use verified_permissions::domain::service::{ConvergeReport, validate_offline};
use verified_permissions::{AwsPolicyStoreClient, Converger, DomainError, load_sdk_config};

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

/// Exit status when local inputs (schema, policies, canary file) are rejected.
const INVALID_INPUT: u8 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref(), &cli.overrides())?;
    logging::init(&config.logging)?;

    let result = match cli.command {
        Command::Validate => validate(&config),
        Command::Apply { .. } => apply(&config).await,
        Command::Canary => canary(&config).await,
    };
    exit_status(result)
}

/// Input rejections exit with [`INVALID_INPUT`]; every other failure
/// propagates.
fn exit_status(result: anyhow::Result<()>) -> anyhow::Result<ExitCode> {
    let Err(err) = result else {
        return Ok(ExitCode::SUCCESS);
    };
    if err
        .downcast_ref::<DomainError>()
        .is_some_and(DomainError::is_validation)
    {
        eprintln!("Error: {err:#}");
        return Ok(ExitCode::from(INVALID_INPUT));
    }
    Err(err)
}

fn validate(config: &AppConfig) -> anyhow::Result<()> {
    let report = validate_offline(&config.verified_permissions).context("validation failed")?;
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    for violation in &report.action_violations {
        println!("warning: action '{violation}' is outside the canonical action groups");
    }
    for issue in &report.policy_issues {
        println!("warning: {issue}");
    }
    println!("{report}");
    Ok(())
}

async fn apply(config: &AppConfig) -> anyhow::Result<()> {
    let converger = build_converger(config).await?;
    let cancel = cancel_on_ctrl_c();
    let report = converger
        .converge(&cancel)
        .await
        .with_context(|| format!("failed to converge policy store {}", converger.policy_store_id()))?;
    print_converge_report(&report);
    Ok(())
}

async fn canary(config: &AppConfig) -> anyhow::Result<()> {
    let converger = build_converger(config).await?;
    let cancel = cancel_on_ctrl_c();
    let report = converger
        .run_canaries(&cancel)
        .await
        .with_context(|| format!("canaries failed for policy store {}", converger.policy_store_id()))?;
    println!("{report}");
    Ok(())
}

async fn build_converger(config: &AppConfig) -> anyhow::Result<Converger> {
    let target = config.policy_store_target()?;
    let sdk_config = load_sdk_config(target.region.as_deref()).await;
    let client = Arc::new(AwsPolicyStoreClient::from_conf(&sdk_config));
    Converger::new(
        client,
        target.policy_store_id,
        config.verified_permissions.clone(),
    )
    .context("invalid verified_permissions configuration")
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping before the next write");
            token.cancel();
        }
    });
    cancel
}

fn print_converge_report(report: &ConvergeReport) {
    let schema = if report.schema.is_applied() {
        "applied"
    } else {
        "unchanged"
    };
    println!("namespace: {}", report.namespace);
    println!("schema: {schema}");
    println!("policies: {}", report.policies);
    if let Some(canaries) = &report.canaries {
        println!("{canaries}");
    } else {
        println!("canaries: skipped");
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn rejected_inputs_exit_with_invalid_input() {
        let err = anyhow::Error::new(DomainError::schema_structure("two namespaces"))
            .context("validation failed");
        assert_eq!(exit_status(Err(err)).unwrap(), ExitCode::from(INVALID_INPUT));
    }

    #[test]
    fn store_and_runtime_failures_propagate() {
        assert!(exit_status(Err(anyhow::Error::new(DomainError::Cancelled))).is_err());
        assert!(exit_status(Err(anyhow!("no credentials"))).is_err());
        assert_eq!(exit_status(Ok(())).unwrap(), ExitCode::SUCCESS);
    }
}
