use std::path::PathBuf;

use clap::{Parser, Subcommand};
use verified_permissions::domain::action_groups::ActionGroupMode;

use crate::config::Overrides;

/// Converge an Amazon Verified Permissions policy store from local files
#[derive(Parser, Debug)]
#[command(name = "avp-sync", version, about, long_about = None)]
pub struct Cli {
    /// YAML configuration file; `avp-sync.yaml` is read when present
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// AWS region; defaults to the policy store ARN's region, then the SDK chain
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Policy store id or ARN
    #[arg(long, global = true)]
    pub policy_store_id: Option<String>,

    /// Action-group enforcement: off, warn or error
    #[arg(long, global = true)]
    pub action_group_enforcement: Option<ActionGroupMode>,

    /// Log level or `EnvFilter` directive; `RUST_LOG` wins when set
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Validate schema, policies and canary files without contacting AWS
    Validate,
    /// Sync the schema, install policies and run canaries
    Apply {
        /// Do not run canaries after installation
        #[arg(long)]
        skip_canaries: bool,
    },
    /// Run canaries against the deployed policy store
    Canary,
}

impl Cli {
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            region: self.region.clone(),
            policy_store_id: self.policy_store_id.clone(),
            action_group_enforcement: self.action_group_enforcement,
            log_level: self.log_level.clone(),
            skip_canaries: matches!(self.command, Command::Apply { skip_canaries: true }),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "avp-sync",
            "apply",
            "--skip-canaries",
            "--policy-store-id",
            "ps-1",
            "--action-group-enforcement",
            "WARN",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::Apply { skip_canaries: true });

        let overrides = cli.overrides();
        assert_eq!(overrides.policy_store_id.as_deref(), Some("ps-1"));
        assert_eq!(overrides.action_group_enforcement, Some(ActionGroupMode::Warn));
        assert!(overrides.skip_canaries);
    }

    #[test]
    fn unknown_enforcement_mode_is_rejected() {
        let result = Cli::try_parse_from(["avp-sync", "validate", "--action-group-enforcement", "strict"]);
        assert!(result.is_err());
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["avp-sync"]).is_err());
        let cli = Cli::try_parse_from(["avp-sync", "canary", "-c", "prod.yaml"]).unwrap();
        assert_eq!(cli.command, Command::Canary);
        assert_eq!(cli.config, Some(PathBuf::from("prod.yaml")));
        assert!(!cli.overrides().skip_canaries);
    }
}
