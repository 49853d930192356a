//! Layered application configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the YAML file,
//! `AVP_`-prefixed environment variables (`__` separates nested keys), and
//! command-line flags.

use std::path::Path;

use anyhow::{Context, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::Deserialize;
use verified_permissions::VerifiedPermissionsConfig;
use verified_permissions::domain::action_groups::ActionGroupMode;
use verified_permissions::domain::region::region_from_arn;

pub const DEFAULT_CONFIG_FILE: &str = "avp-sync.yaml";
pub const ENV_PREFIX: &str = "AVP_";

const POLICY_STORE_RESOURCE: &str = "policy-store/";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub region: Option<String>,
    /// Plain id or policy store ARN.
    pub policy_store_id: Option<String>,
    pub logging: LoggingConfig,
    pub verified_permissions: VerifiedPermissionsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

/// Command-line values; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub region: Option<String>,
    pub policy_store_id: Option<String>,
    pub action_group_enforcement: Option<ActionGroupMode>,
    pub log_level: Option<String>,
    pub skip_canaries: bool,
}

/// Target policy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStoreTarget {
    pub policy_store_id: String,
    /// Explicit region, or the one embedded in the ARN.
    pub region: Option<String>,
}

impl AppConfig {
    /// # Errors
    ///
    /// Fails when no policy store is configured or the ARN has no store id.
    pub fn policy_store_target(&self) -> anyhow::Result<PolicyStoreTarget> {
        let Some(raw) = self.policy_store_id.as_deref().map(str::trim) else {
            bail!("policy_store_id is required (config file, AVP_POLICY_STORE_ID or --policy-store-id)");
        };
        if raw.is_empty() {
            bail!("policy_store_id is empty");
        }

        if !raw.starts_with("arn:") {
            return Ok(PolicyStoreTarget {
                policy_store_id: raw.to_owned(),
                region: self.region.clone(),
            });
        }

        let policy_store_id = raw
            .rsplit_once(POLICY_STORE_RESOURCE)
            .map(|(_, id)| id)
            .filter(|id| !id.is_empty() && !id.contains('/'))
            .with_context(|| format!("'{raw}' is not a policy store ARN"))?;
        Ok(PolicyStoreTarget {
            policy_store_id: policy_store_id.to_owned(),
            region: self
                .region
                .clone()
                .or_else(|| region_from_arn(raw).map(str::to_owned)),
        })
    }
}

/// Builds the configuration from all sources.
///
/// An explicitly given `path` must exist; the default file is optional.
///
/// # Errors
///
/// Fails for a missing explicit file or when the merged values do not
/// deserialize into [`AppConfig`].
pub fn load(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<AppConfig> {
    let file = match path {
        Some(path) if !path.is_file() => bail!("configuration file {} not found", path.display()),
        Some(path) => path,
        None => Path::new(DEFAULT_CONFIG_FILE),
    };

    let mut figment = Figment::new()
        .merge(Yaml::file(file))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    if let Some(region) = &overrides.region {
        figment = figment.merge(Serialized::default("region", region));
    }
    if let Some(id) = &overrides.policy_store_id {
        figment = figment.merge(Serialized::default("policy_store_id", id));
    }
    if let Some(mode) = overrides.action_group_enforcement {
        figment = figment.merge(Serialized::default(
            "verified_permissions.action_group_enforcement",
            mode.as_str(),
        ));
    }
    if let Some(level) = &overrides.log_level {
        figment = figment.merge(Serialized::default("logging.level", level));
    }
    if overrides.skip_canaries {
        figment = figment.merge(Serialized::default("verified_permissions.run_canaries", false));
    }

    figment
        .extract()
        .with_context(|| format!("invalid configuration (file: {})", file.display()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use figment::Jail;

    fn load_in_jail(path: Option<&Path>, overrides: &Overrides) -> figment::error::Result<AppConfig> {
        load(path, overrides).map_err(|e| format!("{e:#}").into())
    }

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_| {
            let config = load_in_jail(None, &Overrides::default())?;
            assert_eq!(config.region, None);
            assert_eq!(config.logging.level, "info");
            assert_eq!(config.logging.format, LogFormat::Text);
            assert_eq!(
                config.verified_permissions.action_group_enforcement,
                ActionGroupMode::Error
            );
            Ok(())
        });
    }

    #[test]
    fn file_then_env_then_cli() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                "region: eu-west-1\npolicy_store_id: ps-file\nlogging:\n  format: json\nverified_permissions:\n  action_group_enforcement: warn\n  canary_concurrency: 2\n",
            )?;
            jail.set_env("AVP_POLICY_STORE_ID", "ps-env");
            jail.set_env("AVP_VERIFIED_PERMISSIONS__CANARY_CONCURRENCY", "8");

            let overrides = Overrides {
                region: Some("us-east-1".to_owned()),
                action_group_enforcement: Some(ActionGroupMode::Off),
                skip_canaries: true,
                ..Overrides::default()
            };
            let config = load_in_jail(None, &overrides)?;

            assert_eq!(config.region.as_deref(), Some("us-east-1"));
            assert_eq!(config.policy_store_id.as_deref(), Some("ps-env"));
            assert_eq!(config.logging.format, LogFormat::Json);
            let vp = &config.verified_permissions;
            assert_eq!(vp.canary_concurrency, 8);
            assert_eq!(vp.action_group_enforcement, ActionGroupMode::Off);
            assert!(!vp.run_canaries);
            Ok(())
        });
    }

    #[test]
    fn explicit_file_must_exist() {
        Jail::expect_with(|_| {
            let err = load(Some(Path::new("missing.yaml")), &Overrides::default()).unwrap_err();
            assert!(err.to_string().contains("missing.yaml"));
            Ok(())
        });
    }

    #[test]
    fn unknown_keys_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "verified_permissions:\n  schema: x.yaml\n")?;
            assert!(load(Some(Path::new("custom.yaml")), &Overrides::default()).is_err());
            Ok(())
        });
    }

    #[test]
    fn plain_policy_store_id() {
        let config = AppConfig {
            policy_store_id: Some(" ps-123 ".to_owned()),
            ..AppConfig::default()
        };
        let target = config.policy_store_target().unwrap();
        assert_eq!(target.policy_store_id, "ps-123");
        assert_eq!(target.region, None);
    }

    #[test]
    fn policy_store_arn_supplies_region() {
        let config = AppConfig {
            policy_store_id: Some(
                "arn:aws-us-gov:verifiedpermissions:us-gov-west-1:123456789012:policy-store/PSabc"
                    .to_owned(),
            ),
            ..AppConfig::default()
        };
        let target = config.policy_store_target().unwrap();
        assert_eq!(target.policy_store_id, "PSabc");
        assert_eq!(target.region.as_deref(), Some("us-gov-west-1"));

        let config = AppConfig {
            region: Some("us-east-1".to_owned()),
            policy_store_id: Some("arn:aws:verifiedpermissions::123456789012:policy-store/PSdef".to_owned()),
            ..AppConfig::default()
        };
        let target = config.policy_store_target().unwrap();
        assert_eq!(target.policy_store_id, "PSdef");
        assert_eq!(target.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn missing_or_malformed_store_is_an_error() {
        assert!(AppConfig::default().policy_store_target().is_err());
        let config = AppConfig {
            policy_store_id: Some("arn:aws:verifiedpermissions::123456789012:identity-source/x".to_owned()),
            ..AppConfig::default()
        };
        assert!(config.policy_store_target().is_err());
    }
}
