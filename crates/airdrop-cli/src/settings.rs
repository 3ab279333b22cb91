//! # Configuration Loading
//!
//! Settings come from an optional YAML file, then `AIRDROP_*` environment
//! variables override individual keys. The merged document is deserialized
//! into whichever settings struct the subcommand needs: the full
//! [`DistributionConfig`] for `run`, or just [`MembershipSettings`] for
//! `diff`.
//!
//! | Variable                    | Key                   |
//! |-----------------------------|-----------------------|
//! | `AIRDROP_COMMUNITY`         | `community_id`        |
//! | `AIRDROP_ROLE_ID`           | `role_id`             |
//! | `AIRDROP_TOKEN_AMOUNT`      | `token_amount`        |
//! | `AIRDROP_NATIVE_AMOUNT`     | `native_amount`       |
//! | `AIRDROP_BATCH_SIZE`        | `batch_size`          |
//! | `AIRDROP_DISPERSE_URL`      | `disperse_endpoint`   |
//! | `AIRDROP_MEMBERSHIP_URL`    | `membership_endpoint` |
//! | `AIRDROP_TOKEN_ADDRESS`     | `token_address`       |
//! | `AIRDROP_DISPERSE_CONTRACT` | `disperse_contract`   |
//! | `AIRDROP_SENDER`            | `sender`              |
//! | `AIRDROP_IN_FLIGHT_POLICY`  | `in_flight_policy`    |
//!
//! The relay token is never read from the file; see
//! [`airdrop_client::config::relay_token_from_env`].

use std::path::{Path, PathBuf};

use airdrop_client::ClientConfig;
use airdrop_distributor::{DistributionConfig, DEFAULT_COMMUNITY, DEFAULT_ROLE_ID};
use airdrop_ledger::DEFAULT_LEDGER_FILE;
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use url::Url;

/// Global options naming the configuration file and the ledger.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// YAML configuration file.
    #[arg(long, value_name = "FILE", env = "AIRDROP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Distribution ledger file.
    #[arg(
        long,
        value_name = "PATH",
        env = "AIRDROP_LEDGER",
        default_value = DEFAULT_LEDGER_FILE,
        global = true
    )]
    pub ledger: PathBuf,
}

/// How an environment value is typed before it lands in the document.
#[derive(Clone, Copy)]
enum Kind {
    Text,
    Integer,
}

const ENV_OVERRIDES: &[(&str, &str, Kind)] = &[
    ("AIRDROP_COMMUNITY", "community_id", Kind::Text),
    ("AIRDROP_ROLE_ID", "role_id", Kind::Integer),
    ("AIRDROP_TOKEN_AMOUNT", "token_amount", Kind::Text),
    ("AIRDROP_NATIVE_AMOUNT", "native_amount", Kind::Text),
    ("AIRDROP_BATCH_SIZE", "batch_size", Kind::Integer),
    ("AIRDROP_DISPERSE_URL", "disperse_endpoint", Kind::Text),
    ("AIRDROP_MEMBERSHIP_URL", "membership_endpoint", Kind::Text),
    ("AIRDROP_TOKEN_ADDRESS", "token_address", Kind::Text),
    ("AIRDROP_DISPERSE_CONTRACT", "disperse_contract", Kind::Text),
    ("AIRDROP_SENDER", "sender", Kind::Text),
    ("AIRDROP_IN_FLIGHT_POLICY", "in_flight_policy", Kind::Text),
];

/// The subset of settings needed to fetch and diff membership.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipSettings {
    #[serde(default = "default_community")]
    pub community_id: String,
    #[serde(default = "default_role_id")]
    pub role_id: u64,
    #[serde(default = "default_membership_endpoint")]
    pub membership_endpoint: Url,
}

fn default_community() -> String {
    DEFAULT_COMMUNITY.to_string()
}

fn default_role_id() -> u64 {
    DEFAULT_ROLE_ID
}

fn default_membership_endpoint() -> Url {
    builtin_url(airdrop_client::config::DEFAULT_MEMBERSHIP_URL)
}

fn builtin_url(raw: &str) -> Url {
    match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => unreachable!("built-in default URL {raw} must parse: {e}"),
    }
}

impl MembershipSettings {
    /// Client configuration for membership fetches; the relay is never contacted.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(
            self.membership_endpoint.clone(),
            builtin_url(airdrop_client::config::DEFAULT_DISPERSE_URL),
        )
    }
}

/// Read the YAML file (if any) and apply environment overrides from `lookup`.
pub fn merged_document(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Value> {
    let mut doc = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read config file: {}", p.display()))?;
            let value: Value = serde_yaml::from_str(&text)
                .with_context(|| format!("failed to parse config YAML: {}", p.display()))?;
            match value {
                Value::Mapping(m) => m,
                Value::Null => Mapping::new(),
                _ => bail!("config file {} must contain a YAML mapping", p.display()),
            }
        }
        None => Mapping::new(),
    };

    for (var, key, kind) in ENV_OVERRIDES {
        let Some(raw) = lookup(var).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let value = match kind {
            Kind::Text => Value::String(raw.trim().to_string()),
            Kind::Integer => {
                let n: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{var} must be a non-negative integer, got {raw:?}"))?;
                Value::Number(n.into())
            }
        };
        tracing::debug!(var, key, "config override from environment");
        doc.insert(Value::String((*key).to_string()), value);
    }

    Ok(Value::Mapping(doc))
}

/// Deserialize a settings struct from the merged document.
pub fn load_settings<T: DeserializeOwned>(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<T> {
    let doc = merged_document(path, lookup)?;
    serde_yaml::from_value(doc).context("invalid configuration")
}

/// Full distribution configuration from file and process environment.
pub fn load_distribution_config(path: Option<&Path>) -> Result<DistributionConfig> {
    let config: DistributionConfig = load_settings(path, |k| std::env::var(k).ok())?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Client configuration for the endpoints in `config`.
pub fn client_config(membership: &Url, disperse: &Url) -> ClientConfig {
    let mut client = ClientConfig::new(membership.clone(), disperse.clone());
    client.relay_token = airdrop_client::config::relay_token_from_env();
    client
}
