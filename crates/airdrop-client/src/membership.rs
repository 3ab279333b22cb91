//! # Membership Snapshot
//!
//! The eligible set is the member list of one role inside one community on
//! the Guild platform. [`GuildClient`] fetches
//! `GET {base}/v1/guild/{community}` and reads `roles[].members` for the
//! configured role id.
//!
//! Member strings are validated into [`Address`]es. Entries that do not parse
//! are skipped with a warning rather than failing the run; duplicates inside
//! one snapshot keep their first position.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use airdrop_core::Address;
use serde::Deserialize;
use url::Url;

use crate::config::{ClientConfig, ConfigError};
use crate::error::MembershipError;
use crate::retry::{retry_send, RetryPolicy};

/// Source of the eligible member set.
pub trait MembershipSource: Send + Sync {
    /// Ordered member addresses of `role_id` in `community`.
    fn role_members(
        &self,
        community: &str,
        role_id: u64,
    ) -> impl Future<Output = Result<Vec<Address>, MembershipError>> + Send;
}

/// Guild payload. Only the fields the airdrop reads are modelled; the rest
/// of the document is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<GuildRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildRole {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

impl GuildResponse {
    /// Validated, de-duplicated members of `role_id`.
    pub fn members_of(&self, community: &str, role_id: u64) -> Result<Vec<Address>, MembershipError> {
        let role = self
            .roles
            .iter()
            .find(|r| r.id == role_id)
            .ok_or_else(|| MembershipError::RoleNotFound {
                community: community.to_string(),
                role_id,
            })?;

        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(role.members.len());
        let mut skipped = 0usize;
        for raw in &role.members {
            match Address::parse(raw) {
                Ok(addr) => {
                    if seen.insert(addr.clone()) {
                        members.push(addr);
                    }
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(community, role_id, member = %raw, "skipping member: {e}");
                }
            }
        }
        if skipped > 0 {
            tracing::warn!(community, role_id, skipped, "membership snapshot contained invalid entries");
        }
        Ok(members)
    }
}

/// HTTP client for the Guild API.
#[derive(Debug, Clone)]
pub struct GuildClient {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl GuildClient {
    pub fn new(config: &ClientConfig) -> Result<Self, MembershipError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MembershipError::Http {
                endpoint: "client build".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            base_url: config.membership_url.clone(),
            retry: RetryPolicy::default(),
        })
    }

    /// `{base}/v1/guild/{community}`, with `community` percent-encoded as a
    /// single path segment.
    fn guild_url(&self, community: &str) -> Result<Url, ConfigError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ConfigError::InvalidUrl(
                    "membership_endpoint".into(),
                    format!("{} cannot be used as a base URL", self.base_url),
                )
            })?
            .pop_if_empty()
            .extend(["v1", "guild", community]);
        Ok(url)
    }

    /// Fetch the raw guild document.
    pub async fn fetch_guild(&self, community: &str) -> Result<GuildResponse, MembershipError> {
        let url = self.guild_url(community)?;
        let endpoint = format!("GET {}", url.path());

        let resp = retry_send(&self.retry, &endpoint, || self.http.get(url.clone()).send())
            .await
            .map_err(|e| MembershipError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MembershipError::ApiError {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| MembershipError::Deserialization { endpoint, source: e })
    }
}

impl MembershipSource for GuildClient {
    async fn role_members(&self, community: &str, role_id: u64) -> Result<Vec<Address>, MembershipError> {
        let guild = self.fetch_guild(community).await?;
        let members = guild.members_of(community, role_id)?;
        tracing::info!(community, role_id, members = members.len(), "fetched membership snapshot");
        Ok(members)
    }
}

/// Fixed member list, for tests and dry runs against a known set.
#[derive(Debug, Clone, Default)]
pub struct StaticMembership {
    members: Vec<Address>,
}

impl StaticMembership {
    pub fn new(members: Vec<Address>) -> Self {
        Self { members }
    }
}

impl MembershipSource for StaticMembership {
    async fn role_members(&self, _community: &str, _role_id: u64) -> Result<Vec<Address>, MembershipError> {
        Ok(self.members.clone())
    }
}
