//! Remote ruler HTTP client
//!
//! Talks to the rule-group configuration API exposed by Mimir and Cortex:
//!
//! - `GET  {base}/prometheus/config/v1/rules/{namespace}/{group}` returns one
//!   group as YAML, or 404 when it does not exist
//! - `POST {base}/prometheus/config/v1/rules/{namespace}` stores a YAML group,
//!   replacing any group with the same name
//!
//! The ruler keeps no revision token, so create and update are the same
//! request. No retries happen here; a failed call is returned to the
//! reconciler and retried by whatever scheduled the reconciliation.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use std::time::Duration;

use slo_rules_core::{ObjectKey, RemoteRuleGroup, Resource};

use crate::store::{ObjectStore, StoreError, StoreResult};

/// Header carrying the tenant in multi-tenant rulers
pub const TENANT_HEADER: &str = "X-Scope-OrgID";

const RULES_API_PATH: [&str; 4] = ["prometheus", "config", "v1", "rules"];

/// Configuration for the ruler client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulerClientConfig {
    /// Base URL of the ruler, e.g. `http://mimir:8080`
    pub base_url: String,

    /// Tenant ID sent as `X-Scope-OrgID`
    pub tenant_id: Option<String>,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RulerClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            tenant_id: None,
            timeout_ms: 10_000,
        }
    }
}

/// HTTP client for the remote ruler
#[derive(Debug, Clone)]
pub struct RulerClient {
    client: Client,
    base_url: Url,
    config: RulerClientConfig,
}

impl RulerClient {
    /// Create a client for `base_url` with default settings
    pub fn new(base_url: impl Into<String>) -> StoreResult<Self> {
        Self::with_config(RulerClientConfig {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    /// Create a client with custom configuration
    pub fn with_config(config: RulerClientConfig) -> StoreResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            StoreError::Other(format!("invalid ruler URL {:?}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Other(format!(
                "ruler URL {:?} cannot be used as a base",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Other(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.config.tenant_id.as_deref()
    }

    pub fn timeout_ms(&self) -> u64 {
        self.config.timeout_ms
    }

    /// Build `{base}/prometheus/config/v1/rules/{segments...}` with each
    /// segment percent-encoded
    fn rules_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(RULES_API_PATH).extend(segments);
        }
        url
    }

    fn with_tenant(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.tenant_id {
            Some(tenant) => request.header(TENANT_HEADER, tenant),
            None => request,
        }
    }

    /// Fetch one rule group
    pub async fn get_rule_group(&self, namespace: &str, name: &str) -> StoreResult<RemoteRuleGroup> {
        let url = self.rules_url(&[namespace, name]);
        tracing::debug!(url = %url, "Fetching rule group");

        let response = self
            .with_tenant(self.client.get(url))
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::not_found(
                RemoteRuleGroup::KIND,
                ObjectKey::new(namespace, name),
            ));
        }
        check_status(status, response_text(response).await, |body| {
            let mut group: RemoteRuleGroup = serde_yaml::from_str(&body)?;
            group.namespace = namespace.to_string();
            Ok(group)
        })
    }

    /// Store a rule group under `group.namespace`
    pub async fn set_rule_group(&self, group: &RemoteRuleGroup) -> StoreResult<()> {
        let url = self.rules_url(&[group.namespace.as_str()]);
        let body = serde_yaml::to_string(group)?;
        tracing::debug!(url = %url, group = %group.name, rules = group.rules.len(), "Pushing rule group");

        let response = self
            .with_tenant(self.client.post(url))
            .header(header::CONTENT_TYPE, "application/yaml")
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        check_status(status, response_text(response).await, |_| Ok(()))
    }

    /// Health check against the ruler's readiness endpoint
    pub async fn is_ready(&self) -> bool {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("ready");
        }
        match self.with_tenant(self.client.get(url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Ruler readiness check failed");
                false
            }
        }
    }
}

async fn response_text(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

/// Map a non-success status to an error, otherwise hand the body to `on_success`
fn check_status<T>(
    status: StatusCode,
    body: String,
    on_success: impl FnOnce(String) -> StoreResult<T>,
) -> StoreResult<T> {
    if status.is_success() {
        on_success(body)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(StoreError::Unavailable(format!(
            "authentication failed: {}",
            status
        )))
    } else if status.is_server_error() {
        Err(StoreError::Http(format!("server error: {}: {}", status, body.trim())))
    } else {
        Err(StoreError::Http(format!(
            "unexpected status: {}: {}",
            status,
            body.trim()
        )))
    }
}

#[async_trait]
impl ObjectStore<RemoteRuleGroup> for RulerClient {
    async fn get(&self, key: &ObjectKey) -> StoreResult<RemoteRuleGroup> {
        self.get_rule_group(&key.namespace, &key.name).await
    }

    async fn create(&self, object: &RemoteRuleGroup) -> StoreResult<RemoteRuleGroup> {
        self.set_rule_group(object).await?;
        Ok(object.clone())
    }

    async fn update(&self, object: &RemoteRuleGroup) -> StoreResult<RemoteRuleGroup> {
        self.set_rule_group(object).await?;
        Ok(object.clone())
    }
}

/// Builder for RulerClient
pub struct RulerClientBuilder {
    config: RulerClientConfig,
}

impl RulerClientBuilder {
    pub fn new() -> Self {
        Self {
            config: RulerClientConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn tenant_id(mut self, tenant: impl Into<String>) -> Self {
        self.config.tenant_id = Some(tenant.into());
        self
    }

    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.config.timeout_ms = timeout;
        self
    }

    pub fn build(self) -> StoreResult<RulerClient> {
        RulerClient::with_config(self.config)
    }
}

impl Default for RulerClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
