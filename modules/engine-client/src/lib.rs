//! Client for the scan engine's JSON control API.
//!
//! Every request goes to `<base>/JSON/<component>/<view|action>/<name>/` with the
//! API key in the `apikey` query parameter.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use zapctl_core::{EngineSettings, ReportFormat, Result, ZapError};

mod response;

pub use response::{job_finished, ScanRecord};
use response::{element, error_document, scan_records, string_list};

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(300))
            .user_agent(format!("zapctl/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(|e| ZapError::remote("client setup", e))?;
        Ok(ApiClient {
            http,
            base: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_settings(settings: &EngineSettings) -> Result<Self> {
        Self::new(&settings.base_url(), &settings.api_key)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Generic call. `apikey` is added unless `params` already carries it.
    pub async fn call_api(&self, component: &str, kind: &str, name: &str, params: &[(&str, &str)]) -> Result<Value> {
        let op = format!("{}/{}/{}", component, kind, name);
        let url = format!("{}/JSON/{}/", self.base, op);
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 1);
        if !params.iter().any(|(k, _)| *k == "apikey") {
            query.push(("apikey", self.api_key.as_str()));
        }
        query.extend_from_slice(params);
        debug!("engine call {} {:?}", op, params);

        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ZapError::remote(&op, e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| ZapError::remote(&op, e))?;
        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        if let Some(msg) = parsed.as_ref().and_then(error_document) {
            return Err(ZapError::remote(&op, msg));
        }
        if !status.is_success() {
            return Err(ZapError::remote(&op, format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }
        parsed.ok_or_else(|| ZapError::remote(&op, format!("response is not JSON: {}", body.trim())))
    }

    async fn view(&self, component: &str, name: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.call_api(component, "view", name, params).await
    }

    async fn action(&self, component: &str, name: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.call_api(component, "action", name, params).await
    }

    async fn action_element(&self, component: &str, name: &str, params: &[(&str, &str)]) -> Result<String> {
        let v = self.action(component, name, params).await?;
        element(&format!("{}/action/{}", component, name), &v)
    }

    async fn view_element(&self, component: &str, name: &str, params: &[(&str, &str)]) -> Result<String> {
        let v = self.view(component, name, params).await?;
        element(&format!("{}/view/{}", component, name), &v)
    }

    // core

    pub async fn sites(&self) -> Result<Vec<String>> {
        let v = self.view("core", "sites", &[]).await?;
        string_list("core/view/sites", &v)
    }

    pub async fn number_of_alerts(&self) -> Result<String> {
        self.view_element("core", "numberOfAlerts", &[("baseurl", "")]).await
    }

    pub async fn number_of_messages(&self) -> Result<String> {
        self.view_element("core", "numberOfMessages", &[("baseurl", "")]).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.action("core", "shutdown", &[]).await.map(|_| ())
    }

    pub async fn new_session(&self) -> Result<()> {
        self.action("core", "newSession", &[("name", ""), ("overwrite", "")]).await.map(|_| ())
    }

    /// Rendered report bytes from `OTHER/core/other/<format>report/`.
    pub async fn report(&self, format: ReportFormat) -> Result<Vec<u8>> {
        let op = format!("core/other/{}report", format.extension());
        let url = format!("{}/OTHER/{}/", self.base, op);
        debug!("engine call {}", op);
        let resp = self
            .http
            .get(&url)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ZapError::remote(&op, e))?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| ZapError::remote(&op, e))?;
        if !status.is_success() {
            return Err(ZapError::remote(&op, format!("HTTP {}: {}", status.as_u16(), String::from_utf8_lossy(&bytes).trim())));
        }
        Ok(bytes.to_vec())
    }

    // context

    pub async fn new_context(&self, context_name: &str) -> Result<String> {
        self.action_element("context", "newContext", &[("contextName", context_name)]).await
    }

    pub async fn include_in_context(&self, context_name: &str, regex: &str) -> Result<()> {
        self.action("context", "includeInContext", &[("contextName", context_name), ("regex", regex)]).await.map(|_| ())
    }

    pub async fn exclude_from_context(&self, context_name: &str, regex: &str) -> Result<()> {
        self.action("context", "excludeFromContext", &[("contextName", context_name), ("regex", regex)]).await.map(|_| ())
    }

    // authentication

    pub async fn set_authentication_method(&self, context_id: &str, method_name: &str, config_params: &str) -> Result<()> {
        self.action(
            "authentication",
            "setAuthenticationMethod",
            &[("contextId", context_id), ("authMethodName", method_name), ("authMethodConfigParams", config_params)],
        )
        .await
        .map(|_| ())
    }

    pub async fn set_logged_in_indicator(&self, context_id: &str, regex: &str) -> Result<()> {
        self.action("authentication", "setLoggedInIndicator", &[("contextId", context_id), ("loggedInIndicatorRegex", regex)])
            .await
            .map(|_| ())
    }

    pub async fn set_logged_out_indicator(&self, context_id: &str, regex: &str) -> Result<()> {
        self.action("authentication", "setLoggedOutIndicator", &[("contextId", context_id), ("loggedOutIndicatorRegex", regex)])
            .await
            .map(|_| ())
    }

    // users

    pub async fn new_user(&self, context_id: &str, name: &str) -> Result<String> {
        self.action_element("users", "newUser", &[("contextId", context_id), ("name", name)]).await
    }

    pub async fn set_user_enabled(&self, context_id: &str, user_id: &str, enabled: bool) -> Result<()> {
        let enabled = if enabled { "true" } else { "false" };
        self.action("users", "setUserEnabled", &[("contextId", context_id), ("userId", user_id), ("enabled", enabled)])
            .await
            .map(|_| ())
    }

    pub async fn set_authentication_credentials(&self, context_id: &str, user_id: &str, config_params: &str) -> Result<()> {
        self.action(
            "users",
            "setAuthenticationCredentials",
            &[("contextId", context_id), ("userId", user_id), ("authCredentialsConfigParams", config_params)],
        )
        .await
        .map(|_| ())
    }

    // spider

    pub async fn spider_scan(&self, url: &str) -> Result<String> {
        self.action_element("spider", "scan", &[("url", url), ("maxChildren", "")]).await
    }

    pub async fn spider_scan_as_user(&self, url: &str, context_id: &str, user_id: &str) -> Result<String> {
        self.action_element(
            "spider",
            "scanAsUser",
            &[("url", url), ("contextId", context_id), ("userId", user_id), ("maxChildren", "0")],
        )
        .await
    }

    pub async fn spider_status(&self, scan_id: &str) -> Result<String> {
        self.view_element("spider", "status", &[("scanId", scan_id)]).await
    }

    pub async fn spider_scans(&self) -> Result<Vec<ScanRecord>> {
        let v = self.view("spider", "scans", &[]).await?;
        scan_records("spider/view/scans", &v)
    }

    // ajax spider

    pub async fn ajax_spider_status(&self) -> Result<String> {
        self.view_element("ajaxSpider", "status", &[]).await
    }

    // active scan

    pub async fn ascan_scan(&self, url: &str, recurse: bool, in_scope_only: bool) -> Result<String> {
        let recurse = if recurse { "true" } else { "false" };
        let in_scope_only = if in_scope_only { "true" } else { "false" };
        self.action_element(
            "ascan",
            "scan",
            &[("url", url), ("recurse", recurse), ("inScopeOnly", in_scope_only), ("scanPolicyName", ""), ("method", ""), ("postData", "")],
        )
        .await
    }

    pub async fn ascan_scan_as_user(&self, url: &str, context_id: &str, user_id: &str, recurse: bool, policy: &str) -> Result<String> {
        let recurse = if recurse { "true" } else { "false" };
        self.action_element(
            "ascan",
            "scanAsUser",
            &[
                ("url", url),
                ("contextId", context_id),
                ("userId", user_id),
                ("recurse", recurse),
                ("scanPolicyName", policy),
                ("method", ""),
                ("postData", ""),
            ],
        )
        .await
    }

    pub async fn ascan_status(&self, scan_id: &str) -> Result<String> {
        self.view_element("ascan", "status", &[("scanId", scan_id)]).await
    }

    pub async fn ascan_scans(&self) -> Result<Vec<ScanRecord>> {
        let v = self.view("ascan", "scans", &[]).await?;
        scan_records("ascan/view/scans", &v)
    }
}
