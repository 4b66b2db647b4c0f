use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::patterns::split_list;

/// One recorded action of the login flow replayed by the engine's auth script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all(serialize = "camelCase"))]
pub struct AuthenticationStep {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub parameters: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub post_data: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub additional_headers: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub additional_cookies: String,
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// A form field value the AJAX spider types into matching inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FieldValue {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Html,
    Xml,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Xml => "xml",
            ReportFormat::Json => "json",
        }
    }
}

/// What one run should do. Built once and never mutated while the run executes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// `;`/`,` separated target URLs. Blank means every site the engine already knows.
    pub target_urls: Option<String>,
    pub include_urls: Option<String>,
    pub exclude_urls: Option<String>,
    pub spider: bool,
    pub ajax_spider: bool,
    pub active_scan: bool,
    pub authentication: bool,
    pub authentication_steps: Vec<AuthenticationStep>,
    pub logged_in_indicator: Option<String>,
    pub logged_out_indicator: Option<String>,
    /// CSS-like element list the AJAX spider clicks.
    pub click_elements: Option<String>,
    pub field_values: Vec<FieldValue>,
    pub report_formats: Vec<ReportFormat>,
    pub scan_policy: String,
    /// Upper bound for a single crawl/scan job; unbounded when absent.
    pub max_job_wait_secs: Option<u64>,
    pub spider_poll_ms: u64,
    pub ajax_spider_poll_ms: u64,
    pub active_scan_poll_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            target_urls: None,
            include_urls: None,
            exclude_urls: None,
            spider: false,
            ajax_spider: false,
            active_scan: false,
            authentication: false,
            authentication_steps: Vec::new(),
            logged_in_indicator: None,
            logged_out_indicator: None,
            click_elements: None,
            field_values: Vec::new(),
            report_formats: vec![ReportFormat::Html],
            scan_policy: "Default policy".to_string(),
            max_job_wait_secs: None,
            spider_poll_ms: 1_000,
            ajax_spider_poll_ms: 2_500,
            active_scan_poll_ms: 5_000,
        }
    }
}

impl ScanConfig {
    pub fn include_list(&self) -> Vec<String> {
        split_list(self.include_urls.as_deref())
    }

    pub fn exclude_list(&self) -> Vec<String> {
        split_list(self.exclude_urls.as_deref())
    }

    /// Explicit targets, or `None` when the engine's site list should be used.
    pub fn explicit_targets(&self) -> Option<Vec<String>> {
        let v = split_list(self.target_urls.as_deref());
        if v.is_empty() { None } else { Some(v) }
    }

    /// Crawls and scans run as the provisioned user only when there is a login flow to replay.
    pub fn scans_as_user(&self) -> bool {
        self.authentication && !self.authentication_steps.is_empty()
    }

    /// `field=value` pairs joined with `&`, or `None` without overrides.
    pub fn field_values_query(&self) -> Option<String> {
        if self.field_values.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .field_values
            .iter()
            .map(|fv| format!("{}={}", fv.field, fv.value))
            .collect();
        Some(pairs.join("&"))
    }

    pub fn max_job_wait(&self) -> Option<Duration> {
        self.max_job_wait_secs.map(Duration::from_secs)
    }
}
