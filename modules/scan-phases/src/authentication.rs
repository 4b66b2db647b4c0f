use engine_client::ApiClient;
use tracing::info;
use zapctl_core::auth::{credentials_config, method_config, AUTH_METHOD_NAME, SCAN_USER_NAME, SCAN_USER_PASSWORD};
use zapctl_core::patterns::literal_prefix;
use zapctl_core::{Result, ScanConfig};

use crate::context::SecurityContext;

/// The synthetic identity crawls and scans run as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanUser {
    pub id: String,
    pub context_id: String,
}

/// Install the scripted login flow and indicators on `context`, then provision the scan user.
pub async fn configure_authentication(client: &ApiClient, context: &SecurityContext, config: &ScanConfig) -> Result<ScanUser> {
    let params = method_config(&config.authentication_steps)?;
    client.set_authentication_method(&context.id, AUTH_METHOD_NAME, &params).await?;
    info!("script based authentication added to context {}", context.id);

    if let Some(indicator) = non_blank(&config.logged_in_indicator) {
        client.set_logged_in_indicator(&context.id, &literal_prefix(indicator)).await?;
        info!("logged in indicator {} added to context", indicator);
    }
    if let Some(indicator) = non_blank(&config.logged_out_indicator) {
        client.set_logged_out_indicator(&context.id, &literal_prefix(indicator)).await?;
        info!("logged out indicator {} added to context", indicator);
    }

    provision_user(client, &context.id, SCAN_USER_NAME, SCAN_USER_PASSWORD).await
}

async fn provision_user(client: &ApiClient, context_id: &str, username: &str, password: &str) -> Result<ScanUser> {
    let id = client.new_user(context_id, username).await?;
    client.set_user_enabled(context_id, &id, true).await?;
    client
        .set_authentication_credentials(context_id, &id, &credentials_config(username, password))
        .await?;
    info!("scan user {} enabled in context {}", id, context_id);
    Ok(ScanUser { id, context_id: context_id.to_string() })
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|v| !v.trim().is_empty())
}
