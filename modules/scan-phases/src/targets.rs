use engine_client::ApiClient;
use tracing::info;
use zapctl_core::{Result, ScanConfig};

/// The configured targets, or every site the engine already knows. An empty list is valid.
pub async fn resolve_targets(client: &ApiClient, config: &ScanConfig) -> Result<Vec<String>> {
    if let Some(urls) = config.explicit_targets() {
        return Ok(urls);
    }
    let sites = client.sites().await?;
    info!("no target configured, using {} site(s) known to the engine", sites.len());
    Ok(sites)
}
