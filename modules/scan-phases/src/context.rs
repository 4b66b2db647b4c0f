use engine_client::ApiClient;
use tracing::info;
use zapctl_core::patterns::literal_prefix;
use zapctl_core::{Result, ScanConfig};

pub const CONTEXT_NAME: &str = "context1";

/// The engine-side scope of this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    pub id: String,
    pub name: String,
}

/// Create the run's context and register the include patterns (configured
/// includes, then every target) followed by the exclude patterns, one call per URL.
pub async fn setup_context(client: &ApiClient, targets: &[String], config: &ScanConfig) -> Result<SecurityContext> {
    let id = client.new_context(CONTEXT_NAME).await?;
    info!("created context {{contextName:{}, contextId:{}}}", CONTEXT_NAME, id);

    let mut include = config.include_list();
    include.extend(targets.iter().cloned());
    for url in &include {
        let regex = literal_prefix(url);
        client.include_in_context(CONTEXT_NAME, &regex).await?;
        info!("URL [{}] included in context [{}]", regex, CONTEXT_NAME);
    }

    for url in &config.exclude_list() {
        let regex = literal_prefix(url);
        client.exclude_from_context(CONTEXT_NAME, &regex).await?;
        info!("URL [{}] excluded from context [{}]", regex, CONTEXT_NAME);
    }

    Ok(SecurityContext { id, name: CONTEXT_NAME.to_string() })
}
