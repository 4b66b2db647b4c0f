use engine_client::{job_finished, ApiClient};
use tracing::info;
use zapctl_core::{Result, ScanIdentity};

use crate::poll::{or_unknown, PollPolicy, Poller};

/// Actively scan each target in turn. Anonymous scans recurse and are not
/// limited to the context scope; user scans recurse with `scan_policy`.
pub async fn run_active_scan(
    client: &ApiClient,
    targets: &[String],
    identity: &ScanIdentity,
    scan_policy: &str,
    policy: PollPolicy,
) -> Result<()> {
    for url in targets {
        info!("scan the site [{}]", url);
        let scan_id = match identity {
            ScanIdentity::Anonymous => client.ascan_scan(url, true, false).await?,
            ScanIdentity::AsUser { context_id, user_id } => {
                client.ascan_scan_as_user(url, context_id, user_id, true, scan_policy).await?
            }
        };

        let poller = Poller::new(policy, "active scan", url);
        while !job_finished(&client.ascan_scans().await?, &scan_id) {
            let progress = or_unknown(client.ascan_status(&scan_id).await);
            let alerts = or_unknown(client.number_of_alerts().await);
            let messages = or_unknown(client.number_of_messages().await);
            info!("active scan {} status = {}%, alerts = {}, messages = {}", scan_id, progress, alerts, messages);
            poller.pause().await?;
        }
        info!("finished scanning the site [{}]", url);
    }
    Ok(())
}
