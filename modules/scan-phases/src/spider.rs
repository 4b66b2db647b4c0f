//! Crawl controllers: the link-following spider and the AJAX spider.

use engine_client::{job_finished, ApiClient};
use tracing::{info, warn};
use zapctl_core::{Result, ScanConfig, ScanIdentity};

use crate::poll::{or_unknown, PollPolicy, Poller};

/// Spider each target in turn, waiting for one job to finish before starting the next.
pub async fn run_spider(client: &ApiClient, targets: &[String], identity: &ScanIdentity, policy: PollPolicy) -> Result<()> {
    for url in targets {
        info!("start to spider the site [{}]", url);
        let scan_id = match identity {
            ScanIdentity::Anonymous => client.spider_scan(url).await?,
            ScanIdentity::AsUser { context_id, user_id } => client.spider_scan_as_user(url, context_id, user_id).await?,
        };

        let poller = Poller::new(policy, "spider", url);
        while !job_finished(&client.spider_scans().await?, &scan_id) {
            let progress = or_unknown(client.spider_status(&scan_id).await);
            let alerts = or_unknown(client.number_of_alerts().await);
            info!("spider {} status = {}%, alerts = {}", scan_id, progress, alerts);
            poller.pause().await?;
        }
        info!("finished spidering the site [{}]", url);
    }
    Ok(())
}

/// Drive the AJAX spider over each target. The engine runs one AJAX job at a
/// time and only reports its status string, so any status other than
/// `running` ends the wait.
pub async fn run_ajax_spider(client: &ApiClient, targets: &[String], config: &ScanConfig, policy: PollPolicy) -> Result<()> {
    let field_values = config.field_values_query();
    let click_elements = config.click_elements.as_deref().filter(|s| !s.trim().is_empty());

    for url in targets {
        info!("start to ajax spider the site [{}]", url);
        let mut options: Vec<(&str, &str)> = vec![("apikey", client.api_key()), ("url", url.as_str()), ("inScope", "true")];
        if let Some(fv) = field_values.as_deref() {
            options.push(("fieldValues", fv));
        }
        if let Some(ce) = click_elements {
            options.push(("clickElements", ce));
        }
        client.call_api("ajaxSpider", "action", "scan", &options).await?;

        let poller = Poller::new(policy, "ajax spider", url);
        loop {
            let status = client.ajax_spider_status().await?;
            if !status.eq_ignore_ascii_case("running") {
                if !status.eq_ignore_ascii_case("stopped") {
                    warn!("ajax spider ended with status {}", status);
                }
                break;
            }
            let alerts = or_unknown(client.number_of_alerts().await);
            info!("ajax spider status = {}, alerts = {}", status, alerts);
            poller.pause().await?;
        }
        info!("finished ajax spidering the site [{}]", url);
    }
    Ok(())
}
