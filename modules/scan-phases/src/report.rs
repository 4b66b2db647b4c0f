use engine_client::ApiClient;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;
use zapctl_core::{ReportFormat, Result, ZapError};

pub const REPORT_PREFIX: &str = "ZAP";

/// `ZAP_<yyyy-MM-dd HH-mm-ss>.<ext>`
pub fn report_file_name(format: ReportFormat, at: OffsetDateTime) -> Result<String> {
    let stamp = at
        .format(format_description!("[year]-[month]-[day] [hour]-[minute]-[second]"))
        .map_err(|e| ZapError::Encoding(e.to_string()))?;
    Ok(format!("{}_{}.{}", REPORT_PREFIX, stamp, format.extension()))
}

/// Render one report on the engine and write it into `work_dir`.
pub async fn save_report(client: &ApiClient, format: ReportFormat, work_dir: &Path) -> Result<PathBuf> {
    let bytes = client.report(format).await?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let path = work_dir.join(report_file_name(format, now)?);
    std::fs::write(&path, bytes)?;
    info!("file [{}] saved", path.display());
    Ok(path)
}
