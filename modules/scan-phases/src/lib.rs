//! The phases of a scan run against a ready engine, and the run itself.

pub mod active_scan;
pub mod authentication;
pub mod context;
pub mod poll;
pub mod report;
pub mod run;
pub mod spider;
pub mod targets;

pub use active_scan::run_active_scan;
pub use authentication::{configure_authentication, ScanUser};
pub use context::{setup_context, SecurityContext, CONTEXT_NAME};
pub use poll::PollPolicy;
pub use report::{report_file_name, save_report};
pub use run::{cause_trace, execute, run, RunSummary, Startup};
pub use spider::{run_ajax_spider, run_spider};
pub use targets::resolve_targets;
