use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;
use zapctl_core::{Result, ZapError};

/// How often a job is re-queried, and for how long at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits for as long as the engine takes.
    pub max_wait: Option<Duration>,
}

impl PollPolicy {
    pub fn new(interval_ms: u64, max_wait: Option<Duration>) -> Self {
        PollPolicy { interval: Duration::from_millis(interval_ms), max_wait }
    }
}

/// Wait state of one job against one target.
pub(crate) struct Poller<'a> {
    policy: PollPolicy,
    job: &'static str,
    target: &'a str,
    start: Instant,
}

impl<'a> Poller<'a> {
    pub(crate) fn new(policy: PollPolicy, job: &'static str, target: &'a str) -> Self {
        Poller { policy, job, target, start: Instant::now() }
    }

    /// Sleep one interval, or fail once the bound has been used up.
    pub(crate) async fn pause(&self) -> Result<()> {
        if let Some(max) = self.policy.max_wait {
            if self.start.elapsed() >= max {
                return Err(ZapError::PollTimeout { job: self.job, target: self.target.to_string(), waited: max });
            }
        }
        sleep(self.policy.interval).await;
        Ok(())
    }
}

/// Progress counters are informational; a failed lookup does not stop the job.
pub(crate) fn or_unknown(r: Result<String>) -> String {
    r.unwrap_or_else(|e| {
        debug!("progress lookup failed: {}", e);
        "?".to_string()
    })
}
