//! Readiness probe for the engine's control port.

use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info};
use zapctl_core::{Result, ZapError};

pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Block until `host:port` accepts a TCP connection, for at most `max_wait`.
pub async fn wait_for_port(host: &str, port: u16, max_wait: Duration) -> Result<()> {
    wait_for_port_every(host, port, max_wait, RETRY_INTERVAL).await
}

/// As [`wait_for_port`] with a custom retry interval.
///
/// A connect attempt that times out is terminal. Refused or otherwise failed
/// attempts are retried after `interval` until `max_wait` has elapsed; each
/// attempt only gets the budget that remains.
pub async fn wait_for_port_every(host: &str, port: u16, max_wait: Duration, interval: Duration) -> Result<()> {
    let start = Instant::now();
    let mut remaining = max_wait;
    let timed_out = || ZapError::ConnectionTimeout { host: host.to_string(), port, waited: max_wait };
    loop {
        match timeout(remaining, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => {
                info!("engine is accepting connections on {}:{}", host, port);
                return Ok(());
            }
            Err(_) => {
                error!("connect to {}:{} timed out", host, port);
                return Err(timed_out());
            }
            Ok(Err(e)) => {
                debug!("engine not ready on {}:{}: {}", host, port, e);
                sleep(interval).await;
                let elapsed = start.elapsed();
                if elapsed >= max_wait {
                    error!("engine not ready on {}:{} after {:?}: {}", host, port, elapsed, e);
                    return Err(timed_out());
                }
                remaining = max_wait - elapsed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_port() -> u16 {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn succeeds_when_listening() {
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = l.local_addr().unwrap().port();
        wait_for_port("127.0.0.1", port, Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn refused_port_times_out_within_budget() {
        let port = closed_port();
        let start = Instant::now();
        let err = wait_for_port("127.0.0.1", port, Duration::from_secs(2)).await.unwrap_err();
        let elapsed = start.elapsed();
        assert!(matches!(err, ZapError::ConnectionTimeout { .. }));
        assert!(elapsed >= Duration::from_secs(2), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(3_500), "{:?}", elapsed);
    }

    #[tokio::test]
    async fn connect_timeout_fails_without_retry() {
        // Zero budget: the pending connect loses to the deadline on the first poll.
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = l.local_addr().unwrap().port();
        let start = Instant::now();
        let err = wait_for_port_every("127.0.0.1", port, Duration::ZERO, Duration::from_secs(1)).await.unwrap_err();
        let elapsed = start.elapsed();
        match err {
            ZapError::ConnectionTimeout { port: p, waited, .. } => {
                assert_eq!(p, port);
                assert_eq!(waited, Duration::ZERO);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(elapsed < Duration::from_millis(500), "{:?}", elapsed);
    }

    #[tokio::test]
    async fn connects_once_listener_appears() {
        let port = closed_port();
        let opener = tokio::spawn(async move {
            sleep(Duration::from_millis(300)).await;
            let l = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            sleep(Duration::from_secs(2)).await;
            drop(l);
        });
        wait_for_port_every("127.0.0.1", port, Duration::from_secs(3), Duration::from_millis(100)).await.unwrap();
        opener.abort();
    }
}
