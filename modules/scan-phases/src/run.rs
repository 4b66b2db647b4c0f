//! One complete scan run, from readiness probe to teardown.

use engine_client::ApiClient;
use lifecycle::{EngineLifecycle, OutputSink, Platform};
use std::error::Error as _;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use zapctl_core::{Result, ScanConfig, ScanIdentity, ZapError};

use crate::active_scan::run_active_scan;
use crate::authentication::configure_authentication;
use crate::context::setup_context;
use crate::poll::PollPolicy;
use crate::report::save_report;
use crate::spider::{run_ajax_spider, run_spider};
use crate::targets::resolve_targets;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub targets: Vec<String>,
    pub context_id: String,
    pub user_id: Option<String>,
    pub reports: Vec<PathBuf>,
    pub total_alerts: String,
    pub total_messages: String,
}

/// How the engine is brought up before the phases run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// Launch when managed locally, logging the engine's output, then wait for the control port.
    Launch(Platform),
    /// Started earlier; only wait for the control port.
    AlreadyRunning,
}

/// Bring the engine up, then [`execute`]. A failed start ends the run without teardown.
pub async fn run(lifecycle: &mut EngineLifecycle, startup: Startup, config: &ScanConfig, work_dir: &Path) -> Result<RunSummary> {
    match startup {
        Startup::Launch(platform) => lifecycle.start(platform, &OutputSink::Log).await,
        Startup::AlreadyRunning => lifecycle.wait_ready().await,
    }
    .map_err(|e| {
        error!("{}", cause_trace(&e));
        e
    })?;
    execute(lifecycle, config, work_dir).await
}

/// Run every enabled phase, then always tear the engine down. A teardown
/// failure is logged and only reported when the phases themselves succeeded.
pub async fn execute(lifecycle: &mut EngineLifecycle, config: &ScanConfig, work_dir: &Path) -> Result<RunSummary> {
    let client = ApiClient::from_settings(lifecycle.settings())?;

    let outcome = run_phases(&client, config, work_dir).await;
    if let Err(e) = &outcome {
        error!("{}", cause_trace(e));
    }

    let teardown = lifecycle.teardown(&client).await;
    match (outcome, teardown) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(t)) => {
            error!("teardown failed: {}", cause_trace(&t));
            Err(t)
        }
        (Err(e), Err(t)) => {
            error!("teardown failed: {}", cause_trace(&t));
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
    }
}

async fn run_phases(client: &ApiClient, config: &ScanConfig, work_dir: &Path) -> Result<RunSummary> {
    let targets = resolve_targets(client, config).await?;
    let context = setup_context(client, &targets, config).await?;

    let mut user_id = None;
    let identity = if config.authentication {
        let user = configure_authentication(client, &context, config).await?;
        user_id = Some(user.id.clone());
        if config.scans_as_user() {
            ScanIdentity::AsUser { context_id: user.context_id, user_id: user.id }
        } else {
            ScanIdentity::Anonymous
        }
    } else {
        ScanIdentity::Anonymous
    };

    let max_wait = config.max_job_wait();
    if config.spider {
        run_spider(client, &targets, &identity, PollPolicy::new(config.spider_poll_ms, max_wait)).await?;
    }
    if config.ajax_spider {
        run_ajax_spider(client, &targets, config, PollPolicy::new(config.ajax_spider_poll_ms, max_wait)).await?;
    }
    if config.active_scan {
        let policy = PollPolicy::new(config.active_scan_poll_ms, max_wait);
        run_active_scan(client, &targets, &identity, &config.scan_policy, policy).await?;
    } else {
        info!("skip active scan of {} target(s)", targets.len());
    }

    let mut reports = Vec::with_capacity(config.report_formats.len());
    for format in &config.report_formats {
        reports.push(save_report(client, *format, work_dir).await?);
    }

    let total_alerts = client.number_of_alerts().await?;
    let total_messages = client.number_of_messages().await?;
    info!("total alerts = {}", total_alerts);
    info!("total messages = {}", total_messages);

    Ok(RunSummary { targets, context_id: context.id, user_id, reports, total_alerts, total_messages })
}

/// The error and each of its sources, one per line.
pub fn cause_trace(e: &ZapError) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&s.to_string());
        source = s.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};
    use zapctl_core::{AuthenticationStep, EngineSettings};

    async fn json_at(server: &MockServer, p: &str, body: Value) {
        Mock::given(path(p)).respond_with(ResponseTemplate::new(200).set_body_json(body)).mount(server).await;
    }

    async fn engine() -> MockServer {
        let server = MockServer::start().await;
        json_at(&server, "/JSON/context/action/newContext/", json!({"contextId": "1"})).await;
        for p in [
            "/JSON/context/action/includeInContext/",
            "/JSON/context/action/excludeFromContext/",
            "/JSON/authentication/action/setAuthenticationMethod/",
            "/JSON/authentication/action/setLoggedInIndicator/",
            "/JSON/authentication/action/setLoggedOutIndicator/",
            "/JSON/users/action/setUserEnabled/",
            "/JSON/users/action/setAuthenticationCredentials/",
            "/JSON/core/action/shutdown/",
            "/JSON/core/action/newSession/",
        ] {
            json_at(&server, p, json!({"Result": "OK"})).await;
        }
        json_at(&server, "/JSON/users/action/newUser/", json!({"userId": "0"})).await;
        json_at(&server, "/JSON/spider/action/scan/", json!({"scan": "0"})).await;
        json_at(&server, "/JSON/spider/action/scanAsUser/", json!({"scanAsUser": "0"})).await;
        json_at(&server, "/JSON/spider/view/scans/", json!({"scans": [{"id": "0", "progress": "100", "state": "FINISHED"}]})).await;
        json_at(&server, "/JSON/ascan/action/scan/", json!({"scan": "0"})).await;
        json_at(&server, "/JSON/ascan/action/scanAsUser/", json!({"scanAsUser": "0"})).await;
        json_at(&server, "/JSON/ascan/view/scans/", json!({"scans": [{"id": "0", "progress": "100", "state": "FINISHED"}]})).await;
        json_at(&server, "/JSON/core/view/numberOfAlerts/", json!({"numberOfAlerts": "2"})).await;
        json_at(&server, "/JSON/core/view/numberOfMessages/", json!({"numberOfMessages": "9"})).await;
        Mock::given(path("/OTHER/core/other/htmlreport/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html/>"))
            .mount(&server)
            .await;
        server
    }

    /// Engine-managed lifecycle pointing at the mock server (127.0.0.1, so shutdown applies).
    fn lifecycle_for(server: &MockServer) -> EngineLifecycle {
        let addr = server.address();
        let mut s = EngineSettings::new(addr.ip().to_string(), i64::from(addr.port())).unwrap();
        s.local_launch = true;
        s.gate_timeout = Duration::from_secs(2);
        EngineLifecycle::new(s)
    }

    fn count(reqs: &[Request], p: &str) -> usize {
        reqs.iter().filter(|r| r.url.path() == p).count()
    }

    fn query(r: &Request, key: &str) -> Option<String> {
        r.url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
    }

    #[tokio::test]
    async fn anonymous_spider_run() {
        let server = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let mut lc = lifecycle_for(&server);
        let config = ScanConfig {
            target_urls: Some("http://a.test;http://b.test".into()),
            spider: true,
            spider_poll_ms: 5,
            ..Default::default()
        };

        let summary = run(&mut lc, Startup::AlreadyRunning, &config, dir.path()).await.unwrap();
        assert_eq!(summary.targets, vec!["http://a.test", "http://b.test"]);
        assert_eq!(summary.user_id, None);
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.total_alerts, "2");

        let reqs = server.received_requests().await.unwrap();
        let includes: Vec<String> = reqs
            .iter()
            .filter(|r| r.url.path() == "/JSON/context/action/includeInContext/")
            .filter_map(|r| query(r, "regex"))
            .collect();
        assert_eq!(includes, vec!["\\Qhttp://a.test\\E.*", "\\Qhttp://b.test\\E.*"]);
        assert_eq!(count(&reqs, "/JSON/context/action/excludeFromContext/"), 0);
        assert_eq!(count(&reqs, "/JSON/users/action/newUser/"), 0);
        assert_eq!(count(&reqs, "/JSON/spider/action/scan/"), 2);
        assert_eq!(count(&reqs, "/JSON/spider/action/scanAsUser/"), 0);
        assert_eq!(count(&reqs, "/JSON/ascan/action/scan/"), 0);
        assert_eq!(count(&reqs, "/OTHER/core/other/htmlreport/"), 1);
        assert_eq!(count(&reqs, "/JSON/core/action/shutdown/"), 1);
        assert_eq!(reqs.last().unwrap().url.path(), "/JSON/core/action/shutdown/");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn authenticated_run_provisions_user_first() {
        let server = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let mut lc = lifecycle_for(&server);
        let config = ScanConfig {
            target_urls: Some("http://a.test".into()),
            spider: true,
            active_scan: true,
            authentication: true,
            authentication_steps: vec![AuthenticationStep {
                method: "POST".into(),
                url: "/login".into(),
                post_data: "user=%s&pass=%s".into(),
                ..Default::default()
            }],
            logged_in_indicator: Some("Welcome".into()),
            spider_poll_ms: 5,
            active_scan_poll_ms: 5,
            ..Default::default()
        };

        let summary = execute(&mut lc, &config, dir.path()).await.unwrap();
        assert_eq!(summary.user_id.as_deref(), Some("0"));

        let reqs = server.received_requests().await.unwrap();
        let auth = reqs
            .iter()
            .find(|r| r.url.path() == "/JSON/authentication/action/setAuthenticationMethod/")
            .unwrap();
        let params = query(auth, "authMethodConfigParams").unwrap();
        let steps_json = url::form_urlencoded::parse(params.as_bytes())
            .find(|(k, _)| k == "AuthenticationSteps")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let steps: Value = serde_json::from_str(&steps_json).unwrap();
        let steps = steps.as_array().unwrap();
        assert_eq!(steps.len(), 1);
        let step = steps[0].as_object().unwrap();
        assert_eq!(step["method"], "POST");
        assert_eq!(step["url"], "/login");
        assert_eq!(step["postData"], "user=%s&pass=%s");
        assert!(!step.contains_key("parameters"));
        assert!(!step.contains_key("additionalHeaders"));
        assert!(!step.contains_key("additionalCookies"));

        let indicator = reqs
            .iter()
            .find(|r| r.url.path() == "/JSON/authentication/action/setLoggedInIndicator/")
            .unwrap();
        assert_eq!(query(indicator, "loggedInIndicatorRegex").as_deref(), Some("\\QWelcome\\E.*"));

        assert_eq!(count(&reqs, "/JSON/users/action/newUser/"), 1);
        let user_created = reqs.iter().position(|r| r.url.path() == "/JSON/users/action/newUser/").unwrap();
        let first_as_user = reqs.iter().position(|r| r.url.path().ends_with("/scanAsUser/")).unwrap();
        assert!(user_created < first_as_user);
        assert_eq!(count(&reqs, "/JSON/spider/action/scan/"), 0);
        assert_eq!(count(&reqs, "/JSON/ascan/action/scanAsUser/"), 1);

        let last_spider = reqs.iter().rposition(|r| r.url.path().starts_with("/JSON/spider/")).unwrap();
        let first_ascan = reqs.iter().position(|r| r.url.path().starts_with("/JSON/ascan/")).unwrap();
        assert!(last_spider < first_ascan);
    }

    #[tokio::test]
    async fn auth_without_steps_scans_anonymously() {
        let server = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let mut lc = lifecycle_for(&server);
        let config = ScanConfig {
            target_urls: Some("http://a.test".into()),
            spider: true,
            authentication: true,
            spider_poll_ms: 5,
            ..Default::default()
        };

        execute(&mut lc, &config, dir.path()).await.unwrap();
        let reqs = server.received_requests().await.unwrap();
        assert_eq!(count(&reqs, "/JSON/users/action/newUser/"), 1);
        assert_eq!(count(&reqs, "/JSON/spider/action/scan/"), 1);
        assert_eq!(count(&reqs, "/JSON/spider/action/scanAsUser/"), 0);
    }

    #[tokio::test]
    async fn phase_failure_still_tears_down() {
        let server = MockServer::start().await;
        Mock::given(path("/JSON/context/action/newContext/"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"code": "internal_error", "message": "boom"})))
            .mount(&server)
            .await;
        Mock::given(path("/JSON/core/action/shutdown/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut lc = lifecycle_for(&server);
        let config = ScanConfig { target_urls: Some("http://a.test".into()), spider: true, ..Default::default() };
        let err = execute(&mut lc, &config, dir.path()).await.unwrap_err();
        match err {
            ZapError::RemoteApi { operation, .. } => assert_eq!(operation, "context/action/newContext"),
            other => panic!("teardown error masked the phase error: {:?}", other),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn teardown_failure_fails_successful_run() {
        let server = MockServer::start().await;
        json_at(&server, "/JSON/core/view/sites/", json!({"sites": []})).await;
        json_at(&server, "/JSON/context/action/newContext/", json!({"contextId": "1"})).await;
        json_at(&server, "/JSON/core/view/numberOfAlerts/", json!({"numberOfAlerts": "0"})).await;
        json_at(&server, "/JSON/core/view/numberOfMessages/", json!({"numberOfMessages": "0"})).await;
        Mock::given(path("/OTHER/core/other/htmlreport/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html/>"))
            .mount(&server)
            .await;
        Mock::given(path("/JSON/core/action/shutdown/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"code": "bad_action", "message": "nope"})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut lc = lifecycle_for(&server);
        let err = execute(&mut lc, &ScanConfig { spider: true, ..Default::default() }, dir.path()).await.unwrap_err();
        match err {
            ZapError::RemoteApi { operation, .. } => assert_eq!(operation, "core/action/shutdown"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_engine_aborts_before_api_calls() {
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let mut s = EngineSettings::new("127.0.0.1", i64::from(port)).unwrap();
        s.gate_timeout = Duration::from_secs(1);
        let mut lc = EngineLifecycle::new(s);
        let dir = tempfile::tempdir().unwrap();
        let err = run(&mut lc, Startup::AlreadyRunning, &ScanConfig::default(), dir.path()).await.unwrap_err();
        assert!(matches!(err, ZapError::ConnectionTimeout { .. }));
    }

    #[test]
    fn cause_trace_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e = ZapError::Io(io);
        assert!(cause_trace(&e).starts_with("denied"));
    }
}
