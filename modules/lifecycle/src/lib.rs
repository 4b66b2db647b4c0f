//! Starting, probing and releasing the scan engine.

use engine_client::ApiClient;
use tracing::info;
use zapctl_core::{EngineSettings, Result, TeardownMode};

pub mod gate;
pub mod launch;
mod local;

pub use launch::{build_command, EngineProcess, LaunchCommand, OutputSink, Platform};
pub use local::is_local_host;

#[derive(Debug)]
pub struct EngineLifecycle {
    settings: EngineSettings,
    mode: TeardownMode,
    process: Option<EngineProcess>,
}

impl EngineLifecycle {
    /// Decides the teardown mode once: only an engine this process is
    /// configured to launch, on a local interface, is ever shut down.
    pub fn new(settings: EngineSettings) -> Self {
        let mode = TeardownMode::decide(settings.local_launch, is_local_host(&settings.host));
        EngineLifecycle { settings, mode, process: None }
    }

    pub fn mode(&self) -> TeardownMode {
        self.mode
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Launch the engine when it is ours to manage, then wait for its control port.
    /// An engine launched here that never becomes ready is killed.
    pub async fn start(&mut self, platform: Platform, sink: &OutputSink) -> Result<()> {
        match self.mode {
            TeardownMode::ManagedLocal => {
                let cmd = build_command(&self.settings, platform)?;
                self.process = Some(EngineProcess::spawn(&cmd, sink)?);
            }
            TeardownMode::ExternalShared => {
                info!("engine at {}:{} is not launched by this run", self.settings.host, self.settings.port);
            }
        }
        let ready = self.wait_ready().await;
        if ready.is_err() {
            if let Some(mut p) = self.process.take() {
                p.kill();
            }
        }
        ready
    }

    pub async fn wait_ready(&self) -> Result<()> {
        gate::wait_for_port(&self.settings.host, self.settings.port, self.settings.gate_timeout).await
    }

    /// Shut down a managed engine, or reset the session of a shared one.
    pub async fn teardown(&mut self, client: &ApiClient) -> Result<()> {
        match self.mode {
            TeardownMode::ManagedLocal => {
                info!("shutdown engine");
                client.shutdown().await?;
                if let Some(p) = self.process.as_mut() {
                    p.try_reap();
                }
            }
            TeardownMode::ExternalShared => {
                info!("reset engine");
                client.new_session().await?;
            }
        }
        Ok(())
    }

    /// Give up ownership of a launched engine, leaving it running. Returns its pid.
    pub fn detach(self) -> Option<u32> {
        self.process.map(|p| p.id())
    }
}
