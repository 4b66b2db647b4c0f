//! Engine launch contract and subprocess handling.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};
use zapctl_core::{EngineSettings, Result, ZapError};

const CMD_LINE_DAEMON: &str = "-daemon";
const CMD_LINE_HOST: &str = "-host";
const CMD_LINE_PORT: &str = "-port";
const CMD_LINE_CONFIG: &str = "-config";
const CMD_LINE_API_KEY: &str = "api.key";

/// OS family of the machine running the engine; picks the launcher script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) { Platform::Windows } else { Platform::Posix }
    }

    pub fn program_name(self) -> &'static str {
        match self {
            Platform::Posix => "zap.sh",
            Platform::Windows => "zap.bat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

/// `<install_dir>/<zap.sh|zap.bat> [-daemon] -host H -port P -config api.key=KEY`, run from the install dir.
pub fn build_command(settings: &EngineSettings, platform: Platform) -> Result<LaunchCommand> {
    let install_dir = settings.install_dir()?;
    info!("engine install dir = {}", install_dir.display());
    info!("engine host = {}", settings.host);
    info!("engine port = {}", settings.port);

    let mut args = Vec::new();
    if !settings.gui {
        args.push(CMD_LINE_DAEMON.to_string());
    }
    args.push(CMD_LINE_HOST.to_string());
    args.push(settings.host.clone());
    args.push(CMD_LINE_PORT.to_string());
    args.push(settings.port.to_string());
    args.push(CMD_LINE_CONFIG.to_string());
    args.push(format!("{}={}", CMD_LINE_API_KEY, settings.api_key));

    Ok(LaunchCommand {
        program: install_dir.join(platform.program_name()),
        args,
        work_dir: install_dir.to_path_buf(),
        env: settings.env.clone(),
    })
}

/// Where the engine's stdout and stderr go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// Forwarded line by line into this process's log. Only valid while this process lives.
    Log,
    /// Appended to a file, so the engine can outlive this process.
    File(PathBuf),
    /// Discarded.
    Null,
}

impl OutputSink {
    fn stdio(&self) -> std::io::Result<(Stdio, Stdio)> {
        match self {
            OutputSink::Log => Ok((Stdio::piped(), Stdio::piped())),
            OutputSink::File(path) => {
                let out = OpenOptions::new().create(true).append(true).open(path)?;
                let err = out.try_clone()?;
                Ok((Stdio::from(out), Stdio::from(err)))
            }
            OutputSink::Null => Ok((Stdio::null(), Stdio::null())),
        }
    }
}

/// A running engine started by this process. Dropping it leaves the process running.
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
}

impl EngineProcess {
    /// Start the engine with its stdout and stderr sent to `sink`.
    pub fn spawn(cmd: &LaunchCommand, sink: &OutputSink) -> Result<Self> {
        info!("start engine [{}]", cmd.program.display());
        let (stdout, stderr) = sink.stdio().map_err(|e| {
            ZapError::Io(std::io::Error::new(e.kind(), format!("cannot open engine output {:?}: {}", sink, e)))
        })?;
        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .current_dir(&cmd.work_dir)
            .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        let mut child = command.spawn().map_err(|e| {
            ZapError::Io(std::io::Error::new(e.kind(), format!("failed to spawn {}: {}", cmd.program.display(), e)))
        })?;
        if let Some(out) = child.stdout.take() {
            forward_lines(out, "stdout");
        }
        if let Some(err) = child.stderr.take() {
            forward_lines(err, "stderr");
        }
        debug!("engine pid {}", child.id());
        Ok(EngineProcess { child })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Kill the process and wait for it to exit.
    pub fn kill(&mut self) {
        let pid = self.child.id();
        if let Err(e) = self.child.kill() {
            warn!("cannot kill engine pid {}: {}", pid, e);
        }
        match self.child.wait() {
            Ok(status) => info!("engine pid {} killed ({})", pid, status),
            Err(e) => warn!("cannot wait for engine pid {}: {}", pid, e),
        }
    }

    /// Collect the exit status if the process has already ended.
    pub fn try_reap(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => info!("engine exited with {}", status),
            Ok(None) => debug!("engine pid {} still stopping", self.child.id()),
            Err(e) => warn!("cannot query engine pid {}: {}", self.child.id(), e),
        }
    }
}

fn forward_lines<R: Read + Send + 'static>(stream: R, stream_name: &'static str) {
    std::thread::spawn(move || {
        for line in BufReader::new(stream).lines().map_while(|l| l.ok()) {
            info!(target: "engine", "[{}] {}", stream_name, line);
        }
    });
}
