use crate::config::BridgeConfig;
use anyhow::{Context, Result};
use hotsearch_core::RealtimeEntry;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// Runs a render worker as a child process and reads its result back from a
/// temporary file. The worker is invoked as `program args.. --url U --output PATH`
/// and must write a JSON array of `{rank, title}` to PATH.
pub struct SubprocessBridge {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, OsString)>,
    timeout: Duration,
    span: Span,
}

impl SubprocessBridge {
    pub fn new<P: AsRef<Path>>(program: P, args: Vec<String>, timeout: Duration) -> Self {
        let program = program.as_ref().to_path_buf();
        let span = info_span!("bridge", program = %program.display());
        Self { program, args, envs: Vec::new(), timeout, span }
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let program = match &config.program {
            Some(p) => p.clone(),
            None => std::env::current_exe().context("locating worker executable")?,
        };
        Ok(Self::new(program, config.args.clone(), config.timeout))
    }

    pub fn with_env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.envs.push((key.to_string(), value.as_ref().to_os_string()));
        self
    }

    /// Any failure (spawn, exit code, timeout, bad payload) yields an empty list.
    pub async fn run(&self, url: &str) -> Vec<RealtimeEntry> {
        match self.run_worker(url).instrument(self.span.clone()).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(parent: &self.span, url, error = %e, "render worker failed");
                Vec::new()
            }
        }
    }

    async fn run_worker(&self, url: &str) -> Result<Vec<RealtimeEntry>> {
        // Removed on drop whichever way this returns.
        let out = tempfile::Builder::new()
            .prefix("hotsearch-render-")
            .suffix(".json")
            .tempfile()
            .context("creating worker output file")?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--url")
            .arg(url)
            .arg("--output")
            .arg(out.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        debug!(url, output = %out.path().display(), "spawning worker");
        let child = cmd.spawn().with_context(|| format!("spawning {}", self.program.display()))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .with_context(|| format!("worker timed out after {:?}", self.timeout))??;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("worker exited with {}: {}", output.status, stderr.trim());
        }

        let raw = std::fs::read_to_string(out.path()).context("reading worker output")?;
        let entries: Vec<RealtimeEntry> = serde_json::from_str(&raw).context("decoding worker output")?;
        if entries.is_empty() {
            anyhow::bail!("worker returned no entries");
        }
        info!(url, count = entries.len(), "worker succeeded");
        Ok(entries)
    }
}
