// # Helper Packet Sender
//
// This crate provides a [`PacketSender`] that shells out to the `wakeonlan`
// helper program, one process per packet.
//
// ## Invocation
//
// ```text
// wakeonlan AA:BB:CC:DD:EE:FF                 # broadcast on the local segment
// wakeonlan -i 10.0.0.5 AA:BB:CC:DD:EE:FF     # directed send
// ```
//
// ## Confirmation
//
// The helper's exit status is not trusted. A packet counts as sent only when
// the helper's standard output contains the confirmation phrase
// ("magic packet"). Anything else is logged with the helper's stderr.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tracing::{debug, error};
use wol_core::config::WakeConfig;
use wol_core::{Error, PacketSender};

/// Helper program looked up on `PATH`
pub const DEFAULT_HELPER: &str = "wakeonlan";

/// Phrase the helper prints when a packet went out
pub const CONFIRMATION_PHRASE: &str = "magic packet";

/// Captured result of one helper run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperOutput {
    /// Exit code, `None` if the helper was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a program to completion and captures its output
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<HelperOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<HelperOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(HelperOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Packet sender that runs the external helper
pub struct HelperPacketSender<R = TokioProcessRunner> {
    /// Helper program name or path
    program: String,

    /// Phrase expected on stdout
    confirmation: String,

    runner: R,
}

impl HelperPacketSender {
    /// Create a sender for `program` with the default confirmation phrase
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_runner(program, CONFIRMATION_PHRASE, TokioProcessRunner)
    }

    /// Create a sender from the wake configuration
    pub fn from_config(config: &WakeConfig) -> Self {
        Self::with_runner(
            config.helper.clone(),
            config.confirmation_phrase.clone(),
            TokioProcessRunner,
        )
    }
}

impl Default for HelperPacketSender {
    fn default() -> Self {
        Self::new(DEFAULT_HELPER)
    }
}

impl<R: ProcessRunner> HelperPacketSender<R> {
    /// Create a sender with a custom process runner
    pub fn with_runner(
        program: impl Into<String>,
        confirmation: impl Into<String>,
        runner: R,
    ) -> Self {
        Self {
            program: program.into(),
            confirmation: confirmation.into(),
            runner,
        }
    }
}

/// Command-line arguments for one send
pub fn helper_args(mac: &str, ip: Option<&str>) -> Vec<String> {
    match ip {
        Some(ip) => vec!["-i".to_string(), ip.to_string(), mac.to_string()],
        None => vec![mac.to_string()],
    }
}

/// Whether the helper reported a packet on stdout
pub fn is_confirmed(output: &HelperOutput, phrase: &str) -> bool {
    output.stdout.contains(phrase)
}

#[async_trait]
impl<R: ProcessRunner> PacketSender for HelperPacketSender<R> {
    async fn send(&self, mac: &str, ip: Option<&str>) -> bool {
        let args = helper_args(mac, ip);
        debug!("Running {} {}", self.program, args.join(" "));

        match self.runner.run(&self.program, &args).await {
            Ok(output) if is_confirmed(&output, &self.confirmation) => true,
            Ok(output) => {
                error!("Error sending WoL packet: '{}'", output.stderr.trim());
                debug!(
                    "{} exited with {:?}, stdout: '{}'",
                    self.program,
                    output.status,
                    output.stdout.trim()
                );
                false
            }
            Err(e) => {
                let err = Error::sender(format!("failed to run {}: {}", self.program, e));
                error!("Error sending WoL packet: '{}'", err);
                false
            }
        }
    }

    fn sender_name(&self) -> &str {
        &self.program
    }
}
