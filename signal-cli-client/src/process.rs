use crate::{MessageTarget, ReceiveStream, SignalCli, SignalCliError};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines},
    process::{Child, ChildStdout, Command},
    sync::Mutex,
};
use tracing::{debug, info, warn};

/// [`SignalCli`] implementation that spawns the `signal-cli` binary.
///
/// One-shot invocations (send, listIdentities, trust) are serialized by a mutex,
/// so concurrent relay directions never interleave on the account's data store.
/// Receive sessions are long-running and are not serialized.
pub struct SignalCliProcess {
    program: PathBuf,
    account: String,
    invoke_lock: Mutex<()>,
}

impl SignalCliProcess {
    /// Create an adapter for `account`, using the binary at `program`.
    pub fn new(program: impl Into<PathBuf>, account: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            account: account.into(),
            invoke_lock: Mutex::new(()),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-u").arg(&self.account);
        cmd
    }

    /// Run a one-shot subcommand and return its stdout.
    async fn invoke(&self, args: &[&str]) -> Result<String, SignalCliError> {
        let _guard = self.invoke_lock.lock().await;

        let output = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stdout.trim().is_empty() {
            debug!("signal-cli stdout: {}", stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            warn!("signal-cli stderr: {}", stderr.trim_end());
        }

        if output.status.success() {
            Ok(stdout)
        } else {
            Err(SignalCliError::ExitStatus {
                code: output.status.code(),
                stderr,
            })
        }
    }
}

#[async_trait]
impl SignalCli for SignalCliProcess {
    async fn send(&self, message: &str, target: &MessageTarget) -> Result<(), SignalCliError> {
        let mut args = vec!["send", "-m", message];
        args.extend(target.cli_args());
        self.invoke(&args).await?;
        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> Result<ReceiveStream, SignalCliError> {
        let timeout_secs = timeout.as_secs().max(1).to_string();
        let mut child = self
            .command()
            .args(["receive", "--json", "-t", timeout_secs.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("signal-cli stdout was not captured"))?;

        let session = ReceiveSession {
            child,
            lines: BufReader::new(stdout).lines(),
        };

        Ok(stream::unfold(Some(session), |state| async move {
            let mut session = state?;
            let item = session.next_line().await?;
            Some((item, Some(session)))
        })
        .boxed())
    }

    async fn list_identities(&self) -> Result<Vec<String>, SignalCliError> {
        let stdout = self.invoke(&["listIdentities"]).await?;
        Ok(stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect())
    }

    async fn trust_identity(
        &self,
        number: &str,
        safety_number: &str,
    ) -> Result<(), SignalCliError> {
        info!("Trusting identity {number}");
        self.invoke(&["trust", "-v", safety_number, number]).await?;
        Ok(())
    }
}

/// A running `signal-cli receive` process. The process is killed when the session is dropped.
struct ReceiveSession {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl ReceiveSession {
    async fn next_line(&mut self) -> Option<std::io::Result<String>> {
        match self.lines.next_line().await {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.finish().await;
                None
            }
            Err(err) => Some(Err(err)),
        }
    }

    /// Drain stderr and reap the process after stdout closes.
    async fn finish(&mut self) {
        if let Some(mut stderr) = self.child.stderr.take() {
            let mut text = String::new();
            if let Err(err) = stderr.read_to_string(&mut text).await {
                warn!("Could not read signal-cli stderr: {err}");
            }
            for line in text.lines().filter(|line| !line.trim().is_empty()) {
                warn!("STDERR: {line}");
            }
        }

        match self.child.wait().await {
            Ok(status) if !status.success() => {
                warn!("Something went wrong with signal-cli receive ({status})");
            }
            Ok(_) => {}
            Err(err) => warn!("Could not reap signal-cli: {err}"),
        }
    }
}

impl Drop for ReceiveSession {
    fn drop(&mut self) {
        debug!("Killing signal-cli");
        if let Err(err) = self.child.start_kill() {
            debug!("signal-cli was already gone: {err}");
        }
    }
}
