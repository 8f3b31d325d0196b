// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal platform adapter for the Nexus bridge engine.
//!
//! Every send shells out to `signal-cli` under a hard timeout. The CLI is
//! slow to start and occasionally hangs on network trouble, so timeouts are
//! reported as transient failures and never move a bridge into `error`.

pub mod normalize;

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nexus_config::model::PlatformsConfig;
use nexus_core::{
    ConnectionTest, Credentials, MessageType, NexusError, ParsedWebhook, Platform,
    PlatformAdapter, PlatformMessageId, PluginAdapter,
};
use tokio::process::Command;
use tracing::{debug, warn};

const MAX_FAILURE_SUMMARY_CHARS: usize = 240;
const TEXT_FILE_BUSY_ERRNO: i32 = 26;
const MAX_TEXT_FILE_BUSY_RETRIES: u32 = 5;

/// stderr fragments that mean the account itself is unusable.
const AUTH_MARKERS: &[&str] = &[
    "not registered",
    "unregistered",
    "authorization failed",
    "authorizationfailed",
    "unauthorized",
];

/// Signal adapter for one registered phone number.
#[derive(Debug, Clone)]
pub struct SignalAdapter {
    cli_path: String,
    phone_number: String,
    timeout: Duration,
}

impl SignalAdapter {
    pub fn new(credentials: &Credentials, config: &PlatformsConfig) -> Result<Self, NexusError> {
        let phone_number = credentials.require("phone_number")?.trim().to_string();
        if phone_number.is_empty() {
            return Err(NexusError::Config("phone_number must not be empty".into()));
        }
        let cli_path = credentials
            .get("signal_cli_path")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&config.signal_cli_path)
            .to_string();
        Ok(Self {
            cli_path,
            phone_number,
            timeout: Duration::from_secs(config.signal_timeout_secs),
        })
    }

    /// Overrides the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs `signal-cli --account {phone} {args..}` and returns its stdout.
    async fn run(&self, args: &[&str]) -> Result<String, NexusError> {
        let mut command = Command::new(&self.cli_path);
        command.kill_on_drop(true);
        command.arg("--account").arg(&self.phone_number);
        command.args(args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let child = spawn_with_retry(&mut command, &self.cli_path).await?;
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!(account = %self.phone_number, timeout = ?self.timeout, "signal-cli timed out");
                NexusError::transient(format!(
                    "signal-cli timed out after {}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| NexusError::Transient {
                message: "signal-cli process failed".into(),
                source: Some(Box::new(e)),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        let status = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let summary = summarize_process_failure(&stderr, &stdout);
        Err(classify_failure(&status, &summary))
    }
}

async fn spawn_with_retry(
    command: &mut Command,
    executable: &str,
) -> Result<tokio::process::Child, NexusError> {
    for attempt in 0..=MAX_TEXT_FILE_BUSY_RETRIES {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(e)
                if e.raw_os_error() == Some(TEXT_FILE_BUSY_ERRNO)
                    && attempt < MAX_TEXT_FILE_BUSY_RETRIES =>
            {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            Err(e) => {
                return Err(NexusError::Transient {
                    message: format!("failed to spawn signal-cli '{executable}'"),
                    source: Some(Box::new(e)),
                });
            }
        }
    }
    Err(NexusError::transient(format!(
        "failed to spawn signal-cli '{executable}'"
    )))
}

/// Maps a failed CLI run to the error taxonomy.
pub fn classify_failure(status: &str, summary: &str) -> NexusError {
    let lowered = summary.to_lowercase();
    if AUTH_MARKERS.iter().any(|m| lowered.contains(m)) {
        NexusError::auth(Platform::Signal, summary.to_string())
    } else {
        NexusError::permanent(format!("signal-cli exited with status {status}: {summary}"))
    }
}

fn summarize_process_failure(stderr: &str, stdout: &str) -> String {
    let source = if stderr.trim().is_empty() { stdout } else { stderr };
    let collapsed = source.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "no output".to_string();
    }
    if collapsed.chars().count() <= MAX_FAILURE_SUMMARY_CHARS {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(MAX_FAILURE_SUMMARY_CHARS).collect();
    format!("{truncated}...")
}

/// signal-cli prints the sent message's timestamp, which doubles as its id.
fn message_id_from_stdout(stdout: &str) -> PlatformMessageId {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()))
        .map(|ts| PlatformMessageId(ts.to_string()))
        .unwrap_or_else(|| PlatformMessageId(uuid::Uuid::new_v4().to_string()))
}

#[async_trait]
impl PluginAdapter for SignalAdapter {
    fn name(&self) -> &str {
        "signal"
    }

    async fn shutdown(&self) -> Result<(), NexusError> {
        debug!(account = %self.phone_number, "signal adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for SignalAdapter {
    fn platform(&self) -> Platform {
        Platform::Signal
    }

    async fn send_message(
        &self,
        recipient: &str,
        content: &str,
        _message_type: MessageType,
    ) -> Result<PlatformMessageId, NexusError> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(NexusError::permanent("recipient is empty"));
        }
        // signal-cli would read a leading dash as an option.
        if recipient.starts_with('-') {
            return Err(NexusError::permanent(format!(
                "invalid signal recipient `{recipient}`"
            )));
        }
        let message = format!("--message={content}");
        let stdout = self.run(&["send", &message, recipient]).await?;
        Ok(message_id_from_stdout(&stdout))
    }

    fn parse_webhook(&self, payload: &serde_json::Value) -> Result<ParsedWebhook, NexusError> {
        normalize::parse_envelopes(payload)
    }

    async fn test_connection(&self) -> ConnectionTest {
        match self.run(&["listIdentities"]).await {
            Ok(_) => ConnectionTest::ok(format!(
                "signal-cli account {} is usable",
                self.phone_number
            )),
            Err(e) => ConnectionTest::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let script = dir.join("mock-signal-cli.sh");
        let content = format!("#!/bin/sh\nset -eu\n{body}\n");
        std::fs::write(&script, content).expect("write script");
        let mut perms = std::fs::metadata(&script)
            .expect("script metadata")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod script");
        script
    }

    fn adapter(cli: &Path) -> SignalAdapter {
        let creds = Credentials::new()
            .with("phone_number", "+15550009999")
            .with("signal_cli_path", cli.display().to_string());
        SignalAdapter::new(&creds, &PlatformsConfig::default()).expect("build adapter")
    }

    #[test]
    fn cli_path_falls_back_to_config() {
        let creds = Credentials::new().with("phone_number", "+15550009999");
        let config = PlatformsConfig {
            signal_cli_path: "/opt/signal-cli/bin/signal-cli".into(),
            ..PlatformsConfig::default()
        };
        let adapter = SignalAdapter::new(&creds, &config).unwrap();
        assert_eq!(adapter.cli_path, "/opt/signal-cli/bin/signal-cli");
        assert_eq!(adapter.timeout, Duration::from_secs(10));
    }

    #[test]
    fn missing_phone_number_is_config_error() {
        let err = SignalAdapter::new(&Credentials::new(), &PlatformsConfig::default()).unwrap_err();
        assert!(matches!(err, NexusError::Config(_)));
    }

    #[test]
    fn failure_classification() {
        assert!(matches!(
            classify_failure("1", "User +1555 is not registered."),
            NexusError::Auth { platform: Platform::Signal, .. }
        ));
        assert!(matches!(
            classify_failure("1", "Invalid number: abc"),
            NexusError::Permanent { .. }
        ));
    }

    #[test]
    fn message_id_is_last_numeric_line() {
        assert_eq!(
            message_id_from_stdout("warning: something\n1767225600123\n"),
            PlatformMessageId("1767225600123".into())
        );
        let generated = message_id_from_stdout("");
        assert_eq!(generated.0.len(), 36);
    }

    #[test]
    fn long_failure_output_is_truncated() {
        let summary = summarize_process_failure(&"x ".repeat(400), "");
        assert!(summary.ends_with("..."));
        assert_eq!(summarize_process_failure("", ""), "no output");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn send_passes_account_message_and_recipient() {
        let dir = tempdir().expect("tempdir");
        let log = dir.path().join("args.log");
        let script = write_script(
            dir.path(),
            &format!("printf '%s\\n' \"$@\" > '{}'\necho 1767225600123", log.display()),
        );
        let id = adapter(&script)
            .send_message("+15551230000", "hi there", MessageType::Text)
            .await
            .expect("send succeeds");
        assert_eq!(id, PlatformMessageId("1767225600123".into()));

        let args = std::fs::read_to_string(&log).expect("args log");
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(
            args,
            ["--account", "+15550009999", "send", "--message=hi there", "+15551230000"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dash_prefixed_body_stays_the_message_value() {
        let dir = tempdir().expect("tempdir");
        let log = dir.path().join("args.log");
        let script = write_script(
            dir.path(),
            &format!("printf '%s\\n' \"$@\" > '{}'\necho 1", log.display()),
        );
        adapter(&script)
            .send_message("+15551230000", "-v --help", MessageType::Text)
            .await
            .expect("send succeeds");

        let args = std::fs::read_to_string(&log).expect("args log");
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(args[2..], ["send", "--message=-v --help", "+15551230000"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dash_prefixed_recipient_is_rejected_without_spawning() {
        let dir = tempdir().expect("tempdir");
        let marker = dir.path().join("ran");
        let script = write_script(dir.path(), &format!("touch '{}'", marker.display()));
        let err = adapter(&script)
            .send_message("--config=/tmp/x", "hello", MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::Permanent { .. }));
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_is_transient() {
        let dir = tempdir().expect("tempdir");
        let script = write_script(dir.path(), "sleep 2\necho 1");
        let adapter = adapter(&script).with_timeout(Duration::from_millis(100));
        let err = adapter
            .send_message("+15551230000", "hello", MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::Transient { .. }), "got {err:?}");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unregistered_account_is_auth_error() {
        let dir = tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "echo 'User +15550009999 is not registered.' >&2\nexit 1",
        );
        let err = adapter(&script)
            .send_message("+15551230000", "hello", MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::Auth { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn other_nonzero_exit_is_permanent() {
        let dir = tempdir().expect("tempdir");
        let script = write_script(dir.path(), "echo 'Invalid number' >&2\nexit 3");
        let err = adapter(&script)
            .send_message("not-a-number", "hello", MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::Permanent { .. }));
        assert!(err.to_string().contains("status 3"));
    }

    #[tokio::test]
    async fn missing_binary_is_transient() {
        let adapter = adapter(Path::new("/nonexistent/signal-cli"));
        let err = adapter
            .send_message("+15551230000", "hello", MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::Transient { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connection_runs_list_identities() {
        let dir = tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "for a in \"$@\"; do [ \"$a\" = listIdentities ] && exit 0; done\nexit 9",
        );
        let result = adapter(&script).test_connection().await;
        assert!(result.ok, "{}", result.diagnostic);

        let failing = write_script(dir.path(), "echo 'Authorization failed' >&2\nexit 1");
        let result = adapter(&failing).test_connection().await;
        assert!(!result.ok);
        assert!(result.diagnostic.contains("rejected credentials"));
    }
}
