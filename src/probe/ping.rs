//! Ping probe implementation using the platform `ping` command.
//!
//! Sends exactly one echo request and classifies the command's exit status
//! and output text. No packets are built here; the system binary does that.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

use super::{CheckOutput, Classification, ProbeError, Reachability};

/// Reachability check backed by the system `ping` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPing;

impl Reachability for SystemPing {
    async fn check(&self, target: &str, timeout: Duration) -> Result<CheckOutput, ProbeError> {
        let mut command = Command::new("ping");
        command
            .args(ping_args(target, timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let output = command.output().await?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CheckOutput {
            exited_ok: output.status.success(),
            text,
        })
    }
}

/// Build the argument list for a single echo request.
fn ping_args(target: &str, timeout: Duration) -> Vec<String> {
    let timeout_secs = timeout.as_secs().max(1);

    if cfg!(windows) {
        let timeout_ms = timeout.as_millis().max(1);
        vec![
            "-n".into(),
            "1".into(),
            "-w".into(),
            timeout_ms.to_string(),
            target.into(),
        ]
    } else if cfg!(target_os = "macos") {
        // BSD ping: -t is the overall timeout in seconds, -W is per-reply in ms.
        vec![
            "-c".into(),
            "1".into(),
            "-t".into(),
            timeout_secs.to_string(),
            target.into(),
        ]
    } else {
        vec![
            "-c".into(),
            "1".into(),
            "-W".into(),
            timeout_secs.to_string(),
            target.into(),
        ]
    }
}

fn loss_indicator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"unreachable|100(?:\.0)?% packet loss|timed out")
            .expect("loss indicator pattern is valid")
    })
}

fn reply_indicator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Reply from|bytes from").expect("reply indicator pattern is valid"))
}

/// Classify the raw output of a check.
///
/// Non-zero exit wins over everything, then loss indicators, then reply
/// indicators. Anything else is ambiguous and classifies as `Failure`.
pub fn classify(output: &CheckOutput) -> Classification {
    if !output.exited_ok {
        return Classification::Failure;
    }
    if loss_indicator().is_match(&output.text) {
        return Classification::Failure;
    }
    if reply_indicator().is_match(&output.text) {
        return Classification::Success;
    }
    Classification::Failure
}
