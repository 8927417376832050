//! Local subprocess execution.
//!
//! The tool runs as a child process with the archive path passed as a flag.
//! Stdout and stderr are captured for diagnostics; failures carry the full
//! command line (password masked) so the operator can reproduce by hand.

use crate::error::{Error, Result};
use crate::exec::Invocation;

pub async fn run(invocation: &Invocation) -> Result<()> {
    let archive_flag = format!("--archive={}", invocation.transfer.path().display());

    let mut command = tokio::process::Command::new(invocation.program);
    command.args(&invocation.args).arg(&archive_flag);

    let rendered = render_command(invocation, &archive_flag);
    let output = command
        .output()
        .await
        .map_err(|e| Error::Execution(format!("failed to spawn `{rendered}`: {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(Error::Execution(format!(
            "`{rendered}` exited with {}: {}",
            output.status,
            tail(&stderr)
        )));
    }

    if !stderr.trim().is_empty() {
        tracing::debug!(program = invocation.program, stderr = %stderr.trim(), "tool diagnostics");
    }
    Ok(())
}

/// The reproducible command line, with the password value masked.
fn render_command(invocation: &Invocation, archive_flag: &str) -> String {
    let mut parts = vec![invocation.program.to_string()];
    for arg in &invocation.args {
        if arg.starts_with("--password=") {
            parts.push("--password=***".into());
        } else {
            parts.push(arg.clone());
        }
    }
    parts.push(archive_flag.to_string());
    parts.join(" ")
}

fn tail(stderr: &str) -> String {
    const KEEP: usize = 5;
    let lines: Vec<&str> = stderr.trim().lines().collect();
    if lines.len() <= KEEP {
        return lines.join(" | ");
    }
    lines[lines.len() - KEEP..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ArchiveTransfer;
    use std::path::PathBuf;

    fn invocation(args: Vec<String>) -> Invocation {
        Invocation {
            program: "mongodump",
            args,
            transfer: ArchiveTransfer::WriteLocal(PathBuf::from("/backups/a.gz")),
        }
    }

    #[test]
    fn rendered_command_masks_the_password() {
        let inv = invocation(vec![
            "--host=db".into(),
            "--password=hunter2".into(),
            "--gzip".into(),
        ]);
        let rendered = render_command(&inv, "--archive=/backups/a.gz");
        assert!(rendered.contains("--password=***"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.ends_with("--archive=/backups/a.gz"));
    }

    #[tokio::test]
    async fn spawn_failure_names_the_attempted_command() {
        let inv = Invocation {
            program: "definitely-not-a-real-binary",
            args: vec!["--db=app".into()],
            transfer: ArchiveTransfer::WriteLocal(PathBuf::from("/tmp/none.gz")),
        };
        let err = run(&inv).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("definitely-not-a-real-binary"));
        assert!(message.contains("--db=app"));
    }

    #[test]
    fn stderr_tail_keeps_the_last_lines() {
        let noise: String = (0..20).map(|i| format!("line {i}\n")).collect();
        let tailed = tail(&noise);
        assert!(tailed.contains("line 19"));
        assert!(!tailed.contains("line 3"));
    }
}
