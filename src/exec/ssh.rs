//! Remote execution over SSH.
//!
//! The dump/restore binary runs on the far side of an authenticated session
//! and its archive bytes are streamed through the channel: remote stdout into
//! a local file for dumps, a local file into remote stdin for restores. The
//! blocking read/write loop is the backpressure mechanism: a stalled local
//! sink stops window updates and pauses the remote producer, and a sink error
//! closes the channel so nothing buffers without bound. libssh2 is blocking,
//! so the whole exchange runs on a blocking task.

use std::io::{BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::path::Path;

use ssh2::{Channel, Session};

use crate::connection::{SshAuth, SshDescriptor};
use crate::error::{Error, Result};
use crate::exec::{ArchiveTransfer, Invocation};

const STREAM_BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: SshAuth,
}

impl SshTarget {
    pub fn from_descriptor(descriptor: &SshDescriptor) -> Result<Self> {
        Ok(Self {
            host: descriptor.host.clone(),
            port: descriptor.port,
            username: descriptor.username.clone(),
            auth: descriptor.auth()?,
        })
    }
}

pub async fn run(target: &SshTarget, invocation: &Invocation) -> Result<()> {
    let target = target.clone();
    let invocation = invocation.clone();
    tokio::task::spawn_blocking(move || run_blocking(&target, &invocation))
        .await
        .map_err(|e| Error::Execution(format!("ssh task panicked: {e}")))?
}

fn run_blocking(target: &SshTarget, invocation: &Invocation) -> Result<()> {
    let session = connect(target)?;
    let remote = remote_command(invocation);
    tracing::debug!(host = %target.host, command = %mask_password(&remote), "executing remote command");

    let mut channel = session
        .channel_session()
        .map_err(|e| Error::Execution(format!("ssh channel open failed: {e}")))?;
    channel
        .exec(&remote)
        .map_err(|e| Error::Execution(format!("remote exec failed: {e}")))?;

    let streamed = match &invocation.transfer {
        ArchiveTransfer::WriteLocal(path) => stream_to_file(&mut channel, path),
        ArchiveTransfer::ReadLocal(path) => stream_from_file(&mut channel, path),
    };
    if let Err(e) = streamed {
        // Terminate the remote side before surfacing the sink/source error.
        let _ = channel.close();
        let _ = channel.wait_close();
        return Err(e);
    }

    let mut remote_stderr = String::new();
    let _ = channel.stderr().read_to_string(&mut remote_stderr);

    channel
        .wait_close()
        .map_err(|e| Error::Execution(format!("ssh channel close failed: {e}")))?;
    let status = channel
        .exit_status()
        .map_err(|e| Error::Execution(format!("remote exit status unavailable: {e}")))?;

    if status != 0 {
        return Err(Error::Execution(format!(
            "remote {} exited with status {status}: {}",
            invocation.program,
            remote_stderr.trim()
        )));
    }
    if !remote_stderr.trim().is_empty() {
        tracing::debug!(program = invocation.program, stderr = %remote_stderr.trim(), "remote tool diagnostics");
    }
    Ok(())
}

fn connect(target: &SshTarget) -> Result<Session> {
    let tcp = TcpStream::connect((target.host.as_str(), target.port)).map_err(|e| {
        Error::Execution(format!(
            "ssh connect to {}:{} failed: {e}",
            target.host, target.port
        ))
    })?;
    let mut session =
        Session::new().map_err(|e| Error::Execution(format!("ssh session init failed: {e}")))?;
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| Error::Execution(format!("ssh handshake failed: {e}")))?;

    match &target.auth {
        SshAuth::Password(password) => session.userauth_password(&target.username, password),
        SshAuth::PrivateKey { path, passphrase } => {
            session.userauth_pubkey_file(&target.username, None, path, passphrase.as_deref())
        }
    }
    .map_err(|e| Error::Execution(format!("ssh authentication failed: {e}")))?;

    if !session.authenticated() {
        return Err(Error::Execution("ssh authentication failed".into()));
    }
    Ok(session)
}

/// Remote dumps write the archive to stdout, restores read it from stdin, so
/// the archive flag goes bare.
fn remote_command(invocation: &Invocation) -> String {
    let mut parts = vec![invocation.program.to_string()];
    parts.extend(invocation.args.iter().map(|arg| shell_quote(arg)));
    parts.push("--archive".into());
    parts.join(" ")
}

/// Single-quote anything that is not plainly safe.
pub(crate) fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=+./:,@".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

fn mask_password(command: &str) -> String {
    command
        .split(' ')
        .map(|part| {
            if part.starts_with("--password=") || part.starts_with("'--password=") {
                "--password=***"
            } else {
                part
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn stream_to_file(channel: &mut Channel, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| Error::Execution(format!("cannot create {}: {e}", path.display())))?;
    let mut sink = BufWriter::new(file);
    let mut buf = [0u8; STREAM_BUF_SIZE];
    let mut received: u64 = 0;

    loop {
        let n = channel
            .read(&mut buf)
            .map_err(|e| Error::Execution(format!("remote stream read failed: {e}")))?;
        if n == 0 {
            break;
        }
        sink.write_all(&buf[..n])
            .map_err(|e| Error::Execution(format!("archive write failed: {e}")))?;
        received += n as u64;
    }

    sink.flush()
        .map_err(|e| Error::Execution(format!("archive flush failed: {e}")))?;
    tracing::debug!(bytes = received, archive = %path.display(), "archive streamed from remote");
    Ok(())
}

fn stream_from_file(channel: &mut Channel, path: &Path) -> Result<()> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Execution(format!("cannot open {}: {e}", path.display())))?;
    let mut source = BufReader::new(file);
    let mut buf = [0u8; STREAM_BUF_SIZE];
    let mut sent: u64 = 0;

    loop {
        let n = source
            .read(&mut buf)
            .map_err(|e| Error::Execution(format!("archive read failed: {e}")))?;
        if n == 0 {
            break;
        }
        channel
            .write_all(&buf[..n])
            .map_err(|e| Error::Execution(format!("remote stream write failed: {e}")))?;
        sent += n as u64;
    }

    channel
        .send_eof()
        .map_err(|e| Error::Execution(format!("remote stream eof failed: {e}")))?;
    tracing::debug!(bytes = sent, archive = %path.display(), "archive streamed to remote");
    Ok(())
}
