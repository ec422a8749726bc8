use std::fs;
use std::io::{self, Read};
use std::net::TcpStream;
use std::path::Path;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use ssh2::{Channel, ErrorCode, Session};

use crate::config::RouterSettings;
use crate::remote::{
    CommandOutput, RemoteCommand, RemoteConnector, RemoteSession, SessionError, TransferError,
};

// SFTP status codes (draft-ietf-secsh-filexfer-02, section 7)
const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_PERMISSION_DENIED: i32 = 3;

const READ_CHUNK: usize = 8192;
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Opens key-authenticated SSH sessions to the appliance.
///
/// No socket timeouts are set: a hung appliance blocks the cycle, and bounding
/// the run time is left to whatever schedules the process.
#[derive(Clone, Debug)]
pub struct SshConnector {
    settings: RouterSettings,
}

impl SshConnector {
    pub fn new(settings: &RouterSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    fn create_session(&self) -> Result<Session, SessionError> {
        let address = format!("{}:{}", self.settings.host, self.settings.port);

        // Create TCP connection
        let tcp = TcpStream::connect(&address).map_err(|source| SessionError::Connect {
            address: address.clone(),
            source,
        })?;

        // Create SSH session
        let mut session = Session::new().map_err(|e| SessionError::Handshake {
            host: self.settings.host.clone(),
            reason: e.to_string(),
        })?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| SessionError::Handshake {
            host: self.settings.host.clone(),
            reason: e.to_string(),
        })?;

        // Authenticate with private key only, no agent
        session
            .userauth_pubkey_file(
                &self.settings.user,
                None, // Public key derived from private key
                &self.settings.ssh_key_path,
                None, // No passphrase
            )
            .map_err(|e| SessionError::Authentication {
                user: self.settings.user.clone(),
                reason: format!("{} (key {})", e, self.settings.ssh_key_path.display()),
            })?;

        if !session.authenticated() {
            return Err(SessionError::Authentication {
                user: self.settings.user.clone(),
                reason: "server did not accept the key".to_string(),
            });
        }

        Ok(session)
    }
}

impl RemoteConnector for SshConnector {
    fn open(&self) -> Result<Box<dyn RemoteSession>, SessionError> {
        let session = self.create_session()?;
        Ok(Box::new(SshSession { session }))
    }

    fn host(&self) -> &str {
        &self.settings.host
    }
}

/// A live ssh2 session.
pub struct SshSession {
    session: Session,
}

impl RemoteSession for SshSession {
    fn exec(&mut self, command: &RemoteCommand) -> Result<CommandOutput, SessionError> {
        let channel_err = |e: ssh2::Error| SessionError::Channel(e.to_string());
        let io_err = |e: io::Error| SessionError::Channel(e.to_string());

        let mut channel = self.session.channel_session().map_err(channel_err)?;
        channel.exec(&command.wire()).map_err(channel_err)?;

        // Both streams share one channel window, so they are drained together
        self.session.set_blocking(false);
        let drained = drain_streams(&mut channel);
        self.session.set_blocking(true);
        let (stdout, stderr) = drained.map_err(io_err)?;

        channel.wait_close().map_err(channel_err)?;
        let exit_status = channel.exit_status().map_err(channel_err)?;

        debug!("Remote command exited with status {}", exit_status);

        Ok(CommandOutput {
            exit_status,
            stdout,
            stderr,
        })
    }

    fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<(), TransferError> {
        // Dropping `sftp` closes the sub-channel on every return path
        let sftp = self
            .session
            .sftp()
            .map_err(|e| TransferError::Other(format!("failed to open SFTP subsystem: {}", e)))?;

        let mut remote_file = sftp
            .open(Path::new(remote_path))
            .map_err(|e| classify_sftp_error(e, remote_path))?;

        let mut local_file = fs::File::create(local_path).map_err(|e| {
            TransferError::Other(format!("failed to create {}: {}", local_path.display(), e))
        })?;

        let bytes = io::copy(&mut remote_file, &mut local_file).map_err(|e| {
            TransferError::Other(format!("failed to copy {}: {}", remote_path, e))
        })?;

        debug!("Copied {} bytes from {}", bytes, remote_path);
        Ok(())
    }

    fn close(&mut self) {
        if let Err(e) = self.session.disconnect(None, "backup cycle finished", None) {
            warn!("SSH disconnect failed: {}", e);
        }
    }
}

fn classify_sftp_error(e: ssh2::Error, remote_path: &str) -> TransferError {
    match e.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => TransferError::NotFound(remote_path.to_string()),
        ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => {
            TransferError::PermissionDenied(remote_path.to_string())
        }
        _ => TransferError::Other(format!("{}: {}", remote_path, e)),
    }
}

/// Output streams of a running remote command.
trait CommandStreams {
    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn eof(&self) -> bool;
}

impl CommandStreams for Channel {
    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stderr().read(buf)
    }

    fn eof(&self) -> bool {
        Channel::eof(self)
    }
}

/// Read stdout and stderr alternately until the remote side signals EOF.
///
/// Expects non-blocking reads: `WouldBlock` on one stream moves on to the
/// other instead of waiting.
fn drain_streams<S: CommandStreams>(streams: &mut S) -> io::Result<(String, String)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let mut progressed = read_chunk(streams.read_stdout(&mut buf), &buf, &mut stdout)?;
        progressed |= read_chunk(streams.read_stderr(&mut buf), &buf, &mut stderr)?;

        if !progressed {
            if streams.eof() {
                break;
            }
            thread::sleep(IDLE_POLL);
        }
    }

    Ok((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    ))
}

fn read_chunk(result: io::Result<usize>, buf: &[u8], sink: &mut Vec<u8>) -> io::Result<bool> {
    match result {
        Ok(0) => Ok(false),
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}
