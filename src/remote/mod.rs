//! Remote side of the backup cycle: the appliance reached over SSH.
//!
//! The orchestrator talks to the appliance through two traits so the cycle
//! can run against an in-memory fake in tests:
//!
//! - [`RemoteConnector`] opens one authenticated [`RemoteSession`].
//! - [`RemoteSession`] executes console commands and downloads files over a
//!   per-call SFTP sub-channel.
//!
//! On top of those traits sit the three remote operations of a cycle:
//! [`create_remote`], [`download_remote`] and [`delete_remote`].
//!
//! ## Failure signalling
//!
//! RouterOS reports console errors on the error stream and does not reliably
//! set a non-zero exit status, so a command is considered failed if and only
//! if it wrote anything to stderr.

use std::path::Path;

use log::{error, info, warn};
use thiserror::Error;

use crate::constants::REDACTION_MASK;
use crate::security::Secret;

/// Console command builder with secret-aware rendering
pub mod command;

/// ssh2-backed session implementation
pub mod ssh;

pub use command::RemoteCommand;

/// Failures opening or using the SSH connection itself.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH handshake with {host} failed: {reason}")]
    Handshake { host: String, reason: String },

    #[error("SSH authentication as {user} failed: {reason}")]
    Authentication { user: String, reason: String },

    #[error("SSH channel error: {0}")]
    Channel(String),
}

/// The backup-creation command did not succeed.
#[derive(Debug, Error)]
pub enum RemoteCommandError {
    #[error("backup name must not be empty")]
    EmptyName,

    #[error("RouterOS backup command failed: {stderr_text}")]
    Stderr { stderr_text: String },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Typed outcome of a failed file download.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Usually means the backup command silently produced a different name
    #[error("backup file not found on router: {0}")]
    NotFound(String),

    #[error("permission denied when accessing: {0}")]
    PermissionDenied(String),

    #[error("unexpected error while downloading backup file: {0}")]
    Other(String),
}

/// Result of one console command, after the channel closed and both streams
/// were drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// One authenticated connection to the appliance.
pub trait RemoteSession {
    /// Run a console command and block until it completes.
    fn exec(&mut self, command: &RemoteCommand) -> Result<CommandOutput, SessionError>;

    /// Copy `remote_path` to `local_path` over a sub-channel that is closed
    /// before this returns. Overwrites `local_path`.
    fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<(), TransferError>;

    /// Tear the connection down. Called exactly once.
    fn close(&mut self);
}

/// Opens sessions to the appliance.
pub trait RemoteConnector {
    fn open(&self) -> Result<Box<dyn RemoteSession>, SessionError>;

    /// Host name used in log lines
    fn host(&self) -> &str;
}

/// A session that is closed when it goes out of scope.
///
/// The orchestrator holds the session only for the remote stages; whichever
/// way those stages end, the connection is released before storage work
/// begins.
pub struct ScopedSession {
    inner: Box<dyn RemoteSession>,
    host: String,
    closed: bool,
}

impl ScopedSession {
    pub fn open(connector: &dyn RemoteConnector) -> Result<Self, SessionError> {
        let inner = connector.open()?;
        info!("SSH connection established with {}", connector.host());
        Ok(Self {
            inner,
            host: connector.host().to_string(),
            closed: false,
        })
    }

    pub fn session(&mut self) -> &mut dyn RemoteSession {
        self.inner.as_mut()
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.close();
            info!("SSH connection to {} closed", self.host);
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Create the backup file on the appliance.
pub fn create_remote(
    session: &mut dyn RemoteSession,
    artifact_name: &str,
    password: &Secret,
) -> Result<(), RemoteCommandError> {
    if artifact_name.is_empty() {
        return Err(RemoteCommandError::EmptyName);
    }

    let command = RemoteCommand::backup_save(artifact_name, password);
    info!("Running backup command: {}", command);

    let output = session.exec(&command)?;

    let stderr_text = output.stderr.trim();
    if !stderr_text.is_empty() {
        return Err(RemoteCommandError::Stderr {
            stderr_text: mask_echoed_secret(stderr_text, password),
        });
    }

    if output.exit_status != 0 {
        warn!(
            "Backup command exited with status {} but reported no error output",
            output.exit_status
        );
    }

    Ok(())
}

/// The appliance may echo the command line back in its error output.
fn mask_echoed_secret(text: &str, secret: &Secret) -> String {
    if secret.is_empty() {
        text.to_string()
    } else {
        text.replace(secret.expose(), REDACTION_MASK)
    }
}

/// Download the backup file from the appliance.
pub fn download_remote(
    session: &mut dyn RemoteSession,
    remote_path: &str,
    local_path: &Path,
) -> Result<(), TransferError> {
    info!(
        "Attempting to download backup file from {} to {}",
        remote_path,
        local_path.display()
    );

    match session.download(remote_path, local_path) {
        Ok(()) => {
            info!("Download completed successfully: {}", local_path.display());
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e)
        }
    }
}

/// Remove the backup file from the appliance. Failures are logged, never
/// returned.
pub fn delete_remote(session: &mut dyn RemoteSession, artifact_name: &str) {
    let command = RemoteCommand::file_remove(artifact_name);
    info!("Cleaning up remote backup file: {}", artifact_name);

    match session.exec(&command) {
        Ok(output) if output.stderr.trim().is_empty() => {
            info!("Remote backup file deleted successfully.");
        }
        Ok(output) => {
            warn!("Failed to delete remote backup file: {}", output.stderr.trim());
        }
        Err(e) => {
            warn!("Failed to delete remote backup file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Session that replays canned outputs and records commands
    struct ScriptedSession {
        outputs: Vec<Result<CommandOutput, SessionError>>,
        sent: Rc<RefCell<Vec<String>>>,
        closes: Rc<RefCell<usize>>,
    }

    impl RemoteSession for ScriptedSession {
        fn exec(&mut self, command: &RemoteCommand) -> Result<CommandOutput, SessionError> {
            self.sent.borrow_mut().push(command.wire());
            self.outputs.remove(0)
        }

        fn download(&mut self, remote_path: &str, _local_path: &Path) -> Result<(), TransferError> {
            Err(TransferError::NotFound(remote_path.to_string()))
        }

        fn close(&mut self) {
            *self.closes.borrow_mut() += 1;
        }
    }

    fn scripted(outputs: Vec<Result<CommandOutput, SessionError>>) -> ScriptedSession {
        ScriptedSession {
            outputs,
            sent: Rc::new(RefCell::new(Vec::new())),
            closes: Rc::new(RefCell::new(0)),
        }
    }

    fn output(exit_status: i32, stderr: &str) -> CommandOutput {
        CommandOutput {
            exit_status,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_create_sends_password_on_the_wire() {
        let mut session = scripted(vec![Ok(output(0, ""))]);
        create_remote(&mut session, "routeros-2025-04-21.backup", &Secret::new("pw")).unwrap();

        assert_eq!(
            session.sent.borrow()[0],
            "/system backup save name=routeros-2025-04-21.backup password=\"pw\""
        );
    }

    #[test]
    fn test_create_fails_on_stderr_even_with_zero_exit() {
        let mut session = scripted(vec![Ok(output(0, "failure: not enough space\n"))]);
        let err = create_remote(&mut session, "a.backup", &Secret::default()).unwrap_err();

        match err {
            RemoteCommandError::Stderr { stderr_text } => {
                assert_eq!(stderr_text, "failure: not enough space")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_create_masks_password_echoed_in_stderr() {
        let mut session = scripted(vec![Ok(output(
            0,
            "bad command name save (line 1 column 9)\nsave name=a.backup password=\"hunter2\"",
        ))]);
        let err = create_remote(&mut session, "a.backup", &Secret::new("hunter2")).unwrap_err();

        let rendered = err.to_string();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("password=\"***\""));
    }

    #[test]
    fn test_create_nonzero_exit_without_stderr_succeeds() {
        let mut session = scripted(vec![Ok(output(1, ""))]);
        assert!(create_remote(&mut session, "a.backup", &Secret::default()).is_ok());
    }

    #[test]
    fn test_create_rejects_empty_name_before_io() {
        let mut session = scripted(vec![]);
        let err = create_remote(&mut session, "", &Secret::default()).unwrap_err();

        assert!(matches!(err, RemoteCommandError::EmptyName));
        assert!(session.sent.borrow().is_empty());
    }

    #[test]
    fn test_delete_swallows_failures() {
        let mut session = scripted(vec![
            Ok(output(0, "no such item")),
            Err(SessionError::Channel("channel closed".to_string())),
        ]);

        delete_remote(&mut session, "a.backup");
        delete_remote(&mut session, "a.backup");

        assert_eq!(session.sent.borrow().len(), 2);
        assert_eq!(session.sent.borrow()[0], "/file remove a.backup");
    }

    #[test]
    fn test_download_passes_not_found_through() {
        let mut session = scripted(vec![]);
        let err = download_remote(&mut session, "/a.backup", Path::new("/tmp/a.backup")).unwrap_err();
        assert!(matches!(err, TransferError::NotFound(path) if path == "/a.backup"));
    }

    struct OneShotConnector {
        closes: Rc<RefCell<usize>>,
    }

    impl RemoteConnector for OneShotConnector {
        fn open(&self) -> Result<Box<dyn RemoteSession>, SessionError> {
            let mut session = scripted(vec![]);
            session.closes = Rc::clone(&self.closes);
            Ok(Box::new(session))
        }

        fn host(&self) -> &str {
            "192.0.2.1"
        }
    }

    #[test]
    fn test_scoped_session_closes_once() {
        let closes = Rc::new(RefCell::new(0));
        let connector = OneShotConnector { closes: Rc::clone(&closes) };

        let scoped = ScopedSession::open(&connector).unwrap();
        scoped.close();
        assert_eq!(*closes.borrow(), 1);

        {
            let _scoped = ScopedSession::open(&connector).unwrap();
        }
        assert_eq!(*closes.borrow(), 2);
    }
}
