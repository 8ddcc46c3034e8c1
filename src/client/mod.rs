use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tokio::net::UnixStream;

use crate::error::{DaemonError, IngestStage, LoadError};
use crate::loaders::FileKind;
use crate::models::{Answer, Config, QueryOptions, UploadReport};
use crate::server::protocol::{
    HealthResponse, QueryRequest, Request, Response, UploadRequest, read_frame, write_frame,
};
use crate::utils::file::read_file_bytes;

const READY_TIMEOUT: Duration = Duration::from_secs(30);
const READY_POLL: Duration = Duration::from_millis(100);

pub struct DaemonClient {
    socket_path: PathBuf,
    auto_start: bool,
    max_frame_bytes: usize,
    max_upload_bytes: u64,
}

impl DaemonClient {
    pub fn new(config: &Config) -> Self {
        Self {
            socket_path: config.socket_path(),
            auto_start: config.daemon.auto_start,
            max_frame_bytes: config.daemon.max_frame_bytes,
            max_upload_bytes: config.ingestion.max_upload_bytes,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn is_running(&self) -> bool {
        self.socket_path.exists()
            && std::os::unix::net::UnixStream::connect(&self.socket_path).is_ok()
    }

    pub async fn ensure_running(&self) -> Result<(), DaemonError> {
        if self.is_running() {
            return Ok(());
        }

        if !self.auto_start {
            return Err(DaemonError::NotRunning);
        }

        tracing::info!(socket = %self.socket_path.display(), "starting daemon");
        spawn_daemon()?;
        self.wait_for_ready().await
    }

    /// Poll until the daemon answers a ping, for at most `READY_TIMEOUT`.
    pub async fn wait_for_ready(&self) -> Result<(), DaemonError> {
        let poll = async {
            loop {
                if self.is_running() && self.ping().await.is_ok() {
                    return;
                }
                tokio::time::sleep(READY_POLL).await;
            }
        };
        tokio::time::timeout(READY_TIMEOUT, poll)
            .await
            .map_err(|_| DaemonError::Timeout)
    }

    async fn connect(&self) -> Result<UnixStream, DaemonError> {
        UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| DaemonError::ConnectionFailed(e.to_string()))
    }

    async fn send_request(&self, request: Request) -> Result<Response, DaemonError> {
        let mut stream = self.connect().await?;
        write_frame(&mut stream, &request).await?;

        let frame = read_frame(&mut stream, self.max_frame_bytes)
            .await?
            .ok_or_else(|| DaemonError::SocketError("daemon closed the connection".to_string()))?;

        serde_json::from_slice(&frame).map_err(|e| DaemonError::ProtocolError(e.to_string()))
    }

    pub async fn ping(&self) -> Result<(), DaemonError> {
        match self.send_request(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn health(&self) -> Result<HealthResponse, DaemonError> {
        match self.send_request(Request::Health).await? {
            Response::Health(health) => Ok(health),
            other => Err(unexpected(other)),
        }
    }

    pub async fn shutdown(&self) -> Result<(), DaemonError> {
        match self.send_request(Request::Shutdown).await? {
            Response::ShutdownAck => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Send a local file to the daemon as the new corpus.
    pub async fn upload(&self, path: &Path) -> Result<UploadReport, DaemonError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| DaemonError::ProtocolError(format!("not a file: {}", path.display())))?;

        FileKind::from_file_name(&file_name).map_err(rejected_upload)?;
        let bytes = read_file_bytes(path, self.max_upload_bytes).map_err(rejected_upload)?;

        self.ensure_running().await?;
        let request = Request::Upload(UploadRequest::new(file_name, &bytes));
        match self.send_request(request).await? {
            Response::Upload(report) => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    pub async fn query(&self, question: &str, options: QueryOptions) -> Result<Answer, DaemonError> {
        self.ensure_running().await?;
        let request = Request::Query(QueryRequest {
            question: question.to_string(),
            k: options.k,
            include_sources: options.include_sources,
        });
        match self.send_request(request).await? {
            Response::Query(answer) => Ok(answer),
            other => Err(unexpected(other)),
        }
    }
}

/// Report a locally detected load failure the same way the daemon would.
fn rejected_upload(err: LoadError) -> DaemonError {
    match err {
        LoadError::IoError(e) => DaemonError::IoError(e),
        err => DaemonError::Remote {
            kind: err.kind(),
            stage: Some(IngestStage::Load),
            message: err.to_string(),
        },
    }
}

fn unexpected(response: Response) -> DaemonError {
    match response {
        Response::Error(e) => e.into_error(),
        other => DaemonError::ProtocolError(format!("unexpected response: {:?}", other)),
    }
}

/// Start a detached daemon process running this executable.
pub fn spawn_daemon() -> Result<(), DaemonError> {
    let exe = std::env::current_exe().map_err(|e| DaemonError::SpawnError(e.to_string()))?;

    Command::new(&exe)
        .args(["serve", "--daemon"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| DaemonError::SpawnError(e.to_string()))?;

    Ok(())
}

fn read_pid(path: &Path) -> Result<i32, DaemonError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(DaemonError::NotRunning),
        Err(e) => return Err(e.into()),
    };
    contents
        .trim()
        .parse()
        .map_err(|_| DaemonError::ProtocolError(format!("invalid pid file: {}", path.display())))
}

/// Signal the daemon recorded in the pid file to terminate and remove its
/// runtime files.
pub fn stop_daemon(config: &Config) -> Result<(), DaemonError> {
    let pid_path = config.pid_path();
    let pid = read_pid(&pid_path)?;

    #[cfg(unix)]
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid),
        nix::sys::signal::Signal::SIGTERM,
    )
    .map_err(|e| DaemonError::SocketError(format!("failed to signal pid {}: {}", pid, e)))?;

    for path in [pid_path, config.socket_path()] {
        if let Err(e) = std::fs::remove_file(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), "failed to remove daemon file: {}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::server::protocol::ErrorResponse;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.daemon.socket_path = Some(dir.path().join("test.sock"));
        config.daemon.auto_start = false;
        config
    }

    #[test]
    fn test_error_response_maps_to_remote_error() {
        let err = unexpected(Response::Error(ErrorResponse {
            kind: ErrorKind::Busy,
            stage: None,
            message: "a corpus is already being built".to_string(),
            retryable: true,
        }));
        assert!(matches!(err, DaemonError::Remote { kind: ErrorKind::Busy, .. }));

        let err = unexpected(Response::Error(ErrorResponse {
            kind: ErrorKind::EmbeddingServiceError,
            stage: Some(IngestStage::Embed),
            message: "embed failed".to_string(),
            retryable: true,
        }));
        assert!(matches!(
            err,
            DaemonError::Remote {
                stage: Some(IngestStage::Embed),
                ..
            }
        ));

        assert!(matches!(unexpected(Response::Pong), DaemonError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn test_not_running_without_auto_start() {
        let dir = tempfile::tempdir().unwrap();
        let client = DaemonClient::new(&config_in(&dir));
        assert!(!client.is_running());

        let err = client
            .query("anything", QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::NotRunning));
    }

    #[tokio::test]
    async fn test_upload_rejects_before_contacting_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let client = DaemonClient::new(&config_in(&dir));

        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();
        let err = client.upload(&pdf).await.unwrap_err();
        assert!(matches!(
            err,
            DaemonError::Remote {
                kind: ErrorKind::UnsupportedFormat,
                stage: Some(IngestStage::Load),
                ..
            }
        ));

        let mut config = config_in(&dir);
        config.ingestion.max_upload_bytes = 4;
        let log = dir.path().join("app.log");
        std::fs::write(&log, b"kernel panic").unwrap();
        let err = DaemonClient::new(&config).upload(&log).await.unwrap_err();
        assert!(matches!(
            err,
            DaemonError::Remote {
                kind: ErrorKind::LoadError,
                ..
            }
        ));
    }

    #[test]
    fn test_stop_without_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            stop_daemon(&config_in(&dir)),
            Err(DaemonError::NotRunning)
        ));
    }
}
