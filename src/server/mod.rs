pub mod protocol;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{Notify, RwLock};

use crate::error::{ErrorKind, QueryError};
use crate::models::Config;
use crate::server::protocol::{
    ErrorResponse, HealthResponse, Request, Response, read_frame, write_frame,
};
use crate::services::{CompletionClient, EmbeddingClient, MetricsStore, Operation, RagService};

/// State shared by every connection task.
pub struct DaemonState {
    config: Config,
    service: RagService,
    metrics: Option<Mutex<MetricsStore>>,
    last_request: RwLock<Instant>,
    requests_served: AtomicU64,
    shutdown: Notify,
}

impl DaemonState {
    pub fn new(config: Config, service: RagService, metrics: Option<MetricsStore>) -> Self {
        Self {
            config,
            service,
            metrics: metrics.map(Mutex::new),
            last_request: RwLock::new(Instant::now()),
            requests_served: AtomicU64::new(0),
            shutdown: Notify::new(),
        }
    }

    pub async fn handle_request(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::Shutdown => {
                self.shutdown.notify_one();
                Response::ShutdownAck
            }

            Request::Health => {
                let last = *self.last_request.read().await;
                let metrics = self.metrics.as_ref().map(|m| {
                    m.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .get_summary(self.config.metrics.retention_days)
                });
                Response::Health(HealthResponse {
                    service: self.service.health(),
                    idle_secs: last.elapsed().as_secs(),
                    requests_served: self.requests_served.load(Ordering::Relaxed),
                    metrics,
                })
            }

            Request::Upload(req) => {
                let data = match req.decode_data() {
                    Ok(data) => data,
                    Err(e) => {
                        return Response::error(
                            ErrorKind::ProtocolError,
                            format!("upload data is not valid base64: {}", e),
                        );
                    }
                };

                let start = Instant::now();
                let result = self.service.upload(&req.file_name, data).await;
                self.record(Operation::Upload, start, result.is_ok());
                match result {
                    Ok(report) => Response::Upload(report),
                    Err(e) => Response::Error(ErrorResponse::from(&e)),
                }
            }

            Request::Query(req) => {
                let start = Instant::now();
                let result = self.service.query(&req.question, req.options()).await;
                self.record(Operation::Query, start, result.is_ok());
                match result {
                    Ok(answer) => Response::Query(answer),
                    Err(e) => {
                        log_query_error(&e);
                        Response::Error(ErrorResponse::from(&e))
                    }
                }
            }
        }
    }

    fn record(&self, operation: Operation, start: Instant, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(operation, start.elapsed().as_millis() as u64, success);
        }
    }

    async fn touch(&self) {
        *self.last_request.write().await = Instant::now();
    }
}

fn log_query_error(err: &QueryError) {
    match err {
        QueryError::EmptyQuery | QueryError::Session(_) => {
            tracing::debug!(kind = %err.kind(), "query rejected: {}", err)
        }
        _ => tracing::warn!(kind = %err.kind(), "query failed: {}", err),
    }
}

pub struct DaemonServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl DaemonServer {
    pub fn new(config: Config, service: RagService) -> Self {
        let socket_path = config.socket_path();
        let metrics = if config.metrics.enabled {
            Config::metrics_db_path().and_then(|path| match MetricsStore::open(&path) {
                Ok(store) => {
                    store.cleanup(config.metrics.retention_days);
                    tracing::info!(
                        retention_days = config.metrics.retention_days,
                        "metrics enabled"
                    );
                    Some(store)
                }
                Err(e) => {
                    tracing::warn!("failed to open metrics database: {}", e);
                    None
                }
            })
        } else {
            None
        };

        Self {
            state: Arc::new(DaemonState::new(config, service, metrics)),
            socket_path,
        }
    }

    pub async fn run(&self) -> Result<(), std::io::Error> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        self.write_pid_file()?;

        let idle_secs = self.state.config.daemon.idle_timeout_secs;
        tracing::info!(
            socket = %self.socket_path.display(),
            idle_timeout_secs = idle_secs,
            "daemon listening"
        );

        let idle_timeout = Duration::from_secs(idle_secs);
        let check_interval = Duration::from_secs(10);
        let mut terminate = signal(SignalKind::terminate())?;

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            self.state.touch().await;
                            tokio::spawn(handle_connection(Arc::clone(&self.state), stream));
                        }
                        Err(e) => {
                            tracing::warn!("accept error: {}", e);
                        }
                    }
                }
                _ = tokio::time::sleep(check_interval), if idle_secs > 0 => {
                    let last = *self.state.last_request.read().await;
                    if last.elapsed() > idle_timeout && !self.state.service.session().is_building() {
                        tracing::info!("idle timeout reached, shutting down");
                        break;
                    }
                }
                _ = self.state.shutdown.notified() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received SIGINT, shutting down");
                    break;
                }
                _ = terminate.recv() => {
                    tracing::info!("received SIGTERM, shutting down");
                    break;
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    fn write_pid_file(&self) -> Result<(), std::io::Error> {
        let pid_path = self.state.config.pid_path();
        std::fs::write(&pid_path, std::process::id().to_string())
    }

    fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.socket_path);
        let _ = std::fs::remove_file(self.state.config.pid_path());
        tracing::info!("daemon stopped");
    }
}

async fn handle_connection(state: Arc<DaemonState>, mut stream: UnixStream) {
    let max_frame = state.config.daemon.max_frame_bytes;

    loop {
        let frame = match read_frame(&mut stream, max_frame).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("closing connection: {}", e);
                let response = Response::error(ErrorKind::ProtocolError, e.to_string());
                let _ = write_frame(&mut stream, &response).await;
                break;
            }
        };

        let response = match serde_json::from_slice::<Request>(&frame) {
            Ok(request) => state.handle_request(request).await,
            Err(e) => Response::error(ErrorKind::ProtocolError, format!("invalid request: {}", e)),
        };
        state.requests_served.fetch_add(1, Ordering::Relaxed);
        state.touch().await;

        if write_frame(&mut stream, &response).await.is_err() {
            break;
        }
        if matches!(response, Response::ShutdownAck) {
            break;
        }
    }
}

/// Build the production collaborators and serve until shutdown.
pub async fn run_daemon(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let embedder = EmbeddingClient::new(&config.embedding)?;
    if let Err(e) = embedder.health_check().await {
        tracing::warn!(url = embedder.base_url(), "embedding service not reachable yet: {}", e);
    }
    let completion = CompletionClient::new(&config.completion)?;
    tracing::info!(
        embedding_model = %config.embedding.model,
        completion_model = %config.completion.model,
        "starting daemon"
    );

    let service = RagService::new(config.clone(), Arc::new(embedder), Arc::new(completion))?;
    let server = DaemonServer::new(config, service);
    server.run().await?;
    Ok(())
}
