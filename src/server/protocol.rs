use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{DaemonError, ErrorKind, IngestError, IngestStage, QueryError};
use crate::models::{Answer, QueryOptions, UploadReport};
use crate::services::{MetricsSummary, ServiceHealth};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Shutdown,
    Health,
    Upload(UploadRequest),
    Query(QueryRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    /// File contents, base64 encoded.
    pub data: String,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.into(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn decode_data(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(default)]
    pub include_sources: bool,
}

impl QueryRequest {
    pub fn options(&self) -> QueryOptions {
        QueryOptions {
            k: self.k,
            include_sources: self.include_sources,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    ShutdownAck,
    Health(HealthResponse),
    Upload(UploadReport),
    Query(Answer),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub service: ServiceHealth,
    pub idle_secs: u64,
    pub requests_served: u64,
    pub metrics: Option<MetricsSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<IngestStage>,
    pub message: String,
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn into_error(self) -> DaemonError {
        DaemonError::Remote {
            kind: self.kind,
            stage: self.stage,
            message: self.message,
        }
    }
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error(ErrorResponse {
            kind,
            stage: None,
            message: message.into(),
            retryable: kind.is_retryable(),
        })
    }
}

impl From<&IngestError> for ErrorResponse {
    fn from(err: &IngestError) -> Self {
        let kind = err.kind();
        Self {
            kind,
            stage: err.stage(),
            message: err.to_string(),
            retryable: kind.is_retryable(),
        }
    }
}

impl From<&QueryError> for ErrorResponse {
    fn from(err: &QueryError) -> Self {
        let kind = err.kind();
        Self {
            kind,
            stage: None,
            message: err.to_string(),
            retryable: kind.is_retryable(),
        }
    }
}

pub fn encode_message(msg: &impl Serialize) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(msg)?;
    let len = (json.len() as u32).to_be_bytes();
    let mut buf = Vec::with_capacity(4 + json.len());
    buf.extend_from_slice(&len);
    buf.extend_from_slice(&json);
    Ok(buf)
}

pub fn decode_length(buf: &[u8; 4]) -> usize {
    u32::from_be_bytes(*buf) as usize
}

/// Read one frame. Returns `None` when the peer closed the stream cleanly.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>, DaemonError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = decode_length(&len_buf);
    if len > max_len {
        return Err(DaemonError::ProtocolError(format!(
            "frame of {} bytes exceeds limit of {} bytes",
            len, max_len
        )));
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

pub async fn write_frame<W>(writer: &mut W, msg: &impl Serialize) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = encode_message(msg).map_err(|e| DaemonError::ProtocolError(e.to_string()))?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoadError, SessionError};

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_value(Request::Query(QueryRequest {
            question: "who failed?".to_string(),
            k: None,
            include_sources: true,
        }))
        .unwrap();
        assert_eq!(json["type"], "query");
        assert_eq!(json["question"], "who failed?");
        assert!(json.get("k").is_none());

        let parsed: Request =
            serde_json::from_str(r#"{"type":"query","question":"q","k":2}"#).unwrap();
        match parsed {
            Request::Query(req) => {
                assert_eq!(req.options().k, Some(2));
                assert!(!req.options().include_sources);
            }
            other => panic!("unexpected request: {:?}", other),
        }

        let ping: Request = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, Request::Ping));
    }

    #[test]
    fn test_upload_data_is_base64() {
        let request = UploadRequest::new("auth.log", b"sshd\xff");
        assert_eq!(request.data, "c3NoZP8=");
        assert_eq!(request.decode_data().unwrap(), b"sshd\xff");

        let bad = UploadRequest {
            file_name: "x.log".to_string(),
            data: "not base64!".to_string(),
        };
        assert!(bad.decode_data().is_err());
    }

    #[test]
    fn test_error_response_from_ingest_error() {
        let err = IngestError::from(LoadError::UnsupportedFormat(".pdf".to_string()));
        let response = ErrorResponse::from(&err);
        assert_eq!(response.kind, ErrorKind::UnsupportedFormat);
        assert_eq!(response.stage, Some(IngestStage::Load));
        assert!(!response.retryable);

        let json = serde_json::to_value(Response::Error(response)).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "unsupported_format");
        assert_eq!(json["stage"], "load");

        let busy = ErrorResponse::from(&IngestError::from(SessionError::Busy));
        assert!(busy.retryable);
        assert!(busy.stage.is_none());
    }

    #[test]
    fn test_encode_message_prefixes_length() {
        let encoded = encode_message(&Request::Ping).unwrap();
        let len = decode_length(&[encoded[0], encoded[1], encoded[2], encoded[3]]);
        assert_eq!(len, encoded.len() - 4);
        assert_eq!(&encoded[4..], br#"{"type":"ping"}"#);
    }

    #[tokio::test]
    async fn test_frame_exchange_over_stream() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, &Request::Health).await.unwrap();
        let frame = read_frame(&mut server, 1024).await.unwrap().unwrap();
        let request: Request = serde_json::from_slice(&frame).unwrap();
        assert!(matches!(request, Request::Health));

        drop(client);
        assert!(read_frame(&mut server, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let request = Request::Query(QueryRequest {
            question: "x".repeat(100),
            k: None,
            include_sources: false,
        });
        write_frame(&mut client, &request).await.unwrap();

        let err = read_frame(&mut server, 16).await.unwrap_err();
        assert!(matches!(err, DaemonError::ProtocolError(_)));
    }
}
