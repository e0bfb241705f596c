/// Disposable-connection client for the player's JSON IPC channel.
///
/// Every call opens a fresh connection, writes one request line, reads lines
/// until the matching response (or close/timeout) and drops the connection.
/// A player that is still starting, or gone, simply yields `None`/`false`.
///
/// Platform notes:
/// - Unix:    Unix domain socket at the configured path
/// - Windows: named pipe `\\.\pipe\<name>`
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use radio_proto::protocol::{ControlRequest, ControlResponse};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

/// Timeout for property reads issued by the statistics poller.
pub const GET_TIMEOUT: Duration = Duration::from_millis(500);
/// Timeout for property writes (volume, mute).
pub const SET_TIMEOUT: Duration = Duration::from_secs(1);

pub struct ControlClient {
    path: PathBuf,
    next_id: AtomicU64,
}

impl ControlClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Read a property; `None` on any failure.
    pub async fn get_property(&self, name: &str) -> Option<Value> {
        self.get_property_within(name, GET_TIMEOUT).await
    }

    async fn get_property_within(&self, name: &str, timeout: Duration) -> Option<Value> {
        let req_id = self.issue_id();
        let resp = self
            .call(ControlRequest::get_property(name, req_id), timeout)
            .await?;
        if !resp.is_success() {
            debug!("ipc: get_property {} failed: {:?}", name, resp.error);
            return None;
        }
        resp.data.filter(|v| !v.is_null())
    }

    /// Write a property; `true` only on a matching "success" reply.
    pub async fn set_property(&self, name: &str, value: Value) -> bool {
        self.set_property_within(name, value, SET_TIMEOUT).await
    }

    async fn set_property_within(&self, name: &str, value: Value, timeout: Duration) -> bool {
        let req_id = self.issue_id();
        match self
            .call(ControlRequest::set_property(name, value, req_id), timeout)
            .await
        {
            Some(resp) if resp.is_success() => true,
            Some(resp) => {
                debug!("ipc: set_property {} failed: {:?}", name, resp.error);
                false
            }
            None => false,
        }
    }

    fn issue_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send one request and wait for the reply bearing its id.
    async fn call(&self, req: ControlRequest, timeout: Duration) -> Option<ControlResponse> {
        let req_id = req.request_id;
        let payload = match req.encode() {
            Ok(p) => p,
            Err(e) => {
                warn!("ipc: cannot encode req={}: {}", req_id, e);
                return None;
            }
        };

        let exchange = async {
            let stream = self.connect().await?;
            exchange_line(stream, &payload).await
        };

        let resp = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(Some(resp))) => resp,
            Ok(Ok(None)) => {
                debug!("ipc: channel closed before reply req={}", req_id);
                return None;
            }
            Ok(Err(e)) => {
                debug!("ipc: transport error req={}: {}", req_id, e);
                return None;
            }
            Err(_) => {
                debug!("ipc: timeout req={} after {:?}", req_id, timeout);
                return None;
            }
        };

        if resp.request_id != Some(req_id) {
            warn!(
                "ipc: discarding reply for req={:?}, expected req={}",
                resp.request_id, req_id
            );
            return None;
        }
        Some(resp)
    }

    #[cfg(unix)]
    async fn connect(&self) -> std::io::Result<UnixStream> {
        UnixStream::connect(&self.path).await
    }

    #[cfg(windows)]
    async fn connect(
        &self,
    ) -> std::io::Result<tokio::net::windows::named_pipe::NamedPipeClient> {
        ClientOptions::new().open(&self.path)
    }
}

/// Write `payload`, then return the first line that decodes as a response.
/// Unsolicited event lines are skipped.  `Ok(None)` means the peer closed.
async fn exchange_line<S>(stream: S, payload: &str) -> std::io::Result<Option<ControlResponse>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    write_half.write_all(payload.as_bytes()).await?;
    write_half.flush().await?;

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        if let Some(resp) = ControlResponse::decode(&line) {
            return Ok(Some(resp));
        }
        debug!("ipc: skipping non-response line {}", line.trim());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::UnixListener;

    /// Fake player: answers each connection using `reply(request)`.
    fn serve<F>(listener: UnixListener, reply: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&Value) -> Option<String> + Send + 'static,
    {
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (read_half, mut write_half) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    continue;
                }
                let req: Value = serde_json::from_str(line.trim()).unwrap();
                if let Some(out) = reply(&req) {
                    let _ = write_half.write_all(out.as_bytes()).await;
                }
            }
        })
    }

    fn socket_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("mpv.sock")
    }

    #[tokio::test]
    async fn test_get_property_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        let listener = UnixListener::bind(&path).unwrap();
        let server = serve(listener, |req| {
            let id = req["request_id"].as_u64().unwrap();
            Some(format!(
                "{{\"event\":\"audio-reconfig\"}}\n{{\"request_id\":{},\"error\":\"success\",\"data\":\"mp3\"}}\n",
                id
            ))
        });

        let client = ControlClient::new(&path);
        let value = client.get_property("audio-codec-name").await;
        assert_eq!(value, Some(json!("mp3")));
        server.abort();
    }

    #[tokio::test]
    async fn test_mismatched_request_id_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        let listener = UnixListener::bind(&path).unwrap();
        let server = serve(listener, |req| {
            let id = req["request_id"].as_u64().unwrap();
            Some(format!(
                "{{\"request_id\":{},\"error\":\"success\",\"data\":99}}\n",
                id + 100
            ))
        });

        let client = ControlClient::new(&path);
        assert_eq!(client.get_property("volume").await, None);
        assert!(!client.set_property("volume", json!(40)).await);
        server.abort();
    }

    #[tokio::test]
    async fn test_error_reply_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        let listener = UnixListener::bind(&path).unwrap();
        let server = serve(listener, |req| {
            let id = req["request_id"].as_u64().unwrap();
            Some(format!(
                "{{\"request_id\":{},\"error\":\"property unavailable\",\"data\":null}}\n",
                id
            ))
        });

        let client = ControlClient::new(&path);
        assert_eq!(client.get_property("audio-bitrate").await, None);
        assert!(!client.set_property("mute", json!(true)).await);
        server.abort();
    }

    #[tokio::test]
    async fn test_set_property_writes_expected_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        let listener = UnixListener::bind(&path).unwrap();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_srv = seen.clone();
        let server = serve(listener, move |req| {
            seen_srv.lock().unwrap().push(req["command"].clone());
            let id = req["request_id"].as_u64().unwrap();
            Some(format!("{{\"request_id\":{},\"error\":\"success\"}}\n", id))
        });

        let client = ControlClient::new(&path);
        assert!(client.set_property("volume", json!(65)).await);
        assert!(client.set_property("mute", json!(true)).await);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![json!(["set_property", "volume", 65]), json!(["set_property", "mute", true])]
        );
        server.abort();
    }

    #[tokio::test]
    async fn test_missing_socket_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let client = ControlClient::new(socket_path(&dir));
        assert_eq!(client.get_property("volume").await, None);
        assert!(!client.set_property("volume", json!(10)).await);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        let listener = UnixListener::bind(&path).unwrap();
        // Accept and hold the connection without answering.
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = ControlClient::new(&path);
        let started = std::time::Instant::now();
        let value = client
            .get_property_within("volume", Duration::from_millis(150))
            .await;
        assert_eq!(value, None);
        assert!(started.elapsed() < Duration::from_secs(2));
        server.abort();
    }
}
