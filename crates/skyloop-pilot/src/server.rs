//! [`PilotServer`] – the `/pilot` HTTP endpoint.
//!
//! A deliberately small HTTP/1.1 server over a Tokio [`TcpListener`]: one
//! request per connection, `Connection: close` on every response.
//!
//! | Request | Response |
//! |---|---|
//! | `POST /pilot` `{"image": "<b64>"}` | `200 {"command": "LAND" \| "MOVE_NEXT"}` |
//! | `POST /pilot`, body without an `image` string | `400 {"command": "HOVER"}` |
//! | `POST /pilot`, model unreachable or failing | `200 {"command": "HOVER"}` |
//! | anything else | `404` |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use skyloop_types::FlightCommand;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::classify::{TERRAIN_PROMPT, classify};
use crate::vlm::{PilotError, VisionModel};

/// Default TCP port for the pilot service.
pub const DEFAULT_PORT: u16 = 5000;

/// Requests larger than this are refused.
const MAX_REQUEST_BYTES: usize = 32 * 1024 * 1024;

// ---------------------------------------------------------------------------
// PilotServer
// ---------------------------------------------------------------------------

/// Decision service answering perception requests with flight commands.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use skyloop_pilot::{OllamaVision, PilotServer};
///
/// #[tokio::main]
/// async fn main() {
///     let model = OllamaVision::new("http://localhost:11434", "smolvlm256m", None)
///         .expect("http client");
///     PilotServer::new(Arc::new(model))
///         .run()
///         .await
///         .expect("pilot server failed");
/// }
/// ```
pub struct PilotServer {
    model: Arc<dyn VisionModel>,
    port: u16,
    debug_image_path: Option<PathBuf>,
}

struct Shared {
    model: Arc<dyn VisionModel>,
    debug_image_path: Option<PathBuf>,
}

impl PilotServer {
    /// Server asking `model`, on the [`DEFAULT_PORT`].
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self {
            model,
            port: DEFAULT_PORT,
            debug_image_path: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Write every received frame to `path` (overwritten each request).
    pub fn with_debug_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_image_path = Some(path.into());
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind `0.0.0.0:<port>` and serve forever.
    ///
    /// # Errors
    ///
    /// [`PilotError::Io`] if the listener cannot bind.
    pub async fn run(self) -> Result<(), PilotError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener.
    ///
    /// # Errors
    ///
    /// [`PilotError::Io`] if the listener's address cannot be read.
    pub async fn serve(self, listener: TcpListener) -> Result<(), PilotError> {
        info!(addr = %listener.local_addr()?, "pilot service listening");
        let shared = Arc::new(Shared {
            model: self.model,
            debug_image_path: self.debug_image_path,
        });

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let shared = Arc::clone(&shared);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &shared).await {
                            warn!(%peer, error = %e, "pilot connection failed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP plumbing
// ---------------------------------------------------------------------------

/// A parsed HTTP/1.1 request.
#[derive(Debug)]
pub(crate) struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

/// Read one request: headers, then a `Content-Length` body.
///
/// `Ok(None)` when the peer closes before sending a complete header block.
pub(crate) async fn read_request(stream: &mut TcpStream) -> Result<Option<HttpRequest>, PilotError> {
    let mut buf = Vec::with_capacity(8 * 1024);
    let mut chunk = [0u8; 8 * 1024];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if buf.len() > MAX_REQUEST_BYTES {
            return Ok(None);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0)
        .min(MAX_REQUEST_BYTES);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(body_start + content_length);

    Ok(Some(HttpRequest {
        method,
        path,
        body: buf[body_start..body_end].to_vec(),
    }))
}

async fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<(), PilotError> {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn handle_connection(mut stream: TcpStream, shared: &Shared) -> Result<(), PilotError> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };
    debug!(method = %request.method, path = %request.path, bytes = request.body.len(), "request");
    let (status, body) = route(shared, &request).await;
    write_response(&mut stream, status, &body).await
}

// ---------------------------------------------------------------------------
// /pilot
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PilotRequest {
    image: String,
}

fn command_body(command: FlightCommand) -> String {
    serde_json::json!({ "command": command.keyword() }).to_string()
}

async fn route(shared: &Shared, request: &HttpRequest) -> (u16, String) {
    let path = request.path.split('?').next().unwrap_or_default();
    match (request.method.as_str(), path) {
        ("POST", "/pilot") => pilot(shared, &request.body).await,
        _ => (404, serde_json::json!({ "error": "not found" }).to_string()),
    }
}

async fn pilot(shared: &Shared, body: &[u8]) -> (u16, String) {
    let image = match serde_json::from_slice::<PilotRequest>(body) {
        Ok(req) => req.image,
        Err(e) => {
            warn!(error = %e, "request carries no image");
            return (400, command_body(FlightCommand::Hover));
        }
    };

    if let Some(path) = &shared.debug_image_path {
        save_debug_image(path, &image).await;
    }

    match shared.model.ask(TERRAIN_PROMPT, &image).await {
        Ok(answer) => {
            let command = classify(&answer);
            info!(raw = %answer.trim(), %command, "terrain classified");
            (200, command_body(command))
        }
        Err(e) => {
            warn!(error = %e, "vision model failed, holding position");
            (200, command_body(FlightCommand::Hover))
        }
    }
}

async fn save_debug_image(path: &Path, image_b64: &str) {
    let bytes = match STANDARD.decode(image_b64) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "debug image is not valid base64");
            return;
        }
    };
    match tokio::fs::write(path, &bytes).await {
        Ok(()) => debug!(path = %path.display(), "debug image saved"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not save debug image"),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct CannedModel(Result<&'static str, &'static str>);

    #[async_trait]
    impl VisionModel for CannedModel {
        async fn ask(&self, prompt: &str, _image_b64: &str) -> Result<String, PilotError> {
            assert!(prompt.contains("Option A"));
            match self.0 {
                Ok(answer) => Ok(answer.to_string()),
                Err(reason) => Err(PilotError::BadResponse(reason.to_string())),
            }
        }
    }

    async fn start(server: PilotServer) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server.serve(listener));
        format!("http://{addr}")
    }

    async fn post(url: &str, body: &str) -> (u16, serde_json::Value) {
        let resp = reqwest::Client::new()
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn grass_answer_lands() {
        let base = start(PilotServer::new(Arc::new(CannedModel(Ok("A"))))).await;
        let (status, body) = post(&format!("{base}/pilot"), "{\"image\":\"aGk=\"}").await;
        assert_eq!(status, 200);
        assert_eq!(body["command"], "LAND");
    }

    #[tokio::test]
    async fn forest_answer_moves_on() {
        let base = start(PilotServer::new(Arc::new(CannedModel(Ok(" Option B "))))).await;
        let (status, body) = post(&format!("{base}/pilot"), "{\"image\":\"aGk=\"}").await;
        assert_eq!(status, 200);
        assert_eq!(body["command"], "MOVE_NEXT");
    }

    #[tokio::test]
    async fn missing_image_is_bad_request_with_hover() {
        let base = start(PilotServer::new(Arc::new(CannedModel(Ok("A"))))).await;
        for body in ["{}", "not json", "{\"image\": 7}", ""] {
            let (status, reply) = post(&format!("{base}/pilot"), body).await;
            assert_eq!(status, 400, "{body:?}");
            assert_eq!(reply["command"], "HOVER");
        }
    }

    #[tokio::test]
    async fn model_failure_holds_position() {
        let base = start(PilotServer::new(Arc::new(CannedModel(Err("offline"))))).await;
        let (status, body) = post(&format!("{base}/pilot"), "{\"image\":\"aGk=\"}").await;
        assert_eq!(status, 200);
        assert_eq!(body["command"], "HOVER");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let base = start(PilotServer::new(Arc::new(CannedModel(Ok("A"))))).await;
        let get = reqwest::get(format!("{base}/pilot")).await.unwrap();
        assert_eq!(get.status().as_u16(), 404);
        let (status, _) = post(&format!("{base}/land"), "{\"image\":\"aGk=\"}").await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn debug_image_is_written_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_frame.jpg");
        let server = PilotServer::new(Arc::new(CannedModel(Ok("B")))).with_debug_image(&path);
        let base = start(server).await;

        let (status, _) = post(&format!("{base}/pilot"), "{\"image\":\"/9j/AAE=\"}").await;
        assert_eq!(status, 200);
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn undecodable_debug_image_does_not_fail_the_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_frame.jpg");
        let server = PilotServer::new(Arc::new(CannedModel(Ok("A")))).with_debug_image(&path);
        let base = start(server).await;

        let (status, body) = post(&format!("{base}/pilot"), "{\"image\":\"***\"}").await;
        assert_eq!(status, 200);
        assert_eq!(body["command"], "LAND");
        assert!(!path.exists());
    }
}
