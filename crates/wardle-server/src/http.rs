// Minimal HTTP/1.1 front for the API: one request per connection, JSON out.

use crate::api::{self, ApiRequest, ApiResponse, Body, Method};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use wardle_baseball::query::QueryService;

const MAX_HEADER_BYTES: usize = 16 * 1024;
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("request head exceeds {MAX_HEADER_BYTES} bytes")]
    HeadTooLarge,

    #[error("request not received within {0:?}")]
    Timeout(Duration),
}

/// Accept connections forever, answering each on its own task.
///
/// Dispatch runs on the blocking pool because the first query may trigger the
/// dataset load, which reads CSV files synchronously. A client that has not
/// sent a complete request within `read_timeout` gets a 408.
pub async fn run(
    listener: TcpListener,
    service: Arc<QueryService>,
    cors_origin: String,
    read_timeout: Duration,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("HTTP server listening on {local_addr}");
    let cors_origin: Arc<str> = cors_origin.into();

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("Accepted TCP connection from {addr}");
        let service = Arc::clone(&service);
        let cors_origin = Arc::clone(&cors_origin);
        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, service, &cors_origin, read_timeout).await {
                warn!("Connection from {addr} failed: {e}");
            }
        });
    }
}

async fn serve_connection(
    stream: TcpStream,
    service: Arc<QueryService>,
    cors_origin: &str,
    read_timeout: Duration,
) -> Result<(), HttpError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let received = tokio::time::timeout(read_timeout, read_request(&mut reader))
        .await
        .unwrap_or(Err(HttpError::Timeout(read_timeout)));

    let (response, cors) = match received {
        Ok(Some(request)) => {
            let cors = is_api_path(&request.path);
            info!("{:?} {}", request.method, request.path);
            let response = tokio::task::spawn_blocking(move || api::handle(&service, &request))
                .await
                .unwrap_or_else(|e| {
                    warn!("Request handler failed: {e}");
                    ApiResponse::error(500, "internal server error")
                });
            (response, cors)
        }
        Ok(None) => return Ok(()),
        Err(HttpError::Io(e)) => return Err(HttpError::Io(e)),
        Err(e @ HttpError::Timeout(_)) => {
            warn!("Closing idle connection: {e}");
            (ApiResponse::error(408, e.to_string()), false)
        }
        Err(e) => {
            warn!("Rejecting request: {e}");
            (ApiResponse::error(400, e.to_string()), false)
        }
    };

    write_response(&mut write_half, &response, cors.then_some(cors_origin)).await?;
    write_half.shutdown().await?;
    Ok(())
}

fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

/// Read one line, failing once the request head would exceed its budget.
async fn read_line_limited<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    line: &mut String,
    used: &mut usize,
) -> Result<usize, HttpError> {
    let budget = MAX_HEADER_BYTES.saturating_sub(*used);
    let n = (&mut *reader)
        .take(budget as u64 + 1)
        .read_line(line)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => {
                HttpError::Malformed("request head is not valid UTF-8".into())
            }
            _ => HttpError::Io(e),
        })?;
    *used += n;
    if *used > MAX_HEADER_BYTES {
        return Err(HttpError::HeadTooLarge);
    }
    Ok(n)
}

/// Parse a request head (and drain any body). Returns `Ok(None)` when the
/// peer closes without sending anything.
pub async fn read_request<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<ApiRequest>, HttpError> {
    let mut used = 0;
    let mut request_line = String::new();
    if read_line_limited(reader, &mut request_line, &mut used).await? == 0 {
        return Ok(None);
    }

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::Malformed(format!(
            "bad request line {:?}",
            request_line.trim_end()
        )));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::Malformed(format!("unsupported version {version}")));
    }

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if read_line_limited(reader, &mut line, &mut used).await? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().map_err(|_| {
                    HttpError::Malformed(format!("invalid Content-Length {:?}", value.trim()))
                })?;
            }
        }
    }

    if content_length > MAX_BODY_BYTES {
        return Err(HttpError::Malformed(format!(
            "body of {content_length} bytes exceeds {MAX_BODY_BYTES}"
        )));
    }
    // No route reads a body; drain it so the peer sees a clean exchange.
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;

    let (path, query) = split_target(target);
    Ok(Some(ApiRequest {
        method: Method::parse(method),
        path,
        query,
    }))
}

/// Split a request target into a decoded path and query map. Later
/// duplicates of a key win.
pub fn split_target(target: &str) -> (String, HashMap<String, String>) {
    let (raw_path, raw_query) = target.split_once('?').unwrap_or((target, ""));
    let query = raw_query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_form(key), decode_form(value))
        })
        .collect();
    (percent_decode(raw_path), query)
}

fn decode_form(s: &str) -> String {
    percent_decode(&s.replace('+', " "))
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim.
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}

/// Serialise `response` with `Connection: close`. CORS headers are added
/// when `cors_origin` is given.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &ApiResponse,
    cors_origin: Option<&str>,
) -> std::io::Result<()> {
    let (content_type, body) = match &response.body {
        Body::Json(value) => (Some("application/json"), serde_json::to_vec(value)?),
        Body::Text(text) => (Some("text/plain; charset=utf-8"), text.as_bytes().to_vec()),
        Body::Empty => (None, Vec::new()),
    };

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n",
        response.status,
        reason_phrase(response.status),
        body.len()
    );
    if let Some(content_type) = content_type {
        head.push_str(&format!("Content-Type: {content_type}\r\n"));
    }
    if let Some(origin) = cors_origin {
        head.push_str(&format!(
            "Access-Control-Allow-Origin: {origin}\r\n\
             Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n"
        ));
    }
    head.push_str("Connection: close\r\n\r\n");

    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}
