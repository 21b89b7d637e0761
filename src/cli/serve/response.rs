//! HTTP response handlers.
//!
//! Every response allows any origin and disables caching, so the dev client
//! and modules evaluated from other origins always see fresh output.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::utils::mime::{self, types::PLAIN};

/// Respond with a static file, honoring `Range` for media seeking.
pub fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    if let Some(range) = range_header(&request) {
        return respond_range(request, path, content_type, &range);
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body)
}

/// Respond with an in-memory body.
pub fn respond_bytes(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, status, content_type);
    }
    send_body(request, status, content_type, body)
}

pub fn respond_not_found(request: Request) -> Result<()> {
    respond_bytes(request, 404, PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 503 while the initial build runs or after shutdown starts.
pub fn respond_unavailable(request: Request) -> Result<()> {
    respond_bytes(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    let response = Response::from_data(b"405 Method Not Allowed".to_vec())
        .with_status_code(StatusCode(405))
        .with_header(header("Allow", "GET, HEAD")?);
    respond(request, response)
}

fn respond_range(request: Request, path: &Path, content_type: &str, range: &str) -> Result<()> {
    let file_size = fs::metadata(path)?.len();
    let spec = range.strip_prefix("bytes=").unwrap_or(range);

    let Some((start, end)) = parse_range(spec, file_size) else {
        let response = Response::empty(StatusCode(416))
            .with_header(header("Content-Range", &format!("bytes */{file_size}"))?);
        return respond(request, response);
    };
    let length = end - start + 1;

    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;

    let mut headers = common_headers(content_type)?;
    headers.push(header(
        "Content-Range",
        &format!("bytes {start}-{end}/{file_size}"),
    )?);
    headers.push(header("Accept-Ranges", "bytes")?);

    let length_hint = usize::try_from(length).ok();
    let response = Response::new(StatusCode(206), headers, file.take(length), length_hint, None);
    request.respond(response)?;
    Ok(())
}

/// Parse a `start-end` range spec into inclusive byte offsets.
///
/// Returns `None` for an unsatisfiable range.
fn parse_range(spec: &str, file_size: u64) -> Option<(u64, u64)> {
    let last = file_size.checked_sub(1)?;
    let (start, end) = spec.trim().split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    let (start, end) = match (start.is_empty(), end.is_empty()) {
        // "-500": the last 500 bytes
        (true, false) => {
            let suffix: u64 = end.parse().ok()?;
            (file_size.saturating_sub(suffix), last)
        }
        // "500-": from 500 to the end
        (false, true) => (start.parse().ok()?, last),
        (false, false) => (start.parse().ok()?, end.parse::<u64>().ok()?.min(last)),
        (true, true) => return None,
    };
    (start <= end).then_some((start, end))
}

fn range_header(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Range"))
        .map(|h| h.value.to_string())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &str) -> Result<()> {
    let mut response = Response::empty(StatusCode(status));
    for h in common_headers(content_type)? {
        response.add_header(h);
    }
    respond(request, response)
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    for h in common_headers(content_type)? {
        response.add_header(h);
    }
    respond(request, response)
}

fn respond<R: Read>(request: Request, response: Response<R>) -> Result<()> {
    request.respond(response)?;
    Ok(())
}

fn common_headers(content_type: &str) -> Result<Vec<Header>> {
    Ok(vec![
        header("Content-Type", content_type)?,
        header("Access-Control-Allow-Origin", "*")?,
        header("Cache-Control", "no-store")?,
    ])
}

fn header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow!("invalid header `{key}: {value}`"))
}
