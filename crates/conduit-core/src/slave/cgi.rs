//! CGI front of the slave dispatcher.

use std::io::Read;

use crate::error::{ConduitError, WireError};
use crate::transport::wire::{SUCCESS_MARKER, decode_form};

use super::SlaveDispatch;

/// Response written to stdout by `conduit receive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgiResponse {
    pub status: u16,
    pub body: String,
}

impl CgiResponse {
    fn new(status: u16, lines: Vec<String>) -> Self {
        let mut body = lines.join("\n");
        body.push('\n');
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200 && crate::transport::wire::is_success(&self.body)
    }

    /// CGI headers followed by the body.
    pub fn render(&self) -> String {
        let reason = match self.status {
            200 => "OK",
            400 => "Bad Request",
            405 => "Method Not Allowed",
            _ => "Internal Server Error",
        };
        format!(
            "Status: {} {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}",
            self.status, reason, self.body
        )
    }
}

/// Read a request body, honouring `CONTENT_LENGTH` when present.
pub fn read_body<R: Read>(mut input: R, content_length: Option<&str>) -> Result<Vec<u8>, WireError> {
    let mut body = Vec::new();
    match content_length.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let length: u64 = raw
                .parse()
                .map_err(|_| WireError::Malformed(format!("invalid CONTENT_LENGTH '{}'", raw)))?;
            input
                .take(length)
                .read_to_end(&mut body)
                .map_err(|e| WireError::Malformed(format!("failed to read request body: {}", e)))?;
        }
        None => {
            input
                .read_to_end(&mut body)
                .map_err(|e| WireError::Malformed(format!("failed to read request body: {}", e)))?;
        }
    }
    Ok(body)
}

/// Serve one CGI request read from `input`.
pub fn serve<R: Read>(
    dispatch: &SlaveDispatch<'_>,
    method: &str,
    content_length: Option<&str>,
    input: R,
) -> CgiResponse {
    match read_body(input, content_length) {
        Ok(body) => handle_request(dispatch, method, &body),
        Err(e) => CgiResponse::new(400, vec![format!("error: {}", e)]),
    }
}

/// Decode one delivery, run it and describe the outcome.
pub fn handle_request(dispatch: &SlaveDispatch<'_>, method: &str, body: &[u8]) -> CgiResponse {
    if !method.eq_ignore_ascii_case("POST") {
        return CgiResponse::new(405, vec![format!("error: method {} is not accepted", method)]);
    }

    let request = match decode_form(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Rejected malformed request: {}", e);
            return CgiResponse::new(400, vec![format!("error: {}", e)]);
        }
    };

    match dispatch.execute(&request.user, &request.actions) {
        Ok(report) => {
            let mut lines: Vec<String> = report
                .warnings
                .iter()
                .map(|w| format!("warning: {}", w))
                .collect();
            lines.push(format!(
                "applied {}/{} action(s)",
                report.succeeded, report.attempted
            ));
            lines.push(SUCCESS_MARKER.to_string());
            CgiResponse::new(200, lines)
        }
        Err(ConduitError::ActionsFailed { failures, report }) => {
            let mut lines: Vec<String> = report
                .warnings
                .iter()
                .map(|w| format!("warning: {}", w))
                .collect();
            lines.extend(failures.iter().map(|f| format!("error: {}", f)));
            lines.push(format!(
                "applied {}/{} action(s)",
                report.succeeded, report.attempted
            ));
            CgiResponse::new(200, lines)
        }
        Err(e) => CgiResponse::new(500, vec![format!("error: {}", e)]),
    }
}
