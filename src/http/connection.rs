use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::time::{Instant, timeout_at};

use crate::config::Config;
use crate::error::{Rejection, ResolveError, ServeError};
use crate::http::parser::{ParseError, parse_request_line, trim_line_ending};
use crate::http::request::Request;
use crate::http::response::StatusCode;
use crate::http::writer::{send_error, send_file};
use crate::static_files::{DocumentRoot, ErrorTemplate, ResolvedResource, resolve};

const METHOD_NOT_ALLOWED_DETAIL: &str = "Only GET requests are supported.";
const INTERNAL_ERROR_DETAIL: &str = "The server encountered an unexpected error.";

/// Read-only state shared by every connection.
#[derive(Debug, Clone)]
pub struct ServeContext {
    pub root: DocumentRoot,
    pub template: ErrorTemplate,
    /// Budget for reading the request line and headers
    pub read_timeout: Duration,
    /// Longest accepted request or header line, in bytes
    pub max_line: usize,
}

impl ServeContext {
    pub fn new(root: DocumentRoot, cfg: &Config) -> Self {
        let template = ErrorTemplate::in_root(&root, &cfg.static_files.error_page);
        Self {
            root,
            template,
            read_timeout: cfg.server.read_timeout(),
            max_line: cfg.server.max_request_line,
        }
    }
}

pub struct Connection<S> {
    stream: BufReader<S>,
    ctx: Arc<ServeContext>,
    state: ConnectionState,
}

/// Where a connection is in its single request/response exchange.
///
/// Every path ends in `Close`; there is no way back to `AwaitRequestLine`.
#[derive(Debug)]
pub enum ConnectionState {
    AwaitRequestLine,
    /// Holds the raw request line until the headers are consumed
    AwaitHeaders(String),
    Resolve(Request),
    Respond(Reply),
    Close,
}

/// What to send back.
#[derive(Debug)]
pub enum Reply {
    File(ResolvedResource),
    Error { status: StatusCode, detail: String },
}

impl Reply {
    fn error(status: StatusCode, detail: impl Into<String>) -> Self {
        Reply::Error {
            status,
            detail: detail.into(),
        }
    }
}

enum Line {
    Eof,
    TooLong,
    Bytes(Vec<u8>),
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, ctx: Arc<ServeContext>) -> Self {
        Self {
            stream: BufReader::new(stream),
            ctx,
            state: ConnectionState::AwaitRequestLine,
        }
    }

    /// Handles the connection to completion. Never fails: every error is
    /// logged here and, for internal errors, answered with a 500.
    pub async fn serve(mut self) {
        tracing::info!("Client connected");

        match self.run().await {
            Ok(()) => {}
            Err(ServeError::Transport(e)) => {
                tracing::info!(error = %e, "Connection dropped by peer");
            }
            Err(e) => {
                tracing::error!(error = %e, "Request failed, sending 500");
                let status = StatusCode::InternalServerError;
                let sent = send_error(
                    self.stream.get_mut(),
                    &self.ctx.template,
                    status,
                    INTERNAL_ERROR_DETAIL,
                )
                .await;
                if let Err(e) = sent {
                    tracing::error!(error = %e, "Failed to send 500 response");
                }
            }
        }

        self.state = ConnectionState::Close;
        tracing::info!("Client disconnected");
    }

    /// Drives the state machine until `Close`.
    pub async fn run(&mut self) -> Result<(), ServeError> {
        let deadline = Instant::now() + self.ctx.read_timeout;

        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Close);

            self.state = match state {
                ConnectionState::AwaitRequestLine => {
                    match timeout_at(deadline, self.read_request_line()).await {
                        Ok(next) => next?,
                        Err(_) => {
                            tracing::warn!("Timed out waiting for request line");
                            ConnectionState::Close
                        }
                    }
                }

                ConnectionState::AwaitHeaders(line) => {
                    match timeout_at(deadline, self.read_headers(line)).await {
                        Ok(next) => next?,
                        Err(_) => {
                            tracing::warn!("Timed out waiting for request headers");
                            ConnectionState::Close
                        }
                    }
                }

                ConnectionState::Resolve(req) => self.resolve_request(req).await?,

                ConnectionState::Respond(reply) => {
                    self.respond(reply).await?;
                    ConnectionState::Close
                }

                ConnectionState::Close => break,
            };
        }

        Ok(())
    }

    async fn read_request_line(&mut self) -> Result<ConnectionState, ServeError> {
        let bytes = match self.read_line().await? {
            Line::Eof => {
                tracing::info!("Connection closed before a request line was sent");
                return Ok(ConnectionState::Close);
            }
            Line::TooLong => {
                tracing::warn!(limit = self.ctx.max_line, "Request line too long");
                return Ok(bad_request(ParseError::LineTooLong));
            }
            Line::Bytes(bytes) => bytes,
        };

        let Ok(line) = String::from_utf8(bytes) else {
            tracing::warn!("Request line is not valid UTF-8");
            return Ok(bad_request(ParseError::InvalidEncoding));
        };

        let line = trim_line_ending(&line);
        if line.trim().is_empty() {
            tracing::info!("Empty request line, closing");
            return Ok(ConnectionState::Close);
        }

        tracing::info!(request_line = %line, "Request");
        Ok(ConnectionState::AwaitHeaders(line.to_string()))
    }

    async fn read_headers(&mut self, line: String) -> Result<ConnectionState, ServeError> {
        let mut headers = Vec::new();

        loop {
            match self.read_line().await? {
                Line::Eof => break,
                Line::TooLong => {
                    tracing::warn!(limit = self.ctx.max_line, "Header line too long");
                    return Ok(bad_request(ParseError::HeaderTooLong));
                }
                Line::Bytes(bytes) => {
                    let raw = String::from_utf8_lossy(&bytes);
                    let header = trim_line_ending(&raw);
                    if header.is_empty() {
                        break;
                    }
                    tracing::info!(header = %header, "Header");
                    headers.push(header.to_string());
                }
            }
        }

        let mut req = match parse_request_line(&line) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(request_line = %line, error = ?e, "Malformed request line");
                return Ok(bad_request(e));
            }
        };
        req.headers = headers;

        if !req.is_get() {
            tracing::warn!(method = %req.method, path = %req.path, "Method not allowed");
            return Ok(ConnectionState::Respond(Reply::error(
                StatusCode::MethodNotAllowed,
                METHOD_NOT_ALLOWED_DETAIL,
            )));
        }

        Ok(ConnectionState::Resolve(req))
    }

    async fn resolve_request(&self, req: Request) -> Result<ConnectionState, ServeError> {
        let reply = match resolve(&self.ctx.root, &req.path).await {
            Ok(resource) => Reply::File(resource),
            Err(ResolveError::Rejected(rejection)) => {
                rejection_reply(&req.path, &rejection)
            }
            Err(ResolveError::Io(e)) => {
                return Err(ServeError::Internal(format!(
                    "checking {}: {}",
                    req.path, e
                )));
            }
        };
        Ok(ConnectionState::Respond(reply))
    }

    async fn respond(&mut self, reply: Reply) -> Result<(), ServeError> {
        match reply {
            Reply::File(resource) => {
                send_file(self.stream.get_mut(), &resource.path, resource.mime()).await
            }
            Reply::Error { status, detail } => {
                send_error(self.stream.get_mut(), &self.ctx.template, status, &detail).await?;
                tracing::info!(status = status.as_u16(), detail = %detail, "Sent error response");
                Ok(())
            }
        }
    }

    /// Reads one line, capped at the configured length.
    async fn read_line(&mut self) -> Result<Line, ServeError> {
        let limit = self.ctx.max_line as u64;
        let mut buf = Vec::new();

        let n = (&mut self.stream)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(ServeError::Transport)?;

        if n == 0 {
            return Ok(Line::Eof);
        }
        if n as u64 == limit && !buf.ends_with(b"\n") {
            return Ok(Line::TooLong);
        }
        Ok(Line::Bytes(buf))
    }
}

fn bad_request(err: ParseError) -> ConnectionState {
    ConnectionState::Respond(Reply::error(StatusCode::BadRequest, err.detail()))
}

fn rejection_reply(path: &str, rejection: &Rejection) -> Reply {
    let detail = match rejection {
        Rejection::Forbidden(reason) => {
            tracing::warn!(path = %path, reason = %reason, "Forbidden");
            format!("Access to '{}' is forbidden.", path)
        }
        Rejection::NotFound => {
            tracing::info!(path = %path, "Not found");
            format!("The requested resource '{}' was not found on this server.", path)
        }
    };
    Reply::error(rejection.status(), detail)
}
