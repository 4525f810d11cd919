use std::path::Path;

use bytes::{BufMut, BytesMut};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::ServeError;
use crate::http::response::{Response, StatusCode};
use crate::static_files::ErrorTemplate;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Status line, headers and the blank separator line.
pub fn serialize_head(resp: &Response) -> BytesMut {
    let mut buf = BytesMut::with_capacity(128);

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.put_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        buf.put_slice(k.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(v.as_bytes());
        buf.put_slice(b"\r\n");
    }

    // Header/body separator
    buf.put_slice(b"\r\n");

    buf
}

/// Writes one response: the head is flushed before any body bytes go out.
pub struct ResponseWriter {
    head: BytesMut,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new(response: Response) -> Self {
        Self {
            head: serialize_head(&response),
            body: response.body,
        }
    }

    pub async fn write_to_stream<W>(&self, stream: &mut W) -> Result<(), ServeError>
    where
        W: AsyncWrite + Unpin,
    {
        write_fully(stream, &self.head).await?;
        stream.flush().await.map_err(ServeError::Transport)?;

        write_fully(stream, &self.body).await?;
        stream.flush().await.map_err(ServeError::Transport)?;

        Ok(())
    }
}

async fn write_fully<W>(stream: &mut W, mut buf: &[u8]) -> Result<(), ServeError>
where
    W: AsyncWrite + Unpin,
{
    while !buf.is_empty() {
        let n = stream.write(buf).await.map_err(ServeError::Transport)?;

        if n == 0 {
            return Err(ServeError::Transport(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "connection closed while writing",
            )));
        }

        buf = &buf[n..];
    }

    Ok(())
}

/// Sends a file as a 200 response.
///
/// The whole file is read into memory first. If that read fails the error
/// is logged and nothing is written; the peer only sees the connection
/// close.
pub async fn send_file<W>(stream: &mut W, path: &Path, mime: &str) -> Result<(), ServeError>
where
    W: AsyncWrite + Unpin,
{
    let body = match fs::read(path).await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Failed to read file, closing without a response"
            );
            return Ok(());
        }
    };

    let len = body.len();
    ResponseWriter::new(Response::file(mime, body))
        .write_to_stream(stream)
        .await?;

    tracing::info!(
        status = StatusCode::Ok.as_u16(),
        path = %path.display(),
        content_type = mime,
        bytes = len,
        "Served file"
    );
    Ok(())
}

/// Sends an HTML error page rendered from `template`.
pub async fn send_error<W>(
    stream: &mut W,
    template: &ErrorTemplate,
    status: StatusCode,
    detail: &str,
) -> Result<(), ServeError>
where
    W: AsyncWrite + Unpin,
{
    let body = template.render(status, detail).await;
    ResponseWriter::new(Response::html(status, body))
        .write_to_stream(stream)
        .await
}
