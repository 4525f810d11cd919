//! HTTP protocol implementation.
//!
//! Just enough HTTP/1.1 to serve files: one request per connection, GET
//! only, every response closes the connection.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection state machine
//! - **`parser`**: Request line parsing
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serializes and writes responses, file and error bodies
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │ AwaitRequestLine │ ← EOF / blank line ──────────────┐
//!        └────────┬─────────┘                                  │
//!                 │ request line read                          │
//!                 ▼                                            │
//!        ┌──────────────────┐                                  │
//!        │   AwaitHeaders   │ ← bad line / non-GET → Respond   │
//!        └────────┬─────────┘                                  │
//!                 │ GET request                                │
//!                 ▼                                            │
//!        ┌──────────────────┐                                  │
//!        │     Resolve      │ ← path resolver: file, 403, 404  │
//!        └────────┬─────────┘                                  │
//!                 ▼                                            │
//!        ┌──────────────────┐                                  │
//!        │     Respond      │ ← file or error page             │
//!        └────────┬─────────┘                                  │
//!                 ▼                                            │
//!        ┌──────────────────┐                                  │
//!        │      Close       │ ◄────────────────────────────────┘
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hearth::config::Config;
//! use hearth::http::connection::{Connection, ServeContext};
//! use hearth::static_files::DocumentRoot;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = Config::default();
//!     let root = DocumentRoot::open("webroot")?;
//!     let ctx = Arc::new(ServeContext::new(root, &cfg));
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let ctx = ctx.clone();
//!         tokio::spawn(Connection::new(socket, ctx).serve());
//!     }
//! }
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
