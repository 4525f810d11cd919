//! hearth - minimal static file server
//!
//! Core library for the request pipeline: request parsing, document root
//! sandboxing, response writing and the accept loop.

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod server;
pub mod static_files;
