//! HTTP API module.
//!
//! This module provides the HTTP server, response types and the log stream
//! shared by the server and the CLI.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, DEFAULT_PORT};
pub use types::*;
