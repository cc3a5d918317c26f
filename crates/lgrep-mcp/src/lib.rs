//! JSON-RPC 2.0 stdio tool server for lgrep
//!
//! Exposes the search and index verbs to external agents over
//! line-delimited JSON-RPC on standard input/output.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{start_server, McpServer};
