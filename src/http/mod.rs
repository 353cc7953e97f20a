//! HTTP transport for the Model Context Protocol
//!
//! Routes the `/mcp` JSON-RPC listener and the public metadata endpoints.

pub mod handlers;
