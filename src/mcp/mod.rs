//! Model Context Protocol handling over JSON-RPC
//!
//! Protocol envelopes, version negotiation and method routing.

pub mod rpc;
pub mod server;
