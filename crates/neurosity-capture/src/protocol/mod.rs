//! Device-cloud gateway protocol modules.
//!
//! This namespace groups wire-compatible JSON-RPC protocol structures:
//! - [`rpc`]: JSON-RPC request/response/error envelope types and pushed event frames.
//! - [`constants`]: method names and error codes.

pub mod constants;
pub mod rpc;
