//! Codefix Protocol Types
//!
//! Defines the JSON envelope and operation payloads exchanged between the
//! code-fix client and the remote analysis service.

pub mod error;
pub mod request;
pub mod response;
pub mod ops;

pub use error::{ErrorCode, ServiceError};
pub use request::{Operation, Profile, RpcRequest};
pub use response::RpcResponse;

/// Protocol version carried by every envelope.
pub const PROTOCOL_VERSION: i32 = 1;

/// Header naming the operation on HTTP transports.
pub const OPERATION_HEADER: &str = "x-codefix-operation";
