//! Service client and transports

pub mod rpc;
pub mod transport;

pub use rpc::{ClientConfig, RpcError, RpcResult, ServiceClient};
pub use transport::{HttpConfig, HttpTransport, MockTransport, Transport, TransportError};
