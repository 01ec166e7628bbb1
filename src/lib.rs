#![doc = include_str!("../README.md")]

mod capabilities;
mod client;
mod config;
/// Pure parsers for PASV/PASVEX/EPSV reply text
pub mod endpoint;
mod error;
mod pool;
/// Rate limiting for bandwidth and connection management
pub mod ratelimit;
/// FTP reply decoding and classification
pub mod reply;
/// Server-family behavioral hook points
pub mod server_handler;

pub use capabilities::Features;
pub use client::{CancelToken, DataType, FtpClient, TransferProgress};
pub use config::{ClientConfig, DataConnectionMode, TransferOptions};
pub use endpoint::{DataEndpoint, ProxyState};
pub use error::{FtpError, Result};
pub use pool::{FtpConnectionManager, FtpPool, RetryConfig};
pub use ratelimit::{BandwidthLimiter, ConnectionLimiter, ConnectionPermit};
pub use reply::{Reply, ReplyClass};
pub use server_handler::{GenericServerHandler, RecordOrientedServerHandler, ServerHandler};
