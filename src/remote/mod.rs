// src/remote/mod.rs

//! Remote session layer.
//!
//! - [`connection`] defines the `RemoteConnection` / `RemoteChannel` seam the
//!   remote executor runs against, plus `TransportError`.
//! - [`ssh`] implements it with the OpenSSH client.

pub mod connection;
pub mod ssh;

pub use connection::{ChannelOutput, RemoteChannel, RemoteConnection, TransportError};
pub use ssh::SshConnection;
