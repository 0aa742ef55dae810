//! Terraform plugin protocol v6 server.
//!
//! Exposes a [`tfbw_core::Provider`] to Terraform the way go-plugin does:
//! magic cookie check, protocol negotiation, optional AutoMTLS, a handshake
//! line on stdout and the `tfplugin6.Provider`, `plugin.GRPCController` and
//! health gRPC services on a loopback port.

pub mod codec;
pub mod convert;
pub mod error;
pub mod handshake;
pub mod plan;
pub mod proto;
pub mod serve;
pub mod service;
pub mod tls;

pub use error::{CodecError, PluginError, Result};
pub use handshake::launched_by_terraform;
pub use serve::{PluginServer, serve};
pub use service::PluginProvider;
