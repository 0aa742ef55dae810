//! go-plugin launch handshake.
//!
//! Terraform starts the provider with a magic cookie and the plugin protocol
//! versions it speaks in the environment.  The provider answers with a single
//! stdout line naming the negotiated version, the listen address and, under
//! AutoMTLS, its own certificate.

use std::net::SocketAddr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;

use crate::error::{PluginError, Result};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efb1f42ee9b8a8bc6d5b7a7d1b7d";
pub const PROTOCOL_VERSIONS_KEY: &str = "PLUGIN_PROTOCOL_VERSIONS";
pub const CLIENT_CERT_KEY: &str = "PLUGIN_CLIENT_CERT";

/// go-plugin's own wire version, always 1.
pub const CORE_PROTOCOL_VERSION: u32 = 1;
/// Terraform plugin protocol served here.
pub const PROTOCOL_VERSION: u32 = 6;

/// Whether the process environment carries Terraform's magic cookie.
pub fn launched_by_terraform() -> bool {
    cookie_matches(std::env::var(MAGIC_COOKIE_KEY).ok().as_deref())
}

fn cookie_matches(value: Option<&str>) -> bool {
    value == Some(MAGIC_COOKIE_VALUE)
}

/// Pick the protocol version from Terraform's comma-separated offer.
///
/// An absent offer means an old client that only knows the default version.
pub fn negotiate_protocol(offered: Option<&str>) -> Result<u32> {
    let Some(offered) = offered else {
        return Ok(PROTOCOL_VERSION);
    };
    let supported = offered
        .split(',')
        .filter_map(|v| v.trim().parse::<u32>().ok())
        .any(|v| v == PROTOCOL_VERSION);
    if supported {
        Ok(PROTOCOL_VERSION)
    } else {
        Err(PluginError::Handshake(format!(
            "Terraform offered plugin protocol versions [{offered}], this provider requires {PROTOCOL_VERSION}"
        )))
    }
}

/// The line printed to stdout once the server is listening.
pub fn handshake_line(protocol: u32, addr: SocketAddr, server_cert_der: Option<&[u8]>) -> String {
    let cert = server_cert_der
        .map(|der| STANDARD_NO_PAD.encode(der))
        .unwrap_or_default();
    format!("{CORE_PROTOCOL_VERSION}|{protocol}|tcp|{addr}|grpc|{cert}")
}
