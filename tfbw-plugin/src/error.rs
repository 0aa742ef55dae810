use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    /// The process was not started by Terraform or no common protocol
    /// version exists.
    #[error("plugin handshake: {0}")]
    Handshake(String),

    #[error("TLS setup: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gRPC server: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// Failure converting between wire values and JSON values.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid msgpack value: {0}")]
    Decode(String),

    #[error("cannot encode value: {0}")]
    Encode(String),

    #[error("invalid JSON value: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PluginError>;
