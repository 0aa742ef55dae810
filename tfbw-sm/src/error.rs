use tfbw_core::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum SmApiError {
    #[error("invalid access token: {0}")]
    InvalidToken(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("crypto error: {0}")]
    Crypto(String),
}

impl From<SmApiError> for ClientError {
    fn from(e: SmApiError) -> Self {
        match e {
            SmApiError::InvalidToken(_) => ClientError::Authentication(e.to_string()),
            SmApiError::InvalidUrl(msg) => ClientError::InvalidSettings(msg),
            SmApiError::InvalidId(msg) => ClientError::InvalidArgument(msg),
            SmApiError::Http(err) => ClientError::Transport(err.to_string()),
            SmApiError::NotFound(what) => ClientError::NotFound(what),
            SmApiError::Api(msg) => ClientError::Api(msg),
            SmApiError::Crypto(msg) => ClientError::Crypto(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_client_error_kinds() {
        assert!(matches!(
            ClientError::from(SmApiError::NotFound("project abc".into())),
            ClientError::NotFound(w) if w == "project abc"
        ));
        assert!(matches!(
            ClientError::from(SmApiError::InvalidToken("missing ':' separator")),
            ClientError::Authentication(_)
        ));
        assert!(matches!(
            ClientError::from(SmApiError::InvalidId("x".into())),
            ClientError::InvalidArgument(_)
        ));
    }
}
