//! The Secrets Manager client the provider drives.
//!
//! The provider never talks HTTP itself.  Everything it needs from Bitwarden
//! goes through [`SecretsManagerClient`], obtained once per provider
//! configuration from a [`ClientConnector`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

/// Fully-normalised endpoints handed to a [`ClientConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Base URL for API requests (e.g. `https://api.bitwarden.com/api`).
    pub api_url: String,
    /// Token endpoint for the identity service
    /// (e.g. `https://identity.bitwarden.com/connect/token`).
    pub identity_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub creation_date: DateTime<Utc>,
    pub revision_date: DateTime<Utc>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub id: String,
    pub organization_id: String,
    pub project_ids: Vec<String>,
    pub key: String,
    pub value: Zeroizing<String>,
    pub note: Zeroizing<String>,
    pub creation_date: DateTime<Utc>,
    pub revision_date: DateTime<Utc>,
}

impl std::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRecord")
            .field("id", &self.id)
            .field("organization_id", &self.organization_id)
            .field("project_ids", &self.project_ids)
            .field("key", &self.key)
            .field("value", &"[redacted]")
            .field("note", &"[redacted]")
            .field("creation_date", &self.creation_date)
            .field("revision_date", &self.revision_date)
            .finish()
    }
}

/// Per-id result of a bulk delete.  `error` is set when the server refused
/// to delete that id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub id: String,
    pub error: Option<String>,
}

/// Request body shared by secret create and update.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretInput {
    pub organization_id: String,
    pub key: String,
    pub value: Zeroizing<String>,
    pub note: Zeroizing<String>,
    pub project_ids: Vec<String>,
}

impl std::fmt::Debug for SecretInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretInput")
            .field("organization_id", &self.organization_id)
            .field("key", &self.key)
            .field("value", &"[redacted]")
            .field("note", &"[redacted]")
            .field("project_ids", &self.project_ids)
            .finish()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("invalid client settings: {0}")]
    InvalidSettings(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("crypto error: {0}")]
    Crypto(String),
}

/// Failure to produce an authenticated client, split by stage so the
/// provider can report each with its own summary.
#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("client creation failed: {0}")]
    Build(ClientError),
    #[error("access token login failed: {0}")]
    Login(ClientError),
}

#[async_trait::async_trait]
pub trait ProjectsApi: Send + Sync {
    async fn get(&self, id: &str) -> Result<ProjectRecord, ClientError>;
    async fn create(&self, organization_id: &str, name: &str)
    -> Result<ProjectRecord, ClientError>;
    async fn update(
        &self,
        id: &str,
        organization_id: &str,
        name: &str,
    ) -> Result<ProjectRecord, ClientError>;
    async fn delete(&self, ids: &[String]) -> Result<Vec<DeleteOutcome>, ClientError>;
}

#[async_trait::async_trait]
pub trait SecretsApi: Send + Sync {
    async fn get(&self, id: &str) -> Result<SecretRecord, ClientError>;
    async fn create(&self, input: &SecretInput) -> Result<SecretRecord, ClientError>;
    async fn update(&self, id: &str, input: &SecretInput) -> Result<SecretRecord, ClientError>;
    async fn delete(&self, ids: &[String]) -> Result<Vec<DeleteOutcome>, ClientError>;
}

/// An authenticated Secrets Manager session.
///
/// Shared read-only (`Arc`) between every resource and data source of a
/// configured provider.
pub trait SecretsManagerClient: Send + Sync {
    /// Organisation the access token belongs to.
    fn organization_id(&self) -> &str;
    fn projects(&self) -> &dyn ProjectsApi;
    fn secrets(&self) -> &dyn SecretsApi;
}

#[async_trait::async_trait]
pub trait ClientConnector: Send + Sync {
    /// Build a client for `settings` and log in with `access_token`.
    async fn connect(
        &self,
        settings: &ClientSettings,
        access_token: &str,
    ) -> Result<Arc<dyn SecretsManagerClient>, ConnectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_record_debug_redacts() {
        let record = SecretRecord {
            id: "s1".to_string(),
            organization_id: "o1".to_string(),
            project_ids: vec!["p1".to_string()],
            key: "DB_PASS".to_string(),
            value: Zeroizing::new("hunter2".to_string()),
            note: Zeroizing::new("rotate monthly".to_string()),
            creation_date: Utc::now(),
            revision_date: Utc::now(),
        };
        let debug = format!("{record:?}");
        assert!(debug.contains("DB_PASS"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("rotate monthly"));
    }

    #[test]
    fn connect_error_names_stage() {
        let e = ConnectError::Login(ClientError::Authentication("bad token".to_string()));
        assert_eq!(
            e.to_string(),
            "access token login failed: authentication failed: bad token"
        );
    }
}
