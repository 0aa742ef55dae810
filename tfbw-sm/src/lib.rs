//! Native Bitwarden Secrets Manager client.
//!
//! Implements [`tfbw_core::SecretsManagerClient`] without the Bitwarden SDK:
//! plain `reqwest` for HTTP, `aes`/`cbc`/`hmac`/`hkdf` for the EncString
//! cryptography.
//!
//! # Authentication
//!
//! Machine-account access tokens have the form
//! ```text
//! 0.{access-token-uuid}.{client_secret}:{base64_16_byte_enc_key_seed}
//! ```
//! [`SmConnector::connect`] parses the token, logs in against the identity
//! token URL and decrypts the organisation key.  The resulting [`SmClient`]
//! holds the bearer JWT and the organisation key for its whole lifetime; both
//! are scrubbed on drop.

mod api;
mod crypto;
mod error;
mod projects;
mod secrets;

use std::sync::Arc;

use tfbw_core::{
    ClientConnector, ClientSettings, ConnectError, ProjectsApi, SecretsApi, SecretsManagerClient,
};
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroizing;

pub use api::{AccessToken, SmUrls};
pub use error::SmApiError;
pub use projects::SmProjects;
pub use secrets::SmSecrets;

use api::{SmApiClient, organization_from_jwt};
use crypto::{Key64, decrypt_field, decrypt_field_opt, decrypt_org_key, encrypt_enc_string};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// State shared by the project and secret halves of a client.
pub(crate) struct SmSession {
    api: SmApiClient,
    bearer: Zeroizing<String>,
    org_key: Key64,
    organization_id: Uuid,
}

impl SmSession {
    fn parse_id(kind: &str, id: &str) -> Result<Uuid, SmApiError> {
        id.parse()
            .map_err(|_| SmApiError::InvalidId(format!("{kind} id '{id}' is not a UUID")))
    }

    fn parse_ids(kind: &str, ids: &[String]) -> Result<Vec<Uuid>, SmApiError> {
        ids.iter().map(|id| Self::parse_id(kind, id)).collect()
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, SmApiError> {
        encrypt_enc_string(plaintext.as_bytes(), &self.org_key)
    }

    fn decrypt(&self, enc: &str) -> Result<String, SmApiError> {
        decrypt_field(enc, &self.org_key)
    }

    fn decrypt_opt(&self, enc: Option<&str>) -> Result<Zeroizing<String>, SmApiError> {
        decrypt_field_opt(enc, &self.org_key)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An authenticated Secrets Manager client.
pub struct SmClient {
    organization_id: String,
    projects: SmProjects,
    secrets: SmSecrets,
}

impl std::fmt::Debug for SmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmClient")
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

impl SmClient {
    /// Build an HTTP client for `settings` and log in with `access_token`.
    pub async fn login(settings: &ClientSettings, access_token: &str) -> Result<Self, ConnectError> {
        let urls = SmUrls::from_settings(settings).map_err(|e| ConnectError::Build(e.into()))?;
        let api = SmApiClient::new(urls).map_err(|e| ConnectError::Build(e.into()))?;
        Self::login_with(api, access_token).await
    }

    async fn login_with(api: SmApiClient, access_token: &str) -> Result<Self, ConnectError> {
        let session = authenticate(api, access_token)
            .await
            .map_err(|e| ConnectError::Login(e.into()))?;
        let organization_id = session.organization_id.to_string();
        info!(%organization_id, "authenticated to Bitwarden Secrets Manager");

        let session = Arc::new(session);
        Ok(Self {
            organization_id,
            projects: SmProjects::new(Arc::clone(&session)),
            secrets: SmSecrets::new(session),
        })
    }
}

async fn authenticate(api: SmApiClient, raw_token: &str) -> Result<SmSession, SmApiError> {
    let token = AccessToken::parse(raw_token)?;
    let (bearer, encrypted_payload) = api.login(&token).await?.into_zeroizing_token();

    let token_enc_key = token.derive_token_enc_key()?;
    let org_key = decrypt_org_key(&encrypted_payload, &token_enc_key)?;
    let organization_id = organization_from_jwt(&bearer)?;
    debug!(%organization_id, "SM organisation key decrypted");

    Ok(SmSession {
        api,
        bearer,
        org_key,
        organization_id,
    })
}

impl SecretsManagerClient for SmClient {
    fn organization_id(&self) -> &str {
        &self.organization_id
    }

    fn projects(&self) -> &dyn ProjectsApi {
        &self.projects
    }

    fn secrets(&self) -> &dyn SecretsApi {
        &self.secrets
    }
}

/// [`ClientConnector`] producing [`SmClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmConnector;

#[async_trait::async_trait]
impl ClientConnector for SmConnector {
    async fn connect(
        &self,
        settings: &ClientSettings,
        access_token: &str,
    ) -> Result<Arc<dyn SecretsManagerClient>, ConnectError> {
        let client = SmClient::login(settings, access_token).await?;
        Ok(Arc::new(client))
    }
}
