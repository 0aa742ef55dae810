//! HTTP layer of the native Secrets Manager client.
//!
//! Authentication and every project/secret endpoint, without the Bitwarden
//! SDK:
//!
//! 1. Parse the access token (`0.{uuid}.{secret}:{base64_16_key}`)
//! 2. Derive the token encryption key (HMAC-SHA256 + HKDF-Expand)
//! 3. POST the identity token URL (client_credentials) → JWT + encrypted_payload
//! 4. Decrypt `encrypted_payload` → organisation key
//! 5. Call the project and secret endpoints with the JWT as bearer token,
//!    encrypting and decrypting fields with the organisation key

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tfbw_core::ClientSettings;
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{Key64, hkdf_expand_sha256};
use crate::error::SmApiError;

type HmacSha256 = Hmac<Sha256>;

const CLIENT_NAME: &str = "terraform-provider-bitwarden";

// ---------------------------------------------------------------------------
// Parsed access token
// ---------------------------------------------------------------------------

/// A parsed machine-account access token.
pub struct AccessToken {
    pub access_token_id: Uuid,
    pub client_secret: Zeroizing<String>,
    enc_key_seed: Zeroizing<[u8; 16]>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token_id", &self.access_token_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

impl AccessToken {
    pub fn parse(raw: &str) -> Result<Self, SmApiError> {
        let (first, enc_key_b64) = raw
            .split_once(':')
            .ok_or(SmApiError::InvalidToken("missing ':' separator"))?;

        let mut parts = first.split('.');
        let (Some(version), Some(id), Some(secret), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SmApiError::InvalidToken(
                "expected 3 dot-separated parts before ':'",
            ));
        };
        if version != "0" {
            return Err(SmApiError::InvalidToken(
                "unsupported token version (expected '0')",
            ));
        }

        let access_token_id = id
            .parse::<Uuid>()
            .map_err(|_| SmApiError::InvalidToken("invalid UUID in token"))?;

        let key_bytes = Zeroizing::new(
            B64.decode(enc_key_b64)
                .map_err(|_| SmApiError::InvalidToken("invalid base64 in encryption key"))?,
        );
        if key_bytes.len() != 16 {
            return Err(SmApiError::InvalidToken("encryption key must be 16 bytes"));
        }
        let mut seed = Zeroizing::new([0u8; 16]);
        seed.copy_from_slice(&key_bytes);

        Ok(Self {
            access_token_id,
            client_secret: Zeroizing::new(secret.to_string()),
            enc_key_seed: seed,
        })
    }

    /// Derive the 64-byte token encryption key:
    ///
    /// ```text
    /// prk = HMAC-SHA256(key = "bitwarden-accesstoken", data = seed)
    /// key = HKDF-Expand(prk, info = "sm-access-token", len = 64)
    /// ```
    pub fn derive_token_enc_key(&self) -> Result<Key64, SmApiError> {
        let mut mac = HmacSha256::new_from_slice(b"bitwarden-accesstoken")
            .map_err(|e| SmApiError::Crypto(format!("HMAC key: {e}")))?;
        mac.update(self.enc_key_seed.as_ref());
        let prk = Zeroizing::new(mac.finalize().into_bytes().to_vec());

        let expanded = hkdf_expand_sha256(&prk, b"sm-access-token", 64)?;
        let mut out = Zeroizing::new([0u8; 64]);
        out.copy_from_slice(&expanded);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Validated endpoints.  Both are used verbatim; normalisation happens before
/// a connector ever sees them.
#[derive(Debug, Clone)]
pub struct SmUrls {
    pub api_url: String,
    pub identity_url: String,
}

impl SmUrls {
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, SmApiError> {
        Ok(Self {
            api_url: validate_url("api", &settings.api_url)?,
            identity_url: validate_url("identity", &settings.identity_url)?,
        })
    }
}

fn validate_url(which: &str, raw: &str) -> Result<String, SmApiError> {
    let url = Url::parse(raw).map_err(|e| SmApiError::InvalidUrl(format!("{which} URL '{raw}': {e}")))?;
    if url.scheme() != "https" {
        return Err(SmApiError::InvalidUrl(format!("{which} URL '{raw}' must use https")));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

pub struct SmApiClient {
    http: HttpClient,
    urls: SmUrls,
}

impl SmApiClient {
    pub fn new(urls: SmUrls) -> Result<Self, SmApiError> {
        let http = HttpClient::builder()
            .user_agent(format!("{CLIENT_NAME}/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .https_only(true)
            .build()
            .map_err(SmApiError::Http)?;
        Ok(Self::with_http(http, urls))
    }

    /// Use a caller-built HTTP client.  `urls` are taken as given.
    pub(crate) fn with_http(http: HttpClient, urls: SmUrls) -> Self {
        Self { http, urls }
    }

    /// client_credentials login.  Returns the bearer JWT and the encrypted
    /// organisation key payload.
    pub async fn login(&self, token: &AccessToken) -> Result<LoginResponse, SmApiError> {
        let mut form = HashMap::new();
        form.insert("grant_type", "client_credentials".to_string());
        form.insert("scope", "api.secrets".to_string());
        form.insert("client_id", token.access_token_id.to_string());
        form.insert("client_secret", token.client_secret.as_str().to_string());

        debug!("SM login request");

        let resp = self
            .http
            .post(&self.urls.identity_url)
            // DeviceType::SDK
            .header("Device-Type", "21")
            .header("Bitwarden-Client-Name", CLIENT_NAME)
            .header("Bitwarden-Client-Version", env!("CARGO_PKG_VERSION"))
            .form(&form)
            .send()
            .await
            .map_err(SmApiError::Http)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SmApiError::Api(format!("SM login failed ({status}): {body}")));
        }

        let login: LoginResponse = resp.json().await.map_err(SmApiError::Http)?;
        debug!("SM login ok");
        Ok(login)
    }

    fn request(&self, method: Method, path: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.urls.api_url))
            .bearer_auth(bearer)
            .header("Bitwarden-Client-Name", CLIENT_NAME)
            .header("Bitwarden-Client-Version", env!("CARGO_PKG_VERSION"))
    }

    /// Send `req` and decode a JSON body.  404 maps to [`SmApiError::NotFound`]
    /// naming `what`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        what: &str,
    ) -> Result<T, SmApiError> {
        let resp = req.send().await.map_err(SmApiError::Http)?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SmApiError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SmApiError::Api(format!("{what} failed ({status}): {body}")));
        }
        resp.json().await.map_err(SmApiError::Http)
    }

    // -- projects ----------------------------------------------------------

    pub async fn get_project(&self, bearer: &str, id: Uuid) -> Result<RawProject, SmApiError> {
        debug!(%id, "SM get project");
        let req = self.request(Method::GET, &format!("/projects/{id}"), bearer);
        self.send_json(req, &format!("project {id}")).await
    }

    pub async fn create_project(
        &self,
        bearer: &str,
        org_id: Uuid,
        body: &ProjectWriteRequest,
    ) -> Result<RawProject, SmApiError> {
        debug!(%org_id, "SM create project");
        let req = self
            .request(Method::POST, &format!("/organizations/{org_id}/projects"), bearer)
            .json(body);
        self.send_json(req, "create project").await
    }

    pub async fn update_project(
        &self,
        bearer: &str,
        id: Uuid,
        body: &ProjectWriteRequest,
    ) -> Result<RawProject, SmApiError> {
        debug!(%id, "SM update project");
        let req = self
            .request(Method::PUT, &format!("/projects/{id}"), bearer)
            .json(body);
        self.send_json(req, &format!("project {id}")).await
    }

    pub async fn delete_projects(
        &self,
        bearer: &str,
        ids: &[Uuid],
    ) -> Result<Vec<RawDeleteResult>, SmApiError> {
        debug!(count = ids.len(), "SM delete projects");
        let req = self.request(Method::POST, "/projects/delete", bearer).json(ids);
        let resp: DataResponse<RawDeleteResult> = self.send_json(req, "delete projects").await?;
        Ok(resp.data)
    }

    // -- secrets -----------------------------------------------------------

    pub async fn get_secret(&self, bearer: &str, id: Uuid) -> Result<RawSecret, SmApiError> {
        debug!(%id, "SM get secret");
        let req = self.request(Method::GET, &format!("/secrets/{id}"), bearer);
        self.send_json(req, &format!("secret {id}")).await
    }

    pub async fn create_secret(
        &self,
        bearer: &str,
        org_id: Uuid,
        body: &SecretWriteRequest,
    ) -> Result<RawSecret, SmApiError> {
        debug!(%org_id, "SM create secret");
        let req = self
            .request(Method::POST, &format!("/organizations/{org_id}/secrets"), bearer)
            .json(body);
        self.send_json(req, "create secret").await
    }

    pub async fn update_secret(
        &self,
        bearer: &str,
        id: Uuid,
        body: &SecretWriteRequest,
    ) -> Result<RawSecret, SmApiError> {
        debug!(%id, "SM update secret");
        let req = self
            .request(Method::PUT, &format!("/secrets/{id}"), bearer)
            .json(body);
        self.send_json(req, &format!("secret {id}")).await
    }

    pub async fn delete_secrets(&self, bearer: &str, ids: &[Uuid]) -> Result<Vec<RawDeleteResult>, SmApiError> {
        debug!(count = ids.len(), "SM delete secrets");
        let req = self.request(Method::POST, "/secrets/delete", bearer).json(ids);
        let resp: DataResponse<RawDeleteResult> = self.send_json(req, "delete secrets").await?;
        Ok(resp.data)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub encrypted_payload: String,
}

impl LoginResponse {
    /// Consume the response, wrapping the bearer token in a Zeroizing guard.
    pub fn into_zeroizing_token(self) -> (Zeroizing<String>, String) {
        (Zeroizing::new(self.access_token), self.encrypted_payload)
    }
}

/// Read the `organization` claim from a bearer JWT.
///
/// The signature is not checked; the token came straight from the identity
/// server over TLS.
pub fn organization_from_jwt(jwt: &str) -> Result<Uuid, SmApiError> {
    let payload_b64 = jwt
        .split('.')
        .nth(1)
        .ok_or(SmApiError::InvalidToken("bearer token is not a JWT"))?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .map_err(|_| SmApiError::InvalidToken("bearer token payload is not base64url"))?;

    #[derive(Deserialize)]
    struct Claims {
        organization: Option<String>,
    }

    let claims: Claims = serde_json::from_slice(&payload)
        .map_err(|_| SmApiError::InvalidToken("bearer token payload is not JSON"))?;
    claims
        .organization
        .ok_or(SmApiError::InvalidToken("bearer token has no organization claim"))?
        .parse()
        .map_err(|_| SmApiError::InvalidToken("organization claim is not a UUID"))
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: Vec<T>,
}

/// Project as returned by the API; `name` is an EncString.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProject {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub creation_date: DateTime<Utc>,
    pub revision_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProjectWriteRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RawDeleteResult {
    pub id: Uuid,
    pub error: Option<String>,
}

/// Secret as returned by the API; `key`, `value` and `note` are EncStrings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSecret {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub key: String,
    pub value: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub projects: Option<Vec<SecretProject>>,
    pub creation_date: DateTime<Utc>,
    pub revision_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SecretProject {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretWriteRequest {
    pub key: String,
    pub value: String,
    pub note: String,
    pub project_ids: Option<Vec<Uuid>>,
}
