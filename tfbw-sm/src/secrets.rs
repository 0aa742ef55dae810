use std::sync::Arc;

use tfbw_core::{ClientError, DeleteOutcome, SecretInput, SecretRecord, SecretsApi};
use tracing::debug;

use crate::SmSession;
use crate::api::{RawSecret, SecretWriteRequest};
use crate::error::SmApiError;
use crate::projects::delete_outcomes;

/// Secret operations of an authenticated session.
pub struct SmSecrets {
    session: Arc<SmSession>,
}

impl SmSecrets {
    pub(crate) fn new(session: Arc<SmSession>) -> Self {
        Self { session }
    }

    fn decrypt(&self, raw: RawSecret) -> Result<SecretRecord, SmApiError> {
        Ok(SecretRecord {
            id: raw.id.to_string(),
            organization_id: raw.organization_id.to_string(),
            project_ids: raw
                .projects
                .unwrap_or_default()
                .into_iter()
                .map(|p| p.id.to_string())
                .collect(),
            key: self.session.decrypt(&raw.key)?,
            value: self.session.decrypt_opt(raw.value.as_deref())?,
            note: self.session.decrypt_opt(raw.note.as_deref())?,
            creation_date: raw.creation_date,
            revision_date: raw.revision_date,
        })
    }

    fn write_request(&self, input: &SecretInput) -> Result<SecretWriteRequest, SmApiError> {
        let project_ids = SmSession::parse_ids("project", &input.project_ids)?;
        Ok(SecretWriteRequest {
            key: self.session.encrypt(&input.key)?,
            value: self.session.encrypt(&input.value)?,
            note: self.session.encrypt(&input.note)?,
            project_ids: (!project_ids.is_empty()).then_some(project_ids),
        })
    }
}

#[async_trait::async_trait]
impl SecretsApi for SmSecrets {
    async fn get(&self, id: &str) -> Result<SecretRecord, ClientError> {
        let id = SmSession::parse_id("secret", id)?;
        let raw = self.session.api.get_secret(&self.session.bearer, id).await?;
        Ok(self.decrypt(raw)?)
    }

    async fn create(&self, input: &SecretInput) -> Result<SecretRecord, ClientError> {
        let org_id = SmSession::parse_id("organization", &input.organization_id)?;
        let body = self.write_request(input)?;
        let raw = self
            .session
            .api
            .create_secret(&self.session.bearer, org_id, &body)
            .await?;
        debug!(id = %raw.id, "SM secret created");
        Ok(self.decrypt(raw)?)
    }

    async fn update(&self, id: &str, input: &SecretInput) -> Result<SecretRecord, ClientError> {
        let id = SmSession::parse_id("secret", id)?;
        SmSession::parse_id("organization", &input.organization_id)?;
        let body = self.write_request(input)?;
        let raw = self
            .session
            .api
            .update_secret(&self.session.bearer, id, &body)
            .await?;
        Ok(self.decrypt(raw)?)
    }

    async fn delete(&self, ids: &[String]) -> Result<Vec<DeleteOutcome>, ClientError> {
        let ids = SmSession::parse_ids("secret", ids)?;
        let results = self.session.api.delete_secrets(&self.session.bearer, &ids).await?;
        Ok(delete_outcomes(results))
    }
}
