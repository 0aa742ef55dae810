use std::sync::Arc;

use tfbw_core::{ClientError, DeleteOutcome, ProjectRecord, ProjectsApi};
use tracing::debug;

use crate::SmSession;
use crate::api::{ProjectWriteRequest, RawDeleteResult, RawProject};
use crate::error::SmApiError;

/// Project operations of an authenticated session.
pub struct SmProjects {
    session: Arc<SmSession>,
}

impl SmProjects {
    pub(crate) fn new(session: Arc<SmSession>) -> Self {
        Self { session }
    }

    fn decrypt(&self, raw: RawProject) -> Result<ProjectRecord, SmApiError> {
        Ok(ProjectRecord {
            id: raw.id.to_string(),
            organization_id: raw.organization_id.to_string(),
            name: self.session.decrypt(&raw.name)?,
            creation_date: raw.creation_date,
            revision_date: raw.revision_date,
        })
    }

    fn write_request(&self, name: &str) -> Result<ProjectWriteRequest, SmApiError> {
        Ok(ProjectWriteRequest {
            name: self.session.encrypt(name)?,
        })
    }
}

pub(crate) fn delete_outcomes(results: Vec<RawDeleteResult>) -> Vec<DeleteOutcome> {
    results
        .into_iter()
        .map(|r| DeleteOutcome {
            id: r.id.to_string(),
            error: r.error.filter(|e| !e.is_empty()),
        })
        .collect()
}

#[async_trait::async_trait]
impl ProjectsApi for SmProjects {
    async fn get(&self, id: &str) -> Result<ProjectRecord, ClientError> {
        let id = SmSession::parse_id("project", id)?;
        let raw = self.session.api.get_project(&self.session.bearer, id).await?;
        Ok(self.decrypt(raw)?)
    }

    async fn create(&self, organization_id: &str, name: &str) -> Result<ProjectRecord, ClientError> {
        let org_id = SmSession::parse_id("organization", organization_id)?;
        let body = self.write_request(name)?;
        let raw = self
            .session
            .api
            .create_project(&self.session.bearer, org_id, &body)
            .await?;
        debug!(id = %raw.id, "SM project created");
        Ok(self.decrypt(raw)?)
    }

    async fn update(
        &self,
        id: &str,
        organization_id: &str,
        name: &str,
    ) -> Result<ProjectRecord, ClientError> {
        let id = SmSession::parse_id("project", id)?;
        // The endpoint is keyed by project id alone; the organisation is
        // still validated so a malformed value is reported.
        SmSession::parse_id("organization", organization_id)?;
        let body = self.write_request(name)?;
        let raw = self
            .session
            .api
            .update_project(&self.session.bearer, id, &body)
            .await?;
        Ok(self.decrypt(raw)?)
    }

    async fn delete(&self, ids: &[String]) -> Result<Vec<DeleteOutcome>, ClientError> {
        let ids = SmSession::parse_ids("project", ids)?;
        let results = self.session.api.delete_projects(&self.session.bearer, &ids).await?;
        Ok(delete_outcomes(results))
    }
}
