use serde::{Deserialize, Serialize};
use tfbw_core::value::null_as_default;
use tfbw_core::{
    Attribute, AttributePath, ClientHandle, CreateRequest, DeleteRequest, Diagnostics, ProjectRecord,
    ReadRequest, Resource, ResourceDescriptor, Schema, StateResponse, TfString, UpdateRequest,
};
use tracing::{debug, trace};

use super::{delete_errors, tracking_id};

pub const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
    type_suffix: "_project",
    schema,
    new,
};

fn new(client: ClientHandle) -> Box<dyn Resource> {
    Box::new(ProjectResource { client })
}

pub fn schema() -> Schema {
    Schema::new("Project Resource")
        .attribute(
            "id",
            Attribute::string("Identifier of this set of projects")
                .computed()
                .use_state_for_unknown(),
        )
        .attribute(
            "projects",
            Attribute::list_nested(
                "Projects managed by this resource",
                [
                    ("name", Attribute::string("name of the project").required()),
                    (
                        "project_id",
                        Attribute::string("id of the project in bitwarden secrets manager")
                            .computed()
                            .use_state_for_unknown(),
                    ),
                    (
                        "organization_id",
                        Attribute::string("id of the organization associated with the project")
                            .optional()
                            .computed(),
                    ),
                ],
            )
            .required(),
        )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectResourceModel {
    #[serde(default)]
    pub id: TfString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: Vec<ProjectItemModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectItemModel {
    #[serde(default)]
    pub name: TfString,
    #[serde(default)]
    pub project_id: TfString,
    #[serde(default)]
    pub organization_id: TfString,
}

impl From<&ProjectRecord> for ProjectItemModel {
    fn from(record: &ProjectRecord) -> Self {
        Self {
            name: TfString::known(&record.name),
            project_id: TfString::known(&record.id),
            organization_id: TfString::known(&record.organization_id),
        }
    }
}

pub struct ProjectResource {
    client: ClientHandle,
}

impl ProjectResource {
    /// Planned organisation if set, else the one the client belongs to.
    fn organization_for(&self, item: &ProjectItemModel, prior: Option<&ProjectItemModel>) -> String {
        item.organization_id
            .non_empty()
            .or_else(|| prior.and_then(|p| p.organization_id.non_empty()))
            .unwrap_or_else(|| self.client.organization_id())
            .to_string()
    }

    async fn create_item(
        &self,
        index: usize,
        item: &ProjectItemModel,
        prior: Option<&ProjectItemModel>,
    ) -> Result<ProjectItemModel, Diagnostics> {
        let org = self.organization_for(item, prior);
        match self.client.projects().create(&org, item.name.value_str()).await {
            Ok(record) => {
                debug!(project_id = %record.id, "project created");
                Ok(ProjectItemModel::from(&record))
            }
            Err(e) => Err(Diagnostics::attribute_error(
                AttributePath::root("projects").index(index),
                "Error creating project",
                format!("Could not create project, unexpected error: {e}"),
            )),
        }
    }
}

#[async_trait::async_trait]
impl Resource for ProjectResource {
    async fn create(&self, request: CreateRequest) -> StateResponse {
        let mut data: ProjectResourceModel = match request.plan.get() {
            Ok(data) => data,
            Err(diags) => return StateResponse::failed(diags),
        };

        data.id = match tracking_id() {
            Ok(id) => TfString::known(id),
            Err(diags) => return StateResponse::failed(diags),
        };

        let mut created = Vec::with_capacity(data.projects.len());
        for (index, item) in data.projects.iter().enumerate() {
            match self.create_item(index, item, None).await {
                Ok(item) => created.push(item),
                Err(diags) => return StateResponse::failed(diags),
            }
        }
        data.projects = created;

        trace!(id = data.id.value_str(), count = data.projects.len(), "created project resource");
        StateResponse::from_model(&data)
    }

    async fn read(&self, request: ReadRequest) -> StateResponse {
        let mut data: ProjectResourceModel = match request.state.get() {
            Ok(data) => data,
            Err(diags) => return StateResponse::keep(request.state, diags),
        };

        let mut refreshed = Vec::with_capacity(data.projects.len());
        for (index, item) in data.projects.iter().enumerate() {
            match self.client.projects().get(item.project_id.value_str()).await {
                Ok(record) => refreshed.push(ProjectItemModel::from(&record)),
                Err(e) => {
                    return StateResponse::keep(
                        request.state,
                        Diagnostics::attribute_error(
                            AttributePath::root("projects").index(index).attribute("project_id"),
                            "Error reading project",
                            format!("Could not find project, unexpected error: {e}"),
                        ),
                    );
                }
            }
        }
        data.projects = refreshed;

        StateResponse::from_model(&data)
    }

    async fn update(&self, request: UpdateRequest) -> StateResponse {
        let mut data: ProjectResourceModel = match request.plan.get() {
            Ok(data) => data,
            Err(diags) => return StateResponse::keep(request.prior_state, diags),
        };
        let prior: ProjectResourceModel = match request.prior_state.get() {
            Ok(prior) => prior,
            Err(diags) => return StateResponse::keep(request.prior_state, diags),
        };

        if !data.id.is_known() {
            data.id = prior.id.clone();
        }

        let mut updated = Vec::with_capacity(data.projects.len());
        for (index, item) in data.projects.iter().enumerate() {
            let prior_item = prior.projects.get(index);
            let project_id = item
                .project_id
                .non_empty()
                .or_else(|| prior_item.and_then(|p| p.project_id.non_empty()));

            // Items appended to the list since the last apply have no id yet.
            let Some(project_id) = project_id else {
                match self.create_item(index, item, prior_item).await {
                    Ok(item) => updated.push(item),
                    Err(diags) => return StateResponse::keep(request.prior_state, diags),
                }
                continue;
            };

            let org = self.organization_for(item, prior_item);
            match self
                .client
                .projects()
                .update(project_id, &org, item.name.value_str())
                .await
            {
                Ok(record) => updated.push(ProjectItemModel::from(&record)),
                Err(e) => {
                    return StateResponse::keep(
                        request.prior_state,
                        Diagnostics::attribute_error(
                            AttributePath::root("projects").index(index),
                            "Error updating project",
                            format!("Could not update project, unexpected error: {e}"),
                        ),
                    );
                }
            }
        }

        // Items dropped from the list are deleted.
        let kept: Vec<&str> = updated.iter().map(|p| p.project_id.value_str()).collect();
        let removed: Vec<String> = prior
            .projects
            .iter()
            .filter_map(|p| p.project_id.non_empty())
            .filter(|id| !kept.contains(id))
            .map(str::to_string)
            .collect();
        data.projects = updated;

        let mut diags = Diagnostics::new();
        if !removed.is_empty() {
            match self.client.projects().delete(&removed).await {
                Ok(outcomes) => diags.append(delete_errors("project", &outcomes)),
                Err(e) => diags.add_error(
                    "Error deleting project",
                    format!("Could not delete project, unexpected error: {e}"),
                ),
            }
        }

        let mut response = StateResponse::from_model(&data);
        response.diagnostics.append(diags);
        response
    }

    async fn delete(&self, request: DeleteRequest) -> Diagnostics {
        let data: ProjectResourceModel = match request.prior_state.get() {
            Ok(data) => data,
            Err(diags) => return diags,
        };

        let ids: Vec<String> = data
            .projects
            .iter()
            .filter_map(|p| p.project_id.non_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Diagnostics::new();
        }

        match self.client.projects().delete(&ids).await {
            Ok(outcomes) => {
                debug!(count = outcomes.len(), "projects deleted");
                delete_errors("project", &outcomes)
            }
            Err(e) => Diagnostics::error(
                "Error deleting project",
                format!("Could not delete project, unexpected error: {e}"),
            ),
        }
    }
}
