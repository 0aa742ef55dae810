use serde::{Deserialize, Serialize};
use tfbw_core::value::null_as_default;
use tfbw_core::{
    Attribute, AttributePath, ClientHandle, DataSource, DataSourceDescriptor,
    DataSourceReadRequest, Diagnostics, ProjectRecord, Schema, StateResponse, TfString,
};
use tracing::debug;

use super::{joined_id, timestamp};

pub const DESCRIPTOR: DataSourceDescriptor = DataSourceDescriptor {
    type_suffix: "_projects",
    schema,
    new,
};

fn new(client: ClientHandle) -> Box<dyn DataSource> {
    Box::new(ProjectDataSource { client })
}

pub fn schema() -> Schema {
    Schema::new("Fetches a list of projects by id.")
        .attribute("id", Attribute::string("Comma-joined ids of the projects").computed())
        .attribute(
            "projects",
            Attribute::list_nested(
                "Projects to look up",
                [
                    ("id", Attribute::string("id of the project").required()),
                    ("name", Attribute::string("name of the project").computed()),
                    (
                        "organization_id",
                        Attribute::string("id of the organization associated with the project")
                            .computed(),
                    ),
                    (
                        "creation_date",
                        Attribute::string("date the project was created").computed(),
                    ),
                    (
                        "revision_date",
                        Attribute::string("last date the project was updated").computed(),
                    ),
                ],
            )
            .optional()
            .computed(),
        )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectsDataModel {
    #[serde(default)]
    pub id: TfString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: Vec<ProjectDataItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDataItem {
    #[serde(default)]
    pub id: TfString,
    #[serde(default)]
    pub name: TfString,
    #[serde(default)]
    pub organization_id: TfString,
    #[serde(default)]
    pub creation_date: TfString,
    #[serde(default)]
    pub revision_date: TfString,
}

impl From<&ProjectRecord> for ProjectDataItem {
    fn from(record: &ProjectRecord) -> Self {
        Self {
            id: TfString::known(&record.id),
            name: TfString::known(&record.name),
            organization_id: TfString::known(&record.organization_id),
            creation_date: timestamp(&record.creation_date),
            revision_date: timestamp(&record.revision_date),
        }
    }
}

pub struct ProjectDataSource {
    client: ClientHandle,
}

#[async_trait::async_trait]
impl DataSource for ProjectDataSource {
    async fn read(&self, request: DataSourceReadRequest) -> StateResponse {
        let mut data: ProjectsDataModel = match request.config.get() {
            Ok(data) => data,
            Err(diags) => return StateResponse::failed(diags),
        };

        let mut fetched = Vec::with_capacity(data.projects.len());
        for (index, item) in data.projects.iter().enumerate() {
            let id = item.id.value_str();
            match self.client.projects().get(id).await {
                Ok(record) => fetched.push(ProjectDataItem::from(&record)),
                Err(e) => {
                    debug!(project_id = id, error = %e, "project lookup failed");
                    return StateResponse::failed(Diagnostics::attribute_error(
                        AttributePath::root("projects").index(index).attribute("id"),
                        "Unable to read projects",
                        "Could not read one of the requested projects. Check that every id exists \
                         and the access token can read it.",
                    ));
                }
            }
        }

        data.id = joined_id(data.projects.iter().map(|p| p.id.value_str()));
        data.projects = fetched;
        StateResponse::from_model(&data)
    }
}
