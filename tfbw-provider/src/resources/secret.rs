use serde::{Deserialize, Serialize};
use tfbw_core::value::null_as_default;
use tfbw_core::{
    Attribute, AttributePath, ClientHandle, CreateRequest, DeleteRequest, Diagnostics, ReadRequest,
    Resource, ResourceDescriptor, Schema, SecretInput, SecretRecord, StateResponse, TfString,
    UpdateRequest,
};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::{delete_errors, tracking_id};

pub const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
    type_suffix: "_secret",
    schema,
    new,
};

fn new(client: ClientHandle) -> Box<dyn Resource> {
    Box::new(SecretResource { client })
}

pub fn schema() -> Schema {
    Schema::new("Secret Resource")
        .attribute(
            "id",
            Attribute::string("Identifier of this set of secrets")
                .computed()
                .use_state_for_unknown(),
        )
        .attribute(
            "secrets",
            Attribute::list_nested(
                "Secrets managed by this resource",
                [
                    ("key", Attribute::string("key/name of the secret").required()),
                    (
                        "value",
                        Attribute::string("value of the secret").required().sensitive(),
                    ),
                    (
                        "note",
                        Attribute::string("note for the secret").optional().sensitive(),
                    ),
                    (
                        "project_id",
                        Attribute::string("id of the project the secret belongs to").optional(),
                    ),
                    (
                        "secret_id",
                        Attribute::string("id of the secret in bitwarden secrets manager")
                            .computed()
                            .use_state_for_unknown(),
                    ),
                    (
                        "organization_id",
                        Attribute::string("id of the organization associated with the secret")
                            .optional()
                            .computed(),
                    ),
                ],
            )
            .required(),
        )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretResourceModel {
    #[serde(default)]
    pub id: TfString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub secrets: Vec<SecretItemModel>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretItemModel {
    #[serde(default)]
    pub key: TfString,
    #[serde(default)]
    pub value: TfString,
    #[serde(default)]
    pub note: TfString,
    #[serde(default)]
    pub project_id: TfString,
    #[serde(default)]
    pub secret_id: TfString,
    #[serde(default)]
    pub organization_id: TfString,
}

impl std::fmt::Debug for SecretItemModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretItemModel")
            .field("key", &self.key)
            .field("value", &"[redacted]")
            .field("note", &"[redacted]")
            .field("project_id", &self.project_id)
            .field("secret_id", &self.secret_id)
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

impl SecretItemModel {
    /// State for `record`.  Optional attributes that were null in `shape`
    /// stay null when the server reports them empty.
    fn from_record(record: &SecretRecord, shape: &SecretItemModel) -> Self {
        let project_id = record.project_ids.first().map(String::as_str).unwrap_or("");
        Self {
            key: TfString::known(&record.key),
            value: TfString::known(record.value.as_str()),
            note: TfString::known_or_null(&record.note, &shape.note),
            project_id: TfString::known_or_null(project_id, &shape.project_id),
            secret_id: TfString::known(&record.id),
            organization_id: TfString::known(&record.organization_id),
        }
    }
}

pub struct SecretResource {
    client: ClientHandle,
}

impl SecretResource {
    fn input(&self, item: &SecretItemModel, prior: Option<&SecretItemModel>) -> SecretInput {
        let organization_id = item
            .organization_id
            .non_empty()
            .or_else(|| prior.and_then(|p| p.organization_id.non_empty()))
            .unwrap_or_else(|| self.client.organization_id())
            .to_string();
        SecretInput {
            organization_id,
            key: item.key.value_str().to_string(),
            value: Zeroizing::new(item.value.value_str().to_string()),
            note: Zeroizing::new(item.note.value_str().to_string()),
            project_ids: item
                .project_id
                .non_empty()
                .map(|p| vec![p.to_string()])
                .unwrap_or_default(),
        }
    }

    async fn create_item(
        &self,
        index: usize,
        item: &SecretItemModel,
        prior: Option<&SecretItemModel>,
    ) -> Result<SecretItemModel, Diagnostics> {
        match self.client.secrets().create(&self.input(item, prior)).await {
            Ok(record) => {
                debug!(secret_id = %record.id, "secret created");
                Ok(SecretItemModel::from_record(&record, item))
            }
            Err(e) => Err(Diagnostics::attribute_error(
                AttributePath::root("secrets").index(index),
                "Error creating secret",
                format!("Could not create secret, unexpected error: {e}"),
            )),
        }
    }
}

#[async_trait::async_trait]
impl Resource for SecretResource {
    async fn create(&self, request: CreateRequest) -> StateResponse {
        let mut data: SecretResourceModel = match request.plan.get() {
            Ok(data) => data,
            Err(diags) => return StateResponse::failed(diags),
        };

        data.id = match tracking_id() {
            Ok(id) => TfString::known(id),
            Err(diags) => return StateResponse::failed(diags),
        };

        let mut created = Vec::with_capacity(data.secrets.len());
        for (index, item) in data.secrets.iter().enumerate() {
            match self.create_item(index, item, None).await {
                Ok(item) => created.push(item),
                Err(diags) => return StateResponse::failed(diags),
            }
        }
        data.secrets = created;

        trace!(id = data.id.value_str(), count = data.secrets.len(), "created secret resource");
        StateResponse::from_model(&data)
    }

    async fn read(&self, request: ReadRequest) -> StateResponse {
        let mut data: SecretResourceModel = match request.state.get() {
            Ok(data) => data,
            Err(diags) => return StateResponse::keep(request.state, diags),
        };

        let mut refreshed = Vec::with_capacity(data.secrets.len());
        for (index, item) in data.secrets.iter().enumerate() {
            match self.client.secrets().get(item.secret_id.value_str()).await {
                Ok(record) => refreshed.push(SecretItemModel::from_record(&record, item)),
                Err(e) => {
                    return StateResponse::keep(
                        request.state,
                        Diagnostics::attribute_error(
                            AttributePath::root("secrets").index(index).attribute("secret_id"),
                            "Error reading secret",
                            format!("Could not find secret, unexpected error: {e}"),
                        ),
                    );
                }
            }
        }
        data.secrets = refreshed;

        StateResponse::from_model(&data)
    }

    async fn update(&self, request: UpdateRequest) -> StateResponse {
        let mut data: SecretResourceModel = match request.plan.get() {
            Ok(data) => data,
            Err(diags) => return StateResponse::keep(request.prior_state, diags),
        };
        let prior: SecretResourceModel = match request.prior_state.get() {
            Ok(prior) => prior,
            Err(diags) => return StateResponse::keep(request.prior_state, diags),
        };

        if !data.id.is_known() {
            data.id = prior.id.clone();
        }

        let mut updated = Vec::with_capacity(data.secrets.len());
        for (index, item) in data.secrets.iter().enumerate() {
            let prior_item = prior.secrets.get(index);
            let secret_id = item
                .secret_id
                .non_empty()
                .or_else(|| prior_item.and_then(|p| p.secret_id.non_empty()));

            // Items appended to the list since the last apply have no id yet.
            let Some(secret_id) = secret_id else {
                match self.create_item(index, item, prior_item).await {
                    Ok(item) => updated.push(item),
                    Err(diags) => return StateResponse::keep(request.prior_state, diags),
                }
                continue;
            };

            let input = self.input(item, prior_item);
            match self.client.secrets().update(secret_id, &input).await {
                Ok(record) => updated.push(SecretItemModel::from_record(&record, item)),
                Err(e) => {
                    return StateResponse::keep(
                        request.prior_state,
                        Diagnostics::attribute_error(
                            AttributePath::root("secrets").index(index),
                            "Error updating secret",
                            format!("Could not update secret, unexpected error: {e}"),
                        ),
                    );
                }
            }
        }

        let kept: Vec<&str> = updated.iter().map(|s| s.secret_id.value_str()).collect();
        let removed: Vec<String> = prior
            .secrets
            .iter()
            .filter_map(|s| s.secret_id.non_empty())
            .filter(|id| !kept.contains(id))
            .map(str::to_string)
            .collect();
        data.secrets = updated;

        let mut diags = Diagnostics::new();
        if !removed.is_empty() {
            match self.client.secrets().delete(&removed).await {
                Ok(outcomes) => diags.append(delete_errors("secret", &outcomes)),
                Err(e) => diags.add_error(
                    "Error deleting secret",
                    format!("Could not delete secret, unexpected error: {e}"),
                ),
            }
        }

        let mut response = StateResponse::from_model(&data);
        response.diagnostics.append(diags);
        response
    }

    async fn delete(&self, request: DeleteRequest) -> Diagnostics {
        let data: SecretResourceModel = match request.prior_state.get() {
            Ok(data) => data,
            Err(diags) => return diags,
        };

        let ids: Vec<String> = data
            .secrets
            .iter()
            .filter_map(|s| s.secret_id.non_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Diagnostics::new();
        }

        match self.client.secrets().delete(&ids).await {
            Ok(outcomes) => {
                debug!(count = outcomes.len(), "secrets deleted");
                delete_errors("secret", &outcomes)
            }
            Err(e) => Diagnostics::error(
                "Error deleting secret",
                format!("Could not delete secret, unexpected error: {e}"),
            ),
        }
    }
}
