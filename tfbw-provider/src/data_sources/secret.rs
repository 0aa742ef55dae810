use serde::{Deserialize, Serialize};
use tfbw_core::value::null_as_default;
use tfbw_core::{
    Attribute, AttributePath, ClientHandle, DataSource, DataSourceDescriptor,
    DataSourceReadRequest, Diagnostics, Schema, SecretRecord, StateResponse, TfString,
};
use tracing::debug;

use super::{joined_id, timestamp};

pub const DESCRIPTOR: DataSourceDescriptor = DataSourceDescriptor {
    type_suffix: "_secrets",
    schema,
    new,
};

fn new(client: ClientHandle) -> Box<dyn DataSource> {
    Box::new(SecretDataSource { client })
}

pub fn schema() -> Schema {
    Schema::new("Fetches a list of secrets by id.")
        .attribute("id", Attribute::string("Comma-joined ids of the secrets").computed())
        .attribute(
            "secrets",
            Attribute::list_nested(
                "Secrets to look up",
                [
                    ("id", Attribute::string("id of the secret").required()),
                    ("key", Attribute::string("key/name of the secret").computed()),
                    (
                        "value",
                        Attribute::string("value of the secret").computed().sensitive(),
                    ),
                    (
                        "note",
                        Attribute::string("note for the secret").computed().sensitive(),
                    ),
                    (
                        "organization_id",
                        Attribute::string("id of the organization associated with the secret")
                            .computed(),
                    ),
                    (
                        "project_id",
                        Attribute::string("id of the project the secret belongs to").computed(),
                    ),
                    (
                        "creation_date",
                        Attribute::string("date the secret was created").computed(),
                    ),
                    (
                        "revision_date",
                        Attribute::string("last date the secret was updated").computed(),
                    ),
                ],
            )
            .optional()
            .computed(),
        )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretsDataModel {
    #[serde(default)]
    pub id: TfString,
    #[serde(default, deserialize_with = "null_as_default")]
    pub secrets: Vec<SecretDataItem>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretDataItem {
    #[serde(default)]
    pub id: TfString,
    #[serde(default)]
    pub key: TfString,
    #[serde(default)]
    pub value: TfString,
    #[serde(default)]
    pub note: TfString,
    #[serde(default)]
    pub organization_id: TfString,
    #[serde(default)]
    pub project_id: TfString,
    #[serde(default)]
    pub creation_date: TfString,
    #[serde(default)]
    pub revision_date: TfString,
}

impl std::fmt::Debug for SecretDataItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretDataItem")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("value", &"[redacted]")
            .field("note", &"[redacted]")
            .field("organization_id", &self.organization_id)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl From<&SecretRecord> for SecretDataItem {
    fn from(record: &SecretRecord) -> Self {
        // Unassigned secrets report no project.
        let project_id = record
            .project_ids
            .first()
            .map_or(TfString::Null, |p| TfString::known(p.as_str()));
        Self {
            id: TfString::known(&record.id),
            key: TfString::known(&record.key),
            value: TfString::known(record.value.as_str()),
            note: TfString::known(record.note.as_str()),
            organization_id: TfString::known(&record.organization_id),
            project_id,
            creation_date: timestamp(&record.creation_date),
            revision_date: timestamp(&record.revision_date),
        }
    }
}

pub struct SecretDataSource {
    client: ClientHandle,
}

#[async_trait::async_trait]
impl DataSource for SecretDataSource {
    async fn read(&self, request: DataSourceReadRequest) -> StateResponse {
        let mut data: SecretsDataModel = match request.config.get() {
            Ok(data) => data,
            Err(diags) => return StateResponse::failed(diags),
        };

        let mut fetched = Vec::with_capacity(data.secrets.len());
        for (index, item) in data.secrets.iter().enumerate() {
            let id = item.id.value_str();
            match self.client.secrets().get(id).await {
                Ok(record) => fetched.push(SecretDataItem::from(&record)),
                Err(e) => {
                    debug!(secret_id = id, error = %e, "secret lookup failed");
                    return StateResponse::failed(Diagnostics::attribute_error(
                        AttributePath::root("secrets").index(index).attribute("id"),
                        "Unable to read secrets",
                        "Could not read one of the requested secrets. Check that every id exists \
                         and the access token can read it.",
                    ));
                }
            }
        }

        data.id = joined_id(data.secrets.iter().map(|s| s.id.value_str()));
        data.secrets = fetched;
        StateResponse::from_model(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryClient;
    use serde_json::json;
    use tfbw_core::DynamicValue;

    const PROJECT: &str = "5a1c9f3e-2d4b-4c6a-8e7f-9b0a1c2d3e4f";

    fn request(ids: &[&str]) -> DataSourceReadRequest {
        let items: Vec<_> = ids.iter().map(|id| json!({"id": id})).collect();
        DataSourceReadRequest {
            config: DynamicValue::from_json(json!({"id": null, "secrets": items})),
        }
    }

    #[tokio::test]
    async fn returns_decrypted_records_in_request_order() {
        let client = MemoryClient::new();
        let a = client.insert_secret("DB_PASS", "hunter2", "", &[PROJECT]);
        let b = client.insert_secret("API_KEY", "abc", "rotate", &[]);

        let resp = (DESCRIPTOR.new)(client.clone())
            .read(request(&[b.id.as_str(), a.id.as_str()]))
            .await;
        assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);

        let data: SecretsDataModel = resp.state.get().unwrap();
        assert_eq!(data.secrets.len(), 2);
        assert_eq!(data.secrets[0].key, TfString::known("API_KEY"));
        assert_eq!(data.secrets[0].note, TfString::known("rotate"));
        assert!(data.secrets[0].project_id.is_null());
        assert_eq!(data.secrets[1].value, TfString::known("hunter2"));
        assert_eq!(data.secrets[1].project_id, TfString::known(PROJECT));
        assert_eq!(data.id, TfString::known(format!("{},{}", b.id, a.id)));
        assert_eq!(
            client.calls(),
            [format!("secrets.get {}", b.id), format!("secrets.get {}", a.id)]
        );
    }

    #[tokio::test]
    async fn client_failure_fails_whole_read() {
        let client = MemoryClient::new();
        let a = client.insert_secret("K", "V", "", &[]);
        client.fail_with("unauthorized");

        let resp = (DESCRIPTOR.new)(client.clone()).read(request(&[a.id.as_str()])).await;

        assert!(resp.state.is_null());
        let diag = resp.diagnostics.iter().next().unwrap();
        assert_eq!(diag.summary, "Unable to read secrets");
        assert!(!diag.detail.contains("unauthorized"));
        assert!(!diag.detail.contains(&a.id));
    }

    #[test]
    fn redaction_hides_value_and_note() {
        let mut state = json!({
            "id": "x",
            "secrets": [{"id": "x", "key": "K", "value": "hunter2", "note": "n"}]
        });
        schema().redact(&mut state);
        let item = &state["secrets"][0];
        assert_eq!(item["key"], "K");
        assert_ne!(item["value"], "hunter2");
        assert_ne!(item["note"], "n");
    }
}
