//! Core types for the Bitwarden Secrets Manager Terraform provider.
//!
//! This crate is the seam between two external collaborators:
//!
//! - the plugin framework, seen here as typed values ([`TfString`],
//!   [`DynamicValue`]), [`Schema`]s, [`Diagnostics`] and the
//!   [`Provider`] / [`Resource`] / [`DataSource`] traits the plugin server
//!   (`tfbw-plugin`) drives;
//! - the Secrets Manager client, seen as the [`client`] traits.
//!
//! Resources and data sources receive the authenticated client through their
//! constructor ([`ResourceDescriptor::new`]); there is no untyped configure
//! payload to downcast.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

pub mod client;
pub mod diag;
pub mod dynamic;
pub mod schema;
pub mod value;

pub use client::{
    ClientConnector, ClientError, ClientSettings, ConnectError, DeleteOutcome, ProjectRecord,
    ProjectsApi, SecretInput, SecretRecord, SecretsApi, SecretsManagerClient,
};
pub use diag::{AttributePath, Diagnostic, Diagnostics, Severity};
pub use dynamic::DynamicValue;
pub use schema::{Attribute, Schema};
pub use value::TfString;

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub type_name: &'static str,
    pub version: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigureRequest {
    pub config: DynamicValue,
}

/// Result of provider configuration.
///
/// `client` is `Some` only when `diagnostics` holds no error.
#[derive(Default)]
pub struct ConfigureResponse {
    pub diagnostics: Diagnostics,
    pub client: Option<Arc<dyn SecretsManagerClient>>,
}

impl ConfigureResponse {
    pub fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            diagnostics,
            client: None,
        }
    }
}

impl std::fmt::Debug for ConfigureResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigureResponse")
            .field("diagnostics", &self.diagnostics)
            .field("client", &self.client.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub config: DynamicValue,
    pub plan: DynamicValue,
}

#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    pub state: DynamicValue,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub config: DynamicValue,
    pub plan: DynamicValue,
    pub prior_state: DynamicValue,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    pub prior_state: DynamicValue,
}

#[derive(Debug, Clone, Default)]
pub struct ImportStateRequest {
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct DataSourceReadRequest {
    pub config: DynamicValue,
}

/// New state plus diagnostics, returned by every state-producing callback.
#[derive(Debug, Clone, Default)]
pub struct StateResponse {
    pub state: DynamicValue,
    pub diagnostics: Diagnostics,
}

impl StateResponse {
    /// Encode `model` as the new state.
    pub fn from_model<T: Serialize>(model: &T) -> Self {
        match DynamicValue::from_model(model) {
            Ok(state) => Self {
                state,
                diagnostics: Diagnostics::new(),
            },
            Err(diagnostics) => Self::failed(diagnostics),
        }
    }

    /// An error response with a null state.
    pub fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            state: DynamicValue::null(),
            diagnostics,
        }
    }

    /// An error response that keeps `state` unchanged.
    pub fn keep(state: DynamicValue, diagnostics: Diagnostics) -> Self {
        Self { state, diagnostics }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    async fn create(&self, request: CreateRequest) -> StateResponse;
    async fn read(&self, request: ReadRequest) -> StateResponse;
    async fn update(&self, request: UpdateRequest) -> StateResponse;
    async fn delete(&self, request: DeleteRequest) -> Diagnostics;

    /// The default copies the import id into the `id` attribute.
    async fn import_state(&self, request: ImportStateRequest) -> StateResponse {
        import_state_passthrough_id("id", &request)
    }
}

#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    async fn read(&self, request: DataSourceReadRequest) -> StateResponse;
}

pub type ClientHandle = Arc<dyn SecretsManagerClient>;

/// Static description of a resource type plus its constructor.
#[derive(Clone, Copy)]
pub struct ResourceDescriptor {
    /// Appended to the provider type name, e.g. `"_project"`.
    pub type_suffix: &'static str,
    pub schema: fn() -> Schema,
    pub new: fn(ClientHandle) -> Box<dyn Resource>,
}

impl ResourceDescriptor {
    pub fn type_name(&self, provider_type_name: &str) -> String {
        format!("{provider_type_name}{}", self.type_suffix)
    }
}

/// Static description of a data source type plus its constructor.
#[derive(Clone, Copy)]
pub struct DataSourceDescriptor {
    pub type_suffix: &'static str,
    pub schema: fn() -> Schema,
    pub new: fn(ClientHandle) -> Box<dyn DataSource>,
}

impl DataSourceDescriptor {
    pub fn type_name(&self, provider_type_name: &str) -> String {
        format!("{provider_type_name}{}", self.type_suffix)
    }
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn metadata(&self) -> ProviderMetadata;
    fn schema(&self) -> Schema;

    /// Validate configuration and produce the shared client.
    async fn configure(&self, request: ConfigureRequest) -> ConfigureResponse;

    fn resources(&self) -> Vec<ResourceDescriptor>;
    fn data_sources(&self) -> Vec<DataSourceDescriptor>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// State holding only `attribute = request.id`; the following read fills in
/// the rest.
pub fn import_state_passthrough_id(attribute: &str, request: &ImportStateRequest) -> StateResponse {
    let mut state = DynamicValue::null();
    let diagnostics = state.set_attribute(attribute, TfString::known(request.id.clone()));
    StateResponse { state, diagnostics }
}

/// A provider after a successful configure: the shared client plus the
/// registered resource and data source types.
pub struct ConfiguredProvider {
    type_name: &'static str,
    client: ClientHandle,
    resources: Vec<ResourceDescriptor>,
    data_sources: Vec<DataSourceDescriptor>,
}

impl ConfiguredProvider {
    /// Run `provider.configure` and keep the resulting client.
    pub async fn configure(
        provider: &dyn Provider,
        request: ConfigureRequest,
    ) -> Result<Self, Diagnostics> {
        let response = provider.configure(request).await;
        let client = match response.client {
            Some(client) if !response.diagnostics.has_error() => client,
            _ => return Err(response.diagnostics),
        };
        Ok(Self {
            type_name: provider.metadata().type_name,
            client,
            resources: provider.resources(),
            data_sources: provider.data_sources(),
        })
    }

    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    /// Instantiate the resource registered under `type_name`.
    pub fn resource(&self, type_name: &str) -> Option<Box<dyn Resource>> {
        self.resources
            .iter()
            .find(|r| r.type_name(self.type_name) == type_name)
            .map(|r| (r.new)(Arc::clone(&self.client)))
    }

    /// Instantiate the data source registered under `type_name`, with its schema.
    pub fn data_source(&self, type_name: &str) -> Option<(Schema, Box<dyn DataSource>)> {
        self.data_sources
            .iter()
            .find(|d| d.type_name(self.type_name) == type_name)
            .map(|d| ((d.schema)(), (d.new)(Arc::clone(&self.client))))
    }
}

impl std::fmt::Debug for ConfiguredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredProvider")
            .field("type_name", &self.type_name)
            .field("organization_id", &self.client.organization_id())
            .finish()
    }
}

/// Every schema a provider exposes, keyed by full type name.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSchemas {
    pub provider: Schema,
    pub resource_schemas: BTreeMap<String, Schema>,
    pub data_source_schemas: BTreeMap<String, Schema>,
}

impl ProviderSchemas {
    pub fn collect(provider: &dyn Provider) -> Self {
        let type_name = provider.metadata().type_name;
        Self {
            provider: provider.schema(),
            resource_schemas: provider
                .resources()
                .iter()
                .map(|r| (r.type_name(type_name), (r.schema)()))
                .collect(),
            data_source_schemas: provider
                .data_sources()
                .iter()
                .map(|d| (d.type_name(type_name), (d.schema)()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn import_passthrough_sets_id_only() {
        let resp = import_state_passthrough_id(
            "id",
            &ImportStateRequest {
                id: "tracking-1".to_string(),
            },
        );
        assert!(resp.diagnostics.is_empty());
        assert_eq!(resp.state.as_json(), &json!({"id": "tracking-1"}));
    }

    #[test]
    fn failed_state_response_is_null() {
        let resp = StateResponse::failed(Diagnostics::error("boom", ""));
        assert!(resp.state.is_null());
        assert!(resp.diagnostics.has_error());
    }

    #[test]
    fn descriptor_type_name_appends_suffix() {
        fn schema() -> Schema {
            Schema::new("x")
        }
        struct Noop;
        #[async_trait::async_trait]
        impl DataSource for Noop {
            async fn read(&self, _request: DataSourceReadRequest) -> StateResponse {
                StateResponse::default()
            }
        }
        let d = DataSourceDescriptor {
            type_suffix: "_projects",
            schema,
            new: |_| Box::new(Noop),
        };
        assert_eq!(d.type_name("bitwarden"), "bitwarden_projects");
    }
}
