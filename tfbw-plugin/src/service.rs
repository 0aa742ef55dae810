//! The `tfplugin6.Provider` gRPC service.
//!
//! [`PluginProvider`] owns a [`Provider`] and, after `ConfigureProvider`
//! succeeds, the [`ConfiguredProvider`] every resource and data source call
//! goes through.  Framework failures (unknown type names, undecodable values,
//! calls before configuration) are reported as error diagnostics; gRPC status
//! errors are never returned.

use std::collections::HashMap;
use std::sync::Arc;

use tfbw_core::{
    ConfigureRequest, ConfiguredProvider, CreateRequest, DataSourceReadRequest, DeleteRequest,
    Diagnostics, DynamicValue, ImportStateRequest, Provider, ProviderSchemas, ReadRequest, Schema,
    StateResponse, UpdateRequest,
};
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::proto::{
    self, ProviderRpc, apply_resource_change, configure_provider, get_metadata,
    get_provider_schema, import_resource_state, plan_resource_change, read_data_source,
    read_resource, stop_provider, upgrade_resource_state, validate_data_resource_config,
    validate_provider_config, validate_resource_config,
};
use crate::{codec, convert, plan};

type WireDiagnostics = Vec<proto::Diagnostic>;

pub struct PluginProvider {
    provider: Arc<dyn Provider>,
    schemas: ProviderSchemas,
    configured: RwLock<Option<Arc<ConfiguredProvider>>>,
}

impl PluginProvider {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        let schemas = ProviderSchemas::collect(provider.as_ref());
        Self {
            provider,
            schemas,
            configured: RwLock::new(None),
        }
    }

    fn capabilities() -> proto::ServerCapabilities {
        proto::ServerCapabilities {
            plan_destroy: true,
            get_provider_schema_optional: false,
            move_resource_state: false,
        }
    }

    fn resource_schema(&self, type_name: &str) -> Result<&Schema, WireDiagnostics> {
        self.schemas
            .resource_schemas
            .get(type_name)
            .ok_or_else(|| unknown_type("resource", type_name))
    }

    fn data_source_schema(&self, type_name: &str) -> Result<&Schema, WireDiagnostics> {
        self.schemas
            .data_source_schemas
            .get(type_name)
            .ok_or_else(|| unknown_type("data source", type_name))
    }

    async fn configured(&self) -> Result<Arc<ConfiguredProvider>, WireDiagnostics> {
        self.configured.read().await.clone().ok_or_else(|| {
            convert::diagnostics(&Diagnostics::error(
                "Provider not configured",
                "The provider was used before ConfigureProvider succeeded. \
                 Check the provider block for earlier errors.",
            ))
        })
    }

    async fn read(
        &self,
        request: &read_resource::Request,
    ) -> Result<(Option<proto::DynamicValue>, WireDiagnostics), WireDiagnostics> {
        let schema = self.resource_schema(&request.type_name)?;
        let configured = self.configured().await?;
        let resource = configured
            .resource(&request.type_name)
            .ok_or_else(|| unknown_type("resource", &request.type_name))?;
        let state = decode("current state", request.current_state.as_ref())?;
        Ok(respond(schema, resource.read(ReadRequest { state }).await))
    }

    fn plan(
        &self,
        request: &plan_resource_change::Request,
    ) -> Result<proto::DynamicValue, WireDiagnostics> {
        let schema = self.resource_schema(&request.type_name)?;
        let prior = decode("prior state", request.prior_state.as_ref())?;
        let proposed = decode("proposed new state", request.proposed_new_state.as_ref())?;
        let config = decode("config", request.config.as_ref())?;
        let planned = plan::planned_state(schema, &prior, &proposed, &config);
        encode("planned state", schema, &planned)
    }

    async fn apply(
        &self,
        request: &apply_resource_change::Request,
    ) -> Result<(Option<proto::DynamicValue>, WireDiagnostics), WireDiagnostics> {
        let schema = self.resource_schema(&request.type_name)?;
        let configured = self.configured().await?;
        let resource = configured
            .resource(&request.type_name)
            .ok_or_else(|| unknown_type("resource", &request.type_name))?;
        let prior = decode("prior state", request.prior_state.as_ref())?;
        let planned = decode("planned state", request.planned_state.as_ref())?;
        let config = decode("config", request.config.as_ref())?;

        let response = if planned.is_null() {
            let diagnostics = resource
                .delete(DeleteRequest {
                    prior_state: prior.clone(),
                })
                .await;
            let state = if diagnostics.has_error() {
                prior
            } else {
                DynamicValue::null()
            };
            StateResponse::keep(state, diagnostics)
        } else if prior.is_null() {
            resource
                .create(CreateRequest {
                    config,
                    plan: planned,
                })
                .await
        } else {
            resource
                .update(UpdateRequest {
                    config,
                    plan: planned,
                    prior_state: prior,
                })
                .await
        };
        Ok(respond(schema, response))
    }

    async fn import(
        &self,
        request: &import_resource_state::Request,
    ) -> Result<(Vec<import_resource_state::ImportedResource>, WireDiagnostics), WireDiagnostics>
    {
        let schema = self.resource_schema(&request.type_name)?;
        let configured = self.configured().await?;
        let resource = configured
            .resource(&request.type_name)
            .ok_or_else(|| unknown_type("resource", &request.type_name))?;
        let response = resource
            .import_state(ImportStateRequest {
                id: request.id.clone(),
            })
            .await;
        if response.diagnostics.has_error() {
            return Err(convert::diagnostics(&response.diagnostics));
        }
        let (state, diagnostics) = respond(schema, response);
        let imported = state
            .map(|state| import_resource_state::ImportedResource {
                type_name: request.type_name.clone(),
                state: Some(state),
                private: Vec::new(),
            })
            .into_iter()
            .collect();
        Ok((imported, diagnostics))
    }

    async fn read_data(
        &self,
        request: &read_data_source::Request,
    ) -> Result<(Option<proto::DynamicValue>, WireDiagnostics), WireDiagnostics> {
        self.data_source_schema(&request.type_name)?;
        let configured = self.configured().await?;
        let (schema, data_source) = configured
            .data_source(&request.type_name)
            .ok_or_else(|| unknown_type("data source", &request.type_name))?;
        let config = decode("config", request.config.as_ref())?;
        let response = data_source.read(DataSourceReadRequest { config }).await;
        Ok(respond(&schema, response))
    }

    fn upgrade(
        &self,
        request: &upgrade_resource_state::Request,
    ) -> Result<proto::DynamicValue, WireDiagnostics> {
        let schema = self.resource_schema(&request.type_name)?;
        let json = request
            .raw_state
            .as_ref()
            .map(|raw| raw.json.as_slice())
            .unwrap_or_default();
        let state = if json.is_empty() {
            DynamicValue::null()
        } else {
            let value = serde_json::from_slice(json).map_err(|e| {
                convert::codec_error("stored state", &crate::error::CodecError::Json(e))
            })?;
            DynamicValue::from_json(value)
        };
        // Re-encoding against the current schema drops attributes it no longer has.
        encode("upgraded state", schema, &state)
    }
}

fn unknown_type(kind: &str, type_name: &str) -> WireDiagnostics {
    convert::diagnostics(&Diagnostics::error(
        format!("Unknown {kind} type"),
        format!("This provider does not implement the {kind} type \"{type_name}\"."),
    ))
}

fn decode(
    what: &str,
    value: Option<&proto::DynamicValue>,
) -> Result<DynamicValue, WireDiagnostics> {
    codec::decode(value).map_err(|e| convert::codec_error(what, &e))
}

fn encode(
    what: &str,
    schema: &Schema,
    value: &DynamicValue,
) -> Result<proto::DynamicValue, WireDiagnostics> {
    codec::encode(schema, value).map_err(|e| convert::codec_error(what, &e))
}

/// Encode a callback's state, keeping its diagnostics ahead of any encoding error.
fn respond(
    schema: &Schema,
    response: StateResponse,
) -> (Option<proto::DynamicValue>, WireDiagnostics) {
    let mut diagnostics = convert::diagnostics(&response.diagnostics);
    match codec::encode(schema, &response.state) {
        Ok(state) => (Some(state), diagnostics),
        Err(e) => {
            diagnostics.extend(convert::codec_error("new state", &e));
            (None, diagnostics)
        }
    }
}

fn validate(what: &str, config: Option<&proto::DynamicValue>) -> WireDiagnostics {
    decode(what, config).err().unwrap_or_default()
}

#[tonic::async_trait]
impl ProviderRpc for PluginProvider {
    async fn get_metadata(
        &self,
        _request: Request<get_metadata::Request>,
    ) -> Result<Response<get_metadata::Response>, Status> {
        debug!("GetMetadata");
        Ok(Response::new(get_metadata::Response {
            server_capabilities: Some(Self::capabilities()),
            diagnostics: Vec::new(),
            data_sources: self
                .schemas
                .data_source_schemas
                .keys()
                .map(|type_name| get_metadata::DataSourceMetadata {
                    type_name: type_name.clone(),
                })
                .collect(),
            resources: self
                .schemas
                .resource_schemas
                .keys()
                .map(|type_name| get_metadata::ResourceMetadata {
                    type_name: type_name.clone(),
                })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<get_provider_schema::Request>,
    ) -> Result<Response<get_provider_schema::Response>, Status> {
        debug!("GetProviderSchema");
        let convert_all = |schemas: &std::collections::BTreeMap<String, Schema>| {
            schemas
                .iter()
                .map(|(name, schema)| (name.clone(), convert::schema(schema)))
                .collect::<HashMap<_, _>>()
        };
        Ok(Response::new(get_provider_schema::Response {
            provider: Some(convert::schema(&self.schemas.provider)),
            resource_schemas: convert_all(&self.schemas.resource_schemas),
            data_source_schemas: convert_all(&self.schemas.data_source_schemas),
            diagnostics: Vec::new(),
            provider_meta: None,
            server_capabilities: Some(Self::capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<validate_provider_config::Request>,
    ) -> Result<Response<validate_provider_config::Response>, Status> {
        let request = request.into_inner();
        debug!("ValidateProviderConfig");
        Ok(Response::new(validate_provider_config::Response {
            diagnostics: validate("provider config", request.config.as_ref()),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<validate_resource_config::Request>,
    ) -> Result<Response<validate_resource_config::Response>, Status> {
        let request = request.into_inner();
        debug!(type_name = %request.type_name, "ValidateResourceConfig");
        let diagnostics = match self.resource_schema(&request.type_name) {
            Ok(_) => validate("config", request.config.as_ref()),
            Err(diagnostics) => diagnostics,
        };
        Ok(Response::new(validate_resource_config::Response { diagnostics }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<validate_data_resource_config::Request>,
    ) -> Result<Response<validate_data_resource_config::Response>, Status> {
        let request = request.into_inner();
        debug!(type_name = %request.type_name, "ValidateDataResourceConfig");
        let diagnostics = match self.data_source_schema(&request.type_name) {
            Ok(_) => validate("config", request.config.as_ref()),
            Err(diagnostics) => diagnostics,
        };
        Ok(Response::new(validate_data_resource_config::Response { diagnostics }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<upgrade_resource_state::Request>,
    ) -> Result<Response<upgrade_resource_state::Response>, Status> {
        let request = request.into_inner();
        debug!(type_name = %request.type_name, version = request.version, "UpgradeResourceState");
        let response = match self.upgrade(&request) {
            Ok(state) => upgrade_resource_state::Response {
                upgraded_state: Some(state),
                diagnostics: Vec::new(),
            },
            Err(diagnostics) => upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics,
            },
        };
        Ok(Response::new(response))
    }

    async fn configure_provider(
        &self,
        request: Request<configure_provider::Request>,
    ) -> Result<Response<configure_provider::Response>, Status> {
        let request = request.into_inner();
        debug!(terraform_version = %request.terraform_version, "ConfigureProvider");
        let config = match decode("provider config", request.config.as_ref()) {
            Ok(config) => config,
            Err(diagnostics) => {
                return Ok(Response::new(configure_provider::Response { diagnostics }));
            }
        };
        let diagnostics =
            match ConfiguredProvider::configure(self.provider.as_ref(), ConfigureRequest { config })
                .await
            {
                Ok(configured) => {
                    info!(
                        organization_id = %configured.client().organization_id(),
                        "provider configured"
                    );
                    *self.configured.write().await = Some(Arc::new(configured));
                    Vec::new()
                }
                Err(diagnostics) => {
                    warn!(errors = diagnostics.len(), "provider configuration failed");
                    convert::diagnostics(&diagnostics)
                }
            };
        Ok(Response::new(configure_provider::Response { diagnostics }))
    }

    async fn read_resource(
        &self,
        request: Request<read_resource::Request>,
    ) -> Result<Response<read_resource::Response>, Status> {
        let request = request.into_inner();
        debug!(type_name = %request.type_name, "ReadResource");
        let (new_state, diagnostics) = match self.read(&request).await {
            Ok(result) => result,
            Err(diagnostics) => (request.current_state.clone(), diagnostics),
        };
        Ok(Response::new(read_resource::Response {
            new_state,
            diagnostics,
            private: request.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<plan_resource_change::Request>,
    ) -> Result<Response<plan_resource_change::Response>, Status> {
        let request = request.into_inner();
        debug!(type_name = %request.type_name, "PlanResourceChange");
        let (planned_state, diagnostics) = match self.plan(&request) {
            Ok(planned) => (Some(planned), Vec::new()),
            Err(diagnostics) => (None, diagnostics),
        };
        Ok(Response::new(plan_resource_change::Response {
            planned_state,
            requires_replace: Vec::new(),
            planned_private: request.prior_private,
            diagnostics,
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<apply_resource_change::Request>,
    ) -> Result<Response<apply_resource_change::Response>, Status> {
        let request = request.into_inner();
        debug!(type_name = %request.type_name, "ApplyResourceChange");
        let (new_state, diagnostics) = match self.apply(&request).await {
            Ok(result) => result,
            Err(diagnostics) => (request.prior_state.clone(), diagnostics),
        };
        Ok(Response::new(apply_resource_change::Response {
            new_state,
            private: request.planned_private,
            diagnostics,
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<import_resource_state::Request>,
    ) -> Result<Response<import_resource_state::Response>, Status> {
        let request = request.into_inner();
        debug!(type_name = %request.type_name, "ImportResourceState");
        let (imported_resources, diagnostics) = match self.import(&request).await {
            Ok(result) => result,
            Err(diagnostics) => (Vec::new(), diagnostics),
        };
        Ok(Response::new(import_resource_state::Response {
            imported_resources,
            diagnostics,
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<read_data_source::Request>,
    ) -> Result<Response<read_data_source::Response>, Status> {
        let request = request.into_inner();
        debug!(type_name = %request.type_name, "ReadDataSource");
        let (state, diagnostics) = match self.read_data(&request).await {
            Ok(result) => result,
            Err(diagnostics) => (None, diagnostics),
        };
        Ok(Response::new(read_data_source::Response { state, diagnostics }))
    }

    async fn stop_provider(
        &self,
        _request: Request<stop_provider::Request>,
    ) -> Result<Response<stop_provider::Response>, Status> {
        debug!("StopProvider");
        Ok(Response::new(stop_provider::Response {
            error: String::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value as Json, json};
    use tfbw_core::value::UNKNOWN_VALUE;
    use tfbw_provider::BitwardenProvider;
    use tfbw_provider::testing::{MemoryConnector, ORG_ID};

    const PROJECT: &str = "bitwarden_project";

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn server(connector: MemoryConnector) -> PluginProvider {
        let provider = BitwardenProvider::new("test", connector).with_env(no_env);
        PluginProvider::new(Arc::new(provider))
    }

    fn wire(schema: &Schema, value: Json) -> Option<proto::DynamicValue> {
        Some(codec::encode(schema, &DynamicValue::from_json(value)).unwrap())
    }

    fn unwire(value: Option<proto::DynamicValue>) -> Json {
        codec::decode(value.as_ref()).unwrap().into_json()
    }

    fn summaries(diagnostics: &[proto::Diagnostic]) -> Vec<&str> {
        diagnostics.iter().map(|d| d.summary.as_str()).collect()
    }

    async fn configured(connector: MemoryConnector) -> PluginProvider {
        let server = server(connector);
        let config = wire(&server.schemas.provider, json!({"access_token": "tok"}));
        let resp = server
            .configure_provider(Request::new(configure_provider::Request {
                terraform_version: "1.9.0".into(),
                config,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
        server
    }

    async fn plan(
        server: &PluginProvider,
        prior: Option<proto::DynamicValue>,
        proposed: Option<proto::DynamicValue>,
    ) -> plan_resource_change::Response {
        server
            .plan_resource_change(Request::new(plan_resource_change::Request {
                type_name: PROJECT.into(),
                prior_state: prior,
                proposed_new_state: proposed.clone(),
                config: proposed,
                prior_private: b"opaque".to_vec(),
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner()
    }

    async fn apply(
        server: &PluginProvider,
        prior: Option<proto::DynamicValue>,
        planned: Option<proto::DynamicValue>,
    ) -> apply_resource_change::Response {
        server
            .apply_resource_change(Request::new(apply_resource_change::Request {
                type_name: PROJECT.into(),
                prior_state: prior,
                planned_state: planned.clone(),
                config: planned,
                planned_private: Vec::new(),
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner()
    }

    #[tokio::test]
    async fn metadata_lists_every_type() {
        let server = server(MemoryConnector::default());
        let resp = server
            .get_metadata(Request::new(get_metadata::Request {}))
            .await
            .unwrap()
            .into_inner();
        let resources: Vec<_> = resp.resources.iter().map(|r| r.type_name.as_str()).collect();
        let data_sources: Vec<_> = resp.data_sources.iter().map(|d| d.type_name.as_str()).collect();
        assert_eq!(resources, ["bitwarden_project", "bitwarden_secret"]);
        assert_eq!(data_sources, ["bitwarden_projects", "bitwarden_secrets"]);
        assert!(resp.server_capabilities.unwrap().plan_destroy);
    }

    #[tokio::test]
    async fn provider_schema_marks_access_token_sensitive() {
        let server = server(MemoryConnector::default());
        let resp = server
            .get_provider_schema(Request::new(get_provider_schema::Request {}))
            .await
            .unwrap()
            .into_inner();
        let provider = resp.provider.unwrap().block.unwrap();
        let token = provider
            .attributes
            .iter()
            .find(|a| a.name == "access_token")
            .unwrap();
        assert!(token.sensitive);
        assert_eq!(resp.resource_schemas.len(), 2);
        assert!(resp.data_source_schemas.contains_key("bitwarden_secrets"));
    }

    #[tokio::test]
    async fn calls_before_configure_keep_state() {
        let server = server(MemoryConnector::default());
        let schema = server.schemas.resource_schemas[PROJECT].clone();
        let current = wire(&schema, json!({"id": "t", "projects": []}));
        let resp = server
            .read_resource(Request::new(read_resource::Request {
                type_name: PROJECT.into(),
                current_state: current.clone(),
                private: Vec::new(),
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(summaries(&resp.diagnostics), ["Provider not configured"]);
        assert_eq!(resp.new_state, current);
    }

    #[tokio::test]
    async fn failed_configure_reports_diagnostics() {
        let connector = MemoryConnector::default();
        let server = server(connector.clone());
        let config = wire(&server.schemas.provider, json!({}));
        let resp = server
            .configure_provider(Request::new(configure_provider::Request {
                terraform_version: "1.9.0".into(),
                config,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(summaries(&resp.diagnostics)[0], "Missing Bitwarden access token");
        assert_eq!(
            resp.diagnostics[0].severity,
            proto::diagnostic::Severity::Error as i32
        );
        assert!(connector.last_call().is_none());
        assert!(server.configured().await.is_err());
    }

    #[tokio::test]
    async fn project_create_then_destroy() {
        let connector = MemoryConnector::default();
        let server = configured(connector.clone()).await;
        let schema = server.schemas.resource_schemas[PROJECT].clone();
        let config = wire(&schema, json!({"projects": [{"name": "web"}]}));

        let planned = plan(&server, None, config).await;
        assert!(planned.diagnostics.is_empty(), "{:?}", planned.diagnostics);
        assert_eq!(planned.planned_private, b"opaque");
        let planned_json = unwire(planned.planned_state.clone());
        assert_eq!(planned_json["id"], UNKNOWN_VALUE);
        assert_eq!(planned_json["projects"][0]["project_id"], UNKNOWN_VALUE);

        let created = apply(&server, None, planned.planned_state).await;
        assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
        let state = unwire(created.new_state.clone());
        let project_id = state["projects"][0]["project_id"].as_str().unwrap().to_string();
        assert!(!state["id"].as_str().unwrap().is_empty());
        assert_eq!(state["projects"][0]["organization_id"], ORG_ID);
        assert_eq!(connector.client.project(&project_id).unwrap().name, "web");

        let destroy = plan(&server, created.new_state.clone(), None).await;
        assert!(unwire(destroy.planned_state.clone()).is_null());

        let deleted = apply(&server, created.new_state, destroy.planned_state).await;
        assert!(deleted.diagnostics.is_empty(), "{:?}", deleted.diagnostics);
        assert!(unwire(deleted.new_state).is_null());
        assert!(connector.client.project(&project_id).is_none());
    }

    #[tokio::test]
    async fn failed_delete_keeps_prior_state() {
        let connector = MemoryConnector::default();
        let server = configured(connector.clone()).await;
        let schema = server.schemas.resource_schemas[PROJECT].clone();
        let project = connector.client.insert_project("web");
        connector.client.fail_delete_of(&project.id, "locked");
        let prior = wire(
            &schema,
            json!({
                "id": "tracking",
                "projects": [{
                    "name": "web",
                    "project_id": project.id,
                    "organization_id": ORG_ID
                }]
            }),
        );

        let resp = apply(&server, prior.clone(), wire(&schema, Json::Null)).await;
        assert!(!resp.diagnostics.is_empty());
        assert_eq!(resp.new_state, prior);
    }

    #[tokio::test]
    async fn data_source_reads_projects() {
        let connector = MemoryConnector::default();
        let server = configured(connector.clone()).await;
        let project = connector.client.insert_project("web");
        let schema = server.schemas.data_source_schemas["bitwarden_projects"].clone();

        let resp = server
            .read_data_source(Request::new(read_data_source::Request {
                type_name: "bitwarden_projects".into(),
                config: wire(&schema, json!({"projects": [{"id": project.id}]})),
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
        let state = unwire(resp.state);
        assert_eq!(state["projects"][0]["name"], "web");
        assert_eq!(state["projects"][0]["organization_id"], ORG_ID);
    }

    #[tokio::test]
    async fn import_returns_tracking_id_state() {
        let server = configured(MemoryConnector::default()).await;
        let resp = server
            .import_resource_state(Request::new(import_resource_state::Request {
                type_name: PROJECT.into(),
                id: "imported".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
        assert_eq!(resp.imported_resources.len(), 1);
        let imported = resp.imported_resources.into_iter().next().unwrap();
        assert_eq!(imported.type_name, PROJECT);
        assert_eq!(
            unwire(imported.state),
            json!({"id": "imported", "projects": null})
        );
    }

    #[tokio::test]
    async fn unknown_type_is_a_diagnostic() {
        let server = configured(MemoryConnector::default()).await;
        let resp = server
            .validate_resource_config(Request::new(validate_resource_config::Request {
                type_name: "bitwarden_folder".into(),
                config: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(summaries(&resp.diagnostics), ["Unknown resource type"]);
        assert!(resp.diagnostics[0].detail.contains("bitwarden_folder"));
    }

    #[tokio::test]
    async fn upgrade_drops_attributes_missing_from_schema() {
        let server = server(MemoryConnector::default());
        let resp = server
            .upgrade_resource_state(Request::new(upgrade_resource_state::Request {
                type_name: PROJECT.into(),
                version: 0,
                raw_state: Some(proto::RawState {
                    json: br#"{"id":"t","projects":[],"legacy":"x"}"#.to_vec(),
                    flatmap: HashMap::new(),
                }),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(resp.diagnostics.is_empty(), "{:?}", resp.diagnostics);
        assert_eq!(unwire(resp.upgraded_state), json!({"id": "t", "projects": []}));
    }
}
