use tfbw_core::{
    Attribute, ClientConnector, ConfigureRequest, ConfigureResponse, ConnectError,
    DataSourceDescriptor, Diagnostics, Provider, ProviderMetadata, ResourceDescriptor, Schema,
};
use tracing::{debug, info};

use crate::settings::{self, EnvLookup, ProviderModel};
use crate::{data_sources, resources};

pub const TYPE_NAME: &str = "bitwarden";

/// The Bitwarden Secrets Manager provider.
///
/// `C` builds and authenticates the client during configure.
pub struct BitwardenProvider<C> {
    version: String,
    connector: C,
    env: EnvLookup,
}

impl<C: ClientConnector> BitwardenProvider<C> {
    pub fn new(version: impl Into<String>, connector: C) -> Self {
        Self {
            version: version.into(),
            connector,
            env: settings::process_env,
        }
    }

    /// Replace the environment lookup used for fallback values.
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }
}

pub fn provider_schema() -> Schema {
    Schema::new("Interact with Bitwarden Secrets Manager.")
        .attribute(
            "api_url",
            Attribute::string(
                "URI for Bitwarden Secrets Manager API. May also be provided via BW_API_URL environment variable.",
            )
            .optional(),
        )
        .attribute(
            "identity_url",
            Attribute::string(
                "URI for the Bitwarden identity service. May also be provided via BW_IDENTITY_URL environment variable.",
            )
            .optional(),
        )
        .attribute(
            "access_token",
            Attribute::string(
                "Machine account access token. May also be provided via BW_ACCESS_TOKEN environment variable.",
            )
            .optional()
            .sensitive(),
        )
}

#[async_trait::async_trait]
impl<C: ClientConnector> Provider for BitwardenProvider<C> {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            type_name: TYPE_NAME,
            version: self.version.clone(),
        }
    }

    fn schema(&self) -> Schema {
        provider_schema()
    }

    async fn configure(&self, request: ConfigureRequest) -> ConfigureResponse {
        info!("Configuring Bitwarden client");

        let model: ProviderModel = match request.config.get() {
            Ok(model) => model,
            Err(diags) => return ConfigureResponse::failed(diags),
        };
        debug!(?model, "provider configuration decoded");

        let resolved = match settings::resolve(&model, self.env) {
            Ok(resolved) => resolved,
            Err(diags) => return ConfigureResponse::failed(diags),
        };

        let api_url = resolved.settings.api_url.as_str();
        let identity_url = resolved.settings.identity_url.as_str();
        debug!(bw_api_url = %api_url, bw_identity_url = %identity_url, "creating Bitwarden client");

        match self
            .connector
            .connect(&resolved.settings, &resolved.access_token)
            .await
        {
            Ok(client) => {
                info!(
                    bw_api_url = %api_url,
                    bw_identity_url = %identity_url,
                    organization_id = client.organization_id(),
                    success = true,
                    "Configured Bitwarden client"
                );
                ConfigureResponse {
                    diagnostics: Diagnostics::new(),
                    client: Some(client),
                }
            }
            Err(ConnectError::Build(e)) => ConfigureResponse::failed(Diagnostics::error(
                "Error while creating the bitwarden client",
                format!("validate the api and identity url are correct: {e}"),
            )),
            Err(ConnectError::Login(e)) => ConfigureResponse::failed(Diagnostics::error(
                "Unable to login to Bitwarden Secrets Manager",
                format!(
                    "Either the access token is not valid or there is some communication issues: {e}"
                ),
            )),
        }
    }

    fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![resources::project::DESCRIPTOR, resources::secret::DESCRIPTOR]
    }

    fn data_sources(&self) -> Vec<DataSourceDescriptor> {
        vec![
            data_sources::project::DESCRIPTOR,
            data_sources::secret::DESCRIPTOR,
        ]
    }
}
