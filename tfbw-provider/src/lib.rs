//! Bitwarden Secrets Manager Terraform provider.
//!
//! [`BitwardenProvider`] resolves the provider block against the environment,
//! connects a [`tfbw_core::SecretsManagerClient`] through the injected
//! connector and registers:
//!
//! - `bitwarden_project` / `bitwarden_secret` resources, each managing a list
//!   of items under one locally generated tracking id;
//! - `bitwarden_projects` / `bitwarden_secrets` data sources that look items
//!   up by id.

pub mod data_sources;
pub mod provider;
pub mod resources;
pub mod settings;

/// In-memory client and connector for tests, here and in the plugin server.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use provider::{BitwardenProvider, TYPE_NAME, provider_schema};
