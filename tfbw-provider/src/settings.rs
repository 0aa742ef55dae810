//! Provider configuration: precedence, validation and endpoint normalisation.
//!
//! Each setting resolves as: explicit config value (even when empty), then
//! the environment variable when set and non-empty, then the built-in
//! default.  The access token has no default.

use serde::{Deserialize, Serialize};
use tfbw_core::{AttributePath, ClientSettings, Diagnostics, TfString};
use zeroize::Zeroizing;

pub const DEFAULT_API_URL: &str = "https://api.bitwarden.com";
pub const DEFAULT_IDENTITY_URL: &str = "https://identity.bitwarden.com";

pub const ENV_API_URL: &str = "BW_API_URL";
pub const ENV_IDENTITY_URL: &str = "BW_IDENTITY_URL";
pub const ENV_ACCESS_TOKEN: &str = "BW_ACCESS_TOKEN";

const SAAS_API_HOSTS: &[&str] = &["https://api.bitwarden.com", "https://api.bitwarden.eu"];
const SAAS_IDENTITY_HOSTS: &[&str] = &[
    "https://identity.bitwarden.com",
    "https://identity.bitwarden.eu",
];

/// Environment variable lookup.
pub type EnvLookup = fn(&str) -> Option<String>;

/// Reads the real process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Provider block as decoded from configuration.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderModel {
    #[serde(default)]
    pub api_url: TfString,
    #[serde(default)]
    pub identity_url: TfString,
    #[serde(default)]
    pub access_token: TfString,
}

impl std::fmt::Debug for ProviderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match &self.access_token {
            TfString::Known(_) => "[redacted]",
            TfString::Unknown => "unknown",
            TfString::Null => "null",
        };
        f.debug_struct("ProviderModel")
            .field("api_url", &self.api_url)
            .field("identity_url", &self.identity_url)
            .field("access_token", &token)
            .finish()
    }
}

/// Fully resolved and normalised configuration.
pub struct ResolvedConfig {
    pub settings: ClientSettings,
    pub access_token: Zeroizing<String>,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("settings", &self.settings)
            .field("access_token", &"[redacted]")
            .finish()
    }
}

struct Setting {
    attribute: &'static str,
    label: &'static str,
    env: &'static str,
}

const API_URL: Setting = Setting {
    attribute: "api_url",
    label: "Bitwarden API url",
    env: ENV_API_URL,
};
const IDENTITY_URL: Setting = Setting {
    attribute: "identity_url",
    label: "Bitwarden Identity url",
    env: ENV_IDENTITY_URL,
};
const ACCESS_TOKEN: Setting = Setting {
    attribute: "access_token",
    label: "Bitwarden access token",
    env: ENV_ACCESS_TOKEN,
};

/// Resolve `model` against the environment and defaults.
///
/// All problems are reported together as attribute errors; no client is
/// built when any is present.
pub fn resolve(model: &ProviderModel, env: EnvLookup) -> Result<ResolvedConfig, Diagnostics> {
    let mut diags = Diagnostics::new();

    for (setting, value) in [
        (&API_URL, &model.api_url),
        (&IDENTITY_URL, &model.identity_url),
        (&ACCESS_TOKEN, &model.access_token),
    ] {
        if value.is_unknown() {
            diags.add_attribute_error(
                AttributePath::root(setting.attribute),
                format!("Unknown {}", setting.label),
                format!(
                    "The provider cannot create the Bitwarden client as there is an unknown \
                     configuration value for the {}. Either target apply the source of the value \
                     first, set the value statically in the configuration, or use the {} \
                     environment variable.",
                    setting.label, setting.env
                ),
            );
        }
    }
    if diags.has_error() {
        return Err(diags);
    }

    let api_url = pick(&model.api_url, API_URL.env, env).unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let identity_url = pick(&model.identity_url, IDENTITY_URL.env, env)
        .unwrap_or_else(|| DEFAULT_IDENTITY_URL.to_string());
    let access_token = Zeroizing::new(pick(&model.access_token, ACCESS_TOKEN.env, env).unwrap_or_default());

    if access_token.is_empty() {
        diags.add_attribute_error(
            AttributePath::root(ACCESS_TOKEN.attribute),
            "Missing Bitwarden access token",
            "The provider cannot create the Bitwarden client as there is a missing or empty value \
             for the access token. Set the access token in the configuration or use the \
             BW_ACCESS_TOKEN environment variable.",
        );
    }
    check_url(&API_URL, &api_url, &mut diags);
    check_url(&IDENTITY_URL, &identity_url, &mut diags);
    if diags.has_error() {
        return Err(diags);
    }

    Ok(ResolvedConfig {
        settings: ClientSettings {
            api_url: normalize_api_url(&api_url),
            identity_url: normalize_identity_url(&identity_url),
        },
        access_token,
    })
}

/// Config value if not null, else a non-empty environment value.
fn pick(value: &TfString, env_name: &str, env: EnvLookup) -> Option<String> {
    match value {
        TfString::Known(v) => Some(v.clone()),
        TfString::Null | TfString::Unknown => env(env_name).filter(|v| !v.is_empty()),
    }
}

fn check_url(setting: &Setting, url: &str, diags: &mut Diagnostics) {
    if url.is_empty() {
        diags.add_attribute_error(
            AttributePath::root(setting.attribute),
            format!("Missing {}", setting.label),
            format!(
                "The {} is empty. Remove it from the configuration to use the default endpoint.",
                setting.label
            ),
        );
    } else if !url.starts_with("https://") {
        diags.add_attribute_error(
            AttributePath::root(setting.attribute),
            format!("Invalid {}", setting.label),
            format!("'{url}' is not an https URL. The access token is only sent over TLS."),
        );
    }
}

/// Append `/api` to the Bitwarden cloud API hosts; other URLs are used as given.
pub fn normalize_api_url(raw: &str) -> String {
    let url = raw.trim_end_matches('/');
    if SAAS_API_HOSTS.contains(&url) {
        format!("{url}/api")
    } else {
        url.to_string()
    }
}

/// Append the token endpoint path: `/connect/token` for the cloud identity
/// hosts and URLs already ending in `/identity`, `/identity/connect/token`
/// for other self-hosted base URLs.
pub fn normalize_identity_url(raw: &str) -> String {
    let url = raw.trim_end_matches('/');
    if url.ends_with("/connect/token") {
        url.to_string()
    } else if SAAS_IDENTITY_HOSTS.contains(&url) || url.ends_with("/identity") {
        format!("{url}/connect/token")
    } else {
        format!("{url}/identity/connect/token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn full_env(name: &str) -> Option<String> {
        match name {
            ENV_API_URL => Some("https://vault.example.com".to_string()),
            ENV_IDENTITY_URL => Some("https://vault.example.com".to_string()),
            ENV_ACCESS_TOKEN => Some("env-token".to_string()),
            _ => None,
        }
    }

    fn empty_env(_: &str) -> Option<String> {
        Some(String::new())
    }

    fn token_only(token: &str) -> ProviderModel {
        ProviderModel {
            access_token: TfString::known(token),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_for_cloud() {
        let resolved = resolve(&token_only("tok123"), no_env).unwrap();
        assert_eq!(resolved.settings.api_url, "https://api.bitwarden.com/api");
        assert_eq!(
            resolved.settings.identity_url,
            "https://identity.bitwarden.com/connect/token"
        );
        assert_eq!(resolved.access_token.as_str(), "tok123");
    }

    #[test]
    fn env_used_when_config_null() {
        let resolved = resolve(&ProviderModel::default(), full_env).unwrap();
        assert_eq!(resolved.settings.api_url, "https://vault.example.com");
        assert_eq!(
            resolved.settings.identity_url,
            "https://vault.example.com/identity/connect/token"
        );
        assert_eq!(resolved.access_token.as_str(), "env-token");
    }

    #[test]
    fn config_wins_over_env() {
        let model = ProviderModel {
            api_url: TfString::known("https://api.bitwarden.eu"),
            identity_url: TfString::known("https://identity.bitwarden.eu/"),
            access_token: TfString::known("cfg-token"),
        };
        let resolved = resolve(&model, full_env).unwrap();
        assert_eq!(resolved.settings.api_url, "https://api.bitwarden.eu/api");
        assert_eq!(
            resolved.settings.identity_url,
            "https://identity.bitwarden.eu/connect/token"
        );
        assert_eq!(resolved.access_token.as_str(), "cfg-token");
    }

    #[test]
    fn empty_config_token_does_not_fall_back_to_env() {
        let err = resolve(&token_only(""), full_env).unwrap_err();
        let diag = err.iter().next().unwrap();
        assert_eq!(diag.summary, "Missing Bitwarden access token");
        assert_eq!(diag.attribute, Some(AttributePath::root("access_token")));
    }

    #[test]
    fn empty_env_value_is_ignored() {
        let resolved = resolve(&token_only("t"), empty_env).unwrap();
        assert_eq!(resolved.settings.api_url, "https://api.bitwarden.com/api");

        let err = resolve(&ProviderModel::default(), empty_env).unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn unknown_values_are_reported_per_attribute() {
        let model = ProviderModel {
            api_url: TfString::Unknown,
            identity_url: TfString::Unknown,
            access_token: TfString::Unknown,
        };
        let err = resolve(&model, full_env).unwrap_err();
        let summaries: Vec<_> = err.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            [
                "Unknown Bitwarden API url",
                "Unknown Bitwarden Identity url",
                "Unknown Bitwarden access token"
            ]
        );
        let paths: Vec<_> = err
            .iter()
            .filter_map(|d| d.attribute.as_ref().map(|p| p.to_string()))
            .collect();
        assert_eq!(paths, ["api_url", "identity_url", "access_token"]);
    }

    #[test]
    fn invalid_and_empty_urls_are_attribute_errors() {
        let model = ProviderModel {
            api_url: TfString::known(""),
            identity_url: TfString::known("vault.example.com"),
            access_token: TfString::known("t"),
        };
        let err = resolve(&model, no_env).unwrap_err();
        let summaries: Vec<_> = err.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            ["Missing Bitwarden API url", "Invalid Bitwarden Identity url"]
        );
    }

    #[test]
    fn normalisation_is_idempotent() {
        for raw in [
            "https://api.bitwarden.com",
            "https://api.bitwarden.com/",
            "https://vault.example.com/api",
        ] {
            let once = normalize_api_url(raw);
            assert_eq!(normalize_api_url(&once), once);
        }
        for raw in [
            "https://identity.bitwarden.com",
            "https://vault.example.com",
            "https://vault.example.com/identity",
            "https://vault.example.com/identity/connect/token",
        ] {
            let once = normalize_identity_url(raw);
            assert_eq!(normalize_identity_url(&once), once);
        }
    }

    #[test]
    fn identity_path_is_not_doubled() {
        for raw in ["https://vault.example.com/identity", "https://vault.example.com/identity/"] {
            assert_eq!(
                normalize_identity_url(raw),
                "https://vault.example.com/identity/connect/token"
            );
        }
    }

    #[test]
    fn plain_http_urls_are_rejected() {
        let model = ProviderModel {
            api_url: TfString::known("http://vault.example.com"),
            identity_url: TfString::known("https://vault.example.com"),
            access_token: TfString::known("t"),
        };
        let err = resolve(&model, no_env).unwrap_err();
        let diag = err.iter().next().unwrap();
        assert_eq!(diag.summary, "Invalid Bitwarden API url");
        assert_eq!(diag.attribute, Some(AttributePath::root("api_url")));
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn self_hosted_api_url_is_verbatim() {
        assert_eq!(
            normalize_api_url("https://vault.example.com/api/"),
            "https://vault.example.com/api"
        );
    }

    #[test]
    fn debug_redacts_token() {
        let debug = format!("{:?}", token_only("super-secret"));
        assert!(!debug.contains("super-secret"));
        let resolved = resolve(&token_only("super-secret"), no_env).unwrap();
        assert!(!format!("{resolved:?}").contains("super-secret"));
    }
}
