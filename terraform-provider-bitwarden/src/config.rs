//! Provider block loaded from a TOML file, for running the provider outside
//! Terraform.
//!
//! ```toml
//! [provider]
//! api_url = "https://vault.example.com"
//! access_token = "0.…"
//! ```
//!
//! Keys left out stay null, so the `BW_*` environment variables still apply.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use tfbw_core::DynamicValue;

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderBlock,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderBlock {
    pub api_url: Option<String>,
    pub identity_url: Option<String>,
    pub access_token: Option<String>,
}

impl std::fmt::Debug for ProviderBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBlock")
            .field("api_url", &self.api_url)
            .field("identity_url", &self.identity_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl ProviderBlock {
    /// The block as a provider configuration value.
    pub fn to_config(&self) -> DynamicValue {
        let field = |v: &Option<String>| v.as_deref().map_or(Value::Null, |s| json!(s));
        DynamicValue::from_json(json!({
            "api_url": field(&self.api_url),
            "identity_url": field(&self.identity_url),
            "access_token": field(&self.access_token),
        }))
    }
}

pub fn default_config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| {
            tracing::warn!("neither XDG_CONFIG_HOME nor HOME are set; using current directory for config");
            PathBuf::from(".")
        });
    base.join("terraform-provider-bitwarden").join("config.toml")
}

/// Load `path`.  A missing file yields an empty provider block.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using environment only");
        return Ok(Config::default());
    }

    // The access token may live here; it should be 0600.
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        match std::fs::metadata(path) {
            Ok(meta) if meta.mode() & 0o077 != 0 => {
                tracing::warn!(
                    path = %path.display(),
                    mode = format!("{:o}", meta.mode() & 0o777),
                    "config file is readable by group or others, recommend: chmod 600 {}",
                    path.display()
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("could not check config file permissions: {e}"),
        }
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_null_block() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(
            config.provider.to_config().as_json(),
            &json!({"api_url": null, "identity_url": null, "access_token": null})
        );
    }

    #[test]
    fn provider_table_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[provider]\napi_url = \"https://vault.example.com\"\naccess_token = \"tok123\""
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        let value = config.provider.to_config();
        assert_eq!(value.as_json()["api_url"], "https://vault.example.com");
        assert_eq!(value.as_json()["access_token"], "tok123");
        assert!(value.as_json()["identity_url"].is_null());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[provider]\ntoken = \"x\"").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn debug_hides_token() {
        let block = ProviderBlock {
            access_token: Some("tok123".into()),
            ..Default::default()
        };
        assert!(!format!("{block:?}").contains("tok123"));
    }
}
