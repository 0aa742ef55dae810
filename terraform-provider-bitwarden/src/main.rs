mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use serde_json::json;
use tfbw_core::{
    ConfigureRequest, ConfiguredProvider, DataSourceReadRequest, Diagnostics, DynamicValue,
    ProviderSchemas,
};
use tfbw_provider::{BitwardenProvider, TYPE_NAME};
use tfbw_sm::SmConnector;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_ENV: &str = "TF_LOG_PROVIDER_BITWARDEN";

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    if tfbw_plugin::launched_by_terraform() {
        tfbw_plugin::serve(Arc::new(provider())).await?;
        return Ok(());
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cmd = args.first().map(String::as_str).unwrap_or("help");

    match cmd {
        "schema" => cmd_schema(),
        "check" => cmd_check(&args[1..]).await,
        "projects" => cmd_lookup("projects", &args[1..]).await,
        "secrets" => cmd_lookup("secrets", &args[1..]).await,
        "version" | "--version" | "-V" => {
            println!("terraform-provider-bitwarden {VERSION}");
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr; stdout carries command output only.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_help() {
    println!(
        "\
terraform-provider-bitwarden - Bitwarden Secrets Manager provider

USAGE:
    terraform-provider-bitwarden <command> [args...]

    Started by Terraform (TF_PLUGIN_MAGIC_COOKIE set), the binary serves the
    plugin protocol instead of running a command.

COMMANDS:
    schema                              Print provider, resource and data source schemas as JSON
    check [--config <path>]             Configure the provider and report diagnostics
    projects [--config <path>] <id>...  Look up projects by id
    secrets [--config <path>] <id>...   Look up secrets by id (values are redacted)
    version                             Print the provider version
    help                                Show this help

CONFIGURATION:
    The [provider] table of the config file (default:
    $XDG_CONFIG_HOME/terraform-provider-bitwarden/config.toml) takes
    api_url, identity_url and access_token.  Unset keys fall back to
    BW_API_URL, BW_IDENTITY_URL and BW_ACCESS_TOKEN.

    Log level: {LOG_ENV}=debug

EXAMPLES:
    terraform-provider-bitwarden schema
    BW_ACCESS_TOKEN=0.… terraform-provider-bitwarden check
    terraform-provider-bitwarden secrets --config ./bw.toml 8c3f…"
    );
}

fn provider() -> BitwardenProvider<SmConnector> {
    BitwardenProvider::new(VERSION, SmConnector)
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Split `--config <path>` / `--config=<path>` out of `args`.
fn split_config_flag(args: &[String]) -> Result<(Option<PathBuf>, Vec<String>)> {
    let mut path = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" || arg == "-c" {
            match iter.next() {
                Some(p) => path = Some(PathBuf::from(p)),
                None => bail!("--config requires a path argument"),
            }
        } else if let Some(p) = arg.strip_prefix("--config=") {
            path = Some(PathBuf::from(p));
        } else {
            rest.push(arg.clone());
        }
    }
    Ok((path, rest))
}

fn print_diagnostics(diags: &Diagnostics) {
    for diag in diags.iter() {
        eprintln!("{diag}");
    }
}

async fn configure(path: Option<PathBuf>) -> Result<ConfiguredProvider> {
    let path = path.unwrap_or_else(config::default_config_path);
    let config = config::load_config(&path)?;
    tracing::debug!(provider = ?config.provider, "loaded provider block");

    let provider = provider();
    let request = ConfigureRequest {
        config: config.provider.to_config(),
    };
    match ConfiguredProvider::configure(&provider, request).await {
        Ok(configured) => Ok(configured),
        Err(diags) => {
            print_diagnostics(&diags);
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_schema() -> Result<()> {
    let schemas = ProviderSchemas::collect(&provider());
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}

async fn cmd_check(args: &[String]) -> Result<()> {
    let (path, rest) = split_config_flag(args)?;
    if let Some(extra) = rest.first() {
        bail!("unexpected argument: {extra}");
    }
    let configured = configure(path).await?;
    println!(
        "ok: authenticated to organization {}",
        configured.client().organization_id()
    );
    Ok(())
}

/// Run the `bitwarden_<list>` data source over `ids` and print its state.
async fn cmd_lookup(list: &str, args: &[String]) -> Result<()> {
    let (path, ids) = split_config_flag(args)?;
    if ids.is_empty() {
        bail!("usage: terraform-provider-bitwarden {list} [--config <path>] <id>...");
    }

    let configured = configure(path).await?;
    let type_name = format!("{TYPE_NAME}_{list}");
    let Some((schema, data_source)) = configured.data_source(&type_name) else {
        bail!("data source {type_name} is not registered");
    };

    let items: Vec<_> = ids.iter().map(|id| json!({ "id": id })).collect();
    let request = DataSourceReadRequest {
        config: DynamicValue::from_json(json!({ "id": null, list: items })),
    };
    let response = data_source.read(request).await;
    print_diagnostics(&response.diagnostics);
    if response.diagnostics.has_error() {
        std::process::exit(1);
    }

    let mut state = response.state.into_json();
    schema.redact(&mut state);
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
