//! # IEFCTL CLI
//!
//! Command-line driver for the IEF reconcilers.
//!
//! Desired state comes from YAML manifests; persisted state is a JSON file
//! owned by the caller. Each invocation runs one reconciliation step.
//!
//! ## Usage
//!
//! ```bash
//! # Preview a rendered policy without contacting the tenant
//! iefctl render --file TrustFrameworkBase.xml --setting TenantName=contoso
//!
//! # Create a key container and record its state
//! iefctl key create --manifest signing-key.yaml --state signing-key.state.json
//!
//! # Upload a new secret version taken from the environment
//! iefctl key update --manifest facebook-secret.yaml --state fb.state.json --secret-env FB_SECRET
//!
//! # Publish a policy, then check it for drift
//! iefctl policy create --manifest base.yaml --state base.state.json
//! iefctl policy read --state base.state.json
//! ```
//!
//! Graph credentials are read from `IEF_TENANT_ID`, `IEF_CLIENT_ID` and
//! `IEF_CLIENT_SECRET` (see [`DirectoryConfig::from_env`]).

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ief_policy_controller::controller::keys::StoredKeyContainer;
use ief_policy_controller::controller::policy::FsTemplateSource;
use ief_policy_controller::model::{
    KeyContainerConfig, KeyContainerManifest, PolicyDocument, PolicyDocumentConfig,
    SecretValue,
};
use ief_policy_controller::observability::metrics;
use ief_policy_controller::{
    render_policy, DirectoryClient, DirectoryConfig, GraphClient, KeyContainerReconciler,
    PolicyDocumentReconciler, StateChange,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Azure AD B2C IEF reconciler CLI
#[derive(Parser)]
#[command(name = "iefctl", version = VERSION)]
#[command(
    about = "Reconcile Azure AD B2C IEF policy keys and custom policies",
    long_about = None,
    after_help = "\
Examples:
  iefctl render --file TrustFrameworkBase.xml --setting TenantName=contoso
  iefctl key create --manifest key.yaml --state key.state.json
  iefctl policy read --state base.state.json
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print Prometheus metrics to stdout after the command finishes
    #[arg(long, global = true)]
    print_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a policy template with app settings and print it
    Render {
        /// Policy XML template
        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        /// App setting as KEY=VALUE (repeatable)
        #[arg(long = "setting", value_name = "KEY=VALUE", value_parser = parse_setting)]
        settings: Vec<(String, String)>,
    },
    /// Manage policy key containers
    #[command(subcommand)]
    Key(KeyCommand),
    /// Manage custom policies
    #[command(subcommand)]
    Policy(PolicyCommand),
}

#[derive(Subcommand)]
enum KeyCommand {
    /// Create a key container and provision its key material
    Create(KeyApplyArgs),
    /// Check a key container for drift
    Read(StateArgs),
    /// Re-provision a key container
    Update(KeyApplyArgs),
    /// Delete a key container
    Delete(StateArgs),
}

#[derive(Subcommand)]
enum PolicyCommand {
    /// Render and optionally publish a policy
    Create(ManifestArgs),
    /// Check a policy for drift
    Read(StateArgs),
    /// Re-render and optionally republish a policy
    Update(ManifestArgs),
    /// Delete a published policy
    Delete(StateArgs),
}

#[derive(Args)]
struct StateArgs {
    /// JSON state file
    #[arg(long, value_name = "PATH")]
    state: PathBuf,
}

#[derive(Args)]
struct ManifestArgs {
    /// YAML manifest with the desired configuration
    #[arg(long, value_name = "PATH")]
    manifest: PathBuf,

    #[command(flatten)]
    state: StateArgs,
}

#[derive(Args)]
struct KeyApplyArgs {
    #[command(flatten)]
    target: ManifestArgs,

    /// Read the secret to upload from this environment variable instead of the manifest
    #[arg(long, value_name = "VAR")]
    secret_env: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Configure rustls crypto provider before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ief_policy_controller=info,iefctl=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    metrics::register_metrics()?;

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            signal_token.cancel();
        }
    });

    let result = match cli.command {
        Commands::Render { file, settings } => render_command(&file, settings).await,
        Commands::Key(command) => key_command(&cancel, command).await,
        Commands::Policy(command) => policy_command(&cancel, command).await,
    };

    if cli.print_metrics {
        print!("{}", metrics::gather_text()?);
    }

    result
}

fn parse_setting(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

async fn render_command(file: &Path, settings: Vec<(String, String)>) -> Result<()> {
    let config = PolicyDocumentConfig {
        file: file.to_path_buf(),
        app_settings: settings
            .into_iter()
            .map(|(key, value)| (key, Some(value)))
            .collect(),
        publish: false,
    };

    let rendered = render_policy(&FsTemplateSource, &config).await?;
    match &rendered.id {
        Some(id) => info!(policy.id = %id, "Rendered policy"),
        None => warn!("Rendered policy has no PolicyId attribute"),
    }
    println!("{}", rendered.xml);
    Ok(())
}

fn directory_client() -> Result<Arc<dyn DirectoryClient>> {
    let config = DirectoryConfig::from_env()?;
    Ok(Arc::new(GraphClient::new(config)?))
}

async fn key_command(cancel: &CancellationToken, command: KeyCommand) -> Result<()> {
    let reconciler = KeyContainerReconciler::new(directory_client()?);

    match command {
        KeyCommand::Create(args) => {
            let state_path = &args.target.state.state;
            if tokio::fs::try_exists(state_path).await.unwrap_or(false) {
                anyhow::bail!(
                    "State file {} already exists, use `iefctl key update`",
                    state_path.display()
                );
            }
            let (config, secret) = load_key_manifest(&args).await?;

            let outcome = reconciler.create(cancel, &config, secret.as_ref()).await?;
            write_state(state_path, &outcome.state).await?;
            println!("{}", outcome.state.id);
            if let Some(err) = outcome.error {
                return Err(err).context("Key container was created but not provisioned");
            }
        }
        KeyCommand::Read(args) => {
            let stored: StoredKeyContainer = read_state(&args.state).await?;
            match reconciler.read(cancel, stored).await? {
                StateChange::Keep(state) => {
                    write_state(&args.state, &state).await?;
                    println!("{}", state.id);
                }
                StateChange::Remove => remove_state(&args.state).await?,
            }
        }
        KeyCommand::Update(args) => {
            let stored: StoredKeyContainer = read_state(&args.target.state.state).await?;
            let (config, secret) = load_key_manifest(&args).await?;

            let state = reconciler
                .update(cancel, &config, secret.as_ref(), stored)
                .await?;
            write_state(&args.target.state.state, &state).await?;
        }
        KeyCommand::Delete(args) => {
            let stored: StoredKeyContainer = read_state(&args.state).await?;
            reconciler.delete(cancel, stored).await?;
            remove_state(&args.state).await?;
        }
    }

    Ok(())
}

async fn policy_command(cancel: &CancellationToken, command: PolicyCommand) -> Result<()> {
    let reconciler =
        PolicyDocumentReconciler::new(directory_client()?, Arc::new(FsTemplateSource));

    match command {
        PolicyCommand::Create(args) => {
            let config: PolicyDocumentConfig = read_manifest(&args.manifest).await?;
            let state = reconciler.create(cancel, &config).await?;
            write_policy_state(&args.state.state, &state).await?;
        }
        PolicyCommand::Update(args) => {
            let config: PolicyDocumentConfig = read_manifest(&args.manifest).await?;
            let state = reconciler.update(cancel, &config).await?;
            write_policy_state(&args.state.state, &state).await?;
        }
        PolicyCommand::Read(args) => {
            let stored: PolicyDocument = read_state(&args.state).await?;
            match reconciler.read(cancel, stored).await? {
                StateChange::Keep(_) => info!("Policy is up to date"),
                StateChange::Remove => remove_state(&args.state).await?,
            }
        }
        PolicyCommand::Delete(args) => {
            let stored: PolicyDocument = read_state(&args.state).await?;
            reconciler.delete(cancel, &stored).await?;
            remove_state(&args.state).await?;
        }
    }

    Ok(())
}

async fn write_policy_state(path: &Path, state: &PolicyDocument) -> Result<()> {
    write_state(path, state).await?;
    if let Some(id) = &state.id {
        println!("{id}");
    }
    Ok(())
}

async fn load_key_manifest(
    args: &KeyApplyArgs,
) -> Result<(KeyContainerConfig, Option<SecretValue>)> {
    let manifest: KeyContainerManifest = read_manifest(&args.target.manifest).await?;
    let (config, mut secret) = manifest.into_parts()?;

    if let Some(var) = &args.secret_env {
        let value = std::env::var(var)
            .with_context(|| format!("Secret environment variable {var} is not set"))?;
        secret = Some(SecretValue::new(value));
    }

    Ok((config, secret))
}

async fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Invalid manifest {}", path.display()))
}

async fn read_state<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid state file {}", path.display()))
}

async fn write_state<T: Serialize>(path: &Path, state: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write state file {}", path.display()))?;
    debug!(path = %path.display(), "State written");
    Ok(())
}

async fn remove_state(path: &Path) -> Result<()> {
    info!(path = %path.display(), "Resource drifted or was deleted, removing state");
    tokio::fs::remove_file(path)
        .await
        .with_context(|| format!("Failed to remove state file {}", path.display()))
}
