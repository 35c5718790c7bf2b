//! Chimetrics CLI
//!
//! Command-line client for the exporter's `/chi` control endpoint.
//!
//! # Usage
//!
//! ```bash
//! chimetrics --help
//! chimetrics health
//! chimetrics list
//! chimetrics watch default chi-a 10.0.0.1:8123 10.0.0.2:8123
//! chimetrics unwatch default chi-a
//! ```

#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde_json::Value;
use shared::models::{Target, TargetKey};

/// Chimetrics CLI - control client for the `ClickHouse` metrics exporter
#[derive(Parser)]
#[command(name = "chimetrics")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API server URL
    #[arg(
        short,
        long,
        env = "CHIMETRICS_API_URL",
        default_value = "http://localhost:8888"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API server health
    Health,
    /// List watched installations
    List,
    /// Watch an installation, replacing its addresses if already watched
    Watch {
        /// Namespace of the installation
        namespace: String,
        /// Name of the installation
        name: String,
        /// Host addresses (`host`, `host:port` or `[v6]:port`)
        #[arg(required = true)]
        addresses: Vec<String>,
    },
    /// Stop watching an installation
    Unwatch {
        /// Namespace of the installation
        namespace: String,
        /// Name of the installation
        name: String,
    },
}

/// HTTP client for the control endpoint.
struct ControlClient {
    http: Client,
    base_url: String,
}

impl ControlClient {
    fn new(api_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn health(&self) -> Result<Value> {
        let response = self.http.get(self.url("/health")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn list(&self) -> Result<Vec<Target>> {
        let response = self.http.get(self.url("/chi")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn watch(&self, target: &Target) -> Result<()> {
        let response = self.http.post(self.url("/chi")).json(target).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn unwatch(&self, key: &TargetKey) -> Result<()> {
        let response = self.http.delete(self.url("/chi")).json(key).send().await?;
        check(response).await?;
        Ok(())
    }
}

/// Turns a non-success response into an error carrying the server's message.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["message"].as_str().map(ToString::to_string))
        .unwrap_or(body);
    bail!("{status}: {message}")
}

async fn run(cli: Cli) -> Result<()> {
    let client = ControlClient::new(&cli.api_url);

    match cli.command {
        Some(Commands::Health) => {
            let health = client
                .health()
                .await
                .with_context(|| format!("Failed to reach Chimetrics API at {}", cli.api_url))?;
            println!(
                "{} {} is {}",
                health["service"].as_str().unwrap_or("chimetrics"),
                health["version"].as_str().unwrap_or("?"),
                health["status"].as_str().unwrap_or("unknown"),
            );
        }
        Some(Commands::List) => {
            let targets = client.list().await?;
            if targets.is_empty() {
                println!("No installations watched");
            }
            for target in targets {
                println!("{}\t{}", target.key, target.addresses.join(","));
            }
        }
        Some(Commands::Watch {
            namespace,
            name,
            addresses,
        }) => {
            let target = Target::new(namespace, name, addresses);
            client.watch(&target).await?;
            tracing::info!(target_key = %target.key, addresses = target.addresses.len(), "Watching");
            println!("Watching {}", target.key);
        }
        Some(Commands::Unwatch { namespace, name }) => {
            let key = TargetKey::new(namespace, name);
            client.unwatch(&key).await?;
            println!("Stopped watching {key}");
        }
        None => {
            println!("Chimetrics CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}
