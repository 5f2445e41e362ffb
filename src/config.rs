use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub remoting_port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub seed: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "REST and remoting fixture server for client SDK tests")]
pub struct Args {
    /// Host to bind both listeners to (overrides FIXTURE_SERVER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port of the REST application (overrides FIXTURE_SERVER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Port of the remoting test server (overrides FIXTURE_SERVER_REMOTING_PORT)
    #[arg(long)]
    pub remoting_port: Option<u16>,

    /// Root directory of container storage (overrides FIXTURE_SERVER_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Memory datasource URL (overrides FIXTURE_SERVER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Skip creating the sample widgets at startup
    #[arg(long)]
    pub no_seed: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_sources(Args::parse(), |key| env::var(key))
    }

    /// Merge parsed arguments over values looked up with `lookup`.
    pub fn from_sources<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = lookup("FIXTURE_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = port_from(&lookup, "FIXTURE_SERVER_PORT", 3000)?;
        let env_remoting_port = port_from(&lookup, "FIXTURE_SERVER_REMOTING_PORT", 3001)?;
        let env_storage =
            lookup("FIXTURE_SERVER_STORAGE_DIR").unwrap_or_else(|_| "./storage".into());
        let env_db =
            lookup("FIXTURE_SERVER_DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".into());

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            remoting_port: args.remoting_port.unwrap_or(env_remoting_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            seed: !args.no_seed,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn remoting_addr(&self) -> String {
        format!("{}:{}", self.host, self.remoting_port)
    }
}

fn port_from<F>(lookup: &F, key: &str, default: u16) -> Result<u16>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(key) {
        Ok(value) => value
            .parse::<u16>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
