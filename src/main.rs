//! transport-cli: issue one request through the resilient transport.
//!
//! ```text
//! transport-cli --base-url https://api.example.com/v1 \
//!     --credentials tokens.json GET /customers -q page=2 --dedupe
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use resilient_transport::auth::FileCredentialStore;
use resilient_transport::config::{from_env, load_config, ConfigError, TransportConfig};
use resilient_transport::observability::init_logging;
use resilient_transport::{Method, RequestDescriptor, Transport};

#[derive(Parser)]
#[command(name = "transport-cli")]
#[command(about = "Send a request with dedup, retry, refresh and rate-limit handling", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults plus TRANSPORT_* overrides when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file holding access_token / refresh_token. Refreshed tokens are written back.
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Override the configured base URL.
    #[arg(long)]
    base_url: Option<String>,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE, HEAD).
    method: Method,

    /// Path relative to the base URL, or an absolute URL.
    path: String,

    /// Query parameter as key=value. Repeatable.
    #[arg(short, long = "query", value_parser = parse_pair)]
    query: Vec<(String, String)>,

    /// JSON request body.
    #[arg(long)]
    body: Option<String>,

    /// Opt in to in-flight deduplication (GET only).
    #[arg(long)]
    dedupe: bool,

    /// Surface 401 instead of refreshing the session.
    #[arg(long)]
    no_refresh: bool,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn load(cli: &Cli) -> Result<TransportConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => from_env()?,
    };
    if let Some(base_url) = &cli.base_url {
        config.client.base_url = base_url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };
    init_logging(&config.observability);

    let mut builder = Transport::builder(config);
    if let Some(path) = &cli.credentials {
        match FileCredentialStore::open(path) {
            Ok(store) => builder = builder.credentials(Arc::new(store)),
            Err(e) => {
                eprintln!("Cannot open credentials {}: {}", path.display(), e);
                return ExitCode::from(2);
            }
        }
    }
    let transport = match builder.build() {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut request = RequestDescriptor::new(cli.method, cli.path).dedupe(cli.dedupe);
    for (key, value) in cli.query {
        request = request.query(key, value);
    }
    if cli.no_refresh {
        request = request.skip_auth_refresh();
    }
    if let Some(body) = cli.body {
        match serde_json::from_str(&body) {
            Ok(value) => request = request.json(value),
            Err(e) => {
                eprintln!("--body is not valid JSON: {}", e);
                return ExitCode::from(2);
            }
        }
    }

    match transport.execute(request).await {
        Ok(response) => {
            match response.json::<serde_json::Value>() {
                Ok(json) => println!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_else(|_| response.text())
                ),
                Err(_) => println!("{}", response.text()),
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            match serde_json::to_string_pretty(&error) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", error),
            }
            ExitCode::FAILURE
        }
    }
}
